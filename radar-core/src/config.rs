use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::Path;

fn default_bind_addr() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_user_agent() -> String {
    "demandradar/0.1".to_string()
}

fn default_gemini_model() -> String {
    "gemma-3n-e4b-it".to_string()
}

/// Runtime configuration, loaded from the environment or a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    #[serde(default = "default_user_agent")]
    pub reddit_user_agent: String,
    pub gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// SQLite URL for the durable status store; in-memory store when unset.
    #[serde(default)]
    pub status_db_url: Option<String>,
}

impl AppConfig {
    /// Load from `DEMANDRADAR_CONFIG` (TOML) when set, else from env vars.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("DEMANDRADAR_CONFIG") {
            Ok(path) => Self::from_toml_file(&path),
            Err(_) => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match env::var("PORT") {
            Ok(port) => format!("0.0.0.0:{port}"),
            Err(_) => default_bind_addr(),
        };

        Ok(Self {
            bind_addr,
            reddit_client_id: require_env("REDDIT_CLIENT_ID")?,
            reddit_client_secret: require_env("REDDIT_CLIENT_SECRET")?,
            reddit_user_agent: env::var("REDDIT_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
            gemini_api_key: require_env("GOOGLE_GEMINI_API_KEY")?,
            gemini_model: env::var("GOOGLE_GEMINI_API_MODEL")
                .unwrap_or_else(|_| default_gemini_model()),
            status_db_url: env::var("DEMANDRADAR_STATUS_DB").ok(),
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: AppConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

fn require_env(var_name: &str) -> Result<String, ConfigError> {
    match env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_applies_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            reddit_client_id = "id"
            reddit_client_secret = "secret"
            gemini_api_key = "key"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.bind_addr, "0.0.0.0:4000");
        assert_eq!(config.gemini_model, "gemma-3n-e4b-it");
        assert_eq!(config.reddit_user_agent, "demandradar/0.1");
        assert!(config.status_db_url.is_none());
    }

    #[test]
    fn toml_config_rejects_missing_required_fields() {
        let result = toml::from_str::<AppConfig>("bind_addr = \"0.0.0.0:9000\"");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let err = AppConfig::from_toml_file("/nonexistent/demandradar.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
