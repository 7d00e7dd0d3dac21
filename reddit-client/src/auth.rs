use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl};
use radar_core::{ContentApiError, CoreError};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before their reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn needs_refresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN >= self.expires_at
    }
}

/// Bearer tokens via the client-credentials exchange, cached until
/// near-expiry and refreshed on demand.
pub struct TokenProvider {
    oauth: BasicClient,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: &RedditCredentials) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("invalid authorization URL: {e}"),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::Internal {
                message: format!("invalid token URL: {e}"),
            }
        })?;

        let oauth = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth,
            cached: RwLock::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, CoreError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.needs_refresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("exchanging client credentials for a fresh access token");
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                error!("client credentials exchange failed: {}", e);
                CoreError::ContentApi(ContentApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let lifetime = response
            .expires_in()
            .unwrap_or(Duration::from_secs(3600));
        let token = CachedToken {
            access_token: response.access_token().secret().clone(),
            expires_at: Instant::now() + lifetime,
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token, forcing a refresh on the next call. Used when
    /// the upstream rejects a token before its reported expiry.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_builds_from_credentials() {
        let credentials = RedditCredentials {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            user_agent: "demandradar/0.1 test".to_string(),
        };
        assert!(TokenProvider::new(&credentials).is_ok());
    }

    #[test]
    fn fresh_token_does_not_need_refresh() {
        let token = CachedToken {
            access_token: "token".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(!token.needs_refresh());
    }

    #[test]
    fn token_near_expiry_needs_refresh() {
        let token = CachedToken {
            access_token: "token".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(token.needs_refresh());
    }
}
