use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Content API error: {0}")]
    ContentApi(#[from] ContentApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Status store error: {0}")]
    StatusStore(#[from] StatusStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Request quota exceeded: {limit} requests per {window_secs} seconds")]
    QuotaExceeded { limit: u32, window_secs: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum ContentApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Upstream rate limit hit. Retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status}")]
    ServerError { status: u16 },
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Request failed for {provider} with status {status}")]
    RequestFailed { provider: String, status: u16 },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("Failed to parse classifier output: {details}")]
    ParseFailure { details: String },
}

#[derive(Error, Debug)]
pub enum StatusStoreError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request record not found: {request_id}")]
    RecordNotFound { request_id: String },

    #[error("Stored record is corrupt: {details}")]
    CorruptRecord { details: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
