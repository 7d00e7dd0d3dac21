use crate::error::*;
use std::time::Duration;

pub trait ErrorExt {
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::ContentApi(e) => e.is_retryable(),
            CoreError::Llm(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::QuotaExceeded { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::ContentApi(ContentApiError::RateLimited { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            CoreError::Llm(LlmError::RateLimitExceeded { retry_after, .. }) => {
                Some(Duration::from_secs(*retry_after))
            }
            CoreError::QuotaExceeded { window_secs, .. } => {
                Some(Duration::from_secs(*window_secs))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::ContentApi(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::StatusStore(_) => {
                "Could not read or write the request status store.".to_string()
            }
            CoreError::Config(_) => "The service is misconfigured.".to_string(),
            CoreError::Network(_) => {
                "Network connection error. Please check connectivity and try again.".to_string()
            }
            CoreError::InvalidInput { message } => message.clone(),
            CoreError::QuotaExceeded { limit, window_secs } => format!(
                "Request limit of {} per {} minutes reached. Please try again later.",
                limit,
                window_secs / 60
            ),
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::ContentApi(_) => "CONTENT_API".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::StatusStore(_) => "STATUS_STORE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::QuotaExceeded { .. } => "QUOTA_EXCEEDED".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ContentApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentApiError::RateLimited { .. } => true,
            ContentApiError::RequestTimeout => true,
            ContentApiError::ServerError { status } => *status >= 500,
            ContentApiError::InvalidResponse { .. } => true,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ContentApiError::AuthenticationFailed { .. } => {
                "Could not authenticate with the content source.".to_string()
            }
            ContentApiError::RateLimited { retry_after } => format!(
                "The content source is rate limiting requests. Retry in {} seconds.",
                retry_after
            ),
            ContentApiError::Forbidden { resource } => {
                format!("Access to {} is not allowed.", resource)
            }
            ContentApiError::NotFound { resource } => format!("Could not find: {}", resource),
            ContentApiError::RequestTimeout => {
                "The content source took too long to respond.".to_string()
            }
            ContentApiError::InvalidResponse { .. } => {
                "The content source returned an unexpected response.".to_string()
            }
            ContentApiError::ServerError { status } => {
                format!("The content source reported an error ({}).", status)
            }
        }
    }
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimitExceeded { .. }
                | LlmError::ServiceUnavailable { .. }
                | LlmError::RequestTimeout { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            LlmError::InvalidApiKey { provider } => {
                format!("The {} API key is invalid or missing.", provider)
            }
            LlmError::RateLimitExceeded { provider, .. } => {
                format!("The {} service is rate limiting requests.", provider)
            }
            LlmError::ServiceUnavailable { provider } | LlmError::RequestTimeout { provider } => {
                format!("The {} service is currently unavailable.", provider)
            }
            LlmError::RequestFailed { provider, .. } | LlmError::EmptyResponse { provider } => {
                format!("The {} service returned an unusable response.", provider)
            }
            LlmError::ParseFailure { .. } => {
                "The analysis service returned an unreadable result.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        let quota = CoreError::QuotaExceeded {
            limit: 100,
            window_secs: 3600,
        };
        assert_eq!(quota.error_code(), "QUOTA_EXCEEDED");

        let api = CoreError::ContentApi(ContentApiError::RequestTimeout);
        assert_eq!(api.error_code(), "CONTENT_API");

        let llm = CoreError::Llm(LlmError::ParseFailure {
            details: "no JSON".to_string(),
        });
        assert_eq!(llm.error_code(), "LLM");
    }

    #[test]
    fn retryable_errors() {
        assert!(CoreError::ContentApi(ContentApiError::ServerError { status: 503 }).is_retryable());
        assert!(!CoreError::ContentApi(ContentApiError::Forbidden {
            resource: "/r/private/new".to_string()
        })
        .is_retryable());
        assert!(!CoreError::InvalidInput {
            message: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn retry_after_uses_upstream_hint() {
        let err = CoreError::ContentApi(ContentApiError::RateLimited { retry_after: 42 });
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
    }

    #[test]
    fn user_friendly_messages_hide_internals() {
        let err = CoreError::Internal {
            message: "index out of bounds at orchestrator.rs:120".to_string(),
        };
        let message = err.user_friendly_message();
        assert!(!message.contains("orchestrator.rs"));
        assert!(!message.is_empty());
    }
}
