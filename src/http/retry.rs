//! Retry logic for network operations with error classification.

use reqwest::StatusCode;

/// Maximum number of retry attempts for network operations.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Errors that should not be retried.
#[derive(Debug, Clone, PartialEq)]
pub enum NonRetryableError {
    /// Rate limit exceeded (HTTP 429)
    RateLimitExceeded(String),
    /// Authentication failed (HTTP 401)
    AuthenticationFailed(String),
    /// Resource not found (HTTP 404)
    NotFound(String),
    /// Forbidden access (HTTP 403); for downloads this means the token expired
    Forbidden(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
}

impl NonRetryableError {
    /// The server-provided (or default) explanation.
    pub fn message(&self) -> &str {
        match self {
            NonRetryableError::RateLimitExceeded(msg)
            | NonRetryableError::AuthenticationFailed(msg)
            | NonRetryableError::NotFound(msg)
            | NonRetryableError::Forbidden(msg)
            | NonRetryableError::ClientError(msg) => msg,
        }
    }
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::RateLimitExceeded(msg) => {
                write!(f, "Rate limit exceeded: {}. Try again later.", msg)
            }
            NonRetryableError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            NonRetryableError::NotFound(msg) => write!(f, "Not found: {}", msg),
            NonRetryableError::Forbidden(msg) => {
                write!(f, "Access forbidden: {}. You may need to log in again.", msg)
            }
            NonRetryableError::ClientError(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies a response status as retryable or not.
///
/// `message` is used as the error text; when absent a default description
/// for the status is used. 5xx statuses are retryable.
pub fn classify_status(status: StatusCode, message: Option<String>) -> Result<(), NonRetryableError> {
    let text = |default: &str| message.clone().unwrap_or_else(|| default.to_string());
    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(text(
            "Invalid or missing credentials",
        ))),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(text(
            "Access to this resource is forbidden",
        ))),
        StatusCode::TOO_MANY_REQUESTS => {
            Err(NonRetryableError::RateLimitExceeded(text("Too many requests")))
        }
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(text(
            "The requested resource was not found",
        ))),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(
            text(&format!("HTTP {} error", s.as_u16())),
        )),
        _ => Ok(()),
    }
}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is retryable, Err with a user-friendly message if not.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    match error.status() {
        Some(status) => classify_status(status, None),
        // Connection errors, timeouts, etc. are retryable
        None => Ok(()),
    }
}

/// Checks if an error from `error_for_status()` should be retried.
/// Returns the original error if retryable, or a NonRetryableError if not.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_error_display() {
        let err = NonRetryableError::RateLimitExceeded("test".to_string());
        assert!(err.to_string().contains("Rate limit"));

        let err = NonRetryableError::AuthenticationFailed("bad password".to_string());
        assert!(err.to_string().contains("bad password"));

        let err = NonRetryableError::Forbidden("test".to_string());
        assert!(err.to_string().contains("log in again"));

        let err = NonRetryableError::ClientError("HTTP 400".to_string());
        assert_eq!(err.message(), "HTTP 400");
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::OK, None).is_ok());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, None).is_ok());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, None).is_ok());

        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None),
            Err(NonRetryableError::Forbidden(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None),
            Err(NonRetryableError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None),
            Err(NonRetryableError::RateLimitExceeded(_))
        ));
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, Some("Insufficient membership".into())),
            Err(NonRetryableError::AuthenticationFailed(
                "Insufficient membership".into()
            ))
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, None),
            Err(NonRetryableError::ClientError("HTTP 400 error".into()))
        );
    }

    #[tokio::test]
    async fn test_check_retryable_maps_status_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;

        let error = reqwest::get(server.url())
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err();
        let mapped = check_retryable(error);
        assert!(matches!(
            mapped.downcast_ref::<NonRetryableError>(),
            Some(NonRetryableError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_check_retryable_keeps_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let error = reqwest::get(server.url())
            .await
            .unwrap()
            .error_for_status()
            .unwrap_err();
        let mapped = check_retryable(error);
        assert!(mapped.downcast_ref::<NonRetryableError>().is_none());
        assert!(mapped.downcast_ref::<reqwest::Error>().is_some());
    }
}
