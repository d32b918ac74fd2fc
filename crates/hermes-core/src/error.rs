use std::time::Duration;

use thiserror::Error;

/// Maximum number of characters of a response body carried inside an error.
pub const MAX_DETAIL_CHARS: usize = 500;

/// Application-wide error types for Hermes.
///
/// Every variant is terminal for the scrape session that produced it; the
/// client never retries on its own.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A tool was called with unusable parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The API rejected the key (HTTP 401). The response body is ignored.
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// The dataset id does not exist (HTTP 404).
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Too many concurrent jobs or requests (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-2xx response from the API.
    #[error("API error (HTTP {status}): {detail}")]
    ApiError { status: u16, detail: String },

    /// The API broke its own contract, e.g. a 202 without a snapshot id
    /// or a 2xx body that does not decode.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The scrape job itself failed server-side.
    #[error("Scrape job failed: {0}")]
    JobFailed(String),

    /// The session deadline elapsed before the job produced a result.
    #[error("Scrape timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure before any HTTP status was received.
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl AppError {
    /// Maps a non-2xx API response onto the error taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => AppError::AuthenticationFailed,
            404 => AppError::DatasetNotFound(body_excerpt(body)),
            429 => AppError::RateLimited(body_excerpt(body)),
            _ => AppError::ApiError {
                status,
                detail: body_excerpt(body),
            },
        }
    }

    /// HTTP status associated with this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::AuthenticationFailed => Some(401),
            AppError::DatasetNotFound(_) => Some(404),
            AppError::RateLimited(_) => Some(429),
            AppError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the session deadline caused this error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

/// Excerpt of a response body suitable for an error message.
///
/// Caps at [`MAX_DETAIL_CHARS`] characters (not bytes, so multi-byte text
/// is never split) and substitutes a marker for blank bodies.
pub fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    trimmed.chars().take(MAX_DETAIL_CHARS).collect()
}
