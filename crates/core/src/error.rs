//! Error types for the feedreply domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum.

use thiserror::Error;

/// The top-level error type for all feedreply operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Feed adapter errors ---
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Delivery errors ---
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the feed/UI adapter: the surface we read from and type into.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Feed is not authenticated (landed on {url})")]
    NotLoggedIn { url: String },

    #[error("Feed unreachable: {0}")]
    Unreachable(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Input surface not found: {0}")]
    InputMissing(String),

    #[error("Image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("Feed operation timed out: {0}")]
    Timeout(String),

    #[error("Feed closed")]
    Closed,
}

/// Failures of the AI generation service.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider returned an empty reply")]
    EmptyReply,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure while posting reply segments back into the feed.
///
/// `sent` holds the segments that did reach the feed before the failure;
/// they are already visible and must still be recognised as self-authored.
#[derive(Debug, Clone, Error)]
#[error("Delivery failed at segment {failed_index} after {} sent: {source}", .sent.len())]
pub struct DeliveryError {
    pub failed_index: usize,
    pub sent: Vec<String>,
    #[source]
    pub source: AdapterError,
}

impl GenerationError {
    /// Whether a later, distinct message has a fair chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::StreamInterrupted(_)
                | Self::Timeout(_)
                | Self::Network(_)
        ) || matches!(self, Self::ApiError { status_code, .. } if *status_code >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_displays_correctly() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn delivery_error_reports_progress() {
        let err = DeliveryError {
            failed_index: 2,
            sent: vec!["你好！".into(), "最近".into()],
            source: AdapterError::InputMissing("div[contenteditable]".into()),
        };
        let text = err.to_string();
        assert!(text.contains("segment 2"));
        assert!(text.contains("2 sent"));
        assert!(text.contains("contenteditable"));
    }

    #[test]
    fn transient_classification() {
        assert!(GenerationError::Timeout("30s".into()).is_transient());
        assert!(
            GenerationError::ApiError {
                status_code: 503,
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(!GenerationError::AuthenticationFailed("bad key".into()).is_transient());
        assert!(!GenerationError::EmptyReply.is_transient());
    }
}
