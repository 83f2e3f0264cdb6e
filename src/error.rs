//! Error handling for the enhancer
//!
//! Nothing in this crate is fatal to the page. Every error maps onto one of
//! the recovery categories below and degrades to "feature temporarily
//! inactive" until the next navigation, settings change, or health check.

use thiserror::Error;

/// Result type alias for enhancer operations
pub type Result<T> = std::result::Result<T, EnhancerError>;

/// How an error is expected to be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A DOM element or browser API is not there yet. Abort silently and
    /// retry on the next relevant event.
    ExpectedAbsent,
    /// The browser refused an operation, such as a media element that is
    /// already sourced. Resolved with a defined fallback.
    NativeConflict,
    /// Bad configuration or setting values supplied by the embedder.
    Configuration,
}

/// Main error type for enhancer operations
#[derive(Error, Debug)]
pub enum EnhancerError {
    // Absent dependencies
    #[error("Element not found: {what}")]
    ElementMissing { what: &'static str },

    #[error("Browser API unavailable: {api}")]
    ApiUnavailable { api: &'static str },

    // Native API conflicts
    #[error("Media element already has an audio source")]
    SourceAlreadyBound,

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Audio context error: {reason}")]
    AudioContext { reason: String },

    // Configuration
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Host failures that carry no finer classification
    #[error("Host error: {reason}")]
    Host { reason: String },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EnhancerError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EnhancerError::ElementMissing { .. } => "ELEMENT_MISSING",
            EnhancerError::ApiUnavailable { .. } => "API_UNAVAILABLE",
            EnhancerError::SourceAlreadyBound => "SOURCE_ALREADY_BOUND",
            EnhancerError::InvalidState { .. } => "INVALID_STATE",
            EnhancerError::AudioContext { .. } => "AUDIO_CONTEXT",
            EnhancerError::InvalidSetting { .. } => "INVALID_SETTING",
            EnhancerError::InvalidConfig { .. } => "INVALID_CONFIG",
            EnhancerError::Host { .. } => "HOST_ERROR",
            EnhancerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Recovery category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnhancerError::ElementMissing { .. } | EnhancerError::ApiUnavailable { .. } => {
                ErrorCategory::ExpectedAbsent
            }
            EnhancerError::SourceAlreadyBound
            | EnhancerError::InvalidState { .. }
            | EnhancerError::AudioContext { .. }
            | EnhancerError::Host { .. } => ErrorCategory::NativeConflict,
            EnhancerError::InvalidSetting { .. }
            | EnhancerError::InvalidConfig { .. }
            | EnhancerError::Serialization(_) => ErrorCategory::Configuration,
        }
    }

    /// Check if this error heals on its own once the page changes
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EnhancerError::ElementMissing { what: "player" };
        assert_eq!(err.error_code(), "ELEMENT_MISSING");
        assert_eq!(err.category(), ErrorCategory::ExpectedAbsent);
    }

    #[test]
    fn test_native_conflicts_are_recoverable() {
        assert!(EnhancerError::SourceAlreadyBound.is_recoverable());
        let err = EnhancerError::InvalidState {
            reason: "detached".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::NativeConflict);
    }

    #[test]
    fn test_audio_failures_are_native_conflicts() {
        let err = EnhancerError::AudioContext {
            reason: "closed".to_string(),
        };
        assert_eq!(err.error_code(), "AUDIO_CONTEXT");
        assert_eq!(err.category(), ErrorCategory::NativeConflict);
        assert_eq!(
            EnhancerError::ApiUnavailable { api: "AudioContext" }.category(),
            ErrorCategory::ExpectedAbsent
        );
    }

    #[test]
    fn test_configuration_errors_are_not_recoverable() {
        let err = EnhancerError::InvalidConfig {
            reason: "threshold".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
