use thiserror::Error;

/// Errors raised by the bridge components
///
/// None of these ever escape an event handler: the monitor and the delivery
/// pipeline turn them into degraded behaviour and a log line.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Browser could not be launched
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Could not attach to a running browser
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    /// A tab/window query or command failed
    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// The tab vanished or never existed
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// No extractor is loaded in the tab, or it did not answer
    #[error("Extractor unavailable in tab {tab}: {reason}")]
    ExtractorUnavailable { tab: String, reason: String },

    /// JavaScript evaluation in the page failed
    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    /// A configured CSS selector does not parse
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A configured identifier pattern does not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// HTTP-level failure talking to the companion application
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BridgeError::ExtractorUnavailable {
            tab: "42".to_string(),
            reason: "no receiver".to_string(),
        };
        assert_eq!(err.to_string(), "Extractor unavailable in tab 42: no receiver");

        let err = BridgeError::InvalidSelector {
            selector: "##".to_string(),
            reason: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("'##'"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
