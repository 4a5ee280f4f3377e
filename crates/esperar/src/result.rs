//! Result and error types for Esperar.

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur in Esperar
#[derive(Debug, Error)]
pub enum EsperarError {
    /// A wait exceeded its deadline
    #[error("Timed out after {ms}ms waiting for {target} to be {condition}")]
    Timeout {
        /// Condition that never held
        condition: String,
        /// Description of what was waited on
        target: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Click was blocked by another element and the script bypass also failed
    #[error("Click on {target} was intercepted and the script fallback failed: {message}")]
    InterceptedAction {
        /// Description of the click target
        target: String,
        /// Error reported by the fallback
        message: String,
    },

    /// Handle no longer refers to a live element
    #[error("Stale element reference: {element}")]
    StaleElement {
        /// Handle id
        element: String,
    },

    /// Query matched nothing where an element was required
    #[error("No element found for {locator}")]
    NoSuchElement {
        /// Locator description
        locator: String,
    },

    /// Click rejected because another element covers the target
    #[error("Click intercepted on {element}")]
    ClickIntercepted {
        /// Handle id
        element: String,
    },

    /// A dialog is open where plain element interaction was expected
    #[error("Unexpected dialog open: {text}")]
    UnexpectedDialog {
        /// Dialog message
        text: String,
    },

    /// Any other failure reported by the UI driver
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Locator table has no entry under this name
    #[error("Unknown locator: {name}")]
    UnknownLocator {
        /// Logical name that was looked up
        name: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl EsperarError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a stale element error
    #[must_use]
    pub fn stale(element: impl Into<String>) -> Self {
        Self::StaleElement {
            element: element.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for the transient pair: stale handle or vanished query result
    #[must_use]
    pub const fn is_invalidation(&self) -> bool {
        matches!(self, Self::StaleElement { .. } | Self::NoSuchElement { .. })
    }

    /// True if this is a wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = EsperarError::Timeout {
            condition: "clickable".into(),
            target: "#login2".into(),
            ms: 15_000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 15000ms waiting for #login2 to be clickable"
        );
        assert!(err.is_timeout());
        assert!(!err.is_invalidation());
    }

    #[test]
    fn test_invalidation_classification() {
        assert!(EsperarError::stale("e-1").is_invalidation());
        assert!(EsperarError::NoSuchElement {
            locator: ".hrefch".into()
        }
        .is_invalidation());
        assert!(!EsperarError::ClickIntercepted {
            element: "e-1".into()
        }
        .is_invalidation());
        assert!(!EsperarError::UnexpectedDialog {
            text: "Wrong password.".into()
        }
        .is_invalidation());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EsperarError = io.into();
        assert!(err.to_string().starts_with("I/O error"));
    }
}
