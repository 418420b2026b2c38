//! Error taxonomy for report publishing.

use donut_attributes::{AttributeError, ManifestError};

/// Errors raised while preparing or generating a report.
#[derive(Debug, thiserror::Error)]
pub enum DonutError {
    #[error("invalid custom attributes: {0}")]
    Attributes(#[from] AttributeError),

    #[error("invalid build manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("report generator failed: {0}")]
    Generator(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<walkdir::Error> for DonutError {
    fn from(err: walkdir::Error) -> Self {
        DonutError::Io(err.into())
    }
}

/// Result type for report publishing operations.
pub type Result<T> = std::result::Result<T, DonutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_error_converts() {
        let err: DonutError = AttributeError::MalformedSpec {
            line: 1,
            reason: "dangling escape at end of input".to_string(),
        }
        .into();
        assert!(err.to_string().contains("invalid custom attributes"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_generator_error_display() {
        let err = DonutError::Generator("exited with code 2".to_string());
        assert_eq!(err.to_string(), "report generator failed: exited with code 2");
    }
}
