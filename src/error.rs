//! Error types for Kinship.

use thiserror::Error;

/// Common error type for Kinship.
#[derive(Error, Debug)]
pub enum KinshipError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for Kinship operations.
pub type Result<T> = std::result::Result<T, KinshipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = KinshipError::Config("jwt_secret is not set".to_string());
        assert_eq!(err.to_string(), "configuration error: jwt_secret is not set");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KinshipError = io_err.into();
        assert!(matches!(err, KinshipError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
