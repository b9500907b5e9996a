use thiserror::Error;

/// Unified error type for multi-release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    /// User-correctable pre-flight failure. Carries remediation lines that are
    /// shown to the operator before the run aborts.
    #[error("{summary}")]
    Validation {
        summary: String,
        messages: Vec<String>,
    },

    #[error("Change detection failed: {0}")]
    Detection(String),

    #[error("Manifest update failed: {0}")]
    Manifest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Rolling back already-applied manifest changes failed. This requires
    /// manual intervention and is never merged into the error that triggered
    /// the rollback.
    #[error("Failed to revert manifest changes: {0}")]
    Revert(String),

    #[error("Downstream build failed: {0}")]
    Build(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in multi-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a validation error with a summary and remediation lines
    pub fn validation(summary: impl Into<String>, messages: Vec<String>) -> Self {
        ReleaseError::Validation {
            summary: summary.into(),
            messages,
        }
    }

    /// Create a change detection error with context
    pub fn detection(msg: impl Into<String>) -> Self {
        ReleaseError::Detection(msg.into())
    }

    /// Create a manifest error with context
    pub fn manifest(msg: impl Into<String>) -> Self {
        ReleaseError::Manifest(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a revert failure with context
    pub fn revert(msg: impl Into<String>) -> Self {
        ReleaseError::Revert(msg.into())
    }

    /// Create a downstream build error with context
    pub fn build(msg: impl Into<String>) -> Self {
        ReleaseError::Build(msg.into())
    }

    /// The remediation lines of a validation error, or just the error message
    /// for every other variant.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ReleaseError::Validation { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::detection("walk failed");
        assert_eq!(err.to_string(), "Change detection failed: walk failed");
    }

    #[test]
    fn test_validation_error_carries_messages() {
        let err = ReleaseError::validation(
            "Sorry, '1..0' is not a valid version.",
            vec!["line one".to_string(), "line two".to_string()],
        );
        assert_eq!(err.to_string(), "Sorry, '1..0' is not a valid version.");
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(ReleaseError::manifest("x").to_string().contains("Manifest"));
        assert!(ReleaseError::revert("x").to_string().contains("revert"));
        assert!(ReleaseError::build("x").to_string().contains("build"));
    }

    #[test]
    fn test_non_validation_messages_fall_back_to_display() {
        let err = ReleaseError::build("exit code 1");
        assert_eq!(err.messages(), vec![err.to_string()]);
    }
}
