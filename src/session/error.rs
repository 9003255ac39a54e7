//! Locator error types.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while locating or listing sessions.
#[derive(thiserror::Error, Debug)]
pub enum LocatorError {
    /// No rollout file found for the requested session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The sessions root directory does not exist.
    #[error("Sessions root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Permission denied opening a file or directory.
    #[error("Permission denied: {}", .0.display())]
    AccessDenied(PathBuf),

    /// No qualifying file appeared within the deadline.
    #[error("Timed out after {0:?} waiting for a session file")]
    Timeout(Duration),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid wildcard pattern in a session filter.
    #[error("Invalid session filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_display() {
        let err = LocatorError::SessionNotFound("abc-123".to_string());
        assert_eq!(err.to_string(), "Session not found: abc-123");
    }

    #[test]
    fn test_root_not_found_display() {
        let err = LocatorError::RootNotFound(PathBuf::from("/tmp/sessions"));
        assert_eq!(err.to_string(), "Sessions root not found: /tmp/sessions");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: LocatorError = io_err.into();
        assert!(matches!(err, LocatorError::Io(_)));
    }
}
