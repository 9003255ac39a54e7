//! Tailer error types.

use std::path::PathBuf;

/// Errors that can occur while tailing a transcript file.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// Tailed file was deleted (or never existed).
    #[error("Tailed file deleted: {}", .0.display())]
    FileDeleted(PathBuf),

    /// Permission denied opening the file.
    #[error("Permission denied: {}", .0.display())]
    AccessDenied(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
