//! Concurrent-read file tailing with resumable positions.

mod error;
mod position;
mod tailer;

pub use error::TailError;
pub use position::{StreamPosition, TailOptions};
pub use tailer::{tail, LogTailer, RawLine};
