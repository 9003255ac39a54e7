//! Stream positioning for resumable tailing.

use chrono::{DateTime, Utc};

/// Where a tail begins reading.
///
/// Byte offsets are only meaningful against the exact file they were
/// produced from; there is no cross-file offset reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPosition {
    /// Start from the first byte.
    #[default]
    Beginning,
    /// Start at the current end of file; only new writes are yielded.
    End,
    /// Start from the beginning, with events at or before this time
    /// filtered out downstream by the parser. Timestamps are not ordered
    /// with byte offsets in the same index space, so this is deliberately
    /// not a seek.
    AfterTimestamp(DateTime<Utc>),
    /// Resume from a byte offset previously reported by a
    /// [`RawLine`](super::RawLine).
    ByteOffset(u64),
}

/// Tailing behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct TailOptions {
    /// Keep polling for new writes after reaching end of file.
    pub follow: bool,
    /// Poll interval while following, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            follow: false,
            poll_interval_ms: 100,
        }
    }
}

impl TailOptions {
    /// Options for a follow-mode tail.
    #[must_use]
    pub fn following() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_position_is_beginning() {
        assert_eq!(StreamPosition::default(), StreamPosition::Beginning);
    }

    #[test]
    fn test_following_options() {
        let options = TailOptions::following();
        assert!(options.follow);
        assert_eq!(options.poll_interval_ms, 100);
    }
}
