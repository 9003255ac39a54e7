//! Rollout filename conventions.
//!
//! Rollout files are named `rollout-<YYYY-MM-DDThh-mm-ss>-<id>.jsonl` and
//! live under a date-partitioned directory tree.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Filename timestamp format, with `-` in place of `:` for portability.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;

/// Parsed parts of a rollout filename.
///
/// The session id is an opaque, non-empty string. It has historically been
/// UUID-shaped but is never validated as one; future id formats are
/// accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutFileName {
    /// Session id embedded in the filename.
    pub session_id: String,
    /// Creation timestamp embedded in the filename.
    pub timestamp: DateTime<Utc>,
}

impl RolloutFileName {
    /// Parse a rollout filename into its timestamp and session id.
    ///
    /// Returns `None` for anything that does not match the naming
    /// convention.
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix("rollout-")?
            .strip_suffix(".jsonl")?;

        if stem.len() <= TIMESTAMP_LEN + 1 || !stem.is_char_boundary(TIMESTAMP_LEN) {
            return None;
        }
        let (ts, rest) = stem.split_at(TIMESTAMP_LEN);
        let session_id = rest.strip_prefix('-')?;
        if session_id.is_empty() {
            return None;
        }

        let naive = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            session_id: session_id.to_string(),
            timestamp: naive.and_utc(),
        })
    }
}

/// Check whether a filename follows the rollout naming convention.
#[must_use]
pub fn is_rollout_file(file_name: &str) -> bool {
    RolloutFileName::parse(file_name).is_some()
}

/// Format a rollout filename for a timestamp and session id.
#[must_use]
pub fn rollout_file_name(timestamp: DateTime<Utc>, session_id: &str) -> String {
    format!(
        "rollout-{}-{session_id}.jsonl",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}
