//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for locating and tailing session transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory holding date-partitioned rollout files.
    #[serde(default = "default_sessions_root")]
    pub sessions_root: PathBuf,
    /// Poll interval for tailing and directory watching, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum bytes read from a file head when listing sessions.
    #[serde(default = "default_head_read_limit")]
    pub head_read_limit: usize,
}

fn default_sessions_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codex")
        .join("sessions")
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_head_read_limit() -> usize {
    64 * 1024
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            sessions_root: default_sessions_root(),
            poll_interval_ms: default_poll_interval_ms(),
            head_read_limit: default_head_read_limit(),
        }
    }
}

impl SessionsConfig {
    /// Create a configuration rooted at a specific directory.
    #[must_use]
    pub fn with_root(sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions_root: sessions_root.into(),
            ..Self::default()
        }
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
