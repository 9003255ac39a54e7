//! Session listing metadata and filters.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::events::{parse_line, EventKind};

use super::error::LocatorError;
use super::pattern::RolloutFileName;

/// Lines inspected per file head before giving up on finding the
/// session-start event.
const MAX_HEAD_LINES: usize = 10;

/// Metadata for one discovered session transcript.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLogFile {
    /// Path to the rollout file.
    pub path: PathBuf,
    /// Opaque session id.
    pub session_id: String,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
    /// Working directory recorded at session start, if readable.
    pub cwd: Option<String>,
    /// Model recorded at session start, if readable.
    pub model: Option<String>,
}

/// Filter predicates applied while listing sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only sessions created at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only sessions created at or before this time.
    pub until: Option<DateTime<Utc>>,
    /// Only sessions started in this working directory.
    pub cwd: Option<String>,
    /// Only sessions using this model.
    pub model: Option<String>,
    /// Wildcard pattern (`*`, `?`) the session id must match.
    pub id_pattern: Option<String>,
}

impl SessionFilter {
    /// Compile the filter, turning the wildcard pattern into a regex.
    ///
    /// # Errors
    ///
    /// Returns an error if the wildcard pattern compiles to an invalid
    /// regex.
    pub fn compile(self) -> Result<CompiledFilter, LocatorError> {
        let id_regex = match &self.id_pattern {
            Some(pattern) => Some(Regex::new(&wildcard_to_regex(pattern))?),
            None => None,
        };
        Ok(CompiledFilter {
            filter: self,
            id_regex,
        })
    }
}

/// A [`SessionFilter`] with its wildcard pattern compiled once.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    filter: SessionFilter,
    id_regex: Option<Regex>,
}

impl CompiledFilter {
    /// Check whether a session passes every predicate.
    #[must_use]
    pub fn matches(&self, session: &SessionLogFile) -> bool {
        if let Some(from) = self.filter.from {
            if session.created_at < from {
                return false;
            }
        }
        if let Some(until) = self.filter.until {
            if session.created_at > until {
                return false;
            }
        }
        if let Some(cwd) = &self.filter.cwd {
            if session.cwd.as_deref() != Some(cwd.as_str()) {
                return false;
            }
        }
        if let Some(model) = &self.filter.model {
            if session.model.as_deref() != Some(model.as_str()) {
                return false;
            }
        }
        if let Some(regex) = &self.id_regex {
            if !regex.is_match(&session.session_id) {
                return false;
            }
        }
        true
    }
}

/// Translate a `*`/`?` wildcard pattern into an anchored regex.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// Read session metadata from a rollout file's head.
///
/// Parses at most [`MAX_HEAD_LINES`] lines (never more than `head_limit`
/// bytes) looking for the session-start event. Falls back to the
/// filename-embedded id and timestamp when the head is unreadable or does
/// not start with a session-start event. Returns `None` when not even the
/// filename matches the rollout convention.
pub async fn read_session_head(path: &Path, head_limit: usize) -> Option<SessionLogFile> {
    let file_name = path.file_name()?.to_str()?;
    let from_name = RolloutFileName::parse(file_name)?;

    let fallback = SessionLogFile {
        path: path.to_path_buf(),
        session_id: from_name.session_id.clone(),
        created_at: from_name.timestamp,
        cwd: None,
        model: None,
    };

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Skipping unreadable session file head"
            );
            return Some(fallback);
        }
    };

    let mut reader = BufReader::new(file.take(head_limit as u64));
    let mut line = String::new();
    for _ in 0..MAX_HEAD_LINES {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed reading session file head"
                );
                break;
            }
        }
        let Some(event) = parse_line(line.trim()) else {
            continue;
        };
        if let EventKind::SessionStart(start) = event.kind {
            return Some(SessionLogFile {
                path: path.to_path_buf(),
                session_id: start.session_id,
                created_at: event.timestamp,
                cwd: start.cwd,
                model: start.model,
            });
        }
    }

    Some(fallback)
}
