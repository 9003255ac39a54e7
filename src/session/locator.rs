//! Session file discovery.
//!
//! Maps a logical session identity (id, "newest after time T", or a
//! filter) to concrete rollout file paths under the sessions root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::SessionsConfig;

use super::error::LocatorError;
use super::list::{read_session_head, SessionFilter, SessionLogFile};
use super::pattern::{is_rollout_file, RolloutFileName};

/// Buffered metadata entries between the listing task and its consumer.
const LIST_CHANNEL_CAPACITY: usize = 32;

/// Locates rollout files under a date-partitioned sessions root.
#[derive(Debug, Clone)]
pub struct SessionLocator {
    config: SessionsConfig,
}

impl SessionLocator {
    /// Create a locator for the configured sessions root.
    #[must_use]
    pub fn new(config: SessionsConfig) -> Self {
        Self { config }
    }

    /// The sessions root directory.
    #[must_use]
    pub fn sessions_root(&self) -> &Path {
        &self.config.sessions_root
    }

    /// Find the rollout file for a session id.
    ///
    /// Enumeration order is deterministic (sorted directory entries); when
    /// several files encode the same id the earliest match wins and the
    /// ambiguity is logged.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::SessionNotFound`] when no file encodes the
    /// id, or [`LocatorError::RootNotFound`] when the sessions root is
    /// missing.
    pub async fn find_by_id(&self, session_id: &str) -> Result<PathBuf, LocatorError> {
        let files = collect_rollout_files(self.sessions_root()).await?;

        let mut matches = files.into_iter().filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(RolloutFileName::parse)
                .is_some_and(|parsed| parsed.session_id == session_id)
        });

        let Some(first) = matches.next() else {
            return Err(LocatorError::SessionNotFound(session_id.to_string()));
        };
        let extra = matches.count();
        if extra > 0 {
            tracing::warn!(
                session_id,
                path = %first.display(),
                additional_matches = extra,
                "Multiple rollout files encode the same session id, using earliest"
            );
        }
        Ok(first)
    }

    /// Find the newest rollout file by its embedded timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions root is missing or unreadable.
    pub async fn find_latest(&self) -> Result<Option<PathBuf>, LocatorError> {
        let files = collect_rollout_files(self.sessions_root()).await?;
        Ok(files
            .into_iter()
            .filter_map(|path| {
                let parsed = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(RolloutFileName::parse)?;
                Some((parsed.timestamp, path))
            })
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, path)| path))
    }

    /// Wait for a rollout file that did not exist when the call started.
    ///
    /// Snapshots the existing files first, then polls until a file outside
    /// the snapshot with creation time >= `after` appears; ties are broken
    /// by earliest creation time. The snapshot is what keeps a
    /// slow-to-attach caller from picking up a stale, pre-existing session
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Timeout`] if no qualifying file appears in
    /// time, or [`LocatorError::Cancelled`] if `cancel` fires first.
    pub async fn wait_for_new_file(
        &self,
        after: DateTime<Utc>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, LocatorError> {
        let snapshot: HashSet<PathBuf> = collect_rollout_files(self.sessions_root())
            .await?
            .into_iter()
            .collect();

        let poll = self.config.poll_interval();
        let wait = async {
            loop {
                let candidate = collect_rollout_files(self.sessions_root())
                    .await?
                    .into_iter()
                    .filter(|path| !snapshot.contains(path))
                    .filter_map(|path| {
                        let created = file_creation_time(&path)?;
                        (created >= after).then_some((created, path))
                    })
                    .min_by_key(|(created, _)| *created);

                if let Some((_, path)) = candidate {
                    return Ok(path);
                }

                tokio::select! {
                    () = cancel.cancelled() => return Err(LocatorError::Cancelled),
                    () = tokio::time::sleep(poll) => {}
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(LocatorError::Timeout(timeout)),
        }
    }

    /// Poll [`Self::find_by_id`] until the session appears.
    ///
    /// `SessionNotFound` is retried on the configured poll interval; any
    /// other error is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Timeout`] if the session does not appear in
    /// time, or [`LocatorError::Cancelled`] if `cancel` fires first.
    pub async fn wait_for_session(
        &self,
        session_id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, LocatorError> {
        let poll = self.config.poll_interval();
        let wait = async {
            loop {
                match self.find_by_id(session_id).await {
                    Ok(path) => return Ok(path),
                    Err(LocatorError::SessionNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                tokio::select! {
                    () = cancel.cancelled() => return Err(LocatorError::Cancelled),
                    () = tokio::time::sleep(poll) => {}
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(LocatorError::Timeout(timeout)),
        }
    }

    /// Confirm the file exists and is openable for read.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::SessionNotFound`] or
    /// [`LocatorError::AccessDenied`].
    pub async fn validate(path: &Path) -> Result<PathBuf, LocatorError> {
        match tokio::fs::File::open(path).await {
            Ok(_) => Ok(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LocatorError::SessionNotFound(path.display().to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(LocatorError::AccessDenied(path.to_path_buf()))
            }
            Err(e) => Err(LocatorError::Io(e)),
        }
    }

    /// Enumerate session metadata matching a filter, lazily.
    ///
    /// Each file contributes only a bounded head read; unreadable or
    /// unparseable files are skipped with a warning and never abort the
    /// listing. A missing sessions root is fatal and reported immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions root is missing or the filter
    /// pattern is invalid.
    pub async fn list_sessions(
        &self,
        filter: SessionFilter,
        cancel: CancellationToken,
    ) -> Result<ReceiverStream<SessionLogFile>, LocatorError> {
        let compiled = filter.compile()?;
        if !self.sessions_root().is_dir() {
            return Err(LocatorError::RootNotFound(self.sessions_root().to_path_buf()));
        }

        let root = self.sessions_root().to_path_buf();
        let head_limit = self.config.head_read_limit;
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let files = match collect_rollout_files(&root).await {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Session listing aborted");
                    return;
                }
            };
            for path in files {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(meta) = read_session_head(&path, head_limit).await else {
                    continue;
                };
                if !compiled.matches(&meta) {
                    continue;
                }
                if tx.send(meta).await.is_err() {
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Walk the sessions root depth-first with sorted entries.
///
/// Only a missing root is fatal; unreadable subdirectories are skipped
/// with a warning.
pub(crate) async fn collect_rollout_files(root: &Path) -> Result<Vec<PathBuf>, LocatorError> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(LocatorError::RootNotFound(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LocatorError::RootNotFound(root.to_path_buf()));
        }
        Err(e) => return Err(LocatorError::Io(e)),
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            entries.push(entry.path());
        }
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            if path.is_dir() {
                subdirs.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_rollout_file)
            {
                files.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in ascending order.
        for sub in subdirs.into_iter().rev() {
            stack.push(sub);
        }
    }

    Ok(files)
}

/// Creation time for a rollout file.
///
/// The filename-embedded timestamp is authoritative; filesystem metadata
/// is the fallback for files that somehow match the pattern without a
/// parseable timestamp.
fn file_creation_time(path: &Path) -> Option<DateTime<Utc>> {
    if let Some(parsed) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(RolloutFileName::parse)
    {
        return Some(parsed.timestamp);
    }
    let meta = std::fs::metadata(path).ok()?;
    let created = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::<Utc>::from(created))
}
