//! Incremental transcript tailer.
//!
//! Reads a growing JSONL file concurrently with its writer, resuming from
//! an arbitrary position. Growth detection is polling-based by design:
//! filesystem-notification APIs deliver unreliable partial-write events
//! across platforms, while a bounded poll interval is portable and
//! deterministic to test.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::error::TailError;
use super::position::{StreamPosition, TailOptions};

/// Buffered lines between the tail task and its consumer.
const TAIL_CHANNEL_CAPACITY: usize = 256;

/// One non-empty text line read from a transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// The line text, without the trailing newline.
    pub text: String,
    /// Byte offset immediately after this line. Feeding it back as
    /// [`StreamPosition::ByteOffset`] resumes exactly after this line.
    pub offset: u64,
}

/// Incremental line reader that tracks its byte offset.
///
/// Each tailer owns its position exclusively; independent tailers on the
/// same file never affect each other.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
}

impl LogTailer {
    /// Create a tailer starting at the beginning of the file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    /// Create a tailer resuming at a byte offset.
    #[must_use]
    pub fn with_offset(path: PathBuf, offset: u64) -> Self {
        Self { path, offset }
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read newly appended complete lines since the last read.
    ///
    /// A trailing line without a newline is assumed to be a write in
    /// progress and is left for the next read, so a concurrent writer's
    /// partial line is never yielded. Blank lines are dropped silently.
    /// If the file shrank below the current offset it is treated as
    /// truncation: the offset resets to zero with a diagnostic.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was deleted, access is denied, or
    /// reading fails.
    pub async fn read_new_lines(&mut self) -> Result<Vec<RawLine>, TailError> {
        self.read_lines(false).await
    }

    /// Read everything up to the current end of file, including a final
    /// unterminated line. Used when a tail stops instead of following.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::read_new_lines`].
    pub async fn read_to_end(&mut self) -> Result<Vec<RawLine>, TailError> {
        self.read_lines(true).await
    }

    async fn read_lines(&mut self, include_partial: bool) -> Result<Vec<RawLine>, TailError> {
        let file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TailError::FileDeleted(self.path.clone()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(TailError::AccessDenied(self.path.clone()));
            }
            Err(e) => return Err(TailError::Io(e)),
        };

        let file_len = file.metadata().await?.len();
        if file_len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "File truncated, resetting offset to beginning"
            );
            self.offset = 0;
        }
        if file_len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = file;
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }
            if !line.ends_with('\n') && !include_partial {
                // Writer mid-line; retry on the next poll.
                break;
            }

            self.offset += bytes_read as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            lines.push(RawLine {
                text: trimmed.to_string(),
                offset: self.offset,
            });
        }

        Ok(lines)
    }
}

/// Tail a transcript file as a lazy, cancellable line stream.
///
/// Finite when `options.follow` is false, infinite (until cancelled)
/// otherwise. A read failure is yielded as the final `Err` item, so a
/// deleted file mid-follow is distinguishable from a clean end of
/// stream. Cancellation interrupts the poll sleep itself, not just the
/// next read attempt. Each call owns an independent read position;
/// cancelling one tail never affects other consumers of the same file.
#[must_use]
pub fn tail(
    path: PathBuf,
    position: StreamPosition,
    options: TailOptions,
    cancel: CancellationToken,
) -> ReceiverStream<Result<RawLine, TailError>> {
    let (tx, rx) = mpsc::channel(TAIL_CHANNEL_CAPACITY);
    let poll_interval = Duration::from_millis(options.poll_interval_ms);

    // End means end-at-call-time: resolve it before returning so a line
    // appended while the task spins up still gets yielded.
    let start = match position {
        StreamPosition::ByteOffset(offset) => offset,
        // Timestamp filtering happens in the event parser.
        StreamPosition::Beginning | StreamPosition::AfterTimestamp(_) => 0,
        StreamPosition::End => std::fs::metadata(&path).map_or(0, |meta| meta.len()),
    };

    tokio::spawn(async move {
        let mut tailer = LogTailer::with_offset(path, start);

        loop {
            let batch = if options.follow {
                tailer.read_new_lines().await
            } else {
                tailer.read_to_end().await
            };
            match batch {
                Ok(lines) => {
                    for raw in lines {
                        if tx.send(Ok(raw)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %tailer.path().display(),
                        error = %e,
                        "Tail terminated"
                    );
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }

            if !options.follow {
                return;
            }
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
    });

    ReceiverStream::new(rx)
}
