//! Bidirectional message channel over a byte stream pair.
//!
//! A single background task owns the pending-request table and the write
//! half. Callers talk to it over a command queue, so a request is always
//! registered before its frame reaches the wire and a response can never
//! race its own registration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::error::RpcError;
use super::message::{ChannelOptions, InboundFrame, RpcErrorObject, RpcNotification, RpcRequest, RpcResponse};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Answers requests initiated by the peer.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, method: &str, params: Value) -> Result<Value, RpcErrorObject>;
}

enum Command {
    Call {
        id: i64,
        frame: String,
        respond: oneshot::Sender<Result<Value, RpcError>>,
    },
    Notify {
        frame: String,
        done: oneshot::Sender<Result<(), RpcError>>,
    },
    Forget {
        id: i64,
    },
}

/// A bidirectional channel speaking one JSON object per line.
///
/// Outbound requests are correlated with inbound responses by integer
/// id. Inbound notifications fan out to [`subscribe`](Self::subscribe)rs;
/// a slow subscriber loses its oldest buffered notifications rather
/// than stalling the channel. A malformed inbound line is fatal: every
/// pending and future call fails with [`RpcError::ProtocolFault`].
pub struct MessageChannel {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<RpcNotification>,
    next_id: AtomicI64,
    version: Option<String>,
    fault: Arc<OnceLock<String>>,
    cancel: CancellationToken,
}

impl MessageChannel {
    /// Attach a channel to a read/write stream pair and start its
    /// background task. `handler` answers peer-initiated requests; with
    /// no handler every peer request gets a method-not-supported error.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        options: ChannelOptions,
        handler: Option<Arc<dyn RequestHandler>>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (notifications, _) = broadcast::channel(options.notification_capacity.max(1));
        let fault = Arc::new(OnceLock::new());
        let cancel = CancellationToken::new();

        let version = options.version();
        tokio::spawn(channel_loop(ChannelTask {
            reader,
            writer,
            command_rx,
            notifications: notifications.clone(),
            handler,
            fault: Arc::clone(&fault),
            cancel: cancel.clone(),
            version: version.clone(),
        }));

        Self {
            commands,
            notifications,
            next_id: AtomicI64::new(1),
            version,
            fault,
            cancel,
        }
    }

    /// Send a request and wait for its response with the default
    /// deadline.
    ///
    /// # Errors
    ///
    /// See [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with_timeout(method, params, DEFAULT_CALL_TIMEOUT)
            .await
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Timeout`] when no response arrives in time,
    /// [`RpcError::Remote`] when the peer answers with an error object,
    /// [`RpcError::ProtocolFault`] once the channel has faulted, and
    /// [`RpcError::ChannelClosed`] after EOF or disposal.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        if let Some(reason) = self.fault.get() {
            return Err(RpcError::ProtocolFault(reason.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&RpcRequest {
            jsonrpc: self.version.clone(),
            id,
            method: method.to_string(),
            params,
        })?;

        let (respond, rx) = oneshot::channel();
        self.commands
            .send(Command::Call { id, frame, respond })
            .await
            .map_err(|_| self.closed_error())?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => {
                // Best effort: the response, if it ever comes, is stale.
                let _ = self.commands.try_send(Command::Forget { id });
                Err(RpcError::Timeout(timeout))
            }
        }
    }

    /// Send a notification. No response is expected or awaited.
    ///
    /// # Errors
    ///
    /// Fails only when the frame cannot be encoded or written.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        if let Some(reason) = self.fault.get() {
            return Err(RpcError::ProtocolFault(reason.clone()));
        }

        let frame = serde_json::to_string(&RpcNotification {
            jsonrpc: self.version.clone(),
            method: method.to_string(),
            params,
        })?;

        let (done, rx) = oneshot::channel();
        self.commands
            .send(Command::Notify { frame, done })
            .await
            .map_err(|_| self.closed_error())?;
        rx.await.map_err(|_| self.closed_error())?
    }

    /// Subscribe to inbound notifications from this point on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RpcNotification> {
        self.notifications.subscribe()
    }

    /// True once a malformed inbound line has poisoned the channel.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.fault.get().is_some()
    }

    /// Shut the channel down. Pending calls fail with
    /// [`RpcError::ChannelClosed`].
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    fn closed_error(&self) -> RpcError {
        match self.fault.get() {
            Some(reason) => RpcError::ProtocolFault(reason.clone()),
            None => RpcError::ChannelClosed,
        }
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ChannelTask<R, W> {
    reader: R,
    writer: W,
    command_rx: mpsc::Receiver<Command>,
    notifications: broadcast::Sender<RpcNotification>,
    handler: Option<Arc<dyn RequestHandler>>,
    fault: Arc<OnceLock<String>>,
    cancel: CancellationToken,
    version: Option<String>,
}

async fn channel_loop<R, W>(task: ChannelTask<R, W>)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let ChannelTask {
        reader,
        mut writer,
        mut command_rx,
        notifications,
        handler,
        fault,
        cancel,
        version,
    } = task;

    let mut lines = BufReader::new(reader).lines();
    let mut pending: HashMap<i64, oneshot::Sender<Result<Value, RpcError>>> = HashMap::new();

    loop {
        tokio::select! {
            // Commands first, so a Call is registered before any read
            // that could carry its response.
            biased;

            () = cancel.cancelled() => {
                fail_pending(&mut pending, || RpcError::ChannelClosed);
                break;
            }

            command = command_rx.recv() => match command {
                Some(Command::Call { id, frame, respond }) => {
                    pending.insert(id, respond);
                    if let Err(e) = write_frame(&mut writer, &frame).await {
                        if let Some(tx) = pending.remove(&id) {
                            let _ = tx.send(Err(RpcError::Io(e)));
                        }
                    }
                }
                Some(Command::Notify { frame, done }) => {
                    let result = write_frame(&mut writer, &frame)
                        .await
                        .map_err(RpcError::Io);
                    let _ = done.send(result);
                }
                Some(Command::Forget { id }) => {
                    pending.remove(&id);
                }
                None => {
                    fail_pending(&mut pending, || RpcError::ChannelClosed);
                    break;
                }
            },

            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match InboundFrame::classify(&line) {
                    Ok(frame) => {
                        dispatch_inbound(
                            frame,
                            &mut pending,
                            &notifications,
                            handler.as_deref(),
                            &mut writer,
                            version.as_deref(),
                        )
                        .await;
                    }
                    Err(reason) => {
                        tracing::error!(reason, "Protocol fault on message channel");
                        let _ = fault.set(reason.clone());
                        fail_pending(&mut pending, || RpcError::ProtocolFault(reason.clone()));
                        break;
                    }
                },
                Ok(None) => {
                    tracing::debug!("Message channel peer closed its stream");
                    fail_pending(&mut pending, || RpcError::ChannelClosed);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read error on message channel");
                    fail_pending(&mut pending, || RpcError::ChannelClosed);
                    break;
                }
            },
        }
    }
}

async fn dispatch_inbound<W>(
    frame: InboundFrame,
    pending: &mut HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>,
    notifications: &broadcast::Sender<RpcNotification>,
    handler: Option<&dyn RequestHandler>,
    writer: &mut W,
    version: Option<&str>,
) where
    W: AsyncWrite + Unpin,
{
    match frame {
        InboundFrame::Response { id, result } => match pending.remove(&id) {
            Some(tx) => {
                let result = result.map_err(|error| RpcError::Remote {
                    code: error.code,
                    message: error.message,
                    data: error.data,
                });
                let _ = tx.send(result);
            }
            None => {
                tracing::debug!(id, "Dropping response with no matching request");
            }
        },
        InboundFrame::Unmatched { id } => {
            tracing::debug!(id = %id, "Dropping response with unmatchable id");
        }
        InboundFrame::Request { id, method, params } => {
            let result = match handler {
                Some(handler) => handler.handle(&method, params).await,
                None => Err(RpcErrorObject::new(
                    RpcErrorObject::METHOD_NOT_FOUND,
                    format!("method not supported: {method}"),
                )),
            };
            let response = RpcResponse {
                jsonrpc: version.map(str::to_string),
                id,
                result: result.as_ref().ok().cloned(),
                error: result.err(),
            };
            match serde_json::to_string(&response) {
                Ok(frame) => {
                    if let Err(e) = write_frame(writer, &frame).await {
                        tracing::warn!(error = %e, "Failed to write response frame");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode response frame");
                }
            }
        }
        InboundFrame::Notification(note) => {
            // Errors here mean nobody is subscribed, which is fine.
            let _ = notifications.send(note);
        }
    }
}

fn fail_pending(
    pending: &mut HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>,
    error: impl Fn() -> RpcError,
) {
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(error()));
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
