//! Message channel errors.

use std::time::Duration;

use serde_json::Value;

/// Errors from the message channel.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The peer sent a line that is not a valid protocol message. The
    /// channel is unusable after this.
    #[error("Protocol fault: {0}")]
    ProtocolFault(String),

    /// The peer closed its write side, or the channel was disposed.
    #[error("Channel closed")]
    ChannelClosed,

    /// No response arrived within the deadline.
    #[error("Timed out after {0:?} waiting for response")]
    Timeout(Duration),

    /// The peer answered the request with an error object.
    #[error("Remote error {code}: {message}")]
    Remote {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    #[error("Failed to encode message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RpcError::ProtocolFault("unparseable line".to_string());
        assert_eq!(err.to_string(), "Protocol fault: unparseable line");

        let err = RpcError::Remote {
            code: -32601,
            message: "method not supported".to_string(),
            data: None,
        };
        assert!(err.to_string().contains("-32601"));

        let err = RpcError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
