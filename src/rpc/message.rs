//! Wire message types for the newline-delimited JSON channel.
//!
//! One JSON object per line in both directions. Inbound lines classify
//! by shape: `id` plus `method` is a peer request, `id` alone is a
//! response to one of ours, `method` alone is a notification, and
//! anything else is a protocol fault.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outbound request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: i64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// A response frame, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

/// A notification frame. No id, no response expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// The error object carried inside an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;

    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Channel tuning knobs.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Stamp `"jsonrpc": "2.0"` on outbound frames.
    pub include_version: bool,
    /// Notification fan-out buffer per subscriber. When a subscriber
    /// falls behind, its oldest buffered notifications are dropped.
    pub notification_capacity: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            include_version: true,
            notification_capacity: 256,
        }
    }
}

impl ChannelOptions {
    pub(crate) fn version(&self) -> Option<String> {
        self.include_version.then(|| "2.0".to_string())
    }
}

/// One classified inbound line.
#[derive(Debug)]
pub(crate) enum InboundFrame {
    /// A peer-initiated request we must answer.
    Request { id: Value, method: String, params: Value },
    /// A response to one of our requests.
    Response {
        id: i64,
        result: Result<Value, RpcErrorObject>,
    },
    /// A response whose id can never match an outstanding call (we only
    /// issue integer ids). Logged and dropped, never fatal.
    Unmatched { id: Value },
    /// A fire-and-forget notification.
    Notification(RpcNotification),
}

impl InboundFrame {
    /// Classify one inbound line.
    ///
    /// Only an unparseable line or an object with neither `id` nor
    /// `method` is a protocol fault, reported as `Err` with a
    /// description of what was wrong. A response whose id cannot match
    /// any call we issued classifies as [`InboundFrame::Unmatched`].
    pub(crate) fn classify(line: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| format!("unparseable line: {e}"))?;
        if !value.is_object() {
            return Err("line is not a JSON object".to_string());
        }

        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (has_id, method) {
            (true, Some(method)) => Ok(Self::Request {
                id: value.get("id").cloned().unwrap_or(Value::Null),
                method,
                params: value.get("params").cloned().unwrap_or(Value::Null),
            }),
            (true, None) => {
                let response: RpcResponse = serde_json::from_value(value)
                    .map_err(|e| format!("malformed response frame: {e}"))?;
                let Some(id) = response.id.as_i64() else {
                    return Ok(Self::Unmatched { id: response.id });
                };
                let result = match response.error {
                    Some(error) => Err(error),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                Ok(Self::Response { id, result })
            }
            (false, Some(method)) => Ok(Self::Notification(RpcNotification {
                jsonrpc: None,
                method,
                params: value.get("params").cloned().unwrap_or(Value::Null),
            })),
            (false, None) => Err("object has neither id nor method".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_response() {
        let frame = InboundFrame::classify(r#"{"id":7,"result":{"ok":true}}"#).unwrap();
        let InboundFrame::Response { id, result } = frame else {
            panic!("Expected response");
        };
        assert_eq!(id, 7);
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_classify_error_response() {
        let frame =
            InboundFrame::classify(r#"{"id":3,"error":{"code":-1,"message":"nope"}}"#).unwrap();
        let InboundFrame::Response { result, .. } = frame else {
            panic!("Expected response");
        };
        assert_eq!(result.unwrap_err().code, -1);
    }

    #[test]
    fn test_classify_request_and_notification() {
        let frame =
            InboundFrame::classify(r#"{"id":1,"method":"ping","params":{}}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Request { ref method, .. } if method == "ping"));

        let frame = InboundFrame::classify(r#"{"method":"status","params":{"n":1}}"#).unwrap();
        let InboundFrame::Notification(note) = frame else {
            panic!("Expected notification");
        };
        assert_eq!(note.method, "status");
        assert_eq!(note.params, json!({"n": 1}));
    }

    #[test]
    fn test_classify_faults() {
        assert!(InboundFrame::classify("not json").is_err());
        assert!(InboundFrame::classify("[1,2]").is_err());
        assert!(InboundFrame::classify(r#"{"neither":"nor"}"#).is_err());
    }

    #[test]
    fn test_classify_non_integer_id_response_is_droppable() {
        let frame = InboundFrame::classify(r#"{"id":"sub-1","result":1}"#).unwrap();
        let InboundFrame::Unmatched { id } = frame else {
            panic!("Expected Unmatched, got {frame:?}");
        };
        assert_eq!(id, json!("sub-1"));

        let frame = InboundFrame::classify(r#"{"id":2.5,"error":{"code":-1,"message":"x"}}"#)
            .unwrap();
        assert!(matches!(frame, InboundFrame::Unmatched { .. }));
    }

    #[test]
    fn test_request_serialization_with_version() {
        let request = RpcRequest {
            jsonrpc: Some("2.0".to_string()),
            id: 1,
            method: "interrupt".to_string(),
            params: Value::Null,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert!(json.get("params").is_none());

        let bare = RpcRequest {
            jsonrpc: None,
            id: 2,
            method: "interrupt".to_string(),
            params: json!({"force": true}),
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("jsonrpc").is_none());
        assert_eq!(json["params"]["force"], true);
    }
}
