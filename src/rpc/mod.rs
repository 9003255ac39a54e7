//! Newline-delimited JSON message channel.

mod channel;
mod error;
mod message;

pub use channel::{MessageChannel, RequestHandler};
pub use error::RpcError;
pub use message::{ChannelOptions, RpcErrorObject, RpcNotification, RpcRequest, RpcResponse};
