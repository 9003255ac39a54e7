//! Conversation-level tests for the message channel over an in-memory
//! stream pair.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use rollout_stream::rpc::{
    ChannelOptions, MessageChannel, RequestHandler, RpcError, RpcErrorObject,
};

/// Minimal scripted peer: answers every request by method name and can
/// push notifications in between.
async fn run_peer(
    reader: tokio::io::ReadHalf<tokio::io::DuplexStream>,
    mut writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    requests_to_serve: usize,
) {
    let mut lines = BufReader::new(reader).lines();
    let mut served = 0;
    while served < requests_to_serve {
        let Ok(Some(line)) = lines.next_line().await else {
            return;
        };
        let frame: Value = serde_json::from_str(&line).unwrap();
        let Some(id) = frame.get("id").and_then(Value::as_i64) else {
            continue; // notification from the client, nothing to answer
        };
        let method = frame["method"].as_str().unwrap().to_string();

        // Interleave a notification before each reply.
        let note = json!({"method": "turn/progress", "params": {"served": served}});
        writer
            .write_all(format!("{note}\n").as_bytes())
            .await
            .unwrap();

        let reply = match method.as_str() {
            "thread/interrupt" => json!({"id": id, "result": {"interrupted": true}}),
            "thread/status" => json!({"id": id, "result": {"state": "running"}}),
            _ => json!({"id": id, "error": {"code": -32601, "message": "unknown"}}),
        };
        writer
            .write_all(format!("{reply}\n").as_bytes())
            .await
            .unwrap();
        served += 1;
    }
}

#[tokio::test]
async fn test_conversation_with_interleaved_notifications() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (server_read, server_write) = tokio::io::split(server_io);

    let channel =
        MessageChannel::connect(client_read, client_write, ChannelOptions::default(), None);
    let mut notes = channel.subscribe();
    let peer = tokio::spawn(run_peer(server_read, server_write, 2));

    let status = channel.call("thread/status", Value::Null).await.unwrap();
    assert_eq!(status["state"], "running");

    let interrupted = channel
        .call("thread/interrupt", json!({"reason": "user"}))
        .await
        .unwrap();
    assert_eq!(interrupted["interrupted"], true);

    // Both notifications arrived alongside the replies, in order.
    let first = notes.recv().await.unwrap();
    assert_eq!(first.method, "turn/progress");
    assert_eq!(first.params["served"], 0);
    let second = notes.recv().await.unwrap();
    assert_eq!(second.params["served"], 1);

    peer.await.unwrap();
}

#[tokio::test]
async fn test_client_answers_peer_requests_via_handler() {
    struct Approvals;

    #[async_trait]
    impl RequestHandler for Approvals {
        async fn handle(&self, method: &str, params: Value) -> Result<Value, RpcErrorObject> {
            match method {
                "approval/request" => Ok(json!({"decision": "allow", "for": params["tool"]})),
                other => Err(RpcErrorObject::new(
                    RpcErrorObject::METHOD_NOT_FOUND,
                    format!("method not supported: {other}"),
                )),
            }
        }
    }

    let (client_io, server_io) = tokio::io::duplex(4096);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (server_read, mut server_write) = tokio::io::split(server_io);

    let _channel = MessageChannel::connect(
        client_read,
        client_write,
        ChannelOptions::default(),
        Some(Arc::new(Approvals)),
    );
    let mut server_reader = BufReader::new(server_read);

    server_write
        .write_all(b"{\"id\":11,\"method\":\"approval/request\",\"params\":{\"tool\":\"shell\"}}\n")
        .await
        .unwrap();
    let mut line = String::new();
    server_reader.read_line(&mut line).await.unwrap();
    let reply: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["id"], 11);
    assert_eq!(reply["result"]["decision"], "allow");
    assert_eq!(reply["result"]["for"], "shell");

    server_write
        .write_all(b"{\"id\":12,\"method\":\"no/such/method\"}\n")
        .await
        .unwrap();
    line.clear();
    server_reader.read_line(&mut line).await.unwrap();
    let reply: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["error"]["code"], RpcErrorObject::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_protocol_fault_poisons_the_channel() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (_server_read, mut server_write) = tokio::io::split(server_io);

    let channel =
        MessageChannel::connect(client_read, client_write, ChannelOptions::default(), None);

    let (pending, ()) = tokio::join!(
        channel.call_with_timeout("thread/status", Value::Null, Duration::from_secs(5)),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            // An object with neither id nor method is unclassifiable.
            server_write
                .write_all(b"{\"weird\":\"frame\"}\n")
                .await
                .unwrap();
        }
    );
    assert!(matches!(pending.unwrap_err(), RpcError::ProtocolFault(_)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(channel.is_faulted());
    assert!(matches!(
        channel.call("thread/status", Value::Null).await.unwrap_err(),
        RpcError::ProtocolFault(_)
    ));
    assert!(matches!(
        channel.notify("log", Value::Null).await.unwrap_err(),
        RpcError::ProtocolFault(_)
    ));
}

#[tokio::test]
async fn test_dispose_fails_pending_calls() {
    let (client_io, _server_io) = tokio::io::duplex(4096);
    let (client_read, client_write) = tokio::io::split(client_io);

    let channel =
        MessageChannel::connect(client_read, client_write, ChannelOptions::default(), None);

    let (pending, ()) = tokio::join!(
        channel.call_with_timeout("thread/status", Value::Null, Duration::from_secs(5)),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            channel.dispose();
        }
    );
    assert!(matches!(pending.unwrap_err(), RpcError::ChannelClosed));
}

#[tokio::test]
async fn test_slow_subscriber_drops_oldest_notifications() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (_server_read, mut server_write) = tokio::io::split(server_io);

    let options = ChannelOptions {
        notification_capacity: 4,
        ..Default::default()
    };
    let channel = MessageChannel::connect(client_read, client_write, options, None);
    let mut notes = channel.subscribe();

    for n in 0..10 {
        let frame = format!("{{\"method\":\"tick\",\"params\":{{\"n\":{n}}}}}\n");
        server_write.write_all(frame.as_bytes()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The buffer kept only the newest 4; the lag is reported once, then
    // delivery resumes from the oldest retained notification.
    match notes.recv().await {
        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
            assert_eq!(missed, 6);
        }
        other => panic!("Expected lag report, got {other:?}"),
    }
    let next = notes.recv().await.unwrap();
    assert_eq!(next.params["n"], 6);
}
