//! Shared utilities for integration tests.
//!
//! Provides an in-memory WebSocket pair and a scripted fake service:
//! - `socket_pair` links a client and server socket over a duplex pipe
//! - `FakeServer` sends frames and reads what the client wrote
//! - `open` completes the `hello` handshake and returns both ends

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use interactive_rpc::{Codec, Connection, ConnectionOptions, GzipCodec};
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Socket Pair
// ============================================================================

/// Builds a connected client/server WebSocket pair over an in-memory pipe.
pub async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 20);

    let (client, server) = tokio::join!(
        async {
            tokio_tungstenite::client_async("ws://localhost/gameClient", client_stream)
                .await
                .expect("client handshake failed")
                .0
        },
        async {
            tokio_tungstenite::accept_async(server_stream)
                .await
                .expect("server handshake failed")
        }
    );

    (client, server)
}

/// Opens a session with default options.
pub async fn open() -> (Connection, FakeServer) {
    open_with(ConnectionOptions::new()).await
}

/// Opens a session, sending `hello` before anything else.
pub async fn open_with(options: ConnectionOptions) -> (Connection, FakeServer) {
    let (client, server) = socket_pair().await;
    let mut server = FakeServer { ws: server };
    server.send(hello()).await;

    let connection = Connection::with_socket(client, &options)
        .await
        .expect("session handshake failed");

    (connection, server)
}

// ============================================================================
// Frames
// ============================================================================

pub fn hello() -> Value {
    json!({"type": "method", "method": "hello", "params": {}})
}

pub fn method(name: &str, params: Value) -> Value {
    json!({"type": "method", "method": name, "params": params})
}

pub fn reply(id: &Value, result: Value) -> Value {
    json!({"type": "reply", "id": id, "result": result})
}

pub fn reply_error(id: &Value, error: Value) -> Value {
    json!({"type": "reply", "id": id, "error": error})
}

// ============================================================================
// FakeServer
// ============================================================================

/// Server end of a session, driven by the test.
pub struct FakeServer {
    pub ws: WebSocketStream<DuplexStream>,
}

impl FakeServer {
    /// Sends a JSON value as a text message.
    pub async fn send(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("server send failed");
    }

    /// Sends raw bytes as a binary message.
    pub async fn send_binary(&mut self, data: Vec<u8>) {
        self.ws
            .send(Message::Binary(data.into()))
            .await
            .expect("server send failed");
    }

    /// Sends a JSON value as a gzip-compressed binary message.
    pub async fn send_gzip(&mut self, value: Value) {
        let payload = GzipCodec::default()
            .encode(&value.to_string())
            .expect("gzip encode failed");

        match payload {
            interactive_rpc::WirePayload::Binary(data) => self.send_binary(data).await,
            interactive_rpc::WirePayload::Text(_) => panic!("gzip produced a text payload"),
        }
    }

    /// Reads the next frame written by the client.
    ///
    /// Binary messages are gunzipped first.
    pub async fn recv(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for client frame")
                .expect("client socket ended")
                .expect("server read failed");

            let text = match message {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Binary(data) => GzipCodec::default()
                    .decode(&data)
                    .expect("client sent undecodable binary frame"),
                Message::Close(_) => panic!("client closed the socket"),
                _ => continue,
            };

            return serde_json::from_str(&text).expect("client sent invalid JSON");
        }
    }

    /// Reads the next client call and replies to it with `result`.
    ///
    /// Returns the call frame.
    pub async fn answer(&mut self, result: Value) -> Value {
        let call = self.recv().await;
        self.send(reply(&call["id"], result)).await;
        call
    }

    /// Closes the server end.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Waits until the connection has queued at least `count` calls.
pub async fn wait_for_queue(connection: &Connection, count: usize) {
    tokio::time::timeout(WAIT, async {
        while connection.queued_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for queued calls");
}

/// Initializes test logging once; honors `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
