//! WebSocket connection and receive loop.
//!
//! This module handles the session socket: the `hello` handshake, call/reply
//! correlation, the receive queue and the active wire codec.
//!
//! # Receive Loop
//!
//! Once the handshake completes, the connection spawns a task that owns
//! the socket and handles:
//!
//! - Incoming messages (replies, method calls, batches of both)
//! - Outgoing frames queued by `send`, `call` and `reply`
//! - Codec fallback when a binary message cannot be decoded
//! - Shutdown on `close()` or when the socket ends

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{Codec, TextCodec, WirePayload};
use crate::error::{Error, Result};
use crate::identifiers::CallId;
use crate::protocol::{Frame, MethodFrame, ReplyFrame, parse_frames};

use super::call::Call;
use super::inbox::Inbox;
use super::options::ConnectionOptions;

// ============================================================================
// Types
// ============================================================================

/// Map of outbound call IDs to their pending entries.
type PendingMap = FxHashMap<CallId, PendingCall>;

/// An outbound call awaiting its reply.
struct PendingCall {
    /// Resolves the caller.
    tx: oneshot::Sender<Result<Value>>,
    /// Codec to install if the reply accepts its scheme.
    ///
    /// Installed by the receive loop before the next socket read, so
    /// frames sent right after the accepting reply decode correctly.
    install: Option<Arc<dyn Codec>>,
}

impl PendingCall {
    fn new(tx: oneshot::Sender<Result<Value>>) -> Self {
        Self { tx, install: None }
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle of a session socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket connect in progress.
    Connecting,
    /// Socket up, waiting for `hello`.
    Handshaking,
    /// Handshake complete, receive loop running.
    Open,
    /// Closed locally or by the remote side.
    Closed,
}

// ============================================================================
// Outbound
// ============================================================================

/// Internal commands for the receive loop.
enum Outbound {
    /// Write one encoded message.
    Message(Message),
    /// Close the socket and stop the loop.
    Shutdown,
}

/// Result of reading one WebSocket message.
enum Incoming {
    /// Decoded frames, in wire order.
    Frames(Vec<Frame>),
    /// Nothing to dispatch (control message, undecodable payload).
    Ignored,
    /// The remote side sent a close frame.
    Closed,
}

// ============================================================================
// Inner
// ============================================================================

/// State shared between connection handles, calls and the receive loop.
pub(crate) struct Inner {
    /// Channel for sending commands to the receive loop.
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    /// Outbound calls awaiting a reply.
    pending: Mutex<PendingMap>,
    /// Inbound calls awaiting delivery, plus the waiter slot.
    inbox: Mutex<Inbox<Call>>,
    /// Active wire codec.
    codec: RwLock<Arc<dyn Codec>>,
    /// Next outbound call id.
    call_counter: AtomicU64,
    /// Lifecycle state.
    state: Mutex<ConnectionState>,
    /// Default timeout for `call`.
    call_timeout: Duration,
    /// Runtime for the receive loop and helper tasks.
    runtime: Handle,
    /// Handle of the receive loop, taken by `close`.
    receive_task: Mutex<Option<JoinHandle<()>>>,
    /// Flips to `true` once the connection is closed.
    closed: watch::Sender<bool>,
}

impl Inner {
    fn new(
        outbound_tx: mpsc::UnboundedSender<Outbound>,
        call_timeout: Duration,
        runtime: Handle,
    ) -> Self {
        let codec: Arc<dyn Codec> = Arc::new(TextCodec);

        Self {
            outbound_tx,
            pending: Mutex::new(PendingMap::default()),
            inbox: Mutex::new(Inbox::default()),
            codec: RwLock::new(codec),
            call_counter: AtomicU64::new(0),
            state: Mutex::new(ConnectionState::Connecting),
            call_timeout,
            runtime,
            receive_task: Mutex::new(None),
            closed: watch::channel(false).0,
        }
    }

    #[inline]
    fn next_call_id(&self) -> CallId {
        CallId::new(self.call_counter.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    fn current_codec(&self) -> Arc<dyn Codec> {
        self.codec.read().clone()
    }

    #[inline]
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Encodes a frame with the active codec.
    ///
    /// Falls back to plain text if the codec fails.
    fn encode(self: &Arc<Self>, frame: &Frame) -> Result<Message> {
        let json = serde_json::to_string(frame)?;
        let codec = self.current_codec();

        let payload = match codec.encode(&json) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, codec = codec.name(), "Error encoding message, falling back to plain text");
                self.fallback_to_text();
                WirePayload::Text(json)
            }
        };

        Ok(match payload {
            WirePayload::Text(text) => Message::Text(text.into()),
            WirePayload::Binary(data) => Message::Binary(data.into()),
        })
    }

    /// Decodes a binary message with the active codec.
    ///
    /// Returns `None` and falls back to plain text if the codec fails.
    fn decode_binary(self: &Arc<Self>, data: &[u8]) -> Option<String> {
        let codec = self.current_codec();

        match codec.decode(data) {
            Ok(text) => Some(text),
            Err(e) => {
                info!(error = %e, codec = codec.name(), "Error decoding message, falling back to plain text");
                self.fallback_to_text();
                None
            }
        }
    }

    /// Switches to the text codec and asks the remote side to follow.
    ///
    /// The negotiation runs on its own task; its outcome is only logged.
    /// Calling this while already on the text codec does nothing.
    fn fallback_to_text(self: &Arc<Self>) {
        {
            let mut codec = self.codec.write();
            if codec.is_fallback() {
                return;
            }
            *codec = Arc::new(TextCodec);
        }

        let connection = Connection::from_inner(Arc::clone(self));
        self.runtime.spawn(async move {
            match connection.set_compression(TextCodec).await {
                Ok(true) => debug!("Remote switched back to plain text"),
                Ok(false) => warn!("Remote declined plain text fallback"),
                Err(e) => warn!(error = %e, "Plain text fallback negotiation failed"),
            }
        });
    }

    /// Turns one WebSocket message into frames.
    fn read_message(self: &Arc<Self>, message: Message) -> Incoming {
        let parsed = match message {
            Message::Text(text) => parse_frames(text.as_str()),
            Message::Binary(data) => match self.decode_binary(&data) {
                Some(text) => parse_frames(&text),
                None => return Incoming::Ignored,
            },
            Message::Close(frame) => {
                debug!(?frame, "WebSocket closed by remote");
                return Incoming::Closed;
            }
            // Ping, Pong and raw frames carry no application data
            _ => return Incoming::Ignored,
        };

        match parsed {
            Ok(frames) => Incoming::Frames(frames),
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                Incoming::Ignored
            }
        }
    }

    /// Routes one frame: replies resolve pending calls, everything else
    /// is queued for the pump.
    fn dispatch(self: &Arc<Self>, frame: Frame) {
        match frame {
            Frame::Reply(reply) => {
                let entry = self.pending.lock().remove(&reply.id);

                if let Some(PendingCall { tx, install }) = entry {
                    trace!(id = %reply.id, "Reply received");
                    let result = reply.into_result();

                    if let (Some(codec), Ok(value)) = (install, &result) {
                        self.install_codec(codec, value);
                    }
                    let _ = tx.send(result);
                } else {
                    debug!(id = %reply.id, "Dropping reply for unknown call");
                }
            }
            Frame::Method(method) => {
                trace!(method = %method.method, "Method received");
                let call = Call::new(Arc::downgrade(self), method);
                self.inbox.lock().push(call);
            }
        }
    }

    /// Switches to `codec` if the `setCompression` reply echoes its scheme.
    fn install_codec(&self, codec: Arc<dyn Codec>, reply: &Value) {
        let agreed = reply.get("scheme").and_then(Value::as_str);
        if agreed != Some(codec.name()) {
            debug!(requested = codec.name(), ?agreed, "Compression not accepted");
            return;
        }

        info!(scheme = codec.name(), "Compression negotiated");
        *self.codec.write() = codec;
    }

    /// Moves to `Closed`, wakes the waiter and fails pending calls.
    fn mark_closed(&self) {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }

        self.inbox.lock().close();

        let pending: Vec<_> = self.pending.lock().drain().collect();
        let count = pending.len();
        for (_, entry) in pending {
            let _ = entry.tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending calls on close");
        }
        self.closed.send_replace(true);
        info!("Connection closed");
    }
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket session with the interactive service.
///
/// Handles call/reply correlation, buffering of inbound calls and the
/// wire codec. Cloning yields another handle to the same session.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Locks are held only for short,
/// non-blocking sections and never across an await.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Rebuilds a handle from shared state.
    #[inline]
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Connects to the address in `options` and completes the handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Connection`] if the WebSocket connect fails
    /// - [`Error::ConnectionClosed`] if the socket closes before `hello`
    /// - [`Error::ConnectionTimeout`] if `hello` does not arrive in time
    pub async fn connect(options: &ConnectionOptions) -> Result<Self> {
        let request = options.request()?;
        let uri = request.uri().to_string();

        debug!(%uri, "Connecting");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect failed: {e}")))?;

        debug!(%uri, "WebSocket connection established");

        Self::with_socket(ws_stream, options).await
    }

    /// Opens a session over an already-connected WebSocket.
    ///
    /// The address and headers in `options` are ignored; timeouts and the
    /// runtime still apply.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the socket closes before `hello`
    /// - [`Error::ConnectionTimeout`] if `hello` does not arrive in time
    pub async fn with_socket<S>(
        mut ws_stream: WebSocketStream<S>,
        options: &ConnectionOptions,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let runtime = options.runtime_handle()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner::new(
            outbound_tx,
            options.get_call_timeout(),
            runtime.clone(),
        ));

        inner.set_state(ConnectionState::Handshaking);

        let handshake = Self::handshake(&inner, &mut ws_stream);
        let outcome = match options.get_handshake_timeout() {
            Some(limit) => timeout(limit, handshake)
                .await
                .unwrap_or_else(|_| Err(Error::connection_timeout(limit.as_millis() as u64))),
            None => handshake.await,
        };

        if let Err(e) = outcome {
            inner.mark_closed();
            return Err(e);
        }

        inner.set_state(ConnectionState::Open);
        info!(
            queued = inner.inbox.lock().len(),
            "Handshake completed"
        );

        let task = runtime.spawn(Self::run_receive_loop(
            ws_stream,
            outbound_rx,
            Arc::clone(&inner),
        ));
        *inner.receive_task.lock() = Some(task);

        Ok(Self { inner })
    }

    /// Reads frames until `hello`, queueing everything else.
    async fn handshake<S>(inner: &Arc<Inner>, ws_stream: &mut WebSocketStream<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let message = match ws_stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(Error::WebSocket(e)),
                None => return Err(Error::ConnectionClosed),
            };

            let frames = match inner.read_message(message) {
                Incoming::Frames(frames) => frames,
                Incoming::Ignored => continue,
                Incoming::Closed => return Err(Error::ConnectionClosed),
            };

            let mut hello_seen = false;
            for frame in frames {
                if !hello_seen && frame.is_hello() {
                    hello_seen = true;
                    continue;
                }
                inner.dispatch(frame);
            }

            if hello_seen {
                return Ok(());
            }
        }
    }

    /// Encodes and queues a frame for writing.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the receive loop has stopped
    /// - [`Error::Json`] if the frame cannot be serialized
    pub fn send(&self, frame: &Frame) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let message = self.inner.encode(frame)?;
        self.inner
            .outbound_tx
            .send(Outbound::Message(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Calls a method and waits for its reply with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the remote side replies with an error
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_with_timeout(method, params, self.inner.call_timeout)
            .await
    }

    /// Calls a method and waits for its reply with a custom timeout.
    ///
    /// # Arguments
    ///
    /// * `method` - Method name
    /// * `params` - Method parameters
    /// * `call_timeout` - Maximum time to wait for the reply
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the remote side replies with an error
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        call_timeout: Duration,
    ) -> Result<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.await_reply(method, params, call_timeout, PendingCall::new(reply_tx), reply_rx)
            .await
    }

    /// Registers `entry`, sends the call and waits for its reply.
    async fn await_reply(
        &self,
        method: &str,
        params: Value,
        call_timeout: Duration,
        entry: PendingCall,
        reply_rx: oneshot::Receiver<Result<Value>>,
    ) -> Result<Value> {
        let id = self.inner.next_call_id();

        // Register before sending so a fast reply cannot miss the entry
        self.inner.pending.lock().insert(id, entry);

        if let Err(e) = self.send(&MethodFrame::call(id, method, params).into()) {
            self.inner.pending.lock().remove(&id);
            return Err(e);
        }

        trace!(%id, method, "Call sent");

        match timeout(call_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                debug!(%id, method, "Call timed out");

                Err(Error::request_timeout(id, call_timeout.as_millis() as u64))
            }
        }
    }

    /// Sends a method without waiting for, or expecting, a reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed.
    pub fn call_discard(&self, method: &str, params: Value) -> Result<()> {
        // Discarded calls still consume a counter value
        let id = self.inner.next_call_id();
        self.send(&MethodFrame::discarded(method, params).into())?;

        trace!(%id, method, "Discarded call sent");
        Ok(())
    }

    /// Replies to a call received from the remote side.
    ///
    /// `Ok` is sent as `result`, `Err` as `error`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed.
    pub fn reply(&self, call_id: CallId, outcome: std::result::Result<Value, Value>) -> Result<()> {
        self.send(&ReplyFrame::from_outcome(call_id, outcome).into())
    }

    /// Pops the next queued call, or `None` if the queue is empty.
    #[inline]
    #[must_use]
    pub fn get_packet(&self) -> Option<Call> {
        self.inner.inbox.lock().pop()
    }

    /// Waits until a call is queued.
    ///
    /// Returns `true` when a call is available, `false` once the
    /// connection is closed and the queue is empty.
    pub async fn has_packet(&self) -> bool {
        let wait = self.inner.inbox.lock().wait();
        wait.resolve().await
    }

    /// Negotiates a wire codec with the remote side.
    ///
    /// Returns `true` and switches codec only if the server echoes the
    /// requested scheme; otherwise the active codec is left unchanged.
    /// The switch happens on the receive loop as the reply is read, so
    /// compressed frames that follow it are decoded with the new codec.
    ///
    /// # Errors
    ///
    /// Propagates call errors (timeout, RPC error, closed connection).
    pub async fn set_compression<C>(&self, codec: C) -> Result<bool>
    where
        C: Codec + 'static,
    {
        let scheme = codec.name().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        let entry = PendingCall {
            tx: reply_tx,
            install: Some(Arc::new(codec)),
        };

        let result = self
            .await_reply(
                "setCompression",
                json!({ "scheme": [scheme] }),
                self.inner.call_timeout,
                entry,
                reply_rx,
            )
            .await?;

        let agreed = result.get("scheme").and_then(Value::as_str);
        Ok(agreed == Some(scheme.as_str()))
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns `true` once the connection is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Returns the name of the active codec.
    #[inline]
    #[must_use]
    pub fn codec_name(&self) -> String {
        self.inner.codec.read().name().to_string()
    }

    /// Returns the number of calls awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns the number of received calls not yet drained.
    #[inline]
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.inner.inbox.lock().len()
    }

    /// Spawns a task on the session's runtime.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.runtime.spawn(future)
    }

    /// Closes the socket and waits for the receive loop to stop.
    ///
    /// Wakes a blocked [`has_packet`](Self::has_packet) with `false` and
    /// fails calls still awaiting a reply with [`Error::ConnectionClosed`].
    /// Concurrent calls from other handles return once the first one has
    /// finished closing.
    pub async fn close(&self) {
        let _ = self.inner.outbound_tx.send(Outbound::Shutdown);

        let task = self.inner.receive_task.lock().take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    warn!(error = %e, "Receive loop ended abnormally");
                }
            }
            None => {
                // Another handle owns the shutdown
                let mut closed = self.inner.closed.subscribe();
                let _ = closed.wait_for(|closed| *closed).await;
            }
        }

        self.inner.mark_closed();
    }

    /// Receive loop that owns the socket.
    async fn run_receive_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        inner: Arc<Inner>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming messages from the service
                message = ws_read.next() => {
                    match message {
                        Some(Ok(message)) => match inner.read_message(message) {
                            Incoming::Frames(frames) => {
                                for frame in frames {
                                    inner.dispatch(frame);
                                }
                            }
                            Incoming::Ignored => {}
                            Incoming::Closed => break,
                        },

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }
                    }
                }

                // Frames queued by the API
                command = outbound_rx.recv() => {
                    match command {
                        Some(Outbound::Message(message)) => {
                            if let Err(e) = ws_write.send(message).await {
                                error!(error = %e, "Failed to write message");
                                break;
                            }
                        }

                        Some(Outbound::Shutdown) | None => {
                            debug!("Shutdown requested");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        inner.mark_closed();
        debug!("Receive loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::DuplexStream;

    async fn socket_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client_stream, server_stream) = tokio::io::duplex(65536);

        let (client, server) = tokio::join!(
            async {
                tokio_tungstenite::client_async("ws://localhost/", client_stream)
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

    async fn send_text(server: &mut WebSocketStream<DuplexStream>, value: Value) {
        server
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("server send");
    }

    #[tokio::test]
    async fn test_socket_closed_before_hello() {
        let (client, mut server) = socket_pair().await;
        tokio::spawn(async move {
            send_text(&mut server, json!({"type": "method", "method": "early"})).await;
            let _ = server.close(None).await;
        });

        let result = Connection::with_socket(client, &ConnectionOptions::new()).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (client, _server) = socket_pair().await;
        let options = ConnectionOptions::new().handshake_timeout(Duration::from_millis(50));

        let result = Connection::with_socket(client, &options).await;
        assert!(matches!(result, Err(Error::ConnectionTimeout { timeout_ms: 50 })));
    }

    #[tokio::test]
    async fn test_open_after_hello() {
        let (client, mut server) = socket_pair().await;
        send_text(&mut server, json!({"type": "method", "method": "hello", "params": {}})).await;

        let connection = Connection::with_socket(client, &ConnectionOptions::new())
            .await
            .expect("handshake");

        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(connection.codec_name(), "text");
        assert_eq!(connection.queued_count(), 0);
        assert_eq!(connection.pending_count(), 0);

        connection.close().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_hello_in_batch() {
        let (client, mut server) = socket_pair().await;
        send_text(
            &mut server,
            json!([
                {"type": "method", "method": "before"},
                {"type": "method", "method": "hello"},
                {"type": "method", "method": "after"}
            ]),
        )
        .await;

        let connection = Connection::with_socket(client, &ConnectionOptions::new())
            .await
            .expect("handshake");

        let names: Vec<_> = std::iter::from_fn(|| connection.get_packet())
            .map(|call| call.name().to_string())
            .collect();
        assert_eq!(names, ["before", "after"]);

        connection.close().await;
    }

    #[tokio::test]
    async fn test_concurrent_close_waits_for_socket_close() {
        use futures_util::FutureExt;

        let (client, mut server) = socket_pair().await;
        send_text(&mut server, json!({"type": "method", "method": "hello"})).await;

        let connection = Connection::with_socket(client, &ConnectionOptions::new())
            .await
            .expect("handshake");

        let first = connection.clone();
        let closing = tokio::spawn(async move { first.close().await });
        tokio::task::yield_now().await;

        // Second handle: the receive task is already taken
        connection.close().await;
        assert!(connection.is_closed());

        // The close frame is on the wire by the time close() returns
        let next = server.next().now_or_never();
        assert!(matches!(next, Some(Some(Ok(Message::Close(_))))));

        closing.await.expect("first close");
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (client, mut server) = socket_pair().await;
        send_text(&mut server, json!({"type": "method", "method": "hello"})).await;

        let connection = Connection::with_socket(client, &ConnectionOptions::new())
            .await
            .expect("handshake");
        connection.close().await;

        assert!(matches!(
            connection.call_discard("ready", json!({})),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            connection.call("getTime", json!({})).await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(connection.pending_count(), 0);
        assert!(!connection.has_packet().await);
    }
}
