//! Push-channel connection manager.
//!
//! [`PushConnection`] owns one background task that keeps a Socket.IO link
//! to the match server alive. It is created explicitly with
//! [`PushConnection::open`] and torn down with [`PushConnection::close`];
//! there is no process-wide singleton. Views talk to it through cloneable
//! [`PushHandle`]s:
//!
//! - outbound events go over an unbounded MPSC channel to the task,
//! - inbound events fan out to every subscriber on a `broadcast` channel.
//!
//! When the link drops the task retries with a fixed delay, up to
//! [`PushConfig::reconnection_attempts`] times. While the link is down
//! [`PushHandle::emit`] fails with [`LiveMatchError::NotConnected`]; nothing
//! is buffered across a disconnect.
//!
//! A link that stays silent for longer than the server's ping interval plus
//! ping timeout (both from the Engine.IO open packet) is treated as lost.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new("wss://scores.example.com")?;
//! let (mut connection, mut events) = PushConnection::open(connector, PushConfig::default());
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ConnectionEvent::Connected => connection.emit(ClientMessage::SubscribeMatch("7".into()))?,
//!         ConnectionEvent::Message(msg) => { /* … */ }
//!         ConnectionEvent::Closed => break,
//!         _ => {}
//!     }
//! }
//! connection.close().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::error::{LiveMatchError, Result};
use crate::framing::{self, Frame};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connector, Transport};

/// Default capacity of the broadcast event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of reconnection attempts after a link is lost.
const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;

/// Default pause between reconnection attempts.
const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_millis(1000);

/// Default limit for the Engine.IO + Socket.IO handshake.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Silence allowed on a link whose open packet carried no usable timings
/// (Engine.IO's 25 s ping interval plus 20 s ping timeout).
const FALLBACK_HEARTBEAT: Duration = Duration::from_millis(25_000 + 20_000);

// ── Configuration ───────────────────────────────────────────────────

/// Tuning for a [`PushConnection`].
///
/// # Example
///
/// ```
/// use live_match_client::connection::PushConfig;
/// use std::time::Duration;
///
/// let config = PushConfig::default()
///     .with_reconnection_attempts(3)
///     .with_reconnection_delay(Duration::from_millis(500));
/// assert_eq!(config.reconnection_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// Whether to reconnect after the link drops. Defaults to `true`.
    pub reconnection: bool,
    /// Retries after a lost link (or a failed first connect) before giving up.
    ///
    /// Defaults to **5**. The counter resets after every successful handshake.
    pub reconnection_attempts: u32,
    /// Fixed pause before each retry. Defaults to **1000 ms**.
    pub reconnection_delay: Duration,
    /// Upper bound for connect + handshake. Defaults to **20 s**.
    pub handshake_timeout: Duration,
    /// Capacity of the broadcast event channel.
    ///
    /// Subscribers that fall further behind than this lose the oldest events
    /// (they see `RecvError::Lagged`). Defaults to **256**, clamped to ≥ 1.
    pub event_channel_capacity: usize,
    /// Time [`PushConnection::close`] waits for the task before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            reconnection: true,
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PushConfig {
    /// Enable or disable reconnection.
    #[must_use]
    pub fn with_reconnection(mut self, enabled: bool) -> Self {
        self.reconnection = enabled;
        self
    }

    /// Set the number of reconnection attempts.
    #[must_use]
    pub fn with_reconnection_attempts(mut self, attempts: u32) -> Self {
        self.reconnection_attempts = attempts;
        self
    }

    /// Set the pause between reconnection attempts.
    #[must_use]
    pub fn with_reconnection_delay(mut self, delay: Duration) -> Self {
        self.reconnection_delay = delay;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the capacity of the broadcast event channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the graceful shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Everything a subscriber can observe on the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The Socket.IO handshake completed; emits are accepted.
    Connected,
    /// The link dropped or a connection attempt failed.
    Disconnected {
        /// Human-readable cause, if known.
        reason: Option<String>,
    },
    /// A reconnection attempt is scheduled after the configured delay.
    Reconnecting {
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// A push event from the server.
    Message(ServerMessage),
    /// The manager stopped for good (closed, dropped, or out of retries).
    Closed,
}

// ── Shared state ────────────────────────────────────────────────────

struct ConnectionState {
    open: AtomicBool,
    connected: AtomicBool,
    session_id: Mutex<Option<String>>,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            session_id: Mutex::new(None),
        }
    }
}

// ── Sink abstraction ────────────────────────────────────────────────

/// Where views send their outbound notifications.
///
/// [`PushHandle`] is the production implementation; tests substitute a
/// recorder.
pub trait PushSink: Clone + Send + Sync + 'static {
    /// Queue one outbound event.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::NotConnected`] while the link is down.
    fn emit(&self, message: ClientMessage) -> Result<()>;

    /// Returns `true` while the link is up.
    fn is_connected(&self) -> bool;
}

// ── Handle ──────────────────────────────────────────────────────────

/// Cloneable access to a running [`PushConnection`].
///
/// Handles never own the connection: dropping every handle does not close
/// it, and a handle outliving its connection simply reports
/// [`LiveMatchError::NotConnected`].
#[derive(Clone)]
pub struct PushHandle {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    events: broadcast::Sender<ConnectionEvent>,
    state: Arc<ConnectionState>,
}

impl PushHandle {
    /// Register a new listener. Dropping the receiver unregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Returns `true` while the manager task is running.
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::Acquire)
    }

    /// Returns the Socket.IO session id of the current link, if connected.
    pub async fn session_id(&self) -> Option<String> {
        self.state.session_id.lock().await.clone()
    }
}

impl PushSink for PushHandle {
    fn emit(&self, message: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(LiveMatchError::NotConnected);
        }
        self.cmd_tx
            .send(message)
            .map_err(|_| LiveMatchError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PushHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushHandle")
            .field("open", &self.is_open())
            .field("connected", &self.is_connected())
            .field("listeners", &self.events.receiver_count())
            .finish()
    }
}

// ── Connection manager ──────────────────────────────────────────────

/// Owner of the push-channel background task.
pub struct PushConnection {
    handle: PushHandle,
    /// Handle to the background connection task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Signals the task to close the link gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl PushConnection {
    /// Spawn the connection task and return the manager plus a first listener.
    ///
    /// The returned receiver is registered before the task starts, so it
    /// observes every event including the first [`ConnectionEvent::Connected`].
    #[must_use = "dropping the connection aborts the push channel"]
    pub fn open<C: Connector>(
        connector: C,
        config: PushConfig,
    ) -> (Self, broadcast::Receiver<ConnectionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (events, first_rx) = broadcast::channel::<ConnectionEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ConnectionState::new());
        let handle = PushHandle {
            cmd_tx,
            events: events.clone(),
            state: Arc::clone(&state),
        };
        let shutdown_timeout = config.shutdown_timeout;

        let task = tokio::spawn(connection_loop(
            connector,
            cmd_rx,
            events,
            state,
            shutdown_rx,
            config,
        ));

        let connection = Self {
            handle,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (connection, first_rx)
    }

    /// A cloneable handle for views.
    pub fn handle(&self) -> PushHandle {
        self.handle.clone()
    }

    /// Register a new listener.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.handle.subscribe()
    }

    /// Queue one outbound event.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::NotConnected`] while the link is down.
    pub fn emit(&self, message: ClientMessage) -> Result<()> {
        self.handle.emit(message)
    }

    /// Returns `true` until the manager stops.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Returns `true` while the link is up.
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// Close the link and stop the background task.
    ///
    /// Subscribers see a final [`ConnectionEvent::Closed`] if the task exits
    /// within the shutdown timeout; otherwise it is aborted.
    pub async fn close(&mut self) {
        debug!("PushConnection: close requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection task did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection task aborted: {join_err}");
                    }
                }
            }
        }

        self.handle.state.connected.store(false, Ordering::Release);
        self.handle.state.open.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for PushConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConnection")
            .field("open", &self.is_open())
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PushConnection {
    fn drop(&mut self) {
        // No executor to drive a graceful close from a synchronous drop.
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.handle.state.connected.store(false, Ordering::Release);
        self.handle.state.open.store(false, Ordering::Release);
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// How a live link ended.
enum LinkEnd {
    Shutdown,
    HandlesDropped,
    Lost(String),
}

/// What the handshake negotiated for a link.
struct Negotiated {
    sid: Option<String>,
    /// Longest silence tolerated before the link counts as dead.
    heartbeat: Duration,
}

impl Negotiated {
    fn heartbeat_from(open: &framing::OpenHandshake) -> Duration {
        match open.ping_interval.saturating_add(open.ping_timeout) {
            0 => FALLBACK_HEARTBEAT,
            ms => Duration::from_millis(ms),
        }
    }
}

/// Connect, drive the link, reconnect; until shutdown or retries run out.
async fn connection_loop<C: Connector>(
    connector: C,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    events: broadcast::Sender<ConnectionEvent>,
    state: Arc<ConnectionState>,
    mut shutdown_rx: oneshot::Receiver<()>,
    config: PushConfig,
) {
    debug!("connection loop started");
    let mut attempt: u32 = 0;

    loop {
        let established = tokio::select! {
            result = establish(&connector, config.handshake_timeout) => result,
            _ = &mut shutdown_rx => {
                finish(&events, &state, "client shut down").await;
                return;
            }
        };

        match established {
            Ok((transport, negotiated)) => {
                attempt = 0;
                info!(sid = ?negotiated.sid, "push channel connected");
                *state.session_id.lock().await = negotiated.sid;
                state.connected.store(true, Ordering::Release);
                emit_event(&events, ConnectionEvent::Connected);

                let end = drive(
                    transport,
                    negotiated.heartbeat,
                    &mut cmd_rx,
                    &events,
                    &mut shutdown_rx,
                )
                .await;
                match end {
                    LinkEnd::Shutdown => {
                        finish(&events, &state, "client shut down").await;
                        return;
                    }
                    LinkEnd::HandlesDropped => {
                        finish(&events, &state, "all handles dropped").await;
                        return;
                    }
                    LinkEnd::Lost(reason) => {
                        mark_disconnected(&events, &state, reason).await;
                    }
                }
            }
            Err(e) => {
                warn!("push connection attempt failed: {e}");
                mark_disconnected(&events, &state, e.to_string()).await;
            }
        }

        discard_pending(&mut cmd_rx);

        if !config.reconnection || attempt >= config.reconnection_attempts {
            warn!(attempts = attempt, "giving up on push connection");
            finish(&events, &state, "reconnection attempts exhausted").await;
            return;
        }

        attempt += 1;
        emit_event(&events, ConnectionEvent::Reconnecting { attempt });
        tokio::select! {
            _ = tokio::time::sleep(config.reconnection_delay) => {}
            _ = &mut shutdown_rx => {
                finish(&events, &state, "client shut down").await;
                return;
            }
        }
    }
}

/// Open a transport and complete the Engine.IO + Socket.IO handshake.
async fn establish<C: Connector>(
    connector: &C,
    timeout: Duration,
) -> Result<(C::Transport, Negotiated)> {
    let attempt = async {
        let mut transport = connector.connect().await?;
        match handshake(&mut transport).await {
            Ok(negotiated) => Ok::<_, LiveMatchError>((transport, negotiated)),
            Err(e) => {
                let _ = transport.close().await;
                Err(e)
            }
        }
    };
    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| LiveMatchError::Timeout)?
}

/// Wait for the open packet, join the default namespace, wait for the ack.
async fn handshake<T: Transport>(transport: &mut T) -> Result<Negotiated> {
    let mut heartbeat = FALLBACK_HEARTBEAT;
    loop {
        let text = match transport.recv().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => return Err(LiveMatchError::TransportClosed),
        };

        match framing::decode(&text)? {
            Frame::Open(open) => {
                debug!(
                    sid = %open.sid,
                    ping_interval = open.ping_interval,
                    ping_timeout = open.ping_timeout,
                    "engine.io session opened"
                );
                heartbeat = Negotiated::heartbeat_from(&open);
                transport.send(framing::CONNECT.to_string()).await?;
            }
            Frame::Connect { sid } => {
                debug!(?sid, "socket.io namespace connected");
                return Ok(Negotiated { sid, heartbeat });
            }
            Frame::ConnectError { message } => return Err(LiveMatchError::Handshake(message)),
            Frame::Ping => transport.send(framing::PONG.to_string()).await?,
            Frame::Close | Frame::Disconnect => return Err(LiveMatchError::TransportClosed),
            other => debug!(?other, "ignoring frame during handshake"),
        }
    }
}

/// Multiplex outbound commands, shutdown, and inbound frames for one link.
///
/// The link is declared lost once nothing arrives for `heartbeat`.
async fn drive<T: Transport>(
    mut transport: T,
    heartbeat: Duration,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &broadcast::Sender<ConnectionEvent>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> LinkEnd {
    let deadline = tokio::time::sleep(heartbeat);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => {
                warn!(?heartbeat, "no traffic from server, dropping link");
                let _ = transport.close().await;
                return LinkEnd::Lost("ping timeout".into());
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!(event = msg.event_name(), "emitting");
                        match msg.to_frame() {
                            Ok(frame) => {
                                if let Err(e) = transport.send(frame).await {
                                    error!("transport send error: {e}");
                                    return LinkEnd::Lost(format!("transport send error: {e}"));
                                }
                            }
                            Err(e) => {
                                error!("failed to encode {}: {e}", msg.event_name());
                            }
                        }
                    }
                    None => {
                        debug!("command channel closed, closing push link");
                        let _ = transport.close().await;
                        return LinkEnd::HandlesDropped;
                    }
                }
            }

            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                return LinkEnd::Shutdown;
            }

            incoming = transport.recv() => {
                if matches!(incoming, Some(Ok(_))) {
                    deadline.as_mut().reset(tokio::time::Instant::now() + heartbeat);
                }
                match incoming {
                    Some(Ok(text)) => match framing::decode(&text) {
                        Ok(Frame::Ping) => {
                            if let Err(e) = transport.send(framing::PONG.to_string()).await {
                                error!("failed to answer ping: {e}");
                                return LinkEnd::Lost(format!("transport send error: {e}"));
                            }
                        }
                        Ok(Frame::Event { name, payload }) => {
                            match ServerMessage::from_event(&name, payload) {
                                Ok(msg) => emit_event(events, ConnectionEvent::Message(msg)),
                                Err(e) => debug!(event = %name, "dropping unrecognised push event: {e}"),
                            }
                        }
                        Ok(Frame::Close) => return LinkEnd::Lost("server closed the session".into()),
                        Ok(Frame::Disconnect) => {
                            return LinkEnd::Lost("server disconnected the namespace".into());
                        }
                        Ok(other) => trace!(?other, "ignoring frame"),
                        Err(e) => warn!("malformed frame: {e} (raw: {text})"),
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return LinkEnd::Lost(format!("transport receive error: {e}"));
                    }
                    None => {
                        debug!("transport closed by server");
                        return LinkEnd::Lost("transport closed".into());
                    }
                }
            }
        }
    }
}

/// Drop commands that raced with a disconnect; nothing is replayed later.
fn discard_pending(cmd_rx: &mut mpsc::UnboundedReceiver<ClientMessage>) {
    while let Ok(msg) = cmd_rx.try_recv() {
        debug!(event = msg.event_name(), "discarding event queued while disconnected");
    }
}

/// Broadcast an event. Having no listeners is not an error.
fn emit_event(events: &broadcast::Sender<ConnectionEvent>, event: ConnectionEvent) {
    if events.send(event).is_err() {
        trace!("no push listeners registered");
    }
}

async fn mark_disconnected(
    events: &broadcast::Sender<ConnectionEvent>,
    state: &ConnectionState,
    reason: String,
) {
    state.connected.store(false, Ordering::Release);
    *state.session_id.lock().await = None;
    emit_event(
        events,
        ConnectionEvent::Disconnected {
            reason: Some(reason),
        },
    );
}

/// Final bookkeeping: `Disconnected` if a link was up, then `Closed`.
async fn finish(events: &broadcast::Sender<ConnectionEvent>, state: &ConnectionState, reason: &str) {
    let was_connected = state.connected.swap(false, Ordering::AcqRel);
    state.open.store(false, Ordering::Release);
    *state.session_id.lock().await = None;
    if was_connected {
        emit_event(
            events,
            ConnectionEvent::Disconnected {
                reason: Some(reason.to_string()),
            },
        );
    }
    emit_event(events, ConnectionEvent::Closed);
    debug!("connection loop exited");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const OPEN: &str =
        r#"0{"sid":"eio1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    const CONNECT_ACK: &str = r#"40{"sid":"sio1"}"#;

    type Script = Vec<Option<std::result::Result<String, LiveMatchError>>>;

    /// Records sent frames and replays scripted ones.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, LiveMatchError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: String) -> std::result::Result<(), LiveMatchError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, LiveMatchError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), LiveMatchError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Hands out one scripted transport per connect call.
    struct MockConnector {
        scripts: StdMutex<VecDeque<Script>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockConnector {
        fn new(scripts: Vec<Script>) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let connector = Self {
                scripts: StdMutex::new(scripts.into()),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (connector, sent, closed)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&self) -> std::result::Result<MockTransport, LiveMatchError> {
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(incoming) => Ok(MockTransport {
                    incoming: incoming.into(),
                    sent: Arc::clone(&self.sent),
                    closed: Arc::clone(&self.closed),
                }),
                None => Err(LiveMatchError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no more scripted connections",
                ))),
            }
        }
    }

    fn handshake_script(extra: Vec<&str>) -> Script {
        let mut script: Script = vec![Some(Ok(OPEN.into())), Some(Ok(CONNECT_ACK.into()))];
        script.extend(extra.into_iter().map(|f| Some(Ok(f.to_string()))));
        script
    }

    fn fast_config() -> PushConfig {
        PushConfig::default()
            .with_reconnection_delay(Duration::from_millis(5))
            .with_shutdown_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn handshake_joins_default_namespace_then_reports_connected() {
        let (connector, sent, _closed) = MockConnector::new(vec![handshake_script(vec![])]);
        let (mut connection, mut events) = PushConnection::open(connector, fast_config());

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        assert!(connection.is_connected());
        assert_eq!(connection.handle().session_id().await.as_deref(), Some("sio1"));
        assert_eq!(sent.lock().unwrap().as_slice(), ["40"]);

        connection.close().await;
    }

    #[tokio::test]
    async fn server_ping_is_answered_with_pong() {
        let (connector, sent, _closed) = MockConnector::new(vec![handshake_script(vec!["2"])]);
        let (mut connection, mut events) = PushConnection::open(connector, fast_config());
        let _ = events.recv().await; // Connected

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sent.lock().unwrap().last().map(String::as_str), Some("3"));

        connection.close().await;
    }

    #[tokio::test]
    async fn emit_writes_socket_io_event_frame() {
        let (connector, sent, _closed) = MockConnector::new(vec![handshake_script(vec![])]);
        let (mut connection, mut events) = PushConnection::open(connector, fast_config());
        let _ = events.recv().await; // Connected

        connection
            .emit(ClientMessage::SubscribeMatch("42".into()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            sent.lock().unwrap().last().map(String::as_str),
            Some(r#"42["subscribe_match","42"]"#)
        );
        connection.close().await;
    }

    #[tokio::test]
    async fn emit_before_handshake_is_rejected() {
        let (connector, _sent, _closed) = MockConnector::new(vec![vec![]]);
        let (mut connection, _events) = PushConnection::open(connector, fast_config());

        let result = connection.emit(ClientMessage::SubscribeMatch("1".into()));
        assert!(matches!(result, Err(LiveMatchError::NotConnected)));

        connection.close().await;
    }

    #[tokio::test]
    async fn unknown_push_events_are_dropped() {
        let (connector, _sent, _closed) = MockConnector::new(vec![handshake_script(vec![
            r#"42["weather",{"rain":true}]"#,
            r#"42["user_joined",{"username":"ann"}]"#,
        ])]);
        let (mut connection, mut events) = PushConnection::open(connector, fast_config());
        let _ = events.recv().await; // Connected

        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            ConnectionEvent::Message(ServerMessage::UserJoined(_))
        ));
        connection.close().await;
    }

    #[tokio::test]
    async fn close_emits_disconnected_then_closed() {
        let (connector, _sent, closed) = MockConnector::new(vec![handshake_script(vec![])]);
        let (mut connection, mut events) = PushConnection::open(connector, fast_config());
        let _ = events.recv().await; // Connected

        connection.close().await;

        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);
        assert!(closed.load(Ordering::Relaxed));
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = PushConfig::default();
        assert!(config.reconnection);
        assert_eq!(config.reconnection_attempts, 5);
        assert_eq!(config.reconnection_delay, Duration::from_millis(1000));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = PushConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn heartbeat_covers_interval_plus_timeout() {
        let Frame::Open(open) = framing::decode(OPEN).unwrap() else {
            panic!("expected open frame");
        };
        assert_eq!(Negotiated::heartbeat_from(&open), Duration::from_secs(45));

        let silent = framing::OpenHandshake {
            ping_interval: 0,
            ping_timeout: 0,
            ..open
        };
        assert_eq!(Negotiated::heartbeat_from(&silent), FALLBACK_HEARTBEAT);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_is_dropped_after_heartbeat() {
        let quick_open =
            r#"0{"sid":"eio1","upgrades":[],"pingInterval":100,"pingTimeout":100}"#;
        let script: Script = vec![Some(Ok(quick_open.into())), Some(Ok(CONNECT_ACK.into()))];
        let (connector, _sent, closed) = MockConnector::new(vec![script]);
        let (mut connection, mut events) =
            PushConnection::open(connector, fast_config().with_reconnection(false));

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        let started = tokio::time::Instant::now();
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected {
                reason: Some("ping timeout".into())
            }
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(200), "dropped after {waited:?}");
        assert!(waited < Duration::from_secs(1), "dropped after {waited:?}");
        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Closed);

        connection.close().await;
    }
}
