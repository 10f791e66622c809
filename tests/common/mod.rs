#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for live match client integration tests.
//!
//! Provides scripted push transports, a recording [`PushSink`], a canned
//! [`MatchSource`] and builders for common fixtures and wire frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use live_match_client::protocol::ServerMessage;
use live_match_client::{
    ClientMessage, Connector, LiveMatchError, Match, MatchScore, MatchSource, MatchStatus,
    PushSink, Team, Transport,
};

/// One scripted `recv()` result.
pub type Scripted = Option<Result<String, LiveMatchError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted transport.
///
/// Scripted frames are consumed in order by `recv()`; once exhausted it
/// hangs so the connection loop stays alive until shutdown. Everything the
/// client sends is recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Scripted>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), LiveMatchError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, LiveMatchError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), LiveMatchError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out one scripted [`MockTransport`] per `connect()`; refuses once
/// the scripts run out. All transports share one `sent` log.
pub struct MockConnector {
    scripts: StdMutex<VecDeque<Vec<Scripted>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
    pub attempts: Arc<AtomicUsize>,
}

/// Inspection handles for a [`MockConnector`] that has been moved into a connection.
pub struct ConnectorLog {
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
    pub attempts: Arc<AtomicUsize>,
}

impl ConnectorLog {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MockConnector {
    pub fn new(scripts: Vec<Vec<Scripted>>) -> (Self, ConnectorLog) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicUsize::new(0));
        let log = ConnectorLog {
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            attempts: Arc::clone(&attempts),
        };
        let connector = Self {
            scripts: StdMutex::new(scripts.into()),
            sent,
            closed,
            attempts,
        };
        (connector, log)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, LiveMatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(incoming) => Ok(MockTransport {
                incoming: incoming.into(),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            }),
            None => Err(LiveMatchError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

// ── Frames ──────────────────────────────────────────────────────────

pub const OPEN_FRAME: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

pub const CONNECT_ACK_FRAME: &str = r#"40{"sid":"sio-1"}"#;

/// Open + namespace ack, followed by `frames`.
pub fn session(frames: Vec<String>) -> Vec<Scripted> {
    let mut script: Vec<Scripted> = vec![
        Some(Ok(OPEN_FRAME.to_string())),
        Some(Ok(CONNECT_ACK_FRAME.to_string())),
    ];
    script.extend(frames.into_iter().map(|f| Some(Ok(f))));
    script
}

/// A session whose link drops right after `frames`.
pub fn dropping_session(frames: Vec<String>) -> Vec<Scripted> {
    let mut script = session(frames);
    script.push(None);
    script
}

/// A session whose open packet allows only 200 ms of silence.
pub fn short_heartbeat_session() -> Vec<Scripted> {
    let open = r#"0{"sid":"eio-2","upgrades":[],"pingInterval":100,"pingTimeout":100}"#;
    vec![
        Some(Ok(open.to_string())),
        Some(Ok(CONNECT_ACK_FRAME.to_string())),
    ]
}

/// `42[...]` for a server message.
pub fn push_frame(message: &ServerMessage) -> String {
    message.to_frame().unwrap()
}

// ── RecordingSink ───────────────────────────────────────────────────

/// A [`PushSink`] that records every emit and can be switched offline.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<StdMutex<Vec<ClientMessage>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(ClientMessage::event_name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.sent_names().iter().filter(|n| **n == name).count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl PushSink for RecordingSink {
    fn emit(&self, message: ClientMessage) -> Result<(), LiveMatchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LiveMatchError::NotConnected);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}

// ── FakeMatchSource ─────────────────────────────────────────────────

/// Canned HTTP responses.
#[derive(Default)]
pub struct FakeMatchSource {
    pub matches: Vec<Match>,
    pub fail: bool,
}

impl FakeMatchSource {
    pub fn with(matches: Vec<Match>) -> Self {
        Self {
            matches,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            matches: Vec::new(),
            fail: true,
        }
    }

    fn check(&self) -> Result<(), LiveMatchError> {
        if self.fail {
            Err(LiveMatchError::HttpStatus {
                status: 500,
                url: "http://fake/matches".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MatchSource for FakeMatchSource {
    async fn all_matches(&self) -> Result<Vec<Match>, LiveMatchError> {
        self.check()?;
        Ok(self.matches.clone())
    }

    async fn live_matches(&self) -> Result<Vec<Match>, LiveMatchError> {
        self.check()?;
        Ok(self
            .matches
            .iter()
            .filter(|m| m.status.phase() == live_match_client::MatchPhase::Live)
            .cloned()
            .collect())
    }

    async fn match_by_id(&self, id: &str) -> Result<Match, LiveMatchError> {
        self.check()?;
        self.matches
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| LiveMatchError::HttpStatus {
                status: 404,
                url: format!("http://fake/matches/{id}"),
            })
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn team(name: &str, short: &str) -> Team {
    Team {
        name: name.into(),
        short_name: short.into(),
        logo: None,
    }
}

pub fn match_fixture(id: &str, status: MatchStatus) -> Match {
    Match {
        id: id.into(),
        home_team: team("Arsenal", "ARS"),
        away_team: team("Chelsea", "CHE"),
        score: MatchScore::default(),
        status,
        minute: 0,
        start_time: Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap(),
    }
}
