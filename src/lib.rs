//! # Live Match Client
//!
//! Async Rust client for a live football match service.
//!
//! The crate mirrors what the server says about matches and keeps three
//! views consistent with it: a match dashboard, a single-match detail view
//! and a per-match chat room. Initial state comes from a read-only HTTP API;
//! everything after that arrives over a Socket.IO push channel.
//!
//! ## Features
//!
//! - **Transport-agnostic push channel**: implement [`Transport`] and
//!   [`Connector`] for any text-frame backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketConnector`]
//! - **Reconnection**: a fixed-delay retry policy with observable
//!   [`ConnectionEvent`]s
//! - **Scoped room membership**: [`RoomSubscription`] leaves the room when dropped
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use live_match_client::{ClientConfig, Dashboard, MatchApi, PushConnection, WebSocketConnector};
//!
//! let config = ClientConfig::load("live-match.toml")?;
//! let api = MatchApi::from_config(&config)?;
//! let (connection, _events) = PushConnection::open(
//!     WebSocketConnector::new(&config.push_url)?,
//!     config.push.clone(),
//! );
//!
//! let mut dashboard = Dashboard::attach(&connection.handle());
//! dashboard.load(&api).await;
//! loop {
//!     let change = dashboard.next_change().await;
//!     // re-render
//! }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod connection;
pub mod dashboard;
pub mod detail;
pub mod error;
pub mod framing;
pub mod identity;
pub mod model;
pub mod protocol;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{MatchApi, MatchSource, ResponseEnvelope};
pub use chat::{ChatChange, ChatSession, ChatState};
pub use config::{ChatConfig, ClientConfig, ConfigError};
pub use connection::{ConnectionEvent, PushConfig, PushConnection, PushHandle, PushSink};
pub use dashboard::{BoardChange, Dashboard, DashboardState, MatchBoard};
pub use detail::{DetailChange, DetailState, MatchDetail, MatchDetailView, RoomSubscription};
pub use error::{LiveMatchError, Result};
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use model::{
    ChatMessage, EventType, Match, MatchEvent, MatchId, MatchPatch, MatchPhase, MatchScore,
    MatchStats, MatchStatus, StatPair, Team, TeamSide,
};
pub use protocol::{ClientMessage, ServerMessage};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
