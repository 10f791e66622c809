//! Transport implementations for the push channel.
//!
//! | Feature                | Transport              | Connector              |
//! |------------------------|------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] | [`WebSocketConnector`] |
//!
//! # Example
//!
//! ```rust,ignore
//! use live_match_client::{PushConfig, PushConnection, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("wss://scores.example.com")?;
//! let connection = PushConnection::open(connector, PushConfig::default());
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
