//! Transport abstraction for the push channel.
//!
//! The [`Transport`] trait is a bidirectional text frame channel. Each frame
//! is one Engine.IO packet (see [`crate::framing`]); transports only move
//! strings and never look inside them.
//!
//! # Connection Setup
//!
//! Opening a transport is the job of a [`Connector`]. The connection
//! manager calls it once on start and again for every reconnection
//! attempt, so a connector must be able to produce any number of fresh
//! transports.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use live_match_client::error::LiveMatchError;
//! use live_match_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), LiveMatchError> {
//!         // Write one text frame
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, LiveMatchError>> {
//!         // Read the next text frame; None once the peer closed cleanly
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), LiveMatchError> {
//!         unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::LiveMatchError;

/// A bidirectional text frame transport.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the connection
/// loop polls it inside `tokio::select!`. Dropping an unfinished `recv`
/// future must not lose a frame.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, frame: String) -> Result<(), LiveMatchError>;

    /// Receive the next text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the peer closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, LiveMatchError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), LiveMatchError>;
}

/// Opens fresh [`Transport`]s for the connection manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns any error raised while connecting.
    async fn connect(&self) -> Result<Self::Transport, LiveMatchError>;
}
