//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] moves Engine.IO text packets over a WebSocket.
//! Both `ws://` and `wss://` URLs are supported; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! [`WebSocketConnector`] turns the push server's base URL into the
//! Engine.IO endpoint (`/socket.io/?EIO=4&transport=websocket`) and opens a
//! fresh transport on every call, which is what the reconnection policy in
//! [`crate::connection`] needs.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by default).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::LiveMatchError;
use crate::transport::{Connector, Transport};

/// Path of the Engine.IO endpoint on a Socket.IO server.
const ENGINE_IO_PATH: &str = "socket.io/";

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping the future before it
/// completes does not consume a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the exact URL given.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::Io`] if the URL is invalid or the connection
    /// cannot be established. I/O error kinds are preserved; other failures
    /// map to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, LiveMatchError> {
        tracing::debug!(url = %url, "connecting to push server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            LiveMatchError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "push connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect) but fails with
    /// [`LiveMatchError::Timeout`] if the deadline elapses first.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::Timeout`] or any error from `connect`.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, LiveMatchError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| LiveMatchError::Timeout)?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), LiveMatchError> {
        if self.closed {
            return Err(LiveMatchError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| LiveMatchError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, LiveMatchError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(LiveMatchError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("received binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), LiveMatchError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| LiveMatchError::TransportSend(e.to_string()))
    }
}

/// Opens [`WebSocketTransport`]s to a Socket.IO server.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: String,
    connect_timeout: Option<std::time::Duration>,
}

impl WebSocketConnector {
    /// Build a connector from the push server's base URL.
    ///
    /// `http`/`https` schemes are rewritten to `ws`/`wss`. The Engine.IO
    /// path and query are appended unless the URL already points at
    /// `/socket.io/`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::InvalidUrl`] if the URL cannot be parsed or
    /// uses an unsupported scheme.
    pub fn new(base_url: &str) -> Result<Self, LiveMatchError> {
        Ok(Self {
            endpoint: engine_io_url(base_url)?,
            connect_timeout: None,
        })
    }

    /// Fail each connection attempt that takes longer than `timeout`.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The full Engine.IO WebSocket URL this connector dials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport, LiveMatchError> {
        match self.connect_timeout {
            Some(timeout) => WebSocketTransport::connect_with_timeout(&self.endpoint, timeout).await,
            None => WebSocketTransport::connect(&self.endpoint).await,
        }
    }
}

/// Derive the Engine.IO WebSocket endpoint from a push server base URL.
///
/// # Errors
///
/// Returns [`LiveMatchError::InvalidUrl`] for unparseable URLs or schemes
/// other than `ws`, `wss`, `http`, `https`.
pub fn engine_io_url(base_url: &str) -> Result<String, LiveMatchError> {
    let invalid = |reason: String| LiveMatchError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("cannot change scheme".into()))?;

    if !url.path().contains("/socket.io") {
        let mut path = url.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(ENGINE_IO_PATH);
        url.set_path(&path);
    }
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");

    Ok(url.to_string())
}

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

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn engine_io_url_appends_socket_io_path() {
        assert_eq!(
            engine_io_url("wss://scores.example.com").unwrap(),
            "wss://scores.example.com/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn engine_io_url_rewrites_http_schemes() {
        assert_eq!(
            engine_io_url("http://localhost:3000").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            engine_io_url("https://scores.example.com/live").unwrap(),
            "wss://scores.example.com/live/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn engine_io_url_keeps_explicit_socket_io_path() {
        assert_eq!(
            engine_io_url("ws://localhost:3000/socket.io/").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn engine_io_url_rejects_other_schemes() {
        assert!(matches!(
            engine_io_url("ftp://example.com"),
            Err(LiveMatchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            engine_io_url("not a url"),
            Err(LiveMatchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result.unwrap_err(), LiveMatchError::Io(_)));
    }

    // ── Mock-server helpers ─────────────────────────────────────────

    use tokio::net::TcpListener;

    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn recv_receives_text_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("0{}".into())).await.unwrap();
            ws.send(Message::Text("2".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "0{}");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "2");
    }

    #[tokio::test]
    async fn recv_returns_none_on_close_frame() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("3".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "3");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("40".to_string()).await.unwrap_err();
        assert!(matches!(err, LiveMatchError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_dials_engine_io_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path_rx) = tokio::sync::oneshot::channel::<String>();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            use tokio_tungstenite::tungstenite::handshake::server::{
                ErrorResponse, Request, Response,
            };
            let callback = move |req: &Request,
                                 resp: Response|
                  -> std::result::Result<Response, ErrorResponse> {
                let _ = path_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        let connector = WebSocketConnector::new(&format!("http://{addr}")).unwrap();
        let mut transport = connector.connect().await.unwrap();
        assert!(transport.recv().await.is_none());

        let path = path_rx.await.unwrap();
        assert_eq!(path, "/socket.io/?EIO=4&transport=websocket");
    }
}
