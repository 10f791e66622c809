//! Socket.IO (protocol v5) over Engine.IO (protocol v4) text packet codec.
//!
//! Only the text subset used by the match service is supported:
//!
//! | Packet            | Meaning                                  |
//! |-------------------|------------------------------------------|
//! | `0{...}`          | Engine.IO open handshake                 |
//! | `1`               | Engine.IO close                          |
//! | `2` / `3`         | Engine.IO ping / pong                    |
//! | `6`               | Engine.IO noop                           |
//! | `40{...}`         | Socket.IO namespace connect (ack)        |
//! | `41`              | Socket.IO namespace disconnect           |
//! | `42["name",arg]`  | Socket.IO event                          |
//! | `44{"message"}`   | Socket.IO connect error                  |
//!
//! Binary events and acknowledgements are not used by the service and
//! decode to [`FrameError::Unsupported`].

use serde::Deserialize;
use thiserror::Error;

/// Sent by the client to join the default namespace after the open packet.
pub const CONNECT: &str = "40";

/// Engine.IO pong, the reply to a server ping.
pub const PONG: &str = "3";

/// Parameters the server announces in the Engine.IO open packet.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// A decoded push-channel packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Namespace connection accepted.
    Connect { sid: Option<String> },
    /// Namespace connection dropped by the server.
    Disconnect,
    /// Application event.
    Event {
        name: String,
        payload: serde_json::Value,
    },
    /// Namespace connection refused.
    ConnectError { message: String },
}

/// Reasons a packet could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type `{0}`")]
    UnknownType(char),
    #[error("unsupported packet `{0}`")]
    Unsupported(String),
    #[error("invalid packet body: {0}")]
    InvalidBody(String),
}

impl From<FrameError> for crate::error::LiveMatchError {
    fn from(err: FrameError) -> Self {
        Self::MalformedFrame(err.to_string())
    }
}

/// Decode one text packet.
///
/// # Errors
///
/// Returns a [`FrameError`] when the packet type is unknown, unsupported,
/// or its body is not valid for the type.
pub fn decode(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(Frame::Open)
            .map_err(|e| FrameError::InvalidBody(e.to_string())),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_socket_packet(body),
        '5' => Err(FrameError::Unsupported("upgrade".into())),
        '6' => Ok(Frame::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_socket_packet(packet: &str) -> Result<Frame, FrameError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = strip_namespace(chars.as_str());
    match kind {
        '0' => {
            #[derive(Deserialize)]
            struct ConnectAck {
                sid: Option<String>,
            }
            if body.is_empty() {
                return Ok(Frame::Connect { sid: None });
            }
            let ack: ConnectAck =
                serde_json::from_str(body).map_err(|e| FrameError::InvalidBody(e.to_string()))?;
            Ok(Frame::Connect { sid: ack.sid })
        }
        '1' => Ok(Frame::Disconnect),
        '2' => decode_event(body),
        '4' => {
            #[derive(Deserialize)]
            struct ConnectErr {
                message: String,
            }
            let err: ConnectErr =
                serde_json::from_str(body).map_err(|e| FrameError::InvalidBody(e.to_string()))?;
            Ok(Frame::ConnectError {
                message: err.message,
            })
        }
        '3' => Err(FrameError::Unsupported("ack".into())),
        '5' | '6' => Err(FrameError::Unsupported("binary".into())),
        other => Err(FrameError::UnknownType(other)),
    }
}

/// Drop a leading `/namespace,` segment. Only the default namespace is used.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.split_once(',') {
            Some((_, rest)) => rest,
            None => "",
        }
    } else {
        body
    }
}

fn decode_event(body: &str) -> Result<Frame, FrameError> {
    // An ack id may precede the array; the service never requests acks.
    let array = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let values: Vec<serde_json::Value> =
        serde_json::from_str(array).map_err(|e| FrameError::InvalidBody(e.to_string()))?;
    let mut values = values.into_iter();
    let name = match values.next() {
        Some(serde_json::Value::String(name)) => name,
        _ => return Err(FrameError::InvalidBody("event name missing".into())),
    };
    let payload = values.next().unwrap_or(serde_json::Value::Null);
    Ok(Frame::Event { name, payload })
}

/// Encode a Socket.IO event packet for the default namespace.
///
/// # Errors
///
/// Returns a serde error if the array cannot be serialized.
pub fn encode_event(name: &str, payload: &serde_json::Value) -> serde_json::Result<String> {
    let body = serde_json::to_string(&serde_json::json!([name, payload]))?;
    Ok(format!("42{body}"))
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
    fn decodes_open_handshake() {
        let frame = decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let Frame::Open(open) = frame else {
            panic!("expected open, got {frame:?}");
        };
        assert_eq!(open.sid, "abc");
        assert_eq!(open.ping_interval, 25000);
        assert_eq!(open.max_payload, Some(1_000_000));
    }

    #[test]
    fn decodes_engine_control_packets() {
        assert_eq!(decode("1").unwrap(), Frame::Close);
        assert_eq!(decode("2").unwrap(), Frame::Ping);
        assert_eq!(decode("3").unwrap(), Frame::Pong);
        assert_eq!(decode("6").unwrap(), Frame::Noop);
    }

    #[test]
    fn decodes_connect_with_and_without_sid() {
        assert_eq!(
            decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Frame::Connect {
                sid: Some("xyz".into())
            }
        );
        assert_eq!(decode("40").unwrap(), Frame::Connect { sid: None });
    }

    #[test]
    fn decodes_event_with_payload() {
        let frame = decode(r#"42["score_update",{"matchId":"1","score":{"home":1,"away":0}}]"#)
            .unwrap();
        let Frame::Event { name, payload } = frame else {
            panic!("expected event");
        };
        assert_eq!(name, "score_update");
        assert_eq!(payload["score"]["home"], 1);
    }

    #[test]
    fn decodes_event_without_payload_as_null() {
        let frame = decode(r#"42["ping_room"]"#).unwrap();
        assert_eq!(
            frame,
            Frame::Event {
                name: "ping_room".into(),
                payload: serde_json::Value::Null
            }
        );
    }

    #[test]
    fn skips_namespace_and_ack_id() {
        let frame = decode(r#"42/live,7["user_joined",{"username":"bob"}]"#).unwrap();
        let Frame::Event { name, .. } = frame else {
            panic!("expected event");
        };
        assert_eq!(name, "user_joined");
    }

    #[test]
    fn decodes_connect_error() {
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Frame::ConnectError {
                message: "Not authorized".into()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(decode(""), Err(FrameError::Empty));
        assert_eq!(decode("x"), Err(FrameError::UnknownType('x')));
        assert!(matches!(decode("42{"), Err(FrameError::InvalidBody(_))));
        assert!(matches!(decode("42[1,2]"), Err(FrameError::InvalidBody(_))));
        assert!(matches!(decode("451-[\"b\"]"), Err(FrameError::Unsupported(_))));
    }

    #[test]
    fn encodes_event_array() {
        let text = encode_event("subscribe_match", &serde_json::json!("7")).unwrap();
        assert_eq!(text, r#"42["subscribe_match","7"]"#);
        assert_eq!(
            decode(&text).unwrap(),
            Frame::Event {
                name: "subscribe_match".into(),
                payload: serde_json::json!("7")
            }
        );
    }
}
