//! Push-channel message types.
//!
//! The server speaks Socket.IO: every application message is an event name
//! plus one JSON argument. Both enums here are adjacently tagged
//! (`{"event": <name>, "data": <payload>}`) so that the event name maps
//! straight onto a variant. [`crate::framing`] moves between this shape
//! and the `42["name", payload]` packets on the wire.

use serde::{Deserialize, Serialize};

use crate::framing;
use crate::model::{
    ChatMessage, MatchEvent, MatchId, MatchPatch, MatchScore, MatchStats, MatchStatus,
};

// ── Outbound payloads ───────────────────────────────────────────────

/// Identifies a chat participant in a room (`join_chat` / `leave_chat`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPresence {
    pub match_id: MatchId,
    pub username: String,
    pub user_id: String,
}

/// Outgoing chat line (`send_message`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingChatMessage {
    pub match_id: MatchId,
    pub message: String,
    pub username: String,
    pub user_id: String,
}

/// Typing notification (`typing_start` / `typing_stop`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub match_id: MatchId,
    pub username: String,
}

// ── Inbound payloads ────────────────────────────────────────────────

/// `score_update` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub match_id: MatchId,
    pub score: MatchScore,
}

/// `status_change` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub match_id: MatchId,
    pub status: MatchStatus,
}

/// `stats_update` payload: a full [`MatchStats`] snapshot tagged with its match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    pub match_id: MatchId,
    #[serde(flatten)]
    pub stats: MatchStats,
}

/// `typing_indicator` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub username: String,
    pub is_typing: bool,
}

/// `user_joined` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserJoined {
    pub username: String,
}

// ── Messages ────────────────────────────────────────────────────────

/// Events emitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room of a match to receive its detail events.
    SubscribeMatch(MatchId),
    /// Leave the room of a match.
    UnsubscribeMatch(MatchId),
    /// Enter the chat of a match.
    JoinChat(ChatPresence),
    /// Leave the chat of a match.
    LeaveChat(ChatPresence),
    /// Post a chat line. The server echoes it back as `chat_message`.
    SendMessage(OutgoingChatMessage),
    TypingStart(TypingNotice),
    TypingStop(TypingNotice),
}

impl ClientMessage {
    /// Encode as a Socket.IO event packet (`42["name", payload]`).
    ///
    /// # Errors
    ///
    /// Returns a serde error if the payload cannot be serialized.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let (name, payload) = to_event(self)?;
        framing::encode_event(&name, &payload)
    }

    /// Wire event name of this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SubscribeMatch(_) => "subscribe_match",
            Self::UnsubscribeMatch(_) => "unsubscribe_match",
            Self::JoinChat(_) => "join_chat",
            Self::LeaveChat(_) => "leave_chat",
            Self::SendMessage(_) => "send_message",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
        }
    }
}

/// Events pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Score of one match changed (broadcast).
    ScoreUpdate(ScoreUpdate),
    /// Status of one match changed (broadcast).
    StatusChange(StatusChange),
    /// Generic partial update of one match.
    MatchUpdate(MatchPatch),
    /// New timeline entry (room scoped).
    MatchEvent(MatchEvent),
    /// New statistics snapshot (room scoped).
    StatsUpdate(StatsUpdate),
    /// Chat line, including the echo of our own messages.
    ChatMessage(ChatMessage),
    /// Someone started or stopped typing.
    TypingIndicator(TypingIndicator),
    /// Someone joined the chat. Currently informational only.
    UserJoined(UserJoined),
}

impl ServerMessage {
    /// Rebuild a message from a Socket.IO event name and its argument.
    ///
    /// # Errors
    ///
    /// Returns a serde error for unknown event names or payloads that do
    /// not match the event's shape.
    pub fn from_event(name: &str, payload: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({ "event": name, "data": payload }))
    }

    /// Encode as a Socket.IO event packet, the way the server sends it.
    ///
    /// # Errors
    ///
    /// Returns a serde error if the payload cannot be serialized.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let (name, payload) = to_event(self)?;
        framing::encode_event(&name, &payload)
    }

    /// Wire event name of this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ScoreUpdate(_) => "score_update",
            Self::StatusChange(_) => "status_change",
            Self::MatchUpdate(_) => "match_update",
            Self::MatchEvent(_) => "match_event",
            Self::StatsUpdate(_) => "stats_update",
            Self::ChatMessage(_) => "chat_message",
            Self::TypingIndicator(_) => "typing_indicator",
            Self::UserJoined(_) => "user_joined",
        }
    }

    /// The match this message refers to, when the payload names one.
    pub fn match_id(&self) -> Option<&str> {
        match self {
            Self::ScoreUpdate(u) => Some(&u.match_id),
            Self::StatusChange(u) => Some(&u.match_id),
            Self::MatchUpdate(p) => Some(&p.id),
            Self::MatchEvent(e) => Some(&e.match_id),
            Self::StatsUpdate(s) => Some(&s.match_id),
            Self::ChatMessage(m) => Some(&m.match_id),
            Self::TypingIndicator(_) | Self::UserJoined(_) => None,
        }
    }
}

/// Split a message into its Socket.IO event name and argument.
///
/// # Errors
///
/// Returns a serde error if the payload cannot be represented as JSON.
pub fn to_event<T: Serialize>(message: &T) -> serde_json::Result<(String, serde_json::Value)> {
    let value = serde_json::to_value(message)?;
    let serde_json::Value::Object(mut map) = value else {
        return Err(serde::ser::Error::custom("message is not an object"));
    };
    let name = match map.remove("event") {
        Some(serde_json::Value::String(name)) => name,
        _ => return Err(serde::ser::Error::custom("message has no event name")),
    };
    let payload = map.remove("data").unwrap_or(serde_json::Value::Null);
    Ok((name, payload))
}
