#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the push channel.
//!
//! Verifies the exact `42[...]` packets emitted for every `ClientMessage`,
//! and that server packets as the match service sends them decode into the
//! expected `ServerMessage` variants.

use live_match_client::framing::{self, Frame};
use live_match_client::model::{EventType, MatchScore, MatchStatus, TeamSide};
use live_match_client::protocol::{
    ChatPresence, ClientMessage, OutgoingChatMessage, ServerMessage, TypingNotice,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

/// Decode a server packet all the way to a `ServerMessage`.
fn decode_push(packet: &str) -> ServerMessage {
    match framing::decode(packet).expect("frame") {
        Frame::Event { name, payload } => {
            ServerMessage::from_event(&name, payload).expect("server message")
        }
        other => panic!("expected event frame, got {other:?}"),
    }
}

/// Split an emitted packet into its event name and argument.
fn emitted(msg: &ClientMessage) -> (String, serde_json::Value) {
    let packet = msg.to_frame().expect("encode");
    assert!(packet.starts_with("42["), "packet was: {packet}");
    match framing::decode(&packet).expect("re-decode") {
        Frame::Event { name, payload } => (name, payload),
        other => panic!("expected event frame, got {other:?}"),
    }
}

fn presence() -> ChatPresence {
    ChatPresence {
        match_id: "7".into(),
        username: "alice".into(),
        user_id: "u-1".into(),
    }
}

// ════════════════════════════════════════════════════════════════════
// Outbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn subscribe_match_carries_bare_id() {
    let packet = ClientMessage::SubscribeMatch("7".into()).to_frame().unwrap();
    assert_eq!(packet, r#"42["subscribe_match","7"]"#);

    let packet = ClientMessage::UnsubscribeMatch("7".into())
        .to_frame()
        .unwrap();
    assert_eq!(packet, r#"42["unsubscribe_match","7"]"#);
}

#[test]
fn join_and_leave_chat_payloads() {
    let expected = json!({"matchId": "7", "username": "alice", "userId": "u-1"});

    let (name, payload) = emitted(&ClientMessage::JoinChat(presence()));
    assert_eq!(name, "join_chat");
    assert_eq!(payload, expected);

    let (name, payload) = emitted(&ClientMessage::LeaveChat(presence()));
    assert_eq!(name, "leave_chat");
    assert_eq!(payload, expected);
}

#[test]
fn send_message_payload() {
    let (name, payload) = emitted(&ClientMessage::SendMessage(OutgoingChatMessage {
        match_id: "7".into(),
        message: "what a goal".into(),
        username: "alice".into(),
        user_id: "u-1".into(),
    }));
    assert_eq!(name, "send_message");
    assert_eq!(
        payload,
        json!({"matchId": "7", "message": "what a goal", "username": "alice", "userId": "u-1"})
    );
}

#[test]
fn typing_payloads() {
    let notice = TypingNotice {
        match_id: "7".into(),
        username: "alice".into(),
    };
    let (name, payload) = emitted(&ClientMessage::TypingStart(notice.clone()));
    assert_eq!(name, "typing_start");
    assert_eq!(payload, json!({"matchId": "7", "username": "alice"}));

    let (name, _) = emitted(&ClientMessage::TypingStop(notice));
    assert_eq!(name, "typing_stop");
}

#[test]
fn event_names_match_emitted_names() {
    let all = [
        ClientMessage::SubscribeMatch("1".into()),
        ClientMessage::UnsubscribeMatch("1".into()),
        ClientMessage::JoinChat(presence()),
        ClientMessage::LeaveChat(presence()),
        ClientMessage::TypingStart(TypingNotice {
            match_id: "1".into(),
            username: "a".into(),
        }),
    ];
    for msg in &all {
        let (name, _) = emitted(msg);
        assert_eq!(name, msg.event_name());
    }
}

// ════════════════════════════════════════════════════════════════════
// Inbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn score_update_decodes() {
    let msg = decode_push(r#"42["score_update",{"matchId":"3","score":{"home":2,"away":1}}]"#);
    let ServerMessage::ScoreUpdate(update) = msg else {
        panic!("expected ScoreUpdate, got {msg:?}");
    };
    assert_eq!(update.match_id, "3");
    assert_eq!(update.score, MatchScore { home: 2, away: 1 });
}

#[test]
fn status_change_decodes() {
    let msg = decode_push(r#"42["status_change",{"matchId":"3","status":"HALF_TIME"}]"#);
    let ServerMessage::StatusChange(change) = msg else {
        panic!("expected StatusChange, got {msg:?}");
    };
    assert_eq!(change.status, MatchStatus::HalfTime);
}

#[test]
fn match_update_is_partial() {
    let msg = decode_push(r#"42["match_update",{"id":"3","minute":67}]"#);
    let ServerMessage::MatchUpdate(patch) = msg else {
        panic!("expected MatchUpdate, got {msg:?}");
    };
    assert_eq!(patch.id, "3");
    assert_eq!(patch.minute, Some(67));
    assert!(patch.score.is_none());
    assert!(patch.status.is_none());
    assert_eq!(msg_match_id(r#"42["match_update",{"id":"3"}]"#), Some("3".into()));
}

fn msg_match_id(packet: &str) -> Option<String> {
    decode_push(packet).match_id().map(str::to_string)
}

#[test]
fn match_event_decodes() {
    let msg = decode_push(
        r#"42["match_event",{"id":"e1","matchId":"3","type":"YELLOW_CARD","minute":12,"player":"Rice","description":"Late tackle","teamSide":"home"}]"#,
    );
    let ServerMessage::MatchEvent(event) = msg else {
        panic!("expected MatchEvent, got {msg:?}");
    };
    assert_eq!(event.event_type, EventType::YellowCard);
    assert_eq!(event.team_side, TeamSide::Home);
    assert_eq!(event.player, "Rice");
}

#[test]
fn stats_update_carries_match_id_alongside_counters() {
    let msg = decode_push(
        r#"42["stats_update",{"matchId":"3","possession":{"home":55,"away":45},"shots":{"home":7,"away":4},"shotsOnTarget":{"home":3,"away":1},"corners":{"home":5,"away":2},"fouls":{"home":9,"away":11},"yellowCards":{"home":1,"away":2},"redCards":{"home":0,"away":0}}]"#,
    );
    let ServerMessage::StatsUpdate(update) = msg else {
        panic!("expected StatsUpdate, got {msg:?}");
    };
    assert_eq!(update.match_id, "3");
    assert_eq!(update.stats.possession.get(TeamSide::Home), 55);
    assert_eq!(update.stats.shots_on_target.away, 1);
    assert_eq!(update.stats.yellow_cards.away, 2);
}

#[test]
fn chat_traffic_decodes() {
    let msg = decode_push(
        r#"42["chat_message",{"id":"m1","matchId":"3","userId":"u-2","username":"bob","message":"hi","timestamp":"2024-05-01T19:30:00Z"}]"#,
    );
    let ServerMessage::ChatMessage(line) = msg else {
        panic!("expected ChatMessage, got {msg:?}");
    };
    assert_eq!(line.username, "bob");
    assert_eq!(line.message, "hi");

    let msg = decode_push(r#"42["typing_indicator",{"username":"bob","isTyping":true}]"#);
    assert!(matches!(msg, ServerMessage::TypingIndicator(ref t) if t.is_typing));
    assert_eq!(msg.match_id(), None);

    let msg = decode_push(r#"42["user_joined",{"username":"carol"}]"#);
    assert!(matches!(msg, ServerMessage::UserJoined(ref u) if u.username == "carol"));
}

#[test]
fn unknown_event_name_is_rejected() {
    let result = ServerMessage::from_event("weather", json!({"rain": true}));
    assert!(result.is_err());
}

#[test]
fn malformed_payload_is_rejected() {
    let result = ServerMessage::from_event("score_update", json!({"matchId": "3"}));
    assert!(result.is_err());
}

#[test]
fn server_message_frames_decode_back() {
    let original = decode_push(r#"42["status_change",{"matchId":"9","status":"FULL_TIME"}]"#);
    let packet = original.to_frame().unwrap();
    assert_eq!(decode_push(&packet), original);
}
