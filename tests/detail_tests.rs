#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Match detail view tests: room membership lifecycle and per-match
//! reconciliation of updates, timeline entries and statistics.

mod common;

use std::time::Duration;

use live_match_client::model::{EventType, MatchEvent, MatchPatch, MatchStats, StatPair, TeamSide};
use live_match_client::protocol::{ServerMessage, StatsUpdate};
use live_match_client::{
    ClientMessage, ConnectionEvent, DetailChange, DetailState, MatchDetailView, MatchStatus,
    PushConfig, PushConnection, RoomSubscription,
};
use tokio::sync::broadcast;

use common::{match_fixture, session, FakeMatchSource, MockConnector, RecordingSink};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn source() -> FakeMatchSource {
    FakeMatchSource::with(vec![
        match_fixture("1", MatchStatus::FirstHalf),
        match_fixture("2", MatchStatus::NotStarted),
    ])
}

fn timeline_entry(id: &str, match_id: &str) -> ServerMessage {
    ServerMessage::MatchEvent(MatchEvent {
        id: id.into(),
        match_id: match_id.into(),
        event_type: EventType::Goal,
        minute: 23,
        player: "Odegaard".into(),
        description: "Curled into the top corner".into(),
        team_side: TeamSide::Home,
    })
}

async fn open_view(
    sink: &RecordingSink,
    match_id: &str,
) -> (MatchDetailView<RecordingSink>, broadcast::Sender<ConnectionEvent>) {
    let (tx, rx) = broadcast::channel(16);
    let view = MatchDetailView::activate_with(&source(), sink.clone(), rx, match_id).await;
    (view, tx)
}

// ════════════════════════════════════════════════════════════════════
// Room membership
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn each_activation_subscribes_and_unsubscribes_once() {
    let sink = RecordingSink::new();

    for cycle in 1..=2 {
        let (view, _tx) = open_view(&sink, "1").await;
        assert!(view.room().is_subscribed());
        view.close();

        assert_eq!(sink.count("subscribe_match"), cycle);
        assert_eq!(sink.count("unsubscribe_match"), cycle);
    }
    assert_eq!(
        sink.sent(),
        vec![
            ClientMessage::SubscribeMatch("1".into()),
            ClientMessage::UnsubscribeMatch("1".into()),
            ClientMessage::SubscribeMatch("1".into()),
            ClientMessage::UnsubscribeMatch("1".into()),
        ]
    );
}

#[tokio::test]
async fn dropping_the_view_leaves_the_room() {
    let sink = RecordingSink::new();
    {
        let (_view, _tx) = open_view(&sink, "2").await;
    }
    assert_eq!(
        sink.sent(),
        vec![
            ClientMessage::SubscribeMatch("2".into()),
            ClientMessage::UnsubscribeMatch("2".into()),
        ]
    );
}

#[test]
fn unwinding_still_leaves_the_room() {
    let sink = RecordingSink::new();
    let guarded = sink.clone();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        let _room = RoomSubscription::acquire(guarded, "1");
        panic!("view crashed");
    }));

    assert!(result.is_err());
    assert_eq!(sink.count("subscribe_match"), 1);
    assert_eq!(sink.count("unsubscribe_match"), 1);
}

#[tokio::test]
async fn reconnect_rejoins_the_room() {
    let sink = RecordingSink::new();
    let (mut view, tx) = open_view(&sink, "1").await;

    tx.send(ConnectionEvent::Disconnected { reason: None }).unwrap();
    tx.send(ConnectionEvent::Connected).unwrap();
    assert_eq!(view.next_change().await, DetailChange::Connection(false));
    assert_eq!(view.next_change().await, DetailChange::Connection(true));

    assert_eq!(sink.count("subscribe_match"), 2);
    view.close();
    assert_eq!(sink.count("unsubscribe_match"), 1);
}

#[tokio::test]
async fn connect_already_covered_by_the_join_is_not_repeated() {
    let sink = RecordingSink::new();
    let (mut view, tx) = open_view(&sink, "1").await;

    // Queued before the join went out on the same link.
    tx.send(ConnectionEvent::Connected).unwrap();
    assert_eq!(view.next_change().await, DetailChange::Connection(true));
    assert_eq!(sink.count("subscribe_match"), 1);

    view.close();
    assert_eq!(sink.count("unsubscribe_match"), 1);
}

#[tokio::test]
async fn offline_activation_joins_once_link_is_up() {
    let sink = RecordingSink::new();
    sink.set_online(false);
    let (mut view, tx) = open_view(&sink, "1").await;
    assert!(!view.room().is_subscribed());
    assert!(sink.sent().is_empty());

    sink.set_online(true);
    tx.send(ConnectionEvent::Connected).unwrap();
    view.next_change().await;

    assert!(view.room().is_subscribed());
    assert_eq!(sink.sent(), vec![ClientMessage::SubscribeMatch("1".into())]);
}

// ════════════════════════════════════════════════════════════════════
// Reconciliation
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn missing_match_is_not_found() {
    let sink = RecordingSink::new();
    let (view, _tx) = open_view(&sink, "404").await;
    assert_eq!(view.detail().state(), &DetailState::NotFound);
    // The room is joined regardless of the fetch outcome.
    assert_eq!(sink.count("subscribe_match"), 1);
}

#[tokio::test]
async fn updates_for_other_matches_are_ignored() {
    let sink = RecordingSink::new();
    let (mut view, tx) = open_view(&sink, "1").await;

    tx.send(ConnectionEvent::Message(ServerMessage::MatchUpdate(
        MatchPatch::new("2").with_minute(88),
    )))
    .unwrap();
    tx.send(ConnectionEvent::Message(ServerMessage::MatchUpdate(
        MatchPatch::new("1")
            .with_minute(31)
            .with_score(1, 0),
    )))
    .unwrap();

    assert_eq!(view.next_change().await, DetailChange::Ignored);
    assert_eq!(view.next_change().await, DetailChange::Match);

    let current = view.detail().current().unwrap();
    assert_eq!(current.minute, 31);
    assert_eq!(current.score.home, 1);
    assert_eq!(current.status, MatchStatus::FirstHalf);
}

#[tokio::test]
async fn timeline_is_ordered_and_deduplicated() {
    let sink = RecordingSink::new();
    let (mut view, tx) = open_view(&sink, "1").await;

    for (id, match_id) in [("e1", "1"), ("e2", "1"), ("e1", "1"), ("e3", "2")] {
        tx.send(ConnectionEvent::Message(timeline_entry(id, match_id)))
            .unwrap();
    }

    assert_eq!(view.next_change().await, DetailChange::Event("e1".into()));
    assert_eq!(view.next_change().await, DetailChange::Event("e2".into()));
    assert_eq!(view.next_change().await, DetailChange::Ignored);
    assert_eq!(view.next_change().await, DetailChange::Ignored);

    let ids: Vec<&str> = view.detail().events().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["e1", "e2"]);
    assert_eq!(view.detail().timeline().len(), 2);
}

#[tokio::test]
async fn stats_snapshot_replaces_previous() {
    let sink = RecordingSink::new();
    let (mut view, tx) = open_view(&sink, "1").await;

    let first = MatchStats {
        possession: StatPair { home: 60, away: 40 },
        corners: StatPair { home: 3, away: 1 },
        ..MatchStats::default()
    };
    let second = MatchStats {
        possession: StatPair { home: 52, away: 48 },
        ..MatchStats::default()
    };
    for stats in [first, second] {
        tx.send(ConnectionEvent::Message(ServerMessage::StatsUpdate(
            StatsUpdate {
                match_id: "1".into(),
                stats,
            },
        )))
        .unwrap();
    }
    view.next_change().await;
    view.next_change().await;

    let stats = view.detail().stats().unwrap();
    assert_eq!(stats, &second);
    assert_eq!(stats.corners, StatPair::default());
}

// ════════════════════════════════════════════════════════════════════
// Against a live connection
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn activation_writes_room_packets() {
    let (connector, log) = MockConnector::new(vec![session(vec![])]);
    let config = PushConfig::default().with_shutdown_timeout(Duration::from_millis(500));
    let (mut connection, mut events) = PushConnection::open(connector, config);
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);

    let view = MatchDetailView::activate(&source(), &connection.handle(), "1").await;
    view.close();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        log.sent(),
        vec![
            "40".to_string(),
            r#"42["subscribe_match","1"]"#.to_string(),
            r#"42["unsubscribe_match","1"]"#.to_string(),
        ]
    );
    connection.close().await;
}
