#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Dashboard reconciliation tests.
//!
//! Covers last-write-wins under every ordering of a small update set, the
//! partition invariant, and the load/connectivity behaviour of `Dashboard`.

mod common;

use live_match_client::model::{MatchPatch, MatchScore};
use live_match_client::protocol::{ScoreUpdate, ServerMessage, StatusChange};
use live_match_client::{
    BoardChange, ConnectionEvent, Dashboard, DashboardState, MatchBoard, MatchStatus,
};
use tokio::sync::broadcast;

use common::{match_fixture, FakeMatchSource};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn score(id: &str, home: u32, away: u32) -> ServerMessage {
    ServerMessage::ScoreUpdate(ScoreUpdate {
        match_id: id.into(),
        score: MatchScore { home, away },
    })
}

fn status(id: &str, status: MatchStatus) -> ServerMessage {
    ServerMessage::StatusChange(StatusChange {
        match_id: id.into(),
        status,
    })
}

fn patch(p: MatchPatch) -> ServerMessage {
    ServerMessage::MatchUpdate(p)
}

/// Every ordering of `items` (Heap's algorithm).
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        heap(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap(k - 1, items, out);
        }
    }
    let mut items = items.to_vec();
    let mut out = Vec::new();
    heap(items.len(), &mut items, &mut out);
    out
}

fn assert_partition_invariant(board: &MatchBoard) {
    let p = board.partition();
    assert_eq!(
        p.live.len() + p.upcoming.len() + p.finished.len(),
        board.len(),
        "partitions must cover the board"
    );
    for m in board.matches() {
        let hits = [&p.live, &p.upcoming, &p.finished]
            .iter()
            .filter(|group| group.iter().any(|g| g.id == m.id))
            .count();
        assert_eq!(hits, 1, "match {} must be in exactly one partition", m.id);
    }
}

// ════════════════════════════════════════════════════════════════════
// Reconciliation properties
// ════════════════════════════════════════════════════════════════════

#[test]
fn last_applied_update_wins_in_every_order() {
    let updates = vec![
        score("1", 1, 0),
        status("1", MatchStatus::SecondHalf),
        patch(MatchPatch::new("1").with_score(2, 2).with_minute(70)),
        patch(MatchPatch::new("1").with_status(MatchStatus::FullTime)),
        score("99", 5, 5),
    ];

    for order in permutations(&updates) {
        let mut board = MatchBoard::new(vec![match_fixture("1", MatchStatus::FirstHalf)]);
        for update in &order {
            board.apply(update);
        }

        let mut expected_score = MatchScore::default();
        let mut expected_status = MatchStatus::FirstHalf;
        let mut expected_minute = 0;
        for update in &order {
            match update {
                ServerMessage::ScoreUpdate(u) if u.match_id == "1" => expected_score = u.score,
                ServerMessage::StatusChange(u) if u.match_id == "1" => expected_status = u.status,
                ServerMessage::MatchUpdate(p) if p.id == "1" => {
                    if let Some(s) = p.score {
                        expected_score = s;
                    }
                    if let Some(s) = p.status {
                        expected_status = s;
                    }
                    if let Some(m) = p.minute {
                        expected_minute = m;
                    }
                }
                _ => {}
            }
        }

        let m = board.get("1").unwrap();
        assert_eq!(m.score, expected_score, "order: {order:?}");
        assert_eq!(m.status, expected_status, "order: {order:?}");
        assert_eq!(m.minute, expected_minute, "order: {order:?}");
        assert_eq!(board.len(), 1);
        assert_partition_invariant(&board);
    }
}

#[test]
fn partitions_hold_through_a_whole_match_day() {
    let mut board = MatchBoard::new(vec![
        match_fixture("1", MatchStatus::NotStarted),
        match_fixture("2", MatchStatus::NotStarted),
        match_fixture("3", MatchStatus::FirstHalf),
    ]);
    assert_partition_invariant(&board);

    let timeline = [
        status("1", MatchStatus::FirstHalf),
        status("3", MatchStatus::HalfTime),
        status("2", MatchStatus::FirstHalf),
        status("3", MatchStatus::SecondHalf),
        status("1", MatchStatus::HalfTime),
        status("3", MatchStatus::FullTime),
        status("1", MatchStatus::SecondHalf),
        status("1", MatchStatus::FullTime),
        status("2", MatchStatus::FullTime),
    ];
    for update in &timeline {
        assert!(board.apply(update));
        assert_partition_invariant(&board);
    }
    assert_eq!(board.finished().len(), 3);
    assert!(board.live().is_empty());
}

#[test]
fn kickoff_moves_match_from_upcoming_to_live_only() {
    let mut board = MatchBoard::new(vec![match_fixture("1", MatchStatus::NotStarted)]);
    let before = board.get("1").cloned().unwrap();

    board.apply(&status("1", MatchStatus::FirstHalf));

    assert!(board.upcoming().is_empty());
    assert_eq!(board.live().len(), 1);
    let after = board.get("1").unwrap();
    assert_eq!(after.status, MatchStatus::FirstHalf);
    assert_eq!(after.score, before.score);
    assert_eq!(after.minute, before.minute);
    assert_eq!(after.start_time, before.start_time);
    assert_eq!(after.home_team, before.home_team);
    assert_eq!(after.away_team, before.away_team);
}

#[test]
fn server_order_is_preserved() {
    let mut board = MatchBoard::new(vec![
        match_fixture("b", MatchStatus::NotStarted),
        match_fixture("a", MatchStatus::FullTime),
        match_fixture("c", MatchStatus::FirstHalf),
    ]);
    board.apply(&status("a", MatchStatus::FirstHalf));
    let ids: Vec<&str> = board.matches().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["b", "a", "c"]);
    let live: Vec<&str> = board.live().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(live, ["a", "c"]);
}

// ════════════════════════════════════════════════════════════════════
// Dashboard driver
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn load_success_makes_board_ready() {
    let source = FakeMatchSource::with(vec![
        match_fixture("1", MatchStatus::NotStarted),
        match_fixture("2", MatchStatus::SecondHalf),
    ]);
    let (_tx, rx) = broadcast::channel(8);
    let mut dashboard = Dashboard::new(rx, false);
    assert_eq!(dashboard.state(), &DashboardState::Loading);

    dashboard.load(&source).await;

    let board = dashboard.board().expect("ready");
    assert_eq!(board.len(), 2);
    assert_eq!(board.live().len(), 1);
}

#[tokio::test]
async fn load_failure_is_terminal() {
    let (tx, rx) = broadcast::channel(8);
    let mut dashboard = Dashboard::new(rx, true);

    dashboard.load(&FakeMatchSource::failing()).await;
    assert_eq!(
        dashboard.state(),
        &DashboardState::Failed("Failed to load matches.".into())
    );

    tx.send(ConnectionEvent::Message(score("1", 1, 0))).unwrap();
    assert_eq!(dashboard.next_change().await, BoardChange::Ignored);
    assert!(matches!(dashboard.state(), DashboardState::Failed(_)));
}

#[tokio::test]
async fn next_change_applies_push_updates() {
    let (tx, rx) = broadcast::channel(8);
    let mut dashboard = Dashboard::new(rx, false);
    dashboard.seed(Ok(vec![match_fixture("1", MatchStatus::NotStarted)]));

    tx.send(ConnectionEvent::Connected).unwrap();
    tx.send(ConnectionEvent::Message(status("1", MatchStatus::FirstHalf)))
        .unwrap();
    tx.send(ConnectionEvent::Message(score("404", 1, 0))).unwrap();
    tx.send(ConnectionEvent::Disconnected { reason: None }).unwrap();
    drop(tx);

    assert_eq!(dashboard.next_change().await, BoardChange::Connection(true));
    assert_eq!(
        dashboard.next_change().await,
        BoardChange::Updated("1".into())
    );
    assert_eq!(dashboard.next_change().await, BoardChange::Ignored);
    assert_eq!(dashboard.next_change().await, BoardChange::Connection(false));
    assert_eq!(dashboard.next_change().await, BoardChange::Closed);

    assert_eq!(dashboard.board().unwrap().live().len(), 1);
}

#[tokio::test]
async fn lagging_dashboard_skips_and_continues() {
    let (tx, rx) = broadcast::channel(2);
    let mut dashboard = Dashboard::new(rx, false);
    dashboard.seed(Ok(vec![match_fixture("1", MatchStatus::FirstHalf)]));

    for home in 1..=4 {
        tx.send(ConnectionEvent::Message(score("1", home, 0))).unwrap();
    }

    // The two oldest updates were overwritten; the next step still applies one.
    assert_eq!(
        dashboard.next_change().await,
        BoardChange::Updated("1".into())
    );
    assert_eq!(dashboard.board().unwrap().get("1").unwrap().score.home, 3);
}
