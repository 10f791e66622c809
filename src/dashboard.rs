//! Match list reconciliation for the dashboard.
//!
//! [`MatchBoard`] owns the list loaded over HTTP and folds broadcast push
//! updates into it. [`Dashboard`] ties a board to a push subscription and
//! tracks the online indicator.

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::api::MatchSource;
use crate::connection::{ConnectionEvent, PushHandle, PushSink};
use crate::error::Result;
use crate::model::{Match, MatchId, MatchPatch, MatchPhase};
use crate::protocol::{ScoreUpdate, ServerMessage, StatusChange};

/// Text shown when the initial load fails.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load matches.";

// ── Board ───────────────────────────────────────────────────────────

/// The dashboard's match list.
///
/// Order is the server's order and never changes; updates only rewrite
/// fields of matches that are already present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchBoard {
    matches: Vec<Match>,
}

/// The board split by phase. Borrowed, recomputed per call.
#[derive(Debug, Default, PartialEq)]
pub struct Partition<'a> {
    pub live: Vec<&'a Match>,
    pub upcoming: Vec<&'a Match>,
    pub finished: Vec<&'a Match>,
}

impl MatchBoard {
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    /// Replace the score of one match. Returns `false` for unknown ids.
    pub fn apply_score(&mut self, update: &ScoreUpdate) -> bool {
        let Some(m) = self.get_mut(&update.match_id) else {
            trace!(match_id = %update.match_id, "score update for unknown match");
            return false;
        };
        m.score = update.score;
        true
    }

    /// Replace the status of one match. Returns `false` for unknown ids.
    ///
    /// A status that moves backwards is still applied.
    pub fn apply_status(&mut self, update: &StatusChange) -> bool {
        let Some(m) = self.get_mut(&update.match_id) else {
            trace!(match_id = %update.match_id, "status change for unknown match");
            return false;
        };
        if update.status < m.status {
            warn!(
                match_id = %m.id,
                from = ?m.status,
                to = ?update.status,
                "match status moved backwards"
            );
        }
        m.status = update.status;
        true
    }

    /// Merge a partial update into one match. Returns `false` for unknown ids.
    pub fn apply_patch(&mut self, patch: &MatchPatch) -> bool {
        let Some(m) = self.get_mut(&patch.id) else {
            trace!(match_id = %patch.id, "match update for unknown match");
            return false;
        };
        if let Some(status) = patch.status {
            if status < m.status {
                warn!(match_id = %m.id, from = ?m.status, to = ?status, "match status moved backwards");
            }
        }
        m.apply_patch(patch);
        true
    }

    /// Apply any push message. Only score, status and generic match updates
    /// touch the board; everything else returns `false`.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::ScoreUpdate(u) => self.apply_score(u),
            ServerMessage::StatusChange(u) => self.apply_status(u),
            ServerMessage::MatchUpdate(p) => self.apply_patch(p),
            _ => false,
        }
    }

    fn in_phase(&self, phase: MatchPhase) -> Vec<&Match> {
        self.matches.iter().filter(|m| m.phase() == phase).collect()
    }

    pub fn live(&self) -> Vec<&Match> {
        self.in_phase(MatchPhase::Live)
    }

    pub fn upcoming(&self) -> Vec<&Match> {
        self.in_phase(MatchPhase::Upcoming)
    }

    pub fn finished(&self) -> Vec<&Match> {
        self.in_phase(MatchPhase::Finished)
    }

    /// All three partitions in a single pass.
    pub fn partition(&self) -> Partition<'_> {
        let mut out = Partition::default();
        for m in &self.matches {
            match m.phase() {
                MatchPhase::Live => out.live.push(m),
                MatchPhase::Upcoming => out.upcoming.push(m),
                MatchPhase::Finished => out.finished.push(m),
            }
        }
        out
    }
}

// ── View driver ─────────────────────────────────────────────────────

/// What the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Loading,
    Ready(MatchBoard),
    /// The initial load failed. Terminal; there is no retry.
    Failed(String),
}

/// Result of one [`Dashboard::next_change`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardChange {
    /// A match on the board changed.
    Updated(MatchId),
    /// An event arrived that did not change the board.
    Ignored,
    /// The online indicator changed.
    Connection(bool),
    /// The push channel is gone for good.
    Closed,
}

/// Dashboard view state plus its push subscription.
#[derive(Debug)]
pub struct Dashboard {
    state: DashboardState,
    events: broadcast::Receiver<ConnectionEvent>,
    connected: bool,
}

impl Dashboard {
    /// A loading dashboard listening on `events`.
    pub fn new(events: broadcast::Receiver<ConnectionEvent>, connected: bool) -> Self {
        Self {
            state: DashboardState::Loading,
            events,
            connected,
        }
    }

    /// Subscribe to `push` and pick up its current link state.
    pub fn attach(push: &PushHandle) -> Self {
        Self::new(push.subscribe(), push.is_connected())
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn board(&self) -> Option<&MatchBoard> {
        match &self.state {
            DashboardState::Ready(board) => Some(board),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Fetch the list once.
    pub async fn load<S: MatchSource + ?Sized>(&mut self, source: &S) -> &DashboardState {
        let result = source.all_matches().await;
        self.seed(result);
        &self.state
    }

    /// Install the outcome of the initial fetch.
    pub fn seed(&mut self, result: Result<Vec<Match>>) {
        self.state = match result {
            Ok(matches) => {
                debug!(count = matches.len(), "dashboard loaded");
                DashboardState::Ready(MatchBoard::new(matches))
            }
            Err(e) => {
                warn!("failed to fetch matches: {e}");
                DashboardState::Failed(LOAD_FAILED_MESSAGE.to_string())
            }
        };
    }

    /// Apply one connection event.
    pub fn handle(&mut self, event: ConnectionEvent) -> BoardChange {
        match event {
            ConnectionEvent::Connected => self.set_connected(true),
            ConnectionEvent::Disconnected { .. } => self.set_connected(false),
            ConnectionEvent::Reconnecting { .. } => BoardChange::Ignored,
            ConnectionEvent::Closed => {
                self.connected = false;
                BoardChange::Closed
            }
            ConnectionEvent::Message(message) => {
                let DashboardState::Ready(board) = &mut self.state else {
                    return BoardChange::Ignored;
                };
                if board.apply(&message) {
                    message
                        .match_id()
                        .map_or(BoardChange::Ignored, |id| BoardChange::Updated(id.to_string()))
                } else {
                    BoardChange::Ignored
                }
            }
        }
    }

    fn set_connected(&mut self, connected: bool) -> BoardChange {
        if self.connected == connected {
            return BoardChange::Ignored;
        }
        self.connected = connected;
        BoardChange::Connection(connected)
    }

    /// Wait for the next push event and apply it.
    pub async fn next_change(&mut self) -> BoardChange {
        loop {
            match self.events.recv().await {
                Ok(event) => return self.handle(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind the push channel");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.connected = false;
                    return BoardChange::Closed;
                }
            }
        }
    }
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
    use crate::model::{MatchScore, MatchStatus, Team};
    use chrono::{TimeZone, Utc};

    fn team(name: &str) -> Team {
        Team {
            name: name.into(),
            short_name: name[..3].to_uppercase(),
            logo: None,
        }
    }

    fn fixture(id: &str, status: MatchStatus) -> Match {
        Match {
            id: id.into(),
            home_team: team("Home"),
            away_team: team("Away"),
            score: MatchScore { home: 0, away: 0 },
            status,
            minute: 0,
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap(),
        }
    }

    fn status(id: &str, status: MatchStatus) -> StatusChange {
        StatusChange {
            match_id: id.into(),
            status,
        }
    }

    #[test]
    fn status_change_moves_match_between_partitions() {
        let mut board = MatchBoard::new(vec![fixture("1", MatchStatus::NotStarted)]);
        let before = board.get("1").cloned().unwrap();
        assert_eq!(board.upcoming().len(), 1);

        assert!(board.apply_status(&status("1", MatchStatus::FirstHalf)));

        assert!(board.upcoming().is_empty());
        assert_eq!(board.live().len(), 1);
        let after = board.get("1").unwrap();
        assert_eq!(after.score, before.score);
        assert_eq!(after.minute, before.minute);
        assert_eq!(after.home_team, before.home_team);
    }

    #[test]
    fn unknown_match_is_a_no_op() {
        let mut board = MatchBoard::new(vec![fixture("1", MatchStatus::NotStarted)]);
        let snapshot = board.clone();

        assert!(!board.apply_status(&status("99", MatchStatus::FullTime)));
        assert!(!board.apply_score(&ScoreUpdate {
            match_id: "99".into(),
            score: MatchScore { home: 3, away: 3 },
        }));
        assert!(!board.apply_patch(&MatchPatch::new("99").with_minute(10)));

        assert_eq!(board, snapshot);
    }

    #[test]
    fn score_update_touches_only_score() {
        let mut board = MatchBoard::new(vec![fixture("1", MatchStatus::SecondHalf)]);
        board.apply_score(&ScoreUpdate {
            match_id: "1".into(),
            score: MatchScore { home: 2, away: 1 },
        });
        let m = board.get("1").unwrap();
        assert_eq!(m.score, MatchScore { home: 2, away: 1 });
        assert_eq!(m.status, MatchStatus::SecondHalf);
    }

    #[test]
    fn regression_is_applied() {
        let mut board = MatchBoard::new(vec![fixture("1", MatchStatus::FullTime)]);
        assert!(board.apply_status(&status("1", MatchStatus::SecondHalf)));
        assert_eq!(board.get("1").unwrap().status, MatchStatus::SecondHalf);
    }

    #[test]
    fn partition_covers_board() {
        let board = MatchBoard::new(vec![
            fixture("1", MatchStatus::NotStarted),
            fixture("2", MatchStatus::HalfTime),
            fixture("3", MatchStatus::FullTime),
            fixture("4", MatchStatus::FirstHalf),
        ]);
        let p = board.partition();
        assert_eq!(p.live.len() + p.upcoming.len() + p.finished.len(), board.len());
        assert_eq!(
            p.live.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            ["2", "4"]
        );
        assert_eq!(p.live, board.live());
    }

    #[test]
    fn non_board_messages_are_ignored() {
        let mut board = MatchBoard::new(vec![fixture("1", MatchStatus::FirstHalf)]);
        let msg = ServerMessage::UserJoined(crate::protocol::UserJoined {
            username: "x".into(),
        });
        assert!(!board.apply(&msg));
    }

    #[test]
    fn failed_load_is_terminal_message() {
        let (_tx, rx) = broadcast::channel(4);
        let mut dashboard = Dashboard::new(rx, false);
        dashboard.seed(Err(crate::error::LiveMatchError::Timeout));
        assert_eq!(
            dashboard.state(),
            &DashboardState::Failed("Failed to load matches.".into())
        );
        assert!(dashboard.board().is_none());
    }

    #[test]
    fn connection_indicator_follows_events() {
        let (_tx, rx) = broadcast::channel(4);
        let mut dashboard = Dashboard::new(rx, false);

        assert_eq!(dashboard.handle(ConnectionEvent::Connected), BoardChange::Connection(true));
        assert_eq!(dashboard.handle(ConnectionEvent::Connected), BoardChange::Ignored);
        assert_eq!(
            dashboard.handle(ConnectionEvent::Disconnected { reason: None }),
            BoardChange::Connection(false)
        );
        assert!(!dashboard.is_connected());
    }
}
