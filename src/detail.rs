//! Single-match view: room membership, match state, timeline and stats.

use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::api::MatchSource;
use crate::connection::{ConnectionEvent, PushHandle, PushSink};
use crate::error::Result;
use crate::model::{Match, MatchEvent, MatchId, MatchStats};
use crate::protocol::{ClientMessage, ServerMessage};

// ── Room subscription ───────────────────────────────────────────────

/// Membership in one match room for as long as the guard lives.
///
/// Creating the guard emits `subscribe_match`; dropping it (or calling
/// [`release`](Self::release)) emits `unsubscribe_match`. The leave is sent
/// at most once on every exit path, including unwinding, and only if a join
/// was sent.
///
/// Room membership is per link on the server side. The owner reports a
/// dropped link with [`link_lost`](Self::link_lost) and calls
/// [`resubscribe`](Self::resubscribe) once a new link is up.
#[derive(Debug)]
pub struct RoomSubscription<S: PushSink> {
    sink: S,
    match_id: MatchId,
    subscribed: bool,
    released: bool,
}

impl<S: PushSink> RoomSubscription<S> {
    /// Join the room of `match_id`.
    ///
    /// If the link is down the join is left pending and is not retried on
    /// its own; see [`resubscribe`](Self::resubscribe).
    pub fn acquire(sink: S, match_id: impl Into<MatchId>) -> Self {
        let mut guard = Self {
            sink,
            match_id: match_id.into(),
            subscribed: false,
            released: false,
        };
        if let Err(e) = guard.subscribe() {
            debug!(match_id = %guard.match_id, "room join deferred: {e}");
        }
        guard
    }

    fn subscribe(&mut self) -> Result<()> {
        self.sink
            .emit(ClientMessage::SubscribeMatch(self.match_id.clone()))?;
        self.subscribed = true;
        Ok(())
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Whether the last join reached the push channel.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// The link carrying the membership went down; the server forgot it.
    pub fn link_lost(&mut self) {
        self.subscribed = false;
    }

    /// Join again unless the current link already carries the membership.
    pub fn resubscribe(&mut self) -> Result<()> {
        if self.subscribed || self.released {
            return Ok(());
        }
        self.subscribe()
    }

    /// Leave the room now.
    pub fn release(mut self) {
        self.unsubscribe();
    }

    fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // Nothing to leave if no join ever went out.
        if !std::mem::take(&mut self.subscribed) {
            return;
        }
        if let Err(e) = self
            .sink
            .emit(ClientMessage::UnsubscribeMatch(self.match_id.clone()))
        {
            debug!(match_id = %self.match_id, "room leave not delivered: {e}");
        }
    }
}

impl<S: PushSink> Drop for RoomSubscription<S> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ── Reconciler ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Loaded(Match),
    /// The fetch failed. Terminal.
    NotFound,
}

/// What a single push event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailChange {
    Match,
    /// A new timeline entry, by event id.
    Event(String),
    Stats,
    Ignored,
    /// The link went up or down.
    Connection(bool),
    Closed,
}

/// State of the detail view for one match.
#[derive(Debug, Clone)]
pub struct MatchDetail {
    match_id: MatchId,
    state: DetailState,
    events: Vec<MatchEvent>,
    seen_events: HashSet<String>,
    stats: Option<MatchStats>,
}

impl MatchDetail {
    pub fn new(match_id: impl Into<MatchId>) -> Self {
        Self {
            match_id: match_id.into(),
            state: DetailState::Loading,
            events: Vec::new(),
            seen_events: HashSet::new(),
            stats: None,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    /// The loaded match, if any.
    pub fn current(&self) -> Option<&Match> {
        match &self.state {
            DetailState::Loaded(m) => Some(m),
            _ => None,
        }
    }

    /// Timeline in arrival order.
    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    /// Timeline for display: latest minute first, arrival order within a minute.
    pub fn timeline(&self) -> Vec<&MatchEvent> {
        let mut sorted: Vec<&MatchEvent> = self.events.iter().collect();
        sorted.sort_by(|a, b| b.minute.cmp(&a.minute));
        sorted
    }

    pub fn stats(&self) -> Option<&MatchStats> {
        self.stats.as_ref()
    }

    /// Install the outcome of the initial fetch.
    pub fn seed(&mut self, result: Result<Match>) {
        self.state = match result {
            Ok(m) => DetailState::Loaded(m),
            Err(e) => {
                warn!(match_id = %self.match_id, "failed to fetch match: {e}");
                DetailState::NotFound
            }
        };
    }

    /// Fold one push message into the view.
    pub fn apply(&mut self, message: &ServerMessage) -> DetailChange {
        match message {
            ServerMessage::MatchUpdate(patch) => {
                if patch.id != self.match_id {
                    return DetailChange::Ignored;
                }
                match &mut self.state {
                    DetailState::Loaded(m) => {
                        m.apply_patch(patch);
                        DetailChange::Match
                    }
                    _ => DetailChange::Ignored,
                }
            }
            ServerMessage::MatchEvent(event) => {
                if event.match_id != self.match_id {
                    return DetailChange::Ignored;
                }
                if !self.seen_events.insert(event.id.clone()) {
                    trace!(event_id = %event.id, "duplicate match event dropped");
                    return DetailChange::Ignored;
                }
                self.events.push(event.clone());
                DetailChange::Event(event.id.clone())
            }
            ServerMessage::StatsUpdate(update) => {
                if update.match_id != self.match_id {
                    return DetailChange::Ignored;
                }
                self.stats = Some(update.stats);
                DetailChange::Stats
            }
            _ => DetailChange::Ignored,
        }
    }
}

// ── View driver ─────────────────────────────────────────────────────

/// A live detail view: reconciler, room guard and push subscription.
#[derive(Debug)]
pub struct MatchDetailView<S: PushSink = PushHandle> {
    detail: MatchDetail,
    room: RoomSubscription<S>,
    events: broadcast::Receiver<ConnectionEvent>,
}

impl MatchDetailView<PushHandle> {
    /// Listen on `push`, join the room and load the match.
    pub async fn activate<Src>(source: &Src, push: &PushHandle, match_id: &str) -> Self
    where
        Src: MatchSource + ?Sized,
    {
        Self::activate_with(source, push.clone(), push.subscribe(), match_id).await
    }
}

impl<S: PushSink> MatchDetailView<S> {
    /// [`activate`](MatchDetailView::activate) with an explicit sink and listener.
    pub async fn activate_with<Src>(
        source: &Src,
        sink: S,
        events: broadcast::Receiver<ConnectionEvent>,
        match_id: &str,
    ) -> Self
    where
        Src: MatchSource + ?Sized,
    {
        let room = RoomSubscription::acquire(sink, match_id);
        let mut detail = MatchDetail::new(match_id);
        detail.seed(source.match_by_id(match_id).await);
        Self {
            detail,
            room,
            events,
        }
    }

    pub fn detail(&self) -> &MatchDetail {
        &self.detail
    }

    pub fn room(&self) -> &RoomSubscription<S> {
        &self.room
    }

    /// Apply one connection event.
    pub fn handle(&mut self, event: ConnectionEvent) -> DetailChange {
        match event {
            ConnectionEvent::Message(message) => self.detail.apply(&message),
            ConnectionEvent::Connected => {
                if let Err(e) = self.room.resubscribe() {
                    warn!(match_id = %self.detail.match_id, "room rejoin failed: {e}");
                }
                DetailChange::Connection(true)
            }
            ConnectionEvent::Disconnected { .. } => {
                self.room.link_lost();
                DetailChange::Connection(false)
            }
            ConnectionEvent::Reconnecting { .. } => DetailChange::Ignored,
            ConnectionEvent::Closed => DetailChange::Closed,
        }
    }

    /// Wait for the next push event and apply it.
    pub async fn next_change(&mut self) -> DetailChange {
        loop {
            match self.events.recv().await {
                Ok(event) => return self.handle(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "detail view fell behind the push channel");
                }
                Err(broadcast::error::RecvError::Closed) => return DetailChange::Closed,
            }
        }
    }

    /// Leave the room and return the final state.
    pub fn close(self) -> MatchDetail {
        let Self { detail, room, .. } = self;
        room.release();
        detail
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
    use crate::error::LiveMatchError;
    use crate::model::{EventType, MatchPatch, MatchScore, MatchStatus, StatPair, Team, TeamSide};
    use crate::protocol::StatsUpdate;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<ClientMessage>>>,
        offline: bool,
    }

    impl PushSink for Recorder {
        fn emit(&self, message: ClientMessage) -> Result<()> {
            if self.offline {
                return Err(LiveMatchError::NotConnected);
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.offline
        }
    }

    fn sample(id: &str) -> Match {
        let team = |n: &str| Team {
            name: n.into(),
            short_name: n.into(),
            logo: None,
        };
        Match {
            id: id.into(),
            home_team: team("HOM"),
            away_team: team("AWA"),
            score: MatchScore::default(),
            status: MatchStatus::FirstHalf,
            minute: 12,
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap(),
        }
    }

    fn goal_at(id: &str, minute: u32) -> ServerMessage {
        ServerMessage::MatchEvent(MatchEvent {
            id: id.into(),
            match_id: "1".into(),
            event_type: EventType::Goal,
            minute,
            player: "Havertz".into(),
            description: "Header".into(),
            team_side: TeamSide::Away,
        })
    }

    fn goal(id: &str, match_id: &str) -> ServerMessage {
        ServerMessage::MatchEvent(MatchEvent {
            id: id.into(),
            match_id: match_id.into(),
            event_type: EventType::Goal,
            minute: 30,
            player: "Saka".into(),
            description: "Goal!".into(),
            team_side: TeamSide::Home,
        })
    }

    #[test]
    fn guard_subscribes_once_and_unsubscribes_on_drop() {
        let sink = Recorder::default();
        {
            let guard = RoomSubscription::acquire(sink.clone(), "5");
            assert!(guard.is_subscribed());
        }
        assert_eq!(
            sink.sent.lock().unwrap().as_slice(),
            [
                ClientMessage::SubscribeMatch("5".into()),
                ClientMessage::UnsubscribeMatch("5".into())
            ]
        );
    }

    #[test]
    fn explicit_release_does_not_repeat_on_drop() {
        let sink = Recorder::default();
        RoomSubscription::acquire(sink.clone(), "5").release();
        assert_eq!(sink.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn offline_acquire_is_pending() {
        let sink = Recorder {
            offline: true,
            ..Recorder::default()
        };
        let guard = RoomSubscription::acquire(sink, "5");
        assert!(!guard.is_subscribed());
    }

    #[test]
    fn update_for_other_match_is_ignored() {
        let mut detail = MatchDetail::new("1");
        detail.seed(Ok(sample("1")));

        let change = detail.apply(&ServerMessage::MatchUpdate(MatchPatch::new("2").with_minute(80)));
        assert_eq!(change, DetailChange::Ignored);
        assert_eq!(detail.current().unwrap().minute, 12);

        let change = detail.apply(&ServerMessage::MatchUpdate(MatchPatch::new("1").with_minute(44)));
        assert_eq!(change, DetailChange::Match);
        assert_eq!(detail.current().unwrap().minute, 44);
    }

    #[test]
    fn update_before_load_is_ignored() {
        let mut detail = MatchDetail::new("1");
        let change = detail.apply(&ServerMessage::MatchUpdate(MatchPatch::new("1").with_minute(44)));
        assert_eq!(change, DetailChange::Ignored);
        assert_eq!(detail.state(), &DetailState::Loading);
    }

    #[test]
    fn duplicate_events_are_dropped() {
        let mut detail = MatchDetail::new("1");
        assert_eq!(detail.apply(&goal("e1", "1")), DetailChange::Event("e1".into()));
        assert_eq!(detail.apply(&goal("e1", "1")), DetailChange::Ignored);
        assert_eq!(detail.apply(&goal("e2", "9")), DetailChange::Ignored);
        assert_eq!(detail.events().len(), 1);
    }

    #[test]
    fn stats_are_replaced_wholesale() {
        let mut detail = MatchDetail::new("1");
        let stats = MatchStats {
            shots: StatPair { home: 4, away: 2 },
            ..MatchStats::default()
        };
        detail.apply(&ServerMessage::StatsUpdate(StatsUpdate {
            match_id: "1".into(),
            stats,
        }));

        let replacement = MatchStats::default();
        detail.apply(&ServerMessage::StatsUpdate(StatsUpdate {
            match_id: "1".into(),
            stats: replacement,
        }));
        assert_eq!(detail.stats(), Some(&replacement));
    }

    #[test]
    fn timeline_is_latest_minute_first() {
        let mut detail = MatchDetail::new("1");
        for (id, minute) in [("e1", 12), ("e2", 67), ("e3", 12), ("e4", 45)] {
            detail.apply(&goal_at(id, minute));
        }
        let ids: Vec<&str> = detail.timeline().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e2", "e4", "e1", "e3"]);
        assert_eq!(detail.events()[0].id, "e1");
    }

    #[test]
    fn resubscribe_on_a_live_membership_is_silent() {
        let sink = Recorder::default();
        let mut guard = RoomSubscription::acquire(sink.clone(), "5");
        guard.resubscribe().unwrap();
        assert_eq!(sink.sent.lock().unwrap().len(), 1);

        guard.link_lost();
        guard.resubscribe().unwrap();
        assert_eq!(sink.sent.lock().unwrap().len(), 2);
        assert!(guard.is_subscribed());
    }

    #[test]
    fn failed_fetch_is_not_found() {
        let mut detail = MatchDetail::new("1");
        detail.seed(Err(LiveMatchError::HttpStatus {
            status: 404,
            url: "http://x/matches/1".into(),
        }));
        assert_eq!(detail.state(), &DetailState::NotFound);
    }
}
