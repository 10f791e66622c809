//! Domain types mirrored from the match service.
//!
//! Every type here produces the same camelCase JSON the HTTP API and the
//! push channel use. Timestamps are parsed into [`chrono::DateTime<Utc>`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned match identifier.
pub type MatchId = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Match clock status.
///
/// Variants are declared in the order a match moves through them, so the
/// derived `Ord` can be used to spot regressive transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    NotStarted,
    FirstHalf,
    HalfTime,
    SecondHalf,
    FullTime,
}

/// Dashboard grouping derived from [`MatchStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchPhase {
    /// `NOT_STARTED`
    Upcoming,
    /// `FIRST_HALF`, `HALF_TIME`, `SECOND_HALF`
    Live,
    /// `FULL_TIME`
    Finished,
}

impl MatchStatus {
    /// Which dashboard group a match with this status belongs to.
    pub fn phase(self) -> MatchPhase {
        match self {
            Self::NotStarted => MatchPhase::Upcoming,
            Self::FirstHalf | Self::HalfTime | Self::SecondHalf => MatchPhase::Live,
            Self::FullTime => MatchPhase::Finished,
        }
    }

    /// Returns `true` while the match clock is running.
    pub fn is_in_play(self) -> bool {
        matches!(self, Self::FirstHalf | Self::SecondHalf)
    }

    /// Human readable label, e.g. `"FIRST HALF"`.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT STARTED",
            Self::FirstHalf => "FIRST HALF",
            Self::HalfTime => "HALF TIME",
            Self::SecondHalf => "SECOND HALF",
            Self::FullTime => "FULL TIME",
        }
    }
}

/// Kind of a timeline entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Goal,
    YellowCard,
    RedCard,
    Substitution,
    Foul,
    Shot,
}

/// Which side of the fixture an event or counter belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

// ── Structs ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MatchScore {
    pub home: u32,
    pub away: u32,
}

/// One tracked fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub home_team: Team,
    pub away_team: Team,
    /// Missing before kick-off on some feeds; reads as 0-0.
    #[serde(default)]
    pub score: MatchScore,
    pub status: MatchStatus,
    pub minute: u32,
    pub start_time: DateTime<Utc>,
}

impl Match {
    /// Dashboard grouping for the current status.
    pub fn phase(&self) -> MatchPhase {
        self.status.phase()
    }

    /// Shallow-merge `patch` into this match.
    ///
    /// Every field present in the patch replaces the held value wholesale;
    /// nested objects such as `score` or a team are never merged field by
    /// field. The `id` is a lookup key and is left untouched.
    pub fn apply_patch(&mut self, patch: &MatchPatch) {
        if let Some(team) = &patch.home_team {
            self.home_team = team.clone();
        }
        if let Some(team) = &patch.away_team {
            self.away_team = team.clone();
        }
        if let Some(score) = patch.score {
            self.score = score;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(minute) = patch.minute {
            self.minute = minute;
        }
        if let Some(start_time) = patch.start_time {
            self.start_time = start_time;
        }
    }
}

/// Generic partial update pushed as `match_update`.
///
/// Absent (or `null`) fields leave the held value unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchPatch {
    pub id: MatchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_team: Option<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<MatchScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl MatchPatch {
    /// An empty patch for `id`.
    pub fn new(id: impl Into<MatchId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_score(mut self, home: u32, away: u32) -> Self {
        self.score = Some(MatchScore { home, away });
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_minute(mut self, minute: u32) -> Self {
        self.minute = Some(minute);
        self
    }
}

/// A single timeline entry for a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: String,
    pub match_id: MatchId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub minute: u32,
    pub player: String,
    pub description: String,
    pub team_side: TeamSide,
}

/// A home/away counter pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatPair {
    pub home: u32,
    pub away: u32,
}

impl StatPair {
    pub fn get(self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.home,
            TeamSide::Away => self.away,
        }
    }

    /// Percentage of the combined total held by `side`.
    ///
    /// An all-zero pair splits 50/50.
    pub fn share(self, side: TeamSide) -> f64 {
        let total = u64::from(self.home) + u64::from(self.away);
        if total == 0 {
            return 50.0;
        }
        f64::from(self.get(side)) * 100.0 / total as f64
    }
}

/// Full statistics snapshot. Always replaced as a whole.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    pub possession: StatPair,
    pub shots: StatPair,
    pub shots_on_target: StatPair,
    pub corners: StatPair,
    pub fouls: StatPair,
    pub yellow_cards: StatPair,
    pub red_cards: StatPair,
}

/// A chat line in a match room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub match_id: MatchId,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
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

    fn sample_match() -> Match {
        serde_json::from_value(serde_json::json!({
            "id": "m1",
            "homeTeam": { "name": "Arsenal", "shortName": "ARS" },
            "awayTeam": { "name": "Chelsea", "shortName": "CHE", "logo": "https://img/che.png" },
            "score": { "home": 0, "away": 0 },
            "status": "NOT_STARTED",
            "minute": 0,
            "startTime": "2026-05-01T14:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn match_parses_camel_case_json() {
        let m = sample_match();
        assert_eq!(m.home_team.short_name, "ARS");
        assert!(m.home_team.logo.is_none());
        assert_eq!(m.away_team.logo.as_deref(), Some("https://img/che.png"));
        assert_eq!(m.status, MatchStatus::NotStarted);
        assert_eq!(m.start_time.to_rfc3339(), "2026-05-01T14:00:00+00:00");
    }

    #[test]
    fn status_phases() {
        assert_eq!(MatchStatus::NotStarted.phase(), MatchPhase::Upcoming);
        assert_eq!(MatchStatus::FirstHalf.phase(), MatchPhase::Live);
        assert_eq!(MatchStatus::HalfTime.phase(), MatchPhase::Live);
        assert_eq!(MatchStatus::SecondHalf.phase(), MatchPhase::Live);
        assert_eq!(MatchStatus::FullTime.phase(), MatchPhase::Finished);
    }

    #[test]
    fn half_time_is_live_but_not_in_play() {
        assert!(!MatchStatus::HalfTime.is_in_play());
        assert!(MatchStatus::SecondHalf.is_in_play());
    }

    #[test]
    fn status_order_follows_match_lifecycle() {
        assert!(MatchStatus::NotStarted < MatchStatus::FirstHalf);
        assert!(MatchStatus::HalfTime < MatchStatus::SecondHalf);
        assert!(MatchStatus::SecondHalf < MatchStatus::FullTime);
    }

    #[test]
    fn patch_replaces_only_present_fields() {
        let mut m = sample_match();
        let before = m.clone();
        m.apply_patch(&MatchPatch::new("m1").with_minute(12));
        assert_eq!(m.minute, 12);
        assert_eq!(m.score, before.score);
        assert_eq!(m.status, before.status);
        assert_eq!(m.home_team, before.home_team);
    }

    #[test]
    fn patch_replaces_nested_score_wholesale() {
        let mut m = sample_match();
        m.score = MatchScore { home: 2, away: 1 };
        let patch: MatchPatch =
            serde_json::from_str(r#"{"id":"m1","score":{"home":3,"away":1}}"#).unwrap();
        m.apply_patch(&patch);
        assert_eq!(m.score, MatchScore { home: 3, away: 1 });
    }

    #[test]
    fn patch_never_rewrites_id() {
        let mut m = sample_match();
        m.apply_patch(&MatchPatch::new("other").with_status(MatchStatus::FirstHalf));
        assert_eq!(m.id, "m1");
    }

    #[test]
    fn patch_treats_null_as_absent() {
        let patch: MatchPatch =
            serde_json::from_str(r#"{"id":"m1","score":null,"minute":5}"#).unwrap();
        assert!(patch.score.is_none());
        assert_eq!(patch.minute, Some(5));
    }

    #[test]
    fn match_event_uses_type_key() {
        let ev: MatchEvent = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "matchId": "m1",
            "type": "YELLOW_CARD",
            "minute": 33,
            "player": "Rice",
            "description": "Late tackle",
            "teamSide": "home"
        }))
        .unwrap();
        assert_eq!(ev.event_type, EventType::YellowCard);
        assert_eq!(ev.team_side, TeamSide::Home);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "YELLOW_CARD");
    }

    #[test]
    fn stat_pair_lookup_by_side() {
        let pair = StatPair { home: 55, away: 45 };
        assert_eq!(pair.get(TeamSide::Home), 55);
        assert_eq!(pair.get(TeamSide::Away), 45);
    }

    #[test]
    fn stat_pair_share_is_a_percentage() {
        let shots = StatPair { home: 3, away: 1 };
        assert!((shots.share(TeamSide::Home) - 75.0).abs() < f64::EPSILON);
        assert!((shots.share(TeamSide::Away) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_stat_pair_splits_evenly() {
        let corners = StatPair::default();
        assert!((corners.share(TeamSide::Home) - 50.0).abs() < f64::EPSILON);
        assert!((corners.share(TeamSide::Away) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_score_reads_as_nil_nil() {
        let m: Match = serde_json::from_value(serde_json::json!({
            "id": "m2",
            "homeTeam": { "name": "Liverpool", "shortName": "LIV" },
            "awayTeam": { "name": "Everton", "shortName": "EVE" },
            "status": "NOT_STARTED",
            "minute": 0,
            "startTime": "2026-05-01T16:30:00Z"
        }))
        .unwrap();
        assert_eq!(m.score, MatchScore::default());
    }
}
