//! Read-only HTTP access to the match list and single matches.
//!
//! [`MatchApi`] is the reqwest-backed implementation of [`MatchSource`].
//! Views depend on the trait so tests can hand them canned data.
//!
//! The response shape is not negotiated: the caller states it up front with
//! [`ResponseEnvelope`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LiveMatchError, Result};
use crate::model::Match;

/// How the HTTP API wraps its JSON bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEnvelope {
    /// Lists are bare arrays, single matches are bare objects.
    #[default]
    Bare,
    /// Lists are `{"data": {"matches": [...]}}`, single matches `{"data": {...}}`.
    Wrapped,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct MatchList {
    matches: Vec<Match>,
}

/// Decode a match-list body.
///
/// # Errors
///
/// Returns [`LiveMatchError::Serialization`] if the body does not have the
/// stated shape.
pub fn decode_match_list(envelope: ResponseEnvelope, body: &[u8]) -> Result<Vec<Match>> {
    let matches = match envelope {
        ResponseEnvelope::Bare => serde_json::from_slice(body)?,
        ResponseEnvelope::Wrapped => {
            serde_json::from_slice::<DataEnvelope<MatchList>>(body)?
                .data
                .matches
        }
    };
    Ok(matches)
}

/// Decode a single-match body.
///
/// # Errors
///
/// Returns [`LiveMatchError::Serialization`] if the body does not have the
/// stated shape.
pub fn decode_match(envelope: ResponseEnvelope, body: &[u8]) -> Result<Match> {
    let found = match envelope {
        ResponseEnvelope::Bare => serde_json::from_slice(body)?,
        ResponseEnvelope::Wrapped => serde_json::from_slice::<DataEnvelope<Match>>(body)?.data,
    };
    Ok(found)
}

/// Where views load their initial snapshot from.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// `GET /matches`
    async fn all_matches(&self) -> Result<Vec<Match>>;

    /// `GET /matches/live`
    async fn live_matches(&self) -> Result<Vec<Match>>;

    /// `GET /matches/{id}`
    async fn match_by_id(&self, id: &str) -> Result<Match>;
}

/// HTTP client for the match API.
#[derive(Debug, Clone)]
pub struct MatchApi {
    client: Client,
    base: Url,
    envelope: ResponseEnvelope,
}

impl MatchApi {
    /// Build a client for `base_url` (for example `https://host/api`).
    ///
    /// # Errors
    ///
    /// Returns [`LiveMatchError::InvalidUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`LiveMatchError::Http`] if the underlying
    /// client cannot be built.
    pub fn new(base_url: &str, envelope: ResponseEnvelope, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| LiveMatchError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(LiveMatchError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http or https base URL".into(),
            });
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            envelope,
        })
    }

    /// Build a client from a [`ClientConfig`](crate::config::ClientConfig).
    ///
    /// # Errors
    ///
    /// See [`MatchApi::new`].
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self> {
        Self::new(&config.api_url, config.envelope, config.request_timeout)
    }

    pub fn envelope(&self) -> ResponseEnvelope {
        self.envelope
    }

    /// Resolve `segments` below the base path.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| LiveMatchError::InvalidUrl {
                    url: self.base.to_string(),
                    reason: "URL cannot carry a path".into(),
                })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<Vec<u8>> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LiveMatchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MatchSource for MatchApi {
    async fn all_matches(&self) -> Result<Vec<Match>> {
        let body = self.get(&["matches"]).await?;
        decode_match_list(self.envelope, &body)
    }

    async fn live_matches(&self) -> Result<Vec<Match>> {
        let body = self.get(&["matches", "live"]).await?;
        decode_match_list(self.envelope, &body)
    }

    async fn match_by_id(&self, id: &str) -> Result<Match> {
        let body = self.get(&["matches", id]).await?;
        decode_match(self.envelope, &body)
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

    const MATCH: &str = r#"{
        "id": "9",
        "homeTeam": {"name": "Arsenal", "shortName": "ARS"},
        "awayTeam": {"name": "Chelsea", "shortName": "CHE"},
        "score": {"home": 1, "away": 0},
        "status": "SECOND_HALF",
        "minute": 61,
        "startTime": "2024-05-01T19:00:00Z"
    }"#;

    fn api(base: &str) -> MatchApi {
        MatchApi::new(base, ResponseEnvelope::Bare, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn bare_list_decodes() {
        let body = format!("[{MATCH}]");
        let matches = decode_match_list(ResponseEnvelope::Bare, body.as_bytes()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "9");
    }

    #[test]
    fn wrapped_list_decodes() {
        let body = format!(r#"{{"data": {{"matches": [{MATCH}]}}}}"#);
        let matches = decode_match_list(ResponseEnvelope::Wrapped, body.as_bytes()).unwrap();
        assert_eq!(matches[0].home_team.short_name, "ARS");
    }

    #[test]
    fn wrapped_single_decodes() {
        let body = format!(r#"{{"data": {MATCH}}}"#);
        let found = decode_match(ResponseEnvelope::Wrapped, body.as_bytes()).unwrap();
        assert_eq!(found.minute, 61);
    }

    #[test]
    fn envelope_mismatch_is_an_error() {
        let body = format!("[{MATCH}]");
        let result = decode_match_list(ResponseEnvelope::Wrapped, body.as_bytes());
        assert!(matches!(result, Err(LiveMatchError::Serialization(_))));
    }

    #[test]
    fn endpoints_extend_base_path() {
        let api1 = api("https://host.example/api");
        assert_eq!(
            api1.endpoint(&["matches", "live"]).unwrap().as_str(),
            "https://host.example/api/matches/live"
        );

        let api = api("https://host.example/api/");
        assert_eq!(
            api.endpoint(&["matches", "7"]).unwrap().as_str(),
            "https://host.example/api/matches/7"
        );
    }

    #[test]
    fn ids_are_percent_encoded() {
        let api = api("https://host.example");
        assert_eq!(
            api.endpoint(&["matches", "a/b"]).unwrap().as_str(),
            "https://host.example/matches/a%2Fb"
        );
    }

    #[test]
    fn non_http_base_is_rejected() {
        let result = MatchApi::new("ws://host", ResponseEnvelope::Bare, Duration::from_secs(1));
        assert!(matches!(result, Err(LiveMatchError::InvalidUrl { .. })));
    }
}
