#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! HTTP match API tests against a local responder.
//!
//! The responder answers each request from a fixed route table and records
//! the raw request head so tests can check paths and headers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use live_match_client::{LiveMatchError, MatchApi, MatchSource, MatchStatus, ResponseEnvelope};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ════════════════════════════════════════════════════════════════════
// Local responder
// ════════════════════════════════════════════════════════════════════

const LIVE: &str = r#"{"id":"1","homeTeam":{"name":"Arsenal","shortName":"ARS"},"awayTeam":{"name":"Chelsea","shortName":"CHE"},"score":{"home":2,"away":1},"status":"SECOND_HALF","minute":74,"startTime":"2024-05-01T19:00:00Z"}"#;
const UPCOMING: &str = r#"{"id":"2","homeTeam":{"name":"Liverpool","shortName":"LIV"},"awayTeam":{"name":"Everton","shortName":"EVE"},"score":{"home":0,"away":0},"status":"NOT_STARTED","minute":0,"startTime":"2024-05-01T21:00:00Z"}"#;

type Requests = Arc<Mutex<Vec<String>>>;

/// Serve `routes` (path -> body) until the test ends. Unknown paths get 404.
async fn serve(routes: HashMap<String, String>) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let Ok((mut tcp, _)) = listener.accept().await else {
                return;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = tcp.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let head = String::from_utf8_lossy(&head).to_string();
            let path = head
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            seen.lock().unwrap().push(head);

            let (status, body) = match routes.get(&path) {
                Some(body) => ("200 OK", body.clone()),
                None => ("404 Not Found", r#"{"error":"not found"}"#.to_string()),
            };
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            tcp.write_all(response.as_bytes()).await.unwrap();
            tcp.shutdown().await.unwrap();
        }
    });

    (format!("http://{addr}/api"), requests)
}

fn api(base: &str, envelope: ResponseEnvelope) -> MatchApi {
    MatchApi::new(base, envelope, Duration::from_secs(2)).unwrap()
}

fn routes(pairs: &[(&str, String)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(path, body)| ((*path).to_string(), body.clone()))
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Bare bodies
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn bare_bodies_decode() {
    let (base, requests) = serve(routes(&[
        ("/api/matches", format!("[{LIVE},{UPCOMING}]")),
        ("/api/matches/live", format!("[{LIVE}]")),
        ("/api/matches/2", UPCOMING.to_string()),
    ]))
    .await;
    let api = api(&base, ResponseEnvelope::Bare);

    let all = api.all_matches().await.unwrap();
    let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["1", "2"]);

    let live = api.live_matches().await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].status, MatchStatus::SecondHalf);

    let single = api.match_by_id("2").await.unwrap();
    assert_eq!(single.home_team.short_name, "LIV");

    let heads = requests.lock().unwrap().clone();
    assert_eq!(heads.len(), 3);
    assert!(heads[0].starts_with("GET /api/matches HTTP/1.1"));
    assert!(heads[1].starts_with("GET /api/matches/live HTTP/1.1"));
    assert!(heads[2].starts_with("GET /api/matches/2 HTTP/1.1"));
}

#[tokio::test]
async fn requests_ask_for_json() {
    let (base, requests) = serve(routes(&[("/api/matches", "[]".to_string())])).await;

    let all = api(&base, ResponseEnvelope::Bare).all_matches().await.unwrap();
    assert!(all.is_empty());

    let head = requests.lock().unwrap()[0].to_ascii_lowercase();
    assert!(head.contains("accept: application/json"), "head was: {head}");
}

// ════════════════════════════════════════════════════════════════════
// Wrapped bodies
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn wrapped_bodies_decode() {
    let (base, _requests) = serve(routes(&[
        (
            "/api/matches/live",
            format!(r#"{{"data":{{"matches":[{LIVE}]}}}}"#),
        ),
        ("/api/matches/1", format!(r#"{{"data":{LIVE}}}"#)),
    ]))
    .await;
    let api = api(&base, ResponseEnvelope::Wrapped);

    let live = api.live_matches().await.unwrap();
    assert_eq!(live[0].score.home, 2);

    let single = api.match_by_id("1").await.unwrap();
    assert_eq!(single.minute, 74);
}

#[tokio::test]
async fn wrong_envelope_is_a_decode_error() {
    let (base, _requests) = serve(routes(&[("/api/matches", format!("[{LIVE}]"))])).await;

    let result = api(&base, ResponseEnvelope::Wrapped).all_matches().await;
    assert!(
        matches!(result, Err(LiveMatchError::Serialization(_))),
        "got {result:?}"
    );
}

// ════════════════════════════════════════════════════════════════════
// Failures
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_match_maps_to_http_status() {
    let (base, _requests) = serve(HashMap::new()).await;

    let result = api(&base, ResponseEnvelope::Bare).match_by_id("99").await;
    match result {
        Err(LiveMatchError::HttpStatus { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/api/matches/99"), "url was: {url}");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_an_http_error() {
    let api = api("http://127.0.0.1:1/api", ResponseEnvelope::Bare);
    let result = api.all_matches().await;
    assert!(
        matches!(result, Err(LiveMatchError::Http(_))),
        "got {result:?}"
    );
}
