//! # Live Dashboard Example
//!
//! Demonstrates the dashboard lifecycle against a running match service:
//!
//! 1. Load configuration from `live-match.toml` (or defaults) plus env overrides
//! 2. Open the push channel over WebSocket
//! 3. Load the match list over HTTP
//! 4. Print the live / upcoming / finished groups whenever the board changes
//! 5. Shut down gracefully on Ctrl+C or when the push channel closes
//!
//! ## Running
//!
//! ```sh
//! # Start the match service on localhost:3000, then:
//! cargo run --example live_dashboard
//!
//! # Point at another deployment:
//! LIVE_MATCH_API_URL=https://scores.example.com/api \
//! LIVE_MATCH_PUSH_URL=https://scores.example.com \
//!     cargo run --example live_dashboard
//! ```

use std::path::Path;

use live_match_client::{
    BoardChange, ClientConfig, Dashboard, DashboardState, Match, MatchApi, PushConnection,
    WebSocketConnector,
};

/// Config file read from the working directory when present.
const CONFIG_FILE: &str = "live-match.toml";

fn print_group(title: &str, matches: &[&Match]) {
    println!("{title} ({})", matches.len());
    for m in matches {
        println!(
            "  [{}] {} {} - {} {}  {}'  {}",
            m.id,
            m.home_team.short_name,
            m.score.home,
            m.score.away,
            m.away_team.short_name,
            m.minute,
            m.status.label()
        );
    }
}

fn render(dashboard: &Dashboard) {
    match dashboard.state() {
        DashboardState::Loading => println!("Loading matches..."),
        DashboardState::Failed(message) => println!("{message}"),
        DashboardState::Ready(board) => {
            let groups = board.partition();
            let link = if dashboard.is_connected() {
                "live"
            } else {
                "offline"
            };
            println!("── {} matches ({link}) ──", board.len());
            print_group("Live", &groups.live);
            print_group("Upcoming", &groups.upcoming);
            print_group("Finished", &groups.finished);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for frame-level output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let mut config = if Path::new(CONFIG_FILE).exists() {
        ClientConfig::load(CONFIG_FILE)?
    } else {
        ClientConfig::default()
    };
    config.apply_env_overrides()?;
    tracing::info!(api = %config.api_url, push = %config.push_url, "starting dashboard");

    // ── Connect ─────────────────────────────────────────────────────
    let api = MatchApi::from_config(&config)?;
    let connector = WebSocketConnector::new(&config.push_url)?;
    let (mut connection, _events) = PushConnection::open(connector, config.push.clone());

    let mut dashboard = Dashboard::attach(&connection.handle());
    dashboard.load(&api).await;
    render(&dashboard);

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            change = dashboard.next_change() => {
                match change {
                    BoardChange::Ignored => {}
                    BoardChange::Closed => {
                        tracing::warn!("push channel closed, exiting");
                        break;
                    }
                    BoardChange::Updated(id) => {
                        tracing::debug!(%id, "match updated");
                        render(&dashboard);
                    }
                    BoardChange::Connection(up) => {
                        tracing::info!(connected = up, "push link changed");
                        render(&dashboard);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    connection.close().await;
    Ok(())
}
