//! Command-line entry point.
//!
//! Connects to the round feed, records every finalized round to a JSON file
//! and runs until Ctrl+C or until reconnecting gives up.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use round_tracker::config::{
    DEFAULT_BROADCAST_TOPIC, DEFAULT_CHANNEL, DEFAULT_FEED_URL, DEFAULT_TOKEN_URL, DEFAULT_UID,
};
use round_tracker::store::default_results_path;
use round_tracker::transport::{HttpTokenSource, StaticToken, TokenSource, WsConnector};
use round_tracker::{FeedConfig, FeedSession, JsonFileStore, Lifecycle, Result};

// ============================================================================
// Cli
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "round-tracker",
    version,
    about = "Records finalized rounds from the live round feed"
)]
struct Cli {
    /// WebSocket endpoint of the feed.
    #[arg(long, env = "ROUND_TRACKER_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Token endpoint.
    #[arg(long, env = "ROUND_TRACKER_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    token_url: String,

    /// Access token to use instead of requesting one.
    #[arg(long, env = "ROUND_TRACKER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Account identity.
    #[arg(long, env = "ROUND_TRACKER_UID", default_value_t = DEFAULT_UID)]
    uid: u64,

    /// Channel sent to the token endpoint.
    #[arg(long, env = "ROUND_TRACKER_CHANNEL", default_value = DEFAULT_CHANNEL)]
    channel: String,

    /// Extra token request parameter, as NAME=VALUE. Repeatable.
    #[arg(long = "token-param", value_parser = parse_pair)]
    token_params: Vec<(String, String)>,

    /// Extra or replacement upgrade header, as NAME=VALUE. Repeatable.
    #[arg(long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Broadcast topic.
    #[arg(long, env = "ROUND_TRACKER_TOPIC", default_value = DEFAULT_BROADCAST_TOPIC)]
    topic: String,

    /// Results file. Defaults to a timestamped name in the working directory.
    #[arg(long, short, env = "ROUND_TRACKER_OUTPUT")]
    output: Option<PathBuf>,

    /// Seconds of silence before a keep-alive probe.
    #[arg(long, env = "ROUND_TRACKER_INACTIVITY_SECS", default_value_t = 30)]
    inactivity_secs: u64,

    /// Seconds to wait for the probe acknowledgment.
    #[arg(long, env = "ROUND_TRACKER_PROBE_SECS", default_value_t = 5)]
    probe_secs: u64,

    /// Seconds allowed for opening the WebSocket.
    #[arg(long, env = "ROUND_TRACKER_OPEN_TIMEOUT_SECS", default_value_t = 10)]
    open_timeout_secs: u64,

    /// Initial connect attempts.
    #[arg(long, env = "ROUND_TRACKER_CONNECT_ATTEMPTS", default_value_t = 3)]
    connect_attempts: u32,

    /// Reconnect delay unit in seconds; attempt n waits n units.
    #[arg(long, env = "ROUND_TRACKER_RECONNECT_DELAY_SECS", default_value_t = 5)]
    reconnect_delay_secs: u64,

    /// Reconnect attempts before giving up.
    #[arg(long, env = "ROUND_TRACKER_MAX_RECONNECTS", default_value_t = 10)]
    max_reconnects: u32,

    /// Verbose logging (overridden by RUST_LOG).
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn to_config(&self) -> FeedConfig {
        let mut config = FeedConfig {
            feed_url: self.feed_url.clone(),
            token_url: self.token_url.clone(),
            uid: self.uid,
            channel: self.channel.clone(),
            token_params: self.token_params.clone(),
            broadcast_topic: self.topic.clone(),
            ..FeedConfig::default()
        }
        .with_inactivity_window(Duration::from_secs(self.inactivity_secs))
        .with_probe_timeout(Duration::from_secs(self.probe_secs))
        .with_open_timeout(Duration::from_secs(self.open_timeout_secs))
        .with_connect_attempts(self.connect_attempts, Duration::from_secs(2))
        .with_reconnect_base_delay(Duration::from_secs(self.reconnect_delay_secs))
        .with_max_reconnect_attempts(self.max_reconnects);

        for (name, value) in &self.headers {
            config = config.with_header(name.clone(), value.clone());
        }
        config
    }
}

fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("empty name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = cli.to_config();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_results_path(OffsetDateTime::now_utc()));
    info!(path = %output.display(), "Results will be saved");

    let cancel = CancellationToken::new();
    spawn_stop_listener(cancel.clone());

    let outcome = match cli.token.clone() {
        Some(token) => run(config, StaticToken::new(token), output, cancel).await,
        None => match HttpTokenSource::from_config(&config) {
            Ok(tokens) => run(config, tokens, output, cancel).await,
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Round tracker stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run<S: TokenSource>(
    config: FeedConfig,
    tokens: S,
    output: PathBuf,
    cancel: CancellationToken,
) -> Result<()> {
    let connector = WsConnector::from_config(&config);
    let lifecycle = Lifecycle::new(config, connector, tokens, cancel);
    let mut session = FeedSession::new(lifecycle, JsonFileStore::new(output));

    let summary = session.run().await?;
    info!(
        rounds = summary.rounds_recorded(),
        persist_failures = summary.persist_failures,
        "Stopped by operator"
    );
    Ok(())
}

fn init_logging(debug: bool) {
    let fallback = if debug {
        "round_tracker=debug"
    } else {
        "round_tracker=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn spawn_stop_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Stop requested");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
}
