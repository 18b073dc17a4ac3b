//! ADS-B feed server - ingest an SBS feed and stream aircraft snapshots.

use adsb_feed::{
    config::Config,
    session::{FeedSession, StartStatus},
    stats::FeedStats,
    web::{self, AppState},
};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// ADS-B feed server - ingest an SBS feed and stream aircraft snapshots over SSE
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(short, long, env = "ADSB_CONFIG")]
    config: Option<PathBuf>,

    /// SBS feed hostname
    #[arg(long, env = "ADSB_FEED_HOST")]
    host: Option<String>,

    /// SBS feed port
    #[arg(long, env = "ADSB_FEED_PORT")]
    port: Option<u16>,

    /// HTTP listen port
    #[arg(short, long, env = "ADSB_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Start ingesting the feed immediately
    #[arg(long)]
    auto_start: bool,

    /// Print statistics every N seconds (0 = never)
    #[arg(short, long)]
    stats_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Apply command-line overrides on top of the file config.
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.feed_host = host.clone();
        }
        if let Some(port) = self.port {
            config.feed_port = port;
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(interval) = self.stats_interval {
            config.stats_interval = interval;
        }
        if self.auto_start {
            config.auto_start = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    config.validate()?;

    info!("ADS-B feed server starting...");
    info!("Feed: {}:{}", config.feed_host, config.feed_port);

    let stats = Arc::new(FeedStats::new());
    let session = Arc::new(FeedSession::new(
        config.feed_config(),
        config.event_buffer,
        Arc::clone(&stats),
    ));

    if config.auto_start {
        let outcome = session.start(&session.default_address()).await;
        match outcome.status {
            StartStatus::Error => error!("Auto-start failed: {}", outcome.message),
            _ => info!("{}", outcome.message),
        }
    }

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    // Start stats printer
    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let stats_interval = config.stats_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                println!("\n{}", stats_clone.summary());
            }
        });
    }

    let state = AppState {
        session: Arc::clone(&session),
        keepalive: config.keepalive_interval,
    };

    tokio::select! {
        result = web::serve(config.listen_port, state) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
                session.stop().await;
                return Err(e.into());
            }
        }
        _ = shutdown_rx.changed() => {}
    }

    session.stop().await;

    // Print final statistics
    println!("\n\nFINAL STATISTICS");
    println!("{}", stats.summary());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "adsb-feed",
            "--host",
            "piaware.local",
            "--port",
            "30103",
            "--listen-port",
            "8080",
            "--auto-start",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.feed_host, "piaware.local");
        assert_eq!(config.feed_port, 30103);
        assert_eq!(config.listen_port, 8080);
        assert!(config.auto_start);
    }

    #[test]
    fn test_args_keep_config_when_absent() {
        let args = Args::parse_from(["adsb-feed"]);
        let mut config = Config {
            feed_host: "from-file".to_string(),
            stats_interval: 10,
            ..Config::default()
        };
        args.apply(&mut config);

        assert_eq!(config.feed_host, "from-file");
        assert_eq!(config.stats_interval, 10);
        assert!(!config.auto_start);
    }
}
