use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slidegate::config::{ConfigOverrides, SlidegateConfig};
use slidegate::demo;
use slidegate::ratelimit::{SlidingWindowLimiter, SystemClock};

/// Replay a synthetic message stream through a per-user sliding-window limiter.
#[derive(Parser, Debug)]
#[command(name = "slidegate")]
#[command(version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window length in seconds
    #[arg(long)]
    window_secs: Option<f64>,

    /// Messages allowed per user inside one window
    #[arg(long)]
    max_requests: Option<usize>,

    /// Messages sent per round
    #[arg(long)]
    messages: Option<u32>,

    /// Number of distinct users
    #[arg(long)]
    users: Option<u32>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            window_secs: self.window_secs,
            max_requests: self.max_requests,
            messages_per_round: self.messages,
            users: self.users,
        }
    }

    /// Load the configuration file, if any, and apply command-line overrides.
    ///
    /// Validation runs once, after the overrides, so a flag can fix a bad
    /// value in the file.
    fn load_config(&self) -> anyhow::Result<SlidegateConfig> {
        let mut config = match &self.config {
            Some(path) => SlidegateConfig::parse_file(path)?,
            None => SlidegateConfig::default(),
        };

        config.apply_overrides(&self.overrides());
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if args.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = args.load_config()?;
    info!(
        window_secs = config.limiter.window_secs,
        max_requests = config.limiter.max_requests,
        "Configuration loaded"
    );

    let limiter = SlidingWindowLimiter::<String, _>::from_config(&config.limiter, SystemClock)?;
    info!("Rate limiter initialized");

    let events = demo::run(&limiter, &config.demo).await?;
    let accepted = events.iter().filter(|e| e.admission.allowed).count();

    info!(
        accepted = accepted,
        rejected = events.len() - accepted,
        active_users = limiter.active_keys(),
        "Demo finished"
    );
    Ok(())
}
