//! cpumeter — records host CPU usage on a fixed interval and prints a summary.
//!
//! Run with:  `RUST_LOG=debug cpumeter --interval 500 --duration 10000`

use anyhow::Result;
use clap::Parser;
use meter_config::{ConfigWatcher, MeterConfig, OutputFormat};
use meter_core::{MeterError, ProviderKind, Summary};
use meter_system::Session;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the main task checks whether the loop died on a provider error.
const LIVENESS_CHECK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "cpumeter")]
#[command(about = "Sample host CPU usage and summarise the recorded series")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/cpumeter/cpumeter.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many milliseconds (default: run until Ctrl-C)
    #[arg(short, long)]
    duration: Option<u64>,

    /// CPU backend: auto, sysinfo or proc-stat
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Re-read the config file on change and apply a new interval live
    /// (an explicit --interval keeps precedence over the file)
    #[arg(short, long)]
    watch: bool,
}

impl Args {
    fn apply(&self, config: &mut MeterConfig) {
        if let Some(ms) = self.interval {
            config.interval_ms = ms;
        }
        if let Some(ms) = self.duration {
            config.duration_ms = Some(ms);
        }
        if let Some(kind) = self.provider {
            config.provider = kind;
        }
        if self.json {
            config.output = OutputFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(meter_config::default_path);
    let mut config = meter_config::load(&config_path)?;
    args.apply(&mut config);
    config.validate()?;

    // Structured logging to stderr — RUST_LOG wins over the config's log_level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("cpumeter v{} starting", env!("CARGO_PKG_VERSION"));

    let session = Session::with_kind(config.interval_ms, config.provider)?;
    session.start()?;

    let (_watcher, mut reloads) = if args.watch {
        let (w, rx) = ConfigWatcher::spawn(&config_path, config.clone());
        (Some(w), Some(rx))
    } else {
        (None, None)
    };

    let deadline = config.duration_ms.and_then(deadline_after);
    let mut liveness = time::interval(LIVENESS_CHECK);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = sleep_until(deadline) => {
                info!("sampling duration elapsed");
                break;
            }
            Some(mut cfg) = recv(&mut reloads) => {
                args.apply(&mut cfg);
                if let Err(e) = session.set_interval(cfg.interval_ms) {
                    warn!("Ignoring reloaded interval: {e}");
                }
            }
            _ = liveness.tick() => {
                if !session.is_running() {
                    warn!("sampling stopped early; reporting partial series");
                    break;
                }
            }
        }
    }

    session.stop();
    let summary = session.summary();
    session.shutdown().await;

    match summary {
        Ok(summary) => print_summary(&summary, config.output)?,
        Err(MeterError::NoData) => println!("no samples recorded"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// `None` when the duration is too large to represent; sampling then runs
/// until interrupted.
fn deadline_after(ms: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_millis(ms))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn recv(rx: &mut Option<mpsc::Receiver<MeterConfig>>) -> Option<MeterConfig> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            if let Some(at) = summary.started_at {
                println!("started   {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("interval  {} ms", summary.interval_ms);
            println!("runtime   {} ms", summary.runtime_ms);
            println!(
                "samples   {} ({} recorded)",
                summary.sample_count, summary.samples_recorded
            );
            println!("average   {:.1}%", summary.average);
            println!("min       {:.1}%", summary.min);
            println!("max       {:.1}%", summary.max);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_interval_survives_config_reload() {
        let args = Args::parse_from(["cpumeter", "--interval", "250"]);
        let mut reloaded = MeterConfig {
            interval_ms: 2000,
            ..MeterConfig::default()
        };
        args.apply(&mut reloaded);
        assert_eq!(reloaded.interval_ms, 250);
    }

    #[test]
    fn reload_without_cli_override_uses_file_interval() {
        let args = Args::parse_from(["cpumeter", "--watch"]);
        let mut reloaded = MeterConfig {
            interval_ms: 2000,
            ..MeterConfig::default()
        };
        args.apply(&mut reloaded);
        assert_eq!(reloaded.interval_ms, 2000);
    }

    #[tokio::test]
    async fn oversized_duration_does_not_panic() {
        let now = Instant::now();
        if let Some(at) = deadline_after(u64::MAX) {
            assert!(at > now);
        }
        assert!(deadline_after(1000).is_some_and(|at| at > now));
    }
}
