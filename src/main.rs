//! slipstream - Forza Data Out telemetry recorder
//!
//! Listens on a UDP port, records gated telemetry rows and exports a JSON
//! summary per session. Sessions are controlled with line commands on stdin:
//!
//! ```text
//! race | practice     start a session
//! stop                stop the session and export its summary
//! status              show the current state and packet counters
//! stats [field...]    show running statistics
//! exit                stop and quit
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use slipstream::{
    ControlHandle, ControlOutcome, RecorderConfig, ReferenceNames, SessionController, SessionMode,
    SessionStatus,
};

const DEFAULT_STATS_FIELDS: &[&str] =
    &["SpeedKph", "CurrentEngineRpm", "Power", "Torque", "TireTempFrontLeftCelsius"];

#[derive(Parser, Debug)]
#[command(name = "slipstream")]
#[command(about = "Record Forza Data Out UDP telemetry with gating and running statistics")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SLIPSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// UDP port to listen on (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for session files (overrides the configuration file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Car reference table (Ordinal,CarName)
    #[arg(long)]
    cars: Option<PathBuf>,

    /// Track reference table (Ordinal,TrackName)
    #[arg(long)]
    tracks: Option<PathBuf>,

    /// Start a session immediately in this mode (race or practice)
    #[arg(short, long)]
    mode: Option<SessionMode>,
}

impl Cli {
    fn recorder_config(&self) -> Result<RecorderConfig> {
        let mut config = match &self.config {
            Some(path) => RecorderConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => RecorderConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(cars) = &self.cars {
            config.car_names = Some(cars.clone());
        }
        if let Some(tracks) = &self.tracks {
            config.track_names = Some(tracks.clone());
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slipstream=info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.recorder_config()?;

    let names = ReferenceNames::load(config.car_names.as_deref(), config.track_names.as_deref())
        .context("loading reference names")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.bind_addr(),
        output = %config.output_dir.display(),
        "slipstream ready"
    );

    let handle = SessionController::new(config, Arc::new(names)).spawn();

    if let Some(mode) = cli.mode {
        run_command(&handle, mode.as_str()).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => match line.context("reading stdin")? {
                Some(line) => {
                    if !run_command(&handle, &line).await {
                        break;
                    }
                }
                None => {
                    // stdin closed: keep recording until interrupted
                    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
                    info!("Interrupted");
                    break;
                }
            },
        }
    }

    match handle.shutdown().await {
        Ok(ControlOutcome::Stopped(report)) => print_report(&report),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Controller already closed"),
    }
    Ok(())
}

/// Execute one command line. Returns false when the program should exit.
async fn run_command(handle: &ControlHandle, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return true;
    };

    match command.to_ascii_lowercase().as_str() {
        "race" | "practice" => {
            let mode = if command.eq_ignore_ascii_case("race") {
                SessionMode::Race
            } else {
                SessionMode::Practice
            };
            match handle.start(mode).await {
                Ok(ControlOutcome::Started(session)) => {
                    println!("{mode} session started on {}", session.source);
                    println!("rows: {}", session.output.display());
                }
                Ok(_) => println!("receiver already running"),
                Err(e) => report_error(&e),
            }
        }
        "stop" => match handle.stop().await {
            Ok(ControlOutcome::Stopped(report)) => print_report(&report),
            Ok(_) => println!("receiver is not running"),
            Err(e) => report_error(&e),
        },
        "status" => print_status(handle).await,
        "stats" => {
            let fields: Vec<&str> = words.collect();
            print_stats(handle, if fields.is_empty() { DEFAULT_STATS_FIELDS } else { &fields[..] }).await;
        }
        "exit" | "quit" => return false,
        "help" => println!("commands: race, practice, stop, status, stats [field...], exit"),
        other => println!("unknown command '{other}' (try 'help')"),
    }

    true
}

async fn print_status(handle: &ControlHandle) {
    match handle.status() {
        SessionStatus::Idle => println!("idle"),
        SessionStatus::Listening(session) => {
            println!(
                "listening: {} mode on {} since {}",
                session.mode,
                session.source,
                session.started_at.format("%H:%M:%S")
            );
            if let Ok(Some(snapshot)) = handle.snapshot().await {
                let c = snapshot.counters;
                println!(
                    "packets {} | accepted {} | rejected {} | malformed {} | write errors {}",
                    c.packets_received,
                    c.accepted,
                    c.rejected(),
                    c.decode_errors,
                    c.write_errors
                );
            }
        }
    }
}

async fn print_stats(handle: &ControlHandle, fields: &[&str]) {
    let snapshot = match handle.snapshot().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            println!("receiver is not running");
            return;
        }
        Err(e) => {
            report_error(&e);
            return;
        }
    };

    for name in fields {
        match snapshot.summary.get(name) {
            Some(s) if s.count > 0 => println!(
                "{name}: n={} mean={:.3} std={:.3} min={:.3} p50={:.3} max={:.3}",
                s.count,
                s.mean,
                s.std,
                s.min.unwrap_or(f64::NAN),
                s.median.unwrap_or(f64::NAN),
                s.max.unwrap_or(f64::NAN),
            ),
            Some(_) => println!("{name}: no samples"),
            None => println!("{name}: unknown field"),
        }
    }
}

fn print_report(report: &slipstream::SessionReport) {
    println!(
        "session stopped: {} rows, summary {}",
        report.rows_written,
        report.summary_path.display()
    );
    if let Some(failure) = &report.failure {
        println!("session ended early: {failure}");
    }
}

fn report_error(error: &slipstream::TelemetryError) {
    println!("error: {error}");
    for suggestion in error.recovery_suggestions() {
        println!("  - {suggestion}");
    }
}
