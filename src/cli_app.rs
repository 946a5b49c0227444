//! Top-level CLI definition and dispatch.

use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::{Colorize, control};
use serde_json::json;
use thiserror::Error;

use chat_media_janitor::core::config::Config;
use chat_media_janitor::core::errors::JanitorError;
use chat_media_janitor::engine::Mode;
use chat_media_janitor::engine::diagnostics::{RunDiagnostics, storage_status_label};
use chat_media_janitor::engine::executor::EvictionExecutor;
use chat_media_janitor::notify::dedup::{DedupGate, FingerprintStore, GateDecision};
use chat_media_janitor::notify::{
    ChatSender, NoPrefix, OutboxSender, PrefixSource, StdoutSender, render_summary,
};
use chat_media_janitor::store::CandidateStore;
use chat_media_janitor::store::sqlite::SqliteStore;

#[cfg(unix)]
use chat_media_janitor::monitor::disk::{DiskInspector, StatvfsInspector};

/// chat-media-janitor — retention and disk-pressure eviction for chat media.
#[derive(Debug, Parser)]
#[command(
    name = "cmj",
    author,
    version,
    about = "Chat Media Janitor - retention and disk-pressure eviction",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run one eviction sweep.
    Sweep(SweepArgs),
    /// Show disk usage and tracked-file status.
    Status,
    /// View and validate configuration state.
    Config(ConfigArgs),
    /// Show version information.
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SweepMode {
    /// Age-based cleanup of expired uploads.
    Retention,
    /// Usage-driven cleanup down to the pressure threshold.
    Pressure,
}

impl From<SweepMode> for Mode {
    fn from(value: SweepMode) -> Self {
        match value {
            SweepMode::Retention => Self::Retention,
            SweepMode::Pressure => Self::Pressure,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct SweepArgs {
    /// Which policy drives the sweep.
    #[arg(value_enum)]
    mode: SweepMode,
    /// Compute the plan without deleting anything.
    #[arg(long)]
    dry_run: bool,
    /// Send the summary even if deduplication would suppress it.
    #[arg(long)]
    notify_anyway: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the active config file path.
    Path,
    /// Print the resolved configuration as TOML.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<JanitorError> for CliError {
    fn from(value: JanitorError) -> Self {
        // Configuration problems are the operator's to fix; everything else
        // is an environment failure.
        if value.code().starts_with("CMJ-1") {
            Self::User(value.to_string())
        } else {
            Self::Runtime(value.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Sweep(args) => run_sweep(cli, args),
        Command::Status => run_status(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Version => emit_version(cli),
    }
}

const fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

#[cfg(unix)]
fn run_sweep(cli: &Cli, args: &SweepArgs) -> Result<(), CliError> {
    let cfg = Config::load(cli.config.as_deref())?;
    let store = SqliteStore::open(&cfg.paths.sqlite_db, &cfg.paths.media_root)?;
    let disk = StatvfsInspector;
    let mode = Mode::from(args.mode);

    let executor = EvictionExecutor::new(&store, &disk, cfg.policy, &cfg.paths.media_root)
        .dry_run(args.dry_run);
    let diag = executor.run(mode, chrono::Utc::now())?;

    let decision = notify(&cfg, mode, &diag, args.notify_anyway);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", render_summary(&diag, None));
            if let Some(decision) = &decision {
                if !decision.send {
                    println!("Notification suppressed: {}", decision.reason);
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "diagnostics": diag,
                "notification": decision.map(|d| json!({
                    "sent": d.send,
                    "reason": d.reason,
                    "fingerprint": d.fingerprint,
                })),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn run_sweep(_cli: &Cli, _args: &SweepArgs) -> Result<(), CliError> {
    Err(CliError::Runtime(
        "no disk inspector available on this platform".to_string(),
    ))
}

/// Run the dedup gate and, on a send decision, deliver the summary and
/// persist the fingerprint. Transport and persistence failures are reported
/// on stderr but never fail the sweep.
fn notify(
    cfg: &Config,
    mode: Mode,
    diag: &RunDiagnostics,
    notify_anyway: bool,
) -> Option<GateDecision> {
    if !cfg.notifications.enabled {
        return None;
    }

    let fingerprints = FingerprintStore::new(&cfg.paths.state_dir);
    let previous = fingerprints.load(mode);
    let gate = DedupGate {
        send_zero: cfg.notifications.send_zero_deletion_summaries,
        notify_anyway,
    };
    let decision = gate.should_notify(diag, previous.as_deref());

    if decision.send {
        let body = render_summary(diag, NoPrefix.render(diag).as_deref());
        let outcome = match &cfg.notifications.outbox {
            Some(path) => OutboxSender::new(path).send_text(&cfg.notifications.room_id, &body),
            None => StdoutSender.send_text(&cfg.notifications.room_id, &body),
        };
        if let Err(error) = outcome {
            eprintln!("[CMJ-NOTIFY] send failed: {error}");
        }
        // The fingerprint records the decision, not the delivery.
        if let Err(error) = fingerprints.store(mode, &decision.fingerprint) {
            eprintln!("[CMJ-NOTIFY] fingerprint write failed: {error}");
        }
    } else {
        eprintln!("[CMJ-NOTIFY] suppressed: {}", decision.reason);
    }
    Some(decision)
}

#[cfg(unix)]
fn run_status(cli: &Cli) -> Result<(), CliError> {
    let cfg = Config::load(cli.config.as_deref())?;
    let store = SqliteStore::open(&cfg.paths.sqlite_db, &cfg.paths.media_root)?;
    let tracked = store.count_all()?;
    let usage = StatvfsInspector.usage_fraction(&cfg.paths.media_root)?;
    let percent = usage * 100.0;
    let status = storage_status_label(
        percent,
        cfg.policy.pressure_threshold * 100.0,
        cfg.policy.emergency_threshold * 100.0,
    );

    match output_mode(cli) {
        OutputMode::Human => {
            let label = match status {
                "critical" => status.red().bold(),
                "pressure" | "tight" => status.yellow(),
                _ => status.green(),
            };
            println!("Media root:    {}", cfg.paths.media_root.display());
            println!("Disk usage:    {percent:.1}%");
            println!("Status:        {label}");
            println!("Tracked files: {tracked}");
        }
        OutputMode::Json => {
            let payload = json!({
                "media_root": cfg.paths.media_root,
                "usage_percent": (percent * 10.0).round() / 10.0,
                "status": status,
                "tracked_files": tracked,
                "pressure_threshold": cfg.policy.pressure_threshold,
                "emergency_threshold": cfg.policy.emergency_threshold,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn run_status(_cli: &Cli) -> Result<(), CliError> {
    Err(CliError::Runtime(
        "no disk inspector available on this platform".to_string(),
    ))
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let rendered = toml::to_string_pretty(&cfg)
                        .map_err(|e| CliError::Runtime(e.to_string()))?;
                    print!("{rendered}");
                }
                OutputMode::Json => {
                    println!("{}", serde_json::to_string_pretty(&cfg)?);
                }
            }
            Ok(())
        }
        ConfigCommand::Validate => {
            // Load already validates; reaching here means the config is sound.
            let cfg = Config::load(cli.config.as_deref())?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("configuration OK: {}", cfg.paths.config_file.display());
                }
                OutputMode::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "valid": true,
                            "config_file": cfg.paths.config_file,
                        }))?
                    );
                }
            }
            Ok(())
        }
    }
}

fn emit_version(cli: &Cli) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            println!("cmj {}", env!("CARGO_PKG_VERSION"));
        }
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "name": "cmj",
                    "version": env!("CARGO_PKG_VERSION"),
                }))?
            );
        }
    }
    Ok(())
}
