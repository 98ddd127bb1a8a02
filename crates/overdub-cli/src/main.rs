//! # overdub-cli
//!
//! Binary entry point for the Overdub session player.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Timed and fast-forward replay via `overdub play`
//! - Event log inspection via `overdub events` and `overdub takes`
//! - Log maintenance via `overdub remove` and `overdub shift`

use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use overdub_core::{
    EventLog, MemoryHost, OverdubConfig, Performance, PlaybackSummary, PlayerConfig,
};
use overdub_proto::{DocumentId, EventRecord, Payload};
use tracing::{info, warn};

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Output format for the events command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for programmatic access
    Json,
}

/// ANSI color codes for terminal output.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Overdub - record and replay live-coding sessions
#[derive(Parser, Debug)]
#[command(name = "overdub", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "overdub.yml", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay the event log into in-memory documents (default if no subcommand given)
    Play(PlayArgs),

    /// List recorded events for debugging
    Events(EventsArgs),

    /// Summarize recorded takes per document
    Takes(TakesArgs),

    /// Delete every event of one take
    Remove(RemoveArgs),

    /// Move one take's events in time
    Shift(ShiftArgs),
}

/// Arguments for the play subcommand.
#[derive(Parser, Debug)]
struct PlayArgs {
    /// Path to the event log (overrides the config file)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Speed multiplier for recorded delays (overrides the config file)
    #[arg(long)]
    speed: Option<f64>,

    /// Apply every event immediately instead of honoring recorded delays
    #[arg(long)]
    fast: bool,
}

/// Arguments for the events subcommand.
#[derive(Parser, Debug)]
struct EventsArgs {
    /// Path to the event log (overrides the config file)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Filter by target document or take
    #[arg(long)]
    target: Option<String>,

    /// Show only the last N events
    #[arg(long)]
    last: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

/// Arguments for the takes subcommand.
#[derive(Parser, Debug)]
struct TakesArgs {
    /// Path to the event log (overrides the config file)
    #[arg(long)]
    log: Option<PathBuf>,
}

/// Arguments for the remove subcommand.
#[derive(Parser, Debug)]
struct RemoveArgs {
    /// Take to remove (for example "Foo-Take2")
    target: String,

    /// Path to the event log (overrides the config file)
    #[arg(long)]
    log: Option<PathBuf>,
}

/// Arguments for the shift subcommand.
#[derive(Parser, Debug)]
struct ShiftArgs {
    /// Take whose events move
    target: String,

    /// Seconds to add to every timestamp (negative moves events earlier)
    #[arg(allow_negative_numbers = true)]
    delta: f64,

    /// Path to the event log (overrides the config file)
    #[arg(long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Play(args)) => play_command(&cli.config, cli.color, args).await,
        Some(Commands::Events(args)) => events_command(&cli.config, cli.color, args),
        Some(Commands::Takes(args)) => takes_command(&cli.config, cli.color, args),
        Some(Commands::Remove(args)) => remove_command(&cli.config, cli.color, args),
        Some(Commands::Shift(args)) => shift_command(&cli.config, cli.color, args),
        None => {
            // Default to play with no overrides
            let args = PlayArgs {
                log: None,
                speed: None,
                fast: false,
            };
            play_command(&cli.config, cli.color, args).await
        }
    }
}

async fn play_command(config_path: &Path, color_mode: ColorMode, args: PlayArgs) -> Result<()> {
    let use_colors = color_mode.should_use_colors();

    let mut config = OverdubConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(path) = args.log {
        config.log_path = path;
    }
    if let Some(speed) = args.speed {
        config.playback_speed = speed;
    }
    if args.fast {
        config.fast_forward = true;
    }

    let Some(log) = load_log(&config.log_path, use_colors)? else {
        return Ok(());
    };
    if log.is_empty() {
        if use_colors {
            println!(
                "{}Event log {} has no events.{}",
                colors::DIM,
                config.log_path.display(),
                colors::RESET
            );
        } else {
            println!("Event log {} has no events.", config.log_path.display());
        }
        return Ok(());
    }

    info!(
        log = %config.log_path.display(),
        speed = config.playback_speed,
        fast = config.fast_forward,
        "replaying session log"
    );

    let mut performance = Performance::new(&log, MemoryHost::new())
        .with_config(PlayerConfig::new().with_speed(config.playback_speed));
    let summary = if config.fast_forward {
        performance.run_to_end()?
    } else {
        performance.run().await?
    };

    let host = performance.into_host();
    print_documents(&host, use_colors);
    print_summary(summary, host.ids().count(), use_colors);
    Ok(())
}

fn events_command(config_path: &Path, color_mode: ColorMode, args: EventsArgs) -> Result<()> {
    let use_colors = color_mode.should_use_colors();
    let path = resolve_log_path(config_path, args.log)?;
    let Some(log) = load_log(&path, use_colors)? else {
        return Ok(());
    };

    let mut records: Vec<EventRecord> = log.records().to_vec();

    if let Some(ref target) = args.target {
        let target = DocumentId::from(target.as_str());
        records.retain(|record| record.target == target);
    }

    if let Some(n) = args.last {
        if records.len() > n {
            records = records.into_iter().rev().take(n).rev().collect();
        }
    }

    if records.is_empty() {
        if use_colors {
            println!("{}No matching events found.{}", colors::DIM, colors::RESET);
        } else {
            println!("No matching events found.");
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&records)?;
            println!("{json}");
        }
        OutputFormat::Table => print_events_table(&records, use_colors),
    }

    Ok(())
}

fn takes_command(config_path: &Path, color_mode: ColorMode, args: TakesArgs) -> Result<()> {
    use colors::{BOLD, DIM, RESET};

    let use_colors = color_mode.should_use_colors();
    let path = resolve_log_path(config_path, args.log)?;
    let Some(log) = load_log(&path, use_colors)? else {
        return Ok(());
    };

    let targets = log.targets();
    if targets.is_empty() {
        if use_colors {
            println!("{DIM}No takes recorded yet.{RESET}");
        } else {
            println!("No takes recorded yet.");
        }
        return Ok(());
    }

    if use_colors {
        println!("{BOLD}{DIM}Target                │ Events │ First      │ Last{RESET}");
        println!("{DIM}──────────────────────┼────────┼────────────┼────────────{RESET}");
    } else {
        println!("Target                | Events | First      | Last");
        println!("----------------------|--------|------------|------------");
    }

    for target in &targets {
        let mut count = 0usize;
        let mut first = Duration::MAX;
        let mut last = Duration::ZERO;
        for record in log.records_for(target) {
            count += 1;
            first = first.min(record.timestamp);
            last = last.max(record.timestamp);
        }
        if count == 0 {
            continue;
        }
        let name = truncate(target.as_str(), 20);
        if use_colors {
            println!(
                "{:<21} │ {:>6} │ {:<10} │ {:<10}",
                name,
                count,
                format_timestamp(first),
                format_timestamp(last)
            );
        } else {
            println!(
                "{:<21} | {:>6} | {:<10} | {:<10}",
                name,
                count,
                format_timestamp(first),
                format_timestamp(last)
            );
        }
    }

    Ok(())
}

fn remove_command(config_path: &Path, color_mode: ColorMode, args: RemoveArgs) -> Result<()> {
    let use_colors = color_mode.should_use_colors();
    let path = resolve_log_path(config_path, args.log)?;
    let Some(mut log) = load_log(&path, use_colors)? else {
        return Ok(());
    };

    let target = DocumentId::from(args.target.as_str());
    let removed = log.remove_session(&target);
    if removed == 0 {
        if use_colors {
            println!("{}No events target {target}.{}", colors::DIM, colors::RESET);
        } else {
            println!("No events target {target}.");
        }
        return Ok(());
    }

    log.save(&path)
        .with_context(|| format!("failed to rewrite event log {}", path.display()))?;

    if use_colors {
        println!(
            "{}✓{} Removed {removed} events for {target}",
            colors::GREEN,
            colors::RESET
        );
    } else {
        println!("Removed {removed} events for {target}");
    }
    Ok(())
}

fn shift_command(config_path: &Path, color_mode: ColorMode, args: ShiftArgs) -> Result<()> {
    let use_colors = color_mode.should_use_colors();
    if !args.delta.is_finite() {
        anyhow::bail!("shift amount must be a finite number of seconds");
    }

    let path = resolve_log_path(config_path, args.log)?;
    let Some(mut log) = load_log(&path, use_colors)? else {
        return Ok(());
    };

    let target = DocumentId::from(args.target.as_str());
    let shifted = log.shift_session(&target, args.delta);
    if shifted == 0 {
        if use_colors {
            println!("{}No events target {target}.{}", colors::DIM, colors::RESET);
        } else {
            println!("No events target {target}.");
        }
        return Ok(());
    }

    log.save(&path)
        .with_context(|| format!("failed to rewrite event log {}", path.display()))?;

    if use_colors {
        println!(
            "{}✓{} Shifted {shifted} events for {target} by {:+.3}s",
            colors::GREEN,
            colors::RESET,
            args.delta
        );
    } else {
        println!("Shifted {shifted} events for {target} by {:+.3}s", args.delta);
    }
    Ok(())
}

/// Resolves the event log path from the CLI override or the config file.
fn resolve_log_path(config_path: &Path, override_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }
    let config = OverdubConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    Ok(config.log_path)
}

/// Loads the event log, printing a friendly notice when none exists yet.
fn load_log(path: &Path, use_colors: bool) -> Result<Option<EventLog>> {
    if !path.exists() {
        if use_colors {
            println!(
                "{}No event log found at {}.{} Record a session to create one.",
                colors::DIM,
                path.display(),
                colors::RESET
            );
        } else {
            println!(
                "No event log found at {}. Record a session to create one.",
                path.display()
            );
        }
        return Ok(None);
    }
    let (log, malformed) = EventLog::load(path)
        .with_context(|| format!("failed to load event log {}", path.display()))?;
    if !malformed.is_empty() {
        warn!(skipped = malformed.len(), "skipped malformed log lines");
    }
    Ok(Some(log))
}

/// Prints each rendered document with its mode and final text.
fn print_documents(host: &MemoryHost, use_colors: bool) {
    use colors::{BOLD, CYAN, DIM, RESET};

    for id in host.ids() {
        let Some(doc) = host.get(id) else { continue };
        let mode = doc.mode().unwrap_or("plain");
        if use_colors {
            println!("\n{BOLD}{CYAN}── {id}{RESET} {DIM}[{mode}]{RESET}");
        } else {
            println!("\n--- {id} [{mode}]");
        }
        if doc.text().is_empty() {
            if use_colors {
                println!("{DIM}(empty){RESET}");
            } else {
                println!("(empty)");
            }
        } else {
            println!("{}", doc.text());
        }
    }
}

/// Prints the one-line playback result.
fn print_summary(summary: PlaybackSummary, documents: usize, use_colors: bool) {
    use colors::{GREEN, RESET, YELLOW};

    if use_colors {
        println!(
            "\n{GREEN}✓{RESET} Replayed {} events into {} documents",
            summary.applied, documents
        );
        if summary.eval_failures > 0 {
            println!(
                "{YELLOW}⚠{RESET} {} evaluation commands failed",
                summary.eval_failures
            );
        }
    } else {
        println!(
            "\nReplayed {} events into {} documents",
            summary.applied, documents
        );
        if summary.eval_failures > 0 {
            println!("{} evaluation commands failed", summary.eval_failures);
        }
    }
}

fn print_events_table(records: &[EventRecord], use_colors: bool) {
    use colors::{BOLD, DIM, RESET};

    if use_colors {
        println!(
            "{BOLD}{DIM}  # │ Time       │ Target             │ Kind   │  Pos │  Len │ Payload{RESET}"
        );
        println!(
            "{DIM}────┼────────────┼────────────────────┼────────┼──────┼──────┼─────────────────{RESET}"
        );
    } else {
        println!("  # | Time       | Target             | Kind   |  Pos |  Len | Payload");
        println!("----|------------|--------------------|--------|------|------|-----------------");
    }

    for (i, record) in records.iter().enumerate() {
        let time = format_timestamp(record.timestamp);
        let target = truncate(record.target.as_str(), 18);
        let kind = payload_kind(&record.payload);
        let preview = payload_preview(record);

        if use_colors {
            let color = kind_color(&record.payload);
            println!(
                "{DIM}{:>3}{RESET} │ {:<10} │ {:<18} │ {color}{:<6}{RESET} │ {:>4} │ {:>4} │ {DIM}{}{RESET}",
                i + 1,
                time,
                target,
                kind,
                record.position,
                record.length,
                preview
            );
        } else {
            println!(
                "{:>3} | {:<10} | {:<18} | {:<6} | {:>4} | {:>4} | {}",
                i + 1,
                time,
                target,
                kind,
                record.position,
                record.length,
                preview
            );
        }
    }

    if use_colors {
        println!("\n{DIM}Total: {} events{RESET}", records.len());
    } else {
        println!("\nTotal: {} events", records.len());
    }
}

fn payload_kind(payload: &Payload) -> &'static str {
    match payload {
        Payload::Text(_) => "text",
        Payload::Delete => "delete",
        Payload::Eval { .. } => "eval",
        Payload::Mode(_) => "mode",
    }
}

fn kind_color(payload: &Payload) -> &'static str {
    use colors::{CYAN, GREEN, MAGENTA, RED};

    match payload {
        Payload::Text(_) => GREEN,
        Payload::Delete => RED,
        Payload::Eval { .. } => MAGENTA,
        Payload::Mode(_) => CYAN,
    }
}

/// Short single-line preview of what a record carries.
fn payload_preview(record: &EventRecord) -> String {
    match &record.payload {
        Payload::Text(text) => preview(text),
        Payload::Delete => format!("{} chars", record.length),
        Payload::Eval {
            procedure,
            arguments,
        } if arguments.is_empty() => procedure.clone(),
        Payload::Eval {
            procedure,
            arguments,
        } => format!("{procedure} {}", preview(arguments)),
        Payload::Mode(mode) => mode.clone(),
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > 40 {
        let cut: String = flat.chars().take(40).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// Formats a log timestamp as seconds, switching to minutes past one.
fn format_timestamp(timestamp: Duration) -> String {
    let total = timestamp.as_secs_f64();
    if total >= 60.0 {
        let minutes = (total / 60.0) as u64;
        let seconds = total - (minutes * 60) as f64;
        format!("{minutes}m{seconds:06.3}s")
    } else {
        format!("{total:.3}s")
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 1).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: Payload, position: usize, length: usize) -> EventRecord {
        EventRecord::new(Duration::ZERO, payload, position, length, "piece")
    }

    #[test]
    fn test_format_timestamp_switches_to_minutes() {
        assert_eq!(format_timestamp(Duration::from_millis(100)), "0.100s");
        assert_eq!(format_timestamp(Duration::from_secs_f64(59.5)), "59.500s");
        assert_eq!(format_timestamp(Duration::from_secs_f64(75.25)), "1m15.250s");
    }

    #[test]
    fn test_preview_flattens_and_truncates_by_chars() {
        assert_eq!(preview("play :c4\nsleep 1"), "play :c4 sleep 1");

        let long = "é".repeat(41);
        let shortened = preview(&long);
        assert_eq!(shortened.chars().count(), 43);
        assert!(shortened.ends_with("..."));
    }

    #[test]
    fn test_truncate_marks_shortened_names() {
        assert_eq!(truncate("Foo", 18), "Foo");
        assert_eq!(truncate("a-very-long-take-name", 10), "a-very-lo…");
    }

    #[test]
    fn test_payload_preview_per_kind() {
        assert_eq!(
            payload_preview(&record(Payload::Text("hi".into()), 0, 0)),
            "hi"
        );
        assert_eq!(payload_preview(&record(Payload::Delete, 2, 5)), "5 chars");
        assert_eq!(
            payload_preview(&record(
                Payload::Eval {
                    procedure: "run".into(),
                    arguments: String::new(),
                },
                0,
                0
            )),
            "run"
        );
        assert_eq!(
            payload_preview(&record(Payload::Mode("ruby".into()), 0, 0)),
            "ruby"
        );
    }
}
