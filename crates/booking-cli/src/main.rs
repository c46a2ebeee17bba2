//! `slots` CLI — generate, validate, and expand availability data from the
//! command line.
//!
//! ## Usage
//!
//! ```sh
//! # Generate slots for a template over a date range (stdin → stdout)
//! cat template.json | slots generate --from 2026-03-16 --to 2026-03-22
//!
//! # Generate from file to file, with a pinned clock for reproducible runs
//! slots generate -i template.json -o slots.json \
//!     --from 2026-03-16 --to 2026-03-22 --now 2026-03-01T00:00:00Z
//!
//! # Suppress slots falling inside schedule exceptions
//! slots generate -i template.json --from 2026-03-16 --to 2026-03-22 \
//!     --exceptions exceptions.json
//!
//! # Skip slots already materialized by a previous run
//! slots generate -i template.json --from 2026-03-16 --to 2026-03-22 \
//!     --existing slots.json
//!
//! # Validate a template (blocks, bounds, overlaps, timezone)
//! slots validate -i template.json
//!
//! # Expand a schedule exception into its occurrence intervals
//! slots expand -i exception.json --horizon 2026-06-01T00:00:00Z
//! ```

use anyhow::{Context, Result};
use booking_engine::exceptions::{self, BlockedSlotPolicy, ScheduleException};
use booking_engine::slots::{self, CandidateSlot, SlotKey};
use booking_engine::template::{DateRange, WeeklyTemplate};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "slots", version, about = "Availability slot generation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate candidate slots for a weekly template
    Generate {
        /// Template JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// First local date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last local date of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Clock override, RFC 3339 (defaults to the current time)
        #[arg(long)]
        now: Option<String>,
        /// JSON file with schedule exceptions to apply
        #[arg(long)]
        exceptions: Option<String>,
        /// JSON file with previously generated slots to skip
        #[arg(long)]
        existing: Option<String>,
        /// Keep suppressed slots in the output with status "blocked"
        #[arg(long)]
        blocked: bool,
    },
    /// Validate a weekly template
    Validate {
        /// Template JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Expand a schedule exception into occurrence intervals
    Expand {
        /// Exception JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Upper bound on occurrence starts, RFC 3339
        #[arg(long)]
        horizon: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            from,
            to,
            now,
            exceptions,
            existing,
            blocked,
        } => {
            let template: WeeklyTemplate = serde_json::from_str(&read_input(input.as_deref())?)
                .context("Failed to parse template JSON")?;
            let now = parse_now(now.as_deref())?;
            let existing_keys = load_existing_keys(existing.as_deref())?;

            let candidates =
                slots::generate(&template, DateRange { from, to }, &existing_keys, now)
                    .context("Slot generation failed")?;

            let candidates = match exceptions {
                Some(path) => {
                    let parsed: Vec<ScheduleException> =
                        serde_json::from_str(&read_input(Some(&path))?)
                            .context("Failed to parse exceptions JSON")?;
                    let policy = if blocked {
                        BlockedSlotPolicy::MaterializeBlocked
                    } else {
                        BlockedSlotPolicy::Drop
                    };
                    let horizon = range_horizon(to)?;
                    exceptions::apply_exceptions(candidates, &parsed, horizon, policy)
                        .context("Applying exceptions failed")?
                }
                None => candidates,
            };

            let json = serde_json::to_string_pretty(&candidates)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Validate { input } => {
            let template: WeeklyTemplate = serde_json::from_str(&read_input(input.as_deref())?)
                .context("Failed to parse template JSON")?;
            template
                .validate()
                .context("Template validation failed")?;
            println!("template is valid");
        }
        Commands::Expand { input, horizon } => {
            let exception: ScheduleException =
                serde_json::from_str(&read_input(input.as_deref())?)
                    .context("Failed to parse exception JSON")?;
            let horizon = parse_instant(&horizon)?;
            let occurrences = exceptions::occurrences(&exception, horizon)
                .context("Exception expansion failed")?;
            let json = serde_json::to_string_pretty(&occurrences)?;
            write_output(None, &json)?;
        }
    }

    Ok(())
}

/// Clock for the run: an explicit RFC 3339 override, or the current time.
fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(raw) => parse_instant(raw),
        None => Ok(Utc::now()),
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))
}

/// Identity keys of previously generated slots, for idempotent re-runs.
fn load_existing_keys(path: Option<&str>) -> Result<HashSet<SlotKey>> {
    match path {
        Some(path) => {
            let prior: Vec<CandidateSlot> = serde_json::from_str(&read_input(Some(path))?)
                .context("Failed to parse existing slots JSON")?;
            Ok(prior.iter().map(CandidateSlot::key).collect())
        }
        None => Ok(HashSet::new()),
    }
}

/// Exception horizon covering the full generation range: midnight UTC after
/// the last date.
fn range_horizon(to: NaiveDate) -> Result<DateTime<Utc>> {
    let next = to.succ_opt().context("date range end out of range")?;
    Ok(Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
