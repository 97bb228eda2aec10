use crate::catalog::Catalog;
use crate::config::TrackerConfig;
use crate::error::Rejection;
use crate::ledger::{end_time, parse_clock, CLOCK_FORMAT};
use crate::shell::Shell;
use crate::state::{NewDowntime, Tracker};
use crate::ui;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "downtime",
    version,
    about,
    long_about = None,
    after_help = r#"Examples:
  downtime machines
  downtime record add -m LVD --minutes 45 --fault "Idle time (800)" --start 08:00
  downtime record add -m "Euromac 1" --minutes 20 --fault 3 --dry-run
  downtime record list -m LVD
  downtime record delete -m LVD 2 4
  downtime record export -m "Euromac 2" --out reports/
  downtime fault add -m LVD "Door open (812)"
  downtime --in-memory shell -m LVD"#
)]
pub struct Cli {
    /// Configuration file (TOML); `downtime.toml` is used when present
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the per-machine CSV files
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep records and faults in memory only; nothing is read or written
    #[arg(long)]
    pub in_memory: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flags take precedence over the file and environment.
    pub fn apply_overrides(&self, config: &mut TrackerConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if self.in_memory {
            config.persist = false;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List machines with their record and fault counts
    Machines,
    /// Record, list, delete and export downtime entries
    Record {
        #[command(subcommand)]
        cmd: RecordCommand,
    },
    /// Manage a machine's fault types
    Fault {
        #[command(subcommand)]
        cmd: FaultCommand,
    },
    /// Interactive session over the same data
    Shell {
        /// Machine to select on start
        #[arg(short, long)]
        machine: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// Add a downtime entry
    Add {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
        #[command(flatten)]
        entry: EntryArgs,
        /// Only print the estimated end time
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the downtime table
    List {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
    },
    /// Delete rows by their number in `record list`
    Delete {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
        #[arg(required = true, value_name = "NO")]
        rows: Vec<usize>,
    },
    /// Write the records as CSV
    Export {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
        /// File or directory to write to, `-` for stdout. Defaults to
        /// `<machine>_downtime_records.csv` in the current directory.
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum FaultCommand {
    /// Show the fault list
    List {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
    },
    /// Add a fault type
    Add {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
        label: String,
    },
    /// Delete a fault type
    Delete {
        #[arg(short, long, env = "DOWNTIME_MACHINE")]
        machine: String,
        label: String,
    },
}

/// Inputs for one downtime entry.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EntryArgs {
    /// Date of the stop (YYYY-MM-DD), defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<NaiveDate>,

    /// Start time (HH:MM), defaults to now
    #[arg(long, value_parser = parse_clock_arg)]
    pub start: Option<NaiveTime>,

    /// Downtime duration in minutes
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub minutes: u32,

    /// Fault label, or its number in the fault list
    #[arg(short, long)]
    pub fault: String,
}

impl EntryArgs {
    /// Fill in defaults from `now` and resolve the fault against the catalog.
    pub fn resolve(
        &self,
        catalog: &Catalog,
        now: NaiveDateTime,
    ) -> crate::error::Result<NewDowntime> {
        let fault = catalog
            .resolve(&self.fault)
            .ok_or_else(|| Rejection::UnknownFault(self.fault.clone()))?;
        Ok(NewDowntime {
            date: self.date.unwrap_or(now.date()),
            fault: fault.to_string(),
            start_time: self.start.unwrap_or(now.time()),
            duration_minutes: self.minutes,
        })
    }
}

pub fn parse_date_arg(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

pub fn parse_clock_arg(raw: &str) -> std::result::Result<NaiveTime, String> {
    parse_clock(raw).map_err(|e| format!("expected HH:MM: {e}"))
}

pub fn run(
    cli: Cli,
    config: &TrackerConfig,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let mut tracker = Tracker::from_config(config).with_context(|| {
        if config.persist {
            format!("failed to open data directory {}", config.data_dir.display())
        } else {
            "failed to set up in-memory session".to_string()
        }
    })?;

    match cli.command {
        Command::Machines => ui::render_machines(out, &tracker)?,
        Command::Record { cmd } => run_record(&mut tracker, cmd, out)?,
        Command::Fault { cmd } => run_fault(&mut tracker, cmd, out)?,
        Command::Shell { machine } => {
            let mut shell = Shell::new(&mut tracker, machine)?;
            shell.run(input, out)?;
        }
    }
    Ok(())
}

fn run_record(tracker: &mut Tracker, cmd: RecordCommand, out: &mut dyn Write) -> Result<()> {
    match cmd {
        RecordCommand::Add {
            machine,
            entry,
            dry_run,
        } => {
            let entry = entry.resolve(tracker.catalog(&machine)?, Local::now().naive_local())?;
            let end = end_time(entry.start_time, entry.duration_minutes);
            ui::info(out, &format!("Estimated End Time: {}", end.format(CLOCK_FORMAT)))?;
            if dry_run {
                return Ok(());
            }
            tracker.record_downtime(&machine, entry)?;
            ui::success(out, "Downtime entry added!")?;
        }
        RecordCommand::List { machine } => {
            ui::render_records(out, &machine, tracker.ledger(&machine)?)?;
        }
        RecordCommand::Delete { machine, rows } => {
            let deleted = tracker.delete_rows(&machine, rows)?;
            ui::success(out, &format!("Deleted {deleted} row(s)."))?;
        }
        RecordCommand::Export { machine, out: path } => {
            let target = export(tracker, &machine, path.as_deref(), out)?;
            if let Some(target) = target {
                ui::success(out, &format!("Records written to {}", target.display()))?;
            }
        }
    }
    Ok(())
}

/// Write an export to `path`, or to `out` when `path` is `-`.
/// Returns the file written, if any.
pub fn export(
    tracker: &Tracker,
    machine: &str,
    path: Option<&Path>,
    out: &mut dyn Write,
) -> Result<Option<PathBuf>> {
    let export = tracker.export(machine)?;
    let target = match path {
        Some(p) if p == Path::new("-") => {
            out.write_all(&export.bytes)?;
            return Ok(None);
        }
        Some(p) if p.is_dir() => p.join(&export.file_name),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(&export.file_name),
    };
    std::fs::write(&target, &export.bytes)
        .with_context(|| format!("failed to write {}", target.display()))?;
    tracing::info!(machine, path = %target.display(), mime = export.mime, "exported records");
    Ok(Some(target))
}

fn run_fault(tracker: &mut Tracker, cmd: FaultCommand, out: &mut dyn Write) -> Result<()> {
    match cmd {
        FaultCommand::List { machine } => {
            ui::render_faults(out, &machine, tracker.catalog(&machine)?)?;
        }
        FaultCommand::Add { machine, label } => {
            let added = tracker.add_fault(&machine, &label)?;
            ui::success(out, &format!("Added fault: {added}"))?;
        }
        FaultCommand::Delete { machine, label } => {
            tracker.delete_fault(&machine, &label)?;
            ui::success(out, &format!("Deleted fault: {}", label.trim()))?;
        }
    }
    Ok(())
}
