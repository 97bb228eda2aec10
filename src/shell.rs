//! Interactive session. Holds the view state (selected machine) and maps each
//! input line to one tracker command followed by a display of the result.

use crate::cli::{self, parse_clock_arg, EntryArgs};
use crate::error::{Result, TrackerError};
use crate::ledger::{end_time, CLOCK_FORMAT};
use crate::state::Tracker;
use crate::ui;
use chrono::{Local, NaiveTime};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// List machines
    Machines,
    /// Select the machine to work on
    Use {
        #[arg(num_args = 1.., required = true)]
        machine: Vec<String>,
    },
    /// Record downtime on the selected machine
    Add(EntryArgs),
    /// Show the estimated end time for a start and duration
    Estimate {
        #[arg(long, value_parser = parse_clock_arg)]
        start: Option<NaiveTime>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        minutes: u32,
    },
    /// Show the downtime table
    List,
    /// Delete rows by number
    Delete {
        #[arg(required = true, value_name = "NO")]
        rows: Vec<usize>,
    },
    /// Write the records as CSV (`-` for the terminal)
    Export {
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Show the fault list
    Faults,
    /// Add a fault type
    FaultAdd {
        #[arg(num_args = 1.., required = true)]
        label: Vec<String>,
    },
    /// Delete a fault type
    FaultDel {
        #[arg(num_args = 1.., required = true)]
        label: Vec<String>,
    },
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<'a> {
    tracker: &'a mut Tracker,
    selected: Option<String>,
}

impl<'a> Shell<'a> {
    pub fn new(tracker: &'a mut Tracker, selected: Option<String>) -> Result<Self> {
        if let Some(machine) = &selected {
            tracker.book(machine)?;
        }
        Ok(Self { tracker, selected })
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Prompt, read, execute until `quit` or end of input.
    pub fn run(&mut self, input: &mut dyn BufRead, out: &mut dyn Write) -> io::Result<()> {
        if !self.tracker.is_persistent() {
            ui::warning(out, "In-memory session: nothing is saved when you quit.")?;
        }
        ui::render_machines(out, self.tracker)?;

        let mut line = String::new();
        loop {
            write!(out, "{}> ", self.selected.as_deref().unwrap_or("downtime"))?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(());
            }
            if self.execute(&line, out)? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Run one input line. Tracker errors are reported to `out`; only
    /// failures writing to `out` are returned.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let words = match split_words(line) {
            Ok(words) if words.is_empty() => return Ok(Flow::Continue),
            Ok(words) => words,
            Err(msg) => {
                ui::error(out, &msg)?;
                return Ok(Flow::Continue);
            }
        };

        let parsed = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(out, "{}", e.render())?;
                return Ok(Flow::Continue);
            }
        };
        debug!(command = ?parsed.command, "shell command");

        match self.dispatch(parsed.command, out) {
            Ok(flow) => Ok(flow),
            Err(ShellError::Io(e)) => Err(e),
            Err(ShellError::Tracker(e)) if e.is_warning() => {
                ui::warning(out, &e.to_string())?;
                Ok(Flow::Continue)
            }
            Err(ShellError::Tracker(e)) => {
                ui::error(out, &e.to_string())?;
                Ok(Flow::Continue)
            }
            Err(ShellError::Other(e)) => {
                ui::error(out, &format!("{e:#}"))?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(
        &mut self,
        command: ShellCommand,
        out: &mut dyn Write,
    ) -> std::result::Result<Flow, ShellError> {
        match command {
            ShellCommand::Machines => ui::render_machines(out, self.tracker)?,
            ShellCommand::Use { machine } => {
                let machine = machine.join(" ");
                let book = self.tracker.book(&machine)?;
                ui::success(out, &format!("Selected Machine: {}", book.name()))?;
                self.selected = Some(machine);
            }
            ShellCommand::Add(entry) => {
                let machine = self.require_machine()?;
                let entry = entry.resolve(
                    self.tracker.catalog(&machine)?,
                    Local::now().naive_local(),
                )?;
                let record = self.tracker.record_downtime(&machine, entry)?;
                ui::success(
                    out,
                    &format!(
                        "Downtime entry added! (ends {})",
                        record.end_time().format(CLOCK_FORMAT)
                    ),
                )?;
            }
            ShellCommand::Estimate { start, minutes } => {
                let start = start.unwrap_or_else(|| Local::now().time());
                let end = end_time(start, minutes);
                ui::info(out, &format!("Estimated End Time: {}", end.format(CLOCK_FORMAT)))?;
            }
            ShellCommand::List => {
                let machine = self.require_machine()?;
                let ledger = self.tracker.ledger(&machine)?;
                ui::render_records(out, &machine, ledger)?;
                for (number, record) in ledger.rows() {
                    writeln!(out, "    {}", ui::row_label(number, record))?;
                }
            }
            ShellCommand::Delete { rows } => {
                let machine = self.require_machine()?;
                let deleted = self.tracker.delete_rows(&machine, rows)?;
                ui::success(out, &format!("Deleted {deleted} row(s)."))?;
            }
            ShellCommand::Export { out: path } => {
                let machine = self.require_machine()?;
                if let Some(target) = cli::export(self.tracker, &machine, path.as_deref(), out)
                    .map_err(ShellError::Other)?
                {
                    ui::success(out, &format!("Records written to {}", target.display()))?;
                }
            }
            ShellCommand::Faults => {
                let machine = self.require_machine()?;
                ui::render_faults(out, &machine, self.tracker.catalog(&machine)?)?;
            }
            ShellCommand::FaultAdd { label } => {
                let machine = self.require_machine()?;
                let added = self.tracker.add_fault(&machine, &label.join(" "))?;
                ui::success(out, &format!("Added fault: {added}"))?;
            }
            ShellCommand::FaultDel { label } => {
                let machine = self.require_machine()?;
                let label = label.join(" ");
                self.tracker.delete_fault(&machine, &label)?;
                ui::success(out, &format!("Deleted fault: {}", label.trim()))?;
            }
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn require_machine(&self) -> std::result::Result<String, ShellError> {
        self.selected
            .clone()
            .ok_or_else(|| ShellError::Other(anyhow::anyhow!("select a machine first: use <machine>")))
    }
}

enum ShellError {
    Io(io::Error),
    Tracker(TrackerError),
    Other(anyhow::Error),
}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        ShellError::Io(e)
    }
}

impl From<TrackerError> for ShellError {
    fn from(e: TrackerError) -> Self {
        ShellError::Tracker(e)
    }
}

/// Split a line on whitespace, keeping single- or double-quoted runs together.
fn split_words(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MACHINES: [&str; 3] = ["LVD", "Euromac 1", "Euromac 2"];

    fn exec(shell: &mut Shell<'_>, line: &str) -> String {
        let mut out = Vec::new();
        shell.execute(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(
            split_words(r#"add --fault "Idle time (800)" --minutes 5"#).unwrap(),
            ["add", "--fault", "Idle time (800)", "--minutes", "5"]
        );
        assert_eq!(split_words("use 'Euromac 1'").unwrap(), ["use", "Euromac 1"]);
        assert_eq!(split_words("fault-add \"\"").unwrap(), ["fault-add", ""]);
        assert!(split_words("   ").unwrap().is_empty());
        assert!(split_words("use \"LVD").is_err());
    }

    #[test]
    fn commands_need_a_selected_machine() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        let mut shell = Shell::new(&mut tracker, None).unwrap();
        let text = exec(&mut shell, "list");
        assert!(text.contains("select a machine first"));
    }

    #[test]
    fn use_accepts_unquoted_names_with_spaces() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        let mut shell = Shell::new(&mut tracker, None).unwrap();
        let text = exec(&mut shell, "use Euromac 2");
        assert!(text.contains("Selected Machine: Euromac 2"));
        assert_eq!(shell.selected(), Some("Euromac 2"));

        let text = exec(&mut shell, "use Trumpf");
        assert!(text.contains("unknown machine: Trumpf"));
        assert_eq!(shell.selected(), Some("Euromac 2"));
    }

    #[test]
    fn session_records_and_deletes() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        {
            let mut shell = Shell::new(&mut tracker, Some("LVD".into())).unwrap();
            let text = exec(
                &mut shell,
                r#"add --date 2024-01-10 --start 23:50 --minutes 30 --fault "Overtravel (810)""#,
            );
            assert!(text.contains("ends 00:20"));
            exec(&mut shell, "add --date 2024-01-11 --start 08:00 --minutes 5 --fault 1");

            let text = exec(&mut shell, "list");
            assert!(text.contains("2 | 2024-01-11 | Idle time (800) | 08:00"));

            let text = exec(&mut shell, "delete 1");
            assert!(text.contains("Deleted 1 row(s)."));
        }
        let ledger = tracker.ledger("LVD").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0].fault(), "Idle time (800)");
    }

    #[test]
    fn fault_warnings_keep_the_session_alive() {
        let mut tracker = Tracker::in_memory(&["LVD"]).unwrap();
        let mut shell = Shell::new(&mut tracker, Some("LVD".into())).unwrap();

        let text = exec(&mut shell, "fault-add Tool Sync (807)");
        assert!(text.contains("fault already exists: Tool Sync (807)"));
        let text = exec(&mut shell, "fault-add Door open (812)");
        assert!(text.contains("Added fault: Door open (812)"));
        let text = exec(&mut shell, "fault-add \"  \"");
        assert!(text.contains("fault name must not be empty"));
    }

    #[test]
    fn fault_del_reports_the_trimmed_label() {
        let mut tracker = Tracker::in_memory(&["LVD"]).unwrap();
        let mut shell = Shell::new(&mut tracker, Some("LVD".into())).unwrap();

        let text = exec(&mut shell, "fault-del \"  Tool Sync (807) \"");
        assert!(text.contains("Deleted fault: Tool Sync (807)\n"), "{text}");
        assert!(!text.contains("Deleted fault:  "));
    }

    #[test]
    fn bad_input_prints_usage_instead_of_failing() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        let mut shell = Shell::new(&mut tracker, Some("LVD".into())).unwrap();
        let text = exec(&mut shell, "add --minutes 0 --fault 1");
        assert!(!text.is_empty());
        assert!(tracker_is_empty(&shell));

        let text = exec(&mut shell, "frobnicate");
        assert!(!text.is_empty());
    }

    fn tracker_is_empty(shell: &Shell<'_>) -> bool {
        shell.tracker.ledger("LVD").unwrap().is_empty()
    }

    #[test]
    fn run_stops_on_quit_or_eof() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        let mut shell = Shell::new(&mut tracker, Some("LVD".into())).unwrap();

        let mut input: &[u8] = b"estimate --start 08:00 --minutes 45\nquit\nfaults\n";
        let mut out = Vec::new();
        shell.run(&mut input, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Estimated End Time: 08:45"));
        assert!(!text.contains("Fault Types"));

        let mut input: &[u8] = b"machines\n";
        let mut out = Vec::new();
        shell.run(&mut input, &mut out).unwrap();
    }

    #[test]
    fn unknown_start_machine_is_rejected() {
        let mut tracker = Tracker::in_memory(&MACHINES).unwrap();
        assert!(Shell::new(&mut tracker, Some("Trumpf".into())).is_err());
    }
}
