use crate::catalog::Catalog;
use crate::ledger::{DowntimeRecord, Ledger, CLOCK_FORMAT, LEDGER_HEADER};
use crate::state::Tracker;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::{style, Emoji};
use std::io::{self, Write};

pub struct Symbols;
impl Symbols {
    pub const SUCCESS: Emoji<'static, 'static> = Emoji("✔", "+");
    pub const ERROR: Emoji<'static, 'static> = Emoji("✖", "x");
    pub const WARNING: Emoji<'static, 'static> = Emoji("⚠", "!");
    pub const INFO: Emoji<'static, 'static> = Emoji("ℹ", "i");
    pub const ARROW: Emoji<'static, 'static> = Emoji("➜", ">");
}

pub fn success(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "  {} {}", style(Symbols::SUCCESS).green(), message)
}

pub fn warning(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "  {} {}", style(Symbols::WARNING).yellow(), message)
}

pub fn error(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "  {} {}", style(Symbols::ERROR).red(), message)
}

pub fn info(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "  {} {}", style(Symbols::INFO).blue(), message)
}

/// One-line summary used when picking rows to delete.
pub fn row_label(number: usize, record: &DowntimeRecord) -> String {
    format!(
        "{} | {} | {} | {}",
        number,
        record.date(),
        record.fault(),
        record.start_time().format(CLOCK_FORMAT)
    )
}

pub fn records_table(ledger: &Ledger) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("No.").add_attribute(Attribute::Bold)];
    header.extend(
        LEDGER_HEADER
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    table.set_header(header);

    for (number, record) in ledger.rows() {
        table.add_row(vec![
            Cell::new(number),
            Cell::new(record.date()),
            Cell::new(record.fault()),
            Cell::new(record.start_time().format(CLOCK_FORMAT)),
            Cell::new(record.duration_minutes()),
            Cell::new(record.end_time().format(CLOCK_FORMAT)),
        ]);
    }
    table
}

pub fn render_records(out: &mut dyn Write, machine: &str, ledger: &Ledger) -> io::Result<()> {
    if ledger.is_empty() {
        return info(out, &format!("No downtime entries yet for {machine}."));
    }
    writeln!(out, "{}", style(format!("Downtime Records: {machine}")).bold())?;
    writeln!(out, "{}", records_table(ledger))
}

pub fn render_faults(out: &mut dyn Write, machine: &str, catalog: &Catalog) -> io::Result<()> {
    writeln!(out, "{}", style(format!("Fault Types: {machine}")).bold())?;
    for (i, label) in catalog.labels().iter().enumerate() {
        writeln!(out, "  {:>3}. {}", i + 1, label)?;
    }
    Ok(())
}

pub fn render_machines(out: &mut dyn Write, tracker: &Tracker) -> io::Result<()> {
    for book in tracker.books() {
        writeln!(
            out,
            "  {} {}  ({} records, {} faults)",
            style(Symbols::ARROW).cyan(),
            style(book.name()).bold(),
            book.ledger().len(),
            book.catalog().len()
        )?;
    }
    Ok(())
}
