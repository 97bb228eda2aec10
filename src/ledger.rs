//! Per-machine downtime ledger.
//!
//! Records are kept in insertion order and are never edited in place: the
//! only mutations are [`Ledger::append`] and [`Ledger::delete_by_indices`].
//! Row numbers handed to callers are one-based and always contiguous.

use crate::error::{Rejection, Result, TrackerError};
use crate::store::CsvTable;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column layout shared by the persisted ledger file and the CSV export.
pub const LEDGER_HEADER: [&str; 5] = ["Date", "Fault", "Start Time", "Downtime (min)", "End Time"];

/// Wall-clock format used for start and end times.
pub const CLOCK_FORMAT: &str = "%H:%M";

/// One logged interval of machine inoperability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeRecord {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Fault")]
    fault: String,
    #[serde(rename = "Start Time", with = "clock")]
    start_time: NaiveTime,
    #[serde(rename = "Downtime (min)")]
    duration_minutes: u32,
    #[serde(rename = "End Time", with = "clock")]
    end_time: NaiveTime,
}

impl DowntimeRecord {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn fault(&self) -> &str {
        &self.fault
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }
}

/// `start + minutes` on a 24h clock. Wraps past midnight; the date is not involved.
pub fn end_time(start: NaiveTime, minutes: u32) -> NaiveTime {
    let (end, _days) = truncate_to_minute(start)
        .overflowing_add_signed(chrono::Duration::minutes(i64::from(minutes)));
    end
}

/// Parse `HH:MM`, also accepting `HH:MM:SS` (seconds are dropped).
pub fn parse_clock(raw: &str) -> std::result::Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S").map(truncate_to_minute))
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

mod clock {
    use super::{parse_clock, CLOCK_FORMAT};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(CLOCK_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_clock(&raw).map_err(|e| serde::de::Error::custom(format!("invalid time '{raw}': {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    records: Vec<DowntimeRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, deriving its end time. Start times are kept at minute granularity.
    pub fn append(
        &mut self,
        date: NaiveDate,
        fault: &str,
        start_time: NaiveTime,
        duration_minutes: u32,
    ) -> Result<&DowntimeRecord> {
        if duration_minutes == 0 {
            return Err(Rejection::ZeroDuration.into());
        }
        if fault.trim().is_empty() {
            return Err(Rejection::EmptyFault.into());
        }

        let start_time = truncate_to_minute(start_time);
        let record = DowntimeRecord {
            date,
            fault: fault.to_string(),
            start_time,
            duration_minutes,
            end_time: end_time(start_time, duration_minutes),
        };
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Remove the rows with the given one-based numbers.
    ///
    /// All-or-nothing: if any number is outside `1..=len` nothing is removed.
    /// Duplicate numbers count once.
    pub fn delete_by_indices<I>(&mut self, indices: I) -> Result<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let doomed: BTreeSet<usize> = indices.into_iter().collect();
        let len = self.records.len();
        if let Some(&index) = doomed.iter().find(|&&i| i == 0 || i > len) {
            return Err(TrackerError::RowOutOfRange { index, len });
        }

        let mut number = 0;
        self.records.retain(|_| {
            number += 1;
            !doomed.contains(&number)
        });
        Ok(doomed.len())
    }

    pub fn records(&self) -> &[DowntimeRecord] {
        &self.records
    }

    /// Rows as shown to users: `(number, record)` with numbers starting at 1.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &DowntimeRecord)> {
        self.records.iter().enumerate().map(|(i, r)| (i + 1, r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CsvTable for Ledger {
    const KIND: &'static str = "downtime";

    fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.write_record(LEDGER_HEADER).map_err(encode_error)?;
        for record in &self.records {
            wtr.serialize(record).map_err(encode_error)?;
        }
        wtr.into_inner()
            .map_err(|e| TrackerError::io("<csv>", e.into_error()))
    }

    fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let headers = rdr
            .headers()
            .map_err(|e| TrackerError::parse("<csv>", e.to_string()))?;
        if headers.iter().ne(LEDGER_HEADER.iter().copied()) {
            return Err(TrackerError::parse(
                "<csv>",
                format!("expected header '{}'", LEDGER_HEADER.join(",")),
            ));
        }

        let mut records = Vec::new();
        for (line, row) in rdr.deserialize::<DowntimeRecord>().enumerate() {
            let record = row.map_err(|e| TrackerError::parse("<csv>", e.to_string()))?;
            if record.duration_minutes == 0 || record.fault.trim().is_empty() {
                return Err(TrackerError::parse(
                    "<csv>",
                    format!("row {}: empty fault or zero duration", line + 1),
                ));
            }
            records.push(record);
        }
        Ok(Self { records })
    }
}

fn encode_error(e: csv::Error) -> TrackerError {
    TrackerError::io("<csv>", e.into())
}
