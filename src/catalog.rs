//! Per-machine fault catalog: an insertion-ordered set of labels that is never empty.

use crate::error::{Rejection, Result, TrackerError};
use crate::store::CsvTable;

pub const CATALOG_HEADER: &str = "Fault";

/// Seed list for a machine without a persisted catalog.
pub const DEFAULT_FAULTS: [&str; 11] = [
    "Idle time (800)",
    "Suction cups (801)",
    "Faulty sensor (802)",
    "Thickness measurement (803)",
    "Tool change (804)",
    "Compensator (805)",
    "Press control unit (806)",
    "Tool Sync (807)",
    "Preload fail (808)",
    "Tool Broken (809)",
    "Overtravel (810)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    labels: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Catalog {
    pub fn with_defaults() -> Self {
        Self {
            labels: DEFAULT_FAULTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add a label at the end. Surrounding whitespace is trimmed first.
    pub fn add_fault(&mut self, label: &str) -> Result<&str> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Rejection::EmptyFault.into());
        }
        if self.contains(label) {
            return Err(TrackerError::DuplicateFault {
                label: label.to_string(),
            });
        }
        self.labels.push(label.to_string());
        Ok(self.labels[self.labels.len() - 1].as_str())
    }

    /// Remove a label. The last remaining label can never be removed,
    /// whichever label is named.
    pub fn delete_fault(&mut self, label: &str) -> Result<()> {
        if self.labels.len() == 1 {
            return Err(Rejection::LastRemainingFault.into());
        }
        let label = label.trim();
        let position = self
            .labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| TrackerError::FaultNotFound {
                label: label.to_string(),
            })?;
        self.labels.remove(position);
        Ok(())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Find a label by exact name, or by its one-based position in [`Catalog::labels`].
    pub fn resolve(&self, selector: &str) -> Option<&str> {
        let selector = selector.trim();
        if let Some(label) = self.labels.iter().find(|l| *l == selector) {
            return Some(label.as_str());
        }
        let position: usize = selector.parse().ok()?;
        position
            .checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl CsvTable for Catalog {
    const KIND: &'static str = "faults";

    fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.write_record([CATALOG_HEADER])
            .map_err(|e| TrackerError::io("<csv>", e.into()))?;
        for label in &self.labels {
            wtr.write_record([label])
                .map_err(|e| TrackerError::io("<csv>", e.into()))?;
        }
        wtr.into_inner()
            .map_err(|e| TrackerError::io("<csv>", e.into_error()))
    }

    fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let headers = rdr
            .headers()
            .map_err(|e| TrackerError::parse("<csv>", e.to_string()))?;
        if headers.len() != 1 || &headers[0] != CATALOG_HEADER {
            return Err(TrackerError::parse(
                "<csv>",
                format!("expected header '{CATALOG_HEADER}'"),
            ));
        }

        let mut labels: Vec<String> = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            let row = row.map_err(|e| TrackerError::parse("<csv>", e.to_string()))?;
            let label = row.get(0).unwrap_or_default().trim();
            if label.is_empty() {
                return Err(TrackerError::parse("<csv>", format!("row {}: empty fault", line + 1)));
            }
            if labels.iter().any(|l| l == label) {
                return Err(TrackerError::parse(
                    "<csv>",
                    format!("row {}: duplicate fault '{label}'", line + 1),
                ));
            }
            labels.push(label.to_string());
        }

        if labels.is_empty() {
            return Err(TrackerError::parse("<csv>", "fault list is empty"));
        }
        Ok(Self { labels })
    }
}
