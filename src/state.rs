use crate::catalog::Catalog;
use crate::config::TrackerConfig;
use crate::error::{Rejection, Result, TrackerError};
use crate::ledger::{DowntimeRecord, Ledger};
use crate::store::{CsvTable, Store};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

pub const EXPORT_MIME: &str = "text/csv";

/// Input for one downtime entry, as collected by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDowntime {
    pub date: NaiveDate,
    pub fault: String,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

/// A CSV download of one machine's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export_file_name(machine: &str) -> String {
    format!("{}_downtime_records.csv", machine.replace(' ', "_"))
}

/// Everything tracked for one machine.
#[derive(Debug, Clone)]
pub struct MachineBook {
    name: String,
    ledger: Ledger,
    catalog: Catalog,
}

impl MachineBook {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

// --- Application Context ---

/// Ledgers and catalogs for the fixed machine set. With a [`Store`] attached,
/// every mutation rewrites the affected file before returning; if that write
/// fails the in-memory change stays applied and the I/O error is returned.
#[derive(Debug)]
pub struct Tracker {
    books: Vec<MachineBook>,
    store: Option<Store>,
}

impl Tracker {
    /// Session-only state: empty ledgers, default catalogs.
    pub fn in_memory<S: AsRef<str>>(machines: &[S]) -> Result<Self> {
        validate_machines(machines)?;
        let books = machines
            .iter()
            .map(|m| MachineBook {
                name: m.as_ref().to_string(),
                ledger: Ledger::new(),
                catalog: Catalog::with_defaults(),
            })
            .collect();
        Ok(Self { books, store: None })
    }

    /// Load every machine from `store`. Missing catalogs are seeded with the
    /// defaults and written out straight away; missing ledgers start empty.
    pub fn open<S: AsRef<str>>(machines: &[S], store: Store) -> Result<Self> {
        validate_machines(machines)?;
        let mut books = Vec::with_capacity(machines.len());
        for machine in machines {
            let name = machine.as_ref();
            let ledger = store.load::<Ledger>(name)?.unwrap_or_default();
            let catalog = match store.load::<Catalog>(name)? {
                Some(catalog) => catalog,
                None => {
                    let catalog = Catalog::with_defaults();
                    store.save(name, &catalog)?;
                    info!(machine = name, faults = catalog.len(), "seeded default fault list");
                    catalog
                }
            };
            debug!(machine = name, records = ledger.len(), faults = catalog.len(), "machine ready");
            books.push(MachineBook {
                name: name.to_string(),
                ledger,
                catalog,
            });
        }
        Ok(Self {
            books,
            store: Some(store),
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        if config.persist {
            let store = Store::open(&config.data_dir, config.on_corrupt)?;
            Self::open(&config.machines, store)
        } else {
            Self::in_memory(&config.machines)
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn machines(&self) -> impl Iterator<Item = &str> {
        self.books.iter().map(|b| b.name.as_str())
    }

    pub fn books(&self) -> &[MachineBook] {
        &self.books
    }

    pub fn book(&self, machine: &str) -> Result<&MachineBook> {
        let idx = self.index_of(machine)?;
        Ok(&self.books[idx])
    }

    pub fn ledger(&self, machine: &str) -> Result<&Ledger> {
        self.book(machine).map(MachineBook::ledger)
    }

    pub fn catalog(&self, machine: &str) -> Result<&Catalog> {
        self.book(machine).map(MachineBook::catalog)
    }

    /// Append a downtime entry. The fault must currently be in the machine's catalog.
    pub fn record_downtime(&mut self, machine: &str, entry: NewDowntime) -> Result<DowntimeRecord> {
        let idx = self.index_of(machine)?;
        let book = &mut self.books[idx];
        if !book.catalog.contains(&entry.fault) {
            return Err(Rejection::UnknownFault(entry.fault).into());
        }
        let record = book
            .ledger
            .append(entry.date, &entry.fault, entry.start_time, entry.duration_minutes)?
            .clone();
        info!(
            machine,
            fault = record.fault(),
            duration_minutes = record.duration_minutes(),
            "recorded downtime"
        );

        self.persist(idx, |b| &b.ledger)?;
        Ok(record)
    }

    /// Delete rows by their one-based numbers. Returns how many were removed.
    pub fn delete_rows<I>(&mut self, machine: &str, indices: I) -> Result<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let idx = self.index_of(machine)?;
        let deleted = self.books[idx].ledger.delete_by_indices(indices)?;
        if deleted == 0 {
            return Ok(0);
        }
        info!(machine, rows = deleted, "deleted downtime rows");

        self.persist(idx, |b| &b.ledger)?;
        Ok(deleted)
    }

    /// Add a fault label; returns the label as stored (trimmed).
    pub fn add_fault(&mut self, machine: &str, label: &str) -> Result<String> {
        let idx = self.index_of(machine)?;
        let added = self.books[idx].catalog.add_fault(label)?.to_string();
        info!(machine, fault = %added, "added fault");

        self.persist(idx, |b| &b.catalog)?;
        Ok(added)
    }

    pub fn delete_fault(&mut self, machine: &str, label: &str) -> Result<()> {
        let idx = self.index_of(machine)?;
        self.books[idx].catalog.delete_fault(label)?;
        info!(machine, fault = label.trim(), "deleted fault");

        self.persist(idx, |b| &b.catalog)
    }

    /// Current in-memory ledger as a CSV download.
    pub fn export(&self, machine: &str) -> Result<Export> {
        let book = self.book(machine)?;
        Ok(Export {
            file_name: export_file_name(&book.name),
            mime: EXPORT_MIME,
            bytes: book.ledger.to_csv_bytes()?,
        })
    }

    fn index_of(&self, machine: &str) -> Result<usize> {
        self.books
            .iter()
            .position(|b| b.name == machine)
            .ok_or_else(|| TrackerError::UnknownMachine {
                name: machine.to_string(),
            })
    }

    fn persist<T, F>(&self, idx: usize, table: F) -> Result<()>
    where
        T: CsvTable,
        F: FnOnce(&MachineBook) -> &T,
    {
        match &self.store {
            Some(store) => {
                let book = &self.books[idx];
                store.save(&book.name, table(book))
            }
            None => Ok(()),
        }
    }
}

/// Machine names become file name prefixes, so they must be non-empty,
/// unique and free of path separators.
pub fn validate_machines<S: AsRef<str>>(machines: &[S]) -> Result<()> {
    if machines.is_empty() {
        return Err(TrackerError::Config("at least one machine is required".into()));
    }
    for (i, machine) in machines.iter().enumerate() {
        let name = machine.as_ref();
        if name.trim().is_empty() || name.trim() != name {
            return Err(TrackerError::Config(format!(
                "invalid machine name '{name}': empty or padded with whitespace"
            )));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(TrackerError::Config(format!(
                "invalid machine name '{name}': must not be a path"
            )));
        }
        if machines[..i].iter().any(|m| m.as_ref() == name) {
            return Err(TrackerError::Config(format!("duplicate machine name '{name}'")));
        }
    }
    Ok(())
}
