//! Machine downtime tracker.
//!
//! Each machine of a fixed set owns a [`Ledger`] of downtime records and a
//! [`Catalog`] of fault types. A [`Tracker`] holds them for the session and,
//! when backed by a [`Store`], rewrites the affected CSV file after every
//! change.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod shell;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod ui;

pub use catalog::{Catalog, DEFAULT_FAULTS};
pub use config::TrackerConfig;
pub use error::{Rejection, Result, TrackerError};
pub use ledger::{DowntimeRecord, Ledger};
pub use state::{Export, MachineBook, NewDowntime, Tracker};
pub use store::{CorruptPolicy, CsvTable, Store};
