//! Flat-file persistence: one CSV file per machine and table, rewritten in
//! full on every mutation.

use crate::error::{Result, TrackerError};
use chrono::Local;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LOCK_FILE: &str = ".downtime.lock";

/// A table that is persisted as a whole CSV file.
pub trait CsvTable: Sized {
    /// File name suffix: `<machine>_<KIND>.csv`.
    const KIND: &'static str;

    fn to_csv_bytes(&self) -> Result<Vec<u8>>;

    fn from_csv_bytes(bytes: &[u8]) -> Result<Self>;
}

/// What to do with a persisted file that fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// Surface the parse error and stop.
    #[default]
    Abort,
    /// Move the file aside and carry on as if it were absent.
    Quarantine,
}

/// The data directory, held exclusively for the lifetime of the value.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    on_corrupt: CorruptPolicy,
    lock: File,
}

impl Store {
    /// Create the directory if needed and take the session lock.
    pub fn open(root: impl Into<PathBuf>, on_corrupt: CorruptPolicy) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| TrackerError::io(&root, e))?;
            info!(path = %root.display(), "created data directory");
        }

        let lock_path = root.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| TrackerError::io(&lock_path, e))?;
        if let Err(e) = lock.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(TrackerError::Locked { path: lock_path });
            }
            return Err(TrackerError::io(&lock_path, e));
        }

        debug!(path = %root.display(), ?on_corrupt, "opened store");
        Ok(Self {
            root,
            on_corrupt,
            lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path<T: CsvTable>(&self, machine: &str) -> PathBuf {
        self.root.join(format!("{machine}_{}.csv", T::KIND))
    }

    /// Load a table, or `None` when it has never been saved.
    pub fn load<T: CsvTable>(&self, machine: &str) -> Result<Option<T>> {
        let path = self.table_path::<T>(machine);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TrackerError::io(&path, e)),
        };

        match T::from_csv_bytes(&bytes) {
            Ok(table) => {
                debug!(machine, path = %path.display(), "loaded table");
                Ok(Some(table))
            }
            Err(e) => {
                let e = e.at_path(&path);
                match self.on_corrupt {
                    CorruptPolicy::Abort => Err(e),
                    CorruptPolicy::Quarantine => {
                        let moved = quarantine(&path)?;
                        warn!(
                            machine,
                            error = %e,
                            moved_to = %moved.display(),
                            "quarantined unreadable table"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Rewrite the whole table file.
    pub fn save<T: CsvTable>(&self, machine: &str, table: &T) -> Result<()> {
        let path = self.table_path::<T>(machine);
        let bytes = table.to_csv_bytes()?;
        write_atomic(&path, &bytes)?;
        debug!(machine, path = %path.display(), bytes = bytes.len(), "saved table");
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

/// Write via a temp file in the same directory, then rename over the target.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| TrackerError::io(parent, e))?;
    temp_file
        .write_all(content)
        .map_err(|e| TrackerError::io(temp_file.path(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| TrackerError::io(path, e.error))?;

    Ok(())
}

fn quarantine(path: &Path) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{timestamp}"));
    let target = path.with_file_name(name);
    fs::rename(path, &target).map_err(|e| TrackerError::io(path, e))?;
    Ok(target)
}
