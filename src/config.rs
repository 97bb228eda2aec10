//! Layered configuration: built-in defaults, then a TOML file, then
//! `DOWNTIME_*` environment variables. Command-line flags are applied on top
//! by the binary.

use crate::error::{Result, TrackerError};
use crate::state::validate_machines;
use crate::store::CorruptPolicy;
use crate::telemetry::LogConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "downtime.toml";

pub const ENV_PREFIX: &str = "DOWNTIME_";

pub const DEFAULT_MACHINES: [&str; 3] = ["LVD", "Euromac 1", "Euromac 2"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Directory holding `<machine>_downtime.csv` and `<machine>_faults.csv`.
    pub data_dir: PathBuf,
    /// Mirror every mutation to disk. When false, state lives for the session only.
    pub persist: bool,
    /// Fixed machine set, in display order.
    pub machines: Vec<String>,
    pub on_corrupt: CorruptPolicy,
    pub log: LogConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("downtime-data"),
            persist: true,
            machines: DEFAULT_MACHINES.iter().map(|m| m.to_string()).collect(),
            on_corrupt: CorruptPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load and validate. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(TrackerError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| TrackerError::Config(format!("failed to extract config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_machines(&self.machines)
    }
}
