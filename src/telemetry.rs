use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace|debug|info|warn|error
    pub level: String,
    pub format: LogFormat,
    pub no_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            no_ansi: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configured level raised by one step per `-v`, capped at trace.
/// Unknown configured levels count as warn.
pub fn effective_level(cfg: &LogConfig, verbosity: u8) -> &'static str {
    let configured = LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(cfg.level.trim()))
        .unwrap_or(1);
    LEVELS[(configured + usize::from(verbosity)).min(LEVELS.len() - 1)]
}

/// Install the global subscriber. Logs go to stderr so table output on stdout stays clean.
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing_with(cfg: &LogConfig, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(cfg, verbosity)));

    let base = fmt::layer()
        .with_target(true)
        .with_ansi(!cfg.no_ansi)
        .with_writer(std::io::stderr);
    let fmt_layer = match cfg.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
