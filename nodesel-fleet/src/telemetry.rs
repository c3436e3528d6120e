//! Logging setup for nodesel binaries
//!
//!     A single `tracing` subscriber writes to stderr, as text or as one JSON object per line.
//!     The level comes from [LogConfig] unless `RUST_LOG` is set.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,  // trace|debug|info|warn|error
    pub format: String, // text|json
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogConfig {
    /// Level directive, falling back to `info` for unknown names
    pub fn level_directive(&self) -> &'static str {
        match self.level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        }
    }

    pub fn log_format(&self) -> LogFormat {
        if self.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level_directive()))
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so that command output on stdout stays machine readable. A second call is
/// a no-op.
pub fn init_tracing_with(cfg: &LogConfig) {
    let base = fmt::layer().with_target(true).with_writer(std::io::stderr);
    let fmt_layer = match cfg.log_format() {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Text => base.boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(cfg.filter())
        .with(fmt_layer)
        .try_init();
}
