//! Shared configuration loader for the nodesel tools.
//!
//! `defaults/nodesel.default.toml` is embedded into every binary so that the documented
//! defaults and runtime behavior stay in sync. Applications layer user files and command line
//! overrides on top of those defaults via [`Loader`] before deserializing into
//! [`NodeselConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use nodesel_fleet::{ActiveFilter, IpVersion, LogConfig, Timeout, WaitMode, WaitOptions};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use config::ConfigError;

const DEFAULT_TOML: &str = include_str!("../defaults/nodesel.default.toml");

/// Top-level configuration consumed by nodesel applications.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeselConfig {
    pub wait: WaitConfig,
    pub fleet: FleetConfig,
    pub logging: LoggingConfig,
}

/// Polling behavior of `wait`.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitConfig {
    pub interval_ms: u64,
    pub timeout: Timeout,
    pub mode: WaitMode,
}

/// How member records become candidates.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    pub ip_version: IpVersion,
    pub last_seen_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl NodeselConfig {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            interval: Duration::from_millis(self.wait.interval_ms),
            timeout: self.wait.timeout,
            mode: self.wait.mode,
        }
    }

    /// Candidate filter for a node identified as `self_id`
    pub fn active_filter(&self, self_id: Option<String>) -> ActiveFilter {
        ActiveFilter {
            self_id,
            last_seen_timeout: Duration::from_secs(self.fleet.last_seen_timeout_secs),
            ip_version: self.fleet.ip_version,
            now_ms: None,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.logging.level.clone(),
            format: self.logging.format.clone(),
        }
    }
}

/// Values given on the command line, each replacing the matching configuration key when set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitOverrides {
    /// `wait.timeout`
    pub timeout: Option<String>,
    /// `wait.interval_ms`
    pub interval_ms: Option<u64>,
    /// Forces `wait.mode = "unavailable"`; leaves the configured mode alone when false
    pub unavailable: bool,
    /// `fleet.ip_version`
    pub ip_version: Option<String>,
}

/// Layers sources over the embedded defaults; later layers win.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml)),
        }
    }

    /// Layer a TOML file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.layer(path.as_ref(), true)
    }

    /// Layer a TOML file, skipped when absent.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.layer(path.as_ref(), false)
    }

    fn layer(mut self, path: &Path, required: bool) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path).format(FileFormat::Toml).required(required));
        self
    }

    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Apply every flag that was given. Values are validated by [Loader::build].
    pub fn with_overrides(mut self, flags: &WaitOverrides) -> Result<Self, ConfigError> {
        if let Some(timeout) = &flags.timeout {
            self = self.set_override("wait.timeout", timeout.as_str())?;
        }
        if let Some(interval) = flags.interval_ms {
            let interval = i64::try_from(interval).unwrap_or(i64::MAX);
            self = self.set_override("wait.interval_ms", interval)?;
        }
        if flags.unavailable {
            self = self.set_override("wait.mode", WaitMode::Unavailable.to_string())?;
        }
        if let Some(version) = &flags.ip_version {
            self = self.set_override("fleet.ip_version", version.as_str())?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<NodeselConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeselConfig {
    /// Defaults, then `file` if given, then `flags`
    pub fn load(file: Option<&Path>, flags: &WaitOverrides) -> Result<Self, ConfigError> {
        let mut loader = Loader::new();
        if let Some(path) = file {
            loader = loader.with_file(path);
        }
        loader.with_overrides(flags)?.build()
    }
}
