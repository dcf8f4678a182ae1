//! Runtime configuration
//!
//! Read from the environment by compiled programs, built by hand when the
//! runtime is embedded:
//!
//! | Variable | Effect |
//! |---|---|
//! | `DRAKE_SINGLETON_FALLBACK` | singleton lookup also matches by name alone |
//! | `DRAKE_QUIET` | suppress `[runtime]` diagnostics on stderr |
//! | `DRAKE_LOG` | `tracing` filter directives (default `warn`) |
//! | `DRAKE_REPORT` | at-exit report, see `report` |

use crate::error::ConfigError;
use crate::report::ReportConfig;

pub const ENV_SINGLETON_FALLBACK: &str = "DRAKE_SINGLETON_FALLBACK";
pub const ENV_QUIET: &str = "DRAKE_QUIET";
pub const ENV_LOG: &str = "DRAKE_LOG";
pub const ENV_REPORT: &str = "DRAKE_REPORT";

pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Let a singleton method registered on any receiver answer by name
    pub singleton_name_fallback: bool,
    pub quiet: bool,
    pub log_filter: String,
    pub report: Option<ReportConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            singleton_name_fallback: false,
            quiet: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            report: None,
        }
    }
}

impl RuntimeConfig {
    /// Strict parse; the first bad value is an error
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::try_from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse the environment, warning about and ignoring bad values
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_SINGLETON_FALLBACK) {
            config.singleton_name_fallback = parse_flag(ENV_SINGLETON_FALLBACK, &v)?;
        }
        if let Some(v) = lookup(ENV_QUIET) {
            config.quiet = parse_flag(ENV_QUIET, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            config.log_filter = v;
        }
        if let Some(v) = lookup(ENV_REPORT) {
            config.report = ReportConfig::parse(&v)?;
        }
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_SINGLETON_FALLBACK) {
            config.singleton_name_fallback =
                parse_flag(ENV_SINGLETON_FALLBACK, &v).unwrap_or_else(warn_and_default);
        }
        if let Some(v) = lookup(ENV_QUIET) {
            config.quiet = parse_flag(ENV_QUIET, &v).unwrap_or_else(warn_and_default);
        }
        if let Some(v) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            config.log_filter = v;
        }
        if let Some(v) = lookup(ENV_REPORT) {
            config.report = ReportConfig::parse(&v).unwrap_or_else(warn_and_default);
        }
        config
    }

    pub fn with_singleton_name_fallback(mut self, enabled: bool) -> Self {
        self.singleton_name_fallback = enabled;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_report(mut self, report: Option<ReportConfig>) -> Self {
        self.report = report;
        self
    }
}

fn warn_and_default<T: Default>(err: ConfigError) -> T {
    eprintln!("Warning: {}, ignoring", err);
    T::default()
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: value.to_string(),
        }),
    }
}
