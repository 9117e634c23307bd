//! Logging settings
//!
//! `LogSettings` is the raw, serde-friendly shape handed over by whatever
//! settings collaborator the test runner uses (JSON file, key-value store,
//! environment). `resolve()` validates it into typed per-sink configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::template::{Template, DEFAULT_FILENAME_FORMAT, DEFAULT_LINE_FORMAT};
use super::Level;
use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Setting Keys (centralized constants)
// =============================================================================

/// Setting key constants for key-value settings sources.
pub mod keys {
    /// Master switch for file logging (bool)
    pub const ENABLE_FILE_LOGGING: &str = "enableFileLogging";

    /// File sink settings namespace
    pub mod file {
        /// Directory for log files (path)
        pub const DIRECTORY: &str = "file.directory";
        /// File name template (string)
        pub const FILENAME_FORMAT: &str = "file.filenameFormat";
        /// Line template (string)
        pub const FORMAT: &str = "file.format";
        /// Minimum level (string)
        pub const LEVEL: &str = "file.level";
        /// Rotate when the calendar day changes (bool)
        pub const ROTATE_BY_DATE: &str = "file.rotateByDate";
        /// One file per level instead of a shared "all" file (bool)
        pub const SEPARATE_BY_LEVEL: &str = "file.separateByLevel";
        /// Days to keep log files (u32, 0 = keep forever)
        pub const RETENTION_DAYS: &str = "file.retentionDays";
        /// Size threshold for rotation in MiB (u64)
        pub const MAX_SIZE_MB: &str = "file.maxSizeMB";
        /// Size threshold for rotation in bytes, overrides MB (u64)
        pub const MAX_SIZE_BYTES: &str = "file.maxSizeBytes";
        /// Gzip rotated files (bool)
        pub const ENABLE_COMPRESSION: &str = "file.enableCompression";
    }

    /// Console sink settings namespace
    pub mod console {
        pub const ENABLED: &str = "console.enabled";
        pub const LEVEL: &str = "console.level";
        pub const FORMAT: &str = "console.format";
    }

    /// Report attachment sink settings namespace
    pub mod report {
        pub const ENABLED: &str = "report.enabled";
        pub const LEVEL: &str = "report.level";
        pub const FORMAT: &str = "report.format";
    }

    /// Environment variables read by `LogSettings::from_env`
    pub const ENV_OVERRIDES: &[(&str, &str)] = &[
        (ENABLE_FILE_LOGGING, "TRACELOG_ENABLE_FILE_LOGGING"),
        (file::DIRECTORY, "TRACELOG_FILE_DIRECTORY"),
        (file::FILENAME_FORMAT, "TRACELOG_FILE_FILENAME_FORMAT"),
        (file::FORMAT, "TRACELOG_FILE_FORMAT"),
        (file::LEVEL, "TRACELOG_FILE_LEVEL"),
        (file::ROTATE_BY_DATE, "TRACELOG_FILE_ROTATE_BY_DATE"),
        (file::SEPARATE_BY_LEVEL, "TRACELOG_FILE_SEPARATE_BY_LEVEL"),
        (file::RETENTION_DAYS, "TRACELOG_FILE_RETENTION_DAYS"),
        (file::MAX_SIZE_MB, "TRACELOG_FILE_MAX_SIZE_MB"),
        (file::MAX_SIZE_BYTES, "TRACELOG_FILE_MAX_SIZE_BYTES"),
        (file::ENABLE_COMPRESSION, "TRACELOG_FILE_ENABLE_COMPRESSION"),
        (console::ENABLED, "TRACELOG_CONSOLE_ENABLED"),
        (console::LEVEL, "TRACELOG_CONSOLE_LEVEL"),
        (console::FORMAT, "TRACELOG_CONSOLE_FORMAT"),
        (report::ENABLED, "TRACELOG_REPORT_ENABLED"),
        (report::LEVEL, "TRACELOG_REPORT_LEVEL"),
        (report::FORMAT, "TRACELOG_REPORT_FORMAT"),
    ];
}

// =============================================================================
// Raw settings
// =============================================================================

/// Logging settings as supplied by the surrounding test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    pub enable_file_logging: bool,
    pub file: FileSettings,
    pub console: SinkSettings,
    pub report: SinkSettings,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enable_file_logging: true,
            file: FileSettings::default(),
            console: SinkSettings::default(),
            report: SinkSettings::default(),
        }
    }
}

/// File sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSettings {
    pub directory: PathBuf,
    pub filename_format: String,
    pub format: Option<String>,
    pub level: Option<String>,
    pub rotate_by_date: bool,
    pub separate_by_level: bool,
    pub retention_days: u32,
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: u64,
    pub max_size_bytes: Option<u64>,
    pub enable_compression: bool,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            filename_format: DEFAULT_FILENAME_FORMAT.to_string(),
            format: None,
            level: None,
            rotate_by_date: true,
            separate_by_level: false,
            retention_days: 30,
            max_size_mb: 100,
            max_size_bytes: None,
            enable_compression: false,
        }
    }
}

/// Console or report sink settings.
///
/// `level` and `format` fall back to per-sink defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SinkSettings {
    pub enabled: bool,
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            format: None,
        }
    }
}

impl LogSettings {
    /// Parse a JSON settings document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON settings file
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Defaults overlaid with `TRACELOG_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::default().with_env_overrides()
    }

    /// Apply `TRACELOG_*` environment variables on top of these settings
    pub fn with_env_overrides(mut self) -> ConfigResult<Self> {
        for (key, var) in keys::ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                self.apply(key, &value)?;
            }
        }
        Ok(self)
    }

    /// Build settings from `(key, value)` pairs on top of the defaults
    pub fn from_pairs<'a, I>(pairs: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            settings.apply(key, value)?;
        }
        Ok(settings)
    }

    /// Set one value by its dotted key (see [`keys`])
    pub fn apply(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || parse_bool(value).ok_or_else(invalid);
        let number = || value.trim().parse::<u64>().map_err(|_| invalid());

        match key {
            keys::ENABLE_FILE_LOGGING => self.enable_file_logging = flag()?,
            keys::file::DIRECTORY => self.file.directory = PathBuf::from(value),
            keys::file::FILENAME_FORMAT => self.file.filename_format = value.to_string(),
            keys::file::FORMAT => self.file.format = Some(value.to_string()),
            keys::file::LEVEL => self.file.level = Some(value.to_string()),
            keys::file::ROTATE_BY_DATE => self.file.rotate_by_date = flag()?,
            keys::file::SEPARATE_BY_LEVEL => self.file.separate_by_level = flag()?,
            keys::file::RETENTION_DAYS => {
                self.file.retention_days = u32::try_from(number()?).map_err(|_| invalid())?
            }
            keys::file::MAX_SIZE_MB => self.file.max_size_mb = number()?,
            keys::file::MAX_SIZE_BYTES => self.file.max_size_bytes = Some(number()?),
            keys::file::ENABLE_COMPRESSION => self.file.enable_compression = flag()?,
            keys::console::ENABLED => self.console.enabled = flag()?,
            keys::console::LEVEL => self.console.level = Some(value.to_string()),
            keys::console::FORMAT => self.console.format = Some(value.to_string()),
            keys::report::ENABLED => self.report.enabled = flag()?,
            keys::report::LEVEL => self.report.level = Some(value.to_string()),
            keys::report::FORMAT => self.report.format = Some(value.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Validate and convert into typed configuration
    pub fn resolve(&self) -> ConfigResult<ResolvedSettings> {
        let console = SinkConfig::resolve(
            self.console.enabled,
            self.console.level.as_deref(),
            Level::Error,
            self.console.format.as_deref(),
        )?;
        let report = SinkConfig::resolve(
            self.report.enabled,
            self.report.level.as_deref(),
            Level::Info,
            self.report.format.as_deref(),
        )?;
        let sink = SinkConfig::resolve(
            self.enable_file_logging,
            self.file.level.as_deref(),
            Level::Info,
            self.file.format.as_deref(),
        )?;

        let max_size_bytes = self
            .file
            .max_size_bytes
            .unwrap_or(self.file.max_size_mb.saturating_mul(1024 * 1024));

        let file = FileConfig {
            sink,
            directory: self.file.directory.clone(),
            filename: Template::filename(&self.file.filename_format)?,
            rotate_by_date: self.file.rotate_by_date,
            separate_by_level: self.file.separate_by_level,
            retention: RetentionPolicy {
                max_age_days: self.file.retention_days,
                max_size_bytes,
                compress_on_rotate: self.file.enable_compression,
            },
        };

        Ok(ResolvedSettings {
            console,
            file,
            report,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Resolved settings
// =============================================================================

/// Per-sink configuration: on/off, threshold and line template
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub enabled: bool,
    pub min_level: Level,
    pub template: Template,
}

impl SinkConfig {
    fn resolve(
        enabled: bool,
        level: Option<&str>,
        default_level: Level,
        format: Option<&str>,
    ) -> ConfigResult<Self> {
        let min_level = match level {
            Some(raw) => raw.parse()?,
            None => default_level,
        };
        let template = Template::line(format.unwrap_or(DEFAULT_LINE_FORMAT))?;
        Ok(Self {
            enabled,
            min_level,
            template,
        })
    }

    pub fn new(enabled: bool, min_level: Level) -> Self {
        Self {
            enabled,
            min_level,
            template: Template::line(DEFAULT_LINE_FORMAT)
                .expect("default line format is valid"),
        }
    }

    /// Whether a record at `level` should reach this sink
    pub fn accepts(&self, level: Level) -> bool {
        self.enabled && self.min_level <= level
    }
}

/// When rotated files are compressed and removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Files older than this are deleted at rotation (0 = keep forever)
    pub max_age_days: u32,
    /// Rotate once the live file would grow beyond this
    pub max_size_bytes: u64,
    /// Gzip the file that was just rotated out
    pub compress_on_rotate: bool,
}

/// Resolved file sink configuration
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub sink: SinkConfig,
    pub directory: PathBuf,
    pub filename: Template,
    pub rotate_by_date: bool,
    pub separate_by_level: bool,
    pub retention: RetentionPolicy,
}

/// Fully validated settings for all sinks
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub console: SinkConfig,
    pub file: FileConfig,
    pub report: SinkConfig,
}
