//! Log record types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TraceId;
use crate::error::ConfigError;

/// Ordered key-value payload attached to a record.
///
/// Insertion order is preserved (serde_json `preserve_order`).
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A single log entry. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Local wall-clock time the record was created
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Local>,

    #[serde(rename = "lvl")]
    pub level: Level,

    #[serde(rename = "trace")]
    pub trace_id: TraceId,

    /// Source location of the logging call
    pub caller: CallerLocation,

    #[serde(rename = "msg")]
    pub message: String,

    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl LogRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        level: Level,
        trace_id: TraceId,
        caller: CallerLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            trace_id,
            caller,
            message: message.into(),
            payload: None,
        }
    }

    /// Attach a payload (empty maps are dropped)
    pub fn with_payload(mut self, payload: Option<Payload>) -> Self {
        self.payload = payload.filter(|p| !p.is_empty());
        self
    }
}

/// Log level, ordered `Debug < Info < Warning < Error`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    #[serde(alias = "WARN")]
    Warning,
    Error,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warning, Level::Error];

    /// Uppercase name used in rendered lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Lowercase tag used in per-level file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ConfigError::InvalidLevel(s.to_string()))
    }
}

/// Outcome of a test case
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PASSED" => Ok(Self::Passed),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            "ERROR" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidStatus(s.to_string())),
        }
    }
}

/// Source location of a logging call: file base name and line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerLocation {
    pub file: String,
    pub line: u32,
}

impl CallerLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Returned when no frame qualifies
    pub fn unknown() -> Self {
        Self::new("unknown", 0)
    }

    pub fn is_unknown(&self) -> bool {
        self.file == "unknown" && self.line == 0
    }
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
