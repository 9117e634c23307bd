//! Configuration errors
//!
//! Misconfiguration is the one failure this crate surfaces loudly. Everything
//! that goes wrong after startup is swallowed and announced on the console.

use std::path::PathBuf;

/// Errors raised while resolving settings or initializing the file sink.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A level string that is not DEBUG, INFO, WARNING/WARN or ERROR
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    /// A status string that is not PASSED, FAILED, SKIPPED or ERROR
    #[error("invalid test status '{0}'")]
    InvalidStatus(String),

    /// A trace id that is empty, too long or has characters outside [A-Za-z0-9_-]
    #[error("invalid trace id '{0}'")]
    InvalidTraceId(String),

    /// A `{placeholder}` the template engine does not know
    #[error("unknown placeholder '{{{name}}}' in template '{template}'")]
    UnknownPlaceholder { template: String, name: String },

    /// An unbalanced `{` or `}` in a template
    #[error("malformed template '{0}'")]
    MalformedTemplate(String),

    /// A settings key that is not recognized
    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    /// A settings value that could not be parsed for its key
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidValue { key: String, value: String },

    /// The log directory could not be created or written to
    #[error("log directory {path:?} is not writable: {source}")]
    DirectoryNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be read
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings document could not be parsed
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
