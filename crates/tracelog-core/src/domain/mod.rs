//! Core value types: trace ids, records, settings and templates

pub mod config;
pub mod record;
pub mod template;
pub mod trace_id;

pub use config::{
    keys, FileConfig, FileSettings, LogSettings, ResolvedSettings, RetentionPolicy, SinkConfig,
    SinkSettings,
};
pub use record::{CallerLocation, Level, LogRecord, Payload, TestStatus};
pub use template::{sanitize_test_name, ParsedLine, Template, DEFAULT_LINE_FORMAT};
pub use trace_id::TraceId;
