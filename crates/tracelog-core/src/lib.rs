//! # Tracelog Core Library
//!
//! Per-test structured logging for test suites that run on many worker
//! threads at once.
//!
//! Every test execution gets its own trace id and its own log file. Records
//! carry the id and the source location of the logging call, and fan out to
//! the console, the test's rotating log file and an external report.
//!
//! ## Modules
//!
//! - `domain` - Trace ids, records, levels, settings and templates
//! - `service` - Sinks: console, rotating files, retention, report adapters
//! - `context` - Per-thread trace binding stack
//! - `engine` - Shared logging state and the process-wide default
//! - `facade` - Logging functions for test and application code
//! - `lifecycle` - Test setup/teardown guard
//! - `error` - Configuration errors

pub mod context;
pub mod domain;
pub mod engine;
pub mod error;
pub mod facade;
pub mod lifecycle;
mod macros;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use service::*;

pub use context::BindingGuard;
pub use engine::{global, install, Engine, EngineBuilder};
pub use error::{ConfigError, ConfigResult};
pub use lifecycle::TestCase;
