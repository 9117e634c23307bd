//! Sink routing
//!
//! A finished record is rendered once per sink (each sink has its own
//! template) and handed to every sink whose threshold admits it. Dispatch order
//! is fixed: console, then file, then report. A failing sink never stops the
//! ones after it.

use std::fmt;
use tracing::debug;

use crate::domain::{LogRecord, SinkConfig};

/// Kinds of sink, ordered by dispatch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SinkKind {
    Console,
    File,
    Report,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::File => "file",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A destination for rendered records
pub trait Sink {
    fn kind(&self) -> SinkKind;

    fn config(&self) -> &SinkConfig;

    /// Write one record; `line` is the record rendered with this sink's template
    fn emit(&mut self, record: &LogRecord, line: &str) -> anyhow::Result<()>;
}

/// What happened to one record
#[derive(Debug, Default)]
pub struct RouteReport {
    /// Sinks that accepted the record, in dispatch order
    pub delivered: Vec<SinkKind>,
    /// Sinks that admitted the record but failed to write it
    pub failures: Vec<(SinkKind, anyhow::Error)>,
}

impl RouteReport {
    pub fn delivered_to(&self, kind: SinkKind) -> bool {
        self.delivered.contains(&kind)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatch `record` to every admitting sink in console, file, report order
pub fn route(record: &LogRecord, sinks: &mut [&mut dyn Sink]) -> RouteReport {
    sinks.sort_by_key(|s| s.kind());

    let mut report = RouteReport::default();
    for sink in sinks.iter_mut() {
        if !sink.config().accepts(record.level) {
            continue;
        }
        let line = sink.config().template.render_record(record);
        match sink.emit(record, &line) {
            Ok(()) => report.delivered.push(sink.kind()),
            Err(e) => {
                debug!("[Router] {} sink failed: {:#}", sink.kind(), e);
                report.failures.push((sink.kind(), e));
            }
        }
    }
    report
}
