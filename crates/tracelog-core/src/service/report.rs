//! Report attachment adapter
//!
//! The interface through which the external report generator receives log
//! output. At test start it gets a `LogID: {trace}` descriptor before any
//! other attachment, then every routed record, then per-level consolidated
//! logs when the test ends.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::router::{Sink, SinkKind};
use crate::domain::{sanitize_test_name, Level, LogRecord, Payload, SinkConfig, TestStatus, TraceId};

/// Name of the trace descriptor attachment
pub const TRACE_DESCRIPTOR_NAME: &str = "LogID";

/// Rendered lines of one test, grouped by level
pub type Consolidated = BTreeMap<Level, Vec<String>>;

/// Content type of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Text,
    Json,
}

impl MediaType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

/// A named blob handed to the report generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub body: String,
    pub media_type: MediaType,
}

impl Attachment {
    pub fn text(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            media_type: MediaType::Text,
        }
    }

    pub fn json(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            media_type: MediaType::Json,
        }
    }

    /// The plain-text `LogID: {trace}` descriptor
    pub fn trace_descriptor(trace_id: &TraceId) -> Self {
        Self::text(TRACE_DESCRIPTOR_NAME, format!("LogID: {}", trace_id))
    }
}

/// One routed record as seen by the report generator
#[derive(Debug, Clone, Copy)]
pub struct ReportEntry<'a> {
    pub trace_id: &'a TraceId,
    pub level: Level,
    pub message: &'a str,
    pub rendered_line: &'a str,
    pub payload: Option<&'a Payload>,
}

/// Receiver for report attachments.
///
/// Implementations are shared by all workers and must synchronize internally.
pub trait ReportAdapter: Send + Sync {
    /// Store one attachment for the test identified by `trace_id`
    fn attach(&self, trace_id: &TraceId, attachment: Attachment) -> Result<()>;

    /// Called at test start, before any other attachment of the test
    fn register_trace(&self, trace_id: &TraceId, _test_name: &str) -> Result<()> {
        self.attach(trace_id, Attachment::trace_descriptor(trace_id))
    }

    /// Called for every record routed to the report sink
    fn entry(&self, entry: &ReportEntry<'_>) -> Result<()> {
        attach_payload(self, entry)
    }

    /// Called at test end with the test's lines grouped by level
    fn finalize(
        &self,
        trace_id: &TraceId,
        _test_name: &str,
        _status: TestStatus,
        consolidated: &Consolidated,
    ) -> Result<()> {
        attach_consolidated(self, trace_id, consolidated)
    }
}

/// Attach a record's payload as `DATA: {LEVEL}: {message}`
pub fn attach_payload<A: ReportAdapter + ?Sized>(adapter: &A, entry: &ReportEntry<'_>) -> Result<()> {
    let Some(payload) = entry.payload else {
        return Ok(());
    };
    let body = serde_json::to_string_pretty(payload).context("Failed to serialize payload")?;
    adapter.attach(
        entry.trace_id,
        Attachment::json(format!("DATA: {}: {}", entry.level, entry.message), body),
    )
}

/// Attach `CONSOLIDATED_{LEVEL}_LOGS` for each level that has lines
pub fn attach_consolidated<A: ReportAdapter + ?Sized>(
    adapter: &A,
    trace_id: &TraceId,
    consolidated: &Consolidated,
) -> Result<()> {
    for (level, lines) in consolidated {
        if lines.is_empty() {
            continue;
        }
        adapter.attach(
            trace_id,
            Attachment::text(format!("CONSOLIDATED_{}_LOGS", level), lines.join("\n")),
        )?;
    }
    Ok(())
}

/// Sink view over a shared adapter
#[derive(Clone)]
pub struct ReportSink {
    config: SinkConfig,
    adapter: Arc<dyn ReportAdapter>,
}

impl ReportSink {
    pub fn new(config: SinkConfig, adapter: Arc<dyn ReportAdapter>) -> Self {
        Self { config, adapter }
    }

    pub fn adapter(&self) -> &Arc<dyn ReportAdapter> {
        &self.adapter
    }
}

impl Sink for ReportSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Report
    }

    fn config(&self) -> &SinkConfig {
        &self.config
    }

    fn emit(&mut self, record: &LogRecord, line: &str) -> Result<()> {
        self.adapter.entry(&ReportEntry {
            trace_id: &record.trace_id,
            level: record.level,
            message: &record.message,
            rendered_line: line,
            payload: record.payload.as_ref(),
        })
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReport;

impl ReportAdapter for NoopReport {
    fn attach(&self, _trace_id: &TraceId, _attachment: Attachment) -> Result<()> {
        Ok(())
    }

    fn entry(&self, _entry: &ReportEntry<'_>) -> Result<()> {
        Ok(())
    }
}

/// Something the report generator received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Attachment {
        trace_id: TraceId,
        attachment: Attachment,
    },
    Entry {
        trace_id: TraceId,
        level: Level,
        message: String,
        rendered_line: String,
    },
    Finalized {
        trace_id: TraceId,
        test_name: String,
        status: TestStatus,
    },
}

impl ReportEvent {
    pub fn trace_id(&self) -> &TraceId {
        match self {
            Self::Attachment { trace_id, .. }
            | Self::Entry { trace_id, .. }
            | Self::Finalized { trace_id, .. } => trace_id,
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryReport {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    /// Attachments of one test, in arrival order
    pub fn attachments_for(&self, trace_id: &TraceId) -> Vec<Attachment> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Attachment {
                    trace_id: t,
                    attachment,
                } if t == trace_id => Some(attachment.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rendered lines of one test, in arrival order
    pub fn lines_for(&self, trace_id: &TraceId) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Entry {
                    trace_id: t,
                    rendered_line,
                    ..
                } if t == trace_id => Some(rendered_line.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ReportAdapter for MemoryReport {
    fn attach(&self, trace_id: &TraceId, attachment: Attachment) -> Result<()> {
        self.events.lock().push(ReportEvent::Attachment {
            trace_id: trace_id.clone(),
            attachment,
        });
        Ok(())
    }

    fn entry(&self, entry: &ReportEntry<'_>) -> Result<()> {
        self.events.lock().push(ReportEvent::Entry {
            trace_id: entry.trace_id.clone(),
            level: entry.level,
            message: entry.message.to_string(),
            rendered_line: entry.rendered_line.to_string(),
        });
        attach_payload(self, entry)
    }

    fn finalize(
        &self,
        trace_id: &TraceId,
        test_name: &str,
        status: TestStatus,
        consolidated: &Consolidated,
    ) -> Result<()> {
        attach_consolidated(self, trace_id, consolidated)?;
        self.events.lock().push(ReportEvent::Finalized {
            trace_id: trace_id.clone(),
            test_name: test_name.to_string(),
            status,
        });
        Ok(())
    }
}

/// Writes each attachment as a file in a results directory.
///
/// Files are named `{seq}_{trace}_{name}.{ext}` with a zero-padded sequence
/// number, so directory order is arrival order.
#[derive(Debug)]
pub struct DirectoryReport {
    dir: PathBuf,
    seq: AtomicU64,
}

impl DirectoryReport {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("Failed to create report directory")?;
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportAdapter for DirectoryReport {
    fn attach(&self, trace_id: &TraceId, attachment: Attachment) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{:08}_{}_{}.{}",
            seq,
            trace_id,
            sanitize_test_name(&attachment.name),
            attachment.media_type.extension()
        );
        let path = self.dir.join(name);
        std::fs::write(&path, attachment.body)
            .with_context(|| format!("Failed to write attachment {:?}", path))
    }
}
