//! Logging engine
//!
//! Everything shared between workers: the console writers, the report
//! adapter and the validated file settings. Immutable once built. Per-test
//! state (bindings, open files) lives on each worker's binding stack.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::context::{self, Frame};
use crate::domain::{Level, LogRecord, LogSettings, SinkConfig, TestStatus, TraceId};
use crate::error::ConfigResult;
use crate::service::{
    route, CallerResolver, Consolidated, ConsoleCapture, ConsoleSink, FileSink, FileSinkManager,
    NoopReport, ReportAdapter, ReportSink, Sink, SinkKind,
};

static GLOBAL: OnceLock<Arc<Engine>> = OnceLock::new();

/// Make `engine` the process-wide default.
///
/// Only the first call wins; later calls hand their engine back.
pub fn install(engine: Arc<Engine>) -> Result<(), Arc<Engine>> {
    GLOBAL.set(engine)
}

/// The process-wide engine, built from the environment on first use
pub fn global() -> Arc<Engine> {
    GLOBAL.get_or_init(Engine::from_env_or_console).clone()
}

/// Engine of the innermost binding, or the global one
pub(crate) fn current() -> Arc<Engine> {
    match context::top() {
        Some(frame) => frame.engine.clone(),
        None => global(),
    }
}

/// Failure kinds announced at most once per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Notice {
    Config,
    FileOpen,
    FileWrite,
    Rotation,
    Report,
}

/// Shared logging state
pub struct Engine {
    console: ConsoleSink,
    files: Option<FileSinkManager>,
    report: ReportSink,
    resolver: CallerResolver,
    notices: Mutex<BTreeSet<Notice>>,
}

impl Engine {
    pub fn builder(settings: LogSettings) -> EngineBuilder {
        EngineBuilder {
            settings,
            console_writers: None,
            report: None,
        }
    }

    /// Engine configured from `TRACELOG_*` variables (and `.env`)
    pub fn from_env() -> ConfigResult<Arc<Self>> {
        Self::builder(LogSettings::from_env()?).build()
    }

    /// Console at ERROR, no files, report discarded. Cannot fail.
    pub fn console_only() -> Arc<Self> {
        Arc::new(Self {
            console: ConsoleSink::new(SinkConfig::new(true, Level::Error)),
            files: None,
            report: ReportSink::new(SinkConfig::new(true, Level::Info), Arc::new(NoopReport)),
            resolver: CallerResolver::new(),
            notices: Mutex::new(BTreeSet::new()),
        })
    }

    fn from_env_or_console() -> Arc<Self> {
        match Self::from_env() {
            Ok(engine) => engine,
            Err(e) => {
                warn!("[Engine] Invalid logging configuration: {}", e);
                let engine = Self::console_only();
                engine.notice_once(
                    Notice::Config,
                    Level::Error,
                    &format!("Invalid logging configuration ({}); file logging disabled", e),
                );
                engine
            }
        }
    }

    pub fn console(&self) -> &ConsoleSink {
        &self.console
    }

    /// `None` when file logging is disabled
    pub fn file_manager(&self) -> Option<&FileSinkManager> {
        self.files.as_ref()
    }

    pub fn report(&self) -> &ReportSink {
        &self.report
    }

    pub fn resolver(&self) -> &CallerResolver {
        &self.resolver
    }

    /// Route one record to console, the current test's file, and the report.
    ///
    /// Never fails: sink errors are announced once per kind and dropped.
    pub(crate) fn dispatch(&self, record: &LogRecord, to_console: bool) {
        let owner = context::owner();
        let file_owner = context::file_owner();
        let mut console = self.console.clone();
        let mut report = self.report.clone();

        // a busy file means we were re-entered from inside a write
        let mut file_slot = match file_owner.as_deref() {
            Some(frame) => match frame.file.try_borrow_mut() {
                Ok(slot) => Some(slot),
                Err(_) => {
                    frame.deferred.borrow_mut().push_back(record.clone());
                    None
                }
            },
            None => None,
        };

        let outcome = {
            let mut sinks: Vec<&mut dyn Sink> = Vec::with_capacity(3);
            if to_console {
                sinks.push(&mut console);
            }
            if let Some(slot) = file_slot.as_mut() {
                if let Some(file) = (**slot).as_mut() {
                    sinks.push(file);
                }
            }
            sinks.push(&mut report);
            route(record, &mut sinks)
        };

        let mut file_error = None;
        let mut warnings = Vec::new();
        if let (Some(frame), Some(slot)) = (file_owner.as_deref(), file_slot.as_mut()) {
            if let Some(file) = (**slot).as_mut() {
                if let Err(e) = context::write_deferred(&frame.deferred, file) {
                    file_error = Some(e);
                }
                warnings = file.take_warnings();
            }
        }
        drop(file_slot);

        if outcome.delivered_to(SinkKind::Report) {
            if let Some(frame) = owner.as_deref() {
                if let Ok(mut consolidated) = frame.consolidated.try_borrow_mut() {
                    let line = report.config().template.render_record(record);
                    consolidated.entry(record.level).or_default().push(line);
                }
            }
        }

        for (kind, e) in &outcome.failures {
            self.sink_failed(*kind, e);
        }
        if let Some(e) = file_error {
            self.sink_failed(SinkKind::File, &e);
        }
        for warning in warnings {
            self.notice_once(Notice::Rotation, Level::Warning, &warning);
        }
    }

    /// Print `message` verbatim on the console's raw stream
    pub(crate) fn raw(&self, message: &str) {
        if let Err(e) = self.console.raw(message) {
            warn!("[Engine] Raw console write failed: {:#}", e);
        }
    }

    /// Open the file sink for a starting test, if file logging is on
    pub(crate) fn open_file(&self, test_name: &str, trace_id: &TraceId) -> Option<FileSink> {
        let manager = self.files.as_ref()?;
        match manager.open(test_name, trace_id) {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!("[Engine] Failed to open log file for {}: {:#}", test_name, e);
                self.notice_once(
                    Notice::FileOpen,
                    Level::Error,
                    &format!("Could not open log file ({:#}); continuing with console only", e),
                );
                None
            }
        }
    }

    pub(crate) fn register_trace(&self, trace_id: &TraceId, test_name: &str) {
        if !self.report.config().enabled {
            return;
        }
        if let Err(e) = self.report.adapter().register_trace(trace_id, test_name) {
            self.sink_failed(SinkKind::Report, &e);
        }
    }

    /// Hand the test's consolidated lines to the report and close its file.
    ///
    /// Teardown reached while the frame's state is still borrowed further up
    /// the stack leaves the file open; it closes when the frame is dropped.
    pub(crate) fn finish_test(&self, frame: &Frame, status: TestStatus) {
        let test_name = frame.test_name.as_deref().unwrap_or_default();
        let consolidated = match frame.consolidated.try_borrow_mut() {
            Ok(mut lines) => std::mem::take(&mut *lines),
            Err(_) => {
                debug!("[Engine] Consolidated lines of {} busy at teardown", test_name);
                Consolidated::new()
            }
        };
        if self.report.config().enabled {
            if let Err(e) =
                self.report
                    .adapter()
                    .finalize(&frame.trace_id, test_name, status, &consolidated)
            {
                self.sink_failed(SinkKind::Report, &e);
            }
        }

        let file = match frame.file.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                debug!("[Engine] Log file of {} busy at teardown", test_name);
                None
            }
        };
        if let Some(mut file) = file {
            if let Err(e) = context::write_deferred(&frame.deferred, &mut file) {
                self.sink_failed(SinkKind::File, &e);
            }
            file.close();
        }
        debug!("[Engine] Finished {} ({}) - {}", test_name, frame.trace_id, status);
    }

    fn sink_failed(&self, kind: SinkKind, error: &anyhow::Error) {
        warn!("[Engine] {} sink failed: {:#}", kind, error);
        let notice = match kind {
            // nowhere left to announce it
            SinkKind::Console => return,
            SinkKind::File => Notice::FileWrite,
            SinkKind::Report => Notice::Report,
        };
        self.notice_once(
            notice,
            Level::Error,
            &format!("{} logging failed ({:#}); continuing without it", kind, error),
        );
    }

    fn notice_once(&self, notice: Notice, level: Level, message: &str) {
        if self.notices.lock().insert(notice) {
            self.console.notice(level, message);
        }
    }
}

type BoxedWriter = Box<dyn Write + Send>;

/// Builder for [`Engine`]
pub struct EngineBuilder {
    settings: LogSettings,
    console_writers: Option<(BoxedWriter, BoxedWriter)>,
    report: Option<Arc<dyn ReportAdapter>>,
}

impl EngineBuilder {
    /// Send console lines and raw output somewhere other than stderr/stdout
    pub fn console_writers<L, R>(mut self, lines: L, raw: R) -> Self
    where
        L: Write + Send + 'static,
        R: Write + Send + 'static,
    {
        self.console_writers = Some((Box::new(lines), Box::new(raw)));
        self
    }

    /// Send all console output into an in-memory buffer
    pub fn capture_console(self) -> (Self, ConsoleCapture) {
        let capture = ConsoleCapture::default();
        let builder = self.console_writers(capture.writer(), capture.writer());
        (builder, capture)
    }

    pub fn report_adapter(mut self, adapter: Arc<dyn ReportAdapter>) -> Self {
        self.report = Some(adapter);
        self
    }

    /// Validate settings and prepare the log directory.
    ///
    /// The only place the engine reports an error to its caller.
    pub fn build(self) -> ConfigResult<Arc<Engine>> {
        let resolved = self.settings.resolve()?;

        let console = match self.console_writers {
            Some((lines, raw)) => ConsoleSink::with_writers(resolved.console, lines, raw),
            None => ConsoleSink::new(resolved.console),
        };
        let files = if self.settings.enable_file_logging {
            Some(FileSinkManager::new(resolved.file)?)
        } else {
            None
        };
        let adapter = self.report.unwrap_or_else(|| Arc::new(NoopReport));

        Ok(Arc::new(Engine {
            console,
            files,
            report: ReportSink::new(resolved.report, adapter),
            resolver: CallerResolver::new(),
            notices: Mutex::new(BTreeSet::new()),
        }))
    }
}
