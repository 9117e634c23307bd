//! Console sink
//!
//! Prefixed lines go to stderr, raw passthrough output to stdout. Both
//! writers are shared by every worker, so each write takes the writer's lock
//! for the duration of one line.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use super::router::{Sink, SinkKind};
use crate::domain::template::TIMESTAMP_FORMAT;
use crate::domain::{Level, LogRecord, SinkConfig};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Console destination for records, raw output and internal notices
#[derive(Clone)]
pub struct ConsoleSink {
    config: SinkConfig,
    lines: SharedWriter,
    raw: SharedWriter,
}

impl ConsoleSink {
    /// Console writing to the process's stderr (lines) and stdout (raw)
    pub fn new(config: SinkConfig) -> Self {
        Self::with_writers(config, std::io::stderr(), std::io::stdout())
    }

    pub fn with_writers<L, R>(config: SinkConfig, lines: L, raw: R) -> Self
    where
        L: Write + Send + 'static,
        R: Write + Send + 'static,
    {
        Self {
            config,
            lines: Arc::new(Mutex::new(Box::new(lines))),
            raw: Arc::new(Mutex::new(Box::new(raw))),
        }
    }

    /// Console writing into an in-memory buffer, for tests and embedding
    pub fn capture(config: SinkConfig) -> (Self, ConsoleCapture) {
        let capture = ConsoleCapture::default();
        let sink = Self::with_writers(
            config,
            CaptureWriter(capture.buf.clone()),
            CaptureWriter(capture.buf.clone()),
        );
        (sink, capture)
    }

    /// Write `message` verbatim, without any prefix or level filtering
    pub fn raw(&self, message: &str) -> anyhow::Result<()> {
        let mut out = self.raw.lock();
        writeln!(out, "{}", message)?;
        out.flush()?;
        Ok(())
    }

    /// Report a problem inside the logging engine itself.
    ///
    /// Bypasses `enabled` and the level threshold: this is the channel of last
    /// resort when another sink degrades.
    pub fn notice(&self, level: Level, message: &str) {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let mut out = self.lines.lock();
        let _ = writeln!(out, "[{}] [{}] [tracelog] {}", timestamp, level, message);
        let _ = out.flush();
    }
}

impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn config(&self) -> &SinkConfig {
        &self.config
    }

    fn emit(&mut self, _record: &LogRecord, line: &str) -> anyhow::Result<()> {
        let mut out = self.lines.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Handle on the buffer behind [`ConsoleSink::capture`]
#[derive(Clone, Default)]
pub struct ConsoleCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl ConsoleCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }

    /// Another writer appending to this buffer
    pub fn writer(&self) -> impl Write + Send + 'static {
        CaptureWriter(self.buf.clone())
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
