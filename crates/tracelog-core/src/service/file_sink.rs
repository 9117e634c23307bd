//! File sink manager - one set of log files per test execution
//!
//! The manager holds validated configuration and is shared by all workers.
//! Each test-start binding gets its own [`FileSink`], owned by the worker that
//! runs the test; sinks are never shared or reused across bindings, so the
//! write path needs no locks.
//!
//! ```text
//! CLOSED --open--> OPEN --(day changed | size exceeded)--> ROTATING --> OPEN
//!                   |                                                  |
//!                   +------------------------close--------------------+--> CLOSED
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::retention;
use super::router::{Sink, SinkKind};
use crate::domain::{sanitize_test_name, FileConfig, Level, LogRecord, SinkConfig, TraceId};
use crate::error::{ConfigError, ConfigResult};

/// Level tag used when levels share one file
pub const ALL_LEVELS_TAG: &str = "all";

/// Validated file settings plus the factory for per-test sinks
#[derive(Debug, Clone)]
pub struct FileSinkManager {
    config: Arc<FileConfig>,
}

impl FileSinkManager {
    /// Validate the log directory.
    ///
    /// Creates the directory if needed and proves it is writable. This is the
    /// one failure the engine surfaces to the test runner.
    pub fn new(config: FileConfig) -> ConfigResult<Self> {
        let dir = config.directory.clone();
        let not_writable = |source: io::Error| ConfigError::DirectoryNotWritable {
            path: dir.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(not_writable)?;

        let probe = dir.join(format!(".tracelog-probe-{}", uuid::Uuid::new_v4().simple()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .map_err(not_writable)?;
        let _ = std::fs::remove_file(&probe);

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Open the log file(s) for one test execution (CLOSED -> OPEN)
    pub fn open(&self, test_name: &str, trace_id: &TraceId) -> Result<FileSink> {
        let binding = FileBinding {
            test_name: test_name.to_string(),
            trace_id: trace_id.clone(),
            opened_at: Local::now(),
        };
        let mut sink = FileSink {
            config: self.config.clone(),
            binding,
            state: SinkState::Closed,
            files: BTreeMap::new(),
            queued: VecDeque::new(),
            rotated: Vec::new(),
            warnings: Vec::new(),
        };
        sink.open()?;
        Ok(sink)
    }

    /// File name for a binding and level tag.
    ///
    /// Pure function of the binding metadata: the same inputs always produce
    /// the same name.
    pub fn file_name(&self, binding: &FileBinding, level_tag: &str) -> String {
        file_name(&self.config, binding, level_tag)
    }
}

fn file_name(config: &FileConfig, binding: &FileBinding, level_tag: &str) -> String {
    let at = binding.opened_at;
    config.filename.render_with(|field| match field {
        "date" => at.format("%Y%m%d").to_string(),
        "time" => at.format("%H%M%S").to_string(),
        "datetime" => at.format("%Y%m%d_%H%M%S").to_string(),
        "testcase" => sanitize_test_name(&binding.test_name),
        "trace_id" => binding.trace_id.to_string(),
        "level" => level_tag.to_string(),
        _ => String::new(),
    })
}

/// Metadata a log file is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    pub test_name: String,
    pub trace_id: TraceId,
    pub opened_at: DateTime<Local>,
}

/// Lifecycle state of a [`FileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Closed,
    Open,
    Rotating,
}

/// One physical log file
#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    file: File,
    size: u64,
    opened_on: NaiveDate,
    generation: u32,
}

/// The open log file(s) of one test execution
#[derive(Debug)]
pub struct FileSink {
    config: Arc<FileConfig>,
    binding: FileBinding,
    state: SinkState,
    files: BTreeMap<&'static str, LogFile>,
    queued: VecDeque<(&'static str, String)>,
    rotated: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl FileSink {
    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn binding(&self) -> &FileBinding {
        &self.binding
    }

    /// Paths of the files currently open
    pub fn live_paths(&self) -> Vec<PathBuf> {
        self.files.values().map(|f| f.path.clone()).collect()
    }

    /// Paths of files rotated out so far (before any compression)
    pub fn rotated_paths(&self) -> &[PathBuf] {
        &self.rotated
    }

    pub fn rotations(&self) -> usize {
        self.rotated.len()
    }

    /// Problems hit while rotating, compressing or pruning, since the last call
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn open(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.config.directory)
            .context("Failed to create log directory")?;
        self.state = SinkState::Open;
        if !self.config.separate_by_level {
            self.ensure_file(ALL_LEVELS_TAG)?;
        }
        debug!(
            "[FileSink] Opened log file(s) for {} ({})",
            self.binding.test_name, self.binding.trace_id
        );
        Ok(())
    }

    fn tag_for(&self, level: Level) -> &'static str {
        if self.config.separate_by_level {
            level.file_tag()
        } else {
            ALL_LEVELS_TAG
        }
    }

    fn ensure_file(&mut self, tag: &'static str) -> Result<()> {
        if self.files.contains_key(tag) {
            return Ok(());
        }
        let path = self
            .config
            .directory
            .join(file_name(&self.config, &self.binding, tag));
        let file = open_append(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.files.insert(
            tag,
            LogFile {
                path,
                file,
                size,
                opened_on: today(),
                generation: 0,
            },
        );
        Ok(())
    }

    /// Append one rendered line.
    ///
    /// Lines arriving while a rotation is in progress are queued and written
    /// to the new file once it is open, in arrival order. If a rotation could
    /// not reopen the file, the next write retries the open and flushes the
    /// held lines first; while the file stays unavailable every write fails.
    pub fn write(&mut self, level: Level, line: &str) -> Result<()> {
        let tag = self.tag_for(level);
        match self.state {
            SinkState::Closed => bail!("log file for {} is closed", self.binding.test_name),
            SinkState::Rotating => {
                self.queued.push_back((tag, line.to_string()));
                return Ok(());
            }
            SinkState::Open => {}
        }

        self.ensure_file(tag)?;
        let held = if self.queued.is_empty() {
            Ok(())
        } else {
            self.finish_rotation()
        };

        let incoming = line.len() as u64 + 1;
        let written = if self.needs_rotation(tag, today(), incoming) {
            self.queued.push_back((tag, line.to_string()));
            self.rotate(tag)
        } else {
            self.write_line(tag, line)
        };
        held.and(written)
    }

    fn needs_rotation(&self, tag: &str, today: NaiveDate, incoming: u64) -> bool {
        let Some(file) = self.files.get(tag) else {
            return false;
        };
        let day_changed = self.config.rotate_by_date && today != file.opened_on;
        let max = self.config.retention.max_size_bytes;
        let too_big = max > 0 && file.size > 0 && file.size + incoming > max;
        day_changed || too_big
    }

    fn write_line(&mut self, tag: &'static str, line: &str) -> Result<()> {
        let file = self
            .files
            .get_mut(tag)
            .context("log file not open for level")?;
        file.file.write_all(line.as_bytes())?;
        file.file.write_all(b"\n")?;
        file.file.flush()?;
        file.size += line.len() as u64 + 1;
        Ok(())
    }

    /// OPEN -> ROTATING -> OPEN for the file behind `tag`
    fn rotate(&mut self, tag: &'static str) -> Result<()> {
        let Some(current) = self.files.remove(tag) else {
            return Ok(());
        };
        self.state = SinkState::Rotating;
        info!("[FileSink] Rotating log file {:?}", current.path);

        let LogFile {
            path,
            mut file,
            generation,
            ..
        } = current;
        let _ = file.flush();
        let _ = file.sync_all();
        drop(file);

        let generation = generation + 1;
        let rotated_path = rotated_name(&path, generation);
        if let Err(e) = std::fs::rename(&path, &rotated_path) {
            // keep writing into the old file rather than losing lines
            self.warnings
                .push(format!("Failed to rotate {:?}: {}", path, e));
            warn!("[FileSink] Failed to rotate {:?}: {}", path, e);
            let file = match open_append(&path) {
                Ok(file) => file,
                Err(e) => return self.abandon_rotation(e),
            };
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.files.insert(
                tag,
                LogFile {
                    path,
                    file,
                    size,
                    opened_on: today(),
                    generation: generation - 1,
                },
            );
            return self.finish_rotation();
        }
        self.rotated.push(rotated_path.clone());

        if self.config.retention.compress_on_rotate {
            if let Err(e) = retention::compress(&rotated_path) {
                warn!("[FileSink] Failed to compress {:?}: {:#}", rotated_path, e);
                self.warnings
                    .push(format!("Failed to compress {:?}: {:#}", rotated_path, e));
            }
        }

        self.apply_retention(&path);

        let file = match open_append(&path) {
            Ok(file) => file,
            Err(e) => return self.abandon_rotation(e),
        };
        self.files.insert(
            tag,
            LogFile {
                path,
                file,
                size: 0,
                opened_on: today(),
                generation,
            },
        );
        self.finish_rotation()
    }

    fn apply_retention(&mut self, reopening: &Path) {
        let mut keep = self.live_paths();
        keep.push(reopening.to_path_buf());

        match retention::prune_expired(
            &self.config.directory,
            self.config.retention.max_age_days,
            &keep,
        ) {
            Ok(outcome) => {
                if outcome.already_gone > 0 {
                    debug!(
                        "[FileSink] {} expired file(s) already removed by another worker",
                        outcome.already_gone
                    );
                }
                for (path, e) in outcome.failures {
                    self.warnings
                        .push(format!("Failed to prune {:?}: {}", path, e));
                }
            }
            Err(e) => self.warnings.push(format!("Retention pass failed: {:#}", e)),
        }
    }

    /// ROTATING -> OPEN without a file: the queued lines wait for the next
    /// write to reopen it
    fn abandon_rotation(&mut self, error: anyhow::Error) -> Result<()> {
        warn!(
            "[FileSink] Could not reopen log file for {}: {:#}",
            self.binding.test_name, error
        );
        self.state = SinkState::Open;
        Err(error)
    }

    /// ROTATING -> OPEN, then flush the queue in arrival order
    fn finish_rotation(&mut self) -> Result<()> {
        self.state = SinkState::Open;
        let mut first_error = None;
        while let Some((tag, line)) = self.queued.pop_front() {
            let result = self
                .ensure_file(tag)
                .and_then(|_| self.write_line(tag, &line));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush and release every file (OPEN -> CLOSED). Safe to call twice.
    pub fn close(&mut self) {
        if self.state == SinkState::Closed {
            return;
        }
        // anything still queued goes to the files before they close
        if !self.queued.is_empty() {
            self.state = SinkState::Open;
            let _ = self.finish_rotation();
        }
        for (_, mut file) in std::mem::take(&mut self.files) {
            let _ = file.file.flush();
            let _ = file.file.sync_all();
        }
        self.state = SinkState::Closed;
        debug!(
            "[FileSink] Closed log file(s) for {} ({})",
            self.binding.test_name, self.binding.trace_id
        );
    }

    #[cfg(test)]
    fn backdate(&mut self, days: i64) {
        for file in self.files.values_mut() {
            file.opened_on -= chrono::Duration::days(days);
        }
    }
}

impl Sink for FileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::File
    }

    fn config(&self) -> &SinkConfig {
        &self.config.sink
    }

    fn emit(&mut self, record: &LogRecord, line: &str) -> anyhow::Result<()> {
        self.write(record.level, line)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {:?}", path))
}

/// `name.log` -> `name.{n}.log`, or `name` -> `name.{n}` for other extensions.
/// Skips numbers already taken on disk.
fn rotated_name(path: &Path, generation: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = generation;
    loop {
        let candidate = match name.strip_suffix(".log") {
            Some(stem) => format!("{}.{}.log", stem, n),
            None => format!("{}.{}", name, n),
        };
        let candidate = path.with_file_name(candidate);
        let taken = candidate.exists() || {
            let mut gz = candidate.as_os_str().to_owned();
            gz.push(".gz");
            Path::new(&gz).exists()
        };
        if !taken {
            return candidate;
        }
        n += 1;
    }
}
