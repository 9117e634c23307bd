//! Per-test setup and teardown
//!
//! A [`TestCase`] brackets one test execution: it mints the trace id, opens
//! the test's log file and registers the id with the report, and on drop
//! logs the outcome, finalizes the report and closes the file. Teardown runs
//! on every exit path, including a panic unwinding out of the test body.

use std::cell::Cell;
use std::panic::Location;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::context::{self, Frame};
use crate::domain::{Level, LogRecord, TestStatus, TraceId};
use crate::engine::{self, Engine};

impl Engine {
    /// Start a test on the calling thread with a freshly minted trace id
    #[track_caller]
    pub fn begin_test(self: &Arc<Self>, name: &str) -> TestCase {
        self.begin_test_with_id(name, TraceId::generate())
    }

    /// Start a test bound to an id supplied by the caller
    #[track_caller]
    pub fn begin_test_with_id(self: &Arc<Self>, name: &str, trace_id: TraceId) -> TestCase {
        let location = Location::caller();
        // a sub-test shares its parent's files: one open log per worker
        let file = match context::file_owner() {
            Some(parent) if Arc::ptr_eq(&parent.engine, self) => None,
            _ => self.open_file(name, &trace_id),
        };
        let frame = context::push(Frame::test(trace_id, name, self.clone(), file));

        self.register_trace(&frame.trace_id, name);

        let case = TestCase {
            frame,
            name: name.to_string(),
            started: Instant::now(),
            status: Cell::new(None),
            location,
            finished: false,
        };
        case.record(format!("Starting test: {}", name));
        case
    }
}

/// Guard for one running test. Not `Send`: it belongs to the worker thread
/// running the test.
#[must_use = "the test ends when the guard is dropped"]
pub struct TestCase {
    frame: Rc<Frame>,
    name: String,
    started: Instant,
    status: Cell<Option<TestStatus>>,
    location: &'static Location<'static>,
    finished: bool,
}

impl TestCase {
    /// Start a test on the global engine.
    ///
    /// Started inside another running test, the new case binds its own trace
    /// id but writes into the enclosing test's log file instead of opening a
    /// second one.
    #[track_caller]
    pub fn begin(name: &str) -> Self {
        engine::global().begin_test(name)
    }

    /// Start a test on the global engine with a caller-supplied trace id
    #[track_caller]
    pub fn begin_with_id(name: &str, trace_id: TraceId) -> Self {
        engine::global().begin_test_with_id(name, trace_id)
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.frame.trace_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status reported at teardown. Without one the test counts as passed,
    /// or failed if it panicked.
    pub fn set_status(&self, status: TestStatus) {
        self.status.set(Some(status));
    }

    /// Live log file paths of this test (the parent's, for a sub-test)
    pub fn log_files(&self) -> Vec<std::path::PathBuf> {
        let holder = if self.frame.owns_file {
            Some(self.frame.clone())
        } else {
            context::file_owner()
        };
        let Some(holder) = holder else {
            return Vec::new();
        };
        let paths = match holder.file.try_borrow() {
            Ok(file) => file.as_ref().map(|f| f.live_paths()).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        paths
    }

    /// End the test now with `status`
    pub fn finish(mut self, status: TestStatus) {
        self.set_status(status);
        self.end();
    }

    /// INFO record under this test's own id, even if a stray binding sits
    /// above it
    fn record(&self, message: String) {
        let engine = &self.frame.engine;
        let caller = engine.resolver().locate(self.location);
        let record = LogRecord::new(Level::Info, self.frame.trace_id.clone(), caller, message);
        engine.dispatch(&record, true);
    }

    fn end(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let status = match self.status.get() {
            _ if std::thread::panicking() => TestStatus::Failed,
            Some(status) => status,
            None => TestStatus::Passed,
        };

        let secs = self.started.elapsed().as_secs_f64();
        self.record(format!("Test duration: {:.2}s", secs));
        self.record(format!("Test completed: {} - {}", self.name, status));

        self.frame.engine.finish_test(&self.frame, status);
        context::remove(self.frame.id);
    }
}

impl Drop for TestCase {
    fn drop(&mut self) {
        self.end();
    }
}
