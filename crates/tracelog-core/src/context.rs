//! Per-thread trace binding stack
//!
//! Each worker thread owns its own stack of frames. A frame carries the bound
//! trace id and, for test frames, the test's open log files. Nothing here is
//! shared between threads.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::{LogRecord, TraceId};
use crate::engine::Engine;
use crate::service::{Consolidated, FileSink, Sink};

static FRAME_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static FRAMES: RefCell<Vec<Rc<Frame>>> = const { RefCell::new(Vec::new()) };
    static AMBIENT: RefCell<Option<TraceId>> = const { RefCell::new(None) };
}

/// One binding on the stack
pub(crate) struct Frame {
    pub id: u64,
    pub trace_id: TraceId,
    /// Set for frames opened by a test case; bare bindings have none
    pub test_name: Option<String>,
    pub engine: Arc<Engine>,
    /// Whether this frame opened log files of its own
    pub owns_file: bool,
    pub file: RefCell<Option<FileSink>>,
    /// Records that arrived while the file was busy (re-entrant logging)
    pub deferred: RefCell<VecDeque<LogRecord>>,
    /// Report lines of this test, by level
    pub consolidated: RefCell<Consolidated>,
}

impl Frame {
    pub fn binding(trace_id: TraceId, engine: Arc<Engine>) -> Self {
        Self::new(trace_id, None, engine, None)
    }

    pub fn test(
        trace_id: TraceId,
        test_name: &str,
        engine: Arc<Engine>,
        file: Option<FileSink>,
    ) -> Self {
        Self::new(trace_id, Some(test_name.to_string()), engine, file)
    }

    fn new(
        trace_id: TraceId,
        test_name: Option<String>,
        engine: Arc<Engine>,
        file: Option<FileSink>,
    ) -> Self {
        Self {
            id: FRAME_ID.fetch_add(1, Ordering::Relaxed),
            trace_id,
            test_name,
            engine,
            owns_file: file.is_some(),
            file: RefCell::new(file),
            deferred: RefCell::new(VecDeque::new()),
            consolidated: RefCell::new(Consolidated::new()),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // records deferred behind a borrow that outlived teardown
        let Self { file, deferred, .. } = self;
        if let Some(file) = file.get_mut().as_mut() {
            let _ = write_deferred(deferred, file);
        }
    }
}

/// Write records that arrived while the file was busy, oldest first
pub(crate) fn write_deferred(
    deferred: &RefCell<VecDeque<LogRecord>>,
    file: &mut FileSink,
) -> anyhow::Result<()> {
    let mut first_error = None;
    loop {
        let next = deferred.borrow_mut().pop_front();
        let Some(record) = next else {
            break;
        };
        if !file.config().accepts(record.level) {
            continue;
        }
        let line = file.config().template.render_record(&record);
        if let Err(e) = file.write(record.level, &line) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Push a frame for the calling thread
pub(crate) fn push(frame: Frame) -> Rc<Frame> {
    let frame = Rc::new(frame);
    FRAMES.with(|frames| frames.borrow_mut().push(frame.clone()));
    frame
}

/// Remove the frame with `id`, wherever it sits on the stack.
///
/// Guards dropped out of order remove exactly their own frame and leave the
/// others in place.
pub(crate) fn remove(id: u64) -> Option<Rc<Frame>> {
    FRAMES
        .try_with(|frames| {
            let mut frames = frames.borrow_mut();
            let pos = frames.iter().rposition(|f| f.id == id)?;
            Some(frames.remove(pos))
        })
        .ok()
        .flatten()
}

/// Innermost binding
pub(crate) fn top() -> Option<Rc<Frame>> {
    FRAMES
        .try_with(|frames| frames.borrow().last().cloned())
        .ok()
        .flatten()
}

/// Innermost test frame: owner of the log files bare bindings write into
pub(crate) fn owner() -> Option<Rc<Frame>> {
    FRAMES
        .try_with(|frames| {
            frames
                .borrow()
                .iter()
                .rev()
                .find(|f| f.test_name.is_some())
                .cloned()
        })
        .ok()
        .flatten()
}

/// Innermost frame holding open log files. A sub-test started inside
/// another test writes into its parent's files.
pub(crate) fn file_owner() -> Option<Rc<Frame>> {
    FRAMES
        .try_with(|frames| frames.borrow().iter().rev().find(|f| f.owns_file).cloned())
        .ok()
        .flatten()
}

/// Number of bindings on this thread's stack
pub fn depth() -> usize {
    FRAMES.try_with(|frames| frames.borrow().len()).unwrap_or(0)
}

/// Bound trace id, or this thread's ambient id (minted on first use)
pub(crate) fn current_trace_id() -> TraceId {
    if let Some(frame) = top() {
        return frame.trace_id.clone();
    }
    AMBIENT
        .try_with(|ambient| {
            ambient
                .borrow_mut()
                .get_or_insert_with(TraceId::generate)
                .clone()
        })
        .unwrap_or_else(|_| TraceId::generate())
}

/// Pops its binding when dropped.
///
/// Not `Send`: a binding belongs to the thread that created it.
#[must_use = "the binding is released when the guard is dropped"]
pub struct BindingGuard {
    id: u64,
    trace_id: TraceId,
    _thread_bound: PhantomData<Rc<()>>,
}

impl BindingGuard {
    pub(crate) fn new(frame: &Frame) -> Self {
        Self {
            id: frame.id,
            trace_id: frame.trace_id.clone(),
            _thread_bound: PhantomData,
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        remove(self.id);
    }
}
