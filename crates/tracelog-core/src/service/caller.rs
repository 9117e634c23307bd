//! Caller resolution
//!
//! Facade functions are `#[track_caller]`, so the call site normally arrives
//! for free as a [`Location`]. Only when that location points back into this
//! crate (a helper that forgot to forward the caller) do we capture a
//! backtrace and walk it.

use lazy_static::lazy_static;
use regex::Regex;
use std::backtrace::Backtrace;
use std::panic::Location;
use std::path::Path;

use crate::domain::CallerLocation;

/// Frames inspected before giving up
pub const MAX_DEPTH: usize = 64;

/// Source files of the logging path itself
const INTERNAL_FILES: &[&str] = &[
    "caller.rs",
    "router.rs",
    "console.rs",
    "file_sink.rs",
    "retention.rs",
    "report.rs",
    "context.rs",
    "engine.rs",
    "facade.rs",
    "lifecycle.rs",
    "macros.rs",
    "lib.rs",
];

/// One frame of a call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

/// Finds the first stack frame outside this crate's logging path
#[derive(Debug, Clone)]
pub struct CallerResolver {
    src_root: String,
}

impl Default for CallerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CallerResolver {
    pub fn new() -> Self {
        // file!() is ".../src/service/caller.rs"; the crate's src dir is two up
        let src_root = Path::new(file!())
            .parent()
            .and_then(Path::parent)
            .map(|p| normalize(&p.to_string_lossy()))
            .unwrap_or_default();
        Self { src_root }
    }

    /// Pick the true caller from a stack, innermost frame first.
    ///
    /// Test-code frames win over other user frames; the first test frame
    /// ends the walk. Returns `unknown:0` when nothing qualifies.
    pub fn resolve<I>(&self, frames: I) -> CallerLocation
    where
        I: IntoIterator<Item = StackFrame>,
    {
        let mut fallback = None;
        for frame in frames.into_iter().take(MAX_DEPTH) {
            if frame.file.is_empty() || self.is_internal(&frame.file) || is_std(&frame.file) {
                continue;
            }
            if is_test_code(&frame.file) {
                return to_location(&frame);
            }
            if fallback.is_none() {
                fallback = Some(frame);
            }
        }
        fallback
            .map(|f| to_location(&f))
            .unwrap_or_else(CallerLocation::unknown)
    }

    /// Resolve a `#[track_caller]` location, walking a backtrace only if the
    /// location is inside this crate.
    pub fn locate(&self, location: &Location<'_>) -> CallerLocation {
        let frame = StackFrame::new(location.file(), location.line());
        if !self.is_internal(&frame.file) {
            return to_location(&frame);
        }
        self.resolve(capture_frames())
    }

    /// Whether `file` is one of this crate's own logging-path sources
    pub fn is_internal(&self, file: &str) -> bool {
        let file = normalize(file);
        let Some(rest) = strip_root(&file, &self.src_root) else {
            return false;
        };
        let name = rest.rsplit('/').next().unwrap_or(rest);
        INTERNAL_FILES.contains(&name)
    }
}

fn strip_root<'a>(file: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return None;
    }
    if let Some(rest) = file.strip_prefix(root) {
        return rest.strip_prefix('/');
    }
    // absolute backtrace paths end with the relative root
    let idx = file.find(&format!("/{}/", root))?;
    Some(&file[idx + root.len() + 2..])
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .to_string()
}

fn is_std(file: &str) -> bool {
    let file = normalize(file);
    file.starts_with("/rustc/")
        || file.contains("/library/std/")
        || file.contains("/library/core/")
        || file.contains("/library/alloc/")
}

fn is_test_code(file: &str) -> bool {
    let file = normalize(file);
    let name = file.rsplit('/').next().unwrap_or(&file);
    file.starts_with("tests/")
        || file.contains("/tests/")
        || name.starts_with("test_")
        || name.ends_with("_test.rs")
        || name.ends_with("_tests.rs")
        || name == "tests.rs"
}

fn to_location(frame: &StackFrame) -> CallerLocation {
    let base = Path::new(&frame.file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| frame.file.clone());
    CallerLocation::new(base, frame.line)
}

/// Frames of the current thread's stack, parsed from the backtrace text
fn capture_frames() -> Vec<StackFrame> {
    lazy_static! {
        static ref AT: Regex = Regex::new(r"^\s*at (?P<file>.+):(?P<line>\d+)(?::\d+)?$").unwrap();
    }
    let trace = Backtrace::force_capture().to_string();
    trace
        .lines()
        .filter_map(|line| {
            let caps = AT.captures(line)?;
            Some(StackFrame::new(&caps["file"], caps["line"].parse().ok()?))
        })
        .collect()
}
