//! Logging facade
//!
//! Free functions callable from anywhere in test or application code. Every
//! call picks up the trace id bound on the calling thread and the source
//! location of the call. None of them fail or panic; problems inside the
//! engine are announced on the console once and otherwise dropped.
//!
//! ```no_run
//! use tracelog_core::{facade as log, TestCase};
//!
//! let case = TestCase::begin("login::test_valid_user");
//! log::info("Logging in");
//! log::api_call(&log::ApiCall::new("POST", "/api/login").status(200).duration_ms(12));
//! log::assertion_result("token present", true, None, None);
//! drop(case);
//! ```

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::panic::Location;

use crate::context::{self, BindingGuard, Frame};
use crate::domain::{Level, LogRecord, Payload, TestStatus, TraceId};
use crate::engine;

/// Bind `trace_id` for the calling thread until the guard drops.
///
/// Records logged inside a test case while the binding is active carry this
/// id and still land in the test's file.
pub fn bind(trace_id: TraceId) -> BindingGuard {
    let frame = context::push(Frame::binding(trace_id, engine::current()));
    BindingGuard::new(&frame)
}

/// Trace id of the innermost binding, or this thread's ambient id
pub fn current_trace_id() -> TraceId {
    context::current_trace_id()
}

#[track_caller]
pub fn log(level: Level, message: impl Into<String>, payload: Option<Payload>) {
    emit(level, message.into(), payload, Location::caller(), true);
}

#[track_caller]
pub fn debug(message: impl Into<String>) {
    emit(Level::Debug, message.into(), None, Location::caller(), true);
}

#[track_caller]
pub fn info(message: impl Into<String>) {
    emit(Level::Info, message.into(), None, Location::caller(), true);
}

#[track_caller]
pub fn warn(message: impl Into<String>) {
    emit(Level::Warning, message.into(), None, Location::caller(), true);
}

#[track_caller]
pub fn error(message: impl Into<String>) {
    emit(Level::Error, message.into(), None, Location::caller(), true);
}

#[track_caller]
pub fn debug_with(message: impl Into<String>, payload: Payload) {
    emit(Level::Debug, message.into(), Some(payload), Location::caller(), true);
}

#[track_caller]
pub fn info_with(message: impl Into<String>, payload: Payload) {
    emit(Level::Info, message.into(), Some(payload), Location::caller(), true);
}

#[track_caller]
pub fn warn_with(message: impl Into<String>, payload: Payload) {
    emit(Level::Warning, message.into(), Some(payload), Location::caller(), true);
}

#[track_caller]
pub fn error_with(message: impl Into<String>, payload: Payload) {
    emit(Level::Error, message.into(), Some(payload), Location::caller(), true);
}

#[track_caller]
pub fn test_start(name: &str) {
    info(format!("Starting test: {}", name));
}

#[track_caller]
pub fn test_end(name: &str, status: TestStatus) {
    info(format!("Test completed: {} - {}", name, status));
}

/// Details of one outbound API call
#[derive(Debug, Clone, Default)]
pub struct ApiCall {
    pub method: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub request: Option<Value>,
    pub response: Option<Value>,
}

impl ApiCall {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn request(mut self, body: Value) -> Self {
        self.request = Some(body);
        self
    }

    pub fn response(mut self, body: Value) -> Self {
        self.response = Some(body);
        self
    }

    fn message(&self) -> String {
        let mut message = format!("API Call: {} {}", self.method.to_uppercase(), self.url);
        if let Some(status) = self.status_code {
            message.push_str(&format!(" - Status: {}", status));
        }
        if let Some(ms) = self.duration_ms {
            message.push_str(&format!(" - Time: {}ms", ms));
        }
        message
    }
}

/// INFO `API Call: ...` with the call's details as payload
#[track_caller]
pub fn api_call(call: &ApiCall) {
    let payload = object(json!({
        "method": call.method.to_uppercase(),
        "url": call.url,
        "status_code": call.status_code,
        "duration_ms": call.duration_ms,
        "trace_id": current_trace_id(),
        "request": call.request,
        "response": call.response,
    }));
    emit(Level::Info, call.message(), payload, Location::caller(), true);
}

/// INFO when `passed`, ERROR otherwise
#[track_caller]
pub fn assertion_result(
    description: &str,
    passed: bool,
    expected: Option<Value>,
    actual: Option<Value>,
) {
    let (level, message) = if passed {
        (Level::Info, format!("Assertion passed: {}", description))
    } else {
        (Level::Error, format!("Assertion failed: {}", description))
    };
    let payload = object(json!({
        "description": description,
        "expected": expected,
        "actual": actual,
        "trace_id": current_trace_id(),
    }));
    emit(level, message, payload, Location::caller(), true);
}

/// Failed validations carry the compared values as payload
#[track_caller]
pub fn data_validation(field: &str, expected: Value, actual: Value, passed: bool) {
    if passed {
        emit(
            Level::Info,
            format!("Data validation passed: {}", field),
            None,
            Location::caller(),
            true,
        );
        return;
    }
    let payload = object(json!({
        "field": field,
        "expected": expected,
        "actual": actual,
        "trace_id": current_trace_id(),
    }));
    emit(
        Level::Error,
        format!("Data validation failed: {}", field),
        payload,
        Location::caller(),
        true,
    );
}

/// Print `message` as-is on the console, and record it at INFO in the
/// file and report.
///
/// The raw stream ignores the console settings: the message is printed even
/// with `console.enabled` off.
#[track_caller]
pub fn raw_passthrough(message: &str) {
    engine::current().raw(message);
    emit(Level::Info, message.to_string(), None, Location::caller(), false);
}

/// Run `f` as a named step, logging its start and outcome.
///
/// The result of `f` is returned untouched.
#[track_caller]
pub fn step<T, E, F>(name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    let location = Location::caller();
    emit(Level::Info, format!("Starting step: {}", name), None, location, true);
    let result = f();
    match &result {
        Ok(_) => emit(Level::Info, format!("Step completed: {}", name), None, location, true),
        Err(e) => emit(
            Level::Error,
            format!("Step failed: {} - {}", name, e),
            None,
            location,
            true,
        ),
    }
    result
}

/// Request headers carrying the current trace id.
///
/// `extra` entries override the defaults.
pub fn headers_with_trace_id(extra: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("logId".to_string(), current_trace_id().to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    for (name, value) in extra {
        headers.insert(name.to_string(), value.to_string());
    }
    headers
}

fn object(value: Value) -> Option<Payload> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Build a record for the calling thread and hand it to its engine
pub(crate) fn emit(
    level: Level,
    message: String,
    payload: Option<Payload>,
    location: &'static Location<'static>,
    to_console: bool,
) {
    let top = context::top();
    let engine = match &top {
        Some(frame) => frame.engine.clone(),
        None => engine::global(),
    };
    let trace_id = match &top {
        Some(frame) => frame.trace_id.clone(),
        None => context::current_trace_id(),
    };
    drop(top);

    let caller = engine.resolver().locate(location);
    let record = LogRecord::new(level, trace_id, caller, message).with_payload(payload);
    engine.dispatch(&record, to_console);
}
