//! Line and filename templates
//!
//! Templates use `{name}` placeholders; `{{` and `}}` escape literal braces.
//! Placeholders are validated when the template is parsed so a typo in the
//! settings fails at startup instead of producing odd output later.

use lazy_static::lazy_static;
use regex::Regex;

use super::{CallerLocation, Level, LogRecord, TraceId};
use crate::error::{ConfigError, ConfigResult};

/// Default line format for console, file and report sinks
pub const DEFAULT_LINE_FORMAT: &str = "[{timestamp}] [{level}] [{trace_id}] [{caller}] {message}";

/// Default log file name format
pub const DEFAULT_FILENAME_FORMAT: &str = "{date}_{time}_{testcase}_{trace_id}_{level}.log";

/// Timestamp format used in rendered lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Placeholders accepted in line templates (`logid` is an alias of `trace_id`)
const LINE_FIELDS: &[(&str, &str)] = &[
    ("timestamp", "timestamp"),
    ("level", "level"),
    ("trace_id", "trace_id"),
    ("logid", "trace_id"),
    ("caller", "caller"),
    ("file", "file"),
    ("line", "line"),
    ("message", "message"),
];

/// Placeholders accepted in filename templates
const FILENAME_FIELDS: &[(&str, &str)] = &[
    ("date", "date"),
    ("time", "time"),
    ("datetime", "datetime"),
    ("testcase", "testcase"),
    ("trace_id", "trace_id"),
    ("logid", "trace_id"),
    ("level", "level"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(&'static str),
}

/// A parsed `{placeholder}` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a line template (`timestamp`, `level`, `trace_id`, `caller`, ...)
    pub fn line(source: &str) -> ConfigResult<Self> {
        Self::parse_with(source, LINE_FIELDS)
    }

    /// Parse a filename template (`date`, `time`, `testcase`, `trace_id`, ...)
    pub fn filename(source: &str) -> ConfigResult<Self> {
        Self::parse_with(source, FILENAME_FIELDS)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn parse_with(source: &str, fields: &[(&str, &'static str)]) -> ConfigResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(ConfigError::MalformedTemplate(source.to_string()));
                    }
                    let field = fields
                        .iter()
                        .find(|(alias, _)| *alias == name)
                        .map(|(_, canonical)| *canonical)
                        .ok_or_else(|| ConfigError::UnknownPlaceholder {
                            template: source.to_string(),
                            name: name.clone(),
                        })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => return Err(ConfigError::MalformedTemplate(source.to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Render with a value lookup for each canonical field name
    pub fn render_with<F>(&self, mut value: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::with_capacity(self.source.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&value(name)),
            }
        }
        out
    }

    /// Render a record as a single line
    pub fn render_record(&self, record: &LogRecord) -> String {
        self.render_with(|field| match field {
            "timestamp" => record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "level" => record.level.as_str().to_string(),
            "trace_id" => record.trace_id.to_string(),
            "caller" => record.caller.to_string(),
            "file" => record.caller.file.clone(),
            "line" => record.caller.line.to_string(),
            "message" => render_message(record),
            _ => String::new(),
        })
    }
}

/// Message text with the payload appended as compact JSON
fn render_message(record: &LogRecord) -> String {
    match &record.payload {
        Some(payload) => match serde_json::to_string(payload) {
            Ok(json) => format!("{} | {}", record.message, json),
            Err(_) => record.message.clone(),
        },
        None => record.message.clone(),
    }
}

/// Make a test case name safe to embed in a file name.
///
/// Path separators and `::` become `_`; anything outside `[A-Za-z0-9._-]`
/// is replaced as well.
pub fn sanitize_test_name(name: &str) -> String {
    lazy_static! {
        static ref UNSAFE: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
    }
    let replaced = name.replace("::", "_");
    let cleaned = UNSAFE.replace_all(&replaced, "_");
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "test".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A line rendered with [`DEFAULT_LINE_FORMAT`], split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub timestamp: String,
    pub level: Level,
    pub trace_id: TraceId,
    pub caller: CallerLocation,
    pub message: String,
}

impl ParsedLine {
    pub fn parse(line: &str) -> Option<Self> {
        lazy_static! {
            static ref LINE: Regex = Regex::new(
                r"^\[(?P<ts>[^\]]+)\] \[(?P<level>[A-Z]+)\] \[(?P<trace>[A-Za-z0-9_-]+)\] \[(?P<file>[^\]]+):(?P<line>\d+)\] (?P<msg>.*)$"
            )
            .unwrap();
        }
        let caps = LINE.captures(line.trim_end_matches(['\r', '\n']))?;
        Some(Self {
            timestamp: caps["ts"].to_string(),
            level: Level::parse(&caps["level"])?,
            trace_id: TraceId::parse(&caps["trace"]).ok()?,
            caller: CallerLocation::new(&caps["file"], caps["line"].parse().ok()?),
            message: caps["msg"].to_string(),
        })
    }
}
