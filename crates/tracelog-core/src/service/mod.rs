//! Sinks and the services behind them

pub mod caller;
pub mod console;
pub mod file_sink;
pub mod report;
pub mod retention;
pub mod router;

pub use caller::{CallerResolver, StackFrame};
pub use console::{ConsoleCapture, ConsoleSink};
pub use file_sink::{FileBinding, FileSink, FileSinkManager, SinkState};
pub use report::{
    Attachment, Consolidated, DirectoryReport, MediaType, MemoryReport, NoopReport,
    ReportAdapter, ReportEntry, ReportEvent, ReportSink,
};
pub use retention::{compress, prune_expired, PruneOutcome};
pub use router::{route, RouteReport, Sink, SinkKind};
