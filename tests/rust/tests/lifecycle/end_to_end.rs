//! One test from start to end, checked across all three sinks

use pretty_assertions::assert_eq;
use tests::engine::TestEngine;
use tests::lines;
use tests::{Level, ReportEvent, TestStatus, TraceId};
use tracelog_core::facade;

fn t1() -> TraceId {
    TraceId::parse("T1").unwrap()
}

#[test]
fn test_example_reaches_every_sink() {
    let env = TestEngine::new();

    let case = env.engine.begin_test_with_id("test_example", t1());
    let file = case.log_files().remove(0);
    facade::info("A");
    facade::error("B");
    case.finish(TestStatus::Passed);

    // file: every line tagged T1, A before B, framed by start and end
    let parsed = lines::parse_file(&file);
    assert!(parsed.iter().all(|l| l.trace_id == t1()));
    assert_eq!(parsed.first().unwrap().message, "Starting test: test_example");
    assert_eq!(
        parsed.last().unwrap().message,
        "Test completed: test_example - PASSED"
    );
    let ours: Vec<_> = parsed
        .iter()
        .filter(|l| l.message == "A" || l.message == "B")
        .map(|l| (l.level, l.message.as_str()))
        .collect();
    assert_eq!(ours, vec![(Level::Info, "A"), (Level::Error, "B")]);

    // console: ERROR only
    let console = env.console.lines();
    assert_eq!(console.len(), 1);
    assert!(console[0].contains("[ERROR] [T1] [end_to_end.rs:"));
    assert!(console[0].ends_with("] B"));

    // report: the descriptor comes before anything else for T1
    let first = env
        .report
        .events()
        .into_iter()
        .find(|e| e.trace_id() == &t1())
        .unwrap();
    match first {
        ReportEvent::Attachment { attachment, .. } => {
            assert_eq!(attachment.name, "LogID");
            assert_eq!(attachment.body, "LogID: T1");
        }
        other => panic!("expected the LogID attachment first, got {:?}", other),
    }
}

#[test]
fn test_bound_id_inside_test_lands_in_test_file() {
    let env = TestEngine::new();

    let case = env.engine.begin_test("test_example");
    let file = case.log_files().remove(0);
    {
        let _bound = facade::bind(t1());
        facade::info("A");
        facade::error("B");
    }
    facade::info("after");
    drop(case);

    let parsed = lines::parse_file(&file);
    let tagged: Vec<_> = parsed
        .iter()
        .filter(|l| l.trace_id == t1())
        .map(|l| l.message.as_str())
        .collect();
    assert_eq!(tagged, vec!["A", "B"]);
    let after = parsed.iter().find(|l| l.message == "after").unwrap();
    assert_ne!(after.trace_id, t1());
}

#[test]
fn test_consolidated_attachments_at_end() {
    let env = TestEngine::new();

    let case = env.engine.begin_test_with_id("test_consolidated", t1());
    facade::info("step one");
    facade::warn("slow response");
    facade::error("wrong total");
    case.finish(TestStatus::Failed);

    let attachments = env.report.attachments_for(&t1());
    let names: Vec<_> = attachments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "LogID",
            "CONSOLIDATED_INFO_LOGS",
            "CONSOLIDATED_WARNING_LOGS",
            "CONSOLIDATED_ERROR_LOGS",
        ]
    );
    let errors = attachments.last().unwrap();
    assert_eq!(errors.body.lines().count(), 1);
    assert!(errors.body.ends_with("wrong total"));

    assert!(matches!(
        env.report.events().last(),
        Some(ReportEvent::Finalized { status: TestStatus::Failed, test_name, .. })
            if test_name == "test_consolidated"
    ));
}

#[test]
fn test_panicking_test_is_torn_down() {
    let env = TestEngine::new();
    let engine = env.engine.clone();

    let outcome = std::thread::spawn(move || {
        let case = engine.begin_test("test_panics");
        let file = case.log_files().remove(0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _case = case;
            facade::info("about to fail");
            panic!("assertion blew up");
        }));
        (result.is_err(), file, tracelog_core::context::depth())
    })
    .join()
    .unwrap();

    let (panicked, file, depth) = outcome;
    assert!(panicked);
    assert_eq!(depth, 0);
    let last = lines::parse_file(&file).pop().unwrap();
    assert_eq!(last.message, "Test completed: test_panics - FAILED");
}

#[test]
fn test_no_files_when_file_logging_disabled() {
    let env = TestEngine::with_settings(&[(tests::keys::ENABLE_FILE_LOGGING, "false")]);

    let case = env.engine.begin_test("test_console_only");
    assert!(case.log_files().is_empty());
    facade::error("still on console");
    let trace = case.trace_id().clone();
    drop(case);

    assert!(env.files().is_empty());
    assert_eq!(env.console.lines().len(), 1);
    assert!(!env.report.lines_for(&trace).is_empty());
}
