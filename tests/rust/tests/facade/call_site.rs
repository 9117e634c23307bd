//! Caller resolution: records point at the code that logged them

use tests::engine::TestEngine;
use tests::lines;
use tracelog_core::{facade, CallerLocation, CallerResolver, StackFrame};

const ENGINE_FILES: &[&str] = &[
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
];

fn log_from_helper() {
    facade::warn("from helper");
}

#[test]
fn test_caller_is_the_logging_line() {
    let env = TestEngine::new();
    let case = env.engine.begin_test("caller::direct");
    let file = case.log_files().remove(0);

    let expected_line = line!() + 1;
    facade::info("here");
    drop(case);

    let record = lines::parse_file(&file)
        .into_iter()
        .find(|l| l.message == "here")
        .unwrap();
    assert_eq!(record.caller, CallerLocation::new("call_site.rs", expected_line));
}

#[test]
fn test_no_record_points_into_the_engine() {
    let env = TestEngine::new();
    let case = env.engine.begin_test("caller::never_internal");
    let file = case.log_files().remove(0);

    log_from_helper();
    facade::api_call(&facade::ApiCall::new("GET", "/health").status(200));
    facade::assertion_result("healthy", true, None, None);
    let _ = facade::step("ping", || Ok::<_, String>(()));
    facade::raw_passthrough("raw text");
    drop(case);

    let parsed = lines::parse_file(&file);
    assert!(parsed.len() >= 8);
    for line in parsed {
        assert!(
            !ENGINE_FILES.contains(&line.caller.file.as_str()),
            "{} resolved into the engine",
            line.caller
        );
        assert_eq!(line.caller.file, "call_site.rs");
    }
}

#[test]
fn test_resolver_skips_engine_frames() {
    let resolver = CallerResolver::new();
    let frames = vec![
        StackFrame::new("crates/tracelog-core/src/facade.rs", 60),
        StackFrame::new("crates/tracelog-core/src/engine.rs", 130),
        StackFrame::new("tests/rust/tests/facade/call_site.rs", 12),
    ];
    assert_eq!(
        resolver.resolve(frames),
        CallerLocation::new("call_site.rs", 12)
    );
    assert!(resolver.resolve(Vec::new()).is_unknown());
}
