//! Nested bindings and nested test cases

use tests::engine::TestEngine;
use tests::lines;
use tests::{TestStatus, TraceId};
use tracelog_core::{context, facade};

#[test]
fn test_nested_case_restores_parent_binding() {
    let env = TestEngine::new();

    let outer = env.engine.begin_test("suite::outer");
    let outer_id = outer.trace_id().clone();
    let outer_file = outer.log_files().remove(0);

    let inner = env.engine.begin_test("suite::inner");
    let inner_id = inner.trace_id().clone();
    assert_eq!(facade::current_trace_id(), inner_id);
    facade::info("inside inner");
    inner.finish(TestStatus::Passed);

    assert_eq!(facade::current_trace_id(), outer_id);
    facade::info("back in outer");
    drop(outer);

    let outer_lines = lines::parse_file(&outer_file);
    let back = outer_lines.iter().find(|l| l.message == "back in outer").unwrap();
    assert_eq!(back.trace_id, outer_id);
    let inside = outer_lines.iter().find(|l| l.message == "inside inner").unwrap();
    assert_eq!(inside.trace_id, inner_id);
}

#[test]
fn test_nested_case_shares_the_open_file() {
    let env = TestEngine::new();

    let outer = env.engine.begin_test("suite::parent");
    let outer_files = outer.log_files();
    {
        let inner = env.engine.begin_test("suite::child");
        assert_eq!(inner.log_files(), outer_files);
        facade::info("child work");
    }
    facade::info("parent work");
    drop(outer);

    // one worker, one open log at a time
    assert_eq!(env.files(), outer_files);
    let messages: Vec<_> = lines::parse_file(&outer_files[0])
        .into_iter()
        .map(|l| l.message)
        .collect();
    assert!(messages.contains(&"Test completed: suite::child - PASSED".to_string()));
    assert!(messages.contains(&"child work".to_string()));
    assert!(messages.contains(&"parent work".to_string()));
}

#[test]
fn test_guards_dropped_out_of_order() {
    let env = TestEngine::new();
    let case = env.engine.begin_test("suite::guards");
    let case_id = case.trace_id().clone();

    let first = facade::bind(TraceId::parse("first").unwrap());
    let second = facade::bind(TraceId::parse("second").unwrap());
    assert_eq!(context::depth(), 3);

    drop(first);
    assert_eq!(facade::current_trace_id().as_str(), "second");
    drop(second);
    assert_eq!(facade::current_trace_id(), case_id);

    drop(case);
    assert_eq!(context::depth(), 0);
}

#[test]
fn test_idempotent_within_binding() {
    let env = TestEngine::new();
    let case = env.engine.begin_test("suite::idempotent");
    let ids: Vec<_> = (0..5).map(|_| facade::current_trace_id()).collect();
    assert!(ids.iter().all(|id| id == case.trace_id()));
}
