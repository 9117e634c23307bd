//! Several tests one after another on the same worker

use tests::engine::TestEngine;
use tests::lines;
use tracelog_core::facade;

#[test]
fn test_sequential_tests_get_fresh_ids_and_files() {
    let env = TestEngine::new();

    let first = env.engine.begin_test("suite::first");
    let first_id = first.trace_id().clone();
    let first_file = first.log_files().remove(0);
    facade::info("one");
    drop(first);

    // closed and complete before the next test opens anything
    let closed = std::fs::read_to_string(&first_file).unwrap();
    assert!(closed.trim_end().ends_with("Test completed: suite::first - PASSED"));
    assert_ne!(facade::current_trace_id(), first_id);

    let second = env.engine.begin_test("suite::second");
    let second_id = second.trace_id().clone();
    let second_file = second.log_files().remove(0);
    facade::info("two");
    drop(second);

    assert_ne!(first_id, second_id);
    assert_ne!(first_file, second_file);
    assert_eq!(std::fs::read_to_string(&first_file).unwrap(), closed);
    assert!(lines::parse_file(&second_file)
        .iter()
        .all(|l| l.trace_id == second_id));
}

#[test]
fn test_same_name_twice_gets_two_files() {
    let env = TestEngine::new();

    let a = env.engine.begin_test("suite::retry");
    let a_file = a.log_files().remove(0);
    drop(a);
    let b = env.engine.begin_test("suite::retry");
    let b_file = b.log_files().remove(0);
    drop(b);

    assert_ne!(a_file, b_file);
    assert_eq!(env.files_containing("suite_retry").len(), 2);
}

#[test]
fn test_ambient_id_outside_tests_is_stable() {
    std::thread::spawn(|| {
        let a = facade::current_trace_id();
        let b = facade::current_trace_id();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    })
    .join()
    .unwrap();
}
