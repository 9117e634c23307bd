//! Degraded sinks: the test keeps running, one notice per failure kind

use pretty_assertions::assert_eq;
use tests::engine::TestEngine;
use tests::{keys, lines, ConsoleCapture};
use tracelog_core::facade;

fn notices(console: &ConsoleCapture, level: &str) -> Vec<String> {
    let tag = format!("[{}] [tracelog]", level);
    console
        .lines()
        .into_iter()
        .filter(|l| l.contains(&tag))
        .collect()
}

#[test]
fn test_lost_log_directory_is_announced_once_and_recovers() {
    let env = TestEngine::with_settings(&[(keys::file::MAX_SIZE_BYTES, "300")]);
    let case = env.engine.begin_test("failures::lost_dir");
    let trace = case.trace_id().clone();
    let file = case.log_files().remove(0);

    std::fs::remove_dir_all(env.log_dir()).unwrap();
    for i in 0..10 {
        facade::info(format!("while gone {}", i));
    }

    let errors = notices(&env.console, "ERROR");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("file logging failed"));
    assert_eq!(notices(&env.console, "WARNING").len(), 1);

    // the report never missed a line
    let reported = env.report.lines_for(&trace);
    assert_eq!(reported.iter().filter(|l| l.contains("while gone")).count(), 10);

    std::fs::create_dir_all(env.log_dir()).unwrap();
    facade::info("directory back");
    drop(case);

    let messages: Vec<_> = lines::parse_file(&file)
        .into_iter()
        .map(|l| l.message)
        .collect();
    assert!(messages.contains(&"directory back".to_string()));
    assert!(messages.contains(&"Test completed: failures::lost_dir - PASSED".to_string()));
    assert_eq!(notices(&env.console, "ERROR").len(), 1);
}

#[test]
fn test_failed_rotation_warns_once() {
    let env = TestEngine::with_settings(&[(keys::file::MAX_SIZE_BYTES, "300")]);
    let case = env.engine.begin_test("failures::vanishing_file");
    let trace = case.trace_id().clone();
    let file = case.log_files().remove(0);

    for round in 0..2 {
        // nothing left to rename at the next rotation
        std::fs::remove_file(&file).unwrap();
        for i in 0..5 {
            facade::info(format!("round {} line {}", round, i));
        }
    }
    facade::info("last line");
    drop(case);

    let warnings = notices(&env.console, "WARNING");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Failed to rotate"));
    assert!(notices(&env.console, "ERROR").is_empty());

    let reported = env.report.lines_for(&trace);
    assert_eq!(reported.iter().filter(|l| l.contains("] round ")).count(), 10);

    let messages: Vec<_> = lines::parse_file(&file)
        .into_iter()
        .map(|l| l.message)
        .collect();
    assert!(messages.contains(&"last line".to_string()));
    assert!(messages.contains(&"Test completed: failures::vanishing_file - PASSED".to_string()));
}

#[test]
fn test_unopenable_file_falls_back_to_console_and_report() {
    let env = TestEngine::new();
    // a plain file where the log directory should be
    std::fs::remove_dir_all(env.log_dir()).unwrap();
    std::fs::write(env.log_dir(), "not a directory").unwrap();

    for name in ["failures::first", "failures::second"] {
        let case = env.engine.begin_test(name);
        let trace = case.trace_id().clone();
        assert!(case.log_files().is_empty());
        facade::info("still reported");
        drop(case);

        let reported = env.report.lines_for(&trace);
        assert!(reported.iter().any(|l| l.ends_with("still reported")));
    }

    let errors = notices(&env.console, "ERROR");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Could not open log file"));
}
