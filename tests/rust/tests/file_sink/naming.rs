//! Log file naming and layout

use tests::engine::TestEngine;
use tests::{keys, LogSettings};
use tracelog_core::{facade, ConfigError, Engine};

#[test]
fn test_default_name_contains_case_and_trace() {
    let env = TestEngine::new();
    let case = env.engine.begin_test("tests::login::test_valid_user");
    let file = case.log_files().remove(0);
    let name = file.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with(&format!(
        "_tests_login_test_valid_user_{}_all.log",
        case.trace_id()
    )));
    // {date}_{time}_ prefix
    let date = chrono::Local::now().format("%Y%m%d").to_string();
    assert!(name.starts_with(&date));
}

#[test]
fn test_custom_filename_format() {
    let env = TestEngine::with_settings(&[(
        keys::file::FILENAME_FORMAT,
        "run-{logid}-{testcase}.log",
    )]);
    let case = env.engine.begin_test("checkout/pay");
    let file = case.log_files().remove(0);
    assert_eq!(
        file.file_name().unwrap().to_string_lossy(),
        format!("run-{}-checkout_pay.log", case.trace_id())
    );
}

#[test]
fn test_separate_files_per_level() {
    let env = TestEngine::with_settings(&[(keys::file::SEPARATE_BY_LEVEL, "true")]);
    let case = env.engine.begin_test("suite::levels");
    facade::warn("careful");
    facade::error("broken");
    drop(case);

    assert_eq!(env.files_containing("_info.log").len(), 1);
    assert_eq!(env.files_containing("_warning.log").len(), 1);
    assert_eq!(env.files_containing("_error.log").len(), 1);
    assert!(env.files_containing("_debug.log").is_empty());

    let error = std::fs::read_to_string(&env.files_containing("_error.log")[0]).unwrap();
    assert_eq!(error.lines().count(), 1);
    assert!(error.contains("broken"));
}

#[test]
fn test_custom_line_format() {
    let env = TestEngine::with_settings(&[(keys::file::FORMAT, "{level}|{logid}|{message}")]);
    let case = env.engine.begin_test("suite::format");
    let file = case.log_files().remove(0);
    facade::info("plain");
    let trace = case.trace_id().clone();
    drop(case);

    let text = std::fs::read_to_string(file).unwrap();
    assert!(text.contains(&format!("INFO|{}|plain\n", trace)));
}

#[test]
fn test_unwritable_directory_fails_build() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("occupied");
    std::fs::write(&blocker, "not a directory").unwrap();

    let mut settings = LogSettings::default();
    settings
        .apply(keys::file::DIRECTORY, &blocker.join("logs").to_string_lossy())
        .unwrap();
    let err = Engine::builder(settings).build().err().unwrap();
    assert!(matches!(err, ConfigError::DirectoryNotWritable { .. }));
}
