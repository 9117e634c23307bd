//! Age-based retention applied at rotation

use filetime::FileTime;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tests::engine::TestEngine;
use tests::keys;
use tracelog_core::{facade, prune_expired};

const DAY: u64 = 24 * 60 * 60;

fn aged_file(dir: &Path, name: &str, days: u64) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "old run\n").unwrap();
    let when = SystemTime::now() - Duration::from_secs(days * DAY + 60);
    filetime::set_file_mtime(&path, FileTime::from_system_time(when)).unwrap();
    path
}

#[test]
fn test_expired_files_removed_at_next_rotation() {
    let env = TestEngine::with_settings(&[
        (keys::file::RETENTION_DAYS, "7"),
        (keys::file::MAX_SIZE_BYTES, "300"),
    ]);
    std::fs::create_dir_all(env.log_dir()).unwrap();
    let expired = aged_file(env.log_dir(), "20200101_000000_old_case_x_all.log", 10);
    let expired_gz = aged_file(env.log_dir(), "20200101_000000_old_case_x_all.1.log.gz", 10);
    let young = aged_file(env.log_dir(), "20240101_000000_recent_case_y_all.log", 3);

    let case = env.engine.begin_test("suite::retention");
    // nothing is pruned before a rotation happens
    assert!(expired.exists());

    for i in 0..10 {
        facade::info(format!("filling the file, line {}", i));
    }
    drop(case);

    assert!(!expired.exists());
    assert!(!expired_gz.exists());
    assert!(young.exists());
}

#[test]
fn test_zero_retention_keeps_everything() {
    let env = TestEngine::with_settings(&[
        (keys::file::RETENTION_DAYS, "0"),
        (keys::file::MAX_SIZE_BYTES, "300"),
    ]);
    std::fs::create_dir_all(env.log_dir()).unwrap();
    let ancient = aged_file(env.log_dir(), "ancient_all.log", 4000);

    let case = env.engine.begin_test("suite::forever");
    for i in 0..10 {
        facade::info(format!("filling the file, line {}", i));
    }
    drop(case);

    assert!(ancient.exists());
}

#[test]
fn test_concurrent_prunes_do_not_fail() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        aged_file(dir.path(), &format!("stale_{}.log", i), 40);
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dir = dir.path().to_path_buf();
            std::thread::spawn(move || prune_expired(&dir, 30, &[]).unwrap())
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let removed: usize = outcomes.iter().map(|o| o.removed.len()).sum();
    assert_eq!(removed, 50);
    assert!(outcomes.iter().all(|o| o.failures.is_empty()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
