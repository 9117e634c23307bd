//! No trace id or file bleeds between concurrently running tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier};
use tests::engine::TestEngine;
use tests::{keys, lines, TraceId};
use tracelog_core::facade;

const WORKERS: usize = 8;
const LINES: usize = 50;

/// Run one test per worker thread, all at once; returns each worker's id
fn run_workers(env: &TestEngine) -> Vec<TraceId> {
    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let engine = env.engine.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                let case = engine.begin_test(&format!("parallel::worker_{}", worker));
                let trace = case.trace_id().clone();
                for line in 0..LINES {
                    facade::info(format!("worker {} line {}", worker, line));
                    assert_eq!(facade::current_trace_id(), trace);
                }
                drop(case);
                trace
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_each_worker_gets_its_own_id_and_file() {
    let env = TestEngine::new();
    let ids = run_workers(&env);

    let distinct: HashSet<_> = ids.iter().cloned().collect();
    assert_eq!(distinct.len(), WORKERS);

    let files = env.files();
    assert_eq!(files.len(), WORKERS);

    // every file holds exactly one trace id, and every id exactly one file
    let mut owners: HashMap<TraceId, usize> = HashMap::new();
    for file in &files {
        let parsed = lines::parse_file(file);
        let in_file: HashSet<_> = parsed.iter().map(|l| l.trace_id.clone()).collect();
        assert_eq!(in_file.len(), 1, "{:?} mixes trace ids", file);
        let trace = in_file.into_iter().next().unwrap();
        assert!(file.to_string_lossy().contains(trace.as_str()));
        *owners.entry(trace).or_default() += 1;

        let worker_lines = parsed
            .iter()
            .filter(|l| l.message.starts_with("worker "))
            .count();
        assert_eq!(worker_lines, LINES);
    }
    assert_eq!(owners.len(), WORKERS);
    assert!(owners.values().all(|n| *n == 1));
}

#[test]
fn test_report_entries_stay_with_their_test() {
    let env = TestEngine::new();
    let ids = run_workers(&env);

    for trace in &ids {
        let report_lines = env.report.lines_for(trace);
        assert!(report_lines.iter().all(|l| l.contains(trace.as_str())));
        let worker_lines = report_lines.iter().filter(|l| l.contains("] worker ")).count();
        assert_eq!(worker_lines, LINES);

        let first = env.report.attachments_for(trace).remove(0);
        assert_eq!(first.body, format!("LogID: {}", trace));
    }
}

#[test]
fn test_concurrent_rotation_loses_nothing() {
    let env = TestEngine::with_settings(&[(keys::file::MAX_SIZE_BYTES, "1024")]);
    let ids = run_workers(&env);

    for trace in &ids {
        let files = env.files_containing(trace.as_str());
        assert!(files.len() > 1);
        let worker_lines: usize = files
            .iter()
            .flat_map(|f| lines::parse_file(f))
            .inspect(|l| assert_eq!(&l.trace_id, trace))
            .filter(|l| l.message.starts_with("worker "))
            .count();
        assert_eq!(worker_lines, LINES);
    }
    assert!(env.console.lines().is_empty());
}
