//! Retention and compression of rotated log files
//!
//! Many workers may prune the same directory at once. Every step tolerates
//! the file having been removed by somebody else: that is counted, not
//! reported.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Result of one pruning pass
#[derive(Debug, Default)]
pub struct PruneOutcome {
    /// Files this pass deleted
    pub removed: Vec<PathBuf>,
    /// Expired files that vanished before we got to them
    pub already_gone: usize,
    /// Files that could not be inspected or deleted
    pub failures: Vec<(PathBuf, io::Error)>,
}

/// Delete `*.log*` files in `dir` last modified more than `max_age_days` ago.
///
/// Paths in `keep` (files currently open) are never touched. A `max_age_days`
/// of 0 keeps everything.
pub fn prune_expired(dir: &Path, max_age_days: u32, keep: &[PathBuf]) -> Result<PruneOutcome> {
    let mut outcome = PruneOutcome::default();
    if max_age_days == 0 {
        return Ok(outcome);
    }

    let max_age = Duration::from_secs(u64::from(max_age_days) * SECS_PER_DAY);
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let pattern = format!(
        "{}/*.log*",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let entries = glob::glob(&pattern).context("Invalid log directory pattern")?;

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                let path = e.path().to_path_buf();
                outcome.failures.push((path, e.into_error()));
                continue;
            }
        };
        if keep.iter().any(|k| k == &path) {
            continue;
        }

        let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                outcome.already_gone += 1;
                continue;
            }
            Err(e) => {
                outcome.failures.push((path, e));
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("[Retention] Removed expired log file: {:?}", path);
                outcome.removed.push(path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => outcome.already_gone += 1,
            Err(e) => outcome.failures.push((path, e)),
        }
    }

    Ok(outcome)
}

/// Gzip `path` to `path.gz` and remove the original
pub fn compress(path: &Path) -> Result<PathBuf> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let source = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let target =
        File::create(&gz_path).with_context(|| format!("Failed to create {:?}", gz_path))?;

    let mut encoder = GzEncoder::new(BufWriter::new(target), Compression::default());
    io::copy(&mut BufReader::new(source), &mut encoder).context("Failed to compress log file")?;
    encoder
        .finish()
        .context("Failed to finish gzip stream")?
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush compressed file")?;

    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).context("Failed to remove uncompressed log file"),
    }

    info!("[Retention] Compressed log file: {:?} -> {:?}", path, gz_path);
    Ok(gz_path)
}
