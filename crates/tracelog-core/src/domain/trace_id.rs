//! Trace ID - per-test correlation token
//!
//! Every test execution gets its own trace id. It is stamped on every record
//! written while the test runs and names the test's log file.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{ConfigError, ConfigResult};

/// Length of a minted trace id in characters
pub const TRACE_ID_LEN: usize = 32;

/// Longest externally supplied id accepted by [`TraceId::parse`]
const MAX_EXTERNAL_LEN: usize = 64;

lazy_static::lazy_static! {
    /// Random identifier for this process, mixed into every minted id so two
    /// processes started in the same millisecond never collide.
    static ref PROCESS_NONCE: String = uuid::Uuid::new_v4().simple().to_string();
}

/// Opaque correlation token attached to all output of one test execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Mint a new trace id.
    ///
    /// Format: 32 lowercase hex characters (e.g. "3f9c0e...").
    /// Millisecond timestamp, a thread-local random value and the process
    /// nonce are hashed together, so concurrent calls need no coordination.
    pub fn generate() -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let local: u64 = rand::thread_rng().gen();

        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(local.to_le_bytes());
        hasher.update(PROCESS_NONCE.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self(digest[..TRACE_ID_LEN].to_string())
    }

    /// Accept an id minted elsewhere (e.g. propagated by an upstream service).
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_EXTERNAL_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ConfigError::InvalidTraceId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TraceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TraceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
