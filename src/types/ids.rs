//! Newtype wrapper for job identifiers.
//!
//! Job ids are handed to untrusted callers (the `X-Job-ID` header and the
//! status endpoint), so they are drawn from the operating system CSPRNG
//! rather than a counter.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix shared by every generated job id.
const JOB_ID_PREFIX: &str = "job_";

/// Number of random bytes in a job id (hex-encoded to 32 characters).
const JOB_ID_RANDOM_BYTES: usize = 16;

/// An opaque job identifier, unique within the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        JobId(s.into())
    }

    /// Generates a fresh id of the form `job_<32 hex chars>`.
    ///
    /// Never fails: if the CSPRNG is unavailable the id falls back to a
    /// time-based form (`job_<nanos>_<hex unix seconds>`), which is only
    /// best-effort unique.
    pub fn generate() -> Self {
        Self::generate_from(&mut OsRng)
    }

    /// Generates an id using the given random source.
    pub fn generate_from<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; JOB_ID_RANDOM_BYTES];
        match rng.try_fill_bytes(&mut bytes) {
            Ok(()) => JobId(format!("{}{}", JOB_ID_PREFIX, hex::encode(bytes))),
            Err(e) => {
                warn!(error = %e, "Random source failed, falling back to time-based job id");
                Self::time_based(SystemTime::now())
            }
        }
    }

    fn time_based(now: SystemTime) -> Self {
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        JobId(format!(
            "{}{}_{:x}",
            JOB_ID_PREFIX,
            since_epoch.as_nanos(),
            since_epoch.as_secs()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}
