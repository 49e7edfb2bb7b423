//! Monotonic write versions.
//!
//! Append-only stores resolve same-id races by keeping the highest version.
//! Versions from [`VersionClock::global`] never go backwards in this process
//! and roughly follow wall-clock time across processes. Two writers can still
//! stamp the same microsecond from different processes, so every write also
//! carries a unique `write_id` that breaks version ties.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

static GLOBAL: VersionClock = VersionClock::new();

/// Issues strictly increasing versions (UTC microseconds since the epoch)
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicI64,
}

/// Version plus tiebreak identifying one write
///
/// Orders by version, then by `write_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteStamp {
    pub version: i64,
    pub write_id: String,
}

impl WriteStamp {
    /// Stamp with an explicit tiebreak
    pub fn new(version: i64, write_id: impl Into<String>) -> Self {
        Self {
            version,
            write_id: write_id.into(),
        }
    }
}

impl VersionClock {
    /// Create a clock starting from the current time
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Clock shared by every mapper in the process
    pub fn global() -> &'static VersionClock {
        &GLOBAL
    }

    /// Next version: `max(now, last + 1)`
    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Next version with a fresh time-ordered write id
    pub fn stamp(&self) -> WriteStamp {
        WriteStamp::new(self.next(), Uuid::now_v7().to_string())
    }
}
