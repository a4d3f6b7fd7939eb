//! Monotonic watermark generation.
//!
//! Watermarks order sync jobs within one (identity, endpoint, protocol)
//! group. The only hard requirements are strict monotonicity within one
//! process and sort-stability as a string, so the format is a fixed-width
//! hex timestamp augmented with a per-millisecond counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A lexicographically sortable ordering token assigned at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// Wrap an already-encoded watermark (e.g. decoded from a job key).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues strictly increasing watermarks for one process.
///
/// Encoded as 16 hex chars of Unix milliseconds followed by 8 hex chars of
/// a counter, so lexicographic order equals issue order even when many
/// watermarks are minted within one millisecond or the clock stalls.
pub struct WatermarkGenerator {
    last: Mutex<(u64, u32)>,
}

impl WatermarkGenerator {
    /// Create a generator starting from the current time.
    pub fn new() -> Self {
        Self {
            last: Mutex::new((0, 0)),
        }
    }

    /// Mint the next watermark.
    pub fn next(&self) -> Watermark {
        let now = now_millis();
        let mut last = self.last.lock().unwrap();

        if now > last.0 {
            *last = (now, 0);
        } else {
            // Clock stalled or went backwards; stay on the last timestamp
            // and advance the counter so ordering never regresses.
            last.1 += 1;
        }

        Watermark(format!("{:016x}{:08x}", last.0, last.1))
    }
}

impl Default for WatermarkGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as u64
}
