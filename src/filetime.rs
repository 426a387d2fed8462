//! Windows file-time domain and clock abstraction
//!
//! Signed timestamps use the Windows file-time epoch: 100-nanosecond ticks
//! since 1601-01-01 UTC. The remote verifier rejects anything outside
//! `[0, MAX_FILE_TIME]`, so the same bounds are enforced before signing.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SigningError;

/// Largest representable Windows file time (9999-12-31T23:59:59.9999999Z).
pub const MAX_FILE_TIME: i64 = 2_650_467_743_999_999_999;

/// Seconds between 1601-01-01 and 1970-01-01.
const EPOCH_DIFFERENCE_SECS: i64 = 11_644_473_600;

/// Ticks (100 ns units) per second.
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Checks if the timestamp is a valid Windows file time.
pub fn is_valid_file_time(timestamp: i64) -> bool {
    (0..=MAX_FILE_TIME).contains(&timestamp)
}

/// Converts a `SystemTime` to a Windows file time.
///
/// Fails with `InvalidTimestamp` for times before 1601 or beyond the
/// maximum representable file time.
pub fn file_time_from_system(time: SystemTime) -> Result<i64, SigningError> {
    let ticks = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => {
            let secs = i64::try_from(after.as_secs())
                .map_err(|_| SigningError::InvalidTimestamp(i64::MAX))?;
            secs.checked_mul(TICKS_PER_SECOND)
                .and_then(|t| t.checked_add(i64::from(after.subsec_nanos()) / 100))
                .and_then(|t| t.checked_add(EPOCH_DIFFERENCE_SECS * TICKS_PER_SECOND))
                .ok_or(SigningError::InvalidTimestamp(i64::MAX))?
        }
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs())
                .map_err(|_| SigningError::InvalidTimestamp(i64::MIN))?;
            let offset = secs
                .checked_mul(TICKS_PER_SECOND)
                .and_then(|t| t.checked_add(i64::from(before.subsec_nanos()) / 100))
                .ok_or(SigningError::InvalidTimestamp(i64::MIN))?;
            EPOCH_DIFFERENCE_SECS * TICKS_PER_SECOND - offset
        }
    };

    if !is_valid_file_time(ticks) {
        return Err(SigningError::InvalidTimestamp(ticks));
    }

    Ok(ticks)
}

/// Source of the current wall-clock time.
///
/// The broker reads time through this trait so tests can substitute a
/// manual clock for expiry and rotation checks.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// Production clock backed by `SystemTime::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
