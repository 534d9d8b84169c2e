//! Shared value types for the attention routing domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. open durations are never negative)
//! and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------

/// Number of whole days a pull request has been open.
///
/// Always computed against the evaluation-time "now" and never persisted, so
/// no stale duration crosses runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationDays(u64);

impl DurationDays {
    /// Creates a [`DurationDays`] from a raw day count.
    pub fn new(days: u64) -> Self {
        Self(days)
    }

    /// Whole days elapsed from `created` to `now`, floored.
    ///
    /// A `created` in the future (clock skew between hosts) yields zero.
    pub fn between(created: Timestamp, now: Timestamp) -> Self {
        let days = (now.as_datetime() - created.as_datetime()).num_days();
        Self(u64::try_from(days).unwrap_or(0))
    }

    /// Returns the day count.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DurationDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
