//! Weekly pull request processed rate per SIG.
//!
//! The processed rate of a SIG at an instant is the share of its pull
//! requests over the preceding week that were merged or closed. Reports show
//! the rate at this morning's anchor next to the rate one week earlier.
//!
//! Lookups are soft: a SIG whose counts cannot be fetched for either instant
//! simply has no comparison.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ports::SigActivitySource;
use crate::{SigName, Timestamp};

/// UTC offset of the clock the weekly anchor is read on.
pub const ANCHOR_UTC_OFFSET_SECS: i64 = 8 * 3600;

/// Local hour of the weekly anchor.
pub const ANCHOR_HOUR: u32 = 9;

/// Pull request counts by state for one SIG over one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub merged: u64,
    pub closed: u64,
    pub open: u64,
}

/// Whole percentage of pull requests merged or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProcessedRate(u8);

impl ProcessedRate {
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Rate of `counts`, rounded half up. No pull requests at all is 0%.
    pub fn from_counts(counts: StateCounts) -> Self {
        let processed = counts.merged.saturating_add(counts.closed);
        let total = processed.saturating_add(counts.open);
        if total == 0 {
            return Self(0);
        }
        let percent = (processed.saturating_mul(200) + total) / total.saturating_mul(2);
        Self::new(u8::try_from(percent).unwrap_or(100))
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for ProcessedRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Unchanged,
    Up,
    Down,
}

/// A SIG's processed rate now and one week earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateComparison {
    pub current: ProcessedRate,
    pub previous: ProcessedRate,
    pub trend: Trend,
    /// Absolute difference in percentage points.
    pub change: u8,
}

impl RateComparison {
    pub fn new(current: ProcessedRate, previous: ProcessedRate) -> Self {
        let trend = match current.cmp(&previous) {
            std::cmp::Ordering::Equal => Trend::Unchanged,
            std::cmp::Ordering::Greater => Trend::Up,
            std::cmp::Ordering::Less => Trend::Down,
        };
        Self {
            current,
            previous,
            trend,
            change: current.0.abs_diff(previous.0),
        }
    }
}

impl std::fmt::Display for RateComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.trend {
            Trend::Unchanged => write!(f, "PR processed rate is {}, unchanged from last week", self.current),
            Trend::Up => write!(f, "PR processed rate is {}, up {}% on last week", self.current, self.change),
            Trend::Down => write!(f, "PR processed rate is {}, down {}% on last week", self.current, self.change),
        }
    }
}

/// Today's anchor (09:00 on the anchor clock) for `now`, and the instant one
/// week before it.
pub fn weekly_anchors(now: Timestamp) -> (Timestamp, Timestamp) {
    let offset = Duration::seconds(ANCHOR_UTC_OFFSET_SECS);
    let local_date = (now.as_datetime() + offset).date_naive();
    let current = match local_date.and_hms_opt(ANCHOR_HOUR, 0, 0) {
        Some(local) => Timestamp::from_utc(Utc.from_utc_datetime(&(local - offset))),
        None => now,
    };
    let previous = Timestamp::from_utc(current.as_datetime() - Duration::days(7));
    (current, previous)
}

/// Compares the processed rate of every SIG in `sigs` with the week before.
///
/// SIGs are queried one at a time. A SIG missing data at either anchor is
/// left out of the result.
pub async fn compare_processed_rates(
    source: &dyn SigActivitySource,
    sigs: &[SigName],
    now: Timestamp,
) -> BTreeMap<SigName, RateComparison> {
    let (current_at, previous_at) = weekly_anchors(now);
    let mut comparisons = BTreeMap::new();
    for sig in sigs {
        let current = source.state_counts(sig, current_at).await;
        let previous = source.state_counts(sig, previous_at).await;
        match (current, previous) {
            (Ok(Some(current)), Ok(Some(previous))) => {
                let comparison = RateComparison::new(
                    ProcessedRate::from_counts(current),
                    ProcessedRate::from_counts(previous),
                );
                info!(sig = %sig, "{comparison}");
                comparisons.insert(sig.clone(), comparison);
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(sig = %sig, error = %e, "Processed rate unavailable");
            }
            _ => debug!(sig = %sig, "No pull request activity recorded"),
        }
    }
    comparisons
}
