//! Pull request status classification.
//!
//! A pull request's status is an ordered accumulation of the conditions that
//! keep it from being merged. Every matching condition contributes a segment;
//! none excludes another. The segment order is fixed and significant for
//! display.
//!
//! Classification is one-way: a [`Status`] is never parsed back into the flags
//! and labels that produced it.

use serde::{Deserialize, Serialize, Serializer};

use crate::PullRequestRecord;

/// Text shown when no blocking condition applies.
pub const READY_TO_MERGE: &str = "Ready to merge";

/// Separator placed between status segments.
pub const SEGMENT_SEPARATOR: &str = "、";

/// Label names the classifier inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Applied once the author's contributor license agreement is verified.
    pub cla_approved: String,
    /// Applied when the CI gate fails.
    pub ci_failed: String,
    /// Applied when reviewers are waiting for the author to update the change.
    pub wait_for_update: String,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            cla_approved: "openeuler-cla/yes".to_string(),
            ci_failed: "ci_failed".to_string(),
            wait_for_update: "kind/wait_for_update".to_string(),
        }
    }
}

/// One condition blocking a merge, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusFlag {
    Draft,
    ClaFailed,
    CiFailed,
    MergeConflict,
    WaitingForUpdate,
}

impl StatusFlag {
    /// Display text of the segment.
    pub fn text(self) -> &'static str {
        match self {
            StatusFlag::Draft => "Draft",
            StatusFlag::ClaFailed => "CLA failed",
            StatusFlag::CiFailed => "CI failed",
            StatusFlag::MergeConflict => "Merge conflict",
            StatusFlag::WaitingForUpdate => "Waiting for update",
        }
    }
}

/// Composite status of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Status {
    flags: Vec<StatusFlag>,
}

impl Status {
    /// The baseline status: no blocking condition.
    pub fn ready() -> Self {
        Self::default()
    }

    /// Appends a segment. The first segment replaces the baseline.
    pub fn fill(&mut self, flag: StatusFlag) {
        self.flags.push(flag);
    }

    /// Segments in the order they were accumulated.
    pub fn flags(&self) -> &[StatusFlag] {
        &self.flags
    }

    /// Returns `true` if nothing blocks the merge.
    pub fn is_ready(&self) -> bool {
        self.flags.is_empty()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some((first, rest)) = self.flags.split_first() else {
            return f.write_str(READY_TO_MERGE);
        };
        f.write_str(first.text())?;
        for flag in rest {
            f.write_str(SEGMENT_SEPARATOR)?;
            f.write_str(flag.text())?;
        }
        Ok(())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Classifies `pr` against the label names in `labels`.
pub fn classify(pr: &PullRequestRecord, labels: &LabelPolicy) -> Status {
    let mut status = Status::ready();
    if pr.draft {
        status.fill(StatusFlag::Draft);
    }
    if !pr.has_label(&labels.cla_approved) {
        status.fill(StatusFlag::ClaFailed);
    }
    if pr.has_label(&labels.ci_failed) {
        status.fill(StatusFlag::CiFailed);
    }
    if !pr.mergeable {
        status.fill(StatusFlag::MergeConflict);
    }
    if pr.has_label(&labels.wait_for_update) {
        status.fill(StatusFlag::WaitingForUpdate);
    }
    status
}
