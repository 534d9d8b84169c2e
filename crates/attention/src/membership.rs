//! Membership change detection.
//!
//! A pull request against the governance repository changes who may approve
//! changes when it adds people to a SIG roster. The detector compares every
//! roster file the pull request touches between the revision before its first
//! commit and its last commit, and reports the identities that appear.
//!
//! Every failure here is soft. An unresolvable commit range means "no change";
//! a roster revision that cannot be read or parsed skips that file only.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::ports::{RevisionError, RevisionSnapshotAccessor};
use crate::roster::{parse_roster, RosterError};
use crate::{
    CommitSha, Identity, MembershipDelta, MembershipSnapshot, PullRequestRecord, RepoPath,
    RosterLayout, SigName,
};

/// Outcome of running the detector on one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    /// No roster gained a member (or the change could not be determined).
    Unchanged,
    /// One delta per roster that gained members, in changed-path order.
    Added(Vec<MembershipDelta>),
}

impl MembershipChange {
    /// The deltas, empty when unchanged.
    pub fn deltas(&self) -> &[MembershipDelta] {
        match self {
            MembershipChange::Unchanged => &[],
            MembershipChange::Added(deltas) => deltas,
        }
    }
}

/// Identities in `after`'s effective members that are absent from `before`'s,
/// in `after`'s first-seen order.
pub fn added_members(before: &MembershipSnapshot, after: &MembershipSnapshot) -> Vec<Identity> {
    after
        .effective_members()
        .iter()
        .filter(|m| !before.contains(m))
        .cloned()
        .collect()
}

#[derive(Debug)]
enum SnapshotFailure {
    Read(RevisionError),
    Parse(RosterError),
}

impl std::fmt::Display for SnapshotFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotFailure::Read(e) => write!(f, "{e}"),
            SnapshotFailure::Parse(e) => write!(f, "{e}"),
        }
    }
}

/// Detects roster additions made by a pull request.
pub struct MembershipDetector<'a> {
    revisions: &'a dyn RevisionSnapshotAccessor,
    layout: &'a RosterLayout,
}

impl<'a> MembershipDetector<'a> {
    pub fn new(revisions: &'a dyn RevisionSnapshotAccessor, layout: &'a RosterLayout) -> Self {
        Self { revisions, layout }
    }

    /// Runs detection for `pr`.
    ///
    /// Identities in `exclude` (the current members of the SIG being notified,
    /// when that filter is enabled) are never reported as new.
    pub async fn detect(
        &self,
        pr: &PullRequestRecord,
        exclude: &BTreeSet<Identity>,
    ) -> MembershipChange {
        let changed = match self.revisions.changed_paths(pr).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(repo = %pr.repo, pr = %pr.number, error = %e, "Cannot list changed files");
                return MembershipChange::Unchanged;
            }
        };

        let rosters: Vec<(SigName, RepoPath)> = changed
            .into_iter()
            .filter_map(|path| self.layout.sig_of(&path).map(|sig| (sig, path)))
            .collect();
        if rosters.is_empty() {
            return MembershipChange::Unchanged;
        }

        let range = match self.revisions.commit_range(pr).await {
            Ok(range) => range,
            Err(e) => {
                warn!(repo = %pr.repo, pr = %pr.number, error = %e, "Cannot resolve commits, assuming no membership change");
                return MembershipChange::Unchanged;
            }
        };
        debug!(pr = %pr.number, before = %range.before, after = %range.after, files = rosters.len(), "Comparing rosters");

        let mut seen: BTreeSet<Identity> = BTreeSet::new();
        let mut deltas = Vec::new();
        for (sig, path) in rosters {
            let before = self.snapshot_at(pr, &range.before, &path).await;
            let after = self.snapshot_at(pr, &range.after, &path).await;
            let (before, after) = match (before, after) {
                (Ok(before), Ok(after)) => (before, after),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(pr = %pr.number, path = %path, error = %e, "Skipping unreadable roster");
                    continue;
                }
            };

            let new_members: Vec<Identity> = added_members(&before, &after)
                .into_iter()
                .filter(|m| !exclude.contains(m))
                .filter(|m| seen.insert(m.clone()))
                .collect();
            if !new_members.is_empty() {
                debug!(pr = %pr.number, sig = %sig, added = new_members.len(), "Roster gained members");
                deltas.push(MembershipDelta { sig, new_members });
            }
        }

        if deltas.is_empty() {
            MembershipChange::Unchanged
        } else {
            MembershipChange::Added(deltas)
        }
    }

    async fn snapshot_at(
        &self,
        pr: &PullRequestRecord,
        commit: &CommitSha,
        path: &RepoPath,
    ) -> Result<MembershipSnapshot, SnapshotFailure> {
        match self.revisions.read_file_at(&pr.repo, commit, path).await {
            // A roster that does not exist yet (new SIG) or any more has no members.
            Ok(None) => Ok(MembershipSnapshot::empty()),
            Ok(Some(bytes)) => parse_roster(&bytes).map_err(SnapshotFailure::Parse),
            Err(e) => Err(SnapshotFailure::Read(e)),
        }
    }
}
