//! Records flowing through a routing run.
//!
//! [`SigRecord`] and [`PullRequestRecord`] are read from the collaborators once
//! per run and never modified. [`MembershipSnapshot`] and [`MembershipDelta`]
//! are produced by the membership change detector; [`ReportRow`],
//! [`RecipientBucket`] and [`OrderedReport`] are the router's and the
//! aggregator's output.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::aggregate::order_rows;
use crate::status::Status;
use crate::{
    BranchName, DurationDays, Identity, Label, PullNumber, RepositoryId, SigName, Timestamp,
};

// ---------------------------------------------------------------------------
// Directory records
// ---------------------------------------------------------------------------

/// One SIG as recorded in the directory at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigRecord {
    /// Unique SIG name.
    pub name: SigName,
    /// Repositories owned by the SIG, in directory order.
    pub repositories: Vec<RepositoryId>,
    /// Current maintainers.
    pub maintainers: BTreeSet<Identity>,
    /// Committers for the repositories that declare their own.
    ///
    /// A repository with an entry here is reviewed by these committers instead
    /// of the SIG maintainers.
    pub committers_by_repo: BTreeMap<RepositoryId, BTreeSet<Identity>>,
}

impl SigRecord {
    /// Creates a SIG record with no repositories, maintainers or committers.
    pub fn new(name: SigName) -> Self {
        Self {
            name,
            repositories: Vec::new(),
            maintainers: BTreeSet::new(),
            committers_by_repo: BTreeMap::new(),
        }
    }

    /// Committers mapped to `repo`, if the SIG declares any for it.
    pub fn committers_of(&self, repo: &RepositoryId) -> Option<&BTreeSet<Identity>> {
        self.committers_by_repo.get(repo)
    }

    /// Every identity holding a role in the SIG: maintainers and all committers.
    pub fn members(&self) -> BTreeSet<Identity> {
        let mut members = self.maintainers.clone();
        for committers in self.committers_by_repo.values() {
            members.extend(committers.iter().cloned());
        }
        members
    }
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// One open pull request as listed by a pull request source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// Repository the pull request targets, in `"org/repo"` form.
    pub repo: RepositoryId,
    /// Target branch.
    pub branch: BranchName,
    /// Pull request number within `repo`.
    pub number: PullNumber,
    /// Title as written by the author.
    pub title: String,
    /// Web URL of the pull request.
    pub url: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Whether the pull request is marked as a draft.
    pub draft: bool,
    /// Whether the platform reports the pull request as mergeable.
    pub mergeable: bool,
    /// Labels currently applied.
    pub labels: BTreeSet<Label>,
}

impl PullRequestRecord {
    /// Returns `true` if a label with the given name is applied.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.as_str() == name)
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// The roles recorded in one revision of a SIG roster file.
///
/// Roles are kept as sets for membership queries; the effective members are
/// additionally kept in first-seen document order so that deltas are reported
/// in the order the roster lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    maintainers: BTreeSet<Identity>,
    committers: BTreeSet<Identity>,
    repo_admins: BTreeSet<Identity>,
    members: Vec<Identity>,
}

impl MembershipSnapshot {
    /// A snapshot with no members, used for a roster that does not exist yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records `identity` as a maintainer.
    pub fn add_maintainer(&mut self, identity: Identity) {
        self.maintainers.insert(identity.clone());
        self.remember(identity);
    }

    /// Records `identity` as a committer of some repository.
    pub fn add_committer(&mut self, identity: Identity) {
        self.committers.insert(identity.clone());
        self.remember(identity);
    }

    /// Records `identity` as an administrator of some repository.
    pub fn add_repo_admin(&mut self, identity: Identity) {
        self.repo_admins.insert(identity.clone());
        self.remember(identity);
    }

    fn remember(&mut self, identity: Identity) {
        if !self.members.contains(&identity) {
            self.members.push(identity);
        }
    }

    pub fn maintainers(&self) -> &BTreeSet<Identity> {
        &self.maintainers
    }

    pub fn committers(&self) -> &BTreeSet<Identity> {
        &self.committers
    }

    pub fn repo_admins(&self) -> &BTreeSet<Identity> {
        &self.repo_admins
    }

    /// Union of all roles, in first-seen order.
    pub fn effective_members(&self) -> &[Identity] {
        &self.members
    }

    /// Returns `true` if `identity` holds any role in this snapshot.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.maintainers.contains(identity)
            || self.committers.contains(identity)
            || self.repo_admins.contains(identity)
    }
}

/// Identities added to one SIG's roster by a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDelta {
    /// The SIG whose roster file changed.
    pub sig: SigName,
    /// New identities, deduplicated, in first-seen order. Never empty.
    pub new_members: Vec<Identity>,
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

/// One line of a recipient's report.
///
/// The recipient is not stored on the row: rows live in a
/// [`RecipientBucket`] keyed by recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub sig: SigName,
    pub repo: RepositoryId,
    pub branch: BranchName,
    pub number: PullNumber,
    pub title: String,
    pub url: String,
    pub status: Status,
    pub duration_days: DurationDays,
}

impl ReportRow {
    /// Builds the row reported to the recipients of `pr` under `sig`.
    pub fn new(sig: SigName, pr: &PullRequestRecord, status: Status, duration_days: DurationDays) -> Self {
        Self {
            sig,
            repo: pr.repo.clone(),
            branch: pr.branch.clone(),
            number: pr.number,
            title: pr.title.clone(),
            url: pr.url.clone(),
            status,
            duration_days,
        }
    }

    /// HTML anchor pointing at the pull request, labelled with its number.
    pub fn number_link(&self) -> String {
        format!("<a href='{}'>{}</a>", self.url, self.number)
    }

    /// HTML anchor pointing at the pull request, labelled with its title.
    pub fn title_link(&self) -> String {
        format!("<a href='{}'>{}</a>", self.url, self.title)
    }
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Rows collected per recipient while routing.
///
/// Append-only while the router runs; [`RecipientBucket::into_ordered`] hands
/// every recipient's rows to the aggregator once routing is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientBucket {
    rows: BTreeMap<Identity, Vec<ReportRow>>,
}

impl RecipientBucket {
    /// Appends `row` to `recipient`'s rows.
    pub fn push(&mut self, recipient: Identity, row: ReportRow) {
        self.rows.entry(recipient).or_default().push(row);
    }

    /// Rows collected so far for `recipient`, in routing order.
    pub fn rows_for(&self, recipient: &Identity) -> &[ReportRow] {
        self.rows.get(recipient).map_or(&[], Vec::as_slice)
    }

    /// Recipients in ascending order.
    pub fn recipients(&self) -> impl Iterator<Item = &Identity> {
        self.rows.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Orders every recipient's rows for rendering.
    pub fn into_ordered(self) -> OrderedReport {
        let rows = self
            .rows
            .into_iter()
            .map(|(recipient, rows)| (recipient, order_rows(rows)))
            .collect();
        OrderedReport { rows }
    }
}

/// The final output of a run: each recipient's rows in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedReport {
    rows: BTreeMap<Identity, Vec<ReportRow>>,
}

impl OrderedReport {
    /// Recipients with their ordered rows, recipients ascending.
    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &[ReportRow])> {
        self.rows.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn rows_for(&self, recipient: &Identity) -> &[ReportRow] {
        self.rows.get(recipient).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
