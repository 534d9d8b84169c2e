//! Port traits implemented by infrastructure crates.
//!
//! The router depends only on these traits. Pagination, authentication,
//! version-control mechanics and retry policy (if any) belong to the
//! implementations; the routing core never retries a call.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::activity::StateCounts;
use crate::checklist::PullComment;
use crate::{
    CommitSha, Identity, PullRequestRecord, RepoPath, RepositoryId, SigName, SigRecord, Timestamp,
};

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Read-only view of the SIGs, their repositories and their people.
pub trait DirectoryStore: Send + Sync {
    /// Every SIG, in directory order.
    fn list_sigs(&self) -> &[SigRecord];

    /// The SIG named `sig`, if present.
    fn sig(&self, sig: &SigName) -> Option<&SigRecord> {
        self.list_sigs().iter().find(|s| &s.name == sig)
    }

    /// Current maintainers of `sig`; empty for an unknown SIG.
    fn maintainers_of(&self, sig: &SigName) -> BTreeSet<Identity> {
        self.sig(sig).map(|s| s.maintainers.clone()).unwrap_or_default()
    }

    /// Committers `sig` maps to `repo`, or `None` when it maps none.
    fn committers_of(&self, sig: &SigName, repo: &RepositoryId) -> Option<&BTreeSet<Identity>> {
        self.sig(sig).and_then(|s| s.committers_of(repo))
    }
}

/// Identity → email address resolution.
///
/// The router only asks whether an address exists, to warn about recipients
/// who cannot be reached; delivery itself is outside the routing core.
pub trait AddressBook: Send + Sync {
    fn address_of(&self, identity: &Identity) -> Option<&str>;
}

impl AddressBook for BTreeMap<Identity, String> {
    fn address_of(&self, identity: &Identity) -> Option<&str> {
        self.get(identity).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// A pull request listing that could not be completed.
///
/// Listings are all-or-nothing: a failure on any page discards the pages
/// already fetched.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The service answered with a non-success status.
    #[error("{listing}: page {page} returned HTTP {status}")]
    Status {
        listing: String,
        page: u32,
        status: u16,
    },

    /// The request never produced a response.
    #[error("{listing}: request for page {page} failed: {message}")]
    Transport {
        listing: String,
        page: u32,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("{listing}: page {page} could not be decoded: {message}")]
    Decode {
        listing: String,
        page: u32,
        message: String,
    },
}

/// Lists the pull requests currently open.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Every open pull request, pagination handled by the implementation.
    async fn list_open(&self) -> Result<Vec<PullRequestRecord>, SourceError>;
}

/// Comments posted on a pull request.
#[async_trait]
pub trait PullCommentSource: Send + Sync {
    /// Every comment on `pr`, oldest first.
    async fn comments(&self, pr: &PullRequestRecord) -> Result<Vec<PullComment>, SourceError>;
}

/// Weekly pull request statistics per SIG.
#[async_trait]
pub trait SigActivitySource: Send + Sync {
    /// State counts of `sig`'s pull requests over the week ending at `at`;
    /// `None` when nothing is recorded.
    async fn state_counts(
        &self,
        sig: &SigName,
        at: Timestamp,
    ) -> Result<Option<StateCounts>, SourceError>;
}

// ---------------------------------------------------------------------------
// Revisions
// ---------------------------------------------------------------------------

/// The two revisions a pull request's roster changes are compared between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    /// The parent of the pull request's first commit.
    pub before: CommitSha,
    /// The pull request's last commit.
    pub after: CommitSha,
}

/// A revision lookup that failed. Always soft: the pull request is routed as
/// if it changed no roster.
#[derive(Debug, Error)]
pub enum RevisionError {
    /// The pull request's commits could not be determined.
    #[error("commits of {pr} could not be resolved: {reason}")]
    Unresolvable { pr: String, reason: String },

    /// The backing store failed.
    #[error("revision backend failed: {message}")]
    Backend { message: String },
}

/// Access to file contents at historical revisions.
#[async_trait]
pub trait RevisionSnapshotAccessor: Send + Sync {
    /// Paths touched by `pr`, in the order the backend reports them.
    async fn changed_paths(&self, pr: &PullRequestRecord) -> Result<Vec<RepoPath>, RevisionError>;

    /// The revisions before and after `pr`'s commits.
    async fn commit_range(&self, pr: &PullRequestRecord) -> Result<CommitRange, RevisionError>;

    /// Contents of `path` at `commit` in `repo`; `None` if the file does not
    /// exist at that revision.
    async fn read_file_at(
        &self,
        repo: &RepositoryId,
        commit: &CommitSha,
        path: &RepoPath,
    ) -> Result<Option<Vec<u8>>, RevisionError>;
}
