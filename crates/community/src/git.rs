//! Revision snapshots read from a local clone of the governance repository.
//!
//! Pull request heads are fetched from the clone's remote as
//! `refs/pull/<n>/head`, next to the pull request's target branch. The pull
//! request's commits are the ones reachable from its head but not from the
//! merge base with the target branch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::{ErrorCode, Oid, Repository, Sort};
use tracing::{debug, info};

use attention::{
    CommitRange, CommitSha, PullRequestRecord, RepoPath, RepositoryId, RevisionError,
    RevisionSnapshotAccessor,
};

/// Default remote pull request heads are fetched from.
pub const DEFAULT_REMOTE: &str = "origin";

fn backend(err: git2::Error) -> RevisionError {
    RevisionError::Backend {
        message: err.message().to_string(),
    }
}

fn pull_label(pr: &PullRequestRecord) -> String {
    format!("{}{}", pr.repo, pr.number)
}

struct PullCommits {
    head: Oid,
    base: Oid,
    /// Oldest first.
    commits: Vec<Oid>,
}

/// [`RevisionSnapshotAccessor`] over a local clone, using `git2`.
///
/// Every call opens the repository afresh on a blocking thread.
#[derive(Debug, Clone)]
pub struct LocalRevisions {
    checkout: PathBuf,
    remote: String,
    fetch: bool,
    fetched: Arc<Mutex<BTreeSet<String>>>,
}

impl LocalRevisions {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
            remote: DEFAULT_REMOTE.to_string(),
            fetch: true,
            fetched: Arc::default(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Uses the refs already present in the clone instead of fetching them.
    pub fn without_fetch(mut self) -> Self {
        self.fetch = false;
        self
    }

    fn pull_ref(&self, pr: &PullRequestRecord) -> String {
        format!("refs/remotes/{}/pull/{}", self.remote, pr.number.as_u64())
    }

    fn branch_ref(&self, pr: &PullRequestRecord) -> String {
        format!("refs/remotes/{}/{}", self.remote, pr.branch)
    }

    fn open(&self) -> Result<Repository, RevisionError> {
        Repository::open(&self.checkout).map_err(backend)
    }

    /// Fetches `pr`'s head and target branch once per accessor.
    fn fetch_pull(&self, repo: &Repository, pr: &PullRequestRecord) -> Result<(), git2::Error> {
        let label = pull_label(pr);
        let mut fetched = self
            .fetched
            .lock()
            .map_err(|_| git2::Error::from_str("fetch bookkeeping lock poisoned"))?;
        if fetched.contains(&label) {
            return Ok(());
        }
        let refspecs = [
            format!("+refs/pull/{}/head:{}", pr.number.as_u64(), self.pull_ref(pr)),
            format!("+refs/heads/{}:{}", pr.branch, self.branch_ref(pr)),
        ];
        info!(pr = %label, remote = %self.remote, "Fetching pull request head");
        repo.find_remote(&self.remote)?.fetch(&refspecs, None, None)?;
        fetched.insert(label);
        Ok(())
    }

    fn resolve(&self, repo: &Repository, pr: &PullRequestRecord) -> Result<PullCommits, RevisionError> {
        let label = pull_label(pr);
        let unresolvable = |err: git2::Error| RevisionError::Unresolvable {
            pr: label.clone(),
            reason: err.message().to_string(),
        };
        if self.fetch {
            self.fetch_pull(repo, pr).map_err(unresolvable)?;
        }
        let head = repo.refname_to_id(&self.pull_ref(pr)).map_err(unresolvable)?;
        let target = repo.refname_to_id(&self.branch_ref(pr)).map_err(unresolvable)?;
        let base = repo.merge_base(head, target).map_err(unresolvable)?;

        let mut walk = repo.revwalk().map_err(backend)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE).map_err(backend)?;
        walk.push(head).map_err(backend)?;
        walk.hide(base).map_err(backend)?;
        let commits = walk.collect::<Result<Vec<_>, _>>().map_err(backend)?;
        debug!(pr = %label, commits = commits.len(), base = %base, "Resolved pull request commits");
        Ok(PullCommits { head, base, commits })
    }

    fn changed_paths_blocking(&self, pr: &PullRequestRecord) -> Result<Vec<RepoPath>, RevisionError> {
        let repo = self.open()?;
        let resolved = self.resolve(&repo, pr)?;
        let base_tree = repo.find_commit(resolved.base).and_then(|c| c.tree()).map_err(backend)?;
        let head_tree = repo.find_commit(resolved.head).and_then(|c| c.tree()).map_err(backend)?;
        let diff = repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .map_err(backend)?;
        Ok(diff
            .deltas()
            .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
            .filter_map(Path::to_str)
            .filter_map(RepoPath::new)
            .collect())
    }

    fn commit_range_blocking(&self, pr: &PullRequestRecord) -> Result<CommitRange, RevisionError> {
        let repo = self.open()?;
        let resolved = self.resolve(&repo, pr)?;
        let first = resolved.commits.first().ok_or_else(|| RevisionError::Unresolvable {
            pr: pull_label(pr),
            reason: "pull request has no commits".to_string(),
        })?;
        let before = repo.find_commit(*first).and_then(|c| c.parent_id(0)).map_err(backend)?;
        Ok(CommitRange {
            before: sha(before)?,
            after: sha(resolved.head)?,
        })
    }

    fn read_file_blocking(&self, commit: &CommitSha, path: &RepoPath) -> Result<Option<Vec<u8>>, RevisionError> {
        let repo = self.open()?;
        let oid = Oid::from_str(commit.as_str()).map_err(backend)?;
        let tree = repo.find_commit(oid).and_then(|c| c.tree()).map_err(backend)?;
        let entry = match tree.get_path(Path::new(path.as_str())) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(backend(e)),
        };
        let object = entry.to_object(&repo).map_err(backend)?;
        Ok(object.as_blob().map(|blob| blob.content().to_vec()))
    }

    async fn blocking<T, F>(&self, task: F) -> Result<T, RevisionError>
    where
        T: Send + 'static,
        F: FnOnce(LocalRevisions) -> Result<T, RevisionError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || task(this))
            .await
            .map_err(|e| RevisionError::Backend {
                message: format!("revision task failed: {e}"),
            })?
    }
}

fn sha(oid: Oid) -> Result<CommitSha, RevisionError> {
    CommitSha::new(oid.to_string()).ok_or_else(|| RevisionError::Backend {
        message: "empty commit id".to_string(),
    })
}

#[async_trait]
impl RevisionSnapshotAccessor for LocalRevisions {
    async fn changed_paths(&self, pr: &PullRequestRecord) -> Result<Vec<RepoPath>, RevisionError> {
        let pr = pr.clone();
        self.blocking(move |this| this.changed_paths_blocking(&pr)).await
    }

    async fn commit_range(&self, pr: &PullRequestRecord) -> Result<CommitRange, RevisionError> {
        let pr = pr.clone();
        self.blocking(move |this| this.commit_range_blocking(&pr)).await
    }

    /// Reads from the local clone; `repo` is assumed to be the repository it
    /// was cloned from.
    async fn read_file_at(
        &self,
        repo: &RepositoryId,
        commit: &CommitSha,
        path: &RepoPath,
    ) -> Result<Option<Vec<u8>>, RevisionError> {
        debug!(repo = %repo, commit = %commit, path = %path, "Reading file from local clone");
        let (commit, path) = (commit.clone(), path.clone());
        self.blocking(move |this| this.read_file_blocking(&commit, &path)).await
    }
}
