//! Routing configuration.
//!
//! The all-SIGs report and the membership-change report are the same
//! algorithm fed with a different [`Scope`] and [`RoutingPolicy`].

use serde::{Deserialize, Serialize};

use crate::{RepoPath, RepositoryId, SigName};

/// Which pull requests a run routes, and to which SIG they belong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every SIG in the directory; a pull request belongs to each SIG that
    /// lists its repository.
    AllSigs,
    /// One monitored SIG; every pull request of `repository` belongs to it.
    Sig {
        sig: SigName,
        repository: RepositoryId,
    },
}

/// Knobs that differ between deployments of the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    /// Organisations whose repositories are routed under [`Scope::AllSigs`].
    pub organizations: Vec<String>,
    /// The repository holding the SIG rosters. Only its pull requests are
    /// checked for membership changes.
    pub governance_repository: Option<RepositoryId>,
    /// Drop new members who already hold a role in the SIG being notified.
    pub exclude_target_members: bool,
    /// Leave drafts and non-mergeable pull requests out of the report.
    pub skip_unready: bool,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            organizations: vec!["openeuler".to_string(), "src-openeuler".to_string()],
            governance_repository: RepositoryId::new("openeuler/community"),
            exclude_target_members: true,
            skip_unready: false,
        }
    }
}

impl RoutingPolicy {
    /// Returns `true` if repositories of `organization` are routed.
    pub fn covers(&self, repo: &RepositoryId) -> bool {
        self.organizations.iter().any(|o| o == repo.organization())
    }

    /// Returns `true` if `repo` holds the SIG rosters.
    pub fn is_governance(&self, repo: &RepositoryId) -> bool {
        self.governance_repository.as_ref() == Some(repo)
    }
}

/// Where roster files live in the governance repository:
/// `<root>/<sig-name>/<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterLayout {
    pub root: String,
    pub file_name: String,
}

impl Default for RosterLayout {
    fn default() -> Self {
        Self {
            root: "sig".to_string(),
            file_name: "sig-info.yaml".to_string(),
        }
    }
}

impl RosterLayout {
    /// The SIG whose roster `path` is, or `None` if `path` is not a roster file.
    ///
    /// Only paths exactly one directory below the root match; deeper or
    /// shallower paths with the same file name are not rosters.
    pub fn sig_of(&self, path: &RepoPath) -> Option<SigName> {
        let mut segments = path.segments();
        let (Some(root), Some(sig), Some(file), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };
        if root == self.root && file == self.file_name {
            SigName::new(sig)
        } else {
            None
        }
    }

    /// Path of `sig`'s roster file.
    pub fn path_of(&self, sig: &SigName) -> Option<RepoPath> {
        RepoPath::new(format!("{}/{}/{}", self.root, sig, self.file_name))
    }
}
