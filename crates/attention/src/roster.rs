//! SIG roster documents.
//!
//! Two formats exist in the governance repository:
//!
//! - `sig-info.yaml`, the structured roster: maintainers with contact details
//!   and, per group of repositories, committers and repository admins.
//! - `OWNERS`, the legacy format: a bare list of maintainer handles.
//!
//! The same parser serves the directory (the roster's current state) and the
//! membership change detector (historical revisions).

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use thiserror::Error;

use crate::{Identity, MembershipSnapshot, RepositoryId};

/// A roster revision that could not be read.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The bytes are not valid UTF-8.
    #[error("roster is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    /// The document is not a YAML document of the expected shape.
    #[error("roster is malformed: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

/// Reads an account handle written by people: surrounding whitespace is
/// ignored, and empty values or values that are not plain handles (path
/// separators, `.` or `..`) yield `None`.
pub fn account_handle(value: &str) -> Option<Identity> {
    let id = value.trim();
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return None;
    }
    Identity::new(id)
}

/// A person listed in a roster: a mapping with `gitee_id`, or a bare handle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MemberEntry {
    Handle(String),
    Record {
        gitee_id: String,
        #[serde(default)]
        email: Option<String>,
    },
}

impl MemberEntry {
    /// The member's identity; see [`account_handle`].
    pub fn identity(&self) -> Option<Identity> {
        match self {
            MemberEntry::Handle(id) | MemberEntry::Record { gitee_id: id, .. } => account_handle(id),
        }
    }

    /// The member's email address, ignoring the `null` / `NA` placeholders.
    pub fn email(&self) -> Option<&str> {
        match self {
            MemberEntry::Record { email: Some(email), .. } => {
                let email = email.trim();
                if email.is_empty() || email == "null" || email == "NA" {
                    None
                } else {
                    Some(email)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// A group of repositories sharing committers and admins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoryEntry {
    #[serde(default)]
    repo: OneOrMany,
    #[serde(default)]
    pub committers: Vec<MemberEntry>,
    #[serde(default, alias = "repo_admins")]
    pub admins: Vec<MemberEntry>,
}

impl RepositoryEntry {
    /// Repositories covered by this entry.
    pub fn repositories(&self) -> Vec<RepositoryId> {
        match &self.repo {
            OneOrMany::One(repo) => RepositoryId::new(repo.trim()).into_iter().collect(),
            OneOrMany::Many(repos) => repos
                .iter()
                .filter_map(|r| RepositoryId::new(r.trim()))
                .collect(),
        }
    }
}

/// A parsed `sig-info.yaml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RosterDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<MemberEntry>,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

impl RosterDocument {
    /// Parses a roster document. An empty document is an empty roster.
    pub fn parse(bytes: &[u8]) -> Result<Self, RosterError> {
        let text = std::str::from_utf8(bytes)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        // A document that is YAML `null` (e.g. only comments) is empty too.
        let doc: Option<Self> = serde_yaml::from_str(text)?;
        Ok(doc.unwrap_or_default())
    }

    /// Maintainer identities in document order.
    pub fn maintainer_ids(&self) -> Vec<Identity> {
        self.maintainers.iter().filter_map(MemberEntry::identity).collect()
    }

    /// Repository → committers, for every entry that lists committers.
    ///
    /// When several entries name the same repository the last one wins.
    pub fn committers_by_repo(&self) -> BTreeMap<RepositoryId, BTreeSet<Identity>> {
        let mut mapping = BTreeMap::new();
        for entry in &self.repositories {
            if entry.committers.is_empty() {
                continue;
            }
            let committers: BTreeSet<Identity> =
                entry.committers.iter().filter_map(MemberEntry::identity).collect();
            for repo in entry.repositories() {
                mapping.insert(repo, committers.clone());
            }
        }
        mapping
    }

    /// Every member entry: maintainers, then each repository entry's
    /// committers and admins.
    pub fn entries(&self) -> impl Iterator<Item = &MemberEntry> {
        self.maintainers.iter().chain(
            self.repositories
                .iter()
                .flat_map(|r| r.committers.iter().chain(r.admins.iter())),
        )
    }

    /// The roles recorded in this document.
    pub fn snapshot(&self) -> MembershipSnapshot {
        let mut snapshot = MembershipSnapshot::empty();
        for id in self.maintainer_ids() {
            snapshot.add_maintainer(id);
        }
        for entry in &self.repositories {
            for id in entry.committers.iter().filter_map(MemberEntry::identity) {
                snapshot.add_committer(id);
            }
            for id in entry.admins.iter().filter_map(MemberEntry::identity) {
                snapshot.add_repo_admin(id);
            }
        }
        snapshot
    }
}

/// Parses one revision of a `sig-info.yaml` roster into its membership.
pub fn parse_roster(bytes: &[u8]) -> Result<MembershipSnapshot, RosterError> {
    Ok(RosterDocument::parse(bytes)?.snapshot())
}

#[derive(Debug, Default, Deserialize)]
struct OwnersDocument {
    #[serde(default)]
    maintainers: Vec<MemberEntry>,
}

/// Parses a legacy `OWNERS` file into its maintainer identities.
pub fn parse_owners(bytes: &[u8]) -> Result<Vec<Identity>, RosterError> {
    let text = std::str::from_utf8(bytes)?;
    let doc: Option<OwnersDocument> = serde_yaml::from_str(text)?;
    Ok(doc
        .unwrap_or_default()
        .maintainers
        .iter()
        .filter_map(MemberEntry::identity)
        .collect())
}
