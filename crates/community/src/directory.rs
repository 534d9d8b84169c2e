//! SIG directory read from a checkout of the governance repository.
//!
//! Layout under the roster root (`sig/` by default):
//!
//! ```text
//! sig/<Name>/OWNERS                       legacy maintainer list
//! sig/<Name>/sig-info.yaml                structured roster
//! sig/<Name>/<org>/**/<repository>.yaml   one file per owned repository
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use attention::{
    parse_owners, AttentionError, Directory, RepositoryId, RosterDocument, RosterError,
    RosterLayout, SigName, SigRecord,
};

/// Entries of the roster root that are not SIGs.
pub const SKIPPED_ENTRIES: [&str; 4] = [
    "README.md",
    "sig-template",
    "sig-recycle",
    "create_sig_info_template.py",
];

/// Legacy maintainer list, preferred over the structured roster when present.
pub const OWNERS_FILE: &str = "OWNERS";

/// Errors that prevent the directory from being read. All are fatal to a run.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A SIG has neither an `OWNERS` file nor a structured roster.
    #[error("SIG {sig} has neither OWNERS nor {file}")]
    MissingRoster { sig: String, file: String },

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{path} is not a valid roster: {source}")]
    Roster {
        path: PathBuf,
        #[source]
        source: RosterError,
    },

    #[error(transparent)]
    Directory(#[from] AttentionError),
}

fn read(path: &Path) -> Result<Vec<u8>, DirectoryError> {
    fs::read(path).map_err(|source| DirectoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the SIG directory from a checkout.
#[derive(Debug, Clone)]
pub struct SigDirectory {
    checkout: PathBuf,
    layout: RosterLayout,
    organizations: Vec<String>,
}

impl SigDirectory {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
            layout: RosterLayout::default(),
            organizations: vec!["openeuler".to_string(), "src-openeuler".to_string()],
        }
    }

    pub fn with_layout(mut self, layout: RosterLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Organizations whose repository listings are collected per SIG.
    pub fn with_organizations(mut self, organizations: Vec<String>) -> Self {
        self.organizations = organizations;
        self
    }

    fn root(&self) -> PathBuf {
        self.checkout.join(&self.layout.root)
    }

    /// Location of `sig`'s structured roster in the checkout.
    pub fn roster_path(&self, sig: &SigName) -> PathBuf {
        self.root().join(sig.as_str()).join(&self.layout.file_name)
    }

    /// SIG directory names under the roster root, sorted.
    pub fn sig_names(&self) -> Result<Vec<SigName>, DirectoryError> {
        let root = self.root();
        let entries = fs::read_dir(&root).map_err(|source| DirectoryError::Io {
            path: root.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DirectoryError::Io {
                path: root.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if SKIPPED_ENTRIES.contains(&name.as_str()) || !entry.path().is_dir() {
                continue;
            }
            names.extend(SigName::new(name));
        }
        names.sort();
        Ok(names)
    }

    /// Reads every SIG. A SIG without a roster aborts the load.
    pub fn load(&self) -> Result<Directory, DirectoryError> {
        info!(root = %self.root().display(), "Reading SIG directory");
        let mut sigs = Vec::new();
        for name in self.sig_names()? {
            match self.load_sig(name) {
                Ok(sig) => sigs.push(sig),
                Err(err) => {
                    error!(error = %err, "SIG directory is incomplete");
                    return Err(err);
                }
            }
        }
        info!(sigs = sigs.len(), "Read SIG directory");
        Ok(Directory::new(sigs)?)
    }

    fn load_sig(&self, name: SigName) -> Result<SigRecord, DirectoryError> {
        let dir = self.root().join(name.as_str());
        let mut sig = SigRecord::new(name);
        sig.repositories = self.repositories_in(&dir)?;

        let owners_path = dir.join(OWNERS_FILE);
        let roster_path = self.roster_path(&sig.name);
        let roster = if roster_path.is_file() {
            let bytes = read(&roster_path)?;
            Some(RosterDocument::parse(&bytes).map_err(|source| DirectoryError::Roster {
                path: roster_path.clone(),
                source,
            })?)
        } else {
            None
        };

        if owners_path.is_file() {
            let bytes = read(&owners_path)?;
            let maintainers = parse_owners(&bytes).map_err(|source| DirectoryError::Roster {
                path: owners_path.clone(),
                source,
            })?;
            sig.maintainers = maintainers.into_iter().collect();
        } else if let Some(roster) = &roster {
            sig.maintainers = roster.maintainer_ids().into_iter().collect();
            // Per-repository committers only apply when the roster also
            // supplied the maintainers.
            sig.committers_by_repo = roster.committers_by_repo();
        } else {
            return Err(DirectoryError::MissingRoster {
                sig: sig.name.to_string(),
                file: self.layout.file_name.clone(),
            });
        }

        debug!(
            sig = %sig.name,
            repositories = sig.repositories.len(),
            maintainers = sig.maintainers.len(),
            "Read SIG"
        );
        Ok(sig)
    }

    /// `<org>/<stem>` for every file below `dir/<org>`, sorted per organization.
    fn repositories_in(&self, dir: &Path) -> Result<Vec<RepositoryId>, DirectoryError> {
        let mut repositories = Vec::new();
        for org in &self.organizations {
            let org_dir = dir.join(org);
            if !org_dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&org_dir).sort_by_file_name() {
                let entry = entry.map_err(|source| DirectoryError::Walk {
                    path: org_dir.clone(),
                    source,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let file_name = entry.file_name().to_string_lossy();
                let stem = file_name.strip_suffix(".yaml").unwrap_or(&file_name);
                repositories.extend(RepositoryId::new(format!("{org}/{stem}")));
            }
        }
        Ok(repositories)
    }
}
