//! Identity → email address book built from the structured rosters.

use std::collections::BTreeMap;
use std::fs;

use tracing::{debug, info};

use attention::{AddressBook, Identity, MemberEntry, RosterDocument};

use crate::directory::{DirectoryError, SigDirectory};

/// Email addresses of maintainers and committers.
///
/// Rosters are read in SIG order and a later entry for the same identity
/// replaces an earlier one, including with "no address".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailBook {
    addresses: BTreeMap<Identity, String>,
}

impl EmailBook {
    /// Reads every SIG's structured roster under `directory`'s checkout.
    pub fn load(directory: &SigDirectory) -> Result<Self, DirectoryError> {
        let mut latest: BTreeMap<Identity, Option<String>> = BTreeMap::new();
        for sig in directory.sig_names()? {
            let path = directory.roster_path(&sig);
            if !path.is_file() {
                continue;
            }
            debug!(sig = %sig, "Reading email addresses");
            let bytes = fs::read(&path).map_err(|source| DirectoryError::Io {
                path: path.clone(),
                source,
            })?;
            let roster = RosterDocument::parse(&bytes)
                .map_err(|source| DirectoryError::Roster { path, source })?;
            let committers = roster.repositories.iter().flat_map(|r| r.committers.iter());
            for entry in roster.maintainers.iter().chain(committers) {
                if let Some(identity) = entry.identity() {
                    latest.insert(identity, entry.email().map(str::to_string));
                }
            }
        }
        let book = Self::from_entries(latest);
        info!(addresses = book.len(), "Built email address book");
        Ok(book)
    }

    fn from_entries(latest: BTreeMap<Identity, Option<String>>) -> Self {
        Self {
            addresses: latest
                .into_iter()
                .filter_map(|(identity, email)| email.map(|e| (identity, e)))
                .collect(),
        }
    }

    /// Builds a book from explicit entries, dropping empty addresses.
    pub fn from_members<'a>(members: impl IntoIterator<Item = &'a MemberEntry>) -> Self {
        let mut latest = BTreeMap::new();
        for entry in members {
            if let Some(identity) = entry.identity() {
                latest.insert(identity, entry.email().map(str::to_string));
            }
        }
        Self::from_entries(latest)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl AddressBook for EmailBook {
    fn address_of(&self, identity: &Identity) -> Option<&str> {
        self.addresses.get(identity).map(String::as_str)
    }
}
