//! In-memory directory snapshot.

use std::collections::BTreeMap;

use crate::ports::DirectoryStore;
use crate::{AttentionError, SigName, SigRecord};

/// The SIG directory as read at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    sigs: Vec<SigRecord>,
    index: BTreeMap<SigName, usize>,
}

impl Directory {
    /// Builds a directory, rejecting duplicate SIG names.
    pub fn new(sigs: Vec<SigRecord>) -> Result<Self, AttentionError> {
        let mut index = BTreeMap::new();
        for (i, sig) in sigs.iter().enumerate() {
            if index.insert(sig.name.clone(), i).is_some() {
                return Err(AttentionError::DuplicateSig {
                    sig: sig.name.clone(),
                });
            }
        }
        Ok(Self { sigs, index })
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

impl DirectoryStore for Directory {
    fn list_sigs(&self) -> &[SigRecord] {
        &self.sigs
    }

    fn sig(&self, sig: &SigName) -> Option<&SigRecord> {
        self.index.get(sig).map(|&i| &self.sigs[i])
    }
}
