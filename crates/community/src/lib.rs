//! Governance repository adapters.
//!
//! Reads a local checkout of the governance repository:
//!
//! - [`SigDirectory`] loads the SIG directory ([`attention::Directory`]).
//! - [`EmailBook`] implements [`attention::AddressBook`].
//! - [`LocalRevisions`] implements [`attention::RevisionSnapshotAccessor`]
//!   with `git2`, as an alternative to the Gitee API backend.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Filesystem and version-control mechanics stay here;
//! roster semantics come from [`attention::roster`].

pub mod directory;
pub mod emails;
pub mod git;

pub use directory::{DirectoryError, SigDirectory, OWNERS_FILE, SKIPPED_ENTRIES};
pub use emails::EmailBook;
pub use git::{LocalRevisions, DEFAULT_REMOTE};
