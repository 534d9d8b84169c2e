//! Top-level error type for an attention routing run.
//!
//! [`AttentionError`] covers conditions that stop a run before any report is
//! produced. Component-level errors are defined next to the component:
//! [`crate::ports::SourceError`], [`crate::ports::RevisionError`] and
//! [`crate::roster::RosterError`].
//!
//! Soft failures (a pull request whose history cannot be resolved, a roster
//! snapshot that does not parse, an identity with no known address) are never
//! turned into an [`AttentionError`]; they are logged and routing continues.

use thiserror::Error;

use crate::ports::SourceError;
use crate::SigName;

/// Errors that stop a routing run.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// Listing open pull requests failed.
    ///
    /// The run must treat this as "nothing to route", never as "zero pull
    /// requests exist": no partial report is produced.
    #[error("Pull request listing failed: {0}")]
    Source(#[from] SourceError),

    /// The routing scope names a SIG that the directory does not contain.
    #[error("SIG '{sig}' is not present in the directory")]
    UnknownSig {
        /// The SIG named by the scope.
        sig: SigName,
    },

    /// Two directory entries carry the same SIG name.
    #[error("SIG '{sig}' appears more than once in the directory")]
    DuplicateSig {
        /// The repeated name.
        sig: SigName,
    },

    /// The run configuration is invalid.
    ///
    /// Produced at load time; a run never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}
