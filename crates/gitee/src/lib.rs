//! Gitee infrastructure adapter.
//!
//! Implements the pull-request-facing ports defined in the [`attention`] crate
//! over HTTP:
//!
//! - [`RepositoryPulls`] and [`PullIndex`] implement
//!   [`attention::PullRequestSource`].
//! - [`ApiRevisions`] implements [`attention::RevisionSnapshotAccessor`].
//! - [`PullComments`] implements [`attention::PullCommentSource`].
//! - [`SigActivityApi`] implements [`attention::SigActivitySource`] over the
//!   community data service rather than Gitee itself.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain routing rules. Pagination,
//! authentication and payload decoding are handled here; the [`attention`]
//! crate never sees them. Nothing here retries a request.

pub mod activity;
pub mod client;
pub mod comments;
pub mod pulls;
pub mod revisions;

pub use activity::{SigActivityApi, DEFAULT_ACTIVITY_URL};
pub use client::{GiteeClient, GiteeError, DEFAULT_API_URL};
pub use comments::PullComments;
pub use pulls::{parse_timestamp, PullIndex, RepositoryPulls, PAGE_SIZE};
pub use revisions::ApiRevisions;
