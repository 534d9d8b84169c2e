//! Attention routing domain for SIG pull request reports.
//!
//! This crate decides, for every open pull request in a foundation's
//! repositories, who has to look at it: it classifies the pull request's
//! status, detects pull requests that add people to a SIG roster, resolves the
//! recipients and orders each recipient's rows for display.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed ([`ports`]); the `gitee` and `community` crates
//! define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Identity`, `SigName`, `RepositoryId`, etc.) |
//! | [`types`] | Value types (`Timestamp`, `DurationDays`) |
//! | [`records`] | SIG, pull request, membership and report records |
//! | [`errors`] | Top-level run error |
//! | [`ports`] | Traits implemented by infrastructure crates |
//! | [`policy`] | Scope, routing policy and roster layout |
//! | [`roster`] | `sig-info.yaml` / `OWNERS` parsing |
//! | [`status`] | Pull request status classification |
//! | [`membership`] | Membership change detection |
//! | [`router`] | Recipient resolution and routing |
//! | [`aggregate`] | Per-recipient row ordering |
//! | [`activity`] | Weekly processed rate per SIG |
//! | [`checklist`] | Reviewers pending on the review checklist |
//! | [`directory`] | In-memory directory snapshot |

pub mod activity;
pub mod aggregate;
pub mod checklist;
pub mod directory;
pub mod errors;
pub mod identifiers;
pub mod membership;
pub mod policy;
pub mod ports;
pub mod records;
pub mod roster;
pub mod router;
pub mod status;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use activity::{
    compare_processed_rates, weekly_anchors, ProcessedRate, RateComparison, StateCounts, Trend,
};
pub use aggregate::order_rows;
pub use checklist::{ChecklistPolicy, PullComment};
pub use directory::Directory;
pub use errors::AttentionError;
pub use identifiers::{
    BranchName, CommitSha, Identity, Label, PullNumber, RepoPath, RepositoryId, RunId, SigName,
};
pub use membership::{MembershipChange, MembershipDetector};
pub use policy::{RosterLayout, RoutingPolicy, Scope};
pub use ports::{
    AddressBook, CommitRange, DirectoryStore, PullCommentSource, PullRequestSource,
    RevisionError, RevisionSnapshotAccessor, SigActivitySource, SourceError,
};
pub use records::{
    MembershipDelta, MembershipSnapshot, OrderedReport, PullRequestRecord, RecipientBucket,
    ReportRow, SigRecord,
};
pub use roster::{
    account_handle, parse_owners, parse_roster, MemberEntry, RepositoryEntry, RosterDocument, RosterError,
};
pub use router::Router;
pub use status::{classify, LabelPolicy, Status, StatusFlag};
pub use types::{DurationDays, Timestamp};
