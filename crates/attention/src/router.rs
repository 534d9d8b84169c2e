//! Recipient resolution and routing.
//!
//! For every pull request relevant to a SIG the router classifies its status,
//! decides who must look at it and appends one report row per recipient.
//!
//! Recipients come from one of two rules:
//!
//! - **Membership change.** When a pull request against the governance
//!   repository adds people to any roster, the monitored SIG's maintainers,
//!   the maintainers of every changed SIG and every added identity are
//!   notified.
//! - **Static.** Otherwise the committers the SIG maps to the pull request's
//!   repository are notified, or the SIG's maintainers when no mapping exists
//!   for that repository.
//!
//! On governance pull requests, reviewers still pending on the review
//! checklist are notified as well when a comment source is attached.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, info_span, warn, Instrument};

use crate::checklist::ChecklistPolicy;
use crate::membership::{MembershipChange, MembershipDetector};
use crate::ports::{AddressBook, DirectoryStore, PullCommentSource, RevisionSnapshotAccessor};
use crate::status::{classify, LabelPolicy};
use crate::{
    AttentionError, DurationDays, Identity, PullNumber, PullRequestRecord, RecipientBucket,
    ReportRow, RepositoryId, RosterLayout, RoutingPolicy, Scope, SigRecord, Timestamp,
};

/// Everything the router consults besides the pull requests themselves.
pub struct Router<'a> {
    directory: &'a dyn DirectoryStore,
    revisions: &'a dyn RevisionSnapshotAccessor,
    addresses: &'a dyn AddressBook,
    comments: Option<&'a dyn PullCommentSource>,
    labels: LabelPolicy,
    policy: RoutingPolicy,
    layout: RosterLayout,
    checklist: ChecklistPolicy,
}

impl<'a> Router<'a> {
    pub fn new(
        directory: &'a dyn DirectoryStore,
        revisions: &'a dyn RevisionSnapshotAccessor,
        addresses: &'a dyn AddressBook,
    ) -> Self {
        Self {
            directory,
            revisions,
            addresses,
            comments: None,
            labels: LabelPolicy::default(),
            policy: RoutingPolicy::default(),
            layout: RosterLayout::default(),
            checklist: ChecklistPolicy::default(),
        }
    }

    /// Also notifies reviewers pending on the review checklist of governance
    /// pull requests.
    pub fn with_checklist(mut self, comments: &'a dyn PullCommentSource, checklist: ChecklistPolicy) -> Self {
        self.comments = Some(comments);
        self.checklist = checklist;
        self
    }

    pub fn with_labels(mut self, labels: LabelPolicy) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_policy(mut self, policy: RoutingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_layout(mut self, layout: RosterLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Routes `pulls` within `scope`, measuring open durations against `now`.
    ///
    /// Pull requests are processed one at a time, in listing order.
    pub async fn route(
        &self,
        scope: &Scope,
        pulls: &[PullRequestRecord],
        now: Timestamp,
    ) -> Result<RecipientBucket, AttentionError> {
        let by_repo = index_by_repo(pulls);
        let mut run = RoutingRun::default();

        match scope {
            Scope::AllSigs => {
                for sig in self.directory.list_sigs() {
                    if sig.repositories.is_empty() {
                        info!(sig = %sig.name, "No repositories in SIG, skipping");
                        continue;
                    }
                    let span = info_span!("sig", sig = %sig.name);
                    self.route_sig(sig, &sig.repositories, true, &by_repo, now, &mut run)
                        .instrument(span)
                        .await;
                }
            }
            Scope::Sig { sig, repository } => {
                let record = self
                    .directory
                    .sig(sig)
                    .ok_or_else(|| AttentionError::UnknownSig { sig: sig.clone() })?;
                let span = info_span!("sig", sig = %record.name);
                // The monitored repository is routed whatever its organisation.
                self.route_sig(record, std::slice::from_ref(repository), false, &by_repo, now, &mut run)
                    .instrument(span)
                    .await;
            }
        }

        info!(
            rows = run.rows,
            recipients = run.bucket.recipients().count(),
            unreachable = run.unknown.len(),
            "Routing finished"
        );
        Ok(run.bucket)
    }

    async fn route_sig(
        &self,
        sig: &SigRecord,
        repositories: &[RepositoryId],
        filter_orgs: bool,
        by_repo: &BTreeMap<&RepositoryId, Vec<&PullRequestRecord>>,
        now: Timestamp,
        run: &mut RoutingRun,
    ) {
        for repo in repositories {
            if filter_orgs && !self.policy.covers(repo) {
                continue;
            }
            let Some(pulls) = by_repo.get(repo) else {
                continue;
            };
            for pr in pulls {
                info!(repo = %repo, pr = %pr.number, "Found open pull request");
                self.route_pull(sig, pr, now, run).await;
            }
        }
    }

    async fn route_pull(
        &self,
        sig: &SigRecord,
        pr: &PullRequestRecord,
        now: Timestamp,
        run: &mut RoutingRun,
    ) {
        if self.policy.skip_unready && (pr.draft || !pr.mergeable) {
            debug!(pr = %pr.number, draft = pr.draft, mergeable = pr.mergeable, "Skipping unready pull request");
            return;
        }

        let status = classify(pr, &self.labels);
        let duration = DurationDays::between(pr.created_at, now);
        let recipients = self.recipients_for(sig, pr).await;
        if recipients.is_empty() {
            warn!(repo = %pr.repo, pr = %pr.number, "No one to notify about pull request");
            return;
        }

        let row = ReportRow::new(sig.name.clone(), pr, status, duration);
        for recipient in recipients {
            if self.addresses.address_of(&recipient).is_none() && run.unknown.insert(recipient.clone()) {
                warn!(identity = %recipient, "Identity does not match any email address");
            }
            run.bucket.push(recipient, row.clone());
            run.rows += 1;
        }
    }

    /// The identities to notify about `pr` under `sig`.
    pub async fn recipients_for(&self, sig: &SigRecord, pr: &PullRequestRecord) -> BTreeSet<Identity> {
        let mut recipients = self.roster_recipients(sig, pr).await;
        if self.policy.is_governance(&pr.repo) {
            recipients.extend(self.checklist_reviewers(pr).await);
        }
        recipients
    }

    async fn checklist_reviewers(&self, pr: &PullRequestRecord) -> Vec<Identity> {
        let Some(source) = self.comments.filter(|_| self.checklist.enabled) else {
            return Vec::new();
        };
        match source.comments(pr).await {
            Ok(comments) => {
                let reviewers = self.checklist.pending_reviewers(&comments);
                if !reviewers.is_empty() {
                    info!(pr = %pr.number, reviewers = ?reviewers, "Review checklist awaits reviewers");
                }
                reviewers
            }
            Err(e) => {
                warn!(pr = %pr.number, error = %e, "Could not read pull request comments");
                Vec::new()
            }
        }
    }

    async fn roster_recipients(&self, sig: &SigRecord, pr: &PullRequestRecord) -> BTreeSet<Identity> {
        if self.policy.is_governance(&pr.repo) {
            let exclude = if self.policy.exclude_target_members {
                sig.members()
            } else {
                BTreeSet::new()
            };
            let detector = MembershipDetector::new(self.revisions, &self.layout);
            if let MembershipChange::Added(deltas) = detector.detect(pr, &exclude).await {
                let mut recipients = sig.maintainers.clone();
                for delta in deltas {
                    info!(pr = %pr.number, changed = %delta.sig, added = ?delta.new_members, "Pull request changes SIG membership");
                    match self.directory.sig(&delta.sig) {
                        Some(changed) => recipients.extend(changed.maintainers.iter().cloned()),
                        None => debug!(changed = %delta.sig, "Changed SIG is not in the directory yet"),
                    }
                    recipients.extend(delta.new_members);
                }
                return recipients;
            }
        }

        match sig.committers_of(&pr.repo) {
            Some(committers) => committers.clone(),
            None => sig.maintainers.clone(),
        }
    }
}

#[derive(Default)]
struct RoutingRun {
    bucket: RecipientBucket,
    unknown: BTreeSet<Identity>,
    rows: usize,
}

/// Groups pull requests by repository, keeping listing order and dropping
/// repeated `(repo, number)` pairs.
fn index_by_repo(pulls: &[PullRequestRecord]) -> BTreeMap<&RepositoryId, Vec<&PullRequestRecord>> {
    let mut seen: BTreeSet<(&RepositoryId, PullNumber)> = BTreeSet::new();
    let mut by_repo: BTreeMap<&RepositoryId, Vec<&PullRequestRecord>> = BTreeMap::new();
    for pr in pulls {
        if !seen.insert((&pr.repo, pr.number)) {
            warn!(repo = %pr.repo, pr = %pr.number, "Pull request listed twice, ignoring repeat");
            continue;
        }
        by_repo.entry(&pr.repo).or_default().push(pr);
    }
    by_repo
}
