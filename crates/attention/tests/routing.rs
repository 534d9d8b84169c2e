//! End-to-end routing tests over in-memory collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use attention::{
    BranchName, ChecklistPolicy, CommitRange, CommitSha, Directory, Identity, Label, PullComment,
    PullCommentSource, PullNumber, PullRequestRecord, RepoPath, RepositoryId, RevisionError,
    RevisionSnapshotAccessor, Router, RoutingPolicy, Scope, SigName, SigRecord, SourceError,
    Timestamp,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const COMMUNITY: &str = "openeuler/community";

fn id(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

fn ids(list: &[&str]) -> BTreeSet<Identity> {
    list.iter().map(|s| id(s)).collect()
}

fn repo(s: &str) -> RepositoryId {
    RepositoryId::new(s).unwrap()
}

fn now() -> Timestamp {
    Timestamp::from_utc(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
}

fn pull(repo_name: &str, number: u64, age_days: i64) -> PullRequestRecord {
    PullRequestRecord {
        repo: repo(repo_name),
        branch: BranchName::new("master").unwrap(),
        number: PullNumber::new(number),
        title: format!("change {number}"),
        url: format!("https://gitee.com/{repo_name}/pulls/{number}"),
        created_at: Timestamp::from_utc(now().as_datetime() - Duration::days(age_days)),
        draft: false,
        mergeable: true,
        labels: [Label::new("openeuler-cla/yes").unwrap()].into_iter().collect(),
    }
}

fn sig(name: &str, repos: &[&str], maintainers: &[&str]) -> SigRecord {
    let mut record = SigRecord::new(SigName::new(name).unwrap());
    record.repositories = repos.iter().map(|r| repo(r)).collect();
    record.maintainers = ids(maintainers);
    record
}

fn directory() -> Directory {
    let mut compiler = sig("Compiler", &["openeuler/gcc", "src-openeuler/gcc"], &["gina"]);
    compiler
        .committers_by_repo
        .insert(repo("src-openeuler/gcc"), ids(&["carl"]));
    Directory::new(vec![
        sig("TC", &[COMMUNITY], &["tina", "tom"]),
        compiler,
        sig("Kernel", &["openeuler/kernel", "mindspore/kernel"], &["kim"]),
        sig("Empty", &[], &["eve"]),
    ])
    .unwrap()
}

#[derive(Default)]
struct FakeRevisions {
    changed: BTreeMap<u64, Vec<&'static str>>,
    ranges: BTreeMap<u64, (&'static str, &'static str)>,
    files: BTreeMap<(&'static str, &'static str), &'static str>,
    range_calls: AtomicUsize,
}

#[async_trait]
impl RevisionSnapshotAccessor for FakeRevisions {
    async fn changed_paths(&self, pr: &PullRequestRecord) -> Result<Vec<RepoPath>, RevisionError> {
        Ok(self
            .changed
            .get(&pr.number.as_u64())
            .map(|paths| paths.iter().map(|p| RepoPath::new(*p).unwrap()).collect())
            .unwrap_or_default())
    }

    async fn commit_range(&self, pr: &PullRequestRecord) -> Result<CommitRange, RevisionError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        match self.ranges.get(&pr.number.as_u64()) {
            Some((before, after)) => Ok(CommitRange {
                before: CommitSha::new(*before).unwrap(),
                after: CommitSha::new(*after).unwrap(),
            }),
            None => Err(RevisionError::Unresolvable {
                pr: pr.number.to_string(),
                reason: "commit count lookup failed".to_string(),
            }),
        }
    }

    async fn read_file_at(
        &self,
        _repo: &RepositoryId,
        commit: &CommitSha,
        path: &RepoPath,
    ) -> Result<Option<Vec<u8>>, RevisionError> {
        Ok(self
            .files
            .iter()
            .find(|((c, p), _)| *c == commit.as_str() && *p == path.as_str())
            .map(|(_, body)| body.as_bytes().to_vec()))
    }
}

fn addresses() -> BTreeMap<Identity, String> {
    ["tina", "tom", "gina", "carl", "kim"]
        .iter()
        .map(|n| (id(n), format!("{n}@example.com")))
        .collect()
}

fn tc_scope() -> Scope {
    Scope::Sig {
        sig: SigName::new("TC").unwrap(),
        repository: repo(COMMUNITY),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn draft_without_cla_reports_status_and_duration() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let mut pr = pull("openeuler/kernel", 7, 10);
    pr.draft = true;
    pr.labels.clear();

    let bucket = router.route(&Scope::AllSigs, &[pr], now()).await.unwrap();
    let rows = bucket.rows_for(&id("kim"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status.to_string(), "Draft、CLA failed");
    assert_eq!(rows[0].duration_days.to_string(), "10");
    assert_eq!(rows[0].sig.as_str(), "Kernel");
}

#[tokio::test]
async fn new_maintainer_is_notified_with_both_sigs_maintainers() {
    let directory = directory();
    let revisions = FakeRevisions {
        changed: [(1, vec!["sig/Compiler/sig-info.yaml", "README.md"])].into(),
        ranges: [(1, ("aaa", "bbb"))].into(),
        files: [
            (("aaa", "sig/Compiler/sig-info.yaml"), "maintainers:\n  - gitee_id: A\n  - gitee_id: B\n"),
            (("bbb", "sig/Compiler/sig-info.yaml"), "maintainers:\n  - gitee_id: A\n  - gitee_id: B\n  - gitee_id: C\n"),
        ]
        .into(),
        ..FakeRevisions::default()
    };
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 1, 3)], now())
        .await
        .unwrap();

    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["C", "gina", "tina", "tom"]));
    assert_eq!(bucket.rows_for(&id("C"))[0].sig.as_str(), "TC");
}

#[tokio::test]
async fn roster_untouched_skips_commit_resolution() {
    let directory = directory();
    let revisions = FakeRevisions {
        changed: [(2, vec!["sig/Compiler/openeuler/gcc.yaml", "sig/sig-info.yaml"])].into(),
        ..FakeRevisions::default()
    };
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 2, 1)], now())
        .await
        .unwrap();

    assert_eq!(revisions.range_calls.load(Ordering::SeqCst), 0);
    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["tina", "tom"]));
}

#[tokio::test]
async fn unresolvable_commits_fall_back_to_static_routing() {
    let directory = directory();
    let revisions = FakeRevisions {
        changed: [(3, vec!["sig/Compiler/sig-info.yaml"])].into(),
        ..FakeRevisions::default()
    };
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 3, 1)], now())
        .await
        .unwrap();

    assert_eq!(revisions.range_calls.load(Ordering::SeqCst), 1);
    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["tina", "tom"]));
}

#[tokio::test]
async fn malformed_roster_skips_only_that_file() {
    let directory = directory();
    let revisions = FakeRevisions {
        changed: [(4, vec!["sig/Compiler/sig-info.yaml", "sig/NewSig/sig-info.yaml"])].into(),
        ranges: [(4, ("aaa", "bbb"))].into(),
        files: [
            (("aaa", "sig/Compiler/sig-info.yaml"), "maintainers:\n  - gitee_id: A\n"),
            (("bbb", "sig/Compiler/sig-info.yaml"), "maintainers: [gitee_id: {"),
            // NewSig has no roster before the change.
            (("bbb", "sig/NewSig/sig-info.yaml"), "maintainers:\n  - gitee_id: nora\nrepositories:\n  - repo: openeuler/new\n    committers:\n      - gitee_id: ned\n"),
        ]
        .into(),
        ..FakeRevisions::default()
    };
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 4, 1)], now())
        .await
        .unwrap();

    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["ned", "nora", "tina", "tom"]));
}

#[tokio::test]
async fn target_members_are_excluded_only_when_configured() {
    let directory = directory();
    let revisions = FakeRevisions {
        changed: [(5, vec!["sig/Compiler/sig-info.yaml"])].into(),
        ranges: [(5, ("aaa", "bbb"))].into(),
        files: [
            (("bbb", "sig/Compiler/sig-info.yaml"), "maintainers:\n  - gitee_id: tom\n"),
        ]
        .into(),
        ..FakeRevisions::default()
    };
    let addresses = addresses();

    // tom already maintains TC: with the filter on, there is no delta at all.
    let router = Router::new(&directory, &revisions, &addresses);
    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 5, 1)], now())
        .await
        .unwrap();
    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["tina", "tom"]));

    // With the filter off, tom is a delta, which pulls in Compiler's maintainer.
    let policy = RoutingPolicy {
        exclude_target_members: false,
        ..RoutingPolicy::default()
    };
    let router = Router::new(&directory, &revisions, &addresses).with_policy(policy);
    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 5, 1)], now())
        .await
        .unwrap();
    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["gina", "tina", "tom"]));
}

#[tokio::test]
async fn identity_added_to_two_rosters_is_reported_once() {
    let revisions = FakeRevisions {
        changed: [(6, vec!["sig/Compiler/sig-info.yaml", "sig/Kernel/sig-info.yaml"])].into(),
        ranges: [(6, ("aaa", "bbb"))].into(),
        files: [
            (("bbb", "sig/Compiler/sig-info.yaml"), "maintainers:\n  - gitee_id: zoe\n"),
            (("bbb", "sig/Kernel/sig-info.yaml"), "maintainers:\n  - gitee_id: zoe\n  - gitee_id: yan\n"),
        ]
        .into(),
        ..FakeRevisions::default()
    };
    let detector_layout = attention::RosterLayout::default();
    let detector = attention::MembershipDetector::new(&revisions, &detector_layout);
    let change = detector.detect(&pull(COMMUNITY, 6, 1), &BTreeSet::new()).await;

    let deltas = change.deltas();
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].sig.as_str(), "Compiler");
    assert_eq!(deltas[0].new_members, vec![id("zoe")]);
    assert_eq!(deltas[1].sig.as_str(), "Kernel");
    assert_eq!(deltas[1].new_members, vec![id("yan")]);
}

#[tokio::test]
async fn committers_override_maintainers_per_repository() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(
            &Scope::AllSigs,
            &[pull("src-openeuler/gcc", 1, 2), pull("openeuler/gcc", 2, 2)],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(bucket.rows_for(&id("carl")).len(), 1);
    assert_eq!(bucket.rows_for(&id("carl"))[0].repo, repo("src-openeuler/gcc"));
    assert_eq!(bucket.rows_for(&id("gina")).len(), 1);
    assert_eq!(bucket.rows_for(&id("gina"))[0].repo, repo("openeuler/gcc"));
}

#[tokio::test]
async fn uncovered_organizations_and_repeats_are_not_routed() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(
            &Scope::AllSigs,
            &[
                pull("mindspore/kernel", 1, 2),
                pull("openeuler/kernel", 2, 2),
                pull("openeuler/kernel", 2, 2),
            ],
            now(),
        )
        .await
        .unwrap();

    assert_eq!(bucket.rows_for(&id("kim")).len(), 1);
}

#[tokio::test]
async fn unknown_identities_still_receive_rows() {
    let directory = Directory::new(vec![sig("Docs", &["openeuler/docs"], &["nomail"])]).unwrap();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(&Scope::AllSigs, &[pull("openeuler/docs", 1, 0)], now())
        .await
        .unwrap();

    assert_eq!(bucket.rows_for(&id("nomail")).len(), 1);
}

#[tokio::test]
async fn unready_pulls_are_skipped_when_configured() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let policy = RoutingPolicy {
        skip_unready: true,
        ..RoutingPolicy::default()
    };
    let router = Router::new(&directory, &revisions, &addresses).with_policy(policy);

    let mut draft = pull("openeuler/kernel", 1, 2);
    draft.draft = true;
    let mut conflicted = pull("openeuler/kernel", 2, 2);
    conflicted.mergeable = false;
    let ready = pull("openeuler/kernel", 3, 2);

    let bucket = router
        .route(&Scope::AllSigs, &[draft, conflicted, ready], now())
        .await
        .unwrap();

    let rows = bucket.rows_for(&id("kim"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].number, PullNumber::new(3));
}

#[tokio::test]
async fn same_sig_rows_are_ordered_longest_first() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let bucket = router
        .route(
            &Scope::AllSigs,
            &[pull("openeuler/kernel", 1, 5), pull("openeuler/kernel", 2, 40)],
            now(),
        )
        .await
        .unwrap();
    let report = bucket.into_ordered();

    let durations: Vec<u64> = report
        .rows_for(&id("kim"))
        .iter()
        .map(|r| r.duration_days.as_u64())
        .collect();
    assert_eq!(durations, vec![40, 5]);
}

#[tokio::test]
async fn unknown_monitored_sig_is_an_error() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let router = Router::new(&directory, &revisions, &addresses);

    let scope = Scope::Sig {
        sig: SigName::new("Ghost").unwrap(),
        repository: repo(COMMUNITY),
    };
    let err = router.route(&scope, &[], now()).await.unwrap_err();
    assert!(matches!(err, attention::AttentionError::UnknownSig { .. }));
}

struct FakeComments {
    body: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl PullCommentSource for FakeComments {
    async fn comments(&self, pr: &PullRequestRecord) -> Result<Vec<PullComment>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.body {
            Some(body) => Ok(vec![PullComment {
                author: "openeuler-ci-bot".to_string(),
                body: body.to_string(),
            }]),
            None => Err(SourceError::Status {
                listing: format!("comments of {}", pr.number),
                page: 1,
                status: 502,
            }),
        }
    }
}

const CHECKLIST: &str = "The following table is the PR review checklist generated by the review_tool of openEuler-Advisor
|1|sig-info|new maintainer|@rita @tina|[&#x1F534;]|
|2|owners|format|@sam|[&#x2714;]|
";

#[tokio::test]
async fn pending_checklist_reviewers_join_governance_recipients() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let comments = FakeComments {
        body: Some(CHECKLIST),
        calls: AtomicUsize::new(0),
    };
    let router = Router::new(&directory, &revisions, &addresses)
        .with_checklist(&comments, ChecklistPolicy::default());

    let bucket = router
        .route(
            &Scope::AllSigs,
            &[pull(COMMUNITY, 9, 2), pull("openeuler/kernel", 10, 2)],
            now(),
        )
        .await
        .unwrap();

    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["kim", "rita", "tina", "tom"]));
    assert_eq!(bucket.rows_for(&id("rita"))[0].sig.as_str(), "TC");
    // Only the governance pull request is checked.
    assert_eq!(comments.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreadable_comments_fall_back_to_roster_recipients() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let comments = FakeComments {
        body: None,
        calls: AtomicUsize::new(0),
    };
    let router = Router::new(&directory, &revisions, &addresses)
        .with_checklist(&comments, ChecklistPolicy::default());

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 9, 2)], now())
        .await
        .unwrap();

    let recipients: BTreeSet<_> = bucket.recipients().cloned().collect();
    assert_eq!(recipients, ids(&["tina", "tom"]));
}

#[tokio::test]
async fn disabled_checklist_is_not_read() {
    let directory = directory();
    let revisions = FakeRevisions::default();
    let addresses = addresses();
    let comments = FakeComments {
        body: Some(CHECKLIST),
        calls: AtomicUsize::new(0),
    };
    let policy = ChecklistPolicy {
        enabled: false,
        ..ChecklistPolicy::default()
    };
    let router = Router::new(&directory, &revisions, &addresses).with_checklist(&comments, policy);

    let bucket = router
        .route(&tc_scope(), &[pull(COMMUNITY, 9, 2)], now())
        .await
        .unwrap();

    assert_eq!(comments.calls.load(Ordering::SeqCst), 0);
    assert!(bucket.rows_for(&id("rita")).is_empty());
}
