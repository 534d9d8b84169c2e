//! One routing run: read the directory, list pull requests, route, write
//! reports.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, info_span, Instrument};

use attention::{
    compare_processed_rates, AttentionError, OrderedReport, PullRequestSource, RateComparison,
    RevisionSnapshotAccessor, Router, RunId, Scope, SigName, Timestamp,
};
use community::{EmailBook, LocalRevisions, SigDirectory};
use gitee::{
    ApiRevisions, GiteeClient, PullComments, PullIndex, RepositoryPulls, SigActivityApi,
};

use crate::config::{RevisionBackend, Settings, SourceKind};
use crate::report;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub pulls: usize,
    pub recipients: usize,
    pub rows: usize,
    pub reports: Vec<PathBuf>,
}

fn pull_source(settings: &Settings, api: &GiteeClient) -> anyhow::Result<Box<dyn PullRequestSource>> {
    let source: Box<dyn PullRequestSource> = match settings.source {
        SourceKind::Index => {
            let index = GiteeClient::new(&settings.config.source.index_url, None)?;
            Box::new(PullIndex::new(index))
        }
        SourceKind::Repository => {
            let repo = settings.listed_repository.clone().ok_or_else(|| AttentionError::Configuration {
                message: "a repository source needs a repository".to_string(),
            })?;
            Box::new(RepositoryPulls::new(api.clone(), repo))
        }
    };
    Ok(source)
}

fn revision_backend(settings: &Settings, api: &GiteeClient) -> Box<dyn RevisionSnapshotAccessor> {
    match settings.config.source.revisions {
        RevisionBackend::Api => Box::new(ApiRevisions::new(api.clone())),
        RevisionBackend::Git => Box::new(LocalRevisions::new(&settings.checkout)),
    }
}

/// Processed-rate comparisons for the SIGs that appear in `report`.
///
/// Only all-SIGs runs carry them.
async fn processed_rates(
    settings: &Settings,
    report: &OrderedReport,
    now: Timestamp,
) -> anyhow::Result<BTreeMap<SigName, RateComparison>> {
    let activity = &settings.config.activity;
    if !activity.enabled || settings.scope != Scope::AllSigs {
        return Ok(BTreeMap::new());
    }
    let sigs: BTreeSet<SigName> = report
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|row| row.sig.clone()))
        .collect();
    let sigs: Vec<SigName> = sigs.into_iter().collect();
    let client = GiteeClient::new(&activity.url, None)?;
    let source = SigActivityApi::new(client, activity.community.clone());
    let rates = compare_processed_rates(&source, &sigs, now).await;
    info!(sigs = sigs.len(), compared = rates.len(), "Compared processed rates");
    Ok(rates)
}

/// Executes one run with `settings`.
///
/// A failed pull request listing aborts the run before any report is
/// written.
pub async fn execute(settings: &Settings) -> anyhow::Result<RunSummary> {
    let run_id = RunId::new_random();
    let span = info_span!("run", run_id = %run_id);
    execute_inner(settings, run_id).instrument(span).await
}

async fn execute_inner(settings: &Settings, run_id: RunId) -> anyhow::Result<RunSummary> {
    let config = &settings.config;
    info!(scope = ?settings.scope, source = ?settings.source, "Starting run");

    let sig_directory = SigDirectory::new(&settings.checkout)
        .with_layout(config.roster.clone())
        .with_organizations(config.routing.organizations.clone());
    let directory = sig_directory
        .load()
        .with_context(|| format!("reading SIG directory from {}", settings.checkout.display()))?;
    let emails = EmailBook::load(&sig_directory).context("building the email address book")?;

    let api = GiteeClient::new(&config.source.api_url, settings.access_token.clone())?;
    let source = pull_source(settings, &api)?;
    let pulls = match source.list_open().await {
        Ok(pulls) => pulls,
        Err(e) => {
            error!(error = %e, "Listing open pull requests failed, no reports written");
            return Err(AttentionError::from(e).into());
        }
    };
    info!(pulls = pulls.len(), "Listed open pull requests");

    let revisions = revision_backend(settings, &api);
    let comments = PullComments::new(api.clone());
    let mut router = Router::new(&directory, revisions.as_ref(), &emails)
        .with_labels(config.labels.clone())
        .with_policy(config.routing.clone())
        .with_layout(config.roster.clone());
    if matches!(settings.scope, Scope::Sig { .. }) {
        router = router.with_checklist(&comments, config.checklist.clone());
    }
    let now = Timestamp::now();
    let bucket = router.route(&settings.scope, &pulls, now).await?;

    let report = bucket.into_ordered();
    let rows: usize = report.iter().map(|(_, rows)| rows.len()).sum();
    let rates = processed_rates(settings, &report, now).await?;
    let reports = report::write_reports(&settings.output, &report, &emails, &rates)?;
    info!(recipients = report.len(), rows, "Run finished");

    Ok(RunSummary {
        run_id,
        pulls: pulls.len(),
        recipients: report.len(),
        rows,
        reports,
    })
}
