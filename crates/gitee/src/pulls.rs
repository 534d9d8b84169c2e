//! Open pull request listings.
//!
//! Two sources exist:
//!
//! - [`RepositoryPulls`] lists one repository through the Gitee REST API; used
//!   for the governance repository.
//! - [`PullIndex`] lists every repository of the foundation through the
//!   pull request index service, which mirrors Gitee into one paginated feed.
//!
//! Both page with 100 items per page until a short page arrives. A failed page
//! aborts the whole listing: callers never see partial data.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use attention::{
    BranchName, Label, PullNumber, PullRequestRecord, PullRequestSource, RepositoryId,
    SourceError, Timestamp,
};

use crate::client::GiteeClient;

/// Items requested per page.
pub const PAGE_SIZE: u32 = 100;

/// UTC offset of the governance repository's clock, used for timestamps that
/// carry no offset of their own.
pub const GOVERNANCE_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Parses a platform timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS` on the
/// governance repository's clock.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(Timestamp::from_utc(dt.with_timezone(&Utc)));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(GOVERNANCE_UTC_OFFSET_SECS)?;
    let local = naive.and_local_timezone(offset).single()?;
    Some(Timestamp::from_utc(local.with_timezone(&Utc)))
}

// ---------------------------------------------------------------------------
// Gitee REST API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    title: String,
    html_url: String,
    created_at: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    base: ApiRef,
}

impl ApiPull {
    fn into_record(self, repo: &RepositoryId) -> Result<PullRequestRecord, String> {
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| format!("pull {} has unparseable created_at '{}'", self.number, self.created_at))?;
        let branch = BranchName::new(self.base.name)
            .ok_or_else(|| format!("pull {} has an empty target branch", self.number))?;
        Ok(PullRequestRecord {
            repo: repo.clone(),
            branch,
            number: PullNumber::new(self.number),
            title: self.title,
            url: self.html_url,
            created_at,
            draft: self.draft,
            mergeable: self.mergeable.unwrap_or(false),
            labels: self.labels.into_iter().filter_map(|l| Label::new(l.name)).collect(),
        })
    }
}

/// Open pull requests of one repository, oldest first.
pub struct RepositoryPulls {
    client: GiteeClient,
    repo: RepositoryId,
    page_size: u32,
}

impl RepositoryPulls {
    pub fn new(client: GiteeClient, repo: RepositoryId) -> Self {
        Self {
            client,
            repo,
            page_size: PAGE_SIZE,
        }
    }

    /// Overrides the page size (the service caps it at 100).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl PullRequestSource for RepositoryPulls {
    async fn list_open(&self) -> Result<Vec<PullRequestRecord>, SourceError> {
        let listing = format!("pulls of {}", self.repo);
        let path = format!("/repos/{}/pulls", self.repo);
        let mut pulls = Vec::new();
        let mut page = 1;
        loop {
            info!(repo = %self.repo, page, "Listing open pull requests");
            let query = [
                ("state", "open".to_string()),
                ("sort", "created".to_string()),
                ("direction", "asc".to_string()),
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            let items: Vec<ApiPull> = self
                .client
                .get_required(&path, &query)
                .await
                .map_err(|e| e.into_source_error(&listing, page))?;
            let count = items.len();
            for item in items {
                let record = item.into_record(&self.repo).map_err(|message| SourceError::Decode {
                    listing: listing.clone(),
                    page,
                    message,
                })?;
                pulls.push(record);
            }
            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }
        Ok(pulls)
    }
}

// ---------------------------------------------------------------------------
// Pull request index service
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IndexPage {
    #[serde(default)]
    data: Vec<IndexPull>,
}

#[derive(Debug, Deserialize)]
struct IndexPull {
    link: String,
    title: String,
    created_at: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    mergeable: Option<bool>,
    /// Comma-separated label names.
    #[serde(default)]
    labels: String,
    #[serde(rename = "ref")]
    branch: String,
}

enum IndexEntryError {
    Unplaceable(String),
    Malformed(String),
}

impl IndexPull {
    /// `https://gitee.com/<org>/<repo>/pulls/<n>` → (`<org>/<repo>`, `n`).
    fn locate(link: &str) -> Option<(RepositoryId, PullNumber)> {
        let path = link.splitn(4, '/').nth(3)?;
        let mut segments = path.split('/');
        let org = segments.next()?;
        let name = segments.next()?;
        let _pulls = segments.next()?;
        let number = segments.next()?.parse().ok()?;
        Some((RepositoryId::new(format!("{org}/{name}"))?, PullNumber::new(number)))
    }

    fn into_record(self) -> Result<PullRequestRecord, IndexEntryError> {
        let (repo, number) = Self::locate(&self.link)
            .ok_or_else(|| IndexEntryError::Unplaceable(self.link.clone()))?;
        let created_at = parse_timestamp(&self.created_at).ok_or_else(|| {
            IndexEntryError::Malformed(format!(
                "{} has unparseable created_at '{}'",
                self.link, self.created_at
            ))
        })?;
        let branch = BranchName::new(self.branch).ok_or_else(|| {
            IndexEntryError::Malformed(format!("{} has an empty target branch", self.link))
        })?;
        Ok(PullRequestRecord {
            repo,
            branch,
            number,
            title: self.title,
            url: self.link,
            created_at,
            draft: self.draft,
            mergeable: self.mergeable.unwrap_or(false),
            labels: self
                .labels
                .split(',')
                .filter_map(|l| Label::new(l.trim()))
                .collect(),
        })
    }
}

/// Every open pull request known to the index service, oldest first.
pub struct PullIndex {
    client: GiteeClient,
    page_size: u32,
}

impl PullIndex {
    pub fn new(client: GiteeClient) -> Self {
        Self {
            client,
            page_size: PAGE_SIZE,
        }
    }

    /// Overrides the page size (the service caps it at 100).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl PullRequestSource for PullIndex {
    async fn list_open(&self) -> Result<Vec<PullRequestRecord>, SourceError> {
        let listing = format!("pull index at {}", self.client.base_url());
        let mut pulls = Vec::new();
        let mut page = 1;
        loop {
            info!(page, "Listing enterprise pull requests");
            let query = [
                ("state", "open".to_string()),
                ("direction", "asc".to_string()),
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            let body: IndexPage = self
                .client
                .get_required("/pulls", &query)
                .await
                .map_err(|e| e.into_source_error(&listing, page))?;
            let count = body.data.len();
            for item in body.data {
                match item.into_record() {
                    Ok(record) => pulls.push(record),
                    // The index mirrors other forges too; links it cannot place are skipped.
                    Err(IndexEntryError::Unplaceable(link)) => {
                        warn!(%link, "Skipping index entry with unrecognised link")
                    }
                    Err(IndexEntryError::Malformed(message)) => {
                        return Err(SourceError::Decode {
                            listing: listing.clone(),
                            page,
                            message,
                        })
                    }
                }
            }
            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }
        Ok(pulls)
    }
}
