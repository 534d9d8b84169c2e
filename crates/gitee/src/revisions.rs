//! Revision snapshots served by the Gitee REST API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use attention::{
    CommitRange, CommitSha, PullRequestRecord, RepoPath, RepositoryId, RevisionError,
    RevisionSnapshotAccessor,
};

use crate::client::GiteeClient;

#[derive(Debug, Deserialize)]
struct ApiFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ApiParent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    #[serde(default)]
    parents: Vec<ApiParent>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: String,
}

/// [`RevisionSnapshotAccessor`] backed by the pull request `files`, `commits`
/// and repository `contents` endpoints.
pub struct ApiRevisions {
    client: GiteeClient,
}

impl ApiRevisions {
    pub fn new(client: GiteeClient) -> Self {
        Self { client }
    }

    fn pull_path(pr: &PullRequestRecord, tail: &str) -> String {
        format!("/repos/{}/pulls/{}/{}", pr.repo, pr.number.as_u64(), tail)
    }
}

fn pull_label(pr: &PullRequestRecord) -> String {
    format!("{}{}", pr.repo, pr.number)
}

/// Decodes a contents payload. Gitee answers `[]` instead of 404 for some
/// missing paths.
fn decode_content(body: Value) -> Result<Option<Vec<u8>>, String> {
    if body.as_array().is_some_and(Vec::is_empty) {
        return Ok(None);
    }
    let content: ApiContent = serde_json::from_value(body).map_err(|e| e.to_string())?;
    match content.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = content.content.split_whitespace().collect();
            STANDARD.decode(compact).map(Some).map_err(|e| e.to_string())
        }
        Some(other) => Err(format!("unsupported content encoding '{other}'")),
    }
}

#[async_trait]
impl RevisionSnapshotAccessor for ApiRevisions {
    async fn changed_paths(&self, pr: &PullRequestRecord) -> Result<Vec<RepoPath>, RevisionError> {
        let files: Vec<ApiFile> = self
            .client
            .get_required(&Self::pull_path(pr, "files"), &[])
            .await
            .map_err(|e| e.into_revision_error(&pull_label(pr)))?;
        Ok(files.into_iter().filter_map(|f| RepoPath::new(f.filename)).collect())
    }

    async fn commit_range(&self, pr: &PullRequestRecord) -> Result<CommitRange, RevisionError> {
        let label = pull_label(pr);
        let commits: Vec<ApiCommit> = self
            .client
            .get_required(&Self::pull_path(pr, "commits"), &[])
            .await
            .map_err(|e| e.into_revision_error(&label))?;
        debug!(pr = %label, commits = commits.len(), "Resolved pull request commits");

        let unresolvable = |reason: &str| RevisionError::Unresolvable {
            pr: label.clone(),
            reason: reason.to_string(),
        };
        let first = commits.first().ok_or_else(|| unresolvable("pull request has no commits"))?;
        let last = commits.last().ok_or_else(|| unresolvable("pull request has no commits"))?;
        let before = first
            .parents
            .first()
            .and_then(|p| CommitSha::new(p.sha.clone()))
            .ok_or_else(|| unresolvable("first commit has no parent"))?;
        let after = CommitSha::new(last.sha.clone()).ok_or_else(|| unresolvable("last commit has no sha"))?;
        Ok(CommitRange { before, after })
    }

    async fn read_file_at(
        &self,
        repo: &RepositoryId,
        commit: &CommitSha,
        path: &RepoPath,
    ) -> Result<Option<Vec<u8>>, RevisionError> {
        let encoded: Vec<_> = path.segments().map(|s| urlencoding::encode(s).into_owned()).collect();
        let url_path = format!("/repos/{}/contents/{}", repo, encoded.join("/"));
        let body: Option<Value> = self
            .client
            .get_json(&url_path, &[("ref", commit.to_string())])
            .await
            .map_err(|e| RevisionError::Backend { message: e.to_string() })?;
        match body {
            None => Ok(None),
            Some(body) => decode_content(body).map_err(|message| RevisionError::Backend {
                message: format!("{path}@{commit}: {message}"),
            }),
        }
    }
}
