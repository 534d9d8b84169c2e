//! Pull request comments, read for the review checklist.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use attention::{PullComment, PullCommentSource, PullRequestRecord, SourceError};

use crate::client::GiteeClient;
use crate::pulls::PAGE_SIZE;

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    user: ApiUser,
    #[serde(default)]
    body: Option<String>,
}

/// [`PullCommentSource`] over the pull request `comments` endpoint.
pub struct PullComments {
    client: GiteeClient,
    page_size: u32,
}

impl PullComments {
    pub fn new(client: GiteeClient) -> Self {
        Self {
            client,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl PullCommentSource for PullComments {
    async fn comments(&self, pr: &PullRequestRecord) -> Result<Vec<PullComment>, SourceError> {
        let listing = format!("comments of {}{}", pr.repo, pr.number);
        let path = format!("/repos/{}/pulls/{}/comments", pr.repo, pr.number.as_u64());
        let mut comments = Vec::new();
        let mut page = 1;
        loop {
            let query = [
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            let items: Vec<ApiComment> = self
                .client
                .get_required(&path, &query)
                .await
                .map_err(|e| e.into_source_error(&listing, page))?;
            let count = items.len();
            comments.extend(items.into_iter().map(|c| PullComment {
                author: c.user.login,
                body: c.body.unwrap_or_default(),
            }));
            if count < self.page_size as usize {
                break;
            }
            page += 1;
        }
        debug!(pr = %listing, comments = comments.len(), "Read pull request comments");
        Ok(comments)
    }
}
