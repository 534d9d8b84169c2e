//! Thin HTTP client shared by the Gitee adapters.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use attention::{RevisionError, SourceError};

/// Default base URL of the Gitee REST API.
pub const DEFAULT_API_URL: &str = "https://gitee.com/api/v5";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while talking to Gitee.
#[derive(Debug, Error)]
pub enum GiteeError {
    /// The service answered with a non-success status.
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The request never produced a response.
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body did not have the expected shape.
    #[error("GET {url} returned an unexpected body: {message}")]
    Decode { url: String, message: String },

    /// The HTTP client could not be built.
    #[error("HTTP client could not be created: {0}")]
    Client(#[source] reqwest::Error),
}

impl GiteeError {
    /// Converts into the listing error for `page` of `listing`.
    pub fn into_source_error(self, listing: &str, page: u32) -> SourceError {
        let listing = listing.to_string();
        match self {
            GiteeError::Status { status, .. } => SourceError::Status { listing, page, status },
            GiteeError::Decode { message, .. } => SourceError::Decode { listing, page, message },
            other => SourceError::Transport {
                listing,
                page,
                message: other.to_string(),
            },
        }
    }

    /// Converts into a soft revision lookup failure for `pr`.
    pub fn into_revision_error(self, pr: &str) -> RevisionError {
        match self {
            GiteeError::Status { .. } | GiteeError::Decode { .. } => RevisionError::Unresolvable {
                pr: pr.to_string(),
                reason: self.to_string(),
            },
            other => RevisionError::Backend {
                message: other.to_string(),
            },
        }
    }
}

/// HTTP client bound to one API base URL and access token.
#[derive(Debug, Clone)]
pub struct GiteeClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl GiteeClient {
    /// Creates a client for `base_url` (no trailing slash needed).
    pub fn new(base_url: &str, access_token: Option<String>) -> Result<Self, GiteeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("sig-attention/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GiteeError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GETs `path` (relative to the base URL) and decodes the JSON body.
    ///
    /// Returns `Ok(None)` on HTTP 404.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, GiteeError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(query);
        if let Some(token) = &self.access_token {
            request = request.query(&[("access_token", token)]);
        }
        debug!(url = %url, "GET");

        let response = request.send().await.map_err(|source| GiteeError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GiteeError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|source| GiteeError::Transport {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| GiteeError::Decode {
                url,
                message: e.to_string(),
            })
    }

    /// Like [`GiteeClient::get_json`], but a 404 is an error.
    pub async fn get_required<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GiteeError> {
        self.get_json(path, query).await?.ok_or_else(|| GiteeError::Status {
            url: format!("{}{}", self.base_url, path),
            status: StatusCode::NOT_FOUND.as_u16(),
        })
    }
}
