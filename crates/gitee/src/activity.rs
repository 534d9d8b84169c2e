//! Weekly SIG pull request statistics from the community data service.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use attention::{SigActivitySource, SigName, SourceError, StateCounts, Timestamp};

use crate::client::GiteeClient;

/// Default base URL of the community data service.
pub const DEFAULT_ACTIVITY_URL: &str = "https://dsapi.osinfra.cn";

#[derive(Debug, Deserialize)]
struct StateResponse {
    #[serde(default)]
    data: Value,
}

/// [`SigActivitySource`] over the service's `query/sig/pr/state` endpoint.
pub struct SigActivityApi {
    client: GiteeClient,
    community: String,
}

impl SigActivityApi {
    pub fn new(client: GiteeClient, community: impl Into<String>) -> Self {
        Self {
            client,
            community: community.into(),
        }
    }
}

/// `null`, `{}` and `[]` mean the service recorded nothing.
fn decode_counts(data: Value) -> Result<Option<StateCounts>, String> {
    let empty = match &data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(None);
    }
    serde_json::from_value(data).map(Some).map_err(|e| e.to_string())
}

#[async_trait]
impl SigActivitySource for SigActivityApi {
    async fn state_counts(&self, sig: &SigName, at: Timestamp) -> Result<Option<StateCounts>, SourceError> {
        let listing = format!("activity of {sig}");
        let query = [
            ("community", self.community.clone()),
            ("timestamp", at.as_datetime().timestamp_millis().to_string()),
            ("sig", sig.to_string()),
        ];
        let response: Option<StateResponse> = self
            .client
            .get_json("/query/sig/pr/state", &query)
            .await
            .map_err(|e| e.into_source_error(&listing, 1))?;
        match response {
            None => Ok(None),
            Some(response) => decode_counts(response.data).map_err(|message| SourceError::Decode {
                listing,
                page: 1,
                message,
            }),
        }
    }
}
