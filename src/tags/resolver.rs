//! Floodlight ID lookup against the campaign-management API
//!
//! Records only carry the activity and group tag strings a ping sends. The
//! numeric floodlight activity ID is fetched afterwards from the advertiser's
//! activity list and written back onto the record.

use crate::ResolveError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Default base URL of the campaign-management API
pub const DEFAULT_API_BASE: &str = "https://dfareporting.googleapis.com/dfareporting/v4/";

/// One floodlight ID lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodlightQuery {
    /// Floodlight configuration (advertiser) ID
    pub advertiser: String,

    /// Activity tag string (`cat`)
    pub activity: Option<String>,

    /// Activity group tag string (`type`)
    pub group: Option<String>,

    /// User profile the lookup runs under
    pub profile_id: String,
}

/// Resolves floodlight activity IDs
#[async_trait]
pub trait FloodlightIdResolver: Send + Sync {
    /// Returns the activity ID, or `None` if no activity matches the query
    async fn resolve(&self, query: &FloodlightQuery) -> Result<Option<String>, ResolveError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActivityId {
    Text(String),
    Number(u64),
}

impl ActivityId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FloodlightActivity {
    id: ActivityId,

    #[serde(default)]
    tag_string: Option<String>,

    #[serde(default)]
    floodlight_activity_group_tag_string: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityList {
    #[serde(default)]
    floodlight_activities: Vec<FloodlightActivity>,
}

/// Picks the activity whose tag strings match the query
fn find_activity(list: ActivityList, query: &FloodlightQuery) -> Option<String> {
    list.floodlight_activities
        .into_iter()
        .find(|a| {
            a.tag_string == query.activity
                && a.floodlight_activity_group_tag_string == query.group
        })
        .map(|a| a.id.into_string())
}

/// [`FloodlightIdResolver`] backed by the HTTP API
pub struct HttpFloodlightResolver {
    client: Client,
    api_base: Url,
    access_token: Option<String>,
}

impl HttpFloodlightResolver {
    /// Creates a resolver; `api_base` must end in `/` to be joined onto
    pub fn new(client: Client, api_base: Url, access_token: Option<String>) -> Self {
        Self {
            client,
            api_base,
            access_token,
        }
    }

    fn endpoint(&self, query: &FloodlightQuery) -> Result<Url, ResolveError> {
        let mut url = self.api_base.join(&format!(
            "userprofiles/{}/floodlightActivities",
            query.profile_id
        ))?;
        url.query_pairs_mut()
            .append_pair("floodlightConfigurationId", &query.advertiser);
        Ok(url)
    }
}

#[async_trait]
impl FloodlightIdResolver for HttpFloodlightResolver {
    async fn resolve(&self, query: &FloodlightQuery) -> Result<Option<String>, ResolveError> {
        let url = self.endpoint(query)?;
        tracing::debug!("Looking up floodlight ID at {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let list: ActivityList = serde_json::from_str(&body)?;
        Ok(find_activity(list, query))
    }
}
