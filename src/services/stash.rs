//! Stash GraphQL client
//!
//! Every call is a single POST of `{"query", "variables"}` to the GraphQL endpoint.
//! Failures of any kind are logged through the job's [ProgressLog] and surface to
//! callers as `None`; there are no retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use super::logging::ProgressLog;

const FIND_TAGS_WITH_MARKERS: &str = r#"
query findTags {
    findTags(
        tag_filter: { marker_count: { modifier: GREATER_THAN, value: 0 } },
        filter: { per_page: -1 }
    ) {
        tags {
            id
            name
            image_path
            scene_marker_count
        }
    }
}
"#;

const FIND_MARKERS_FOR_TAG: &str = r#"
query findSceneMarkersForTag($tag_id: ID!) {
    findSceneMarkers(
        filter: { per_page: -1 },
        scene_marker_filter: { tags: { value: [$tag_id], modifier: INCLUDES } }
    ) {
        scene_markers {
            id
            stream
            title
            primary_tag { id }
        }
    }
}
"#;

const TAG_UPDATE: &str = r#"
mutation tagUpdate($id: ID!, $image: String!) {
    tagUpdate(input: { id: $id, image: $image }) {
        id
    }
}
"#;

/// Failure of a single GraphQL round trip.
#[derive(Debug, Error)]
pub enum GraphqlError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{} GraphQL error(s): {}", .0.len(), .0.join("; "))]
    Graphql(Vec<String>),

    #[error("response contained no data")]
    MissingData,
}

/// Body of a GraphQL POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    /// `null` when the operation takes no variables
    pub variables: Value,
}

impl GraphqlRequest {
    pub fn new(query: &str, variables: Option<Value>) -> Self {
        Self {
            query: query.to_string(),
            variables: variables.unwrap_or(Value::Null),
        }
    }
}

/// Envelope returned by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlErrorMessage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlErrorMessage {
    pub message: Option<String>,
}

/// One HTTP hop to the GraphQL endpoint.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn post(&self, request: &GraphqlRequest) -> Result<GraphqlResponse, GraphqlError>;
}

/// [GraphqlTransport] over reqwest.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn post(&self, request: &GraphqlRequest) -> Result<GraphqlResponse, GraphqlError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GraphqlError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Tag as returned by `findTags`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub image_path: Option<String>,
    #[serde(default)]
    pub scene_marker_count: u32,
}

/// Scene marker as returned by `findSceneMarkers`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneMarker {
    pub id: String,
    /// Preview stream URL; absent when the server has none
    pub stream: Option<String>,
    #[serde(default)]
    pub title: String,
    pub primary_tag: Option<TagRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagRef {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
struct FindTagsData {
    #[serde(rename = "findTags")]
    find_tags: Option<TagPage>,
}

#[derive(Debug, Default, Deserialize)]
struct TagPage {
    tags: Option<Vec<Tag>>,
}

#[derive(Debug, Default, Deserialize)]
struct FindSceneMarkersData {
    #[serde(rename = "findSceneMarkers")]
    find_scene_markers: Option<SceneMarkerPage>,
}

#[derive(Debug, Default, Deserialize)]
struct SceneMarkerPage {
    scene_markers: Option<Vec<SceneMarker>>,
}

/// Stash GraphQL API client
#[derive(Clone)]
pub struct StashClient {
    transport: Arc<dyn GraphqlTransport>,
    log: Arc<dyn ProgressLog>,
}

impl StashClient {
    pub fn new(transport: Arc<dyn GraphqlTransport>, log: Arc<dyn ProgressLog>) -> Self {
        Self { transport, log }
    }

    /// Run a query or mutation and return its `data` object.
    ///
    /// Transport failures, non-2xx statuses and GraphQL `errors` are logged and
    /// yield `None`.
    pub async fn execute(&self, query: &str, variables: Option<Value>) -> Option<Value> {
        let request = GraphqlRequest::new(query, variables);
        match self.try_execute(&request).await {
            Ok(data) => Some(data),
            Err(GraphqlError::Graphql(messages)) => {
                for message in messages {
                    self.log.error(&format!("GraphQL Error: {}", message));
                }
                None
            }
            Err(e) => {
                self.log.error(&format!("Error fetching GraphQL data: {}", e));
                None
            }
        }
    }

    async fn try_execute(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        let response = self.transport.post(request).await?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            return Err(GraphqlError::Graphql(
                errors
                    .into_iter()
                    .map(|e| e.message.unwrap_or_else(|| "unknown error".to_string()))
                    .collect(),
            ));
        }

        response
            .data
            .filter(|data| !data.is_null())
            .ok_or(GraphqlError::MissingData)
    }

    async fn execute_as<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Option<T> {
        let data = self.execute(query, variables).await?;
        match serde_json::from_value(data) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.log
                    .error(&format!("Error fetching GraphQL data: {}", GraphqlError::Decode(e)));
                None
            }
        }
    }

    /// All tags with at least one scene marker, in server order.
    pub async fn fetch_tags_with_markers(&self) -> Option<Vec<Tag>> {
        let data: FindTagsData = self.execute_as(FIND_TAGS_WITH_MARKERS, None).await?;
        let tags = data.find_tags.and_then(|page| page.tags).unwrap_or_default();

        debug!(count = tags.len(), "Fetched tags with markers");
        Some(tags)
    }

    /// Scene markers carrying the given tag. `None` means the fetch failed.
    pub async fn fetch_markers_for_tag(&self, tag_id: &str) -> Option<Vec<SceneMarker>> {
        let data: FindSceneMarkersData = self
            .execute_as(FIND_MARKERS_FOR_TAG, Some(json!({ "tag_id": tag_id })))
            .await?;
        let markers = data
            .find_scene_markers
            .and_then(|page| page.scene_markers)
            .unwrap_or_default();

        debug!(tag_id = %tag_id, count = markers.len(), "Fetched scene markers");
        Some(markers)
    }

    /// Point the tag's image at `stream_url`.
    pub async fn update_tag_image(&self, tag_id: &str, stream_url: &str) -> Option<Value> {
        self.execute(TAG_UPDATE, Some(json!({ "id": tag_id, "image": stream_url })))
            .await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted transport that answers requests from a closure and records them.

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    type Handler = dyn Fn(&GraphqlRequest) -> Result<GraphqlResponse, GraphqlError> + Send + Sync;

    pub struct ScriptedTransport {
        handler: Box<Handler>,
        calls: Mutex<Vec<(Instant, GraphqlRequest)>>,
    }

    impl ScriptedTransport {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&GraphqlRequest) -> Result<GraphqlResponse, GraphqlError> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Requests whose query text contains `operation`, with the time they were made.
        pub fn calls_to(&self, operation: &str) -> Vec<(Instant, GraphqlRequest)> {
            self.calls
                .lock()
                .iter()
                .filter(|(_, request)| request.query.contains(operation))
                .cloned()
                .collect()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl GraphqlTransport for ScriptedTransport {
        async fn post(&self, request: &GraphqlRequest) -> Result<GraphqlResponse, GraphqlError> {
            self.calls.lock().push((Instant::now(), request.clone()));
            (self.handler)(request)
        }
    }

    pub fn reply(body: Value) -> Result<GraphqlResponse, GraphqlError> {
        Ok(serde_json::from_value(body).expect("scripted response must be a GraphQL envelope"))
    }
}
