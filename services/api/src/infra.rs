use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use pod_quality::config::{ReasoningSettings, WorkflowSettings};
use pod_quality::workflows::quality::{
    AlertError, DamagePredictions, DeliveryCollaborators, QualityEventStore, QualityRecord,
    ReviewAlert, ReviewAlertPublisher, StoreError,
};
use pod_quality::workflows::storage::{
    CollaboratorError, FetchedObject, LocalAssetStore, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

pub(crate) const PLACEHOLDER_CAPTION: &str = "Package delivered at front door";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredQualityRecord {
    pub(crate) table: String,
    pub(crate) stored_at: DateTime<Utc>,
    pub(crate) record: QualityRecord,
}

/// Records and alerts kept by the long-running server before the oldest are dropped.
pub(crate) const SERVE_RETENTION: usize = 256;

/// Appends `item`, evicting from the front once `limit` is reached.
fn retain<T>(items: &mut VecDeque<T>, limit: Option<usize>, item: T) {
    if let Some(limit) = limit {
        while items.len() >= limit.max(1) {
            items.pop_front();
        }
    }
    items.push_back(item);
}

/// Keeps quality records in process, tagged with the configured table name.
#[derive(Clone)]
pub(crate) struct InMemoryQualityStore {
    table: String,
    limit: Option<usize>,
    records: Arc<Mutex<VecDeque<StoredQualityRecord>>>,
}

impl InMemoryQualityStore {
    pub(crate) fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            limit: None,
            records: Arc::default(),
        }
    }

    /// Keeps only the most recent `limit` records.
    pub(crate) fn bounded(table: impl Into<String>, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(table)
        }
    }

    pub(crate) fn records(&self) -> Vec<StoredQualityRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl QualityEventStore for InMemoryQualityStore {
    fn store(&self, record: &QualityRecord) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        retain(
            &mut guard,
            self.limit,
            StoredQualityRecord {
                table: self.table.clone(),
                stored_at: Utc::now(),
                record: record.clone(),
            },
        );
        debug!(table = %self.table, retained = guard.len(), "quality record stored");
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryAlertPublisher {
    topic: Option<String>,
    limit: Option<usize>,
    events: Arc<Mutex<VecDeque<ReviewAlert>>>,
}

impl InMemoryAlertPublisher {
    pub(crate) fn new(topic: Option<String>) -> Self {
        Self {
            topic,
            ..Self::default()
        }
    }

    pub(crate) fn bounded(topic: Option<String>, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(topic)
        }
    }

    pub(crate) fn events(&self) -> Vec<ReviewAlert> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl ReviewAlertPublisher for InMemoryAlertPublisher {
    fn publish(&self, alert: ReviewAlert) -> Result<(), AlertError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| AlertError::Transport("alert mutex poisoned".to_string()))?;
        info!(
            topic = self.topic.as_deref().unwrap_or("unconfigured"),
            object = %alert.object_name,
            "review alert queued"
        );
        retain(&mut guard, self.limit, alert);
        Ok(())
    }
}

/// Fixed caption and damage output used when no vision deployment is wired.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PlaceholderVision;

impl PlaceholderVision {
    pub(crate) fn caption(&self) -> String {
        PLACEHOLDER_CAPTION.to_string()
    }

    pub(crate) fn damage(&self) -> DamagePredictions {
        DamagePredictions::from([("damage".to_string(), 0.15), ("no_damage".to_string(), 0.85)])
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    text: String,
}

/// Text-generation capability behind the caption summary and decision steps.
pub(crate) enum Reasoner {
    Http(HttpReasoner),
    /// Replies in prose, which the decision step routes to human review.
    Offline,
}

impl Reasoner {
    pub(crate) fn from_settings(settings: &ReasoningSettings) -> Result<Self, CollaboratorError> {
        match settings.endpoint.as_deref() {
            Some(endpoint) => Ok(Self::Http(HttpReasoner::new(endpoint, settings.timeout)?)),
            None => Ok(Self::Offline),
        }
    }

    fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        match self {
            Reasoner::Http(client) => client.complete(prompt),
            Reasoner::Offline => Ok(format!(
                "No reasoning endpoint configured; a reviewer should check this delivery. ({} prompt characters)",
                prompt.chars().count()
            )),
        }
    }
}

/// POSTs `{"prompt": ...}` and reads `{"text": ...}`; any other body is used
/// verbatim.
pub(crate) struct HttpReasoner {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpReasoner {
    pub(crate) fn new(endpoint: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pod-quality/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::Unavailable(err.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { prompt })
            .send()
            .map_err(|err| CollaboratorError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Unavailable(format!(
                "reasoning endpoint returned {status}"
            )));
        }

        let body = response
            .text()
            .map_err(|err| CollaboratorError::InvalidResponse(err.to_string()))?;
        Ok(completion_text(body))
    }
}

fn completion_text(body: String) -> String {
    match serde_json::from_str::<CompletionReply>(&body) {
        Ok(reply) => reply.text,
        Err(_) => body,
    }
}

/// Collaborators for local runs: photos from disk, placeholder vision and the
/// configured reasoner.
pub(crate) struct LocalCollaborators {
    store: LocalAssetStore,
    vision: PlaceholderVision,
    reasoner: Reasoner,
}

impl LocalCollaborators {
    pub(crate) fn new(store: LocalAssetStore, reasoner: Reasoner) -> Self {
        Self {
            store,
            vision: PlaceholderVision,
            reasoner,
        }
    }

    /// Must run off the async executor: the HTTP reasoner owns a blocking
    /// client.
    pub(crate) fn from_settings(settings: &WorkflowSettings) -> Result<Self, CollaboratorError> {
        Ok(Self::new(
            asset_store(settings),
            Reasoner::from_settings(&settings.reasoning)?,
        ))
    }
}

pub(crate) fn asset_store(settings: &WorkflowSettings) -> LocalAssetStore {
    LocalAssetStore::new(
        settings.storage.local_asset_root.clone(),
        settings.storage.delivery_prefix.clone(),
    )
}

impl DeliveryCollaborators for LocalCollaborators {
    fn fetch_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError> {
        self.store.get_object(object_name)
    }

    fn caption(&self, _image: &[u8]) -> Result<String, CollaboratorError> {
        Ok(self.vision.caption())
    }

    fn detect_damage(&self, _image: &[u8]) -> Result<DamagePredictions, CollaboratorError> {
        Ok(self.vision.damage())
    }

    fn reason(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.reasoner.complete(prompt)
    }
}
