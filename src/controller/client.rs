//! Cluster access for k6 jobs
//!
//! [`JobClient`] is the seam between the submission flow and the API server:
//! single-shot create and delete calls plus a change-event subscription.
//! Nothing here retries; failures are returned to the caller as-is.

use crate::crd::job::{JobKind, Stage};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, DeleteParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] watcher::Error),

    #[error("Job document missing {0}")]
    MissingField(&'static str),
}

/// A change observed on some job of the watched kind and namespace
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Current state of an object, sent when it is added or modified
    Applied { name: String, stage: Option<Stage> },
    /// The object was removed from the cluster
    Deleted { name: String },
}

impl JobEvent {
    pub fn name(&self) -> &str {
        match self {
            JobEvent::Applied { name, .. } | JobEvent::Deleted { name } => name,
        }
    }
}

/// Ordered, possibly endless stream of job events
pub type JobEventStream = BoxStream<'static, Result<JobEvent, ClientError>>;

#[async_trait]
pub trait JobClient: Send + Sync {
    /// Submit `document` as a new object in its namespace
    async fn create(&self, document: &DynamicObject) -> Result<DynamicObject, ClientError>;

    /// Remove the named object
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Open a watch over every job in `namespace`
    ///
    /// Dropping the returned stream closes the watch.
    async fn subscribe(&self, namespace: &str) -> Result<JobEventStream, ClientError>;
}

/// [`JobClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeJobClient {
    client: Client,
    resource: ApiResource,
}

impl KubeJobClient {
    pub fn new(client: Client, kind: JobKind) -> Self {
        KubeJobClient {
            client,
            resource: kind.api_resource(),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

#[async_trait]
impl JobClient for KubeJobClient {
    async fn create(&self, document: &DynamicObject) -> Result<DynamicObject, ClientError> {
        let namespace = document
            .metadata
            .namespace
            .as_deref()
            .ok_or(ClientError::MissingField("metadata.namespace"))?;

        let created = self
            .api(namespace)
            .create(&PostParams::default(), document)
            .await?;
        Ok(created)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn subscribe(&self, namespace: &str) -> Result<JobEventStream, ClientError> {
        debug!(
            namespace = %namespace,
            kind = %self.resource.kind,
            "Opening job watch"
        );

        // The watcher lists first, so an initial state that is already
        // terminal is still delivered as an Applied event
        let events = watcher(self.api(namespace), watcher::Config::default())
            .filter_map(|event| async move {
                match event {
                    Ok(event) => job_event(event).map(Ok),
                    Err(e) => Some(Err(ClientError::WatchError(e))),
                }
            })
            .boxed();

        Ok(events)
    }
}

/// Map a raw watcher event onto a [`JobEvent`]
///
/// List bookkeeping events (`Init`, `InitDone`) carry no object and map to `None`.
pub fn job_event(event: watcher::Event<DynamicObject>) -> Option<JobEvent> {
    match event {
        watcher::Event::Apply(object) | watcher::Event::InitApply(object) => {
            Some(JobEvent::Applied {
                stage: stage_of(&object),
                name: object.name_any(),
            })
        }
        watcher::Event::Delete(object) => Some(JobEvent::Deleted {
            name: object.name_any(),
        }),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Read `status.stage` from an untyped job object
pub fn stage_of(object: &DynamicObject) -> Option<Stage> {
    let raw = object
        .data
        .get("status")
        .and_then(|status| status.get("stage"))
        .and_then(|stage| stage.as_str())
        .filter(|stage| !stage.is_empty())?;

    match raw.parse() {
        Ok(stage) => Some(stage),
        Err(e) => {
            warn!(job = %object.name_any(), error = %e, "Ignoring unrecognised job stage");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_object(name: &str, status: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "k6.io/v1alpha1",
            "kind": "K6",
            "metadata": { "name": name, "namespace": "default" },
            "spec": { "parallelism": 1 },
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn test_stage_of_reads_status_stage() {
        let object = job_object("k6-sample", json!({ "stage": "started" }));

        assert_eq!(stage_of(&object), Some(Stage::Started));
    }

    #[test]
    fn test_stage_of_missing_or_unknown_stage() {
        assert_eq!(stage_of(&job_object("a", json!({}))), None);
        assert_eq!(stage_of(&job_object("b", json!({ "stage": "" }))), None);
        assert_eq!(stage_of(&job_object("c", json!({ "stage": "error" }))), None);
    }

    #[test]
    fn test_job_event_maps_watcher_events() {
        let applied = job_event(watcher::Event::Apply(job_object(
            "k6-sample",
            json!({ "stage": "finished" }),
        )));
        assert_eq!(
            applied,
            Some(JobEvent::Applied {
                name: "k6-sample".to_string(),
                stage: Some(Stage::Finished),
            })
        );

        let listed = job_event(watcher::Event::InitApply(job_object(
            "k6-other",
            json!({ "stage": "created" }),
        )));
        assert_eq!(listed.as_ref().map(JobEvent::name), Some("k6-other"));

        let deleted = job_event(watcher::Event::Delete(job_object("k6-sample", json!({}))));
        assert_eq!(
            deleted,
            Some(JobEvent::Deleted {
                name: "k6-sample".to_string()
            })
        );

        assert_eq!(job_event(watcher::Event::Init), None);
        assert_eq!(job_event(watcher::Event::InitDone), None);
    }
}
