//! Scripted in-memory [`JobClient`] for unit tests

use crate::controller::client::{ClientError, JobClient, JobEvent, JobEventStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use kube::core::DynamicObject;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Sets its flag when dropped together with the event stream
struct WatchGuard(Arc<AtomicBool>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockJobClient {
    events: Mutex<Vec<Result<JobEvent, ClientError>>>,
    keep_open: bool,
    fail_create: bool,
    fail_delete: bool,
    fail_subscribe: bool,
    watch_closed: Arc<AtomicBool>,
    pub created: Mutex<Vec<DynamicObject>>,
    pub deleted: Mutex<Vec<(String, String)>>,
}

#[allow(clippy::unwrap_used)] // Test helper can use unwrap
impl MockJobClient {
    /// Client whose watch yields `events` and then ends
    pub fn new(events: Vec<JobEvent>) -> Self {
        MockJobClient {
            events: Mutex::new(events.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    /// Client whose watch yields `events` and then stays open
    pub fn open(events: Vec<JobEvent>) -> Self {
        MockJobClient {
            keep_open: true,
            ..Self::new(events)
        }
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Append a stream error after the scripted events
    pub fn with_stream_error(self) -> Self {
        self.events
            .lock()
            .unwrap()
            .push(Err(ClientError::MissingField("stream")));
        self
    }

    pub fn watch_closed(&self) -> bool {
        self.watch_closed.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<DynamicObject> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)] // Test helper can use unwrap
impl JobClient for MockJobClient {
    async fn create(&self, document: &DynamicObject) -> Result<DynamicObject, ClientError> {
        if self.fail_create {
            return Err(ClientError::MissingField("create"));
        }
        self.created.lock().unwrap().push(document.clone());
        Ok(document.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        if self.fail_delete {
            return Err(ClientError::MissingField("delete"));
        }
        self.deleted
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn subscribe(&self, _namespace: &str) -> Result<JobEventStream, ClientError> {
        if self.fail_subscribe {
            return Err(ClientError::MissingField("subscribe"));
        }
        let events: Vec<_> = self.events.lock().unwrap().drain(..).collect();
        let guard = WatchGuard(self.watch_closed.clone());

        let scripted = stream::iter(events);
        let stream = if self.keep_open {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        Ok(stream
            .map(move |event| {
                let _keep = &guard;
                event
            })
            .boxed())
    }
}
