//! Wait for a submitted job to finish, then delete it
//!
//! A [`CompletionWatcher`] consumes the job event stream in a dedicated task
//! and reports its outcome once, through a oneshot channel, to the caller of
//! [`watch_until`]. The stream is owned by that task, so the watch is closed
//! whichever way the task ends.

use crate::controller::client::{ClientError, JobClient, JobEvent, JobEventStream};
use crate::crd::job::Stage;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to open job watch: {0}")]
    Subscribe(#[source] ClientError),

    #[error("Job watch failed: {0}")]
    Stream(#[source] ClientError),

    #[error("Job watch closed before {0} reached the finished stage")]
    StreamEnded(String),

    #[error("Job {0} was deleted before it reached the finished stage")]
    DeletedBeforeFinish(String),

    #[error("Failed to delete finished job {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("Job watch task stopped without reporting a result")]
    TaskLost,

    #[error("Interrupted while waiting for {0} to finish")]
    Interrupted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    Closed,
}

/// State machine for a single submitted job
///
/// Moves from `Watching` to `Closed` exactly once, after the job has reached
/// [`Stage::Finished`] and been deleted.
#[derive(Debug)]
pub struct CompletionWatcher {
    namespace: String,
    name: String,
    state: WatchState,
    last_stage: Option<Stage>,
}

impl CompletionWatcher {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        CompletionWatcher {
            namespace: namespace.into(),
            name: name.into(),
            state: WatchState::Watching,
            last_stage: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn last_stage(&self) -> Option<Stage> {
        self.last_stage
    }

    /// Process one event
    ///
    /// Events naming other jobs are ignored. Reaching `finished` deletes the
    /// watched job and closes the watcher; once closed, every event is a no-op.
    pub async fn handle(
        &mut self,
        event: &JobEvent,
        client: &dyn JobClient,
    ) -> Result<WatchState, WatchError> {
        if self.state == WatchState::Closed {
            return Ok(self.state);
        }

        if event.name() != self.name {
            debug!(job = %event.name(), watched = %self.name, "Ignoring event for another job");
            return Ok(self.state);
        }

        let stage = match event {
            JobEvent::Deleted { .. } => {
                return Err(WatchError::DeletedBeforeFinish(self.name.clone()))
            }
            JobEvent::Applied { stage: None, .. } => return Ok(self.state),
            JobEvent::Applied {
                stage: Some(stage), ..
            } => *stage,
        };

        if let Some(last) = self.last_stage {
            if stage < last {
                warn!(
                    job = %self.name,
                    from = %last,
                    to = %stage,
                    "Ignoring backward stage transition"
                );
                return Ok(self.state);
            }
        }

        if stage.is_terminal() {
            client
                .delete(&self.namespace, &self.name)
                .await
                .map_err(|source| WatchError::Delete {
                    name: self.name.clone(),
                    source,
                })?;
            info!(job = %self.name, namespace = %self.namespace, "Finished job deleted");

            self.last_stage = Some(stage);
            self.state = WatchState::Closed;
            return Ok(self.state);
        }

        if self.last_stage != Some(stage) {
            info!(job = %self.name, stage = %stage, "Job stage changed");
            self.last_stage = Some(stage);
        }
        Ok(self.state)
    }

    /// Drive the watcher from `events` until it closes
    ///
    /// Consumes the stream; it is dropped, closing the watch, before this returns.
    pub async fn run(
        mut self,
        mut events: JobEventStream,
        client: &dyn JobClient,
    ) -> Result<(), WatchError> {
        while let Some(event) = events.next().await {
            let event = event.map_err(WatchError::Stream)?;
            if self.handle(&event, client).await? == WatchState::Closed {
                return Ok(());
            }
        }
        Err(WatchError::StreamEnded(self.name))
    }
}

/// Watch `name` until it finishes and has been deleted, or `shutdown` resolves
pub async fn watch_until<F>(
    client: Arc<dyn JobClient>,
    namespace: &str,
    name: &str,
    shutdown: F,
) -> Result<(), WatchError>
where
    F: Future<Output = ()>,
{
    let events = client
        .subscribe(namespace)
        .await
        .map_err(WatchError::Subscribe)?;
    info!(job = %name, namespace = %namespace, "Watching job until it finishes");

    let watcher = CompletionWatcher::new(namespace, name);
    let (done_tx, done_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let result = watcher.run(events, client.as_ref()).await;
        // The receiver is gone only when the caller was interrupted
        let _ = done_tx.send(result);
    });

    tokio::select! {
        done = done_rx => {
            let _ = task.await;
            done.unwrap_or(Err(WatchError::TaskLost))
        }
        _ = shutdown => {
            task.abort();
            // Wait for the aborted task so the watch is dropped before returning
            let _ = task.await;
            Err(WatchError::Interrupted(name.to_string()))
        }
    }
}

/// [`watch_until`] interrupted by Ctrl-C
pub async fn watch_to_completion(
    client: Arc<dyn JobClient>,
    namespace: &str,
    name: &str,
) -> Result<(), WatchError> {
    watch_until(client, namespace, name, async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Unable to listen for Ctrl-C; watching without interruption");
            std::future::pending::<()>().await;
        }
    })
    .await
}

#[cfg(test)]
#[path = "watcher_test.rs"]
mod tests;
