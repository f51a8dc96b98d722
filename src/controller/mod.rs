//! Build, submit and follow a single k6 load-test job
//!
//! Control flow: [`prepare`] (merge overrides, validate, resolve the name,
//! render) → [`create`] → [`watcher`] until the job finishes, or the
//! standalone [`create`] / [`delete`] commands.

pub mod builder;
pub mod client;
pub mod name;
pub mod overrides;
pub mod validate;
pub mod watcher;

#[cfg(test)]
pub(crate) mod mock;

use crate::crd::job::{JobKind, JobTemplate};
use builder::{apply_overrides, render_document, BuildError};
use client::{ClientError, JobClient};
use kube::core::DynamicObject;
use kube::ResourceExt;
use name::{generate_name, NameError};
use overrides::OverrideSet;
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use validate::{validate, NamePolicy, ValidationError};
use watcher::{watch_to_completion, WatchError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported job kind {0:?}, expected K6 or TestRun")]
    UnsupportedKind(String),

    #[error("Failed to build job: {0}")]
    Build(#[from] BuildError),

    #[error("Invalid job: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to generate job name: {0}")]
    Name(#[from] NameError),

    #[error("Failed to create job: {0}")]
    Create(#[source] ClientError),

    #[error("Failed to delete job {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Operation selected for this invocation
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Create the job and exit
    Create,
    /// Delete the job named in the template and exit
    Delete,
    /// Create the job, wait for it to finish, then delete it
    Watch,
}

impl Method {
    pub fn name_policy(&self) -> NamePolicy {
        match self {
            Method::Delete => NamePolicy::Required,
            Method::Create | Method::Watch => NamePolicy::Generated,
        }
    }
}

/// Merged and validated job, rendered and ready to submit
#[derive(Debug, Clone)]
pub struct PreparedJob {
    kind: JobKind,
    namespace: String,
    name: String,
    document: DynamicObject,
}

impl PreparedJob {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &DynamicObject {
        &self.document
    }
}

/// A job the API server has accepted
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    kind: JobKind,
    namespace: String,
    name: String,
    document: DynamicObject,
}

impl SubmittedJob {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name as resolved by the API server
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &DynamicObject {
        &self.document
    }
}

/// Merge `overrides` into `template`, validate, and render the document
///
/// A template without a name gets one from [`generate_name`] under
/// [`NamePolicy::Generated`].
pub fn prepare<R: RngCore + ?Sized>(
    template: &JobTemplate,
    overrides: &OverrideSet,
    policy: NamePolicy,
    name_prefix: &str,
    rng: &mut R,
) -> Result<PreparedJob, Error> {
    let kind = JobKind::from_template(template)
        .ok_or_else(|| Error::UnsupportedKind(template.kind.clone().unwrap_or_default()))?;

    let mut job = apply_overrides(template, overrides)?;
    validate(&job, policy)?;

    if job.name().is_empty() {
        job.metadata.name = Some(generate_name(name_prefix, rng)?);
    }

    let document = render_document(&job, kind)?;
    let rendered = serde_json::to_string(&document).map_err(BuildError::from)?;
    info!(document = %rendered, "Merged job document");

    Ok(PreparedJob {
        kind,
        namespace: job.namespace().to_string(),
        name: job.name().to_string(),
        document,
    })
}

/// Submit a prepared job; fails if a job with the same name already exists
pub async fn create(client: &dyn JobClient, job: PreparedJob) -> Result<SubmittedJob, Error> {
    let created = client.create(&job.document).await.map_err(Error::Create)?;
    let name = created.name_any();

    info!(
        job = %name,
        namespace = %job.namespace,
        kind = job.kind.kind(),
        "Job created"
    );

    Ok(SubmittedJob {
        kind: job.kind,
        namespace: job.namespace,
        name,
        document: job.document,
    })
}

/// Delete the job named by a prepared job
pub async fn delete(client: &dyn JobClient, job: &PreparedJob) -> Result<(), Error> {
    client
        .delete(&job.namespace, &job.name)
        .await
        .map_err(|source| Error::Delete {
            name: job.name.clone(),
            source,
        })?;

    info!(
        job = %job.name,
        namespace = %job.namespace,
        kind = job.kind.kind(),
        "Job deleted"
    );
    Ok(())
}

/// Create the job, wait until it finishes and delete it
pub async fn create_and_watch(
    client: Arc<dyn JobClient>,
    job: PreparedJob,
) -> Result<SubmittedJob, Error> {
    let submitted = create(client.as_ref(), job).await?;
    watch_to_completion(client, &submitted.namespace, &submitted.name).await?;
    Ok(submitted)
}

/// Run `method` for a prepared job
pub async fn execute(
    method: Method,
    client: Arc<dyn JobClient>,
    job: PreparedJob,
) -> Result<(), Error> {
    match method {
        Method::Create => {
            create(client.as_ref(), job).await?;
        }
        Method::Delete => delete(client.as_ref(), &job).await?,
        Method::Watch => {
            create_and_watch(client, job).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
