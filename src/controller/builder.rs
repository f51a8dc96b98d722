//! Merge a job template with invocation overrides and render the wire document
//!
//! All overrides are applied to the typed [`JobTemplate`]; conversion to the
//! untyped [`DynamicObject`] only happens in [`render_document`].

use crate::controller::overrides::OverrideSet;
use crate::crd::job::{EnvVar, JobKind, JobTemplate};
use kube::core::DynamicObject;
use serde_json::{json, Value};
use std::num::ParseIntError;
use thiserror::Error;
use tracing::info;

/// Unit appended to the duration override (`--duration 30` becomes `30s`)
pub const DURATION_UNIT: &str = "s";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("parallelism override {value:?} is not a valid integer: {source}")]
    InvalidParallelism {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to render job document: {0}")]
    Render(#[from] serde_json::Error),
}

/// Replace the values of `--vus`, `--duration` and `--rps` in place
///
/// Only flags already present in `args` are touched; overrides for flags the
/// template does not mention are dropped. Spacing of `args` is
/// preserved.
pub fn override_args(args: &str, overrides: &OverrideSet) -> String {
    let mut tokens: Vec<String> = args.split(' ').map(str::to_string).collect();

    for i in 0..tokens.len().saturating_sub(1) {
        let replacement = match tokens[i].as_str() {
            "--vus" => overrides.vus.clone(),
            "--duration" => overrides
                .duration
                .as_ref()
                .map(|duration| format!("{}{}", duration, DURATION_UNIT)),
            "--rps" => overrides.rps.clone(),
            _ => None,
        };
        if let Some(value) = replacement {
            tokens[i + 1] = value;
        }
    }

    tokens.join(" ")
}

/// Apply `overrides` to a copy of `template`
pub fn apply_overrides(
    template: &JobTemplate,
    overrides: &OverrideSet,
) -> Result<JobTemplate, BuildError> {
    let mut job = template.clone();

    if !job.spec.arguments.is_empty() {
        job.spec.arguments = override_args(&job.spec.arguments, overrides);
        info!(arguments = %job.spec.arguments, "Rendered job arguments");
    }

    if let Some(value) = &overrides.parallelism {
        job.spec.parallelism =
            value
                .parse::<i32>()
                .map_err(|source| BuildError::InvalidParallelism {
                    value: value.clone(),
                    source,
                })?;
    }

    if let Some(file) = &overrides.script_file {
        let script = &mut job.spec.script;
        if let Some(config_map) = script.config_map.as_mut() {
            config_map.file = file.clone();
        } else if let Some(volume_claim) = script.volume_claim.as_mut() {
            volume_claim.file = file.clone();
        } else if script.local_file.is_some() {
            script.local_file = Some(file.clone());
        }
    }

    Ok(job)
}

/// Render environment variables in template order
///
/// Entries with neither a literal value nor a complete secret reference are
/// dropped; validation rejects them before rendering is reached.
pub fn render_env(env: &[EnvVar]) -> Vec<Value> {
    env.iter()
        .filter_map(|var| {
            if let Some(value) = var.literal() {
                Some(json!({ "name": var.name, "value": value }))
            } else {
                var.secret_ref().map(|secret| {
                    json!({
                        "name": var.name,
                        "valueFrom": {
                            "secretKeyRef": {
                                "name": secret.name,
                                "key": secret.key,
                            }
                        }
                    })
                })
            }
        })
        .collect()
}

/// Render the submission document for `job` as resource `kind`
///
/// The job must already carry its final name.
pub fn render_document(job: &JobTemplate, kind: JobKind) -> Result<DynamicObject, BuildError> {
    let mut spec = serde_json::to_value(&job.spec)?;

    // The schema declares parallelism as int64
    spec["parallelism"] = json!(i64::from(job.spec.parallelism));

    let pods = [
        ("initializer", job.spec.initializer.as_ref()),
        ("starter", job.spec.starter.as_ref()),
        ("runner", Some(&job.spec.runner)),
    ];
    for (field, pod) in pods {
        if let Some(pod) = pod.filter(|pod| !pod.env.is_empty()) {
            spec[field]["env"] = Value::Array(render_env(&pod.env));
        }
    }

    let mut document = DynamicObject::new(job.name(), &kind.api_resource()).within(job.namespace());
    document.metadata.labels = job.metadata.labels.clone();
    document.metadata.annotations = job.metadata.annotations.clone();
    document.data = json!({ "spec": spec });

    Ok(document)
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
