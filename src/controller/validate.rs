//! Structural checks run on the merged job before anything is submitted

use crate::crd::job::{EnvVar, JobTemplate, ScriptSource};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("metadata.name is not set")]
    MissingName,

    #[error("metadata.namespace is not set")]
    MissingNamespace,

    #[error("spec.parallelism must be 1 or more, got {0}")]
    InvalidParallelism(i32),

    #[error("spec.script must set one of configMap, volumeClaim or localFile")]
    MissingScript,

    #[error("spec.script sets more than one of configMap, volumeClaim and localFile")]
    AmbiguousScript,

    #[error("spec.script.{0}.name is not set")]
    MissingScriptName(&'static str),

    #[error("spec.script.{0}.file is not set")]
    MissingScriptFile(&'static str),

    #[error("spec.script.localFile is empty")]
    EmptyLocalFile,

    #[error("spec.{pod}.env[{index}].name is not set")]
    MissingEnvName { pod: &'static str, index: usize },

    #[error("spec.{pod}.env[{index}] ({name}) needs a value or a complete valueFrom.secretKeyRef")]
    MissingEnvValue {
        pod: &'static str,
        index: usize,
        name: String,
    },
}

/// Whether the template itself has to supply `metadata.name`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// Name comes from the template (deleting an existing job)
    Required,
    /// An empty name is filled in by the name generator after validation
    Generated,
}

/// Validate a merged job, returning the first failed check
pub fn validate(job: &JobTemplate, policy: NamePolicy) -> Result<(), ValidationError> {
    if policy == NamePolicy::Required && job.name().is_empty() {
        return Err(ValidationError::MissingName);
    }

    if job.namespace().is_empty() {
        return Err(ValidationError::MissingNamespace);
    }

    if job.spec.parallelism < 1 {
        return Err(ValidationError::InvalidParallelism(job.spec.parallelism));
    }

    validate_script(job)?;

    let pods = [
        ("initializer", job.spec.initializer.as_ref()),
        ("starter", job.spec.starter.as_ref()),
        ("runner", Some(&job.spec.runner)),
    ];
    for (pod, spec) in pods {
        if let Some(spec) = spec {
            validate_env(pod, &spec.env)?;
        }
    }

    Ok(())
}

fn validate_script(job: &JobTemplate) -> Result<(), ValidationError> {
    let sources = job.spec.script.sources();
    let source = match sources.as_slice() {
        [] => return Err(ValidationError::MissingScript),
        [source] => *source,
        _ => return Err(ValidationError::AmbiguousScript),
    };

    let (field, script_ref) = match source {
        ScriptSource::ConfigMap(script_ref) => ("configMap", script_ref),
        ScriptSource::VolumeClaim(script_ref) => ("volumeClaim", script_ref),
        ScriptSource::LocalFile(path) if path.is_empty() => {
            return Err(ValidationError::EmptyLocalFile)
        }
        ScriptSource::LocalFile(_) => return Ok(()),
    };

    if script_ref.name.is_empty() {
        return Err(ValidationError::MissingScriptName(field));
    }
    if script_ref.file.is_empty() {
        return Err(ValidationError::MissingScriptFile(field));
    }
    Ok(())
}

fn validate_env(pod: &'static str, env: &[EnvVar]) -> Result<(), ValidationError> {
    for (index, var) in env.iter().enumerate() {
        if var.name.is_empty() {
            return Err(ValidationError::MissingEnvName { pod, index });
        }
        if var.literal().is_none() && var.secret_ref().is_none() {
            return Err(ValidationError::MissingEnvValue {
                pod,
                index,
                name: var.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
