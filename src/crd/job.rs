use k8s_openapi::api::core::v1::{
    Affinity, ContainerPort, EnvFromSource, LocalObjectReference, PodSecurityContext,
    ResourceRequirements, Toleration,
};
use kube::api::ObjectMeta;
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// API group shared by every k6 operator resource
pub const GROUP: &str = "k6.io";

/// API version shared by every k6 operator resource
pub const VERSION: &str = "v1alpha1";

/// Load-test job as authored in the template file
///
/// The same shape serves the `K6` and `TestRun` kinds; `kind` selects which
/// resource the job is submitted as.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct JobTemplate {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name and namespace; an empty name is generated at submission time
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: JobSpec,
}

impl JobTemplate {
    /// Name from the template, treating a missing name as empty
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace from the template, treating a missing namespace as empty
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}

/// The `spec` of a k6 job
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Where the test script lives
    #[serde(default)]
    pub script: Script,

    /// Number of runner pods the test is split across
    #[serde(default)]
    pub parallelism: i32,

    /// Spread runners over distinct nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separate: Option<bool>,

    /// Extra arguments passed to `k6 run`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Pod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter: Option<Pod>,

    #[serde(default)]
    pub runner: Pod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scuttle: Option<Scuttle>,

    /// Have the operator remove the job's pods once the test is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<Cleanup>,
}

/// Script source; exactly one of the fields is expected to be set
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ScriptRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_claim: Option<ScriptRef>,

    /// Path of a script already present in the runner image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
}

/// Borrowed view of whichever script source a [`Script`] carries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptSource<'a> {
    ConfigMap(&'a ScriptRef),
    VolumeClaim(&'a ScriptRef),
    LocalFile(&'a str),
}

impl Script {
    /// All populated sources, in declaration order
    pub fn sources(&self) -> Vec<ScriptSource<'_>> {
        let mut sources = Vec::new();
        if let Some(config_map) = &self.config_map {
            sources.push(ScriptSource::ConfigMap(config_map));
        }
        if let Some(volume_claim) = &self.volume_claim {
            sources.push(ScriptSource::VolumeClaim(volume_claim));
        }
        if let Some(local_file) = &self.local_file {
            sources.push(ScriptSource::LocalFile(local_file));
        }
        sources
    }
}

/// A file inside a ConfigMap or PersistentVolumeClaim
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ScriptRef {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub file: String,
}

/// Pod template for the initializer, starter and runner phases
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PodMetadata>,

    #[serde(
        default,
        alias = "nodeselector",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PodMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Environment variable for a k6 pod
///
/// Carries either a literal `value` or a `valueFrom.secretKeyRef`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Literal value, if one is set and non-empty
    pub fn literal(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    /// Secret reference, if both its name and key are set
    pub fn secret_ref(&self) -> Option<&SecretKeySelector> {
        self.value_from
            .as_ref()
            .and_then(|source| source.secret_key_ref.as_ref())
            .filter(|secret| !secret.name.is_empty() && !secret.key.is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeySelector>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SecretKeySelector {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub key: String,
}

/// Istio sidecar handling for k6 pods
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scuttle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envoy_admin_api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub never_kill_istio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub never_kill_istio_on_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scuttle_logging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_without_envoy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_envoy_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub istio_quit_api: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_quit_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_without_envoy_timeout: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cleanup {
    #[serde(rename = "post")]
    Post,
}

/// Lifecycle stage reported in `status.stage`
///
/// Stages only move forward; `Finished` is terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initialization,
    Initialized,
    Created,
    Started,
    Finished,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Initialized => "initialized",
            Stage::Created => "created",
            Stage::Started => "started",
            Stage::Finished => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Finished)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown stage {0:?}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialization" => Ok(Stage::Initialization),
            "initialized" => Ok(Stage::Initialized),
            "created" => Ok(Stage::Created),
            "started" => Ok(Stage::Started),
            "finished" => Ok(Stage::Finished),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Resource kinds a job can be submitted as
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JobKind {
    #[default]
    K6,
    TestRun,
}

impl JobKind {
    /// Resolve the template's `kind` field; a missing kind means `K6`
    pub fn from_template(template: &JobTemplate) -> Option<JobKind> {
        match template.kind.as_deref() {
            None | Some("") | Some("K6") => Some(JobKind::K6),
            Some("TestRun") => Some(JobKind::TestRun),
            Some(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobKind::K6 => "K6",
            JobKind::TestRun => "TestRun",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            JobKind::K6 => "k6s",
            JobKind::TestRun => "testruns",
        }
    }

    /// Group/version/resource triple used for every API call on this kind
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: GROUP.to_string(),
            version: VERSION.to_string(),
            api_version: format!("{}/{}", GROUP, VERSION),
            kind: self.kind().to_string(),
            plural: self.plural().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod tests;
