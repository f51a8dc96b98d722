//! Invocation inputs and cluster access
//!
//! Every option can also be given through the `INPUT_*` environment
//! variables a CI step sets. Empty values count as unset.

use crate::controller::name::DEFAULT_PREFIX;
use crate::controller::overrides::OverrideSet;
use crate::controller::Method;
use crate::crd::job::JobTemplate;
use anyhow::{ensure, Context, Result};
use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about = "Submit a k6 load-test job and follow it to completion", long_about = None)]
pub struct Cli {
    /// Operation to run
    #[arg(long, env = "INPUT_METHOD", value_enum)]
    pub method: Method,

    /// Path to the YAML job template
    #[arg(long, env = "INPUT_TEMPLATE")]
    pub template: PathBuf,

    /// Virtual users, replaces the value after `--vus`
    #[arg(long, env = "INPUT_VUS")]
    pub vus: Option<String>,

    /// Test duration in seconds, replaces the value after `--duration`
    #[arg(long, env = "INPUT_DURATION")]
    pub duration: Option<String>,

    /// Requests per second, replaces the value after `--rps`
    #[arg(long, env = "INPUT_RPS")]
    pub rps: Option<String>,

    /// Number of runner pods
    #[arg(long, env = "INPUT_PARALLELISM")]
    pub parallelism: Option<String>,

    /// Script file inside the referenced ConfigMap or volume
    #[arg(long, env = "INPUT_SCRIPT_FILE")]
    pub script_file: Option<String>,

    /// Prefix for generated job names
    #[arg(long, env = "INPUT_NAME_PREFIX", default_value = DEFAULT_PREFIX)]
    pub name_prefix: String,

    /// Kubeconfig to use instead of the default lookup
    #[arg(long, env = "INPUT_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> OverrideSet {
        OverrideSet::from_inputs(
            self.vus.clone(),
            self.duration.clone(),
            self.rps.clone(),
            self.parallelism.clone(),
            self.script_file.clone(),
        )
    }

    /// Explicit kubeconfig path, if a non-empty one was given
    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Read and parse the job template at `path`
pub fn load_template(path: &Path) -> Result<JobTemplate> {
    ensure!(!path.as_os_str().is_empty(), "the job template path is not set");

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read job template {}", path.display()))?;
    parse_template(&raw).with_context(|| format!("failed to parse job template {}", path.display()))
}

pub fn parse_template(raw: &str) -> Result<JobTemplate> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Build a Kubernetes client
///
/// Without an explicit path this falls back to kube's default resolution:
/// `KUBECONFIG`, `~/.kube/config`, then in-cluster configuration.
pub async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("failed to create Kubernetes client");
    };

    debug!(path = %path.display(), "Loading kubeconfig");
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("failed to load kubeconfig {}", path.display()))?;
    Client::try_from(config).context("failed to create Kubernetes client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_method_and_overrides() {
        let cli = Cli::try_parse_from([
            "k6-apply",
            "--method",
            "watch",
            "--template",
            "k6.yaml",
            "--vus",
            "50",
            "--duration",
            "",
        ])
        .unwrap();

        assert_eq!(cli.method, Method::Watch);
        assert_eq!(cli.template, PathBuf::from("k6.yaml"));
        assert_eq!(cli.name_prefix, "k6");
        assert_eq!(cli.kubeconfig(), None);

        let overrides = cli.overrides();
        assert_eq!(overrides.vus.as_deref(), Some("50"));
        assert_eq!(overrides.duration, None);
    }

    #[test]
    fn test_cli_rejects_unknown_method() {
        let result = Cli::try_parse_from([
            "k6-apply",
            "--method",
            "apply",
            "--template",
            "k6.yaml",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_template_requires_path() {
        let err = load_template(Path::new("")).unwrap_err();

        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_load_template_reports_missing_file() {
        let err = load_template(Path::new("/nonexistent/k6.yaml")).unwrap_err();

        assert!(err.to_string().contains("/nonexistent/k6.yaml"));
    }

    #[test]
    fn test_parse_template_rejects_invalid_yaml() {
        assert!(parse_template("spec: [unclosed").is_err());
        assert!(parse_template("spec:\n  parallelism: many\n").is_err());
    }
}
