#![allow(clippy::unwrap_used)] // Tests can use unwrap for brevity
#![allow(clippy::expect_used)] // Tests can use expect for better error messages

use super::*;

#[test]
fn test_template_deserialize_from_yaml() {
    let yaml = r#"
apiVersion: k6.io/v1alpha1
kind: K6
metadata:
  name: load-test
  namespace: default
spec:
  parallelism: 4
  arguments: --vus 10 --duration 30s
  script:
    configMap:
      name: k6-script
      file: test.js
  separate: true
  runner:
    image: grafana/k6:latest
    nodeselector:
      pool: load
    resources:
      limits:
        cpu: 200m
        memory: 1000Mi
    env:
    - name: TARGET
      value: https://example.com
    - name: TOKEN
      valueFrom:
        secretKeyRef:
          name: k6-secrets
          key: token
  cleanup: post
"#;

    let template: JobTemplate = serde_yaml::from_str(yaml).expect("Failed to deserialize template");

    assert_eq!(template.name(), "load-test");
    assert_eq!(template.namespace(), "default");
    assert_eq!(template.spec.parallelism, 4);
    assert_eq!(template.spec.arguments, "--vus 10 --duration 30s");
    assert_eq!(template.spec.separate, Some(true));
    assert_eq!(template.spec.cleanup, Some(Cleanup::Post));

    let config_map = template.spec.script.config_map.as_ref().unwrap();
    assert_eq!(config_map.name, "k6-script");
    assert_eq!(config_map.file, "test.js");

    let runner = &template.spec.runner;
    assert_eq!(runner.image.as_deref(), Some("grafana/k6:latest"));
    assert_eq!(runner.node_selector.get("pool"), Some(&"load".to_string()));
    assert!(runner.resources.is_some());
    assert_eq!(runner.env.len(), 2);
    assert_eq!(runner.env[0].literal(), Some("https://example.com"));
    let secret = runner.env[1].secret_ref().unwrap();
    assert_eq!(secret.name, "k6-secrets");
    assert_eq!(secret.key, "token");
}

#[test]
fn test_template_without_name_is_empty() {
    let yaml = r#"
metadata:
  namespace: loadtest
spec:
  parallelism: 1
"#;

    let template: JobTemplate = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(template.name(), "");
    assert_eq!(template.namespace(), "loadtest");
    assert_eq!(JobKind::from_template(&template), Some(JobKind::K6));
}

#[test]
fn test_script_sources_lists_every_populated_kind() {
    let script = Script {
        config_map: Some(ScriptRef {
            name: "k6-script".to_string(),
            file: "test.js".to_string(),
        }),
        local_file: Some("/test/test.js".to_string()),
        ..Default::default()
    };

    let sources = script.sources();

    assert_eq!(sources.len(), 2);
    assert!(matches!(sources[0], ScriptSource::ConfigMap(r) if r.name == "k6-script"));
    assert_eq!(sources[1], ScriptSource::LocalFile("/test/test.js"));
    assert!(Script::default().sources().is_empty());
}

#[test]
fn test_env_var_incomplete_secret_ref_is_not_a_reference() {
    let env = EnvVar {
        name: "TOKEN".to_string(),
        value: Some(String::new()),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: "k6-secrets".to_string(),
                key: String::new(),
            }),
        }),
    };

    assert_eq!(env.literal(), None);
    assert_eq!(env.secret_ref(), None);
}

#[test]
fn test_stage_parse_and_order() {
    let stages: Vec<Stage> = ["initialization", "initialized", "created", "started", "finished"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

    assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(stages[4].is_terminal());
    assert!(!stages[3].is_terminal());
    assert_eq!(Stage::Started.to_string(), "started");
    assert_eq!(
        "error".parse::<Stage>(),
        Err(UnknownStage("error".to_string()))
    );
}

#[test]
fn test_job_kind_api_resource() {
    let k6 = JobKind::K6.api_resource();
    assert_eq!(k6.api_version, "k6.io/v1alpha1");
    assert_eq!(k6.kind, "K6");
    assert_eq!(k6.plural, "k6s");

    let testrun = JobKind::TestRun.api_resource();
    assert_eq!(testrun.group, "k6.io");
    assert_eq!(testrun.version, "v1alpha1");
    assert_eq!(testrun.plural, "testruns");
}

#[test]
fn test_job_kind_rejects_unknown_kind() {
    let template = JobTemplate {
        kind: Some("Deployment".to_string()),
        ..Default::default()
    };

    assert_eq!(JobKind::from_template(&template), None);
}
