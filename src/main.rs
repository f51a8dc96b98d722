use clap::Parser;
use k6_apply::config::{self, Cli};
use k6_apply::controller::client::{JobClient, KubeJobClient};
use k6_apply::{execute, prepare};
use rand::rngs::OsRng;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    info!(
        method = ?cli.method,
        template = %cli.template.display(),
        "Starting k6-apply"
    );

    // Every failure ends up here: log it once and exit non-zero
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "k6-apply failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let template = config::load_template(&cli.template)?;

    // Nothing touches the cluster until the job is fully built and validated
    let job = prepare(
        &template,
        &cli.overrides(),
        cli.method.name_policy(),
        &cli.name_prefix,
        &mut OsRng,
    )?;

    let client = config::kube_client(cli.kubeconfig()).await?;
    info!("Connected to Kubernetes cluster");

    let jobs: Arc<dyn JobClient> = Arc::new(KubeJobClient::new(client, job.kind()));
    execute(cli.method, jobs, job).await?;

    Ok(())
}
