use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use platformer::availability::RunContext;
use platformer::bridge::CredentialBridge;
use platformer::bridge::keys::RsaKeyGenerator;
use platformer::bridge::secrets::KubeSecretStore;
use platformer::config::DesiredState;
use platformer::orchestrator::Orchestrator;
use platformer::transport::ensure_crypto_provider;

#[derive(Parser)]
#[command(name = "platformer", version)]
#[command(about = "Converges Harbor, Gitea and Argo CD repository secrets to a desired state")]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile every configured backend once
    Run {
        /// Desired-state document
        #[arg(short, long, env = "PLATFORMER_CONFIG", default_value = "config.yaml")]
        config: PathBuf,

        /// Skip Kubernetes secrets (and therefore deploy keys)
        #[arg(long)]
        no_cluster: bool,

        /// Exit with status 2 when any resource failed to reconcile
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env("PLATFORMER_LOG").unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn cluster_bridge() -> Option<CredentialBridge<KubeSecretStore>> {
    match kube::Client::try_default().await {
        Ok(client) => {
            tracing::info!("kubernetes client created");
            Some(CredentialBridge::new(
                KubeSecretStore::new(client),
                Arc::new(RsaKeyGenerator::default()),
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "no kubernetes cluster available, secrets and deploy keys will be skipped");
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    ensure_crypto_provider();

    let Command::Run {
        config,
        no_cluster,
        strict,
    } = cli.command;

    let state = DesiredState::load(&config)
        .with_context(|| format!("loading {}", config.display()))?;
    tracing::info!(config = %config.display(), "desired state loaded");

    let bridge = if no_cluster {
        tracing::info!("cluster disabled, secrets and deploy keys will be skipped");
        None
    } else {
        cluster_bridge().await
    };

    let orchestrator = Orchestrator::new(&state, bridge).context("building API clients")?;
    let mut ctx = RunContext::new();
    let report = orchestrator.run(&mut ctx).await?;

    if strict && report.has_failures() {
        tracing::error!(failed = report.failed(), "run finished with failures");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
