use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use compileforge_core::{
    select_job_store, select_sandbox_backend, CompilerOrchestrator, Config, LifecycleManager,
    WorkerPool,
};

#[derive(Parser)]
#[command(name = "compileforge", version, about = "Secure multi-tenant compilation service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and worker pool.
    Server {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Server { host, port } => {
            if let Some(port) = port {
                config.port = port;
            }
            run_server(host, config).await
        }
    }
}

async fn run_server(host: String, config: Config) -> anyhow::Result<()> {
    let backend = select_sandbox_backend().await?;
    let store = select_job_store(&config).await?;
    let orchestrator = Arc::new(CompilerOrchestrator::new(backend));
    let pool = WorkerPool::start(config.max_workers, config.queue_size, store.clone(), orchestrator.clone());
    let lifecycle = Arc::new(LifecycleManager::new(store, pool.clone(), orchestrator));

    let port = config.port;
    tokio::select! {
        res = compileforge_api::run(&host, port, lifecycle) => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining worker pool");
            pool.close().await?;
        }
    }

    Ok(())
}
