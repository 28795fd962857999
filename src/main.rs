use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docker_certs::modules::builtin::standard_modules;
use docker_certs::{Bus, Cli, DockerRuntime, Ingestor, ModuleLoader, wait_for_shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = cli.into_config()?;

    let default_level = if config.debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        app = %config.name,
        certs_dir = %config.certs_dir.display(),
        mdns = config.mdns_publishing,
        "starting"
    );

    let bus = Bus::new();
    let mut loader = ModuleLoader::new(bus.clone());

    if let Err(e) = loader.load(standard_modules(&config)).await {
        tracing::error!(label = e.as_label(), error = %e, "startup aborted");
        loader.close_all().await;
        bus.close();
        return Err(e.into());
    }

    let runtime = match DockerRuntime::connect() {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            tracing::error!(label = e.as_label(), error = %e, "cannot reach docker");
            loader.close_all().await;
            bus.close();
            return Err(e.into());
        }
    };
    let ingestor = Arc::new(Ingestor::new(runtime, bus.clone(), config.reconnect_delay));

    if let Err(e) = ingestor.scan().await {
        tracing::warn!(label = e.as_label(), error = %e, "initial scan failed");
    }

    let token = CancellationToken::new();
    let ingestion = tokio::spawn({
        let ingestor = Arc::clone(&ingestor);
        let token = token.clone();
        async move { ingestor.run(token).await }
    });

    match wait_for_shutdown_signal().await {
        Ok(signal) => tracing::info!(%signal, "shutting down"),
        Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
    }

    token.cancel();
    if let Err(e) = ingestion.await {
        tracing::error!(error = %e, "ingestion task failed");
    }

    let failures = loader.close_all().await;
    bus.close();
    tracing::info!(failed_closes = failures.len(), "stopped");
    Ok(())
}
