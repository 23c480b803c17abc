use envconfig::Envconfig;
use eyre::Result;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use backend_api::server::serve;
use backend_common::config::Config;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_from_env().expect("Invalid configuration:");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;

    if let Err(e) = serve(config, listener, shutdown()).await {
        tracing::error!("backend api stopped: {}", e);
        return Err(e);
    }

    Ok(())
}
