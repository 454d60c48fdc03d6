//! Saga node entry point.

use node::Config;
use tokio::signal;
use tokio::sync::broadcast;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // 1. Initialize tracing
    node::telemetry::init_tracing(&config);

    // 2. Install Prometheus metrics exporter
    if let Some(addr) = config.metrics_addr {
        node::telemetry::install_metrics(addr).expect("failed to install Prometheus recorder");
    }

    // 3. Forward the shutdown signal to every loop
    let (shutdown, _) = broadcast::channel(1);
    let signal_tx = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    // 4. Run the role
    tracing::info!(role = %config.role, "starting saga node");
    if let Err(e) = node::run(config, shutdown).await {
        tracing::error!(error = %e, "node stopped with error");
        std::process::exit(1);
    }

    tracing::info!("node shut down gracefully");
}
