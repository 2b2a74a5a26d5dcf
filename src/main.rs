use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use quota_service::config::Settings;
use quota_service::server::{create_app, AppState};
use quota_service::tasks::SweeperTask;
use quota_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (kept alive until shutdown)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        backend = %settings.ratelimit.backend,
        enabled = settings.ratelimit.enabled,
        "Configuration loaded"
    );

    // Connect the counter store and build the limiter
    let state = AppState::initialize(settings.clone()).await?;
    tracing::info!(
        store_backend = %state.rate_limiter.store_backend(),
        "Application state initialized"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start sweeper in background
    let sweeper = SweeperTask::new(
        &settings.ratelimit,
        state.rate_limiter.clone(),
        shutdown_tx.subscribe(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "Sweeper task panicked");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop background tasks
    let _ = shutdown_tx.send(());
}
