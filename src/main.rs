//! Intel Relay - main application entry point

use std::{net::SocketAddr, time::Duration};
use tokio::{net::TcpListener, signal};

use intel_relay::{
    Config, init_tracing,
    infrastructure::create_store,
    presentation::{AppState, create_router},
};

const SPEND_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({e}), using defaults");
        Config::default()
    });

    init_tracing(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        build_date = env!("VERGEN_BUILD_DATE"),
        "Starting Intel Relay"
    );
    tracing::info!(
        "Configuration loaded: server={}:{} store={}",
        config.server.host,
        config.server.port,
        config.store.backend
    );

    let store = create_store(&config.store).await?;
    let app_state = AppState::from_config(&config, store)?;

    if !app_state.vendor_configured {
        tracing::warn!("Reputation vendor credentials missing; enrichment endpoints will return not_configured");
    }

    let orchestrator = app_state.orchestrator.clone();
    let purge_every = Duration::from_secs(config.runtime.cache_purge_interval_seconds.max(1));
    orchestrator
        .context()
        .cache
        .clone()
        .start_background_purge(purge_every);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SPEND_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = orchestrator.context().spend.prune_closed_periods().await;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned closed spend periods");
            }
        }
    });

    let app = create_router(app_state, &config);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    tracing::info!("Server listening on {}", addr);
    if config.server.enable_docs {
        tracing::info!("OpenAPI document available at http://{}/api-docs/openapi.json", addr);
    } else {
        tracing::info!("API documentation disabled (enable_docs=false)");
    }

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
