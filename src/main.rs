use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kutsu::config::Config;
use kutsu::db::RedisStore;
use kutsu::error::Error;
use kutsu::handlers::{router, AppState};
use kutsu::model::{EventStore, InMemoryStore};

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting event RSVP server");

    let config = Config::load()?;

    // Connect to Redis, falling back to an in-memory store so the
    // service still comes up without one
    let store: Arc<dyn EventStore> = match RedisStore::new(&config.redis_url) {
        Ok(redis_store) => {
            info!("Connected to Redis successfully");
            Arc::new(redis_store)
        }
        Err(e) => {
            error!("Failed to connect to Redis: {e}");
            info!("Using in-memory store as fallback");
            Arc::new(InMemoryStore::default())
        }
    };

    let state = AppState { store };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::from)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::from)?;

    Ok(())
}

/// Wait for a termination signal
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        // SIGTERM (sent by orchestrators on shutdown)
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to create SIGTERM signal handler");
        // SIGINT (Ctrl+C)
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to create SIGINT signal handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal, shutting down");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal, shutting down");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to create Ctrl+C signal handler");
        info!("Received Ctrl+C signal, shutting down");
    }
}
