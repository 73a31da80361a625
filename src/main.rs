use colabri_pages::config::Config;
use colabri_pages::routes::create_app;
use colabri_pages::state::AppState;
use colabri_pages::store::{CachedDocumentStore, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use std::panic;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "colabri_pages=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let store = build_store(&config).await;
    info!("Using {} page store", store.kind());

    let state = Arc::new(AppState::new(config.clone(), store));
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    state.shutdown().await;
    info!("Server stopped");
}

/// Postgres behind a cache when a database is configured, memory otherwise
async fn build_store(config: &Config) -> Arc<dyn DocumentStore> {
    let Some(db_url) = &config.db_url else {
        warn!("No database URL configured - pages are kept in memory only");
        return Arc::new(MemoryDocumentStore::new());
    };

    match PgDocumentStore::connect(db_url).await {
        Ok(pg) => {
            info!("Database initialized successfully");
            Arc::new(CachedDocumentStore::new(Arc::new(pg), config.doc_cache_ttl()))
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            warn!("Falling back to the in-memory page store");
            Arc::new(MemoryDocumentStore::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
