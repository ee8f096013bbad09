//! duel-back binary entrypoint wiring configuration, storage supervision and the REST layer.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duel_back::{
    config::{self, AppConfig, StorageMode},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage_supervisor(&app_state).await;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config::server_port()));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the background connection loop for the configured durable backend.
async fn spawn_storage_supervisor(state: &SharedState) {
    match state.storage_config().mode {
        StorageMode::Memory => info!("using in-memory room storage"),
        StorageMode::Mongo => backends::spawn_mongo(state.clone()).await,
        StorageMode::Couch => backends::spawn_couch(state.clone()),
    }
}

mod backends {
    use tracing::error;

    use duel_back::state::SharedState;

    #[cfg(feature = "mongo-store")]
    pub async fn spawn_mongo(state: SharedState) {
        use std::sync::Arc;

        use duel_back::{
            dao::{
                room_store::{
                    RoomStore,
                    mongodb::{MongoConfig, MongoRoomStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        let config = match MongoConfig::from_env().await {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "invalid MongoDB configuration; staying in degraded mode");
                return;
            }
        };

        tokio::spawn(storage_supervisor::run(state, move || {
            let config = config.clone();
            async move {
                let store = MongoRoomStore::connect(config).await?;
                Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
            }
        }));
    }

    #[cfg(not(feature = "mongo-store"))]
    pub async fn spawn_mongo(_state: SharedState) {
        error!("built without the mongo-store feature; staying in degraded mode");
    }

    #[cfg(feature = "couch-store")]
    pub fn spawn_couch(state: SharedState) {
        use std::sync::Arc;

        use duel_back::{
            dao::{
                room_store::{
                    RoomStore,
                    couchdb::{CouchConfig, CouchRoomStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        let config = match CouchConfig::from_env() {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "invalid CouchDB configuration; staying in degraded mode");
                return;
            }
        };

        tokio::spawn(storage_supervisor::run(state, move || {
            let config = config.clone();
            async move {
                let store = CouchRoomStore::connect(config).await?;
                Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
            }
        }));
    }

    #[cfg(not(feature = "couch-store"))]
    pub fn spawn_couch(_state: SharedState) {
        error!("built without the couch-store feature; staying in degraded mode");
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
