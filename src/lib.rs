pub mod catalog;
pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::{Config, NotificationBackend, StorageBackend};
use crate::services::ledger::BookingLedger;
use crate::services::notification::{DisabledNotifier, LogNotifier, Notifier, RedisNotifier};
use crate::store::{BookingStore, MemoryStore, PostgresStore, RedisStore, UserStore};

// Shared state for every request
pub struct AppState {
    pub ledger: BookingLedger,
    pub catalog: Catalog,
    pub config: Config,
}

impl AppState {
    /// Connects the storage and notification backends the configuration names.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let catalog = match &config.catalog.path {
            Some(path) => {
                info!("Loading catalog from {}", path);
                Catalog::from_json_file(path)?
            }
            None => Catalog::builtin(),
        };

        let mut redis_conn = None;
        let (bookings, users): (Arc<dyn BookingStore>, Arc<dyn UserStore>) =
            match config.storage.backend {
                StorageBackend::Postgres => {
                    let store = Arc::new(
                        PostgresStore::connect(&config.database.url, config.database.pool_size).await?,
                    );
                    info!("Database connected");
                    store.run_migrations().await?;
                    let bookings: Arc<dyn BookingStore> = store.clone();
                    let users: Arc<dyn UserStore> = store;
                    (bookings, users)
                }
                StorageBackend::Redis => {
                    let store = Arc::new(RedisStore::connect(&config.redis.url).await?);
                    info!("Redis connected");
                    redis_conn = Some(store.connection());
                    let bookings: Arc<dyn BookingStore> = store.clone();
                    let users: Arc<dyn UserStore> = store;
                    (bookings, users)
                }
                StorageBackend::Memory => {
                    warn!("Using in-memory storage; bookings are lost on restart");
                    let store = Arc::new(MemoryStore::new());
                    let bookings: Arc<dyn BookingStore> = store.clone();
                    let users: Arc<dyn UserStore> = store;
                    (bookings, users)
                }
            };

        let notifier: Arc<dyn Notifier> = match config.notification.backend {
            NotificationBackend::Redis => {
                let conn = match redis_conn {
                    Some(conn) => conn,
                    None => {
                        redis::Client::open(config.redis.url.as_str())?
                            .get_multiplexed_async_connection()
                            .await?
                    }
                };
                info!("Publishing notifications on channel {}", config.notification.channel);
                Arc::new(RedisNotifier::new(conn, config.notification.channel.clone()))
            }
            NotificationBackend::Log => Arc::new(LogNotifier),
            NotificationBackend::Disabled => Arc::new(DisabledNotifier),
        };

        let ledger = BookingLedger::new(bookings, users, notifier)
            .with_storage_timeout(config.storage.timeout())
            .with_bcrypt_cost(config.auth.bcrypt_cost);

        Ok(Self::from_parts(config, ledger, catalog))
    }

    pub fn from_parts(config: Config, ledger: BookingLedger, catalog: Catalog) -> Arc<Self> {
        Arc::new(Self { ledger, catalog, config })
    }
}

// Liveness plus the backends this instance was started with
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "storage": state.config.storage.backend,
        "notifications": state.config.notification.backend,
    }))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "CineBooker API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
