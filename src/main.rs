use std::sync::Arc;

use roomkeys::{
    auth::IdentityKey,
    config::Config,
    http::{self, AppState},
    room::{
        store::{spawn_reaper, MemoryRoomStore, RoomStore, SqliteRoomStore},
        RoomManager,
    },
    telemetry,
    util::clock::{Clock, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(telemetry::DEFAULT_FILTER);
    let config = Config::from_env();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn RoomStore> = match &config.database_url {
        Some(url) => {
            let store = SqliteRoomStore::connect(url, clock.clone()).await?;
            tracing::info!("using sqlite room store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, keeping rooms in memory");
            Arc::new(MemoryRoomStore::new(clock.clone()))
        }
    };
    spawn_reaper(store.clone(), clock.clone(), config.reap_interval);

    let identity = match config.auth_key {
        Some(key) => IdentityKey::new(key),
        None => {
            tracing::warn!("AUTH_HMAC_KEY not set or invalid, using a random per-process key");
            IdentityKey::random()
        }
    };

    let state = AppState {
        rooms: RoomManager::new(store, clock.clone(), config.room_policy.clone()),
        identity,
        clock,
    };
    let app = http::router(state, &config.cors_origin);

    tracing::info!(addr = %config.http_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
