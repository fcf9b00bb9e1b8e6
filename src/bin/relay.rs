use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use roomkeys::{config::Config, telemetry, ws};
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(telemetry::DEFAULT_FILTER);
    let config = Config::from_env();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?);

    let app = ws::connection::router(Arc::new(ws::Hub::new()), cors);

    tracing::info!(addr = %config.relay_addr, "relay listening");
    let listener = tokio::net::TcpListener::bind(config.relay_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
