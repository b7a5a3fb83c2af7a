use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runway::{
    config::SessionConfig,
    reward::InMemoryProfileStore,
    session::Session,
    theme::ThemeCatalog,
    transport::ChannelTransport,
    ws::{self, WsState},
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting runway host...");

    let config = SessionConfig::from_env();
    let impostor = std::env::var("RUNWAY_IMPOSTOR")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let transport = Arc::new(ChannelTransport::new());
    let session = Session::new(
        config,
        transport.clone(),
        Arc::new(ThemeCatalog::default().with_impostor(impostor)),
        Arc::new(InMemoryProfileStore::new()),
    );

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(WsState { session, transport }));

    let addr: SocketAddr = std::env::var("RUNWAY_BIND")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 7575)));
    tracing::info!("Listening on ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
