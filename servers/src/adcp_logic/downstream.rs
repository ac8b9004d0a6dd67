use crate::adcp_logic::config::Settings;
use crate::adcp_logic::state::AppState;
use crate::adcp_logic::transport::{WsSink, WsSource};
use crate::adcp_logic::upstream;
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures_util::StreamExt;
use lib_adcp::core::hub::HubHandle;
use lib_adcp::core::pump::run_pump;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/wsAdcp", get(display_ws_handler))
        .route("/ws", get(upstream::instrument_ws_handler))
        .route("/ensemble", post(upstream::ensemble_upload_handler))
        .route("/debug", get(debug_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let app = router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    if let Some((cert_path, key_path)) = settings.tls {
        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .with_context(|| format!("Failed to load TLS configuration from {}", cert_path.display()))?;

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await.ok();
            log::info!("Display server shutting down.");
            signal_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        log::info!("Display server listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        log::info!("Display server listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await.ok();
                log::info!("Display server shutting down.");
            })
            .await?;
    }
    Ok(())
}

async fn display_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_display(socket, state.hub))
}

async fn handle_display(socket: WebSocket, hub: HubHandle) {
    let subscription = hub.subscribe();
    log::info!("Display client {} connected", subscription.id);

    let (sink, stream) = socket.split();
    run_pump(&hub, subscription, WsSink(sink), WsSource(stream)).await;
}

async fn debug_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.hub.snapshot().await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Hub not running").into_response(),
    }
}

async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.hub.stats().await {
        Some(stats) => Json(stats).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Hub not running").into_response(),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
