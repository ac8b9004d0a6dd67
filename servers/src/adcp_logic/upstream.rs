//! Instrument-facing ingest: a websocket that streams JSON ensembles and a one-shot
//! upload endpoint. Both hand the raw bytes to the hub, which decodes and validates them.

use crate::adcp_logic::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use lib_adcp::core::hub::HubHandle;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_INSTRUMENT_ID: AtomicUsize = AtomicUsize::new(1);

pub async fn instrument_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_instrument(socket, state.hub))
}

/// Accepts one ensemble per request body.
pub async fn ensemble_upload_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match state.hub.ingest_bytes(&body) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted".to_string()),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn handle_instrument(mut socket: WebSocket, hub: HubHandle) {
    let instrument_id = NEXT_INSTRUMENT_ID.fetch_add(1, Ordering::Relaxed);
    log::info!("Instrument {} connected", instrument_id);

    let mut accepted = 0usize;
    let mut rejected = 0usize;

    while let Some(msg) = socket.recv().await {
        let result = match msg {
            Ok(Message::Text(text)) => hub.ingest_bytes(text.as_str().as_bytes()),
            Ok(Message::Binary(bytes)) => hub.ingest_bytes(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Instrument {} read failed: {}", instrument_id, e);
                break;
            }
        };
        match result {
            Ok(()) => accepted += 1,
            Err(_) => rejected += 1,
        }
    }

    log::info!(
        "Instrument {} disconnected ({} ensembles accepted, {} rejected)",
        instrument_id,
        accepted,
        rejected
    );
}
