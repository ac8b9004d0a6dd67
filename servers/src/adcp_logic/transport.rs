//! Websocket halves adapted to the hub's pump traits.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lib_adcp::core::pump::{InboundSource, OutboundSink};
use lib_adcp::errors::PumpError;

pub struct WsSink(pub SplitSink<WebSocket, Message>);

pub struct WsSource(pub SplitStream<WebSocket>);

impl OutboundSink for WsSink {
    async fn send(&mut self, payload: Bytes) -> Result<(), PumpError> {
        let text = std::str::from_utf8(&payload).map_err(|e| PumpError::Write(e.to_string()))?;
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| PumpError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        // The peer may already be gone; nothing useful to do with the error.
        let _ = self.0.send(Message::Close(None)).await;
        let _ = self.0.close().await;
    }
}

impl InboundSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Bytes, PumpError>> {
        match self.0.next().await? {
            Ok(Message::Close(_)) => None,
            Ok(Message::Text(text)) => Some(Ok(Bytes::copy_from_slice(text.as_str().as_bytes()))),
            Ok(Message::Binary(bytes)) => Some(Ok(bytes)),
            Ok(_) => Some(Ok(Bytes::new())),
            Err(e) => Some(Err(PumpError::Read(e.to_string()))),
        }
    }
}
