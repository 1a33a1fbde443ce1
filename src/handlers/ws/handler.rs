//! WebSocket connection lifecycle.
//!
//! One session per connection. A dedicated writer task drains the
//! session's outbound channel so any part of the pipeline can send to the
//! client without holding the socket; a pump task feeds recognizer events
//! into the turn engine; the receive loop below handles client frames.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::session::Session;
use crate::core::stt::RecognizerChannel;
use crate::state::AppState;

use super::audio;
use super::commands;
use super::messages::OutgoingMessage;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    info!("Session {id}: connected");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutgoingMessage>(256);
    let session = Arc::new(Session::new(id, state.config.vad_config(), outbound_tx));
    state.registry.insert(Arc::clone(&session)).await;

    let (mut ws_sink, mut ws_source) = socket.split();

    // Writer: serialize outgoing messages onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(error) => warn!("Outgoing message serialization failed: {error}"),
            }
        }
        let _ = ws_sink.close().await;
    });

    session
        .send(OutgoingMessage::SessionStarted {
            session_id: id.to_string(),
        })
        .await;

    // Open the streaming recognizer if a key is configured. Without one
    // the session still works through debug_input.
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let recognizer = match state.config.deepgram_api_key.as_deref() {
        Some(key) => match RecognizerChannel::connect(key, event_tx).await {
            Ok(channel) => Some(channel),
            Err(error) => {
                warn!("Session {id}: recognizer connect failed: {error}");
                session
                    .send(OutgoingMessage::Error {
                        message: "Speech recognition is unavailable.".to_string(),
                    })
                    .await;
                None
            }
        },
        None => None,
    };

    // Pump: recognizer events into the turn engine.
    let pump = {
        let engine = Arc::clone(&state.engine);
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                engine.on_transcript(&session, event).await;
            }
        })
    };

    while let Some(frame) = ws_source.next().await {
        match frame {
            Ok(Message::Binary(pcm)) => {
                audio::handle_audio_frame(&state.engine, &session, recognizer.as_ref(), pcm).await;
            }
            Ok(Message::Text(raw)) => {
                commands::handle_command(&state.engine, &session, &raw).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                warn!("Session {id}: socket error: {error}");
                break;
            }
        }
    }

    // Teardown: dropping the recognizer handle closes the upstream
    // connection, which ends the pump once its channel drains.
    state.registry.remove(&id).await;
    session.bump_epoch();
    session.cancel_debounce();
    drop(recognizer);
    pump.abort();
    writer.abort();
    info!("Session {id}: disconnected");
}
