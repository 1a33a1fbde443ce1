//! Text control message path.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::session::Session;
use crate::core::turn::TurnEngine;

use super::messages::IncomingMessage;

/// Parse and dispatch one control message. Malformed JSON is logged and
/// ignored; the connection stays up.
pub async fn handle_command(engine: &Arc<TurnEngine>, session: &Arc<Session>, raw: &str) {
    let message: IncomingMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(error) => {
            warn!("Session {}: ignoring malformed control message: {error}", session.id);
            return;
        }
    };

    match message {
        IncomingMessage::ContextUpdate { payload } => {
            let version = session.set_dynamic_instruction(payload.content);
            debug!("Session {}: dynamic instruction now v{version}", session.id);
        }
        IncomingMessage::DebugInput { text } => {
            engine.on_debug_input(session, text).await;
        }
        IncomingMessage::PlaybackComplete => {
            engine.on_playback_complete(session).await;
        }
        IncomingMessage::StartInterview => {
            engine.start_interview(session).await;
        }
        IncomingMessage::EndInterview => {
            engine.end_interview(session).await;
        }
    }
}
