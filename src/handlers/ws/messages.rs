//! WebSocket message types
//!
//! This module defines all message types for the client connection: JSON
//! control messages in both directions, interleaved with raw binary audio
//! frames from the client. Audio segments going out always carry an
//! index/total/epoch triple so a receiver can detect gaps and staleness.

use serde::{Deserialize, Serialize};

use crate::core::session::TurnMetrics;

/// WebSocket message types for incoming control messages
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    /// Replace the session's dynamic system instruction.
    #[serde(rename = "context_update")]
    ContextUpdate { payload: ContextPayload },
    /// Inject text as if it were a finished user utterance, bypassing audio.
    #[serde(rename = "debug_input")]
    DebugInput { text: String },
    /// Client finished playing the full reply.
    #[serde(rename = "playback_complete")]
    PlaybackComplete,
    /// Enter testimonial interview mode and open with a seeded turn.
    #[serde(rename = "start_interview")]
    StartInterview,
    /// Leave interview mode; the agent speaks a closing line.
    #[serde(rename = "end_interview")]
    EndInterview,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ContextPayload {
    pub content: String,
}

/// WebSocket message types for outgoing messages
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "session_started")]
    SessionStarted { session_id: String },
    /// Broadcast promptly on every lifecycle transition.
    #[serde(rename = "state")]
    State { value: String },
    #[serde(rename = "transcript_user")]
    TranscriptUser { text: String, is_interim: bool },
    #[serde(rename = "transcript_assistant")]
    TranscriptAssistant { text: String },
    /// Sent before any cancellation side effects complete.
    #[serde(rename = "barge_in")]
    BargeIn,
    /// One speakable segment of the reply, base64-encoded audio.
    #[serde(rename = "tts_audio")]
    TtsAudio {
        audio: String,
        index: usize,
        total: usize,
        epoch: u64,
    },
    /// Terminal stream signal; only sent when the epoch is still current.
    #[serde(rename = "tts_complete")]
    TtsComplete { epoch: u64 },
    #[serde(rename = "metrics")]
    Metrics { turn_id: u64, data: TurnMetrics },
    #[serde(rename = "interview_end")]
    InterviewEnd,
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_context_update_parses() {
        let json = r#"{"type": "context_update", "payload": {"content": "be brief"}}"#;
        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        match msg {
            IncomingMessage::ContextUpdate { payload } => {
                assert_eq!(payload.content, "be brief");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_incoming_unknown_type_is_error() {
        let json = r#"{"type": "launch_missiles"}"#;
        assert!(serde_json::from_str::<IncomingMessage>(json).is_err());
    }

    #[test]
    fn test_outgoing_tts_audio_shape() {
        let msg = OutgoingMessage::TtsAudio {
            audio: "AAAA".to_string(),
            index: 1,
            total: 3,
            epoch: 7,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "tts_audio");
        assert_eq!(json["index"], 1);
        assert_eq!(json["total"], 3);
        assert_eq!(json["epoch"], 7);
    }

    #[test]
    fn test_outgoing_state_shape() {
        let msg = OutgoingMessage::State {
            value: "listening".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"state","value":"listening"}"#);
    }
}
