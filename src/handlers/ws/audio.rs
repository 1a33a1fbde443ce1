//! Binary audio frame path.
//!
//! Every inbound frame runs the full local chain synchronously (decode,
//! gate, VAD) and is forwarded raw to the streaming recognizer. The gate
//! only informs the VAD; the recognizer always sees the original frame.

use std::sync::Arc;

use bytes::Bytes;

use crate::core::audio::{decode_pcm16, VadEvent};
use crate::core::session::Session;
use crate::core::stt::RecognizerChannel;
use crate::core::turn::TurnEngine;

pub async fn handle_audio_frame(
    engine: &Arc<TurnEngine>,
    session: &Arc<Session>,
    recognizer: Option<&RecognizerChannel>,
    frame: Vec<u8>,
) {
    session.touch_audio();

    let samples = decode_pcm16(&frame);
    let gated = session.gate.lock().process(samples);
    let event = session.vad.lock().process(&gated);

    match event {
        Some(VadEvent::SpeechStart) => engine.on_speech_start(session).await,
        Some(VadEvent::SpeechEnd) => engine.on_speech_end(session),
        None => {}
    }

    if let Some(recognizer) = recognizer {
        recognizer.send_audio(Bytes::from(frame)).await;
    }
}
