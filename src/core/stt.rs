//! Streaming speech recognition.
//!
//! Each session holds one [`RecognizerChannel`]: a live Deepgram websocket
//! that receives the client's PCM frames and emits interim and final
//! transcript events back through an mpsc channel.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};

use crate::core::transcript::TranscriptEvent;

const DEEPGRAM_LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen?\
encoding=linear16&sample_rate=16000&channels=1&model=nova-2&\
interim_results=true&punctuate=true&smart_format=true";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SttError {
    #[error("Recognizer connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Recognizer connect timed out")]
    ConnectTimeout,

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    channel: Option<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

/// Parse one recognizer frame into a transcript event, if it carries text.
fn parse_listen_frame(raw: &str) -> Option<TranscriptEvent> {
    let response: ListenResponse = serde_json::from_str(raw).ok()?;
    if response.kind != "Results" {
        return None;
    }
    let text = response
        .channel?
        .alternatives
        .into_iter()
        .next()?
        .transcript;
    if text.trim().is_empty() {
        return None;
    }
    Some(TranscriptEvent {
        text,
        is_final: response.is_final,
    })
}

/// Handle to a live recognizer connection.
///
/// Dropping the handle closes the audio channel, which makes the writer
/// task send the close frame and both pump tasks wind down.
pub struct RecognizerChannel {
    audio_tx: mpsc::Sender<Bytes>,
}

impl RecognizerChannel {
    /// Open a recognizer stream. Transcript events are delivered on
    /// `events` until the upstream closes.
    pub async fn connect(
        api_key: &str,
        events: mpsc::Sender<TranscriptEvent>,
    ) -> Result<Self, SttError> {
        let mut request = DEEPGRAM_LISTEN_URL.into_client_request()?;
        let auth = format!("Token {api_key}")
            .parse()
            .map_err(|_| SttError::InvalidApiKey)?;
        request.headers_mut().insert("Authorization", auth);

        let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| SttError::ConnectTimeout)??;
        let (mut sink, mut source) = stream.split();

        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(256);

        // Writer: forward PCM frames upstream, then close the stream when
        // the session ends.
        tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                if sink.send(Message::Binary(frame.to_vec())).await.is_err() {
                    break;
                }
            }
            let close = Message::Text(r#"{"type":"CloseStream"}"#.to_string());
            let _ = sink.send(close).await;
            let _ = sink.close().await;
        });

        // Reader: parse transcript frames and fan them out.
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(raw)) => {
                        if let Some(event) = parse_listen_frame(&raw) {
                            if events.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("Recognizer stream closed");
        });

        Ok(Self { audio_tx })
    }

    /// Forward one PCM frame upstream. Frames sent after the connection
    /// drops are discarded.
    pub async fn send_audio(&self, frame: Bytes) {
        if self.audio_tx.send(frame).await.is_err() {
            warn!("Recognizer channel closed, audio frame dropped");
        }
    }
}
