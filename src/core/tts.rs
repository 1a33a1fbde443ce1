//! Speech synthesis.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

const DEEPGRAM_SPEAK_URL: &str =
    "https://api.deepgram.com/v1/speak?model=aura-asteria-en&encoding=linear16&sample_rate=16000&container=wav";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TTS returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS returned an empty audio body")]
    EmptyAudio,
}

/// Turns a text segment into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, TtsError>;
}

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Deepgram speak API backend with retry and key failover.
pub struct DeepgramSynthesizer {
    client: reqwest::Client,
    api_key: String,
    fallback_api_key: Option<String>,
}

impl DeepgramSynthesizer {
    pub fn new(api_key: String, fallback_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            fallback_api_key,
        }
    }

    async fn request_with_key(&self, text: &str, api_key: &str) -> Result<Bytes, TtsError> {
        let response = self
            .client
            .post(DEEPGRAM_SPEAK_URL)
            .header("Authorization", format!("Token {api_key}"))
            .timeout(REQUEST_TIMEOUT)
            .json(&SpeakRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(audio)
    }

    /// Whether a failure warrants switching to the fallback key.
    fn is_key_failure(error: &TtsError) -> bool {
        matches!(
            error,
            TtsError::Status {
                status: 401 | 403 | 429,
                ..
            }
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, TtsError> {
        let mut api_key = self.api_key.as_str();
        let mut last_error = TtsError::EmptyAudio;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = Duration::from_millis(250 * (1 << (attempt - 1)));
                tokio::time::sleep(backoff).await;
            }

            match self.request_with_key(text, api_key).await {
                Ok(audio) => {
                    debug!("Synthesized {} bytes for {} chars", audio.len(), text.len());
                    return Ok(audio);
                }
                Err(error) => {
                    warn!("TTS attempt {} failed: {error}", attempt + 1);
                    if Self::is_key_failure(&error) {
                        if let Some(fallback) = &self.fallback_api_key {
                            api_key = fallback.as_str();
                        }
                    }
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }
}
