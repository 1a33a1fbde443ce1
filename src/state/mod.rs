//! Shared application state handed to every route.

use std::sync::Arc;

use tracing::warn;

use crate::config::ServerConfig;
use crate::core::llm::{GroqGenerator, ReplyGenerator};
use crate::core::search::{SearchProvider, TavilySearch};
use crate::core::session::SessionRegistry;
use crate::core::tts::{DeepgramSynthesizer, SpeechSynthesizer};
use crate::core::turn::TurnEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<SessionRegistry>,
    pub engine: Arc<TurnEngine>,
}

impl AppState {
    /// Wire up production collaborators from the configuration.
    pub fn new(config: ServerConfig) -> Self {
        for (name, key) in [
            ("DEEPGRAM_API_KEY", &config.deepgram_api_key),
            ("GROQ_API_KEY", &config.groq_api_key),
            ("TAVILY_API_KEY", &config.tavily_api_key),
        ] {
            if key.is_none() {
                warn!("{name} is not set; the corresponding provider will be rejected upstream");
            }
        }

        let generator = Arc::new(GroqGenerator::new(
            config.groq_api_key.clone().unwrap_or_default(),
        ));
        let search = Arc::new(TavilySearch::new(
            config.tavily_api_key.clone().unwrap_or_default(),
        ));
        let synthesizer = Arc::new(DeepgramSynthesizer::new(
            config.deepgram_api_key.clone().unwrap_or_default(),
            config.deepgram_fallback_api_key.clone(),
        ));
        Self::with_collaborators(config, generator, search, synthesizer)
    }

    /// Wire up explicit collaborators. Tests use this to swap in mocks.
    pub fn with_collaborators(
        config: ServerConfig,
        generator: Arc<dyn ReplyGenerator>,
        search: Arc<dyn SearchProvider>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let engine = Arc::new(TurnEngine::new(&config, generator, search, synthesizer));
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            engine,
        }
    }
}
