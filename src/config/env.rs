use std::env;

use super::ServerConfig;
use super::validation;

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with sensible defaults.
    /// Also loads from .env file if present using dotenvy.
    ///
    /// # Errors
    /// Returns an error if environment variables are malformed or the final
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = ServerConfig::default();

        let host = env::var("HOST").unwrap_or(defaults.host);
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|e| format!("Invalid port number: {e}"))?,
            Err(_) => defaults.port,
        };

        // Provider API keys
        let deepgram_api_key = env::var("DEEPGRAM_API_KEY").ok();
        let deepgram_fallback_api_key = env::var("DEEPGRAM_FALLBACK_API_KEY").ok();
        let groq_api_key = env::var("GROQ_API_KEY").ok();
        let tavily_api_key = env::var("TAVILY_API_KEY").ok();

        // Turn-taking tuning
        let turn_debounce_ms = parse_env_u64("TURN_DEBOUNCE_MS")?.unwrap_or(defaults.turn_debounce_ms);
        let heartbeat_interval_ms =
            parse_env_u64("HEARTBEAT_INTERVAL_MS")?.unwrap_or(defaults.heartbeat_interval_ms);
        let turn_end_silence_ms =
            parse_env_u64("TURN_END_SILENCE_MS")?.unwrap_or(defaults.turn_end_silence_ms);
        let vad_hangover_frames = match env::var("VAD_HANGOVER_FRAMES") {
            Ok(v) => v
                .parse::<u32>()
                .map_err(|e| format!("Invalid VAD_HANGOVER_FRAMES: {e}"))?,
            Err(_) => defaults.vad_hangover_frames,
        };
        let vad_energy_threshold = match env::var("VAD_ENERGY_THRESHOLD") {
            Ok(v) => v
                .parse::<f32>()
                .map_err(|e| format!("Invalid VAD_ENERGY_THRESHOLD: {e}"))?,
            Err(_) => defaults.vad_energy_threshold,
        };
        let interim_fallback_min_chars = match env::var("INTERIM_FALLBACK_MIN_CHARS") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|e| format!("Invalid INTERIM_FALLBACK_MIN_CHARS: {e}"))?,
            Err(_) => defaults.interim_fallback_min_chars,
        };

        let config = ServerConfig {
            host,
            port,
            deepgram_api_key,
            deepgram_fallback_api_key,
            groq_api_key,
            tavily_api_key,
            turn_debounce_ms,
            heartbeat_interval_ms,
            turn_end_silence_ms,
            vad_hangover_frames,
            vad_energy_threshold,
            interim_fallback_min_chars,
        };

        validation::validate(&config)?;

        Ok(config)
    }
}

fn parse_env_u64(name: &str) -> Result<Option<u64>, String> {
    match env::var(name) {
        Ok(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|e| format!("Invalid {name}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cleanup() {
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("TURN_DEBOUNCE_MS");
        env::remove_var("VAD_ENERGY_THRESHOLD");
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup();
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.turn_debounce_ms, 2500);
        cleanup();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup();
        env::set_var("HOST", "127.0.0.1");
        env::set_var("PORT", "9999");
        env::set_var("TURN_DEBOUNCE_MS", "1000");
        env::set_var("VAD_ENERGY_THRESHOLD", "0.01");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9999);
        assert_eq!(config.turn_debounce_ms, 1000);
        assert!((config.vad_energy_threshold - 0.01).abs() < f32::EPSILON);

        cleanup();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup();
        env::set_var("PORT", "not-a-port");

        let result = ServerConfig::from_env();
        assert!(result.is_err());

        cleanup();
    }
}
