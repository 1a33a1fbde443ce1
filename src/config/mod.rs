//! Configuration module for the colloquy server
//!
//! This module handles server configuration from various sources: YAML files and
//! environment variables. Environment variables always override YAML values.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

/// Server configuration
///
/// Contains all configuration needed to run the colloquy server, including:
/// - Server settings (host, port)
/// - Provider API keys (Deepgram, Groq, Tavily)
/// - Turn-taking tuning knobs (debounce, heartbeat, VAD thresholds)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Provider API keys
    pub deepgram_api_key: Option<String>,
    /// Alternate Deepgram credential used when the primary key keeps failing
    pub deepgram_fallback_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub tavily_api_key: Option<String>,

    // Turn-taking tuning
    /// Delay after a VAD speech_end before the turn is finalized, absorbing
    /// trailing recognizer finalization latency.
    pub turn_debounce_ms: u64,
    /// Interval of the global sweep that catches sessions whose audio frames
    /// simply stopped arriving.
    pub heartbeat_interval_ms: u64,
    /// Silence (no audio frames) after which the heartbeat forces a turn end.
    pub turn_end_silence_ms: u64,
    /// Consecutive sub-threshold frames before the VAD declares speech over.
    pub vad_hangover_frames: u32,
    /// Mean-square energy above which a frame counts as speech.
    pub vad_energy_threshold: f32,
    /// Minimum characters the unstable transcript must carry to stand in for
    /// an empty stable transcript at turn finalization.
    pub interim_fallback_min_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            deepgram_api_key: None,
            deepgram_fallback_api_key: None,
            groq_api_key: None,
            tavily_api_key: None,
            turn_debounce_ms: 2500,
            heartbeat_interval_ms: 200,
            turn_end_silence_ms: 800,
            vad_hangover_frames: 8,
            vad_energy_threshold: 0.003,
            interim_fallback_min_chars: 2,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. YAML file values
    /// 3. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn turn_debounce(&self) -> Duration {
        Duration::from_millis(self.turn_debounce_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn vad_config(&self) -> crate::core::audio::VadConfig {
        crate::core::audio::VadConfig {
            energy_threshold: self.vad_energy_threshold,
            hangover_frames: self.vad_hangover_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn cleanup_env_vars() {
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("DEEPGRAM_API_KEY");
        env::remove_var("DEEPGRAM_FALLBACK_API_KEY");
        env::remove_var("GROQ_API_KEY");
        env::remove_var("TAVILY_API_KEY");
        env::remove_var("TURN_DEBOUNCE_MS");
        env::remove_var("HEARTBEAT_INTERVAL_MS");
        env::remove_var("TURN_END_SILENCE_MS");
        env::remove_var("VAD_HANGOVER_FRAMES");
        env::remove_var("VAD_ENERGY_THRESHOLD");
        env::remove_var("INTERIM_FALLBACK_MIN_CHARS");
    }

    #[test]
    fn test_address_format() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(config.address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_defaults_match_tuning_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.turn_debounce_ms, 2500);
        assert_eq!(config.heartbeat_interval_ms, 200);
        assert_eq!(config.turn_end_silence_ms, 800);
        assert_eq!(config.vad_hangover_frames, 8);
        assert_eq!(config.interim_fallback_min_chars, 2);
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 9090

providers:
  deepgram_api_key: "yaml-dg-key"
  groq_api_key: "yaml-groq-key"

turn:
  debounce_ms: 1500
  end_silence_ms: 600
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.deepgram_api_key, Some("yaml-dg-key".to_string()));
        assert_eq!(config.groq_api_key, Some("yaml-groq-key".to_string()));
        assert_eq!(config.turn_debounce_ms, 1500);
        assert_eq!(config.turn_end_silence_ms, 600);
        // Defaults for everything else
        assert_eq!(config.heartbeat_interval_ms, 200);
        assert_eq!(config.vad_hangover_frames, 8);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_env_overrides_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 9090

providers:
  deepgram_api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        env::set_var("HOST", "0.0.0.0");
        env::set_var("DEEPGRAM_API_KEY", "env-key");

        let config = ServerConfig::from_file(&config_path).unwrap();

        // ENV overrides YAML
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.deepgram_api_key, Some("env-key".to_string()));
        // YAML value used when no ENV
        assert_eq!(config.port, 9090);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_zero_heartbeat() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
turn:
  heartbeat_interval_ms: 0
"#,
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());

        cleanup_env_vars();
    }
}
