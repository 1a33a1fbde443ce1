use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Environment
/// variables can override any values specified here.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///
/// providers:
///   deepgram_api_key: "your-deepgram-key"
///   deepgram_fallback_api_key: "your-backup-key"
///   groq_api_key: "your-groq-key"
///   tavily_api_key: "your-tavily-key"
///
/// turn:
///   debounce_ms: 2500
///   heartbeat_interval_ms: 200
///   end_silence_ms: 800
///   vad_hangover_frames: 8
///   vad_energy_threshold: 0.003
///   interim_fallback_min_chars: 2
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub turn: Option<TurnYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub deepgram_api_key: Option<String>,
    pub deepgram_fallback_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TurnYaml {
    pub debounce_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub end_silence_ms: Option<u64>,
    pub vad_hangover_frames: Option<u32>,
    pub vad_energy_threshold: Option<f32>,
    pub interim_fallback_min_chars: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

providers:
  deepgram_api_key: "dg-key"
  groq_api_key: "groq-key"

turn:
  debounce_ms: 1500
  vad_hangover_frames: 10
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(9090));

        let providers = config.providers.unwrap();
        assert_eq!(providers.deepgram_api_key, Some("dg-key".to_string()));
        assert!(providers.tavily_api_key.is_none());

        let turn = config.turn.unwrap();
        assert_eq!(turn.debounce_ms, Some(1500));
        assert_eq!(turn.vad_hangover_frames, Some(10));
        assert!(turn.end_silence_ms.is_none());
    }

    #[test]
    fn test_parse_empty_yaml() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.providers.is_none());
        assert!(config.turn.is_none());
    }
}
