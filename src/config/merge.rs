use std::env;

use super::ServerConfig;
use super::yaml::YamlConfig;

/// Merge YAML configuration with environment variable overrides
///
/// Environment variables always win. YAML values fill the gaps, and built-in
/// defaults cover anything neither source provides.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let turn = yaml.turn.unwrap_or_default();
    let defaults = ServerConfig::default();

    let host = env::var("HOST")
        .ok()
        .or(server.host)
        .unwrap_or(defaults.host);
    let port = match env::var("PORT") {
        Ok(v) => v
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {e}"))?,
        Err(_) => server.port.unwrap_or(defaults.port),
    };

    let deepgram_api_key = env::var("DEEPGRAM_API_KEY").ok().or(providers.deepgram_api_key);
    let deepgram_fallback_api_key = env::var("DEEPGRAM_FALLBACK_API_KEY")
        .ok()
        .or(providers.deepgram_fallback_api_key);
    let groq_api_key = env::var("GROQ_API_KEY").ok().or(providers.groq_api_key);
    let tavily_api_key = env::var("TAVILY_API_KEY").ok().or(providers.tavily_api_key);

    let turn_debounce_ms = merge_u64("TURN_DEBOUNCE_MS", turn.debounce_ms, defaults.turn_debounce_ms)?;
    let heartbeat_interval_ms = merge_u64(
        "HEARTBEAT_INTERVAL_MS",
        turn.heartbeat_interval_ms,
        defaults.heartbeat_interval_ms,
    )?;
    let turn_end_silence_ms = merge_u64(
        "TURN_END_SILENCE_MS",
        turn.end_silence_ms,
        defaults.turn_end_silence_ms,
    )?;

    let vad_hangover_frames = match env::var("VAD_HANGOVER_FRAMES") {
        Ok(v) => v
            .parse::<u32>()
            .map_err(|e| format!("Invalid VAD_HANGOVER_FRAMES: {e}"))?,
        Err(_) => turn.vad_hangover_frames.unwrap_or(defaults.vad_hangover_frames),
    };
    let vad_energy_threshold = match env::var("VAD_ENERGY_THRESHOLD") {
        Ok(v) => v
            .parse::<f32>()
            .map_err(|e| format!("Invalid VAD_ENERGY_THRESHOLD: {e}"))?,
        Err(_) => turn
            .vad_energy_threshold
            .unwrap_or(defaults.vad_energy_threshold),
    };
    let interim_fallback_min_chars = match env::var("INTERIM_FALLBACK_MIN_CHARS") {
        Ok(v) => v
            .parse::<usize>()
            .map_err(|e| format!("Invalid INTERIM_FALLBACK_MIN_CHARS: {e}"))?,
        Err(_) => turn
            .interim_fallback_min_chars
            .unwrap_or(defaults.interim_fallback_min_chars),
    };

    Ok(ServerConfig {
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
    })
}

fn merge_u64(env_name: &str, yaml_value: Option<u64>, default: u64) -> Result<u64, String> {
    match env::var(env_name) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|e| format!("Invalid {env_name}: {e}")),
        Err(_) => Ok(yaml_value.unwrap_or(default)),
    }
}
