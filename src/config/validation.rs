use super::ServerConfig;

/// Validate the final merged configuration
///
/// Rejects values that would make the turn-taking machinery inert: a zero
/// heartbeat would spin, a zero debounce defeats its purpose, and a VAD
/// threshold outside (0, 1] cannot classify normalized audio.
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.heartbeat_interval_ms == 0 {
        return Err("HEARTBEAT_INTERVAL_MS must be greater than zero".into());
    }

    if config.turn_end_silence_ms == 0 {
        return Err("TURN_END_SILENCE_MS must be greater than zero".into());
    }

    if config.turn_debounce_ms == 0 {
        return Err("TURN_DEBOUNCE_MS must be greater than zero".into());
    }

    if !(config.vad_energy_threshold > 0.0 && config.vad_energy_threshold <= 1.0) {
        return Err(format!(
            "VAD_ENERGY_THRESHOLD must be in (0, 1], got {}",
            config.vad_energy_threshold
        )
        .into());
    }

    if config.vad_hangover_frames == 0 {
        return Err("VAD_HANGOVER_FRAMES must be greater than zero".into());
    }

    Ok(())
}
