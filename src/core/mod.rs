//! Core engine: audio analysis, turn detection, and the reply pipeline.

pub mod audio;
pub mod dispatch;
pub mod llm;
pub mod search;
pub mod session;
pub mod speech_format;
pub mod stt;
pub mod transcript;
pub mod tts;
pub mod turn;
