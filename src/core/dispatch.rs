//! Reply delivery.
//!
//! A finished reply is split into sentence-bounded segments, synthesized
//! one at a time, and streamed to the client. Every suspension point
//! re-checks the session's reply epoch so a barge-in mid-stream stops
//! delivery without tearing anything down.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use crate::core::session::Session;
use crate::core::tts::SpeechSynthesizer;
use crate::handlers::ws::messages::OutgoingMessage;

/// Upper bound on one synthesized segment.
pub const MAX_SEGMENT_CHARS: usize = 250;

/// Pause between segment sends so the client buffer fills smoothly.
const SEGMENT_PACING: Duration = Duration::from_millis(50);

/// Split a reply into segments of at most [`MAX_SEGMENT_CHARS`] characters,
/// breaking at sentence boundaries where possible and at word boundaries
/// inside oversized sentences.
pub fn split_into_segments(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in text.trim().chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    let mut segments: Vec<String> = Vec::new();
    for sentence in sentences {
        if sentence.chars().count() > MAX_SEGMENT_CHARS {
            segments.extend(split_long_sentence(&sentence));
            continue;
        }
        match segments.last_mut() {
            Some(last)
                if last.chars().count() + 1 + sentence.chars().count() <= MAX_SEGMENT_CHARS =>
            {
                last.push(' ');
                last.push_str(&sentence);
            }
            _ => segments.push(sentence),
        }
    }
    segments
}

/// Break a single oversized sentence at word boundaries.
fn split_long_sentence(sentence: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > MAX_SEGMENT_CHARS && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Synthesize and stream a reply to the client.
///
/// `epoch` is the reply epoch captured when the turn was dispatched. The
/// stream stops silently the moment the session's live epoch moves past
/// it; `tts_complete` is only sent when the full reply arrived unbarged.
pub async fn stream_reply(
    session: &Arc<Session>,
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    epoch: u64,
) {
    let segments = split_into_segments(text);
    let total = segments.len();

    for (index, segment) in segments.iter().enumerate() {
        if session.epoch() != epoch {
            debug!("Reply epoch {epoch} superseded before segment {index}, stopping");
            return;
        }

        let audio = match synthesizer.synthesize(segment).await {
            Ok(audio) => audio,
            Err(error) => {
                warn!("Segment {index} synthesis failed, skipping: {error}");
                continue;
            }
        };

        // The synthesis await is a suspension point; re-check before send.
        if session.epoch() != epoch {
            debug!("Reply epoch {epoch} superseded mid-synthesis, stopping");
            return;
        }

        session.record_tts_first_chunk();
        session
            .send(OutgoingMessage::TtsAudio {
                audio: BASE64.encode(&audio),
                index,
                total,
                epoch,
            })
            .await;

        if index + 1 < total {
            tokio::time::sleep(SEGMENT_PACING).await;
        }
    }

    if session.epoch() == epoch {
        session.send(OutgoingMessage::TtsComplete { epoch }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reply_is_one_segment() {
        let segments = split_into_segments("Hello there. How are you?");
        assert_eq!(segments, vec!["Hello there. How are you?"]);
    }

    #[test]
    fn test_segments_respect_sentence_boundaries() {
        let first = "a".repeat(200);
        let second = "b".repeat(200);
        let text = format!("{first}. {second}.");
        let segments = split_into_segments(&text);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].starts_with('a'));
        assert!(segments[1].starts_with('b'));
        assert!(segments.iter().all(|s| s.chars().count() <= MAX_SEGMENT_CHARS));
    }

    #[test]
    fn test_oversized_sentence_splits_at_words() {
        let text = std::iter::repeat("word")
            .take(100)
            .collect::<Vec<_>>()
            .join(" ");
        let segments = split_into_segments(&text);
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.chars().count() <= MAX_SEGMENT_CHARS));
        assert!(segments.iter().all(|s| !s.starts_with(' ')));
    }

    #[test]
    fn test_empty_reply_produces_no_segments() {
        assert!(split_into_segments("").is_empty());
        assert!(split_into_segments("   ").is_empty());
    }
}
