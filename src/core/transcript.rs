//! Transcript stitching for streaming recognition results.
//!
//! The external recognizer emits two kinds of partial results: unstable
//! interim guesses that are re-issued in full on every update, and stable
//! final segments that will never change. The stitcher merges both feeds
//! into a single accumulating buffer per session: interims replace, finals
//! are normalized and appended.

/// One event from the streaming recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Outcome of applying a [`TranscriptEvent`], used by callers that mirror
/// transcript updates to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StitchUpdate {
    /// The unstable buffer was replaced with this text.
    Interim(String),
    /// This normalized text was appended to the stable buffer.
    Final(String),
    /// The event was degenerate and dropped.
    Dropped,
}

/// Accumulated transcript state for one session.
#[derive(Debug, Default)]
pub struct TranscriptBuffers {
    /// Append-only within a turn; cleared at turn boundaries.
    pub stable: String,
    /// Replace-only; cleared on every stable update or interruption.
    pub unstable: String,
}

impl TranscriptBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a recognizer event to the buffers.
    ///
    /// Events carrying fewer than two characters of text are a recognizer
    /// artifact and are dropped silently. Never blocks; invoked inline as
    /// events arrive.
    pub fn apply(&mut self, event: TranscriptEvent) -> StitchUpdate {
        if event.text.trim().chars().count() < 2 {
            return StitchUpdate::Dropped;
        }

        if event.is_final {
            let cleaned = normalize(&event.text);
            if cleaned.chars().count() < 2 {
                return StitchUpdate::Dropped;
            }
            if self.stable.is_empty() {
                self.stable = cleaned.clone();
            } else {
                self.stable.push(' ');
                self.stable.push_str(&cleaned);
            }
            self.unstable.clear();
            StitchUpdate::Final(cleaned)
        } else {
            self.unstable = event.text.trim().to_string();
            StitchUpdate::Interim(self.unstable.clone())
        }
    }

    /// Clear both buffers (turn boundary or interruption).
    pub fn clear(&mut self) {
        self.stable.clear();
        self.unstable.clear();
    }
}

/// Lightweight cleaning for recognized text.
///
/// Trims, collapses internal whitespace, strips leading/trailing punctuation
/// noise, and lower-cases. No word replacement or phonetic guessing.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    collapsed
        .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interim(text: &str) -> TranscriptEvent {
        TranscriptEvent {
            text: text.to_string(),
            is_final: false,
        }
    }

    fn final_ev(text: &str) -> TranscriptEvent {
        TranscriptEvent {
            text: text.to_string(),
            is_final: true,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello,   World!  "), "hello, world");
        assert_eq!(normalize("...pune?!"), "pune");
        assert_eq!(normalize("ONE\ttwo\nthree"), "one two three");
    }

    #[test]
    fn test_interim_replaces_not_appends() {
        let mut buffers = TranscriptBuffers::new();
        buffers.apply(interim("pu"));
        buffers.apply(interim("pun"));
        assert_eq!(buffers.unstable, "pun");
        assert!(buffers.stable.is_empty());
    }

    #[test]
    fn test_final_appends_and_clears_interim() {
        let mut buffers = TranscriptBuffers::new();
        buffers.apply(interim("pun"));
        let update = buffers.apply(final_ev("Pune"));
        assert_eq!(update, StitchUpdate::Final("pune".to_string()));
        assert_eq!(buffers.stable, "pune");
        assert!(buffers.unstable.is_empty());
    }

    #[test]
    fn test_finals_accumulate_with_spaces() {
        let mut buffers = TranscriptBuffers::new();
        buffers.apply(final_ev("Pune"));
        buffers.apply(final_ev("Galentine's,"));
        buffers.apply(final_ev("day."));
        assert_eq!(buffers.stable, "pune galentine's day");
    }

    #[test]
    fn test_degenerate_events_dropped() {
        let mut buffers = TranscriptBuffers::new();
        assert_eq!(buffers.apply(final_ev("")), StitchUpdate::Dropped);
        assert_eq!(buffers.apply(final_ev("a")), StitchUpdate::Dropped);
        assert_eq!(buffers.apply(final_ev("  ")), StitchUpdate::Dropped);
        assert_eq!(buffers.apply(interim("x")), StitchUpdate::Dropped);
        // Punctuation-only text survives the raw length check but
        // normalizes to nothing.
        assert_eq!(buffers.apply(final_ev("!?")), StitchUpdate::Dropped);
        assert!(buffers.stable.is_empty());
        assert!(buffers.unstable.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffers = TranscriptBuffers::new();
        buffers.apply(final_ev("hello"));
        buffers.apply(interim("wor"));
        buffers.clear();
        assert!(buffers.stable.is_empty());
        assert!(buffers.unstable.is_empty());
    }
}
