//! Text normalization for synthesized speech.
//!
//! Replies come back from the model as light markdown with digits and
//! symbols that read badly out loud. This pass strips the formatting and
//! rewrites the symbol-heavy constructs into speakable words before the
//! text reaches the synthesizer.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! cached_regex {
    ($pattern:expr) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new($pattern).expect("static pattern"))
    }};
}

/// Strip markdown structure: emphasis, code, headers, links, bullets.
fn strip_markdown(text: &str) -> String {
    let mut out = text.to_string();
    out = cached_regex!(r"\*\*([^*]+)\*\*")
        .replace_all(&out, "$1")
        .into_owned();
    out = cached_regex!(r"\*([^*]+)\*")
        .replace_all(&out, "$1")
        .into_owned();
    out = cached_regex!(r"`([^`]+)`").replace_all(&out, "$1").into_owned();
    out = cached_regex!(r"(?m)^#{1,6}\s+").replace_all(&out, "").into_owned();
    out = cached_regex!(r"\[([^\]]+)\]\([^)]*\)")
        .replace_all(&out, "$1")
        .into_owned();
    out = cached_regex!(r"(?m)^\s*[-*•]\s+")
        .replace_all(&out, "")
        .into_owned();
    out
}

/// Rewrite digit constructs into speakable phrases.
fn normalize_numbers(text: &str) -> String {
    let mut out = text.to_string();

    // Currency before decimals so "$3.50" becomes "3.50 dollars" first.
    out = cached_regex!(r"\$(\d+(?:\.\d+)?)")
        .replace_all(&out, "$1 dollars")
        .into_owned();

    out = cached_regex!(r"(\d+)\s*°\s*F\b")
        .replace_all(&out, "$1 degrees fahrenheit")
        .into_owned();
    out = cached_regex!(r"(\d+)\s*°\s*C\b")
        .replace_all(&out, "$1 degrees celsius")
        .into_owned();
    out = cached_regex!(r"(\d+)\s*°")
        .replace_all(&out, "$1 degrees")
        .into_owned();

    out = cached_regex!(r"(\d+(?:\.\d+)?)\s*%")
        .replace_all(&out, "$1 percent")
        .into_owned();

    // Numeric ranges read as "x to y".
    out = cached_regex!(r"\b(\d+)\s*-\s*(\d+)\b")
        .replace_all(&out, "$1 to $2")
        .into_owned();

    // Decimal points read as "point".
    out = cached_regex!(r"\b(\d+)\.(\d+)\b")
        .replace_all(&out, "$1 point $2")
        .into_owned();

    out
}

/// Prepare a reply for the synthesizer.
pub fn format_for_speech(text: &str) -> String {
    let stripped = strip_markdown(text);
    let normalized = normalize_numbers(&stripped);
    cached_regex!(r"\s+")
        .replace_all(normalized.trim(), " ")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_emphasis_and_code() {
        assert_eq!(
            format_for_speech("**bold** and *italic* and `code`"),
            "bold and italic and code"
        );
    }

    #[test]
    fn test_strips_headers_links_and_bullets() {
        let input = "## Heading\n- first [link](https://x.example)\n- second";
        assert_eq!(format_for_speech(input), "Heading first link second");
    }

    #[test]
    fn test_degrees_and_percent() {
        assert_eq!(
            format_for_speech("It is 72°F with 40% humidity"),
            "It is 72 degrees fahrenheit with 40 percent humidity"
        );
    }

    #[test]
    fn test_currency_and_decimals() {
        assert_eq!(
            format_for_speech("That costs $3.50 today"),
            "That costs 3 point 50 dollars today"
        );
        assert_eq!(format_for_speech("pi is 3.14"), "pi is 3 point 14");
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            format_for_speech("expect 5-10 minutes"),
            "expect 5 to 10 minutes"
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(format_for_speech("  hello\n\n  world  "), "hello world");
    }
}
