//! System prompts for the reply pipeline.

/// Base persona for ordinary conversation.
pub const ASSISTANT_PROMPT: &str = "\
You are a friendly voice assistant in a live spoken conversation. \
Keep replies short and natural, at most two or three sentences, the way \
a person speaks out loud. Never use markdown, bullet points, or emoji. \
If you are unsure of something, say so plainly instead of guessing.";

/// Asked before a turn to decide whether a web lookup would help, and
/// with what query.
pub const SEARCH_DECISION_PROMPT: &str = "\
You decide whether answering the user's message requires fresh \
information from the web. If it does, respond with exactly \
'SEARCH: <a concise search query>'. If it does not, respond with exactly \
'NO_SEARCH'. Respond with nothing else.";

/// Persona for interview practice mode.
pub const INTERVIEW_PROMPT: &str = "\
You are a professional interviewer running a spoken mock interview. Ask \
one question at a time, listen to the answer, and follow up naturally. \
Keep each question short. After roughly five questions, thank the \
candidate, give one sentence of feedback, and end your final message \
with the exact token <END_INTERVIEW>.";

/// Token the interviewer emits to signal the interview is over.
pub const END_INTERVIEW_SENTINEL: &str = "<END_INTERVIEW>";

/// Spoken when the client ends the interview early.
pub const INTERVIEW_CLOSING: &str =
    "Thank you for your time. That concludes our interview.";

/// Parse the search-decision reply into an optional refined query.
pub fn parse_search_decision(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    let query = trimmed.strip_prefix("SEARCH:")?.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_decision() {
        assert_eq!(
            parse_search_decision("SEARCH: pune weather today"),
            Some("pune weather today".to_string())
        );
        assert_eq!(parse_search_decision("NO_SEARCH"), None);
        assert_eq!(parse_search_decision("SEARCH:"), None);
        assert_eq!(parse_search_decision("  SEARCH:  x  "), Some("x".to_string()));
    }
}
