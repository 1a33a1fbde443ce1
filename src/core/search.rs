//! Web search enrichment.
//!
//! Search is strictly best-effort: a failed or slow lookup degrades to an
//! empty result set and the reply proceeds without context. The
//! [`should_trigger_search`] gate keeps obviously conversational turns from
//! paying the lookup cost at all.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const TAVILY_URL: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(4);
const MAX_RESULTS: usize = 5;

/// Queries that are plainly conversational never warrant a search.
const SKIP_PATTERNS: &[&str] = &[
    r"(?i)^(hi|hello|hey|yo|sup|good (morning|afternoon|evening))\b",
    r"(?i)^(thanks|thank you|ok|okay|cool|nice|great|got it)\b",
    r"(?i)\b(your name|who are you|how are you)\b",
    r"(?i)^(yes|no|yeah|nah|maybe|sure)\b",
];

/// Keywords that suggest the answer depends on current information.
const TIME_SENSITIVE_KEYWORDS: &[&str] = &[
    "today", "latest", "current", "now", "news", "weather", "price", "stock",
    "score", "recent", "update", "happening", "tonight", "this week",
];

fn skip_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        SKIP_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Decide whether a user turn should trigger a web search.
///
/// Short turns and conversational openers are skipped outright; everything
/// else triggers only when it carries a time-sensitive keyword.
pub fn should_trigger_search(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.split_whitespace().count() < 3 {
        return false;
    }
    if skip_regexes().iter().any(|regex| regex.is_match(trimmed)) {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    TIME_SENSITIVE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// One search hit, trimmed down to what the prompt needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub source: String,
}

/// External search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Look up `query`. Implementations must not fail the turn: errors and
    /// timeouts come back as an empty list.
    async fn search(&self, query: &str) -> Vec<SearchResult>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// Tavily-backed search.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: MAX_RESULTS,
        };

        let response = match self
            .client
            .post(TAVILY_URL)
            .timeout(SEARCH_TIMEOUT)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!("Search request failed: {error}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!("Search returned status {}", response.status());
            return Vec::new();
        }

        let parsed: TavilyResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!("Search response parse failed: {error}");
                return Vec::new();
            }
        };

        let results: Vec<SearchResult> = parsed
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|hit| SearchResult {
                title: hit.title,
                snippet: hit.content,
                source: hit.url,
            })
            .collect();

        debug!("Search for {query:?} returned {} results", results.len());
        results
    }
}

/// Render search hits as a context block for the reply prompt.
pub fn format_search_context(results: &[SearchResult]) -> String {
    let mut block = String::from("Relevant web results:\n");
    for (index, result) in results.iter().enumerate() {
        block.push_str(&format!(
            "{}. {} — {} ({})\n",
            index + 1,
            result.title,
            result.snippet,
            result.source
        ));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings_never_search() {
        assert!(!should_trigger_search("hey how are you doing"));
        assert!(!should_trigger_search("thanks a lot friend"));
        assert!(!should_trigger_search("hello there my friend today"));
    }

    #[test]
    fn test_short_turns_never_search() {
        assert!(!should_trigger_search("weather"));
        assert!(!should_trigger_search("news today"));
    }

    #[test]
    fn test_time_sensitive_queries_search() {
        assert!(should_trigger_search("what is the weather in pune"));
        assert!(should_trigger_search("give me the latest cricket score"));
        assert!(should_trigger_search("what is happening in the markets"));
    }

    #[test]
    fn test_timeless_questions_skip_search() {
        assert!(!should_trigger_search("explain how a binary tree works"));
    }

    #[test]
    fn test_tavily_response_tolerates_missing_fields() {
        let body = r#"{"results":[{"title":"t"},{"content":"c","url":"u"}]}"#;
        let parsed: TavilyResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].url, "u");
    }

    #[test]
    fn test_format_search_context_numbers_hits() {
        let results = vec![SearchResult {
            title: "Title".to_string(),
            snippet: "Snippet".to_string(),
            source: "https://example.com".to_string(),
        }];
        let block = format_search_context(&results);
        assert!(block.contains("1. Title — Snippet (https://example.com)"));
    }
}
