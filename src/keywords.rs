//! LLM keyword extraction with a deterministic fallback.
//!
//! One chat call turns the molecule description into a bounded set of search
//! keywords. When the call fails or returns something unparsable we fall back
//! to keywords derived directly from the structured fields; there are no
//! retries beyond that.

use crate::error::Result;
use crate::llm::{extract_json_object, ChatClient};
use crate::prompts::keyword_extraction;
use crate::query::Query;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Extracts search keywords for a query via one LLM call.
pub struct KeywordExtractor {
    client: ChatClient,
}

impl KeywordExtractor {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Extract keywords for the query's molecule.
    ///
    /// The returned list is deduplicated case-insensitively and preserves
    /// first-seen order. Never fails: unusable LLM output degrades to
    /// [`fallback_keywords`].
    pub async fn extract(&self, query: &Query) -> Result<Vec<String>> {
        let system_prompt = keyword_extraction::build_system_prompt(
            &query.molecule_name,
            &query.molecule_formula,
        );
        let user_prompt = keyword_extraction::build_user_prompt(
            &query.molecule_name,
            &query.molecule_formula,
            query.molecule_isotope.as_deref(),
        );

        match self.client.chat(&system_prompt, &user_prompt).await {
            Ok(content) => match parse_keywords(&content) {
                Some(keywords) if !keywords.is_empty() => {
                    info!(count = keywords.len(), "Extracted keywords");
                    Ok(keywords)
                }
                _ => {
                    warn!("Keyword response unusable, falling back to structured fields");
                    Ok(fallback_keywords(query))
                }
            },
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, falling back to structured fields");
                Ok(fallback_keywords(query))
            }
        }
    }
}

/// Parse `{"keywords": [...]}` out of a completion, tolerating fences/prose.
fn parse_keywords(content: &str) -> Option<Vec<String>> {
    let json = extract_json_object(content).ok()?;
    let response: KeywordResponse = serde_json::from_str(&json).ok()?;
    Some(dedupe_keywords(response.keywords))
}

/// Deterministic keyword set built from the structured molecule fields.
pub fn fallback_keywords(query: &Query) -> Vec<String> {
    let mut keywords = vec![
        format!("{} spectroscopy", query.molecule_name),
        format!("{} rovibrational transitions", query.molecule_formula),
        format!("{} experimental line positions", query.molecule_name),
    ];
    if let Some(iso) = &query.molecule_isotope {
        keywords.push(format!("{} spectroscopy", iso));
    }
    dedupe_keywords(keywords)
}

/// Drop empty entries and case-insensitive duplicates, keeping first-seen order.
fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Query {
        Query::new("methane", "CH4", Some("12CH4"), vec![], 2010, 2019, 5).unwrap()
    }

    #[test]
    fn test_parse_keywords_plain() {
        let content = r#"{"keywords": ["methane spectroscopy", "CH4 rovibrational"]}"#;
        let keywords = parse_keywords(content).unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0], "methane spectroscopy");
    }

    #[test]
    fn test_parse_keywords_fenced() {
        let content = "```json\n{\"keywords\": [\"FTIR methane\"]}\n```";
        assert_eq!(parse_keywords(content).unwrap(), vec!["FTIR methane"]);
    }

    #[test]
    fn test_parse_keywords_garbage() {
        assert!(parse_keywords("I could not help with that").is_none());
    }

    #[test]
    fn test_dedupe_case_insensitive() {
        let keywords = dedupe_keywords(vec![
            "Methane Spectroscopy".to_string(),
            "methane spectroscopy".to_string(),
            " ".to_string(),
            "CH4".to_string(),
        ]);
        assert_eq!(keywords, vec!["Methane Spectroscopy", "CH4"]);
    }

    #[test]
    fn test_fallback_includes_isotope() {
        let keywords = fallback_keywords(&query());
        assert!(keywords.iter().any(|k| k.contains("12CH4")));
        assert!(keywords.iter().any(|k| k.contains("methane")));
    }
}
