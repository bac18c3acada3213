//! OpenAI-compatible chat client shared by every LLM call site.
//!
//! Keyword extraction, relevance filtering, and deep analysis all go through
//! [`ChatClient::chat`], which sends a system/user message pair and returns
//! the raw completion text. JSON recovery from noisy completions (markdown
//! fences, leading prose, stray control characters) lives here too so each
//! call site parses with the same tolerance.

use crate::error::{MarvelitError, Result};
use crate::settings::ChatEndpoint;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Thin client over one chat-completions endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: ChatEndpoint,
}

impl ChatClient {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MarvelitError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Model name served by this endpoint.
    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    /// Send one system/user exchange and return the completion text.
    ///
    /// Control characters are stripped from the response; an empty choice
    /// list or missing content is a parse error, never a panic.
    pub async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.endpoint.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.1,
        });

        let api_url = format!(
            "{}/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        );

        debug!(model = %self.endpoint.model, "Sending LLM request");

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(MarvelitError::Network)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarvelitError::Api {
                code: status.as_u16() as i32,
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| MarvelitError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MarvelitError::Parse("LLM returned no choices".to_string()))?;

        Ok(strip_control_chars(content.trim()))
    }
}

/// Remove ASCII control characters that break JSON parsing.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Strip markdown code fences from a completion.
fn strip_fences(content: &str) -> &str {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Extract the first balanced JSON object from a completion.
///
/// Handles markdown code blocks and surrounding prose; matches braces so
/// trailing commentary after the object is ignored.
pub fn extract_json_object(content: &str) -> Result<String> {
    let text = strip_fences(content);

    let start = text
        .find('{')
        .ok_or_else(|| MarvelitError::Parse("No JSON object found in response".to_string()))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(text[start..start + idx + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    Err(MarvelitError::Parse(
        "Incomplete JSON object in response".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_plain() {
        let input = r#"{"keywords": ["methane spectroscopy"]}"#;
        assert_eq!(extract_json_object(input).unwrap(), input);
    }

    #[test]
    fn test_extract_json_object_code_block() {
        let input = "```json\n{\"is_relevant\": true}\n```";
        assert_eq!(extract_json_object(input).unwrap(), "{\"is_relevant\": true}");
    }

    #[test]
    fn test_extract_json_object_with_prose() {
        let input = r#"Here is the result: {"score": 0.8} hope that helps"#;
        assert_eq!(extract_json_object(input).unwrap(), r#"{"score": 0.8}"#);
    }

    #[test]
    fn test_extract_json_object_nested() {
        let input = r#"{"a": {"b": 1}, "c": "}"}"#;
        assert_eq!(extract_json_object(input).unwrap(), input);
    }

    #[test]
    fn test_extract_json_object_missing() {
        assert!(extract_json_object("no json here").is_err());
    }

    #[test]
    fn test_strip_control_chars() {
        assert_eq!(strip_control_chars("a\u{0000}b\nc"), "ab\nc");
    }
}
