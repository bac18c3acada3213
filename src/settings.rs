//! Runtime configuration.
//!
//! All keys and endpoints are collected into an explicitly constructed
//! [`Settings`] value at startup and passed to components by reference.
//! Nothing in the crate reads the environment after this point.

use crate::error::{MarvelitError, Result};

/// Default base URL for the Gemini OpenAI-compatible endpoint.
pub const GEMINI_OPENAI_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default base URL for the Groq OpenAI-compatible endpoint.
pub const GROQ_OPENAI_BASE: &str = "https://api.groq.com/openai/v1";

/// Default base URL for the Elsevier full-text content API.
pub const ELSEVIER_ARTICLE_BASE: &str =
    "https://api.elsevier.com/content/article/doi";

/// One OpenAI-compatible chat endpoint (base URL + key + model).
#[derive(Debug, Clone)]
pub struct ChatEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Endpoint used for keyword extraction.
    pub keyword_llm: ChatEndpoint,
    /// Endpoint used for relevance filtering and deep analysis.
    pub analysis_llm: ChatEndpoint,
    /// Elsevier content API key.
    pub elsevier_api_key: String,
    /// Elsevier content API base URL.
    pub elsevier_base_url: String,
}

impl Settings {
    /// Build settings from environment variables.
    ///
    /// Required: `GROQ_API_KEY`, `GEMINI_API_KEY`. Optional with defaults:
    /// `GROQ_MODEL`, `GEMINI_MODEL`, `ELSEVIER_API_KEY`, `ELSEVIER_BASE_URL`.
    /// A missing required key is a fatal config error reported before any
    /// network call.
    pub fn from_env() -> Result<Self> {
        let groq_key = require_env("GROQ_API_KEY")?;
        let gemini_key = require_env("GEMINI_API_KEY")?;

        Ok(Self {
            keyword_llm: ChatEndpoint {
                base_url: env_or("GROQ_BASE_URL", GROQ_OPENAI_BASE),
                api_key: groq_key,
                model: env_or("GROQ_MODEL", "llama-3.3-70b-versatile"),
            },
            analysis_llm: ChatEndpoint {
                base_url: env_or("GEMINI_BASE_URL", GEMINI_OPENAI_BASE),
                api_key: gemini_key,
                model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            },
            elsevier_api_key: std::env::var("ELSEVIER_API_KEY").unwrap_or_default(),
            elsevier_base_url: env_or("ELSEVIER_BASE_URL", ELSEVIER_ARTICLE_BASE),
        })
    }

    /// Elsevier retrieval is optional; error out only when a stage needs it.
    pub fn require_elsevier(&self) -> Result<()> {
        if self.elsevier_api_key.trim().is_empty() {
            return Err(MarvelitError::Config(
                "ELSEVIER_API_KEY not set; cannot fetch full-text XML".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MarvelitError::Config(format!("{} not set", name))),
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_elsevier_missing_key() {
        let settings = Settings {
            keyword_llm: ChatEndpoint {
                base_url: GROQ_OPENAI_BASE.to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            },
            analysis_llm: ChatEndpoint {
                base_url: GEMINI_OPENAI_BASE.to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            },
            elsevier_api_key: String::new(),
            elsevier_base_url: ELSEVIER_ARTICLE_BASE.to_string(),
        };
        assert!(settings.require_elsevier().is_err());
    }
}
