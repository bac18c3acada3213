//! Custom error types for marvelit.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, MarvelitError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for marvelit operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum MarvelitError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response parsing error (JSON shape, LLM output, XML structure)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code from API
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (missing API key, bad endpoint)
    #[error("Config error: {0}")]
    Config(String),

    /// Query validation error (year range, citation tier)
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `MarvelitError`
pub type Result<T> = std::result::Result<T, MarvelitError>;
