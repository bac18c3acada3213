//! Prompt module for LLM-based operations.
//!
//! Each pipeline stage that talks to a model keeps its fixed prompt text
//! here, as constants plus small builder functions.

pub mod keyword_extraction;
pub mod marvel_analysis;
pub mod relevance_filter;
