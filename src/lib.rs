//! # marvelit
//!
//! Literature mining pipeline for MARVEL molecular-spectroscopy curation
//!
//! ## Modules
//!
//! - [`keywords`] - LLM keyword extraction from a molecule query
//! - [`crossref`] - Crossref search with cursor pagination
//! - [`filter`] - Per-paper LLM relevance verdicts
//! - [`export`] - JSON/CSV/BibTeX result export
//! - [`elsevier`] - Full-text XML retrieval by DOI
//! - [`xml`] - Article XML parsing into LLM-ready text
//! - [`tables`] - CALS table data extraction to CSV
//! - [`analyzer`] - Deep MARVEL-compatibility analysis of article XML
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use marvelit::{crossref::LiteratureSearcher, query::Query};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = Query::new("water", "H2O", None, vec![], 2000, 2024, 5)?;
//!     let searcher = LiteratureSearcher::new(2000)?;
//!     let papers = searcher.search(&["H2O spectroscopy".to_string()], &query).await?;
//!     println!("Found {} papers", papers.len());
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod crossref;
pub mod elsevier;
pub mod error;
pub mod export;
pub mod filter;
pub mod keywords;
pub mod llm;
pub mod prompts;
pub mod query;
pub mod records;
pub mod settings;
pub mod tables;
pub mod xml;

pub use error::{MarvelitError, Result};
