//! Search query model and validation.
//!
//! A [`Query`] is validated on construction and immutable afterwards; every
//! rejection happens here, before any network call is issued.

use crate::error::{MarvelitError, Result};
use serde::{Deserialize, Serialize};

/// Earliest publication year the search stage accepts.
pub const MIN_VALID_YEAR: i32 = 1900;

/// Minimum-citation tiers offered by the interactive prompt, in menu order:
/// no restriction, low, medium, high, very high impact.
pub const CITATION_TIERS: [u32; 5] = [0, 1, 5, 20, 50];

/// Default tier index when the user just presses Enter (medium impact).
pub const DEFAULT_TIER_INDEX: usize = 2;

/// One literature search request. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub molecule_name: String,
    pub molecule_formula: String,
    pub molecule_isotope: Option<String>,
    /// User-specified keywords merged with the extracted ones.
    pub extra_keywords: Vec<String>,
    pub min_year: i32,
    pub max_year: i32,
    /// Minimum citation count, one of [`CITATION_TIERS`].
    pub min_citations: u32,
}

impl Query {
    /// Validate and build a query.
    ///
    /// Rejected inputs: empty name/formula, `min_year < 1900`, inverted year
    /// range, future `max_year`, citation count outside the fixed tiers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        molecule_name: &str,
        molecule_formula: &str,
        molecule_isotope: Option<&str>,
        extra_keywords: Vec<String>,
        min_year: i32,
        max_year: i32,
        min_citations: u32,
    ) -> Result<Self> {
        let molecule_name = molecule_name.trim();
        let molecule_formula = molecule_formula.trim();

        if molecule_name.is_empty() || molecule_formula.is_empty() {
            return Err(MarvelitError::Validation(
                "Molecule name and formula are required".to_string(),
            ));
        }

        if min_year < MIN_VALID_YEAR {
            return Err(MarvelitError::Validation(format!(
                "Minimum year {} is before {}",
                min_year, MIN_VALID_YEAR
            )));
        }

        if min_year > max_year {
            return Err(MarvelitError::Validation(format!(
                "Year range {}-{} is inverted",
                min_year, max_year
            )));
        }

        let current_year = chrono::Local::now().format("%Y").to_string();
        let current_year: i32 = current_year.parse().unwrap_or(max_year);
        if max_year > current_year {
            return Err(MarvelitError::Validation(format!(
                "Maximum year {} is in the future",
                max_year
            )));
        }

        if !CITATION_TIERS.contains(&min_citations) {
            return Err(MarvelitError::Validation(format!(
                "Citation minimum {} is not one of the supported tiers {:?}",
                min_citations, CITATION_TIERS
            )));
        }

        let molecule_isotope = molecule_isotope
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            molecule_name: molecule_name.to_string(),
            molecule_formula: molecule_formula.to_string(),
            molecule_isotope,
            extra_keywords,
            min_year,
            max_year,
            min_citations,
        })
    }

    /// Human-readable molecule description for prompts and logs.
    pub fn molecule_label(&self) -> String {
        match &self.molecule_isotope {
            Some(iso) => format!(
                "{} ({}), isotope {}",
                self.molecule_name, self.molecule_formula, iso
            ),
            None => format!("{} ({})", self.molecule_name, self.molecule_formula),
        }
    }
}
