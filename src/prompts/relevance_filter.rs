//! Relevance filtering prompts for academic paper classification.
//!
//! The rubric asks the model for a single strict-JSON verdict per paper so
//! that one malformed response can only ever degrade one record.

/// System prompt template for the per-paper relevance rubric.
/// Placeholders: `{molecule}`.
const SYSTEM_TEMPLATE: &str = r#"You are an expert academic literature reviewer. Analyze if a research paper is relevant to the user's research needs.

User's research query: "I am compiling a dataset of all available experimental spectroscopic data on {molecule}, with the goal of applying the MARVEL (Measured Active Rotational-Vibrational Energy Levels) algorithm. Papers must include assigned experimental transitions with well-defined quantum numbers, measured transition frequencies and explicitly reported measurement uncertainties. Please exclude studies that are purely theoretical or reporting calculated line lists without being tied to or validated by new experimental measurements. Do not restrict the papers to any single field (e.g., do not assume only rotational spectroscopy)."

Your task:
    1. Analyze the paper based on its title and abstract (venue and year are context only).
    2. Determine relevance based on:
    - Field alignment: molecular spectroscopy
    - Molecule: {molecule}
    - Data type: experimental spectral measurements (only real measured spectral data, exclude computed or ambiguous entries)
    - Data requirement for the MARVEL algorithm: experimentally measured spectroscopic transitions with clear quantum state assignments, precise frequency values, and reported uncertainties; each transition must connect two well-defined energy levels.
    3. Provide a brief reasoning focused on whether the paper potentially has experimental data usable as MARVEL input.

Scoring guidelines:
    - 0.8-1.0: Highly relevant - may directly provide experimental data of the molecule usable as MARVEL input (assigned transitions, uncertainties, quantum state assignments or high-resolution spectra)
    - 0.6-0.7: Relevant - experimental spectroscopy of the molecule, but may require minor post-processing
    - 0.4-0.5: Somewhat relevant - general spectroscopy with indirect value, or isotopologue work
    - 0.2-0.3: Weakly relevant - tangential spectroscopy or primarily simulation-based
    - 0.0-0.1: Not relevant - no experimental molecular spectroscopy content

IMPORTANT:
    - When only a title is available, judge from the title alone.
    - Return ONLY a strictly valid JSON object, no additional text.
    - All property names and string values must use double quotes.

Output format (strict JSON, no markdown):
{
  "relevance_score": 0.0-1.0,
  "reasoning": "brief explanation of relevance",
  "is_relevant": true/false
}"#;

/// Build the system prompt for one molecule description.
pub fn build_system_prompt(molecule: &str) -> String {
    SYSTEM_TEMPLATE.replace("{molecule}", molecule)
}

/// Build the user prompt carrying one paper's fields.
pub fn build_user_prompt(title: &str, abstract_text: &str, venue: &str, year: Option<i32>) -> String {
    let mut prompt = format!("Analyze this paper for relevance:\n\nTitle: {}", title);
    if !abstract_text.is_empty() {
        prompt.push_str(&format!("\nAbstract: {}", abstract_text));
    }
    if !venue.is_empty() {
        prompt.push_str(&format!("\nJournal: {}", venue));
    }
    if let Some(year) = year {
        prompt.push_str(&format!("\nYear: {}", year));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_prompt() {
        let prompt = build_system_prompt("methane (CH4)");
        assert!(prompt.contains("methane (CH4)"));
        assert!(prompt.contains("relevance_score"));
    }

    #[test]
    fn test_build_user_prompt_minimal() {
        let prompt = build_user_prompt("A title", "", "", None);
        assert!(prompt.contains("Title: A title"));
        assert!(!prompt.contains("Abstract:"));
        assert!(!prompt.contains("Year:"));
    }

    #[test]
    fn test_build_user_prompt_full() {
        let prompt = build_user_prompt("T", "A", "J. Mol. Spectrosc.", Some(2015));
        assert!(prompt.contains("Abstract: A"));
        assert!(prompt.contains("Journal: J. Mol. Spectrosc."));
        assert!(prompt.contains("Year: 2015"));
    }
}
