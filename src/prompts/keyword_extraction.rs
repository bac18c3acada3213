//! Prompts for LLM keyword extraction.

/// System prompt template. Placeholders: `{name}`, `{formula}`.
const SYSTEM_TEMPLATE: &str = r#"You are an academic literature search expert in the domain of molecular spectroscopy. Extract suitable keywords for academic literature search based on the user's description.

Requirements:
    1. Extract ONLY English keywords (academic papers are mostly in English)
    2. Return ONLY a JSON format: {"keywords": ["keyword1", "keyword2", ...]}
    3. Control the number of keywords to around 6-10, and ensure they are comprehensive and semantically diverse
    4. Prioritize terms commonly used in academic literature related to experimental spectroscopy of {name} ({formula}) and its isotopologues if mentioned by the user
    5. Focus on molecular spectroscopy research of {name} ({formula}) only, and it should be related to the MARVEL algorithm
    6. Include terms like "rotational", "vibrational" or other terms that are commonly used in molecular spectroscopy research for the MARVEL algorithm

IMPORTANT:
    - Return ONLY the JSON object, no additional text.
    - The keywords must be suitable for academic database search (e.g., Crossref)
    - Only focus on {name} and its isotopologues if mentioned by the user, not other molecules."#;

/// Research-intent template shared with the relevance rubric.
/// Placeholders: `{molecule}` (rendered name/formula/isotope label).
const INTENT_TEMPLATE: &str = "I am looking for research papers that provide high-quality experimental spectroscopic data suitable for input into the MARVEL (Measured Active Rotational-Vibrational Energy Levels) algorithm in the domain of molecular spectroscopy. The focus should be on {molecule}. Papers must include assigned experimental transitions with well-defined quantum numbers, measured transition frequencies (e.g., derived from FTIR, laser spectroscopy, or microwave spectroscopy), and explicitly reported measurement uncertainties. Please exclude studies that are purely theoretical or reporting calculated line lists without being tied to or validated by new experimental measurements. The primary requirement is to form a dataset of data within papers that can be used as input of MARVEL.";

/// Build the system prompt for a molecule.
pub fn build_system_prompt(name: &str, formula: &str) -> String {
    SYSTEM_TEMPLATE
        .replace("{name}", name)
        .replace("{formula}", formula)
}

/// Build the user prompt describing the research intent.
pub fn build_user_prompt(name: &str, formula: &str, isotope: Option<&str>) -> String {
    let molecule = match isotope {
        Some(iso) => format!("{} ({}), especially the {} isotope", name, formula, iso),
        None => format!("{} ({})", name, formula),
    };
    format!(
        "Extract academic search keywords from this description:\n\n{}",
        INTENT_TEMPLATE.replace("{molecule}", &molecule)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_prompt() {
        let prompt = build_system_prompt("methane", "CH4");
        assert!(prompt.contains("methane (CH4)"));
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn test_build_user_prompt_with_isotope() {
        let prompt = build_user_prompt("methane", "CH4", Some("12CH4"));
        assert!(prompt.contains("especially the 12CH4 isotope"));
    }

    #[test]
    fn test_build_user_prompt_without_isotope() {
        let prompt = build_user_prompt("water", "H2O", None);
        assert!(prompt.contains("water (H2O)"));
        assert!(!prompt.contains("isotope"));
    }
}
