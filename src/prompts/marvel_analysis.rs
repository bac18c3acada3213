//! Deep-analysis prompt for MARVEL relevance and data availability.
//!
//! The response schema is fixed; `analyzer` deserializes it directly, so the
//! prompt insists every field is present even when empty or false.

/// System prompt for the analysis call.
pub const SYSTEM_PROMPT: &str = "You are an expert in molecular spectroscopy and data analysis. Based on the following content from a scientific paper, determine its relevance to the MARVEL (Measured Active Rotational-Vibrational Energy Levels) algorithm.";

/// User prompt template. Placeholder: `{paper_content}`.
const USER_TEMPLATE: &str = r#"MARVEL is an algorithm that reconstructs molecular energy level structures from experimental spectroscopic data. Its key inputs include:
- Experimentally measured transition wavenumbers (or line positions, frequencies)
- Quantum number assignments for both the upper and lower states of the transition (e.g., P, J, symmetry C, sublevel index)
- Uncertainties associated with each measured wavenumber
- These data are typically presented in tables or appendices, or described as structured lists in the text.

To ensure accurate and reliable output, follow a multi-step reasoning strategy. At each step, explicitly consider all relevant aspects before proceeding to the next.

### STEP 1: Determine the paper's relevance to MARVEL goals
Think carefully:
- Does the paper involve contents relevant to MARVEL, such as high-resolution spectroscopy, rovibrational analysis, transition assignment, or energy level modeling?
- Is its content or objective aligned with MARVEL (e.g., similar research goals)?
- Even if the paper focuses on related measurements (e.g., line shape, broadening, lifetimes), does it employ experimental techniques, quantum assignments, or theoretical models that could conceptually support MARVEL's goal of reconstructing molecular energy levels?

If the paper is clearly not relevant to MARVEL goals, return "is_relevant": false and keep the other fields empty or false. Otherwise, even in uncertain cases, prefer "is_relevant": true and let the next step make further distinctions.

### STEP 2: If relevant, evaluate whether the paper provides MARVEL-compatible experimental data
Think carefully:
- Does it contain new measured transition wavenumbers (or frequencies) for the molecule of interest?
- Are quantum number assignments for both upper and lower states clearly provided?
- Are uncertainties for transition wavenumbers stated, or can they be inferred from resolution?

If all of the above hold, set "has_data" to true and describe how the data is presented in "data_format". Otherwise set "has_data" to false and leave the other fields empty.

If tables are not complete, check whether sample tables or snippets demonstrate valid structure (wavenumber + uncertainty + partial quantum numbers), and whether the text claims full data are in supplementary material.

Note:
- Do not accept computed energy levels without transitions.
- Do not accept quantum assignments without wavenumbers.
- Do not accept data without full quantum assignment.
- Do not accept data that are old or from other papers without new measurements.
- It is acceptable to infer uncertainty from instrument resolution if not explicitly stated.
- If only part of the data meets the criteria, still consider it as providing MARVEL-compatible data, but note the limitations.

You must return all fields in the JSON template below, even when they are empty, false, or not applicable:

{
    "marvel_relevance": {
        "is_relevant": true/false,
        "explanation": "Explain why the paper is relevant or not relevant to MARVEL based on the content provided."
    },
    "experimental_data": {
        "has_data": true/false,
        "data_format": "Specify how the data is presented if available (e.g., in tables or within the text). If the data exist but cannot be obtained due to content restriction, explain here.",
        "need_pdf": true/false,
        "has_uncertainty": true/false,
        "uncertainty_description": "State the uncertainty information if available.",
        "uncertainty_value": "If the line position uncertainty value is available, state it with unit. If not available, return 'not available'.",
        "table_info": {
            "table_title": "List all table titles containing MARVEL-compatible experimental data (wavenumber/frequency + uncertainty + upper/lower quantum numbers). If none, return an empty list.",
            "description": "Table descriptions corresponding to the above titles, if available."
        },
        "has_supplementary_data": true/false
    },
    "summary": {
        "Evaluation": "Provide a summary of the paper's relevance to MARVEL, and comment on the existence of data."
    }
}

Now, analyze the paper content below and follow the above reasoning steps. Return only the final JSON object.

Paper Content: {paper_content}"#;

/// Build the analysis user prompt around normalized paper text.
pub fn build_user_prompt(paper_content: &str) -> String {
    USER_TEMPLATE.replace("{paper_content}", paper_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let prompt = build_user_prompt("=== PAPER ANALYSIS ===\nAbstract: test");
        assert!(prompt.contains("Paper Content: === PAPER ANALYSIS ==="));
        assert!(prompt.contains("marvel_relevance"));
        assert!(!prompt.contains("{paper_content}"));
    }
}
