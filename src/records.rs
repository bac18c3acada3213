//! Paper metadata records.
//!
//! A [`PaperRecord`] is created by the Crossref search stage, enriched in
//! place by the relevance filter, and persisted as the terminal artifact.
//! Records are never deleted by enrichment; the JSON representation
//! round-trips losslessly, nested analysis included.

use serde::{Deserialize, Serialize};

/// Relevance verdict attached to a record by the LLM filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAnalysis {
    /// Relevance score in [0, 1].
    pub relevance_score: f64,
    /// Free-text reasoning from the model, or the raw error text when the
    /// response could not be parsed.
    pub reasoning: String,
    pub is_relevant: bool,
    /// What was analyzed ("title").
    pub analysis_type: String,
    /// Which service produced the verdict.
    pub llm_service: String,
}

/// Structured representation of a research paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub abstract_text: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub citation_count: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_analysis: Option<LlmAnalysis>,
}

impl PaperRecord {
    /// True when the record carries a verdict marking it relevant.
    pub fn is_relevant(&self) -> bool {
        self.llm_analysis
            .as_ref()
            .map(|a| a.is_relevant)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PaperRecord {
        PaperRecord {
            title: "High-resolution spectroscopy of 12CH4".to_string(),
            authors: vec!["Jane Roe".to_string(), "Li Wei".to_string()],
            year: Some(2015),
            venue: "J. Mol. Spectrosc.".to_string(),
            doi: "10.1016/j.jms.2015.01.001".to_string(),
            abstract_text: "Assigned transitions with uncertainties.".to_string(),
            publisher: "Elsevier".to_string(),
            citation_count: 42,
            url: "https://doi.org/10.1016/j.jms.2015.01.001".to_string(),
            doc_type: "journal-article".to_string(),
            page: "1-12".to_string(),
            volume: "310".to_string(),
            issue: "2".to_string(),
            source: "crossref".to_string(),
            llm_analysis: Some(LlmAnalysis {
                relevance_score: 0.9,
                reasoning: "Experimental line positions with uncertainties".to_string(),
                is_relevant: true,
                analysis_type: "title".to_string(),
                llm_service: "gemini".to_string(),
            }),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PaperRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_round_trip_without_analysis() {
        let mut record = sample_record();
        record.llm_analysis = None;
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("llm_analysis"));
        let parsed: PaperRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: PaperRecord =
            serde_json::from_str(r#"{"title": "Only a title"}"#).unwrap();
        assert_eq!(parsed.title, "Only a title");
        assert!(parsed.authors.is_empty());
        assert_eq!(parsed.citation_count, 0);
        assert!(parsed.llm_analysis.is_none());
    }

    #[test]
    fn test_is_relevant_helper() {
        let mut record = sample_record();
        assert!(record.is_relevant());
        record.llm_analysis = None;
        assert!(!record.is_relevant());
    }
}
