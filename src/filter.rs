//! LLM-based relevance filtering for paper records.
//!
//! Each record gets one chat call judging title/abstract relevance against
//! the MARVEL rubric. Enrichment is count-preserving: a record whose call
//! fails or whose response cannot be parsed is kept with a degraded verdict,
//! never dropped, and never aborts the batch.

use crate::error::Result;
use crate::llm::{extract_json_object, ChatClient};
use crate::prompts::relevance_filter;
use crate::records::{LlmAnalysis, PaperRecord};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Score at or above which a missing verdict defaults to relevant.
const RELEVANCE_DEFAULT_THRESHOLD: f64 = 0.5;

/// Outcome of judging one record.
///
/// Modeled as data rather than an error so that a single item's failure
/// cannot propagate into aborting the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictOutcome {
    Parsed(LlmAnalysis),
    Degraded { raw: String, reason: String },
}

impl VerdictOutcome {
    /// Collapse into the analysis record attached to the paper.
    pub fn into_analysis(self, llm_service: &str) -> LlmAnalysis {
        match self {
            VerdictOutcome::Parsed(mut analysis) => {
                analysis.llm_service = llm_service.to_string();
                analysis
            }
            VerdictOutcome::Degraded { raw, reason } => LlmAnalysis {
                relevance_score: 0.0,
                reasoning: format!("{}: {}", reason, raw),
                is_relevant: false,
                analysis_type: "title".to_string(),
                llm_service: llm_service.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerdictResponse {
    relevance_score: f64,
    #[serde(default)]
    reasoning: String,
    is_relevant: Option<bool>,
}

/// Judges paper relevance one record at a time.
pub struct PaperFilter {
    client: ChatClient,
}

impl PaperFilter {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Enrich every record with a relevance verdict.
    ///
    /// Output length always equals input length; records are processed
    /// sequentially in input order.
    pub async fn enrich(
        &self,
        mut papers: Vec<PaperRecord>,
        molecule_label: &str,
    ) -> Result<Vec<PaperRecord>> {
        if papers.is_empty() {
            return Ok(papers);
        }

        info!(
            count = papers.len(),
            model = %self.client.model(),
            "Starting LLM relevance filtering"
        );

        let system_prompt = relevance_filter::build_system_prompt(molecule_label);

        for (idx, paper) in papers.iter_mut().enumerate() {
            let outcome = self.judge_one(paper, &system_prompt, idx).await;
            paper.llm_analysis = Some(outcome.into_analysis(self.client.model()));
        }

        let relevant = papers.iter().filter(|p| p.is_relevant()).count();
        info!(
            total = papers.len(),
            relevant = relevant,
            "LLM filtering complete"
        );

        Ok(papers)
    }

    async fn judge_one(&self, paper: &PaperRecord, system_prompt: &str, idx: usize) -> VerdictOutcome {
        let user_prompt = relevance_filter::build_user_prompt(
            &paper.title,
            &paper.abstract_text,
            &paper.venue,
            paper.year,
        );

        match self.client.chat(system_prompt, &user_prompt).await {
            Ok(content) => {
                let outcome = parse_verdict(&content);
                if let VerdictOutcome::Parsed(a) = &outcome {
                    debug!(idx = idx, score = a.relevance_score, relevant = a.is_relevant, "Paper judged");
                }
                outcome
            }
            Err(e) => {
                warn!(
                    idx = idx,
                    title = %paper.title.chars().take(50).collect::<String>(),
                    error = %e,
                    "Relevance call failed"
                );
                VerdictOutcome::Degraded {
                    raw: e.to_string(),
                    reason: "API error".to_string(),
                }
            }
        }
    }
}

/// Parse a verdict response into an outcome.
///
/// A score without a verdict defaults to `score >= 0.5`; anything
/// unparsable degrades with the raw text preserved.
pub fn parse_verdict(content: &str) -> VerdictOutcome {
    let json = match extract_json_object(content) {
        Ok(json) => json,
        Err(e) => {
            return VerdictOutcome::Degraded {
                raw: content.to_string(),
                reason: format!("Parse error: {}", e),
            }
        }
    };

    match serde_json::from_str::<VerdictResponse>(&json) {
        Ok(response) => {
            let score = response.relevance_score.clamp(0.0, 1.0);
            let is_relevant = response
                .is_relevant
                .unwrap_or(score >= RELEVANCE_DEFAULT_THRESHOLD);
            VerdictOutcome::Parsed(LlmAnalysis {
                relevance_score: score,
                reasoning: response.reasoning,
                is_relevant,
                analysis_type: "title".to_string(),
                llm_service: String::new(),
            })
        }
        Err(e) => VerdictOutcome::Degraded {
            raw: content.to_string(),
            reason: format!("Parse error: {}", e),
        },
    }
}
