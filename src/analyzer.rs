//! LLM analysis of retrieved article XML.
//!
//! Each XML file is parsed, rendered into a text blob, and sent to the chat
//! model with the MARVEL assessment prompt. The model has to answer in a
//! fixed JSON schema; a response that fails to parse is recorded with
//! `success = false` and the raw text preserved, and the batch moves on.

use crate::error::{MarvelitError, Result};
use crate::llm::{self, ChatClient};
use crate::prompts::marvel_analysis;
use crate::tables;
use crate::xml;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Step-1 verdict: is the paper in scope for energy-level reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarvelRelevance {
    #[serde(default)]
    pub is_relevant: bool,
    #[serde(default)]
    pub explanation: String,
}

/// Table titles may come back as one string or a list; both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableTitles {
    Single(String),
    Many(Vec<String>),
}

impl Default for TableTitles {
    fn default() -> Self {
        TableTitles::Many(Vec::new())
    }
}

impl TableTitles {
    /// Non-empty titles as a flat list.
    pub fn titles(&self) -> Vec<&str> {
        match self {
            TableTitles::Single(title) => {
                if title.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![title.as_str()]
                }
            }
            TableTitles::Many(titles) => titles
                .iter()
                .map(String::as_str)
                .filter(|t| !t.trim().is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default)]
    pub table_title: TableTitles,
    #[serde(default)]
    pub description: String,
}

/// Step-2 verdict: what usable measurements the paper carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentalData {
    #[serde(default)]
    pub has_data: bool,
    #[serde(default)]
    pub data_format: String,
    #[serde(default)]
    pub need_pdf: bool,
    #[serde(default)]
    pub has_uncertainty: bool,
    #[serde(default)]
    pub uncertainty_description: String,
    #[serde(default)]
    pub uncertainty_value: String,
    #[serde(default)]
    pub table_info: TableInfo,
    #[serde(default)]
    pub has_supplementary_data: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(rename = "Evaluation", default)]
    pub evaluation: String,
}

/// The full fixed-schema answer expected from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperAnalysis {
    #[serde(default)]
    pub marvel_relevance: MarvelRelevance,
    #[serde(default)]
    pub experimental_data: ExperimentalData,
    #[serde(default)]
    pub summary: AnalysisSummary,
}

/// Outcome of one model call, schema-parsed or degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysisResult {
    pub success: bool,
    pub analysis: Option<PaperAnalysis>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// One batch entry: the file and what the model said about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub file_path: String,
    pub llm_analysis: LlmAnalysisResult,
}

/// Follow-up flags per successfully analyzed paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperStatus {
    pub file_path: String,
    pub is_relevant: bool,
    pub has_data: bool,
    pub need_pdf: bool,
    pub need_supplementary: bool,
}

/// Summary of one batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub total_files: usize,
    pub results: Vec<AnalysisResult>,
    #[serde(skip)]
    pub run_dir: PathBuf,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.llm_analysis.success)
            .count()
    }
}

pub struct PaperAnalyzer {
    client: ChatClient,
}

impl PaperAnalyzer {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Send formatted paper content to the model and parse the verdict.
    ///
    /// Transport and schema failures both land in the result with
    /// `success = false`; this call itself never errors.
    pub async fn analyze_content(&self, paper_content: &str) -> LlmAnalysisResult {
        let model = self.client.model().to_string();

        let raw = match self
            .client
            .chat(
                marvel_analysis::SYSTEM_PROMPT,
                &marvel_analysis::build_user_prompt(paper_content),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Analysis request failed");
                return LlmAnalysisResult {
                    success: false,
                    analysis: None,
                    model,
                    error: Some(e.to_string()),
                    raw_response: None,
                };
            }
        };

        match llm::extract_json_object(&raw)
            .and_then(|json| serde_json::from_str::<PaperAnalysis>(&json).map_err(Into::into))
        {
            Ok(analysis) => LlmAnalysisResult {
                success: true,
                analysis: Some(analysis),
                model,
                error: None,
                raw_response: None,
            },
            Err(e) => {
                warn!(error = %e, "Failed to parse analysis response");
                LlmAnalysisResult {
                    success: false,
                    analysis: None,
                    model,
                    error: Some(format!("Failed to parse JSON: {}", e)),
                    raw_response: Some(raw),
                }
            }
        }
    }

    /// Analyze one XML file.
    pub async fn analyze_file(&self, path: &Path) -> AnalysisResult {
        let file_path = path.display().to_string();
        info!(path = %file_path, "Analyzing paper");

        let doc = match xml::parse_article_file(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %file_path, error = %e, "Failed to read XML file");
                return AnalysisResult {
                    file_path,
                    llm_analysis: LlmAnalysisResult {
                        success: false,
                        analysis: None,
                        model: self.client.model().to_string(),
                        error: Some(e.to_string()),
                        raw_response: None,
                    },
                };
            }
        };

        let llm_analysis = self.analyze_content(&doc.format_for_llm()).await;
        AnalysisResult {
            file_path,
            llm_analysis,
        }
    }

    /// Analyze every `*.xml` in a folder, writing the result list, a
    /// `paper_status.json` summary, and extracted table data under a
    /// timestamped run directory.
    pub async fn batch_analyze(&self, xml_folder: &Path, output_root: &Path) -> Result<BatchReport> {
        let xml_files = list_xml_files(xml_folder)?;
        if xml_files.is_empty() {
            return Err(MarvelitError::Validation(format!(
                "No XML files found in {}",
                xml_folder.display()
            )));
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_dir = output_root.join(&timestamp);
        std::fs::create_dir_all(&run_dir)?;

        info!(
            files = xml_files.len(),
            folder = %xml_folder.display(),
            run_dir = %run_dir.display(),
            "Starting batch analysis"
        );

        let mut results = Vec::with_capacity(xml_files.len());
        let mut statuses = BTreeMap::new();

        for path in &xml_files {
            let result = self.analyze_file(path).await;

            if result.llm_analysis.success {
                let status = self.derive_status(&result, path, &run_dir);
                statuses.insert(statuses.len(), status);
            }

            info!(path = %path.display(), success = result.llm_analysis.success, "Analysis done");
            results.push(result);
        }

        let report = BatchReport {
            total_files: xml_files.len(),
            results,
            run_dir: run_dir.clone(),
        };

        let results_path = run_dir.join("paper_analysis_results.json");
        std::fs::write(&results_path, serde_json::to_string_pretty(&report)?)?;

        let status_path = run_dir.join("paper_status.json");
        std::fs::write(&status_path, serde_json::to_string_pretty(&statuses)?)?;

        info!(
            total = report.total_files,
            successful = report.successful(),
            results = %results_path.display(),
            "Batch analysis complete"
        );

        Ok(report)
    }

    /// Map an analysis onto its follow-up flags, extracting named data
    /// tables as a side effect.
    fn derive_status(&self, result: &AnalysisResult, path: &Path, run_dir: &Path) -> PaperStatus {
        let mut status = PaperStatus {
            file_path: result.file_path.clone(),
            ..Default::default()
        };

        let Some(analysis) = result.llm_analysis.analysis.as_ref() else {
            return status;
        };
        if !analysis.marvel_relevance.is_relevant {
            return status;
        }
        status.is_relevant = true;

        let data = &analysis.experimental_data;
        if !data.has_data {
            status.need_supplementary = data.has_supplementary_data;
            return status;
        }
        status.has_data = true;

        let titles = data.table_info.table_title.titles();
        if titles.is_empty() {
            // Data exist but no machine-readable table was named.
            status.need_pdf = true;
            return status;
        }

        let uncertainty = if data.has_uncertainty {
            data.uncertainty_value.as_str()
        } else {
            ""
        };

        match std::fs::read_to_string(path) {
            Ok(xml_content) => {
                for title in titles {
                    if let Err(e) =
                        tables::extract_table_by_title(&xml_content, title, uncertainty, run_dir)
                    {
                        warn!(table = %title, error = %e, "Table extraction failed");
                    }
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not re-read XML for tables"),
        }

        status.need_supplementary = data.has_supplementary_data;
        status
    }
}

fn list_xml_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(MarvelitError::Validation(format!(
            "Folder does not exist: {}",
            folder.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("xml"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_schema_parses() {
        let json = r#"{
            "marvel_relevance": {
                "is_relevant": true,
                "explanation": "High-resolution rovibrational study."
            },
            "experimental_data": {
                "has_data": true,
                "data_format": "Tables of line positions",
                "need_pdf": false,
                "has_uncertainty": true,
                "uncertainty_description": "Stated per line",
                "uncertainty_value": "0.001 cm-1",
                "table_info": {
                    "table_title": ["Table 2", "Table 3"],
                    "description": "Measured transitions"
                },
                "has_supplementary_data": false
            },
            "summary": {
                "Evaluation": "Directly usable."
            }
        }"#;

        let analysis: PaperAnalysis = serde_json::from_str(json).unwrap();
        assert!(analysis.marvel_relevance.is_relevant);
        assert!(analysis.experimental_data.has_data);
        assert_eq!(
            analysis.experimental_data.table_info.table_title.titles(),
            vec!["Table 2", "Table 3"]
        );
        assert_eq!(analysis.summary.evaluation, "Directly usable.");
    }

    #[test]
    fn test_table_title_accepts_single_string() {
        let json = r#"{"table_title": "Table 1", "description": ""}"#;
        let info: TableInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.table_title.titles(), vec!["Table 1"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let analysis: PaperAnalysis = serde_json::from_str(r#"{"marvel_relevance": {"is_relevant": false}}"#).unwrap();
        assert!(!analysis.marvel_relevance.is_relevant);
        assert!(!analysis.experimental_data.has_data);
        assert!(analysis.experimental_data.table_info.table_title.titles().is_empty());
    }

    #[test]
    fn test_empty_titles_are_skipped() {
        let single = TableTitles::Single("  ".to_string());
        assert!(single.titles().is_empty());

        let many = TableTitles::Many(vec!["".to_string(), "Table 4".to_string()]);
        assert_eq!(many.titles(), vec!["Table 4"]);
    }

    #[test]
    fn test_degraded_result_serialization_keeps_raw() {
        let result = LlmAnalysisResult {
            success: false,
            analysis: None,
            model: "gemini-2.0-flash".to_string(),
            error: Some("Failed to parse JSON: expected value".to_string()),
            raw_response: Some("not json".to_string()),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["raw_response"], "not json");
    }
}
