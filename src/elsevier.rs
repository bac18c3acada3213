//! Elsevier full-text retrieval.
//!
//! One authenticated GET per DOI against the content API; the XML body is
//! written under the run directory using a sanitized DOI as filename. A
//! failing DOI is logged and skipped (papers outside Elsevier's corpus are
//! expected), and the batch always completes with a [`FetchReport`].

use crate::error::{MarvelitError, Result};
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Requests per second against the content API
const RATE_LIMIT_PER_SEC: u32 = 10;

/// Outcome of one retrieval batch.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_dois: Vec<String>,
}

/// Client for the Elsevier article content API.
pub struct ElsevierClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    delay: Duration,
}

impl ElsevierClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        settings.require_elsevier()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarvelitError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: settings.elsevier_api_key.clone(),
            base_url: settings.elsevier_base_url.trim_end_matches('/').to_string(),
            delay: Duration::from_secs(1) / RATE_LIMIT_PER_SEC,
        })
    }

    /// Fetch one article's XML and write it to `output_dir`.
    ///
    /// Single attempt; any HTTP or entitlement failure is the caller's to
    /// record.
    pub async fn fetch_one(&self, doi: &str, output_dir: &Path) -> Result<PathBuf> {
        let url = format!("{}/{}?view=FULL", self.base_url, doi);

        let response = self
            .client
            .get(&url)
            .header("X-ELS-APIKey", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarvelitError::Api {
                code: status.as_u16() as i32,
                message: format!("Elsevier API error for {}: {}", doi, status),
            });
        }

        let bytes = response.bytes().await?;
        let path = output_dir.join(format!("{}.xml", sanitize_doi(doi)));
        std::fs::write(&path, &bytes)?;

        Ok(path)
    }

    /// Fetch a batch of DOIs sequentially with a fixed pacing delay.
    ///
    /// Never aborts on a per-DOI failure; only the output directory being
    /// uncreatable is an error.
    pub async fn fetch_batch(&self, dois: &[String], output_dir: &Path) -> Result<FetchReport> {
        std::fs::create_dir_all(output_dir)?;

        let mut report = FetchReport {
            total: dois.len(),
            ..Default::default()
        };

        info!(total = dois.len(), dir = %output_dir.display(), "Fetching article XML batch");

        for (idx, doi) in dois.iter().enumerate() {
            if doi.trim().is_empty() {
                report.failed += 1;
                report.failed_dois.push(doi.clone());
                continue;
            }

            match self.fetch_one(doi, output_dir).await {
                Ok(path) => {
                    info!(doi = %doi, path = %path.display(), "Fetched article XML");
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(doi = %doi, error = %e, "Fetch failed, skipping DOI");
                    report.failed += 1;
                    report.failed_dois.push(doi.clone());
                }
            }

            if idx + 1 < dois.len() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Article retrieval batch complete"
        );

        Ok(report)
    }
}

/// Turn a DOI into a safe filename stem.
///
/// Strips `doi:` and resolver-URL prefixes, then replaces filesystem-hostile
/// characters with underscores.
pub fn sanitize_doi(doi: &str) -> String {
    let doi = doi.trim();
    let doi = doi
        .strip_prefix("doi:")
        .or_else(|| doi.strip_prefix("https://doi.org/"))
        .or_else(|| doi.strip_prefix("http://doi.org/"))
        .unwrap_or(doi);

    doi.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_doi() {
        assert_eq!(
            sanitize_doi("10.1016/j.jms.2015.01.001"),
            "10.1016_j.jms.2015.01.001"
        );
    }

    #[test]
    fn test_sanitize_strips_prefixes() {
        assert_eq!(sanitize_doi("doi:10.1000/a/b"), "10.1000_a_b");
        assert_eq!(sanitize_doi("https://doi.org/10.1000/x"), "10.1000_x");
        assert_eq!(sanitize_doi("http://doi.org/10.1000/x"), "10.1000_x");
    }

    #[test]
    fn test_sanitize_hostile_characters() {
        assert_eq!(sanitize_doi(r#"10.1/<a>:"b"|c?*"#), "10.1__a___b__c__");
    }

    #[test]
    fn test_report_default() {
        let report = FetchReport::default();
        assert_eq!(report.total, 0);
        assert!(report.failed_dois.is_empty());
    }

    fn test_client() -> ElsevierClient {
        let settings = Settings {
            keyword_llm: crate::settings::ChatEndpoint {
                base_url: "http://localhost".to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            },
            analysis_llm: crate::settings::ChatEndpoint {
                base_url: "http://localhost".to_string(),
                api_key: "k".to_string(),
                model: "m".to_string(),
            },
            elsevier_api_key: "test-key".to_string(),
            elsevier_base_url: "http://localhost/content/article/doi".to_string(),
        };
        ElsevierClient::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_batch_records_bad_dois_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let dois = vec!["".to_string(), "   ".to_string()];

        let report = test_client().fetch_batch(&dois, dir.path()).await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failed_dois, dois);
        assert!(dir.path().exists());
    }
}
