//! Crossref API client for literature search.
//!
//! Cursor-based deep paging over `/works`, sorted by relevance, with year
//! filters applied server-side and the citation tier client-side (Crossref
//! cannot filter on `is-referenced-by-count`). A failing page aborts the
//! whole search; a missing field in one record degrades to an empty string.

use crate::error::{MarvelitError, Result};
use crate::query::Query;
use crate::records::PaperRecord;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Crossref API base URL
const CROSSREF_API_URL: &str = "https://api.crossref.org/works";

/// Polite pool email for Crossref API
const MAILTO: &str = "marvelit@example.com";

/// Rows requested per page (Crossref maximum)
const ROWS_PER_PAGE: usize = 1000;

/// Default cap on retrieved records before filtering
pub const DEFAULT_MAX_RESULTS: usize = 2000;

/// Courtesy delay between page requests
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Wait applied once when Crossref answers 429
const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Crossref search client.
pub struct LiteratureSearcher {
    client: reqwest::Client,
    max_results: usize,
}

impl LiteratureSearcher {
    pub fn new(max_results: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("marvelit/0.1 (mailto:{})", MAILTO))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarvelitError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_results,
        })
    }

    /// Search Crossref with the given keywords and the query's filters.
    ///
    /// Returns records in API relevance order, already restricted to the
    /// query's year range and citation tier, `llm_analysis` unset.
    pub async fn search(&self, keywords: &[String], query: &Query) -> Result<Vec<PaperRecord>> {
        let mut terms: Vec<String> = keywords.to_vec();
        terms.extend(query.extra_keywords.iter().cloned());
        let search_query = dedupe_join(&terms);

        info!(
            query = %search_query,
            min_year = query.min_year,
            max_year = query.max_year,
            min_citations = query.min_citations,
            "Starting Crossref search"
        );

        let mut papers: Vec<PaperRecord> = Vec::new();
        let mut cursor = "*".to_string();
        let mut rate_limited_once = false;

        while papers.len() < self.max_results {
            let url = build_search_url(&search_query, &cursor, query.min_year, query.max_year);
            debug!(url = %url, collected = papers.len(), "Fetching Crossref page");

            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(MarvelitError::RateLimited(_)) if !rate_limited_once => {
                    warn!("Crossref rate limit hit, waiting before one retry");
                    rate_limited_once = true;
                    tokio::time::sleep(RATE_LIMIT_WAIT).await;
                    continue;
                }
                // A failing page aborts the search rather than silently
                // returning a truncated result set.
                Err(e) => return Err(e),
            };

            let item_count = page.message.items.len();
            for item in page.message.items {
                if papers.len() >= self.max_results {
                    break;
                }
                papers.push(parse_crossref_item(item));
            }

            debug!(items = item_count, total = papers.len(), "Parsed Crossref page");

            cursor = match page.message.next_cursor {
                Some(c) if item_count > 0 => c,
                _ => break,
            };

            tokio::time::sleep(PAGE_DELAY).await;
        }

        let retrieved = papers.len();
        let papers = filter_by_year(papers, query.min_year, query.max_year);
        let papers = filter_by_citations(papers, query.min_citations);

        info!(
            retrieved = retrieved,
            after_filters = papers.len(),
            "Crossref search complete"
        );

        Ok(papers)
    }

    async fn fetch_page(&self, url: &str) -> Result<CrossrefResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarvelitError::RateLimited(RATE_LIMIT_WAIT.as_secs()));
        }

        if !status.is_success() {
            return Err(MarvelitError::Api {
                code: status.as_u16() as i32,
                message: format!("Crossref API error: {}", status),
            });
        }

        response
            .json::<CrossrefResponse>()
            .await
            .map_err(|e| MarvelitError::Parse(format!("Failed to parse Crossref response: {}", e)))
    }
}

/// Join keywords into one query string, dropping case-insensitive duplicates.
fn dedupe_join(terms: &[String]) -> String {
    let mut seen = std::collections::HashSet::new();
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a Crossref search URL for one cursor position.
fn build_search_url(query: &str, cursor: &str, min_year: i32, max_year: i32) -> String {
    format!(
        "{}?query={}&cursor={}&rows={}&sort=relevance&order=desc&mailto={}&filter=from-pub-date:{},until-pub-date:{}",
        CROSSREF_API_URL,
        urlencoding::encode(query),
        urlencoding::encode(cursor),
        ROWS_PER_PAGE,
        MAILTO,
        min_year,
        max_year
    )
}

/// Keep records whose year falls inside the inclusive range.
///
/// Crossref applies the pub-date filters server-side; this re-check also
/// drops records that carry no year at all.
pub fn filter_by_year(papers: Vec<PaperRecord>, min_year: i32, max_year: i32) -> Vec<PaperRecord> {
    papers
        .into_iter()
        .filter(|p| p.year.map(|y| y >= min_year && y <= max_year).unwrap_or(false))
        .collect()
}

/// Keep records meeting the minimum citation count.
pub fn filter_by_citations(papers: Vec<PaperRecord>, min_citations: u32) -> Vec<PaperRecord> {
    papers
        .into_iter()
        .filter(|p| p.citation_count >= min_citations)
        .collect()
}

// === Crossref API Response Types ===

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Debug, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefItem>,
    #[serde(rename = "next-cursor")]
    next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CrossrefItem {
    #[serde(rename = "DOI", default)]
    doi: String,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "published-print")]
    published_print: Option<CrossrefDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CrossrefDate>,
    created: Option<CrossrefDate>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    publisher: String,
    #[serde(rename = "is-referenced-by-count", default)]
    citation_count: u32,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "type", default)]
    doc_type: String,
    #[serde(default)]
    page: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    issue: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    #[serde(default)]
    given: String,
    #[serde(default)]
    family: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i32>>,
}

impl CrossrefDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|parts| parts.first()).copied()
    }
}

/// Map one Crossref item to a [`PaperRecord`].
///
/// Missing fields degrade to empty strings rather than failing the record.
fn parse_crossref_item(item: CrossrefItem) -> PaperRecord {
    let title = item.title.into_iter().next().unwrap_or_default();

    let authors: Vec<String> = item
        .author
        .iter()
        .filter_map(|a| {
            let given = a.given.trim();
            let family = a.family.trim();
            if !given.is_empty() && !family.is_empty() {
                Some(format!("{} {}", given, family))
            } else if !family.is_empty() {
                Some(family.to_string())
            } else {
                None
            }
        })
        .collect();

    let year = item
        .published_print
        .as_ref()
        .and_then(CrossrefDate::year)
        .or_else(|| item.published_online.as_ref().and_then(CrossrefDate::year))
        .or_else(|| item.created.as_ref().and_then(CrossrefDate::year));

    let venue = item.container_title.into_iter().next().unwrap_or_default();

    let url = item.url.unwrap_or_else(|| {
        if item.doi.is_empty() {
            String::new()
        } else {
            format!("https://doi.org/{}", item.doi)
        }
    });

    let abstract_text = item
        .abstract_text
        .map(|s| strip_markup_tags(&s))
        .unwrap_or_default();

    PaperRecord {
        title,
        authors,
        year,
        venue,
        doi: item.doi,
        abstract_text,
        publisher: item.publisher,
        citation_count: item.citation_count,
        url,
        doc_type: item.doc_type,
        page: item.page,
        volume: item.volume,
        issue: item.issue,
        source: "crossref".to_string(),
        llm_analysis: None,
    }
}

/// Strip JATS/HTML markup from Crossref abstracts.
fn strip_markup_tags(text: &str) -> String {
    let re = Regex::new(r"<[^>]+>").unwrap_or_else(|_| Regex::new(r"").expect("Empty regex"));
    re.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: Option<i32>, citations: u32) -> PaperRecord {
        PaperRecord {
            title: "t".to_string(),
            year,
            citation_count: citations,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url("methane spectroscopy", "*", 2010, 2019);
        assert!(url.contains("query=methane%20spectroscopy"));
        assert!(url.contains("cursor=%2A"));
        assert!(url.contains("from-pub-date:2010"));
        assert!(url.contains("until-pub-date:2019"));
        assert!(url.contains("sort=relevance"));
    }

    #[test]
    fn test_dedupe_join() {
        let terms = vec![
            "Methane".to_string(),
            "methane".to_string(),
            "FTIR".to_string(),
            "".to_string(),
        ];
        assert_eq!(dedupe_join(&terms), "Methane FTIR");
    }

    #[test]
    fn test_filter_by_year_and_citations() {
        let papers = vec![
            record(Some(2009), 10),
            record(Some(2010), 10),
            record(Some(2015), 3),
            record(Some(2019), 5),
            record(Some(2020), 50),
            record(None, 100),
        ];
        let papers = filter_by_year(papers, 2010, 2019);
        assert_eq!(papers.len(), 3);
        let papers = filter_by_citations(papers, 5);
        assert_eq!(papers.len(), 2);
        assert!(papers.iter().all(|p| {
            let y = p.year.unwrap();
            (2010..=2019).contains(&y) && p.citation_count >= 5
        }));
    }

    #[test]
    fn test_parse_crossref_item_full() {
        let json = r#"{
            "DOI": "10.1016/j.jms.2015.01.001",
            "title": ["Methane line positions"],
            "author": [
                {"given": "Jane", "family": "Roe"},
                {"family": "Wei"},
                {"given": "Orphan", "family": ""}
            ],
            "container-title": ["J. Mol. Spectrosc."],
            "published-print": {"date-parts": [[2015, 3]]},
            "abstract": "<jats:p>Assigned transitions.</jats:p>",
            "publisher": "Elsevier",
            "is-referenced-by-count": 12,
            "type": "journal-article",
            "page": "1-12",
            "volume": "310"
        }"#;
        let item: CrossrefItem = serde_json::from_str(json).unwrap();
        let paper = parse_crossref_item(item);
        assert_eq!(paper.title, "Methane line positions");
        assert_eq!(paper.authors, vec!["Jane Roe", "Wei"]);
        assert_eq!(paper.year, Some(2015));
        assert_eq!(paper.abstract_text, "Assigned transitions.");
        assert_eq!(paper.citation_count, 12);
        assert_eq!(paper.url, "https://doi.org/10.1016/j.jms.2015.01.001");
        assert_eq!(paper.source, "crossref");
        assert!(paper.llm_analysis.is_none());
    }

    #[test]
    fn test_parse_crossref_item_sparse() {
        let item: CrossrefItem = serde_json::from_str(r#"{"created": {"date-parts": [[1998]]}}"#).unwrap();
        let paper = parse_crossref_item(item);
        assert_eq!(paper.title, "");
        assert_eq!(paper.year, Some(1998));
        assert_eq!(paper.url, "");
        assert!(paper.authors.is_empty());
    }

    #[test]
    fn test_strip_markup_tags() {
        assert_eq!(
            strip_markup_tags("<jats:p>Hello <i>world</i></jats:p>"),
            "Hello world"
        );
    }
}
