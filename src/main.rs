//! marvelit - LLM-enhanced literature retrieval and analysis for MARVEL
//!
//! Two workflows:
//!
//! ## Search
//! ```bash
//! marvelit search
//! ```
//! Interactive: molecule query -> keyword extraction -> Crossref search ->
//! LLM relevance filter -> JSON/CSV/BibTeX export -> Elsevier XML retrieval.
//!
//! ## Analysis
//! ```bash
//! marvelit analysis article_xmls/20240301_120000
//! ```
//! Runs the MARVEL-compatibility analysis over every XML file in a folder
//! and extracts the data tables the model points at.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use marvelit::analyzer::PaperAnalyzer;
use marvelit::crossref::{self, LiteratureSearcher};
use marvelit::elsevier::ElsevierClient;
use marvelit::export;
use marvelit::filter::PaperFilter;
use marvelit::keywords::KeywordExtractor;
use marvelit::llm::ChatClient;
use marvelit::query::{Query, CITATION_TIERS, DEFAULT_TIER_INDEX, MIN_VALID_YEAR};
use marvelit::records::PaperRecord;
use marvelit::settings::Settings;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// LLM-enhanced literature retrieval and analysis for MARVEL
#[derive(Parser)]
#[command(name = "marvelit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search literature for a molecule and retrieve Elsevier full texts
    Search {
        /// Maximum records to pull from Crossref
        #[arg(long, default_value_t = crossref::DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Output directory for search results
        #[arg(short, long, default_value = "retrieval_results")]
        output: PathBuf,

        /// Output directory for fetched article XML
        #[arg(long, default_value = "article_xmls")]
        xml_output: PathBuf,

        /// Skip the Elsevier full-text retrieval stage
        #[arg(long)]
        skip_fetch: bool,
    },

    /// Analyze retrieved article XML for MARVEL-compatible data
    Analysis {
        /// Folder containing XML files (prompted for when omitted)
        folder: Option<PathBuf>,

        /// Output directory for analysis results
        #[arg(short, long, default_value = "analysis_results")]
        output: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Search {
            max_results,
            output,
            xml_output,
            skip_fetch,
        } => run_search_pipeline(max_results, output, xml_output, skip_fetch).await,
        Commands::Analysis { folder, output } => run_analysis_pipeline(folder, output).await,
    }
}

// ============================================================================
// Search Pipeline
// ============================================================================

async fn run_search_pipeline(
    max_results: usize,
    output_dir: PathBuf,
    xml_output: PathBuf,
    skip_fetch: bool,
) -> Result<()> {
    println!("{}", "=".repeat(70));
    println!("LLM-enhanced literature retrieval tool");
    println!("{}", "=".repeat(70));

    let settings = Settings::from_env().context("Failed to load configuration")?;
    println!(
        "LLM services: {} (keywords), {} (filtering)",
        settings.keyword_llm.model, settings.analysis_llm.model
    );

    let query = prompt_query()?;

    print_search_config(&settings, &query);
    let confirmed = Confirm::new()
        .with_prompt("Confirm search with above settings?")
        .default(true)
        .interact()?;
    if !confirmed {
        println!("Search cancelled.");
        return Ok(());
    }

    let started = std::time::Instant::now();

    // ===========================================
    // STAGE 1: Keyword Extraction
    // ===========================================
    println!("\n--- Stage 1: Keyword Extraction ---");

    let keyword_client = ChatClient::new(settings.keyword_llm.clone())?;
    let extractor = KeywordExtractor::new(keyword_client);
    let keywords = extractor.extract(&query).await?;

    println!("Search keywords: {}", keywords.join(", "));

    // ===========================================
    // STAGE 2: Crossref Search
    // ===========================================
    println!("\n--- Stage 2: Crossref Search ---");

    let searcher = LiteratureSearcher::new(max_results)?;
    let papers = searcher.search(&keywords, &query).await?;

    if papers.is_empty() {
        println!("No papers found matching your criteria.");
        println!("\nSuggestions to improve your search:");
        println!("   - Widen the year range or lower the citation tier");
        println!("   - Remove extra keyword restrictions");
        return Ok(());
    }
    println!("Found {} papers after metadata filters.", papers.len());

    // ===========================================
    // STAGE 3: LLM Relevance Filtering
    // ===========================================
    println!("\n--- Stage 3: LLM Relevance Filtering ---");

    let filter_client = ChatClient::new(settings.analysis_llm.clone())?;
    let paper_filter = PaperFilter::new(filter_client);
    let papers = paper_filter
        .enrich(papers, &query.molecule_label())
        .await?;
    let relevant = papers.iter().filter(|p| p.is_relevant()).count();

    println!("{} of {} papers judged relevant.", relevant, papers.len());

    // ===========================================
    // STAGE 4: Export
    // ===========================================
    println!("\n--- Stage 4: Export ---");

    let paths = export::save_results(&papers, &output_dir)?;
    println!("Results saved to: {}", paths.run_dir.display());

    // ===========================================
    // STAGE 5: Elsevier Full-Text Retrieval
    // ===========================================
    if skip_fetch {
        println!("\nSkipping full-text retrieval (--skip-fetch).");
    } else if settings.require_elsevier().is_err() {
        println!("\nELSEVIER_API_KEY not set; skipping full-text retrieval.");
    } else {
        println!("\n--- Stage 5: Elsevier Full-Text Retrieval ---");

        let dois = relevant_dois(&papers);

        let fetch_dir = xml_output.join(Local::now().format("%Y%m%d_%H%M%S").to_string());
        let fetcher = ElsevierClient::new(&settings)?;
        let report = fetcher.fetch_batch(&dois, &fetch_dir).await?;

        println!(
            "Fetched {} of {} papers in XML format published by Elsevier ({} unavailable).",
            report.succeeded, report.total, report.failed
        );
        println!("Article XML saved to: {}", fetch_dir.display());
    }

    print_paper_preview(&papers);
    println!(
        "\nSearch completed in {:.1} seconds.",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Collect the molecule query interactively, mirroring the validation rules
/// of [`Query::new`] with lenient year-range handling.
fn prompt_query() -> Result<Query> {
    println!("\n{}", "=".repeat(70));

    let name: String = Input::new()
        .with_prompt("Enter the molecule name (e.g., 'methane')")
        .interact_text()?;
    let formula: String = Input::new()
        .with_prompt("Enter the molecular formula (e.g., 'CH4')")
        .interact_text()?;
    let isotope: String = Input::new()
        .with_prompt("Enter the isotope (e.g., '12CH4', empty to skip)")
        .allow_empty(true)
        .interact_text()?;

    let extra: String = Input::new()
        .with_prompt("Required keywords (comma-separated, empty to skip)")
        .allow_empty(true)
        .interact_text()?;
    let extra_keywords: Vec<String> = extra
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    let year_range: String = Input::new()
        .with_prompt("Year range (e.g., 2000-2023, empty for no restriction)")
        .allow_empty(true)
        .interact_text()?;
    let (min_year, max_year) = parse_year_range(&year_range);

    let tier_labels = [
        "No restriction on citation count",
        "At least 1 citation (low impact)",
        "At least 5 citations (medium impact)",
        "At least 20 citations (high impact)",
        "At least 50 citations (very high impact)",
    ];
    let tier = Select::new()
        .with_prompt("Restriction on citation count")
        .items(&tier_labels)
        .default(DEFAULT_TIER_INDEX)
        .interact()?;

    let isotope = if isotope.trim().is_empty() {
        None
    } else {
        Some(isotope)
    };

    Ok(Query::new(
        &name,
        &formula,
        isotope.as_deref(),
        extra_keywords,
        min_year,
        max_year,
        CITATION_TIERS[tier],
    )?)
}

/// `YYYY-YYYY` into a year pair. An inverted range is swapped; anything
/// invalid or empty falls back to no restriction.
fn parse_year_range(input: &str) -> (i32, i32) {
    let current_year: i32 = Local::now()
        .format("%Y")
        .to_string()
        .parse()
        .unwrap_or(MIN_VALID_YEAR);
    let unrestricted = (MIN_VALID_YEAR, current_year);

    let Some((start, end)) = input.split_once('-') else {
        return unrestricted;
    };
    let (Ok(mut min), Ok(mut max)) = (start.trim().parse::<i32>(), end.trim().parse::<i32>())
    else {
        return unrestricted;
    };

    if min > max {
        println!("Start year after end year, swapping.");
        std::mem::swap(&mut min, &mut max);
    }
    if min < MIN_VALID_YEAR || max > current_year {
        println!("Invalid year range, using no restriction.");
        return unrestricted;
    }

    (min, max)
}

fn print_search_config(settings: &Settings, query: &Query) {
    println!("\n{}", "=".repeat(70));
    println!("FULL SEARCH CONFIGURATION:");
    println!(
        "LLM services: {} (keywords), {} (filtering)",
        settings.keyword_llm.model, settings.analysis_llm.model
    );
    println!("Molecule: {}", query.molecule_label());
    if query.extra_keywords.is_empty() {
        println!("Additional keywords: None");
    } else {
        println!("Additional keywords: {}", query.extra_keywords.join(", "));
    }
    println!("Year range: {}-{}", query.min_year, query.max_year);
    println!(
        "Citation count: At least {} citations per paper",
        query.min_citations
    );
    println!("{}", "=".repeat(70));
}

fn print_paper_preview(papers: &[PaperRecord]) {
    let display_count = papers.len().min(5);
    println!("\nPreview of top {} papers:", display_count);
    println!("{}", "-".repeat(70));

    for (i, paper) in papers.iter().take(display_count).enumerate() {
        println!("{}. {}", i + 1, or_na(&paper.title));
        let authors: Vec<&str> = paper.authors.iter().take(3).map(String::as_str).collect();
        println!(
            "   Authors: {}",
            if authors.is_empty() {
                "N/A".to_string()
            } else {
                authors.join(", ")
            }
        );
        match paper.year {
            Some(year) => println!("   Year: {}", year),
            None => println!("   Year: N/A"),
        }
        println!("   Citations: {}", paper.citation_count);
        println!("   Journal: {}", or_na(&paper.venue));
        println!("   Publisher: {}", or_na(&paper.publisher));
        println!("   DOI: {}", or_na(&paper.doi));

        if let Some(analysis) = &paper.llm_analysis {
            let reasoning: String = analysis.reasoning.chars().take(100).collect();
            println!("   Relevance Score: {:.1}", analysis.relevance_score);
            println!("   Relevance Analysis: {}", reasoning);
        }
        println!();
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// DOIs eligible for full-text retrieval. Exports keep every enriched
/// record, but only papers the relevance filter accepted are fetched.
fn relevant_dois(papers: &[PaperRecord]) -> Vec<String> {
    papers
        .iter()
        .filter(|p| p.is_relevant() && !p.doi.is_empty())
        .map(|p| p.doi.clone())
        .collect()
}

// ============================================================================
// Analysis Pipeline
// ============================================================================

async fn run_analysis_pipeline(folder: Option<PathBuf>, output_dir: PathBuf) -> Result<()> {
    println!("{}", "=".repeat(70));
    println!("LLM-enhanced academic paper analysis tool");
    println!("{}", "=".repeat(70));

    let settings = Settings::from_env().context("Failed to load configuration")?;

    let folder = match folder {
        Some(folder) => folder,
        None => {
            let input: String = Input::new()
                .with_prompt("Folder containing XML files")
                .default("article_xmls".to_string())
                .interact_text()?;
            PathBuf::from(input)
        }
    };

    println!("\n{}", "=".repeat(70));
    println!("ANALYSIS CONFIGURATION:");
    println!("LLM service: {}", settings.analysis_llm.model);
    println!("Target folder: {}", folder.display());
    println!("{}", "=".repeat(70));

    let started = std::time::Instant::now();

    let client = ChatClient::new(settings.analysis_llm.clone())?;
    let analyzer = PaperAnalyzer::new(client);
    let report = analyzer.batch_analyze(&folder, &output_dir).await?;

    info!(
        total = report.total_files,
        successful = report.successful(),
        "Analysis finished"
    );

    println!(
        "\nBatch analysis completed! (Time: {:.1}s)",
        started.elapsed().as_secs_f64()
    );
    println!("Total files processed: {}", report.total_files);
    println!("Successful analyses: {}", report.successful());
    println!(
        "Failed analyses: {}",
        report.total_files - report.successful()
    );
    println!("Results saved to: {}", report.run_dir.display());

    for result in &report.results {
        let Some(analysis) = result.llm_analysis.analysis.as_ref() else {
            continue;
        };
        if !analysis.marvel_relevance.is_relevant {
            println!("\n{} is not relevant", result.file_path);
        } else if analysis.experimental_data.has_data {
            println!("\n{} is relevant and has data", result.file_path);
        } else {
            println!(
                "\n{} is relevant but provides no data in the retrieved content",
                result.file_path
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_range_valid() {
        assert_eq!(parse_year_range("2000-2023"), (2000, 2023));
        assert_eq!(parse_year_range(" 2010 - 2015 "), (2010, 2015));
    }

    #[test]
    fn test_parse_year_range_swaps_inverted() {
        assert_eq!(parse_year_range("2015-2010"), (2010, 2015));
    }

    #[test]
    fn test_parse_year_range_defaults() {
        let (min, _) = parse_year_range("");
        assert_eq!(min, MIN_VALID_YEAR);
        let (min, _) = parse_year_range("1850-2000");
        assert_eq!(min, MIN_VALID_YEAR);
        let (min, _) = parse_year_range("garbage");
        assert_eq!(min, MIN_VALID_YEAR);
    }

    #[test]
    fn test_relevant_dois_skips_rejected_papers() {
        use marvelit::records::LlmAnalysis;

        fn paper(doi: &str, is_relevant: bool) -> PaperRecord {
            PaperRecord {
                doi: doi.to_string(),
                llm_analysis: Some(LlmAnalysis {
                    relevance_score: if is_relevant { 0.9 } else { 0.1 },
                    reasoning: String::new(),
                    is_relevant,
                    analysis_type: "relevance_filter".to_string(),
                    llm_service: "test".to_string(),
                }),
                ..Default::default()
            }
        }

        let papers = vec![
            paper("10.1016/a", true),
            paper("10.1016/b", false),
            paper("", true),
            PaperRecord {
                doi: "10.1016/c".to_string(),
                ..Default::default()
            },
        ];
        assert_eq!(relevant_dois(&papers), vec!["10.1016/a".to_string()]);
    }
}
