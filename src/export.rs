//! Search-result export.
//!
//! Every run writes into its own timestamped directory under
//! `retrieval_results/`: the full record list as JSON, a `title,doi` CSV for
//! downstream retrieval, and a BibTeX file.

use crate::error::Result;
use crate::records::PaperRecord;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where one run's files landed.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub run_dir: PathBuf,
    pub json: PathBuf,
    pub csv: PathBuf,
    pub bibtex: PathBuf,
}

#[derive(Serialize)]
struct SearchMetadata {
    total_papers: usize,
    search_method: &'static str,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    search_metadata: SearchMetadata,
    papers: &'a [PaperRecord],
}

/// Write JSON, CSV, and BibTeX exports into a fresh
/// `<output_root>/<YYYYmmdd_HHMMSS>/` directory.
pub fn save_results(papers: &[PaperRecord], output_root: &Path) -> Result<ExportPaths> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let run_dir = output_root.join(timestamp);
    std::fs::create_dir_all(&run_dir)?;

    let paths = ExportPaths {
        json: run_dir.join("literature_search.json"),
        csv: run_dir.join("literature_search_titles_dois.csv"),
        bibtex: run_dir.join("literature_search.bib"),
        run_dir,
    };

    export_json(papers, &paths.json)?;
    export_csv(papers, &paths.csv)?;
    export_bibtex(papers, &paths.bibtex)?;

    info!(papers = papers.len(), dir = %paths.run_dir.display(), "Results saved");
    Ok(paths)
}

pub fn export_json(papers: &[PaperRecord], path: &Path) -> Result<()> {
    let export = JsonExport {
        search_metadata: SearchMetadata {
            total_papers: papers.len(),
            search_method: "LLM-Enhanced Search",
        },
        papers,
    };
    std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
    Ok(())
}

/// Titles and DOIs only; records with both fields empty are skipped.
pub fn export_csv(papers: &[PaperRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["title", "doi"])?;

    for paper in papers {
        if paper.title.is_empty() && paper.doi.is_empty() {
            continue;
        }
        writer.write_record([&paper.title, &paper.doi])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn export_bibtex(papers: &[PaperRecord], path: &Path) -> Result<()> {
    let entries: Vec<String> = papers
        .iter()
        .enumerate()
        .map(|(i, paper)| format_bibtex_entry(paper, i + 1))
        .collect();

    std::fs::write(path, entries.join("\n\n") + "\n")?;
    Ok(())
}

const TYPE_MAPPING: [(&str, &str); 8] = [
    ("journal-article", "article"),
    ("conference-paper", "inproceedings"),
    ("book-chapter", "inbook"),
    ("book", "book"),
    ("thesis", "phdthesis"),
    ("report", "techreport"),
    ("preprint", "misc"),
    ("proceedings-article", "inproceedings"),
];

fn bibtex_type(doc_type: &str) -> &'static str {
    let lower = doc_type.to_lowercase();
    TYPE_MAPPING
        .iter()
        .find(|(crossref, _)| *crossref == lower)
        .map(|(_, bib)| *bib)
        .unwrap_or("article")
}

pub(crate) fn format_bibtex_entry(paper: &PaperRecord, index: usize) -> String {
    let mut lines = vec![format!(
        "@{}{{{},",
        bibtex_type(&paper.doc_type),
        citation_key(paper, index)
    )];

    if !paper.title.is_empty() {
        lines.push(format!("  title = {{{{{}}}}},", escape_latex(&paper.title)));
    }
    if !paper.authors.is_empty() {
        lines.push(format!("  author = {{{}}},", format_authors(&paper.authors)));
    }
    if let Some(year) = paper.year {
        lines.push(format!("  year = {{{}}},", year));
    }
    if !paper.venue.is_empty() {
        let venue_lower = paper.venue.to_lowercase();
        let field = if venue_lower.contains("conference") || venue_lower.contains("proceedings") {
            "booktitle"
        } else {
            "journal"
        };
        lines.push(format!("  {} = {{{}}},", field, escape_latex(&paper.venue)));
    }
    if !paper.doi.is_empty() {
        lines.push(format!("  doi = {{{}}},", paper.doi));
    }
    if !paper.publisher.is_empty() {
        lines.push(format!("  publisher = {{{}}},", escape_latex(&paper.publisher)));
    }
    for (field, value) in [
        ("volume", &paper.volume),
        ("number", &paper.issue),
        ("pages", &paper.page),
    ] {
        if !value.is_empty() {
            lines.push(format!("  {} = {{{}}},", field, value));
        }
    }

    if let Some(last) = lines.last_mut() {
        if let Some(stripped) = last.strip_suffix(',') {
            *last = stripped.to_string();
        }
    }
    lines.push("}".to_string());
    lines.join("\n")
}

/// Two-digit year followed by the first two letters of up to three
/// surnames; `paper<index>` when neither is available.
fn citation_key(paper: &PaperRecord, index: usize) -> String {
    let year_part = paper
        .year
        .map(|y| {
            let s = y.to_string();
            s.chars().skip(s.len().saturating_sub(2)).collect::<String>()
        })
        .unwrap_or_default();

    let author_parts: Vec<String> = paper
        .authors
        .iter()
        .take(3)
        .filter_map(|author| {
            let last_name = author.split_whitespace().last()?;
            let letters: String = last_name.chars().filter(|c| c.is_alphabetic()).take(2).collect();
            if letters.is_empty() {
                None
            } else {
                Some(letters)
            }
        })
        .collect();

    if year_part.is_empty() && author_parts.is_empty() {
        return format!("paper{}", index);
    }
    if author_parts.is_empty() {
        return format!("{}unknown", year_part);
    }

    format!("{}{}", year_part, author_parts.join(""))
}

/// `First Last` becomes `Last, First`; names already containing a comma are
/// kept as given.
fn format_authors(authors: &[String]) -> String {
    authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|author| {
            if author.contains(',') {
                return author.to_string();
            }
            let parts: Vec<&str> = author.split_whitespace().collect();
            match parts.split_last() {
                Some((last, rest)) if !rest.is_empty() => {
                    format!("{}, {}", last, rest.join(" "))
                }
                _ => author.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '%' => out.push_str("\\%"),
            '$' => out.push_str("\\$"),
            '&' => out.push_str("\\&"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '^' => out.push_str("\\^{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_paper() -> PaperRecord {
        PaperRecord {
            title: "Water vapour line positions near 1.5 um".to_string(),
            authors: vec!["Jonathan Tennyson".to_string(), "Alain Campargue".to_string()],
            year: Some(2021),
            venue: "Journal of Quantitative Spectroscopy and Radiative Transfer".to_string(),
            doi: "10.1016/j.jqsrt.2021.107949".to_string(),
            publisher: "Elsevier".to_string(),
            doc_type: "journal-article".to_string(),
            volume: "276".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_citation_key_from_year_and_surnames() {
        let paper = sample_paper();
        assert_eq!(citation_key(&paper, 1), "21TeCa");
    }

    #[test]
    fn test_citation_key_fallbacks() {
        let empty = PaperRecord::default();
        assert_eq!(citation_key(&empty, 7), "paper7");

        let year_only = PaperRecord {
            year: Some(1998),
            ..Default::default()
        };
        assert_eq!(citation_key(&year_only, 1), "98unknown");
    }

    #[test]
    fn test_bibtex_entry_fields() {
        let entry = format_bibtex_entry(&sample_paper(), 1);

        assert!(entry.starts_with("@article{21TeCa,"));
        assert!(entry.contains("title = {{Water vapour line positions near 1.5 um}},"));
        assert!(entry.contains("author = {Tennyson, Jonathan and Campargue, Alain},"));
        assert!(entry.contains("journal = {Journal of Quantitative Spectroscopy"));
        assert!(entry.contains("volume = {276}"));
        assert!(entry.ends_with("\n}"));
        // trailing comma removed before the closing brace
        assert!(!entry.contains(",\n}"));
    }

    #[test]
    fn test_bibtex_booktitle_for_proceedings() {
        let paper = PaperRecord {
            venue: "Proceedings of the HITRAN Conference".to_string(),
            doc_type: "proceedings-article".to_string(),
            ..Default::default()
        };
        let entry = format_bibtex_entry(&paper, 2);

        assert!(entry.starts_with("@inproceedings{paper2,"));
        assert!(entry.contains("booktitle = {Proceedings of the HITRAN Conference}"));
    }

    #[test]
    fn test_latex_escaping() {
        assert_eq!(escape_latex("H_2O & 50%"), "H\\_2O \\& 50\\%");
        assert_eq!(escape_latex("a^b"), "a\\^{}b");
        assert_eq!(escape_latex("x\\y"), "x\\textbackslash{}y");
    }

    #[test]
    fn test_csv_skips_fully_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let papers = vec![sample_paper(), PaperRecord::default()];

        export_csv(&papers, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "title,doi");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_save_results_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let papers = vec![sample_paper()];

        let paths = save_results(&papers, dir.path()).unwrap();
        assert!(paths.json.exists());
        assert!(paths.csv.exists());
        assert!(paths.bibtex.exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(json["search_metadata"]["total_papers"], 1);
        assert_eq!(json["search_metadata"]["search_method"], "LLM-Enhanced Search");
        assert_eq!(json["papers"][0]["doi"], "10.1016/j.jqsrt.2021.107949");
    }
}
