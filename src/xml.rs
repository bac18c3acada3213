//! Article XML parsing.
//!
//! Elsevier full-text XML mixes several namespaces (ce, ja, xocs, cals, mml)
//! and the prefixes are not stable across journals, so everything here
//! matches on local element names only. Parsing is best-effort: a document
//! with unknown structure yields whatever parts were found, never an error.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;

/// One element of the parsed document tree.
///
/// `text` is the character data before the first child, `tail` the character
/// data following the element inside its parent, matching the usual
/// tree-with-tails model for mixed content.
#[derive(Debug, Default, Clone)]
pub(crate) struct Element {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub tail: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// All descendants (depth-first) whose local tag name matches one of
    /// `names`.
    pub fn find_all<'a>(&'a self, names: &[&str]) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_matching(names, &mut out);
        out
    }

    fn collect_matching<'a>(&'a self, names: &[&str], out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if names.contains(&child.tag.as_str()) {
                out.push(child);
            }
            child.collect_matching(names, out);
        }
    }

    /// First descendant matching one of `names`, document order.
    pub fn find_first<'a>(&'a self, names: &[&str]) -> Option<&'a Element> {
        for child in &self.children {
            if names.contains(&child.tag.as_str()) {
                return Some(child);
            }
            if let Some(found) = child.find_first(names) {
                return Some(found);
            }
        }
        None
    }

    /// Direct children matching one of `names`.
    pub fn direct_children<'a>(&'a self, names: &[&str]) -> Vec<&'a Element> {
        self.children
            .iter()
            .filter(|c| names.contains(&c.tag.as_str()))
            .collect()
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit(':').next() {
        Some(local) => local.to_lowercase(),
        None => name.to_lowercase(),
    }
}

/// Build the element tree from an XML string.
///
/// A mid-stream parse error stops reading and returns the tree built so far.
pub(crate) fn parse_tree(xml: &str) -> Element {
    let mut reader = Reader::from_str(xml);
    // Inline markup (sup, inf, math) is significant, so text is kept raw and
    // whitespace is collapsed later during formatting.
    let mut root = Element {
        tag: "document".to_string(),
        ..Default::default()
    };
    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let mut elem = Element {
                    tag: local_name(e.name().as_ref()),
                    ..Default::default()
                };
                for attr in e.attributes().flatten() {
                    let key = local_name(attr.key.as_ref());
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    elem.attrs.insert(key, value);
                }
                stack.push(elem);
            }
            Ok(Event::Empty(ref e)) => {
                let mut elem = Element {
                    tag: local_name(e.name().as_ref()),
                    ..Default::default()
                };
                for attr in e.attributes().flatten() {
                    let key = local_name(attr.key.as_ref());
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    elem.attrs.insert(key, value);
                }
                attach(&mut root, &mut stack, elem);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                let target = stack.last_mut().unwrap_or(&mut root);
                match target.children.last_mut() {
                    Some(last) => last.tail.push_str(&text),
                    None => target.text.push_str(&text),
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).to_string();
                let target = stack.last_mut().unwrap_or(&mut root);
                match target.children.last_mut() {
                    Some(last) => last.tail.push_str(&text),
                    None => target.text.push_str(&text),
                }
            }
            Ok(Event::End(_)) => {
                if let Some(elem) = stack.pop() {
                    attach(&mut root, &mut stack, elem);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "XML parse error, keeping partial tree");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    // Unclosed elements from a truncated document still belong in the tree.
    while let Some(elem) = stack.pop() {
        attach(&mut root, &mut stack, elem);
    }

    root
}

fn attach(root: &mut Element, stack: &mut [Element], elem: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None => root.children.push(elem),
    }
}

/// A body section with its heading and paragraphs.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub label: String,
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// Label and caption of one table, as listed for the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub label: String,
    pub caption: String,
}

/// Normalized content of one article XML file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticleDocument {
    pub doi: String,
    pub abstract_text: String,
    pub full_text: String,
    pub sections: Vec<Section>,
    pub tables: Vec<TableSummary>,
}

impl ArticleDocument {
    /// Render the document as a single text blob for LLM analysis.
    pub fn format_for_llm(&self) -> String {
        let mut parts = vec!["=== PAPER ANALYSIS ===".to_string()];

        if !self.abstract_text.is_empty() {
            parts.push(format!("Abstract: {}", self.abstract_text));
        }
        if !self.full_text.is_empty() {
            parts.push(format!("Main Content: {}", self.full_text));
        }
        for table in &self.tables {
            let label = if table.label.is_empty() {
                "No Label"
            } else {
                &table.label
            };
            let caption = if table.caption.is_empty() {
                "No Caption"
            } else {
                &table.caption
            };
            parts.push(format!("{}: {}", label, caption));
        }

        parts.join("\n")
    }
}

/// Parse an article XML string into its normalized content.
pub fn parse_article(xml: &str) -> ArticleDocument {
    let root = parse_tree(xml);
    ArticleDocument {
        doi: extract_doi(&root),
        abstract_text: extract_abstract(&root),
        full_text: extract_full_text(&root),
        sections: extract_sections(&root),
        tables: extract_tables(&root),
    }
}

/// Read and parse an article XML file.
pub fn parse_article_file(path: &Path) -> Result<ArticleDocument> {
    let xml = std::fs::read_to_string(path)?;
    let doc = parse_article(&xml);
    info!(
        path = %path.display(),
        sections = doc.sections.len(),
        tables = doc.tables.len(),
        "Parsed article XML"
    );
    Ok(doc)
}

fn extract_doi(root: &Element) -> String {
    for elem in root.find_all(&["identifier", "doi"]) {
        let text = elem.text.trim();
        if !text.is_empty() {
            return text.trim_start_matches("doi:").to_string();
        }
    }
    String::new()
}

/// The author abstract, preferring `class="author"` over graphical or
/// untyped abstracts.
fn extract_abstract(root: &Element) -> String {
    let abstracts = root.find_all(&["abstract"]);
    let mut fallback = String::new();

    for abs in &abstracts {
        let text = formatted_text(abs);
        if text.is_empty() {
            continue;
        }
        match abs.attr("class") {
            Some("author") => return text,
            Some("graphical") => {}
            _ => {
                if fallback.is_empty() {
                    fallback = text;
                }
            }
        }
    }

    fallback
}

fn find_body(root: &Element) -> Option<&Element> {
    root.find_first(&["body"])
}

fn extract_full_text(root: &Element) -> String {
    let Some(body) = find_body(root) else {
        warn!("No body element found");
        return String::new();
    };

    let paragraphs: Vec<String> = body
        .find_all(&["para", "p", "simple-para"])
        .iter()
        .map(|p| formatted_text(p))
        .filter(|t| !t.is_empty())
        .collect();

    if paragraphs.is_empty() {
        // Bodies without paragraph markup still carry their text inline.
        return formatted_text(body);
    }

    paragraphs.join("\n\n")
}

fn extract_sections(root: &Element) -> Vec<Section> {
    let Some(body) = find_body(root) else {
        return Vec::new();
    };

    body.find_all(&["section", "sec"])
        .iter()
        .filter_map(|sec| {
            let label = sec
                .find_first(&["label"])
                .map(|l| l.text.trim().to_string())
                .unwrap_or_default();
            let title = sec
                .find_first(&["section-title", "title"])
                .map(|t| formatted_text(t))
                .unwrap_or_default();
            let paragraphs: Vec<String> = sec
                .find_all(&["para", "p"])
                .iter()
                .map(|p| formatted_text(p))
                .filter(|t| !t.is_empty())
                .collect();

            if label.is_empty() && title.is_empty() && paragraphs.is_empty() {
                None
            } else {
                Some(Section {
                    label,
                    title,
                    paragraphs,
                })
            }
        })
        .collect()
}

fn extract_tables(root: &Element) -> Vec<TableSummary> {
    root.find_all(&["table"])
        .iter()
        .filter_map(|table| {
            let label = table
                .find_first(&["label"])
                .map(|l| l.text.trim().to_string())
                .unwrap_or_default();
            let caption = table
                .find_first(&["caption"])
                .map(|c| formatted_text(c))
                .unwrap_or_default();

            if label.is_empty() && caption.is_empty() {
                None
            } else {
                Some(TableSummary { label, caption })
            }
        })
        .collect()
}

fn greek_symbol(tag: &str) -> Option<&'static str> {
    let symbol = match tag {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "omicron" => "ο",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        _ => return None,
    };
    Some(symbol)
}

/// Text of an element with inline scientific markup rendered: superscripts as
/// `^{..}`, subscripts as `_{..}`, math as `$..$`, Greek-letter elements as
/// their Unicode symbols. Whitespace is collapsed.
pub(crate) fn formatted_text(element: &Element) -> String {
    let raw = render_element(element);
    collapse_whitespace(&raw)
}

fn render_element(element: &Element) -> String {
    let mut result = element.text.clone();

    for child in &element.children {
        let child_text = render_element(child);
        match child.tag.as_str() {
            "sup" | "superscript" => {
                if !child_text.is_empty() {
                    result.push_str(&format!("^{{{}}}", child_text));
                }
            }
            "sub" | "subscript" | "inf" => {
                if !child_text.is_empty() {
                    result.push_str(&format!("_{{{}}}", child_text));
                }
            }
            "math" | "formula" | "equation" => {
                if !child_text.is_empty() {
                    result.push_str(&format!("${}$", child_text));
                }
            }
            "br" | "break" => result.push(' '),
            tag => match greek_symbol(tag) {
                Some(symbol) => {
                    result.push_str(symbol);
                    result.push_str(&child_text);
                }
                None => result.push_str(&child_text),
            },
        }
        result.push_str(&child.tail);
    }

    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<full-text-retrieval-response xmlns:ce="http://www.elsevier.com/xml/common/dtd"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
  <coredata>
    <dc:identifier>doi:10.1016/j.jqsrt.2020.107027</dc:identifier>
  </coredata>
  <originalText>
    <ce:abstract class="author">
      <ce:abstract-sec>
        <ce:simple-para>Rovibrational lines of H<ce:inf>2</ce:inf><ce:sup>18</ce:sup>O measured.</ce:simple-para>
      </ce:abstract-sec>
    </ce:abstract>
    <body>
      <ce:sections>
        <ce:section>
          <ce:label>1</ce:label>
          <ce:section-title>Introduction</ce:section-title>
          <ce:para>Water vapour dominates the infrared spectrum.</ce:para>
        </ce:section>
        <ce:section>
          <ce:label>2</ce:label>
          <ce:section-title>Experimental</ce:section-title>
          <ce:para>Spectra were recorded between 5900 and 8380 cm<ce:sup>-1</ce:sup>.</ce:para>
        </ce:section>
      </ce:sections>
    </body>
    <ce:table id="tbl1">
      <ce:label>Table 1</ce:label>
      <ce:caption><ce:simple-para>Measured line positions.</ce:simple-para></ce:caption>
    </ce:table>
  </originalText>
</full-text-retrieval-response>"#;

    #[test]
    fn test_parse_article_extracts_all_parts() {
        let doc = parse_article(SAMPLE_XML);

        assert_eq!(doc.doi, "10.1016/j.jqsrt.2020.107027");
        assert_eq!(
            doc.abstract_text,
            "Rovibrational lines of H_{2}^{18}O measured."
        );
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].label, "1");
        assert_eq!(doc.sections[0].title, "Introduction");
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].label, "Table 1");
        assert_eq!(doc.tables[0].caption, "Measured line positions.");
    }

    #[test]
    fn test_full_text_joins_paragraphs() {
        let doc = parse_article(SAMPLE_XML);
        assert!(doc
            .full_text
            .contains("Water vapour dominates the infrared spectrum."));
        assert!(doc.full_text.contains("5900 and 8380 cm^{-1}"));
        assert!(doc.full_text.contains("\n\n"));
    }

    #[test]
    fn test_format_for_llm_layout() {
        let doc = parse_article(SAMPLE_XML);
        let text = doc.format_for_llm();

        assert!(text.starts_with("=== PAPER ANALYSIS ==="));
        assert!(text.contains("Abstract: Rovibrational lines"));
        assert!(text.contains("Main Content: "));
        assert!(text.contains("Table 1: Measured line positions."));
    }

    #[test]
    fn test_greek_element_rendering() {
        let xml = "<para>The <mml:alpha/> band of <mml:nu/>2.</para>";
        let root = parse_tree(xml);
        assert_eq!(formatted_text(&root), "The α band of ν2.");
    }

    #[test]
    fn test_malformed_xml_keeps_partial_content() {
        let xml = "<article><abstract>Partial content here</abstract><body><para>Text";
        let doc = parse_article(xml);
        assert_eq!(doc.abstract_text, "Partial content here");
        assert_eq!(doc.full_text, "Text");
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_article("");
        assert!(doc.doi.is_empty());
        assert!(doc.abstract_text.is_empty());
        assert!(doc.tables.is_empty());
    }
}
