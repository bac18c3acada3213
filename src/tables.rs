//! Table data extraction from article XML.
//!
//! Elsevier tables use the CALS model (`tgroup`, `colspec`, `thead`,
//! `tbody`, `row`, `entry`) with `namest`/`nameend` column spans and
//! `morerows` row spans. The grid is rebuilt as a rectangular matrix and
//! written as a CSV file next to a plain-text metadata file.

use crate::error::{MarvelitError, Result};
use crate::xml::{self, Element};
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One table cell with its span attributes resolved.
#[derive(Debug, Clone)]
struct Cell {
    text: String,
    morerows: usize,
    colspan: usize,
}

/// A table with its grid recovered from the CALS markup.
#[derive(Debug, Default)]
struct TableData {
    label: String,
    caption: String,
    headers: Vec<Vec<Cell>>,
    rows: Vec<Vec<Cell>>,
    footnotes: Vec<String>,
}

/// Extract the table whose label matches `table_title` and write its data
/// under `run_dir` as `<safe_doi>_table_data/<name>_table_data.csv` plus a
/// `<name>_table_info.txt` metadata file.
///
/// Returns the output folder. The match is fuzzy in both directions
/// ("Table 2" matches a requested "table 2." and vice versa).
pub fn extract_table_by_title(
    xml_content: &str,
    table_title: &str,
    uncertainty: &str,
    run_dir: &Path,
) -> Result<PathBuf> {
    let root = xml::parse_tree(xml_content);

    let doi = extract_doi(&root);
    let safe_doi = sanitize_for_path(&doi);
    let table_name: String = table_title.chars().take(7).collect();

    let table = find_table_by_title(&root, table_title).ok_or_else(|| {
        MarvelitError::Parse(format!("Table '{}' not found in document", table_title))
    })?;

    let data = extract_table_structure(table);
    if data.headers.is_empty() && data.rows.is_empty() {
        return Err(MarvelitError::Parse(format!(
            "Table '{}' has no extractable rows",
            table_title
        )));
    }

    let output_folder = run_dir.join(format!("{}_table_data", safe_doi));
    std::fs::create_dir_all(&output_folder)?;

    write_table_csv(&data, &output_folder, &table_name)?;
    write_table_info(&data, table_title, uncertainty, &doi, &output_folder, &table_name)?;

    info!(folder = %output_folder.display(), label = %data.label, "Table data saved");
    Ok(output_folder)
}

fn extract_doi(root: &Element) -> String {
    for elem in root.find_all(&["identifier", "doi"]) {
        let text = elem.text.trim();
        if !text.is_empty() {
            return text.trim_start_matches("doi:").to_string();
        }
    }
    "unknown_doi".to_string()
}

/// Keep word characters, hyphens and dots; everything else becomes `_`.
fn sanitize_for_path(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn find_table_by_title<'a>(root: &'a Element, table_title: &str) -> Option<&'a Element> {
    let target = table_title.trim().to_lowercase();

    root.find_all(&["table"]).into_iter().find(|table| {
        table
            .find_first(&["label"])
            .map(|label| {
                let label_text = label.text.trim().to_lowercase();
                !label_text.is_empty()
                    && (label_text.contains(&target) || target.contains(&label_text))
            })
            .unwrap_or(false)
    })
}

fn extract_table_structure(table: &Element) -> TableData {
    let mut data = TableData {
        label: table
            .find_first(&["label"])
            .map(|l| l.text.trim().to_string())
            .unwrap_or_default(),
        caption: table
            .find_first(&["caption"])
            .map(xml::formatted_text)
            .unwrap_or_default(),
        ..Default::default()
    };

    if let Some(tgroup) = table.find_first(&["tgroup"]) {
        let colspec = extract_colspec(tgroup);
        let (thead_rows, tbody_rows) = separate_rows(tgroup);

        data.headers = thead_rows
            .iter()
            .map(|row| extract_row_cells(row, &colspec))
            .filter(|cells| !cells.is_empty())
            .collect();
        data.rows = tbody_rows
            .iter()
            .map(|row| extract_row_cells(row, &colspec))
            .filter(|cells| !cells.is_empty())
            .collect();
    }

    extract_footnotes(table, &mut data);
    data
}

/// Header rows come from `thead`; data rows from `tbody`, or from every row
/// outside `thead` when the table has no `tbody`.
fn separate_rows(tgroup: &Element) -> (Vec<&Element>, Vec<&Element>) {
    let thead_rows: Vec<&Element> = tgroup
        .find_first(&["thead"])
        .map(|thead| thead.find_all(&["row"]))
        .unwrap_or_default();

    let tbody_rows: Vec<&Element> = match tgroup.find_first(&["tbody"]) {
        Some(tbody) => tbody.find_all(&["row"]),
        None => {
            let header_ptrs: Vec<*const Element> =
                thead_rows.iter().map(|r| *r as *const Element).collect();
            tgroup
                .find_all(&["row"])
                .into_iter()
                .filter(|r| !header_ptrs.contains(&(*r as *const Element)))
                .collect()
        }
    };

    (thead_rows, tbody_rows)
}

fn extract_colspec(tgroup: &Element) -> HashMap<String, usize> {
    let mut map = HashMap::new();

    for (idx, colspec) in tgroup.find_all(&["colspec"]).iter().enumerate() {
        if let Some(colname) = colspec.attr("colname") {
            map.insert(colname.to_string(), idx);
        }
    }

    if map.is_empty() {
        if let Some(total) = tgroup.attr("cols").and_then(|c| c.parse::<usize>().ok()) {
            for i in 0..total {
                map.insert(format!("col{}", i + 1), i);
            }
        }
    }

    map
}

fn extract_row_cells(row: &Element, colspec: &HashMap<String, usize>) -> Vec<Cell> {
    row.find_all(&["entry"])
        .iter()
        .map(|entry| Cell {
            text: xml::formatted_text(entry),
            morerows: entry
                .attr("morerows")
                .and_then(|m| m.parse().ok())
                .unwrap_or(0),
            colspan: calculate_colspan(entry.attr("namest"), entry.attr("nameend"), colspec),
        })
        .collect()
}

fn calculate_colspan(
    namest: Option<&str>,
    nameend: Option<&str>,
    colspec: &HashMap<String, usize>,
) -> usize {
    let (Some(start), Some(end)) = (namest, nameend) else {
        return 1;
    };

    if let (Some(&s), Some(&e)) = (colspec.get(start), colspec.get(end)) {
        return e.saturating_sub(s) + 1;
    }

    // Column names without a colspec usually embed their index (col1, col2).
    let digits = match Regex::new(r"(\d+)") {
        Ok(re) => re,
        Err(_) => return 1,
    };
    let number = |name: &str| {
        digits
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    };

    match (number(start), number(end)) {
        (Some(s), Some(e)) => e.saturating_sub(s) + 1,
        _ => 1,
    }
}

fn extract_footnotes(table: &Element, data: &mut TableData) {
    if let Some(legend) = table.find_first(&["legend"]) {
        let text = xml::formatted_text(legend);
        if !text.is_empty() {
            data.footnotes.push(text);
        }
    }

    for footnote in table.find_all(&["table-footnote"]) {
        let id = footnote.attr("id").unwrap_or("");
        let text = footnote
            .find_first(&["note-para"])
            .map(xml::formatted_text)
            .unwrap_or_else(|| xml::formatted_text(footnote));
        if !text.is_empty() {
            data.footnotes.push(format!("[{}] {}", id, text));
        }
    }
}

/// Expand the span attributes into a dense matrix. The spanning cell keeps
/// its text in the top-left position; covered positions become empty strings.
fn build_matrix(data: &TableData) -> Vec<Vec<String>> {
    let all_rows: Vec<&Vec<Cell>> = data.headers.iter().chain(data.rows.iter()).collect();
    let total_rows = all_rows.len();
    let max_cols = all_rows
        .iter()
        .map(|row| row.iter().map(|c| c.colspan).sum::<usize>())
        .max()
        .unwrap_or(0);

    if total_rows == 0 || max_cols == 0 {
        return Vec::new();
    }

    let mut matrix: Vec<Vec<Option<String>>> = vec![vec![None; max_cols]; total_rows];

    for (row_idx, row) in all_rows.iter().enumerate() {
        let mut col_idx = 0;
        for cell in row.iter() {
            while col_idx < max_cols && matrix[row_idx][col_idx].is_some() {
                col_idx += 1;
            }
            if col_idx >= max_cols {
                break;
            }

            for r in 0..=cell.morerows {
                for c in 0..cell.colspan {
                    let target_row = row_idx + r;
                    let target_col = col_idx + c;
                    if target_row < total_rows && target_col < max_cols {
                        matrix[target_row][target_col] = Some(if r == 0 && c == 0 {
                            cell.text.clone()
                        } else {
                            String::new()
                        });
                    }
                }
            }

            col_idx += cell.colspan;
        }
    }

    matrix
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.unwrap_or_default().replace(['\n', '\r'], " "))
                .collect()
        })
        .collect()
}

fn write_table_csv(data: &TableData, output_folder: &Path, table_name: &str) -> Result<()> {
    let matrix = build_matrix(data);
    if matrix.is_empty() {
        warn!("No data to write for table {}", data.label);
        return Ok(());
    }

    let csv_path = output_folder.join(format!("{}_table_data.csv", table_name));
    let mut writer = csv::Writer::from_path(&csv_path)?;
    for row in &matrix {
        writer.write_record(row)?;
    }
    writer.flush()?;

    info!(path = %csv_path.display(), rows = matrix.len(), "Table CSV saved");
    Ok(())
}

fn write_table_info(
    data: &TableData,
    table_title: &str,
    uncertainty: &str,
    doi: &str,
    output_folder: &Path,
    table_name: &str,
) -> Result<()> {
    let separator = "=".repeat(80);
    let divider = "-".repeat(40);

    let mut lines = vec![
        separator.clone(),
        format!("Paper DOI: {}", doi),
        format!("Table Title: {}", table_title),
        separator.clone(),
        String::new(),
    ];

    if !data.label.is_empty() {
        lines.push(format!("Table Label: {}", data.label));
    }
    if !data.caption.is_empty() {
        lines.push(format!("Table Caption: {}", data.caption));
    }
    lines.push(String::new());

    if !uncertainty.is_empty() {
        lines.push(format!("Uncertainty Information: {}", uncertainty));
        lines.push(String::new());
    }

    if !data.footnotes.is_empty() {
        lines.push("FOOTNOTES:".to_string());
        lines.push(divider.clone());
        for (i, footnote) in data.footnotes.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, footnote));
        }
        lines.push(String::new());
    }

    lines.push("FILE INFORMATION:".to_string());
    lines.push(divider);
    lines.push(format!("CSV data file: {}_table_data.csv", table_name));
    lines.push(format!("Info file: {}_table_info.txt", table_name));
    lines.push(format!(
        "Generated on: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(String::new());
    lines.push(separator);

    let txt_path = output_folder.join(format!("{}_table_info.txt", table_name));
    std::fs::write(&txt_path, lines.join("\n"))?;

    info!(path = %txt_path.display(), "Table info saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_XML: &str = r#"<?xml version="1.0"?>
<article xmlns:ce="http://www.elsevier.com/xml/common/dtd">
  <coredata>
    <dc:identifier xmlns:dc="http://purl.org/dc/elements/1.1/">doi:10.1016/test.2021.001</dc:identifier>
  </coredata>
  <ce:table id="tbl2">
    <ce:label>Table 2</ce:label>
    <ce:caption><ce:simple-para>Line positions and uncertainties.</ce:simple-para></ce:caption>
    <tgroup cols="3">
      <colspec colname="col1"/>
      <colspec colname="col2"/>
      <colspec colname="col3"/>
      <thead>
        <row>
          <entry>Line</entry>
          <entry namest="col2" nameend="col3">Position / cm-1</entry>
        </row>
      </thead>
      <tbody>
        <row>
          <entry morerows="1">P(1)</entry>
          <entry>2325.12</entry>
          <entry>0.001</entry>
        </row>
        <row>
          <entry>2327.45</entry>
          <entry>0.002</entry>
        </row>
      </tbody>
    </tgroup>
    <ce:table-footnote id="fn1">
      <ce:note-para>Uncertainties are one sigma.</ce:note-para>
    </ce:table-footnote>
  </ce:table>
</article>"#;

    fn parsed_table() -> TableData {
        let root = xml::parse_tree(TABLE_XML);
        let table = find_table_by_title(&root, "Table 2").unwrap();
        extract_table_structure(table)
    }

    #[test]
    fn test_fuzzy_title_match() {
        let root = xml::parse_tree(TABLE_XML);
        assert!(find_table_by_title(&root, "table 2").is_some());
        assert!(find_table_by_title(&root, "Table").is_some());
        assert!(find_table_by_title(&root, "Table 9").is_none());
    }

    #[test]
    fn test_structure_extraction() {
        let data = parsed_table();
        assert_eq!(data.label, "Table 2");
        assert_eq!(data.caption, "Line positions and uncertainties.");
        assert_eq!(data.headers.len(), 1);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.footnotes, vec!["[fn1] Uncertainties are one sigma."]);
    }

    #[test]
    fn test_colspan_from_colspec() {
        let data = parsed_table();
        assert_eq!(data.headers[0][1].colspan, 2);
    }

    #[test]
    fn test_matrix_expands_spans() {
        let data = parsed_table();
        let matrix = build_matrix(&data);

        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[0], vec!["Line", "Position / cm-1", ""]);
        assert_eq!(matrix[1], vec!["P(1)", "2325.12", "0.001"]);
        // morerows=1 carries P(1) down as a covered (empty) cell
        assert_eq!(matrix[2], vec!["", "2327.45", "0.002"]);
    }

    #[test]
    fn test_colspan_from_digit_names() {
        let empty = HashMap::new();
        assert_eq!(calculate_colspan(Some("col2"), Some("col4"), &empty), 3);
        assert_eq!(calculate_colspan(None, None, &empty), 1);
        assert_eq!(calculate_colspan(Some("a"), Some("b"), &empty), 1);
    }

    #[test]
    fn test_extract_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let folder =
            extract_table_by_title(TABLE_XML, "Table 2", "one sigma", dir.path()).unwrap();

        assert!(folder.ends_with("10.1016_test.2021.001_table_data"));
        assert!(folder.join("Table 2_table_data.csv").exists());
        let info = std::fs::read_to_string(folder.join("Table 2_table_info.txt")).unwrap();
        assert!(info.contains("Paper DOI: 10.1016/test.2021.001"));
        assert!(info.contains("Uncertainty Information: one sigma"));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_table_by_title(TABLE_XML, "Table 7", "", dir.path());
        assert!(result.is_err());
    }
}
