//! Keyword list loading and preparation
//!
//! - [`load_keywords`]: one keyword per record, first CSV column
//! - [`swap_comma_text`]: MeSH inverted headings → natural order
//! - [`extract_anchor_texts`] / [`prepare_keyword_list`]: build a keyword
//!   list from a saved MeSH HTML listing

use crate::error::Result;
use crate::types::Keyword;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;
use tracing::{debug, info};

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a\s*>").expect("anchor regex is valid"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));

/// Reorder an inverted heading
///
/// `"Diabetes Mellitus, Type 2"` → `"Type 2 Diabetes Mellitus"`.
/// With more than two parts the remaining parts follow the second, and the
/// first part goes last. Strings without a comma are only trimmed.
pub fn swap_comma_text(input: &str) -> String {
    if !input.contains(',') {
        return input.trim().to_string();
    }

    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let mut ordered: Vec<&str> = parts[1..].to_vec();
    ordered.push(parts[0]);
    ordered.retain(|p| !p.is_empty());
    ordered.join(" ")
}

/// Read keywords from any reader (first column of each record)
pub fn parse_keywords<R: Read>(reader: R, swap_commas: bool) -> Result<Vec<Keyword>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut keywords = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for record in csv_reader.records() {
        let record = record?;
        let Some(raw) = record.get(0) else {
            continue;
        };

        let text = if swap_commas {
            swap_comma_text(raw)
        } else {
            raw.to_string()
        };

        // Blank rows are skipped, not errors
        let Ok(keyword) = Keyword::new(text) else {
            continue;
        };

        if !seen.insert(keyword.clone()) {
            debug!(keyword = %keyword, "Duplicate keyword in input");
        }
        keywords.push(keyword);
    }

    Ok(keywords)
}

/// Load the keyword list from a file
pub fn load_keywords(path: &Path, swap_commas: bool) -> Result<Vec<Keyword>> {
    let file = File::open(path)?;
    let keywords = parse_keywords(file, swap_commas)?;
    info!(path = %path.display(), count = keywords.len(), "Loaded keywords");
    Ok(keywords)
}

/// Decode the handful of entities that appear in MeSH listings
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Visible text of every `<a>` element, in document order
pub fn extract_anchor_texts(html: &str) -> Vec<String> {
    ANCHOR_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| {
            let stripped = TAG_RE.replace_all(inner.as_str(), " ");
            decode_entities(&stripped)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

/// Turn a saved MeSH HTML page into a keyword list file
///
/// Returns the number of keywords written.
pub fn prepare_keyword_list(html_path: &Path, output_path: &Path) -> Result<usize> {
    let html = std::fs::read_to_string(html_path)?;

    let keywords: Vec<String> = extract_anchor_texts(&html)
        .iter()
        .map(|text| swap_comma_text(text))
        .filter(|text| !text.is_empty())
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(File::create(output_path)?));
    for keyword in &keywords {
        writer.write_record([keyword])?;
    }
    writer.flush()?;

    info!(
        html = %html_path.display(),
        output = %output_path.display(),
        count = keywords.len(),
        "Prepared keyword list"
    );
    Ok(keywords.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_two_parts() {
        assert_eq!(
            swap_comma_text("Diabetes Mellitus, Type 2"),
            "Type 2 Diabetes Mellitus"
        );
    }

    #[test]
    fn test_swap_three_parts() {
        assert_eq!(
            swap_comma_text("Anemia, Hemolytic, Congenital"),
            "Hemolytic Congenital Anemia"
        );
    }

    #[test]
    fn test_no_comma_trimmed() {
        assert_eq!(swap_comma_text("  Aspirin "), "Aspirin");
    }

    #[test]
    fn test_trailing_comma_drops_empty_part() {
        assert_eq!(swap_comma_text("Cell,"), "Cell");
    }

    #[test]
    fn test_parse_first_column_and_skip_blank() {
        let input = "Diabetes Mellitus,extra\n\n   \nAspirin\n\"Anemia, Hemolytic\"\n";
        let keywords = parse_keywords(input.as_bytes(), false).unwrap();
        let values: Vec<&str> = keywords.iter().map(Keyword::as_str).collect();
        assert_eq!(values, vec!["Diabetes Mellitus", "Aspirin", "Anemia, Hemolytic"]);
    }

    #[test]
    fn test_parse_with_swap() {
        let input = "\"Anemia, Hemolytic\"\n";
        let keywords = parse_keywords(input.as_bytes(), true).unwrap();
        assert_eq!(keywords[0].as_str(), "Hemolytic Anemia");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let keywords = parse_keywords("Cell\nCell\n".as_bytes(), false).unwrap();
        assert_eq!(keywords.len(), 2);
    }

    #[test]
    fn test_extract_anchor_texts() {
        let html = r#"
            <ul>
              <li><a href="/record/ui?ui=D003920">Diabetes Mellitus</a></li>
              <li><A HREF="x"><span>Anemia,</span>
                  Hemolytic</A></li>
              <li><a href="y">Salicylates &amp; Derivatives</a></li>
              <li><a href="z">   </a></li>
            </ul>"#;

        assert_eq!(
            extract_anchor_texts(html),
            vec![
                "Diabetes Mellitus".to_string(),
                "Anemia, Hemolytic".to_string(),
                "Salicylates & Derivatives".to_string(),
            ]
        );
    }

    #[test]
    fn test_prepare_keyword_list_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let html_path = dir.path().join("data.html");
        let out_path = dir.path().join("list_wiki.csv");
        std::fs::write(
            &html_path,
            r#"<a href="1">Diabetes Mellitus, Type 2</a><a href="2">Aspirin</a>"#,
        )
        .unwrap();

        let count = prepare_keyword_list(&html_path, &out_path).unwrap();
        assert_eq!(count, 2);

        let keywords = load_keywords(&out_path, false).unwrap();
        let values: Vec<&str> = keywords.iter().map(Keyword::as_str).collect();
        assert_eq!(values, vec!["Type 2 Diabetes Mellitus", "Aspirin"]);
    }
}
