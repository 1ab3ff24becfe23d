//! CSV sinks for matched and unmatched keywords
//!
//! Rows are flushed as they are written so a long run can be inspected (or
//! resumed) while it is still going. Only the orchestrator writes, so no
//! locking is needed here.

use crate::error::Result;
use crate::types::{
    EntityRef, MatchedRecord, ReconciliationResult, UnmatchedRecord, LOOKUP_FAILED_NOTE,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, warn};

/// Separator for multi-valued columns
const LIST_SEPARATOR: &str = "; ";

const MATCHED_HEADERS: [&str; 9] = [
    "Keyword",
    "Wikidata_QID",
    "Wikidata_Label",
    "Match_Score",
    "Instances_QIDs",
    "Instances_Labels",
    "Subclasses_QIDs",
    "Subclasses_Labels",
    "Wikipedia_English_Link",
];

const UNMATCHED_HEADERS: [&str; 3] = ["Keyword", "Best_Score", "Note"];

/// Column of the unmatched file holding the reason
const NOTE_COLUMN: &str = "Note";

#[derive(Debug, Serialize)]
struct MatchedRow<'a> {
    #[serde(rename = "Keyword")]
    keyword: &'a str,
    #[serde(rename = "Wikidata_QID")]
    qid: &'a str,
    #[serde(rename = "Wikidata_Label")]
    label: &'a str,
    #[serde(rename = "Match_Score")]
    score: String,
    #[serde(rename = "Instances_QIDs")]
    instance_qids: String,
    #[serde(rename = "Instances_Labels")]
    instance_labels: String,
    #[serde(rename = "Subclasses_QIDs")]
    subclass_qids: String,
    #[serde(rename = "Subclasses_Labels")]
    subclass_labels: String,
    #[serde(rename = "Wikipedia_English_Link")]
    wikipedia_url: &'a str,
}

impl<'a> From<&'a MatchedRecord> for MatchedRow<'a> {
    fn from(record: &'a MatchedRecord) -> Self {
        Self {
            keyword: record.keyword.as_str(),
            qid: &record.qid,
            label: &record.label,
            score: format_score(record.score),
            instance_qids: join_qids(&record.instance_of),
            instance_labels: join_labels(&record.instance_of),
            subclass_qids: join_qids(&record.subclass_of),
            subclass_labels: join_labels(&record.subclass_of),
            wikipedia_url: record.wikipedia_url.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UnmatchedRow<'a> {
    #[serde(rename = "Keyword")]
    keyword: &'a str,
    #[serde(rename = "Best_Score")]
    best_score: String,
    #[serde(rename = "Note")]
    note: String,
}

impl<'a> From<&'a UnmatchedRecord> for UnmatchedRow<'a> {
    fn from(record: &'a UnmatchedRecord) -> Self {
        Self {
            keyword: record.keyword.as_str(),
            best_score: record.best_score.map(format_score).unwrap_or_default(),
            note: record.reason.note(),
        }
    }
}

fn format_score(score: f64) -> String {
    format!("{:.1}", score)
}

fn join_qids(refs: &[EntityRef]) -> String {
    refs.iter()
        .map(|r| r.qid.as_str())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn join_labels(refs: &[EntityRef]) -> String {
    refs.iter()
        .map(|r| r.label.as_str())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// True when the file is absent or has no content yet
fn needs_header(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => content.trim().is_empty(),
        Err(_) => true,
    }
}

/// Open an output file; the header goes out immediately so even a file that
/// never receives a row is a valid CSV
fn open_writer(path: &Path, append: bool, headers: &[&str]) -> Result<csv::Writer<File>> {
    let write_header = !append || needs_header(path);

    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)?
    } else {
        File::create(path)?
    };

    debug!(path = %path.display(), append, write_header, "Opened output file");

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if write_header {
        writer.write_record(headers)?;
        writer.flush()?;
    }
    Ok(writer)
}

/// Matched / unmatched output pair
pub struct ResultSink {
    matched: csv::Writer<File>,
    unmatched: csv::Writer<File>,
}

impl ResultSink {
    /// Open both files. With `append = false` they are truncated.
    pub fn open(matched_path: &Path, unmatched_path: &Path, append: bool) -> Result<Self> {
        Ok(Self {
            matched: open_writer(matched_path, append, &MATCHED_HEADERS)?,
            unmatched: open_writer(unmatched_path, append, &UNMATCHED_HEADERS)?,
        })
    }

    /// Write one result to the appropriate file and flush it
    pub fn write(&mut self, result: &ReconciliationResult) -> Result<()> {
        match result {
            ReconciliationResult::Matched(record) => {
                self.matched.serialize(MatchedRow::from(record))?;
                self.matched.flush()?;
            }
            ReconciliationResult::Unmatched(record) => {
                self.unmatched.serialize(UnmatchedRow::from(record))?;
                self.unmatched.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.matched.flush()?;
        self.unmatched.flush()?;
        Ok(())
    }
}

/// Keywords already present in existing output files (first column)
///
/// Rows noted as failed lookups are not counted, so a resumed run retries
/// them; the old row stays in the file. Missing files contribute nothing.
/// Unreadable files are logged and skipped.
pub fn read_processed_keywords(paths: &[&Path]) -> HashSet<String> {
    let mut processed = HashSet::new();

    for path in paths {
        if !path.exists() {
            continue;
        }

        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
        {
            Ok(reader) => reader,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read existing output");
                continue;
            }
        };

        let note_index = match reader.headers() {
            Ok(headers) => headers.iter().position(|h| h == NOTE_COLUMN),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read output header");
                continue;
            }
        };

        let mut retry = 0usize;
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable output row");
                    continue;
                }
            };

            let lookup_failed = note_index
                .and_then(|i| record.get(i))
                .is_some_and(|note| note.starts_with(LOOKUP_FAILED_NOTE));
            if lookup_failed {
                retry += 1;
                continue;
            }

            if let Some(keyword) = record.get(0).map(str::trim).filter(|k| !k.is_empty()) {
                processed.insert(keyword.to_string());
            }
        }

        if retry > 0 {
            debug!(path = %path.display(), retry, "Failed lookups will be retried");
        }
    }

    processed
}
