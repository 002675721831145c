//! Markdown report rendering.
//!
//! Each taxonomy entry becomes `<output_root>/<customer>/<placement>/<name>.md`.
//! Records are ordered by their tag's position in the entry (stable, so ties
//! keep arrival order) and each record with a payload becomes one block: a
//! `# <description>` heading line followed by the decoded payload inside a
//! fenced code block.
//!
//! A document whose records all lack content is not written, and a stale copy
//! from an earlier run is removed.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Serialize;

use super::classify::{DocumentGroup, Record};
use super::taxonomy::{Taxonomy, TaxonomyEntry};

pub const REPORT_EXTENSION: &str = "md";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to create customer directory {path}: {source}")]
    CustomerDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure confined to a single document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove stale {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What happened to one taxonomy document during a render.
#[derive(Debug)]
pub enum DocumentOutcome {
    /// File written with at least one block.
    Written { path: PathBuf, blocks: usize },
    /// No block produced; an existing file was deleted.
    Removed { path: PathBuf },
    /// No block produced and nothing on disk.
    Empty,
    /// No records were classified to this document; disk left untouched.
    NoRecords,
    Failed(DocumentError),
}

#[derive(Debug, Default)]
pub struct RenderReport {
    pub documents: Vec<(String, DocumentOutcome)>,
    /// Records whose payload could not be decoded.
    pub undecodable_records: usize,
}

impl RenderReport {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.documents.iter().filter_map(|(_, outcome)| match outcome {
            DocumentOutcome::Written { path, .. } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &Path> {
        self.documents.iter().filter_map(|(_, outcome)| match outcome {
            DocumentOutcome::Removed { path } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DocumentError)> {
        self.documents
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                DocumentOutcome::Failed(err) => Some((name.as_str(), err)),
                _ => None,
            })
    }

    pub fn summary(&self) -> RenderSummary {
        RenderSummary {
            written: self.written().count(),
            removed: self.removed().count(),
            failed: self
                .failures()
                .map(|(name, err)| FailedDocument {
                    document: name.to_string(),
                    error: err.to_string(),
                })
                .collect(),
            undecodable_records: self.undecodable_records,
        }
    }
}

/// Serializable digest of a render for the HTTP response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RenderSummary {
    pub written: usize,
    pub removed: usize,
    pub failed: Vec<FailedDocument>,
    pub undecodable_records: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedDocument {
    pub document: String,
    pub error: String,
}

/// Render every taxonomy document for one customer, in declared order.
pub fn render(
    group: &DocumentGroup<'_>,
    taxonomy: &Taxonomy,
    output_root: &Path,
    customer_id: &str,
) -> Result<RenderReport, RenderError> {
    let customer_dir = output_root.join(customer_id);
    std::fs::create_dir_all(&customer_dir).map_err(|source| RenderError::CustomerDir {
        path: customer_dir.clone(),
        source,
    })?;

    let mut report = RenderReport::default();
    for entry in taxonomy.entries() {
        let outcome = render_document(
            entry,
            group.records(&entry.document_name),
            &customer_dir,
            &mut report.undecodable_records,
        );
        match &outcome {
            DocumentOutcome::Failed(err) => {
                tracing::error!(document = %entry.document_name, error = %err, "Failed to render document");
            }
            DocumentOutcome::Written { path, blocks } => {
                tracing::debug!(document = %entry.document_name, path = %path.display(), blocks, "Wrote report");
            }
            DocumentOutcome::Removed { path } => {
                tracing::debug!(document = %entry.document_name, path = %path.display(), "Removed report with no content");
            }
            DocumentOutcome::Empty | DocumentOutcome::NoRecords => {
                tracing::debug!(document = %entry.document_name, "Skipping empty report");
            }
        }
        report.documents.push((entry.document_name.clone(), outcome));
    }
    Ok(report)
}

fn render_document(
    entry: &TaxonomyEntry,
    records: &[&Record],
    customer_dir: &Path,
    undecodable: &mut usize,
) -> DocumentOutcome {
    let dir = customer_dir.join(&entry.placement_path);
    if let Err(source) = std::fs::create_dir_all(&dir) {
        return DocumentOutcome::Failed(DocumentError::CreateDir { path: dir, source });
    }

    if records.is_empty() {
        return DocumentOutcome::NoRecords;
    }

    let mut ordered = records.to_vec();
    ordered.sort_by_key(|record| entry.tag_index(&record.tag).unwrap_or(usize::MAX));

    let mut content = String::new();
    let mut blocks = 0;
    for record in ordered {
        if !record.has_payload() {
            continue;
        }
        match decode_payload(&record.payload) {
            Ok(text) => {
                push_block(&mut content, &record.description, &text);
                blocks += 1;
            }
            Err(err) => {
                *undecodable += 1;
                tracing::error!(
                    document = %entry.document_name,
                    index = record.index,
                    error = %err,
                    "Error decoding output data, skipping record"
                );
            }
        }
    }

    let path = dir.join(format!("{}.{REPORT_EXTENSION}", entry.document_name));
    if blocks == 0 {
        return match std::fs::remove_file(&path) {
            Ok(()) => DocumentOutcome::Removed { path },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentOutcome::Empty,
            Err(source) => DocumentOutcome::Failed(DocumentError::Remove { path, source }),
        };
    }

    match std::fs::write(&path, content) {
        Ok(()) => DocumentOutcome::Written { path, blocks },
        Err(source) => DocumentOutcome::Failed(DocumentError::Write { path, source }),
    }
}

fn decode_payload(payload: &str) -> Result<String, base64::DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn push_block(content: &mut String, heading: &str, body: &str) {
    content.push_str("# ");
    content.push_str(heading);
    content.push_str("\n```\n");
    content.push_str(body);
    content.push_str("\n```\n");
}
