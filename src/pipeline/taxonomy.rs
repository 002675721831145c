//! Tag taxonomy: which report documents exist, where they live and in
//! which order monitor tags appear inside them.
//!
//! Loaded from the `file_configs` list of sort.yaml. The loaded taxonomy is a
//! template shared read-only between requests; `resolve_placeholders` derives
//! the per-run copy with `%INSTANCE%` substituted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::config::INSTANCE_PLACEHOLDER;

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse taxonomy: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Duplicate document name in taxonomy: {0}")]
    DuplicateDocument(String),
    #[error("Taxonomy entry {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// One report document of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxonomyEntry {
    #[serde(rename = "file_name")]
    pub document_name: String,
    #[serde(rename = "directory")]
    pub placement_path: String,
    #[serde(rename = "monitor_tags", default)]
    pub ordered_tags: Vec<String>,
}

impl TaxonomyEntry {
    /// Position of `tag` in this entry's ordered tag list (case-insensitive).
    pub fn tag_index(&self, tag: &str) -> Option<usize> {
        self.ordered_tags
            .iter()
            .position(|candidate| tags_match(candidate, tag))
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tag_index(tag).is_some()
    }
}

#[derive(Debug, Deserialize)]
struct SortConfig {
    #[serde(default)]
    file_configs: Vec<TaxonomyEntry>,
}

/// Immutable, validated list of taxonomy entries in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
}

impl Taxonomy {
    /// Validate and wrap a list of entries.
    ///
    /// Rejects empty document names or placement paths and repeated document
    /// names. Uniqueness is exact-string.
    pub fn new(entries: Vec<TaxonomyEntry>) -> Result<Self, TaxonomyError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.document_name.trim().is_empty() {
                return Err(TaxonomyError::EmptyField {
                    index,
                    field: "file_name",
                });
            }
            if entry.placement_path.trim().is_empty() {
                return Err(TaxonomyError::EmptyField {
                    index,
                    field: "directory",
                });
            }
            if !seen.insert(entry.document_name.as_str()) {
                return Err(TaxonomyError::DuplicateDocument(
                    entry.document_name.clone(),
                ));
            }
        }
        Ok(Self { entries })
    }

    pub fn parse(content: &str) -> Result<Self, TaxonomyError> {
        let config: SortConfig = serde_yaml::from_str(content)?;
        Self::new(config.file_configs)
    }

    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let content = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let taxonomy = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            documents = taxonomy.entries.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of this taxonomy with the instance placeholder substituted in
    /// every document name and placement path. The receiver is untouched.
    ///
    /// The copy is validated again, since substitution can make two document
    /// names equal.
    pub fn resolve_placeholders(&self, instance_id: &str) -> Result<Taxonomy, TaxonomyError> {
        let entries = self
            .entries
            .iter()
            .map(|entry| TaxonomyEntry {
                document_name: entry.document_name.replace(INSTANCE_PLACEHOLDER, instance_id),
                placement_path: entry
                    .placement_path
                    .replace(INSTANCE_PLACEHOLDER, instance_id),
                ordered_tags: entry.ordered_tags.clone(),
            })
            .collect();
        Taxonomy::new(entries)
    }

    /// First tag, in declared entry and tag order, equal to `tag` ignoring case.
    pub fn resolve_tag(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .flat_map(|entry| entry.ordered_tags.iter())
            .find(|candidate| tags_match(candidate, tag))
            .map(String::as_str)
    }
}

/// Case-insensitive tag equality, folding Unicode case.
fn tags_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Where the taxonomy template comes from for each pipeline run.
#[derive(Debug, Clone)]
pub enum TaxonomySource {
    /// Re-read from disk on every run.
    File(PathBuf),
    /// Loaded once and shared.
    Cached(Arc<Taxonomy>),
}

impl TaxonomySource {
    pub fn template(&self) -> Result<Arc<Taxonomy>, TaxonomyError> {
        match self {
            TaxonomySource::File(path) => Taxonomy::load(path).map(Arc::new),
            TaxonomySource::Cached(taxonomy) => Ok(Arc::clone(taxonomy)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORT_YAML: &str = r#"
file_configs:
  - file_name: health
    directory: "%INSTANCE%/reports"
    monitor_tags:
      - cpu
      - mem
  - file_name: "%INSTANCE%_disks"
    directory: "%INSTANCE%"
    monitor_tags:
      - disk
      - cpu
"#;

    fn entry(name: &str, dir: &str, tags: &[&str]) -> TaxonomyEntry {
        TaxonomyEntry {
            document_name: name.into(),
            placement_path: dir.into(),
            ordered_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn parses_sort_yaml_in_declared_order() {
        let taxonomy = Taxonomy::parse(SORT_YAML).unwrap();
        let names: Vec<_> = taxonomy
            .entries()
            .iter()
            .map(|e| e.document_name.as_str())
            .collect();
        assert_eq!(names, vec!["health", "%INSTANCE%_disks"]);
        assert_eq!(taxonomy.entries()[0].ordered_tags, vec!["cpu", "mem"]);
    }

    #[test]
    fn rejects_duplicate_document_names() {
        let err = Taxonomy::new(vec![
            entry("health", "a", &["cpu"]),
            entry("health", "b", &["mem"]),
        ])
        .unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateDocument(name) if name == "health"));
    }

    #[test]
    fn duplicate_check_is_case_sensitive() {
        assert!(Taxonomy::new(vec![
            entry("health", "a", &["cpu"]),
            entry("Health", "b", &["mem"]),
        ])
        .is_ok());
    }

    #[test]
    fn rejects_empty_name_or_directory() {
        let err = Taxonomy::new(vec![entry("", "a", &["cpu"])]).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyField { index: 0, field: "file_name" }));

        let err = Taxonomy::new(vec![entry("ok", "a", &[]), entry("x", " ", &["cpu"])]).unwrap_err();
        assert!(matches!(err, TaxonomyError::EmptyField { index: 1, field: "directory" }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        assert!(matches!(
            Taxonomy::parse("file_configs: {"),
            Err(TaxonomyError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Taxonomy::load(&dir.path().join("sort.yaml")).unwrap_err();
        assert!(matches!(err, TaxonomyError::Read { .. }));
    }

    #[test]
    fn resolve_placeholders_substitutes_names_and_paths() {
        let template = Taxonomy::parse(SORT_YAML).unwrap();
        let resolved = template.resolve_placeholders("prod1").unwrap();

        assert_eq!(resolved.entries()[0].placement_path, "prod1/reports");
        assert_eq!(resolved.entries()[1].document_name, "prod1_disks");
        assert_eq!(resolved.entries()[1].placement_path, "prod1");
        // Template is reusable for another instance
        assert_eq!(template.entries()[1].document_name, "%INSTANCE%_disks");
    }

    #[test]
    fn resolve_placeholders_is_idempotent() {
        let template = Taxonomy::parse(SORT_YAML).unwrap();
        let once = template.resolve_placeholders("edge-2").unwrap();
        let twice = once.resolve_placeholders("edge-2").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn resolved_names_must_stay_unique() {
        let template = Taxonomy::new(vec![
            entry("%INSTANCE%_a", "d", &["cpu"]),
            entry("prod_a", "d", &["cpu"]),
        ])
        .unwrap();

        let err = template.resolve_placeholders("prod").unwrap_err();
        assert!(matches!(err, TaxonomyError::DuplicateDocument(name) if name == "prod_a"));
        assert!(template.resolve_placeholders("edge").is_ok());
    }

    #[test]
    fn resolve_tag_is_first_match_ignoring_case() {
        let taxonomy = Taxonomy::new(vec![
            entry("a", "a", &["Disk", "CPU"]),
            entry("b", "b", &["cpu"]),
        ])
        .unwrap();
        assert_eq!(taxonomy.resolve_tag("cpu"), Some("CPU"));
        assert_eq!(taxonomy.resolve_tag("DISK"), Some("Disk"));
        assert_eq!(taxonomy.resolve_tag("net"), None);
    }

    #[test]
    fn tag_matching_folds_unicode_case() {
        let taxonomy = Taxonomy::new(vec![entry("a", "a", &["Größe", "ÉTAT"])]).unwrap();
        assert_eq!(taxonomy.resolve_tag("GRÖSSE"), None);
        assert_eq!(taxonomy.resolve_tag("größe"), Some("Größe"));
        assert_eq!(taxonomy.resolve_tag("état"), Some("ÉTAT"));
        assert_eq!(taxonomy.entries()[0].tag_index("état"), Some(1));
    }

    #[test]
    fn cached_source_shares_one_template() {
        let taxonomy = Arc::new(Taxonomy::parse(SORT_YAML).unwrap());
        let source = TaxonomySource::Cached(Arc::clone(&taxonomy));
        let loaded = source.template().unwrap();
        assert!(Arc::ptr_eq(&loaded, &taxonomy));
    }

    #[test]
    fn file_source_rereads_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sort.yaml");
        std::fs::write(&path, SORT_YAML).unwrap();
        let source = TaxonomySource::File(path.clone());
        assert_eq!(source.template().unwrap().entries().len(), 2);

        std::fs::write(
            &path,
            "file_configs:\n  - file_name: only\n    directory: d\n    monitor_tags: [x]\n",
        )
        .unwrap();
        assert_eq!(source.template().unwrap().entries().len(), 1);
    }
}
