//! Ingestion-to-commit pipeline.
//!
//! decode → classify → render → sync, run end-to-end inside one request while
//! the caller holds the customer's lock.

pub mod classify;
pub mod customer_lock;
pub mod render;
pub mod taxonomy;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::vcs::{RepositorySyncAgent, SyncError, SyncOutcome, SyncStep};
use customer_lock::CustomerGuard;
use render::{RenderError, RenderSummary};
use taxonomy::{TaxonomyError, TaxonomySource};

pub use customer_lock::CustomerLocks;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Taxonomy unavailable: {0}")]
    Config(#[from] TaxonomyError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Rendered {written} document(s), then {source}")]
    Sync {
        written: usize,
        render: RenderSummary,
        #[source]
        source: SyncError,
    },
}

impl PipelineError {
    /// Sync step that failed, if the pipeline got that far.
    pub fn failed_step(&self) -> Option<SyncStep> {
        match self {
            Self::Sync { source, .. } => Some(source.step),
            _ => None,
        }
    }
}

/// Result of a successful pipeline run, returned to the caller as JSON.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PipelineReport {
    pub customer: String,
    pub instance: String,
    pub records_received: usize,
    pub records_classified: usize,
    pub records_skipped: usize,
    pub documents: RenderSummary,
    pub sync: SyncOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Counts from the filesystem half of a run.
#[derive(Debug)]
struct RenderedBatch {
    records_received: usize,
    records_classified: usize,
    records_skipped: usize,
    documents: RenderSummary,
}

/// Run one batch for `customer_id`/`instance_id`.
///
/// `guard` must be the lock for `customer_id`; the whole render and sync
/// sequence runs under it.
pub async fn run_pipeline(
    guard: &CustomerGuard,
    batch: Vec<Value>,
    customer_id: &str,
    instance_id: &str,
    taxonomy: &TaxonomySource,
    data_dir: &Path,
    agent: &RepositorySyncAgent,
) -> Result<PipelineReport, PipelineError> {
    debug_assert_eq!(guard.customer_id(), customer_id);

    let rendered = {
        let taxonomy = taxonomy.clone();
        let data_dir = data_dir.to_path_buf();
        let customer = customer_id.to_string();
        let instance = instance_id.to_string();
        tokio::task::spawn_blocking(move || {
            render_batch(batch, &taxonomy, &data_dir, &customer, &instance)
        })
        .await??
    };
    let documents = rendered.documents;

    let sync = match agent.sync(customer_id, instance_id, data_dir).await {
        Ok(outcome) => outcome,
        Err(source) => {
            return Err(PipelineError::Sync {
                written: documents.written,
                render: documents,
                source,
            })
        }
    };

    Ok(PipelineReport {
        customer: customer_id.to_string(),
        instance: instance_id.to_string(),
        records_received: rendered.records_received,
        records_classified: rendered.records_classified,
        records_skipped: rendered.records_skipped,
        documents,
        sync,
        completed_at: Utc::now(),
    })
}

/// Load the taxonomy, classify the batch and write the reports. Blocking.
fn render_batch(
    batch: Vec<Value>,
    source: &TaxonomySource,
    data_dir: &Path,
    customer_id: &str,
    instance_id: &str,
) -> Result<RenderedBatch, PipelineError> {
    let template = source.template()?;
    let taxonomy = template.resolve_placeholders(instance_id)?;
    if taxonomy.is_empty() {
        tracing::warn!(customer = customer_id, "Taxonomy has no documents, nothing will be rendered");
    }

    let records_received = batch.len();
    let (records, malformed) = classify::decode_batch(batch);
    let group = classify::classify(&records, &taxonomy);
    let records_skipped = malformed.len() + group.skipped().len();
    tracing::info!(
        customer = customer_id,
        instance = instance_id,
        received = records_received,
        classified = group.classified(),
        skipped = records_skipped,
        documents = group.document_count(),
        "Classified batch"
    );

    let documents = render::render(&group, &taxonomy, data_dir, customer_id)?.summary();
    tracing::info!(
        customer = customer_id,
        written = documents.written,
        removed = documents.removed,
        failed = documents.failed.len(),
        "Rendered reports"
    );

    Ok(RenderedBatch {
        records_received,
        records_classified: group.classified(),
        records_skipped,
        documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::fake::FakeSyncTool;
    use base64::Engine;
    use serde_json::json;
    use std::sync::Arc;

    const SORT_YAML: &str = r#"
file_configs:
  - file_name: health
    directory: "%INSTANCE%"
    monitor_tags: [cpu, mem]
  - file_name: capacity
    directory: "%INSTANCE%"
    monitor_tags: [disk, cpu]
"#;

    fn b64(text: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(text)
    }

    fn source() -> TaxonomySource {
        TaxonomySource::Cached(Arc::new(taxonomy::Taxonomy::parse(SORT_YAML).unwrap()))
    }

    async fn run(
        tool: Arc<FakeSyncTool>,
        data: &Path,
        batch: Vec<Value>,
    ) -> Result<PipelineReport, PipelineError> {
        let locks = CustomerLocks::new();
        let guard = locks.acquire("acme").await;
        let agent = RepositorySyncAgent::new(tool);
        run_pipeline(&guard, batch, "acme", "prod1", &source(), data, &agent).await
    }

    #[tokio::test]
    async fn batch_is_rendered_and_submitted() {
        let data = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeSyncTool::with_changes());
        let batch = vec![
            json!({"monitor_tag": "cpu", "description": "CPU Load", "output": b64("95%")}),
            json!({"monitor_tag": "cpu", "description": "CPU Idle", "output": ""}),
            json!({"monitor_tag": "network", "description": "Unknown", "output": b64("x")}),
            json!("not an object"),
        ];

        let report = run(Arc::clone(&tool), data.path(), batch).await.unwrap();

        assert_eq!(report.records_received, 4);
        assert_eq!(report.records_classified, 2);
        assert_eq!(report.records_skipped, 2);
        assert_eq!(report.documents.written, 2);
        assert_eq!(report.sync, SyncOutcome::Submitted);

        let health = std::fs::read_to_string(data.path().join("acme/prod1/health.md")).unwrap();
        assert_eq!(health, "# CPU Load\n```\n95%\n```\n");
        assert!(data.path().join("acme/prod1/capacity.md").exists());
        assert_eq!(tool.calls().len(), 5);
    }

    #[tokio::test]
    async fn nothing_to_submit_is_success() {
        let data = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeSyncTool::default());
        let batch = vec![json!({"monitor_tag": "mem", "description": "Mem", "output": ""})];

        let report = run(Arc::clone(&tool), data.path(), batch).await.unwrap();
        assert_eq!(report.sync, SyncOutcome::NoChanges);
        assert_eq!(report.documents.written, 0);
        assert!(!data.path().join("acme/prod1/health.md").exists());
    }

    #[tokio::test]
    async fn sync_failure_reports_step_and_render_progress() {
        let data = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeSyncTool::failing_at(SyncStep::Resolve));
        let batch = vec![json!({"monitor_tag": "mem", "description": "Mem", "output": b64("1G")})];

        let err = run(tool, data.path(), batch).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(SyncStep::Resolve));
        match err {
            PipelineError::Sync { written, .. } => assert_eq!(written, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(data.path().join("acme/prod1/health.md").exists());
    }

    #[tokio::test]
    async fn missing_taxonomy_is_config_error_and_skips_sync() {
        let data = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeSyncTool::with_changes());
        let locks = CustomerLocks::new();
        let guard = locks.acquire("acme").await;
        let agent = RepositorySyncAgent::new(Arc::clone(&tool) as Arc<dyn crate::vcs::SyncTool>);
        let missing = TaxonomySource::File(data.path().join("nope.yaml"));

        let err = run_pipeline(&guard, vec![], "acme", "prod1", &missing, data.path(), &agent)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.failed_step().is_none());
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn colliding_resolved_names_are_config_error() {
        let data = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeSyncTool::with_changes());
        let locks = CustomerLocks::new();
        let guard = locks.acquire("acme").await;
        let agent = RepositorySyncAgent::new(Arc::clone(&tool) as Arc<dyn crate::vcs::SyncTool>);
        let yaml = "file_configs:\n  - file_name: \"%INSTANCE%_a\"\n    directory: d\n    monitor_tags: [cpu]\n  - file_name: prod_a\n    directory: d\n    monitor_tags: [cpu]\n";
        let colliding = TaxonomySource::Cached(Arc::new(taxonomy::Taxonomy::parse(yaml).unwrap()));
        let batch = vec![json!({"monitor_tag": "cpu", "description": "CPU", "output": b64("1")})];

        let err = run_pipeline(&guard, batch, "acme", "prod", &colliding, data.path(), &agent)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(TaxonomyError::DuplicateDocument(_))));
        assert!(!data.path().join("acme/d/prod_a.md").exists());
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn report_serializes_outcome_in_snake_case() {
        let data = tempfile::tempdir().unwrap();
        let report = run(Arc::new(FakeSyncTool::default()), data.path(), vec![])
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sync"], "no_changes");
        assert_eq!(json["customer"], "acme");
        assert_eq!(json["documents"]["written"], 0);
        assert!(json["completed_at"].as_str().is_some());
    }
}
