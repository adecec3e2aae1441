//! Run history queries and export

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Outcome, ResultRecord, RunRecord};
use crate::store::{
    from_document, Document, DocumentId, DocumentStore, Filter, StoreError, RESULT_COLLECTION,
    RUN_COLLECTION,
};

/// A run document with its id
#[derive(Clone, Debug, Serialize)]
pub struct StoredRun {
    pub id: DocumentId,
    #[serde(flatten)]
    pub record: RunRecord,
}

/// A result document with its id
#[derive(Clone, Debug, Serialize)]
pub struct StoredResult {
    pub id: DocumentId,
    #[serde(flatten)]
    pub record: ResultRecord,
}

/// Read access to stored runs and results
pub struct RunHistory<S: DocumentStore + ?Sized> {
    store: Arc<S>,
}

impl<S: DocumentStore + ?Sized> RunHistory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Runs, newest first, optionally limited to one suite
    pub fn runs(&self, suite: Option<&str>) -> Result<Vec<StoredRun>, StoreError> {
        let mut filter = Filter::new();
        if let Some(suite) = suite {
            filter.insert("suite_name".into(), Value::from(suite));
        }

        let mut runs = self
            .store
            .find(RUN_COLLECTION, &filter)?
            .into_iter()
            .map(|doc| from_document(RUN_COLLECTION, doc).map(|(id, record)| StoredRun { id, record }))
            .collect::<Result<Vec<_>, _>>()?;

        runs.sort_by(|a, b| b.record.start_time.cmp(&a.record.start_time));
        debug!("Found {} runs", runs.len());
        Ok(runs)
    }

    pub fn run(&self, id: &DocumentId) -> Result<Option<RunRecord>, StoreError> {
        match self.store.find_one(RUN_COLLECTION, id)? {
            Some(body) => {
                let document = Document {
                    id: id.clone(),
                    body,
                };
                Ok(Some(from_document(RUN_COLLECTION, document)?.1))
            }
            None => Ok(None),
        }
    }

    /// Results of one run in execution order, optionally limited to one status
    pub fn results(
        &self,
        run_id: &DocumentId,
        status: Option<Outcome>,
    ) -> Result<Vec<StoredResult>, StoreError> {
        let mut filter = Filter::new();
        filter.insert("run_id".into(), Value::from(run_id.as_str()));
        if let Some(status) = status {
            filter.insert("status".into(), Value::from(status.as_str()));
        }

        let mut results = self
            .store
            .find(RESULT_COLLECTION, &filter)?
            .into_iter()
            .map(|doc| {
                from_document(RESULT_COLLECTION, doc).map(|(id, record)| StoredResult { id, record })
            })
            .collect::<Result<Vec<_>, _>>()?;

        results.sort_by_key(|r| r.record.execution_order);
        Ok(results)
    }

    /// Export results to a file
    pub fn export(&self, results: &[StoredResult], path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), results)
                    .context("Failed to write results")?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;

                writer.write_record([
                    "id",
                    "execution_order",
                    "full_name",
                    "status",
                    "duration_seconds",
                    "priority",
                    "main_component",
                    "sub_tests",
                    "reason_skipped",
                    "defects",
                ])?;

                for result in results {
                    let record = &result.record;
                    writer.write_record([
                        result.id.to_string(),
                        record.execution_order.to_string(),
                        record.full_name.clone(),
                        record.status.to_string(),
                        record
                            .duration_seconds
                            .map(|d| format!("{d:.3}"))
                            .unwrap_or_default(),
                        record.priority.to_string(),
                        record.main_component.clone().unwrap_or_default(),
                        record.sub_tests.len().to_string(),
                        record.reason_skipped.clone().unwrap_or_default(),
                        record.defects.join(";"),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported {} results to {}", results.len(), path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
