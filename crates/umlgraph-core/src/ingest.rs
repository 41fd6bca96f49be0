//! Ingest orchestration: load a document, plan it, and apply the plan to a
//! store in one transaction together with its audit record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::extraction::{self, ExtractionDoc};
use crate::merge::{self, ApplyReport, ReconcilePolicy};
use crate::plan::{self, GraphPlan, IngestOptions};
use crate::store::{GraphStore, IngestRun};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub source: String,
    pub block_id: String,
    pub spec_id: String,
    /// `None` for dry runs, which write no audit record.
    pub run_id: Option<Uuid>,
    pub dry_run: bool,
    pub entities: usize,
    pub fields: usize,
    pub relationships: usize,
    pub report: ApplyReport,
}

impl IngestOutcome {
    fn new(plan: &GraphPlan, run_id: Option<Uuid>, report: ApplyReport) -> Self {
        Self {
            source: plan.block.artifact.clone(),
            block_id: plan.block.id.clone(),
            spec_id: plan.block.spec_id.clone(),
            run_id,
            dry_run: run_id.is_none(),
            entities: plan.entities.len(),
            fields: plan.fields.len(),
            relationships: plan.relations.len(),
            report,
        }
    }
}

/// Result for one file of a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub path: PathBuf,
    pub result: Result<IngestOutcome>,
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Ingestor {
    options: IngestOptions,
    policy: ReconcilePolicy,
    dry_run: bool,
}

impl Ingestor {
    pub fn new(options: IngestOptions, policy: ReconcilePolicy) -> Self {
        Self {
            options,
            policy,
            dry_run: false,
        }
    }

    /// Compute the report against the current store state but roll back.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Ingest one parsed document. Validation finishes before the store is
    /// touched; a failure inside the transaction leaves the store unchanged.
    pub fn ingest_doc<S: GraphStore>(
        &self,
        store: &mut S,
        doc: &ExtractionDoc,
    ) -> Result<IngestOutcome> {
        self.ingest_with(store, doc, &self.options)
    }

    /// Ingest one file. The file path becomes the artifact unless the
    /// document or the options name one.
    pub fn ingest_file<S: GraphStore>(&self, store: &mut S, path: &Path) -> Result<IngestOutcome> {
        let doc = extraction::load_data(path)?;
        let mut options = self.options.clone();
        if options.source.is_none() {
            options.source = Some(path.display().to_string());
        }
        self.ingest_with(store, &doc, &options)
    }

    /// Ingest files one after another, each in its own transaction. A failed
    /// file is reported and the rest still run.
    pub fn ingest_batch<S: GraphStore>(&self, store: &mut S, paths: &[PathBuf]) -> Vec<BatchEntry> {
        paths
            .iter()
            .map(|path| {
                let result = self.ingest_file(store, path);
                if let Err(e) = &result {
                    warn!(path = %path.display(), error = %e, "ingest failed");
                }
                BatchEntry {
                    path: path.clone(),
                    result,
                }
            })
            .collect()
    }

    fn ingest_with<S: GraphStore>(
        &self,
        store: &mut S,
        doc: &ExtractionDoc,
        options: &IngestOptions,
    ) -> Result<IngestOutcome> {
        let started_at = Utc::now();
        let plan = plan::build(doc, options)?;
        let block_id = plan.block_id().to_string();
        let policy = self.policy;

        info!(
            block = %block_id,
            entities = plan.entities.len(),
            fields = plan.fields.len(),
            relationships = plan.relations.len(),
            policy = %policy,
            dry_run = self.dry_run,
            "ingesting schema block"
        );

        let result = if self.dry_run {
            store
                .preview(|txn| merge::apply(txn, &plan, policy))
                .map(|report| IngestOutcome::new(&plan, None, report))
        } else {
            store
                .transact(|txn| {
                    let report = merge::apply(txn, &plan, policy)?;
                    let run = IngestRun::new(
                        &block_id,
                        &plan.block.artifact,
                        policy,
                        started_at,
                        report.clone(),
                    );
                    txn.put_run(&run)?;
                    Ok((run.id, report))
                })
                .map(|(run_id, report)| IngestOutcome::new(&plan, Some(run_id), report))
        };
        let outcome = result.map_err(|e| match e {
            GraphError::Store(reason) => GraphError::Backend {
                block: block_id.clone(),
                reason,
            },
            other => other,
        })?;

        info!(
            block = %block_id,
            entities = %outcome.report.entities,
            fields = %outcome.report.fields,
            relations = %outcome.report.relations,
            "ingest complete"
        );
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
