use crate::output::print_json;
use anyhow::Context;
use std::path::{Path, PathBuf};
use umlgraph_core::{
    config::Config,
    ingest::{BatchEntry, IngestOutcome, Ingestor},
    merge::{ApplyReport, ReconcilePolicy},
    store::GraphDb,
};

pub struct Flags {
    pub spec_id: Option<String>,
    pub diagram_id: Option<String>,
    pub replace: bool,
    pub no_validate: bool,
    pub dry_run: bool,
}

pub fn run(root: &Path, files: &[PathBuf], flags: Flags, json: bool) -> anyhow::Result<()> {
    if flags.diagram_id.is_some() && files.len() > 1 {
        anyhow::bail!("--diagram-id applies to a single file; got {}", files.len());
    }

    let config = Config::load_or_default(root).context("failed to load config")?;
    let mut options = config.ingest_options();
    options.spec_id = flags.spec_id;
    options.diagram_id = flags.diagram_id;
    options.validate = options.validate && !flags.no_validate;
    let policy = if flags.replace {
        ReconcilePolicy::Replace
    } else {
        config.ingest.policy
    };

    let store_path = config.store_path(root);
    let mut db = GraphDb::open(&store_path)
        .with_context(|| format!("failed to open graph store at {}", store_path.display()))?;

    let entries = Ingestor::new(options, policy)
        .dry_run(flags.dry_run)
        .ingest_batch(&mut db, files);
    let failed = entries.iter().filter(|e| e.result.is_err()).count();

    if json {
        let items: Vec<_> = entries.iter().map(entry_json).collect();
        print_json(&serde_json::json!({
            "policy": policy,
            "dry_run": flags.dry_run,
            "results": items,
        }))?;
    } else {
        for entry in &entries {
            match &entry.result {
                Ok(outcome) => print_outcome(&entry.path, outcome),
                Err(e) => {
                    let verb = if e.is_input_error() { "rejected" } else { "failed" };
                    println!("{verb} {}\n  {e}", entry.path.display());
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) failed to ingest", entries.len());
    }
    Ok(())
}

fn entry_json(entry: &BatchEntry) -> serde_json::Value {
    match &entry.result {
        Ok(outcome) => serde_json::json!({
            "path": entry.path,
            "ok": true,
            "outcome": outcome,
        }),
        Err(e) => serde_json::json!({
            "path": entry.path,
            "ok": false,
            "error": e.to_string(),
        }),
    }
}

fn print_outcome(path: &Path, outcome: &IngestOutcome) {
    let verb = if outcome.dry_run { "would ingest" } else { "ingested" };
    println!(
        "{verb} {} -> {} ({} entities, {} fields, {} relationships)",
        path.display(),
        outcome.block_id,
        outcome.entities,
        outcome.fields,
        outcome.relationships
    );
    print_report(&outcome.report);
}

fn print_report(report: &ApplyReport) {
    if report.is_noop() {
        println!("  no changes");
        return;
    }
    println!("  entities:      {}", report.entities);
    println!("  fields:        {}", report.fields);
    println!("  relationships: {}", report.relations);
    println!("  structural:    {}", report.structural_edges);
    if report.ownership_moves > 0 {
        println!("  moved from another block: {}", report.ownership_moves);
    }
}
