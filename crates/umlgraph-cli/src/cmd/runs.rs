use crate::cmd::open_existing;
use crate::output::{print_json, print_table};
use std::path::Path;
use umlgraph_core::store::GraphRead;

pub fn run(root: &Path, last: Option<usize>, json: bool) -> anyhow::Result<()> {
    let db = open_existing(root)?;
    let mut runs = db.runs()?;
    if let Some(n) = last {
        let skip = runs.len().saturating_sub(n);
        runs.drain(..skip);
    }

    if json {
        return print_json(&runs);
    }

    if runs.is_empty() {
        println!("No ingest runs.");
        return Ok(());
    }

    let rows = runs
        .into_iter()
        .map(|run| {
            let r = &run.report;
            let changed = r.blocks.changed()
                + r.entities.changed()
                + r.fields.changed()
                + r.relations.changed()
                + r.structural_edges.changed();
            vec![
                run.id.to_string()[..8].to_string(),
                run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                run.block_id,
                run.policy.to_string(),
                changed.to_string(),
            ]
        })
        .collect();
    print_table(&["RUN", "STARTED", "BLOCK", "POLICY", "CHANGES"], rows);
    Ok(())
}
