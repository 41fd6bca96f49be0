use crate::cmd::open_existing;
use crate::output::{print_json, print_table};
use std::path::Path;
use umlgraph_core::store::GraphRead;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let db = open_existing(root)?;
    let blocks = db.blocks()?;

    if json {
        return print_json(&blocks);
    }

    if blocks.is_empty() {
        println!("No schema blocks.");
        return Ok(());
    }

    let rows = blocks
        .into_iter()
        .map(|b| vec![b.id, b.version, b.extracted_at, b.artifact])
        .collect();
    print_table(&["ID", "VERSION", "EXTRACTED", "ARTIFACT"], rows);
    Ok(())
}
