use crate::cmd::open_existing;
use crate::output::{print_json, print_table};
use std::path::Path;
use umlgraph_core::store::GraphRead;

pub fn run(root: &Path, spec: Option<&str>, json: bool) -> anyhow::Result<()> {
    let db = open_existing(root)?;
    let entities = db.entities_in_spec(spec)?;

    if json {
        return print_json(&entities);
    }

    if entities.is_empty() {
        match spec {
            Some(spec) => println!("No entities in spec '{spec}'."),
            None => println!("No entities."),
        }
        return Ok(());
    }

    let rows = entities
        .into_iter()
        .map(|e| vec![e.fqn, e.kind.to_string(), e.spec_id])
        .collect();
    print_table(&["FQN", "KIND", "SPEC"], rows);
    Ok(())
}
