use crate::cmd::open_existing;
use crate::output::{print_json, print_table};
use std::path::Path;
use umlgraph_core::store::GraphRead;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let db = open_existing(root)?;
    let stats = db.stats()?;

    if json {
        return print_json(&stats);
    }

    println!("Nodes: {}", stats.total_nodes());
    println!("  SchemaBlock  {}", stats.schema_blocks);
    println!("  Entity       {}", stats.entities);
    println!("  RefType      {}", stats.ref_types);
    println!("  Field        {}", stats.fields);
    println!("Edges: {}", stats.total_edges());
    for (label, count) in &stats.edges {
        println!("  {label:<16} {count}");
    }

    if !stats.relation_types.is_empty() {
        println!();
        let mut rows: Vec<(String, usize)> = stats.relation_types.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        print_table(
            &["RELATIONSHIP TYPE", "COUNT"],
            rows.into_iter()
                .map(|(ty, n)| vec![ty, n.to_string()])
                .collect(),
        );
    }
    Ok(())
}
