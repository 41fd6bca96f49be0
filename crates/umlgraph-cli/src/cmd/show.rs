use crate::cmd::open_existing;
use crate::output::{or_dash, print_json, print_table};
use std::path::Path;
use umlgraph_core::{model::Edge, store::GraphRead};

pub fn run(root: &Path, fqn: &str, json: bool) -> anyhow::Result<()> {
    let db = open_existing(root)?;
    let view = db.entity_view(fqn)?;

    if json {
        return print_json(&view);
    }

    let entity = &view.entity;
    println!("{} ({})", entity.fqn, entity.kind);
    println!("  name:  {}", entity.name);
    println!("  spec:  {}", entity.spec_id);
    println!("  block: {}", or_dash(view.block.as_deref()));

    println!("\nFields ({}):", view.fields.len());
    if !view.fields.is_empty() {
        let rows = view
            .fields
            .iter()
            .map(|f| {
                vec![
                    f.name.clone(),
                    f.ty.clone(),
                    if f.required { "yes" } else { "no" }.to_string(),
                    f.default
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        print_table(&["NAME", "TYPE", "REQUIRED", "DEFAULT"], rows);
    }

    print_relations("Outgoing", &view.outgoing, |e| &e.to);
    print_relations("Incoming", &view.incoming, |e| &e.from);
    Ok(())
}

fn print_relations(title: &str, edges: &[Edge], other_end: impl Fn(&Edge) -> &String) {
    println!("\n{title} ({}):", edges.len());
    if edges.is_empty() {
        return;
    }
    let rows = edges
        .iter()
        .filter_map(|edge| {
            let rel = edge.relation.as_ref()?;
            Some(vec![
                rel.rel_type.clone(),
                other_end(edge).clone(),
                rel.cardinality.clone(),
                rel.direction.to_string(),
                or_dash(rel.role.as_deref()),
            ])
        })
        .collect();
    print_table(&["TYPE", "ENTITY", "CARDINALITY", "DIRECTION", "ROLE"], rows);
}
