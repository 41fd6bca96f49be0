use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use umlgraph_core::{extraction, plan};

pub fn run(_root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let doc = extraction::load_data(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    let report = plan::check(&doc);

    if json {
        print_json(&serde_json::json!({
            "file": file,
            "valid": report.is_empty(),
            "entities": doc.entity_count(),
            "relationships": doc.relationship_count(),
            "issues": report.issues,
        }))?;
    } else if report.is_empty() {
        println!(
            "{}: valid ({} entities, {} relationships)",
            file.display(),
            doc.entity_count(),
            doc.relationship_count()
        );
    } else {
        println!("{}: {} issue(s)", file.display(), report.len());
        println!("{report}");
    }

    if !report.is_empty() {
        anyhow::bail!("{} validation issue(s) in {}", report.len(), file.display());
    }
    Ok(())
}
