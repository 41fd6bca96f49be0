use anyhow::Context;
use std::path::Path;
use umlgraph_core::{config::Config, cypher, extraction, io, plan};

pub fn run(
    root: &Path,
    file: &Path,
    spec_id: Option<String>,
    diagram_id: Option<String>,
    no_schema: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let doc = extraction::load_data(file)
        .with_context(|| format!("failed to load {}", file.display()))?;

    let mut options = config.ingest_options();
    options.spec_id = spec_id;
    options.diagram_id = diagram_id;
    options.source = Some(file.display().to_string());

    let plan = plan::build(&doc, &options)
        .with_context(|| format!("cannot map {}", file.display()))?;
    let script = cypher::render(&plan, !no_schema);
    match output {
        Some(path) => {
            io::atomic_write(path, script.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{script}"),
    }
    Ok(())
}
