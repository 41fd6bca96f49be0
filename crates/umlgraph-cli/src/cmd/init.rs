use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use umlgraph_core::{config::Config, io, paths, store::GraphDb};

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let dir = paths::umlgraph_dir(root);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let config_created = io::create_new(&config_path, Config::default().to_yaml()?.as_bytes())
        .context("failed to write config.yaml")?;
    let config = Config::load(root).context("failed to load config.yaml")?;

    let store_path = config.store_path(root);
    let store_created = !store_path.exists();
    let db = GraphDb::open(&store_path)
        .with_context(|| format!("failed to create graph store at {}", store_path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "root": root,
            "config": config_path,
            "config_created": config_created,
            "store": db.path(),
            "store_created": store_created,
        }));
    }

    println!("Initializing umlgraph in: {}", root.display());
    let status = |created: bool| if created { "created:" } else { "exists: " };
    println!("  {} {}", status(config_created), paths::CONFIG_FILE);
    println!("  {} {}", status(store_created), config.store.path.display());
    Ok(())
}
