pub mod blocks;
pub mod config;
pub mod cypher;
pub mod entities;
pub mod ingest;
pub mod init;
pub mod runs;
pub mod show;
pub mod stats;
pub mod validate;

use anyhow::Context;
use std::path::Path;
use umlgraph_core::{config::Config, store::GraphDb, GraphError};

/// Open the configured store for reading. A store that was never created is
/// reported as not initialized instead of being created empty.
pub(crate) fn open_existing(root: &Path) -> anyhow::Result<GraphDb> {
    let config = Config::load_or_default(root).context("failed to load config")?;
    let path = config.store_path(root);
    if !path.exists() {
        return Err(GraphError::NotInitialized.into());
    }
    GraphDb::open(&path).with_context(|| format!("failed to open {}", path.display()))
}
