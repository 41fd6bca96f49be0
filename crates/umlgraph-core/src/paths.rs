use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const UMLGRAPH_DIR: &str = ".umlgraph";
pub const CONFIG_FILE: &str = ".umlgraph/config.yaml";
pub const DEFAULT_STORE_FILE: &str = ".umlgraph/graph.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn umlgraph_dir(root: &Path) -> PathBuf {
    root.join(UMLGRAPH_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured path: absolute paths are kept, relative ones are
/// taken from the project root.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
