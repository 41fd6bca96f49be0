use crate::error::Result;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `data` to a synced tempfile next to `path`, creating parents.
fn staged(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Replace `path` with `data` in a single rename, so readers see either the
/// old or the new content. Used for `config.yaml` and rendered Cypher scripts.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    staged(path, data)?.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `path` with `data` unless something already exists there.
///
/// Returns `false` when the file was present, including when a concurrent
/// `init` created it between our check and the rename. Existing content is
/// never touched.
pub fn create_new(path: &Path, data: &[u8]) -> Result<bool> {
    match staged(path, data)?.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/scripts/d1.cypher");
        atomic_write(&path, b"MERGE (n);").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "MERGE (n);");
    }

    #[test]
    fn atomic_write_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        atomic_write(&path, b"version: 1\n").unwrap();
        atomic_write(&path, b"version: 2\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 2\n");
        assert_eq!(entries(dir.path()), 1);
    }

    #[test]
    fn create_new_keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, b"ingest:\n  policy: replace\n").unwrap();

        assert!(!create_new(&path, b"version: 1\n").unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ingest:\n  policy: replace\n"
        );
        assert_eq!(entries(dir.path()), 1);
    }

    #[test]
    fn create_new_writes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".umlgraph/config.yaml");
        assert!(create_new(&path, b"version: 1\n").unwrap());
        assert!(!create_new(&path, b"version: 9\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 1\n");
    }
}
