//! Persistent graph store using redb.
//!
//! # Table design
//!
//! Nodes and edges live in string-keyed tables with JSON values:
//! ```text
//! schema_blocks  id        -> SchemaBlock
//! entities       fqn       -> EntityNode
//! fields         fqn       -> FieldNode
//! edges          EdgeKey   -> Edge
//! ```
//! Edge keys start with `label|from|`, so "all `HAS_FIELD` edges of an entity"
//! is a prefix range scan.
//!
//! `ingest_runs` uses a 24-byte composite key
//! `[ started_at_ms: u64 big-endian | uuid: 16 bytes ]`, so iteration order is
//! chronological.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeKey, EntityNode, FieldNode, SchemaBlock};

use super::{GraphRead, GraphStore, GraphTxn, IngestRun};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

const BLOCKS: RecordTable = TableDefinition::new("schema_blocks");
const ENTITIES: RecordTable = TableDefinition::new("entities");
const FIELDS: RecordTable = TableDefinition::new("fields");
const EDGES: RecordTable = TableDefinition::new("edges");

/// Key: 24-byte composite (started_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded IngestRun
const RUNS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("ingest_runs");

fn run_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn db_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// Record helpers
// ---------------------------------------------------------------------------

fn get_record<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> Result<Option<T>> {
    let guard = table.get(key).map_err(db_err)?;
    let record = match guard {
        Some(v) => Some(serde_json::from_slice(v.value())?),
        None => None,
    };
    Ok(record)
}

fn scan_records<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for entry in table.range(prefix..).map_err(db_err)? {
        let (k, v) = entry.map_err(db_err)?;
        if !k.value().starts_with(prefix) {
            break;
        }
        out.push(serde_json::from_slice(v.value())?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// GraphDb
// ---------------------------------------------------------------------------

pub struct GraphDb {
    db: Database,
    path: PathBuf,
}

impl GraphDb {
    /// Open or create the database at `path`, creating every table.
    ///
    /// Any failure here means the store cannot be reached and is reported as
    /// [`GraphError::StoreUnavailable`].
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |e: &dyn std::fmt::Display| GraphError::StoreUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
        }
        let db = Database::create(path).map_err(|e| unavailable(&e))?;
        let wt = db.begin_write().map_err(|e| unavailable(&e))?;
        for table in [BLOCKS, ENTITIES, FIELDS, EDGES] {
            wt.open_table(table).map_err(|e| unavailable(&e))?;
        }
        wt.open_table(RUNS).map_err(|e| unavailable(&e))?;
        wt.commit().map_err(|e| unavailable(&e))?;
        debug!(path = %path.display(), "opened graph store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all<T: DeserializeOwned>(&self, table: RecordTable) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(table).map_err(db_err)?;
        scan_records(&table, "")
    }
}

impl GraphRead for GraphDb {
    fn blocks(&self) -> Result<Vec<SchemaBlock>> {
        self.read_all(BLOCKS)
    }

    fn entities(&self) -> Result<Vec<EntityNode>> {
        self.read_all(ENTITIES)
    }

    fn fields(&self) -> Result<Vec<FieldNode>> {
        self.read_all(FIELDS)
    }

    fn edges(&self) -> Result<Vec<Edge>> {
        self.read_all(EDGES)
    }

    fn find_entity(&self, fqn: &str) -> Result<Option<EntityNode>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(ENTITIES).map_err(db_err)?;
        get_record(&table, fqn)
    }

    fn runs(&self) -> Result<Vec<IngestRun>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(RUNS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }
}

impl GraphStore for GraphDb {
    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>,
    {
        let wt = self.db.begin_write().map_err(db_err)?;
        let result = {
            let mut txn = DbTxn { wt: &wt };
            f(&mut txn)
        };
        match result {
            Ok(out) => {
                wt.commit().map_err(db_err)?;
                Ok(out)
            }
            Err(e) => {
                wt.abort().map_err(db_err)?;
                Err(e)
            }
        }
    }

    fn preview<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>,
    {
        let wt = self.db.begin_write().map_err(db_err)?;
        let result = {
            let mut txn = DbTxn { wt: &wt };
            f(&mut txn)
        };
        wt.abort().map_err(db_err)?;
        result
    }
}

// ---------------------------------------------------------------------------
// DbTxn
// ---------------------------------------------------------------------------

struct DbTxn<'a> {
    wt: &'a WriteTransaction,
}

impl DbTxn<'_> {
    fn get<T: DeserializeOwned>(&self, table: RecordTable, key: &str) -> Result<Option<T>> {
        let table = self.wt.open_table(table).map_err(db_err)?;
        get_record(&table, key)
    }

    fn put<T: Serialize>(&self, table: RecordTable, key: &str, record: &T) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        let mut table = self.wt.open_table(table).map_err(db_err)?;
        table
            .insert(key, value.as_slice())
            .map_err(db_err)?;
        Ok(())
    }

    fn remove(&self, table: RecordTable, key: &str) -> Result<bool> {
        let mut table = self.wt.open_table(table).map_err(db_err)?;
        let removed = table.remove(key).map_err(db_err)?.is_some();
        Ok(removed)
    }
}

impl GraphTxn for DbTxn<'_> {
    fn block(&self, id: &str) -> Result<Option<SchemaBlock>> {
        self.get(BLOCKS, id)
    }

    fn put_block(&mut self, block: &SchemaBlock) -> Result<()> {
        self.put(BLOCKS, &block.id, block)
    }

    fn entity(&self, fqn: &str) -> Result<Option<EntityNode>> {
        self.get(ENTITIES, fqn)
    }

    fn put_entity(&mut self, entity: &EntityNode) -> Result<()> {
        self.put(ENTITIES, &entity.fqn, entity)
    }

    fn remove_entity(&mut self, fqn: &str) -> Result<bool> {
        self.remove(ENTITIES, fqn)
    }

    fn field(&self, fqn: &str) -> Result<Option<FieldNode>> {
        self.get(FIELDS, fqn)
    }

    fn put_field(&mut self, field: &FieldNode) -> Result<()> {
        self.put(FIELDS, &field.fqn, field)
    }

    fn remove_field(&mut self, fqn: &str) -> Result<bool> {
        self.remove(FIELDS, fqn)
    }

    fn edge(&self, key: &EdgeKey) -> Result<Option<Edge>> {
        self.get(EDGES, key.as_str())
    }

    fn put_edge(&mut self, edge: &Edge) -> Result<()> {
        self.put(EDGES, edge.key().as_str(), edge)
    }

    fn remove_edge(&mut self, key: &EdgeKey) -> Result<bool> {
        self.remove(EDGES, key.as_str())
    }

    fn scan_edges(&self, prefix: &str) -> Result<Vec<Edge>> {
        let table = self.wt.open_table(EDGES).map_err(db_err)?;
        scan_records(&table, prefix)
    }

    fn put_run(&mut self, run: &IngestRun) -> Result<()> {
        let key = run_key(run.started_at, run.id);
        let value = serde_json::to_vec(run)?;
        let mut table = self.wt.open_table(RUNS).map_err(db_err)?;
        table
            .insert(key.as_slice(), value.as_slice())
            .map_err(db_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
