//! Graph stores.
//!
//! [`GraphTxn`] is the set of primitives the merge engine writes through;
//! [`GraphStore::transact`] runs a closure against one and commits only when
//! it returns `Ok`. Two implementations: [`MemoryGraph`] for dry runs and
//! tests, [`GraphDb`] backed by redb.

pub mod db;
pub mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::merge::{ApplyReport, ReconcilePolicy};
use crate::model::{
    Edge, EdgeKey, EdgeLabel, EntityKind, EntityNode, FieldNode, SchemaBlock,
};

pub use db::GraphDb;
pub use memory::MemoryGraph;

// ---------------------------------------------------------------------------
// IngestRun
// ---------------------------------------------------------------------------

/// Audit record written in the same transaction as the ingest it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRun {
    pub id: Uuid,
    pub block_id: String,
    pub source: String,
    pub policy: ReconcilePolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report: ApplyReport,
}

impl IngestRun {
    pub fn new(
        block_id: &str,
        source: &str,
        policy: ReconcilePolicy,
        started_at: DateTime<Utc>,
        report: ApplyReport,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_id: block_id.to_string(),
            source: source.to_string(),
            policy,
            started_at,
            finished_at: Utc::now(),
            report,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read/write primitives available inside one store transaction.
pub trait GraphTxn {
    fn block(&self, id: &str) -> Result<Option<SchemaBlock>>;
    fn put_block(&mut self, block: &SchemaBlock) -> Result<()>;

    fn entity(&self, fqn: &str) -> Result<Option<EntityNode>>;
    fn put_entity(&mut self, entity: &EntityNode) -> Result<()>;
    fn remove_entity(&mut self, fqn: &str) -> Result<bool>;

    fn field(&self, fqn: &str) -> Result<Option<FieldNode>>;
    fn put_field(&mut self, field: &FieldNode) -> Result<()>;
    fn remove_field(&mut self, fqn: &str) -> Result<bool>;

    fn edge(&self, key: &EdgeKey) -> Result<Option<Edge>>;
    fn put_edge(&mut self, edge: &Edge) -> Result<()>;
    fn remove_edge(&mut self, key: &EdgeKey) -> Result<bool>;
    /// Edges whose key starts with `prefix`, in key order.
    fn scan_edges(&self, prefix: &str) -> Result<Vec<Edge>>;

    fn put_run(&mut self, run: &IngestRun) -> Result<()>;
}

pub trait GraphStore: GraphRead {
    /// Run `f` in a write transaction. Nothing `f` wrote is visible unless it
    /// returns `Ok`.
    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>;

    /// Run `f` in a write transaction that is always rolled back.
    fn preview<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>;
}

/// Whole-graph reads used by the query commands.
pub trait GraphRead {
    fn blocks(&self) -> Result<Vec<SchemaBlock>>;
    fn entities(&self) -> Result<Vec<EntityNode>>;
    fn fields(&self) -> Result<Vec<FieldNode>>;
    fn edges(&self) -> Result<Vec<Edge>>;
    fn find_entity(&self, fqn: &str) -> Result<Option<EntityNode>>;
    /// Ingest runs, oldest first.
    fn runs(&self) -> Result<Vec<IngestRun>>;

    fn stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats {
            schema_blocks: self.blocks()?.len(),
            ..GraphStats::default()
        };
        for entity in self.entities()? {
            match entity.kind {
                EntityKind::Entity => stats.entities += 1,
                EntityKind::RefType => stats.ref_types += 1,
            }
        }
        stats.fields = self.fields()?.len();
        for label in EdgeLabel::all() {
            stats.edges.insert(label.as_str().to_string(), 0);
        }
        for edge in self.edges()? {
            *stats.edges.entry(edge.label.as_str().to_string()).or_default() += 1;
            if let Some(rel_type) = edge.rel_type() {
                *stats.relation_types.entry(rel_type.to_string()).or_default() += 1;
            }
        }
        Ok(stats)
    }

    /// Entities, optionally restricted to one spec, ordered by FQN.
    fn entities_in_spec(&self, spec_id: Option<&str>) -> Result<Vec<EntityNode>> {
        let mut entities: Vec<_> = self
            .entities()?
            .into_iter()
            .filter(|e| spec_id.map_or(true, |s| e.spec_id == s))
            .collect();
        entities.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        Ok(entities)
    }

    fn entity_view(&self, fqn: &str) -> Result<EntityView> {
        let entity = self
            .find_entity(fqn)?
            .ok_or_else(|| GraphError::EntityNotFound(fqn.to_string()))?;

        let mut view = EntityView {
            entity,
            block: None,
            fields: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };
        for edge in self.edges()? {
            match edge.label {
                EdgeLabel::ContainsEntity if edge.to == fqn => view.block = Some(edge.from),
                EdgeLabel::RelatesTo if edge.from == fqn => view.outgoing.push(edge),
                EdgeLabel::RelatesTo if edge.to == fqn => view.incoming.push(edge),
                _ => {}
            }
        }
        view.fields = self
            .fields()?
            .into_iter()
            .filter(|f| f.entity_fqn == fqn)
            .collect();
        Ok(view)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub schema_blocks: usize,
    pub entities: usize,
    pub ref_types: usize,
    pub fields: usize,
    /// Edge count per label.
    pub edges: BTreeMap<String, usize>,
    /// `RELATES_TO` count per `type` discriminator.
    pub relation_types: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> usize {
        self.schema_blocks + self.entities + self.ref_types + self.fields
    }

    pub fn total_edges(&self) -> usize {
        self.edges.values().sum()
    }

    pub fn edge_count(&self, label: EdgeLabel) -> usize {
        self.edges.get(label.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub entity: EntityNode,
    /// Owning schema block id.
    pub block: Option<String>,
    pub fields: Vec<FieldNode>,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}
