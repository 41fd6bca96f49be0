//! Applies a [`GraphPlan`] to a store transaction.
//!
//! Every record is upserted by key: nodes by id/FQN, edges by [`EdgeKey`].
//! A record already present with identical properties is left alone, so a
//! second application of the same plan writes nothing but the ingest run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeKey, EdgeLabel};
use crate::plan::GraphPlan;
use crate::store::GraphTxn;

// ---------------------------------------------------------------------------
// ReconcilePolicy
// ---------------------------------------------------------------------------

/// What to do with records a block produced earlier that a re-ingest no
/// longer contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Add and update only; stale records stay.
    #[default]
    Merge,
    /// Remove the block's stale entities, fields and relationships.
    Replace,
}

impl ReconcilePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcilePolicy::Merge => "merge",
            ReconcilePolicy::Replace => "replace",
        }
    }
}

impl fmt::Display for ReconcilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcilePolicy {
    type Err = GraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "merge" => Ok(ReconcilePolicy::Merge),
            "replace" => Ok(ReconcilePolicy::Replace),
            _ => Err(GraphError::InvalidPolicy(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl Outcome {
    fn of<V: PartialEq>(existing: Option<&V>, new: &V) -> Self {
        match existing {
            None => Outcome::Created,
            Some(old) if old == new => Outcome::Unchanged,
            Some(_) => Outcome::Updated,
        }
    }

    fn writes(self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl Tally {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn changed(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} removed",
            self.created, self.updated, self.unchanged, self.removed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub blocks: Tally,
    pub entities: Tally,
    pub fields: Tally,
    /// `RELATES_TO` edges.
    pub relations: Tally,
    /// `CONTAINS_ENTITY` and `HAS_FIELD` edges.
    pub structural_edges: Tally,
    /// Entities whose `CONTAINS_ENTITY` edge moved here from another block.
    pub ownership_moves: usize,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        [
            self.blocks,
            self.entities,
            self.fields,
            self.relations,
            self.structural_edges,
        ]
        .iter()
        .all(|t| t.changed() == 0)
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Upsert `plan` through `txn`. Store failures come back as
/// [`GraphError::Backend`] naming the block being ingested.
pub fn apply<T: GraphTxn + ?Sized>(
    txn: &mut T,
    plan: &GraphPlan,
    policy: ReconcilePolicy,
) -> Result<ApplyReport> {
    apply_inner(txn, plan, policy).map_err(|e| match e {
        GraphError::Store(reason) => GraphError::Backend {
            block: plan.block.id.clone(),
            reason,
        },
        other => other,
    })
}

fn apply_inner<T: GraphTxn + ?Sized>(
    txn: &mut T,
    plan: &GraphPlan,
    policy: ReconcilePolicy,
) -> Result<ApplyReport> {
    let block_id = plan.block_id();
    let mut report = ApplyReport::default();

    let existing = txn.block(block_id)?;
    let mut block = plan.block.clone();
    if let Some(stored) = existing.as_ref().filter(|_| plan.extracted_at_defaulted) {
        block.extracted_at = stored.extracted_at.clone();
    }
    let outcome = Outcome::of(existing.as_ref(), &block);
    if outcome.writes() {
        txn.put_block(&block)?;
    }
    report.blocks.record(outcome);

    // entity fqn -> owning block id, as of before this ingest
    let owners: HashMap<String, String> = txn
        .scan_edges(&EdgeKey::label_prefix(EdgeLabel::ContainsEntity))?
        .into_iter()
        .map(|e| (e.to, e.from))
        .collect();

    for entity in &plan.entities {
        let outcome = Outcome::of(txn.entity(&entity.fqn)?.as_ref(), entity);
        if outcome.writes() {
            txn.put_entity(entity)?;
        }
        debug!(entity = %entity.fqn, ?outcome, "entity");
        report.entities.record(outcome);

        if let Some(previous) = owners.get(&entity.fqn).filter(|b| b.as_str() != block_id) {
            warn!(
                entity = %entity.fqn,
                from = %previous,
                to = %block_id,
                "entity re-declared by another diagram; moving ownership"
            );
            txn.remove_edge(&Edge::contains_entity(previous, &entity.fqn).key())?;
            report.structural_edges.removed += 1;
            report.ownership_moves += 1;
        }
        upsert_edge(
            txn,
            &Edge::contains_entity(block_id, &entity.fqn),
            &mut report.structural_edges,
        )?;
    }

    for field in &plan.fields {
        let outcome = Outcome::of(txn.field(&field.fqn)?.as_ref(), field);
        if outcome.writes() {
            txn.put_field(field)?;
        }
        report.fields.record(outcome);
        upsert_edge(
            txn,
            &Edge::has_field(&field.entity_fqn, &field.fqn),
            &mut report.structural_edges,
        )?;
    }

    for edge in &plan.relations {
        upsert_edge(txn, edge, &mut report.relations)?;
    }

    if policy == ReconcilePolicy::Replace {
        prune(txn, plan, &owners, &mut report)?;
    }

    Ok(report)
}

fn upsert_edge<T: GraphTxn + ?Sized>(txn: &mut T, edge: &Edge, tally: &mut Tally) -> Result<()> {
    let outcome = Outcome::of(txn.edge(&edge.key())?.as_ref(), edge);
    if outcome.writes() {
        txn.put_edge(edge)?;
    }
    tally.record(outcome);
    Ok(())
}

/// Remove what this block produced before but the plan no longer has.
fn prune<T: GraphTxn + ?Sized>(
    txn: &mut T,
    plan: &GraphPlan,
    owners: &HashMap<String, String>,
    report: &mut ApplyReport,
) -> Result<()> {
    let block_id = plan.block_id();
    let planned_entities: HashSet<&str> = plan.entities.iter().map(|e| e.fqn.as_str()).collect();
    let planned_fields: HashSet<&str> = plan.fields.iter().map(|f| f.fqn.as_str()).collect();
    let planned_relations: HashSet<EdgeKey> = plan.relations.iter().map(Edge::key).collect();

    let mut stale: Vec<&str> = owners
        .iter()
        .filter(|(fqn, owner)| owner.as_str() == block_id && !planned_entities.contains(fqn.as_str()))
        .map(|(fqn, _)| fqn.as_str())
        .collect();
    stale.sort_unstable();

    for fqn in stale {
        debug!(entity = %fqn, "removing stale entity");
        remove_fields_of(txn, fqn, |_| true, report)?;
        for edge in txn.scan_edges(&EdgeKey::label_prefix(EdgeLabel::RelatesTo))? {
            if edge.from == fqn || edge.to == fqn {
                txn.remove_edge(&edge.key())?;
                report.relations.removed += 1;
            }
        }
        if txn.remove_edge(&Edge::contains_entity(block_id, fqn).key())? {
            report.structural_edges.removed += 1;
        }
        if txn.remove_entity(fqn)? {
            report.entities.removed += 1;
        }
    }

    for entity in &plan.entities {
        remove_fields_of(
            txn,
            &entity.fqn,
            |field_fqn| !planned_fields.contains(field_fqn),
            report,
        )?;
    }

    for edge in txn.scan_edges(&EdgeKey::label_prefix(EdgeLabel::RelatesTo))? {
        let ours = edge
            .relation
            .as_ref()
            .is_some_and(|r| r.block_id == block_id);
        let key = edge.key();
        if ours && !planned_relations.contains(&key) {
            debug!(edge = %key, "removing stale relationship");
            txn.remove_edge(&key)?;
            report.relations.removed += 1;
        }
    }

    Ok(())
}

fn remove_fields_of<T, P>(
    txn: &mut T,
    entity_fqn: &str,
    should_remove: P,
    report: &mut ApplyReport,
) -> Result<()>
where
    T: GraphTxn + ?Sized,
    P: Fn(&str) -> bool,
{
    for edge in txn.scan_edges(&EdgeKey::source_prefix(EdgeLabel::HasField, entity_fqn))? {
        if !should_remove(&edge.to) {
            continue;
        }
        txn.remove_edge(&edge.key())?;
        report.structural_edges.removed += 1;
        if txn.remove_field(&edge.to)? {
            report.fields.removed += 1;
        }
    }
    Ok(())
}
