use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{Edge, EdgeKey, EntityNode, FieldNode, SchemaBlock};

use super::{GraphRead, GraphStore, GraphTxn, IngestRun};

/// In-process graph. Transactions run against a copy that replaces the
/// original only on success.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    blocks: BTreeMap<String, SchemaBlock>,
    entities: BTreeMap<String, EntityNode>,
    fields: BTreeMap<String, FieldNode>,
    edges: BTreeMap<EdgeKey, Edge>,
    runs: Vec<IngestRun>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphTxn for MemoryGraph {
    fn block(&self, id: &str) -> Result<Option<SchemaBlock>> {
        Ok(self.blocks.get(id).cloned())
    }

    fn put_block(&mut self, block: &SchemaBlock) -> Result<()> {
        self.blocks.insert(block.id.clone(), block.clone());
        Ok(())
    }

    fn entity(&self, fqn: &str) -> Result<Option<EntityNode>> {
        Ok(self.entities.get(fqn).cloned())
    }

    fn put_entity(&mut self, entity: &EntityNode) -> Result<()> {
        self.entities.insert(entity.fqn.clone(), entity.clone());
        Ok(())
    }

    fn remove_entity(&mut self, fqn: &str) -> Result<bool> {
        Ok(self.entities.remove(fqn).is_some())
    }

    fn field(&self, fqn: &str) -> Result<Option<FieldNode>> {
        Ok(self.fields.get(fqn).cloned())
    }

    fn put_field(&mut self, field: &FieldNode) -> Result<()> {
        self.fields.insert(field.fqn.clone(), field.clone());
        Ok(())
    }

    fn remove_field(&mut self, fqn: &str) -> Result<bool> {
        Ok(self.fields.remove(fqn).is_some())
    }

    fn edge(&self, key: &EdgeKey) -> Result<Option<Edge>> {
        Ok(self.edges.get(key).cloned())
    }

    fn put_edge(&mut self, edge: &Edge) -> Result<()> {
        self.edges.insert(edge.key(), edge.clone());
        Ok(())
    }

    fn remove_edge(&mut self, key: &EdgeKey) -> Result<bool> {
        Ok(self.edges.remove(key).is_some())
    }

    fn scan_edges(&self, prefix: &str) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .range(EdgeKey::from_raw(prefix)..)
            .take_while(|(k, _)| k.as_str().starts_with(prefix))
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn put_run(&mut self, run: &IngestRun) -> Result<()> {
        self.runs.push(run.clone());
        Ok(())
    }
}

impl GraphRead for MemoryGraph {
    fn blocks(&self) -> Result<Vec<SchemaBlock>> {
        Ok(self.blocks.values().cloned().collect())
    }

    fn entities(&self) -> Result<Vec<EntityNode>> {
        Ok(self.entities.values().cloned().collect())
    }

    fn fields(&self) -> Result<Vec<FieldNode>> {
        Ok(self.fields.values().cloned().collect())
    }

    fn edges(&self) -> Result<Vec<Edge>> {
        Ok(self.edges.values().cloned().collect())
    }

    fn find_entity(&self, fqn: &str) -> Result<Option<EntityNode>> {
        Ok(self.entities.get(fqn).cloned())
    }

    fn runs(&self) -> Result<Vec<IngestRun>> {
        Ok(self.runs.clone())
    }
}

impl GraphStore for MemoryGraph {
    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>,
    {
        let mut work = self.clone();
        let out = f(&mut work)?;
        *self = work;
        Ok(out)
    }

    fn preview<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GraphTxn) -> Result<R>,
    {
        let mut scratch = self.clone();
        f(&mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::model::{EdgeLabel, EntityKind};

    fn entity(fqn: &str) -> EntityNode {
        EntityNode {
            fqn: fqn.to_string(),
            name: fqn.rsplit('#').next().unwrap().to_string(),
            label: fqn.to_string(),
            spec_id: "demo".to_string(),
            kind: EntityKind::Entity,
        }
    }

    #[test]
    fn failed_transaction_leaves_graph_untouched() {
        let mut graph = MemoryGraph::new();
        let result: Result<()> = graph.transact(|txn| {
            txn.put_entity(&entity("demo#A"))?;
            Err(GraphError::Store("disk on fire".into()))
        });
        assert!(result.is_err());
        assert!(graph.entities().unwrap().is_empty());
    }

    #[test]
    fn committed_transaction_is_visible() {
        let mut graph = MemoryGraph::new();
        graph
            .transact(|txn| txn.put_entity(&entity("demo#A")))
            .unwrap();
        assert_eq!(graph.entities().unwrap().len(), 1);
    }

    #[test]
    fn preview_discards_writes() {
        let mut graph = MemoryGraph::new();
        let written = graph
            .preview(|txn| {
                txn.put_entity(&entity("demo#A"))?;
                Ok(txn.entity("demo#A")?.is_some())
            })
            .unwrap();
        assert!(written);
        assert!(graph.entities().unwrap().is_empty());
    }

    #[test]
    fn scan_edges_respects_prefix_boundaries() {
        let mut graph = MemoryGraph::new();
        graph.put_edge(&Edge::has_field("demo#A", "demo#A.id")).unwrap();
        graph.put_edge(&Edge::has_field("demo#A", "demo#A.name")).unwrap();
        graph.put_edge(&Edge::has_field("demo#AB", "demo#AB.id")).unwrap();
        graph
            .put_edge(&Edge::contains_entity("demo/d", "demo#A"))
            .unwrap();

        let prefix = EdgeKey::source_prefix(EdgeLabel::HasField, "demo#A");
        assert_eq!(graph.scan_edges(&prefix).unwrap().len(), 2);
        let all_fields = EdgeKey::label_prefix(EdgeLabel::HasField);
        assert_eq!(graph.scan_edges(&all_fields).unwrap().len(), 3);
        assert_eq!(graph.scan_edges("").unwrap().len(), 4);
    }
}
