//! Render a [`GraphPlan`] as idempotent Cypher for loading into Neo4j.
//!
//! Every statement is a `MERGE` on the record's key followed by `SET` of its
//! properties, so a script can be replayed safely. `RELATES_TO` edges merge on
//! `{type, role}` with an absent role written as `''`, matching the embedded
//! store's edge key.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{EntityKind, FieldNode, Relation};
use crate::plan::GraphPlan;

/// Uniqueness constraints and lookup indexes for the fixed schema.
pub fn schema_statements() -> Vec<String> {
    [
        "CREATE CONSTRAINT entity_fqn IF NOT EXISTS FOR (e:Entity) REQUIRE e.fqn IS UNIQUE;",
        "CREATE CONSTRAINT reftype_fqn IF NOT EXISTS FOR (r:RefType) REQUIRE r.fqn IS UNIQUE;",
        "CREATE CONSTRAINT schema_block_id IF NOT EXISTS FOR (s:SchemaBlock) REQUIRE s.id IS UNIQUE;",
        "CREATE CONSTRAINT field_fqn IF NOT EXISTS FOR (f:Field) REQUIRE f.fqn IS UNIQUE;",
        "CREATE INDEX entity_name IF NOT EXISTS FOR (e:Entity) ON (e.name);",
        "CREATE INDEX entity_spec_id IF NOT EXISTS FOR (e:Entity) ON (e.specId);",
        "CREATE INDEX reftype_name IF NOT EXISTS FOR (r:RefType) ON (r.name);",
        "CREATE INDEX field_name IF NOT EXISTS FOR (f:Field) ON (f.name);",
        "CREATE INDEX relationship_type IF NOT EXISTS FOR ()-[r:RELATES_TO]-() ON (r.type);",
        "CREATE INDEX relationship_cardinality IF NOT EXISTS FOR ()-[r:RELATES_TO]-() ON (r.cardinality);",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn plan_statements(plan: &GraphPlan) -> Vec<String> {
    let mut out = Vec::new();
    let block = &plan.block;

    let mut block_set = vec![
        format!("sb.specId = {}", quote(&block.spec_id)),
        format!("sb.diagramId = {}", quote(&block.diagram_id)),
        format!("sb.title = {}", quote(&block.title)),
        format!("sb.version = {}", quote(&block.version)),
        format!("sb.artifact = {}", quote(&block.artifact)),
        extracted_at_set(plan),
    ];
    if let Some(diagram_type) = &block.diagram_type {
        block_set.push(format!("sb.diagramType = {}", quote(diagram_type)));
    }
    out.push(format!(
        "MERGE (sb:SchemaBlock {{id: {}}}) SET {};",
        quote(&block.id),
        block_set.join(", ")
    ));

    let labels: HashMap<&str, EntityKind> = plan
        .entities
        .iter()
        .map(|e| (e.fqn.as_str(), e.kind))
        .collect();
    let node = |var: &str, fqn: &str| -> String {
        let label = labels.get(fqn).copied().unwrap_or(EntityKind::Entity);
        format!("({var}:{label} {{fqn: {}}})", quote(fqn))
    };

    for entity in &plan.entities {
        out.push(format!(
            "MERGE {} SET e.name = {}, e.label = {}, e.specId = {}, e.kind = {};",
            node("e", &entity.fqn),
            quote(&entity.name),
            quote(&entity.label),
            quote(&entity.spec_id),
            quote(entity.kind.as_str()),
        ));
        // one owning block per entity: drop any other block's claim first
        out.push(format!(
            "MATCH (old:SchemaBlock)-[c:CONTAINS_ENTITY]->{} WHERE old.id <> {} DELETE c;",
            node("e", &entity.fqn),
            quote(&block.id),
        ));
        out.push(format!(
            "MATCH (sb:SchemaBlock {{id: {}}}), {} MERGE (sb)-[:CONTAINS_ENTITY]->(e);",
            quote(&block.id),
            node("e", &entity.fqn),
        ));
    }

    for field in &plan.fields {
        out.push(format!(
            "MERGE (f:Field {{fqn: {}}}) SET {};",
            quote(&field.fqn),
            field_sets(field).join(", ")
        ));
        out.push(format!(
            "MATCH {}, (f:Field {{fqn: {}}}) MERGE (e)-[:HAS_FIELD]->(f);",
            node("e", &field.entity_fqn),
            quote(&field.fqn),
        ));
    }

    for edge in &plan.relations {
        let Some(rel) = &edge.relation else {
            continue;
        };
        out.push(format!(
            "MATCH {}, {} MERGE (a)-[r:RELATES_TO {{type: {}, role: {}}}]->(b) SET {};",
            node("a", &edge.from),
            node("b", &edge.to),
            quote(&rel.rel_type),
            quote(rel.role.as_deref().unwrap_or("")),
            relation_sets(rel).join(", "),
        ));
    }

    out
}

/// Full script: optional schema statements followed by the plan.
pub fn render(plan: &GraphPlan, include_schema: bool) -> String {
    let mut lines = Vec::new();
    if include_schema {
        lines.extend(schema_statements());
    }
    lines.extend(plan_statements(plan));
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// An undated document keeps whatever extraction time the block already has.
fn extracted_at_set(plan: &GraphPlan) -> String {
    let value = quote(&plan.block.extracted_at);
    if plan.extracted_at_defaulted {
        format!("sb.extractedAt = coalesce(sb.extractedAt, {value})")
    } else {
        format!("sb.extractedAt = {value}")
    }
}

fn field_sets(field: &FieldNode) -> Vec<String> {
    let mut sets = vec![
        format!("f.name = {}", quote(&field.name)),
        format!("f.type = {}", quote(&field.ty)),
        format!("f.required = {}", field.required),
        format!("f.entityFqn = {}", quote(&field.entity_fqn)),
    ];
    if let Some(default) = &field.default {
        sets.push(format!("f.defaultValue = {}", literal(default)));
    }
    if let Some(description) = &field.description {
        sets.push(format!("f.description = {}", quote(description)));
    }
    sets
}

fn relation_sets(rel: &Relation) -> Vec<String> {
    let mut sets = vec![
        format!("r.cardinality = {}", quote(&rel.cardinality)),
        format!("r.fromCardinality = {}", quote(&rel.from_cardinality)),
        format!("r.toCardinality = {}", quote(&rel.to_cardinality)),
        format!("r.direction = {}", quote(rel.direction.as_str())),
        format!("r.isContainment = {}", rel.is_containment),
        format!("r.isInheritance = {}", rel.is_inheritance),
        format!("r.isDashed = {}", rel.is_dashed),
        format!("r.blockId = {}", quote(&rel.block_id)),
    ];
    if let Some(name) = &rel.name {
        sets.push(format!("r.name = {}", quote(name)));
    }
    if let Some(relationship_type) = &rel.relationship_type {
        sets.push(format!("r.relationshipType = {}", quote(relationship_type)));
    }
    if let Some(order) = rel.order {
        sets.push(format!("r.order = {order}"));
    }
    sets
}

/// Single-quoted Cypher string literal.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Cypher has no map-valued properties; objects and nested lists are stored
/// as their JSON text.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) if items.iter().all(is_scalar) => {
            let items: Vec<_> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        other => quote(&other.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
