//! Property-graph records written by the loader.
//!
//! Three node kinds (`SchemaBlock`, `Entity`, `Field`) and three edge labels.
//! Semantic relationships between entities all share the `RELATES_TO` label
//! and are told apart by `Relation::rel_type`, so new relationship kinds never
//! add new edge labels.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CARDINALITY: &str = "0..*";
pub const DEFAULT_REL_TYPE: &str = "relates_to";
pub const DEFAULT_FIELD_TYPE: &str = "string";

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Entity,
    RefType,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Entity => "Entity",
            EntityKind::RefType => "RefType",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Entity" => Some(EntityKind::Entity),
            "RefType" => Some(EntityKind::RefType),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Out,
    In,
    Bidirectional,
}

impl Direction {
    pub fn all() -> &'static [Direction] {
        &[Direction::Out, Direction::In, Direction::Bidirectional]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
            Direction::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Direction::all().iter().copied().find(|d| d.as_str() == s)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cardinality
// ---------------------------------------------------------------------------

const KNOWN_CARDINALITIES: &[&str] = &[
    "0..1", "0..*", "1", "1..*", "1..1", "*", "0..0", "1..0", "0..n", "1..n", "n", "m..n",
];

static RANGE_RE: OnceLock<Regex> = OnceLock::new();

fn range_re() -> &'static Regex {
    RANGE_RE.get_or_init(|| Regex::new(r"^\d+\.\.(\d+|\*)$").unwrap())
}

/// Accepts UML multiplicities: the common literals plus `<n>..<m>` and `<n>..*`.
pub fn is_valid_cardinality(s: &str) -> bool {
    KNOWN_CARDINALITIES.contains(&s) || range_re().is_match(s)
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBlock {
    pub id: String,
    pub spec_id: String,
    pub diagram_id: String,
    pub title: String,
    pub version: String,
    /// Source path of the diagram the block was extracted from.
    pub artifact: String,
    pub extracted_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNode {
    pub fqn: String,
    pub name: String,
    pub label: String,
    pub spec_id: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNode {
    pub fqn: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entity_fqn: String,
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeLabel {
    ContainsEntity,
    HasField,
    RelatesTo,
}

impl EdgeLabel {
    pub fn all() -> &'static [EdgeLabel] {
        &[
            EdgeLabel::ContainsEntity,
            EdgeLabel::HasField,
            EdgeLabel::RelatesTo,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeLabel::ContainsEntity => "CONTAINS_ENTITY",
            EdgeLabel::HasField => "HAS_FIELD",
            EdgeLabel::RelatesTo => "RELATES_TO",
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties carried by a `RELATES_TO` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub cardinality: String,
    pub from_cardinality: String,
    pub to_cardinality: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_containment: bool,
    #[serde(default)]
    pub is_inheritance: bool,
    #[serde(default)]
    pub is_dashed: bool,
    /// Schema block whose ingest produced this edge.
    pub block_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub label: EdgeLabel,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
}

impl Edge {
    pub fn contains_entity(block_id: &str, entity_fqn: &str) -> Self {
        Self {
            label: EdgeLabel::ContainsEntity,
            from: block_id.to_string(),
            to: entity_fqn.to_string(),
            relation: None,
        }
    }

    pub fn has_field(entity_fqn: &str, field_fqn: &str) -> Self {
        Self {
            label: EdgeLabel::HasField,
            from: entity_fqn.to_string(),
            to: field_fqn.to_string(),
            relation: None,
        }
    }

    pub fn relates_to(from: &str, to: &str, relation: Relation) -> Self {
        Self {
            label: EdgeLabel::RelatesTo,
            from: from.to_string(),
            to: to.to_string(),
            relation: Some(relation),
        }
    }

    pub fn key(&self) -> EdgeKey {
        match &self.relation {
            Some(rel) => EdgeKey::new(
                self.label,
                &self.from,
                &self.to,
                Some((&rel.rel_type, rel.role.as_deref().unwrap_or(""))),
            ),
            None => EdgeKey::new(self.label, &self.from, &self.to, None),
        }
    }

    pub fn rel_type(&self) -> Option<&str> {
        self.relation.as_ref().map(|r| r.rel_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// EdgeKey
// ---------------------------------------------------------------------------

/// Separator between key components. Validation keeps it out of names and
/// roles, so FQNs never contain it.
pub const KEY_SEP: char = '\u{1f}';

/// Idempotence key of an edge: `label|from|to` for structural edges and
/// `label|from|to|type|role` for `RELATES_TO`.
///
/// The label and source come first so that byte-ordered stores can answer
/// "all edges with label L leaving X" with a prefix scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(String);

impl EdgeKey {
    pub fn new(label: EdgeLabel, from: &str, to: &str, discriminator: Option<(&str, &str)>) -> Self {
        let mut key = format!("{}{KEY_SEP}{from}{KEY_SEP}{to}", label.as_str());
        if let Some((rel_type, role)) = discriminator {
            key.push(KEY_SEP);
            key.push_str(rel_type);
            key.push(KEY_SEP);
            key.push_str(role);
        }
        EdgeKey(key)
    }

    /// Prefix shared by every key with this label.
    pub fn label_prefix(label: EdgeLabel) -> String {
        format!("{}{KEY_SEP}", label.as_str())
    }

    /// Prefix shared by every key with this label leaving `from`.
    pub fn source_prefix(label: EdgeLabel, from: &str) -> String {
        format!("{}{KEY_SEP}{from}{KEY_SEP}", label.as_str())
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        EdgeKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.split(KEY_SEP).collect();
        f.write_str(&parts.join("|"))
    }
}
