//! Turns an extraction document into the exact set of graph records one
//! ingest will upsert.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::extraction::ExtractionDoc;
use crate::identity;
use crate::model::{
    Direction, Edge, EdgeKey, EntityKind, EntityNode, FieldNode, Relation, SchemaBlock,
    DEFAULT_CARDINALITY, DEFAULT_FIELD_TYPE,
};
use crate::validate::{self, ValidationReport};

pub const DEFAULT_SOURCE: &str = "unknown";

/// Relationship type families extractors usually emit. Anything else is
/// accepted but logged.
const COMMON_REL_TYPES: &[&str] = &[
    "has",
    "belongs_to",
    "contains",
    "references",
    "relates_to",
    "inherits_from",
    "implements",
    "depends_on",
    "uses",
];

// ---------------------------------------------------------------------------
// IngestOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Overrides the derived spec id.
    pub spec_id: Option<String>,
    /// Overrides the derived diagram id.
    pub diagram_id: Option<String>,
    /// Used as the artifact path when the document has no `meta.source`.
    pub source: Option<String>,
    pub spec_prefixes: Vec<String>,
    pub default_version: String,
    /// Run full validation. Structural checks always run.
    pub validate: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            spec_id: None,
            diagram_id: None,
            source: None,
            spec_prefixes: vec!["tmf".to_string(), "spec".to_string()],
            default_version: "1.0".to_string(),
            validate: true,
        }
    }
}

// ---------------------------------------------------------------------------
// GraphPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPlan {
    pub block: SchemaBlock,
    pub entities: Vec<EntityNode>,
    pub fields: Vec<FieldNode>,
    /// `RELATES_TO` edges only; structural edges follow from the nodes.
    pub relations: Vec<Edge>,
    /// The document had no `extracted_at`; `block.extracted_at` is the
    /// planning time and yields to a value already stored for the block.
    #[serde(skip)]
    pub extracted_at_defaulted: bool,
}

impl GraphPlan {
    pub fn block_id(&self) -> &str {
        &self.block.id
    }

    /// `HAS_FIELD` and `CONTAINS_ENTITY` edges implied by the nodes.
    pub fn structural_edges(&self) -> Vec<Edge> {
        let contains = self
            .entities
            .iter()
            .map(|e| Edge::contains_entity(&self.block.id, &e.fqn));
        let fields = self
            .fields
            .iter()
            .map(|f| Edge::has_field(&f.entity_fqn, &f.fqn));
        contains.chain(fields).collect()
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

pub fn build(doc: &ExtractionDoc, opts: &IngestOptions) -> Result<GraphPlan> {
    let report = validate::validate(doc);
    if opts.validate {
        report.into_result()?;
    } else {
        if !report.is_empty() {
            warn!(issues = report.len(), "validation skipped; mapping leniently");
        }
        report.structural().into_result()?;
    }

    let block = build_block(doc, opts);
    let spec_id = block.spec_id.clone();

    let mut entities = Vec::new();
    let mut fields: Vec<FieldNode> = Vec::new();
    let mut field_index: HashMap<String, usize> = HashMap::new();
    let mut fqns: HashMap<&str, String> = HashMap::new();

    for (name, spec) in doc.entities.iter().flatten() {
        let fqn = identity::entity_fqn(&spec_id, name);
        let kind = identity::entity_kind(name, spec.kind.as_deref()).unwrap_or_else(|kind| {
            warn!(entity = %name, %kind, "unknown entity kind, defaulting to Entity");
            EntityKind::Entity
        });

        for prop in &spec.properties {
            let Some(field_name) = prop.name.as_deref().filter(|n| !n.trim().is_empty()) else {
                warn!(entity = %name, "skipping property without a name");
                continue;
            };
            let field = FieldNode {
                fqn: identity::field_fqn(&fqn, field_name),
                name: field_name.to_string(),
                ty: prop
                    .ty
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FIELD_TYPE.to_string()),
                required: prop.required,
                default: prop.default.clone(),
                description: prop.description.clone(),
                entity_fqn: fqn.clone(),
            };
            match field_index.get(&field.fqn) {
                Some(&i) => fields[i] = field,
                None => {
                    field_index.insert(field.fqn.clone(), fields.len());
                    fields.push(field);
                }
            }
        }

        entities.push(EntityNode {
            fqn: fqn.clone(),
            name: name.clone(),
            label: spec.label.clone().unwrap_or_else(|| name.clone()),
            spec_id: spec_id.clone(),
            kind,
        });
        fqns.insert(name.as_str(), fqn);
    }

    let mut relations: Vec<Edge> = Vec::new();
    let mut relation_index: HashMap<EdgeKey, usize> = HashMap::new();
    let mut push_relation = |edge: Edge| {
        let key = edge.key();
        match relation_index.get(&key) {
            Some(&i) => {
                debug!(edge = %key, "duplicate relationship, keeping the later record");
                relations[i] = edge;
            }
            None => {
                relation_index.insert(key, relations.len());
                relations.push(edge);
            }
        }
    };

    for rel in doc.relationships.iter().flatten() {
        // Structural validation guarantees both endpoints resolve.
        let (Some(from), Some(to)) = (
            rel.from.as_deref().and_then(|n| fqns.get(n)),
            rel.to.as_deref().and_then(|n| fqns.get(n)),
        ) else {
            continue;
        };

        let rel_type = identity::normalize_rel_type(rel.rel_type.as_deref());
        if !COMMON_REL_TYPES
            .iter()
            .any(|prefix| rel_type.starts_with(prefix))
        {
            debug!(%rel_type, "uncommon relationship type");
        }

        let cardinality = rel
            .cardinality
            .clone()
            .unwrap_or_else(|| DEFAULT_CARDINALITY.to_string());
        let from_card = rel
            .from_cardinality
            .clone()
            .unwrap_or_else(|| cardinality.clone());
        let to_card = rel
            .to_cardinality
            .clone()
            .unwrap_or_else(|| cardinality.clone());
        let direction = match rel.direction.as_deref() {
            None => Direction::Out,
            Some(raw) => Direction::parse(raw).unwrap_or_else(|| {
                warn!(direction = %raw, "unknown direction, defaulting to out");
                Direction::Out
            }),
        };

        let relation = |direction: Direction, from_c: &str, to_c: &str| Relation {
            rel_type: rel_type.clone(),
            cardinality: cardinality.clone(),
            from_cardinality: from_c.to_string(),
            to_cardinality: to_c.to_string(),
            direction,
            role: rel.role.clone(),
            name: rel.name.clone(),
            relationship_type: rel.relationship_type.clone(),
            order: rel.order,
            is_containment: rel.is_containment,
            is_inheritance: rel.is_inheritance,
            is_dashed: rel.is_dashed,
            block_id: block.id.clone(),
        };

        match direction {
            Direction::Out => {
                push_relation(Edge::relates_to(
                    from,
                    to,
                    relation(Direction::Out, &from_card, &to_card),
                ));
            }
            Direction::In => {
                push_relation(Edge::relates_to(
                    to,
                    from,
                    relation(Direction::In, &to_card, &from_card),
                ));
            }
            // A self-loop in both directions is one edge.
            Direction::Bidirectional if from == to => {
                push_relation(Edge::relates_to(
                    from,
                    to,
                    relation(Direction::Bidirectional, &from_card, &to_card),
                ));
            }
            Direction::Bidirectional => {
                push_relation(Edge::relates_to(
                    from,
                    to,
                    relation(Direction::Out, &from_card, &to_card),
                ));
                push_relation(Edge::relates_to(
                    to,
                    from,
                    relation(Direction::In, &to_card, &from_card),
                ));
            }
        }
    }

    Ok(GraphPlan {
        block,
        entities,
        fields,
        relations,
        extracted_at_defaulted: doc.meta.extracted_at.is_none(),
    })
}

fn build_block(doc: &ExtractionDoc, opts: &IngestOptions) -> SchemaBlock {
    let meta = &doc.meta;
    let source = meta
        .source
        .clone()
        .or_else(|| opts.source.clone())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let (derived_spec, derived_diagram) =
        identity::derive_spec_id(&source, meta, &opts.spec_prefixes);
    let spec_id = opts.spec_id.clone().unwrap_or(derived_spec);
    let diagram_id = opts.diagram_id.clone().unwrap_or(derived_diagram);

    SchemaBlock {
        id: identity::block_id(&spec_id, &diagram_id),
        title: meta
            .title
            .clone()
            .unwrap_or_else(|| format!("Schema Block: {spec_id}/{diagram_id}")),
        version: meta
            .version
            .clone()
            .unwrap_or_else(|| opts.default_version.clone()),
        artifact: source,
        extracted_at: meta
            .extracted_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        diagram_type: meta.diagram_type.clone(),
        spec_id,
        diagram_id,
    }
}

/// Validate without building, for callers that only want the report.
pub fn check(doc: &ExtractionDoc) -> ValidationReport {
    validate::validate(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::extraction::{parse_str, Format};
    use crate::model::EdgeLabel;

    const SCENARIO: &str = r#"{"entities": {"A": {"properties":[{"name":"id","type":"string","required":true}]}, "B": {"properties":[]}},
        "relationships": [{"from":"A","to":"B","type":"has_b","direction":"out"}]}"#;

    fn demo_opts() -> IngestOptions {
        IngestOptions {
            spec_id: Some("demo".to_string()),
            ..IngestOptions::default()
        }
    }

    fn plan(json: &str, opts: &IngestOptions) -> Result<GraphPlan> {
        build(&parse_str(json, Format::Json).unwrap(), opts)
    }

    #[test]
    fn scenario_plan_matches_contract() {
        let plan = plan(SCENARIO, &demo_opts()).unwrap();
        assert_eq!(plan.block.spec_id, "demo");
        assert_eq!(plan.block.diagram_id, "unknown");
        assert_eq!(plan.block.id, "demo/unknown");

        let fqns: Vec<_> = plan.entities.iter().map(|e| e.fqn.as_str()).collect();
        assert_eq!(fqns, vec!["demo#A", "demo#B"]);

        assert_eq!(plan.fields.len(), 1);
        assert_eq!(plan.fields[0].fqn, "demo#A.id");
        assert!(plan.fields[0].required);
        assert_eq!(plan.fields[0].entity_fqn, "demo#A");

        assert_eq!(plan.relations.len(), 1);
        let edge = &plan.relations[0];
        assert_eq!(edge.label, EdgeLabel::RelatesTo);
        assert_eq!((edge.from.as_str(), edge.to.as_str()), ("demo#A", "demo#B"));
        let rel = edge.relation.as_ref().unwrap();
        assert_eq!(rel.rel_type, "has_b");
        assert_eq!(rel.cardinality, "0..*");
        assert_eq!(rel.from_cardinality, "0..*");
        assert_eq!(rel.to_cardinality, "0..*");
        assert_eq!(rel.block_id, "demo/unknown");

        let structural = plan.structural_edges();
        assert_eq!(
            structural
                .iter()
                .filter(|e| e.label == EdgeLabel::ContainsEntity)
                .count(),
            2
        );
        assert_eq!(
            structural
                .iter()
                .filter(|e| e.label == EdgeLabel::HasField)
                .count(),
            1
        );
    }

    #[test]
    fn block_uses_meta_and_defaults() {
        let plan = plan(
            r#"{"meta": {"source": "tmf620/page_034.png", "extracted_at": "2024-01-02T03:04:05Z", "title": "Offering"},
                "entities": {}, "relationships": []}"#,
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.block.id, "tmf620/page_034");
        assert_eq!(plan.block.artifact, "tmf620/page_034.png");
        assert_eq!(plan.block.extracted_at, "2024-01-02T03:04:05Z");
        assert_eq!(plan.block.title, "Offering");
        assert_eq!(plan.block.version, "1.0");
    }

    #[test]
    fn options_source_used_when_meta_has_none() {
        let opts = IngestOptions {
            source: Some("spec42/orders.yaml".to_string()),
            ..IngestOptions::default()
        };
        let plan = plan(r#"{"entities": {}, "relationships": []}"#, &opts).unwrap();
        assert_eq!(plan.block.id, "spec42/orders");
    }

    #[test]
    fn unknown_endpoint_rejected_even_without_validation() {
        let opts = IngestOptions {
            validate: false,
            ..demo_opts()
        };
        let err = plan(
            r#"{"entities": {"A": {}}, "relationships": [{"from":"A","to":"Nope"}]}"#,
            &opts,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Invalid(_)), "{err}");
    }

    #[test]
    fn colliding_field_fqns_rejected_even_without_validation() {
        let opts = IngestOptions {
            validate: false,
            ..demo_opts()
        };
        let err = plan(
            r#"{"entities": {"A": {"properties":[{"name":"b.c","type":"int"}]},
                             "A.b": {"properties":[{"name":"c"}]}},
                "relationships": []}"#,
            &opts,
        )
        .unwrap_err();
        match err {
            GraphError::Invalid(report) => assert_eq!(report.len(), 2),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_maps_bad_values_to_defaults() {
        let opts = IngestOptions {
            validate: false,
            ..demo_opts()
        };
        let plan = plan(
            r#"{"entities": {"A": {"kind": "Widget", "properties": [{"type": "int"}]}, "B": {}},
                "relationships": [{"from":"A","to":"B","direction":"sideways"}]}"#,
            &opts,
        )
        .unwrap();
        assert_eq!(plan.entities[0].kind, EntityKind::Entity);
        assert!(plan.fields.is_empty());
        let rel = plan.relations[0].relation.as_ref().unwrap();
        assert_eq!(rel.direction, Direction::Out);
        assert_eq!(rel.rel_type, "relates_to");
    }

    #[test]
    fn inbound_relationship_flips_endpoints_and_cardinalities() {
        let plan = plan(
            r#"{"entities": {"A": {}, "B": {}},
                "relationships": [{"from":"A","to":"B","type":"owned_by","direction":"in","fromCardinality":"1","toCardinality":"0..1"}]}"#,
            &demo_opts(),
        )
        .unwrap();
        let edge = &plan.relations[0];
        assert_eq!((edge.from.as_str(), edge.to.as_str()), ("demo#B", "demo#A"));
        let rel = edge.relation.as_ref().unwrap();
        assert_eq!(rel.direction, Direction::In);
        assert_eq!(rel.from_cardinality, "0..1");
        assert_eq!(rel.to_cardinality, "1");
    }

    #[test]
    fn bidirectional_relationship_yields_two_edges() {
        let plan = plan(
            r#"{"entities": {"A": {}, "B": {}},
                "relationships": [{"from":"A","to":"B","type":"peer","direction":"bidirectional"}]}"#,
            &demo_opts(),
        )
        .unwrap();
        assert_eq!(plan.relations.len(), 2);
        let dirs: Vec<_> = plan
            .relations
            .iter()
            .map(|e| e.relation.as_ref().unwrap().direction)
            .collect();
        assert_eq!(dirs, vec![Direction::Out, Direction::In]);
    }

    #[test]
    fn bidirectional_self_loop_is_one_edge() {
        let plan = plan(
            r#"{"entities": {"A": {}},
                "relationships": [{"from":"A","to":"A","type":"parent","direction":"bidirectional"}]}"#,
            &demo_opts(),
        )
        .unwrap();
        assert_eq!(plan.relations.len(), 1);
        assert_eq!(
            plan.relations[0].relation.as_ref().unwrap().direction,
            Direction::Bidirectional
        );
    }

    #[test]
    fn duplicate_relationships_collapse_but_roles_stay_distinct() {
        let plan = plan(
            r#"{"entities": {"A": {}, "B": {}},
                "relationships": [
                    {"from":"A","to":"B","type":"has","role":"owner","order":1},
                    {"from":"A","to":"B","type":"has","role":"owner","order":2},
                    {"from":"A","to":"B","type":"has","role":"viewer"}
                ]}"#,
            &demo_opts(),
        )
        .unwrap();
        assert_eq!(plan.relations.len(), 2);
        assert_eq!(plan.relations[0].relation.as_ref().unwrap().order, Some(2));
    }

    #[test]
    fn ref_types_and_labels() {
        let plan = plan(
            r#"{"entities": {"PartyRef": {"label": "Party Ref"}, "Party": {}}, "relationships": []}"#,
            &demo_opts(),
        )
        .unwrap();
        let party_ref = plan.entities.iter().find(|e| e.name == "PartyRef").unwrap();
        assert_eq!(party_ref.kind, EntityKind::RefType);
        assert_eq!(party_ref.label, "Party Ref");
        let party = plan.entities.iter().find(|e| e.name == "Party").unwrap();
        assert_eq!(party.label, "Party");
    }
}
