//! Validation of extraction documents.
//!
//! All issues are collected in one pass so callers can report everything at
//! once. Nothing is written to a store while a report is non-empty.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::{GraphError, Result};
use crate::extraction::ExtractionDoc;
use crate::identity;
use crate::model::{is_valid_cardinality, Direction, KEY_SEP};

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    From,
    To,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::From => f.write_str("from"),
            Endpoint::To => f.write_str("to"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum Issue {
    MissingKey {
        key: String,
    },
    EmptyEntityName,
    ReservedInEntityName {
        entity: String,
        ch: char,
    },
    ReservedInPropertyName {
        entity: String,
        name: String,
        ch: char,
    },
    ReservedInRole {
        index: usize,
        role: String,
    },
    InvalidKind {
        entity: String,
        kind: String,
    },
    PropertyMissingName {
        entity: String,
        index: usize,
    },
    DuplicateProperty {
        entity: String,
        name: String,
    },
    MissingEndpoint {
        index: usize,
        end: Endpoint,
    },
    UnknownEntity {
        index: usize,
        end: Endpoint,
        name: String,
    },
    InvalidCardinality {
        index: usize,
        field: String,
        value: String,
    },
    InvalidDirection {
        index: usize,
        value: String,
    },
}

impl Issue {
    /// Issues that make a document impossible to map onto the graph, checked
    /// even when full validation is turned off.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Issue::MissingKey { .. }
                | Issue::EmptyEntityName
                | Issue::ReservedInEntityName { .. }
                | Issue::ReservedInPropertyName { .. }
                | Issue::ReservedInRole { .. }
                | Issue::MissingEndpoint { .. }
                | Issue::UnknownEntity { .. }
        )
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingKey { key } => write!(f, "missing '{key}' key"),
            Issue::EmptyEntityName => f.write_str("entity with an empty name"),
            Issue::ReservedInEntityName { entity, ch } => write!(
                f,
                "entity '{entity}' contains reserved character {ch:?} ('#' and '.' delimit FQNs)"
            ),
            Issue::ReservedInPropertyName { entity, name, ch } => write!(
                f,
                "entity '{entity}' property '{name}' contains reserved character {ch:?}"
            ),
            Issue::ReservedInRole { index, role } => write!(
                f,
                "relationship[{index}] role {role:?} contains the edge key separator"
            ),
            Issue::InvalidKind { entity, kind } => write!(
                f,
                "entity '{entity}' has invalid kind '{kind}' (must be Entity or RefType)"
            ),
            Issue::PropertyMissingName { entity, index } => {
                write!(f, "entity '{entity}' property[{index}] missing 'name'")
            }
            Issue::DuplicateProperty { entity, name } => {
                write!(f, "entity '{entity}' declares property '{name}' more than once")
            }
            Issue::MissingEndpoint { index, end } => {
                write!(f, "relationship[{index}] missing '{end}'")
            }
            Issue::UnknownEntity { index, end, name } => write!(
                f,
                "relationship[{index}] '{end}' entity '{name}' not found in entities"
            ),
            Issue::InvalidCardinality {
                index,
                field,
                value,
            } => write!(
                f,
                "relationship[{index}].{field} has invalid cardinality format '{value}'"
            ),
            Issue::InvalidDirection { index, value } => write!(
                f,
                "relationship[{index}] has invalid direction '{value}' (must be out, in or bidirectional)"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Keep only the issues that block graph mapping.
    pub fn structural(self) -> Self {
        Self {
            issues: self.issues.into_iter().filter(Issue::is_structural).collect(),
        }
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Invalid(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {issue}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn validate(doc: &ExtractionDoc) -> ValidationReport {
    let mut issues = Vec::new();

    let entity_names: HashSet<&str> = match &doc.entities {
        Some(entities) => entities.keys().map(String::as_str).collect(),
        None => {
            issues.push(Issue::MissingKey {
                key: "entities".to_string(),
            });
            HashSet::new()
        }
    };
    if doc.relationships.is_none() {
        issues.push(Issue::MissingKey {
            key: "relationships".to_string(),
        });
    }

    for (name, entity) in doc.entities.iter().flatten() {
        if name.trim().is_empty() {
            issues.push(Issue::EmptyEntityName);
            continue;
        }
        if let Some(ch) = identity::reserved_char(name) {
            issues.push(Issue::ReservedInEntityName {
                entity: name.clone(),
                ch,
            });
        }
        if let Err(kind) = identity::entity_kind(name, entity.kind.as_deref()) {
            issues.push(Issue::InvalidKind {
                entity: name.clone(),
                kind,
            });
        }
        let mut seen = HashSet::new();
        for (index, prop) in entity.properties.iter().enumerate() {
            match prop.name.as_deref().filter(|n| !n.trim().is_empty()) {
                None => issues.push(Issue::PropertyMissingName {
                    entity: name.clone(),
                    index,
                }),
                Some(prop_name) => {
                    if let Some(ch) = identity::reserved_char(prop_name) {
                        issues.push(Issue::ReservedInPropertyName {
                            entity: name.clone(),
                            name: prop_name.to_string(),
                            ch,
                        });
                    }
                    if !seen.insert(prop_name) {
                        issues.push(Issue::DuplicateProperty {
                            entity: name.clone(),
                            name: prop_name.to_string(),
                        });
                    }
                }
            }
        }
    }

    for (index, rel) in doc.relationships.iter().flatten().enumerate() {
        for (end, value) in [(Endpoint::From, &rel.from), (Endpoint::To, &rel.to)] {
            match value {
                None => issues.push(Issue::MissingEndpoint { index, end }),
                Some(name) if !entity_names.contains(name.as_str()) => {
                    issues.push(Issue::UnknownEntity {
                        index,
                        end,
                        name: name.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for (field, value) in [
            ("cardinality", &rel.cardinality),
            ("fromCardinality", &rel.from_cardinality),
            ("toCardinality", &rel.to_cardinality),
        ] {
            if let Some(value) = value {
                if !is_valid_cardinality(value) {
                    issues.push(Issue::InvalidCardinality {
                        index,
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }

        if let Some(role) = rel.role.as_ref().filter(|r| r.contains(KEY_SEP)) {
            issues.push(Issue::ReservedInRole {
                index,
                role: role.clone(),
            });
        }

        if let Some(direction) = &rel.direction {
            if Direction::parse(direction).is_none() {
                issues.push(Issue::InvalidDirection {
                    index,
                    value: direction.clone(),
                });
            }
        }
    }

    ValidationReport { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{parse_str, Format};

    fn doc(json: &str) -> ExtractionDoc {
        parse_str(json, Format::Json).unwrap()
    }

    #[test]
    fn valid_document_has_no_issues() {
        let report = validate(&doc(
            r#"{"entities": {"A": {"properties":[{"name":"id","type":"string","required":true}]}, "B": {"properties":[]}},
                "relationships": [{"from":"A","to":"B","type":"has_b","direction":"out"}]}"#,
        ));
        assert!(report.is_empty(), "{report}");
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn missing_top_level_keys_reported_separately() {
        let report = validate(&doc(r#"{}"#));
        assert_eq!(
            report.issues,
            vec![
                Issue::MissingKey {
                    key: "entities".into()
                },
                Issue::MissingKey {
                    key: "relationships".into()
                },
            ]
        );
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let report = validate(&doc(
            r#"{"entities": {"A": {}}, "relationships": [{"from":"A","to":"Ghost","type":"x"}]}"#,
        ));
        assert_eq!(
            report.issues,
            vec![Issue::UnknownEntity {
                index: 0,
                end: Endpoint::To,
                name: "Ghost".into()
            }]
        );
        assert!(matches!(report.into_result(), Err(GraphError::Invalid(_))));
    }

    #[test]
    fn dotted_names_cannot_collide() {
        // A + "b.c" and "A.b" + "c" would both map to demo#A.b.c
        let report = validate(&doc(
            r#"{"entities": {"A": {"properties":[{"name":"b.c","type":"int"}]},
                             "A.b": {"properties":[{"name":"c"}]}},
                "relationships": []}"#,
        ));
        assert_eq!(
            report.issues,
            vec![
                Issue::ReservedInPropertyName {
                    entity: "A".into(),
                    name: "b.c".into(),
                    ch: '.'
                },
                Issue::ReservedInEntityName {
                    entity: "A.b".into(),
                    ch: '.'
                },
            ]
        );
        assert!(report.issues.iter().all(Issue::is_structural));
    }

    #[test]
    fn hash_in_entity_name_rejected() {
        let report = validate(&doc(
            r#"{"entities": {"tmf#A": {}}, "relationships": []}"#,
        ));
        assert_eq!(
            report.issues,
            vec![Issue::ReservedInEntityName {
                entity: "tmf#A".into(),
                ch: '#'
            }]
        );
    }

    #[test]
    fn key_separator_rejected_in_names_and_roles() {
        let report = validate(&doc(
            r#"{"entities": {"A\u001fB": {}, "C": {"properties":[{"name":"x\u001fy"}]}},
                "relationships": [{"from":"C","to":"C","role":"r\u001f1"}]}"#,
        ));
        assert_eq!(
            report.issues,
            vec![
                Issue::ReservedInEntityName {
                    entity: "A\u{1f}B".into(),
                    ch: '\u{1f}'
                },
                Issue::ReservedInPropertyName {
                    entity: "C".into(),
                    name: "x\u{1f}y".into(),
                    ch: '\u{1f}'
                },
                Issue::ReservedInRole {
                    index: 0,
                    role: "r\u{1f}1".into()
                },
            ]
        );
        assert!(report.to_string().contains("edge key separator"));
    }

    #[test]
    fn missing_endpoint_reported() {
        let report = validate(&doc(
            r#"{"entities": {"A": {}}, "relationships": [{"to":"A"}]}"#,
        ));
        assert_eq!(
            report.issues,
            vec![Issue::MissingEndpoint {
                index: 0,
                end: Endpoint::From
            }]
        );
    }

    #[test]
    fn bad_cardinality_direction_and_kind() {
        let report = validate(&doc(
            r#"{"entities": {"A": {"kind": "Widget"}, "B": {}},
                "relationships": [{"from":"A","to":"B","cardinality":"lots","toCardinality":"1..x","direction":"sideways"}]}"#,
        ));
        assert_eq!(report.len(), 4, "{report}");
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, Issue::InvalidKind { kind, .. } if kind == "Widget")));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, Issue::InvalidDirection { value, .. } if value == "sideways")));
        let cards: Vec<_> = report
            .issues
            .iter()
            .filter_map(|i| match i {
                Issue::InvalidCardinality { field, .. } => Some(field.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cards, vec!["cardinality", "toCardinality"]);
    }

    #[test]
    fn property_problems() {
        let report = validate(&doc(
            r#"{"entities": {"A": {"properties": [{"type":"int"}, {"name":"id"}, {"name":"id"}]}},
                "relationships": []}"#,
        ));
        assert_eq!(
            report.issues,
            vec![
                Issue::PropertyMissingName {
                    entity: "A".into(),
                    index: 0
                },
                Issue::DuplicateProperty {
                    entity: "A".into(),
                    name: "id".into()
                },
            ]
        );
    }

    #[test]
    fn structural_filter_keeps_only_blocking_issues() {
        let report = validate(&doc(
            r#"{"entities": {"A": {}}, "relationships": [{"from":"A","to":"B","direction":"up"}]}"#,
        ))
        .structural();
        assert_eq!(report.len(), 1);
        assert!(matches!(report.issues[0], Issue::UnknownEntity { .. }));
    }

    #[test]
    fn report_display_lists_issues() {
        let report = validate(&doc(r#"{"entities": {}}"#));
        assert_eq!(report.to_string(), "  - missing 'relationships' key");
    }
}
