//! Input model: the normalized output of a class-diagram extraction.
//!
//! Documents look like
//! ```text
//! { "meta": {...}, "entities": {<name>: {label, kind, properties: [...]}},
//!   "relationships": [{from, to, type, cardinality, direction, ...}] }
//! ```
//! and arrive as JSON or YAML. Everything is kept optional here so that
//! missing pieces surface as validation issues rather than parse failures.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GraphError, Result};

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(GraphError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Yaml => f.write_str("yaml"),
        }
    }
}

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        default,
        alias = "extractedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub extracted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Extractors emit this as either `1.0` or `"1.0"`.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(rename = "specId", default, skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<String>,
    #[serde(rename = "diagramId", default, skip_serializing_if = "Option::is_none")]
    pub diagram_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Vec<PropertySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSpec {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(rename = "type", default)]
    pub rel_type: Option<String>,
    #[serde(default)]
    pub cardinality: Option<String>,
    #[serde(default)]
    pub from_cardinality: Option<String>,
    #[serde(default)]
    pub to_cardinality: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relationship_type: Option<String>,
    /// Accepts `2` or `"2"`.
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_containment: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_inheritance: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_dashed: bool,
}

/// One extraction result. `entities` and `relationships` are required by the
/// population contract but optional at parse time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDoc {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<BTreeMap<String, EntitySpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<RelationshipSpec>>,
}

impl ExtractionDoc {
    pub fn entity_count(&self) -> usize {
        self.entities.as_ref().map_or(0, |e| e.len())
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.as_ref().map_or(0, |r| r.len())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn parse_str(text: &str, format: Format) -> Result<ExtractionDoc> {
    match format {
        Format::Json => {
            serde_json::from_str(text).map_err(|e| GraphError::Malformed(e.to_string()))
        }
        Format::Yaml => {
            serde_yaml::from_str(text).map_err(|e| GraphError::Malformed(e.to_string()))
        }
    }
}

/// Load an extraction document, picking the format from the file extension.
pub fn load_data(path: &Path) -> Result<ExtractionDoc> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    parse_str(&text, format)
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// `null` reads as the type's default instead of failing the document.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_order<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("order must be an integer, got {n}"))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("order must be an integer, got '{s}'"))),
        Some(other) => Err(D::Error::custom(format!(
            "order must be an integer, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_minimal_json() {
        let doc = parse_str(
            r#"{"entities": {"A": {"properties":[{"name":"id","type":"string","required":true}]}, "B": {"properties":[]}},
                "relationships": [{"from":"A","to":"B","type":"has_b","direction":"out"}]}"#,
            Format::Json,
        )
        .unwrap();
        assert_eq!(doc.entity_count(), 2);
        assert_eq!(doc.relationship_count(), 1);
        let a = &doc.entities.as_ref().unwrap()["A"];
        assert_eq!(a.properties[0].name.as_deref(), Some("id"));
        assert!(a.properties[0].required);
        assert_eq!(doc.meta, Meta::default());
    }

    #[test]
    fn parses_yaml_with_numeric_version_and_camel_case_keys() {
        let yaml = r#"
meta:
  source: tmf620/page_034.png
  version: 1.0
  specId: tmf620
entities:
  ProductOffering:
    label: Product Offering
    properties:
      - name: id
        type: string
relationships:
  - from: ProductOffering
    to: ProductOffering
    type: bundles
    fromCardinality: "0..1"
    toCardinality: "0..*"
    isContainment: true
"#;
        let doc = parse_str(yaml, Format::Yaml).unwrap();
        assert_eq!(doc.meta.version.as_deref(), Some("1.0"));
        assert_eq!(doc.meta.spec_id.as_deref(), Some("tmf620"));
        let rel = &doc.relationships.as_ref().unwrap()[0];
        assert_eq!(rel.from_cardinality.as_deref(), Some("0..1"));
        assert!(rel.is_containment);
        assert!(!rel.is_dashed);
    }

    #[test]
    fn extracted_at_accepts_both_spellings() {
        let snake = parse_str(r#"{"meta": {"extracted_at": "2026-01-01T00:00:00Z"}}"#, Format::Json)
            .unwrap();
        let camel = parse_str(r#"{"meta": {"extractedAt": "2026-01-01T00:00:00Z"}}"#, Format::Json)
            .unwrap();
        assert_eq!(snake.meta.extracted_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(camel.meta, snake.meta);
    }

    #[test]
    fn nulls_read_as_defaults() {
        let doc = parse_str(
            r#"{"entities": {"A": {"properties": null},
                             "B": {"properties": [{"name": "id", "required": null}]}},
                "relationships": [{"from": "A", "to": "B", "order": null, "isDashed": null}]}"#,
            Format::Json,
        )
        .unwrap();
        let entities = doc.entities.as_ref().unwrap();
        assert!(entities["A"].properties.is_empty());
        assert!(!entities["B"].properties[0].required);
        let rel = &doc.relationships.as_ref().unwrap()[0];
        assert_eq!(rel.order, None);
        assert!(!rel.is_dashed);
    }

    #[test]
    fn order_accepts_numeric_strings() {
        let yaml = "relationships:\n  - {from: A, to: B, order: \"3\"}\n  - {from: A, to: B, order: 4}\n";
        let doc = parse_str(yaml, Format::Yaml).unwrap();
        let rels = doc.relationships.unwrap();
        assert_eq!(rels[0].order, Some(3));
        assert_eq!(rels[1].order, Some(4));

        let err = parse_str(
            r#"{"relationships": [{"from": "A", "to": "B", "order": "first"}]}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Malformed(_)), "{err}");
    }

    #[test]
    fn missing_top_level_keys_parse_as_none() {
        let doc = parse_str(r#"{"meta": {"source": "x.png"}}"#, Format::Json).unwrap();
        assert!(doc.entities.is_none());
        assert!(doc.relationships.is_none());
    }

    #[test]
    fn non_object_entity_is_malformed() {
        let err = parse_str(
            r#"{"entities": {"A": 3}, "relationships": []}"#,
            Format::Json,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Malformed(_)), "{err}");
    }

    #[test]
    fn load_data_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diagram.txt");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            load_data(&path),
            Err(GraphError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn load_data_reads_yml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diagram.yml");
        std::fs::write(&path, "entities: {}\nrelationships: []\n").unwrap();
        let doc = load_data(&path).unwrap();
        assert_eq!(doc.entity_count(), 0);
        assert_eq!(doc.relationship_count(), 0);
    }
}
