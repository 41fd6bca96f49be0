//! Identity rules: FQNs, schema block ids, spec/diagram id derivation.

use std::path::Path;

use crate::extraction::Meta;
use crate::model::{EntityKind, DEFAULT_REL_TYPE, KEY_SEP};

pub const DEFAULT_SPEC_ID: &str = "default";

/// Characters that delimit FQNs and edge keys. Entity and property names may
/// not contain them, which keeps `<spec>#<entity>.<field>` unambiguous.
pub const RESERVED_CHARS: &[char] = &['#', '.', KEY_SEP];

/// First reserved character in `name`, if any.
pub fn reserved_char(name: &str) -> Option<char> {
    name.chars().find(|c| RESERVED_CHARS.contains(c))
}

/// `"<specId>#<entityName>"`
pub fn entity_fqn(spec_id: &str, entity_name: &str) -> String {
    format!("{spec_id}#{entity_name}")
}

/// `"<entityFqn>.<fieldName>"`
pub fn field_fqn(entity_fqn: &str, field_name: &str) -> String {
    format!("{entity_fqn}.{field_name}")
}

pub fn block_id(spec_id: &str, diagram_id: &str) -> String {
    format!("{spec_id}/{diagram_id}")
}

/// Derive `(spec_id, diagram_id)` for a diagram.
///
/// Order of precedence:
/// 1. `meta.specId` (diagram id from `meta.diagramId`, else the source stem)
/// 2. a parent directory starting with one of `prefixes` (`tmf620/page_034.png`)
/// 3. a filename of the form `<prefix…>_<rest>` (`tmf620_productoffering.png`)
/// 4. the parent directory name
/// 5. [`DEFAULT_SPEC_ID`]
pub fn derive_spec_id(source: &str, meta: &Meta, prefixes: &[String]) -> (String, String) {
    let path = Path::new(source);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());

    if let Some(spec_id) = meta.spec_id.as_deref().filter(|s| !s.is_empty()) {
        let diagram_id = meta
            .diagram_id
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or(stem);
        return (spec_id.to_string(), diagram_id);
    }

    let has_prefix = |s: &str| prefixes.iter().any(|p| s.starts_with(p.as_str()));
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|p| p.to_string_lossy().into_owned());

    if let Some(parent) = parent.as_deref() {
        if has_prefix(parent) {
            return (parent.to_string(), stem);
        }
    }

    if let Some((head, rest)) = stem.split_once('_') {
        if has_prefix(head) && !rest.is_empty() {
            return (head.to_string(), rest.to_string());
        }
    }

    match parent {
        Some(parent) => (parent, stem),
        None => (DEFAULT_SPEC_ID.to_string(), stem),
    }
}

/// Decide an entity's kind. Reference types are recognised by name; otherwise
/// a declared kind is honoured when it names a known kind.
///
/// Returns `Err(declared)` for an unknown declared kind so callers can decide
/// whether that is fatal.
pub fn entity_kind(name: &str, declared: Option<&str>) -> Result<EntityKind, String> {
    if name.ends_with("Ref") || name.ends_with("Reference") {
        return Ok(EntityKind::RefType);
    }
    match declared {
        None => Ok(EntityKind::Entity),
        Some(kind) => EntityKind::parse(kind).ok_or_else(|| kind.to_string()),
    }
}

/// Normalise a relationship type to snake_case; empty becomes `relates_to`.
///
/// `hasB` → `has_b`, `Belongs To` → `belongs_to`, `depends-on` → `depends_on`.
pub fn normalize_rel_type(raw: Option<&str>) -> String {
    let raw = raw.map(str::trim).unwrap_or("");
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() {
                if prev_lower && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
                prev_lower = false;
            } else {
                out.push(ch);
                prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            }
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
            prev_lower = false;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        DEFAULT_REL_TYPE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec!["tmf".to_string(), "spec".to_string()]
    }

    #[test]
    fn fqn_shapes() {
        let e = entity_fqn("demo", "A");
        assert_eq!(e, "demo#A");
        assert_eq!(field_fqn(&e, "id"), "demo#A.id");
        assert_eq!(block_id("demo", "page_1"), "demo/page_1");
    }

    #[test]
    fn spec_id_from_meta_wins() {
        let meta = Meta {
            spec_id: Some("tmf999".into()),
            ..Meta::default()
        };
        assert_eq!(
            derive_spec_id("tmf620/page_034.png", &meta, &prefixes()),
            ("tmf999".to_string(), "page_034".to_string())
        );
        let meta = Meta {
            spec_id: Some("tmf999".into()),
            diagram_id: Some("offering".into()),
            ..Meta::default()
        };
        assert_eq!(
            derive_spec_id("whatever.png", &meta, &prefixes()).1,
            "offering"
        );
    }

    #[test]
    fn spec_id_from_parent_directory() {
        assert_eq!(
            derive_spec_id("tmf620/page_034.png", &Meta::default(), &prefixes()),
            ("tmf620".to_string(), "page_034".to_string())
        );
    }

    #[test]
    fn spec_id_from_filename_prefix() {
        assert_eq!(
            derive_spec_id(
                "diagrams/tmf620_productoffering.png",
                &Meta::default(),
                &prefixes()
            ),
            ("tmf620".to_string(), "productoffering".to_string())
        );
    }

    #[test]
    fn spec_id_falls_back_to_parent_then_default() {
        assert_eq!(
            derive_spec_id("diagrams/orders.png", &Meta::default(), &prefixes()),
            ("diagrams".to_string(), "orders".to_string())
        );
        assert_eq!(
            derive_spec_id("unknown", &Meta::default(), &prefixes()),
            ("default".to_string(), "unknown".to_string())
        );
    }

    #[test]
    fn ref_types_detected_by_name() {
        assert_eq!(entity_kind("PartyRef", None), Ok(EntityKind::RefType));
        assert_eq!(
            entity_kind("ProductReference", Some("Entity")),
            Ok(EntityKind::RefType)
        );
        assert_eq!(entity_kind("Party", None), Ok(EntityKind::Entity));
        assert_eq!(entity_kind("Party", Some("RefType")), Ok(EntityKind::RefType));
        assert_eq!(entity_kind("Party", Some("Widget")), Err("Widget".to_string()));
    }

    #[test]
    fn rel_types_normalised_to_snake_case() {
        assert_eq!(normalize_rel_type(Some("has_b")), "has_b");
        assert_eq!(normalize_rel_type(Some("hasB")), "has_b");
        assert_eq!(normalize_rel_type(Some("Belongs To")), "belongs_to");
        assert_eq!(normalize_rel_type(Some("depends-on")), "depends_on");
        assert_eq!(normalize_rel_type(Some("InheritsFrom")), "inherits_from");
        assert_eq!(normalize_rel_type(Some("  ")), "relates_to");
        assert_eq!(normalize_rel_type(None), "relates_to");
    }
}
