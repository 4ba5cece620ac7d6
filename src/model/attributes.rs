//! Attribute definitions and their cross-document merge rules

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ModelError, ModelResult};

/// Declaration of one semantic attribute (subject, acquisition, format, ...).
///
/// Identity is the attribute name, held by the map that owns the definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Known values: the declared enumeration plus every value observed in
    /// rule attributes while flattening.
    pub values: BTreeSet<String>,
    /// Whether the document declared an explicit `values` enumeration.
    pub has_declared_values: bool,
    /// Declared default, used to backfill unspecified query attributes.
    pub default_value: Option<String>,
    /// Whether the attribute participates in query filtering.
    pub discriminant: bool,
    /// Accepts any string; set for attributes referenced by a pattern
    /// without an explicit value set.
    pub open_value: bool,
}

impl Default for AttributeDefinition {
    fn default() -> Self {
        Self {
            values: BTreeSet::new(),
            has_declared_values: false,
            default_value: None,
            discriminant: true,
            open_value: false,
        }
    }
}

impl AttributeDefinition {
    /// Parse a definition from its document value (`{values?, default_value?,
    /// discriminant?}`)
    pub(crate) fn from_document(name: &str, value: &Value) -> ModelResult<Self> {
        let obj = value.as_object().ok_or_else(|| ModelError::MalformedRule {
            context: format!("attribute_definitions.{name}"),
            message: "definition must be a mapping".to_string(),
        })?;

        let mut def = AttributeDefinition::default();
        if let Some(values) = obj.get("values") {
            let items = values.as_array().ok_or_else(|| ModelError::MalformedRule {
                context: format!("attribute_definitions.{name}"),
                message: "'values' must be a list".to_string(),
            })?;
            def.has_declared_values = true;
            for item in items {
                def.values.insert(scalar_to_string(item).ok_or_else(|| {
                    ModelError::MalformedRule {
                        context: format!("attribute_definitions.{name}"),
                        message: "'values' entries must be scalars".to_string(),
                    }
                })?);
            }
        }
        if let Some(default) = obj.get("default_value") {
            def.default_value = Some(scalar_to_string(default).ok_or_else(|| {
                ModelError::MalformedRule {
                    context: format!("attribute_definitions.{name}"),
                    message: "'default_value' must be a scalar".to_string(),
                }
            })?);
        }
        if let Some(discriminant) = obj.get("discriminant") {
            def.discriminant = discriminant.as_bool().unwrap_or(true);
        }
        Ok(def)
    }

    /// Merge another document's definition of the same attribute into this
    /// one.
    ///
    /// Values are unioned. Presence of a declared value set and presence of a
    /// default must agree between the two definitions; two different declared
    /// defaults conflict as well.
    pub(crate) fn merge_from(&mut self, name: &str, other: &AttributeDefinition) -> ModelResult<()> {
        if self.has_declared_values != other.has_declared_values {
            return Err(ModelError::AttributeConflict(name.to_string()));
        }
        match (&self.default_value, &other.default_value) {
            (None, None) => {}
            (Some(a), Some(b)) if a == b => {}
            _ => return Err(ModelError::AttributeConflict(name.to_string())),
        }
        self.values.extend(other.values.iter().cloned());
        self.discriminant = self.discriminant && other.discriminant;
        self.open_value = self.open_value || other.open_value;
        Ok(())
    }
}

/// Render a scalar document value as an attribute value string
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_document() {
        let def = AttributeDefinition::from_document(
            "side",
            &json!({"values": ["left", "right"], "default_value": "left"}),
        )
        .unwrap();
        assert!(def.has_declared_values);
        assert_eq!(def.values.len(), 2);
        assert_eq!(def.default_value.as_deref(), Some("left"));
        assert!(def.discriminant);
    }

    #[test]
    fn test_from_document_non_discriminant() {
        let def =
            AttributeDefinition::from_document("note", &json!({"discriminant": false})).unwrap();
        assert!(!def.discriminant);
        assert!(!def.has_declared_values);
    }

    #[test]
    fn test_merge_unions_values() {
        let mut a = AttributeDefinition::from_document("side", &json!({"values": ["left"]})).unwrap();
        let b = AttributeDefinition::from_document("side", &json!({"values": ["right"]})).unwrap();
        a.merge_from("side", &b).unwrap();
        assert_eq!(a.values.len(), 2);
    }

    #[test]
    fn test_merge_values_presence_conflict() {
        let mut a = AttributeDefinition::from_document("side", &json!({"values": ["left"]})).unwrap();
        let b = AttributeDefinition::from_document("side", &json!({})).unwrap();
        let err = a.merge_from("side", &b).unwrap_err();
        assert!(matches!(err, ModelError::AttributeConflict(name) if name == "side"));
    }

    #[test]
    fn test_merge_default_conflict() {
        let mut a =
            AttributeDefinition::from_document("side", &json!({"default_value": "left"})).unwrap();
        let b =
            AttributeDefinition::from_document("side", &json!({"default_value": "right"})).unwrap();
        assert!(a.merge_from("side", &b).is_err());
    }
}
