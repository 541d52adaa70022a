//! Declarative record schema for validation.
//!
//! Schemas are part of per-source configuration and deserialize from
//! the same YAML as the rest of [`crate::config`]. A schema lists the
//! required field names and the expected primitive type of each known
//! property, optionally with a numeric `[minimum, maximum]` range.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Expected primitive type of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    /// Check a JSON value against this type. Null is handled by the
    /// quality score, not the type check.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// Schema for a single property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Expected type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Inclusive lower bound for numeric fields.
    #[serde(default)]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric fields.
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// Declarative schema for one source's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Fields that must be present.
    #[serde(default)]
    pub required: Vec<String>,
    /// Known properties and their expected types.
    #[serde(default)]
    pub properties: IndexMap<String, FieldSchema>,
    /// Field that must parse as an ISO-8601 date-time when present.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            properties: IndexMap::new(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

impl Schema {
    /// Names of required fields missing from the given record fields.
    pub fn missing_required<'a>(
        &'a self,
        fields: &'a serde_json::Map<String, Value>,
    ) -> impl Iterator<Item = &'a str> {
        self.required
            .iter()
            .filter(|name| !fields.contains_key(*name))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_yaml_parsing() {
        let yaml = r#"
required: [id, timestamp]
properties:
  id:
    type: string
  value:
    type: number
    minimum: 0
    maximum: 100
"#;
        let schema: Schema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.required, vec!["id", "timestamp"]);
        assert_eq!(schema.timestamp_field, "timestamp");

        let value = schema.properties.get("value").unwrap();
        assert_eq!(value.field_type, FieldType::Number);
        assert_eq!(value.minimum, Some(0.0));
        assert_eq!(value.maximum, Some(100.0));
    }

    #[test]
    fn test_field_type_matches() {
        assert!(FieldType::String.matches(&json!("hello")));
        assert!(!FieldType::String.matches(&json!(42)));
        assert!(FieldType::Integer.matches(&json!(42)));
        assert!(!FieldType::Integer.matches(&json!(4.2)));
        assert!(FieldType::Number.matches(&json!(4.2)));
        assert!(FieldType::Number.matches(&json!(42)));
        assert!(FieldType::Boolean.matches(&json!(true)));
        assert!(FieldType::Object.matches(&json!({"a": 1})));
        assert!(FieldType::Array.matches(&json!([1, 2])));
    }

    #[test]
    fn test_missing_required() {
        let schema: Schema = serde_yaml::from_str("required: [id, timestamp]").unwrap();
        let fields = json!({"id": "a"});
        let missing: Vec<_> = schema
            .missing_required(fields.as_object().unwrap())
            .collect();
        assert_eq!(missing, vec!["timestamp"]);
    }
}
