//! Schema and quality validation for raw records.
//!
//! Validation is a pure function over a record: no I/O, no shared
//! mutable state. Invalid records are never dropped; the result only
//! informs the persisted status and quality score.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::trace;

use crate::record::{RawRecord, ValidatedRecord};
use crate::schema::Schema;

/// A custom validation rule over the full record.
///
/// Returns `Err(message)` on failure; failures append to `errors` and
/// make the record invalid. Rules run in registration order.
pub type CustomRule = Box<dyn Fn(&RawRecord) -> Result<(), String> + Send + Sync>;

/// Validates records against a declarative schema plus custom rules and
/// derives a quality score.
pub struct Validator {
    schema: Schema,
    custom_rules: Vec<CustomRule>,
}

impl Validator {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            custom_rules: Vec::new(),
        }
    }

    /// Register a custom rule. Rules run after schema checks, in order.
    pub fn add_rule(&mut self, rule: CustomRule) {
        self.custom_rules.push(rule);
    }

    /// Validate one record.
    ///
    /// Out-of-range numeric values are warnings, not errors: they are
    /// anomalous, not malformed, and must not make the record invalid.
    pub fn validate(&self, record: RawRecord) -> ValidatedRecord {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for name in self.schema.missing_required(&record.fields) {
            errors.push(format!("Missing required field '{name}'"));
        }

        for (name, field_schema) in &self.schema.properties {
            let Some(value) = record.fields.get(name) else {
                continue;
            };
            if !field_schema.field_type.matches(value) {
                errors.push(format!(
                    "Field '{name}': value `{value}` is not of type '{}'",
                    field_schema.field_type.as_str()
                ));
                continue;
            }
            if let Some(n) = value.as_f64() {
                if let Some(min) = field_schema.minimum
                    && n < min
                {
                    warnings.push(format!("Field '{name}': {n} is below minimum {min}"));
                }
                if let Some(max) = field_schema.maximum
                    && n > max
                {
                    warnings.push(format!("Field '{name}': {n} is above maximum {max}"));
                }
            }
        }

        if let Some(ts) = record.fields.get(&self.schema.timestamp_field) {
            let ok = ts.as_str().is_some_and(is_iso8601);
            if !ok {
                errors.push(format!(
                    "Field '{}': `{ts}` is not a valid ISO-8601 date-time",
                    self.schema.timestamp_field
                ));
            }
        }

        for rule in &self.custom_rules {
            if let Err(message) = rule(&record) {
                errors.push(message);
            }
        }

        let quality_score = self.quality_score(&record);
        let is_valid = errors.is_empty();

        trace!(
            record_id = record.id_for_errors(),
            is_valid,
            quality_score,
            error_count = errors.len(),
            warning_count = warnings.len(),
            "Record validated"
        );

        ValidatedRecord {
            record,
            is_valid,
            quality_score,
            errors,
            warnings,
        }
    }

    /// Quality score: start at 1.0, subtract 0.1 per missing required
    /// field, 0.05 per null field, 0.02 per empty-string field.
    fn quality_score(&self, record: &RawRecord) -> f64 {
        let missing = self.schema.missing_required(&record.fields).count();
        let nulls = record.fields.values().filter(|v| v.is_null()).count();
        let empties = record
            .fields
            .values()
            .filter(|v| matches!(v, Value::String(s) if s.trim().is_empty()))
            .count();

        let score = 1.0 - 0.1 * missing as f64 - 0.05 * nulls as f64 - 0.02 * empties as f64;
        score.clamp(0.0, 1.0)
    }
}

/// Accept RFC 3339 (trailing `Z` included) and offset-less ISO-8601.
fn is_iso8601(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExtractMetadata;
    use chrono::Utc;
    use serde_json::json;

    fn schema() -> Schema {
        serde_yaml::from_str(
            r#"
required: [id, timestamp]
properties:
  id:
    type: string
  timestamp:
    type: string
  value:
    type: number
    minimum: 0
    maximum: 100
"#,
        )
        .unwrap()
    }

    fn record(fields: Value) -> RawRecord {
        RawRecord {
            raw_id: Some("r1".into()),
            source_timestamp: Utc::now(),
            fields: fields.as_object().unwrap().clone(),
            metadata: ExtractMetadata {
                fetched_at: Utc::now(),
                source: "test".into(),
                api_version: "1.0".into(),
            },
        }
    }

    #[test]
    fn test_valid_record_scores_one() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
            "timestamp": "2024-03-01T10:00:00Z",
            "value": 42,
        })));

        assert!(result.is_valid);
        assert_eq!(result.quality_score, 1.0);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
        })));

        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("timestamp")));
        assert!((result.quality_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_type_mismatch_reports_value_and_expected_type() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": 42,
            "timestamp": "2024-03-01T10:00:00Z",
        })));

        assert!(!result.is_valid);
        let error = result.errors.iter().find(|e| e.contains("'id'")).unwrap();
        assert!(error.contains("42"));
        assert!(error.contains("string"));
    }

    #[test]
    fn test_out_of_range_is_warning_not_error() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
            "timestamp": "2024-03-01T10:00:00Z",
            "value": 150,
        })));

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("above maximum"));
    }

    #[test]
    fn test_below_minimum_is_warning() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
            "timestamp": "2024-03-01T10:00:00Z",
            "value": -5,
        })));

        assert!(result.is_valid);
        assert!(result.warnings[0].contains("below minimum"));
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
            "timestamp": "not-a-date",
        })));

        assert!(!result.is_valid);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("ISO-8601"))
        );
    }

    #[test]
    fn test_timestamp_accepts_trailing_z_and_offset() {
        assert!(is_iso8601("2024-03-01T10:00:00Z"));
        assert!(is_iso8601("2024-03-01T10:00:00+00:00"));
        assert!(is_iso8601("2024-03-01T10:00:00.123Z"));
        assert!(is_iso8601("2024-03-01T10:00:00"));
        assert!(!is_iso8601("2024-03-01 oops"));
    }

    #[test]
    fn test_quality_score_penalizes_nulls_and_empties() {
        let validator = Validator::new(schema());
        let result = validator.validate(record(json!({
            "id": "a",
            "timestamp": "2024-03-01T10:00:00Z",
            "note": null,
            "comment": "   ",
        })));

        // 1.0 - 0.05 (null) - 0.02 (empty string)
        assert!((result.quality_score - 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_quality_score_clamped_to_zero() {
        let mut many_nulls = serde_json::Map::new();
        for i in 0..30 {
            many_nulls.insert(format!("f{i}"), Value::Null);
        }
        let validator = Validator::new(schema());
        let mut rec = record(json!({}));
        rec.fields = many_nulls;
        let result = validator.validate(rec);

        assert_eq!(result.quality_score, 0.0);
    }

    #[test]
    fn test_custom_rules_run_in_order_and_fail_record() {
        let mut validator = Validator::new(Schema::default());
        validator.add_rule(Box::new(|r| {
            if r.fields.contains_key("flag") {
                Err("first rule rejected".to_string())
            } else {
                Ok(())
            }
        }));
        validator.add_rule(Box::new(|_| Err("second rule rejected".to_string())));

        let result = validator.validate(record(json!({"flag": true})));

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["first rule rejected", "second rule rejected"]
        );
    }
}
