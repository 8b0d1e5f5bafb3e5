use crate::field_type;
use crate::reference;
use crate::schema::{ReferencePattern, ViewSchema};
use crate::template::Template;
use std::collections::HashSet;

/// Result of validating a view schema
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validate a whole view schema.
/// Errors make the schema unusable; warnings describe fields that will behave
/// surprisingly but still materialize.
pub fn validate_schema(schema: &ViewSchema) -> ValidationResult {
    let mut result = ValidationResult::default();

    if schema.name.trim().is_empty() {
        result.errors.push("View name must not be empty".into());
    }

    let mut seen = HashSet::new();
    for field in &schema.fields {
        if field.name.is_empty() {
            result.errors.push("Field name must not be empty".into());
        } else if !seen.insert(field.name.as_str()) {
            result.warnings.push(format!(
                "Field '{}' is defined more than once; the last definition wins",
                field.name
            ));
        }

        if field_type::lookup(&field.field_type).is_none() {
            result.errors.push(format!(
                "Field '{}' has unknown type '{}' (known: {})",
                field.name,
                field.field_type,
                field_type::names().collect::<Vec<_>>().join(", ")
            ));
        }

        if field.patterns.is_empty() {
            result.warnings.push(format!(
                "Field '{}' has no patterns and will never be materialized",
                field.name
            ));
        }

        for (i, pattern) in field.patterns.iter().enumerate() {
            for issue in pattern_issues(pattern) {
                result
                    .errors
                    .push(format!("Field '{}' pattern #{}: {issue}", field.name, i + 1));
            }
        }
    }

    result
}

/// Problems with a single reference pattern, empty when it is valid.
pub fn pattern_issues(pattern: &ReferencePattern) -> Vec<String> {
    let mut issues = Vec::new();

    for param in &pattern.params {
        if !reference::is_valid_param(param) {
            issues.push(format!(
                "parameter '{param}' is not of the form <collection>.<field>"
            ));
        }
    }

    match Template::parse(&pattern.template) {
        Ok(template) => {
            let placeholders = template.placeholder_count();
            if placeholders != pattern.params.len() {
                issues.push(format!(
                    "template '{}' has {placeholders} placeholder(s) but {} parameter(s)",
                    pattern.template,
                    pattern.params.len()
                ));
            }
        }
        Err(e) => issues.push(format!("template '{}': {e}", pattern.template)),
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_schema_json, parse_schema_str, FieldDefinition};
    use pretty_assertions::assert_eq;

    fn tasty_schema() -> ViewSchema {
        parse_schema_str(
            r#"
name: tasty
fields:
  - name: video
    fieldType: URLField
    patterns:
      - template: "%v"
        params: [tasty_manual.video]
  - name: id
    fieldType: IntField
    patterns:
      - template: "%v_%v"
        params: [movieDetails.actors, movieDetails.title]
      - template: "%v"
        params: [tasty_manual.id]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_schema() {
        let schema = tasty_schema();
        let result = validate_schema(&schema);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(!result.has_warnings());
        assert!(schema.valid());
        assert!(schema.fields.iter().all(|f| f.valid()));
    }

    #[test]
    fn test_related_collections_in_first_appearance_order() {
        let schema = tasty_schema();
        assert_eq!(
            schema.related_collections(),
            vec!["tasty_manual".to_string(), "movieDetails".to_string()]
        );
        assert_eq!(
            schema.fields[1].related_collections(),
            vec!["movieDetails".to_string(), "tasty_manual".to_string()]
        );
        assert_eq!(
            schema.fields[1].patterns[0].related_collections(),
            vec!["movieDetails".to_string()]
        );
    }

    #[test]
    fn test_bad_param_invalidates_schema() {
        let mut schema = tasty_schema();
        schema.fields[1].patterns[1].params = vec!["tasty_manual".into()];

        assert!(!schema.fields[1].patterns[1].valid());
        assert!(!schema.fields[1].valid());
        assert!(!schema.valid());

        let result = validate_schema(&schema);
        assert!(result.errors.iter().any(|e| e.contains("'tasty_manual'")));
    }

    #[test]
    fn test_unknown_field_type() {
        let mut schema = tasty_schema();
        schema.fields[0].field_type = "DateField".into();

        assert!(!schema.fields[0].valid());
        let result = validate_schema(&schema);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("DateField"));
    }

    #[test]
    fn test_placeholder_count_must_match_params() {
        let pattern = ReferencePattern::new("%v_%v", &["movieDetails.title"]);
        assert!(!pattern.valid());
        assert_eq!(pattern_issues(&pattern).len(), 1);

        let pattern = ReferencePattern::new("%d", &["movieDetails.title"]);
        assert!(!pattern.valid());
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let schema = ViewSchema::new(
            "dupes",
            vec![
                FieldDefinition::new("a", "IntField", vec![]),
                FieldDefinition::new(
                    "a",
                    "IntField",
                    vec![ReferencePattern::new("%v", &["x.y"])],
                ),
            ],
        );
        let result = validate_schema(&schema);
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_empty_names_rejected() {
        let schema = ViewSchema::new(" ", vec![FieldDefinition::new("", "IntField", vec![])]);
        let result = validate_schema(&schema);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_json_transport_with_legacy_keys() {
        let schema = parse_schema_json(
            r#"{
                "name": "tasty",
                "fields": [{
                    "name": "id",
                    "fieldType": "IntField",
                    "inheritPatterns": [{ "format": "%v", "params": ["tasty_manual.id"] }]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.fields[0].patterns[0].template, "%v");
        assert!(schema.valid());

        // Canonical keys on the way out
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["fields"][0]["patterns"][0]["template"], "%v");
    }

    #[test]
    fn test_compile_reports_every_error() {
        let schema = ViewSchema::new(
            "broken",
            vec![FieldDefinition::new(
                "a",
                "Nope",
                vec![ReferencePattern::new("%v", &["bad"])],
            )],
        );
        let err = schema.compile().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Nope"));
        assert!(msg.contains("'bad'"));
    }

    #[test]
    fn test_compile_valid_schema() {
        let view = tasty_schema().compile().unwrap();
        assert_eq!(view.name, "tasty");
        assert_eq!(view.fields.len(), 2);
        assert_eq!(view.fields[1].field_type.name, "IntField");
        assert_eq!(view.fields[1].patterns[0].params[1].field, "title");
        assert_eq!(view.related_collections, vec!["tasty_manual", "movieDetails"]);
    }
}
