use crate::field_type;
use crate::reference::{self, ParamRef};
use crate::template::Template;
use crate::validation;
use serde::{Deserialize, Serialize};

/// A view definition: named output fields, each derived from referenced collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// One output field and its ordered fallback patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "fieldType")]
    pub field_type: String,
    #[serde(default, alias = "inheritPatterns")]
    pub patterns: Vec<ReferencePattern>,
}

/// A format template plus the `<collection>.<field>` references that fill it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePattern {
    #[serde(alias = "format")]
    pub template: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl ReferencePattern {
    pub fn new(template: &str, params: &[&str]) -> Self {
        ReferencePattern {
            template: template.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Every param matches the reference grammar and the template takes exactly that many values.
    pub fn valid(&self) -> bool {
        validation::pattern_issues(self).is_empty()
    }

    /// Parsed params, skipping any that do not match the grammar.
    pub fn param_refs(&self) -> impl Iterator<Item = ParamRef> + '_ {
        self.params.iter().filter_map(|p| ParamRef::parse(p))
    }

    /// Distinct collections named by this pattern's params, in first-appearance order.
    pub fn related_collections(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_collections(&mut out);
        out
    }

    pub(crate) fn collect_collections(&self, out: &mut Vec<String>) {
        for param in self.param_refs() {
            reference::push_unique(out, &param.collection);
        }
    }

    pub(crate) fn parsed_template(&self) -> Option<Template> {
        Template::parse(&self.template).ok()
    }
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: &str, patterns: Vec<ReferencePattern>) -> Self {
        FieldDefinition {
            name: name.to_string(),
            field_type: field_type.to_string(),
            patterns,
        }
    }

    /// The field type exists in the registry and every pattern is valid.
    pub fn valid(&self) -> bool {
        field_type::lookup(&self.field_type).is_some() && self.patterns.iter().all(|p| p.valid())
    }

    pub fn related_collections(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_collections(&mut out);
        out
    }

    pub(crate) fn collect_collections(&self, out: &mut Vec<String>) {
        for pattern in &self.patterns {
            pattern.collect_collections(out);
        }
    }
}

impl ViewSchema {
    pub fn new(name: &str, fields: Vec<FieldDefinition>) -> Self {
        ViewSchema {
            name: name.to_string(),
            fields,
        }
    }

    /// Whether the schema passes validation with no errors.
    pub fn valid(&self) -> bool {
        validation::validate_schema(self).is_ok()
    }

    /// Distinct collections referenced anywhere in the schema, in first-appearance order.
    pub fn related_collections(&self) -> Vec<String> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.collect_collections(&mut out);
        }
        out
    }

    /// Name of the companion collection holding hand-entered records.
    pub fn manual_collection(&self) -> String {
        manual_collection_name(&self.name)
    }
}

/// `<view>_manual`
pub fn manual_collection_name(view: &str) -> String {
    format!("{view}_manual")
}
