use super::types::ViewSchema;
use crate::error::{MatchmakerError, Result};
use crate::field_type::{self, FieldTypeDescriptor};
use crate::reference::ParamRef;
use crate::template::Template;
use crate::validation;

/// A validated schema with templates parsed and params split, ready to materialize.
#[derive(Debug)]
pub struct CompiledView {
    pub name: String,
    pub fields: Vec<CompiledField>,
    pub related_collections: Vec<String>,
}

#[derive(Debug)]
pub struct CompiledField {
    pub name: String,
    pub field_type: &'static FieldTypeDescriptor,
    pub patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
pub struct CompiledPattern {
    pub template: Template,
    pub params: Vec<ParamRef>,
}

impl ViewSchema {
    /// Validate and pre-parse the schema.
    pub fn compile(&self) -> Result<CompiledView> {
        let report = validation::validate_schema(self);
        if !report.is_ok() {
            return Err(MatchmakerError::SchemaInvalid(format!(
                "view '{}':\n  - {}",
                self.name,
                report.errors.join("\n  - ")
            )));
        }
        for warning in &report.warnings {
            log::warn!("View '{}': {warning}", self.name);
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let descriptor = field_type::lookup(&field.field_type).ok_or_else(|| {
                MatchmakerError::SchemaInvalid(format!("unknown field type '{}'", field.field_type))
            })?;

            let mut patterns = Vec::with_capacity(field.patterns.len());
            for pattern in &field.patterns {
                let template = pattern.parsed_template().ok_or_else(|| {
                    MatchmakerError::SchemaInvalid(format!("bad template '{}'", pattern.template))
                })?;
                patterns.push(CompiledPattern {
                    template,
                    params: pattern.param_refs().collect(),
                });
            }

            fields.push(CompiledField {
                name: field.name.clone(),
                field_type: descriptor,
                patterns,
            });
        }

        Ok(CompiledView {
            name: self.name.clone(),
            fields,
            related_collections: self.related_collections(),
        })
    }
}
