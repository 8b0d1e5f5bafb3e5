// Field materialization: first satisfiable pattern wins

use crate::document::MaterializedRecord;
use crate::error::{ResolutionWarning, WarningKind};
use crate::resolver::ResolvedContext;
use crate::schema::{CompiledField, CompiledPattern, CompiledView};
use crate::value::{DocumentId, Value};

/// Formatted value for a field, or `None` when no pattern can be satisfied.
///
/// Patterns are tried in declaration order. A pattern is satisfied when every
/// param's collection is in `context` and the referenced document has the field.
/// With `coerce` set, the formatted text must also pass the field type's
/// parse/format pair; a rejected value falls through to the next pattern.
pub fn materialize_field(
    field: &CompiledField,
    context: &ResolvedContext,
    coerce: bool,
    warnings: &mut Vec<WarningKind>,
) -> Option<String> {
    for pattern in &field.patterns {
        let Some(formatted) = format_pattern(pattern, context) else {
            continue;
        };
        if !coerce {
            return Some(formatted);
        }
        match field.field_type.coerce(&formatted) {
            Ok(value) => return Some(value),
            Err(e) => warnings.push(WarningKind::CoercionFailed {
                field: field.name.clone(),
                field_type: field.field_type.name.to_string(),
                message: e.to_string(),
            }),
        }
    }
    None
}

/// Collect the pattern's values from `context` and interpolate them.
fn format_pattern(pattern: &CompiledPattern, context: &ResolvedContext) -> Option<String> {
    let values: Option<Vec<&Value>> = pattern.params.iter().map(|p| context.lookup(p)).collect();
    match pattern.template.render(&values?) {
        Ok(text) => Some(text),
        Err(e) => {
            // Compiled views check arity up front
            log::error!("Template '{}' failed: {e}", pattern.template.raw);
            None
        }
    }
}

/// Materialize every field of `view` for one document.
pub fn materialize_record(
    view: &CompiledView,
    source_id: DocumentId,
    context: &ResolvedContext,
    coerce: bool,
) -> (MaterializedRecord, Vec<ResolutionWarning>) {
    let mut record = MaterializedRecord::new(source_id);
    let mut kinds = Vec::new();

    for field in &view.fields {
        match materialize_field(field, context, coerce, &mut kinds) {
            Some(value) => {
                record.fields.insert(field.name.clone(), value);
            }
            None => log::debug!("{source_id}: no pattern satisfied for field '{}'", field.name),
        }
    }

    let warnings = kinds
        .into_iter()
        .map(|kind| {
            let warning = ResolutionWarning::new(Some(source_id.to_hex()), kind);
            log::warn!("{warning}");
            warning
        })
        .collect();
    (record, warnings)
}
