mod compiled;
mod parser;
mod types;

pub use compiled::{CompiledField, CompiledPattern, CompiledView};
pub use parser::{parse_schema, parse_schema_json, parse_schema_str};
pub use types::{manual_collection_name, FieldDefinition, ReferencePattern, ViewSchema};
