use super::types::ViewSchema;
use crate::error::Result;
use std::path::Path;

/// Parse a view schema file. `.json` files are read as JSON, anything else as YAML.
pub fn parse_schema(path: &Path) -> Result<ViewSchema> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_schema_json(&content),
        _ => parse_schema_str(&content),
    }
}

/// Parse a view schema from a YAML string
pub fn parse_schema_str(content: &str) -> Result<ViewSchema> {
    let schema: ViewSchema = serde_yaml::from_str(content)?;
    Ok(schema)
}

/// Parse a view schema from a JSON string
pub fn parse_schema_json(content: &str) -> Result<ViewSchema> {
    let schema: ViewSchema = serde_json::from_str(content)?;
    Ok(schema)
}
