// Field-type registry: a fixed table of named parse/format pairs

use crate::value::Value;
use thiserror::Error;

/// Why a field type rejected a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FieldTypeError(pub String);

pub type ParseFn = fn(&str) -> Result<Value, FieldTypeError>;
pub type FormatFn = fn(&Value) -> Result<String, FieldTypeError>;

/// A registered field type.
#[derive(Debug)]
pub struct FieldTypeDescriptor {
    pub name: &'static str,
    pub parse: ParseFn,
    pub format: FormatFn,
}

impl FieldTypeDescriptor {
    /// Parse raw text and format it back, yielding the canonical text for this type.
    pub fn coerce(&self, raw: &str) -> Result<String, FieldTypeError> {
        let value = (self.parse)(raw)?;
        (self.format)(&value)
    }
}

static REGISTRY: [FieldTypeDescriptor; 2] = [
    FieldTypeDescriptor {
        name: "IntField",
        parse: parse_int,
        format: format_int,
    },
    FieldTypeDescriptor {
        name: "URLField",
        parse: parse_url,
        format: format_url,
    },
];

/// Look up a field type by name.
pub fn lookup(name: &str) -> Option<&'static FieldTypeDescriptor> {
    REGISTRY.iter().find(|d| d.name == name)
}

/// Names of every registered field type.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|d| d.name)
}

fn parse_int(raw: &str) -> Result<Value, FieldTypeError> {
    raw.trim()
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|e| FieldTypeError(format!("'{raw}' is not an integer: {e}")))
}

fn format_int(value: &Value) -> Result<String, FieldTypeError> {
    match value {
        Value::Int(i) => Ok(i.to_string()),
        other => Err(FieldTypeError(format!(
            "expected an integer, got {}",
            other.type_name()
        ))),
    }
}

fn parse_url(raw: &str) -> Result<Value, FieldTypeError> {
    canonical_url(raw.trim()).map(Value::String)
}

fn format_url(value: &Value) -> Result<String, FieldTypeError> {
    match value {
        Value::String(s) => canonical_url(s),
        _ => Err(FieldTypeError("Bad type".into())),
    }
}

/// Absolute URLs in normalized form. Relative references such as `/a/b` or `img.png` stay as written.
fn canonical_url(s: &str) -> Result<String, FieldTypeError> {
    match url::Url::parse(s) {
        Ok(u) => Ok(u.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(s.to_string()),
        Err(e) => Err(FieldTypeError(format!("'{s}' is not a URL: {e}"))),
    }
}
