// Parameter references of the form `<collection>.<field>`

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<collection>[A-Za-z_]+)\.(?P<field>[A-Za-z_]+)$")
            .expect("parameter reference pattern is valid")
    })
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_]+$").expect("identifier pattern is valid"))
}

/// A parsed parameter reference: which collection to look in and which field to read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub collection: String,
    pub field: String,
}

impl ParamRef {
    /// Match a token against the reference grammar.
    pub fn parse(token: &str) -> Option<ParamRef> {
        let caps = param_pattern().captures(token)?;
        Some(ParamRef {
            collection: caps["collection"].to_string(),
            field: caps["field"].to_string(),
        })
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.collection, self.field)
    }
}

/// Whether a token is a well-formed parameter reference.
pub fn is_valid_param(token: &str) -> bool {
    param_pattern().is_match(token)
}

/// Split a reference into `(collection, field)`.
pub fn split_param(token: &str) -> Option<(String, String)> {
    ParamRef::parse(token).map(|p| (p.collection, p.field))
}

/// Whether a name can appear as one segment of a reference (collection names, view names).
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Append `name` to `out` unless it is already there, keeping first-appearance order.
pub(crate) fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|n| n == name) {
        out.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_collection_dot_field() {
        assert!(is_valid_param("movieDetails.actors"));
        assert!(is_valid_param("tasty_manual.id"));
        assert!(is_valid_param("_a._b"));
    }

    #[test]
    fn test_rejects_malformed_references() {
        assert!(!is_valid_param("movieDetails"));
        assert!(!is_valid_param("movieDetails."));
        assert!(!is_valid_param(".actors"));
        assert!(!is_valid_param("movie Details.actors"));
        assert!(!is_valid_param("a.b.c"));
        assert!(!is_valid_param("movie1.actors"));
        assert!(!is_valid_param("movie[.actors"));
        assert!(!is_valid_param("movieXactors"));
        assert!(!is_valid_param(""));
    }

    #[test]
    fn test_split_param() {
        assert_eq!(
            split_param("movieDetails.title"),
            Some(("movieDetails".to_string(), "title".to_string()))
        );
        assert_eq!(split_param("movieDetails"), None);
    }

    #[test]
    fn test_param_ref_display() {
        let p = ParamRef::parse("tasty_manual.video").unwrap();
        assert_eq!(p.collection, "tasty_manual");
        assert_eq!(p.field, "video");
        assert_eq!(p.to_string(), "tasty_manual.video");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("tasty"));
        assert!(is_identifier("tasty_manual"));
        assert!(!is_identifier("tasty-manual"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
    }

    #[test]
    fn test_push_unique_keeps_first_order() {
        let mut out = Vec::new();
        for name in ["b", "a", "b", "c", "a"] {
            push_unique(&mut out, name);
        }
        assert_eq!(out, vec!["b", "a", "c"]);
    }
}
