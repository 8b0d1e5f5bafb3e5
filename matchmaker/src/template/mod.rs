// Format templates - parsing and positional interpolation

use crate::value::Value;
use std::fmt::Write;
use thiserror::Error;

/// A parsed positional format template such as `"%v_%v"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub raw: String,
    pub segments: Vec<TemplateSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Literal(String),
    /// Takes the next value in order
    Placeholder,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown directive '%{directive}' at byte {position}")]
    UnknownDirective { directive: char, position: usize },

    #[error("template ends with a lone '%'")]
    TrailingPercent,

    #[error("template takes {expected} value(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

impl Template {
    /// Parse a template. `%v` and `%s` are placeholders, `%%` is a literal percent.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some((_, '%')) => literal.push('%'),
                Some((_, 'v')) | Some((_, 's')) => {
                    if !literal.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(TemplateSegment::Placeholder);
                }
                Some((_, other)) => {
                    return Err(TemplateError::UnknownDirective {
                        directive: other,
                        position: pos,
                    })
                }
                None => return Err(TemplateError::TrailingPercent),
            }
        }
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }

        Ok(Template {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, TemplateSegment::Placeholder))
            .count()
    }

    /// Interpolate `values` in order. The count must match the placeholders exactly.
    pub fn render(&self, values: &[&Value]) -> Result<String, TemplateError> {
        let expected = self.placeholder_count();
        if values.len() != expected {
            return Err(TemplateError::ArityMismatch {
                expected,
                got: values.len(),
            });
        }

        let mut out = String::new();
        let mut next = values.iter();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Placeholder => {
                    if let Some(value) = next.next() {
                        // Writing to a String cannot fail
                        let _ = write!(out, "{value}");
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_placeholders() {
        let t = Template::parse("%v_%v").unwrap();
        assert_eq!(
            t.segments,
            vec![
                TemplateSegment::Placeholder,
                TemplateSegment::Literal("_".into()),
                TemplateSegment::Placeholder,
            ]
        );
        assert_eq!(t.placeholder_count(), 2);
    }

    #[test]
    fn test_render_values_in_order() {
        let t = Template::parse("%v by %s").unwrap();
        let title = Value::from("Up");
        let who = Value::from("Pixar");
        assert_eq!(t.render(&[&title, &who]).unwrap(), "Up by Pixar");
    }

    #[test]
    fn test_percent_escape() {
        let t = Template::parse("%v%%").unwrap();
        assert_eq!(t.placeholder_count(), 1);
        assert_eq!(t.render(&[&Value::Int(50)]).unwrap(), "50%");
    }

    #[test]
    fn test_literal_only_template() {
        let t = Template::parse("constant").unwrap();
        assert_eq!(t.placeholder_count(), 0);
        assert_eq!(t.render(&[]).unwrap(), "constant");
    }

    #[test]
    fn test_unknown_directive_rejected() {
        assert_eq!(
            Template::parse("a%d").unwrap_err(),
            TemplateError::UnknownDirective {
                directive: 'd',
                position: 1
            }
        );
        assert_eq!(
            Template::parse("100%").unwrap_err(),
            TemplateError::TrailingPercent
        );
        assert_eq!(
            Template::parse("a%d").unwrap_err().to_string(),
            "unknown directive '%d' at byte 1"
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let t = Template::parse("%v-%v").unwrap();
        let one = Value::Int(1);
        assert_eq!(
            t.render(&[&one]).unwrap_err(),
            TemplateError::ArityMismatch {
                expected: 2,
                got: 1
            }
        );
        assert!(t.render(&[&one, &one, &one]).is_err());
    }

    #[test]
    fn test_multibyte_literals_survive() {
        let t = Template::parse("é%v→").unwrap();
        assert_eq!(t.render(&[&Value::from("x")]).unwrap(), "éx→");
    }
}
