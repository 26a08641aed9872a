//! `{Field Name}` format templates evaluated against a local record.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::LocalRecord;
use crate::{Error, Result};

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("template token regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed format template such as `"{Achievements Unlocked}/{Achievements Total}"`.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FormatTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut cursor = 0;

        for captures in token_regex().captures_iter(source) {
            let token = captures.get(0).expect("group 0 is always present");
            literal.push_str(&source[cursor..token.start()]);
            cursor = token.end();

            match token.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                "{" | "}" => {
                    return Err(Error::Mapping(format!(
                        "unbalanced '{}' at offset {} in template '{source}'",
                        token.as_str(),
                        token.start()
                    )));
                }
                _ => {
                    let field = captures.get(1).map_or("", |name| name.as_str());
                    if field.trim().is_empty() {
                        return Err(Error::Mapping(format!(
                            "empty placeholder in template '{source}'"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field.to_string()));
                }
            }
        }

        literal.push_str(&source[cursor..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(field.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Expand against `record`. An absent field is an error; a null one
    /// expands to nothing.
    pub fn expand(&self, record: &LocalRecord) -> Result<String> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Field(field) => {
                    let value = record
                        .get(field)
                        .ok_or_else(|| Error::MissingTemplateField {
                            template: self.source.clone(),
                            field: field.clone(),
                        })?;
                    output.push_str(&value.to_text());
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use pretty_assertions::assert_eq;

    fn achievements_record() -> LocalRecord {
        LocalRecord::new()
            .with("Achievements Unlocked", 12_u64)
            .with("Achievements Total", 50_u64)
    }

    #[test]
    fn expands_fields_with_spaces() {
        let template = FormatTemplate::parse("{Achievements Unlocked}/{Achievements Total}").unwrap();
        assert_eq!(
            template.fields().collect::<Vec<_>>(),
            vec!["Achievements Unlocked", "Achievements Total"]
        );
        assert_eq!(template.expand(&achievements_record()).unwrap(), "12/50");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let template = FormatTemplate::parse("{{{Achievements Total}}}").unwrap();
        assert_eq!(template.expand(&achievements_record()).unwrap(), "{50}");
    }

    #[test]
    fn missing_field_is_an_error() {
        let template = FormatTemplate::parse("{Achievements Unlocked}/{Achievements Total}").unwrap();
        let record = LocalRecord::new().with("Achievements Unlocked", 3_u64);

        match template.expand(&record).unwrap_err() {
            Error::MissingTemplateField { field, .. } => assert_eq!(field, "Achievements Total"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_field_expands_to_empty() {
        let template = FormatTemplate::parse("{A}/{B}").unwrap();
        let record = LocalRecord::new()
            .with("A", FieldValue::Null)
            .with("B", FieldValue::Null);
        assert_eq!(template.expand(&record).unwrap(), "/");
    }

    #[test]
    fn unbalanced_and_empty_placeholders_are_rejected() {
        assert!(FormatTemplate::parse("{Name").is_err());
        assert!(FormatTemplate::parse("Name}").is_err());
        assert!(FormatTemplate::parse("x{}y").is_err());
        assert!(FormatTemplate::parse("no placeholders").is_ok());
    }
}
