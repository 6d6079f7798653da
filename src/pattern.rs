//! Route templates compiled to anchored regular expressions.
//!
//! `/domain/{id}/dns` becomes `^/domain/(?P<id>[^/]+)/dns$`. Literal text is
//! escaped, each `{name}` placeholder matches one or more non-`/` characters,
//! and the whole path must match, so `/domain/{id}` accepts `/domain/42` but
//! neither `/domain` nor `/domain/42/extra`.

use std::collections::HashMap;

use regex::Regex;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq)]
enum Piece {
    Literal(String),
    Param(String),
}

/// A compiled route template.
#[derive(Clone, Debug)]
pub struct Pattern {
    regex: Regex,
    params: Vec<String>,
    pieces: Vec<Piece>,
}

impl Pattern {
    /// Compiles `uri`.
    ///
    /// Fails on unbalanced braces, empty placeholders, placeholder names that
    /// are not identifiers, and names used twice in one template.
    pub fn compile(uri: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidPattern {
            uri: uri.to_owned(),
            reason: reason.to_owned(),
        };

        let mut pieces = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = uri.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested `{`")),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(invalid("unclosed `{`"));
                    }
                    if !is_identifier(&name) {
                        return Err(invalid(&format!("`{{{name}}}` is not a valid placeholder")));
                    }
                    if params.contains(&name) {
                        return Err(invalid(&format!("placeholder `{name}` appears twice")));
                    }
                    params.push(name.clone());
                    pieces.push(Piece::Param(name));
                }
                '}' => return Err(invalid("unmatched `}`")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        let mut source = String::with_capacity(uri.len() + 16 * params.len() + 2);
        source.push('^');
        for piece in &pieces {
            match piece {
                Piece::Literal(text) => source.push_str(&regex::escape(text)),
                Piece::Param(name) => {
                    source.push_str("(?P<");
                    source.push_str(name);
                    source.push_str(">[^/]+)");
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self { regex, params, pieces })
    }

    /// The generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Placeholder names in template order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Whether `path` matches and every placeholder value decodes.
    pub fn is_match(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Percent-decoded placeholder values for `path`, or `None` if it does
    /// not match. A value that does not decode to UTF-8 is a non-match.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut values = HashMap::with_capacity(self.params.len());
        for name in &self.params {
            if let Some(m) = caps.name(name) {
                let value = urlencoding::decode(m.as_str()).ok()?;
                values.insert(name.clone(), value.into_owned());
            }
        }
        Some(values)
    }

    /// Builds a concrete path by substituting `values` into the template.
    /// Values are percent-encoded. Returns `None` if one is missing.
    pub fn fill(&self, values: &HashMap<String, String>) -> Option<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Param(name) => out.push_str(&urlencoding::encode(values.get(name)?)),
            }
        }
        Some(out)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_pattern_is_anchored() {
        let p = Pattern::compile("/domain/{id}").unwrap();
        assert!(p.is_match("/domain/42"));
        assert!(!p.is_match("/domain/42/extra"));
        assert!(!p.is_match("/domain"));
        assert!(!p.is_match("/domain/"));
        assert!(!p.is_match("/prefix/domain/42"));
    }

    #[test]
    fn compiling_twice_yields_the_same_pattern() {
        let a = Pattern::compile("/domain/{id}/edit").unwrap();
        let b = Pattern::compile("/domain/{id}/edit").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.as_str(), "^/domain/(?P<id>[^/]+)/edit$");
        for path in ["/domain/1/edit", "/domain/1", "/domain/a/b/edit"] {
            assert_eq!(a.is_match(path), b.is_match(path));
        }
    }

    #[test]
    fn literal_text_is_escaped() {
        let p = Pattern::compile("/files/report.csv").unwrap();
        assert!(p.is_match("/files/report.csv"));
        assert!(!p.is_match("/files/reportxcsv"));
    }

    #[test]
    fn extracts_every_placeholder() {
        let p = Pattern::compile("/zones/{zone}/records/{record_id}").unwrap();
        let caps = p.captures("/zones/example.com/records/9f2").unwrap();
        assert_eq!(caps["zone"], "example.com");
        assert_eq!(caps["record_id"], "9f2");
        assert_eq!(p.params(), ["zone", "record_id"]);
    }

    #[test]
    fn placeholder_may_share_a_segment_with_literal_text() {
        let p = Pattern::compile("/report-{year}.csv").unwrap();
        assert_eq!(p.captures("/report-2024.csv").unwrap()["year"], "2024");
    }

    #[test]
    fn rejects_malformed_templates() {
        for uri in ["/domain/{id", "/domain/id}", "/domain/{}", "/domain/{1d}", "/a/{x}/{x}", "/{a{b}}"] {
            assert!(
                matches!(Pattern::compile(uri), Err(Error::InvalidPattern { .. })),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn fills_placeholders_for_reverse_routing() {
        let p = Pattern::compile("/domain/{id}/edit").unwrap();
        let values = HashMap::from([("id".to_owned(), "a b".to_owned())]);
        assert_eq!(p.fill(&values).as_deref(), Some("/domain/a%20b/edit"));
        assert_eq!(p.fill(&HashMap::new()), None);
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let p = Pattern::compile("/zones/{zone}").unwrap();
        assert_eq!(p.captures("/zones/a%20b").unwrap()["zone"], "a b");
        assert_eq!(p.captures("/zones/a%2Fb").unwrap()["zone"], "a/b");
        assert_eq!(p.captures("/zones/caf%C3%A9").unwrap()["zone"], "café");
        assert_eq!(p.captures("/zones/a+b").unwrap()["zone"], "a+b");
    }

    #[test]
    fn undecodable_value_does_not_match() {
        let p = Pattern::compile("/zones/{zone}").unwrap();
        assert!(p.captures("/zones/%FF%FE").is_none());
        assert!(!p.is_match("/zones/%FF%FE"));
    }
}
