//! Compiled blocklist patterns and identifier rules.
//!
//! Patterns are compiled once when the policy is built and matched
//! case-insensitively with `find` semantics (anywhere in the subject).

use crate::error::PolicyConfigError;
use regex::{Regex, RegexBuilder};

/// Maximum length of a path-spliced identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Longest excerpt of matched code carried into a rejection.
const MAX_EXCERPT_LEN: usize = 80;

/// An ordered list of compiled patterns. The first match wins.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

/// A pattern that matched, and the text it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch<'a> {
    pub pattern: &'a str,
    pub excerpt: String,
}

impl PatternSet {
    /// Compile `patterns` case-insensitively.
    pub fn compile<I, S>(patterns: I) -> Result<Self, PolicyConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PolicyConfigError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Source text of every pattern, in order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// First pattern matching anywhere in `subject`.
    pub fn first_match(&self, subject: &str) -> Option<PatternMatch<'_>> {
        self.patterns.iter().find_map(|re| {
            re.find(subject).map(|m| PatternMatch {
                pattern: re.as_str(),
                excerpt: excerpt(m.as_str()),
            })
        })
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(MAX_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Whether `value` is safe to splice into a URL path segment.
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value != "."
        && !value.contains("..")
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use twx_core::config::{DEFAULT_BLOCKED_CODE_PATTERNS, DEFAULT_BLOCKED_ENDPOINT_PATTERNS};

    #[test]
    fn test_default_patterns_compile() {
        let endpoints = PatternSet::compile(DEFAULT_BLOCKED_ENDPOINT_PATTERNS).unwrap();
        let code = PatternSet::compile(DEFAULT_BLOCKED_CODE_PATTERNS).unwrap();
        assert_eq!(endpoints.len(), DEFAULT_BLOCKED_ENDPOINT_PATTERNS.len());
        assert_eq!(code.len(), DEFAULT_BLOCKED_CODE_PATTERNS.len());
    }

    #[test]
    fn test_endpoint_match_is_case_insensitive() {
        let set = PatternSet::compile(DEFAULT_BLOCKED_ENDPOINT_PATTERNS).unwrap();
        let m = set
            .first_match("/Things/pump/Services/deletething")
            .unwrap();
        assert_eq!(m.pattern, r".*/Delete.*");
        assert!(set.first_match("/Things/pump/Services/EnableThing").is_none());
    }

    #[test]
    fn test_code_match_reports_matched_text() {
        let set = PatternSet::compile(DEFAULT_BLOCKED_CODE_PATTERNS).unwrap();
        let m = set
            .first_match("var x = 1; Resources[\"EntityServices\"].DeleteThing({name: 'x'});")
            .unwrap();
        assert_eq!(m.pattern, "DeleteThing");
        assert_eq!(m.excerpt, "DeleteThing");
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = PatternSet::compile(["(unclosed"]).unwrap_err();
        assert!(matches!(err, PolicyConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_long_excerpt_is_truncated() {
        let set = PatternSet::compile(["a+"]).unwrap();
        let m = set.first_match(&"a".repeat(200)).unwrap();
        assert_eq!(m.excerpt.len(), MAX_EXCERPT_LEN + 3);
    }

    #[test]
    fn test_identifiers() {
        for ok in ["demo-thing", "Calc_1", "a.b", "X"] {
            assert!(is_identifier(ok), "{ok}");
        }
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        for bad in ["", ".", "..", "a..b", "a/b", "a b", "a?x=1", "%2e", long.as_str()] {
            assert!(!is_identifier(bad), "{bad}");
        }
    }
}
