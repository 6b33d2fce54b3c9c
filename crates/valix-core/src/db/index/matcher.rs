//! Module: index::matcher
//! Responsibility: compile match expressions and derive literal scan prefixes.
//! Does not own: index scanning.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use derive_more::Display;
use regex::{Regex, RegexBuilder};
use std::ops::BitOr;
use thiserror::Error as ThisError;

///
/// MatchSyntax
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum MatchSyntax {
    /// Regular expression, matched anywhere in the term unless anchored.
    #[default]
    #[display("regex")]
    Regex,

    /// `*` matches any run of characters, `?` exactly one; the whole term
    /// must match.
    #[display("wildcard")]
    Wildcard,
}

///
/// MatchFlags
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MatchFlags(u8);

impl MatchFlags {
    pub const NONE: Self = Self(0);
    pub const CASE_INSENSITIVE: Self = Self(1);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MatchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

///
/// MatchError
///

#[derive(Debug, ThisError)]
pub enum MatchError {
    #[error("invalid {syntax} expression '{expr}': {source}")]
    InvalidExpression {
        syntax: MatchSyntax,
        expr: String,
        source: regex::Error,
    },
}

impl From<MatchError> for InternalError {
    fn from(err: MatchError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Query, err.to_string())
    }
}

///
/// TermMatcher
///

#[derive(Clone, Debug)]
pub struct TermMatcher {
    regex: Regex,
}

impl TermMatcher {
    pub fn new(expr: &str, syntax: MatchSyntax, flags: MatchFlags) -> Result<Self, MatchError> {
        let pattern = match syntax {
            MatchSyntax::Regex => expr.to_string(),
            MatchSyntax::Wildcard => wildcard_to_regex(expr),
        };

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(flags.contains(MatchFlags::CASE_INSENSITIVE))
            .build()
            .map_err(|source| MatchError::InvalidExpression {
                syntax,
                expr: expr.to_string(),
                source,
            })?;

        Ok(Self { regex })
    }

    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        self.regex.is_match(term)
    }
}

/// Literal run of letters and digits every matching term must start with.
///
/// Regexes only yield one when anchored with `^`; wildcards are always
/// anchored, so their leading literal qualifies directly. Top-level
/// alternation is not inspected: `^abc|xyz` narrows to `abc`, and terms
/// matching only the `xyz` branch are outside the scanned range.
#[must_use]
pub fn start_term(expr: &str, syntax: MatchSyntax) -> Option<&str> {
    let rest = match syntax {
        MatchSyntax::Regex => expr.strip_prefix('^')?,
        MatchSyntax::Wildcard => expr,
    };

    let end = rest
        .char_indices()
        .find(|(_, ch)| !ch.is_alphanumeric())
        .map_or(rest.len(), |(index, _)| index);

    // A regex quantifier binds to the last literal char, so that char
    // is optional and cannot be part of the prefix.
    let end = match (syntax, rest[end..].chars().next()) {
        (MatchSyntax::Regex, Some('?' | '*' | '{')) => rest[..end]
            .char_indices()
            .next_back()
            .map_or(0, |(index, _)| index),
        _ => end,
    };

    (end > 0).then(|| &rest[..end])
}

fn wildcard_to_regex(expr: &str) -> String {
    let mut pattern = String::with_capacity(expr.len() + 8);
    pattern.push('^');

    for ch in expr.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4]))),
        }
    }

    pattern.push('$');
    pattern
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{MatchFlags, MatchSyntax, TermMatcher, start_term};

    #[test]
    fn regex_start_term_requires_anchor() {
        assert_eq!(start_term("^abc.*", MatchSyntax::Regex), Some("abc"));
        assert_eq!(start_term("^ab9[xy]", MatchSyntax::Regex), Some("ab9"));
        assert_eq!(start_term("abc.*", MatchSyntax::Regex), None);
        assert_eq!(start_term("^.*", MatchSyntax::Regex), None);
    }

    #[test]
    fn regex_start_term_excludes_quantified_char() {
        assert_eq!(start_term("^abc?d", MatchSyntax::Regex), Some("ab"));
        assert_eq!(start_term("^a*", MatchSyntax::Regex), None);
    }

    #[test]
    fn regex_start_term_takes_first_alternative_only() {
        assert_eq!(start_term("^abc|xyz", MatchSyntax::Regex), Some("abc"));
    }

    #[test]
    fn wildcard_start_term_is_leading_literal() {
        assert_eq!(start_term("prog*", MatchSyntax::Wildcard), Some("prog"));
        assert_eq!(start_term("?rog", MatchSyntax::Wildcard), None);
    }

    #[test]
    fn wildcard_matches_whole_term() {
        let matcher =
            TermMatcher::new("h?llo*", MatchSyntax::Wildcard, MatchFlags::NONE).expect("compile");

        assert!(matcher.matches("hello"));
        assert!(matcher.matches("hallo world"));
        assert!(!matcher.matches("say hello"));
        assert!(!matcher.matches("HELLO"));
    }

    #[test]
    fn wildcard_escapes_regex_metacharacters() {
        let matcher =
            TermMatcher::new("a.b*", MatchSyntax::Wildcard, MatchFlags::NONE).expect("compile");

        assert!(matcher.matches("a.bc"));
        assert!(!matcher.matches("axbc"));
    }

    #[test]
    fn case_insensitive_flag_applies() {
        let matcher = TermMatcher::new("^hel", MatchSyntax::Regex, MatchFlags::CASE_INSENSITIVE)
            .expect("compile");

        assert!(matcher.matches("HELLO"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = TermMatcher::new("(", MatchSyntax::Regex, MatchFlags::NONE).expect_err("invalid");

        assert!(err.to_string().contains("invalid regex expression"));
    }
}
