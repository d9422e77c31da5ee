//! Path template parsing and structural matching.
//!
//! A template is a `/`-separated sequence of literal segments, `{name}`
//! variables (each binding exactly one segment) and an optional trailing
//! `{*}` wildcard binding the entire remaining suffix, separators included.
//!
//! Two match modes exist, selected by a unit's [`MatchPolicy`]:
//! - [`PathTemplate::matches`] requires the whole path to align with the
//!   template (the wildcard still consumes one or more trailing segments);
//! - [`PathTemplate::matches_prefix`] lets the template consume the leading
//!   segments only, binding any remainder to the wildcard variable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name under which a wildcard match (`{*}` or a prefix remainder) is bound.
pub const WILDCARD_VARIABLE: &str = "*";

/// How a pipeline unit's path template is matched against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// The template must match the full path.
    Exact,
    /// The template must match a leading portion of the path.
    Prefix,
}

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Wildcard,
}

/// Variable bindings produced by a successful template match.
///
/// Insertion order follows segment order, with the wildcard last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    bindings: IndexMap<String, String>,
}

impl PathMatch {
    /// Look up a bound variable, including the wildcard under
    /// [`WILDCARD_VARIABLE`].
    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// `true` when the match bound no variables.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Iterate bindings in segment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template.
    ///
    /// Rules: must start with `/`; `{name}` variables must be non-empty and
    /// unique; `{*}` may only appear as the last segment; empty inner
    /// segments are rejected.
    pub fn parse(template: &str) -> Result<Self, CoreError> {
        if !template.starts_with('/') {
            return Err(CoreError::invalid_path_template(
                template,
                "must start with '/'",
            ));
        }

        let mut segments = Vec::new();
        let mut seen_variables: Vec<&str> = Vec::new();

        let trimmed = template.trim_start_matches('/').trim_end_matches('/');
        let raw_segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        for (index, part) in raw_segments.iter().enumerate() {
            if part.is_empty() {
                return Err(CoreError::invalid_path_template(
                    template,
                    "empty path segment",
                ));
            }

            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name == WILDCARD_VARIABLE {
                    if index != raw_segments.len() - 1 {
                        return Err(CoreError::invalid_path_template(
                            template,
                            "wildcard must be the last segment",
                        ));
                    }
                    segments.push(Segment::Wildcard);
                } else if name.is_empty() {
                    return Err(CoreError::invalid_path_template(
                        template,
                        "empty variable name",
                    ));
                } else if seen_variables.contains(&name) {
                    return Err(CoreError::invalid_path_template(
                        template,
                        format!("duplicate variable '{name}'"),
                    ));
                } else {
                    seen_variables.push(name);
                    segments.push(Segment::Variable(name.to_string()));
                }
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// The template source text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` when the template contains no variables and no wildcard.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Match the full path against this template.
    ///
    /// The wildcard, if present, must consume at least one segment and binds
    /// the whole remaining suffix (separators included).
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        self.match_segments(path, false)
    }

    /// Match the leading segments of the path against this template.
    ///
    /// Path segments beyond the template are allowed and bound to
    /// [`WILDCARD_VARIABLE`] when present.
    pub fn matches_prefix(&self, path: &str) -> Option<PathMatch> {
        self.match_segments(path, true)
    }

    /// Match under the given policy.
    pub fn matches_with_policy(&self, policy: MatchPolicy, path: &str) -> Option<PathMatch> {
        match policy {
            MatchPolicy::Exact => self.matches(path),
            MatchPolicy::Prefix => self.matches_prefix(path),
        }
    }

    /// Specificity key for choosing among several matching templates:
    /// more literal segments win, then more total segments.
    pub fn specificity(&self) -> (usize, usize) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        (literals, self.segments.len())
    }

    /// `true` when two templates accept the same set of paths: same segment
    /// count, same kinds per position, equal literals.
    ///
    /// Used to reject ambiguous service registrations at startup.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Variable(_), Segment::Variable(_)) => true,
                    (Segment::Wildcard, Segment::Wildcard) => true,
                    _ => false,
                })
    }

    fn match_segments(&self, path: &str, prefix: bool) -> Option<PathMatch> {
        if !path.starts_with('/') {
            return None;
        }

        let path_segments: Vec<&str> = split_segments(path).collect();
        let mut result = PathMatch::default();
        let mut consumed = 0usize;

        for segment in &self.segments {
            match segment {
                Segment::Literal(expected) => {
                    if path_segments.get(consumed) != Some(&expected.as_str()) {
                        return None;
                    }
                    consumed += 1;
                }
                Segment::Variable(name) => {
                    let value = path_segments.get(consumed)?;
                    result.insert(name.clone(), *value);
                    consumed += 1;
                }
                Segment::Wildcard => {
                    // One-or-more trailing segments, joined back with '/'.
                    if consumed >= path_segments.len() {
                        return None;
                    }
                    result.insert(WILDCARD_VARIABLE, path_segments[consumed..].join("/"));
                    consumed = path_segments.len();
                }
            }
        }

        if consumed < path_segments.len() {
            if !prefix {
                return None;
            }
            result.insert(WILDCARD_VARIABLE, path_segments[consumed..].join("/"));
        }

        Some(result)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Parsing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_rejects_relative() {
        assert!(PathTemplate::parse("ping").is_err());
    }

    #[test]
    fn test_parse_rejects_inner_wildcard() {
        assert!(PathTemplate::parse("/{*}/coll").is_err());
    }

    #[test]
    fn test_parse_rejects_duplicate_variable() {
        assert!(PathTemplate::parse("/{a}/{a}").is_err());
    }

    #[test]
    fn test_parse_root() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.is_literal());
        assert!(t.matches("/").is_some());
        assert!(t.matches("/x").is_none());
        assert!(t.matches_prefix("/x/y").is_some());
    }

    // -------------------------------------------------------------------------
    // Exact Matching Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_literal_match() {
        let t = PathTemplate::parse("/ping").unwrap();
        assert!(t.matches("/ping").is_some());
        assert!(t.matches("/ping/").is_some());
        assert!(t.matches("/pong").is_none());
        assert!(t.matches("/ping/extra").is_none());
    }

    #[test]
    fn test_variable_binding() {
        let t = PathTemplate::parse("/{tenant}/coll").unwrap();
        let m = t.matches("/softinstigate/coll").unwrap();
        assert_eq!(m.get("tenant"), Some("softinstigate"));
        assert!(t.matches("/softinstigate/other").is_none());
        assert!(t.matches("/softinstigate").is_none());
    }

    #[test]
    fn test_wildcard_captures_full_suffix() {
        // The wildcard binds the whole remainder, separators included.
        let t = PathTemplate::parse("/{serviceName}/{*}").unwrap();
        let m = t.matches("/metrics/{tenant}/ping").unwrap();
        assert_eq!(m.get("serviceName"), Some("metrics"));
        assert_eq!(m.get(WILDCARD_VARIABLE), Some("{tenant}/ping"));
    }

    #[test]
    fn test_wildcard_requires_one_segment() {
        let t = PathTemplate::parse("/files/{*}").unwrap();
        assert!(t.matches("/files").is_none());
        assert_eq!(
            t.matches("/files/a").unwrap().get(WILDCARD_VARIABLE),
            Some("a")
        );
    }

    // -------------------------------------------------------------------------
    // Prefix Matching Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_prefix_match_binds_remainder() {
        let t = PathTemplate::parse("/echo").unwrap();
        assert!(t.matches_prefix("/echo").unwrap().is_empty());
        let m = t.matches_prefix("/echo/a/b").unwrap();
        assert_eq!(m.get(WILDCARD_VARIABLE), Some("a/b"));
        assert!(t.matches_prefix("/other/echo").is_none());
    }

    #[test]
    fn test_prefix_match_with_variables() {
        let t = PathTemplate::parse("/db/{coll}").unwrap();
        let m = t.matches_prefix("/db/users/42").unwrap();
        assert_eq!(m.get("coll"), Some("users"));
        assert_eq!(m.get(WILDCARD_VARIABLE), Some("42"));
    }

    // -------------------------------------------------------------------------
    // Specificity and Equivalence Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_specificity_prefers_literals() {
        let literal = PathTemplate::parse("/echo/x").unwrap();
        let templated = PathTemplate::parse("/{a}/{b}").unwrap();
        assert!(literal.specificity() > templated.specificity());
    }

    #[test]
    fn test_equivalence_ignores_variable_names() {
        let a = PathTemplate::parse("/{x}/coll").unwrap();
        let b = PathTemplate::parse("/{y}/coll").unwrap();
        let c = PathTemplate::parse("/{y}/other").unwrap();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
    }
}
