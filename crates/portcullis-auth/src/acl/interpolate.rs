//! Identity-attribute interpolation for ACL predicate templates.
//!
//! A predicate template may reference attributes of the authenticated caller
//! with prefixed tokens such as `@user.tenant` or `@user.org.unit`. Before a
//! predicate is parsed, every such token is rewritten to a quoted string
//! literal holding the attribute's value, so the evaluator only ever sees
//! grammar-valid input.
//!
//! Interpolation fails closed: a missing or non-scalar attribute is a hard
//! error, never a silent empty substitution. Substituted values are escaped so
//! attribute content can never inject predicate grammar.

use serde_json::Value;
use thiserror::Error;

use portcullis_core::Identity;

/// Default prefix marking identity-attribute tokens in predicate templates.
pub const DEFAULT_IDENTITY_PREFIX: &str = "@user.";

/// Errors raised while interpolating a predicate template.
#[derive(Debug, Error)]
pub enum InterpolationError {
    /// The referenced attribute does not exist (or is null) in the identity
    /// payload.
    #[error("identity attribute '{attribute}' is not present")]
    MissingAttribute {
        /// The dotted attribute path that failed to resolve.
        attribute: String,
    },

    /// The referenced attribute is not a scalar and cannot appear in a
    /// predicate.
    #[error("identity attribute '{attribute}' is not a scalar value")]
    UnsupportedValue {
        /// The dotted attribute path with the unusable value.
        attribute: String,
    },
}

/// Substitute every `<prefix><dotted-name>` token in `template` with the
/// corresponding identity attribute, rendered as a quoted literal.
///
/// The output is a plain string ready for [`Predicate::parse`]; it must not
/// be cached across identities since attribute values differ per caller.
///
/// [`Predicate::parse`]: crate::acl::Predicate::parse
pub fn interpolate(
    template: &str,
    identity_prefix: &str,
    identity: &Identity,
) -> Result<String, InterpolationError> {
    rewrite_tokens(template, identity_prefix, |attribute| {
        let value =
            identity
                .claim_at(attribute)
                .ok_or_else(|| InterpolationError::MissingAttribute {
                    attribute: attribute.to_string(),
                })?;

        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            // Null fails closed like a missing attribute; containers cannot
            // appear in a predicate at all.
            Value::Null => {
                return Err(InterpolationError::MissingAttribute {
                    attribute: attribute.to_string(),
                });
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(InterpolationError::UnsupportedValue {
                    attribute: attribute.to_string(),
                });
            }
        };

        Ok(quote(&rendered))
    })
}

/// `true` when the template contains at least one identity-attribute token.
///
/// Rules referencing identity attributes can never apply to an anonymous
/// caller; the authorizer uses this to skip them without interpolating.
pub fn references_identity(template: &str, identity_prefix: &str) -> bool {
    let mut found = false;
    // The resolver is never called when no token exists; flag any hit.
    let _ = rewrite_tokens(template, identity_prefix, |_| {
        found = true;
        Ok(String::new())
    });
    found
}

/// Rewrite every token with a placeholder literal, for load-time syntax
/// validation of templates whose real values are only known per identity.
pub fn interpolate_placeholder(template: &str, identity_prefix: &str) -> String {
    match rewrite_tokens(template, identity_prefix, |_| Ok(quote("_"))) {
        Ok(rewritten) => rewritten,
        // The placeholder resolver is infallible.
        Err(_) => template.to_string(),
    }
}

/// Scan for `<prefix><dotted-name>` tokens and replace each with the
/// resolver's output.
fn rewrite_tokens(
    template: &str,
    prefix: &str,
    mut resolve: impl FnMut(&str) -> Result<String, InterpolationError>,
) -> Result<String, InterpolationError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(prefix) {
        output.push_str(&rest[..start]);
        let after_prefix = &rest[start + prefix.len()..];

        let name_len = attribute_name_length(after_prefix);
        if name_len == 0 {
            // A bare prefix with no attribute name is left as-is; the parser
            // will reject it.
            output.push_str(prefix);
            rest = after_prefix;
            continue;
        }

        let attribute = &after_prefix[..name_len];
        output.push_str(&resolve(attribute)?);
        rest = &after_prefix[name_len..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Length of the longest dotted attribute name at the start of `input`.
///
/// Name characters are alphanumerics, `_` and `-`; dots join segments but a
/// trailing dot is not consumed (so `@user.tenant)` resolves `tenant`).
fn attribute_name_length(input: &str) -> usize {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';

    let mut len = 0;
    for (idx, c) in input.char_indices() {
        if is_name_char(c) || c == '.' {
            len = idx + c.len_utf8();
        } else {
            break;
        }
    }

    while input[..len].ends_with('.') {
        len -= 1;
    }

    len
}

/// Render a value as a single-quoted predicate string literal.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity_with(claims: Value) -> Identity {
        Identity::new("alice", vec!["user".into()], claims)
    }

    // -------------------------------------------------------------------------
    // Substitution Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_round_trip_substitution() {
        let identity = identity_with(json!({"tenant": "acme"}));
        let out = interpolate(
            "equals(@user.tenant, ${tenant})",
            DEFAULT_IDENTITY_PREFIX,
            &identity,
        )
        .unwrap();

        assert!(out.contains("'acme'"));
        assert!(!out.contains("@user.tenant"));
        // Evaluation-time references are not interpolation tokens.
        assert!(out.contains("${tenant}"));
        assert_eq!(out, "equals('acme', ${tenant})");
    }

    #[test]
    fn test_nested_attribute() {
        let identity = identity_with(json!({"org": {"unit": "research"}}));
        let out = interpolate("equals(@user.org.unit, 'research')", "@user.", &identity).unwrap();
        assert_eq!(out, "equals('research', 'research')");
    }

    #[test]
    fn test_numeric_and_boolean_values() {
        let identity = identity_with(json!({"level": 3, "active": true}));
        let out = interpolate(
            "equals(@user.level, '3') and equals(@user.active, 'true')",
            "@user.",
            &identity,
        )
        .unwrap();
        assert_eq!(out, "equals('3', '3') and equals('true', 'true')");
    }

    #[test]
    fn test_token_followed_by_delimiter() {
        let identity = identity_with(json!({"tenant": "acme"}));
        let out = interpolate("equals(@user.tenant,'x')", "@user.", &identity).unwrap();
        assert_eq!(out, "equals('acme','x')");
    }

    // -------------------------------------------------------------------------
    // Fail-Closed Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_missing_attribute_is_hard_error() {
        let identity = identity_with(json!({"other": "x"}));
        let err = interpolate("equals(@user.tenant, 'a')", "@user.", &identity).unwrap_err();
        assert!(matches!(
            err,
            InterpolationError::MissingAttribute { ref attribute } if attribute == "tenant"
        ));
    }

    #[test]
    fn test_null_attribute_is_hard_error() {
        let identity = identity_with(json!({"tenant": null}));
        let err = interpolate("equals(@user.tenant, 'a')", "@user.", &identity).unwrap_err();
        assert!(matches!(err, InterpolationError::MissingAttribute { .. }));
    }

    #[test]
    fn test_container_attribute_is_unsupported() {
        let identity = identity_with(json!({"tenant": {"id": "acme"}}));
        let err = interpolate("equals(@user.tenant, 'a')", "@user.", &identity).unwrap_err();
        assert!(matches!(err, InterpolationError::UnsupportedValue { .. }));
    }

    // -------------------------------------------------------------------------
    // Escaping Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_grammar_metacharacters_are_escaped() {
        // A value trying to smuggle grammar stays inside its literal.
        let identity = identity_with(json!({"tenant": "a') or equals('x', 'x"}));
        let out = interpolate("equals(@user.tenant, 'a')", "@user.", &identity).unwrap();
        assert_eq!(out, r"equals('a\') or equals(\'x\', \'x', 'a')");
    }

    // -------------------------------------------------------------------------
    // Helper Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_references_identity() {
        assert!(references_identity("equals(@user.tenant, 'a')", "@user."));
        assert!(!references_identity("path-template('/ping')", "@user."));
    }

    #[test]
    fn test_placeholder_rewrite() {
        let out = interpolate_placeholder("equals(@user.tenant, ${tenant})", "@user.");
        assert_eq!(out, "equals('_', ${tenant})");
    }
}
