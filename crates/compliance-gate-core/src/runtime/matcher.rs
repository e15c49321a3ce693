// crates/compliance-gate-core/src/runtime/matcher.rs
// ============================================================================
// Module: Compliance Gate Matchers
// Description: Structural predicates over JSON values with failure diffs.
// Purpose: Decide pass/fail for one expectation and explain the first difference.
// Dependencies: crate::core, bigdecimal, regex, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Matchers are a tagged union over JSON value variants. Unsupported
//! combinations (for example `includes` on a number) are errors rather than
//! silent failures, so a misauthored expectation cannot pass by accident.
//! Numbers compare by decimal value; strings and numbers never coerce.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use regex::Regex;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::AttributeError;
use crate::core::ErrorKind;
use crate::core::EvaluationError;
use crate::core::ExpectedValue;
use crate::core::FailureDetail;
use crate::core::MatcherSpec;
use crate::core::ScopedAttributes;
use crate::core::Verdict;
use crate::core::path::describe_kind;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Matcher construction and evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Matcher does not apply to the value combination.
    #[error("{matcher} does not support {actual} actual with {expected} expected")]
    Unsupported {
        /// Matcher name.
        matcher: &'static str,
        /// Actual value kind.
        actual: &'static str,
        /// Expected value kind.
        expected: &'static str,
    },
    /// Regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    /// Expected value referenced an unresolvable attribute.
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

impl From<MatchError> for EvaluationError {
    fn from(value: MatchError) -> Self {
        match value {
            MatchError::Attribute(err) => err.into(),
            other => Self::new(ErrorKind::UnsupportedMatch, other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Matcher
// ============================================================================

/// Matcher with its expected operand resolved and pattern compiled.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Deep structural equality.
    Equals(Value),
    /// Negated deep structural equality.
    NotEquals(Value),
    /// Subset containment.
    Includes(Value),
    /// Negated subset containment.
    NotIncludes(Value),
    /// Mapping lacks the key.
    ExcludesKey(String),
    /// Membership in the expected list.
    OneOf(Value),
    /// Empty string, list, or mapping.
    IsEmpty,
    /// Non-empty string, list, or mapping.
    IsNotEmpty,
    /// JSON null.
    IsNil,
    /// String matches the pattern.
    MatchesPattern(Regex),
    /// String does not match the pattern.
    NotMatchesPattern(Regex),
}

impl Matcher {
    /// Resolves a declarative matcher against attribute scope.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] when an attribute reference or pattern is invalid.
    pub fn resolve(spec: &MatcherSpec, scope: &ScopedAttributes) -> Result<Self, MatchError> {
        let expected = |value: &ExpectedValue| -> Result<Value, MatchError> {
            match value {
                ExpectedValue::Literal(value) => Ok(value.clone()),
                ExpectedValue::Attribute(reference) => {
                    Ok(scope.resolve_path(&reference.attribute)?.clone())
                }
            }
        };
        Ok(match spec {
            MatcherSpec::Equals {
                expected: value,
            } => Self::Equals(expected(value)?),
            MatcherSpec::NotEquals {
                expected: value,
            } => Self::NotEquals(expected(value)?),
            MatcherSpec::Includes {
                expected: value,
            } => Self::Includes(expected(value)?),
            MatcherSpec::NotIncludes {
                expected: value,
            } => Self::NotIncludes(expected(value)?),
            MatcherSpec::OneOf {
                expected: value,
            } => Self::OneOf(expected(value)?),
            MatcherSpec::ExcludesKey {
                key,
            } => Self::ExcludesKey(key.clone()),
            MatcherSpec::IsEmpty => Self::IsEmpty,
            MatcherSpec::IsNotEmpty => Self::IsNotEmpty,
            MatcherSpec::IsNil => Self::IsNil,
            MatcherSpec::MatchesPattern {
                pattern,
            } => Self::MatchesPattern(compile(pattern)?),
            MatcherSpec::NotMatchesPattern {
                pattern,
            } => Self::NotMatchesPattern(compile(pattern)?),
        })
    }

    /// Returns the snake-case matcher name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Equals(_) => "equals",
            Self::NotEquals(_) => "not_equals",
            Self::Includes(_) => "includes",
            Self::NotIncludes(_) => "not_includes",
            Self::ExcludesKey(_) => "excludes_key",
            Self::OneOf(_) => "one_of",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::IsNil => "is_nil",
            Self::MatchesPattern(_) => "matches_pattern",
            Self::NotMatchesPattern(_) => "not_matches_pattern",
        }
    }

    /// Evaluates the matcher against an actual value.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Unsupported`] for unsupported value combinations.
    pub fn evaluate(&self, actual: &Value) -> Result<Verdict, MatchError> {
        match self {
            Self::Equals(expected) => Ok(match first_difference(actual, expected) {
                None => Verdict::Pass,
                Some(message) => fail(expected, actual, message),
            }),
            Self::NotEquals(expected) => Ok(if values_equal(actual, expected) {
                fail(expected, actual, "values are equal".to_string())
            } else {
                Verdict::Pass
            }),
            Self::Includes(expected) => self.includes(actual, expected),
            Self::NotIncludes(expected) => Ok(match self.includes(actual, expected)? {
                Verdict::Pass => fail(expected, actual, "value is included".to_string()),
                Verdict::Fail(_) => Verdict::Pass,
                error @ Verdict::Error(_) => error,
            }),
            Self::ExcludesKey(key) => self.excludes_key(actual, key),
            Self::OneOf(expected) => self.one_of(actual, expected),
            Self::IsEmpty => {
                let (len, expected) = self.sized(actual)?;
                if len == 0 {
                    return Ok(Verdict::Pass);
                }
                let message =
                    format!("expected empty {}, got {len} entries", describe_kind(actual));
                Ok(fail(&expected, actual, message))
            }
            Self::IsNotEmpty => {
                let (len, expected) = self.sized(actual)?;
                if len > 0 {
                    return Ok(Verdict::Pass);
                }
                let message = format!("expected non-empty {}", describe_kind(actual));
                Ok(fail(&json!({ "not": expected }), actual, message))
            }
            Self::IsNil => {
                if actual.is_null() {
                    return Ok(Verdict::Pass);
                }
                let message = format!("expected null, got {}", describe_kind(actual));
                Ok(fail(&Value::Null, actual, message))
            }
            Self::MatchesPattern(regex) => {
                let text = self.string_actual(actual, regex)?;
                if regex.is_match(text) {
                    return Ok(Verdict::Pass);
                }
                let message = "value does not match pattern".to_string();
                Ok(fail(&json!(regex.as_str()), actual, message))
            }
            Self::NotMatchesPattern(regex) => {
                let text = self.string_actual(actual, regex)?;
                if !regex.is_match(text) {
                    return Ok(Verdict::Pass);
                }
                Ok(fail(&json!(regex.as_str()), actual, "value matches pattern".to_string()))
            }
        }
    }

    /// Evaluates subset containment.
    fn includes(&self, actual: &Value, expected: &Value) -> Result<Verdict, MatchError> {
        match (actual, expected) {
            (Value::Object(actual_map), Value::Object(expected_map)) => {
                for (key, expected_value) in expected_map {
                    let Some(actual_value) = actual_map.get(key) else {
                        let message = format!("missing key {} at $", quote(key));
                        return Ok(fail(expected, actual, message));
                    };
                    let mut path = format!("${}", key_suffix(key));
                    if let Some(message) = diff(actual_value, expected_value, &mut path) {
                        return Ok(fail(expected, actual, message));
                    }
                }
                Ok(Verdict::Pass)
            }
            (Value::Array(actual_items), Value::Array(expected_items)) => {
                for (index, item) in expected_items.iter().enumerate() {
                    if !actual_items.iter().any(|candidate| values_equal(candidate, item)) {
                        return Ok(fail(
                            expected,
                            actual,
                            format!("expected element [{index}] ({item}) not found in list"),
                        ));
                    }
                }
                Ok(Verdict::Pass)
            }
            (Value::String(haystack), Value::String(needle)) => {
                if haystack.contains(needle.as_str()) {
                    Ok(Verdict::Pass)
                } else {
                    let message = format!("substring {} not found", quote(needle));
                    Ok(fail(expected, actual, message))
                }
            }
            _ => Err(self.unsupported(actual, expected)),
        }
    }

    /// Evaluates key absence.
    fn excludes_key(&self, actual: &Value, key: &str) -> Result<Verdict, MatchError> {
        let Value::Object(map) = actual else {
            return Err(self.unsupported(actual, &Value::String(key.to_string())));
        };
        Ok(match map.get(key) {
            None => Verdict::Pass,
            Some(present) => fail(
                &json!({ "absent_key": key }),
                present,
                format!("key {} is present at $", quote(key)),
            ),
        })
    }

    /// Evaluates set membership.
    fn one_of(&self, actual: &Value, expected: &Value) -> Result<Verdict, MatchError> {
        let Value::Array(allowed) = expected else {
            return Err(self.unsupported(actual, expected));
        };
        if allowed.iter().any(|candidate| values_equal(actual, candidate)) {
            return Ok(Verdict::Pass);
        }
        let message = format!("value {actual} is not one of {} allowed values", allowed.len());
        Ok(fail(expected, actual, message))
    }

    /// Returns the entry count of a sized value with the empty value of its kind.
    fn sized(&self, actual: &Value) -> Result<(usize, Value), MatchError> {
        match actual {
            Value::String(text) => Ok((text.chars().count(), json!(""))),
            Value::Array(items) => Ok((items.len(), json!([]))),
            Value::Object(map) => Ok((map.len(), Value::Object(Map::new()))),
            _ => Err(self.unsupported(actual, &Value::Null)),
        }
    }

    /// Extracts a string actual for pattern matchers.
    fn string_actual<'a>(&self, actual: &'a Value, regex: &Regex) -> Result<&'a str, MatchError> {
        actual.as_str().ok_or_else(|| self.unsupported(actual, &json!(regex.as_str())))
    }

    /// Builds an unsupported-combination error.
    fn unsupported(&self, actual: &Value, expected: &Value) -> MatchError {
        MatchError::Unsupported {
            matcher: self.name(),
            actual: describe_kind(actual),
            expected: describe_kind(expected),
        }
    }
}

/// Compiles a pattern.
fn compile(pattern: &str) -> Result<Regex, MatchError> {
    Regex::new(pattern).map_err(|err| MatchError::InvalidPattern(err.to_string()))
}

/// Builds a failing verdict.
fn fail(expected: &Value, actual: &Value, message: String) -> Verdict {
    Verdict::Fail(FailureDetail {
        expected: expected.clone(),
        actual: actual.clone(),
        message,
    })
}

// ============================================================================
// SECTION: Deep Equality
// ============================================================================

/// Returns true when two values are structurally equal.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    first_difference(left, right).is_none()
}

/// Describes the first structural difference between actual and expected.
#[must_use]
pub fn first_difference(actual: &Value, expected: &Value) -> Option<String> {
    let mut path = "$".to_string();
    diff(actual, expected, &mut path)
}

/// Recursive difference search; `path` names the current position.
fn diff(actual: &Value, expected: &Value, path: &mut String) -> Option<String> {
    match (actual, expected) {
        (Value::Null, Value::Null) => None,
        (Value::Bool(left), Value::Bool(right)) => (left != right)
            .then(|| format!("value mismatch at {path}: expected {right}, got {left}")),
        (Value::String(left), Value::String(right)) => (left != right).then(|| {
            format!("value mismatch at {path}: expected {}, got {}", quote(right), quote(left))
        }),
        (Value::Number(left), Value::Number(right)) => (!numbers_equal(left, right))
            .then(|| format!("value mismatch at {path}: expected {right}, got {left}")),
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                return Some(format!(
                    "list length mismatch at {path}: expected {} elements, got {}",
                    right.len(),
                    left.len()
                ));
            }
            for (index, (left_item, right_item)) in left.iter().zip(right).enumerate() {
                let restore = path.len();
                let _ = write!(path, "[{index}]");
                let found = diff(left_item, right_item, path);
                path.truncate(restore);
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        (Value::Object(left), Value::Object(right)) => {
            if let Some(key) = right.keys().find(|key| !left.contains_key(*key)) {
                return Some(format!("missing key {} at {path}", quote(key)));
            }
            if let Some(key) = left.keys().find(|key| !right.contains_key(*key)) {
                return Some(format!("unexpected key {} at {path}", quote(key)));
            }
            for (key, right_value) in right {
                let Some(left_value) = left.get(key) else {
                    continue;
                };
                let restore = path.len();
                path.push_str(&key_suffix(key));
                let found = diff(left_value, right_value, path);
                path.truncate(restore);
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        _ => Some(format!(
            "type mismatch at {path}: expected {}, got {}",
            describe_kind(expected),
            describe_kind(actual)
        )),
    }
}

/// Compares numbers by decimal value, falling back to exact equality.
fn numbers_equal(left: &Number, right: &Number) -> bool {
    match (decimal_from_number(left), decimal_from_number(right)) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
}

/// Renders a mapping key as a path suffix.
fn key_suffix(key: &str) -> String {
    let plain = !key.is_empty()
        && key.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if plain { format!(".{key}") } else { format!("[{}]", quote(key)) }
}

/// Quotes text as a JSON string.
fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
