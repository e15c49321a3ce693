// crates/compliance-gate-core/src/core/path.rs
// ============================================================================
// Module: Compliance Gate Field Paths
// Description: Parsing and structural lookup of dotted/bracketed field paths.
// Purpose: Index into attribute values and parsed command output deterministically.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Field paths address nested values, for example
//! `peerings[key].local_network_peering.network`, `items[0].name`, or
//! `labels["app.kubernetes.io/name"]`. Paths are parsed once at suite
//! validation time and applied structurally; no expression evaluation is
//! performed.
//!
//! Bracketed integers index lists. When the container is a mapping, the same
//! selector is treated as a string key so numeric map keys stay addressable.
//!
//! A filter selector `[?field==operand]` picks the first list element whose
//! `field` equals the operand, for example `peerings[?name=="hub-to-spoke"]`.
//! Operands are quoted strings, bare JSON scalars, or `${path}` references to
//! attributes and iteration bindings. References are bound with
//! [`FieldPath::bind_operands`] before lookup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Path Segments
// ============================================================================

/// One segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Dotted field name, resolved against a mapping.
    Field(String),
    /// Bracketed key, resolved against a mapping.
    Key(String),
    /// Bracketed integer, resolved against a list (or a mapping key).
    Index(usize),
    /// First list element whose `field` equals `operand`.
    Filter {
        /// Path applied to each element.
        field: FieldPath,
        /// Value the field must equal.
        operand: FilterOperand,
    },
}

impl PathSegment {
    /// Returns the mapping key this segment selects, when it can select one.
    fn as_key(&self) -> Option<String> {
        match self {
            Self::Field(name) | Self::Key(name) => Some(name.clone()),
            Self::Index(index) => Some(index.to_string()),
            Self::Filter { .. } => None,
        }
    }
}

/// Right-hand side of a filter selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOperand {
    /// Literal JSON value.
    Literal(Value),
    /// Attribute reference written `${path}`, replaced before lookup.
    Attribute(FieldPath),
}

impl fmt::Display for FilterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Attribute(path) => write!(f, "${{{path}}}"),
        }
    }
}

// ============================================================================
// SECTION: Field Path
// ============================================================================

/// Parsed field path.
///
/// # Invariants
/// - Contains at least one segment.
/// - Field and key segments are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    /// Parsed segments in traversal order.
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parses a textual field path.
    ///
    /// # Errors
    ///
    /// Returns [`PathParseError`] when the path is empty or malformed.
    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        let segments = Parser::new(input).parse()?;
        Ok(Self {
            segments,
        })
    }

    /// Builds a single-segment path naming a root field.
    ///
    /// # Errors
    ///
    /// Returns [`PathParseError::Empty`] when the name is empty.
    pub fn root(name: impl Into<String>) -> Result<Self, PathParseError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PathParseError::Empty);
        }
        Ok(Self {
            segments: vec![PathSegment::Field(name)],
        })
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the root field name when the path starts with a field segment.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Returns the segments after the root segment.
    #[must_use]
    pub fn tail(&self) -> &[PathSegment] {
        self.segments.get(1 ..).unwrap_or_default()
    }

    /// Looks up this path inside a JSON value, starting at the first segment.
    ///
    /// # Errors
    ///
    /// Returns [`PathLookupError`] when a segment cannot be resolved.
    pub fn lookup<'a>(&self, root: &'a Value) -> Result<&'a Value, PathLookupError> {
        lookup_segments(root, &self.segments)
    }

    /// Replaces every `${path}` filter operand with the value `resolve` returns for it.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `resolve`.
    pub fn bind_operands<E, F>(&self, mut resolve: F) -> Result<Self, E>
    where
        F: FnMut(&Self) -> Result<Value, E>,
    {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Filter {
                    field,
                    operand: FilterOperand::Attribute(reference),
                } => Ok(PathSegment::Filter {
                    field: field.clone(),
                    operand: FilterOperand::Literal(resolve(reference)?),
                }),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            segments,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if index == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Key(key) => write!(f, "[{}]", Value::String(key.clone()))?,
                PathSegment::Index(value) => write!(f, "[{value}]")?,
                PathSegment::Filter {
                    field,
                    operand,
                } => write!(f, "[?{field}=={operand}]")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Resolves a sequence of segments against a JSON value.
///
/// # Errors
///
/// Returns [`PathLookupError`] naming the first segment that failed.
pub fn lookup_segments<'a>(
    root: &'a Value,
    segments: &[PathSegment],
) -> Result<&'a Value, PathLookupError> {
    let mut current = root;
    for (position, segment) in segments.iter().enumerate() {
        current = match (current, segment) {
            (Value::Array(items), PathSegment::Index(index)) => {
                items.get(*index).ok_or_else(|| PathLookupError {
                    position,
                    reason: format!("index {index} out of bounds for list of {}", items.len()),
                })?
            }
            (
                Value::Array(items),
                PathSegment::Filter {
                    field,
                    operand,
                },
            ) => select(items, field, operand).map_err(|reason| PathLookupError {
                position,
                reason,
            })?,
            (Value::Object(map), segment) => {
                let Some(key) = segment.as_key() else {
                    return Err(PathLookupError {
                        position,
                        reason: "cannot filter a mapping".to_string(),
                    });
                };
                map.get(&key).ok_or_else(|| PathLookupError {
                    position,
                    reason: format!("key {} not present", Value::String(key.clone())),
                })?
            }
            (Value::Array(_), segment) => {
                return Err(PathLookupError {
                    position,
                    reason: format!(
                        "cannot select key {} from a list",
                        Value::String(segment.as_key().unwrap_or_default())
                    ),
                });
            }
            (other, _) => {
                return Err(PathLookupError {
                    position,
                    reason: format!("cannot index into {}", describe_kind(other)),
                });
            }
        };
    }
    Ok(current)
}

/// Returns the first element whose `field` equals the bound operand.
fn select<'a>(
    items: &'a [Value],
    field: &FieldPath,
    operand: &FilterOperand,
) -> Result<&'a Value, String> {
    let FilterOperand::Literal(expected) = operand else {
        return Err(format!("filter operand {operand} is not bound"));
    };
    items
        .iter()
        .find(|item| {
            lookup_segments(item, field.segments())
                .is_ok_and(|found| filter_values_equal(found, expected))
        })
        .ok_or_else(|| {
            format!("none of {} elements has {field} == {expected}", items.len())
        })
}

/// Compares filter values, treating `1` and `1.0` as equal.
fn filter_values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            left == right
                || left
                    .as_f64()
                    .zip(right.as_f64())
                    .is_some_and(|(left, right)| (left - right).abs() < f64::EPSILON)
        }
        _ => left == right,
    }
}

/// Returns a short human-readable label for a JSON value kind.
#[must_use]
pub const fn describe_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Field path parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// Path text was empty.
    #[error("field path is empty")]
    Empty,
    /// A field or key segment was empty.
    #[error("empty path segment at offset {0}")]
    EmptySegment(usize),
    /// A bracket was opened but never closed.
    #[error("unterminated bracket starting at offset {0}")]
    UnterminatedBracket(usize),
    /// A quoted key was opened but never closed.
    #[error("unterminated quoted key starting at offset {0}")]
    UnterminatedQuote(usize),
    /// Unexpected character in the path.
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
}

/// Field path lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("segment {position}: {reason}")]
pub struct PathLookupError {
    /// Zero-based segment position that failed.
    pub position: usize,
    /// Human-readable failure reason.
    pub reason: String,
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Hand-written parser for the field path grammar.
struct Parser<'a> {
    /// Input characters with byte offsets.
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the input text.
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    /// Parses the whole input into segments.
    fn parse(mut self) -> Result<Vec<PathSegment>, PathParseError> {
        let mut segments = Vec::new();
        match self.chars.peek() {
            None => return Err(PathParseError::Empty),
            Some((_, '[')) => {}
            Some((offset, _)) => {
                let offset = *offset;
                segments.push(PathSegment::Field(self.ident(offset)?));
            }
        }
        while let Some((offset, ch)) = self.chars.next() {
            match ch {
                '.' => {
                    let start = offset + 1;
                    segments.push(PathSegment::Field(self.ident(start)?));
                }
                '[' => segments.push(self.bracket(offset)?),
                other => return Err(PathParseError::UnexpectedChar(other, offset)),
            }
        }
        Ok(segments)
    }

    /// Parses a dotted identifier.
    fn ident(&mut self, start: usize) -> Result<String, PathParseError> {
        let mut out = String::new();
        while let Some((offset, ch)) = self.chars.peek().copied() {
            if ch == '.' || ch == '[' {
                break;
            }
            if ch == ']' || ch.is_whitespace() {
                return Err(PathParseError::UnexpectedChar(ch, offset));
            }
            out.push(ch);
            self.chars.next();
        }
        if out.is_empty() {
            return Err(PathParseError::EmptySegment(start));
        }
        Ok(out)
    }

    /// Parses a bracketed selector; the opening bracket was consumed.
    fn bracket(&mut self, open: usize) -> Result<PathSegment, PathParseError> {
        let segment = match self.chars.peek().copied() {
            Some((_, '?')) => {
                self.chars.next();
                self.filter(open)?
            }
            Some((offset, quote @ ('"' | '\''))) => {
                self.chars.next();
                let key = self.quoted(quote, offset)?;
                PathSegment::Key(key)
            }
            Some(_) => {
                let mut raw = String::new();
                while let Some((_, ch)) = self.chars.peek().copied() {
                    if ch == ']' {
                        break;
                    }
                    raw.push(ch);
                    self.chars.next();
                }
                let raw = raw.trim().to_string();
                if raw.is_empty() {
                    return Err(PathParseError::EmptySegment(open + 1));
                }
                if raw.bytes().all(|byte| byte.is_ascii_digit()) {
                    raw.parse::<usize>().map_or(PathSegment::Key(raw), PathSegment::Index)
                } else {
                    PathSegment::Key(raw)
                }
            }
            None => return Err(PathParseError::UnterminatedBracket(open)),
        };
        match self.chars.next() {
            Some((_, ']')) => Ok(segment),
            Some((offset, ch)) => Err(PathParseError::UnexpectedChar(ch, offset)),
            None => Err(PathParseError::UnterminatedBracket(open)),
        }
    }

    /// Parses `field==operand` inside a filter selector; `[?` was consumed.
    fn filter(&mut self, open: usize) -> Result<PathSegment, PathParseError> {
        let mut field = String::new();
        loop {
            match self.chars.next() {
                Some((offset, '=')) => match self.chars.next() {
                    Some((_, '=')) => break,
                    Some((offset, ch)) => return Err(PathParseError::UnexpectedChar(ch, offset)),
                    None => return Err(PathParseError::UnterminatedBracket(offset)),
                },
                Some((_, ch)) => field.push(ch),
                None => return Err(PathParseError::UnterminatedBracket(open)),
            }
        }
        let field_start = open + 2;
        let field = FieldPath::parse(field.trim()).map_err(|err| match err {
            PathParseError::Empty => PathParseError::EmptySegment(field_start),
            other => other,
        })?;
        while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        let operand = match self.chars.peek().copied() {
            Some((offset, quote @ ('"' | '\''))) => {
                self.chars.next();
                FilterOperand::Literal(Value::String(self.quoted_allow_empty(quote, offset)?))
            }
            Some((offset, '$')) => {
                self.chars.next();
                FilterOperand::Attribute(self.reference(offset)?)
            }
            Some((offset, _)) => {
                let mut raw = String::new();
                while let Some((_, ch)) = self.chars.next_if(|(_, ch)| *ch != ']') {
                    raw.push(ch);
                }
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(PathParseError::EmptySegment(offset));
                }
                FilterOperand::Literal(match serde_json::from_str::<Value>(raw) {
                    Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_))) => value,
                    _ => Value::String(raw.to_string()),
                })
            }
            None => return Err(PathParseError::UnterminatedBracket(open)),
        };
        while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}
        Ok(PathSegment::Filter {
            field,
            operand,
        })
    }

    /// Parses a `${path}` reference body; the `$` was consumed.
    fn reference(&mut self, dollar: usize) -> Result<FieldPath, PathParseError> {
        match self.chars.next() {
            Some((_, '{')) => {}
            Some((offset, ch)) => return Err(PathParseError::UnexpectedChar(ch, offset)),
            None => return Err(PathParseError::UnterminatedBracket(dollar)),
        }
        let mut body = String::new();
        loop {
            match self.chars.next() {
                Some((_, '}')) => break,
                Some((_, ch)) => body.push(ch),
                None => return Err(PathParseError::UnterminatedBracket(dollar)),
            }
        }
        FieldPath::parse(body.trim()).map_err(|err| match err {
            PathParseError::Empty => PathParseError::EmptySegment(dollar + 2),
            other => other,
        })
    }

    /// Parses a quoted key body; the opening quote was consumed.
    fn quoted(&mut self, quote: char, open: usize) -> Result<String, PathParseError> {
        let out = self.quoted_allow_empty(quote, open)?;
        if out.is_empty() {
            return Err(PathParseError::EmptySegment(open));
        }
        Ok(out)
    }

    /// Parses a quoted string body that may be empty; the opening quote was consumed.
    fn quoted_allow_empty(&mut self, quote: char, open: usize) -> Result<String, PathParseError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => return Err(PathParseError::UnterminatedQuote(open)),
                },
                Some((_, ch)) if ch == quote => break,
                Some((_, ch)) => out.push(ch),
                None => return Err(PathParseError::UnterminatedQuote(open)),
            }
        }
        Ok(out)
    }
}
