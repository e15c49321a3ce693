// crates/compliance-gate-core/src/core/command.rs
// ============================================================================
// Module: Compliance Gate Command Model
// Description: Command templates, resolved commands, and captured results.
// Purpose: Turn attribute-bearing templates into concrete argv before execution.
// Dependencies: crate::core::{attributes, path}, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Command templates are tokenized into arguments first and attribute
//! references are substituted per argument second. A substituted value never
//! re-splits into multiple arguments and no shell is involved, so attribute
//! values cannot inject additional command syntax.
//!
//! Template syntax:
//! - Unquoted whitespace separates arguments.
//! - `'...'` is literal; `"..."` allows references and `\` escapes.
//! - `${path}` references an attribute path; `$$` is a literal `$`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::attributes::AttributeError;
use crate::core::attributes::ScopedAttributes;
use crate::core::path::FieldPath;
use crate::core::path::PathParseError;
use crate::core::path::describe_kind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code recorded for commands terminated after exceeding their timeout.
pub const TIMED_OUT_EXIT_CODE: i32 = -1;

// ============================================================================
// SECTION: Command Spec
// ============================================================================

/// Command-line template with embedded attribute references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandSpec(String);

impl CommandSpec {
    /// Creates a new command spec from template text.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Returns the template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the template into arguments and references.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is empty or malformed.
    pub fn parse(&self) -> Result<CommandTemplate, TemplateError> {
        CommandTemplate::parse(&self.0)
    }
}

impl From<&str> for CommandSpec {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Command Template
// ============================================================================

/// Part of a template argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text.
    Literal(String),
    /// Attribute reference substituted at resolution time.
    Reference(FieldPath),
}

/// Parsed command template.
///
/// # Invariants
/// - Contains at least one argument (the program).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Arguments, each made of literal and reference parts.
    args: Vec<Vec<TemplatePart>>,
}

impl CommandTemplate {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is empty or malformed.
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let args = Tokenizer::new(input).tokenize()?;
        if args.is_empty() {
            return Err(TemplateError::Empty);
        }
        Ok(Self {
            args,
        })
    }

    /// Returns every attribute reference in the template.
    pub fn references(&self) -> impl Iterator<Item = &FieldPath> {
        self.args.iter().flatten().filter_map(|part| match part {
            TemplatePart::Reference(path) => Some(path),
            TemplatePart::Literal(_) => None,
        })
    }

    /// Substitutes attribute references and returns a concrete command.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a reference cannot be resolved to a scalar.
    pub fn resolve(&self, scope: &ScopedAttributes) -> Result<ResolvedCommand, TemplateError> {
        let mut argv = Vec::with_capacity(self.args.len());
        for parts in &self.args {
            let mut rendered = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(text) => rendered.push_str(text),
                    TemplatePart::Reference(path) => {
                        let value = scope.resolve_path(path)?;
                        rendered.push_str(&scalar_text(path, value)?);
                    }
                }
            }
            argv.push(rendered);
        }
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(TemplateError::Empty)?;
        if program.is_empty() {
            return Err(TemplateError::EmptyProgram);
        }
        Ok(ResolvedCommand {
            program,
            args: argv.collect(),
        })
    }
}

/// Renders a scalar attribute value as argument text.
fn scalar_text(path: &FieldPath, value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(TemplateError::NonScalar {
            path: path.to_string(),
            kind: describe_kind(other),
        }),
    }
}

// ============================================================================
// SECTION: Resolved Command
// ============================================================================

/// Fully concrete command ready for execution.
///
/// # Invariants
/// - `program` is non-empty.
/// - Equality defines command identity for per-run deduplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolvedCommand {
    /// Program name or path.
    pub program: String,
    /// Program arguments.
    pub args: Vec<String>,
}

impl ResolvedCommand {
    /// Creates a resolved command from a program and arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Returns the full argument vector including the program.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)).collect()
    }
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, arg) in self.argv().into_iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            if arg.is_empty() || arg.chars().any(|ch| ch.is_whitespace() || "'\"\\$".contains(ch))
            {
                write!(f, "'{}'", arg.replace('\'', "'\\''"))?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Command Result
// ============================================================================

/// Captured result of one command execution.
///
/// # Invariants
/// - Produced once per distinct command per run; never mutated afterwards.
/// - Timed-out results carry [`TIMED_OUT_EXIT_CODE`] and empty stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Wall-clock execution time.
    pub duration: Duration,
    /// True when the process was terminated after exceeding the timeout.
    pub timed_out: bool,
    /// True when stdout exceeded the capture limit.
    pub stdout_truncated: bool,
    /// True when stderr exceeded the capture limit.
    pub stderr_truncated: bool,
}

impl CommandResult {
    /// Creates a result for a process that exited on its own.
    #[must_use]
    pub const fn completed(
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            timed_out: false,
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    /// Creates a result for a process terminated after its timeout.
    #[must_use]
    pub const fn timed_out(stderr: Vec<u8>, duration: Duration) -> Self {
        Self {
            exit_code: TIMED_OUT_EXIT_CODE,
            stdout: Vec::new(),
            stderr,
            duration,
            timed_out: true,
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    /// Returns true when the command exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Returns stderr decoded as UTF-8 (lossy).
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Returns the duration in whole milliseconds, saturating.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Template parsing and resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Template contained no arguments.
    #[error("command template is empty")]
    Empty,
    /// Resolved program name was empty.
    #[error("command program resolved to an empty string")]
    EmptyProgram,
    /// A quote was opened and never closed.
    #[error("unterminated quote starting at offset {0}")]
    UnterminatedQuote(usize),
    /// A `${` reference was opened and never closed.
    #[error("unterminated attribute reference starting at offset {0}")]
    UnterminatedReference(usize),
    /// A reference path failed to parse.
    #[error("invalid attribute reference at offset {offset}: {source}")]
    InvalidReference {
        /// Offset of the reference.
        offset: usize,
        /// Underlying parse error.
        source: PathParseError,
    },
    /// Template ended with a dangling escape.
    #[error("template ends with a dangling escape")]
    TrailingEscape,
    /// A referenced attribute could not be resolved.
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    /// A referenced attribute was not a scalar.
    #[error("attribute {path} is a {kind}, expected a scalar")]
    NonScalar {
        /// Reference path.
        path: String,
        /// Actual value kind.
        kind: &'static str,
    },
}

// ============================================================================
// SECTION: Tokenizer
// ============================================================================

/// Quote state while tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    /// Outside quotes.
    None,
    /// Inside single quotes, opened at the offset.
    Single(usize),
    /// Inside double quotes, opened at the offset.
    Double(usize),
}

/// Template tokenizer producing arguments made of parts.
struct Tokenizer<'a> {
    /// Input characters with byte offsets.
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Completed arguments.
    args: Vec<Vec<TemplatePart>>,
    /// Parts of the argument being built.
    current: Vec<TemplatePart>,
    /// Literal text pending for the current argument.
    literal: String,
    /// True once the current argument has started (allows empty quoted args).
    started: bool,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over the template text.
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            args: Vec::new(),
            current: Vec::new(),
            literal: String::new(),
            started: false,
        }
    }

    /// Tokenizes the full template.
    fn tokenize(mut self) -> Result<Vec<Vec<TemplatePart>>, TemplateError> {
        let mut quote = Quote::None;
        while let Some((offset, ch)) = self.chars.next() {
            match (quote, ch) {
                (Quote::None, ch) if ch.is_whitespace() => self.finish_arg(),
                (Quote::None, '\'') => {
                    self.started = true;
                    quote = Quote::Single(offset);
                }
                (Quote::None, '"') => {
                    self.started = true;
                    quote = Quote::Double(offset);
                }
                (Quote::Single(_), '\'') | (Quote::Double(_), '"') => quote = Quote::None,
                (Quote::Single(_), ch) => self.literal.push(ch),
                (Quote::None | Quote::Double(_), '\\') => {
                    let (_, escaped) = self.chars.next().ok_or(TemplateError::TrailingEscape)?;
                    self.started = true;
                    self.literal.push(escaped);
                }
                (Quote::None | Quote::Double(_), '$') => self.dollar(offset)?,
                (Quote::None | Quote::Double(_), ch) => {
                    self.started = true;
                    self.literal.push(ch);
                }
            }
        }
        match quote {
            Quote::Single(offset) | Quote::Double(offset) => {
                return Err(TemplateError::UnterminatedQuote(offset));
            }
            Quote::None => {}
        }
        self.finish_arg();
        Ok(self.args)
    }

    /// Handles a `$` outside single quotes.
    fn dollar(&mut self, offset: usize) -> Result<(), TemplateError> {
        self.started = true;
        match self.chars.peek().copied() {
            Some((_, '$')) => {
                self.chars.next();
                self.literal.push('$');
            }
            Some((_, '{')) => {
                self.chars.next();
                let mut body = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) => body.push(ch),
                        None => return Err(TemplateError::UnterminatedReference(offset)),
                    }
                }
                let path = FieldPath::parse(body.trim()).map_err(|source| {
                    TemplateError::InvalidReference {
                        offset,
                        source,
                    }
                })?;
                self.flush_literal();
                self.current.push(TemplatePart::Reference(path));
            }
            _ => self.literal.push('$'),
        }
        Ok(())
    }

    /// Moves pending literal text into the current argument.
    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            self.current.push(TemplatePart::Literal(std::mem::take(&mut self.literal)));
        }
    }

    /// Completes the current argument when one has started.
    fn finish_arg(&mut self) {
        self.flush_literal();
        if self.started || !self.current.is_empty() {
            let mut parts = std::mem::take(&mut self.current);
            if parts.is_empty() {
                parts.push(TemplatePart::Literal(String::new()));
            }
            self.args.push(parts);
        }
        self.started = false;
    }
}
