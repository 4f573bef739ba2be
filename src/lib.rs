//! StoreXP - Scheme interpreter over an explicit mutable store
//!
//! This crate evaluates a small Scheme dialect (literals, variables, `if`, `lambda`,
//! `let`, application, `set!` and top-level `define`) against an indirection-based
//! memory model. Environments never hold values: they map names to *addresses*, and
//! the addresses index cells in an append-only store owned by an interpreter
//! [`Session`].
//!
//! ```scheme
//! (define x 5)
//! (define add-to-x! (lambda (z) (set! x (+ x z)) x))
//! (add-to-x! 3)       ; 8
//! x                   ; 8, the global cell was mutated through the closure
//! ```
//!
//! Closures that capture the same frame observe each other's `set!`, and top-level
//! definitions may refer to each other regardless of order, because every binding
//! is resolved to a shared cell at the time of the call.
//!
//! ## Modules
//!
//! - `scheme`: S-expression reader (text to data)
//! - `syntax`: data to the typed expression tree
//! - `evaluator`: the session, its store and environments, and the evaluator itself
//! - `builtinops`: primitive operations applied by the evaluator
//! - `ast`: runtime values and their rendering

use thiserror::Error as ThisError;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in the S-expression reader
pub const MAX_PARSE_DEPTH: usize = 64;

/// Default maximum evaluation depth for a [`Session`]
/// Every nested sub-evaluation (operands, bodies, branches) counts as one level.
/// Sized so an unoptimized build reports the limit before exhausting a 2 MiB thread stack.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Well-formed data that is not a valid special form or expression
    InvalidForm,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Offsets are in bytes; both ends are moved back onto char boundaries
        let mut context_start = error_offset.saturating_sub(20).min(input.len());
        while !input.is_char_boundary(context_start) {
            context_start -= 1;
        }
        let mut context_end = (context_start + MAX_CONTEXT).min(input.len());
        while !input.is_char_boundary(context_end) {
            context_end -= 1;
        }
        let context_str = &input[context_start..context_end];

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(context_str);
        if context_end < input.len() {
            display_context.push_str("[...]");
        }

        // Newlines would break single-line error reports
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Evaluation short-circuits on the first error: a program either evaluates to its
/// final value or reports exactly one of these.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    /// Environment lookup reached the global environment without finding the name
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    /// Store read outside the allocated cells
    #[error("Illegal address: {0}")]
    IllegalAddress(Address),
    /// Application of a value that is neither a primitive nor a closure (rendered form)
    #[error("Bad procedure: {0}")]
    BadProcedure(String),
    /// Evaluation of a sequence with no forms
    #[error("Empty program")]
    EmptyProgram,
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("ArityError: {}", describe_arity(.expected, .got, .expression))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>, // Optional expression context
    },
}

fn describe_arity(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("expression {expr}: expected {expected} arguments, got {got}"),
        None => format!("function expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod syntax;

#[cfg(feature = "scheme")]
pub mod scheme;

pub use evaluator::{Address, Env, GlobalEnv, Session, SessionConfig, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let cases = vec![
            (Error::UnboundVariable("x".into()), "Unbound variable: x"),
            (Error::IllegalAddress(7), "Illegal address: 7"),
            (Error::BadProcedure("5".into()), "Bad procedure: 5"),
            (Error::EmptyProgram, "Empty program"),
            (
                Error::arity_error(2, 3),
                "ArityError: function expected 2 arguments but got 3",
            ),
            (
                Error::arity_error_with_expr(3, 2, "(if #t 1)".into()),
                "ArityError: expression (if #t 1): expected 3 arguments, got 2",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(format!("{error}"), expected);
        }
    }

    #[test]
    fn test_parse_error_context() {
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", "(a\nb)", 0);
        assert_eq!(err.context.as_deref(), Some("(a\\nb)"));
        assert_eq!(
            format!("{}", Error::from(err)),
            "ParseError: bad\nContext: (a\\nb)"
        );
    }

    #[test]
    fn test_parse_error_context_multibyte() {
        // 15 two-byte chars, the error at the '(' 30 bytes in
        let input = format!("{}(bad", "é".repeat(15));
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", &input, 30);
        let expected = format!("[...]{}(bad", "é".repeat(10));
        assert_eq!(err.context.as_deref(), Some(expected.as_str()));

        // Three-byte chars: 45 - 20 lands inside a char and snaps back to byte 24
        let input = format!("{}(bad", "€".repeat(15));
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", &input, 45);
        let expected = format!("[...]{}(bad", "€".repeat(7));
        assert_eq!(err.context.as_deref(), Some(expected.as_str()));

        // Long multibyte tail is cut on a char boundary and marked
        let input = format!("({}", "€".repeat(60));
        let err = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", &input, 0);
        let expected = format!("({}[...]", "€".repeat(33));
        assert_eq!(err.context.as_deref(), Some(expected.as_str()));
    }
}
