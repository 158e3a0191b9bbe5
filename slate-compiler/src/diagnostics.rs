use std::fmt;

use serde::Serialize;

use crate::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
}

/// The stage a diagnostic belongs to.
///
/// `RuntimeError` never comes out of the compiler itself; it names failures that the
/// runtime library raises from inside generated code, so hosts can report both kinds
/// through one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    LexicalError,
    SyntaxError,
    CompileError,
    RuntimeError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::LexicalError => "LexicalError",
            ErrorCategory::SyntaxError => "SyntaxError",
            ErrorCategory::CompileError => "CompileError",
            ErrorCategory::RuntimeError => "RuntimeError",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub level: DiagnosticLevel,
    pub category: ErrorCategory,
    /// One-based line number.
    pub line: usize,
    /// Zero-based column within the line.
    pub column: usize,
    /// Text of the offending line, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_text: Option<String>,
    /// Set when the problem abandoned the statement it was found in. Unset ones
    /// were reported in place and the statement was kept.
    pub fatal: bool,
}

/// Receiver for every problem the pipeline finds.
///
/// The scanner reports raw positions because it has no token yet; the later stages
/// anchor their reports on the offending token.
pub trait ErrorSink {
    fn lexical_error(&mut self, line_text: &str, line: usize, column: usize, message: &str);

    fn token_error(&mut self, token: &Token, message: &str, category: ErrorCategory, fatal: bool);

    /// Whether any error has been recorded so far in this run.
    fn had_error(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn count(&self, category: ErrorCategory) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.category == category)
            .count()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Diagnostic] {
        &mut self.entries
    }
}

impl ErrorSink for Diagnostics {
    fn lexical_error(&mut self, line_text: &str, line: usize, column: usize, message: &str) {
        self.entries.push(Diagnostic {
            message: message.to_string(),
            level: DiagnosticLevel::Error,
            category: ErrorCategory::LexicalError,
            line,
            column,
            line_text: Some(line_text.to_string()),
            fatal: false,
        });
    }

    fn token_error(&mut self, token: &Token, message: &str, category: ErrorCategory, fatal: bool) {
        let message = if token.is_eof() {
            format!("{message} (at end of input)")
        } else {
            format!("{message} (at '{}')", token.display_lexeme())
        };
        self.entries.push(Diagnostic {
            message,
            level: DiagnosticLevel::Error,
            category,
            line: token.line,
            column: token.column,
            line_text: None,
            fatal,
        });
    }

    fn had_error(&self) -> bool {
        self.has_errors()
    }
}
