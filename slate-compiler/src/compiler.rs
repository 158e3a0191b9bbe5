use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::ast::Stmt;
use crate::codegen::CodeGenerator;
use crate::diagnostics::{Diagnostics, ErrorCategory};
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::source::SourceFile;
use crate::typechecker::{Declaration, TypeChecker};

pub const DEFAULT_RUNTIME_MODULE: &str = "slate-runtime";

/// What the host does with the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Execute it with console output attached.
    #[default]
    Run,
    /// Only print the generated source.
    Emit,
    /// Execute it without interactive input and capture its output.
    Test,
    /// Stop after type checking; nothing is generated.
    Check,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub dump_tokens: bool,
    /// Module specifier for the runtime library import at the top of the output.
    pub runtime_module: String,
    pub mode: Mode,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dump_tokens: false,
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            mode: Mode::default(),
        }
    }
}

/// A stage reported diagnostics and the pipeline stopped after it. Any other
/// error coming out of `Compiler::compile` is an internal fault.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CompileFailure {
    #[error("lexing failed with {0} error(s)")]
    Lexical(usize),
    #[error("parsing failed with {0} error(s)")]
    Syntax(usize),
    #[error("type checking failed with {0} error(s)")]
    Type(usize),
}

pub struct Compilation {
    pub statements: Vec<Stmt>,
    pub javascript: String,
    pub declarations: Vec<Declaration>,
}

pub struct Compiler {
    diagnostics: Diagnostics,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&mut self, source: &SourceFile) -> Result<Compilation> {
        debug!(path = %source.path.display(), mode = ?self.options.mode, "compiling");

        let mut lexical = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut lexical);
        self.absorb(source, lexical);
        let errors = self.diagnostics.count(ErrorCategory::LexicalError);
        if errors > 0 {
            return Err(CompileFailure::Lexical(errors).into());
        }

        if self.options.dump_tokens {
            for token in &tokens {
                println!("{token:?}");
            }
        }

        let mut parser = Parser::new(tokens);
        let parsed = parser.parse();
        self.absorb(source, parser.into_diagnostics());
        let Some(statements) = parsed else {
            let errors = self.diagnostics.count(ErrorCategory::SyntaxError);
            return Err(CompileFailure::Syntax(errors).into());
        };

        let mut checker = TypeChecker::new();
        checker.check(&statements);
        let (diagnostics, declarations) = checker.into_parts();
        self.absorb(source, diagnostics);
        let errors = self.diagnostics.count(ErrorCategory::CompileError);
        if errors > 0 {
            return Err(CompileFailure::Type(errors).into());
        }

        let javascript = if self.options.mode == Mode::Check {
            debug!("check mode, skipping code generation");
            String::new()
        } else {
            CodeGenerator::new(self.options.runtime_module.as_str()).generate(&statements)
        };

        Ok(Compilation {
            statements,
            javascript,
            declarations,
        })
    }

    /// Attach source lines to a stage's diagnostics and keep them.
    fn absorb(&mut self, source: &SourceFile, mut diagnostics: Diagnostics) {
        for diagnostic in diagnostics.entries_mut() {
            if diagnostic.line_text.is_none() {
                diagnostic.line_text = source.line_text(diagnostic.line).map(str::to_string);
            }
        }
        self.diagnostics.extend(diagnostics);
    }
}
