mod ast;
mod codegen;
mod compiler;
mod diagnostics;
mod environment;
mod lexer;
mod parser;
mod source;
mod stdlib;
mod typechecker;
mod types;

pub use crate::ast::{
    AssignExpr, BinaryExpr, BinaryOperator, BlockStmt, BreakStmt, CallExpr, ElifBranch, Expr,
    ExprVisitor, ExpressionStmt, FunctionDecl, FunctionExpr, GetExpr, GroupingExpr, IfStmt,
    ListLiteral, LiteralExpr, Member, RecordField, RecordLiteral, ReturnStmt, SetExpr, Stmt,
    StmtVisitor, TernaryExpr, TypeExpr, UnaryExpr, UnaryOperator, VarDeclaration, VariableExpr,
    WhileStmt,
};
pub use crate::codegen::{mangle, CodeGenerator, RUNTIME_BINDING};
pub use crate::compiler::{
    Compilation, CompileFailure, CompileOptions, Compiler, Mode, DEFAULT_RUNTIME_MODULE,
};
pub use crate::diagnostics::{
    Diagnostic, DiagnosticLevel, Diagnostics, ErrorCategory, ErrorSink,
};
pub use crate::environment::{Binding, Environment, ScopeKind};
pub use crate::lexer::{is_word_joiner, scan, Keyword, Literal, Scanner, Token, TokenKind};
pub use crate::parser::{ParseError, Parser};
pub use crate::source::{SourceFile, SourceId};
pub use crate::stdlib::{find_builtin, StdFunction, StdType, BUILTINS as STDLIB_BUILTINS};
pub use crate::typechecker::{Declaration, TypeChecker, TypeError};
pub use crate::types::{FunctionType, Primitive, Substitution, Type, TypeVar};
