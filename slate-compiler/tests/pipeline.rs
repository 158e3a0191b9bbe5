use std::fs;
use std::path::PathBuf;

use slate_compiler::{
    Compilation, CompileFailure, CompileOptions, Compiler, ErrorCategory, Mode, SourceFile, SourceId,
};
use tempfile::tempdir;

fn compile(source: &str) -> (Compiler, anyhow::Result<Compilation>) {
    let mut compiler = Compiler::new(CompileOptions::default());
    let source_file = SourceFile::new(SourceId(0), PathBuf::from("main.slate"), source.to_string());
    let result = compiler.compile(&source_file);
    (compiler, result)
}

fn failure_of(result: anyhow::Result<Compilation>) -> CompileFailure {
    let err = result.err().expect("expected compilation to fail");
    match err.downcast_ref::<CompileFailure>() {
        Some(failure) => *failure,
        None => panic!("expected a stage failure, found {err:?}"),
    }
}

#[test]
fn lexical_errors_stop_before_parsing() {
    let (compiler, result) = compile("var s : 'open\nvar : 1\nprint(1 @ 2)\n");
    assert_eq!(failure_of(result), CompileFailure::Lexical(2));
    assert!(compiler
        .diagnostics()
        .entries()
        .iter()
        .all(|diagnostic| diagnostic.category == ErrorCategory::LexicalError));
}

#[test]
fn syntax_errors_stop_before_checking() {
    let (compiler, result) = compile("var : 1\nprint(missing)\n");
    assert_eq!(failure_of(result), CompileFailure::Syntax(1));
    assert_eq!(compiler.diagnostics().count(ErrorCategory::CompileError), 0);
}

#[test]
fn type_errors_stop_before_generation() {
    let (compiler, result) = compile("var x : 1\nvar x : 2\nlet x : 3\n");
    assert_eq!(failure_of(result), CompileFailure::Type(2));
    assert!(compiler.diagnostics().has_errors());
}

#[test]
fn diagnostics_carry_position_and_line_text() {
    let (compiler, result) = compile("var ok : 1\nvar bad : ok + 'x'\n");
    assert!(result.is_err());

    let entry = &compiler.diagnostics().entries()[0];
    assert_eq!(entry.category, ErrorCategory::CompileError);
    assert_eq!(entry.line, 2);
    assert_eq!(entry.column, 13);
    assert_eq!(entry.line_text.as_deref(), Some("var bad : ok + 'x'"));
    assert!(
        entry.message.ends_with("(at '+')"),
        "unexpected message {:?}",
        entry.message
    );
}

#[test]
fn fatal_marks_diagnostics_that_abandoned_their_statement() {
    let (compiler, result) = compile("var : 1\nbreak\n");
    assert_eq!(failure_of(result), CompileFailure::Syntax(2));
    let flags: Vec<_> = compiler
        .diagnostics()
        .entries()
        .iter()
        .map(|diagnostic| (diagnostic.line, diagnostic.fatal))
        .collect();
    assert_eq!(flags, vec![(1, true), (2, false)]);

    let (compiler, result) = compile("var x : 1\nvar x : 2\n");
    assert_eq!(failure_of(result), CompileFailure::Type(1));
    assert!(compiler.diagnostics().entries()[0].fatal);

    let (compiler, result) = compile("var s : 'open\n");
    assert_eq!(failure_of(result), CompileFailure::Lexical(1));
    assert!(!compiler.diagnostics().entries()[0].fatal);
}

#[test]
fn check_mode_stops_before_generation() -> anyhow::Result<()> {
    let mut compiler = Compiler::new(CompileOptions {
        mode: Mode::Check,
        ..CompileOptions::default()
    });
    let source = SourceFile::new(
        SourceId(0),
        PathBuf::from("main.slate"),
        "var answer : 42\nprint(answer)\n".to_string(),
    );
    let compilation = compiler.compile(&source)?;

    assert!(compilation.javascript.is_empty());
    assert_eq!(compilation.statements.len(), 2);
    assert_eq!(compilation.declarations.len(), 1);
    assert_eq!(compilation.declarations[0].name, "answer");
    Ok(())
}

#[test]
fn truncated_statement_reports_missing_expression() {
    let (compiler, result) = compile("var x :");
    assert!(result.is_err());
    let messages: Vec<_> = compiler
        .diagnostics()
        .entries()
        .iter()
        .map(|diagnostic| diagnostic.message.as_str())
        .collect();
    assert!(
        messages
            .iter()
            .any(|message| message.contains("expected an expression")),
        "unexpected messages {messages:?}"
    );
}

#[test]
fn successful_compilation_exposes_every_artifact() {
    let (compiler, result) = compile("var greeting : 'hello'\nfn shout (s) : s + '!'\nprint(shout(greeting))\n");
    let compilation = result.expect("program should compile");

    assert!(compiler.diagnostics().is_empty());
    assert_eq!(compilation.statements.len(), 3);
    let names: Vec<_> = compilation
        .declarations
        .iter()
        .map(|declaration| (declaration.name.as_str(), declaration.line))
        .collect();
    assert_eq!(names, vec![("greeting", 1), ("shout", 2)]);
    assert!(compilation
        .javascript
        .ends_with("$rt.print(shout(greeting));\n"));
}

#[test]
fn compiles_a_program_from_disk() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("countdown.slate");
    fs::write(
        &path,
        "# count down from three\n\
         mut n : 3\n\
         while n > 0\n\
         \x20 print(n)\n\
         \x20 let n : n - 1\n",
    )?;

    let source = SourceFile::new(SourceId(7), path.clone(), fs::read_to_string(&path)?);
    let mut compiler = Compiler::new(CompileOptions {
        mode: Mode::Test,
        ..CompileOptions::default()
    });
    let compilation = compiler.compile(&source)?;

    assert_eq!(compiler.options().mode, Mode::Test);
    assert!(compilation
        .javascript
        .contains("while ($rt.greater(n, $n0)) {\n  $rt.print(n);\n  n = $rt.subtract(n, $n1);\n}\n"));
    Ok(())
}

#[test]
fn separate_runs_share_no_state() {
    let (_, first) = compile("var x : 1\n");
    let (_, second) = compile("var x : 1\n");
    let first = first.expect("first run should compile");
    let second = second.expect("second run should compile");
    assert_eq!(first.javascript, second.javascript);
}
