use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::Result;
use tempfile::tempdir;

fn slate_binary() -> &'static str {
    env!("CARGO_BIN_EXE_slate")
}

fn slate(args: &[&str], dir: &Path) -> Result<Output> {
    Ok(Command::new(slate_binary())
        .args(args)
        .current_dir(dir)
        .env_remove("SLATE_RUNTIME")
        .env_remove("SLATE_NODE")
        .env_remove("RUST_LOG")
        .output()?)
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn emit_prints_generated_module() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("hello.slate"), "print('hello')\n")?;

    let output = slate(&["emit", "hello.slate"], tmp.path())?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(
        stdout_of(&output),
        "import * as $rt from \"slate-runtime\";\n$rt.print(\"hello\");\n"
    );
    Ok(())
}

#[test]
fn emit_writes_output_file() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("sum.slate"), "print(1 + 2)\n")?;

    let output = slate(&["emit", "sum.slate", "-o", "build/sum.mjs"], tmp.path())?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let module = fs::read_to_string(tmp.path().join("build/sum.mjs"))?;
    assert!(module.contains("$rt.print($rt.add($n1, $n2));"));
    assert!(stdout_of(&output).contains("build/sum.mjs"));
    Ok(())
}

#[test]
fn runtime_module_comes_from_flag_or_environment() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("main.slate"), "print(1)\n")?;

    let output = slate(&["emit", "main.slate", "--runtime", "./lib/rt.mjs"], tmp.path())?;
    assert!(stdout_of(&output).starts_with("import * as $rt from \"./lib/rt.mjs\";"));

    let output = Command::new(slate_binary())
        .args(["emit", "main.slate"])
        .current_dir(tmp.path())
        .env("SLATE_RUNTIME", "@slate/runtime")
        .output()?;
    assert!(stdout_of(&output).starts_with("import * as $rt from \"@slate/runtime\";"));
    Ok(())
}

#[test]
fn check_lists_declarations() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(
        tmp.path().join("decls.slate"),
        "var x : 1\nmut names : ['a']\n",
    )?;

    let output = slate(&["check", "decls.slate"], tmp.path())?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("1:5 x: Number"), "stdout: {stdout}");
    assert!(stdout.contains("2:5 mut names: [Text]"), "stdout: {stdout}");
    assert!(stdout.contains("decls.slate: ok"), "stdout: {stdout}");
    Ok(())
}

#[test]
fn check_reports_json_declarations() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("decls.slate"), "var answer : 42\n")?;

    let output = slate(
        &["check", "decls.slate", "--diagnostics-format", "json"],
        tmp.path(),
    )?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let report: serde_json::Value = serde_json::from_str(stdout_of(&output).trim())?;
    let declaration = &report["declarations"][0];
    assert_eq!(declaration["name"], "answer");
    assert_eq!(declaration["type"], "Number");
    assert_eq!(declaration["mutable"], false);
    Ok(())
}

#[test]
fn compile_errors_render_source_context() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(
        tmp.path().join("broken.slate"),
        "var x : 1\nlet x : 2\n",
    )?;

    let output = slate(&["check", "broken.slate"], tmp.path())?;
    assert!(!output.status.success());

    let stderr = stderr_of(&output);
    assert!(
        stderr.contains("error[CompileError]: cannot assign to immutable binding 'x'"),
        "stderr: {stderr}"
    );
    assert!(stderr.contains("--> broken.slate:2:5"), "stderr: {stderr}");
    assert!(stderr.contains("      let x : 2\n          ^"), "stderr: {stderr}");
    assert!(stderr.contains("Compilation failed"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn json_diagnostics_keep_zero_based_columns() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("lex.slate"), "var s : 'open\n")?;

    let output = slate(
        &["emit", "lex.slate", "--diagnostics-format", "json"],
        tmp.path(),
    )?;
    assert!(!output.status.success());

    let stderr = stderr_of(&output);
    let report_line = stderr
        .lines()
        .find(|line| line.starts_with('{'))
        .expect("json report on stderr");
    let report: serde_json::Value = serde_json::from_str(report_line)?;
    let diagnostic = &report["diagnostics"][0];
    assert_eq!(diagnostic["category"], "LexicalError");
    assert_eq!(diagnostic["level"], "error");
    assert_eq!(diagnostic["line"], 1);
    assert_eq!(diagnostic["column"], 8);
    assert_eq!(diagnostic["message"], "unterminated string");
    Ok(())
}

#[test]
fn dump_tokens_prints_the_token_stream() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("tokens.slate"), "var x : 1\n")?;

    let output = slate(&["--dump-tokens", "emit", "tokens.slate"], tmp.path())?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("kind: Identifier"), "stdout: {stdout}");
    assert!(stdout.contains("kind: Eof"), "stdout: {stdout}");
    Ok(())
}

#[test]
fn test_command_without_files_reports_nothing_to_do() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("notes.txt"), "not a program")?;

    let output = slate(&["test"], tmp.path())?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("no test files found"));
    Ok(())
}

#[test]
fn missing_input_is_reported() -> Result<()> {
    let tmp = tempdir()?;
    let output = slate(&["emit", "absent.slate"], tmp.path())?;
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to read"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn run_hands_the_generated_module_to_node() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("main.slate"), "print('hi')\n")?;

    // `cat` stands in for node and echoes the module it was given
    let output = Command::new(slate_binary())
        .args(["run", "main.slate"])
        .current_dir(tmp.path())
        .env("SLATE_NODE", "cat")
        .output()?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stdout_of(&output).ends_with("$rt.print(\"hi\");\n"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn run_propagates_program_failure() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("main.slate"), "print('hi')\n")?;

    let output = Command::new(slate_binary())
        .args(["run", "main.slate"])
        .current_dir(tmp.path())
        .env("SLATE_NODE", "false")
        .output()?;
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("program exited with status"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_command_discovers_programs_recursively() -> Result<()> {
    let tmp = tempdir()?;
    let nested = tmp.path().join("suite/nested");
    fs::create_dir_all(&nested)?;
    fs::write(tmp.path().join("suite/first.slate"), "print(1)\n")?;
    fs::write(nested.join("second.slate"), "print(2)\n")?;
    fs::write(nested.join("second.out"), "")?;

    let output = Command::new(slate_binary())
        .args(["test", "suite"])
        .current_dir(tmp.path())
        .env("SLATE_NODE", "true")
        .output()?;
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Running 2 test file(s)"), "stdout: {stdout}");
    assert!(stdout.contains("✓ suite/first.slate"), "stdout: {stdout}");
    assert!(stdout.contains("✓ suite/nested/second.slate"), "stdout: {stdout}");
    assert!(stdout.contains("All 2 test file(s) passed"), "stdout: {stdout}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_command_compares_expected_output() -> Result<()> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("echo.slate"), "print(1)\n")?;
    fs::write(tmp.path().join("echo.out"), "something else\n")?;
    fs::write(tmp.path().join("broken.slate"), "print(missing)\n")?;

    let output = Command::new(slate_binary())
        .args(["test", "."])
        .current_dir(tmp.path())
        .env("SLATE_NODE", "cat")
        .output()?;
    assert!(!output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("✗ ./broken.slate (Compilation failed"), "stdout: {stdout}");
    assert!(stdout.contains("✗ ./echo.slate (output differs from ./echo.out)"), "stdout: {stdout}");
    assert!(stderr_of(&output).contains("2 of 2 test file(s) failed"));
    Ok(())
}
