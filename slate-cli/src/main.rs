use std::collections::BTreeSet;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use slate_compiler::{
    Compilation, CompileFailure, CompileOptions, Compiler, Diagnostic, DiagnosticLevel, Mode,
    SourceFile, SourceId, DEFAULT_RUNTIME_MODULE,
};
use tempfile::tempdir;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiagnosticsFormat {
    Human,
    Json,
}

#[derive(Parser)]
#[command(
    name = "slate",
    version,
    about = "Compile Slate programs to JavaScript and run them.",
    long_about = "Check, translate and execute Slate source files. Generated code is an ES module that imports the Slate runtime library and runs under node."
)]
struct Cli {
    #[command(subcommand)]
    command: SlateCommand,

    /// Module specifier the generated code imports the runtime library from.
    #[arg(long, global = true, env = "SLATE_RUNTIME", default_value = DEFAULT_RUNTIME_MODULE)]
    runtime: String,

    /// Log each compiler stage to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dump the token stream produced by the scanner.
    #[arg(long, global = true)]
    dump_tokens: bool,

    /// How diagnostics are reported.
    #[arg(long, global = true, value_enum, default_value_t = DiagnosticsFormat::Human)]
    diagnostics_format: DiagnosticsFormat,
}

#[derive(Subcommand)]
enum SlateCommand {
    /// Compile a program and execute it with node.
    Run {
        /// Path to a Slate source file.
        input: PathBuf,

        /// Arguments passed through to the program.
        #[arg(value_name = "ARG", trailing_var_arg = true, num_args = 0..)]
        script_args: Vec<OsString>,
    },
    /// Print the generated JavaScript.
    Emit {
        /// Path to a Slate source file.
        input: PathBuf,

        /// Write the module here instead of stdout.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Check a program without generating code.
    Check {
        /// Path to a Slate source file.
        input: PathBuf,
    },
    /// Run every `.slate` file and compare its output with the sibling `.out` file.
    Test {
        /// Files or directories to search (defaults to the current directory).
        #[arg(value_name = "PATH")]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match &cli.command {
        SlateCommand::Run { input, script_args } => run_program(&cli, input, script_args),
        SlateCommand::Emit { input, output } => emit_program(&cli, input, output.as_deref()),
        SlateCommand::Check { input } => check_program(&cli, input),
        SlateCommand::Test { inputs } => run_tests(&cli, inputs),
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
        .context("failed to install the log subscriber")
}

fn load_source(path: &Path) -> Result<SourceFile> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(SourceFile::new(SourceId(0), path.to_path_buf(), contents))
}

fn compile(cli: &Cli, source: &SourceFile, mode: Mode, runtime_module: String) -> Result<Compilation> {
    let mut compiler = Compiler::new(CompileOptions {
        dump_tokens: cli.dump_tokens,
        runtime_module,
        mode,
    });

    let result = compiler.compile(source);
    report_diagnostics(cli, source, compiler.diagnostics().entries());
    match result {
        Ok(compilation) => Ok(compilation),
        Err(err) if err.downcast_ref::<CompileFailure>().is_some() => {
            Err(err.context("Compilation failed"))
        }
        Err(err) => Err(err.context("internal compiler error")),
    }
}

/// Generated modules run from a temporary directory, so a runtime given as a
/// local path must be made absolute before it is written into the import.
fn runtime_for_execution(runtime: &str) -> String {
    let path = Path::new(runtime);
    if path.exists() {
        if let Ok(absolute) = path.canonicalize() {
            return absolute.display().to_string();
        }
    }
    runtime.to_string()
}

fn node_binary() -> PathBuf {
    env::var_os("SLATE_NODE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("node"))
}

fn write_module(directory: &Path, input: &Path, javascript: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("program");
    let module_path = directory.join(format!("{stem}.mjs"));
    fs::write(&module_path, javascript)
        .with_context(|| format!("failed to write {}", module_path.display()))?;
    Ok(module_path)
}

fn run_program(cli: &Cli, input: &Path, script_args: &[OsString]) -> Result<()> {
    let source = load_source(input)?;
    let compilation = compile(cli, &source, Mode::Run, runtime_for_execution(&cli.runtime))?;

    let temp_dir = tempdir().context("failed to create temporary directory for execution")?;
    let module_path = write_module(temp_dir.path(), input, &compilation.javascript)?;
    debug!(module = %module_path.display(), "executing generated module");

    let status = Command::new(node_binary())
        .arg(&module_path)
        .args(script_args)
        .status()
        .with_context(|| format!("failed to execute {}", input.display()))?;
    if !status.success() {
        bail!("program exited with status {}", status);
    }

    Ok(())
}

fn emit_program(cli: &Cli, input: &Path, output: Option<&Path>) -> Result<()> {
    let source = load_source(input)?;
    let compilation = compile(cli, &source, Mode::Emit, cli.runtime.clone())?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, &compilation.javascript)
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("{}", path.display());
        }
        None => print!("{}", compilation.javascript),
    }

    Ok(())
}

fn check_program(cli: &Cli, input: &Path) -> Result<()> {
    let source = load_source(input)?;
    let compilation = compile(cli, &source, Mode::Check, cli.runtime.clone())?;

    match cli.diagnostics_format {
        DiagnosticsFormat::Human => {
            for declaration in &compilation.declarations {
                println!(
                    "{}:{} {}{}: {}",
                    declaration.line,
                    declaration.column + 1,
                    if declaration.mutable { "mut " } else { "" },
                    declaration.name,
                    declaration.ty
                );
            }
            println!("{}: ok", input.display());
        }
        DiagnosticsFormat::Json => {
            let declarations: Vec<_> = compilation
                .declarations
                .iter()
                .map(|declaration| {
                    json!({
                        "name": declaration.name,
                        "line": declaration.line,
                        "column": declaration.column,
                        "mutable": declaration.mutable,
                        "type": declaration.ty.to_string(),
                    })
                })
                .collect();
            println!(
                "{}",
                json!({ "path": input.display().to_string(), "declarations": declarations })
            );
        }
    }

    Ok(())
}

enum TestOutcome {
    Passed,
    Failed(String),
}

fn run_tests(cli: &Cli, inputs: &[PathBuf]) -> Result<()> {
    let inputs = if inputs.is_empty() {
        vec![env::current_dir().context("failed to determine current directory")?]
    } else {
        inputs.to_vec()
    };

    let mut files = BTreeSet::new();
    for input in &inputs {
        collect_slate_files(input, &mut files)?;
    }

    if files.is_empty() {
        println!("no test files found");
        return Ok(());
    }

    println!("Running {} test file(s)...", files.len());
    let runtime = runtime_for_execution(&cli.runtime);
    let mut failed = 0usize;

    for path in &files {
        match run_test_file(cli, path, &runtime)? {
            TestOutcome::Passed => println!("  ✓ {}", path.display()),
            TestOutcome::Failed(reason) => {
                failed += 1;
                println!("  ✗ {} ({reason})", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} test file(s) failed", failed, files.len());
    }

    println!("\nAll {} test file(s) passed", files.len());
    Ok(())
}

fn run_test_file(cli: &Cli, path: &Path, runtime: &str) -> Result<TestOutcome> {
    let source = load_source(path)?;
    let compilation = match compile(cli, &source, Mode::Test, runtime.to_string()) {
        Ok(compilation) => compilation,
        Err(err) => return Ok(TestOutcome::Failed(format!("{err:#}"))),
    };

    let temp_dir = tempdir().context("failed to create temporary directory for execution")?;
    let module_path = write_module(temp_dir.path(), path, &compilation.javascript)?;
    let output = Command::new(node_binary())
        .arg(&module_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to execute {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first_line = stderr.lines().next().unwrap_or("no output");
        return Ok(TestOutcome::Failed(format!(
            "exited with {}: {first_line}",
            output.status
        )));
    }

    let expected_path = path.with_extension("out");
    if expected_path.is_file() {
        let expected = fs::read_to_string(&expected_path)
            .with_context(|| format!("failed to read {}", expected_path.display()))?;
        let actual = String::from_utf8_lossy(&output.stdout);
        if actual.trim_end() != expected.trim_end() {
            return Ok(TestOutcome::Failed(format!(
                "output differs from {}",
                expected_path.display()
            )));
        }
    }

    Ok(TestOutcome::Passed)
}

fn collect_slate_files(path: &Path, targets: &mut BTreeSet<PathBuf>) -> Result<()> {
    let metadata = fs::metadata(path).with_context(|| format!("Failed to access {:?}", path))?;

    if metadata.is_dir() {
        let mut child_paths = Vec::new();
        for entry in
            fs::read_dir(path).with_context(|| format!("Failed to read directory {:?}", path))?
        {
            let entry =
                entry.with_context(|| format!("Failed to access entry within {:?}", path))?;
            child_paths.push(entry.path());
        }
        child_paths.sort();
        for child in child_paths {
            collect_slate_files(&child, targets)?;
        }
    } else if metadata.is_file()
        && path.extension().and_then(|ext| ext.to_str()) == Some("slate")
    {
        targets.insert(path.to_path_buf());
    }

    Ok(())
}

fn report_diagnostics(cli: &Cli, source: &SourceFile, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    match cli.diagnostics_format {
        DiagnosticsFormat::Human => {
            eprintln!("Diagnostics:");
            for diagnostic in diagnostics {
                print_diagnostic(source, diagnostic);
            }
        }
        DiagnosticsFormat::Json => {
            let report = json!({
                "path": source.path.display().to_string(),
                "diagnostics": diagnostics,
            });
            eprintln!("{report}");
        }
    }
}

fn print_diagnostic(source: &SourceFile, diagnostic: &Diagnostic) {
    let (marker, level_label) = match diagnostic.level {
        DiagnosticLevel::Error => ("  -", "error"),
    };
    eprintln!(
        "{} {}[{}]: {}",
        marker, level_label, diagnostic.category, diagnostic.message
    );
    eprintln!(
        "     --> {}:{}:{}",
        source.path.display(),
        diagnostic.line,
        diagnostic.column + 1
    );

    let Some(raw_line) = diagnostic
        .line_text
        .as_deref()
        .or_else(|| source.line_text(diagnostic.line))
    else {
        return;
    };
    let display_line = raw_line.replace('\t', "    ");
    eprintln!("      {}", display_line);

    let mut caret_line = String::from("      ");
    for ch in raw_line.chars().take(diagnostic.column) {
        match ch {
            '\t' => caret_line.push_str("    "),
            _ => caret_line.push(' '),
        }
    }
    caret_line.push('^');
    eprintln!("{}", caret_line);
}
