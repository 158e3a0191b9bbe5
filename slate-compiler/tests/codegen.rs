use std::path::PathBuf;

use slate_compiler::{CompileOptions, Compiler, SourceFile, SourceId};

fn emit_with(options: CompileOptions, source: &str) -> String {
    let mut compiler = Compiler::new(options);
    let source_file = SourceFile::new(SourceId(0), PathBuf::from("emit.slate"), source.to_string());
    match compiler.compile(&source_file) {
        Ok(compilation) => compilation.javascript,
        Err(err) => panic!(
            "compilation failed: {err:#}\n{:?}",
            compiler.diagnostics().entries()
        ),
    }
}

fn emit(source: &str) -> String {
    emit_with(CompileOptions::default(), source)
}

/// Generated code without the runtime import line.
fn body(source: &str) -> String {
    emit(source)
        .lines()
        .skip(1)
        .filter(|line| !line.starts_with("const $n"))
        .map(|line| format!("{line}\n"))
        .collect()
}

#[test]
fn numeric_literals_keep_their_exact_text() {
    assert_eq!(
        emit("print(3e-10)\n"),
        "import * as $rt from \"slate-runtime\";\n\
         const $n3em10 = $rt.num(\"3e-10\");\n\
         $rt.print($n3em10);\n"
    );
}

#[test]
fn repeated_literals_share_one_constant() {
    let output = emit("print(1 + 1 + 1)\nprint(2)\nprint(1)\n");
    assert_eq!(output.matches("const $n1 =").count(), 1);
    assert!(output.contains("$rt.print($rt.add($rt.add($n1, $n1), $n1));"));

    let constants: Vec<_> = output
        .lines()
        .filter(|line| line.starts_with("const $n"))
        .collect();
    assert_eq!(
        constants,
        vec![
            "const $n1 = $rt.num(\"1\");",
            "const $n2 = $rt.num(\"2\");",
        ]
    );
}

#[test]
fn while_condition_uses_runtime_comparison() {
    let output = emit("mut element nr : 3\nwhile element nr ≥ 0\n  let element nr : element nr - 1\n");
    assert_eq!(
        output,
        "import * as $rt from \"slate-runtime\";\n\
         const $n3 = $rt.num(\"3\");\n\
         const $n0 = $rt.num(\"0\");\n\
         const $n1 = $rt.num(\"1\");\n\
         let element_nr = $n3;\n\
         while ($rt.greaterEqual(element_nr, $n0)) {\n  \
         element_nr = $rt.subtract(element_nr, $n1);\n\
         }\n"
    );
    assert!(!output.contains(">="));
}

#[test]
fn if_chain_maps_to_one_native_chain() {
    let source = "var n : 2\nif n = 1\n  print('one')\nelif n = 2\n  print('two')\nelse\n  print('many')\n";
    assert_eq!(
        body(source),
        "const n = $n2;\n\
         if ($rt.equal(n, $n1)) {\n  \
         $rt.print(\"one\");\n\
         } else if ($rt.equal(n, $n2)) {\n  \
         $rt.print(\"two\");\n\
         } else {\n  \
         $rt.print(\"many\");\n\
         }\n"
    );
}

#[test]
fn conditions_are_asserted_unless_provably_boolean() {
    let output = emit(
        "fn check (flag)\n  if flag\n    return !flag\n  return even?(2) ∨ flag\n",
    );
    assert!(output.contains("if ($rt.bool(flag)) {"), "{output}");
    assert!(output.contains("return !$rt.bool(flag);"), "{output}");
    assert!(
        output.contains("return ($rt.even_($n2) || $rt.bool(flag));"),
        "{output}"
    );
}

#[test]
fn boolean_literals_and_comparisons_are_not_wrapped() {
    let output = emit("while true\n  break\nvar x : 1\nvar y : x < 2 ? x ! 2\n");
    assert!(output.contains("while (true) {\n  break;\n}"), "{output}");
    assert!(output.contains("const y = ($rt.less(x, $n2) ? x : $n2);"), "{output}");
}

#[test]
fn functions_are_wrapped_in_stone() {
    assert_eq!(
        body("fn add (a, b)\n  return a + b\nvar neg : fn (n) : -n\n"),
        "const add = $rt.stone((a, b) => {\n  \
         return $rt.add(a, b);\n\
         });\n\
         const neg = $rt.stone((n) => {\n  \
         return $rt.negate(n);\n\
         });\n"
    );
}

#[test]
fn bare_return_yields_null() {
    let output = emit("fn nothing ()\n  return\n");
    assert!(output.contains("  return null;\n"), "{output}");
}

#[test]
fn records_are_built_on_ownerless_objects() {
    let output = emit("var p : {x: 1, first name: 'ada'}\nprint(p.first name)\n");
    assert!(
        output.contains(
            "const p = (() => { const $r = Object.create(null); $r.x = $n1; $r.first_name = \"ada\"; return $r; })();"
        ),
        "{output}"
    );
    assert!(output.contains("$rt.print($rt.field(p, \"first_name\"));"), "{output}");
}

#[test]
fn lists_index_through_the_runtime() {
    let output = emit("mut xs : [1, 2]\nlet xs[0] : 3\nprint(xs[1])\n");
    assert!(output.contains("let xs = [$n1, $n2];"), "{output}");
    assert!(output.contains("$rt.put(xs, $n0, $n3);"), "{output}");
    assert!(output.contains("$rt.print($rt.at(xs, $n1));"), "{output}");
}

#[test]
fn reserved_words_are_prefixed() {
    let output = emit("var class : 'x'\nprint(class)\n");
    assert!(output.contains("const $$class = \"x\";"), "{output}");
    assert!(output.contains("$rt.print($$class);"), "{output}");
}

#[test]
fn bindings_named_after_object_keep_records_working() {
    let output = emit("var Object : 1\nvar r : {x: Object}\n");
    assert!(output.contains("const $$Object = $n1;"), "{output}");
    assert!(
        output.contains(
            "const r = (() => { const $r = Object.create(null); $r.x = $$Object; return $r; })();"
        ),
        "{output}"
    );
    assert!(!output.contains("const Object"), "{output}");
}

#[test]
fn joiner_spellings_emit_one_name() {
    let output = emit("mut first name : 'ada'\nlet first\u{a0}name : 'grace'\nprint(first name)\n");
    assert_eq!(output.matches("let first_name").count(), 1, "{output}");
    assert!(output.contains("first_name = \"grace\";"), "{output}");
}

#[test]
fn user_declarations_shadow_builtins() {
    let output = emit("fn print (x) : x\ncall print(1)\n");
    assert!(output.contains("const print = $rt.stone("), "{output}");
    assert!(output.contains("\nprint($n1);\n"), "{output}");
}

#[test]
fn text_literals_are_escaped() {
    let output = emit("print('say \"hi\"\\n')\n");
    assert!(output.contains(r#"$rt.print("say \"hi\"\n");"#), "{output}");
}

#[test]
fn runtime_module_is_configurable() {
    let options = CompileOptions {
        runtime_module: "./runtime/index.mjs".to_string(),
        ..CompileOptions::default()
    };
    let output = emit_with(options, "print(1)\n");
    assert!(output.starts_with("import * as $rt from \"./runtime/index.mjs\";\n"));
}

#[test]
fn hoisted_constants_do_not_leak_between_runs() {
    let first = emit("print(7)\n");
    let second = emit("print('x')\n");
    assert!(first.contains("const $n7"));
    assert!(!second.contains("$n7"), "{second}");
    assert_eq!(emit("print(7)\n"), first);
}
