use crate::lexer::is_word_joiner;

/// Prefix for source names that collide with a JavaScript reserved word or a
/// global the generated code relies on. Source identifiers cannot contain `$`, so
/// prefixed names never clash with user names.
pub const RESERVED_PREFIX: &str = "$$";

const JS_RESERVED: &[&str] = &[
    "arguments",
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "eval",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "implements",
    "import",
    "in",
    "Infinity",
    "instanceof",
    "interface",
    "let",
    "NaN",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "undefined",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

/// Globals referenced by generated code itself; a binding with one of these
/// names would shadow them for the rest of the module.
const GENERATED_CODE_GLOBALS: &[&str] = &["Object", "globalThis"];

/// Name of a binding in generated code: joiners and a trailing `?` become `_`,
/// and reserved words are prefixed.
pub fn identifier(name: &str) -> String {
    let bare = member(name);
    let collides = JS_RESERVED.contains(&bare.as_str())
        || GENERATED_CODE_GLOBALS.contains(&bare.as_str());
    if collides {
        format!("{RESERVED_PREFIX}{bare}")
    } else {
        bare
    }
}

/// Property names may be reserved words, so they only need the joiner rewrite.
pub fn member(name: &str) -> String {
    name.chars()
        .map(|ch| if is_word_joiner(ch) || ch == '?' { '_' } else { ch })
        .collect()
}

/// Constant name for a numeric literal, derived from its exact text:
/// `3e-10` becomes `$n3em10`, `1.5` becomes `$n1_5`.
pub fn number_constant(text: &str) -> String {
    let mut name = String::from("$n");
    for ch in text.chars() {
        name.push(match ch {
            '.' => '_',
            '-' => 'm',
            '+' => 'p',
            other => other,
        });
    }
    name
}
