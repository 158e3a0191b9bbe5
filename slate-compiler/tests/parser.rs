use slate_compiler::{
    scan, BinaryOperator, Diagnostics, ErrorCategory, Expr, Member, Parser, Stmt, TypeExpr,
};

fn parse(source: &str) -> (Option<Vec<Stmt>>, Vec<String>) {
    let mut lexical = Diagnostics::new();
    let tokens = scan(source, &mut lexical);
    assert!(
        lexical.is_empty(),
        "expected no lexical errors, found {:?}",
        lexical.entries()
    );

    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    let messages = parser
        .diagnostics()
        .entries()
        .iter()
        .inspect(|diagnostic| assert_eq!(diagnostic.category, ErrorCategory::SyntaxError))
        .map(|diagnostic| diagnostic.message.clone())
        .collect();
    (statements, messages)
}

fn parse_ok(source: &str) -> Vec<Stmt> {
    let (statements, messages) = parse(source);
    assert!(messages.is_empty(), "unexpected syntax errors: {messages:?}");
    statements.expect("parser returned no statements")
}

fn expression_of(statement: &Stmt) -> &Expr {
    match statement {
        Stmt::Expression(stmt) => &stmt.expression,
        other => panic!("expected an expression statement, found {other:?}"),
    }
}

#[test]
fn prelude_splits_declaration_keywords() {
    let statements = parse_ok("var element nr : 1\nmut count : 0\n");
    assert_eq!(statements.len(), 2);

    let Stmt::VarDeclaration(first) = &statements[0] else {
        panic!("expected a declaration, found {:?}", statements[0]);
    };
    assert_eq!(first.name.lexeme, "element nr");
    assert_eq!(first.name.column, 4);
    assert!(!first.mutable);

    let Stmt::VarDeclaration(second) = &statements[1] else {
        panic!("expected a declaration, found {:?}", statements[1]);
    };
    assert_eq!(second.name.lexeme, "count");
    assert!(second.mutable);
}

#[test]
fn keyword_shaped_words_elsewhere_stay_identifiers() {
    let statements = parse_ok("var result : if value\n");
    let Stmt::VarDeclaration(declaration) = &statements[0] else {
        panic!("expected a declaration");
    };
    let Expr::Variable(variable) = &declaration.initializer else {
        panic!("expected a variable, found {:?}", declaration.initializer);
    };
    assert_eq!(variable.name.lexeme, "if value");
}

#[test]
fn parses_type_annotations() {
    let statements = parse_ok("var xs ([Number]) : [1]\nvar maybe (Text?) : null\nvar f ((Number) → Text) : text\n");

    let annotations: Vec<_> = statements
        .iter()
        .map(|statement| match statement {
            Stmt::VarDeclaration(declaration) => declaration.annotation.clone(),
            other => panic!("expected a declaration, found {other:?}"),
        })
        .collect();

    assert!(matches!(annotations[0], Some(TypeExpr::List { .. })));
    assert!(matches!(annotations[1], Some(TypeExpr::Maybe(_))));
    assert!(matches!(annotations[2], Some(TypeExpr::Function { .. })));
}

#[test]
fn let_targets_become_assign_or_set() {
    let statements = parse_ok("let x : 1\nlet point.y : 2\nlet xs[0] : 3\n");

    assert!(matches!(expression_of(&statements[0]), Expr::Assign(_)));
    match expression_of(&statements[1]) {
        Expr::Set(set) => assert!(matches!(set.member, Member::Field(_))),
        other => panic!("expected a member assignment, found {other:?}"),
    }
    match expression_of(&statements[2]) {
        Expr::Set(set) => assert!(matches!(set.member, Member::Index { .. })),
        other => panic!("expected an index assignment, found {other:?}"),
    }
}

#[test]
fn rejects_invalid_assignment_target() {
    let (statements, messages) = parse("let f(1) : 2\n");
    assert!(statements.is_none());
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("invalid assignment target"));
}

#[test]
fn call_requires_a_call_expression() {
    let statements = parse_ok("call print(1)\n");
    assert!(matches!(expression_of(&statements[0]), Expr::Call(_)));

    let (statements, messages) = parse("call print.name\n");
    assert!(statements.is_none());
    assert!(
        messages[0].contains("'call' must be followed by a function call"),
        "unexpected message {:?}",
        messages
    );
}

#[test]
fn if_chain_keeps_branch_order() {
    let source = "if a\n  print(1)\nelif b\n  print(2)\nelif c\n  print(3)\nelse\n  print(4)\n";
    let statements = parse_ok(source);
    assert_eq!(statements.len(), 1);

    let Stmt::If(chain) = &statements[0] else {
        panic!("expected an if statement");
    };
    let conditions: Vec<_> = chain
        .elif_branches
        .iter()
        .map(|branch| match &branch.condition {
            Expr::Variable(variable) => variable.name.lexeme.clone(),
            other => panic!("unexpected condition {other:?}"),
        })
        .collect();
    assert_eq!(conditions, vec!["b", "c"]);
    assert_eq!(chain.else_branch.as_ref().map(Vec::len), Some(1));
}

#[test]
fn else_without_if_is_rejected() {
    let (_, messages) = parse("else\n  print(1)\n");
    assert!(messages[0].contains("'else' without a matching 'if'"));
}

#[test]
fn break_is_only_valid_inside_a_loop() {
    parse_ok("while true\n  if done\n    break\n");

    let (statements, messages) = parse("break\n");
    assert!(statements.is_none());
    assert!(messages[0].contains("'break' outside of a loop"));

    let (_, messages) = parse("while true\n  fn stop ()\n    break\n");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("'break' outside of a loop"));
}

#[test]
fn ternary_is_right_associative() {
    let statements = parse_ok("var x : a ? 1 ! b ? 2 ! 3\n");
    let Stmt::VarDeclaration(declaration) = &statements[0] else {
        panic!("expected a declaration");
    };
    let Expr::Ternary(outer) = &declaration.initializer else {
        panic!("expected a conditional expression");
    };
    assert!(matches!(outer.else_branch.as_ref(), Expr::Ternary(_)));
}

#[test]
fn ternary_requires_bang() {
    let (_, messages) = parse("var x : a ? 1 : 2\n");
    assert!(messages[0].contains("expected '!' between the branches"));
}

#[test]
fn respects_operator_precedence() {
    let statements = parse_ok("var x : 1 + 2 * 3 ≥ 4 ∧ ok\n");
    let Stmt::VarDeclaration(declaration) = &statements[0] else {
        panic!("expected a declaration");
    };
    let Expr::Binary(and) = &declaration.initializer else {
        panic!("expected a binary expression");
    };
    assert_eq!(and.operator, BinaryOperator::And);
    let Expr::Binary(comparison) = and.left.as_ref() else {
        panic!("expected a comparison");
    };
    assert_eq!(comparison.operator, BinaryOperator::GreaterEqual);
    let Expr::Binary(sum) = comparison.left.as_ref() else {
        panic!("expected an addition");
    };
    assert_eq!(sum.operator, BinaryOperator::Add);
    assert!(matches!(sum.right.as_ref(), Expr::Binary(product) if product.operator == BinaryOperator::Multiply));
}

#[test]
fn literals_accept_soft_newline_separators() {
    let statements = parse_ok("var xs : [\n  1\n  2, 3\n]\nvar p : {\n  x: 1\n  y: 2\n}\n");

    let Stmt::VarDeclaration(list) = &statements[0] else {
        panic!("expected a declaration");
    };
    assert!(matches!(&list.initializer, Expr::List(literal) if literal.elements.len() == 3));

    let Stmt::VarDeclaration(record) = &statements[1] else {
        panic!("expected a declaration");
    };
    assert!(matches!(&record.initializer, Expr::Record(literal) if literal.fields.len() == 2));
}

#[test]
fn rejects_duplicate_record_fields() {
    let (_, messages) = parse("var p : {x: 1, x: 2}\n");
    assert!(messages[0].contains("duplicate field in record literal"));
}

#[test]
fn parses_call_and_member_chains() {
    let statements = parse_ok("table.rows[0](1)(2).name\n");
    let Expr::Get(get) = expression_of(&statements[0]) else {
        panic!("expected a member access");
    };
    assert!(matches!(get.object.as_ref(), Expr::Call(call) if matches!(call.callee.as_ref(), Expr::Call(_))));
}

#[test]
fn parses_function_declarations_and_literals() {
    let source = "fn add (a, b)\n  return a + b\nvar square : fn (n) : n * n\nvar log : fn ()\n  print('x')\n";
    let statements = parse_ok(source);
    assert_eq!(statements.len(), 3);

    let Stmt::FunctionDecl(declaration) = &statements[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(declaration.name.lexeme, "add");
    assert_eq!(declaration.function.parameters.len(), 2);

    let Stmt::VarDeclaration(square) = &statements[1] else {
        panic!("expected a declaration");
    };
    let Expr::Function(literal) = &square.initializer else {
        panic!("expected a function literal");
    };
    assert!(matches!(&literal.body[..], [Stmt::Return(_)]));

    let Stmt::VarDeclaration(log) = &statements[2] else {
        panic!("expected a declaration");
    };
    assert!(matches!(&log.initializer, Expr::Function(literal) if literal.parameters.is_empty()));
}

#[test]
fn return_value_is_optional() {
    let statements = parse_ok("fn f ()\n  return\n");
    let Stmt::FunctionDecl(declaration) = &statements[0] else {
        panic!("expected a function declaration");
    };
    assert!(matches!(&declaration.function.body[..], [Stmt::Return(stmt)] if stmt.value.is_none()));
}

#[test]
fn nested_indentation_forms_a_block() {
    let statements = parse_ok("print(1)\n  print(2)\n  print(3)\n");
    assert_eq!(statements.len(), 2);
    assert!(matches!(&statements[1], Stmt::Block(block) if block.statements.len() == 2));
}

#[test]
fn recovers_to_report_each_malformed_statement() {
    let (statements, messages) = parse("var : 1\nvar y :\nvar z : 3\n");
    assert!(statements.is_none());
    assert_eq!(messages.len(), 2, "unexpected messages {messages:?}");
    assert!(messages[0].contains("expected a name after 'var'"));
    assert!(messages[1].contains("expected an expression"));
}
