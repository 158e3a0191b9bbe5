pub mod mangle;

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::ast::*;
use crate::lexer::Literal;
use crate::stdlib::find_builtin;

/// Binding the runtime module is imported under.
pub const RUNTIME_BINDING: &str = "$rt";

const INDENT: &str = "  ";

/// Translates a checked program into an ES module.
///
/// All bookkeeping lives on the instance: each compilation gets its own generator,
/// so hoisted constants never leak between runs.
pub struct CodeGenerator {
    runtime_module: String,
    indent: usize,
    front_matter: Vec<String>,
    hoisted: HashSet<String>,
    body: String,
    /// Names the program declares, innermost scope last. A name found here
    /// shadows the builtin of the same name.
    scopes: Vec<HashSet<String>>,
}

impl CodeGenerator {
    pub fn new(runtime_module: impl Into<String>) -> Self {
        Self {
            runtime_module: runtime_module.into(),
            indent: 0,
            front_matter: Vec::new(),
            hoisted: HashSet::new(),
            body: String::new(),
            scopes: vec![HashSet::new()],
        }
    }

    pub fn generate(mut self, statements: &[Stmt]) -> String {
        for statement in statements {
            statement.accept(&mut self);
        }

        debug!(
            statements = statements.len(),
            constants = self.hoisted.len(),
            bytes = self.body.len(),
            "generated javascript"
        );

        let mut output = format!(
            "import * as {RUNTIME_BINDING} from {};\n",
            quote(&self.runtime_module)
        );
        for line in &self.front_matter {
            output.push_str(line);
            output.push('\n');
        }
        output.push_str(&self.body);
        output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.body.push_str(INDENT);
        }
        self.body.push_str(text);
        self.body.push('\n');
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_user_name(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn resolve(&self, name: &str) -> String {
        if !self.is_user_name(name) && find_builtin(name).is_some() {
            format!("{RUNTIME_BINDING}.{}", mangle::member(name))
        } else {
            mangle::identifier(name)
        }
    }

    fn number(&mut self, text: &str) -> String {
        let name = mangle::number_constant(text);
        if self.hoisted.insert(name.clone()) {
            trace!(constant = %name, literal = text, "hoisted numeric constant");
            self.front_matter.push(format!(
                "const {name} = {RUNTIME_BINDING}.num({});",
                quote(text)
            ));
        }
        name
    }

    /// Emit statements one level deeper inside a fresh scope.
    fn nested(&mut self, statements: &[Stmt], names: &[String]) {
        self.scopes.push(names.iter().cloned().collect());
        self.indent += 1;
        for statement in statements {
            statement.accept(self);
        }
        self.indent -= 1;
        self.scopes.pop();
    }

    /// Whether `expr` always produces a Boolean, so it can be used as a condition
    /// without a runtime assertion.
    fn is_boolean(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Binary(binary) => {
                binary.operator.is_comparison()
                    || binary.operator.is_equality()
                    || binary.operator.is_logical()
            }
            Expr::Unary(unary) => unary.operator == UnaryOperator::Not,
            Expr::Literal(literal) => matches!(literal.value, Literal::Boolean(_)),
            Expr::Grouping(grouping) => self.is_boolean(&grouping.expression),
            Expr::Call(call) => match call.callee.as_ref() {
                Expr::Variable(variable) => {
                    !self.is_user_name(&variable.name.lexeme)
                        && find_builtin(&variable.name.lexeme)
                            .is_some_and(|builtin| builtin.predicate)
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn condition(&mut self, expr: &Expr) -> String {
        let code = expr.accept(self);
        if self.is_boolean(expr) {
            code
        } else {
            format!("{RUNTIME_BINDING}.bool({code})")
        }
    }

    fn function_value(&mut self, function: &FunctionExpr) -> String {
        let names: Vec<String> = function
            .parameters
            .iter()
            .map(|parameter| parameter.lexeme.clone())
            .collect();
        let parameters = names
            .iter()
            .map(|name| mangle::identifier(name))
            .collect::<Vec<_>>()
            .join(", ");

        let outer = std::mem::take(&mut self.body);
        self.nested(&function.body, &names);
        let inner = std::mem::replace(&mut self.body, outer);

        let closing = INDENT.repeat(self.indent);
        format!("{RUNTIME_BINDING}.stone(({parameters}) => {{\n{inner}{closing}}})")
    }

    fn arguments(&mut self, arguments: &[Expr]) -> String {
        arguments
            .iter()
            .map(|argument| argument.accept(self))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn runtime_operator(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Add => "add",
        BinaryOperator::Subtract => "subtract",
        BinaryOperator::Multiply => "multiply",
        BinaryOperator::Divide => "divide",
        BinaryOperator::Remainder => "remainder",
        BinaryOperator::Equal => "equal",
        BinaryOperator::NotEqual => "notEqual",
        BinaryOperator::Less => "less",
        BinaryOperator::LessEqual => "lessEqual",
        BinaryOperator::Greater => "greater",
        BinaryOperator::GreaterEqual => "greaterEqual",
        BinaryOperator::And => "&&",
        BinaryOperator::Or => "||",
    }
}

impl ExprVisitor for CodeGenerator {
    type Output = String;

    fn visit_ternary(&mut self, expr: &TernaryExpr) -> String {
        let condition = self.condition(&expr.condition);
        let then_branch = expr.then_branch.accept(self);
        let else_branch = expr.else_branch.accept(self);
        format!("({condition} ? {then_branch} : {else_branch})")
    }

    fn visit_binary(&mut self, expr: &BinaryExpr) -> String {
        if expr.operator.is_logical() {
            let left = self.condition(&expr.left);
            let right = self.condition(&expr.right);
            return format!("({left} {} {right})", runtime_operator(expr.operator));
        }

        let left = expr.left.accept(self);
        let right = expr.right.accept(self);
        format!(
            "{RUNTIME_BINDING}.{}({left}, {right})",
            runtime_operator(expr.operator)
        )
    }

    fn visit_grouping(&mut self, expr: &GroupingExpr) -> String {
        format!("({})", expr.expression.accept(self))
    }

    fn visit_literal(&mut self, expr: &LiteralExpr) -> String {
        match &expr.value {
            Literal::Number(text) => self.number(text),
            Literal::Text(text) => quote(text),
            Literal::Boolean(value) => value.to_string(),
            Literal::Null => "null".to_string(),
        }
    }

    fn visit_unary(&mut self, expr: &UnaryExpr) -> String {
        match expr.operator {
            UnaryOperator::Negate => {
                let operand = expr.operand.accept(self);
                format!("{RUNTIME_BINDING}.negate({operand})")
            }
            UnaryOperator::Not => format!("!{}", self.condition(&expr.operand)),
        }
    }

    fn visit_variable(&mut self, expr: &VariableExpr) -> String {
        self.resolve(&expr.name.lexeme)
    }

    fn visit_assign(&mut self, expr: &AssignExpr) -> String {
        let value = expr.value.accept(self);
        format!("{} = {value}", mangle::identifier(&expr.name.lexeme))
    }

    fn visit_call(&mut self, expr: &CallExpr) -> String {
        let callee = expr.callee.accept(self);
        let arguments = self.arguments(&expr.arguments);
        format!("{callee}({arguments})")
    }

    fn visit_get(&mut self, expr: &GetExpr) -> String {
        let object = expr.object.accept(self);
        match &expr.member {
            Member::Field(name) => format!(
                "{RUNTIME_BINDING}.field({object}, {})",
                quote(&mangle::member(&name.lexeme))
            ),
            Member::Index { index, .. } => {
                let index = index.accept(self);
                format!("{RUNTIME_BINDING}.at({object}, {index})")
            }
        }
    }

    fn visit_set(&mut self, expr: &SetExpr) -> String {
        let object = expr.object.accept(self);
        match &expr.member {
            Member::Field(name) => {
                let value = expr.value.accept(self);
                format!("{object}.{} = {value}", mangle::member(&name.lexeme))
            }
            Member::Index { index, .. } => {
                let index = index.accept(self);
                let value = expr.value.accept(self);
                format!("{RUNTIME_BINDING}.put({object}, {index}, {value})")
            }
        }
    }

    fn visit_list(&mut self, expr: &ListLiteral) -> String {
        format!("[{}]", self.arguments(&expr.elements))
    }

    fn visit_record(&mut self, expr: &RecordLiteral) -> String {
        let mut code = String::from("(() => { const $r = Object.create(null); ");
        for field in &expr.fields {
            let value = field.value.accept(self);
            code.push_str(&format!(
                "$r.{} = {value}; ",
                mangle::member(&field.key.lexeme)
            ));
        }
        code.push_str("return $r; })()");
        code
    }

    fn visit_function(&mut self, expr: &FunctionExpr) -> String {
        self.function_value(expr)
    }
}

impl StmtVisitor for CodeGenerator {
    type Output = ();

    fn visit_expression_stmt(&mut self, stmt: &ExpressionStmt) {
        let code = stmt.expression.accept(self);
        self.line(&format!("{code};"));
    }

    fn visit_block(&mut self, stmt: &BlockStmt) {
        self.line("{");
        self.nested(&stmt.statements, &[]);
        self.line("}");
    }

    fn visit_if(&mut self, stmt: &IfStmt) {
        let condition = self.condition(&stmt.condition);
        self.line(&format!("if ({condition}) {{"));
        self.nested(&stmt.then_branch, &[]);

        for branch in &stmt.elif_branches {
            let condition = self.condition(&branch.condition);
            self.line(&format!("}} else if ({condition}) {{"));
            self.nested(&branch.body, &[]);
        }

        if let Some(else_branch) = &stmt.else_branch {
            self.line("} else {");
            self.nested(else_branch, &[]);
        }
        self.line("}");
    }

    fn visit_while(&mut self, stmt: &WhileStmt) {
        let condition = self.condition(&stmt.condition);
        self.line(&format!("while ({condition}) {{"));
        self.nested(&stmt.body, &[]);
        self.line("}");
    }

    fn visit_break(&mut self, _stmt: &BreakStmt) {
        self.line("break;");
    }

    fn visit_function_decl(&mut self, stmt: &FunctionDecl) {
        self.declare(&stmt.name.lexeme);
        let function = self.function_value(&stmt.function);
        let name = mangle::identifier(&stmt.name.lexeme);
        self.line(&format!("const {name} = {function};"));
    }

    fn visit_return(&mut self, stmt: &ReturnStmt) {
        match &stmt.value {
            Some(value) => {
                let value = value.accept(self);
                self.line(&format!("return {value};"));
            }
            None => self.line("return null;"),
        }
    }

    fn visit_var_declaration(&mut self, stmt: &VarDeclaration) {
        let initializer = stmt.initializer.accept(self);
        self.declare(&stmt.name.lexeme);
        let keyword = if stmt.mutable { "let" } else { "const" };
        let name = mangle::identifier(&stmt.name.lexeme);
        self.line(&format!("{keyword} {name} = {initializer};"));
    }
}
