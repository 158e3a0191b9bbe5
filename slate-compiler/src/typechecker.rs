use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::diagnostics::{Diagnostics, ErrorCategory, ErrorSink};
use crate::environment::{Binding, Environment, ScopeKind};
use crate::lexer::{Literal, Token};
use crate::stdlib::BUILTINS;
use crate::types::{record_field, FunctionType, Primitive, Substitution, Type, TypeVar};

/// A type error. It aborts the top-level statement it was found in; checking
/// resumes with the next one.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TypeError {
    pub token: Token,
    pub message: String,
}

impl TypeError {
    fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            token: token.clone(),
            message: message.into(),
        }
    }
}

type CheckResult<T> = Result<T, TypeError>;

/// The type recorded for a declared binding, kept beside the AST rather than on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub line: usize,
    pub column: usize,
    pub mutable: bool,
    pub ty: Type,
}

pub struct TypeChecker {
    environment: Rc<Environment>,
    diagnostics: Diagnostics,
    declarations: Vec<Declaration>,
    next_var: u32,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        let builtins = Environment::global();
        let mut next_var = 0u32;
        for function in BUILTINS {
            let ty = function.signature(&mut || {
                let var = TypeVar(next_var);
                next_var += 1;
                var
            });
            builtins.define(function.name, Binding { mutable: false, ty });
        }

        Self {
            environment: Environment::child(&builtins, ScopeKind::Global),
            diagnostics: Diagnostics::new(),
            declarations: Vec::new(),
            next_var,
        }
    }

    /// Check every top-level statement. An error is recorded once for the
    /// statement it occurs in and does not stop its siblings from being checked.
    pub fn check(&mut self, statements: &[Stmt]) {
        for statement in statements {
            if let Err(error) = statement.accept(self) {
                self.diagnostics.token_error(
                    &error.token,
                    &error.message,
                    ErrorCategory::CompileError,
                    true,
                );
                self.declare_after_failure(statement);
            }
        }

        debug!(
            statements = statements.len(),
            errors = self.diagnostics.count(ErrorCategory::CompileError),
            declarations = self.declarations.len(),
            "checked program"
        );
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn into_parts(self) -> (Diagnostics, Vec<Declaration>) {
        (self.diagnostics, self.declarations)
    }

    /// Keep a failed declaration's name in scope with an unresolved type, so later
    /// uses are not reported as undeclared.
    fn declare_after_failure(&mut self, statement: &Stmt) {
        let (name, mutable) = match statement {
            Stmt::VarDeclaration(declaration) => (&declaration.name, declaration.mutable),
            Stmt::FunctionDecl(declaration) => (&declaration.name, false),
            _ => return,
        };
        if !self.environment.declares(&name.lexeme) {
            let ty = self.fresh_type();
            self.environment
                .define(&name.lexeme, Binding { mutable, ty });
        }
    }

    fn fresh_var(&mut self) -> TypeVar {
        let var = TypeVar(self.next_var);
        self.next_var += 1;
        var
    }

    fn fresh_type(&mut self) -> Type {
        Type::Variable(self.fresh_var())
    }

    fn in_scope<T>(
        &mut self,
        kind: ScopeKind,
        body: impl FnOnce(&mut Self) -> CheckResult<T>,
    ) -> CheckResult<T> {
        let enclosing = Rc::clone(&self.environment);
        self.environment = Environment::child(&enclosing, kind);
        let result = body(self);
        self.environment = enclosing;
        result
    }

    fn check_block(&mut self, statements: &[Stmt]) -> CheckResult<()> {
        self.in_scope(ScopeKind::Block, |checker| {
            statements
                .iter()
                .try_for_each(|statement| statement.accept(checker))
        })
    }

    fn check_condition(&mut self, condition: &Expr) -> CheckResult<()> {
        let ty = condition.accept(self)?;
        if ty.compatible(&Type::BOOLEAN) {
            Ok(())
        } else {
            Err(TypeError::new(
                condition.anchor(),
                format!("condition must be Boolean, found {ty}"),
            ))
        }
    }

    fn declare(&mut self, name: &Token, mutable: bool, ty: Type) -> CheckResult<()> {
        if !self.environment.declare(
            &name.lexeme,
            Binding {
                mutable,
                ty: ty.clone(),
            },
        ) {
            return Err(TypeError::new(
                name,
                format!("duplicated declaration of '{}'", name.lexeme),
            ));
        }
        self.record(name, mutable, ty);
        Ok(())
    }

    fn record(&mut self, name: &Token, mutable: bool, ty: Type) {
        self.declarations.push(Declaration {
            name: name.lexeme.clone(),
            line: name.line,
            column: name.column,
            mutable,
            ty,
        });
    }

    fn ensure_not_declared(&self, name: &Token) -> CheckResult<()> {
        if self.environment.declares(&name.lexeme) {
            Err(TypeError::new(
                name,
                format!("duplicated declaration of '{}'", name.lexeme),
            ))
        } else {
            Ok(())
        }
    }

    fn lookup(&self, name: &Token) -> CheckResult<Binding> {
        self.environment
            .lookup(&name.lexeme)
            .ok_or_else(|| TypeError::new(name, format!("undeclared name '{}'", name.lexeme)))
    }

    /// Check a function body against fresh parameter variables and build its
    /// curried type. `placeholder` reuses the variables a declaration already
    /// published for recursive calls.
    fn check_function(
        &mut self,
        function: &FunctionExpr,
        placeholder: Option<Vec<Type>>,
    ) -> CheckResult<Type> {
        let parameters = match placeholder {
            Some(parameters) => parameters,
            None => function
                .parameters
                .iter()
                .map(|_| self.fresh_type())
                .collect(),
        };

        let result = self.in_scope(ScopeKind::Function, |checker| {
            for (name, ty) in function.parameters.iter().zip(&parameters) {
                if !checker.environment.declare(
                    &name.lexeme,
                    Binding {
                        mutable: false,
                        ty: ty.clone(),
                    },
                ) {
                    return Err(TypeError::new(
                        name,
                        format!("duplicated declaration of '{}'", name.lexeme),
                    ));
                }
            }
            for statement in &function.body {
                statement.accept(checker)?;
            }
            Ok(checker.environment.return_type().unwrap_or(Type::Nil))
        })?;

        Ok(Type::function(parameters, result))
    }

    fn resolve_annotation(&self, annotation: &TypeExpr) -> Type {
        match annotation {
            TypeExpr::Named { name, arguments } => match (name.lexeme.as_str(), arguments.len()) {
                ("Number", 0) => Type::NUMBER,
                ("Text", 0) => Type::TEXT,
                ("Boolean", 0) => Type::BOOLEAN,
                ("Nil", 0) => Type::Nil,
                _ => Type::Custom(
                    name.lexeme.clone(),
                    arguments
                        .iter()
                        .map(|argument| self.resolve_annotation(argument))
                        .collect(),
                ),
            },
            TypeExpr::List { element, .. } => Type::list(self.resolve_annotation(element)),
            TypeExpr::Record { fields, .. } => Type::Record(
                fields
                    .iter()
                    .map(|(key, ty)| (key.lexeme.clone(), self.resolve_annotation(ty)))
                    .collect(),
            ),
            TypeExpr::Function {
                parameters, result, ..
            } => Type::function(
                parameters
                    .iter()
                    .map(|parameter| self.resolve_annotation(parameter))
                    .collect(),
                self.resolve_annotation(result),
            ),
            TypeExpr::Maybe(inner) => Type::maybe(self.resolve_annotation(inner)),
        }
    }

    fn numeric_operand(&self, operator: &Token, ty: &Type) -> CheckResult<()> {
        if ty.compatible(&Type::NUMBER) {
            Ok(())
        } else {
            Err(TypeError::new(
                operator,
                format!("operator '{}' expects Number operands, found {ty}", operator.lexeme),
            ))
        }
    }

    fn check_member(&mut self, object_ty: &Type, member: &Member) -> CheckResult<Type> {
        match (object_ty, member) {
            // Nothing ties the element type of an unresolved list to its uses.
            (Type::Variable(_), Member::Index { index, .. }) => {
                index.accept(self)?;
                Ok(self.fresh_type())
            }
            (Type::Variable(_), Member::Field(_)) => Ok(self.fresh_type()),
            (Type::Record(fields), Member::Field(name)) => record_field(fields, &name.lexeme)
                .cloned()
                .ok_or_else(|| {
                    TypeError::new(name, format!("record has no field '{}'", name.lexeme))
                }),
            (Type::List(element), Member::Index { bracket, index }) => {
                let index_ty = index.accept(self)?;
                if !index_ty.compatible(&Type::NUMBER) {
                    return Err(TypeError::new(
                        bracket,
                        format!("list index must be Number, found {index_ty}"),
                    ));
                }
                Ok(element.as_ref().clone())
            }
            (Type::List(_), Member::Field(name)) => Err(TypeError::new(
                name,
                format!("a list has no field '{}'", name.lexeme),
            )),
            (Type::Record(_), Member::Index { bracket, .. }) => Err(TypeError::new(
                bracket,
                "record fields are accessed with '.name'",
            )),
            (other, member) => Err(TypeError::new(
                member.token(),
                format!("cannot access a member of a value of type {other}"),
            )),
        }
    }

    /// Follow a chain of member accesses down to the binding it starts from.
    fn assignment_root(expression: &Expr) -> Option<&Token> {
        match expression {
            Expr::Variable(variable) => Some(&variable.name),
            Expr::Get(get) => Self::assignment_root(&get.object),
            Expr::Grouping(grouping) => Self::assignment_root(&grouping.expression),
            _ => None,
        }
    }
}

/// Pin `expected` against `actual` for one call. A variable binds on first use; a
/// later use must agree with the bound type unless that is itself still a
/// variable, in which case it is re-pinned.
fn bind(expected: &Type, actual: &Type, substitution: &mut Substitution) -> bool {
    match expected {
        Type::Variable(var) => match substitution.get(*var) {
            None => {
                substitution.insert(*var, actual.clone());
                true
            }
            Some(Type::Variable(_)) => {
                substitution.insert(*var, actual.clone());
                true
            }
            Some(bound) => {
                let bound = bound.clone();
                bind(&bound, actual, substitution)
            }
        },
        _ if actual.is_variable() => true,
        Type::List(element) => match actual {
            Type::List(actual_element) => bind(element, actual_element, substitution),
            _ => false,
        },
        Type::Maybe(inner) => match actual {
            Type::Nil => true,
            Type::Maybe(actual_inner) => bind(inner, actual_inner, substitution),
            other => bind(inner, other, substitution),
        },
        Type::Record(fields) => match actual {
            Type::Record(actual_fields) if actual_fields.len() == fields.len() => {
                fields.iter().all(|(key, ty)| {
                    record_field(actual_fields, key)
                        .is_some_and(|actual_ty| bind(ty, actual_ty, substitution))
                })
            }
            _ => false,
        },
        Type::Function(function) => match actual {
            Type::Function(actual_function) => {
                function.terminal == actual_function.terminal
                    && bind(&function.input, &actual_function.input, substitution)
                    && bind(&function.output, &actual_function.output, substitution)
            }
            _ => false,
        },
        Type::Custom(name, params) => match actual {
            Type::Custom(actual_name, actual_params) => {
                name == actual_name
                    && params.len() == actual_params.len()
                    && params
                        .iter()
                        .zip(actual_params)
                        .all(|(param, actual_param)| bind(param, actual_param, substitution))
            }
            _ => false,
        },
        Type::Primitive(_) | Type::Nil => expected.compatible(actual),
    }
}

/// Whether a chain is a parameterless function, which takes a single `Nil`.
fn is_nullary(function: &FunctionType) -> bool {
    function.terminal && matches!(function.input.as_ref(), Type::Nil)
}

impl ExprVisitor for TypeChecker {
    type Output = CheckResult<Type>;

    fn visit_ternary(&mut self, expr: &TernaryExpr) -> CheckResult<Type> {
        self.check_condition(&expr.condition)?;
        let then_ty = expr.then_branch.accept(self)?;
        let else_ty = expr.else_branch.accept(self)?;

        match (&then_ty, &else_ty) {
            (Type::Nil, Type::Nil) => Ok(Type::Nil),
            (Type::Nil, other) | (other, Type::Nil) if !matches!(other, Type::Maybe(_)) => {
                Ok(Type::maybe(other.clone()))
            }
            _ if then_ty.compatible(&else_ty) => {
                Ok(if then_ty.is_variable() { else_ty } else { then_ty })
            }
            _ => Err(TypeError::new(
                &expr.question,
                format!(
                    "branches of a conditional expression have different types: {then_ty} and {else_ty}"
                ),
            )),
        }
    }

    fn visit_binary(&mut self, expr: &BinaryExpr) -> CheckResult<Type> {
        let left = expr.left.accept(self)?;
        let right = expr.right.accept(self)?;
        let operator = &expr.operator_token;

        match expr.operator {
            BinaryOperator::Add
                if matches!(
                    (&left, &right),
                    (Type::Primitive(Primitive::Text), _) | (_, Type::Primitive(Primitive::Text))
                ) =>
            {
                if left.compatible(&Type::TEXT) && right.compatible(&Type::TEXT) {
                    Ok(Type::TEXT)
                } else {
                    Err(TypeError::new(
                        operator,
                        format!("cannot add {left} and {right}"),
                    ))
                }
            }
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Remainder => {
                self.numeric_operand(operator, &left)?;
                self.numeric_operand(operator, &right)?;
                Ok(Type::NUMBER)
            }
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => {
                let comparable = left.compatible(&right)
                    && (left.compatible(&Type::NUMBER) || left.compatible(&Type::TEXT))
                    && (right.compatible(&Type::NUMBER) || right.compatible(&Type::TEXT));
                if comparable {
                    Ok(Type::BOOLEAN)
                } else {
                    Err(TypeError::new(
                        operator,
                        format!("cannot order {left} and {right}"),
                    ))
                }
            }
            BinaryOperator::Equal | BinaryOperator::NotEqual => {
                let comparable = left.compatible(&right)
                    || matches!((&left, &right), (Type::Maybe(_), Type::Nil) | (Type::Nil, Type::Maybe(_)))
                    || matches!(&left, Type::Maybe(inner) if inner.compatible(&right))
                    || matches!(&right, Type::Maybe(inner) if inner.compatible(&left));
                if comparable {
                    Ok(Type::BOOLEAN)
                } else {
                    Err(TypeError::new(
                        operator,
                        format!("cannot compare {left} with {right}"),
                    ))
                }
            }
            BinaryOperator::And | BinaryOperator::Or => {
                for ty in [&left, &right] {
                    if !ty.compatible(&Type::BOOLEAN) {
                        return Err(TypeError::new(
                            operator,
                            format!("operator '{}' expects Boolean operands, found {ty}", operator.lexeme),
                        ));
                    }
                }
                Ok(Type::BOOLEAN)
            }
        }
    }

    fn visit_grouping(&mut self, expr: &GroupingExpr) -> CheckResult<Type> {
        expr.expression.accept(self)
    }

    fn visit_literal(&mut self, expr: &LiteralExpr) -> CheckResult<Type> {
        Ok(match expr.value {
            Literal::Number(_) => Type::NUMBER,
            Literal::Text(_) => Type::TEXT,
            Literal::Boolean(_) => Type::BOOLEAN,
            Literal::Null => Type::Nil,
        })
    }

    fn visit_unary(&mut self, expr: &UnaryExpr) -> CheckResult<Type> {
        let operand = expr.operand.accept(self)?;
        match expr.operator {
            UnaryOperator::Negate => {
                self.numeric_operand(&expr.operator_token, &operand)?;
                Ok(Type::NUMBER)
            }
            UnaryOperator::Not => {
                if operand.compatible(&Type::BOOLEAN) {
                    Ok(Type::BOOLEAN)
                } else {
                    Err(TypeError::new(
                        &expr.operator_token,
                        format!("operator '!' expects a Boolean operand, found {operand}"),
                    ))
                }
            }
        }
    }

    fn visit_variable(&mut self, expr: &VariableExpr) -> CheckResult<Type> {
        Ok(self.lookup(&expr.name)?.ty)
    }

    fn visit_assign(&mut self, expr: &AssignExpr) -> CheckResult<Type> {
        let binding = self.lookup(&expr.name)?;
        if !binding.mutable {
            return Err(TypeError::new(
                &expr.name,
                format!("cannot assign to immutable binding '{}'", expr.name.lexeme),
            ));
        }

        let value = expr.value.accept(self)?;
        if !binding.ty.accepts(&value) {
            return Err(TypeError::new(
                &expr.name,
                format!(
                    "cannot assign {value} to '{}' of type {}",
                    expr.name.lexeme, binding.ty
                ),
            ));
        }
        Ok(value)
    }

    fn visit_call(&mut self, expr: &CallExpr) -> CheckResult<Type> {
        let callee = expr.callee.accept(self)?;
        let arguments = expr
            .arguments
            .iter()
            .map(|argument| argument.accept(self))
            .collect::<CheckResult<Vec<_>>>()?;

        let function = match &callee {
            Type::Variable(_) => return Ok(self.fresh_type()),
            Type::Function(function) => function,
            other => {
                return Err(TypeError::new(
                    &expr.paren,
                    format!("cannot call a value of type {other}"),
                ))
            }
        };

        let Some((parameters, result)) = callee.signature() else {
            return Ok(self.fresh_type());
        };
        let nullary = is_nullary(function);
        let expected = if nullary { 0 } else { parameters.len() };
        let arity_matches = arguments.len() == expected
            || (nullary && arguments.len() == 1 && matches!(arguments[0], Type::Nil));
        if !arity_matches {
            return Err(TypeError::new(
                &expr.paren,
                format!(
                    "wrong number of arguments: expected {expected}, found {}",
                    arguments.len()
                ),
            ));
        }

        let mut substitution = Substitution::new();
        for (position, (parameter, argument)) in parameters.iter().zip(&arguments).enumerate() {
            if !bind(parameter, argument, &mut substitution) {
                let anchor = expr.arguments[position].anchor();
                return Err(TypeError::new(
                    anchor,
                    format!(
                        "argument {}: expected {}, found {argument}",
                        position + 1,
                        substitution.apply(parameter)
                    ),
                ));
            }
        }

        Ok(substitution.apply(result))
    }

    fn visit_get(&mut self, expr: &GetExpr) -> CheckResult<Type> {
        let object = expr.object.accept(self)?;
        self.check_member(&object, &expr.member)
    }

    fn visit_set(&mut self, expr: &SetExpr) -> CheckResult<Type> {
        if let Some(root) = Self::assignment_root(&expr.object) {
            let binding = self.lookup(root)?;
            if !binding.mutable {
                return Err(TypeError::new(
                    root,
                    format!("cannot assign to immutable binding '{}'", root.lexeme),
                ));
            }
        }

        let object = expr.object.accept(self)?;
        let member = self.check_member(&object, &expr.member)?;
        let value = expr.value.accept(self)?;
        if !member.accepts(&value) {
            return Err(TypeError::new(
                expr.member.token(),
                format!("cannot assign {value} to a member of type {member}"),
            ));
        }
        Ok(value)
    }

    fn visit_list(&mut self, expr: &ListLiteral) -> CheckResult<Type> {
        let mut element: Option<Type> = None;
        for item in &expr.elements {
            let ty = item.accept(self)?;
            element = match element {
                None => Some(ty),
                Some(current) if current.compatible(&ty) => {
                    Some(if current.is_variable() { ty } else { current })
                }
                Some(current) => {
                    return Err(TypeError::new(
                        item.anchor(),
                        format!("list elements have different types: {current} and {ty}"),
                    ))
                }
            };
        }

        let element = match element {
            Some(ty) => ty,
            None => self.fresh_type(),
        };
        Ok(Type::list(element))
    }

    fn visit_record(&mut self, expr: &RecordLiteral) -> CheckResult<Type> {
        let fields = expr
            .fields
            .iter()
            .map(|field| -> CheckResult<(String, Type)> {
                Ok((field.key.lexeme.clone(), field.value.accept(self)?))
            })
            .collect::<CheckResult<Vec<_>>>()?;
        Ok(Type::Record(fields))
    }

    fn visit_function(&mut self, expr: &FunctionExpr) -> CheckResult<Type> {
        self.check_function(expr, None)
    }
}

impl StmtVisitor for TypeChecker {
    type Output = CheckResult<()>;

    fn visit_expression_stmt(&mut self, stmt: &ExpressionStmt) -> CheckResult<()> {
        stmt.expression.accept(self).map(|_| ())
    }

    fn visit_block(&mut self, stmt: &BlockStmt) -> CheckResult<()> {
        self.check_block(&stmt.statements)
    }

    fn visit_if(&mut self, stmt: &IfStmt) -> CheckResult<()> {
        self.check_condition(&stmt.condition)?;
        self.check_block(&stmt.then_branch)?;
        for branch in &stmt.elif_branches {
            self.check_condition(&branch.condition)?;
            self.check_block(&branch.body)?;
        }
        if let Some(else_branch) = &stmt.else_branch {
            self.check_block(else_branch)?;
        }
        Ok(())
    }

    fn visit_while(&mut self, stmt: &WhileStmt) -> CheckResult<()> {
        self.check_condition(&stmt.condition)?;
        self.check_block(&stmt.body)
    }

    fn visit_break(&mut self, _stmt: &BreakStmt) -> CheckResult<()> {
        Ok(())
    }

    fn visit_function_decl(&mut self, stmt: &FunctionDecl) -> CheckResult<()> {
        self.ensure_not_declared(&stmt.name)?;

        let parameters: Vec<Type> = stmt
            .function
            .parameters
            .iter()
            .map(|_| self.fresh_type())
            .collect();
        let result = self.fresh_type();
        let placeholder = Type::function(parameters.clone(), result);
        self.environment.define(
            &stmt.name.lexeme,
            Binding {
                mutable: false,
                ty: placeholder,
            },
        );

        let ty = self.check_function(&stmt.function, Some(parameters))?;
        self.environment.define(
            &stmt.name.lexeme,
            Binding {
                mutable: false,
                ty: ty.clone(),
            },
        );
        self.record(&stmt.name, false, ty);
        Ok(())
    }

    fn visit_return(&mut self, stmt: &ReturnStmt) -> CheckResult<()> {
        let Some(function) = self.environment.function_scope() else {
            return Err(TypeError::new(
                &stmt.keyword,
                "'return' outside of a function",
            ));
        };

        let ty = match &stmt.value {
            Some(value) => value.accept(self)?,
            None => Type::Nil,
        };

        match function.return_type() {
            None => function.set_return_type(ty),
            Some(existing) if existing.compatible(&ty) => {
                if existing.is_variable() && !ty.is_variable() {
                    function.set_return_type(ty);
                }
            }
            Some(existing) => {
                let anchor = stmt
                    .value
                    .as_ref()
                    .map(Expr::anchor)
                    .unwrap_or(&stmt.keyword);
                return Err(TypeError::new(
                    anchor,
                    format!("inconsistent return types: expected {existing}, found {ty}"),
                ));
            }
        }
        Ok(())
    }

    fn visit_var_declaration(&mut self, stmt: &VarDeclaration) -> CheckResult<()> {
        self.ensure_not_declared(&stmt.name)?;
        let inferred = stmt.initializer.accept(self)?;

        let ty = match &stmt.annotation {
            Some(annotation) => {
                let declared = self.resolve_annotation(annotation);
                if !declared.accepts(&inferred) {
                    return Err(TypeError::new(
                        &stmt.name,
                        format!(
                            "declared type {declared} does not match inferred type {inferred}"
                        ),
                    ));
                }
                declared
            }
            None => inferred,
        };

        self.declare(&stmt.name, stmt.mutable, ty)
    }
}
