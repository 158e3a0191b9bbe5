mod prelude;

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::diagnostics::{Diagnostics, ErrorCategory, ErrorSink};
use crate::lexer::{Keyword, Literal, Token, TokenKind};

/// A grammar violation. Raised from deep inside the descent and caught at the
/// nearest statement boundary, where it is reported and the parser resynchronises.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

type ParseResult<T> = Result<T, ParseError>;

const EQUALITY: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Equal, BinaryOperator::Equal),
    (TokenKind::NotEqual, BinaryOperator::NotEqual),
];

const COMPARISON: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Less, BinaryOperator::Less),
    (TokenKind::LessEqual, BinaryOperator::LessEqual),
    (TokenKind::Greater, BinaryOperator::Greater),
    (TokenKind::GreaterEqual, BinaryOperator::GreaterEqual),
];

const ADDITIVE: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Plus, BinaryOperator::Add),
    (TokenKind::Minus, BinaryOperator::Subtract),
];

const MULTIPLICATIVE: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Star, BinaryOperator::Multiply),
    (TokenKind::Slash, BinaryOperator::Divide),
    (TokenKind::Percent, BinaryOperator::Remainder),
];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    previous: Option<usize>,
    /// Whether a soft newline was skipped right before the current token.
    soft_break: bool,
    loop_depth: usize,
    diagnostics: Diagnostics,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let (line, column) = tokens
                .last()
                .map(|token| (token.line, token.column))
                .unwrap_or((1, 0));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        let mut parser = Self {
            tokens,
            current: 0,
            previous: None,
            soft_break: false,
            loop_depth: 0,
            diagnostics: Diagnostics::new(),
        };
        parser.skip_soft_newlines();
        parser
    }

    /// Parse every statement. Syntax errors are reported and parsing resumes at the
    /// next statement; the result is `None` when any error was reported.
    pub fn parse(&mut self) -> Option<Vec<Stmt>> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            if self.check(TokenKind::Dedent) {
                self.advance();
                continue;
            }
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }

        let errors = self.diagnostics.count(ErrorCategory::SyntaxError);
        debug!(statements = statements.len(), errors, "parsed program");
        if self.diagnostics.had_error() {
            None
        } else {
            Some(statements)
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn declaration(&mut self) -> Option<Stmt> {
        match self.statement() {
            Ok(statement) => Some(statement),
            Err(error) => {
                self.diagnostics.token_error(
                    &error.token,
                    &error.message,
                    ErrorCategory::SyntaxError,
                    true,
                );
                self.synchronize();
                None
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        prelude::reclassify(&mut self.tokens, self.current);

        match self.peek_kind() {
            TokenKind::Indent => {
                self.advance();
                let statements = self.block_body();
                Ok(Stmt::Block(BlockStmt { statements }))
            }
            TokenKind::Keyword(Keyword::Var) => self.var_declaration(false),
            TokenKind::Keyword(Keyword::Mut) => self.var_declaration(true),
            TokenKind::Keyword(Keyword::Let) => self.assignment(),
            TokenKind::Keyword(Keyword::Call) => self.call_statement(),
            TokenKind::Keyword(Keyword::If) => self.if_statement(),
            TokenKind::Keyword(Keyword::While) => self.while_statement(),
            TokenKind::Keyword(Keyword::Break) => self.break_statement(),
            TokenKind::Keyword(Keyword::Return) => self.return_statement(),
            TokenKind::Keyword(keyword @ (Keyword::Elif | Keyword::Else)) => {
                Err(self.error_at_current(&format!("'{keyword}' without a matching 'if'")))
            }
            TokenKind::Fn if self.peek_kind_at(1) == Some(TokenKind::Identifier) => {
                self.function_declaration()
            }
            _ => {
                let expression = self.expression()?;
                self.end_statement()?;
                Ok(Stmt::Expression(ExpressionStmt { expression }))
            }
        }
    }

    fn var_declaration(&mut self, mutable: bool) -> ParseResult<Stmt> {
        let keyword = self.advance().lexeme.clone();
        let name = self.expect(
            TokenKind::Identifier,
            &format!("expected a name after '{keyword}'"),
        )?;

        let annotation = if self.check(TokenKind::LeftParen) {
            self.advance();
            let annotation = self.type_expr()?;
            self.expect(TokenKind::RightParen, "expected ')' after the declared type")?;
            Some(annotation)
        } else {
            None
        };

        self.expect(TokenKind::Colon, "expected ':' after the declared name")?;
        let initializer = self.expression()?;
        self.end_statement()?;

        Ok(Stmt::VarDeclaration(VarDeclaration {
            name,
            annotation,
            initializer,
            mutable,
        }))
    }

    fn assignment(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let target = self.chain(false)?;
        self.expect(TokenKind::Colon, "expected ':' after the assignment target")?;
        let value = Box::new(self.expression()?);

        let expression = match target {
            Expr::Variable(variable) => Expr::Assign(AssignExpr {
                name: variable.name,
                value,
            }),
            Expr::Get(get) => Expr::Set(SetExpr {
                object: get.object,
                member: get.member,
                value,
            }),
            other => {
                return Err(ParseError {
                    token: other.anchor().clone(),
                    message: "invalid assignment target".to_string(),
                })
            }
        };

        self.end_statement()?;
        Ok(Stmt::Expression(ExpressionStmt { expression }))
    }

    fn call_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let expression = self.chain(true)?;
        if !matches!(expression, Expr::Call(_)) {
            return Err(ParseError {
                token: keyword,
                message: "'call' must be followed by a function call".to_string(),
            });
        }
        self.end_statement()?;
        Ok(Stmt::Expression(ExpressionStmt { expression }))
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let condition = self.expression()?;
        let then_branch = self.block()?;

        let mut elif_branches = Vec::new();
        let mut else_branch = None;
        loop {
            prelude::reclassify(&mut self.tokens, self.current);
            match self.peek_kind() {
                TokenKind::Keyword(Keyword::Elif) => {
                    let keyword = self.advance().clone();
                    let condition = self.expression()?;
                    let body = self.block()?;
                    elif_branches.push(ElifBranch {
                        keyword,
                        condition,
                        body,
                    });
                }
                TokenKind::Keyword(Keyword::Else) => {
                    self.advance();
                    else_branch = Some(self.block()?);
                    break;
                }
                _ => break,
            }
        }

        Ok(Stmt::If(IfStmt {
            keyword,
            condition,
            then_branch,
            elif_branches,
            else_branch,
        }))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let condition = self.expression()?;

        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;

        Ok(Stmt::While(WhileStmt {
            keyword,
            condition,
            body: body?,
        }))
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        if self.loop_depth == 0 {
            self.report(&keyword, "'break' outside of a loop");
        }
        self.end_statement()?;
        Ok(Stmt::Break(BreakStmt { keyword }))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.expression()?)
        };
        self.end_statement()?;
        Ok(Stmt::Return(ReturnStmt { keyword, value }))
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let keyword = self.advance().clone();
        let name = self.advance().clone();
        let parameters = self.parameters()?;
        let body = self.function_body()?;
        self.end_statement()?;

        Ok(Stmt::FunctionDecl(FunctionDecl {
            name,
            function: FunctionExpr {
                keyword,
                parameters,
                body,
            },
        }))
    }

    fn parameters(&mut self) -> ParseResult<Vec<Token>> {
        self.expect(TokenKind::LeftParen, "expected '(' before the parameter list")?;
        let mut parameters: Vec<Token> = Vec::new();
        if self.check(TokenKind::RightParen) {
            self.advance();
            return Ok(parameters);
        }

        loop {
            let parameter = self.expect(TokenKind::Identifier, "expected a parameter name")?;
            if parameters.iter().any(|seen| seen.lexeme == parameter.lexeme) {
                self.report(&parameter, "duplicate parameter name");
            }
            parameters.push(parameter);

            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(
                TokenKind::RightParen,
                "expected ',' or ')' in the parameter list",
            )?;
            return Ok(parameters);
        }
    }

    /// Either `: expression` or an indented block. Loop depth does not leak into
    /// the function, so a `break` in a function nested inside a loop is rejected.
    fn function_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let saved_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = if self.check(TokenKind::Colon) {
            let colon = self.advance().clone();
            self.expression().map(|value| {
                vec![Stmt::Return(ReturnStmt {
                    keyword: colon,
                    value: Some(value),
                })]
            })
        } else {
            self.block()
        };
        self.loop_depth = saved_depth;
        body
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(
            TokenKind::Newline,
            "expected a line break before an indented block",
        )?;
        self.expect(TokenKind::Indent, "expected an indented block")?;
        Ok(self.block_body())
    }

    fn block_body(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::Dedent) {
                self.advance();
                break;
            }
            if self.is_at_end() {
                break;
            }
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        statements
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::Fn) {
            return self.function_literal();
        }
        self.ternary()
    }

    fn function_literal(&mut self) -> ParseResult<Expr> {
        let keyword = self.advance().clone();
        if self.check(TokenKind::Identifier) {
            return Err(self.error_at_current("a function literal cannot be named"));
        }
        let parameters = self.parameters()?;
        let body = self.function_body()?;
        Ok(Expr::Function(FunctionExpr {
            keyword,
            parameters,
            body,
        }))
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let condition = self.or()?;
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }

        let question = self.advance().clone();
        let then_branch = self.ternary()?;
        self.expect(
            TokenKind::Bang,
            "expected '!' between the branches of a conditional expression",
        )?;
        let else_branch = self.ternary()?;

        Ok(Expr::Ternary(TernaryExpr {
            condition: Box::new(condition),
            question,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }))
    }

    fn or(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::and,
            &[(TokenKind::Or, BinaryOperator::Or)],
        )
    }

    fn and(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::equality,
            &[(TokenKind::And, BinaryOperator::And)],
        )
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::comparison, EQUALITY)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::additive, COMPARISON)
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::multiplicative, ADDITIVE)
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::unary, MULTIPLICATIVE)
    }

    /// One left-associative rung of the precedence ladder.
    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Expr>,
        operators: &[(TokenKind, BinaryOperator)],
    ) -> ParseResult<Expr> {
        let mut left = operand(self)?;
        while let Some(operator) = operators
            .iter()
            .find(|(kind, _)| self.check(*kind))
            .map(|(_, operator)| *operator)
        {
            let operator_token = self.advance().clone();
            let right = operand(self)?;
            left = Expr::Binary(BinaryExpr {
                left: Box::new(left),
                operator,
                operator_token,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let operator = match self.peek_kind() {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Bang => UnaryOperator::Not,
            _ => return self.chain(false),
        };
        let operator_token = self.advance().clone();
        let operand = self.unary()?;
        Ok(Expr::Unary(UnaryExpr {
            operator,
            operator_token,
            operand: Box::new(operand),
        }))
    }

    /// A primary followed by any run of `(args)`, `.name` and `[index]` suffixes.
    fn chain(&mut self, require_suffix: bool) -> ParseResult<Expr> {
        let mut expression = self.primary()?;
        let mut suffixes = 0usize;

        loop {
            expression = match self.peek_kind() {
                TokenKind::LeftParen => self.finish_call(expression)?,
                TokenKind::Dot => {
                    self.advance();
                    let name =
                        self.expect(TokenKind::Identifier, "expected a field name after '.'")?;
                    Expr::Get(GetExpr {
                        object: Box::new(expression),
                        member: Member::Field(name),
                    })
                }
                TokenKind::LeftBracket => {
                    let bracket = self.advance().clone();
                    let index = self.expression()?;
                    self.expect(TokenKind::RightBracket, "expected ']' after the index")?;
                    Expr::Get(GetExpr {
                        object: Box::new(expression),
                        member: Member::Index {
                            bracket,
                            index: Box::new(index),
                        },
                    })
                }
                _ => break,
            };
            suffixes += 1;
        }

        if require_suffix && suffixes == 0 {
            return Err(self.error_at_current("expected '(' to call this expression"));
        }
        Ok(expression)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let paren = self.advance().clone();
        let mut arguments = Vec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(
            TokenKind::RightParen,
            "expected ',' or ')' in the argument list",
        )?;

        Ok(Expr::Call(CallExpr {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::Number
            | TokenKind::Text
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                let token = self.advance().clone();
                let value = token.literal.clone().unwrap_or(Literal::Null);
                Ok(Expr::Literal(LiteralExpr { value, token }))
            }
            TokenKind::Identifier => {
                let name = self.advance().clone();
                Ok(Expr::Variable(VariableExpr { name }))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expression = self.expression()?;
                self.expect(TokenKind::RightParen, "expected ')' after the expression")?;
                Ok(Expr::Grouping(GroupingExpr {
                    expression: Box::new(expression),
                }))
            }
            TokenKind::LeftBracket => self.list_literal(),
            TokenKind::LeftBrace => self.record_literal(),
            TokenKind::Fn => Err(self.error_at_current(
                "a function literal must be wrapped in parentheses here",
            )),
            _ => Err(self.error_at_current("expected an expression")),
        }
    }

    fn list_literal(&mut self) -> ParseResult<Expr> {
        let bracket = self.advance().clone();
        let mut elements = Vec::new();

        while !self.check(TokenKind::RightBracket) {
            elements.push(self.expression()?);
            if !self.element_separator(TokenKind::RightBracket) {
                break;
            }
        }
        self.expect(
            TokenKind::RightBracket,
            "expected ',' or ']' in the list literal",
        )?;

        Ok(Expr::List(ListLiteral { bracket, elements }))
    }

    fn record_literal(&mut self) -> ParseResult<Expr> {
        let brace = self.advance().clone();
        let mut fields = Vec::new();
        let mut seen = HashSet::new();

        while !self.check(TokenKind::RightBrace) {
            let key = self.expect(TokenKind::Identifier, "expected a field name")?;
            if !seen.insert(key.lexeme.clone()) {
                self.report(&key, "duplicate field in record literal");
            }
            self.expect(TokenKind::Colon, "expected ':' after the field name")?;
            let value = self.expression()?;
            fields.push(RecordField { key, value });
            if !self.element_separator(TokenKind::RightBrace) {
                break;
            }
        }
        self.expect(
            TokenKind::RightBrace,
            "expected ',' or '}' in the record literal",
        )?;

        Ok(Expr::Record(RecordLiteral { brace, fields }))
    }

    /// Consume the separator between literal elements: a comma or a line break
    /// inside the brackets. Returns whether another element may follow.
    fn element_separator(&mut self, closing: TokenKind) -> bool {
        if self.check(TokenKind::Comma) {
            self.advance();
            return true;
        }
        self.soft_break && !self.check(closing)
    }

    fn type_expr(&mut self) -> ParseResult<TypeExpr> {
        let mut ty = match self.peek_kind() {
            TokenKind::Identifier => self.named_type()?,
            TokenKind::LeftBracket => {
                let bracket = self.advance().clone();
                let element = self.type_expr()?;
                self.expect(TokenKind::RightBracket, "expected ']' after the element type")?;
                TypeExpr::List {
                    bracket,
                    element: Box::new(element),
                }
            }
            TokenKind::LeftBrace => {
                let brace = self.advance().clone();
                let mut fields = Vec::new();
                while !self.check(TokenKind::RightBrace) {
                    let key = self.expect(TokenKind::Identifier, "expected a field name")?;
                    self.expect(TokenKind::Colon, "expected ':' after the field name")?;
                    fields.push((key, self.type_expr()?));
                    if !self.element_separator(TokenKind::RightBrace) {
                        break;
                    }
                }
                self.expect(TokenKind::RightBrace, "expected '}' after the record type")?;
                TypeExpr::Record { brace, fields }
            }
            TokenKind::LeftParen => self.function_type()?,
            _ => return Err(self.error_at_current("expected a type")),
        };

        while self.check(TokenKind::Question) {
            self.advance();
            ty = TypeExpr::Maybe(Box::new(ty));
        }
        Ok(ty)
    }

    fn named_type(&mut self) -> ParseResult<TypeExpr> {
        let mut name = self.advance().clone();
        let optional = name.lexeme.ends_with('?');
        if optional {
            name.lexeme.pop();
        }

        let mut arguments = Vec::new();
        if !optional && self.check(TokenKind::LeftBracket) {
            self.advance();
            loop {
                arguments.push(self.type_expr()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(
                TokenKind::RightBracket,
                "expected ']' after the type arguments",
            )?;
        }

        let named = TypeExpr::Named { name, arguments };
        Ok(if optional {
            TypeExpr::Maybe(Box::new(named))
        } else {
            named
        })
    }

    /// `(A, B) → R`, or a parenthesised type when no arrow follows.
    fn function_type(&mut self) -> ParseResult<TypeExpr> {
        let paren = self.advance().clone();
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                parameters.push(self.type_expr()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after the parameter types")?;

        if !self.check(TokenKind::Arrow) {
            if parameters.len() == 1 {
                return Ok(parameters.remove(0));
            }
            return Err(self.error_at_current("expected '→' after the parameter types"));
        }
        self.advance();
        let result = self.type_expr()?;

        Ok(TypeExpr::Function {
            paren,
            parameters,
            result: Box::new(result),
        })
    }

    fn end_statement(&mut self) -> ParseResult<()> {
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Ok(()),
            _ if self.previous_kind() == Some(TokenKind::Dedent) => Ok(()),
            _ => Err(self.error_at_current("expected a line break after the statement")),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        )
    }

    /// Skip the rest of a malformed statement. Stops after its line break, or before
    /// the end of the enclosing block, so one bad statement yields one diagnostic.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Dedent | TokenKind::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Report a problem that leaves the statement being parsed intact.
    fn report(&mut self, token: &Token, message: &str) {
        self.diagnostics
            .token_error(token, message, ErrorCategory::SyntaxError, false);
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        ParseError {
            token: self.peek().clone(),
            message: message.to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_soft_newlines(&mut self) {
        self.soft_break = false;
        while self
            .tokens
            .get(self.current)
            .is_some_and(|token| token.kind == TokenKind::SoftNewline)
        {
            self.current += 1;
            self.soft_break = true;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens[self.current..]
            .iter()
            .filter(|token| token.kind != TokenKind::SoftNewline)
            .nth(offset)
            .map(|token| token.kind)
    }

    fn previous_kind(&self) -> Option<TokenKind> {
        self.previous.map(|index| self.tokens[index].kind)
    }

    fn advance(&mut self) -> &Token {
        let consumed = self.current;
        if !self.is_at_end() {
            self.current += 1;
            self.skip_soft_newlines();
        }
        self.previous = Some(consumed);
        &self.tokens[consumed]
    }

    fn is_at_end(&self) -> bool {
        self.check(TokenKind::Eof)
    }
}
