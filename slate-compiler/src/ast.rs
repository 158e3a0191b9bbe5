use crate::lexer::{Literal, Token};

#[derive(Debug, Clone)]
pub enum Expr {
    Ternary(TernaryExpr),
    Binary(BinaryExpr),
    Grouping(GroupingExpr),
    Literal(LiteralExpr),
    Unary(UnaryExpr),
    Variable(VariableExpr),
    Assign(AssignExpr),
    Call(CallExpr),
    Get(GetExpr),
    Set(SetExpr),
    List(ListLiteral),
    Record(RecordLiteral),
    Function(FunctionExpr),
}

#[derive(Debug, Clone)]
pub struct TernaryExpr {
    pub condition: Box<Expr>,
    pub question: Token,
    pub then_branch: Box<Expr>,
    pub else_branch: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Less
                | BinaryOperator::LessEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equal | BinaryOperator::NotEqual)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub operator: BinaryOperator,
    pub operator_token: Token,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct GroupingExpr {
    pub expression: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub value: Literal,
    pub token: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub operator: UnaryOperator,
    pub operator_token: Token,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct VariableExpr {
    pub name: Token,
}

#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub name: Token,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub paren: Token,
    pub arguments: Vec<Expr>,
}

/// How a member is reached: `record.name` or `value[index]`.
#[derive(Debug, Clone)]
pub enum Member {
    Field(Token),
    Index { bracket: Token, index: Box<Expr> },
}

impl Member {
    pub fn token(&self) -> &Token {
        match self {
            Member::Field(name) => name,
            Member::Index { bracket, .. } => bracket,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetExpr {
    pub object: Box<Expr>,
    pub member: Member,
}

#[derive(Debug, Clone)]
pub struct SetExpr {
    pub object: Box<Expr>,
    pub member: Member,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct ListLiteral {
    pub bracket: Token,
    pub elements: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub key: Token,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct RecordLiteral {
    pub brace: Token,
    pub fields: Vec<RecordField>,
}

#[derive(Debug, Clone)]
pub struct FunctionExpr {
    pub keyword: Token,
    pub parameters: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl Expr {
    /// The token diagnostics about this expression are anchored on.
    pub fn anchor(&self) -> &Token {
        match self {
            Expr::Ternary(ternary) => &ternary.question,
            Expr::Binary(binary) => &binary.operator_token,
            Expr::Grouping(grouping) => grouping.expression.anchor(),
            Expr::Literal(literal) => &literal.token,
            Expr::Unary(unary) => &unary.operator_token,
            Expr::Variable(variable) => &variable.name,
            Expr::Assign(assign) => &assign.name,
            Expr::Call(call) => &call.paren,
            Expr::Get(get) => get.member.token(),
            Expr::Set(set) => set.member.token(),
            Expr::List(list) => &list.bracket,
            Expr::Record(record) => &record.brace,
            Expr::Function(function) => &function.keyword,
        }
    }

    pub fn accept<V: ExprVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::Ternary(expr) => visitor.visit_ternary(expr),
            Expr::Binary(expr) => visitor.visit_binary(expr),
            Expr::Grouping(expr) => visitor.visit_grouping(expr),
            Expr::Literal(expr) => visitor.visit_literal(expr),
            Expr::Unary(expr) => visitor.visit_unary(expr),
            Expr::Variable(expr) => visitor.visit_variable(expr),
            Expr::Assign(expr) => visitor.visit_assign(expr),
            Expr::Call(expr) => visitor.visit_call(expr),
            Expr::Get(expr) => visitor.visit_get(expr),
            Expr::Set(expr) => visitor.visit_set(expr),
            Expr::List(expr) => visitor.visit_list(expr),
            Expr::Record(expr) => visitor.visit_record(expr),
            Expr::Function(expr) => visitor.visit_function(expr),
        }
    }
}

/// One handler per expression variant. There are no default methods, so adding a
/// variant breaks every consumer until it handles the new case.
pub trait ExprVisitor {
    type Output;

    fn visit_ternary(&mut self, expr: &TernaryExpr) -> Self::Output;
    fn visit_binary(&mut self, expr: &BinaryExpr) -> Self::Output;
    fn visit_grouping(&mut self, expr: &GroupingExpr) -> Self::Output;
    fn visit_literal(&mut self, expr: &LiteralExpr) -> Self::Output;
    fn visit_unary(&mut self, expr: &UnaryExpr) -> Self::Output;
    fn visit_variable(&mut self, expr: &VariableExpr) -> Self::Output;
    fn visit_assign(&mut self, expr: &AssignExpr) -> Self::Output;
    fn visit_call(&mut self, expr: &CallExpr) -> Self::Output;
    fn visit_get(&mut self, expr: &GetExpr) -> Self::Output;
    fn visit_set(&mut self, expr: &SetExpr) -> Self::Output;
    fn visit_list(&mut self, expr: &ListLiteral) -> Self::Output;
    fn visit_record(&mut self, expr: &RecordLiteral) -> Self::Output;
    fn visit_function(&mut self, expr: &FunctionExpr) -> Self::Output;
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(ExpressionStmt),
    Block(BlockStmt),
    If(IfStmt),
    While(WhileStmt),
    Break(BreakStmt),
    FunctionDecl(FunctionDecl),
    Return(ReturnStmt),
    VarDeclaration(VarDeclaration),
}

#[derive(Debug, Clone)]
pub struct ExpressionStmt {
    pub expression: Expr,
}

#[derive(Debug, Clone)]
pub struct BlockStmt {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ElifBranch {
    pub keyword: Token,
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub keyword: Token,
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub elif_branches: Vec<ElifBranch>,
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub keyword: Token,
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct BreakStmt {
    pub keyword: Token,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub function: FunctionExpr,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub keyword: Token,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct VarDeclaration {
    pub name: Token,
    pub annotation: Option<TypeExpr>,
    pub initializer: Expr,
    pub mutable: bool,
}

impl Stmt {
    pub fn accept<V: StmtVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            Stmt::Expression(stmt) => visitor.visit_expression_stmt(stmt),
            Stmt::Block(stmt) => visitor.visit_block(stmt),
            Stmt::If(stmt) => visitor.visit_if(stmt),
            Stmt::While(stmt) => visitor.visit_while(stmt),
            Stmt::Break(stmt) => visitor.visit_break(stmt),
            Stmt::FunctionDecl(stmt) => visitor.visit_function_decl(stmt),
            Stmt::Return(stmt) => visitor.visit_return(stmt),
            Stmt::VarDeclaration(stmt) => visitor.visit_var_declaration(stmt),
        }
    }
}

pub trait StmtVisitor {
    type Output;

    fn visit_expression_stmt(&mut self, stmt: &ExpressionStmt) -> Self::Output;
    fn visit_block(&mut self, stmt: &BlockStmt) -> Self::Output;
    fn visit_if(&mut self, stmt: &IfStmt) -> Self::Output;
    fn visit_while(&mut self, stmt: &WhileStmt) -> Self::Output;
    fn visit_break(&mut self, stmt: &BreakStmt) -> Self::Output;
    fn visit_function_decl(&mut self, stmt: &FunctionDecl) -> Self::Output;
    fn visit_return(&mut self, stmt: &ReturnStmt) -> Self::Output;
    fn visit_var_declaration(&mut self, stmt: &VarDeclaration) -> Self::Output;
}

/// A type written in a declaration annotation, e.g. `var xs ([Number]) : []`.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named {
        name: Token,
        arguments: Vec<TypeExpr>,
    },
    List {
        bracket: Token,
        element: Box<TypeExpr>,
    },
    Record {
        brace: Token,
        fields: Vec<(Token, TypeExpr)>,
    },
    Function {
        paren: Token,
        parameters: Vec<TypeExpr>,
        result: Box<TypeExpr>,
    },
    Maybe(Box<TypeExpr>),
}
