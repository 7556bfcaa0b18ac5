use crate::lexer::Span;
use crate::operators::OperatorKind;

use super::{FunctionParameter, Identifier, Statement};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    /// Unary (`rhs` absent) or binary operation. Prefix and postfix
    /// increment/decrement are distinguished by the operator kind.
    Operation {
        op: OperatorKind,
        lhs: Box<Expression>,
        rhs: Option<Box<Expression>>,
        span: Span,
    },
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
        span: Span,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },
    Subscript {
        object: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },
    /// `object.member`
    Member {
        object: Box<Expression>,
        member: String,
        span: Span,
    },
    /// `Type{args}`
    BraceConstruction {
        type_name: Identifier,
        arguments: Vec<Expression>,
        span: Span,
    },
    /// `[e1, e2, ...]`
    ArrayExpression {
        elements: Vec<Expression>,
        span: Span,
    },
    /// `{e1, e2, ...}` — untyped until consumed by an initialization.
    ListExpression {
        elements: Vec<Expression>,
        span: Span,
    },
    Lambda(LambdaExpression),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(lit) => lit.span,
            Expression::Identifier(id) => id.span(),
            Expression::Operation { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Call { span, .. }
            | Expression::Subscript { span, .. }
            | Expression::Member { span, .. }
            | Expression::BraceConstruction { span, .. }
            | Expression::ArrayExpression { span, .. }
            | Expression::ListExpression { span, .. } => *span,
            Expression::Lambda(lambda) => lambda.span,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum LiteralKind {
    True,
    False,
    Integer,
    Binary,
    Octal,
    Hexadecimal,
    Decimal,
    String,
    Char,
    UserDefined,
}

/// A literal kept in textual form; decoding happens during compilation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum LambdaCapture {
    /// `[=]` or `[&]`
    All { by_ref: bool, span: Span },
    /// `[this]`
    This { span: Span },
    /// `[x]`, `[&x]`, `[x = expr]`
    Named {
        name: String,
        by_ref: bool,
        initializer: Option<Expression>,
        span: Span,
    },
}

impl LambdaCapture {
    pub fn span(&self) -> Span {
        match self {
            LambdaCapture::All { span, .. }
            | LambdaCapture::This { span }
            | LambdaCapture::Named { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LambdaExpression {
    pub captures: Vec<LambdaCapture>,
    pub params: Vec<FunctionParameter>,
    pub body: Vec<Statement>,
    pub span: Span,
}
