//! Expression parsing: precedence climbing over the C-family operator
//! table, with dedicated handling for calls, subscripts, member access,
//! conditionals, brace construction, array/list expressions and lambdas.

use crate::ast::{
    Expression, FunctionParameter, Identifier, LambdaCapture, LambdaExpression, Literal,
    LiteralKind,
};
use crate::lexer::{Token, TokenId};
use crate::operators::{Associativity, OperatorKind};

use super::{IdContext, Parser, SyntaxError, SyntaxErrorKind};

fn binary_operator(id: TokenId) -> Option<OperatorKind> {
    use OperatorKind::*;
    let op = match id {
        TokenId::Eq => Assignment,
        TokenId::AddEq => AdditionAssignment,
        TokenId::SubEq => SubstractionAssignment,
        TokenId::MulEq => MultiplicationAssignment,
        TokenId::DivEq => DivisionAssignment,
        TokenId::RemainderEq => RemainderAssignment,
        TokenId::LeftShiftEq => LeftShiftAssignment,
        TokenId::RightShiftEq => RightShiftAssignment,
        TokenId::BitAndEq => BitwiseAndAssignment,
        TokenId::BitOrEq => BitwiseOrAssignment,
        TokenId::BitXorEq => BitwiseXorAssignment,
        TokenId::Plus => Addition,
        TokenId::Minus => Substraction,
        TokenId::Mul => Multiplication,
        TokenId::Div => Division,
        TokenId::Remainder => Remainder,
        TokenId::EqEq => Equality,
        TokenId::Neq => Inequality,
        TokenId::Less => Less,
        TokenId::GreaterThan => Greater,
        TokenId::LessEqual => LessEqual,
        TokenId::GreaterThanEqual => GreaterEqual,
        TokenId::LogicalAnd => LogicalAnd,
        TokenId::LogicalOr => LogicalOr,
        TokenId::BitwiseAnd => BitwiseAnd,
        TokenId::BitwiseOr => BitwiseOr,
        TokenId::BitwiseXor => BitwiseXor,
        TokenId::LeftShift => LeftShift,
        TokenId::RightShift => RightShift,
        TokenId::Comma => Comma,
        _ => return None,
    };
    Some(op)
}

fn literal_kind(id: TokenId) -> Option<LiteralKind> {
    let kind = match id {
        TokenId::True => LiteralKind::True,
        TokenId::False => LiteralKind::False,
        TokenId::IntegerLiteral => LiteralKind::Integer,
        TokenId::BinaryLiteral => LiteralKind::Binary,
        TokenId::OctalLiteral => LiteralKind::Octal,
        TokenId::HexadecimalLiteral => LiteralKind::Hexadecimal,
        TokenId::DecimalLiteral => LiteralKind::Decimal,
        TokenId::StringLiteral => LiteralKind::String,
        TokenId::CharLiteral => LiteralKind::Char,
        TokenId::UserDefinedLiteral => LiteralKind::UserDefined,
        _ => return None,
    };
    Some(kind)
}

impl Parser<'_> {
    /// Expression without the comma operator, i.e. what fits between
    /// commas of an argument list.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        self.parse_expr_bp(2)
    }

    /// Full expression, comma operator included.
    pub(crate) fn parse_comma_expression(&mut self) -> Result<Expression, SyntaxError> {
        self.parse_expr_bp(1)
    }

    pub(crate) fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expression, SyntaxError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(tok) = self.frag.peek() else { break };

            match tok.id {
                TokenId::LeftPar => {
                    let arguments = self.parse_expression_list()?;
                    let span = lhs.span().merge(&tok.span);
                    lhs = Expression::Call {
                        callee: Box::new(lhs),
                        arguments,
                        span,
                    };
                }
                TokenId::LeftBracket => {
                    let inner = self.frag.enclosed()?;
                    let index = Parser::new(inner).parse_whole_expression()?;
                    let span = lhs.span().merge(&tok.span);
                    lhs = Expression::Subscript {
                        object: Box::new(lhs),
                        index: Box::new(index),
                        span,
                    };
                }
                TokenId::LeftBrace => {
                    if !matches!(lhs, Expression::Identifier(_)) {
                        break;
                    }
                    let Expression::Identifier(type_name) = lhs else {
                        unreachable!()
                    };
                    let arguments = self.parse_brace_expression_list()?;
                    let span = type_name.span().merge(&tok.span);
                    lhs = Expression::BraceConstruction {
                        type_name,
                        arguments,
                        span,
                    };
                }
                TokenId::Dot => {
                    self.frag.advance();
                    let member = self.frag.expect(TokenId::UserDefinedName)?;
                    let span = lhs.span().merge(&member.span);
                    lhs = Expression::Member {
                        object: Box::new(lhs),
                        member: member.text,
                        span,
                    };
                }
                TokenId::PlusPlus | TokenId::MinusMinus => {
                    if 15 < min_bp {
                        break;
                    }
                    self.frag.advance();
                    let op = if tok.id == TokenId::PlusPlus {
                        OperatorKind::PostIncrement
                    } else {
                        OperatorKind::PostDecrement
                    };
                    let span = lhs.span().merge(&tok.span);
                    lhs = Expression::Operation {
                        op,
                        lhs: Box::new(lhs),
                        rhs: None,
                        span,
                    };
                }
                TokenId::QuestionMark => {
                    if OperatorKind::Conditional.precedence() < min_bp {
                        break;
                    }
                    self.frag.advance();
                    let then_expr = self.parse_expression()?;
                    self.frag.expect(TokenId::Colon)?;
                    let else_expr = self.parse_expr_bp(OperatorKind::Conditional.precedence())?;
                    let span = lhs.span().merge(&else_expr.span());
                    lhs = Expression::Conditional {
                        condition: Box::new(lhs),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                        span,
                    };
                }
                _ => {
                    let Some(op) = binary_operator(tok.id) else { break };
                    let bp = op.precedence();
                    if bp < min_bp {
                        break;
                    }

                    self.frag.advance();
                    let next_bp = match op.associativity() {
                        Associativity::LeftToRight => bp + 1,
                        Associativity::RightToLeft => bp,
                    };
                    let rhs = self.parse_expr_bp(next_bp)?;
                    let span = lhs.span().merge(&rhs.span());
                    lhs = Expression::Operation {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Some(Box::new(rhs)),
                        span,
                    };
                }
            }
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expression, SyntaxError> {
        let tok = self.peek_or_eof()?;

        if let Some(kind) = literal_kind(tok.id) {
            self.frag.advance();
            return Ok(Expression::Literal(Literal {
                kind,
                text: tok.text,
                span: tok.span,
            }));
        }

        match tok.id {
            TokenId::UserDefinedName | TokenId::Operator => {
                let id = self.parse_identifier(IdContext::Expression)?;
                Ok(Expression::Identifier(id))
            }
            TokenId::This => {
                self.frag.advance();
                Ok(Expression::Identifier(Identifier::Simple {
                    name: tok.text,
                    span: tok.span,
                }))
            }
            TokenId::LeftPar => {
                let inner = self.frag.enclosed()?;
                Parser::new(inner).parse_whole_expression()
            }
            TokenId::LeftBracket => self.parse_array_or_lambda(),
            TokenId::LeftBrace => {
                let elements = self.parse_brace_expression_list()?;
                Ok(Expression::ListExpression {
                    elements,
                    span: tok.span,
                })
            }
            TokenId::Plus | TokenId::Minus | TokenId::LogicalNot | TokenId::BitwiseNot
            | TokenId::PlusPlus | TokenId::MinusMinus => {
                self.frag.advance();
                let op = match tok.id {
                    TokenId::Plus => OperatorKind::UnaryPlus,
                    TokenId::Minus => OperatorKind::UnaryMinus,
                    TokenId::LogicalNot => OperatorKind::LogicalNot,
                    TokenId::BitwiseNot => OperatorKind::BitwiseNot,
                    TokenId::PlusPlus => OperatorKind::PreIncrement,
                    TokenId::MinusMinus => OperatorKind::PreDecrement,
                    _ => unreachable!(),
                };
                let operand = self.parse_expr_bp(14)?;
                let span = tok.span.merge(&operand.span());
                Ok(Expression::Operation {
                    op,
                    lhs: Box::new(operand),
                    rhs: None,
                    span,
                })
            }
            _ => self.unexpected(&tok),
        }
    }

    /// `(e1, e2, ...)`
    pub(crate) fn parse_expression_list(&mut self) -> Result<Vec<Expression>, SyntaxError> {
        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut elements = vec![];
        while !sub.frag.at_end() {
            elements.push(sub.parse_expression()?);
            if !sub.frag.at_end() {
                sub.frag.expect(TokenId::Comma)?;
            }
        }

        Ok(elements)
    }

    /// `{e1, e2, ...}`
    pub(crate) fn parse_brace_expression_list(
        &mut self,
    ) -> Result<Vec<Expression>, SyntaxError> {
        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut elements = vec![];
        while !sub.frag.at_end() {
            elements.push(sub.parse_expression()?);
            if !sub.frag.at_end() {
                sub.frag.expect(TokenId::Comma)?;
            }
        }

        Ok(elements)
    }

    /// `[...]` opens either an array expression or a lambda; a `(` right
    /// after the closing bracket decides for the lambda.
    fn parse_array_or_lambda(&mut self) -> Result<Expression, SyntaxError> {
        let open = self.peek_or_eof()?;
        let inner = self.frag.enclosed()?;

        if self.frag.next_is(TokenId::LeftPar) {
            return self.parse_lambda(open, inner);
        }

        let mut sub = Parser::new(inner);
        let mut elements = vec![];
        while !sub.frag.at_end() {
            elements.push(sub.parse_expression()?);
            if !sub.frag.at_end() {
                sub.frag.expect(TokenId::Comma)?;
            }
        }

        Ok(Expression::ArrayExpression {
            elements,
            span: open.span,
        })
    }

    fn parse_lambda(
        &mut self,
        open: Token,
        captures_frag: super::Fragment<'_>,
    ) -> Result<Expression, SyntaxError> {
        let captures = Parser::new(captures_frag).parse_capture_list()?;

        let params = self.parse_lambda_parameter_list()?;

        let body = self.parse_compound_statement()?;

        Ok(Expression::Lambda(LambdaExpression {
            captures,
            params,
            body: body.statements,
            span: open.span,
        }))
    }

    fn parse_capture_list(&mut self) -> Result<Vec<LambdaCapture>, SyntaxError> {
        let mut captures = vec![];

        while !self.frag.at_end() {
            let tok = self.peek_or_eof()?;
            let capture = match tok.id {
                TokenId::Eq => {
                    self.frag.advance();
                    LambdaCapture::All {
                        by_ref: false,
                        span: tok.span,
                    }
                }
                TokenId::BitwiseAnd => {
                    self.frag.advance();
                    if let Some(name) = self.frag.eat(TokenId::UserDefinedName) {
                        LambdaCapture::Named {
                            name: name.text,
                            by_ref: true,
                            initializer: None,
                            span: tok.span.merge(&name.span),
                        }
                    } else {
                        LambdaCapture::All {
                            by_ref: true,
                            span: tok.span,
                        }
                    }
                }
                TokenId::This => {
                    self.frag.advance();
                    LambdaCapture::This { span: tok.span }
                }
                TokenId::UserDefinedName => {
                    self.frag.advance();
                    let initializer = if self.frag.eat(TokenId::Eq).is_some() {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    LambdaCapture::Named {
                        name: tok.text,
                        by_ref: false,
                        initializer,
                        span: tok.span,
                    }
                }
                _ => {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::InvalidCaptureList,
                        span: tok.span,
                    })
                }
            };
            captures.push(capture);

            if !self.frag.at_end() {
                self.frag.expect(TokenId::Comma)?;
            }
        }

        Ok(captures)
    }

    fn parse_lambda_parameter_list(&mut self) -> Result<Vec<FunctionParameter>, SyntaxError> {
        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut params = vec![];
        while !sub.frag.at_end() {
            params.push(sub.parse_function_parameter()?);
            if !sub.frag.at_end() {
                sub.frag.expect(TokenId::Comma)?;
            }
        }

        Ok(params)
    }
}
