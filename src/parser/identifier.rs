//! Identifier parsing: simple, operator, literal-operator, template and
//! scoped names.

use crate::ast::{Identifier, TemplateArg};
use crate::lexer::TokenId;
use crate::operators::OperatorKind;

use super::{Parser, SyntaxError, SyntaxErrorKind};

/// Where an identifier is being read. In a type position a `<` always
/// opens a template argument list; in an expression it does so only when
/// the speculative parse commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdContext {
    Type,
    Expression,
}

impl Parser<'_> {
    pub(crate) fn parse_identifier(
        &mut self,
        ctx: IdContext,
    ) -> Result<Identifier, SyntaxError> {
        let mut id = self.parse_identifier_component(ctx)?;

        while self.frag.next_is(TokenId::ScopeResolution) {
            let op = self.frag.advance().unwrap();
            let rhs = self.parse_identifier_component(ctx)?;
            let span = id.span().merge(&rhs.span()).merge(&op.span);
            id = Identifier::Scoped {
                lhs: Box::new(id),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(id)
    }

    fn parse_identifier_component(
        &mut self,
        ctx: IdContext,
    ) -> Result<Identifier, SyntaxError> {
        let tok = self.peek_or_eof()?;

        match tok.id {
            TokenId::UserDefinedName => {
                self.frag.advance();

                if self.frag.next_is(TokenId::Less) {
                    if let Some(arguments) = self.try_parse_template_arguments(ctx)? {
                        return Ok(Identifier::Template {
                            name: tok.text,
                            arguments,
                            span: tok.span,
                        });
                    }
                }

                Ok(Identifier::Simple {
                    name: tok.text,
                    span: tok.span,
                })
            }
            TokenId::Operator => {
                self.frag.advance();
                self.parse_operator_name(tok.span)
            }
            _ => Err(SyntaxError {
                kind: SyntaxErrorKind::ExpectedIdentifier,
                span: tok.span,
            }),
        }
    }

    /// Parses the name part after the `operator` keyword.
    pub(crate) fn parse_operator_name(
        &mut self,
        span: crate::lexer::Span,
    ) -> Result<Identifier, SyntaxError> {
        let tok = self.peek_or_eof()?;

        // literal operator: `operator"" _suffix` or `operator""_suffix`
        if tok.id == TokenId::StringLiteral && tok.text == "\"\"" {
            self.frag.advance();
            let suffix = self.frag.expect(TokenId::UserDefinedName)?;
            return Ok(Identifier::LiteralOperator {
                suffix: suffix.text,
                span: span.merge(&suffix.span),
            });
        }
        if tok.id == TokenId::UserDefinedLiteral && tok.text.starts_with("\"\"") {
            self.frag.advance();
            return Ok(Identifier::LiteralOperator {
                suffix: tok.text[2..].to_string(),
                span: span.merge(&tok.span),
            });
        }

        // `operator()` and `operator[]` span two tokens
        if tok.id == TokenId::LeftPar {
            self.frag.advance();
            let close = self.frag.expect(TokenId::RightPar)?;
            return Ok(Identifier::Operator {
                op: OperatorKind::FunctionCall,
                span: span.merge(&close.span),
            });
        }
        if tok.id == TokenId::LeftBracket {
            self.frag.advance();
            let close = self.frag.expect(TokenId::RightBracket)?;
            return Ok(Identifier::Operator {
                op: OperatorKind::Subscript,
                span: span.merge(&close.span),
            });
        }

        match OperatorKind::from_overload_symbol(&tok.text) {
            Some(op) if tok.id.is_operator() => {
                self.frag.advance();
                Ok(Identifier::Operator {
                    op,
                    span: span.merge(&tok.span),
                })
            }
            _ => Err(SyntaxError {
                kind: SyntaxErrorKind::InvalidOperatorName { found: tok.text },
                span: tok.span,
            }),
        }
    }

    /// Attempts to read `<args...>` at the current position. Returns
    /// `Ok(None)` when the tokens do not form an argument list (the cursor
    /// is restored), so the caller can fall back to a comparison.
    pub(crate) fn try_parse_template_arguments(
        &mut self,
        ctx: IdContext,
    ) -> Result<Option<Vec<TemplateArg>>, SyntaxError> {
        let cp = self.frag.checkpoint();
        self.frag.expect(TokenId::Less)?;

        let mut arguments = vec![];

        loop {
            if self.frag.eat(TokenId::GreaterThan).is_some() {
                break;
            }
            if self.frag.next_is(TokenId::RightShift) {
                self.frag.split_right_shift();
                break;
            }

            match self.parse_template_argument() {
                Ok(arg) => arguments.push(arg),
                Err(_) => {
                    self.frag.restore(cp);
                    return Ok(None);
                }
            }

            let Some(tok) = self.frag.peek() else {
                self.frag.restore(cp);
                return Ok(None);
            };
            match tok.id {
                TokenId::Comma => {
                    self.frag.advance();
                }
                TokenId::GreaterThan | TokenId::RightShift => {}
                _ => {
                    self.frag.restore(cp);
                    return Ok(None);
                }
            }
        }

        if ctx == IdContext::Expression && !self.template_arguments_commit() {
            self.frag.restore(cp);
            return Ok(None);
        }

        Ok(Some(arguments))
    }

    /// After a closing `>` in expression position, commit only when the
    /// next token cannot continue a comparison chain.
    fn template_arguments_commit(&self) -> bool {
        match self.frag.peek() {
            None => true,
            Some(tok) => matches!(
                tok.id,
                TokenId::LeftPar
                    | TokenId::ScopeResolution
                    | TokenId::LeftBrace
                    | TokenId::Semicolon
                    | TokenId::Comma
                    | TokenId::RightPar
                    | TokenId::GreaterThan
            ),
        }
    }

    pub(crate) fn parse_template_argument(&mut self) -> Result<TemplateArg, SyntaxError> {
        // a type reading wins whenever the tokens form one
        let cp = self.frag.checkpoint();
        if let Ok(qt) = self.parse_qualified_type() {
            match self.frag.peek().map(|t| t.id) {
                None | Some(TokenId::Comma) | Some(TokenId::GreaterThan)
                | Some(TokenId::RightShift) => return Ok(TemplateArg::Type(qt)),
                _ => self.frag.restore(cp),
            }
        } else {
            self.frag.restore(cp);
        }

        // otherwise a constant expression; comparisons and shifts are not
        // allowed inside an argument list
        let expr = self.parse_expr_bp(12)?;
        Ok(TemplateArg::Expr(expr))
    }
}
