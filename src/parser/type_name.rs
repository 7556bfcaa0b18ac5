//! Qualified-type parsing: `[const] <type-id> [& | &&]`, or the function
//! form `[const] <ret>(<params...>) [& | &&]`.

use crate::ast::{FunctionTypeName, Identifier, QualifiedType, RefKind, TypeNameKind};
use crate::lexer::TokenId;

use super::{IdContext, Parser, SyntaxError, SyntaxErrorKind};

impl Parser<'_> {
    pub(crate) fn parse_qualified_type(&mut self) -> Result<QualifiedType, SyntaxError> {
        let first = self.peek_or_eof()?;
        let is_const = self.frag.eat(TokenId::Const).is_some();

        let kind = self.parse_type_core()?;
        let inner_ref = self.parse_ref_kind();

        // `<ret>(<params>)` reads as a function type when the parenthesized
        // tokens form a parameter-type list; otherwise the parens are left
        // for the caller (e.g. a declarator or a call).
        if self.frag.next_is(TokenId::LeftPar) {
            let cp = self.frag.checkpoint();
            if let Some(params) = self.try_parse_signature_params() {
                let return_type = QualifiedType {
                    is_const: false,
                    ref_kind: inner_ref,
                    kind,
                    span: first.span,
                };

                let ref_kind = self.parse_ref_kind();

                return Ok(QualifiedType {
                    is_const,
                    ref_kind,
                    kind: TypeNameKind::Function(Box::new(FunctionTypeName {
                        return_type,
                        params,
                    })),
                    span: first.span,
                });
            }
            self.frag.restore(cp);
        }

        Ok(QualifiedType {
            is_const,
            ref_kind: inner_ref,
            kind,
            span: first.span,
        })
    }

    fn try_parse_signature_params(&mut self) -> Option<Vec<QualifiedType>> {
        let inner = self.frag.enclosed().ok()?;
        let mut sub = Parser::new(inner);

        let mut params = vec![];
        while !sub.frag.at_end() {
            params.push(sub.parse_qualified_type().ok()?);
            if !sub.frag.at_end() {
                sub.frag.eat(TokenId::Comma)?;
            }
        }

        Some(params)
    }

    fn parse_type_core(&mut self) -> Result<TypeNameKind, SyntaxError> {
        let tok = self.peek_or_eof()?;

        match tok.id {
            TokenId::Auto => {
                self.frag.advance();
                Ok(TypeNameKind::Auto)
            }
            TokenId::Void
            | TokenId::Bool
            | TokenId::Char
            | TokenId::Int
            | TokenId::Float
            | TokenId::Double => {
                self.frag.advance();
                Ok(TypeNameKind::Named(Identifier::Simple {
                    name: tok.text,
                    span: tok.span,
                }))
            }
            TokenId::UserDefinedName => {
                let id = self.parse_identifier(IdContext::Type)?;
                Ok(TypeNameKind::Named(id))
            }
            _ => Err(SyntaxError {
                kind: SyntaxErrorKind::ExpectedType { found: tok.text },
                span: tok.span,
            }),
        }
    }

    fn parse_ref_kind(&mut self) -> RefKind {
        if self.frag.eat(TokenId::BitwiseAnd).is_some() {
            RefKind::Ref
        } else if self.frag.eat(TokenId::LogicalAnd).is_some() {
            RefKind::RefRef
        } else {
            RefKind::None
        }
    }
}
