//! Recursive-descent parser over token fragments.
//!
//! Declarations and statements are recognized by leading keywords plus a
//! bounded speculative parse for the type-vs-expression ambiguity;
//! expressions use a precedence-climbing subparser. The parser throws a
//! typed [`SyntaxError`] on the first hard failure — recovery is not
//! attempted.

mod declaration;
mod expression;
mod fragment;
mod identifier;
mod type_name;

pub use fragment::{Checkpoint, Fragment};
pub use identifier::IdContext;

use std::error::Error;
use std::fmt::Display;

use crate::ast;
use crate::lexer::{tokenize, LexError, Span, Token, TokenId};
use crate::source::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnexpectedToken {
        found: String,
        expected: Option<TokenId>,
    },
    UnexpectedEndOfInput,
    UnmatchedDelimiter,
    ExpectedIdentifier,
    ExpectedType {
        found: String,
    },
    ExpectedDeclaration,
    InvalidCaptureList,
    InvalidOperatorName {
        found: String,
    },
    InvalidTemplateParameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub span: Span,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SyntaxErrorKind::UnexpectedToken { found, expected } => match expected {
                Some(id) => write!(f, "unexpected token '{found}', expected {id:?}"),
                None => write!(f, "unexpected token '{found}'"),
            },
            SyntaxErrorKind::UnexpectedEndOfInput => f.write_str("unexpected end of input"),
            SyntaxErrorKind::UnmatchedDelimiter => f.write_str("unmatched delimiter"),
            SyntaxErrorKind::ExpectedIdentifier => f.write_str("expected an identifier"),
            SyntaxErrorKind::ExpectedType { found } => {
                write!(f, "expected a type, found '{found}'")
            }
            SyntaxErrorKind::ExpectedDeclaration => f.write_str("expected a declaration"),
            SyntaxErrorKind::InvalidCaptureList => f.write_str("invalid lambda capture list"),
            SyntaxErrorKind::InvalidOperatorName { found } => {
                write!(f, "'{found}' is not an overloadable operator")
            }
            SyntaxErrorKind::InvalidTemplateParameter => {
                f.write_str("invalid template parameter")
            }
        }
    }
}

impl Error for SyntaxError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Lex(LexError),
    Syntax(SyntaxError),
}

impl ParseError {
    pub fn location(&self) -> crate::source::SourceLocation {
        match self {
            ParseError::Lex(e) => e.location,
            ParseError::Syntax(e) => e.span.location(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Lex(e) => e.fmt(f),
            ParseError::Syntax(e) => e.fmt(f),
        }
    }
}

impl Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(value: LexError) -> Self {
        ParseError::Lex(value)
    }
}

impl From<SyntaxError> for ParseError {
    fn from(value: SyntaxError) -> Self {
        ParseError::Syntax(value)
    }
}

/// Parses a whole script.
pub fn parse_script(source: &SourceFile) -> Result<ast::Script, ParseError> {
    let tokens = tokenize(source.content())?;
    let mut parser = Parser::new(Fragment::new(&tokens));

    let mut statements = vec![];
    while !parser.frag.at_end() {
        statements.push(parser.parse_statement()?);
    }

    Ok(ast::Script::new(statements, source.clone()))
}

/// Parses a qualified-type string, e.g. `const int &`.
pub fn parse_type(source: &SourceFile) -> Result<ast::QualifiedType, ParseError> {
    let tokens = tokenize(source.content())?;
    let mut parser = Parser::new(Fragment::new(&tokens));

    let qt = parser.parse_qualified_type()?;
    if let Some(tok) = parser.frag.peek() {
        return Err(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedToken {
                found: tok.text,
                expected: None,
            },
            span: tok.span,
        }
        .into());
    }
    Ok(qt)
}

/// Parses a single expression, e.g. for command compilation.
pub fn parse_expression(source: &SourceFile) -> Result<ast::Expression, ParseError> {
    let tokens = tokenize(source.content())?;
    let mut parser = Parser::new(Fragment::new(&tokens));

    let expr = parser.parse_comma_expression()?;
    if let Some(tok) = parser.frag.peek() {
        if tok.id != TokenId::Semicolon || parser.frag.peek_at(1).is_some() {
            return Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedToken {
                    found: tok.text,
                    expected: None,
                },
                span: tok.span,
            }
            .into());
        }
    }
    Ok(expr)
}

pub(crate) struct Parser<'a> {
    pub(crate) frag: Fragment<'a>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(frag: Fragment<'a>) -> Self {
        Self { frag }
    }

    pub(crate) fn unexpected<T>(&self, tok: &Token) -> Result<T, SyntaxError> {
        Err(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedToken {
                found: tok.text.clone(),
                expected: None,
            },
            span: tok.span,
        })
    }

    pub(crate) fn peek_or_eof(&self) -> Result<Token, SyntaxError> {
        self.frag.peek().ok_or(SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEndOfInput,
            span: self.frag.end_span(),
        })
    }

    pub(crate) fn parse_statement(&mut self) -> Result<ast::Statement, SyntaxError> {
        let tok = self.peek_or_eof()?;

        match tok.id {
            TokenId::Semicolon => {
                self.frag.advance();
                Ok(ast::Statement::Null { span: tok.span })
            }
            TokenId::LeftBrace => Ok(ast::Statement::Compound(self.parse_compound_statement()?)),
            TokenId::If => self.parse_if_statement(),
            TokenId::While => self.parse_while_statement(),
            TokenId::For => self.parse_for_statement(),
            TokenId::Return => self.parse_return_statement(),
            TokenId::Break => {
                self.frag.advance();
                self.frag.expect(TokenId::Semicolon)?;
                Ok(ast::Statement::Break { span: tok.span })
            }
            TokenId::Continue => {
                self.frag.advance();
                self.frag.expect(TokenId::Semicolon)?;
                Ok(ast::Statement::Continue { span: tok.span })
            }
            TokenId::Class
            | TokenId::Struct
            | TokenId::Enum
            | TokenId::Namespace
            | TokenId::Typedef
            | TokenId::Using
            | TokenId::Import
            | TokenId::Export
            | TokenId::Template
            | TokenId::Friend => Ok(ast::Statement::Declaration(Box::new(
                self.parse_declaration()?,
            ))),
            _ => self.parse_declaration_or_expression_statement(),
        }
    }

    pub(crate) fn parse_compound_statement(
        &mut self,
    ) -> Result<ast::CompoundStatement, SyntaxError> {
        let open = self.peek_or_eof()?;
        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut statements = vec![];
        while !sub.frag.at_end() {
            statements.push(sub.parse_statement()?);
        }

        Ok(ast::CompoundStatement {
            statements,
            span: open.span,
        })
    }

    fn parse_if_statement(&mut self) -> Result<ast::Statement, SyntaxError> {
        let kw = self.frag.expect(TokenId::If)?;
        let condition = self.parse_parenthesized_expression()?;
        let body = Box::new(self.parse_statement()?);

        let else_clause = if self.frag.eat(TokenId::Else).is_some() {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(ast::Statement::If {
            condition,
            body,
            else_clause,
            span: kw.span,
        })
    }

    fn parse_while_statement(&mut self) -> Result<ast::Statement, SyntaxError> {
        let kw = self.frag.expect(TokenId::While)?;
        let condition = self.parse_parenthesized_expression()?;
        let body = Box::new(self.parse_statement()?);

        Ok(ast::Statement::While {
            condition,
            body,
            span: kw.span,
        })
    }

    fn parse_for_statement(&mut self) -> Result<ast::Statement, SyntaxError> {
        let kw = self.frag.expect(TokenId::For)?;
        let inner = self.frag.enclosed()?;
        let mut head = Parser::new(inner);

        let init = if head.frag.eat(TokenId::Semicolon).is_some() {
            None
        } else {
            Some(Box::new(head.parse_statement()?))
        };

        let condition = if head.frag.next_is(TokenId::Semicolon) {
            head.frag.advance();
            None
        } else {
            let frag = head.frag.delimited(TokenId::Semicolon)?;
            Some(Parser::new(frag).parse_whole_expression()?)
        };

        let loop_increment = if head.frag.at_end() {
            None
        } else {
            Some(head.parse_whole_expression()?)
        };

        let body = Box::new(self.parse_statement()?);

        Ok(ast::Statement::For {
            init,
            condition,
            loop_increment,
            body,
            span: kw.span,
        })
    }

    fn parse_return_statement(&mut self) -> Result<ast::Statement, SyntaxError> {
        let kw = self.frag.expect(TokenId::Return)?;

        if self.frag.eat(TokenId::Semicolon).is_some() {
            return Ok(ast::Statement::Return {
                value: None,
                span: kw.span,
            });
        }

        let frag = self.frag.delimited(TokenId::Semicolon)?;
        let value = Parser::new(frag).parse_whole_expression()?;

        Ok(ast::Statement::Return {
            value: Some(value),
            span: kw.span,
        })
    }

    fn parse_declaration_or_expression_statement(
        &mut self,
    ) -> Result<ast::Statement, SyntaxError> {
        let cp = self.frag.checkpoint();

        match self.try_parse_variable_or_function() {
            Ok(decl) => return Ok(ast::Statement::Declaration(Box::new(decl))),
            Err(_) => self.frag.restore(cp),
        }

        let expr = self.parse_expression()?;
        self.frag.expect(TokenId::Semicolon)?;
        Ok(ast::Statement::Expression(expr))
    }

    /// Parses a `(expr)` head, e.g. of an `if` or `while`.
    pub(crate) fn parse_parenthesized_expression(
        &mut self,
    ) -> Result<ast::Expression, SyntaxError> {
        let inner = self.frag.enclosed()?;
        Parser::new(inner).parse_whole_expression()
    }

    /// Parses an expression that must consume its whole fragment.
    pub(crate) fn parse_whole_expression(&mut self) -> Result<ast::Expression, SyntaxError> {
        let expr = self.parse_comma_expression()?;
        match self.frag.peek() {
            None => Ok(expr),
            Some(tok) => self.unexpected(&tok),
        }
    }
}
