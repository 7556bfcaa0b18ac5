//! Declaration parsing: variables, functions, classes, enums, namespaces,
//! aliases, imports, friends and templates.
//!
//! Detection is by leading keyword where one exists; the variable vs.
//! function vs. expression ambiguity is resolved by a bounded speculative
//! parse of the `(type, name)` prefix.

use crate::ast::{
    AccessSpecifier, ClassDecl, ClassMember, CompoundStatement, Declaration, EnumDecl,
    EnumValueDecl, FunctionDecl, FunctionKind, FunctionParameter, FunctionSpecifiers, Identifier,
    MemberInitializer, NamespaceDecl, QualifiedType, TemplateDecl, TemplateParameterDecl,
    TemplateParameterDeclKind, TypeNameKind, VariableDecl, VariableInit,
};
use crate::lexer::{Span, TokenId};
use crate::operators::OperatorKind;

use super::{IdContext, Parser, SyntaxError, SyntaxErrorKind};

impl Parser<'_> {
    pub(crate) fn parse_declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let tok = self.peek_or_eof()?;

        match tok.id {
            TokenId::Class | TokenId::Struct => self.parse_class_declaration(),
            TokenId::Enum => self.parse_enum_declaration(),
            TokenId::Namespace => self.parse_namespace_declaration(),
            TokenId::Typedef => self.parse_typedef(),
            TokenId::Using => self.parse_using(),
            TokenId::Import | TokenId::Export => self.parse_import(),
            TokenId::Template => self.parse_template_declaration(),
            TokenId::Friend => self.parse_friend(),
            _ => self.try_parse_variable_or_function(),
        }
    }

    /// Variable or function declaration starting with a type. Fails (for
    /// the caller to fall back to an expression) when the tokens do not
    /// read as `(type, name)` followed by a declarator introducer.
    pub(crate) fn try_parse_variable_or_function(
        &mut self,
    ) -> Result<Declaration, SyntaxError> {
        let start = self.peek_or_eof()?.span;
        let is_static = self.frag.eat(TokenId::Static).is_some();

        let ty = self.parse_qualified_type()?;

        // `T operator+(...)` at namespace scope
        if self.frag.next_is(TokenId::Operator) {
            return self.parse_operator_function(ty, FunctionSpecifiers::default(), start);
        }

        let name = self.frag.expect(TokenId::UserDefinedName)?;

        let tok = self.peek_or_eof()?;
        match tok.id {
            TokenId::Semicolon => {
                self.frag.advance();
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: None,
                    span: start,
                }))
            }
            TokenId::Eq => {
                self.frag.advance();
                let frag = self.frag.delimited(TokenId::Semicolon)?;
                let expr = Parser::new(frag).parse_whole_expression()?;
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: Some(VariableInit::Assignment(expr)),
                    span: start,
                }))
            }
            TokenId::LeftBrace => {
                let args = self.parse_brace_expression_list()?;
                self.frag.expect(TokenId::Semicolon)?;
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: Some(VariableInit::Brace(args)),
                    span: start,
                }))
            }
            TokenId::LeftPar => {
                let cp = self.frag.checkpoint();

                if let Some(params) = self.try_parse_parameter_list() {
                    let next = self.frag.peek().map(|t| t.id);
                    if matches!(next, Some(TokenId::LeftBrace) | Some(TokenId::Eq)) {
                        let mut decl = FunctionDecl {
                            kind: FunctionKind::Function,
                            name: Identifier::Simple {
                                name: name.text.clone(),
                                span: name.span,
                            },
                            return_type: ty,
                            params,
                            specifiers: FunctionSpecifiers {
                                is_static,
                                ..Default::default()
                            },
                            member_initializers: vec![],
                            body: None,
                            span: start,
                        };
                        self.parse_function_tail(&mut decl)?;
                        return Ok(Declaration::Function(decl));
                    }
                }

                self.frag.restore(cp);
                let args = self.parse_expression_list()?;
                self.frag.expect(TokenId::Semicolon)?;
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: Some(VariableInit::Constructor(args)),
                    span: start,
                }))
            }
            _ => self.unexpected(&tok),
        }
    }

    fn try_parse_parameter_list(&mut self) -> Option<Vec<FunctionParameter>> {
        let cp = self.frag.checkpoint();
        let inner = self.frag.enclosed().ok()?;
        let mut sub = Parser::new(inner);

        let mut params = vec![];
        loop {
            if sub.frag.at_end() {
                return Some(params);
            }
            match sub.parse_function_parameter() {
                Ok(p) => params.push(p),
                Err(_) => {
                    self.frag.restore(cp);
                    return None;
                }
            }
            if !sub.frag.at_end() && sub.frag.eat(TokenId::Comma).is_none() {
                self.frag.restore(cp);
                return None;
            }
        }
    }

    pub(crate) fn parse_function_parameter(
        &mut self,
    ) -> Result<FunctionParameter, SyntaxError> {
        let ty = self.parse_qualified_type()?;
        let span = ty.span;

        let name = match self.frag.eat(TokenId::UserDefinedName) {
            Some(tok) => tok.text,
            None => String::new(),
        };

        let default_value = if self.frag.eat(TokenId::Eq).is_some() {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(FunctionParameter {
            ty,
            name,
            default_value,
            span,
        })
    }

    /// `const`, `= 0`, `= default`, `= delete` or a body, after the
    /// parameter list.
    fn parse_function_tail(&mut self, decl: &mut FunctionDecl) -> Result<(), SyntaxError> {
        if self.frag.eat(TokenId::Const).is_some() {
            decl.specifiers.is_const = true;
        }

        let tok = self.peek_or_eof()?;
        match tok.id {
            TokenId::LeftBrace => {
                decl.body = Some(self.parse_compound_statement()?);
                Ok(())
            }
            TokenId::Eq => {
                self.frag.advance();
                let what = self.peek_or_eof()?;
                match what.id {
                    TokenId::Default => {
                        self.frag.advance();
                        decl.specifiers.is_defaulted = true;
                    }
                    TokenId::Delete => {
                        self.frag.advance();
                        decl.specifiers.is_deleted = true;
                    }
                    TokenId::IntegerLiteral if what.text == "0" => {
                        self.frag.advance();
                        decl.specifiers.is_pure = true;
                    }
                    _ => return self.unexpected(&what),
                }
                self.frag.expect(TokenId::Semicolon)?;
                Ok(())
            }
            _ => self.unexpected(&tok),
        }
    }

    fn parse_operator_function(
        &mut self,
        return_type: QualifiedType,
        specifiers: FunctionSpecifiers,
        start: Span,
    ) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Operator)?;
        let name = self.parse_operator_name(kw.span)?;

        let kind = match &name {
            Identifier::Operator { op, .. } => FunctionKind::Operator(*op),
            Identifier::LiteralOperator { suffix, .. } => {
                FunctionKind::LiteralOperator(suffix.clone())
            }
            _ => unreachable!(),
        };

        let params = self.parse_declared_parameter_list()?;

        let mut decl = FunctionDecl {
            kind,
            name,
            return_type,
            params,
            specifiers,
            member_initializers: vec![],
            body: None,
            span: start,
        };
        self.parse_function_tail(&mut decl)?;

        Ok(Declaration::Function(decl))
    }

    /// Parameter list in a position where it cannot be anything else.
    fn parse_declared_parameter_list(
        &mut self,
    ) -> Result<Vec<FunctionParameter>, SyntaxError> {
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

    pub(crate) fn parse_class_declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.advance().unwrap(); // class | struct

        let name = self.parse_identifier(IdContext::Type)?;

        let is_final = match self.frag.peek() {
            Some(tok) if tok.id == TokenId::UserDefinedName && tok.text == "final" => {
                self.frag.advance();
                true
            }
            _ => false,
        };

        let base = if self.frag.eat(TokenId::Colon).is_some() {
            // an optional access specifier before the base is accepted and
            // ignored; inheritance is always public
            if let Some(tok) = self.frag.peek() {
                if matches!(
                    tok.id,
                    TokenId::Public | TokenId::Protected | TokenId::Private
                ) {
                    self.frag.advance();
                }
            }
            Some(self.parse_identifier(IdContext::Type)?)
        } else {
            None
        };

        let class_name = name.plain_name().unwrap_or_default().to_string();

        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut members = vec![];
        let mut access = AccessSpecifier::Public;

        while !sub.frag.at_end() {
            let tok = sub.peek_or_eof()?;
            match tok.id {
                TokenId::Public => {
                    sub.frag.advance();
                    sub.frag.expect(TokenId::Colon)?;
                    access = AccessSpecifier::Public;
                }
                TokenId::Protected => {
                    sub.frag.advance();
                    sub.frag.expect(TokenId::Colon)?;
                    access = AccessSpecifier::Protected;
                }
                TokenId::Private => {
                    sub.frag.advance();
                    sub.frag.expect(TokenId::Colon)?;
                    access = AccessSpecifier::Private;
                }
                _ => {
                    let decl = sub.parse_member_declaration(&class_name)?;
                    members.push(ClassMember { access, decl });
                }
            }
        }

        self.frag.eat(TokenId::Semicolon);

        Ok(Declaration::Class(ClassDecl {
            name,
            base,
            is_final,
            members,
            span: kw.span,
        }))
    }

    fn parse_member_declaration(
        &mut self,
        class_name: &str,
    ) -> Result<Declaration, SyntaxError> {
        let start = self.peek_or_eof()?.span;
        let mut specifiers = FunctionSpecifiers::default();
        let mut is_static = false;

        loop {
            let tok = self.peek_or_eof()?;
            match tok.id {
                TokenId::Static => {
                    self.frag.advance();
                    is_static = true;
                    specifiers.is_static = true;
                }
                TokenId::Virtual => {
                    self.frag.advance();
                    specifiers.is_virtual = true;
                }
                TokenId::Explicit => {
                    self.frag.advance();
                    specifiers.is_explicit = true;
                }
                _ => break,
            }
        }

        let tok = self.peek_or_eof()?;
        match tok.id {
            TokenId::BitwiseNot => self.parse_destructor(specifiers, start),
            TokenId::Operator => self.parse_cast_operator(specifiers, start),
            TokenId::Class | TokenId::Struct => self.parse_class_declaration(),
            TokenId::Enum => self.parse_enum_declaration(),
            TokenId::Typedef => self.parse_typedef(),
            TokenId::Using => self.parse_using(),
            TokenId::Template => self.parse_template_declaration(),
            TokenId::Friend => self.parse_friend(),
            TokenId::UserDefinedName
                if tok.text == class_name
                    && self.frag.peek_at(1).map(|t| t.id) == Some(TokenId::LeftPar) =>
            {
                self.parse_constructor(specifiers, start)
            }
            _ => self.parse_typed_member(specifiers, is_static, start),
        }
    }

    fn parse_destructor(
        &mut self,
        specifiers: FunctionSpecifiers,
        start: Span,
    ) -> Result<Declaration, SyntaxError> {
        self.frag.expect(TokenId::BitwiseNot)?;
        let name = self.frag.expect(TokenId::UserDefinedName)?;

        let inner = self.frag.enclosed()?;
        if !inner.at_end() {
            return Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedToken {
                    found: inner.peek().unwrap().text,
                    expected: None,
                },
                span: inner.peek().unwrap().span,
            });
        }

        let mut decl = FunctionDecl {
            kind: FunctionKind::Destructor,
            name: Identifier::Simple {
                name: name.text,
                span: name.span,
            },
            return_type: void_type(start),
            params: vec![],
            specifiers,
            member_initializers: vec![],
            body: None,
            span: start,
        };
        self.parse_function_tail(&mut decl)?;

        Ok(Declaration::Function(decl))
    }

    fn parse_constructor(
        &mut self,
        specifiers: FunctionSpecifiers,
        start: Span,
    ) -> Result<Declaration, SyntaxError> {
        let name = self.frag.expect(TokenId::UserDefinedName)?;
        let params = self.parse_declared_parameter_list()?;

        let mut member_initializers = vec![];
        if self.frag.eat(TokenId::Colon).is_some() {
            loop {
                let field = self.frag.expect(TokenId::UserDefinedName)?;
                let init = if self.frag.next_is(TokenId::LeftPar) {
                    VariableInit::Constructor(self.parse_expression_list()?)
                } else {
                    VariableInit::Brace(self.parse_brace_expression_list()?)
                };
                member_initializers.push(MemberInitializer {
                    name: field.text,
                    init,
                    span: field.span,
                });

                if self.frag.eat(TokenId::Comma).is_none() {
                    break;
                }
            }
        }

        let mut decl = FunctionDecl {
            kind: FunctionKind::Constructor,
            name: Identifier::Simple {
                name: name.text,
                span: name.span,
            },
            return_type: void_type(start),
            params,
            specifiers,
            member_initializers,
            body: None,
            span: start,
        };
        self.parse_function_tail(&mut decl)?;

        Ok(Declaration::Function(decl))
    }

    /// `operator T() const` — a conversion function.
    fn parse_cast_operator(
        &mut self,
        specifiers: FunctionSpecifiers,
        start: Span,
    ) -> Result<Declaration, SyntaxError> {
        self.frag.expect(TokenId::Operator)?;
        let target = self.parse_qualified_type()?;

        let inner = self.frag.enclosed()?;
        if !inner.at_end() {
            let tok = inner.peek().unwrap();
            return Err(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedToken {
                    found: tok.text,
                    expected: None,
                },
                span: tok.span,
            });
        }

        let span = target.span;
        let mut decl = FunctionDecl {
            kind: FunctionKind::Cast,
            name: Identifier::Simple {
                name: String::new(),
                span,
            },
            return_type: target,
            params: vec![],
            specifiers,
            member_initializers: vec![],
            body: None,
            span: start,
        };
        self.parse_function_tail(&mut decl)?;

        Ok(Declaration::Function(decl))
    }

    /// A member starting with a type: a data member, a method, or an
    /// operator overload.
    fn parse_typed_member(
        &mut self,
        specifiers: FunctionSpecifiers,
        is_static: bool,
        start: Span,
    ) -> Result<Declaration, SyntaxError> {
        let ty = self.parse_qualified_type()?;

        if self.frag.next_is(TokenId::Operator) {
            return self.parse_operator_function(ty, specifiers, start);
        }

        let name = self.frag.expect(TokenId::UserDefinedName)?;

        let tok = self.peek_or_eof()?;
        match tok.id {
            TokenId::Semicolon => {
                self.frag.advance();
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: None,
                    span: start,
                }))
            }
            TokenId::Eq => {
                self.frag.advance();
                let frag = self.frag.delimited(TokenId::Semicolon)?;
                let expr = Parser::new(frag).parse_whole_expression()?;
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: Some(VariableInit::Assignment(expr)),
                    span: start,
                }))
            }
            TokenId::LeftBrace => {
                let args = self.parse_brace_expression_list()?;
                self.frag.expect(TokenId::Semicolon)?;
                Ok(Declaration::Variable(VariableDecl {
                    ty,
                    name: name.text,
                    is_static,
                    initializer: Some(VariableInit::Brace(args)),
                    span: start,
                }))
            }
            TokenId::LeftPar => {
                let params = self.parse_declared_parameter_list()?;
                let mut decl = FunctionDecl {
                    kind: FunctionKind::Function,
                    name: Identifier::Simple {
                        name: name.text,
                        span: name.span,
                    },
                    return_type: ty,
                    params,
                    specifiers,
                    member_initializers: vec![],
                    body: None,
                    span: start,
                };
                self.parse_function_tail(&mut decl)?;
                Ok(Declaration::Function(decl))
            }
            _ => self.unexpected(&tok),
        }
    }

    pub(crate) fn parse_enum_declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Enum)?;
        let is_enum_class = self.frag.eat(TokenId::Class).is_some();
        let name = self.frag.expect(TokenId::UserDefinedName)?;

        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut values = vec![];
        while !sub.frag.at_end() {
            // empty entries are skipped
            if sub.frag.eat(TokenId::Comma).is_some() {
                continue;
            }

            let entry = sub.frag.expect(TokenId::UserDefinedName)?;
            let value = if sub.frag.eat(TokenId::Eq).is_some() {
                Some(sub.parse_expression()?)
            } else {
                None
            };
            values.push(EnumValueDecl {
                name: entry.text,
                value,
                span: entry.span,
            });

            if !sub.frag.at_end() {
                sub.frag.expect(TokenId::Comma)?;
            }
        }

        self.frag.eat(TokenId::Semicolon);

        Ok(Declaration::Enum(EnumDecl {
            name: name.text,
            is_enum_class,
            values,
            span: kw.span,
        }))
    }

    fn parse_namespace_declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Namespace)?;
        let name = self.frag.expect(TokenId::UserDefinedName)?;

        if self.frag.eat(TokenId::Eq).is_some() {
            let mut path = vec![self.frag.expect(TokenId::UserDefinedName)?.text];
            while self.frag.eat(TokenId::ScopeResolution).is_some() {
                path.push(self.frag.expect(TokenId::UserDefinedName)?.text);
            }
            self.frag.expect(TokenId::Semicolon)?;
            return Ok(Declaration::NamespaceAlias {
                name: name.text,
                path,
                span: kw.span,
            });
        }

        let inner = self.frag.enclosed()?;
        let mut sub = Parser::new(inner);

        let mut declarations = vec![];
        while !sub.frag.at_end() {
            declarations.push(sub.parse_declaration()?);
        }

        Ok(Declaration::Namespace(NamespaceDecl {
            name: name.text,
            declarations,
            span: kw.span,
        }))
    }

    fn parse_typedef(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Typedef)?;
        let ty = self.parse_qualified_type()?;
        let name = self.frag.expect(TokenId::UserDefinedName)?;
        self.frag.expect(TokenId::Semicolon)?;

        Ok(Declaration::Typedef {
            ty,
            name: name.text,
            span: kw.span,
        })
    }

    fn parse_using(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Using)?;

        if self.frag.eat(TokenId::Namespace).is_some() {
            let namespace = self.parse_identifier(IdContext::Type)?;
            self.frag.expect(TokenId::Semicolon)?;
            return Ok(Declaration::UsingDirective {
                namespace,
                span: kw.span,
            });
        }

        let target = self.parse_identifier(IdContext::Type)?;

        if self.frag.eat(TokenId::Eq).is_some() {
            let name = match &target {
                Identifier::Simple { name, .. } => name.clone(),
                _ => {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::ExpectedIdentifier,
                        span: target.span(),
                    })
                }
            };
            let aliased = self.parse_qualified_type()?;
            self.frag.expect(TokenId::Semicolon)?;
            return Ok(Declaration::TypeAlias {
                name,
                target: aliased,
                span: kw.span,
            });
        }

        self.frag.expect(TokenId::Semicolon)?;
        Ok(Declaration::UsingDeclaration {
            target,
            span: kw.span,
        })
    }

    fn parse_import(&mut self) -> Result<Declaration, SyntaxError> {
        let start = self.peek_or_eof()?.span;
        let export = self.frag.eat(TokenId::Export).is_some();
        self.frag.expect(TokenId::Import)?;

        let mut names = vec![self.frag.expect(TokenId::UserDefinedName)?.text];
        while self.frag.eat(TokenId::Dot).is_some() {
            names.push(self.frag.expect(TokenId::UserDefinedName)?.text);
        }
        self.frag.expect(TokenId::Semicolon)?;

        Ok(Declaration::Import {
            export,
            names,
            span: start,
        })
    }

    fn parse_friend(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Friend)?;
        self.frag.expect(TokenId::Class)?;
        let class_name = self.parse_identifier(IdContext::Type)?;
        self.frag.expect(TokenId::Semicolon)?;

        Ok(Declaration::Friend {
            class_name,
            span: kw.span,
        })
    }

    fn parse_template_declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let kw = self.frag.expect(TokenId::Template)?;
        self.frag.expect(TokenId::Less)?;

        let mut parameters = vec![];
        while self.frag.eat(TokenId::GreaterThan).is_none() {
            parameters.push(self.parse_template_parameter()?);

            if self.frag.eat(TokenId::Comma).is_none() {
                self.frag.expect(TokenId::GreaterThan)?;
                break;
            }
        }

        let tok = self.peek_or_eof()?;
        let declaration = match tok.id {
            TokenId::Class | TokenId::Struct => self.parse_class_declaration()?,
            _ => {
                let decl = self.try_parse_variable_or_function()?;
                if !matches!(decl, Declaration::Function(_)) {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::ExpectedDeclaration,
                        span: tok.span,
                    });
                }
                decl
            }
        };

        Ok(Declaration::Template(TemplateDecl {
            parameters,
            declaration: Box::new(declaration),
            span: kw.span,
        }))
    }

    fn parse_template_parameter(&mut self) -> Result<TemplateParameterDecl, SyntaxError> {
        let start = self.peek_or_eof()?.span;

        let kind = if self.frag.eat(TokenId::Typename).is_some() {
            TemplateParameterDeclKind::Typename
        } else {
            let ty = self.parse_qualified_type()?;
            TemplateParameterDeclKind::NonType(ty)
        };

        let is_pack = self.try_parse_ellipsis();

        let name = self.frag.expect(TokenId::UserDefinedName)?;

        let default_value = if self.frag.eat(TokenId::Eq).is_some() {
            Some(self.parse_template_argument()?)
        } else {
            None
        };

        Ok(TemplateParameterDecl {
            kind,
            name: name.text,
            is_pack,
            default_value,
            span: start,
        })
    }

    /// `...` lexes as three dots.
    fn try_parse_ellipsis(&mut self) -> bool {
        if self.frag.next_is(TokenId::Dot)
            && self.frag.peek_at(1).map(|t| t.id) == Some(TokenId::Dot)
            && self.frag.peek_at(2).map(|t| t.id) == Some(TokenId::Dot)
        {
            self.frag.advance();
            self.frag.advance();
            self.frag.advance();
            true
        } else {
            false
        }
    }
}

fn void_type(span: Span) -> QualifiedType {
    QualifiedType {
        is_const: false,
        ref_kind: crate::ast::RefKind::None,
        kind: TypeNameKind::Named(Identifier::Simple {
            name: "void".into(),
            span,
        }),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use crate::source::SourceFile;

    fn parse(src: &str) -> crate::ast::Script {
        parse_script(&SourceFile::from_string(src)).unwrap()
    }

    fn first_declaration(src: &str) -> Declaration {
        let script = parse(src);
        match script.statements.into_iter().next().unwrap() {
            crate::ast::Statement::Declaration(d) => *d,
            other => panic!("expected a declaration, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_variable_declaration() {
        let decl = first_declaration("int a = 5;");
        let Declaration::Variable(var) = decl else {
            panic!("expected variable");
        };
        assert_eq!(var.name, "a");
        assert!(matches!(var.initializer, Some(VariableInit::Assignment(_))));
    }

    #[test]
    fn test_parse_function_declaration() {
        let decl = first_declaration("int incr(int n) { return n + 1; }");
        let Declaration::Function(f) = decl else {
            panic!("expected function");
        };
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].name, "n");
        assert!(f.body.is_some());
    }

    #[test]
    fn test_parse_function_with_default_argument() {
        let decl = first_declaration("int f(int a, int b = 2) { return a + b; }");
        let Declaration::Function(f) = decl else {
            panic!("expected function");
        };
        assert!(f.params[0].default_value.is_none());
        assert!(f.params[1].default_value.is_some());
    }

    #[test]
    fn test_parse_class_with_members() {
        let decl = first_declaration(
            "class A { public: int n; A() { } ~A() { } int get() const { return n; } };",
        );
        let Declaration::Class(c) = decl else {
            panic!("expected class");
        };
        assert_eq!(c.members.len(), 4);
        assert!(!c.is_final);
    }

    #[test]
    fn test_parse_class_inheritance() {
        let decl = first_declaration("class B : A { };");
        let Declaration::Class(c) = decl else {
            panic!("expected class");
        };
        assert!(c.base.is_some());
    }

    #[test]
    fn test_parse_enum_with_empty_entries() {
        let decl = first_declaration("enum E { X, Y, , Z };");
        let Declaration::Enum(e) = decl else {
            panic!("expected enum");
        };
        let names: Vec<_> = e.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_parse_class_template() {
        let decl = first_declaration("template<typename T> class Box { T value; };");
        let Declaration::Template(t) = decl else {
            panic!("expected template");
        };
        assert_eq!(t.parameters.len(), 1);
        assert!(matches!(
            t.parameters[0].kind,
            TemplateParameterDeclKind::Typename
        ));
        assert!(matches!(*t.declaration, Declaration::Class(_)));
    }

    #[test]
    fn test_parse_function_template() {
        let decl = first_declaration("template<typename T> T max(T a, T b) { return a < b ? b : a; }");
        let Declaration::Template(t) = decl else {
            panic!("expected template");
        };
        assert!(matches!(*t.declaration, Declaration::Function(_)));
    }

    #[test]
    fn test_parse_operator_overload() {
        let decl = first_declaration(
            "class Vec { Vec operator+(const Vec & other) { return other; } };",
        );
        let Declaration::Class(c) = decl else {
            panic!("expected class");
        };
        let Declaration::Function(f) = &c.members[0].decl else {
            panic!("expected function member");
        };
        assert!(matches!(
            f.kind,
            FunctionKind::Operator(OperatorKind::Addition)
        ));
    }

    #[test]
    fn test_parse_cast_operator() {
        let decl = first_declaration("class A { operator int() const { return 0; } };");
        let Declaration::Class(c) = decl else {
            panic!("expected class");
        };
        let Declaration::Function(f) = &c.members[0].decl else {
            panic!("expected function member");
        };
        assert!(matches!(f.kind, FunctionKind::Cast));
        assert!(f.specifiers.is_const);
    }

    #[test]
    fn test_parse_literal_operator() {
        let decl = first_declaration("double operator\"\" _km(double x) { return x; }");
        let Declaration::Function(f) = decl else {
            panic!("expected function");
        };
        assert!(matches!(&f.kind, FunctionKind::LiteralOperator(s) if s == "_km"));
    }

    #[test]
    fn test_parse_using_and_aliases() {
        assert!(matches!(
            first_declaration("using namespace std;"),
            Declaration::UsingDirective { .. }
        ));
        assert!(matches!(
            first_declaration("using A::b;"),
            Declaration::UsingDeclaration { .. }
        ));
        assert!(matches!(
            first_declaration("using Ty = int;"),
            Declaration::TypeAlias { .. }
        ));
        assert!(matches!(
            first_declaration("namespace A = X::Y::Z;"),
            Declaration::NamespaceAlias { .. }
        ));
        assert!(matches!(
            first_declaration("typedef const int CInt;"),
            Declaration::Typedef { .. }
        ));
    }

    #[test]
    fn test_parse_import() {
        let decl = first_declaration("import a.b.c;");
        let Declaration::Import { export, names, .. } = decl else {
            panic!("expected import");
        };
        assert!(!export);
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_statement_vs_declaration() {
        let script = parse("a = a + 1;");
        assert!(matches!(
            script.statements[0],
            crate::ast::Statement::Expression(_)
        ));

        let script = parse("a b = c;");
        assert!(matches!(
            script.statements[0],
            crate::ast::Statement::Declaration(_)
        ));
    }
}
