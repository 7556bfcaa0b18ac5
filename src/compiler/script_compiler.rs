//! Declaration processing.
//!
//! Pass 1 walks every declaration of the script, creating symbol shells
//! and registering them in their enclosing scope. Declarations whose
//! types cannot be resolved yet (a data member of a not-yet-declared
//! class, a function signature mentioning one) are queued and re-attempted
//! until all succeed or a whole pass makes no progress. Function bodies
//! and variable initializers are scheduled for the `CompilingFunctions`
//! phase.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{self, AccessSpecifier};
use crate::lexer::Span;
use crate::name_lookup::{self, NameLookup, NameLookupOptions};
use crate::operators::OperatorKind;
use crate::parser;
use crate::program;
use crate::scope::{Injection, Scope, ScopeFrame};
use crate::symbols::{
    Class, DataMember, Enum, Function, FunctionBody, FunctionId, FunctionName, Namespace,
    PartialSpecialization, StaticDataMember, Symbol, Template, TemplateInstance,
    TemplateParameter, TemplateParameterKind,
};
use crate::types::{ClassId, Prototype, Type, TypeFlag};
use crate::value::Value;

use super::errors::{CResult, CompilationFailure, CompileError};
use super::{CompileFunctionTask, Compiler, ScopedDeclaration, VariableInitTask};

impl Compiler<'_> {
    /// Compiles a script; on failure every generated symbol is rolled
    /// back and the script only carries the accumulated messages.
    pub fn compile_script(&mut self, script: usize) -> bool {
        let ok = self.guarded(|c| c.compile_script_inner(script)).is_some();

        let messages = std::mem::take(&mut self.session.messages);
        if let Some(s) = self.engine.scripts.get_mut(script) {
            s.messages.extend(messages);
            s.compiled = ok;
        }
        ok
    }

    fn compile_script_inner(&mut self, script: usize) -> CResult<()> {
        let source = self.engine.scripts[script].source.clone();
        log::debug!("compiling script #{script}");

        let ast = match parser::parse_script(&source) {
            Ok(ast) => ast,
            Err(e) => {
                return Err(CompilationFailure {
                    kind: CompileError::SyntaxError(e.to_string()),
                    location: Some(e.location()),
                })
            }
        };

        let root = self.symbols().root();
        let ns = self
            .symbols_mut()
            .add_namespace(Namespace::new(String::new(), Some(root)));
        self.engine.scripts[script].namespace = Some(ns);

        let globals = Rc::new(RefCell::new(vec![]));
        let scope = Scope::new(ScopeFrame::Namespace(root)).child(ScopeFrame::Script {
            script,
            namespace: ns,
            globals: globals.clone(),
        });

        let mut root_statements = vec![];
        for stmt in &ast.statements {
            match stmt {
                ast::Statement::Declaration(decl) => {
                    self.process_or_collect(decl, &scope, AccessSpecifier::Public)?
                }
                other => root_statements.push(other.clone()),
            }
        }

        self.process_pending_declarations()?;
        self.run_pending_generation()?;
        self.finalize()?;

        self.compile_root_function(script, &root_statements, &scope)?;
        self.finalize()?;

        self.engine.scripts[script].globals = globals.borrow().clone();
        Ok(())
    }

    /// Processes a declaration, queueing it for a later pass when its
    /// types are not resolvable yet.
    pub(crate) fn process_or_collect(
        &mut self,
        decl: &ast::Declaration,
        scope: &Scope,
        access: AccessSpecifier,
    ) -> CResult<()> {
        match self.process_declaration(decl, scope, access) {
            Ok(()) => Ok(()),
            Err(failure) if is_retryable(&failure) => {
                log::trace!("deferring declaration: {failure}");
                let item = ScopedDeclaration {
                    scope: scope.clone(),
                    decl: decl.clone(),
                    access,
                };
                if matches!(decl, ast::Declaration::Function(_)) {
                    self.incomplete_functions.push_back(item);
                } else {
                    self.member_queue.push_back(item);
                }
                Ok(())
            }
            Err(failure) => Err(failure),
        }
    }

    /// Re-attempts queued declarations until a fixed point: either every
    /// queue empties or a pass completes with no progress.
    pub(crate) fn process_pending_declarations(&mut self) -> CResult<()> {
        loop {
            let pending = self.member_queue.len() + self.incomplete_functions.len();
            if pending == 0 {
                return Ok(());
            }

            let mut progress = false;
            let mut first_failure: Option<CompilationFailure> = None;

            for _ in 0..self.member_queue.len() {
                let item = self.member_queue.pop_front().unwrap();
                match self.process_declaration(&item.decl, &item.scope, item.access) {
                    Ok(()) => progress = true,
                    Err(failure) if is_retryable(&failure) => {
                        first_failure.get_or_insert(failure);
                        self.member_queue.push_back(item);
                    }
                    Err(failure) => return Err(failure),
                }
            }

            for _ in 0..self.incomplete_functions.len() {
                let item = self.incomplete_functions.pop_front().unwrap();
                match self.process_declaration(&item.decl, &item.scope, item.access) {
                    Ok(()) => progress = true,
                    Err(failure) if is_retryable(&failure) => {
                        first_failure.get_or_insert(failure);
                        self.incomplete_functions.push_back(item);
                    }
                    Err(failure) => return Err(failure),
                }
            }

            if !progress {
                return Err(first_failure
                    .unwrap_or_else(|| CompilationFailure::new(CompileError::DeclarationProcessingError)));
            }
        }
    }

    fn process_declaration(
        &mut self,
        decl: &ast::Declaration,
        scope: &Scope,
        access: AccessSpecifier,
    ) -> CResult<()> {
        match decl {
            ast::Declaration::Variable(v) => self.process_variable_declaration(v, scope, access),
            ast::Declaration::Function(f) => {
                let member_of = match scope.frame() {
                    Some(ScopeFrame::Class(c)) => Some(c),
                    _ => None,
                };
                self.process_function_declaration(f, scope, access, member_of)
            }
            ast::Declaration::Class(c) => self.process_class_declaration(c, scope),
            ast::Declaration::Enum(e) => self.process_enum_declaration(e, scope),
            ast::Declaration::Namespace(n) => self.process_namespace_declaration(n, scope),
            ast::Declaration::NamespaceAlias { name, path, span } => {
                self.process_namespace_alias(name, path, *span, scope)
            }
            ast::Declaration::Typedef { ty, name, span } => {
                self.process_type_alias(name, ty, *span, scope)
            }
            ast::Declaration::TypeAlias { name, target, span } => {
                self.process_type_alias(name, target, *span, scope)
            }
            ast::Declaration::UsingDeclaration { target, span } => {
                self.process_using_declaration(target, *span, scope)
            }
            ast::Declaration::UsingDirective { namespace, span } => {
                self.process_using_directive(namespace, *span, scope)
            }
            ast::Declaration::Import { names, span, .. } => {
                self.process_import(names, *span, scope)
            }
            ast::Declaration::Friend { class_name, span } => {
                self.process_friend(class_name, *span, scope)
            }
            ast::Declaration::Template(t) => self.process_template_declaration(t, scope),
        }
    }

    // variables

    fn process_variable_declaration(
        &mut self,
        v: &ast::VariableDecl,
        scope: &Scope,
        access: AccessSpecifier,
    ) -> CResult<()> {
        if let Some(ScopeFrame::Class(class)) = scope.frame() {
            return self.process_data_member(v, class, scope, access);
        }

        // a script global
        let ty = if v.ty.is_auto() {
            if v.initializer.is_none() {
                return Err(CompilationFailure::at(
                    CompileError::AutoMustBeUsedWithAssignment,
                    v.span,
                ));
            }
            Type::AUTO
        } else {
            self.resolve_type(&v.ty, scope)?
        };

        if v.initializer.is_none() {
            if ty.is_any_reference() {
                return Err(CompilationFailure::at(
                    CompileError::ReferencesMustBeInitialized,
                    v.span,
                ));
            }
            if ty.is_enum_type() {
                return Err(CompilationFailure::at(
                    CompileError::EnumerationsMustBeInitialized,
                    v.span,
                ));
            }
            if ty.is_function_type() {
                return Err(CompilationFailure::at(
                    CompileError::FunctionVariablesMustBeInitialized,
                    v.span,
                ));
            }
        }

        let Some((script, _, globals)) = scope.script_frame() else {
            return Err(CompilationFailure::at(
                CompileError::NotImplemented("variable outside a script".into()),
                v.span,
            ));
        };

        let index = {
            let mut globals = globals.borrow_mut();
            globals.push((v.name.clone(), ty));
            globals.len() - 1
        };

        self.variable_tasks.push_back(VariableInitTask::Global {
            script,
            index,
            decl: v.clone(),
            scope: scope.clone(),
        });
        Ok(())
    }

    fn process_data_member(
        &mut self,
        v: &ast::VariableDecl,
        class: ClassId,
        scope: &Scope,
        access: AccessSpecifier,
    ) -> CResult<()> {
        if v.is_static {
            let ty = self.resolve_type(&v.ty, scope)?;
            if v.initializer.is_none() {
                return Err(CompilationFailure::at(
                    CompileError::MissingStaticInitialization,
                    v.span,
                ));
            }
            self.symbols_mut().class_mut(class).static_members.insert(
                v.name.clone(),
                StaticDataMember {
                    ty,
                    access,
                    initializer: None,
                },
            );
            self.variable_tasks.push_back(VariableInitTask::Static {
                class,
                name: v.name.clone(),
                decl: v.clone(),
                scope: scope.clone(),
            });
            return Ok(());
        }

        if v.ty.is_auto() {
            return Err(CompilationFailure::at(
                CompileError::DataMemberCannotBeAuto,
                v.span,
            ));
        }
        if v.initializer.is_some() {
            return Err(CompilationFailure::at(
                CompileError::DataMemberAlreadyHasInitializer(v.name.clone()),
                v.span,
            ));
        }

        let ty = self.resolve_type(&v.ty, scope)?;
        self.symbols_mut()
            .class_mut(class)
            .data_members
            .push(DataMember {
                ty,
                name: v.name.clone(),
                access,
            });
        Ok(())
    }

    // classes

    fn process_class_declaration(
        &mut self,
        decl: &ast::ClassDecl,
        scope: &Scope,
    ) -> CResult<()> {
        let ast::Identifier::Simple { name, .. } = &decl.name else {
            return Err(CompilationFailure::at(
                CompileError::NotImplemented(
                    "class specialization outside a template declaration".into(),
                ),
                decl.span,
            ));
        };

        // the base must be resolvable before the class shell is created
        let base = match &decl.base {
            Some(id) => {
                let t = self.resolve_type_name(id, scope)?;
                let Some(base_class) = t.class_id() else {
                    return Err(CompilationFailure::at(
                        CompileError::InvalidBaseClass(id.to_string()),
                        decl.span,
                    ));
                };
                if self.symbols().class(base_class).is_final {
                    return Err(CompilationFailure::at(
                        CompileError::BaseClassIsFinal(
                            self.symbols().class(base_class).name.clone(),
                        ),
                        decl.span,
                    ));
                }
                Some(base_class)
            }
            None => None,
        };

        let enclosing = scope.enclosing_symbol().unwrap_or(Symbol::Namespace(
            self.symbols().root(),
        ));

        let mut class = Class::new(name.clone(), enclosing);
        class.base = base;
        class.is_final = decl.is_final;
        if let Some(base) = base {
            class.vtable = self.symbols().class(base).vtable.clone();
        }

        let class_id = self.symbols_mut().add_class(class);
        log::trace!("declared class '{name}'");

        let class_scope = scope.child(ScopeFrame::Class(class_id));
        self.process_class_members(class_id, &decl.members, &class_scope)?;
        self.pending_generation.push((class_id, decl.span));
        Ok(())
    }

    /// Walks a class body, registering members and queueing those whose
    /// types do not resolve yet.
    pub(crate) fn process_class_members(
        &mut self,
        class: ClassId,
        members: &[ast::ClassMember],
        class_scope: &Scope,
    ) -> CResult<()> {
        for member in members {
            match &member.decl {
                ast::Declaration::Function(f) => {
                    match self.process_function_declaration(
                        f,
                        class_scope,
                        member.access,
                        Some(class),
                    ) {
                        Ok(()) => {}
                        Err(failure) if is_retryable(&failure) => {
                            self.incomplete_functions.push_back(ScopedDeclaration {
                                scope: class_scope.clone(),
                                decl: member.decl.clone(),
                                access: member.access,
                            });
                        }
                        Err(failure) => return Err(failure),
                    }
                }
                other => self.process_or_collect(other, class_scope, member.access)?,
            }
        }
        Ok(())
    }

    /// Runs special-member generation for the classes declared in this
    /// pass, in declaration order.
    pub(crate) fn run_pending_generation(&mut self) -> CResult<()> {
        let pending = std::mem::take(&mut self.pending_generation);
        for (class, span) in pending {
            self.generate_special_members(class, span)?;
        }
        Ok(())
    }

    // enums

    fn process_enum_declaration(&mut self, decl: &ast::EnumDecl, scope: &Scope) -> CResult<()> {
        let enclosing = scope
            .enclosing_symbol()
            .unwrap_or(Symbol::Namespace(self.symbols().root()));

        let mut e = Enum::new(decl.name.clone(), enclosing, decl.is_enum_class);

        let mut next = 0i64;
        for value in &decl.values {
            let n = match &value.value {
                Some(expr) => match crate::template_engine::eval_const_literal(expr) {
                    Some(crate::symbols::TemplateArgument::Integer(n)) => n,
                    _ => {
                        return Err(CompilationFailure::at(
                            CompileError::NonConstExprTemplateArgument,
                            value.span,
                        ))
                    }
                },
                None => next,
            };
            e.values.insert(value.name.clone(), n);
            next = n + 1;
        }

        let enum_id = self.symbols_mut().add_enum(e);

        // synthesized assignment operator
        let enum_type = Type::enumeration(enum_id);
        let assign = self.symbols_mut().add_function(Function::new(
            FunctionName::Operator(OperatorKind::Assignment),
            Prototype::new(
                Type::reference(enum_type),
                vec![Type::reference(enum_type), enum_type],
            ),
        ));
        self.symbols_mut().enumeration_mut(enum_id).assignment = Some(assign);
        Ok(())
    }

    // namespaces and injections

    fn process_namespace_declaration(
        &mut self,
        decl: &ast::NamespaceDecl,
        scope: &Scope,
    ) -> CResult<()> {
        let Some(parent) = scope.enclosing_namespace() else {
            return Err(CompilationFailure::at(
                CompileError::NotImplemented("namespace outside a namespace".into()),
                decl.span,
            ));
        };

        // reopen an existing namespace of the same name
        let existing = self
            .symbols()
            .namespace(parent)
            .namespaces
            .iter()
            .copied()
            .find(|&ns| self.symbols().namespace(ns).name == decl.name);

        let ns = match existing {
            Some(ns) => ns,
            None => self
                .symbols_mut()
                .add_namespace(Namespace::new(decl.name.clone(), Some(parent))),
        };

        let inner = scope.child(ScopeFrame::Namespace(ns));
        for d in &decl.declarations {
            self.process_or_collect(d, &inner, AccessSpecifier::Public)?;
        }
        Ok(())
    }

    fn process_namespace_alias(
        &mut self,
        name: &str,
        path: &[String],
        _span: Span,
        scope: &Scope,
    ) -> CResult<()> {
        if let Some(ns) = scope.enclosing_namespace() {
            self.symbols_mut()
                .namespace_mut(ns)
                .namespace_aliases
                .insert(name.to_string(), path.to_vec());
        }
        scope.inject(Injection::NamespaceAlias(name.to_string(), path.to_vec()));
        Ok(())
    }

    fn process_type_alias(
        &mut self,
        name: &str,
        target: &ast::QualifiedType,
        _span: Span,
        scope: &Scope,
    ) -> CResult<()> {
        let ty = self.resolve_type(target, scope)?;

        match scope.frame() {
            Some(ScopeFrame::Class(class)) => {
                self.symbols_mut()
                    .class_mut(class)
                    .type_aliases
                    .insert(name.to_string(), ty);
            }
            _ => {
                if let Some(ns) = scope.enclosing_namespace() {
                    self.symbols_mut()
                        .namespace_mut(ns)
                        .type_aliases
                        .insert(name.to_string(), ty);
                }
                scope.inject(Injection::TypeAlias(name.to_string(), ty));
            }
        }
        Ok(())
    }

    fn process_using_declaration(
        &mut self,
        target: &ast::Identifier,
        span: Span,
        scope: &Scope,
    ) -> CResult<()> {
        let name = match target.rightmost() {
            ast::Identifier::Simple { name, .. } => name.clone(),
            _ => {
                return Err(CompilationFailure::at(
                    CompileError::InvalidNameInUsingDirective(target.to_string()),
                    span,
                ))
            }
        };

        match name_lookup::resolve(target, scope, self.symbols(), NameLookupOptions::default()) {
            NameLookup::Functions(fns) => {
                scope.inject(Injection::UsingFunctions(name, fns));
                Ok(())
            }
            NameLookup::Type(t) => {
                scope.inject(Injection::UsingType(name, t));
                Ok(())
            }
            NameLookup::Namespace(ns) => {
                scope.inject(Injection::UsingNamespace(name, ns));
                Ok(())
            }
            _ => Err(CompilationFailure::at(
                CompileError::InvalidNameInUsingDirective(target.to_string()),
                span,
            )),
        }
    }

    fn process_using_directive(
        &mut self,
        namespace: &ast::Identifier,
        span: Span,
        scope: &Scope,
    ) -> CResult<()> {
        match name_lookup::resolve(namespace, scope, self.symbols(), NameLookupOptions::default())
        {
            NameLookup::Namespace(ns) => {
                scope.inject(Injection::Namespace(ns));
                Ok(())
            }
            _ => Err(CompilationFailure::at(
                CompileError::InvalidNameInUsingDirective(namespace.to_string()),
                span,
            )),
        }
    }

    fn process_import(&mut self, names: &[String], span: Span, scope: &Scope) -> CResult<()> {
        let name = names.join(".");
        log::debug!("importing module '{name}'");

        let ns = self
            .load_module(&name)
            .map_err(|kind| CompilationFailure::at(kind, span))?;
        scope.inject(Injection::Namespace(ns));
        Ok(())
    }

    fn process_friend(
        &mut self,
        class_name: &ast::Identifier,
        span: Span,
        scope: &Scope,
    ) -> CResult<()> {
        let Some(ScopeFrame::Class(class)) = scope.frame() else {
            return Err(CompilationFailure::at(
                CompileError::NotImplemented("friend declaration outside a class".into()),
                span,
            ));
        };

        let t = self.resolve_type_name(class_name, scope)?;
        let Some(friend) = t.class_id() else {
            return Err(CompilationFailure::at(
                CompileError::InvalidTypeName(class_name.to_string()),
                span,
            ));
        };
        self.symbols_mut().class_mut(class).friends.push(friend);
        Ok(())
    }

    // functions

    pub(crate) fn process_function_declaration(
        &mut self,
        decl: &ast::FunctionDecl,
        scope: &Scope,
        access: AccessSpecifier,
        member_of: Option<ClassId>,
    ) -> CResult<()> {
        let function = self.build_function(decl, scope, access, member_of)?;
        self.register_function(function, decl, member_of)?;

        if decl.body.is_some() || decl.specifiers.is_defaulted {
            self.function_tasks.push_back(CompileFunctionTask {
                function,
                decl: Rc::new(decl.clone()),
                scope: scope.clone(),
            });
        }
        Ok(())
    }

    /// Resolves the signature and produces the function symbol, with its
    /// flag invariants checked.
    fn build_function(
        &mut self,
        decl: &ast::FunctionDecl,
        scope: &Scope,
        access: AccessSpecifier,
        member_of: Option<ClassId>,
    ) -> CResult<FunctionId> {
        let spec = decl.specifiers;

        if member_of.is_none() && (spec.is_virtual || spec.is_pure) {
            return Err(CompilationFailure::at(
                CompileError::InvalidUseOfVirtualKeyword,
                decl.span,
            ));
        }
        if member_of.is_none() && spec.is_const {
            return Err(CompilationFailure::at(
                CompileError::InvalidUseOfConstKeyword,
                decl.span,
            ));
        }
        if spec.is_static && (spec.is_virtual || spec.is_const) {
            return Err(CompilationFailure::at(
                CompileError::InvalidUseOfStaticKeyword,
                decl.span,
            ));
        }
        if spec.is_explicit && !matches!(decl.kind, ast::FunctionKind::Constructor) {
            return Err(CompilationFailure::at(
                CompileError::InvalidUseOfExplicitKeyword,
                decl.span,
            ));
        }
        if spec.is_defaulted && spec.is_deleted {
            return Err(CompilationFailure::at(
                CompileError::FunctionCannotBeDefaulted,
                decl.span,
            ));
        }

        // default arguments may only be absent in a suffix of the
        // parameter list
        let mut seen_default = false;
        for p in &decl.params {
            if p.default_value.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(CompilationFailure::at(
                    CompileError::DefaultArgumentsMustBeTrailing,
                    p.span,
                ));
            }
        }

        let (mut name, return_type) = match &decl.kind {
            ast::FunctionKind::Function => {
                let n = decl.name.plain_name().unwrap_or_default().to_string();
                (FunctionName::Name(n), self.resolve_type(&decl.return_type, scope)?)
            }
            ast::FunctionKind::Constructor => (FunctionName::Constructor, Type::VOID),
            ast::FunctionKind::Destructor => (FunctionName::Destructor, Type::VOID),
            ast::FunctionKind::Operator(op) => (
                FunctionName::Operator(*op),
                self.resolve_type(&decl.return_type, scope)?,
            ),
            ast::FunctionKind::LiteralOperator(suffix) => (
                FunctionName::LiteralOperator(suffix.clone()),
                self.resolve_type(&decl.return_type, scope)?,
            ),
            ast::FunctionKind::Cast => {
                let target = self.resolve_type(&decl.return_type, scope)?;
                (FunctionName::Cast(target), target)
            }
        };

        let mut params = vec![];
        let is_instance_member = member_of.is_some() && !spec.is_static;
        if let Some(class) = member_of {
            if is_instance_member {
                let mut this = Type::reference(Type::object(class));
                if spec.is_const {
                    this = this.with_const();
                }
                params.push(this.with_flag(TypeFlag::ThisParameter));
            }
        }
        for p in &decl.params {
            params.push(self.resolve_type(&p.ty, scope)?);
        }

        // prefix/postfix increment forms are told apart by the dummy
        // `int` parameter
        if let FunctionName::Operator(op) = name {
            let explicit = params.len() - usize::from(is_instance_member);
            match op {
                OperatorKind::PreIncrement | OperatorKind::PreDecrement => {
                    let postfix_arity = usize::from(!is_instance_member) + 1;
                    if explicit == postfix_arity && params.last() == Some(&Type::INT) {
                        params.pop();
                        name = FunctionName::Operator(match op {
                            OperatorKind::PreIncrement => OperatorKind::PostIncrement,
                            _ => OperatorKind::PostDecrement,
                        });
                    } else if explicit != postfix_arity - 1 {
                        return Err(CompilationFailure::at(
                            CompileError::InvalidParamCountInOperatorOverload {
                                expected: postfix_arity - 1,
                                got: explicit,
                            },
                            decl.span,
                        ));
                    }
                }
                OperatorKind::Assignment
                | OperatorKind::FunctionCall
                | OperatorKind::Subscript => {
                    if !is_instance_member {
                        return Err(CompilationFailure::at(
                            CompileError::OpOverloadMustBeDeclaredAsMember(op),
                            decl.span,
                        ));
                    }
                }
                _ if op.is_binary() => {
                    let expected = 2 - usize::from(is_instance_member);
                    if explicit != expected {
                        return Err(CompilationFailure::at(
                            CompileError::InvalidParamCountInOperatorOverload {
                                expected,
                                got: explicit,
                            },
                            decl.span,
                        ));
                    }
                }
                _ => {
                    let expected = 1 - usize::from(is_instance_member);
                    if explicit != expected {
                        return Err(CompilationFailure::at(
                            CompileError::InvalidParamCountInOperatorOverload {
                                expected,
                                got: explicit,
                            },
                            decl.span,
                        ));
                    }
                }
            }
        }

        let mut f = Function::new(name, Prototype::new(return_type, params));
        f.access = access;
        f.owner = Some(match member_of {
            Some(class) => Symbol::Class(class),
            None => Symbol::Namespace(
                scope.enclosing_namespace().unwrap_or(self.symbols().root()),
            ),
        });
        if spec.is_static {
            f.flags.set_static();
        }
        if spec.is_const {
            f.flags.set_const();
        }
        if spec.is_virtual {
            f.flags.set_virtual();
        }
        if spec.is_pure {
            f.flags.set_pure();
        }
        if spec.is_deleted {
            f.flags.set_deleted();
        }
        if spec.is_defaulted {
            f.flags.set_defaulted();
        }
        if spec.is_explicit {
            f.flags.set_explicit();
        }

        Ok(self.symbols_mut().add_function(f))
    }

    /// Attaches a built function to its owner and merges it into the
    /// virtual table where applicable.
    fn register_function(
        &mut self,
        function: FunctionId,
        decl: &ast::FunctionDecl,
        member_of: Option<ClassId>,
    ) -> CResult<()> {
        let name = self.symbols().function(function).name.clone();

        let Some(class) = member_of else {
            let Some(Symbol::Namespace(ns)) = self.symbols().function(function).owner else {
                return Ok(());
            };
            match &name {
                FunctionName::Name(n) => {
                    self.symbols_mut()
                        .namespace_mut(ns)
                        .add_function(n.clone(), function);
                }
                FunctionName::Operator(_) => {
                    self.symbols_mut().namespace_mut(ns).operators.push(function)
                }
                FunctionName::LiteralOperator(_) => self
                    .symbols_mut()
                    .namespace_mut(ns)
                    .literal_operators
                    .push(function),
                _ => {
                    return Err(CompilationFailure::at(
                        CompileError::NotImplemented(
                            "constructor outside a class".into(),
                        ),
                        decl.span,
                    ))
                }
            }
            return Ok(());
        };

        match &name {
            FunctionName::Constructor => {
                self.symbols_mut().class_mut(class).constructors.push(function)
            }
            FunctionName::Destructor => {
                self.symbols_mut().class_mut(class).destructor = Some(function)
            }
            FunctionName::Cast(_) => self.symbols_mut().class_mut(class).casts.push(function),
            FunctionName::Operator(_) => {
                self.symbols_mut().class_mut(class).operators.push(function)
            }
            FunctionName::LiteralOperator(_) => {
                return Err(CompilationFailure::at(
                    CompileError::NotImplemented("literal operator inside a class".into()),
                    decl.span,
                ))
            }
            FunctionName::Name(n) => {
                self.symbols_mut().class_mut(class).add_method(n.clone(), function);
                self.merge_into_vtable(class, function);
            }
        }
        Ok(())
    }

    /// Overrides replace same-signature base entries in place; new
    /// virtual functions append.
    fn merge_into_vtable(&mut self, class: ClassId, function: FunctionId) {
        let f = self.symbols().function(function);
        if f.flags.is_static() {
            return;
        }

        let name = f.name.clone();
        let explicit_params: Vec<Type> = f.prototype.params[1..].to_vec();
        let is_const = f.flags.is_const();
        let declared_virtual = f.flags.is_virtual();

        let vtable = self.symbols().class(class).vtable.clone();
        let matching = vtable.iter().position(|&entry| {
            let e = self.symbols().function(entry);
            e.name == name
                && e.prototype.params[1..] == explicit_params[..]
                && e.flags.is_const() == is_const
        });

        match matching {
            Some(index) => {
                self.symbols_mut().class_mut(class).vtable[index] = function;
                let f = self.symbols_mut().function_mut(function);
                f.flags.set_virtual();
                f.vtable_index = Some(index);
            }
            None if declared_virtual => {
                let index = vtable.len();
                self.symbols_mut().class_mut(class).vtable.push(function);
                self.symbols_mut().function_mut(function).vtable_index = Some(index);
            }
            None => {}
        }
    }

    // templates

    fn process_template_declaration(
        &mut self,
        decl: &ast::TemplateDecl,
        scope: &Scope,
    ) -> CResult<()> {
        let parameters = self.process_template_parameters(&decl.parameters, scope)?;
        let enclosing = scope
            .enclosing_symbol()
            .unwrap_or(Symbol::Namespace(self.symbols().root()));

        match decl.declaration.as_ref() {
            ast::Declaration::Class(class_decl) => match &class_decl.name {
                ast::Identifier::Simple { name, .. } => {
                    let template = Template::source_class(
                        name.clone(),
                        parameters,
                        enclosing,
                        Rc::new(class_decl.clone()),
                    );
                    self.symbols_mut().add_template(template);
                    log::trace!("declared class template '{name}'");
                    Ok(())
                }
                ast::Identifier::Template {
                    name, arguments, ..
                } => {
                    let primary = self.find_template(name, scope, decl.span)?;
                    if parameters.is_empty() {
                        // full specialization: an eagerly-built instance
                        let args = self.resolve_template_args(arguments, scope)?;
                        let args =
                            self.complete_template_arguments(primary, args, decl.span)?;
                        let class =
                            self.build_full_specialization(primary, class_decl, scope)?;
                        self.symbols_mut()
                            .template_mut(primary)
                            .set_instance(args, TemplateInstance::Class(class));
                    } else {
                        self.symbols_mut()
                            .template_mut(primary)
                            .specializations
                            .push(PartialSpecialization {
                                parameters,
                                arguments: arguments.clone(),
                                decl: Rc::new(class_decl.clone()),
                            });
                    }
                    Ok(())
                }
                other => Err(CompilationFailure::at(
                    CompileError::NotImplemented("template declaration name".into()),
                    other.span(),
                )),
            },
            ast::Declaration::Function(fn_decl) => {
                let name = fn_decl.name.plain_name().unwrap_or_default().to_string();
                let template = Template::source_function(
                    name.clone(),
                    parameters,
                    enclosing,
                    Rc::new(fn_decl.clone()),
                );
                self.symbols_mut().add_template(template);
                log::trace!("declared function template '{name}'");
                Ok(())
            }
            other => Err(CompilationFailure::at(
                CompileError::NotImplemented("templated declaration of this kind".into()),
                other.span(),
            )),
        }
    }

    fn process_template_parameters(
        &mut self,
        decls: &[ast::TemplateParameterDecl],
        scope: &Scope,
    ) -> CResult<Vec<TemplateParameter>> {
        let mut parameters = vec![];
        for p in decls {
            let kind = match &p.kind {
                ast::TemplateParameterDeclKind::Typename => TemplateParameterKind::Type,
                ast::TemplateParameterDeclKind::NonType(qt) => {
                    let t = self.resolve_type(qt, scope)?;
                    if t != Type::INT && t != Type::BOOLEAN {
                        return Err(CompilationFailure::at(
                            CompileError::InvalidTemplateArgument,
                            p.span,
                        ));
                    }
                    TemplateParameterKind::NonType(t)
                }
            };
            parameters.push(TemplateParameter {
                name: p.name.clone(),
                kind,
                is_pack: p.is_pack,
                default_value: p.default_value.clone().map(Rc::new),
            });
        }
        Ok(parameters)
    }

    fn find_template(
        &self,
        name: &str,
        scope: &Scope,
        span: Span,
    ) -> CResult<crate::symbols::TemplateId> {
        match name_lookup::resolve_name(name, scope, self.symbols()) {
            NameLookup::Template(tid) => Ok(tid),
            _ => Err(CompilationFailure::at(
                CompileError::InvalidTypeName(name.to_string()),
                span,
            )),
        }
    }

    fn build_full_specialization(
        &mut self,
        primary: crate::symbols::TemplateId,
        decl: &ast::ClassDecl,
        scope: &Scope,
    ) -> CResult<ClassId> {
        let enclosing = self.symbols().template(primary).enclosing;
        let template_name = self.symbols().template(primary).name.clone();

        let mut class = Class::new(template_name, enclosing);
        class.instance_of = Some(primary);
        class.is_final = decl.is_final;
        let class_id = self.symbols_mut().add_class(class);

        let class_scope = scope.child(ScopeFrame::Class(class_id));
        self.process_class_members(class_id, &decl.members, &class_scope)?;
        self.generate_special_members(class_id, decl.span)?;
        Ok(class_id)
    }

    // generated member functions

    /// Emits the defaulted destructor, default/copy/move constructors and
    /// assignment operator a class is missing, when the members and base
    /// allow it; otherwise the operation is simply absent.
    pub(crate) fn generate_special_members(
        &mut self,
        class: ClassId,
        span: Span,
    ) -> CResult<()> {
        let _ = span;
        let class_type = Type::object(class);
        let this = Type::reference(class_type).with_flag(TypeFlag::ThisParameter);

        // destructor
        if self.symbols().class(class).destructor.is_none() {
            let destructible = self.members_satisfy(class, |s, t| match t.class_id() {
                Some(c) => s.is_destructible(c),
                None => true,
            }) && self.base_satisfies(class, |s, b| s.is_destructible(b));

            if destructible {
                let body = self.synthesize_destructor_body(class);
                let mut f = Function::new(
                    FunctionName::Destructor,
                    Prototype::new(Type::VOID, vec![this]),
                );
                f.owner = Some(Symbol::Class(class));
                f.flags.set_defaulted();
                f.body = FunctionBody::Program(Rc::new(body));
                let id = self.symbols_mut().add_function(f);
                self.symbols_mut().class_mut(class).destructor = Some(id);
            } else {
                log::trace!("class #{:?} gets no generated destructor", class.0);
            }
        }

        // default constructor, only when no constructor was declared
        if self.symbols().class(class).constructors.is_empty() {
            let possible = self.members_satisfy(class, |s, t| {
                if t.is_any_reference() || t.is_enum_type() || t.is_function_type() {
                    return false;
                }
                match t.class_id() {
                    Some(c) => s.is_default_constructible(c),
                    None => true,
                }
            }) && self.base_satisfies(class, |s, b| s.is_default_constructible(b));

            if possible {
                let body = self.synthesize_default_ctor_body(class);
                let mut f = Function::new(
                    FunctionName::Constructor,
                    Prototype::new(Type::VOID, vec![this]),
                );
                f.owner = Some(Symbol::Class(class));
                f.flags.set_defaulted();
                f.body = FunctionBody::Program(Rc::new(body));
                let id = self.symbols_mut().add_function(f);
                self.symbols_mut().class_mut(class).constructors.push(id);
            } else {
                log::trace!("class #{:?} gets no generated default constructor", class.0);
            }
        }

        // copy and move constructors
        if self.symbols_copy_ctor(class).is_none() {
            let copyable = self.members_satisfy(class, |s, t| match t.class_id() {
                Some(c) => s.is_copy_constructible(c),
                None => true,
            }) && self.base_satisfies(class, |s, b| s.is_copy_constructible(b));

            if copyable {
                for param in [
                    Type::const_reference(class_type),
                    Type::forward_reference(class_type),
                ] {
                    let body = self.synthesize_copy_ctor_body(class);
                    let mut f = Function::new(
                        FunctionName::Constructor,
                        Prototype::new(Type::VOID, vec![this, param]),
                    );
                    f.owner = Some(Symbol::Class(class));
                    f.flags.set_defaulted();
                    f.body = FunctionBody::Program(Rc::new(body));
                    let id = self.symbols_mut().add_function(f);
                    self.symbols_mut().class_mut(class).constructors.push(id);
                }
            } else {
                log::trace!("class #{:?} gets no generated copy constructor", class.0);
            }
        }

        // assignment operator
        let has_assignment = self
            .symbols()
            .class(class)
            .operators
            .iter()
            .any(|&f| self.symbols().function(f).operator_kind() == Some(OperatorKind::Assignment));
        if !has_assignment {
            let assignable = self.members_satisfy(class, |s, t| {
                if t.is_any_reference() {
                    return false;
                }
                match t.class_id() {
                    Some(c) => s.class(c).operators.iter().any(|&f| {
                        s.function(f).operator_kind() == Some(OperatorKind::Assignment)
                    }),
                    None => true,
                }
            });

            if assignable {
                let body = self.synthesize_assignment_body(class);
                let mut f = Function::new(
                    FunctionName::Operator(OperatorKind::Assignment),
                    Prototype::new(
                        Type::reference(class_type),
                        vec![this, Type::const_reference(class_type)],
                    ),
                );
                f.owner = Some(Symbol::Class(class));
                f.flags.set_defaulted();
                f.body = FunctionBody::Program(Rc::new(body));
                let id = self.symbols_mut().add_function(f);
                self.symbols_mut().class_mut(class).operators.push(id);
            } else {
                log::trace!("class #{:?} gets no generated assignment", class.0);
            }
        }

        Ok(())
    }

    fn symbols_copy_ctor(&self, class: ClassId) -> Option<FunctionId> {
        self.symbols().copy_constructor(class)
    }

    fn members_satisfy(
        &self,
        class: ClassId,
        pred: impl Fn(&crate::symbols::SymbolTable, Type) -> bool,
    ) -> bool {
        self.symbols()
            .class(class)
            .data_members
            .iter()
            .all(|m| pred(self.symbols(), m.ty))
    }

    fn base_satisfies(
        &self,
        class: ClassId,
        pred: impl Fn(&crate::symbols::SymbolTable, ClassId) -> bool,
    ) -> bool {
        match self.symbols().class(class).base {
            Some(base) => pred(self.symbols(), base),
            None => true,
        }
    }

    fn field_base(&self, class: ClassId) -> usize {
        match self.symbols().class(class).base {
            Some(base) => self.symbols().field_count(base),
            None => 0,
        }
    }

    pub(crate) fn synthesize_default_ctor_body(&mut self, class: ClassId) -> program::Statement {
        let mut statements = vec![];

        if let Some(base) = self.symbols().class(class).base {
            if let Some(base_ctor) = self.symbols().default_constructor(base) {
                statements.push(program::Statement::Expression(
                    program::Expression::FunctionCall {
                        function: base_ctor,
                        ty: Type::VOID,
                        arguments: vec![this_value(class)],
                    },
                ));
            }
        }

        let base_index = self.field_base(class);
        let members = self.symbols().class(class).data_members.clone();
        for (i, member) in members.iter().enumerate() {
            let value = self.default_value_for(member.ty);
            statements.push(program::Statement::PushDataMember {
                index: base_index + i,
                value,
            });
        }

        program::Statement::Compound(statements)
    }

    pub(crate) fn synthesize_copy_ctor_body(&mut self, class: ClassId) -> program::Statement {
        let mut statements = vec![];
        let other = program::Expression::StackValue {
            index: 1,
            ty: Type::const_reference(Type::object(class)),
        };

        if let Some(base) = self.symbols().class(class).base {
            if let Some(base_copy) = self.symbols().copy_constructor(base) {
                statements.push(program::Statement::Expression(
                    program::Expression::FunctionCall {
                        function: base_copy,
                        ty: Type::VOID,
                        arguments: vec![this_value(class), other.clone()],
                    },
                ));
            }
        }

        let base_index = self.field_base(class);
        let members = self.symbols().class(class).data_members.clone();
        for (i, member) in members.iter().enumerate() {
            let source = program::Expression::MemberAccess {
                object: Box::new(other.clone()),
                index: base_index + i,
                ty: member.ty,
            };
            let value = match member.ty.class_id() {
                Some(c) => match self.symbols().copy_constructor(c) {
                    Some(copy) => program::Expression::ConstructorCall {
                        constructor: copy,
                        ty: member.ty,
                        arguments: vec![source],
                    },
                    None => source,
                },
                None => program::Expression::Copy {
                    ty: member.ty,
                    source: Box::new(source),
                },
            };
            statements.push(program::Statement::PushDataMember {
                index: base_index + i,
                value,
            });
        }

        program::Statement::Compound(statements)
    }

    pub(crate) fn synthesize_destructor_body(&mut self, class: ClassId) -> program::Statement {
        let mut statements = vec![];

        let base_index = self.field_base(class);
        let members = self.symbols().class(class).data_members.clone();
        for (i, member) in members.iter().enumerate().rev() {
            let destructor = member
                .ty
                .class_id()
                .and_then(|c| self.symbols().class(c).destructor);
            statements.push(program::Statement::PopDataMember {
                index: base_index + i,
                destructor,
            });
        }

        if let Some(base) = self.symbols().class(class).base {
            if let Some(base_dtor) = self.symbols().class(base).destructor {
                statements.push(program::Statement::Expression(
                    program::Expression::FunctionCall {
                        function: base_dtor,
                        ty: Type::VOID,
                        arguments: vec![this_value(class)],
                    },
                ));
            }
        }

        program::Statement::Compound(statements)
    }

    pub(crate) fn synthesize_assignment_body(&mut self, class: ClassId) -> program::Statement {
        let mut statements = vec![];
        let other = program::Expression::StackValue {
            index: 1,
            ty: Type::const_reference(Type::object(class)),
        };

        if let Some(base) = self.symbols().class(class).base {
            let base_assign = self.symbols().class(base).operators.iter().copied().find(
                |&f| self.symbols().function(f).operator_kind() == Some(OperatorKind::Assignment),
            );
            if let Some(assign) = base_assign {
                statements.push(program::Statement::Expression(
                    program::Expression::FunctionCall {
                        function: assign,
                        ty: Type::reference(Type::object(base)),
                        arguments: vec![this_value(class), other.clone()],
                    },
                ));
            }
        }

        let base_index = self.field_base(class);
        let members = self.symbols().class(class).data_members.clone();
        for (i, member) in members.iter().enumerate() {
            let target = program::Expression::MemberAccess {
                object: Box::new(this_value(class)),
                index: base_index + i,
                ty: member.ty,
            };
            let source = program::Expression::MemberAccess {
                object: Box::new(other.clone()),
                index: base_index + i,
                ty: member.ty,
            };

            let assign = match member.ty.class_id() {
                Some(c) => self.symbols().class(c).operators.iter().copied().find(|&f| {
                    self.symbols().function(f).operator_kind() == Some(OperatorKind::Assignment)
                }),
                None => {
                    let scope = Scope::new(ScopeFrame::Namespace(self.symbols().root()));
                    name_lookup::resolve_operator(
                        OperatorKind::Assignment,
                        &[Type::reference(member.ty), member.ty],
                        &scope,
                        self.symbols(),
                    )
                    .into_iter()
                    .find(|&f| {
                        self.symbols().function(f).prototype.at(0).base_type()
                            == member.ty.base_type()
                    })
                }
            };

            if let Some(assign) = assign {
                let ret = self.symbols().function(assign).return_type();
                statements.push(program::Statement::Expression(
                    program::Expression::FunctionCall {
                        function: assign,
                        ty: ret,
                        arguments: vec![target, source],
                    },
                ));
            }
        }

        statements.push(program::Statement::Return {
            value: Some(this_value(class)),
            destruction: vec![],
        });

        program::Statement::Compound(statements)
    }

    pub(crate) fn default_value_for(&mut self, t: Type) -> program::Expression {
        if let Some(class) = t.class_id() {
            if let Some(ctor) = self.symbols().default_constructor(class) {
                return program::Expression::ConstructorCall {
                    constructor: ctor,
                    ty: t,
                    arguments: vec![],
                };
            }
        }
        program::Expression::Literal {
            value: zero_value(t),
            ty: t.base_type().without_const(),
        }
    }

    // modules

    /// Loads (and memoizes) a module, returning its namespace.
    fn load_module(&mut self, name: &str) -> Result<crate::symbols::NamespaceId, CompileError> {
        let module = self
            .engine
            .modules
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| CompileError::UnknownModule(name.to_string()))?;

        if self.engine.modules[module].loaded {
            return Ok(self.engine.modules[module].namespace);
        }

        let kind = self.engine.modules[module].kind.clone();
        match kind {
            crate::engine::ModuleKind::Native { load, .. } => {
                load(self.engine, module)
                    .map_err(|_| CompileError::ModuleImportFailure(name.to_string()))?;
            }
            crate::engine::ModuleKind::Source(source) => {
                let script = self.engine.new_script_id(source);
                if !self.compile_nested_script(script) {
                    return Err(CompileError::ModuleImportFailure(name.to_string()));
                }
                if let Some(ns) = self.engine.scripts[script].namespace {
                    self.engine.modules[module].namespace = ns;
                }
            }
        }

        self.engine.modules[module].loaded = true;
        Ok(self.engine.modules[module].namespace)
    }

    /// Compiles a module script in the middle of another compilation; the
    /// outer queues are parked so the nested pipeline only drains its own
    /// work.
    fn compile_nested_script(&mut self, script: usize) -> bool {
        let saved_members = std::mem::take(&mut self.member_queue);
        let saved_functions = std::mem::take(&mut self.incomplete_functions);
        let saved_tasks = std::mem::take(&mut self.function_tasks);
        let saved_variables = std::mem::take(&mut self.variable_tasks);
        let saved_generation = std::mem::take(&mut self.pending_generation);

        let result = self.compile_script_inner(script);

        self.member_queue.extend(saved_members);
        self.incomplete_functions.extend(saved_functions);
        self.function_tasks.extend(saved_tasks);
        self.variable_tasks.extend(saved_variables);
        self.pending_generation.extend(saved_generation);

        match result {
            Ok(()) => {
                self.engine.scripts[script].compiled = true;
                true
            }
            Err(failure) => {
                self.session.log_failure(&failure);
                false
            }
        }
    }

    // variable initializers

    pub(crate) fn initialize_variable(&mut self, task: VariableInitTask) -> CResult<()> {
        match task {
            VariableInitTask::Global {
                script,
                index,
                decl,
                scope,
            } => {
                let declared = self.engine.scripts[script]
                    .globals
                    .get(index)
                    .map(|(_, t)| *t);
                let declared = match declared {
                    Some(t) => t,
                    None => scope
                        .script_frame()
                        .and_then(|(_, _, globals)| {
                            globals.borrow().get(index).map(|(_, t)| *t)
                        })
                        .unwrap_or(Type::AUTO),
                };

                let (ty, init) = self.compile_variable_initializer(declared, &decl, &scope)?;

                if let Some((_, _, globals)) = scope.script_frame() {
                    if let Some(slot) = globals.borrow_mut().get_mut(index) {
                        slot.1 = ty;
                    }
                }
                if let Some(slot) = self.engine.scripts[script].globals.get_mut(index) {
                    slot.1 = ty;
                }
                self.engine.scripts[script]
                    .global_initializers
                    .push((index, Rc::new(init)));
                Ok(())
            }
            VariableInitTask::Static {
                class,
                name,
                decl,
                scope,
            } => {
                let declared = self
                    .symbols()
                    .class(class)
                    .static_members
                    .get(&name)
                    .map(|m| m.ty)
                    .unwrap_or(Type::AUTO);

                let (ty, init) = self.compile_variable_initializer(declared, &decl, &scope)?;

                if let Some(member) =
                    self.symbols_mut().class_mut(class).static_members.get_mut(&name)
                {
                    member.ty = ty;
                    member.initializer = Some(Rc::new(init));
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn zero_value(t: Type) -> Value {
    let t = t.base_type().without_const();
    if t == Type::BOOLEAN {
        Value::Bool(false)
    } else if t == Type::CHAR {
        Value::Char('\0')
    } else if t == Type::INT {
        Value::Int(0)
    } else if t == Type::FLOAT {
        Value::Float(0.0)
    } else if t == Type::DOUBLE {
        Value::Double(0.0)
    } else if t == Type::STRING {
        Value::String(String::new())
    } else {
        Value::Void
    }
}

fn this_value(class: ClassId) -> program::Expression {
    program::Expression::StackValue {
        index: 0,
        ty: Type::reference(Type::object(class)),
    }
}

fn is_retryable(failure: &CompilationFailure) -> bool {
    matches!(failure.kind, CompileError::InvalidTypeName(_))
}
