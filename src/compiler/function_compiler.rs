//! Function-body compilation: statements, local variables and scope
//! management.
//!
//! A block establishes a nested scope over the function's local stack;
//! leaving it emits destructor calls in reverse declaration order. Jump
//! statements (`return`, `break`, `continue`) carry the destruction of
//! every scope they exit.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast;
use crate::lexer::Span;
use crate::program;
use crate::scope::{FunctionFrame, Local, Scope, ScopeFrame};
use crate::symbols::{FunctionBody, FunctionId, FunctionName, Symbol};
use crate::types::{ClassId, Prototype, Type};

use super::errors::{CResult, CompilationFailure, CompileError};
use super::initialization::{Initialization, InitializationKind};
use super::{CompileFunctionTask, Compiler};

#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub locals_start: usize,
    pub is_loop: bool,
}

/// State of the function body being compiled.
pub struct FunctionContext {
    pub scope: Scope,
    pub frame: Rc<RefCell<FunctionFrame>>,
    pub function: Option<FunctionId>,
    pub this_class: Option<ClassId>,
    pub return_type: Type,
    pub deduce_return: bool,
    pub deduced_returns: Vec<Type>,
    pub stack_size: usize,
    pub(crate) blocks: Vec<Block>,
    /// Command-style compilation against a host context.
    pub command_mode: bool,
}

impl FunctionContext {
    pub(crate) fn new(declaration_scope: Scope) -> Self {
        let frame = Rc::new(RefCell::new(FunctionFrame::default()));
        let scope = declaration_scope.child(ScopeFrame::Function(frame.clone()));
        Self {
            scope,
            frame,
            function: None,
            this_class: None,
            return_type: Type::VOID,
            deduce_return: false,
            deduced_returns: vec![],
            stack_size: 0,
            blocks: vec![],
            command_mode: false,
        }
    }

    pub(crate) fn add_local(&mut self, name: impl Into<String>, ty: Type) -> usize {
        let index = self.stack_size;
        self.stack_size += 1;
        self.frame.borrow_mut().locals.push(Local {
            name: name.into(),
            ty,
            index,
        });
        index
    }

    fn locals_since(&self, start: usize) -> Vec<Local> {
        self.frame.borrow().locals[start..].to_vec()
    }
}

impl Compiler<'_> {
    pub(crate) fn compile_function_task(&mut self, task: CompileFunctionTask) -> CResult<()> {
        let function = task.function;
        let decl = task.decl.clone();

        let prototype = self.symbols().function(function).prototype.clone();
        let member_of = self.symbols().function(function).member_of();
        let name = self.symbols().function(function).name.clone();
        let is_instance = self.symbols().function(function).implicit_param_count() == 1;

        log::trace!("compiling body of '{name}'");

        let mut ctx = FunctionContext::new(task.scope.clone());
        ctx.function = Some(function);
        ctx.this_class = member_of;
        ctx.return_type = prototype.return_type;

        if is_instance {
            ctx.add_local("this", prototype.at(0));
        }
        for (i, p) in decl.params.iter().enumerate() {
            ctx.add_local(p.name.clone(), prototype.at(i + usize::from(is_instance)));
        }

        self.compile_default_arguments(&mut ctx, function, &decl)?;

        if decl.specifiers.is_defaulted {
            let body = self.synthesize_defaulted_body(function, member_of, decl.span)?;
            self.symbols_mut().function_mut(function).body =
                FunctionBody::Program(Rc::new(body));
            return Ok(());
        }

        let Some(body_ast) = &decl.body else {
            return Ok(());
        };

        ctx.blocks.push(Block {
            locals_start: self.frame_len(&ctx),
            is_loop: false,
        });

        let mut statements = vec![];

        if name == FunctionName::Constructor {
            let class = member_of.expect("constructor without a class");
            statements.extend(self.compile_constructor_prelude(&mut ctx, class, &decl)?);
        }

        for stmt in &body_ast.statements {
            statements.push(self.compile_statement(&mut ctx, stmt)?);
        }

        if name == FunctionName::Destructor {
            let class = member_of.expect("destructor without a class");
            if let program::Statement::Compound(epilogue) =
                self.synthesize_destructor_epilogue(class)
            {
                statements.extend(epilogue);
            }
        }

        ctx.blocks.pop();

        self.symbols_mut().function_mut(function).body =
            FunctionBody::Program(Rc::new(program::Statement::Compound(statements)));
        Ok(())
    }

    fn frame_len(&self, ctx: &FunctionContext) -> usize {
        ctx.frame.borrow().locals.len()
    }

    /// Trailing default-argument expressions are compiled with access to
    /// the preceding parameters, then stored on the function.
    fn compile_default_arguments(
        &mut self,
        ctx: &mut FunctionContext,
        function: FunctionId,
        decl: &ast::FunctionDecl,
    ) -> CResult<()> {
        let implicit = self.symbols().function(function).implicit_param_count();
        let prototype = self.symbols().function(function).prototype.clone();

        let mut defaults = vec![];
        for (i, p) in decl.params.iter().enumerate() {
            let Some(default) = &p.default_value else {
                continue;
            };
            let target = prototype.at(i + implicit);
            let expr = self.compile_expression(ctx, default)?;
            let init = Initialization::compute(target, &expr, self.symbols());
            if !init.is_valid() {
                return Err(self.conversion_failure(expr.ty(), target, p.span));
            }
            defaults.push(Rc::new(self.apply_initialization(&init, expr, p.span)?));
        }

        self.symbols_mut().function_mut(function).default_arguments = defaults;
        Ok(())
    }

    fn synthesize_defaulted_body(
        &mut self,
        function: FunctionId,
        member_of: Option<ClassId>,
        span: Span,
    ) -> CResult<program::Statement> {
        let Some(class) = member_of else {
            return Err(CompilationFailure::at(
                CompileError::FunctionCannotBeDefaulted,
                span,
            ));
        };

        let f = self.symbols().function(function);
        let name = f.name.clone();
        let param_count = f.prototype.count();

        match name {
            FunctionName::Destructor => Ok(self.synthesize_destructor_epilogue(class)),
            FunctionName::Constructor if param_count == 1 => {
                Ok(self.synthesize_default_ctor_body(class))
            }
            FunctionName::Constructor if param_count == 2 => Ok(self.synthesize_copy_ctor_body(class)),
            FunctionName::Operator(crate::operators::OperatorKind::Assignment) => {
                Ok(self.synthesize_assignment_body(class))
            }
            _ => Err(CompilationFailure::at(
                CompileError::FunctionCannotBeDefaulted,
                span,
            )),
        }
    }

    /// Member-initializer list plus default member initialization, in
    /// data-member declaration order.
    fn compile_constructor_prelude(
        &mut self,
        ctx: &mut FunctionContext,
        class: ClassId,
        decl: &ast::FunctionDecl,
    ) -> CResult<Vec<program::Statement>> {
        let mut statements = vec![];

        let base = self.symbols().class(class).base;
        let base_name = base.map(|b| self.symbols().class(b).name.clone());

        let mut used: Vec<&str> = vec![];
        for init in &decl.member_initializers {
            if used.contains(&init.name.as_str()) {
                return Err(CompilationFailure::at(
                    CompileError::DataMemberAlreadyHasInitializer(init.name.clone()),
                    init.span,
                ));
            }
            used.push(&init.name);
        }

        // base constructor call
        if let Some(base) = base {
            let base_init = decl
                .member_initializers
                .iter()
                .find(|m| Some(&m.name) == base_name.as_ref());

            let args = match base_init {
                Some(init) => {
                    let exprs = match &init.init {
                        ast::VariableInit::Constructor(args)
                        | ast::VariableInit::Brace(args) => args,
                        ast::VariableInit::Assignment(_) => {
                            return Err(CompilationFailure::at(
                                CompileError::NotDataMember(init.name.clone()),
                                init.span,
                            ))
                        }
                    };
                    let mut compiled = vec![];
                    for e in exprs {
                        compiled.push(self.compile_expression(ctx, e)?);
                    }
                    compiled
                }
                None => vec![],
            };

            let this = program::Expression::StackValue {
                index: 0,
                ty: Type::reference(Type::object(class)),
            };
            let call =
                self.compile_constructor_call(base, args, decl.span, Some(this))?;
            statements.push(program::Statement::Expression(call));
        }

        // own data members
        let base_index = base.map(|b| self.symbols().field_count(b)).unwrap_or(0);
        let members = self.symbols().class(class).data_members.clone();

        for init in &decl.member_initializers {
            if Some(&init.name) == base_name.as_ref() {
                continue;
            }
            if !members.iter().any(|m| m.name == init.name) {
                let failure = if self.symbols().find_data_member(class, &init.name).is_some() {
                    CompileError::InheritedDataMember(init.name.clone())
                } else {
                    CompileError::NotDataMember(init.name.clone())
                };
                return Err(CompilationFailure::at(failure, init.span));
            }
        }

        for (i, member) in members.iter().enumerate() {
            let entry = decl
                .member_initializers
                .iter()
                .find(|m| m.name == member.name);

            let value = match entry {
                Some(init) => {
                    let exprs = match &init.init {
                        ast::VariableInit::Constructor(args)
                        | ast::VariableInit::Brace(args) => args,
                        ast::VariableInit::Assignment(_) => {
                            return Err(CompilationFailure::at(
                                CompileError::NotDataMember(init.name.clone()),
                                init.span,
                            ))
                        }
                    };
                    let mut compiled = vec![];
                    for e in exprs {
                        compiled.push(self.compile_expression(ctx, e)?);
                    }
                    self.initialize_from_arguments(member.ty, compiled, init.span)?
                }
                None => self.default_member_value(member.ty, &member.name, decl.span)?,
            };

            statements.push(program::Statement::PushDataMember {
                index: base_index + i,
                value,
            });
        }

        Ok(statements)
    }

    fn default_member_value(
        &mut self,
        ty: Type,
        name: &str,
        span: Span,
    ) -> CResult<program::Expression> {
        if ty.is_any_reference() {
            return Err(CompilationFailure::at(
                CompileError::ReferencesMustBeInitialized,
                span,
            ));
        }
        if ty.is_enum_type() {
            return Err(CompilationFailure::at(
                CompileError::EnumMemberCannotBeDefaultConstructed(name.to_string()),
                span,
            ));
        }
        if let Some(c) = ty.class_id() {
            if !self.symbols().is_default_constructible(c) {
                return Err(CompilationFailure::at(
                    CompileError::DataMemberHasNoDefaultConstructor(name.to_string()),
                    span,
                ));
            }
        }
        Ok(self.default_value_for(ty))
    }

    fn synthesize_destructor_epilogue(&mut self, class: ClassId) -> program::Statement {
        // same shape as the generated destructor
        let stmt = {
            let mut statements = vec![];
            let base_index = match self.symbols().class(class).base {
                Some(b) => self.symbols().field_count(b),
                None => 0,
            };
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
                            arguments: vec![program::Expression::StackValue {
                                index: 0,
                                ty: Type::reference(Type::object(class)),
                            }],
                        },
                    ));
                }
            }
            program::Statement::Compound(statements)
        };
        stmt
    }

    // statements

    pub(crate) fn compile_statement(
        &mut self,
        ctx: &mut FunctionContext,
        stmt: &ast::Statement,
    ) -> CResult<program::Statement> {
        match stmt {
            ast::Statement::Null { .. } => Ok(program::Statement::Compound(vec![])),
            ast::Statement::Expression(expr) => {
                let e = self.compile_expression(ctx, expr)?;
                Ok(program::Statement::Expression(e))
            }
            ast::Statement::Compound(block) => {
                self.compile_block(ctx, &block.statements, false)
            }
            ast::Statement::If {
                condition,
                body,
                else_clause,
                ..
            } => {
                let condition = self.compile_condition(ctx, condition)?;
                let body = Box::new(self.compile_statement(ctx, body)?);
                let else_clause = match else_clause {
                    Some(stmt) => Some(Box::new(self.compile_statement(ctx, stmt)?)),
                    None => None,
                };
                Ok(program::Statement::If {
                    condition,
                    body,
                    else_clause,
                })
            }
            ast::Statement::While {
                condition, body, ..
            } => {
                let condition = self.compile_condition(ctx, condition)?;
                let body = self.compile_loop_body(ctx, body)?;
                Ok(program::Statement::While {
                    condition,
                    body: Box::new(body),
                })
            }
            ast::Statement::For {
                init,
                condition,
                loop_increment,
                body,
                ..
            } => {
                // the init variable's scope covers only the loop
                let start = self.frame_len(ctx);
                ctx.blocks.push(Block {
                    locals_start: start,
                    is_loop: false,
                });

                let init = match init {
                    Some(stmt) => Some(Box::new(self.compile_statement(ctx, stmt)?)),
                    None => None,
                };
                let condition = match condition {
                    Some(expr) => Some(self.compile_condition(ctx, expr)?),
                    None => None,
                };
                let loop_increment = match loop_increment {
                    Some(expr) => Some(self.compile_expression(ctx, expr)?),
                    None => None,
                };
                let body = self.compile_loop_body(ctx, body)?;

                let destruction = self.destruction_since(ctx, start);
                ctx.blocks.pop();
                ctx.frame.borrow_mut().locals.truncate(start);

                let mut statements = vec![program::Statement::For {
                    init,
                    condition,
                    loop_increment,
                    body: Box::new(body),
                }];
                statements.extend(destruction);
                Ok(program::Statement::Compound(statements))
            }
            ast::Statement::Return { value, span } => self.compile_return(ctx, value, *span),
            ast::Statement::Break { span } => {
                let destruction = self.jump_destruction(ctx, true).ok_or_else(|| {
                    CompilationFailure::at(CompileError::BreakOutsideLoop, *span)
                })?;
                Ok(program::Statement::Break { destruction })
            }
            ast::Statement::Continue { span } => {
                let destruction = self.jump_destruction(ctx, true).ok_or_else(|| {
                    CompilationFailure::at(CompileError::ContinueOutsideLoop, *span)
                })?;
                Ok(program::Statement::Continue { destruction })
            }
            ast::Statement::Declaration(decl) => match decl.as_ref() {
                ast::Declaration::Variable(v) => self.compile_local_variable(ctx, v),
                ast::Declaration::TypeAlias { name, target, span }
                | ast::Declaration::Typedef {
                    ty: target,
                    name,
                    span,
                } => {
                    let ty = self.resolve_type(target, &ctx.scope)?;
                    let _ = span;
                    ctx.scope
                        .inject(crate::scope::Injection::TypeAlias(name.clone(), ty));
                    Ok(program::Statement::Compound(vec![]))
                }
                ast::Declaration::UsingDirective { .. }
                | ast::Declaration::UsingDeclaration { .. }
                | ast::Declaration::NamespaceAlias { .. } => {
                    self.process_or_collect(decl, &ctx.scope, ast::AccessSpecifier::Public)?;
                    Ok(program::Statement::Compound(vec![]))
                }
                other => Err(CompilationFailure::at(
                    CompileError::NotImplemented(
                        "this declaration is not allowed inside a function".into(),
                    ),
                    other.span(),
                )),
            },
        }
    }

    fn compile_block(
        &mut self,
        ctx: &mut FunctionContext,
        statements: &[ast::Statement],
        is_loop: bool,
    ) -> CResult<program::Statement> {
        let start = self.frame_len(ctx);
        ctx.blocks.push(Block {
            locals_start: start,
            is_loop,
        });

        let mut out = vec![];
        for stmt in statements {
            out.push(self.compile_statement(ctx, stmt)?);
        }

        out.extend(self.destruction_since(ctx, start));
        ctx.blocks.pop();
        ctx.frame.borrow_mut().locals.truncate(start);

        Ok(program::Statement::Compound(out))
    }

    fn compile_loop_body(
        &mut self,
        ctx: &mut FunctionContext,
        body: &ast::Statement,
    ) -> CResult<program::Statement> {
        match body {
            ast::Statement::Compound(block) => {
                self.compile_block(ctx, &block.statements, true)
            }
            other => {
                let single = std::slice::from_ref(other);
                self.compile_block(ctx, single, true)
            }
        }
    }

    fn compile_condition(
        &mut self,
        ctx: &mut FunctionContext,
        expr: &ast::Expression,
    ) -> CResult<program::Expression> {
        let span = expr.span();
        let compiled = self.compile_expression(ctx, expr)?;
        let init = Initialization::compute_from_type(
            Type::BOOLEAN,
            compiled.ty(),
            self.symbols(),
            InitializationKind::Copy,
        );
        if !init.is_valid() {
            return Err(self.conversion_failure(compiled.ty(), Type::BOOLEAN, span));
        }
        self.apply_initialization(&init, compiled, span)
    }

    fn compile_return(
        &mut self,
        ctx: &mut FunctionContext,
        value: &Option<ast::Expression>,
        span: Span,
    ) -> CResult<program::Statement> {
        let destruction = self.function_destruction(ctx);

        match value {
            None => {
                if !ctx.return_type.is_void() && !ctx.deduce_return {
                    return Err(CompilationFailure::at(
                        CompileError::ReturnStatementWithoutValue,
                        span,
                    ));
                }
                if ctx.deduce_return {
                    ctx.deduced_returns.push(Type::VOID);
                }
                Ok(program::Statement::Return {
                    value: None,
                    destruction,
                })
            }
            Some(expr) => {
                let compiled = self.compile_expression(ctx, expr)?;

                if ctx.deduce_return {
                    ctx.deduced_returns.push(compiled.ty().base_type());
                    return Ok(program::Statement::Return {
                        value: Some(compiled),
                        destruction,
                    });
                }

                if ctx.return_type.is_void() {
                    return Err(CompilationFailure::at(
                        CompileError::ReturnStatementWithValue,
                        span,
                    ));
                }

                let init = Initialization::compute(ctx.return_type, &compiled, self.symbols());
                if !init.is_valid() {
                    return Err(self.conversion_failure(compiled.ty(), ctx.return_type, span));
                }
                let converted = self.apply_initialization(&init, compiled, span)?;
                Ok(program::Statement::Return {
                    value: Some(converted),
                    destruction,
                })
            }
        }
    }

    fn compile_local_variable(
        &mut self,
        ctx: &mut FunctionContext,
        v: &ast::VariableDecl,
    ) -> CResult<program::Statement> {
        let declared = if v.ty.is_auto() {
            Type::AUTO
        } else {
            self.resolve_type(&v.ty, &ctx.scope)?
        };

        let (ty, init) = self.compile_initializer(ctx, declared, &v.initializer, v.span)?;

        // the local becomes visible only after its initializer
        let index = ctx.add_local(v.name.clone(), ty);

        Ok(program::Statement::PushValue {
            ty,
            stack_index: index,
            init: Some(init),
        })
    }

    /// Shared by locals, globals and static members.
    pub(crate) fn compile_initializer(
        &mut self,
        ctx: &mut FunctionContext,
        declared: Type,
        init: &Option<ast::VariableInit>,
        span: Span,
    ) -> CResult<(Type, program::Expression)> {
        match init {
            None => {
                if declared.is_auto() {
                    return Err(CompilationFailure::at(
                        CompileError::AutoMustBeUsedWithAssignment,
                        span,
                    ));
                }
                if declared.is_any_reference() {
                    return Err(CompilationFailure::at(
                        CompileError::ReferencesMustBeInitialized,
                        span,
                    ));
                }
                if declared.is_enum_type() {
                    return Err(CompilationFailure::at(
                        CompileError::EnumerationsMustBeInitialized,
                        span,
                    ));
                }
                if declared.is_function_type() {
                    return Err(CompilationFailure::at(
                        CompileError::FunctionVariablesMustBeInitialized,
                        span,
                    ));
                }
                if let Some(class) = declared.class_id() {
                    if !self.symbols().is_default_constructible(class) {
                        let name = self.symbols().type_name(declared);
                        return Err(CompilationFailure::at(
                            CompileError::VariableCannotBeDefaultConstructed(name),
                            span,
                        ));
                    }
                }
                Ok((declared, self.default_value_for(declared)))
            }
            Some(ast::VariableInit::Assignment(expr)) => {
                let compiled = self.compile_expression(ctx, expr)?;
                let was_list = compiled.is_initializer_list();

                let ty = if declared.is_auto() {
                    self.deduce_auto(&compiled, span)?
                } else {
                    declared
                };

                let init = Initialization::compute(ty, &compiled, self.symbols());
                if !init.is_valid() {
                    return Err(self.conversion_failure(compiled.ty(), ty, span));
                }
                if was_list && init.is_narrowing() {
                    return Err(self.narrowing_failure(compiled.ty(), ty, span));
                }
                let converted = self.apply_initialization(&init, compiled, span)?;
                Ok((ty, converted))
            }
            Some(ast::VariableInit::Constructor(args)) => {
                let mut compiled = vec![];
                for a in args {
                    compiled.push(self.compile_expression(ctx, a)?);
                }

                let ty = if declared.is_auto() {
                    match compiled.first() {
                        Some(e) => self.deduce_auto(e, span)?,
                        None => {
                            return Err(CompilationFailure::at(
                                CompileError::AutoMustBeUsedWithAssignment,
                                span,
                            ))
                        }
                    }
                } else {
                    declared
                };

                let value = self.initialize_from_arguments(ty, compiled, span)?;
                Ok((ty, value))
            }
            Some(ast::VariableInit::Brace(args)) => {
                let mut elements = vec![];
                for a in args {
                    elements.push(self.compile_expression(ctx, a)?);
                }
                let list = program::Expression::InitializerList {
                    initializer_list_type: Type::INITIALIZER_LIST,
                    elements,
                };

                let ty = if declared.is_auto() {
                    return Err(CompilationFailure::at(
                        CompileError::AutoMustBeUsedWithAssignment,
                        span,
                    ));
                } else {
                    declared
                };

                let init = Initialization::compute(ty, &list, self.symbols());
                if !init.is_valid() {
                    return Err(CompilationFailure::at(
                        CompileError::UnknownTypeInBraceInitialization(
                            self.symbols().type_name(ty),
                        ),
                        span,
                    ));
                }
                if init.is_narrowing() {
                    return Err(self.narrowing_failure(Type::INITIALIZER_LIST, ty, span));
                }
                let converted = self.apply_initialization(&init, list, span)?;
                Ok((ty, converted))
            }
        }
    }

    fn deduce_auto(&self, expr: &program::Expression, span: Span) -> CResult<Type> {
        let t = expr.ty();
        if t.is_initializer_list_marker() || !t.is_valid() {
            return Err(CompilationFailure::at(
                CompileError::AutoMustBeUsedWithAssignment,
                span,
            ));
        }
        Ok(t.base_type().without_const())
    }

    // destruction bookkeeping

    fn destruction_since(&self, ctx: &FunctionContext, start: usize) -> Vec<program::Statement> {
        let mut out = vec![];
        for local in ctx.locals_since(start).iter().rev() {
            let destructor = local
                .ty
                .class_id()
                .and_then(|c| self.symbols().class(c).destructor);
            out.push(program::Statement::PopValue {
                stack_index: local.index,
                destructor,
            });
        }
        out
    }

    /// Destruction for a `return`: every scope of the function.
    fn function_destruction(&self, ctx: &FunctionContext) -> Vec<program::Statement> {
        match ctx.blocks.first() {
            Some(outer) => self.destruction_since(ctx, outer.locals_start),
            None => vec![],
        }
    }

    /// Destruction for `break`/`continue`: scopes up to the innermost
    /// loop. `None` when not inside a loop.
    fn jump_destruction(
        &self,
        ctx: &FunctionContext,
        _continue_ok: bool,
    ) -> Option<Vec<program::Statement>> {
        let loop_block = ctx.blocks.iter().rev().find(|b| b.is_loop)?;
        Some(self.destruction_since(ctx, loop_block.locals_start))
    }

    pub(crate) fn conversion_failure(
        &self,
        from: Type,
        to: Type,
        span: Span,
    ) -> CompilationFailure {
        CompilationFailure::at(
            CompileError::CouldNotConvert {
                from: self.symbols().type_name(from),
                to: self.symbols().type_name(to),
            },
            span,
        )
    }

    pub(crate) fn narrowing_failure(
        &self,
        from: Type,
        to: Type,
        span: Span,
    ) -> CompilationFailure {
        CompilationFailure::at(
            CompileError::NarrowingConversion {
                from: self.symbols().type_name(from),
                to: self.symbols().type_name(to),
            },
            span,
        )
    }

    // entry points used by the script compiler

    /// Compiles the top-level statements of a script into its root
    /// function.
    pub(crate) fn compile_root_function(
        &mut self,
        script: usize,
        statements: &[ast::Statement],
        scope: &Scope,
    ) -> CResult<()> {
        let mut ctx = FunctionContext::new(scope.clone());
        ctx.blocks.push(Block {
            locals_start: 0,
            is_loop: false,
        });

        let mut out = vec![];
        for stmt in statements {
            out.push(self.compile_statement(&mut ctx, stmt)?);
        }

        let mut f = crate::symbols::Function::new(
            FunctionName::Name("__root".into()),
            Prototype::new(Type::VOID, vec![]),
        );
        f.owner = self.engine.scripts[script]
            .namespace
            .map(Symbol::Namespace);
        f.body = FunctionBody::Program(Rc::new(program::Statement::Compound(out)));
        let id = self.symbols_mut().add_function(f);
        self.engine.scripts[script].root_function = Some(id);
        Ok(())
    }

    /// Compiles a global or static-member initializer in its declaring
    /// scope.
    pub(crate) fn compile_variable_initializer(
        &mut self,
        declared: Type,
        decl: &ast::VariableDecl,
        scope: &Scope,
    ) -> CResult<(Type, program::Expression)> {
        let mut ctx = FunctionContext::new(scope.clone());
        self.compile_initializer(&mut ctx, declared, &decl.initializer, decl.span)
    }

    // generated bodies reused by `= default`

}
