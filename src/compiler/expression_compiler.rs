//! Expression lowering.
//!
//! Maps each AST expression to an IR expression with a resolved type:
//! literals are decoded in place, identifiers are promoted according to
//! their lookup kind, operators and calls go through overload resolution
//! and the selected conversion sequences are materialized as IR nodes.

use std::rc::Rc;

use crate::ast;
use crate::lexer::Span;
use crate::name_lookup::{self, NameLookup, NameLookupOptions};
use crate::operators::OperatorKind;
use crate::program;
use crate::scope::{Scope, ScopeFrame};
use crate::symbols::{
    FunctionBody, FunctionId, TemplateArgument, TemplateId, TemplateInstance, TemplateKind,
};
use crate::template_engine::TemplatePatternMatching;
use crate::types::{ClassId, Prototype, Type};
use crate::value::Value;

use super::conversion::Conversion;
use super::errors::{CResult, CompilationFailure, CompileError};
use super::function_compiler::FunctionContext;
use super::initialization::{Initialization, InitializationKind};
use super::literal_processor;
use super::overload_resolution::{
    resolve_overloads, OverloadCandidate, OverloadInputs, OverloadResult,
};
use super::script_compiler::zero_value;
use super::Compiler;

impl Compiler<'_> {
    pub(crate) fn compile_expression(
        &mut self,
        ctx: &mut FunctionContext,
        expr: &ast::Expression,
    ) -> CResult<program::Expression> {
        match expr {
            ast::Expression::Literal(lit) => self.compile_literal(ctx, lit),
            ast::Expression::Identifier(id) => self.compile_identifier_expression(ctx, id),
            ast::Expression::Operation { op, lhs, rhs, span } => {
                self.compile_operation(ctx, *op, lhs, rhs.as_deref(), *span)
            }
            ast::Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                span,
            } => self.compile_conditional(ctx, condition, then_expr, else_expr, *span),
            ast::Expression::Call {
                callee,
                arguments,
                span,
            } => self.compile_call(ctx, callee, arguments, *span),
            ast::Expression::Subscript {
                object,
                index,
                span,
            } => self.compile_subscript(ctx, object, index, *span),
            ast::Expression::Member { object, member, span } => {
                self.compile_member_access(ctx, object, member, *span)
            }
            ast::Expression::BraceConstruction {
                type_name,
                arguments,
                span,
            } => self.compile_brace_construction(ctx, type_name, arguments, *span),
            ast::Expression::ArrayExpression { elements, span } => {
                self.compile_array_expression(ctx, elements, *span)
            }
            ast::Expression::ListExpression { elements, .. } => {
                let mut compiled = vec![];
                for e in elements {
                    compiled.push(self.compile_expression(ctx, e)?);
                }
                Ok(program::Expression::InitializerList {
                    initializer_list_type: Type::INITIALIZER_LIST,
                    elements: compiled,
                })
            }
            ast::Expression::Lambda(lambda) => self.compile_lambda(ctx, lambda),
        }
    }

    // literals

    fn compile_literal(
        &mut self,
        ctx: &mut FunctionContext,
        lit: &ast::Literal,
    ) -> CResult<program::Expression> {
        if lit.kind == ast::LiteralKind::UserDefined {
            return self.compile_user_defined_literal(ctx, lit);
        }

        let value = literal_processor::process(lit)?;
        let ty = value.static_type();
        Ok(program::Expression::Literal { value, ty })
    }

    /// The matching literal operator must be exactly one.
    fn compile_user_defined_literal(
        &mut self,
        ctx: &mut FunctionContext,
        lit: &ast::Literal,
    ) -> CResult<program::Expression> {
        let (payload, suffix) = literal_processor::split_user_defined(lit)?;
        let value = literal_processor::process(&payload)?;
        let ty = value.static_type();
        let argument = program::Expression::Literal { value, ty };

        let candidates =
            name_lookup::resolve_literal_operator(&suffix, &ctx.scope, self.symbols());
        let args = vec![argument];
        match resolve_overloads(&candidates, OverloadInputs::Exprs(&args), self.symbols()) {
            OverloadResult::Selected(candidate) => {
                let ret = self.symbols().function(candidate.function).return_type();
                let arguments = self.prepare_arguments(&candidate, args, lit.span)?;
                Ok(program::Expression::FunctionCall {
                    function: candidate.function,
                    ty: ret.without_reference(),
                    arguments,
                })
            }
            _ => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidLiteralOperator(suffix),
                lit.span,
            )),
        }
    }

    // identifiers

    fn compile_identifier_expression(
        &mut self,
        ctx: &mut FunctionContext,
        id: &ast::Identifier,
    ) -> CResult<program::Expression> {
        let span = id.span();
        let lookup = name_lookup::resolve(id, &ctx.scope, self.symbols(), NameLookupOptions::default());
        self.promote_lookup(ctx, lookup, id, span)
    }

    /// Promotion of a lookup result into an expression.
    fn promote_lookup(
        &mut self,
        ctx: &mut FunctionContext,
        lookup: NameLookup,
        id: &ast::Identifier,
        span: Span,
    ) -> CResult<program::Expression> {
        match lookup {
            NameLookup::Local { index } => {
                let ty = ctx.frame.borrow().locals[index].ty;
                Ok(program::Expression::StackValue { index, ty })
            }
            NameLookup::Global { index } => {
                let (script, _, globals) = ctx.scope.script_frame().expect("global without script");
                let ty = globals.borrow()[index].1;
                Ok(program::Expression::FetchGlobal { script, index, ty })
            }
            NameLookup::Capture { index } => {
                let lambda_frame = ctx.scope.lambda_frame().expect("capture without lambda");
                let capture = &lambda_frame.captures[index];
                let ty = capture.ty;
                let closure_ty = ctx.frame.borrow().locals[0].ty;
                Ok(program::Expression::CaptureAccess {
                    lambda: Box::new(program::Expression::StackValue {
                        index: 0,
                        ty: closure_ty,
                    }),
                    index,
                    ty,
                })
            }
            NameLookup::Variable(value) => {
                let ty = value.static_type();
                Ok(program::Expression::Literal { value, ty })
            }
            NameLookup::EnumValue { enum_id, value } => Ok(program::Expression::Literal {
                value: Value::Enum { enum_id, value },
                ty: Type::enumeration(enum_id),
            }),
            NameLookup::DataMember { class, index } => {
                // inside a this-capturing lambda the object comes from the
                // capture, not the stack
                let object = match self.this_expression(ctx, span) {
                    Ok(this) => this,
                    Err(err) => match self.lambda_this_capture(ctx) {
                        Some(capture) => capture,
                        None => return Err(err),
                    },
                };
                self.member_access(ctx, object, class, index, span)
            }
            NameLookup::StaticDataMember { class, name } => {
                let member = self.symbols().class(class).static_members[&name].clone();
                self.check_access(ctx, member.access, class, &name, span)?;
                Ok(program::Expression::FetchStatic {
                    class,
                    name,
                    ty: member.ty,
                })
            }
            NameLookup::Functions(fns) => {
                if fns.len() == 1 {
                    let function = fns[0];
                    let prototype = self.symbols().function(function).prototype.clone();
                    let id = self.symbols_mut().intern_function_type(prototype);
                    Ok(program::Expression::FunctionVariable {
                        function,
                        ty: Type::function(id),
                    })
                } else {
                    Err(CompilationFailure::at(
                        CompileError::AmbiguousFunctionName(id.to_string()),
                        span,
                    ))
                }
            }
            NameLookup::Template(_) => Err(CompilationFailure::at(
                CompileError::TemplateNamesAreNotExpressions,
                span,
            )),
            NameLookup::Type(_) => Err(CompilationFailure::at(
                CompileError::TypeNameInExpression,
                span,
            )),
            NameLookup::Namespace(_) => Err(CompilationFailure::at(
                CompileError::NamespaceNameInExpression,
                span,
            )),
            NameLookup::TemplateParameter { .. } => Err(CompilationFailure::at(
                CompileError::TemplateNamesAreNotExpressions,
                span,
            )),
            NameLookup::Unknown => {
                if id.plain_name() == Some("this") {
                    return Err(CompilationFailure::at(CompileError::IllegalUseOfThis, span));
                }
                Err(CompilationFailure::at(
                    CompileError::CouldNotFindValidOverload(id.to_string()),
                    span,
                ))
            }
        }
    }

    fn this_expression(
        &self,
        ctx: &FunctionContext,
        span: Span,
    ) -> CResult<program::Expression> {
        let frame = ctx.frame.borrow();
        match frame.locals.first() {
            Some(local) if local.name == "this" => Ok(program::Expression::StackValue {
                index: 0,
                ty: local.ty,
            }),
            _ => Err(CompilationFailure::at(CompileError::IllegalUseOfThis, span)),
        }
    }

    fn lambda_this_capture(&self, ctx: &FunctionContext) -> Option<program::Expression> {
        let frame = ctx.scope.lambda_frame()?;
        let index = frame.capture_index("this")?;
        let ty = frame.captures[index].ty;
        let closure_ty = ctx.frame.borrow().locals.first()?.ty;
        Some(program::Expression::CaptureAccess {
            lambda: Box::new(program::Expression::StackValue {
                index: 0,
                ty: closure_ty,
            }),
            index,
            ty,
        })
    }

    fn member_access(
        &mut self,
        ctx: &FunctionContext,
        object: program::Expression,
        class: ClassId,
        index: usize,
        span: Span,
    ) -> CResult<program::Expression> {
        let (ty, access, name) = self
            .data_member_at(class, index)
            .ok_or_else(|| CompilationFailure::at(CompileError::NoSuchMember(String::new()), span))?;
        self.check_access(ctx, access, class, &name, span)?;

        let ty = if object.ty().is_const() { ty.with_const() } else { ty };
        Ok(program::Expression::MemberAccess {
            object: Box::new(object),
            index,
            ty,
        })
    }

    /// Member `(type, access, name)` by cumulative index.
    fn data_member_at(
        &self,
        class: ClassId,
        index: usize,
    ) -> Option<(Type, ast::AccessSpecifier, String)> {
        let chain = self.symbols().class_and_bases(class);
        for c in chain.into_iter().rev() {
            let base_index = match self.symbols().class(c).base {
                Some(b) => self.symbols().field_count(b),
                None => 0,
            };
            let members = &self.symbols().class(c).data_members;
            if index >= base_index && index < base_index + members.len() {
                let m = &members[index - base_index];
                return Some((m.ty, m.access, m.name.clone()));
            }
        }
        None
    }

    fn check_access(
        &self,
        ctx: &FunctionContext,
        access: ast::AccessSpecifier,
        declaring: ClassId,
        name: &str,
        span: Span,
    ) -> CResult<()> {
        let ok = match access {
            ast::AccessSpecifier::Public => true,
            ast::AccessSpecifier::Protected => ctx
                .this_class
                .map(|c| self.symbols().derives_from(c, declaring))
                .unwrap_or(false),
            ast::AccessSpecifier::Private => match ctx.this_class {
                Some(c) => {
                    c == declaring || self.symbols().class(declaring).friends.contains(&c)
                }
                None => false,
            },
        };

        if ok {
            Ok(())
        } else {
            Err(CompilationFailure::at(
                CompileError::InaccessibleMember(name.to_string()),
                span,
            ))
        }
    }

    // operators

    fn compile_operation(
        &mut self,
        ctx: &mut FunctionContext,
        op: OperatorKind,
        lhs: &ast::Expression,
        rhs: Option<&ast::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        // command-mode assignment to a context variable lowers to a bind
        if ctx.command_mode && op == OperatorKind::Assignment {
            if let ast::Expression::Identifier(id) = lhs {
                if let Some(name) = id.plain_name() {
                    let lookup = name_lookup::resolve(
                        id,
                        &ctx.scope,
                        self.symbols(),
                        NameLookupOptions::default(),
                    );
                    if matches!(lookup, NameLookup::Variable(_)) {
                        let value = self.compile_expression(ctx, rhs.expect("assignment rhs"))?;
                        return Ok(program::Expression::BindExpression {
                            name: name.to_string(),
                            ty: value.ty(),
                            value: Box::new(value),
                        });
                    }
                }
            }
        }

        let mut args = vec![self.compile_expression(ctx, lhs)?];
        if let Some(rhs) = rhs {
            args.push(self.compile_expression(ctx, rhs)?);
        }

        let operand_types: Vec<Type> = args.iter().map(|a| a.ty()).collect();
        let candidates =
            name_lookup::resolve_operator(op, &operand_types, &ctx.scope, self.symbols());

        match resolve_overloads(&candidates, OverloadInputs::Exprs(&args), self.symbols()) {
            OverloadResult::Selected(candidate) => {
                self.emit_call(ctx, candidate, args, span, false)
            }
            _ => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidOperator(op),
                span,
            )),
        }
    }

    fn compile_conditional(
        &mut self,
        ctx: &mut FunctionContext,
        condition: &ast::Expression,
        then_expr: &ast::Expression,
        else_expr: &ast::Expression,
        span: Span,
    ) -> CResult<program::Expression> {
        let cond_span = condition.span();
        let cond = self.compile_expression(ctx, condition)?;
        let cond_init = Initialization::compute_from_type(
            Type::BOOLEAN,
            cond.ty(),
            self.symbols(),
            InitializationKind::Copy,
        );
        if !cond_init.is_valid() {
            return Err(self.conversion_failure(cond.ty(), Type::BOOLEAN, cond_span));
        }
        let cond = self.apply_initialization(&cond_init, cond, cond_span)?;

        let a = self.compile_expression(ctx, then_expr)?;
        let b = self.compile_expression(ctx, else_expr)?;

        // the common type: identical base types, or a standard conversion
        // in exactly one direction
        let ta = a.ty();
        let tb = b.ty();
        let (ty, a, b) = if ta.base_type() == tb.base_type() {
            (ta.base_type().without_const(), a, b)
        } else {
            let to_a = Conversion::compute(tb, ta.base_type(), self.symbols(), false);
            let to_b = Conversion::compute(ta, tb.base_type(), self.symbols(), false);
            // when both directions convert, the non-narrowing one wins
            let pick_a = !to_a.is_invalid()
                && (to_b.is_invalid() || (to_a.rank() <= to_b.rank() && !to_a.is_narrowing()));
            let pick_b = !to_b.is_invalid() && !to_b.is_narrowing();
            if pick_a && !(pick_b && to_a.is_narrowing()) {
                let converted = self.apply_conversion(b, ta.base_type(), &to_a);
                (ta.base_type().without_const(), a, converted)
            } else if pick_b {
                let converted = self.apply_conversion(a, tb.base_type(), &to_b);
                (tb.base_type().without_const(), converted, b)
            } else {
                return Err(CompilationFailure::at(
                    CompileError::ConditionalExpressionTypeMismatch {
                        left: self.symbols().type_name(ta),
                        right: self.symbols().type_name(tb),
                    },
                    span,
                ));
            }
        };

        Ok(program::Expression::Conditional {
            condition: Box::new(cond),
            then_expr: Box::new(a),
            else_expr: Box::new(b),
            ty,
        })
    }

    // calls

    fn compile_call(
        &mut self,
        ctx: &mut FunctionContext,
        callee: &ast::Expression,
        arguments: &[ast::Expression],
        span: Span,
    ) -> CResult<program::Expression> {
        let mut args = vec![];
        for a in arguments {
            args.push(self.compile_expression(ctx, a)?);
        }

        match callee {
            ast::Expression::Identifier(id) => self.compile_named_call(ctx, id, args, span),
            ast::Expression::Member { object, member, .. } => {
                let object = self.compile_expression(ctx, object)?;
                self.compile_member_call(ctx, object, member, args, span)
            }
            other => {
                let callee = self.compile_expression(ctx, other)?;
                self.compile_functor_call(ctx, callee, args, span)
            }
        }
    }

    fn compile_named_call(
        &mut self,
        ctx: &mut FunctionContext,
        id: &ast::Identifier,
        args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        let lookup =
            name_lookup::resolve(id, &ctx.scope, self.symbols(), NameLookupOptions::default());

        match lookup {
            NameLookup::Functions(mut candidates) => {
                // same-name function templates are candidates too
                let arg_types: Vec<Type> = args.iter().map(|a| a.ty()).collect();
                if let Some(name) = id.plain_name() {
                    for tid in self.function_templates_named(name, &ctx.scope) {
                        if let Some(instance) =
                            self.instantiate_function_template(tid, &[], &arg_types, span)?
                        {
                            candidates.push(instance);
                        }
                    }
                }
                self.finish_named_call(ctx, id, candidates, args, span)
            }
            NameLookup::Template(tid) => {
                if self.symbols().template(tid).kind == TemplateKind::Class {
                    // `Box<int>(...)` constructs an instance
                    let t = self.resolve_type_name(id, &ctx.scope)?;
                    return self.initialize_from_arguments(t, args, span);
                }
                let explicit = match id.rightmost() {
                    ast::Identifier::Template { arguments, .. } => {
                        self.resolve_template_args(arguments, &ctx.scope)?
                    }
                    _ => vec![],
                };
                let arg_types: Vec<Type> = args.iter().map(|a| a.ty()).collect();
                let Some(instance) =
                    self.instantiate_function_template(tid, &explicit, &arg_types, span)?
                else {
                    return Err(CompilationFailure::at(
                        CompileError::CouldNotFindValidOverload(id.to_string()),
                        span,
                    ));
                };
                self.finish_named_call(ctx, id, vec![instance], args, span)
            }
            NameLookup::Type(t) => self.initialize_from_arguments(t, args, span),
            NameLookup::Local { .. }
            | NameLookup::Global { .. }
            | NameLookup::Capture { .. }
            | NameLookup::Variable(_)
            | NameLookup::DataMember { .. }
            | NameLookup::StaticDataMember { .. } => {
                let callee = self.promote_lookup(ctx, lookup, id, span)?;
                self.compile_functor_call(ctx, callee, args, span)
            }
            _ => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidOverload(id.to_string()),
                span,
            )),
        }
    }

    fn finish_named_call(
        &mut self,
        ctx: &mut FunctionContext,
        id: &ast::Identifier,
        candidates: Vec<FunctionId>,
        mut args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        // member functions get the implicit object argument
        let needs_object = candidates
            .iter()
            .any(|&f| self.symbols().function(f).implicit_param_count() == 1);
        if needs_object {
            let this = self.this_expression(ctx, span)?;
            args.insert(0, this);
        }

        match resolve_overloads(&candidates, OverloadInputs::Exprs(&args), self.symbols()) {
            OverloadResult::Selected(candidate) => {
                let virtual_ok = !id.is_qualified();
                self.emit_call(ctx, candidate, args, span, virtual_ok)
            }
            OverloadResult::Ambiguous(_) => Err(CompilationFailure::at(
                CompileError::AmbiguousFunctionName(id.to_string()),
                span,
            )),
            OverloadResult::NoMatch => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidOverload(id.to_string()),
                span,
            )),
        }
    }

    fn compile_member_call(
        &mut self,
        ctx: &mut FunctionContext,
        object: program::Expression,
        member: &str,
        mut args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        let Some(class) = object.ty().class_id() else {
            return Err(CompilationFailure::at(
                CompileError::CannotAccessMemberOfNonObject(member.to_string()),
                span,
            ));
        };

        match name_lookup::member_lookup(member, class, self.symbols()) {
            NameLookup::Functions(candidates) => {
                args.insert(0, object);
                match resolve_overloads(&candidates, OverloadInputs::Exprs(&args), self.symbols())
                {
                    OverloadResult::Selected(candidate) => {
                        self.emit_call(ctx, candidate, args, span, true)
                    }
                    _ => Err(CompilationFailure::at(
                        CompileError::CouldNotFindValidMemberFunction(member.to_string()),
                        span,
                    )),
                }
            }
            NameLookup::DataMember { class, index } => {
                let functor = self.member_access(ctx, object, class, index, span)?;
                self.compile_functor_call(ctx, functor, args, span)
            }
            _ => Err(CompilationFailure::at(
                CompileError::NoSuchMember(member.to_string()),
                span,
            )),
        }
    }

    /// Calls a value: a closure, an object with `operator()`, or a plain
    /// function variable.
    fn compile_functor_call(
        &mut self,
        ctx: &mut FunctionContext,
        callee: program::Expression,
        mut args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        let ty = callee.ty();

        if let Some(closure) = ty.closure_id() {
            let Some(call) = self.symbols().closure(closure).call else {
                return Err(CompilationFailure::at(
                    CompileError::CouldNotFindValidCallOperator,
                    span,
                ));
            };
            args.insert(0, callee);
            let candidate = OverloadCandidate {
                function: call,
                initializations: vec![],
            };
            // conversions for closure calls follow the call operator's
            // prototype
            return self.emit_unchecked_call(candidate.function, args, span);
        }

        if let Some(class) = ty.class_id() {
            let candidates: Vec<FunctionId> = self
                .symbols()
                .class_and_bases(class)
                .into_iter()
                .flat_map(|c| self.symbols().class(c).operators.clone())
                .filter(|&f| {
                    self.symbols().function(f).operator_kind() == Some(OperatorKind::FunctionCall)
                })
                .collect();

            args.insert(0, callee);
            return match resolve_overloads(
                &candidates,
                OverloadInputs::Exprs(&args),
                self.symbols(),
            ) {
                OverloadResult::Selected(candidate) => {
                    self.emit_call(ctx, candidate, args, span, false)
                }
                _ => Err(CompilationFailure::at(
                    CompileError::CouldNotFindValidCallOperator,
                    span,
                )),
            };
        }

        if let Some(ft) = ty.function_type_id() {
            let prototype = self.symbols().function_types[ft.index()].prototype.clone();
            if prototype.count() != args.len() {
                return Err(CompilationFailure::at(
                    CompileError::CouldNotFindValidCallOperator,
                    span,
                ));
            }
            let mut converted = vec![];
            for (i, arg) in args.into_iter().enumerate() {
                let init = Initialization::compute(prototype.at(i), &arg, self.symbols());
                if !init.is_valid() {
                    return Err(self.conversion_failure(arg.ty(), prototype.at(i), span));
                }
                converted.push(self.apply_initialization(&init, arg, span)?);
            }
            return Ok(program::Expression::FunctionVariableCall {
                callee: Box::new(callee),
                ty: prototype.return_type.without_reference(),
                arguments: converted,
            });
        }

        Err(CompilationFailure::at(
            CompileError::CouldNotFindValidCallOperator,
            span,
        ))
    }

    /// Emits the call for a selected overload, converting the arguments
    /// and completing the trailing default arguments.
    fn emit_call(
        &mut self,
        ctx: &mut FunctionContext,
        candidate: OverloadCandidate,
        args: Vec<program::Expression>,
        span: Span,
        virtual_ok: bool,
    ) -> CResult<program::Expression> {
        let function = candidate.function;
        let f = self.symbols().function(function);

        if f.flags.is_deleted() {
            return Err(CompilationFailure::at(
                CompileError::CallToDeletedFunction(f.name.to_string()),
                span,
            ));
        }

        let is_member = f.implicit_param_count() == 1;
        let is_virtual = f.flags.is_virtual();
        let vtable_index = f.vtable_index;
        let ret = f.return_type();
        let access = f.access;
        let declaring = f.member_of();

        if let Some(declaring) = declaring {
            let name = f.name.to_string();
            self.check_access(ctx, access, declaring, &name, span)?;
        }

        self.commit_function_template_instance(function)?;
        let arguments = self.prepare_arguments(&candidate, args, span)?;

        if is_member && is_virtual && virtual_ok {
            if let Some(vtable_index) = vtable_index {
                let mut arguments = arguments;
                let object = arguments.remove(0);
                return Ok(program::Expression::VirtualCall {
                    object: Box::new(object),
                    vtable_index,
                    ty: ret.without_reference(),
                    arguments,
                });
            }
        }

        Ok(program::Expression::FunctionCall {
            function,
            ty: ret.without_reference(),
            arguments,
        })
    }

    /// Call emission when the conversions follow the prototype directly.
    fn emit_unchecked_call(
        &mut self,
        function: FunctionId,
        args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        let prototype = self.symbols().function(function).prototype.clone();
        let ret = self.symbols().function(function).return_type();

        if prototype.count() != args.len() {
            return Err(CompilationFailure::at(
                CompileError::CouldNotFindValidCallOperator,
                span,
            ));
        }

        let mut converted = vec![];
        for (i, arg) in args.into_iter().enumerate() {
            let init = Initialization::compute(prototype.at(i), &arg, self.symbols());
            if !init.is_valid() {
                return Err(self.conversion_failure(arg.ty(), prototype.at(i), span));
            }
            converted.push(self.apply_initialization(&init, arg, span)?);
        }

        Ok(program::Expression::FunctionCall {
            function,
            ty: ret.without_reference(),
            arguments: converted,
        })
    }

    fn prepare_arguments(
        &mut self,
        candidate: &OverloadCandidate,
        args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<Vec<program::Expression>> {
        let mut out = vec![];
        for (init, arg) in candidate.initializations.iter().zip(args) {
            out.push(self.apply_initialization(init, arg, span)?);
        }

        // default arguments for the remaining slots
        let f = self.symbols().function(candidate.function);
        let total = f.prototype.count();
        let defaults = f.default_arguments.clone();
        let provided = out.len();
        if provided < total {
            let missing = total - provided;
            let start = defaults.len() - missing;
            for default in &defaults[start..] {
                out.push(default.as_ref().clone());
            }
        }

        Ok(out)
    }

    // subscripts

    fn compile_subscript(
        &mut self,
        ctx: &mut FunctionContext,
        object: &ast::Expression,
        index: &ast::Expression,
        span: Span,
    ) -> CResult<program::Expression> {
        let object = self.compile_expression(ctx, object)?;
        let index = self.compile_expression(ctx, index)?;

        let Some(class) = object.ty().class_id() else {
            return Err(CompilationFailure::at(
                CompileError::ArraySubscriptOnNonObject,
                span,
            ));
        };

        let candidates: Vec<FunctionId> = self
            .symbols()
            .class_and_bases(class)
            .into_iter()
            .flat_map(|c| self.symbols().class(c).operators.clone())
            .filter(|&f| {
                self.symbols().function(f).operator_kind() == Some(OperatorKind::Subscript)
            })
            .collect();

        let args = vec![object, index];
        match resolve_overloads(&candidates, OverloadInputs::Exprs(&args), self.symbols()) {
            OverloadResult::Selected(candidate) => {
                let is_array = self.symbols().class(class).instance_of
                    == Some(self.symbols().builtins.array);
                if is_array {
                    let ret = self.symbols().function(candidate.function).return_type();
                    let mut converted = self.prepare_arguments(&candidate, args, span)?;
                    let index = converted.pop().expect("subscript index");
                    let array = converted.pop().expect("subscript object");
                    return Ok(program::Expression::ArraySubscript {
                        array: Box::new(array),
                        index: Box::new(index),
                        ty: ret,
                    });
                }
                self.emit_call(ctx, candidate, args, span, false)
            }
            _ => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidSubscriptOperator,
                span,
            )),
        }
    }

    // member access

    fn compile_member_access(
        &mut self,
        ctx: &mut FunctionContext,
        object: &ast::Expression,
        member: &str,
        span: Span,
    ) -> CResult<program::Expression> {
        let object = self.compile_expression(ctx, object)?;

        let Some(class) = object.ty().class_id() else {
            return Err(CompilationFailure::at(
                CompileError::CannotAccessMemberOfNonObject(member.to_string()),
                span,
            ));
        };

        match name_lookup::member_lookup(member, class, self.symbols()) {
            NameLookup::DataMember { class, index } => {
                self.member_access(ctx, object, class, index, span)
            }
            NameLookup::StaticDataMember { class, name } => {
                let member = self.symbols().class(class).static_members[&name].clone();
                self.check_access(ctx, member.access, class, &name, span)?;
                Ok(program::Expression::FetchStatic {
                    class,
                    name,
                    ty: member.ty,
                })
            }
            _ => Err(CompilationFailure::at(
                CompileError::NoSuchMember(member.to_string()),
                span,
            )),
        }
    }

    // construction

    fn compile_brace_construction(
        &mut self,
        ctx: &mut FunctionContext,
        type_name: &ast::Identifier,
        arguments: &[ast::Expression],
        span: Span,
    ) -> CResult<program::Expression> {
        let t = match self.resolve_type_name(type_name, &ctx.scope) {
            Ok(t) => t,
            Err(_) => {
                return Err(CompilationFailure::at(
                    CompileError::UnknownTypeInBraceInitialization(type_name.to_string()),
                    span,
                ))
            }
        };

        let mut elements = vec![];
        for a in arguments {
            elements.push(self.compile_expression(ctx, a)?);
        }
        let list = program::Expression::InitializerList {
            initializer_list_type: Type::INITIALIZER_LIST,
            elements,
        };

        let init = Initialization::compute(t, &list, self.symbols());
        if !init.is_valid() {
            return Err(CompilationFailure::at(
                CompileError::CouldNotFindValidConstructor,
                span,
            ));
        }
        if init.is_narrowing() {
            return Err(self.narrowing_failure(Type::INITIALIZER_LIST, t, span));
        }
        self.apply_initialization(&init, list, span)
    }

    /// `T(args...)` — constructor-style initialization of any type.
    pub(crate) fn initialize_from_arguments(
        &mut self,
        t: Type,
        args: Vec<program::Expression>,
        span: Span,
    ) -> CResult<program::Expression> {
        if t.is_fundamental() || t.base_type() == Type::STRING {
            return match args.len() {
                0 => Ok(program::Expression::Literal {
                    value: zero_value(t),
                    ty: t.base_type().without_const(),
                }),
                1 => {
                    let arg = args.into_iter().next().unwrap();
                    let conv = Conversion::compute(arg.ty(), t.base_type(), self.symbols(), true);
                    if conv.is_invalid() {
                        return Err(self.conversion_failure(arg.ty(), t, span));
                    }
                    Ok(self.apply_conversion(arg, t.base_type().without_const(), &conv))
                }
                _ => Err(CompilationFailure::at(
                    CompileError::TooManyArgumentInVariableInitialization,
                    span,
                )),
            };
        }

        if let Some(class) = t.base_type().class_id() {
            return self.compile_constructor_call(class, args, span, None);
        }

        // enums and function types accept a same-type argument
        if args.len() == 1 {
            let arg = args.into_iter().next().unwrap();
            if arg.ty().base_type() == t.base_type() {
                return Ok(arg);
            }
            return Err(self.conversion_failure(arg.ty(), t, span));
        }

        Err(CompilationFailure::at(
            CompileError::CouldNotFindValidConstructor,
            span,
        ))
    }

    /// Overload resolution over a class's constructors. With `this_arg`
    /// the selected constructor is invoked on existing storage (a base
    /// constructor call); otherwise a fresh object is constructed.
    pub(crate) fn compile_constructor_call(
        &mut self,
        class: ClassId,
        args: Vec<program::Expression>,
        span: Span,
        this_arg: Option<program::Expression>,
    ) -> CResult<program::Expression> {
        let candidates = self.symbols().class(class).constructors.clone();

        // the implicit-object slot is a placeholder during resolution
        let placeholder = program::Expression::StackValue {
            index: 0,
            ty: Type::reference(Type::object(class)),
        };
        let mut inputs = vec![this_arg.clone().unwrap_or(placeholder)];
        inputs.extend(args);

        match resolve_overloads(&candidates, OverloadInputs::Exprs(&inputs), self.symbols()) {
            OverloadResult::Selected(candidate) => {
                let constructor = candidate.function;
                if self.symbols().function(constructor).flags.is_deleted() {
                    return Err(CompilationFailure::at(
                        CompileError::CallToDeletedFunction(
                            self.symbols().class(class).name.clone(),
                        ),
                        span,
                    ));
                }

                let mut converted = self.prepare_arguments(&candidate, inputs, span)?;
                let object = converted.remove(0);

                match this_arg {
                    Some(_) => Ok(program::Expression::FunctionCall {
                        function: constructor,
                        ty: Type::VOID,
                        arguments: {
                            let mut v = vec![object];
                            v.extend(converted);
                            v
                        },
                    }),
                    None => Ok(program::Expression::ConstructorCall {
                        constructor,
                        ty: Type::object(class),
                        arguments: converted,
                    }),
                }
            }
            _ => Err(CompilationFailure::at(
                CompileError::CouldNotFindValidConstructor,
                span,
            )),
        }
    }

    // array expressions

    fn compile_array_expression(
        &mut self,
        ctx: &mut FunctionContext,
        elements: &[ast::Expression],
        span: Span,
    ) -> CResult<program::Expression> {
        let mut compiled = vec![];
        for e in elements {
            compiled.push(self.compile_expression(ctx, e)?);
        }

        let Some(first) = compiled.first() else {
            return Err(CompilationFailure::at(
                CompileError::ArrayElementNotConvertible,
                span,
            ));
        };
        if first.is_initializer_list() {
            return Err(CompilationFailure::at(
                CompileError::InitializerListAsFirstArrayElement,
                span,
            ));
        }

        let element_type = first.ty().base_type().without_const();
        let array_template = self.symbols().builtins.array;
        let array_class = self.instantiate_class_template(
            array_template,
            vec![TemplateArgument::Type(element_type)],
            span,
        )?;

        let mut converted = vec![];
        for e in compiled {
            let init = Initialization::compute(element_type, &e, self.symbols());
            if !init.is_valid() {
                return Err(CompilationFailure::at(
                    CompileError::ArrayElementNotConvertible,
                    e_span(&e, span),
                ));
            }
            converted.push(self.apply_initialization(&init, e, span)?);
        }

        Ok(program::Expression::ArrayExpression {
            array_type: Type::object(array_class),
            elements: converted,
        })
    }

    // conversion / initialization materialization

    pub(crate) fn apply_conversion(
        &mut self,
        expr: program::Expression,
        dest: Type,
        conv: &Conversion,
    ) -> program::Expression {
        if let Some(function) = conv.function {
            let f = self.symbols().function(function);
            if f.is_constructor() {
                let param = f.prototype.at(1);
                let std1 = conv.std1;
                let arg = self.apply_standard_conversion(expr, param, &std1);
                return program::Expression::ConstructorCall {
                    constructor: function,
                    ty: dest.base_type(),
                    arguments: vec![arg],
                };
            }
            // conversion function
            let produced = f.return_type();
            let std3 = conv.std3;
            let call = program::Expression::FunctionCall {
                function,
                ty: produced.without_reference(),
                arguments: vec![expr],
            };
            return self.apply_standard_conversion(call, dest, &std3);
        }

        let std1 = conv.std1;
        self.apply_standard_conversion(expr, dest, &std1)
    }

    fn apply_standard_conversion(
        &mut self,
        expr: program::Expression,
        dest: Type,
        conv: &super::conversion::StandardConversion,
    ) -> program::Expression {
        if conv.is_reference_binding() {
            return expr;
        }
        if conv.is_numeric_conversion() && expr.ty().base_type() != dest.base_type() {
            return program::Expression::FundamentalConversion {
                dest_type: dest.base_type().without_const(),
                source: Box::new(expr),
            };
        }
        if conv.is_copy_construction() {
            if let Some(class) = dest.base_type().class_id() {
                if let Some(copy) = self.symbols().copy_constructor(class) {
                    return program::Expression::ConstructorCall {
                        constructor: copy,
                        ty: dest.base_type(),
                        arguments: vec![expr],
                    };
                }
            }
        }
        if expr.ty().is_any_reference() && !dest.is_any_reference() {
            return program::Expression::Copy {
                ty: dest.base_type().without_const(),
                source: Box::new(expr),
            };
        }
        expr
    }

    pub(crate) fn apply_initialization(
        &mut self,
        init: &Initialization,
        expr: program::Expression,
        span: Span,
    ) -> CResult<program::Expression> {
        match init.kind {
            InitializationKind::Default => Ok(self.default_value_for(init.dest_type)),
            InitializationKind::Copy
            | InitializationKind::Direct
            | InitializationKind::Reference => {
                Ok(self.apply_conversion(expr, init.dest_type, &init.conversion))
            }
            InitializationKind::List | InitializationKind::Aggregate => {
                let program::Expression::InitializerList { elements, .. } = expr else {
                    // a single-element list over a fundamental target
                    return Ok(self.apply_conversion(expr, init.dest_type, &init.conversion));
                };

                // fundamental target with one element
                if init.initializations.is_empty() && init.constructor.is_none() {
                    let mut elements = elements;
                    if elements.is_empty() {
                        return Ok(program::Expression::Literal {
                            value: zero_value(init.dest_type),
                            ty: init.dest_type.base_type().without_const(),
                        });
                    }
                    let element = elements.remove(0);
                    return Ok(self.apply_conversion(
                        element,
                        init.dest_type,
                        &init.conversion,
                    ));
                }

                let mut converted = vec![];
                for (sub, element) in init.initializations.iter().zip(elements) {
                    converted.push(self.apply_initialization(sub, element, span)?);
                }

                match init.constructor {
                    Some(constructor) => {
                        // an initializer-list constructor receives the
                        // wrapped list as its only argument
                        let f = self.symbols().function(constructor);
                        let constructed = f
                            .member_of()
                            .map(Type::object)
                            .unwrap_or_else(|| init.dest_type.base_type());
                        let takes_list = f.prototype.count() == 2
                            && self.symbols().is_initializer_list(f.prototype.at(1));
                        if takes_list {
                            let list_type = f.prototype.at(1);
                            let list = program::Expression::InitializerList {
                                initializer_list_type: list_type,
                                elements: converted,
                            };
                            Ok(program::Expression::ConstructorCall {
                                constructor,
                                ty: constructed,
                                arguments: vec![list],
                            })
                        } else {
                            Ok(program::Expression::ConstructorCall {
                                constructor,
                                ty: constructed,
                                arguments: converted,
                            })
                        }
                    }
                    None if self.symbols().is_initializer_list(init.dest_type) => {
                        Ok(program::Expression::InitializerList {
                            initializer_list_type: init.dest_type,
                            elements: converted,
                        })
                    }
                    None => {
                        // aggregate form: member-wise initialization
                        Ok(program::Expression::InitializerList {
                            initializer_list_type: init.dest_type,
                            elements: converted,
                        })
                    }
                }
            }
            InitializationKind::Invalid => Err(self.conversion_failure(
                expr.ty(),
                init.dest_type,
                span,
            )),
        }
    }

    // function templates

    /// Function templates with the given name visible from the scope.
    pub(crate) fn function_templates_named(
        &self,
        name: &str,
        scope: &Scope,
    ) -> Vec<TemplateId> {
        let mut out = vec![];
        for s in scope.chain() {
            let ns = match s.frame() {
                Some(ScopeFrame::Namespace(ns))
                | Some(ScopeFrame::Script { namespace: ns, .. }) => ns,
                _ => continue,
            };
            for &tid in &self.symbols().namespace(ns).templates {
                let t = self.symbols().template(tid);
                if t.kind == TemplateKind::Function && t.name == name && !out.contains(&tid) {
                    out.push(tid);
                }
            }
        }
        out
    }

    /// Deduces the template arguments from the call and returns the
    /// instance; `None` is a silent substitution failure.
    pub(crate) fn instantiate_function_template(
        &mut self,
        tid: TemplateId,
        explicit: &[TemplateArgument],
        arg_types: &[Type],
        span: Span,
    ) -> CResult<Option<FunctionId>> {
        let parameters = self.symbols().template(tid).parameters.clone();
        let enclosing = self.symbols().template(tid).enclosing;
        let name = self.symbols().template(tid).name.clone();
        let definition = self.symbols().template(tid).definition.clone();

        let decl = match definition {
            crate::symbols::TemplateDefinition::SourceFunction(decl) => decl,
            crate::symbols::TemplateDefinition::NativeFunction(callback) => {
                // native backends take the explicit arguments as-is
                let callback = callback;
                let args = match self.complete_template_arguments(tid, explicit.to_vec(), span)
                {
                    Ok(args) => args,
                    Err(_) => return Ok(None),
                };
                if let Some(TemplateInstance::Function(f)) =
                    self.symbols().template(tid).get_instance(&args)
                {
                    return Ok(Some(f));
                }
                let prototype = Prototype::new(Type::VOID, arg_types.to_vec());
                let mut f = crate::symbols::Function::new(
                    crate::symbols::FunctionName::Name(name),
                    prototype,
                );
                f.body = FunctionBody::Native(callback);
                f.instance_of = Some(tid);
                f.template_arguments = args.clone();
                let id = self.symbols_mut().add_function(f);
                self.symbols_mut()
                    .template_mut(tid)
                    .set_instance(args, TemplateInstance::Function(id));
                return Ok(Some(id));
            }
            _ => return Ok(None),
        };

        // deduction
        let base_scope = self.scope_for_symbol(enclosing);
        let param_scope = base_scope.child(ScopeFrame::TemplateParameters(Rc::new(
            crate::scope::TemplateParameterFrame {
                names: parameters.iter().map(|p| p.name.clone()).collect(),
            },
        )));

        let mut matcher =
            TemplatePatternMatching::new(self.symbols(), param_scope, explicit.len());
        matcher.deduce_from_signature(&decl.params, arg_types);
        let Some(deduced) = matcher.deduction.agglomerate(&parameters) else {
            return Ok(None);
        };

        let mut args: Vec<TemplateArgument> = vec![];
        for (i, slot) in deduced.into_iter().enumerate() {
            if i < explicit.len() {
                args.push(explicit[i].clone());
            } else if let Some(value) = slot {
                args.push(value);
            } else {
                break;
            }
        }
        // non-deduced parameters fall back to defaults; a missing one
        // rejects the candidate silently
        let args = match self.complete_template_arguments(tid, args, span) {
            Ok(args) => args,
            Err(_) => return Ok(None),
        };

        if let Some(TemplateInstance::Function(f)) =
            self.symbols().template(tid).get_instance(&args)
        {
            return Ok(Some(f));
        }

        log::debug!("instantiating function template '{name}'");

        // substitution
        let arg_scope = base_scope.child(ScopeFrame::TemplateArguments(Rc::new(
            crate::scope::TemplateArgumentFrame {
                parameters: parameters.clone(),
                arguments: args.clone(),
            },
        )));

        let Ok(return_type) = self.resolve_type(&decl.return_type, &arg_scope) else {
            return Ok(None);
        };
        let mut params = vec![];
        for p in &decl.params {
            match self.resolve_type(&p.ty, &arg_scope) {
                Ok(t) => params.push(t),
                Err(_) => return Ok(None),
            }
        }

        let mut shell = crate::symbols::Function::new(
            crate::symbols::FunctionName::Name(name),
            Prototype::new(return_type, params),
        );
        shell.owner = Some(enclosing);
        shell.instance_of = Some(tid);
        shell.template_arguments = args;
        let function = self.symbols_mut().add_function(shell);

        // the shell stays uncommitted until overload resolution actually
        // selects it; see `commit_function_template_instance`
        Ok(Some(function))
    }

    /// Registers a selected function-template shell in its template's
    /// instance table and schedules its body.
    pub(crate) fn commit_function_template_instance(
        &mut self,
        function: FunctionId,
    ) -> CResult<()> {
        let f = self.symbols().function(function);
        let Some(tid) = f.instance_of else {
            return Ok(());
        };
        let args = f.template_arguments.clone();

        if self.symbols().template(tid).has_instance(&args) {
            return Ok(());
        }

        self.symbols_mut()
            .template_mut(tid)
            .set_instance(args.clone(), TemplateInstance::Function(function));

        let template = self.symbols().template(tid);
        let parameters = template.parameters.clone();
        let enclosing = template.enclosing;
        let crate::symbols::TemplateDefinition::SourceFunction(decl) =
            template.definition.clone()
        else {
            return Ok(());
        };

        if decl.body.is_some() {
            let arg_scope = self.scope_for_symbol(enclosing).child(
                ScopeFrame::TemplateArguments(Rc::new(crate::scope::TemplateArgumentFrame {
                    parameters,
                    arguments: args,
                })),
            );
            self.function_tasks.push_back(super::CompileFunctionTask {
                function,
                decl,
                scope: arg_scope,
            });
        }

        Ok(())
    }
}

fn e_span(_e: &program::Expression, fallback: Span) -> Span {
    fallback
}
