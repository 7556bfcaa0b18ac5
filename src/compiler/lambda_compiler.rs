//! Lambda compilation.
//!
//! Captures are resolved in the enclosing function scope: explicit
//! by-value/by-reference captures, captures with initializers, `[=]`/`[&]`
//! default captures (mutually exclusive) and `this` (only in a non-static
//! member context). Unused captures are elided. A fresh closure type
//! receives a single `operator()` whose body compiles with the closure as
//! implicit first argument; the return type is deduced from the `return`
//! statements.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::ast;
use crate::lexer::Span;
use crate::name_lookup::{self, NameLookup};
use crate::program;
use crate::scope::{LambdaFrame, ScopeFrame};
use crate::symbols::{Capture, Function, FunctionBody, FunctionName};
use crate::types::{Prototype, Type, TypeFlag};

use super::errors::{CResult, CompilationFailure, CompileError};
use super::function_compiler::FunctionContext;
use super::Compiler;

impl Compiler<'_> {
    pub(crate) fn compile_lambda(
        &mut self,
        ctx: &mut FunctionContext,
        lambda: &ast::LambdaExpression,
    ) -> CResult<program::Expression> {
        let span = lambda.span;

        let mut default_by_value = false;
        let mut default_by_ref = false;
        for capture in &lambda.captures {
            if let ast::LambdaCapture::All { by_ref, .. } = capture {
                if *by_ref {
                    default_by_ref = true;
                } else {
                    default_by_value = true;
                }
            }
        }
        if default_by_value && default_by_ref {
            return Err(CompilationFailure::at(
                CompileError::CannotCaptureByValueAndByRef,
                span,
            ));
        }

        let used = used_names(&lambda.body);
        let param_names: Vec<&str> = lambda.params.iter().map(|p| p.name.as_str()).collect();

        // (capture, the expression that materializes it)
        let mut captures: Vec<Capture> = vec![];
        let mut materialized: Vec<program::Expression> = vec![];

        let mut add_capture = |compiler: &mut Self,
                               captures: &mut Vec<Capture>,
                               materialized: &mut Vec<program::Expression>,
                               name: &str,
                               by_ref: bool,
                               value: program::Expression| {
            let _ = compiler;
            if captures.iter().any(|c| c.name == name) {
                return;
            }
            let ty = if by_ref {
                Type::reference(value.ty().base_type())
            } else {
                value.ty().base_type().without_const()
            };
            captures.push(Capture {
                name: name.to_string(),
                ty,
                by_ref,
            });
            materialized.push(value);
        };

        for capture in &lambda.captures {
            match capture {
                ast::LambdaCapture::All { .. } => {}
                ast::LambdaCapture::This { span } => {
                    let this = self.this_capture_value(ctx, *span)?;
                    add_capture(self, &mut captures, &mut materialized, "this", true, this);
                }
                ast::LambdaCapture::Named {
                    name,
                    by_ref,
                    initializer,
                    span,
                } => {
                    // an unused capture is elided
                    if initializer.is_none() && !used.contains(name.as_str()) {
                        continue;
                    }
                    let value = match initializer {
                        Some(init) => self.compile_expression(ctx, init)?,
                        None => self.capture_value(ctx, name, *span)?,
                    };
                    add_capture(self, &mut captures, &mut materialized, name, *by_ref, value);
                }
            }
        }

        if default_by_value || default_by_ref {
            let frame = ctx.frame.borrow();
            let locals: Vec<(String, usize, Type)> = frame
                .locals
                .iter()
                .map(|l| (l.name.clone(), l.index, l.ty))
                .collect();
            drop(frame);

            for (name, index, ty) in locals {
                if name == "this" || name.is_empty() {
                    continue;
                }
                if !used.contains(name.as_str()) || param_names.contains(&name.as_str()) {
                    continue;
                }
                let value = program::Expression::StackValue { index, ty };
                add_capture(
                    self,
                    &mut captures,
                    &mut materialized,
                    &name,
                    default_by_ref,
                    value,
                );
            }
        }

        if ctx.command_mode && !captures.is_empty() {
            return Err(CompilationFailure::at(
                CompileError::LambdaMustBeCaptureless,
                span,
            ));
        }

        // closure type and its call operator
        let closure_id = self.new_closure_type(captures.clone());
        let closure_type = Type::closure(closure_id);

        let mut params =
            vec![Type::reference(closure_type).with_flag(TypeFlag::ThisParameter)];
        for p in &lambda.params {
            params.push(self.resolve_type(&p.ty, &ctx.scope)?);
        }

        // the body compiles in a scope where only captures and parameters
        // are visible
        let lambda_scope = ctx
            .scope
            .child(ScopeFrame::Lambda(Rc::new(LambdaFrame {
                captures: captures.clone(),
            })));

        let mut body_ctx = FunctionContext::new(lambda_scope);
        body_ctx.this_class = None;
        body_ctx.deduce_return = true;
        body_ctx.command_mode = ctx.command_mode;
        body_ctx.add_local("", params[0]);
        for (i, p) in lambda.params.iter().enumerate() {
            body_ctx.add_local(p.name.clone(), params[i + 1]);
        }

        body_ctx.blocks.push(super::function_compiler::Block {
            locals_start: body_ctx.frame.borrow().locals.len(),
            is_loop: false,
        });

        let mut statements = vec![];
        for stmt in &lambda.body {
            statements.push(self.compile_statement(&mut body_ctx, stmt)?);
        }

        let return_type = deduce_return_type(&body_ctx.deduced_returns)
            .ok_or_else(|| {
                CompilationFailure::at(CompileError::CannotDeduceLambdaReturnType, span)
            })?;

        let mut call = Function::new(
            FunctionName::Operator(crate::operators::OperatorKind::FunctionCall),
            Prototype::new(return_type, params),
        );
        call.body = FunctionBody::Program(Rc::new(program::Statement::Compound(statements)));
        let call_id = self.symbols_mut().add_function(call);
        self.symbols_mut().closure_mut(closure_id).call = Some(call_id);

        Ok(program::Expression::LambdaExpression {
            closure_type,
            captures: materialized,
        })
    }

    fn capture_value(
        &mut self,
        ctx: &mut FunctionContext,
        name: &str,
        span: Span,
    ) -> CResult<program::Expression> {
        match name_lookup::resolve_name(name, &ctx.scope, self.symbols()) {
            NameLookup::Local { index } => {
                let ty = ctx.frame.borrow().locals[index].ty;
                Ok(program::Expression::StackValue { index, ty })
            }
            NameLookup::Capture { index } => {
                let frame = ctx.scope.lambda_frame().expect("capture without lambda");
                let ty = frame.captures[index].ty;
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
            _ => Err(CompilationFailure::at(
                CompileError::UnknownCaptureName(name.to_string()),
                span,
            )),
        }
    }

    fn this_capture_value(
        &mut self,
        ctx: &mut FunctionContext,
        span: Span,
    ) -> CResult<program::Expression> {
        if ctx.this_class.is_none() {
            return Err(CompilationFailure::at(CompileError::CannotCaptureThis, span));
        }
        let frame = ctx.frame.borrow();
        match frame.locals.first() {
            Some(local) if local.name == "this" => Ok(program::Expression::StackValue {
                index: 0,
                ty: local.ty,
            }),
            _ => Err(CompilationFailure::at(CompileError::CannotCaptureThis, span)),
        }
    }
}

fn deduce_return_type(returns: &[Type]) -> Option<Type> {
    let mut it = returns.iter();
    let Some(&first) = it.next() else {
        return Some(Type::VOID);
    };
    for &t in it {
        if t != first {
            return None;
        }
    }
    Some(first)
}

/// Names referenced anywhere in the lambda body; used to elide unused
/// captures and to materialize default captures.
fn used_names(statements: &[ast::Statement]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for stmt in statements {
        collect_statement(stmt, &mut names);
    }
    names
}

fn collect_statement(stmt: &ast::Statement, names: &mut BTreeSet<String>) {
    match stmt {
        ast::Statement::Null { .. }
        | ast::Statement::Break { .. }
        | ast::Statement::Continue { .. } => {}
        ast::Statement::Expression(e) => collect_expression(e, names),
        ast::Statement::Compound(block) => {
            for s in &block.statements {
                collect_statement(s, names);
            }
        }
        ast::Statement::If {
            condition,
            body,
            else_clause,
            ..
        } => {
            collect_expression(condition, names);
            collect_statement(body, names);
            if let Some(e) = else_clause {
                collect_statement(e, names);
            }
        }
        ast::Statement::While {
            condition, body, ..
        } => {
            collect_expression(condition, names);
            collect_statement(body, names);
        }
        ast::Statement::For {
            init,
            condition,
            loop_increment,
            body,
            ..
        } => {
            if let Some(s) = init {
                collect_statement(s, names);
            }
            if let Some(e) = condition {
                collect_expression(e, names);
            }
            if let Some(e) = loop_increment {
                collect_expression(e, names);
            }
            collect_statement(body, names);
        }
        ast::Statement::Return { value, .. } => {
            if let Some(e) = value {
                collect_expression(e, names);
            }
        }
        ast::Statement::Declaration(decl) => {
            if let ast::Declaration::Variable(v) = decl.as_ref() {
                match &v.initializer {
                    Some(ast::VariableInit::Assignment(e)) => collect_expression(e, names),
                    Some(ast::VariableInit::Constructor(es))
                    | Some(ast::VariableInit::Brace(es)) => {
                        for e in es {
                            collect_expression(e, names);
                        }
                    }
                    None => {}
                }
            }
        }
    }
}

fn collect_expression(expr: &ast::Expression, names: &mut BTreeSet<String>) {
    match expr {
        ast::Expression::Literal(_) => {}
        ast::Expression::Identifier(id) => {
            if let Some(name) = id.plain_name() {
                names.insert(name.to_string());
            }
        }
        ast::Expression::Operation { lhs, rhs, .. } => {
            collect_expression(lhs, names);
            if let Some(rhs) = rhs {
                collect_expression(rhs, names);
            }
        }
        ast::Expression::Conditional {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            collect_expression(condition, names);
            collect_expression(then_expr, names);
            collect_expression(else_expr, names);
        }
        ast::Expression::Call {
            callee, arguments, ..
        } => {
            collect_expression(callee, names);
            for a in arguments {
                collect_expression(a, names);
            }
        }
        ast::Expression::Subscript { object, index, .. } => {
            collect_expression(object, names);
            collect_expression(index, names);
        }
        ast::Expression::Member { object, .. } => collect_expression(object, names),
        ast::Expression::BraceConstruction { arguments, .. } => {
            for a in arguments {
                collect_expression(a, names);
            }
        }
        ast::Expression::ArrayExpression { elements, .. }
        | ast::Expression::ListExpression { elements, .. } => {
            for e in elements {
                collect_expression(e, names);
            }
        }
        ast::Expression::Lambda(lambda) => {
            for capture in &lambda.captures {
                if let ast::LambdaCapture::Named {
                    name, initializer, ..
                } = capture
                {
                    names.insert(name.clone());
                    if let Some(e) = initializer {
                        collect_expression(e, names);
                    }
                }
            }
            for stmt in &lambda.body {
                collect_statement(stmt, names);
            }
        }
    }
}
