//! Type resolution and class-template instance requests.
//!
//! `resolve_type` turns a parsed qualified type into a canonical [`Type`]
//! tag, interning function types and instantiating class templates on
//! demand. Requesting an instance twice with equal canonical arguments
//! returns the same class.

use std::rc::Rc;

use crate::ast;
use crate::name_lookup::{self, NameLookup, NameLookupOptions};
use crate::scope::{Scope, ScopeFrame, TemplateArgumentFrame};
use crate::symbols::{
    Capture, Class, ClosureType, Function, FunctionName, NativeClassBackend, Symbol,
    TemplateArgument, TemplateDefinition, TemplateId, TemplateInstance, TemplateParameter,
    TemplateParameterKind,
};
use crate::template_engine::{self, TemplatePatternMatching, TemplatePartialOrdering};
use crate::types::{ClassId, Prototype, Type, TypeFlag};

use super::errors::{CResult, CompilationFailure, CompileError};
use super::Compiler;

impl Compiler<'_> {
    pub(crate) fn resolve_type(
        &mut self,
        qt: &ast::QualifiedType,
        scope: &Scope,
    ) -> CResult<Type> {
        let base = match &qt.kind {
            ast::TypeNameKind::Auto => Type::AUTO,
            ast::TypeNameKind::Function(ft) => {
                let return_type = self.resolve_type(&ft.return_type, scope)?;
                let mut params = vec![];
                for p in &ft.params {
                    params.push(self.resolve_type(p, scope)?);
                }
                let id = self
                    .symbols_mut()
                    .intern_function_type(Prototype::new(return_type, params));
                Type::function(id)
            }
            ast::TypeNameKind::Named(id) => self.resolve_type_name(id, scope)?,
        };

        let mut t = base;
        if qt.is_const {
            t = t.with_const();
        }
        match qt.ref_kind {
            ast::RefKind::None => {}
            ast::RefKind::Ref => t = t.with_flag(TypeFlag::Reference),
            ast::RefKind::RefRef => t = t.with_flag(TypeFlag::ForwardReference),
        }
        Ok(t)
    }

    pub(crate) fn resolve_type_name(
        &mut self,
        id: &ast::Identifier,
        scope: &Scope,
    ) -> CResult<Type> {
        let lookup = name_lookup::resolve(
            id,
            scope,
            self.symbols(),
            NameLookupOptions::default(),
        );

        match lookup {
            NameLookup::Type(t) => Ok(t),
            NameLookup::Template(tid) => match id.rightmost() {
                ast::Identifier::Template { arguments, .. } => {
                    let args = self.resolve_template_args(arguments, scope)?;
                    let class = self.instantiate_class_template(tid, args, id.span())?;
                    Ok(Type::object(class))
                }
                _ => Err(CompilationFailure::at(
                    CompileError::InvalidTypeName(id.to_string()),
                    id.span(),
                )),
            },
            _ => Err(CompilationFailure::at(
                CompileError::InvalidTypeName(id.to_string()),
                id.span(),
            )),
        }
    }

    /// Canonicalizes an AST template argument list.
    pub(crate) fn resolve_template_args(
        &mut self,
        args: &[ast::TemplateArg],
        scope: &Scope,
    ) -> CResult<Vec<TemplateArgument>> {
        let mut out = vec![];
        for arg in args {
            out.push(self.resolve_template_arg(arg, scope)?);
        }
        Ok(out)
    }

    fn resolve_template_arg(
        &mut self,
        arg: &ast::TemplateArg,
        scope: &Scope,
    ) -> CResult<TemplateArgument> {
        match arg {
            ast::TemplateArg::Type(qt) => {
                let t = self.resolve_type(qt, scope)?;
                Ok(TemplateArgument::Type(t))
            }
            ast::TemplateArg::Expr(expr) => match template_engine::eval_const_literal(expr) {
                Some(value) => Ok(value),
                None => Err(CompilationFailure::at(
                    CompileError::NonConstExprTemplateArgument,
                    expr.span(),
                )),
            },
        }
    }

    /// Applies defaults for missing trailing arguments and checks each
    /// argument against its parameter's kind.
    pub(crate) fn complete_template_arguments(
        &mut self,
        tid: TemplateId,
        mut args: Vec<TemplateArgument>,
        span: crate::lexer::Span,
    ) -> CResult<Vec<TemplateArgument>> {
        let parameters = self.symbols().template(tid).parameters.clone();
        let enclosing = self.symbols().template(tid).enclosing;

        // surplus arguments collapse into a trailing pack
        if let Some(last) = parameters.last() {
            if last.is_pack && args.len() >= parameters.len() {
                let surplus: Vec<_> = args.split_off(parameters.len() - 1);
                args.push(TemplateArgument::Pack(surplus));
            }
        }

        if args.len() > parameters.len() {
            return Err(CompilationFailure::at(CompileError::InvalidTemplateArgument, span));
        }

        while args.len() < parameters.len() {
            let param = &parameters[args.len()];
            if param.is_pack {
                args.push(TemplateArgument::Pack(vec![]));
                continue;
            }

            let Some(default) = param.default_value.clone() else {
                return Err(CompilationFailure::at(
                    CompileError::MissingNonDefaultedTemplateParameter(param.name.clone()),
                    span,
                ));
            };

            // defaults are evaluated in the template's parameter scope,
            // with the earlier arguments already bound
            let scope = self
                .scope_for_symbol(enclosing)
                .child(ScopeFrame::TemplateArguments(Rc::new(TemplateArgumentFrame {
                    parameters: parameters[..args.len()].to_vec(),
                    arguments: args.clone(),
                })));
            args.push(self.resolve_template_arg(&default, &scope)?);
        }

        for (param, arg) in parameters.iter().zip(&args) {
            self.check_template_argument(param, arg, span)?;
        }

        Ok(args)
    }

    fn check_template_argument(
        &self,
        param: &TemplateParameter,
        arg: &TemplateArgument,
        span: crate::lexer::Span,
    ) -> CResult<()> {
        if param.is_pack {
            return Ok(());
        }
        match (&param.kind, arg) {
            (TemplateParameterKind::Type, TemplateArgument::Type(t)) => {
                if t.is_enum_type() {
                    Err(CompilationFailure::at(
                        CompileError::TemplateArgumentCannotBeAnEnumeration,
                        span,
                    ))
                } else {
                    Ok(())
                }
            }
            (TemplateParameterKind::Type, _) => Err(CompilationFailure::at(
                CompileError::TemplateArgumentMustBeAType,
                span,
            )),
            (TemplateParameterKind::NonType(t), TemplateArgument::Integer(_))
                if *t == Type::INT =>
            {
                Ok(())
            }
            (TemplateParameterKind::NonType(t), TemplateArgument::Bool(_))
                if *t == Type::BOOLEAN =>
            {
                Ok(())
            }
            _ => Err(CompilationFailure::at(
                CompileError::InvalidTemplateArgument,
                span,
            )),
        }
    }

    /// Rebuilds the lexical scope a symbol's declarations resolve in.
    pub(crate) fn scope_for_symbol(&self, symbol: Symbol) -> Scope {
        template_engine::symbol_scope(self.symbols(), symbol)
    }

    /// Returns the cached instance or builds a new one.
    pub(crate) fn instantiate_class_template(
        &mut self,
        tid: TemplateId,
        args: Vec<TemplateArgument>,
        span: crate::lexer::Span,
    ) -> CResult<ClassId> {
        let args = self.complete_template_arguments(tid, args, span)?;

        if let Some(instance) = self.symbols().template(tid).get_instance(&args) {
            return match instance {
                TemplateInstance::Class(c) => Ok(c),
                TemplateInstance::Function(_) => Err(CompilationFailure::at(
                    CompileError::InvalidTemplateArgument,
                    span,
                )),
            };
        }

        log::debug!(
            "instantiating class template '{}'",
            self.symbols().template(tid).name
        );

        let definition = self.symbols().template(tid).definition.clone();
        match definition {
            TemplateDefinition::NativeClass(NativeClassBackend::Array) => {
                self.instantiate_array(tid, args, span)
            }
            TemplateDefinition::NativeClass(NativeClassBackend::InitializerList) => {
                self.instantiate_initializer_list(tid, args, span)
            }
            TemplateDefinition::SourceClass(primary) => {
                self.instantiate_source_class(tid, args, primary, span)
            }
            _ => Err(CompilationFailure::at(
                CompileError::TemplateInstantiationFailure(
                    self.symbols().template(tid).name.clone(),
                ),
                span,
            )),
        }
    }

    fn instance_element_type(
        args: &[TemplateArgument],
        span: crate::lexer::Span,
    ) -> CResult<Type> {
        match args.first() {
            Some(TemplateArgument::Type(t)) => Ok(*t),
            _ => Err(CompilationFailure::at(
                CompileError::TemplateArgumentMustBeAType,
                span,
            )),
        }
    }

    /// `Array<T>`: default/copy construction, subscript, `size`,
    /// `resize`, copy assignment.
    fn instantiate_array(
        &mut self,
        tid: TemplateId,
        args: Vec<TemplateArgument>,
        span: crate::lexer::Span,
    ) -> CResult<ClassId> {
        let element = Self::instance_element_type(&args, span)?;
        let enclosing = self.symbols().template(tid).enclosing;
        let template_name = self.symbols().template(tid).name.clone();

        let mut class = Class::new(template_name, enclosing);
        class.instance_of = Some(tid);
        class.template_arguments = args.clone();
        let class_id = self.symbols_mut().add_class(class);
        self.symbols_mut()
            .template_mut(tid)
            .set_instance(args, TemplateInstance::Class(class_id));

        let this = Type::reference(Type::object(class_id)).with_flag(TypeFlag::ThisParameter);
        let const_this = Type::const_reference(Type::object(class_id))
            .with_flag(TypeFlag::ThisParameter);
        let class_type = Type::object(class_id);

        let default_ctor =
            self.add_native_method(class_id, FunctionName::Constructor, Type::VOID, vec![this]);
        let copy_ctor = self.add_native_method(
            class_id,
            FunctionName::Constructor,
            Type::VOID,
            vec![this, Type::const_reference(class_type)],
        );
        let dtor =
            self.add_native_method(class_id, FunctionName::Destructor, Type::VOID, vec![this]);
        let subscript = self.add_native_method(
            class_id,
            FunctionName::Operator(crate::operators::OperatorKind::Subscript),
            Type::reference(element),
            vec![this, Type::INT],
        );
        let const_subscript = self.add_native_method(
            class_id,
            FunctionName::Operator(crate::operators::OperatorKind::Subscript),
            Type::const_reference(element),
            vec![const_this, Type::INT],
        );
        let assign = self.add_native_method(
            class_id,
            FunctionName::Operator(crate::operators::OperatorKind::Assignment),
            Type::reference(class_type),
            vec![this, Type::const_reference(class_type)],
        );
        let size = self.add_native_method(
            class_id,
            FunctionName::Name("size".into()),
            Type::INT,
            vec![const_this],
        );
        self.symbols_mut().function_mut(size).flags.set_const();
        self.symbols_mut()
            .function_mut(const_subscript)
            .flags
            .set_const();
        let resize = self.add_native_method(
            class_id,
            FunctionName::Name("resize".into()),
            Type::VOID,
            vec![this, Type::INT],
        );

        let class = self.symbols_mut().class_mut(class_id);
        class.constructors.push(default_ctor);
        class.constructors.push(copy_ctor);
        class.destructor = Some(dtor);
        class.operators.push(subscript);
        class.operators.push(const_subscript);
        class.operators.push(assign);
        class.add_method("size", size);
        class.add_method("resize", resize);

        Ok(class_id)
    }

    /// `InitializerList<T>`: copy construction, `size`, `begin`/`end`
    /// returning an iterator with `get`, pre-increment/decrement and
    /// equality.
    fn instantiate_initializer_list(
        &mut self,
        tid: TemplateId,
        args: Vec<TemplateArgument>,
        span: crate::lexer::Span,
    ) -> CResult<ClassId> {
        let element = Self::instance_element_type(&args, span)?;
        let enclosing = self.symbols().template(tid).enclosing;
        let template_name = self.symbols().template(tid).name.clone();

        let mut class = Class::new(template_name, enclosing);
        class.instance_of = Some(tid);
        class.template_arguments = args.clone();
        let class_id = self.symbols_mut().add_class(class);
        self.symbols_mut()
            .template_mut(tid)
            .set_instance(args, TemplateInstance::Class(class_id));

        let class_type = Type::object(class_id);
        let this = Type::reference(class_type).with_flag(TypeFlag::ThisParameter);
        let const_this = Type::const_reference(class_type).with_flag(TypeFlag::ThisParameter);

        // the nested iterator class
        let iterator = Class::new("iterator", Symbol::Class(class_id));
        let iterator_id = self.symbols_mut().add_class(iterator);
        let iter_type = Type::object(iterator_id);
        let iter_this = Type::reference(iter_type).with_flag(TypeFlag::ThisParameter);
        let iter_const_this = Type::const_reference(iter_type).with_flag(TypeFlag::ThisParameter);

        let iter_default =
            self.add_native_method(iterator_id, FunctionName::Constructor, Type::VOID, vec![iter_this]);
        let iter_copy = self.add_native_method(
            iterator_id,
            FunctionName::Constructor,
            Type::VOID,
            vec![iter_this, Type::const_reference(iter_type)],
        );
        let iter_get = self.add_native_method(
            iterator_id,
            FunctionName::Name("get".into()),
            Type::const_reference(element),
            vec![iter_const_this],
        );
        let iter_inc = self.add_native_method(
            iterator_id,
            FunctionName::Operator(crate::operators::OperatorKind::PreIncrement),
            Type::reference(iter_type),
            vec![iter_this],
        );
        let iter_dec = self.add_native_method(
            iterator_id,
            FunctionName::Operator(crate::operators::OperatorKind::PreDecrement),
            Type::reference(iter_type),
            vec![iter_this],
        );
        let iter_eq = self.add_native_method(
            iterator_id,
            FunctionName::Operator(crate::operators::OperatorKind::Equality),
            Type::BOOLEAN,
            vec![iter_const_this, Type::const_reference(iter_type)],
        );
        let iter_neq = self.add_native_method(
            iterator_id,
            FunctionName::Operator(crate::operators::OperatorKind::Inequality),
            Type::BOOLEAN,
            vec![iter_const_this, Type::const_reference(iter_type)],
        );

        {
            let iter_class = self.symbols_mut().class_mut(iterator_id);
            iter_class.constructors.push(iter_default);
            iter_class.constructors.push(iter_copy);
            iter_class.add_method("get", iter_get);
            iter_class.operators.push(iter_inc);
            iter_class.operators.push(iter_dec);
            iter_class.operators.push(iter_eq);
            iter_class.operators.push(iter_neq);
        }

        let copy_ctor = self.add_native_method(
            class_id,
            FunctionName::Constructor,
            Type::VOID,
            vec![this, Type::const_reference(class_type)],
        );
        let size = self.add_native_method(
            class_id,
            FunctionName::Name("size".into()),
            Type::INT,
            vec![const_this],
        );
        let begin = self.add_native_method(
            class_id,
            FunctionName::Name("begin".into()),
            iter_type,
            vec![const_this],
        );
        let end = self.add_native_method(
            class_id,
            FunctionName::Name("end".into()),
            iter_type,
            vec![const_this],
        );

        for f in [size, begin, end, iter_get, iter_eq, iter_neq] {
            self.symbols_mut().function_mut(f).flags.set_const();
        }

        let class = self.symbols_mut().class_mut(class_id);
        class.constructors.push(copy_ctor);
        class.add_method("size", size);
        class.add_method("begin", begin);
        class.add_method("end", end);

        Ok(class_id)
    }

    fn add_native_method(
        &mut self,
        class: ClassId,
        name: FunctionName,
        return_type: Type,
        params: Vec<Type>,
    ) -> crate::symbols::FunctionId {
        let label = format!(
            "{}::{}",
            self.symbols().class(class).name,
            name
        );
        let callback = self.engine.register_native_callback(&label);

        let mut f = Function::new(name, Prototype::new(return_type, params));
        f.owner = Some(Symbol::Class(class));
        f.body = crate::symbols::FunctionBody::Native(callback);
        self.symbols_mut().add_function(f)
    }

    /// Source class template: select the best-matching partial
    /// specialization, then compile the chosen definition in a scope
    /// carrying the argument bindings.
    fn instantiate_source_class(
        &mut self,
        tid: TemplateId,
        args: Vec<TemplateArgument>,
        primary: Rc<ast::ClassDecl>,
        span: crate::lexer::Span,
    ) -> CResult<ClassId> {
        let enclosing = self.symbols().template(tid).enclosing;
        let base_scope = self.scope_for_symbol(enclosing);

        // pick a partial specialization if one matches
        let specializations = self.symbols().template(tid).specializations.clone();
        let mut selected: Option<(usize, Vec<TemplateArgument>)> = None;
        for (i, spec) in specializations.iter().enumerate() {
            let param_scope = base_scope.child(ScopeFrame::TemplateParameters(Rc::new(
                crate::scope::TemplateParameterFrame {
                    names: spec.parameters.iter().map(|p| p.name.clone()).collect(),
                },
            )));
            let mut matcher = TemplatePatternMatching::new(self.symbols(), param_scope, 0);
            if !matcher.match_template_args(&spec.arguments, &args) {
                continue;
            }
            let Some(deduced) = matcher.deduction.agglomerate(&spec.parameters) else {
                continue;
            };
            let deduced: Option<Vec<TemplateArgument>> = deduced.into_iter().collect();
            let Some(deduced) = deduced else {
                continue;
            };

            match &selected {
                None => selected = Some((i, deduced)),
                Some((j, _)) => {
                    let order = crate::template_engine::compare_argument_lists(
                        self.symbols(),
                        &base_scope,
                        &specializations[i].arguments,
                        &base_scope,
                        &specializations[*j].arguments,
                    );
                    if order == TemplatePartialOrdering::FirstIsMoreSpecialized {
                        selected = Some((i, deduced));
                    }
                }
            }
        }

        let (decl, parameters, instance_args) = match selected {
            Some((i, deduced)) => (
                specializations[i].decl.clone(),
                specializations[i].parameters.clone(),
                deduced,
            ),
            None => (
                primary,
                self.symbols().template(tid).parameters.clone(),
                args.clone(),
            ),
        };

        let scope = base_scope.child(ScopeFrame::TemplateArguments(Rc::new(
            TemplateArgumentFrame {
                parameters,
                arguments: instance_args,
            },
        )));

        let template_name = self.symbols().template(tid).name.clone();
        let mut class = Class::new(template_name, enclosing);
        class.instance_of = Some(tid);
        class.template_arguments = args.clone();
        class.is_final = decl.is_final;

        if let Some(base_id) = &decl.base {
            let base_type = self.resolve_type_name(base_id, &scope)?;
            let Some(base_class) = base_type.class_id() else {
                return Err(CompilationFailure::at(
                    CompileError::InvalidBaseClass(base_id.to_string()),
                    span,
                ));
            };
            class.base = Some(base_class);
            class.vtable = self.symbols().class(base_class).vtable.clone();
        }

        let class_id = self.symbols_mut().add_class(class);
        self.symbols_mut()
            .template_mut(tid)
            .set_instance(args, TemplateInstance::Class(class_id));

        let class_scope = scope.child(ScopeFrame::Class(class_id));
        self.process_class_members(class_id, &decl.members, &class_scope)?;
        self.generate_special_members(class_id, span)?;

        Ok(class_id)
    }

    /// Creates a fresh closure type for a lambda.
    pub(crate) fn new_closure_type(&mut self, captures: Vec<Capture>) -> crate::types::ClosureId {
        self.symbols_mut().add_closure(ClosureType::new(captures))
    }
}
