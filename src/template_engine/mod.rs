//! Template machinery: argument deduction, pattern matching and partial
//! ordering.
//!
//! Deduction walks a templated signature pattern against concrete input
//! types, recording `(parameter index -> argument)` bindings; the
//! bindings are then agglomerated — conflicting deductions for the same
//! parameter make the whole deduction fail silently (substitution failure
//! is not an error). Instantiation itself is driven by the compiler.

mod partial_ordering;

pub use partial_ordering::*;

use std::rc::Rc;

use crate::ast;
use crate::name_lookup::{self, NameLookup, NameLookupOptions};
use crate::scope::{Scope, ScopeFrame, TemplateParameterFrame};
use crate::symbols::{Symbol, SymbolTable, Template, TemplateArgument, TemplateParameter};
use crate::types::{Type, TypeFlag};

/// Rebuilds the lexical scope a symbol's declarations resolve in: its
/// chain of enclosing namespaces and classes, outermost first.
pub fn symbol_scope(symbols: &SymbolTable, symbol: Symbol) -> Scope {
    let mut chain = vec![];
    let mut current = Some(symbol);
    while let Some(sym) = current {
        chain.push(sym);
        current = match sym {
            Symbol::Namespace(ns) => symbols.namespace(ns).enclosing.map(Symbol::Namespace),
            Symbol::Class(c) => Some(symbols.class(c).enclosing),
            Symbol::Enum(e) => Some(symbols.enumeration(e).enclosing),
            Symbol::Template(t) => Some(symbols.template(t).enclosing),
            Symbol::Function(_) => None,
        };
    }

    let mut scope = Scope::default();
    for sym in chain.into_iter().rev() {
        let frame = match sym {
            Symbol::Namespace(ns) => ScopeFrame::Namespace(ns),
            Symbol::Class(c) => ScopeFrame::Class(c),
            Symbol::Enum(e) => ScopeFrame::Enum(e),
            _ => continue,
        };
        scope = scope.child(frame);
    }
    scope
}

/// The scope a template's own declarations resolve in: the enclosing
/// chain plus a frame binding the parameter names.
pub fn parameter_scope(symbols: &SymbolTable, template: &Template) -> Scope {
    symbol_scope(symbols, template.enclosing).child(ScopeFrame::TemplateParameters(Rc::new(
        TemplateParameterFrame {
            names: template.parameters.iter().map(|p| p.name.clone()).collect(),
        },
    )))
}

/// Accumulates deductions for one template's parameters.
#[derive(Debug, Default)]
pub struct TemplateArgumentDeduction {
    recorded: Vec<(usize, TemplateArgument)>,
    failed: bool,
}

impl TemplateArgumentDeduction {
    pub fn record(&mut self, param_index: usize, value: TemplateArgument) {
        self.recorded.push((param_index, value));
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Merges the recorded deductions: multiple deductions for the same
    /// parameter must agree, except for packs which collect every value
    /// in order.
    pub fn agglomerate(
        &self,
        parameters: &[TemplateParameter],
    ) -> Option<Vec<Option<TemplateArgument>>> {
        if self.failed {
            return None;
        }

        let mut result: Vec<Option<TemplateArgument>> = vec![None; parameters.len()];

        for (index, value) in &self.recorded {
            let Some(slot) = result.get_mut(*index) else {
                return None;
            };
            let is_pack = parameters[*index].is_pack;

            match slot {
                None => {
                    *slot = if is_pack {
                        Some(TemplateArgument::Pack(vec![value.clone()]))
                    } else {
                        Some(value.clone())
                    };
                }
                Some(TemplateArgument::Pack(items)) if is_pack => {
                    items.push(value.clone());
                }
                Some(existing) => {
                    if existing != value {
                        return None;
                    }
                }
            }
        }

        Some(result)
    }
}

/// Matches signature patterns against input types and records deductions.
///
/// `fixed` is the number of leading parameters whose value is already
/// known (explicit arguments); deductions for them are not recorded.
pub struct TemplatePatternMatching<'a> {
    pub symbols: &'a SymbolTable,
    pub param_scope: Scope,
    pub fixed: usize,
    pub deduction: TemplateArgumentDeduction,
}

impl<'a> TemplatePatternMatching<'a> {
    pub fn new(symbols: &'a SymbolTable, param_scope: Scope, fixed: usize) -> Self {
        Self {
            symbols,
            param_scope,
            fixed,
            deduction: TemplateArgumentDeduction::default(),
        }
    }

    fn record(&mut self, param_index: usize, value: TemplateArgument) {
        if param_index < self.fixed {
            // already known from an explicit argument
            return;
        }
        self.deduction.record(param_index, value);
    }

    /// Deduces from a function signature pattern applied to input
    /// argument types.
    pub fn deduce_from_signature(
        &mut self,
        params: &[ast::FunctionParameter],
        inputs: &[Type],
    ) {
        let n = params.len().min(inputs.len());
        for i in 0..n {
            self.deduce_param(&params[i].ty, inputs[i]);
        }
    }

    fn deduce_param(&mut self, pattern: &ast::QualifiedType, input: Type) {
        if let ast::TypeNameKind::Function(ft) = &pattern.kind {
            if !self.match_function_type(ft, input.base_type()) {
                self.deduction.fail();
            }
            return;
        }

        // strip the pattern's own qualifiers and match against the
        // decayed input
        let mut stripped = pattern.clone();
        stripped.is_const = false;
        stripped.ref_kind = ast::RefKind::None;

        let mut target = input.base_type();
        if pattern.ref_kind == ast::RefKind::RefRef {
            target = target.with_flag(TypeFlag::ForwardReference);
        }

        if !self.match_type(&stripped, target) {
            self.deduction.fail();
        }
    }

    /// Core pattern/type matching walk.
    pub fn match_type(&mut self, pattern: &ast::QualifiedType, input: Type) -> bool {
        if pattern.is_const && !input.is_const() {
            return false;
        }
        if pattern.ref_kind == ast::RefKind::Ref && !input.is_reference() {
            return false;
        }
        if pattern.ref_kind == ast::RefKind::RefRef && !input.is_forward_reference() {
            return false;
        }

        match &pattern.kind {
            ast::TypeNameKind::Function(ft) => self.match_function_type(ft, input),
            ast::TypeNameKind::Auto => false,
            ast::TypeNameKind::Named(id) => self.match_named(pattern, id, input),
        }
    }

    fn match_named(
        &mut self,
        pattern: &ast::QualifiedType,
        id: &ast::Identifier,
        input: Type,
    ) -> bool {
        match id {
            ast::Identifier::Template {
                name, arguments, ..
            } => {
                let lookup = name_lookup::resolve_name(name, &self.param_scope, self.symbols);
                let NameLookup::Template(tid) = lookup else {
                    return false;
                };

                let Some(class) = self.symbols.get_class(input) else {
                    return false;
                };
                if class.instance_of != Some(tid) {
                    return false;
                }

                let instance_args = class.template_arguments.clone();
                self.match_template_args(arguments, &instance_args)
            }
            ast::Identifier::Simple { name, .. } => {
                let lookup = name_lookup::resolve(
                    id,
                    &self.param_scope,
                    self.symbols,
                    NameLookupOptions::default(),
                );
                match lookup {
                    NameLookup::TemplateParameter { index } => {
                        let mut t = input;
                        if pattern.is_const {
                            t = t.without_const();
                        }
                        if pattern.ref_kind == ast::RefKind::Ref {
                            t = t.without_flag(TypeFlag::Reference);
                        }
                        self.record(index, TemplateArgument::Type(t));
                        true
                    }
                    NameLookup::Type(t) => t == input,
                    _ => {
                        let _ = name;
                        false
                    }
                }
            }
            ast::Identifier::Scoped { .. } => {
                // the non-parameter prefix resolves in the parameter scope
                let lookup = name_lookup::resolve(
                    id,
                    &self.param_scope,
                    self.symbols,
                    NameLookupOptions::default(),
                );
                matches!(lookup, NameLookup::Type(t) if t == input)
            }
            _ => false,
        }
    }

    fn match_function_type(&mut self, pattern: &ast::FunctionTypeName, input: Type) -> bool {
        let Some(ft) = self.symbols.get_function_type(input) else {
            return false;
        };
        let prototype = ft.prototype.clone();

        if !self.match_type(&pattern.return_type, prototype.return_type) {
            return false;
        }
        if pattern.params.len() != prototype.count() {
            return false;
        }

        for (i, param) in pattern.params.iter().enumerate() {
            if !self.match_type(param, prototype.at(i)) {
                return false;
            }
        }

        true
    }

    /// Matches an AST template-argument pattern list against canonical
    /// arguments, e.g. a partial specialization's `<T, int>` against the
    /// requested `<double, int>`.
    pub fn match_template_args(
        &mut self,
        pattern: &[ast::TemplateArg],
        inputs: &[TemplateArgument],
    ) -> bool {
        let n = pattern.len().min(inputs.len());
        for i in 0..n {
            if !self.match_targ(&pattern[i], &inputs[i]) {
                return false;
            }
        }
        true
    }

    fn match_targ(&mut self, pattern: &ast::TemplateArg, input: &TemplateArgument) -> bool {
        match pattern {
            ast::TemplateArg::Type(qt) => match input {
                TemplateArgument::Type(t) => self.match_type(qt, *t),
                other => {
                    // a bare unqualified name can still deduce a non-type
                    // parameter
                    if qt.is_const || qt.ref_kind != ast::RefKind::None {
                        return false;
                    }
                    let ast::TypeNameKind::Named(id) = &qt.kind else {
                        return false;
                    };
                    let lookup = name_lookup::resolve(
                        id,
                        &self.param_scope,
                        self.symbols,
                        NameLookupOptions::default(),
                    );
                    match lookup {
                        NameLookup::TemplateParameter { index } => {
                            self.record(index, other.clone());
                            true
                        }
                        NameLookup::Variable(v) => match (other, v) {
                            (TemplateArgument::Integer(n), crate::value::Value::Int(m)) => {
                                *n == m
                            }
                            (TemplateArgument::Bool(b), crate::value::Value::Bool(c)) => *b == c,
                            _ => false,
                        },
                        _ => false,
                    }
                }
            },
            ast::TemplateArg::Expr(expr) => match eval_const_literal(expr) {
                Some(value) => &value == input,
                None => false,
            },
        }
    }
}

/// Evaluates the constant expressions allowed in template argument
/// patterns: bool and integer literals (optionally negated).
pub fn eval_const_literal(expr: &ast::Expression) -> Option<TemplateArgument> {
    match expr {
        ast::Expression::Literal(lit) => match lit.kind {
            ast::LiteralKind::True => Some(TemplateArgument::Bool(true)),
            ast::LiteralKind::False => Some(TemplateArgument::Bool(false)),
            ast::LiteralKind::Integer => {
                lit.text.parse::<i64>().ok().map(TemplateArgument::Integer)
            }
            ast::LiteralKind::Hexadecimal => i64::from_str_radix(&lit.text[2..], 16)
                .ok()
                .map(TemplateArgument::Integer),
            ast::LiteralKind::Binary => i64::from_str_radix(&lit.text[2..], 2)
                .ok()
                .map(TemplateArgument::Integer),
            ast::LiteralKind::Octal => {
                let digits = lit.text.trim_start_matches('0');
                if digits.is_empty() {
                    Some(TemplateArgument::Integer(0))
                } else {
                    i64::from_str_radix(digits, 8)
                        .ok()
                        .map(TemplateArgument::Integer)
                }
            }
            _ => None,
        },
        ast::Expression::Operation {
            op: crate::operators::OperatorKind::UnaryMinus,
            lhs,
            rhs: None,
            ..
        } => match eval_const_literal(lhs)? {
            TemplateArgument::Integer(n) => Some(TemplateArgument::Integer(-n)),
            _ => None,
        },
        _ => None,
    }
}
