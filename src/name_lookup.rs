//! Name resolution.
//!
//! Resolves a (possibly qualified, possibly templated) identifier against
//! a scope chain into one of a fixed set of result kinds. Unqualified
//! lookup walks frames innermost-first; a class frame continues into its
//! base chain before giving up; injections are consulted after a frame's
//! own members. Qualified lookup resolves the leading component, then
//! descends member-wise, expanding namespace aliases on the way.
//!
//! Lookup never instantiates templates: a template identifier resolves to
//! the template symbol and the compiler's type resolver requests the
//! instance.

use crate::ast::Identifier;
use crate::scope::{Injection, Scope, ScopeFrame};
use crate::symbols::{
    FunctionId, NamespaceId, Symbol, SymbolTable, TemplateArgument, TemplateId,
};
use crate::types::{ClassId, EnumId, Type};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameLookupOptions {
    /// Treat `name<...>` as `name` so that template symbols can be found
    /// during template selection.
    pub ignore_template_arguments: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameLookup {
    Unknown,
    Functions(Vec<FunctionId>),
    Template(TemplateId),
    Type(Type),
    Variable(Value),
    DataMember { class: ClassId, index: usize },
    StaticDataMember { class: ClassId, name: String },
    Global { index: usize },
    Local { index: usize },
    EnumValue { enum_id: EnumId, value: i64 },
    Namespace(NamespaceId),
    Capture { index: usize },
    TemplateParameter { index: usize },
}

impl NameLookup {
    pub fn is_unknown(&self) -> bool {
        matches!(self, NameLookup::Unknown)
    }
}

fn builtin_type_name(name: &str) -> Option<Type> {
    let t = match name {
        "void" => Type::VOID,
        "bool" => Type::BOOLEAN,
        "char" => Type::CHAR,
        "int" => Type::INT,
        "float" => Type::FLOAT,
        "double" => Type::DOUBLE,
        "string" => Type::STRING,
        "auto" => Type::AUTO,
        _ => return None,
    };
    Some(t)
}

/// Resolves an identifier against a scope.
pub fn resolve(
    id: &Identifier,
    scope: &Scope,
    symbols: &SymbolTable,
    opts: NameLookupOptions,
) -> NameLookup {
    match id {
        Identifier::Simple { name, .. } => resolve_unqualified(name, scope, symbols),
        Identifier::Template { name, .. } => {
            // with or without the ignore policy the symbol is found by
            // its name; argument handling belongs to the caller
            let _ = opts;
            resolve_unqualified(name, scope, symbols)
        }
        Identifier::Operator { op, .. } => {
            let mut out = vec![];
            for s in scope.chain() {
                match s.frame() {
                    Some(ScopeFrame::Namespace(ns))
                    | Some(ScopeFrame::Script { namespace: ns, .. }) => {
                        collect_namespace_operators(*op, ns, symbols, &mut out);
                    }
                    Some(ScopeFrame::Class(c)) => {
                        collect_class_operators(*op, c, symbols, &mut out);
                    }
                    _ => {}
                }
            }
            if out.is_empty() {
                NameLookup::Unknown
            } else {
                NameLookup::Functions(out)
            }
        }
        Identifier::LiteralOperator { suffix, .. } => {
            let fns = resolve_literal_operator(suffix, scope, symbols);
            if fns.is_empty() {
                NameLookup::Unknown
            } else {
                NameLookup::Functions(fns)
            }
        }
        Identifier::Scoped { lhs, rhs, .. } => {
            let Some(qual) = qualified_scope_lookup(lhs, scope, symbols) else {
                return NameLookup::Unknown;
            };
            lookup_in_qualified(rhs, qual, scope, symbols)
        }
    }
}

/// Resolves an unqualified name, e.g. for captures or diagnostics.
pub fn resolve_name(name: &str, scope: &Scope, symbols: &SymbolTable) -> NameLookup {
    resolve_unqualified(name, scope, symbols)
}

fn resolve_unqualified(name: &str, scope: &Scope, symbols: &SymbolTable) -> NameLookup {
    if let Some(t) = builtin_type_name(name) {
        return NameLookup::Type(t);
    }

    // locals of a function enclosing a lambda are not visible inside the
    // lambda body; only its captures are
    let mut crossed_lambda = false;

    for s in scope.chain() {
        let Some(frame) = s.frame() else { continue };

        if matches!(frame, ScopeFrame::Lambda(_)) {
            let hit = lookup_in_frame(name, &frame, symbols);
            if !hit.is_unknown() {
                return hit;
            }
            crossed_lambda = true;
            continue;
        }
        if crossed_lambda && matches!(frame, ScopeFrame::Function(_)) {
            continue;
        }

        let hit = lookup_in_frame(name, &frame, symbols);
        if !hit.is_unknown() {
            return hit;
        }

        let hit = lookup_in_injections(name, &s, scope, symbols);
        if !hit.is_unknown() {
            return hit;
        }
    }

    NameLookup::Unknown
}

fn lookup_in_frame(name: &str, frame: &ScopeFrame, symbols: &SymbolTable) -> NameLookup {
    match frame {
        ScopeFrame::Namespace(ns) => namespace_lookup(name, *ns, symbols),
        ScopeFrame::Script {
            namespace, globals, ..
        } => {
            let globals = globals.borrow();
            if let Some(index) = globals.iter().position(|(n, _)| n == name) {
                return NameLookup::Global { index };
            }
            namespace_lookup(name, *namespace, symbols)
        }
        ScopeFrame::Class(class) => member_lookup(name, *class, symbols),
        ScopeFrame::Enum(e) => {
            let enumeration = symbols.enumeration(*e);
            match enumeration.value_of(name) {
                Some(value) => NameLookup::EnumValue {
                    enum_id: *e,
                    value,
                },
                None => NameLookup::Unknown,
            }
        }
        ScopeFrame::Function(frame) => match frame.borrow().find(name) {
            Some(local) => NameLookup::Local { index: local.index },
            None => NameLookup::Unknown,
        },
        ScopeFrame::Lambda(frame) => match frame.capture_index(name) {
            Some(index) => NameLookup::Capture { index },
            None => NameLookup::Unknown,
        },
        ScopeFrame::TemplateParameters(frame) => {
            match frame.names.iter().position(|n| n == name) {
                Some(index) => NameLookup::TemplateParameter { index },
                None => NameLookup::Unknown,
            }
        }
        ScopeFrame::TemplateArguments(frame) => match frame.argument_for(name) {
            Some(TemplateArgument::Type(t)) => NameLookup::Type(*t),
            Some(TemplateArgument::Integer(n)) => NameLookup::Variable(Value::Int(*n)),
            Some(TemplateArgument::Bool(b)) => NameLookup::Variable(Value::Bool(*b)),
            Some(TemplateArgument::Pack(_)) | None => NameLookup::Unknown,
        },
        ScopeFrame::Context { variables, .. } => match variables.get(name) {
            Some(value) => NameLookup::Variable(value.clone()),
            None => NameLookup::Unknown,
        },
    }
}

fn lookup_in_injections(
    name: &str,
    node: &Scope,
    full_scope: &Scope,
    symbols: &SymbolTable,
) -> NameLookup {
    for injection in node.injections() {
        match injection {
            Injection::Namespace(ns) => {
                let hit = namespace_lookup(name, ns, symbols);
                if !hit.is_unknown() {
                    return hit;
                }
            }
            Injection::TypeAlias(alias, t) => {
                if alias == name {
                    return NameLookup::Type(t);
                }
            }
            Injection::NamespaceAlias(alias, path) => {
                if alias == name {
                    if let Some(ns) = resolve_namespace_path(&path, full_scope, symbols) {
                        return NameLookup::Namespace(ns);
                    }
                }
            }
            Injection::UsingFunctions(alias, fns) => {
                if alias == name {
                    return NameLookup::Functions(fns.clone());
                }
            }
            Injection::UsingType(alias, t) => {
                if alias == name {
                    return NameLookup::Type(t);
                }
            }
            Injection::UsingNamespace(alias, ns) => {
                if alias == name {
                    return NameLookup::Namespace(ns);
                }
            }
        }
    }

    NameLookup::Unknown
}

fn namespace_lookup(name: &str, ns: NamespaceId, symbols: &SymbolTable) -> NameLookup {
    let namespace = symbols.namespace(ns);

    if let Some(&child) = namespace
        .namespaces
        .iter()
        .find(|&&n| symbols.namespace(n).name == name)
    {
        return NameLookup::Namespace(child);
    }

    if let Some(&class) = namespace
        .classes
        .iter()
        .find(|&&c| symbols.class(c).name == name)
    {
        return NameLookup::Type(Type::object(class));
    }

    for &e in &namespace.enums {
        let enumeration = symbols.enumeration(e);
        if enumeration.name == name {
            return NameLookup::Type(Type::enumeration(e));
        }
        if !enumeration.is_enum_class {
            if let Some(value) = enumeration.value_of(name) {
                return NameLookup::EnumValue { enum_id: e, value };
            }
        }
    }

    if let Some(fns) = namespace.functions.get(name) {
        if !fns.is_empty() {
            return NameLookup::Functions(fns.clone());
        }
    }

    if let Some(&tpl) = namespace
        .templates
        .iter()
        .find(|&&t| symbols.template(t).name == name)
    {
        return NameLookup::Template(tpl);
    }

    if let Some(value) = namespace.variables.get(name) {
        return NameLookup::Variable(value.clone());
    }

    if let Some(&t) = namespace.type_aliases.get(name) {
        return NameLookup::Type(t);
    }

    NameLookup::Unknown
}

/// Member lookup: the first class in the base chain containing the name
/// wins.
pub fn member_lookup(name: &str, class: ClassId, symbols: &SymbolTable) -> NameLookup {
    if let Some((declaring, index)) = symbols.find_data_member(class, name) {
        let _ = declaring;
        return NameLookup::DataMember { class, index };
    }

    for c in symbols.class_and_bases(class) {
        let class_ref = symbols.class(c);

        if class_ref.static_members.contains_key(name) {
            return NameLookup::StaticDataMember {
                class: c,
                name: name.to_string(),
            };
        }

        if let Some(fns) = class_ref.methods.get(name) {
            if !fns.is_empty() {
                return NameLookup::Functions(fns.clone());
            }
        }

        if let Some(&nested) = class_ref
            .classes
            .iter()
            .find(|&&n| symbols.class(n).name == name)
        {
            return NameLookup::Type(Type::object(nested));
        }

        for &e in &class_ref.enums {
            let enumeration = symbols.enumeration(e);
            if enumeration.name == name {
                return NameLookup::Type(Type::enumeration(e));
            }
            if !enumeration.is_enum_class {
                if let Some(value) = enumeration.value_of(name) {
                    return NameLookup::EnumValue { enum_id: e, value };
                }
            }
        }

        if let Some(&tpl) = class_ref
            .templates
            .iter()
            .find(|&&t| symbols.template(t).name == name)
        {
            return NameLookup::Template(tpl);
        }

        if let Some(&t) = class_ref.type_aliases.get(name) {
            return NameLookup::Type(t);
        }
    }

    NameLookup::Unknown
}

/// What a qualified-name prefix can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifiedScope {
    Namespace(NamespaceId),
    Class(ClassId),
    Enum(EnumId),
}

fn qualified_scope_lookup(
    id: &Identifier,
    scope: &Scope,
    symbols: &SymbolTable,
) -> Option<QualifiedScope> {
    match id {
        Identifier::Simple { name, .. } | Identifier::Template { name, .. } => {
            match resolve_unqualified(name, scope, symbols) {
                NameLookup::Namespace(ns) => Some(QualifiedScope::Namespace(ns)),
                NameLookup::Type(t) => {
                    if let Some(c) = t.class_id() {
                        Some(QualifiedScope::Class(c))
                    } else {
                        t.enum_id().map(QualifiedScope::Enum)
                    }
                }
                _ => None,
            }
        }
        Identifier::Scoped { lhs, rhs, .. } => {
            let outer = qualified_scope_lookup(lhs, scope, symbols)?;
            match lookup_in_qualified(rhs, outer, scope, symbols) {
                NameLookup::Namespace(ns) => Some(QualifiedScope::Namespace(ns)),
                NameLookup::Type(t) => {
                    if let Some(c) = t.class_id() {
                        Some(QualifiedScope::Class(c))
                    } else {
                        t.enum_id().map(QualifiedScope::Enum)
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn lookup_in_qualified(
    id: &Identifier,
    qual: QualifiedScope,
    scope: &Scope,
    symbols: &SymbolTable,
) -> NameLookup {
    let name = match id {
        Identifier::Simple { name, .. } | Identifier::Template { name, .. } => name.as_str(),
        Identifier::Operator { op, .. } => {
            // qualified operator name, e.g. `N::operator+`
            let mut out = vec![];
            match qual {
                QualifiedScope::Namespace(ns) => {
                    collect_namespace_operators(*op, ns, symbols, &mut out)
                }
                QualifiedScope::Class(c) => collect_class_operators(*op, c, symbols, &mut out),
                QualifiedScope::Enum(_) => {}
            }
            return if out.is_empty() {
                NameLookup::Unknown
            } else {
                NameLookup::Functions(out)
            };
        }
        Identifier::LiteralOperator { suffix, .. } => {
            if let QualifiedScope::Namespace(ns) = qual {
                let fns: Vec<_> = symbols
                    .namespace(ns)
                    .literal_operators
                    .iter()
                    .copied()
                    .filter(|&f| {
                        matches!(&symbols.function(f).name,
                            crate::symbols::FunctionName::LiteralOperator(s) if s == suffix)
                    })
                    .collect();
                if !fns.is_empty() {
                    return NameLookup::Functions(fns);
                }
            }
            return NameLookup::Unknown;
        }
        Identifier::Scoped { .. } => {
            let _ = scope;
            return NameLookup::Unknown;
        }
    };

    match qual {
        QualifiedScope::Namespace(ns) => {
            // expand `namespace A = ...` rewriting rules before descent
            let namespace = symbols.namespace(ns);
            if let Some(path) = namespace.namespace_aliases.get(name) {
                if let Some(target) = resolve_namespace_path(path, scope, symbols) {
                    return NameLookup::Namespace(target);
                }
            }
            namespace_lookup(name, ns, symbols)
        }
        QualifiedScope::Class(c) => member_lookup(name, c, symbols),
        QualifiedScope::Enum(e) => {
            let enumeration = symbols.enumeration(e);
            match enumeration.value_of(name) {
                Some(value) => NameLookup::EnumValue { enum_id: e, value },
                None => NameLookup::Unknown,
            }
        }
    }
}

fn resolve_namespace_path(
    path: &[String],
    scope: &Scope,
    symbols: &SymbolTable,
) -> Option<NamespaceId> {
    let mut current = match resolve_unqualified(path.first()?, scope, symbols) {
        NameLookup::Namespace(ns) => ns,
        _ => return None,
    };

    for part in &path[1..] {
        match namespace_lookup(part, current, symbols) {
            NameLookup::Namespace(ns) => current = ns,
            _ => return None,
        }
    }

    Some(current)
}

fn collect_namespace_operators(
    op: crate::operators::OperatorKind,
    ns: NamespaceId,
    symbols: &SymbolTable,
    out: &mut Vec<FunctionId>,
) {
    for &f in &symbols.namespace(ns).operators {
        if symbols.function(f).operator_kind() == Some(op) && !out.contains(&f) {
            out.push(f);
        }
    }
}

fn collect_class_operators(
    op: crate::operators::OperatorKind,
    class: ClassId,
    symbols: &SymbolTable,
    out: &mut Vec<FunctionId>,
) {
    for c in symbols.class_and_bases(class) {
        for &f in &symbols.class(c).operators {
            if symbols.function(f).operator_kind() == Some(op) && !out.contains(&f) {
                out.push(f);
            }
        }
    }
}

/// Candidates for an operator applied to the given argument types: the
/// operators visible in the arguments' classes and enclosing namespaces,
/// the current scope chain, and the built-in operators the engine
/// synthesizes for enums and function types.
pub fn resolve_operator(
    op: crate::operators::OperatorKind,
    operands: &[Type],
    scope: &Scope,
    symbols: &SymbolTable,
) -> Vec<FunctionId> {
    let mut out = vec![];

    for &t in operands {
        if let Some(class) = t.class_id() {
            collect_class_operators(op, class, symbols, &mut out);
            // namespaces enclosing the argument's class
            let mut enclosing = symbols.class(class).enclosing;
            loop {
                match enclosing {
                    Symbol::Namespace(ns) => {
                        collect_namespace_operators(op, ns, symbols, &mut out);
                        match symbols.namespace(ns).enclosing {
                            Some(parent) => enclosing = Symbol::Namespace(parent),
                            None => break,
                        }
                    }
                    Symbol::Class(c) => enclosing = symbols.class(c).enclosing,
                    _ => break,
                }
            }
        } else if let Some(e) = t.enum_id() {
            if op == crate::operators::OperatorKind::Assignment {
                if let Some(f) = symbols.enumeration(e).assignment {
                    if !out.contains(&f) {
                        out.push(f);
                    }
                }
            }
        } else if let Some(ft) = t.function_type_id() {
            if op == crate::operators::OperatorKind::Assignment {
                if let Some(f) = symbols.function_types[ft.index()].assignment {
                    if !out.contains(&f) {
                        out.push(f);
                    }
                }
            }
        }
    }

    for s in scope.chain() {
        match s.frame() {
            Some(ScopeFrame::Namespace(ns)) | Some(ScopeFrame::Script { namespace: ns, .. }) => {
                collect_namespace_operators(op, ns, symbols, &mut out)
            }
            Some(ScopeFrame::Class(c)) => collect_class_operators(op, c, symbols, &mut out),
            _ => {}
        }
    }

    out
}

/// Literal operators visible from the scope chain, filtered by suffix.
pub fn resolve_literal_operator(
    suffix: &str,
    scope: &Scope,
    symbols: &SymbolTable,
) -> Vec<FunctionId> {
    let mut out = vec![];
    for s in scope.chain() {
        let ns = match s.frame() {
            Some(ScopeFrame::Namespace(ns)) | Some(ScopeFrame::Script { namespace: ns, .. }) => ns,
            _ => continue,
        };
        for &f in &symbols.namespace(ns).literal_operators {
            let matches = matches!(&symbols.function(f).name,
                crate::symbols::FunctionName::LiteralOperator(s) if s == suffix);
            if matches && !out.contains(&f) {
                out.push(f);
            }
        }
    }
    out
}
