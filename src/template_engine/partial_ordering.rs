//! Relative specialization of templates.
//!
//! Two function templates (or two partial specializations) compare
//! parameter-by-parameter with a four-valued order combined through a
//! commutative intersection table; qualifier specialization breaks ties.

use crate::ast;
use crate::name_lookup::{self, NameLookup, NameLookupOptions};
use crate::scope::Scope;
use crate::symbols::{SymbolTable, Template, TemplateDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePartialOrdering {
    NotComparable,
    Indistinguishable,
    FirstIsMoreSpecialized,
    SecondIsMoreSpecialized,
}

use TemplatePartialOrdering::*;

impl TemplatePartialOrdering {
    pub fn positive(self) -> bool {
        matches!(self, FirstIsMoreSpecialized | SecondIsMoreSpecialized)
    }

    /// Commutative intersection of two per-position comparisons.
    pub fn meet(self, other: TemplatePartialOrdering) -> TemplatePartialOrdering {
        const TABLE: [[TemplatePartialOrdering; 4]; 4] = [
            [NotComparable, NotComparable, NotComparable, NotComparable],
            [
                NotComparable,
                Indistinguishable,
                FirstIsMoreSpecialized,
                SecondIsMoreSpecialized,
            ],
            [
                NotComparable,
                FirstIsMoreSpecialized,
                FirstIsMoreSpecialized,
                NotComparable,
            ],
            [
                NotComparable,
                SecondIsMoreSpecialized,
                NotComparable,
                SecondIsMoreSpecialized,
            ],
        ];

        TABLE[self.index()][other.index()]
    }

    fn index(self) -> usize {
        match self {
            NotComparable => 0,
            Indistinguishable => 1,
            FirstIsMoreSpecialized => 2,
            SecondIsMoreSpecialized => 3,
        }
    }
}

/// A type pattern paired with the scope its names resolve in.
#[derive(Clone)]
pub struct ScopedType<'t> {
    pub scope: Scope,
    pub ty: &'t ast::QualifiedType,
}

/// Compares two function templates for relative specialization.
pub fn compare_function_templates(
    symbols: &SymbolTable,
    a: &Template,
    a_scope: Scope,
    b: &Template,
    b_scope: Scope,
) -> TemplatePartialOrdering {
    if a.name != b.name {
        return NotComparable;
    }

    let (TemplateDefinition::SourceFunction(a_decl), TemplateDefinition::SourceFunction(b_decl)) =
        (&a.definition, &b.definition)
    else {
        return Indistinguishable;
    };

    let n = a_decl.params.len().min(b_decl.params.len());
    let mut c = Indistinguishable;
    for i in 0..n {
        c = c.meet(compare_types(
            symbols,
            ScopedType {
                scope: a_scope.clone(),
                ty: &a_decl.params[i].ty,
            },
            ScopedType {
                scope: b_scope.clone(),
                ty: &b_decl.params[i].ty,
            },
        ));
        if c == NotComparable {
            return c;
        }
    }

    if c.positive() {
        return c;
    }

    let a_const = a_decl.specifiers.is_const;
    let b_const = b_decl.specifiers.is_const;
    if a_const && !b_const {
        return FirstIsMoreSpecialized;
    } else if b_const && !a_const {
        return SecondIsMoreSpecialized;
    }

    if a.parameters.len() < b.parameters.len() {
        FirstIsMoreSpecialized
    } else if b.parameters.len() < a.parameters.len() {
        SecondIsMoreSpecialized
    } else {
        Indistinguishable
    }
}

pub fn compare_types(
    symbols: &SymbolTable,
    a: ScopedType<'_>,
    b: ScopedType<'_>,
) -> TemplatePartialOrdering {
    let a_fn = matches!(a.ty.kind, ast::TypeNameKind::Function(_));
    let b_fn = matches!(b.ty.kind, ast::TypeNameKind::Function(_));
    if a_fn && !b_fn {
        return FirstIsMoreSpecialized;
    } else if !a_fn && b_fn {
        return SecondIsMoreSpecialized;
    } else if a_fn {
        // function types are not ordered any further
        return Indistinguishable;
    }

    let a_id = match &a.ty.kind {
        ast::TypeNameKind::Named(id) => id,
        _ => return NotComparable,
    };
    let b_id = match &b.ty.kind {
        ast::TypeNameKind::Named(id) => id,
        _ => return NotComparable,
    };

    let a_tpl = matches!(a_id, ast::Identifier::Template { .. });
    let b_tpl = matches!(b_id, ast::Identifier::Template { .. });
    if a_tpl && !b_tpl {
        return FirstIsMoreSpecialized;
    } else if !a_tpl && b_tpl {
        return SecondIsMoreSpecialized;
    }

    let opts = NameLookupOptions {
        ignore_template_arguments: true,
    };
    let la = name_lookup::resolve(a_id, &a.scope, symbols, opts);
    let lb = name_lookup::resolve(b_id, &b.scope, symbols, opts);

    let a_is_type = matches!(la, NameLookup::Type(_));
    let b_is_type = matches!(lb, NameLookup::Type(_));
    if a_is_type && !b_is_type {
        return FirstIsMoreSpecialized;
    } else if !a_is_type && b_is_type {
        return SecondIsMoreSpecialized;
    } else if a_is_type && b_is_type {
        return compare_qualifiers(a.ty, b.ty);
    }

    if let (NameLookup::Template(ta), NameLookup::Template(tb)) = (&la, &lb) {
        if ta != tb {
            return NotComparable;
        }

        let empty = vec![];
        let a_args = match a_id {
            ast::Identifier::Template { arguments, .. } => arguments,
            _ => &empty,
        };
        let b_args = match b_id {
            ast::Identifier::Template { arguments, .. } => arguments,
            _ => &empty,
        };

        let ret = compare_argument_lists(symbols, &a.scope, a_args, &b.scope, b_args);
        if ret.positive() {
            return ret;
        }
        return compare_qualifiers(a.ty, b.ty);
    }

    let a_param = matches!(la, NameLookup::TemplateParameter { .. });
    let b_param = matches!(lb, NameLookup::TemplateParameter { .. });
    if a_param && b_param {
        return compare_qualifiers(a.ty, b.ty);
    }

    NotComparable
}

pub fn compare_argument_lists(
    symbols: &SymbolTable,
    a_scope: &Scope,
    a: &[ast::TemplateArg],
    b_scope: &Scope,
    b: &[ast::TemplateArg],
) -> TemplatePartialOrdering {
    if a.len() > b.len() {
        return FirstIsMoreSpecialized;
    } else if a.len() < b.len() {
        return SecondIsMoreSpecialized;
    }

    let mut c = Indistinguishable;
    for i in 0..a.len() {
        c = c.meet(compare_template_args(symbols, a_scope, &a[i], b_scope, &b[i]));
        if c == NotComparable {
            return c;
        }
    }
    c
}

fn compare_template_args(
    symbols: &SymbolTable,
    a_scope: &Scope,
    a: &ast::TemplateArg,
    b_scope: &Scope,
    b: &ast::TemplateArg,
) -> TemplatePartialOrdering {
    match (a, b) {
        (ast::TemplateArg::Type(ta), ast::TemplateArg::Type(tb)) => compare_types(
            symbols,
            ScopedType {
                scope: a_scope.clone(),
                ty: ta,
            },
            ScopedType {
                scope: b_scope.clone(),
                ty: tb,
            },
        ),
        (ast::TemplateArg::Expr(_), ast::TemplateArg::Expr(_)) => Indistinguishable,
        _ => NotComparable,
    }
}

/// `const T` is more specialized than `T`, `T&` more than `T`.
fn compare_qualifiers(
    a: &ast::QualifiedType,
    b: &ast::QualifiedType,
) -> TemplatePartialOrdering {
    let a_ref = a.ref_kind != ast::RefKind::None;
    let b_ref = b.ref_kind != ast::RefKind::None;

    if a.is_const && !b.is_const {
        return if a_ref == b_ref || (a_ref && !b_ref) {
            FirstIsMoreSpecialized
        } else {
            NotComparable
        };
    } else if !a.is_const && b.is_const {
        return if a_ref == b_ref || (b_ref && !a_ref) {
            SecondIsMoreSpecialized
        } else {
            NotComparable
        };
    }

    if a_ref && !b_ref {
        FirstIsMoreSpecialized
    } else if !a_ref && b_ref {
        SecondIsMoreSpecialized
    } else {
        Indistinguishable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meet_table_is_commutative() {
        let values = [
            NotComparable,
            Indistinguishable,
            FirstIsMoreSpecialized,
            SecondIsMoreSpecialized,
        ];
        for a in values {
            for b in values {
                assert_eq!(a.meet(b), b.meet(a));
            }
        }
    }

    #[test]
    fn test_meet_absorbs_not_comparable() {
        for v in [
            NotComparable,
            Indistinguishable,
            FirstIsMoreSpecialized,
            SecondIsMoreSpecialized,
        ] {
            assert_eq!(NotComparable.meet(v), NotComparable);
        }
    }

    #[test]
    fn test_conflicting_directions_are_not_comparable() {
        assert_eq!(
            FirstIsMoreSpecialized.meet(SecondIsMoreSpecialized),
            NotComparable
        );
    }
}
