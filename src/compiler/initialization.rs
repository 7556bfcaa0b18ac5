//! Initialization-form selection.
//!
//! Given a target type and a source (a type or an already-lowered
//! expression), computes how the target is initialized: default, copy,
//! direct, list, aggregate or reference form. List initialization records
//! one sub-initialization per element and rejects narrowing conversions.

use crate::program;
use crate::symbols::{FunctionId, SymbolTable};
use crate::types::Type;

use super::conversion::{Conversion, ConversionRank};
use super::overload_resolution::{resolve_overloads, OverloadInputs, OverloadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationKind {
    Default,
    Copy,
    Direct,
    List,
    Aggregate,
    Reference,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Initialization {
    pub kind: InitializationKind,
    pub conversion: Conversion,
    pub constructor: Option<FunctionId>,
    pub dest_type: Type,
    /// Per-element sub-initializations of a list or aggregate form.
    pub initializations: Vec<Initialization>,
}

impl Initialization {
    fn invalid(dest: Type) -> Self {
        Self {
            kind: InitializationKind::Invalid,
            conversion: Conversion::invalid(),
            constructor: None,
            dest_type: dest,
            initializations: vec![],
        }
    }

    fn conversion_form(kind: InitializationKind, dest: Type, conversion: Conversion) -> Self {
        let kind = if conversion.is_invalid() {
            InitializationKind::Invalid
        } else {
            kind
        };
        Self {
            kind,
            conversion,
            constructor: None,
            dest_type: dest,
            initializations: vec![],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind != InitializationKind::Invalid
    }

    pub fn rank(&self) -> ConversionRank {
        if self.constructor.is_some() || !self.initializations.is_empty() {
            self.initializations
                .iter()
                .map(Initialization::rank)
                .max()
                .unwrap_or(ConversionRank::ExactMatch)
        } else {
            self.conversion.rank()
        }
    }

    pub fn is_narrowing(&self) -> bool {
        self.conversion.is_narrowing()
            || self.initializations.iter().any(Initialization::is_narrowing)
    }

    /// Default initialization of a variable of type `t`.
    pub fn compute_default(dest: Type, symbols: &SymbolTable) -> Initialization {
        if dest.is_enum_type() || dest.is_closure_type() || dest.is_function_type() {
            return Initialization::invalid(dest);
        }

        if dest.is_fundamental() || dest.base_type() == Type::STRING {
            return Initialization {
                kind: InitializationKind::Default,
                conversion: Conversion::identity(),
                constructor: None,
                dest_type: dest,
                initializations: vec![],
            };
        }

        let Some(class) = dest.base_type().class_id() else {
            return Initialization::invalid(dest);
        };
        if !symbols.is_default_constructible(class) {
            return Initialization::invalid(dest);
        }

        Initialization {
            kind: InitializationKind::Default,
            conversion: Conversion::identity(),
            constructor: symbols.default_constructor(class),
            dest_type: dest,
            initializations: vec![],
        }
    }

    /// Initialization of `dest` from a value of type `src`, in copy or
    /// direct form.
    pub fn compute_from_type(
        dest: Type,
        src: Type,
        symbols: &SymbolTable,
        kind: InitializationKind,
    ) -> Initialization {
        let allow_explicit = kind == InitializationKind::Direct;
        let conversion = Conversion::compute(src, dest, symbols, allow_explicit);

        let form = if dest.is_any_reference() {
            InitializationKind::Reference
        } else {
            kind
        };

        Initialization::conversion_form(form, dest, conversion)
    }

    /// Initialization of `dest` from a lowered expression; dispatches on
    /// list expressions.
    pub fn compute(
        dest: Type,
        expr: &program::Expression,
        symbols: &SymbolTable,
    ) -> Initialization {
        if !expr.ty().is_initializer_list_marker() && !expr.is_initializer_list() {
            return Initialization::compute_from_type(
                dest,
                expr.ty(),
                symbols,
                InitializationKind::Copy,
            );
        }

        let program::Expression::InitializerList { elements, .. } = expr else {
            return Initialization::invalid(dest);
        };

        // `InitializerList<T>` target: element-wise conversion
        if symbols.is_initializer_list(dest) {
            return Self::initializer_list_form(dest, elements, symbols, None);
        }

        if dest.is_any_reference() && !dest.is_const() {
            return Initialization::invalid(dest);
        }

        // `{}` picks the default constructor / the zero value
        if elements.is_empty() {
            return Initialization::compute_default(dest, symbols);
        }

        if dest.is_fundamental() || dest.base_type() == Type::STRING {
            if elements.len() > 1 {
                return Initialization::invalid(dest);
            }
            let init = Initialization::compute_from_type(
                dest.base_type().without_const(),
                elements[0].ty(),
                symbols,
                InitializationKind::Copy,
            );
            if !init.is_valid() {
                return Initialization::invalid(dest);
            }
            // the conversion may still be narrowing, which the caller
            // rejects in this form
            return Initialization {
                kind: InitializationKind::List,
                ..init
            };
        }

        let Some(class) = dest.base_type().class_id() else {
            return Initialization::invalid(dest);
        };

        // a constructor taking a compatible initializer list wins
        let ctors = symbols.class(class).constructors.clone();
        for &ctor in &ctors {
            let function = symbols.function(ctor);
            if function.prototype.count() == 2 && symbols.is_initializer_list(function.prototype.at(1))
            {
                let list_type = function.prototype.at(1);
                return Self::initializer_list_form(list_type, elements, symbols, Some(ctor));
            }
        }

        // otherwise the constructor overload set is resolved against the
        // list elements as arguments; an ambiguous set is not a valid
        // initialization
        let candidates: Vec<FunctionId> = ctors
            .iter()
            .copied()
            .filter(|&c| !symbols.function(c).flags.is_deleted())
            .collect();

        // the implicit-object slot is a placeholder during resolution
        let mut inputs = vec![program::Expression::StackValue {
            index: 0,
            ty: Type::reference(dest.base_type()),
        }];
        inputs.extend(elements.iter().cloned());

        match resolve_overloads(&candidates, OverloadInputs::Exprs(&inputs), symbols) {
            OverloadResult::Selected(candidate) => {
                let mut inits = candidate.initializations;
                inits.remove(0);
                // narrowing is an error in this form, whatever the
                // winning constructor
                if inits.iter().any(Initialization::is_narrowing) {
                    return Initialization::invalid(dest);
                }
                return Initialization {
                    kind: InitializationKind::List,
                    conversion: Conversion::identity(),
                    constructor: Some(candidate.function),
                    dest_type: dest,
                    initializations: inits,
                };
            }
            OverloadResult::Ambiguous(_) => return Initialization::invalid(dest),
            OverloadResult::NoMatch => {}
        }

        // aggregate form: positional brace list over the data members of
        // a class without user constructors
        if ctors.is_empty() {
            let fields: Vec<Type> = symbols
                .class_and_bases(class)
                .into_iter()
                .rev()
                .flat_map(|c| symbols.class(c).data_members.iter().map(|m| m.ty))
                .collect();
            if fields.len() == elements.len() {
                let mut inits = vec![];
                for (field, element) in fields.iter().zip(elements) {
                    let init = Initialization::compute(*field, element, symbols);
                    if !init.is_valid() || init.is_narrowing() {
                        return Initialization::invalid(dest);
                    }
                    inits.push(init);
                }
                return Initialization {
                    kind: InitializationKind::Aggregate,
                    conversion: Conversion::identity(),
                    constructor: None,
                    dest_type: dest,
                    initializations: inits,
                };
            }
        }

        Initialization::invalid(dest)
    }

    fn initializer_list_form(
        list_type: Type,
        elements: &[program::Expression],
        symbols: &SymbolTable,
        constructor: Option<FunctionId>,
    ) -> Initialization {
        let Some(class) = symbols.get_class(list_type) else {
            return Initialization::invalid(list_type);
        };
        let Some(crate::symbols::TemplateArgument::Type(element_type)) =
            class.template_arguments.first().cloned()
        else {
            return Initialization::invalid(list_type);
        };

        let mut inits = vec![];
        for element in elements {
            let init = Initialization::compute(element_type, element, symbols);
            if !init.is_valid() {
                return Initialization::invalid(list_type);
            }
            inits.push(init);
        }

        Initialization {
            kind: InitializationKind::List,
            conversion: Conversion::identity(),
            constructor,
            dest_type: list_type,
            initializations: inits,
        }
    }

    /// Three-way comparison for overload resolution; negative means `a`
    /// is better.
    pub fn comp(a: &Initialization, b: &Initialization) -> i32 {
        let a_list = a.kind == InitializationKind::List;
        let b_list = b.kind == InitializationKind::List;
        if a_list && !b_list {
            return 1;
        } else if !a_list && b_list {
            return -1;
        }

        if a.constructor.is_none() && b.constructor.is_some() {
            return -1;
        } else if a.constructor.is_some() && b.constructor.is_none() {
            return 1;
        }

        if a.constructor.is_none() && a.initializations.is_empty() {
            return Conversion::comp(&a.conversion, &b.conversion);
        }

        0
    }
}
