//! Overload resolution.
//!
//! A candidate is viable iff every argument slot has a valid
//! initialization and the argument count, after default-argument
//! completion, matches. Two viable candidates compare slot-wise: the
//! winner is no worse in any slot and strictly better in at least one.
//! Ties fall to non-templates over template instances.

use crate::program;
use crate::symbols::{FunctionId, SymbolTable};
use crate::types::Type;

use super::initialization::Initialization;

#[derive(Debug, Clone)]
pub struct OverloadCandidate {
    pub function: FunctionId,
    /// One initialization per prototype slot that receives an argument.
    pub initializations: Vec<Initialization>,
}

#[derive(Debug, Clone)]
pub enum OverloadResult {
    Selected(OverloadCandidate),
    Ambiguous(Vec<FunctionId>),
    NoMatch,
}

pub enum OverloadInputs<'a> {
    Types(&'a [Type]),
    Exprs(&'a [program::Expression]),
}

impl OverloadInputs<'_> {
    fn len(&self) -> usize {
        match self {
            OverloadInputs::Types(ts) => ts.len(),
            OverloadInputs::Exprs(es) => es.len(),
        }
    }

    fn initialization(&self, index: usize, dest: Type, symbols: &SymbolTable) -> Initialization {
        match self {
            OverloadInputs::Types(ts) => Initialization::compute_from_type(
                dest,
                ts[index],
                symbols,
                super::initialization::InitializationKind::Copy,
            ),
            OverloadInputs::Exprs(es) => Initialization::compute(dest, &es[index], symbols),
        }
    }
}

fn candidate(
    function: FunctionId,
    inputs: &OverloadInputs<'_>,
    symbols: &SymbolTable,
) -> Option<OverloadCandidate> {
    let f = symbols.function(function);
    let total = f.prototype.count();
    let provided = inputs.len();

    if provided > total || provided < total - f.default_arguments.len() {
        return None;
    }

    let prototype = f.prototype.clone();
    let mut initializations = vec![];
    for i in 0..provided {
        let init = inputs.initialization(i, prototype.at(i), symbols);
        if !init.is_valid() {
            return None;
        }
        initializations.push(init);
    }

    Some(OverloadCandidate {
        function,
        initializations,
    })
}

/// Slot-wise comparison; negative means `a` wins.
fn compare(
    a: &OverloadCandidate,
    b: &OverloadCandidate,
    symbols: &SymbolTable,
) -> i32 {
    debug_assert_eq!(a.initializations.len(), b.initializations.len());

    let mut a_better = false;
    let mut b_better = false;
    for (ia, ib) in a.initializations.iter().zip(&b.initializations) {
        match Initialization::comp(ia, ib) {
            c if c < 0 => a_better = true,
            c if c > 0 => b_better = true,
            _ => {}
        }
    }

    if a_better && !b_better {
        return -1;
    } else if b_better && !a_better {
        return 1;
    } else if a_better && b_better {
        return 0;
    }

    // ties: a non-template beats a template instance
    let a_template = symbols.function(a.function).instance_of;
    let b_template = symbols.function(b.function).instance_of;
    match (a_template, b_template) {
        (None, Some(_)) => return -1,
        (Some(_), None) => return 1,
        (Some(ta), Some(tb)) if ta != tb => {
            // the more specialized template wins
            let order = crate::template_engine::compare_function_templates(
                symbols,
                symbols.template(ta),
                crate::template_engine::parameter_scope(symbols, symbols.template(ta)),
                symbols.template(tb),
                crate::template_engine::parameter_scope(symbols, symbols.template(tb)),
            );
            match order {
                crate::template_engine::TemplatePartialOrdering::FirstIsMoreSpecialized => {
                    return -1
                }
                crate::template_engine::TemplatePartialOrdering::SecondIsMoreSpecialized => {
                    return 1
                }
                _ => {}
            }
        }
        _ => {}
    }

    0
}

/// Selects the best viable candidate, or reports ambiguity.
pub fn resolve_overloads(
    candidates: &[FunctionId],
    inputs: OverloadInputs<'_>,
    symbols: &SymbolTable,
) -> OverloadResult {
    let mut viable: Vec<OverloadCandidate> = candidates
        .iter()
        .filter_map(|&f| candidate(f, &inputs, symbols))
        .collect();

    if viable.is_empty() {
        return OverloadResult::NoMatch;
    }
    if viable.len() == 1 {
        return OverloadResult::Selected(viable.pop().unwrap());
    }

    let mut best = 0;
    for i in 1..viable.len() {
        if compare(&viable[i], &viable[best], symbols) < 0 {
            best = i;
        }
    }

    // the winner must beat or tie-out every other candidate
    let mut ambiguous = vec![];
    for (i, other) in viable.iter().enumerate() {
        if i == best {
            continue;
        }
        if compare(&viable[best], other, symbols) >= 0 {
            ambiguous.push(other.function);
        }
    }

    if !ambiguous.is_empty() {
        ambiguous.push(viable[best].function);
        return OverloadResult::Ambiguous(ambiguous);
    }

    OverloadResult::Selected(viable.swap_remove(best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Function, FunctionName, SymbolTable};
    use crate::types::Prototype;

    fn free_function(symbols: &mut SymbolTable, params: Vec<Type>) -> FunctionId {
        symbols.add_function(Function::new(
            FunctionName::Name("f".into()),
            Prototype::new(Type::VOID, params),
        ))
    }

    #[test]
    fn test_exact_match_beats_conversion() {
        let mut symbols = SymbolTable::new();
        let f_int = free_function(&mut symbols, vec![Type::INT]);
        let f_double = free_function(&mut symbols, vec![Type::DOUBLE]);

        let args = [Type::INT];
        let result = resolve_overloads(
            &[f_int, f_double],
            OverloadInputs::Types(&args),
            &symbols,
        );

        match result {
            OverloadResult::Selected(c) => assert_eq!(c.function, f_int),
            other => panic!("expected a selection, got {other:?}"),
        }
    }

    #[test]
    fn test_no_match_on_arity() {
        let mut symbols = SymbolTable::new();
        let f = free_function(&mut symbols, vec![Type::INT, Type::INT]);

        let args = [Type::INT];
        let result = resolve_overloads(&[f], OverloadInputs::Types(&args), &symbols);
        assert!(matches!(result, OverloadResult::NoMatch));
    }

    #[test]
    fn test_ambiguous_candidates() {
        let mut symbols = SymbolTable::new();
        // double and float are both one conversion away from int
        let f_double = free_function(&mut symbols, vec![Type::DOUBLE]);
        let f_float = free_function(&mut symbols, vec![Type::FLOAT]);

        let args = [Type::INT];
        let result = resolve_overloads(
            &[f_double, f_float],
            OverloadInputs::Types(&args),
            &symbols,
        );
        assert!(matches!(result, OverloadResult::Ambiguous(_)));
    }
}
