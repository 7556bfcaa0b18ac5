//! Implicit conversion analysis.
//!
//! A conversion between two types is at most: a standard conversion,
//! followed by an optional user-defined conversion (converting
//! constructor or conversion function), followed by another standard
//! conversion. Conversions are ranked for overload resolution; a
//! narrowing flag marks fundamental conversions that lose information.

use crate::symbols::{FunctionId, FunctionName, SymbolTable};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionRank {
    ExactMatch,
    Promotion,
    Conversion,
    UserDefined,
    NotConvertible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericConversion {
    None,
    Promotion,
    Conversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardConversion {
    valid: bool,
    numeric: NumericConversion,
    /// Depth of the derived-to-base walk; 0 when none.
    derived_to_base: u8,
    qual_adjust: bool,
    ref_binding: bool,
    narrowing: bool,
    /// The destination is initialized by copying an object.
    copy_construction: bool,
}

/// Numeric order used for narrowing detection.
fn numeric_level(t: Type) -> Option<u8> {
    let base = t.base_type();
    let level = if base == Type::BOOLEAN {
        1
    } else if base == Type::CHAR {
        2
    } else if base == Type::INT {
        3
    } else if base == Type::FLOAT {
        4
    } else if base == Type::DOUBLE {
        5
    } else {
        return None;
    };
    Some(level)
}

impl StandardConversion {
    pub fn identity() -> Self {
        Self {
            valid: true,
            numeric: NumericConversion::None,
            derived_to_base: 0,
            qual_adjust: false,
            ref_binding: false,
            narrowing: false,
            copy_construction: false,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            numeric: NumericConversion::None,
            derived_to_base: 0,
            qual_adjust: false,
            ref_binding: false,
            narrowing: false,
            copy_construction: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_narrowing(&self) -> bool {
        self.narrowing
    }

    pub fn is_reference_binding(&self) -> bool {
        self.ref_binding
    }

    pub fn is_copy_construction(&self) -> bool {
        self.copy_construction
    }

    pub fn is_numeric_conversion(&self) -> bool {
        self.numeric != NumericConversion::None
    }

    pub fn rank(&self) -> ConversionRank {
        if !self.valid {
            return ConversionRank::NotConvertible;
        }
        if self.derived_to_base > 0 || self.numeric == NumericConversion::Conversion {
            return ConversionRank::Conversion;
        }
        if self.numeric == NumericConversion::Promotion {
            return ConversionRank::Promotion;
        }
        ConversionRank::ExactMatch
    }

    /// Standard conversion from `src` to `dest`, both value-category
    /// free: reference binding is judged on the type level only.
    pub fn compute(src: Type, dest: Type, symbols: &SymbolTable) -> StandardConversion {
        let src_base = src.base_type();
        let dest_base = dest.base_type();

        if dest.is_any_reference() {
            // reference binding
            let same_base = src_base == dest_base;
            let derived_depth = match (src_base.class_id(), dest_base.class_id()) {
                (Some(s), Some(d)) => symbols.inheritance_depth(s, d),
                _ => None,
            };

            if same_base || derived_depth.map(|d| d > 0).unwrap_or(false) {
                if src.is_const() && !dest.is_const() {
                    return StandardConversion::invalid();
                }
                return StandardConversion {
                    valid: true,
                    numeric: NumericConversion::None,
                    derived_to_base: derived_depth.unwrap_or(0) as u8,
                    qual_adjust: dest.is_const() && !src.is_const(),
                    ref_binding: true,
                    narrowing: false,
                    copy_construction: false,
                };
            }

            // a const reference accepts a converted temporary
            if dest.is_const() && !dest.is_forward_reference() {
                let to_value =
                    StandardConversion::compute(src, dest.without_reference(), symbols);
                if to_value.is_valid() {
                    return StandardConversion {
                        ref_binding: false,
                        ..to_value
                    };
                }
            }

            return StandardConversion::invalid();
        }

        // identity / copy
        if src_base == dest_base {
            let copy = if dest_base.is_object_type() {
                let class = dest_base.class_id().unwrap();
                if !symbols.is_copy_constructible(class) {
                    return StandardConversion::invalid();
                }
                true
            } else {
                false
            };
            return StandardConversion {
                valid: true,
                numeric: NumericConversion::None,
                derived_to_base: 0,
                qual_adjust: false,
                ref_binding: false,
                narrowing: false,
                copy_construction: copy,
            };
        }

        // fundamental conversions
        if let (Some(from), Some(to)) = (numeric_level(src_base), numeric_level(dest_base)) {
            let promotion = (src_base == Type::BOOLEAN && dest_base == Type::INT)
                || (src_base == Type::CHAR && dest_base == Type::INT)
                || (src_base == Type::FLOAT && dest_base == Type::DOUBLE);
            // int -> float may lose precision too
            let narrowing = from > to || (src_base == Type::INT && dest_base == Type::FLOAT);
            return StandardConversion {
                valid: true,
                numeric: if promotion {
                    NumericConversion::Promotion
                } else {
                    NumericConversion::Conversion
                },
                derived_to_base: 0,
                qual_adjust: false,
                ref_binding: false,
                narrowing,
                copy_construction: false,
            };
        }

        // derived-to-base by value: requires the base's copy constructor
        if let (Some(s), Some(d)) = (src_base.class_id(), dest_base.class_id()) {
            if let Some(depth) = symbols.inheritance_depth(s, d) {
                if depth > 0 && symbols.is_copy_constructible(d) {
                    return StandardConversion {
                        valid: true,
                        numeric: NumericConversion::None,
                        derived_to_base: depth as u8,
                        qual_adjust: false,
                        ref_binding: false,
                        narrowing: false,
                        copy_construction: true,
                    };
                }
            }
        }

        StandardConversion::invalid()
    }

    /// Three-way comparison: negative means `a` is the better conversion.
    pub fn comp(a: &StandardConversion, b: &StandardConversion) -> i32 {
        match a.rank().cmp(&b.rank()) {
            std::cmp::Ordering::Less => return -1,
            std::cmp::Ordering::Greater => return 1,
            std::cmp::Ordering::Equal => {}
        }

        match a.derived_to_base.cmp(&b.derived_to_base) {
            std::cmp::Ordering::Less => return -1,
            std::cmp::Ordering::Greater => return 1,
            std::cmp::Ordering::Equal => {}
        }

        match (a.qual_adjust, b.qual_adjust) {
            (false, true) => -1,
            (true, false) => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub std1: StandardConversion,
    /// The user-defined step: a converting constructor or a conversion
    /// function.
    pub function: Option<FunctionId>,
    pub std3: StandardConversion,
}

impl Conversion {
    pub fn identity() -> Self {
        Self {
            std1: StandardConversion::identity(),
            function: None,
            std3: StandardConversion::identity(),
        }
    }

    pub fn invalid() -> Self {
        Self {
            std1: StandardConversion::invalid(),
            function: None,
            std3: StandardConversion::identity(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        !self.std1.is_valid() || (self.function.is_some() && !self.std3.is_valid())
    }

    pub fn rank(&self) -> ConversionRank {
        if self.is_invalid() {
            ConversionRank::NotConvertible
        } else if self.function.is_some() {
            ConversionRank::UserDefined
        } else {
            self.std1.rank()
        }
    }

    pub fn is_narrowing(&self) -> bool {
        self.std1.is_narrowing() || self.std3.is_narrowing()
    }

    /// Computes the implicit conversion from `src` to `dest`.
    /// `allow_explicit` admits explicit constructors (direct/brace
    /// initialization forms).
    pub fn compute(
        src: Type,
        dest: Type,
        symbols: &SymbolTable,
        allow_explicit: bool,
    ) -> Conversion {
        let std = StandardConversion::compute(src, dest, symbols);
        if std.is_valid() {
            return Conversion {
                std1: std,
                function: None,
                std3: StandardConversion::identity(),
            };
        }

        let mut best: Option<Conversion> = None;
        let mut consider = |candidate: Conversion| {
            if candidate.is_invalid() {
                return;
            }
            match &best {
                None => best = Some(candidate),
                Some(current) => {
                    if Conversion::comp(&candidate, current) < 0 {
                        best = Some(candidate);
                    }
                }
            }
        };

        // converting constructors of the destination class
        let dest_base = dest.base_type();
        if let Some(class) = dest_base.class_id() {
            let ctors = symbols.class(class).constructors.clone();
            for ctor in ctors {
                let function = symbols.function(ctor);
                if function.flags.is_deleted() {
                    continue;
                }
                if function.flags.is_explicit() && !allow_explicit {
                    continue;
                }
                if function.prototype.count() != 2 {
                    continue;
                }
                let param = function.prototype.at(1);
                let std1 = StandardConversion::compute(src, param, symbols);
                if std1.is_valid() {
                    consider(Conversion {
                        std1,
                        function: Some(ctor),
                        std3: StandardConversion::identity(),
                    });
                }
            }
        }

        // conversion functions of the source class
        if let Some(class) = src.base_type().class_id() {
            for c in symbols.class_and_bases(class) {
                let casts = symbols.class(c).casts.clone();
                for cast in casts {
                    let function = symbols.function(cast);
                    if function.flags.is_deleted() {
                        continue;
                    }
                    if src.is_const() && !function.flags.is_const() {
                        continue;
                    }
                    let FunctionName::Cast(produced) = function.name else {
                        continue;
                    };
                    let std3 = StandardConversion::compute(produced, dest, symbols);
                    if std3.is_valid() {
                        consider(Conversion {
                            std1: StandardConversion::identity(),
                            function: Some(cast),
                            std3,
                        });
                    }
                }
            }
        }

        best.unwrap_or_else(Conversion::invalid)
    }

    /// Three-way comparison: negative means `a` is the better conversion.
    pub fn comp(a: &Conversion, b: &Conversion) -> i32 {
        match a.rank().cmp(&b.rank()) {
            std::cmp::Ordering::Less => return -1,
            std::cmp::Ordering::Greater => return 1,
            std::cmp::Ordering::Equal => {}
        }

        let first = StandardConversion::comp(&a.std1, &b.std1);
        if first != 0 {
            return first;
        }
        StandardConversion::comp(&a.std3, &b.std3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_promotion_ranks() {
        let symbols = SymbolTable::new();

        let identity = Conversion::compute(Type::INT, Type::INT, &symbols, false);
        assert_eq!(identity.rank(), ConversionRank::ExactMatch);

        let promotion = Conversion::compute(Type::CHAR, Type::INT, &symbols, false);
        assert_eq!(promotion.rank(), ConversionRank::Promotion);

        let conversion = Conversion::compute(Type::INT, Type::DOUBLE, &symbols, false);
        assert_eq!(conversion.rank(), ConversionRank::Conversion);
        assert!(!conversion.is_narrowing());
    }

    #[test]
    fn test_narrowing_detection() {
        let symbols = SymbolTable::new();

        assert!(Conversion::compute(Type::DOUBLE, Type::INT, &symbols, false).is_narrowing());
        assert!(Conversion::compute(Type::INT, Type::BOOLEAN, &symbols, false).is_narrowing());
        assert!(Conversion::compute(Type::INT, Type::FLOAT, &symbols, false).is_narrowing());
        assert!(!Conversion::compute(Type::INT, Type::DOUBLE, &symbols, false).is_narrowing());
    }

    #[test]
    fn test_reference_binding() {
        let symbols = SymbolTable::new();

        // int& <- int
        let conv = Conversion::compute(
            Type::INT,
            Type::reference(Type::INT),
            &symbols,
            false,
        );
        assert!(!conv.is_invalid());
        assert!(conv.std1.is_reference_binding());

        // int& <- const int is rejected
        let conv = Conversion::compute(
            Type::INT.with_const(),
            Type::reference(Type::INT),
            &symbols,
            false,
        );
        assert!(conv.is_invalid());

        // const double& <- int binds a converted temporary
        let conv = Conversion::compute(
            Type::INT,
            Type::const_reference(Type::DOUBLE),
            &symbols,
            false,
        );
        assert!(!conv.is_invalid());
        assert!(!conv.std1.is_reference_binding());
    }

    #[test]
    fn test_unrelated_types_do_not_convert() {
        let symbols = SymbolTable::new();
        let conv = Conversion::compute(Type::STRING, Type::INT, &symbols, false);
        assert!(conv.is_invalid());
    }
}
