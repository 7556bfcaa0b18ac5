//! Operator identities shared by the parser, the symbol registry and the
//! compiler. An overloadable operator is identified by its [`OperatorKind`],
//! never by its lexeme.

use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum OperatorKind {
    // assignment family
    Assignment,
    AdditionAssignment,
    SubstractionAssignment,
    MultiplicationAssignment,
    DivisionAssignment,
    RemainderAssignment,
    LeftShiftAssignment,
    RightShiftAssignment,
    BitwiseAndAssignment,
    BitwiseOrAssignment,
    BitwiseXorAssignment,
    // arithmetic
    Addition,
    Substraction,
    Multiplication,
    Division,
    Remainder,
    UnaryPlus,
    UnaryMinus,
    // comparison
    Equality,
    Inequality,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    // logical
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    // bitwise
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LeftShift,
    RightShift,
    // increment / decrement
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    // misc
    FunctionCall,
    Subscript,
    MemberAccess,
    ScopeResolution,
    Conditional,
    Comma,
}

/// Operator fixity as the expression parser sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    LeftToRight,
    RightToLeft,
}

impl OperatorKind {
    /// The token spelled after the `operator` keyword, e.g. `"+="`.
    pub fn symbol(self) -> &'static str {
        use OperatorKind::*;
        match self {
            Assignment => "=",
            AdditionAssignment => "+=",
            SubstractionAssignment => "-=",
            MultiplicationAssignment => "*=",
            DivisionAssignment => "/=",
            RemainderAssignment => "%=",
            LeftShiftAssignment => "<<=",
            RightShiftAssignment => ">>=",
            BitwiseAndAssignment => "&=",
            BitwiseOrAssignment => "|=",
            BitwiseXorAssignment => "^=",
            Addition | UnaryPlus => "+",
            Substraction | UnaryMinus => "-",
            Multiplication => "*",
            Division => "/",
            Remainder => "%",
            Equality => "==",
            Inequality => "!=",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            LogicalAnd => "&&",
            LogicalOr => "||",
            LogicalNot => "!",
            BitwiseAnd => "&",
            BitwiseOr => "|",
            BitwiseXor => "^",
            BitwiseNot => "~",
            LeftShift => "<<",
            RightShift => ">>",
            PreIncrement | PostIncrement => "++",
            PreDecrement | PostDecrement => "--",
            FunctionCall => "()",
            Subscript => "[]",
            MemberAccess => ".",
            ScopeResolution => "::",
            Conditional => "?:",
            Comma => ",",
        }
    }

    pub fn is_binary(self) -> bool {
        !matches!(
            self,
            OperatorKind::UnaryPlus
                | OperatorKind::UnaryMinus
                | OperatorKind::LogicalNot
                | OperatorKind::BitwiseNot
                | OperatorKind::PreIncrement
                | OperatorKind::PreDecrement
                | OperatorKind::PostIncrement
                | OperatorKind::PostDecrement
                | OperatorKind::FunctionCall
                | OperatorKind::Subscript
                | OperatorKind::Conditional
        )
    }

    pub fn is_assignment(self) -> bool {
        use OperatorKind::*;
        matches!(
            self,
            Assignment
                | AdditionAssignment
                | SubstractionAssignment
                | MultiplicationAssignment
                | DivisionAssignment
                | RemainderAssignment
                | LeftShiftAssignment
                | RightShiftAssignment
                | BitwiseAndAssignment
                | BitwiseOrAssignment
                | BitwiseXorAssignment
        )
    }

    /// Binding power for the precedence-climbing expression parser.
    /// Higher binds tighter; 0 means "not an infix operator".
    pub fn precedence(self) -> u8 {
        use OperatorKind::*;
        match self {
            ScopeResolution => 16,
            MemberAccess | FunctionCall | Subscript | PostIncrement | PostDecrement => 15,
            UnaryPlus | UnaryMinus | LogicalNot | BitwiseNot | PreIncrement | PreDecrement => 14,
            Multiplication | Division | Remainder => 13,
            Addition | Substraction => 12,
            LeftShift | RightShift => 11,
            Less | Greater | LessEqual | GreaterEqual => 10,
            Equality | Inequality => 9,
            BitwiseAnd => 8,
            BitwiseXor => 7,
            BitwiseOr => 6,
            LogicalAnd => 5,
            LogicalOr => 4,
            Conditional => 3,
            Assignment | AdditionAssignment | SubstractionAssignment | MultiplicationAssignment
            | DivisionAssignment | RemainderAssignment | LeftShiftAssignment
            | RightShiftAssignment | BitwiseAndAssignment | BitwiseOrAssignment
            | BitwiseXorAssignment => 2,
            Comma => 1,
        }
    }

    pub fn associativity(self) -> Associativity {
        if self.is_assignment() || self == OperatorKind::Conditional {
            Associativity::RightToLeft
        } else {
            Associativity::LeftToRight
        }
    }

    /// Parses the symbol following the `operator` keyword in an operator
    /// overload declaration. Prefix/postfix `++`/`--` are disambiguated
    /// later from the parameter count, so both map to the `Pre` variant.
    pub fn from_overload_symbol(sym: &str) -> Option<OperatorKind> {
        use OperatorKind::*;
        let op = match sym {
            "=" => Assignment,
            "+=" => AdditionAssignment,
            "-=" => SubstractionAssignment,
            "*=" => MultiplicationAssignment,
            "/=" => DivisionAssignment,
            "%=" => RemainderAssignment,
            "<<=" => LeftShiftAssignment,
            ">>=" => RightShiftAssignment,
            "&=" => BitwiseAndAssignment,
            "|=" => BitwiseOrAssignment,
            "^=" => BitwiseXorAssignment,
            "+" => Addition,
            "-" => Substraction,
            "*" => Multiplication,
            "/" => Division,
            "%" => Remainder,
            "==" => Equality,
            "!=" => Inequality,
            "<" => Less,
            ">" => Greater,
            "<=" => LessEqual,
            ">=" => GreaterEqual,
            "&&" => LogicalAnd,
            "||" => LogicalOr,
            "!" => LogicalNot,
            "&" => BitwiseAnd,
            "|" => BitwiseOr,
            "^" => BitwiseXor,
            "~" => BitwiseNot,
            "<<" => LeftShift,
            ">>" => RightShift,
            "++" => PreIncrement,
            "--" => PreDecrement,
            "()" => FunctionCall,
            "[]" => Subscript,
            "," => Comma,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operator{}", self.symbol())
    }
}
