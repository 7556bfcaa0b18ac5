use crate::lexer::Span;
use crate::operators::OperatorKind;

use super::{Expression, QualifiedType};

/// A possibly qualified, possibly templated name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Identifier {
    Simple {
        name: String,
        span: Span,
    },
    /// `operator+`, `operator()`, ...
    Operator {
        op: OperatorKind,
        span: Span,
    },
    /// `operator"" _suffix`
    LiteralOperator {
        suffix: String,
        span: Span,
    },
    /// `name<arg, ...>`
    Template {
        name: String,
        arguments: Vec<TemplateArg>,
        span: Span,
    },
    /// `lhs::rhs`
    Scoped {
        lhs: Box<Identifier>,
        rhs: Box<Identifier>,
        span: Span,
    },
}

impl Identifier {
    pub fn simple(name: impl Into<String>, span: Span) -> Self {
        Identifier::Simple {
            name: name.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Identifier::Simple { span, .. }
            | Identifier::Operator { span, .. }
            | Identifier::LiteralOperator { span, .. }
            | Identifier::Template { span, .. }
            | Identifier::Scoped { span, .. } => *span,
        }
    }

    /// The unqualified name, for simple and template identifiers.
    pub fn plain_name(&self) -> Option<&str> {
        match self {
            Identifier::Simple { name, .. } | Identifier::Template { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The trailing component of a qualified name, or the identifier itself.
    pub fn rightmost(&self) -> &Identifier {
        match self {
            Identifier::Scoped { rhs, .. } => rhs.rightmost(),
            other => other,
        }
    }

    pub fn is_qualified(&self) -> bool {
        matches!(self, Identifier::Scoped { .. })
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Simple { name, .. } => f.write_str(name),
            Identifier::Operator { op, .. } => write!(f, "{op}"),
            Identifier::LiteralOperator { suffix, .. } => write!(f, "operator\"\"{suffix}"),
            Identifier::Template { name, arguments, .. } => {
                write!(f, "{name}<")?;
                for (i, _) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str("_")?;
                }
                f.write_str(">")
            }
            Identifier::Scoped { lhs, rhs, .. } => write!(f, "{lhs}::{rhs}"),
        }
    }
}

/// One entry of a template argument list. The parser prefers the type
/// reading whenever the tokens form a well-formed type; anything else is
/// kept as an expression to be evaluated as a constant.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TemplateArg {
    Type(QualifiedType),
    Expr(Expression),
}

impl TemplateArg {
    pub fn span(&self) -> Span {
        match self {
            TemplateArg::Type(t) => t.span,
            TemplateArg::Expr(e) => e.span(),
        }
    }
}
