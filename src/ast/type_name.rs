use crate::lexer::Span;

use super::Identifier;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum RefKind {
    None,
    Ref,
    RefRef,
}

impl Default for RefKind {
    fn default() -> Self {
        RefKind::None
    }
}

/// `[const] <type-id> [& | &&]`, or a function type
/// `[const] <ret>(<params...>) [& | &&]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QualifiedType {
    pub is_const: bool,
    pub ref_kind: RefKind,
    pub kind: TypeNameKind,
    pub span: Span,
}

impl QualifiedType {
    pub fn named(id: Identifier) -> Self {
        let span = id.span();
        QualifiedType {
            is_const: false,
            ref_kind: RefKind::None,
            kind: TypeNameKind::Named(id),
            span,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.kind, TypeNameKind::Auto)
    }

    pub fn is_function_type(&self) -> bool {
        matches!(self.kind, TypeNameKind::Function(_))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TypeNameKind {
    Auto,
    Named(Identifier),
    Function(Box<FunctionTypeName>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionTypeName {
    pub return_type: QualifiedType,
    pub params: Vec<QualifiedType>,
}
