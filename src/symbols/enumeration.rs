use indexmap::IndexMap;

use crate::types::{EnumId, Type};

use super::{FunctionId, Symbol};

/// A plain or scoped (`enum class`) enumeration. Enumerator names are
/// unique within the enum; values are kept in declaration order.
#[derive(Debug)]
pub struct Enum {
    pub id: EnumId,
    pub name: String,
    pub enclosing: Symbol,
    pub is_enum_class: bool,
    pub values: IndexMap<String, i64>,
    /// Synthesized assignment operator; participates in operator lookup.
    pub assignment: Option<FunctionId>,
}

impl Enum {
    pub fn new(name: impl Into<String>, enclosing: Symbol, is_enum_class: bool) -> Self {
        Self {
            id: EnumId(0),
            name: name.into(),
            enclosing,
            is_enum_class,
            values: IndexMap::new(),
            assignment: None,
        }
    }

    pub fn ty(&self) -> Type {
        Type::enumeration(self.id)
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn has_value(&self, value: i64) -> bool {
        self.values.values().any(|&v| v == value)
    }
}
