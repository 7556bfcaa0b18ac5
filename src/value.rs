//! Runtime values of the primitive types.
//!
//! The compiler only materializes values for literal constants and
//! host-bound context variables; everything else about execution belongs
//! to the interpreter.

use crate::types::{EnumId, Type};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Void,
    Bool(bool),
    Char(char),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// An enumerator constant.
    Enum { enum_id: EnumId, value: i64 },
}

impl Value {
    pub fn static_type(&self) -> Type {
        match self {
            Value::Void => Type::VOID,
            Value::Bool(_) => Type::BOOLEAN,
            Value::Char(_) => Type::CHAR,
            Value::Int(_) => Type::INT,
            Value::Float(_) => Type::FLOAT,
            Value::Double(_) => Type::DOUBLE,
            Value::String(_) => Type::STRING,
            Value::Enum { enum_id, .. } => Type::enumeration(*enum_id),
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Enum { value, .. } => write!(f, "{value}"),
        }
    }
}
