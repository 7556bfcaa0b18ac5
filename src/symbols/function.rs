use std::fmt;
use std::rc::Rc;

use crate::ast::AccessSpecifier;
use crate::operators::OperatorKind;
use crate::types::{Prototype, Type};

use super::{FunctionId, Symbol, TemplateArgument, TemplateId};

/// Identity of a host-registered native callback. The compiler only maps
/// these to function symbols; invoking them is the interpreter's job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NativeFunctionId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionName {
    Name(String),
    Operator(OperatorKind),
    LiteralOperator(String),
    Constructor,
    Destructor,
    Cast(Type),
}

impl FunctionName {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FunctionName::Name(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionName::Name(s) => f.write_str(s),
            FunctionName::Operator(op) => write!(f, "{op}"),
            FunctionName::LiteralOperator(suffix) => write!(f, "operator\"\"{suffix}"),
            FunctionName::Constructor => f.write_str("<constructor>"),
            FunctionName::Destructor => f.write_str("<destructor>"),
            FunctionName::Cast(_) => f.write_str("<cast>"),
        }
    }
}

/// `defaulted` and `deleted` are mutually exclusive; only constructors may
/// be `explicit`; only non-static member functions may be `const` or
/// `virtual`. The compiler checks these before building a function.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct FunctionFlags(u16);

impl FunctionFlags {
    const STATIC: u16 = 0x01;
    const CONST: u16 = 0x02;
    const VIRTUAL: u16 = 0x04;
    const PURE: u16 = 0x08;
    const DELETED: u16 = 0x10;
    const DEFAULTED: u16 = 0x20;
    const EXPLICIT: u16 = 0x40;

    pub fn is_static(self) -> bool {
        self.0 & Self::STATIC != 0
    }

    pub fn is_const(self) -> bool {
        self.0 & Self::CONST != 0
    }

    pub fn is_virtual(self) -> bool {
        self.0 & Self::VIRTUAL != 0
    }

    pub fn is_pure(self) -> bool {
        self.0 & Self::PURE != 0
    }

    pub fn is_deleted(self) -> bool {
        self.0 & Self::DELETED != 0
    }

    pub fn is_defaulted(self) -> bool {
        self.0 & Self::DEFAULTED != 0
    }

    pub fn is_explicit(self) -> bool {
        self.0 & Self::EXPLICIT != 0
    }

    pub fn set_static(&mut self) {
        self.0 |= Self::STATIC;
    }

    pub fn set_const(&mut self) {
        self.0 |= Self::CONST;
    }

    pub fn set_virtual(&mut self) {
        self.0 |= Self::VIRTUAL;
    }

    pub fn set_pure(&mut self) {
        self.0 |= Self::VIRTUAL | Self::PURE;
    }

    pub fn set_deleted(&mut self) {
        self.0 |= Self::DELETED;
    }

    pub fn set_defaulted(&mut self) {
        self.0 |= Self::DEFAULTED;
    }

    pub fn set_explicit(&mut self) {
        self.0 |= Self::EXPLICIT;
    }
}

/// Binding of a function symbol to its executable form.
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Declared but not yet compiled.
    None,
    Native(NativeFunctionId),
    Program(Rc<crate::program::Statement>),
}

#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub name: FunctionName,
    /// For non-static member functions (constructors included) the first
    /// parameter is the implicit object, tagged with the this-parameter
    /// flag.
    pub prototype: Prototype,
    pub flags: FunctionFlags,
    pub access: AccessSpecifier,
    pub owner: Option<Symbol>,
    pub body: FunctionBody,
    /// Compiled default-argument expressions, one per trailing defaulted
    /// parameter, in parameter order.
    pub default_arguments: Vec<Rc<crate::program::Expression>>,
    pub instance_of: Option<TemplateId>,
    pub template_arguments: Vec<TemplateArgument>,
    pub vtable_index: Option<usize>,
}

impl Function {
    pub fn new(name: FunctionName, prototype: Prototype) -> Self {
        Self {
            id: FunctionId(0),
            name,
            prototype,
            flags: FunctionFlags::default(),
            access: AccessSpecifier::Public,
            owner: None,
            body: FunctionBody::None,
            default_arguments: vec![],
            instance_of: None,
            template_arguments: vec![],
            vtable_index: None,
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self.owner, Some(Symbol::Class(_)))
    }

    pub fn member_of(&self) -> Option<crate::types::ClassId> {
        match self.owner {
            Some(Symbol::Class(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.name, FunctionName::Constructor)
    }

    pub fn is_destructor(&self) -> bool {
        matches!(self.name, FunctionName::Destructor)
    }

    pub fn is_cast(&self) -> bool {
        matches!(self.name, FunctionName::Cast(_))
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.name, FunctionName::Operator(_))
    }

    pub fn operator_kind(&self) -> Option<OperatorKind> {
        match self.name {
            FunctionName::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Number of leading implicit-object parameters in the prototype.
    pub fn implicit_param_count(&self) -> usize {
        if self.is_member() && !self.flags.is_static() {
            1
        } else {
            0
        }
    }

    /// Number of parameters the call site provides explicitly.
    pub fn explicit_param_count(&self) -> usize {
        self.prototype.count() - self.implicit_param_count()
    }

    pub fn return_type(&self) -> Type {
        self.prototype.return_type
    }

    pub fn is_template_instance(&self) -> bool {
        self.instance_of.is_some()
    }

    /// Index of the first parameter covered by a default argument.
    pub fn first_defaulted_param(&self) -> usize {
        self.prototype.count() - self.default_arguments.len()
    }
}
