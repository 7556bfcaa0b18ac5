use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::AccessSpecifier;
use crate::types::{ClassId, ClosureId, EnumId, FunctionTypeId, Prototype, Type};

use super::{FunctionId, Symbol, TemplateArgument, TemplateId};

#[derive(Debug, Clone, PartialEq)]
pub struct DataMember {
    pub ty: Type,
    pub name: String,
    pub access: AccessSpecifier,
}

#[derive(Debug, Clone)]
pub struct StaticDataMember {
    pub ty: Type,
    pub access: AccessSpecifier,
    /// Compiled initializer, evaluated by the interpreter at load time.
    pub initializer: Option<std::rc::Rc<crate::program::Expression>>,
}

/// A script or native class. Data member offsets are stable: inherited
/// members first, then own members in declaration order.
#[derive(Debug)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub enclosing: Symbol,
    pub base: Option<ClassId>,
    pub is_final: bool,
    pub data_members: Vec<DataMember>,
    pub static_members: IndexMap<String, StaticDataMember>,
    pub constructors: Vec<FunctionId>,
    pub destructor: Option<FunctionId>,
    /// Member functions grouped by name, in declaration order.
    pub methods: IndexMap<String, Vec<FunctionId>>,
    pub operators: Vec<FunctionId>,
    pub casts: Vec<FunctionId>,
    pub classes: Vec<ClassId>,
    pub enums: Vec<EnumId>,
    pub templates: Vec<TemplateId>,
    pub type_aliases: HashMap<String, Type>,
    /// Ordered virtual functions after base merging: the base's entries
    /// first, overrides replacing same-signature entries in place.
    pub vtable: Vec<FunctionId>,
    pub instance_of: Option<TemplateId>,
    pub template_arguments: Vec<TemplateArgument>,
    /// Classes granted access to non-public members.
    pub friends: Vec<ClassId>,
}

impl Class {
    pub fn new(name: impl Into<String>, enclosing: Symbol) -> Self {
        Self {
            id: ClassId(0),
            name: name.into(),
            enclosing,
            base: None,
            is_final: false,
            data_members: vec![],
            static_members: IndexMap::new(),
            constructors: vec![],
            destructor: None,
            methods: IndexMap::new(),
            operators: vec![],
            casts: vec![],
            classes: vec![],
            enums: vec![],
            templates: vec![],
            type_aliases: HashMap::new(),
            vtable: vec![],
            instance_of: None,
            template_arguments: vec![],
            friends: vec![],
        }
    }

    pub fn ty(&self) -> Type {
        Type::object(self.id)
    }

    pub fn is_template_instance(&self) -> bool {
        self.instance_of.is_some()
    }

    pub fn add_method(&mut self, name: impl Into<String>, f: FunctionId) {
        self.methods.entry(name.into()).or_default().push(f);
    }
}

/// The type of a lambda expression: its captures plus the generated
/// `operator()`.
#[derive(Debug)]
pub struct ClosureType {
    pub id: ClosureId,
    pub captures: Vec<Capture>,
    pub call: Option<FunctionId>,
}

impl ClosureType {
    pub fn new(captures: Vec<Capture>) -> Self {
        Self {
            id: ClosureId(0),
            captures,
            call: None,
        }
    }

    pub fn ty(&self) -> Type {
        Type::closure(self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    pub ty: Type,
    pub by_ref: bool,
}

/// Interned function type; carries a lazily-created built-in assignment
/// operator so function variables can be reassigned.
#[derive(Debug)]
pub struct FunctionType {
    pub id: FunctionTypeId,
    pub prototype: Prototype,
    pub assignment: Option<FunctionId>,
}

impl FunctionType {
    pub fn ty(&self) -> Type {
        Type::function(self.id)
    }
}
