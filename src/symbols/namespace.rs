use std::collections::HashMap;

use indexmap::IndexMap;

use crate::types::{ClassId, EnumId, Type};
use crate::value::Value;

use super::{FunctionId, NamespaceId, TemplateId};

#[derive(Debug)]
pub struct Namespace {
    pub id: NamespaceId,
    /// Empty for the root namespace and for script root namespaces.
    pub name: String,
    pub enclosing: Option<NamespaceId>,
    pub namespaces: Vec<NamespaceId>,
    pub classes: Vec<ClassId>,
    pub enums: Vec<EnumId>,
    /// Free functions grouped by name, in declaration order.
    pub functions: IndexMap<String, Vec<FunctionId>>,
    pub operators: Vec<FunctionId>,
    pub literal_operators: Vec<FunctionId>,
    pub templates: Vec<TemplateId>,
    /// Host-exposed variables; looked up as `VariableName`.
    pub variables: IndexMap<String, Value>,
    pub type_aliases: HashMap<String, Type>,
    /// `namespace A = X::Y::Z` rewriting rules.
    pub namespace_aliases: HashMap<String, Vec<String>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, enclosing: Option<NamespaceId>) -> Self {
        Self {
            id: NamespaceId(0),
            name: name.into(),
            enclosing,
            namespaces: vec![],
            classes: vec![],
            enums: vec![],
            functions: IndexMap::new(),
            operators: vec![],
            literal_operators: vec![],
            templates: vec![],
            variables: IndexMap::new(),
            type_aliases: HashMap::new(),
            namespace_aliases: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, name: impl Into<String>, f: FunctionId) {
        self.functions.entry(name.into()).or_default().push(f);
    }
}
