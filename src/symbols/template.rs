use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast;
use crate::types::{ClassId, Type};

use super::{FunctionId, NativeFunctionId, Symbol, TemplateId};

/// A canonical template argument. The ordering used to key instance maps
/// is: bool < integer < type, then by value/id; packs compare
/// element-wise.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum TemplateArgument {
    Bool(bool),
    Integer(i64),
    Type(Type),
    Pack(Vec<TemplateArgument>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateParameterKind {
    /// `typename T`
    Type,
    /// `int N`, `bool B`
    NonType(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParameter {
    pub name: String,
    pub kind: TemplateParameterKind,
    pub is_pack: bool,
    pub default_value: Option<Rc<ast::TemplateArg>>,
}

impl TemplateParameter {
    pub fn type_param(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TemplateParameterKind::Type,
            is_pack: false,
            default_value: None,
        }
    }

    pub fn non_type(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind: TemplateParameterKind::NonType(ty),
            is_pack: false,
            default_value: None,
        }
    }
}

/// Built-in class templates instantiated by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeClassBackend {
    Array,
    InitializerList,
}

#[derive(Debug, Clone)]
pub enum TemplateDefinition {
    NativeClass(NativeClassBackend),
    SourceClass(Rc<ast::ClassDecl>),
    /// Every instance binds the same host callback.
    NativeFunction(NativeFunctionId),
    SourceFunction(Rc<ast::FunctionDecl>),
}

impl TemplateDefinition {
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            TemplateDefinition::NativeClass(_) | TemplateDefinition::NativeFunction(_)
        )
    }
}

/// A class-template partial specialization: its own parameter list plus
/// the argument pattern it matches.
#[derive(Debug, Clone)]
pub struct PartialSpecialization {
    pub parameters: Vec<TemplateParameter>,
    pub arguments: Vec<ast::TemplateArg>,
    pub decl: Rc<ast::ClassDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateInstance {
    Class(ClassId),
    Function(FunctionId),
}

#[derive(Debug)]
pub struct Template {
    pub id: TemplateId,
    pub kind: TemplateKind,
    pub name: String,
    pub parameters: Vec<TemplateParameter>,
    pub enclosing: Symbol,
    pub definition: TemplateDefinition,
    /// Instance table keyed by canonical argument vectors.
    pub instances: BTreeMap<Vec<TemplateArgument>, TemplateInstance>,
    pub specializations: Vec<PartialSpecialization>,
}

impl Template {
    pub fn native_class(
        name: impl Into<String>,
        parameters: Vec<TemplateParameter>,
        enclosing: Symbol,
        backend: NativeClassBackend,
    ) -> Self {
        Self {
            id: TemplateId(0),
            kind: TemplateKind::Class,
            name: name.into(),
            parameters,
            enclosing,
            definition: TemplateDefinition::NativeClass(backend),
            instances: BTreeMap::new(),
            specializations: vec![],
        }
    }

    pub fn source_class(
        name: impl Into<String>,
        parameters: Vec<TemplateParameter>,
        enclosing: Symbol,
        decl: Rc<ast::ClassDecl>,
    ) -> Self {
        Self {
            id: TemplateId(0),
            kind: TemplateKind::Class,
            name: name.into(),
            parameters,
            enclosing,
            definition: TemplateDefinition::SourceClass(decl),
            instances: BTreeMap::new(),
            specializations: vec![],
        }
    }

    pub fn source_function(
        name: impl Into<String>,
        parameters: Vec<TemplateParameter>,
        enclosing: Symbol,
        decl: Rc<ast::FunctionDecl>,
    ) -> Self {
        Self {
            id: TemplateId(0),
            kind: TemplateKind::Function,
            name: name.into(),
            parameters,
            enclosing,
            definition: TemplateDefinition::SourceFunction(decl),
            instances: BTreeMap::new(),
            specializations: vec![],
        }
    }

    pub fn has_instance(&self, args: &[TemplateArgument]) -> bool {
        self.instances.contains_key(args)
    }

    pub fn get_instance(&self, args: &[TemplateArgument]) -> Option<TemplateInstance> {
        self.instances.get(args).copied()
    }

    pub fn set_instance(&mut self, args: Vec<TemplateArgument>, instance: TemplateInstance) {
        self.instances.insert(args, instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_ordering() {
        // bool < integer < type
        assert!(TemplateArgument::Bool(true) < TemplateArgument::Integer(0));
        assert!(TemplateArgument::Integer(i64::MAX) < TemplateArgument::Type(Type::VOID));
        assert!(TemplateArgument::Type(Type::INT) < TemplateArgument::Type(Type::FLOAT));
        assert!(TemplateArgument::Integer(1) < TemplateArgument::Integer(2));
    }
}
