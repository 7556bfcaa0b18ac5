//! Symbol registries: classes, enums, functions, namespaces, templates,
//! closure and function types.
//!
//! Symbols live in index-addressed tables owned by a single
//! [`SymbolTable`]; the ids embedded in [`Type`] tags and IR nodes index
//! into these tables. Every symbol carries a back-pointer to its
//! enclosing symbol, forming a tree rooted at the global namespace.

mod class;
mod enumeration;
mod function;
mod namespace;
mod template;

pub use class::*;
pub use enumeration::*;
pub use function::*;
pub use namespace::*;
pub use template::*;

use std::collections::HashMap;

use crate::types::{ClassId, ClosureId, EnumId, FunctionTypeId, Prototype, Type};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_id!(FunctionId);
arena_id!(NamespaceId);
arena_id!(TemplateId);

/// Reference to any symbol in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Namespace(NamespaceId),
    Class(ClassId),
    Enum(EnumId),
    Function(FunctionId),
    Template(TemplateId),
}

/// Ids of the built-in class templates registered at setup.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinTemplates {
    pub array: TemplateId,
    pub initializer_list: TemplateId,
}

#[derive(Debug)]
pub struct SymbolTable {
    pub classes: Vec<Class>,
    pub enums: Vec<Enum>,
    pub closures: Vec<ClosureType>,
    pub function_types: Vec<FunctionType>,
    function_type_ids: HashMap<Prototype, FunctionTypeId>,
    pub functions: Vec<Function>,
    pub namespaces: Vec<Namespace>,
    pub templates: Vec<Template>,
    pub builtins: BuiltinTemplates,
}

/// Table sizes at the start of a compile session; rolling back truncates
/// to these and prunes dangling references from surviving symbols.
#[derive(Debug, Clone, Copy)]
pub struct Watermark {
    classes: usize,
    enums: usize,
    closures: usize,
    function_types: usize,
    functions: usize,
    namespaces: usize,
    templates: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            classes: vec![],
            enums: vec![],
            closures: vec![],
            function_types: vec![],
            function_type_ids: HashMap::new(),
            functions: vec![],
            namespaces: vec![],
            templates: vec![],
            builtins: BuiltinTemplates {
                array: TemplateId(0),
                initializer_list: TemplateId(0),
            },
        };

        let root = table.add_namespace(Namespace::new(String::new(), None));
        debug_assert_eq!(root, NamespaceId(0));

        let array = table.add_template(Template::native_class(
            "Array",
            vec![TemplateParameter::type_param("T")],
            Symbol::Namespace(root),
            NativeClassBackend::Array,
        ));
        let initializer_list = table.add_template(Template::native_class(
            "InitializerList",
            vec![TemplateParameter::type_param("T")],
            Symbol::Namespace(root),
            NativeClassBackend::InitializerList,
        ));
        table.builtins = BuiltinTemplates {
            array,
            initializer_list,
        };

        table
    }

    pub fn root(&self) -> NamespaceId {
        NamespaceId(0)
    }

    // accessors

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.index()]
    }

    pub fn enumeration(&self, id: EnumId) -> &Enum {
        &self.enums[id.index()]
    }

    pub fn enumeration_mut(&mut self, id: EnumId) -> &mut Enum {
        &mut self.enums[id.index()]
    }

    pub fn closure(&self, id: ClosureId) -> &ClosureType {
        &self.closures[id.index()]
    }

    pub fn closure_mut(&mut self, id: ClosureId) -> &mut ClosureType {
        &mut self.closures[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.index()]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.index()]
    }

    pub fn template_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.templates[id.index()]
    }

    // type-directed accessors

    pub fn get_class(&self, t: Type) -> Option<&Class> {
        t.class_id().map(|id| self.class(id))
    }

    pub fn get_enum(&self, t: Type) -> Option<&Enum> {
        t.enum_id().map(|id| self.enumeration(id))
    }

    pub fn get_lambda(&self, t: Type) -> Option<&ClosureType> {
        t.closure_id().map(|id| self.closure(id))
    }

    pub fn get_function_type(&self, t: Type) -> Option<&FunctionType> {
        t.function_type_id().map(|id| &self.function_types[id.index()])
    }

    /// Interns a function type: requesting the same prototype twice
    /// returns the same id.
    pub fn intern_function_type(&mut self, prototype: Prototype) -> FunctionTypeId {
        if let Some(id) = self.function_type_ids.get(&prototype) {
            return *id;
        }

        let id = FunctionTypeId(self.function_types.len() as u16);
        self.function_types.push(FunctionType {
            id,
            prototype: prototype.clone(),
            assignment: None,
        });
        self.function_type_ids.insert(prototype, id);
        id
    }

    /// True iff `t` is an instance of the built-in `InitializerList<T>`
    /// class template.
    pub fn is_initializer_list(&self, t: Type) -> bool {
        match self.get_class(t) {
            Some(class) => class.instance_of == Some(self.builtins.initializer_list),
            None => false,
        }
    }

    pub fn is_array(&self, t: Type) -> bool {
        match self.get_class(t) {
            Some(class) => class.instance_of == Some(self.builtins.array),
            None => false,
        }
    }

    // creation + registration into the enclosing symbol

    pub fn add_namespace(&mut self, ns: Namespace) -> NamespaceId {
        let id = NamespaceId(self.namespaces.len());
        let parent = ns.enclosing;
        self.namespaces.push(ns);
        self.namespaces[id.index()].id = id;
        if let Some(parent) = parent {
            self.namespace_mut(parent).namespaces.push(id);
        }
        id
    }

    pub fn add_class(&mut self, class: Class) -> ClassId {
        let id = ClassId(self.classes.len() as u16);
        let enclosing = class.enclosing;
        self.classes.push(class);
        self.classes[id.index()].id = id;
        match enclosing {
            Symbol::Namespace(ns) => self.namespace_mut(ns).classes.push(id),
            Symbol::Class(parent) => self.class_mut(parent).classes.push(id),
            _ => {}
        }
        id
    }

    pub fn add_enum(&mut self, e: Enum) -> EnumId {
        let id = EnumId(self.enums.len() as u16);
        let enclosing = e.enclosing;
        self.enums.push(e);
        self.enums[id.index()].id = id;
        match enclosing {
            Symbol::Namespace(ns) => self.namespace_mut(ns).enums.push(id),
            Symbol::Class(parent) => self.class_mut(parent).enums.push(id),
            _ => {}
        }
        id
    }

    /// Adds a function to the table without registering it anywhere; the
    /// caller attaches it to its owner.
    pub fn add_function(&mut self, f: Function) -> FunctionId {
        let id = FunctionId(self.functions.len());
        self.functions.push(f);
        self.functions[id.index()].id = id;
        id
    }

    pub fn add_closure(&mut self, closure: ClosureType) -> ClosureId {
        let id = ClosureId(self.closures.len() as u16);
        self.closures.push(closure);
        self.closures[id.index()].id = id;
        id
    }

    pub fn add_template(&mut self, t: Template) -> TemplateId {
        let id = TemplateId(self.templates.len());
        let enclosing = t.enclosing;
        self.templates.push(t);
        self.templates[id.index()].id = id;
        match enclosing {
            Symbol::Namespace(ns) => self.namespace_mut(ns).templates.push(id),
            Symbol::Class(parent) => self.class_mut(parent).templates.push(id),
            _ => {}
        }
        id
    }

    // rollback

    pub fn watermark(&self) -> Watermark {
        Watermark {
            classes: self.classes.len(),
            enums: self.enums.len(),
            closures: self.closures.len(),
            function_types: self.function_types.len(),
            functions: self.functions.len(),
            namespaces: self.namespaces.len(),
            templates: self.templates.len(),
        }
    }

    /// Removes every symbol created after the watermark and prunes
    /// references to them from surviving symbols.
    pub fn rollback_to(&mut self, w: &Watermark) {
        log::debug!(
            "rolling back symbols: {} classes, {} functions, {} namespaces",
            self.classes.len() - w.classes,
            self.functions.len() - w.functions,
            self.namespaces.len() - w.namespaces,
        );

        self.classes.truncate(w.classes);
        self.enums.truncate(w.enums);
        self.closures.truncate(w.closures);
        self.function_types.truncate(w.function_types);
        self.functions.truncate(w.functions);
        self.namespaces.truncate(w.namespaces);
        self.templates.truncate(w.templates);

        self.function_type_ids
            .retain(|_, id| id.index() < w.function_types);

        let class_ok = |id: &ClassId| id.index() < w.classes;
        let enum_ok = |id: &EnumId| id.index() < w.enums;
        let fn_ok = |id: &FunctionId| id.index() < w.functions;
        let ns_ok = |id: &NamespaceId| id.index() < w.namespaces;
        let tpl_ok = |id: &TemplateId| id.index() < w.templates;

        for ns in &mut self.namespaces {
            ns.namespaces.retain(ns_ok);
            ns.classes.retain(class_ok);
            ns.enums.retain(enum_ok);
            ns.templates.retain(tpl_ok);
            ns.operators.retain(fn_ok);
            ns.literal_operators.retain(fn_ok);
            for group in ns.functions.values_mut() {
                group.retain(fn_ok);
            }
            ns.functions.retain(|_, group| !group.is_empty());
        }

        for class in &mut self.classes {
            class.classes.retain(class_ok);
            class.enums.retain(enum_ok);
            class.templates.retain(tpl_ok);
            class.constructors.retain(fn_ok);
            class.operators.retain(fn_ok);
            class.casts.retain(fn_ok);
            class.vtable.retain(fn_ok);
            if class.destructor.map(|id| !fn_ok(&id)).unwrap_or(false) {
                class.destructor = None;
            }
            for group in class.methods.values_mut() {
                group.retain(fn_ok);
            }
            class.methods.retain(|_, group| !group.is_empty());
        }

        for template in &mut self.templates {
            template.instances.retain(|_, instance| match instance {
                TemplateInstance::Class(id) => class_ok(id),
                TemplateInstance::Function(id) => fn_ok(id),
            });
        }
    }

    /// Canonical printable form of a type, e.g. `const int &`.
    pub fn type_name(&self, t: Type) -> String {
        let base = t.base_type();
        let mut name = if base == Type::VOID {
            "void".to_string()
        } else if base == Type::BOOLEAN {
            "bool".to_string()
        } else if base == Type::CHAR {
            "char".to_string()
        } else if base == Type::INT {
            "int".to_string()
        } else if base == Type::FLOAT {
            "float".to_string()
        } else if base == Type::DOUBLE {
            "double".to_string()
        } else if base == Type::STRING {
            "string".to_string()
        } else if base == Type::AUTO {
            "auto".to_string()
        } else if base == Type::NULL {
            "null".to_string()
        } else if base == Type::INITIALIZER_LIST {
            "initializer-list".to_string()
        } else if let Some(class) = self.get_class(base) {
            if let Some(tid) = class.instance_of {
                let args = class
                    .template_arguments
                    .iter()
                    .map(|a| self.template_argument_name(a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{}>", self.template(tid).name, args)
            } else {
                class.name.clone()
            }
        } else if let Some(e) = self.get_enum(base) {
            e.name.clone()
        } else if let Some(ft) = base.function_type_id() {
            let proto = &self.function_types[ft.index()].prototype;
            let params = proto
                .params
                .iter()
                .map(|p| self.type_name(*p))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({})", self.type_name(proto.return_type), params)
        } else if base.is_closure_type() {
            "<lambda>".to_string()
        } else {
            "<invalid>".to_string()
        };

        if t.is_const() {
            name = format!("const {name}");
        }
        if t.is_reference() {
            name = format!("{name} &");
        } else if t.is_forward_reference() {
            name = format!("{name} &&");
        }
        name
    }

    fn template_argument_name(&self, arg: &TemplateArgument) -> String {
        match arg {
            TemplateArgument::Bool(b) => format!("{b}"),
            TemplateArgument::Integer(n) => format!("{n}"),
            TemplateArgument::Type(t) => self.type_name(*t),
            TemplateArgument::Pack(args) => args
                .iter()
                .map(|a| self.template_argument_name(a))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Walks the base chain starting at `class`, innermost first.
    pub fn class_and_bases(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(base) = self.class(current).base {
            chain.push(base);
            current = base;
        }
        chain
    }

    /// True iff `derived` is `base` or (transitively) inherits from it.
    pub fn derives_from(&self, derived: ClassId, base: ClassId) -> bool {
        self.class_and_bases(derived).contains(&base)
    }

    /// Depth of the derived-to-base walk, when there is one.
    pub fn inheritance_depth(&self, derived: ClassId, base: ClassId) -> Option<usize> {
        self.class_and_bases(derived)
            .iter()
            .position(|&c| c == base)
    }

    /// Total number of data members, inherited first.
    pub fn field_count(&self, class: ClassId) -> usize {
        let c = self.class(class);
        let inherited = c.base.map(|b| self.field_count(b)).unwrap_or(0);
        inherited + c.data_members.len()
    }

    /// Finds a data member by name in the class or its bases; the index is
    /// cumulative over the inherited-first layout.
    pub fn find_data_member(&self, class: ClassId, name: &str) -> Option<(ClassId, usize)> {
        let c = self.class(class);
        let offset = c.base.map(|b| self.field_count(b)).unwrap_or(0);

        if let Some(pos) = c.data_members.iter().position(|m| m.name == name) {
            return Some((class, offset + pos));
        }

        c.base.and_then(|b| self.find_data_member(b, name))
    }

    /// A class with any pure-virtual member in its virtual table is
    /// abstract.
    pub fn is_abstract(&self, class: ClassId) -> bool {
        self.class(class)
            .vtable
            .iter()
            .any(|f| self.function(*f).flags.is_pure())
    }

    pub fn default_constructor(&self, class: ClassId) -> Option<FunctionId> {
        self.class(class)
            .constructors
            .iter()
            .copied()
            .find(|&f| self.function(f).prototype.count() == 1)
    }

    pub fn copy_constructor(&self, class: ClassId) -> Option<FunctionId> {
        let class_ref = Type::const_reference(Type::object(class));
        self.class(class)
            .constructors
            .iter()
            .copied()
            .find(|&f| {
                let proto = &self.function(f).prototype;
                proto.count() == 2 && proto.at(1) == class_ref
            })
    }

    pub fn is_default_constructible(&self, class: ClassId) -> bool {
        self.default_constructor(class)
            .map(|f| !self.function(f).flags.is_deleted())
            .unwrap_or(false)
    }

    pub fn is_copy_constructible(&self, class: ClassId) -> bool {
        self.copy_constructor(class)
            .map(|f| !self.function(f).flags.is_deleted())
            .unwrap_or(false)
    }

    pub fn is_destructible(&self, class: ClassId) -> bool {
        self.class(class)
            .destructor
            .map(|f| !self.function(f).flags.is_deleted())
            .unwrap_or(false)
    }

    /// The name of the enclosing chain of a symbol, for diagnostics.
    pub fn symbol_name(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Namespace(id) => self.namespace(id).name.clone(),
            Symbol::Class(id) => self.class(id).name.clone(),
            Symbol::Enum(id) => self.enumeration(id).name.clone(),
            Symbol::Function(id) => self.function(id).name.to_string(),
            Symbol::Template(id) => self.template(id).name.clone(),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_type_interning() {
        let mut table = SymbolTable::new();
        let proto = Prototype::new(Type::INT, vec![Type::INT, Type::BOOLEAN]);

        let a = table.intern_function_type(proto.clone());
        let b = table.intern_function_type(proto);
        assert_eq!(a, b);

        let c = table.intern_function_type(Prototype::new(Type::INT, vec![]));
        assert_ne!(a, c);
    }

    #[test]
    fn test_builtin_templates_are_registered() {
        let table = SymbolTable::new();
        let root = table.namespace(table.root());
        assert_eq!(root.templates.len(), 2);
        assert_eq!(table.template(table.builtins.array).name, "Array");
        assert_eq!(
            table.template(table.builtins.initializer_list).name,
            "InitializerList"
        );
    }

    #[test]
    fn test_type_name_of_qualified_types() {
        let table = SymbolTable::new();
        assert_eq!(table.type_name(Type::INT), "int");
        assert_eq!(table.type_name(Type::INT.with_const()), "const int");
        assert_eq!(
            table.type_name(Type::const_reference(Type::DOUBLE)),
            "const double &"
        );
        assert_eq!(
            table.type_name(Type::forward_reference(Type::BOOLEAN)),
            "bool &&"
        );
    }
}
