//! The engine: owner of the symbol registries, scripts, contexts, modules
//! and the native-callback registry.
//!
//! Setup pre-registers the primitive types' built-in operators and the
//! `Array<T>` / `InitializerList<T>` class templates; everything else is
//! created by compiling scripts or by host registration. Executing
//! compiled programs is the interpreter's concern, not this crate's.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::compiler::Compiler;
use crate::diagnostic::DiagnosticMessage;
use crate::operators::OperatorKind;
use crate::program;
use crate::source::SourceFile;
use crate::symbols::{
    Function, FunctionBody, FunctionId, FunctionName, NamespaceId, NativeFunctionId,
    SymbolTable, TemplateArgument, TemplateId,
};
use crate::types::{ClassId, Prototype, Type};
use crate::value::Value;

/// Identity of a registered native callback.
#[derive(Debug, Clone)]
pub struct NativeEntry {
    pub name: String,
}

pub type ModuleLoadFunction = fn(&mut Engine, usize) -> Result<(), ModuleError>;
pub type ModuleCleanupFunction = fn(&mut Engine, usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    pub message: String,
}

#[derive(Clone)]
pub enum ModuleKind {
    Native {
        load: ModuleLoadFunction,
        cleanup: ModuleCleanupFunction,
    },
    Source(SourceFile),
}

impl std::fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Native { .. } => f.write_str("Native"),
            ModuleKind::Source(_) => f.write_str("Source"),
        }
    }
}

/// A named module; loading happens on first import.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub kind: ModuleKind,
    pub namespace: NamespaceId,
    pub loaded: bool,
}

/// A compiled (or failed) script.
#[derive(Debug)]
pub struct Script {
    pub id: usize,
    pub source: SourceFile,
    pub namespace: Option<NamespaceId>,
    /// Global variables in declaration order.
    pub globals: Vec<(String, Type)>,
    /// Compiled initializers, to be run in declaration order.
    pub global_initializers: Vec<(usize, Rc<program::Expression>)>,
    /// Top-level statements, compiled into one function.
    pub root_function: Option<FunctionId>,
    pub messages: Vec<DiagnosticMessage>,
    pub compiled: bool,
}

impl Script {
    pub fn global_index(&self, name: &str) -> Option<usize> {
        self.globals.iter().position(|(n, _)| n == name)
    }
}

/// Host-bound variables for command-style compilation.
#[derive(Debug, Default)]
pub struct Context {
    pub id: usize,
    pub variables: IndexMap<String, Value>,
}

pub struct Engine {
    pub symbols: SymbolTable,
    pub scripts: Vec<Script>,
    pub contexts: Vec<Context>,
    pub modules: Vec<Module>,
    natives: Vec<NativeEntry>,
}

impl Engine {
    pub fn new() -> Self {
        let mut engine = Self {
            symbols: SymbolTable::new(),
            scripts: vec![],
            contexts: vec![],
            modules: vec![],
            natives: vec![],
        };
        engine.register_builtin_operators();
        engine
    }

    // value factory

    pub fn new_bool(&self, value: bool) -> Value {
        Value::Bool(value)
    }

    pub fn new_char(&self, value: char) -> Value {
        Value::Char(value)
    }

    pub fn new_int(&self, value: i64) -> Value {
        Value::Int(value)
    }

    pub fn new_float(&self, value: f32) -> Value {
        Value::Float(value)
    }

    pub fn new_double(&self, value: f64) -> Value {
        Value::Double(value)
    }

    pub fn new_string(&self, value: impl Into<String>) -> Value {
        Value::String(value.into())
    }

    // registries

    pub fn root_namespace(&self) -> NamespaceId {
        self.symbols.root()
    }

    pub fn type_name(&self, t: Type) -> String {
        self.symbols.type_name(t)
    }

    pub fn register_native_callback(&mut self, name: &str) -> NativeFunctionId {
        let id = NativeFunctionId(self.natives.len());
        self.natives.push(NativeEntry {
            name: name.to_string(),
        });
        id
    }

    pub fn native_callback(&self, id: NativeFunctionId) -> Option<&NativeEntry> {
        self.natives.get(id.0)
    }

    // scripts

    pub fn new_script(&mut self, source: SourceFile) -> usize {
        self.new_script_id(source)
    }

    pub(crate) fn new_script_id(&mut self, source: SourceFile) -> usize {
        let id = self.scripts.len();
        self.scripts.push(Script {
            id,
            source,
            namespace: None,
            globals: vec![],
            global_initializers: vec![],
            root_function: None,
            messages: vec![],
            compiled: false,
        });
        id
    }

    /// Compiles a script. On failure the script reports `false` and
    /// exposes the accumulated messages; no partial symbols remain.
    pub fn compile(&mut self, script: usize) -> bool {
        let mut compiler = Compiler::new(self);
        compiler.compile_script(script)
    }

    pub fn script(&self, id: usize) -> &Script {
        &self.scripts[id]
    }

    // contexts

    pub fn new_context(&mut self) -> usize {
        let id = self.contexts.len();
        self.contexts.push(Context {
            id,
            variables: IndexMap::new(),
        });
        id
    }

    pub fn context_mut(&mut self, id: usize) -> &mut Context {
        &mut self.contexts[id]
    }

    /// Compiles a single expression against a context.
    pub fn compile_command(
        &mut self,
        source: &str,
        context: usize,
    ) -> Result<program::Expression, Vec<DiagnosticMessage>> {
        let source = SourceFile::from_string(source);
        let mut compiler = Compiler::new(self);
        match compiler.guarded(|c| c.compile_command(&source, context)) {
            Some(expr) => Ok(expr),
            None => Err(std::mem::take(&mut compiler.session.messages)),
        }
    }

    /// Resolves a qualified-type string against the root namespace, e.g.
    /// `const int &` or `Array<double>`.
    pub fn type_id(&mut self, name: &str) -> Result<Type, Vec<DiagnosticMessage>> {
        let source = SourceFile::from_string(name);
        let qt = crate::parser::parse_type(&source).map_err(|e| {
            vec![crate::diagnostic::MessageBuilder::error()
                .part(&e)
                .build()]
        })?;

        let mut compiler = Compiler::new(self);
        let scope = crate::scope::Scope::new(crate::scope::ScopeFrame::Namespace(
            crate::symbols::NamespaceId(0),
        ));
        match compiler.guarded(|c| c.resolve_type(&qt, &scope)) {
            Some(t) => Ok(t),
            None => Err(std::mem::take(&mut compiler.session.messages)),
        }
    }

    /// Requests a class-template instance, e.g. `Array<int>`, running a
    /// compile session as needed.
    pub fn instantiate(
        &mut self,
        template: TemplateId,
        args: Vec<TemplateArgument>,
    ) -> Result<ClassId, Vec<DiagnosticMessage>> {
        let mut compiler = Compiler::new(self);
        match compiler.guarded(|c| {
            c.instantiate_class_template(template, args, crate::lexer::Span::default())
        }) {
            Some(class) => Ok(class),
            None => Err(std::mem::take(&mut compiler.session.messages)),
        }
    }

    // modules

    pub fn new_module(
        &mut self,
        name: &str,
        load: ModuleLoadFunction,
        cleanup: ModuleCleanupFunction,
    ) -> usize {
        let root = self.symbols.root();
        let id = self.modules.len();
        self.modules.push(Module {
            name: name.to_string(),
            kind: ModuleKind::Native { load, cleanup },
            namespace: root,
            loaded: false,
        });
        id
    }

    pub fn new_source_module(&mut self, name: &str, source: SourceFile) -> usize {
        let root = self.symbols.root();
        let id = self.modules.len();
        self.modules.push(Module {
            name: name.to_string(),
            kind: ModuleKind::Source(source),
            namespace: root,
            loaded: false,
        });
        id
    }

    pub fn get_module(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name == name)
    }

    // built-in operators

    fn builtin_operator(
        &mut self,
        op: OperatorKind,
        return_type: Type,
        params: Vec<Type>,
    ) -> FunctionId {
        let label = format!("builtin::{}({})", op, params.len());
        let callback = self.register_native_callback(&label);

        let mut f = Function::new(
            FunctionName::Operator(op),
            Prototype::new(return_type, params),
        );
        f.body = FunctionBody::Native(callback);
        let root = self.symbols.root();
        f.owner = Some(crate::symbols::Symbol::Namespace(root));
        let id = self.symbols.add_function(f);
        self.symbols.namespace_mut(root).operators.push(id);
        id
    }

    /// The operator set of the fundamental types, registered as native
    /// functions in the root namespace so overload resolution treats them
    /// like any other candidates.
    fn register_builtin_operators(&mut self) {
        use OperatorKind::*;

        let numeric = [Type::INT, Type::FLOAT, Type::DOUBLE];
        let comparable = [
            Type::BOOLEAN,
            Type::CHAR,
            Type::INT,
            Type::FLOAT,
            Type::DOUBLE,
            Type::STRING,
        ];
        let assignable = comparable;

        for t in numeric {
            for op in [Addition, Substraction, Multiplication, Division] {
                self.builtin_operator(op, t, vec![t, t]);
            }
            for op in [UnaryPlus, UnaryMinus] {
                self.builtin_operator(op, t, vec![t]);
            }
            for op in [
                AdditionAssignment,
                SubstractionAssignment,
                MultiplicationAssignment,
                DivisionAssignment,
            ] {
                self.builtin_operator(op, Type::reference(t), vec![Type::reference(t), t]);
            }
            for op in [PreIncrement, PreDecrement] {
                self.builtin_operator(op, Type::reference(t), vec![Type::reference(t)]);
            }
            for op in [PostIncrement, PostDecrement] {
                self.builtin_operator(op, t, vec![Type::reference(t)]);
            }
        }

        self.builtin_operator(Remainder, Type::INT, vec![Type::INT, Type::INT]);
        self.builtin_operator(
            RemainderAssignment,
            Type::reference(Type::INT),
            vec![Type::reference(Type::INT), Type::INT],
        );

        for op in [LeftShift, RightShift, BitwiseAnd, BitwiseOr, BitwiseXor] {
            self.builtin_operator(op, Type::INT, vec![Type::INT, Type::INT]);
        }
        for op in [
            LeftShiftAssignment,
            RightShiftAssignment,
            BitwiseAndAssignment,
            BitwiseOrAssignment,
            BitwiseXorAssignment,
        ] {
            self.builtin_operator(
                op,
                Type::reference(Type::INT),
                vec![Type::reference(Type::INT), Type::INT],
            );
        }
        self.builtin_operator(BitwiseNot, Type::INT, vec![Type::INT]);

        for t in comparable {
            for op in [Equality, Inequality] {
                self.builtin_operator(op, Type::BOOLEAN, vec![t, t]);
            }
            if t != Type::BOOLEAN {
                for op in [Less, Greater, LessEqual, GreaterEqual] {
                    self.builtin_operator(op, Type::BOOLEAN, vec![t, t]);
                }
            }
        }

        for t in assignable {
            self.builtin_operator(
                Assignment,
                Type::reference(t),
                vec![Type::reference(t), t],
            );
        }

        for op in [LogicalAnd, LogicalOr] {
            self.builtin_operator(op, Type::BOOLEAN, vec![Type::BOOLEAN, Type::BOOLEAN]);
        }
        self.builtin_operator(LogicalNot, Type::BOOLEAN, vec![Type::BOOLEAN]);

        self.builtin_operator(Addition, Type::STRING, vec![Type::STRING, Type::STRING]);
        self.builtin_operator(
            AdditionAssignment,
            Type::reference(Type::STRING),
            vec![Type::reference(Type::STRING), Type::STRING],
        );
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_factory() {
        let engine = Engine::new();
        assert_eq!(engine.new_int(3).static_type(), Type::INT);
        assert_eq!(engine.new_double(1.5).static_type(), Type::DOUBLE);
        assert_eq!(engine.new_string("x").static_type(), Type::STRING);
    }

    #[test]
    fn test_builtin_operators_are_visible() {
        let engine = Engine::new();
        let root = engine.symbols.namespace(engine.root_namespace());
        assert!(!root.operators.is_empty());
    }

    #[test]
    fn test_module_registry() {
        fn load(_: &mut Engine, _: usize) -> Result<(), ModuleError> {
            Ok(())
        }
        fn cleanup(_: &mut Engine, _: usize) {}

        let mut engine = Engine::new();
        engine.new_module("io", load, cleanup);
        assert!(engine.get_module("io").is_some());
        assert!(engine.get_module("nope").is_none());
    }
}
