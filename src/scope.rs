//! Scope chains.
//!
//! A scope is a cons-cell `(frame, parent)`: a cheap-to-clone handle onto
//! a chain of frames. Frames either reference registry symbols
//! (namespace, class, enum), carry compilation state (function locals,
//! lambda captures, template parameters/arguments), or expose
//! host-provided bindings (context). Injections — `using` directives and
//! declarations, aliases — attach to the node they were declared in and
//! are consulted after the frame's own members.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::symbols::{Capture, NamespaceId, TemplateArgument, TemplateParameter};
use crate::types::{ClassId, EnumId, Type};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Scope {
    node: Option<Rc<ScopeNode>>,
}

#[derive(Debug)]
struct ScopeNode {
    frame: ScopeFrame,
    injections: RefCell<Vec<Injection>>,
    parent: Scope,
}

#[derive(Debug, Clone)]
pub enum ScopeFrame {
    Namespace(NamespaceId),
    Class(ClassId),
    Enum(EnumId),
    /// Root scope of a script being compiled: its namespace plus the
    /// global-variable table under construction.
    Script {
        script: usize,
        namespace: NamespaceId,
        globals: Rc<RefCell<Vec<(String, Type)>>>,
    },
    Function(Rc<RefCell<FunctionFrame>>),
    Lambda(Rc<LambdaFrame>),
    TemplateParameters(Rc<TemplateParameterFrame>),
    TemplateArguments(Rc<TemplateArgumentFrame>),
    /// Host-provided bindings for command-style compilation.
    Context {
        context: usize,
        variables: Rc<IndexMap<String, Value>>,
    },
}

/// Local-variable stack of the function being compiled. Nested blocks
/// share the same frame; shadowing resolves to the innermost binding and
/// block exit truncates back to the block's start length.
#[derive(Debug, Default)]
pub struct FunctionFrame {
    pub locals: Vec<Local>,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub ty: Type,
    pub index: usize,
}

impl FunctionFrame {
    pub fn find(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find(|l| l.name == name)
    }
}

/// Captures visible while compiling a lambda body.
#[derive(Debug)]
pub struct LambdaFrame {
    pub captures: Vec<Capture>,
}

impl LambdaFrame {
    pub fn capture_index(&self, name: &str) -> Option<usize> {
        self.captures.iter().position(|c| c.name == name)
    }
}

/// Binds template parameter names; lookup yields the parameter index.
#[derive(Debug)]
pub struct TemplateParameterFrame {
    pub names: Vec<String>,
}

/// Binds already-deduced template arguments: a reference to a parameter
/// is replaced by its value.
#[derive(Debug)]
pub struct TemplateArgumentFrame {
    pub parameters: Vec<TemplateParameter>,
    pub arguments: Vec<TemplateArgument>,
}

impl TemplateArgumentFrame {
    pub fn argument_for(&self, name: &str) -> Option<&TemplateArgument> {
        let index = self.parameters.iter().position(|p| p.name == name)?;
        self.arguments.get(index)
    }
}

#[derive(Debug, Clone)]
pub enum Injection {
    /// `using namespace N`
    Namespace(NamespaceId),
    /// `using alias = T`, or a local typedef
    TypeAlias(String, Type),
    /// `namespace A = X::Y::Z`
    NamespaceAlias(String, Vec<String>),
    /// `using X::f` where `f` names functions
    UsingFunctions(String, Vec<crate::symbols::FunctionId>),
    /// `using X::C` where `C` names a type
    UsingType(String, Type),
    /// `using X::Inner` where `Inner` is a namespace
    UsingNamespace(String, NamespaceId),
}

impl Scope {
    pub fn new(frame: ScopeFrame) -> Self {
        Scope::default().child(frame)
    }

    pub fn child(&self, frame: ScopeFrame) -> Scope {
        Scope {
            node: Some(Rc::new(ScopeNode {
                frame,
                injections: RefCell::new(vec![]),
                parent: self.clone(),
            })),
        }
    }

    pub fn parent(&self) -> Scope {
        match &self.node {
            Some(node) => node.parent.clone(),
            None => Scope::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn frame(&self) -> Option<ScopeFrame> {
        self.node.as_ref().map(|n| n.frame.clone())
    }

    /// Adds an injection to the innermost frame.
    pub fn inject(&self, injection: Injection) {
        if let Some(node) = &self.node {
            node.injections.borrow_mut().push(injection);
        }
    }

    pub fn injections(&self) -> Vec<Injection> {
        match &self.node {
            Some(node) => node.injections.borrow().clone(),
            None => vec![],
        }
    }

    /// Frames from innermost to outermost.
    pub fn chain(&self) -> Vec<Scope> {
        let mut result = vec![];
        let mut current = self.clone();
        while current.node.is_some() {
            result.push(current.clone());
            current = current.parent();
        }
        result
    }

    /// The innermost class frame, if any.
    pub fn current_class(&self) -> Option<ClassId> {
        for scope in self.chain() {
            if let Some(ScopeFrame::Class(id)) = scope.frame() {
                return Some(id);
            }
        }
        None
    }

    /// The innermost function frame, if any.
    pub fn function_frame(&self) -> Option<Rc<RefCell<FunctionFrame>>> {
        for scope in self.chain() {
            if let Some(ScopeFrame::Function(frame)) = scope.frame() {
                return Some(frame);
            }
        }
        None
    }

    pub fn lambda_frame(&self) -> Option<Rc<LambdaFrame>> {
        for scope in self.chain() {
            if let Some(ScopeFrame::Lambda(frame)) = scope.frame() {
                return Some(frame);
            }
        }
        None
    }

    /// The namespace new symbols should be registered into.
    pub fn enclosing_namespace(&self) -> Option<NamespaceId> {
        for scope in self.chain() {
            match scope.frame() {
                Some(ScopeFrame::Namespace(ns)) => return Some(ns),
                Some(ScopeFrame::Script { namespace, .. }) => return Some(namespace),
                _ => {}
            }
        }
        None
    }

    /// The innermost class or namespace, as the owner of new symbols.
    pub fn enclosing_symbol(&self) -> Option<crate::symbols::Symbol> {
        for scope in self.chain() {
            match scope.frame() {
                Some(ScopeFrame::Namespace(ns)) => {
                    return Some(crate::symbols::Symbol::Namespace(ns))
                }
                Some(ScopeFrame::Script { namespace, .. }) => {
                    return Some(crate::symbols::Symbol::Namespace(namespace))
                }
                Some(ScopeFrame::Class(id)) => return Some(crate::symbols::Symbol::Class(id)),
                _ => {}
            }
        }
        None
    }

    pub fn script_frame(&self) -> Option<(usize, NamespaceId, Rc<RefCell<Vec<(String, Type)>>>)> {
        for scope in self.chain() {
            if let Some(ScopeFrame::Script {
                script,
                namespace,
                globals,
            }) = scope.frame()
            {
                return Some((script, namespace, globals));
            }
        }
        None
    }

    pub fn template_argument_frame(&self) -> Option<Rc<TemplateArgumentFrame>> {
        for scope in self.chain() {
            if let Some(ScopeFrame::TemplateArguments(frame)) = scope.frame() {
                return Some(frame);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_chain_order() {
        let root = Scope::new(ScopeFrame::Namespace(NamespaceId(0)));
        let class = root.child(ScopeFrame::Class(ClassId(1)));
        let frames = class.chain();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0].frame(), Some(ScopeFrame::Class(_))));
        assert!(matches!(
            frames[1].frame(),
            Some(ScopeFrame::Namespace(_))
        ));
    }

    #[test]
    fn test_function_frame_shadowing() {
        let mut frame = FunctionFrame::default();
        frame.locals.push(Local {
            name: "x".into(),
            ty: Type::INT,
            index: 0,
        });
        frame.locals.push(Local {
            name: "x".into(),
            ty: Type::DOUBLE,
            index: 1,
        });

        assert_eq!(frame.find("x").unwrap().index, 1);
    }
}
