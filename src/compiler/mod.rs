//! The semantic compiler: lowers parsed scripts to typed IR while
//! performing name resolution, overload resolution, conversion and
//! initialization analysis, and on-demand template instantiation.
//!
//! All compilation runs inside a session. The session tracks generated
//! symbols, the declaration/function-compilation state machine and the
//! accumulated diagnostics; on a fatal error it rolls every generated
//! symbol back so no partial state remains in the engine.

mod command_compiler;
mod conversion;
mod errors;
mod expression_compiler;
mod function_compiler;
mod initialization;
mod lambda_compiler;
mod literal_processor;
mod overload_resolution;
mod script_compiler;
mod type_resolver;

pub use conversion::{Conversion, ConversionRank, StandardConversion};
pub use errors::{CResult, CompilationFailure, CompileError};
pub use function_compiler::FunctionContext;
pub use initialization::{Initialization, InitializationKind};
pub use overload_resolution::{
    resolve_overloads, OverloadCandidate, OverloadInputs, OverloadResult,
};

use std::collections::VecDeque;
use std::rc::Rc;

use crate::ast;
use crate::diagnostic::DiagnosticMessage;
use crate::engine::Engine;
use crate::scope::Scope;
use crate::symbols::{FunctionId, Watermark};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ProcessingDeclarations,
    CompilingFunctions,
    Finished,
}

/// Cross-cutting state of one compile transaction. Nested sessions share
/// the outermost one.
#[derive(Debug)]
pub struct CompileSession {
    pub state: SessionState,
    pub messages: Vec<DiagnosticMessage>,
    pub error: bool,
    watermark: Watermark,
    scripts_watermark: usize,
}

impl CompileSession {
    fn new(engine: &Engine) -> Self {
        Self {
            state: SessionState::ProcessingDeclarations,
            messages: vec![],
            error: false,
            watermark: engine.symbols.watermark(),
            scripts_watermark: engine.scripts.len(),
        }
    }

    pub fn log(&mut self, message: DiagnosticMessage) {
        if message.severity() == crate::diagnostic::Severity::Error {
            self.error = true;
        }
        self.messages.push(message);
    }

    pub fn log_failure(&mut self, failure: &CompilationFailure) {
        self.log(failure.to_message());
    }
}

/// A declaration waiting to be (re)processed in a given scope.
#[derive(Debug, Clone)]
pub(crate) struct ScopedDeclaration {
    pub scope: Scope,
    pub decl: ast::Declaration,
    pub access: ast::AccessSpecifier,
}

#[derive(Debug, Clone)]
pub(crate) struct CompileFunctionTask {
    pub function: FunctionId,
    pub decl: Rc<ast::FunctionDecl>,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub(crate) enum VariableInitTask {
    Global {
        script: usize,
        index: usize,
        decl: ast::VariableDecl,
        scope: Scope,
    },
    Static {
        class: crate::types::ClassId,
        name: String,
        decl: ast::VariableDecl,
        scope: Scope,
    },
}

pub struct Compiler<'e> {
    pub(crate) engine: &'e mut Engine,
    pub(crate) session: CompileSession,
    /// Data-member declarations whose types could not be resolved yet.
    pub(crate) member_queue: VecDeque<ScopedDeclaration>,
    /// Function declarations whose signatures could not be resolved yet.
    pub(crate) incomplete_functions: VecDeque<ScopedDeclaration>,
    pub(crate) function_tasks: VecDeque<CompileFunctionTask>,
    pub(crate) variable_tasks: VecDeque<VariableInitTask>,
    /// Classes from the current declaration pass awaiting generation of
    /// their special member functions.
    pub(crate) pending_generation: Vec<(crate::types::ClassId, crate::lexer::Span)>,
    /// Nesting depth of `guarded` calls; only the outermost rolls back.
    depth: usize,
}

impl<'e> Compiler<'e> {
    pub fn new(engine: &'e mut Engine) -> Self {
        let session = CompileSession::new(engine);
        Self {
            engine,
            session,
            member_queue: VecDeque::new(),
            incomplete_functions: VecDeque::new(),
            function_tasks: VecDeque::new(),
            variable_tasks: VecDeque::new(),
            pending_generation: vec![],
            depth: 0,
        }
    }

    pub(crate) fn symbols(&self) -> &crate::symbols::SymbolTable {
        &self.engine.symbols
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut crate::symbols::SymbolTable {
        &mut self.engine.symbols
    }

    /// Runs `f` inside the session, rolling back on failure. Nested calls
    /// share the outer session; only the outermost rolls back.
    pub(crate) fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CResult<T>,
    ) -> Option<T> {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        match result {
            Ok(value) if !self.session.error => Some(value),
            Ok(_) => {
                if self.depth == 0 {
                    self.rollback();
                }
                None
            }
            Err(failure) => {
                self.session.log_failure(&failure);
                if self.depth == 0 {
                    self.rollback();
                }
                None
            }
        }
    }

    fn rollback(&mut self) {
        log::debug!("compile session failed, rolling back generated symbols");
        let watermark = self.session.watermark;
        self.engine.symbols.rollback_to(&watermark);

        for script in &mut self.engine.scripts {
            if script.namespace.map(|ns| ns.index()).unwrap_or(0)
                >= self.engine.symbols.namespaces.len()
            {
                script.namespace = None;
                script.globals.clear();
                script.global_initializers.clear();
                script.root_function = None;
                script.compiled = false;
            }
        }
        self.engine.scripts.truncate(self.session.scripts_watermark);

        // modules loaded during the failed session lost their namespaces
        let namespaces = self.engine.symbols.namespaces.len();
        let root = self.engine.symbols.root();
        for module in &mut self.engine.modules {
            if module.namespace.index() >= namespaces {
                module.namespace = root;
                module.loaded = false;
            }
        }

        self.member_queue.clear();
        self.incomplete_functions.clear();
        self.function_tasks.clear();
        self.variable_tasks.clear();
        self.pending_generation.clear();
        self.session.state = SessionState::Finished;
    }

    /// Drains the function and variable queues until a fixed point, then
    /// finishes the session.
    pub(crate) fn finalize(&mut self) -> CResult<()> {
        self.session.state = SessionState::CompilingFunctions;
        log::trace!("session state: compiling functions");

        loop {
            // template instantiation may re-enter declaration processing
            if !self.member_queue.is_empty()
                || !self.incomplete_functions.is_empty()
                || !self.pending_generation.is_empty()
            {
                self.process_pending_declarations()?;
                self.run_pending_generation()?;
                continue;
            }
            if let Some(task) = self.function_tasks.pop_front() {
                self.compile_function_task(task)?;
                continue;
            }
            if let Some(task) = self.variable_tasks.pop_front() {
                self.initialize_variable(task)?;
                continue;
            }
            break;
        }

        self.session.state = SessionState::Finished;
        log::trace!("session state: finished");
        Ok(())
    }
}
