//! Command-style compilation.
//!
//! Compiles a single expression against a host context: the context frame
//! exposing the host's bound variables sits between the function frame
//! and the root namespace. Assignments to context variables lower to bind
//! expressions; lambdas appearing in a command must be captureless.

use std::rc::Rc;

use crate::parser;
use crate::program;
use crate::scope::{Scope, ScopeFrame};
use crate::source::SourceFile;

use super::errors::{CResult, CompilationFailure, CompileError};
use super::function_compiler::FunctionContext;
use super::Compiler;

impl Compiler<'_> {
    pub fn compile_command(
        &mut self,
        source: &SourceFile,
        context: usize,
    ) -> CResult<program::Expression> {
        let expr = match parser::parse_expression(source) {
            Ok(expr) => expr,
            Err(e) => {
                return Err(CompilationFailure {
                    kind: CompileError::SyntaxError(e.to_string()),
                    location: Some(e.location()),
                })
            }
        };

        let variables = Rc::new(self.engine.contexts[context].variables.clone());
        let scope = Scope::new(ScopeFrame::Namespace(self.symbols().root())).child(
            ScopeFrame::Context {
                context,
                variables,
            },
        );

        let mut ctx = FunctionContext::new(scope);
        ctx.command_mode = true;

        self.compile_expression(&mut ctx, &expr)
    }
}
