//! An embeddable, statically-typed scripting language with a C++-flavored
//! surface: classes with single inheritance and virtual dispatch,
//! templates, operator overloading, lambdas, namespaces, enums and
//! user-defined literals.
//!
//! This crate is the front-end pipeline: source text is tokenized
//! ([`lexer`]), parsed into an AST ([`parser`], [`ast`]) and lowered by
//! the semantic compiler ([`compiler`]) into a typed program
//! representation ([`program`]), resolving names ([`name_lookup`],
//! [`scope`]), overloads and conversions, and instantiating templates
//! ([`template_engine`]) on demand. Executing the produced program is the
//! host interpreter's job.
//!
//! ```no_run
//! use libscript::{Engine, SourceFile};
//!
//! let mut engine = Engine::new();
//! let script = engine.new_script(SourceFile::from_string("int a = 2; a = a + 1;"));
//! if !engine.compile(script) {
//!     for message in &engine.script(script).messages {
//!         eprintln!("{message}");
//!     }
//! }
//! ```

pub mod ast;
pub mod compiler;
pub mod diagnostic;
pub mod engine;
pub mod lexer;
pub mod name_lookup;
pub mod operators;
pub mod parser;
pub mod program;
pub mod scope;
pub mod source;
pub mod symbols;
pub mod template_engine;
pub mod types;
pub mod value;

pub use engine::{Context, Engine, Module, Script};
pub use source::SourceFile;
pub use types::Type;
pub use value::Value;
