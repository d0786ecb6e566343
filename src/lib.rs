//! Lowers `yield(value)` generator methods of a Java AST into iterator
//! state machines.
//!
//! The front end hands over a [`ast::ClassDecl`]; [`lower::process_class`]
//! rewrites every generator method in place and reports misuse through a
//! [`diagnostics::DiagnosticSink`]. [`interp::Interpreter`] runs a class
//! before or after lowering, and [`printer`] renders the result as Java.

pub mod ast;
pub mod builder;
pub mod diagnostics;
pub mod inject;
pub mod interp;
pub mod lower;
pub mod printer;

pub use diagnostics::{DiagnosticSink, Diagnostics};
pub use lower::{Anchor, LowerOptions, Outcome, lower_method, process_class};
