//! Diagnostics sink consumed by handlers.

use crate::ast::Span;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.span {
            Some(span) => write!(f, "{level} at {span}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// Where handlers report problems. The driver decides how to surface them.
pub trait DiagnosticSink {
    fn add_error(&mut self, message: &str, span: Option<Span>);
    fn add_warning(&mut self, message: &str, span: Option<Span>);
}

/// A sink that keeps everything it is given, in order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticSink for Diagnostics {
    fn add_error(&mut self, message: &str, span: Option<Span>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            message: message.to_string(),
            span,
        });
    }

    fn add_warning(&mut self, message: &str, span: Option<Span>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            message: message.to_string(),
            span,
        });
    }
}
