//! Generator lowering.
//!
//! A method whose body calls `yield(value)` is rewritten into a local class
//! implementing `java.util.Iterator` (and `java.lang.Iterable` when the
//! method returns one). The body is cut into segments at every suspension
//! site and re-entered through a `while (true) { switch ($state) { ... } }`
//! trampoline, with the locals that have to survive a suspension promoted
//! to fields of the class.
//!
//! Stages, in order: quick scan, validation, scope tree, reachability,
//! promotion, linearization, label optimization, synthesis. Any stage can
//! abandon the method, which then stays exactly as it was.

mod error;
mod labels;
mod linearize;
mod promote;
mod reach;
mod scan;
mod scope;
mod synth;
mod validate;

pub use error::{LowerError, UsageError};
pub use scan::has_yield;
pub(crate) use scan::is_yield_call;
pub use validate::{Capability, SequenceKind, return_capability};

use crate::ast::{ClassDecl, MethodDecl, Span};
use crate::diagnostics::DiagnosticSink;
use scope::{ScopeArena, ScopeId, ScopeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// Prepended to the capitalized method name to form the class name.
    pub class_prefix: String,
    /// Fold adjacent labels into one state.
    pub coalesce_labels: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            class_prefix: "$Yielder".to_string(),
            coalesce_labels: true,
        }
    }
}

/// Where the request to lower came from; synthesized code is stamped with
/// this span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Anchor {
    pub span: Span,
}

impl Anchor {
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweredMethod {
    pub method: String,
    pub class_name: String,
    /// Number of trampoline states, not counting `default`.
    pub states: usize,
    /// Promoted locals, in declaration order.
    pub captured: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Lowered(LoweredMethod),
    /// No suspension sites, or an internal failure.
    Untouched,
    /// Usage errors were reported; the payload is how many.
    Rejected(usize),
}

pub fn lower_method(
    method: &mut MethodDecl,
    anchor: &Anchor,
    sink: &mut dyn DiagnosticSink,
) -> Outcome {
    lower_method_with(method, anchor, sink, &LowerOptions::default())
}

pub fn lower_method_with(
    method: &mut MethodDecl,
    anchor: &Anchor,
    sink: &mut dyn DiagnosticSink,
    options: &LowerOptions,
) -> Outcome {
    match lower(method, anchor, options) {
        Ok((class, lowered)) => {
            synth::install(method, class);
            debug!(
                target: "jyield::lower",
                method = %lowered.method,
                class = %lowered.class_name,
                states = lowered.states,
                "lowered"
            );
            Outcome::Lowered(lowered)
        }
        Err(LowerError::NotApplicable) => {
            trace!(target: "jyield::lower", method = %method.name, "no yield, skipped");
            Outcome::Untouched
        }
        Err(LowerError::Usage(errors)) => {
            for e in &errors {
                sink.add_error(&e.to_string(), Some(e.span()));
            }
            debug!(
                target: "jyield::lower",
                method = %method.name,
                errors = errors.len(),
                "rejected"
            );
            Outcome::Rejected(errors.len())
        }
        Err(LowerError::Internal(reason)) => {
            debug!(target: "jyield::lower", method = %method.name, %reason, "abandoned");
            Outcome::Untouched
        }
    }
}

/// Runs every stage on a read-only method and returns the class to install.
fn lower(
    method: &MethodDecl,
    anchor: &Anchor,
    options: &LowerOptions,
) -> Result<(ClassDecl, LoweredMethod), LowerError> {
    let body = match &method.body {
        Some(body) if has_yield(body) => body.as_slice(),
        _ => return Err(LowerError::NotApplicable),
    };

    let capability = validate::validate(method)?;
    let mut arena = scope::build(method, body)?;
    reach::close(&mut arena);

    let tries: Vec<_> = arena
        .ids()
        .filter(|&id| arena.is_live(id) && matches!(arena.get(id).kind, ScopeKind::Try))
        .map(|id| live_try_error(&arena, id, method.span))
        .collect();
    if !tries.is_empty() {
        return Err(tries.into());
    }

    let captures = promote::promote(&arena)?;
    let captured = captures.local_names();
    let (mut flat, mut label_arena) = linearize::linearize(&mut arena, &captures, body)?;
    labels::optimize(&mut flat, &mut label_arena, options.coalesce_labels);
    let cases = labels::resolve(&flat, &label_arena)?;

    let class_name = synth::class_name(&options.class_prefix, &method.name);
    let lowered = LoweredMethod {
        method: method.name.clone(),
        class_name: class_name.clone(),
        states: cases.len() - 1,
        captured,
    };
    let class = synth::synthesize(&class_name, &capability, captures, cases, anchor.span);
    Ok((class, lowered))
}

/// A live try either holds a suspension site or is crossed by a jump to a
/// live scope outside it.
fn live_try_error(arena: &ScopeArena<'_>, id: ScopeId, span: Span) -> UsageError {
    let suspends = arena
        .yields()
        .iter()
        .any(|&y| arena.ancestors(y).any(|s| s == id));
    if suspends {
        UsageError::YieldInTry { span }
    } else {
        UsageError::JumpOutOfTry { span }
    }
}

/// Lowers every method of `class` and of its nested types.
pub fn process_class(
    class: &mut ClassDecl,
    anchor: &Anchor,
    sink: &mut dyn DiagnosticSink,
) -> Vec<Outcome> {
    process_class_with(class, anchor, sink, &LowerOptions::default())
}

pub fn process_class_with(
    class: &mut ClassDecl,
    anchor: &Anchor,
    sink: &mut dyn DiagnosticSink,
    options: &LowerOptions,
) -> Vec<Outcome> {
    let mut outcomes: Vec<Outcome> = class
        .methods
        .iter_mut()
        .filter(|m| !m.generated)
        .map(|m| lower_method_with(m, anchor, sink, options))
        .collect();
    for nested in &mut class.types {
        outcomes.extend(process_class_with(nested, anchor, sink, options));
    }
    outcomes
}
