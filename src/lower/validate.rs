//! Validator: return capability, signature rules and forbidden constructs.

use super::error::UsageError;
use super::scan::{self, Visitor};
use crate::ast::*;
use std::convert::Infallible;
use std::ops::ControlFlow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceKind {
    /// `Iterator<T>`: a lazy pull sequence.
    Iterator,
    /// `Iterable<T>`: a producer of pull sequences.
    Iterable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Capability {
    pub kind: SequenceKind,
    pub element: TypeRef,
}

/// Unqualified calls to these would resolve to the generated class.
const PROTOCOL_METHODS: [&str; 5] = ["hasNext", "next", "remove", "iterator", "getNext"];

pub(crate) const STATE_FIELD: &str = "$state";
pub(crate) const HAS_NEXT_FIELD: &str = "$hasNext";
pub(crate) const NEXT_DEFINED_FIELD: &str = "$nextDefined";
pub(crate) const NEXT_FIELD: &str = "$next";
pub(crate) const ITERATOR_FIELD_PREFIX: &str = "$iter";

fn is_reserved(name: &str) -> bool {
    [STATE_FIELD, HAS_NEXT_FIELD, NEXT_DEFINED_FIELD, NEXT_FIELD].contains(&name)
        || name.starts_with(ITERATOR_FIELD_PREFIX)
}

pub fn return_capability(ty: &TypeRef) -> Option<Capability> {
    let TypeRef::Named { name, args } = ty else {
        return None;
    };
    let kind = match name.as_str() {
        "Iterator" | "java.util.Iterator" => SequenceKind::Iterator,
        "Iterable" | "java.lang.Iterable" => SequenceKind::Iterable,
        _ => return None,
    };
    let element = match args.as_slice() {
        [] => TypeRef::simple("Object"),
        [element] => element.clone(),
        _ => return None,
    };
    Some(Capability { kind, element })
}

pub(crate) fn validate(method: &MethodDecl) -> Result<Capability, Vec<UsageError>> {
    let mut errors = Vec::new();

    if method.is_constructor() {
        errors.push(UsageError::Constructor { span: method.span });
    }

    let capability = method.return_type.as_ref().and_then(return_capability);
    if capability.is_none() && !method.is_constructor() {
        errors.push(UsageError::WrongReturnType {
            method: method.name.clone(),
            span: method.span,
        });
    }

    for param in &method.params {
        if !param.is_final {
            errors.push(UsageError::NonFinalParameter {
                name: param.name.clone(),
                span: param.span,
            });
        }
        if is_reserved(&param.name) {
            errors.push(UsageError::ReservedName {
                name: param.name.clone(),
                span: param.span,
            });
        }
    }

    if let Some(body) = &method.body {
        let mut checker = BodyChecker {
            span: method.span,
            errors: &mut errors,
        };
        let ControlFlow::Continue(()) = scan::walk_statements(&mut checker, body);
    }

    match capability {
        Some(capability) if errors.is_empty() => Ok(capability),
        _ => Err(errors),
    }
}

struct BodyChecker<'e> {
    span: Span,
    errors: &'e mut Vec<UsageError>,
}

impl BodyChecker<'_> {
    fn check_local(&mut self, decl: &LocalDecl) {
        if is_reserved(&decl.name) {
            self.errors.push(UsageError::ReservedName {
                name: decl.name.clone(),
                span: decl.span,
            });
        }
    }
}

impl Visitor for BodyChecker<'_> {
    type Break = Infallible;

    fn statement(&mut self, stmt: &Statement) -> ControlFlow<Infallible> {
        match stmt {
            Statement::Return(_) => self.errors.push(UsageError::Return { span: self.span }),
            Statement::Local(decl) => self.check_local(decl),
            Statement::ForEach(fe) => self.check_local(&fe.var),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn expression(&mut self, expr: &Expression, statement_level: bool) -> ControlFlow<Infallible> {
        let span = self.span;
        match expr {
            Expression::This => self.errors.push(UsageError::UnqualifiedThis { span }),
            Expression::Super => self.errors.push(UsageError::UnqualifiedSuper { span }),
            Expression::Call(call) if scan::is_yield_call(call) => {
                if call.args.len() != 1 {
                    self.errors.push(UsageError::YieldArity {
                        found: call.args.len(),
                        span,
                    });
                }
                if !statement_level {
                    self.errors.push(UsageError::YieldInExpression { span });
                }
            }
            Expression::Call(call)
                if call.receiver.is_none() && PROTOCOL_METHODS.contains(&call.name.as_str()) =>
            {
                self.errors.push(UsageError::ShadowedMethod {
                    name: call.name.clone(),
                    span,
                });
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    fn iterator_of(elem: &str) -> TypeRef {
        TypeRef::generic("java.util.Iterator", vec![TypeRef::simple(elem)])
    }

    #[test]
    fn recognizes_both_sequence_forms() {
        let it = return_capability(&iterator_of("String")).unwrap();
        assert_eq!(it.kind, SequenceKind::Iterator);
        assert_eq!(it.element, TypeRef::simple("String"));

        let raw = return_capability(&TypeRef::simple("Iterable")).unwrap();
        assert_eq!(raw.kind, SequenceKind::Iterable);
        assert_eq!(raw.element, TypeRef::simple("Object"));

        assert!(return_capability(&TypeRef::simple("java.util.List")).is_none());
    }

    #[test]
    fn rejects_wrong_return_type() {
        let m = method("items")
            .returns(TypeRef::simple("int"))
            .body(vec![yield_value(int(1))])
            .build();
        let errors = validate(&m).unwrap_err();
        assert!(matches!(errors[0], UsageError::WrongReturnType { .. }));
    }

    #[test]
    fn rejects_non_final_parameters() {
        let mut p = param(TypeRef::simple("int"), "n");
        p.is_final = false;
        let m = method("items")
            .returns(iterator_of("Integer"))
            .param(p)
            .body(vec![yield_value(name("n"))])
            .build();
        let errors = validate(&m).unwrap_err();
        assert_eq!(
            errors,
            vec![UsageError::NonFinalParameter {
                name: "n".into(),
                span: Span::DUMMY,
            }]
        );
    }

    #[test]
    fn collects_every_body_violation() {
        let m = method("items")
            .returns(iterator_of("Object"))
            .body(vec![
                yield_value(Expression::This),
                expr_stmt(call("hasNext", vec![])),
                expr_stmt(call("log", vec![call("yield", vec![int(1)])])),
                return_stmt(Some(int(0))),
            ])
            .build();
        let errors = validate(&m).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], UsageError::UnqualifiedThis { .. }));
        assert!(matches!(errors[1], UsageError::ShadowedMethod { .. }));
        assert!(matches!(errors[2], UsageError::YieldInExpression { .. }));
        assert!(matches!(errors[3], UsageError::Return { .. }));
    }

    #[test]
    fn qualified_this_is_fine() {
        let m = method("items")
            .returns(iterator_of("Object"))
            .body(vec![yield_value(Expression::QualifiedThis("Outer".into()))])
            .build();
        assert!(validate(&m).is_ok());
    }
}
