//! State-machine synthesizer: wraps the resolved trampoline cases into a
//! local iterator class and rewrites the method to return an instance.

use super::promote::Captures;
use super::validate::{
    Capability, HAS_NEXT_FIELD, NEXT_DEFINED_FIELD, NEXT_FIELD, STATE_FIELD, SequenceKind,
};
use crate::ast::*;
use crate::builder::*;
use crate::inject::{inject_field, inject_method, inject_type};

pub(crate) fn class_name(prefix: &str, method: &str) -> String {
    let mut chars = method.chars();
    match chars.next() {
        Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

fn private_field(ty: TypeRef, name: &str, span: Span) -> FieldDecl {
    field_decl(ty, name)
        .modifiers(Modifiers::PRIVATE)
        .at(span)
        .build()
}

fn iterator_of(element: &TypeRef) -> TypeRef {
    TypeRef::generic("java.util.Iterator", vec![element.clone()])
}

pub(crate) fn synthesize(
    type_name: &str,
    capability: &Capability,
    captures: Captures,
    cases: Vec<SwitchCase>,
    span: Span,
) -> ClassDecl {
    let element = capability.element.clone().boxed();
    let mut builder = class(type_name)
        .modifiers(Modifiers::FINAL)
        .at(span)
        .implements(iterator_of(&element));
    if capability.kind == SequenceKind::Iterable {
        let iterable = TypeRef::generic("java.lang.Iterable", vec![element.clone()]);
        builder = builder.implements(iterable);
    }
    let mut decl = builder.build();

    let boolean = TypeRef::simple("boolean");
    for field in [
        private_field(TypeRef::simple("int"), STATE_FIELD, span),
        private_field(boolean.clone(), HAS_NEXT_FIELD, span),
        private_field(boolean.clone(), NEXT_DEFINED_FIELD, span),
        private_field(element.clone(), NEXT_FIELD, span),
    ] {
        inject_field(&mut decl, field);
    }
    for mut field in captures.into_fields() {
        field.span = span;
        inject_field(&mut decl, field);
    }

    let public = Modifiers::PUBLIC;
    let exhausted = throw_new(TypeRef::simple("java.util.NoSuchElementException"));
    let unsupported = throw_new(TypeRef::simple("java.lang.UnsupportedOperationException"));
    inject_method(
        &mut decl,
        method("hasNext")
            .modifiers(public)
            .returns(boolean.clone())
            .body(vec![
                if_stmt(
                    not(name(NEXT_DEFINED_FIELD)),
                    block(vec![
                        assign_stmt(name(HAS_NEXT_FIELD), call("getNext", Vec::new())),
                        assign_stmt(name(NEXT_DEFINED_FIELD), bool_lit(true)),
                    ]),
                ),
                return_stmt(Some(name(HAS_NEXT_FIELD))),
            ])
            .at(span)
            .build(),
    );
    inject_method(
        &mut decl,
        method("next")
            .modifiers(public)
            .returns(element.clone())
            .body(vec![
                if_stmt(
                    not(call("hasNext", Vec::new())),
                    block(vec![exhausted]),
                ),
                assign_stmt(name(NEXT_DEFINED_FIELD), bool_lit(false)),
                return_stmt(Some(name(NEXT_FIELD))),
            ])
            .at(span)
            .build(),
    );
    inject_method(
        &mut decl,
        method("remove")
            .modifiers(public)
            .body(vec![unsupported])
            .at(span)
            .build(),
    );
    if capability.kind == SequenceKind::Iterable {
        let fresh = new_instance(TypeRef::simple(type_name), Vec::new());
        inject_method(
            &mut decl,
            method("iterator")
                .modifiers(public)
                .returns(iterator_of(&element))
                .body(vec![return_stmt(Some(fresh))])
                .at(span)
                .build(),
        );
    }
    let dispatch = Statement::Switch(SwitchStatement {
        selector: name(STATE_FIELD),
        cases,
    });
    inject_method(
        &mut decl,
        method("getNext")
            .modifiers(Modifiers::PRIVATE)
            .returns(boolean)
            .body(vec![while_stmt(bool_lit(true), block(vec![dispatch]))])
            .at(span)
            .build(),
    );
    decl
}

/// Replaces the body of `method` with the class declaration followed by
/// `return new <class>();`.
pub(crate) fn install(method: &mut MethodDecl, decl: ClassDecl) {
    let instance = new_instance(TypeRef::simple(&decl.name), Vec::new());
    method.body = Some(vec![return_stmt(Some(instance))]);
    inject_type(method, decl);
}
