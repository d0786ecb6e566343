//! Variable promotion: locals that must survive a suspension become fields.

use super::error::UsageError;
use super::scope::{ScopeArena, ScopeId, ScopeKind};
use super::validate::ITERATOR_FIELD_PREFIX;
use crate::ast::*;
use crate::builder::field_decl;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub(crate) struct Captures {
    fields: Vec<FieldDecl>,
    by_name: FxHashMap<String, usize>,
    iterators: FxHashMap<ScopeId, String>,
}

impl Captures {
    pub(crate) fn is_promoted(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterator holder for a live foreach.
    pub(crate) fn iterator(&self, foreach: ScopeId) -> Option<&str> {
        self.iterators.get(&foreach).map(String::as_str)
    }

    /// Names of the promoted locals, in declaration order.
    pub(crate) fn local_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| self.by_name.contains_key(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    pub(crate) fn into_fields(self) -> Vec<FieldDecl> {
        self.fields
    }

    fn add_local(&mut self, decl: &LocalDecl) -> Result<(), UsageError> {
        if let Some(&at) = self.by_name.get(&decl.name) {
            let first = &self.fields[at].ty;
            if *first != decl.ty {
                return Err(UsageError::ConflictingCapture {
                    name: decl.name.clone(),
                    first: first.to_string(),
                    second: decl.ty.to_string(),
                    span: decl.span,
                });
            }
            return Ok(());
        }
        self.by_name.insert(decl.name.clone(), self.fields.len());
        self.fields.push(
            field_decl(decl.ty.clone(), &decl.name)
                .modifiers(Modifiers::PRIVATE)
                .at(decl.span)
                .build(),
        );
        Ok(())
    }
}

pub(crate) fn promote(arena: &ScopeArena<'_>) -> Result<Captures, Vec<UsageError>> {
    let mut captures = Captures::default();
    let mut errors = Vec::new();

    for &id in arena.locals() {
        let scope = arena.get(id);
        let ScopeKind::Local(decl) = scope.kind else {
            continue;
        };
        if !scope.parent.is_some_and(|p| arena.is_live(p)) {
            continue;
        }
        if let Err(e) = captures.add_local(decl) {
            errors.push(e);
        }
    }

    for id in arena.ids() {
        if arena.is_live(id) && matches!(arena.get(id).kind, ScopeKind::ForEach(_)) {
            let name = format!("{ITERATOR_FIELD_PREFIX}{}", captures.iterators.len());
            captures.fields.push(
                field_decl(TypeRef::simple("java.util.Iterator"), &name)
                    .modifiers(Modifiers::PRIVATE)
                    .build(),
            );
            captures.iterators.insert(id, name);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    tracing::debug!(
        target: "jyield::lower",
        fields = captures.fields.len(),
        iterators = captures.iterators.len(),
        "locals promoted"
    );
    Ok(captures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;
    use crate::lower::{reach, scope};

    fn run(body: Vec<Statement>) -> Result<(Captures, usize), Vec<UsageError>> {
        let m = method("items")
            .returns(TypeRef::generic("Iterator", vec![TypeRef::simple("Integer")]))
            .param(param(TypeRef::simple("int"), "n"))
            .body(body)
            .build();
        let body = m.body.as_deref().unwrap();
        let mut arena = scope::build(&m, body).unwrap();
        reach::close(&mut arena);
        let locals = arena.locals().len();
        promote(&arena).map(|c| (c, locals))
    }

    #[test]
    fn promotes_only_locals_of_live_scopes() {
        let int_ty = TypeRef::simple("int");
        let (captures, locals) = run(vec![
            local(int_ty.clone(), "a").init(int(1)).stmt(),
            while_stmt(
                name("go"),
                block(vec![local(int_ty.clone(), "b").stmt(), yield_value(name("b"))]),
            ),
            block(vec![local(int_ty.clone(), "c").stmt()]),
        ])
        .unwrap();

        assert_eq!(locals, 3);
        assert_eq!(captures.local_names(), vec!["a", "b"]);
        assert!(!captures.is_promoted("c"));
        assert!(!captures.is_promoted("n"));
    }

    #[test]
    fn same_name_and_type_share_a_field() {
        let int_ty = TypeRef::simple("int");
        let (captures, _) = run(vec![
            block(vec![local(int_ty.clone(), "i").stmt(), yield_value(name("i"))]),
            block(vec![local(int_ty.clone(), "i").stmt(), yield_value(name("i"))]),
        ])
        .unwrap();
        assert_eq!(captures.into_fields().len(), 1);
    }

    #[test]
    fn conflicting_types_are_rejected() {
        let int_ty = TypeRef::simple("int");
        let text = TypeRef::simple("String");
        let errors = run(vec![
            block(vec![local(int_ty, "v").stmt(), yield_value(name("v"))]),
            block(vec![local(text, "v").stmt(), yield_value(name("v"))]),
        ])
        .unwrap_err();
        assert_eq!(
            errors,
            vec![UsageError::ConflictingCapture {
                name: "v".into(),
                first: "int".into(),
                second: "String".into(),
                span: Span::DUMMY,
            }]
        );
    }

    #[test]
    fn live_foreach_gets_an_iterator_holder() {
        let (captures, _) = run(vec![for_each(
            local(TypeRef::simple("String"), "s").decl(),
            name("names"),
            yield_value(name("s")),
        )])
        .unwrap();
        assert_eq!(captures.local_names(), vec!["s"]);
        let fields = captures.into_fields();
        assert_eq!(fields[1].name, "$iter0");
        assert_eq!(fields[1].ty, TypeRef::simple("java.util.Iterator"));
    }
}
