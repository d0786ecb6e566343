//! Injection service: attaches synthesized declarations to their owner and
//! flags them as generated so later passes leave them alone.
//!
//! Injection is idempotent. A generated member with the same identity is
//! replaced; a hand-written one wins and the injected member is dropped.

use crate::ast::{ClassDecl, FieldDecl, MethodDecl, Statement};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Injected {
    Added,
    Replaced,
    Skipped,
}

pub fn inject_field(owner: &mut ClassDecl, mut field: FieldDecl) -> Injected {
    field.generated = true;
    match owner.fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) if existing.generated => {
            *existing = field;
            Injected::Replaced
        }
        Some(_) => {
            warn!(class = %owner.name, field = %field.name, "field already declared, not injected");
            Injected::Skipped
        }
        None => {
            owner.fields.push(field);
            Injected::Added
        }
    }
}

/// Methods are identified by name and arity.
pub fn inject_method(owner: &mut ClassDecl, mut method: MethodDecl) -> Injected {
    method.generated = true;
    let existing = owner
        .methods
        .iter_mut()
        .find(|m| m.name == method.name && m.params.len() == method.params.len());
    match existing {
        Some(existing) if existing.generated => {
            *existing = method;
            Injected::Replaced
        }
        Some(_) => {
            warn!(
                class = %owner.name,
                method = %method.name,
                "method already declared, not injected"
            );
            Injected::Skipped
        }
        None => {
            owner.methods.push(method);
            Injected::Added
        }
    }
}

/// Declares `ty` as a local class at the top of the method body.
pub fn inject_type(enclosing: &mut MethodDecl, mut ty: ClassDecl) -> Injected {
    ty.generated = true;
    let body = enclosing.body.get_or_insert_with(Vec::new);
    let existing = body.iter_mut().find_map(|stmt| match stmt {
        Statement::LocalClass(c) if c.name == ty.name => Some(c),
        _ => None,
    });
    match existing {
        Some(existing) if existing.generated => {
            *existing = ty;
            Injected::Replaced
        }
        Some(_) => {
            warn!(
                method = %enclosing.name,
                class = %ty.name,
                "local class already declared, not injected"
            );
            Injected::Skipped
        }
        None => {
            body.insert(0, Statement::LocalClass(ty));
            Injected::Added
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeRef;
    use crate::builder::*;

    #[test]
    fn field_injection_is_idempotent() {
        let mut owner = class("Owner").build();
        let f = field_decl(TypeRef::simple("int"), "$state").build();

        assert_eq!(inject_field(&mut owner, f.clone()), Injected::Added);
        assert_eq!(inject_field(&mut owner, f), Injected::Replaced);
        assert_eq!(owner.fields.len(), 1);
        assert!(owner.fields[0].generated);
    }

    #[test]
    fn hand_written_members_win() {
        let mut owner = class("Owner")
            .method(method("hasNext").returns(TypeRef::simple("boolean")).build())
            .build();
        let generated = method("hasNext")
            .returns(TypeRef::simple("boolean"))
            .body(vec![return_stmt(Some(bool_lit(true)))])
            .build();

        assert_eq!(inject_method(&mut owner, generated), Injected::Skipped);
        assert!(owner.methods[0].body.is_none());
    }

    #[test]
    fn local_type_goes_first_in_body() {
        let mut m = method("items").body(vec![return_stmt(Some(null()))]).build();
        let yielder = class("$Yielder").build();
        assert_eq!(inject_type(&mut m, yielder.clone()), Injected::Added);
        assert_eq!(inject_type(&mut m, yielder), Injected::Replaced);

        let body = m.body.unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Statement::LocalClass(c) if c.generated));
    }
}
