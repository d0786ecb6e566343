//! Reachability closure over the scope tree.
//!
//! A scope is live when control can leave the trampoline from inside it
//! and later come back. Suspension sites seed the set; a break or continue
//! whose target is live has to be rewritten as a state jump too, which in
//! turn makes its own chain live.

use super::scope::{ScopeArena, ScopeId};
use rustc_hash::FxHashMap;

/// Marks every live scope and returns how many there are.
pub(crate) fn close(arena: &mut ScopeArena<'_>) -> usize {
    let mut waiting: FxHashMap<ScopeId, Vec<ScopeId>> = FxHashMap::default();
    let mut orphans = Vec::new();
    for &jump in arena.jumps() {
        match arena.get(jump).target {
            Some(target) => waiting.entry(target).or_default().push(jump),
            None => orphans.push(jump),
        }
    }

    let mut worklist = Vec::new();
    for y in arena.yields().to_vec() {
        worklist.extend(arena.mark_live_chain(y));
    }
    for jump in orphans {
        worklist.extend(arena.mark_live_chain(jump));
    }

    while let Some(scope) = worklist.pop() {
        let Some(jumps) = waiting.remove(&scope) else {
            continue;
        };
        for jump in jumps {
            worklist.extend(arena.mark_live_chain(jump));
        }
    }

    let live = arena.ids().filter(|&id| arena.is_live(id)).count();
    tracing::debug!(target: "jyield::lower", scopes = arena.len(), live, "reachability closed");
    live
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::builder::*;
    use crate::lower::scope::{self, ScopeKind};

    /// Rescans every jump until nothing changes.
    fn naive_fixpoint(arena: &mut ScopeArena<'_>) {
        for y in arena.yields().to_vec() {
            arena.mark_live_chain(y);
        }
        loop {
            let mut changed = false;
            for jump in arena.jumps().to_vec() {
                let target_live = arena.get(jump).target.is_none_or(|t| arena.is_live(t));
                if target_live && !arena.is_live(jump) {
                    arena.mark_live_chain(jump);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn live_set(arena: &ScopeArena<'_>) -> Vec<bool> {
        arena.ids().map(|id| arena.is_live(id)).collect()
    }

    fn generator(body: Vec<Statement>) -> MethodDecl {
        method("items")
            .returns(TypeRef::generic("Iterator", vec![TypeRef::simple("Integer")]))
            .body(body)
            .build()
    }

    fn tangled() -> MethodDecl {
        // The inner `break outer` only becomes live once the loop holding
        // the yield does, and the `continue` in the untouched block follows.
        generator(vec![
            labeled(
                "outer",
                while_stmt(
                    name("a"),
                    block(vec![
                        while_stmt(
                            name("b"),
                            block(vec![if_stmt(name("c"), break_stmt(Some("outer")))]),
                        ),
                        if_stmt(name("d"), block(vec![continue_stmt(None)])),
                        yield_value(int(1)),
                    ]),
                ),
            ),
            while_stmt(name("e"), block(vec![break_stmt(None)])),
        ])
    }

    #[test]
    fn matches_naive_fixpoint() {
        let m = tangled();
        let body = m.body.as_deref().unwrap();

        let mut fast = scope::build(&m, body).unwrap();
        close(&mut fast);
        let mut slow = scope::build(&m, body).unwrap();
        naive_fixpoint(&mut slow);

        assert_eq!(live_set(&fast), live_set(&slow));
    }

    #[test]
    fn jumps_into_live_loops_become_live() {
        let m = tangled();
        let body = m.body.as_deref().unwrap();
        let mut arena = scope::build(&m, body).unwrap();
        close(&mut arena);

        let jumps = arena.jumps().to_vec();
        assert!(arena.is_live(jumps[0]), "break outer");
        assert!(arena.is_live(jumps[1]), "continue");
        // The trailing loop never suspends, so its break stays verbatim.
        assert!(!arena.is_live(jumps[2]));
        let trailing = arena.scope_of(&body[1]).unwrap();
        assert!(!arena.is_live(trailing));
    }

    #[test]
    fn locals_are_never_live() {
        let m = generator(vec![
            local(TypeRef::simple("int"), "x").init(int(1)).stmt(),
            yield_value(name("x")),
        ]);
        let body = m.body.as_deref().unwrap();
        let mut arena = scope::build(&m, body).unwrap();
        assert_eq!(close(&mut arena), 2);

        let local = arena.locals()[0];
        assert!(matches!(arena.get(local).kind, ScopeKind::Local(_)));
        assert!(!arena.is_live(local));
        assert!(arena.is_live(ScopeId::ROOT));
    }
}
