//! Linearizer: flattens the live part of the scope tree into one
//! [`FlatBody`] whose marks become the trampoline's resumption points.
//!
//! Only live scopes are refactored. Everything else is copied verbatim
//! into whatever segment is open when it is reached, except local
//! declarations, which were promoted and turn into assignments.

use super::error::LowerError;
use super::labels::{Flat, FlatBody, LabelArena, LabelId};
use super::promote::Captures;
use super::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::ast::*;
use crate::builder::*;

struct Linearizer<'s, 'a> {
    arena: &'s mut ScopeArena<'a>,
    captures: &'s Captures,
    labels: LabelArena,
    out: FlatBody,
}

pub(crate) fn linearize<'a>(
    arena: &mut ScopeArena<'a>,
    captures: &Captures,
    body: &'a [Statement],
) -> Result<(FlatBody, LabelArena), LowerError> {
    let mut lin = Linearizer {
        arena,
        captures,
        labels: LabelArena::default(),
        out: FlatBody::default(),
    };
    let entry = lin.labels.fresh();
    lin.mark(entry);
    lin.statements(body)?;
    let end = lin.break_label(ScopeId::ROOT);
    lin.mark(end);
    tracing::trace!(
        target: "jyield::lower",
        entries = lin.out.entries().len(),
        labels = lin.labels.len(),
        "linearized"
    );
    Ok((lin.out, lin.labels))
}

impl<'a> Linearizer<'_, 'a> {
    fn emit(&mut self, stmt: Statement) {
        self.out.push(Flat::Stmt(stmt));
    }

    fn mark(&mut self, label: LabelId) {
        self.out.push(Flat::Mark(label));
    }

    fn goto(&mut self, label: LabelId) {
        self.out.push(Flat::Goto(label));
    }

    fn break_label(&mut self, id: ScopeId) -> LabelId {
        self.arena.break_label(id, &mut self.labels)
    }

    fn iteration_label(&mut self, id: ScopeId) -> LabelId {
        self.arena.iteration_label(id, &mut self.labels)
    }

    fn statements(&mut self, stmts: &'a [Statement]) -> Result<(), LowerError> {
        for stmt in stmts {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &'a Statement) -> Result<(), LowerError> {
        match self.arena.scope_of(stmt) {
            Some(id) if self.arena.is_live(id) => self.refactor(id),
            _ => match stmt {
                Statement::Local(decl) => self.promoted_local(decl),
                _ => {
                    self.emit(stmt.clone());
                    Ok(())
                }
            },
        }
    }

    fn promoted_local(&mut self, decl: &LocalDecl) -> Result<(), LowerError> {
        if !self.captures.is_promoted(&decl.name) {
            return Err(LowerError::Internal(format!(
                "local '{}' of a live scope was not promoted",
                decl.name
            )));
        }
        let value = match &decl.init {
            None => return Ok(()),
            Some(Expression::ArrayInit(items)) => {
                let Some(element) = decl.ty.element() else {
                    return Err(LowerError::Internal(format!(
                        "array initializer for non-array '{}'",
                        decl.name
                    )));
                };
                new_array(element.clone(), items.clone())
            }
            Some(init) => init.clone(),
        };
        self.emit(assign_stmt(name(&decl.name), value));
        Ok(())
    }

    fn refactor(&mut self, id: ScopeId) -> Result<(), LowerError> {
        let kind = self.arena.get(id).kind;
        match kind {
            ScopeKind::Block(stmts) => {
                self.statements(stmts)?;
                let br = self.break_label(id);
                self.mark(br);
            }
            ScopeKind::While(w) => {
                let it = self.iteration_label(id);
                let br = self.break_label(id);
                self.mark(it);
                self.out.push(Flat::GotoUnless(w.test.clone(), br));
                self.statement(&w.body)?;
                self.goto(it);
                self.mark(br);
            }
            ScopeKind::DoWhile(dw) => {
                let start = self.labels.fresh();
                let it = self.iteration_label(id);
                let br = self.break_label(id);
                self.mark(start);
                self.statement(&dw.body)?;
                self.mark(it);
                self.out.push(Flat::GotoIf(dw.test.clone(), start));
                self.mark(br);
            }
            ScopeKind::For(f) => {
                self.statements(&f.init)?;
                let start = self.labels.fresh();
                let it = self.iteration_label(id);
                let br = self.break_label(id);
                self.mark(start);
                if let Some(test) = &f.test {
                    self.out.push(Flat::GotoUnless(test.clone(), br));
                }
                self.statement(&f.body)?;
                self.mark(it);
                for update in &f.update {
                    self.emit(expr_stmt(update.clone()));
                }
                self.goto(start);
                self.mark(br);
            }
            ScopeKind::ForEach(fe) => self.for_each(id, fe)?,
            ScopeKind::If(if_stmt) => {
                let br = self.break_label(id);
                match &if_stmt.alternate {
                    None => {
                        self.out.push(Flat::GotoUnless(if_stmt.test.clone(), br));
                        self.statement(&if_stmt.consequent)?;
                    }
                    Some(alt) => {
                        let otherwise = self.labels.fresh();
                        self.out.push(Flat::GotoUnless(if_stmt.test.clone(), otherwise));
                        self.statement(&if_stmt.consequent)?;
                        self.goto(br);
                        self.mark(otherwise);
                        self.statement(alt)?;
                    }
                }
                self.mark(br);
            }
            ScopeKind::Switch(s) => {
                let br = self.break_label(id);
                let mut arms: Vec<_> = s
                    .cases
                    .iter()
                    .map(|case| (case.label.clone(), self.labels.fresh()))
                    .collect();
                let targets: Vec<_> = arms.iter().map(|(_, l)| *l).collect();
                if s.cases.iter().all(|case| case.label.is_some()) {
                    arms.push((None, br));
                }
                self.out.push(Flat::Dispatch(s.selector.clone(), arms));
                for (case, label) in s.cases.iter().zip(targets) {
                    self.mark(label);
                    self.statements(&case.body)?;
                }
                self.mark(br);
            }
            ScopeKind::Labeled(_, inner) => {
                self.statement(inner)?;
                let br = self.break_label(id);
                self.mark(br);
            }
            ScopeKind::Break | ScopeKind::Continue => {
                let Some(target) = self.arena.get(id).target else {
                    return Err(LowerError::Internal("jump without a resolved target".into()));
                };
                let label = if matches!(kind, ScopeKind::Break) {
                    self.break_label(target)
                } else {
                    self.iteration_label(target)
                };
                self.goto(label);
            }
            ScopeKind::Yield(value) => {
                let resume = self.labels.fresh();
                self.out.push(Flat::Suspend(value.clone(), resume));
                self.mark(resume);
            }
            ScopeKind::Try => {
                let reason = "live try statement reached the linearizer";
                return Err(LowerError::Internal(reason.into()));
            }
            ScopeKind::Root | ScopeKind::Local(_) => {
                return Err(LowerError::Internal("unexpected live leaf scope".into()));
            }
        }
        Ok(())
    }

    fn for_each(&mut self, id: ScopeId, fe: &'a ForEachStatement) -> Result<(), LowerError> {
        let Some(holder) = self.captures.iterator(id).map(str::to_string) else {
            return Err(LowerError::Internal("live foreach without an iterator field".into()));
        };
        if !self.captures.is_promoted(&fe.var.name) {
            return Err(LowerError::Internal(format!(
                "foreach variable '{}' was not promoted",
                fe.var.name
            )));
        }
        let it = self.iteration_label(id);
        let br = self.break_label(id);

        self.emit(assign_stmt(
            name(&holder),
            method_call(fe.iterable.clone(), "iterator", Vec::new()),
        ));
        self.mark(it);
        let has_next = method_call(name(&holder), "hasNext", Vec::new());
        self.out.push(Flat::GotoUnless(has_next, br));
        let next = method_call(name(&holder), "next", Vec::new());
        self.emit(assign_stmt(name(&fe.var.name), cast(fe.var.ty.clone().boxed(), next)));
        self.statement(&fe.body)?;
        self.goto(it);
        self.mark(br);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::labels;
    use crate::lower::{promote, reach, scope};
    use pretty_assertions::assert_eq;

    fn flatten(body: Vec<Statement>) -> Vec<SwitchCase> {
        let m = method("items")
            .returns(TypeRef::generic("Iterator", vec![TypeRef::simple("Integer")]))
            .body(body)
            .build();
        let body = m.body.as_deref().unwrap();
        let mut arena = scope::build(&m, body).unwrap();
        reach::close(&mut arena);
        let captures = promote::promote(&arena).unwrap();
        let (mut flat, mut labels) = linearize(&mut arena, &captures, body).unwrap();
        labels::optimize(&mut flat, &mut labels, true);
        labels::resolve(&flat, &labels).unwrap()
    }

    fn jump(state: i64) -> Statement {
        block(vec![assign_stmt(name("$state"), int(state)), continue_stmt(None)])
    }

    fn suspend(value: Expression, state: i64) -> Vec<Statement> {
        vec![
            assign_stmt(name("$next"), value),
            assign_stmt(name("$state"), int(state)),
            return_stmt(Some(bool_lit(true))),
        ]
    }

    #[test]
    fn straight_line_yields() {
        let cases = flatten(vec![
            expr_stmt(call("before", vec![])),
            yield_value(int(1)),
            yield_value(int(2)),
        ]);
        let mut first = vec![expr_stmt(call("before", vec![]))];
        first.extend(suspend(int(1), 1));
        assert_eq!(cases[0].body, first);
        assert_eq!(cases[1].body, suspend(int(2), 2));
        assert!(cases[2].body.is_empty());
        assert_eq!(cases[3].label, None);
        assert_eq!(cases.len(), 4);
    }

    #[test]
    fn while_loop_jumps_back_to_its_test() {
        let cases = flatten(vec![
            local(TypeRef::simple("int"), "i").init(int(0)).stmt(),
            while_stmt(
                binary(BinaryOp::Lt, name("i"), int(3)),
                block(vec![yield_value(name("i")), expr_stmt(post_inc(name("i")))]),
            ),
        ]);

        // case 0: i = 0; falls into the loop test at case 1.
        assert_eq!(cases[0].body, vec![assign_stmt(name("i"), int(0))]);
        assert_eq!(cases[1].label, Some(int(1)));
        let Statement::If(exit) = &cases[1].body[0] else {
            panic!("expected the loop exit test");
        };
        assert_eq!(exit.test, not(binary(BinaryOp::Lt, name("i"), int(3))));
        assert_eq!(*exit.consequent, jump(4));
        assert_eq!(cases[2].body, vec![expr_stmt(post_inc(name("i")))]);
        // The body block's end mark holds the jump back to the test.
        assert_eq!(
            cases[3].body,
            vec![assign_stmt(name("$state"), int(1)), continue_stmt(None)]
        );
    }

    #[test]
    fn untouched_subtrees_are_copied_verbatim() {
        let quiet = while_stmt(name("spin"), block(vec![break_stmt(None)]));
        let cases = flatten(vec![quiet.clone(), yield_value(int(1))]);
        assert_eq!(cases[0].body[0], quiet);
    }

    #[test]
    fn array_initializers_become_allocations() {
        let ints = TypeRef::array(TypeRef::simple("int"));
        let cases = flatten(vec![
            local(ints, "xs")
                .init(Expression::ArrayInit(vec![int(1), int(2)]))
                .stmt(),
            local(TypeRef::simple("int"), "unset").stmt(),
            yield_value(index(name("xs"), int(0))),
        ]);
        assert_eq!(
            cases[0].body[0],
            assign_stmt(
                name("xs"),
                new_array(TypeRef::simple("int"), vec![int(1), int(2)]),
            )
        );
        assert_eq!(cases[0].body.len(), 4);
    }

    #[test]
    fn switch_without_default_dispatches_to_its_end() {
        let cases = flatten(vec![
            switch(name("k"))
                .case(int(1), vec![yield_value(int(10))])
                .case(int(2), vec![yield_value(int(20)), break_stmt(None)])
                .build(),
        ]);
        let Statement::Switch(dispatch) = &cases[0].body[0] else {
            panic!("expected a dispatch switch");
        };
        assert_eq!(dispatch.cases.len(), 3);
        assert_eq!(dispatch.cases[2].label, None);
        // Case 1 falls through into case 2's segment.
        assert_eq!(cases[2].body, suspend(int(20), 3));
    }
}
