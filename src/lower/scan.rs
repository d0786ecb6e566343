//! Body traversal shared by the quick scanner and the validator.
//!
//! Local class declarations are opaque: their bodies belong to another
//! `this` and any yield() inside them is not ours.

use crate::ast::*;
use std::ops::ControlFlow;

pub(crate) trait Visitor {
    type Break;

    fn statement(&mut self, _stmt: &Statement) -> ControlFlow<Self::Break> {
        ControlFlow::Continue(())
    }

    /// `statement_level` is true only for the root of an expression statement.
    fn expression(
        &mut self,
        _expr: &Expression,
        _statement_level: bool,
    ) -> ControlFlow<Self::Break> {
        ControlFlow::Continue(())
    }
}

pub(crate) fn walk_statements<V: Visitor>(v: &mut V, stmts: &[Statement]) -> ControlFlow<V::Break> {
    for stmt in stmts {
        walk_statement(v, stmt)?;
    }
    ControlFlow::Continue(())
}

pub(crate) fn walk_statement<V: Visitor>(v: &mut V, stmt: &Statement) -> ControlFlow<V::Break> {
    v.statement(stmt)?;
    match stmt {
        Statement::Empty
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::LocalClass(_) => {}
        Statement::Expression(e) => walk_expression(v, e, true)?,
        Statement::Block(stmts) => walk_statements(v, stmts)?,
        Statement::Local(decl) => {
            if let Some(init) = &decl.init {
                walk_expression(v, init, false)?;
            }
        }
        Statement::If(if_stmt) => {
            walk_expression(v, &if_stmt.test, false)?;
            walk_statement(v, &if_stmt.consequent)?;
            if let Some(alt) = &if_stmt.alternate {
                walk_statement(v, alt)?;
            }
        }
        Statement::While(w) => {
            walk_expression(v, &w.test, false)?;
            walk_statement(v, &w.body)?;
        }
        Statement::DoWhile(dw) => {
            walk_statement(v, &dw.body)?;
            walk_expression(v, &dw.test, false)?;
        }
        Statement::For(f) => {
            walk_statements(v, &f.init)?;
            if let Some(test) = &f.test {
                walk_expression(v, test, false)?;
            }
            for update in &f.update {
                walk_expression(v, update, false)?;
            }
            walk_statement(v, &f.body)?;
        }
        Statement::ForEach(fe) => {
            walk_expression(v, &fe.iterable, false)?;
            walk_statement(v, &fe.body)?;
        }
        Statement::Switch(s) => {
            walk_expression(v, &s.selector, false)?;
            for case in &s.cases {
                if let Some(label) = &case.label {
                    walk_expression(v, label, false)?;
                }
                walk_statements(v, &case.body)?;
            }
        }
        Statement::Labeled(_, inner) => walk_statement(v, inner)?,
        Statement::Return(e) => {
            if let Some(e) = e {
                walk_expression(v, e, false)?;
            }
        }
        Statement::Throw(e) => walk_expression(v, e, false)?,
        Statement::Try(t) => {
            walk_statements(v, &t.block)?;
            for catch in &t.catches {
                walk_statements(v, &catch.body)?;
            }
            if let Some(finally) = &t.finally {
                walk_statements(v, finally)?;
            }
        }
    }
    ControlFlow::Continue(())
}

pub(crate) fn walk_expression<V: Visitor>(
    v: &mut V,
    expr: &Expression,
    statement_level: bool,
) -> ControlFlow<V::Break> {
    v.expression(expr, statement_level)?;
    match expr {
        Expression::Literal(_)
        | Expression::Name(_)
        | Expression::This
        | Expression::Super
        | Expression::QualifiedThis(_) => {}
        Expression::Field(target, _) => walk_expression(v, target, false)?,
        Expression::Call(call) => {
            if let Some(receiver) = &call.receiver {
                walk_expression(v, receiver, false)?;
            }
            for arg in &call.args {
                walk_expression(v, arg, false)?;
            }
        }
        Expression::New(_, args) | Expression::ArrayInit(args) => {
            for arg in args {
                walk_expression(v, arg, false)?;
            }
        }
        Expression::NewArray(_, dims, init) => {
            for dim in dims {
                walk_expression(v, dim, false)?;
            }
            for item in init.iter().flatten() {
                walk_expression(v, item, false)?;
            }
        }
        Expression::Index(a, b)
        | Expression::Binary(_, a, b)
        | Expression::Logical(_, a, b)
        | Expression::Assign(_, a, b) => {
            walk_expression(v, a, false)?;
            walk_expression(v, b, false)?;
        }
        Expression::Unary(_, e)
        | Expression::Update(_, _, e)
        | Expression::Cast(_, e)
        | Expression::InstanceOf(e, _) => walk_expression(v, e, false)?,
        Expression::Conditional(t, c, a) => {
            walk_expression(v, t, false)?;
            walk_expression(v, c, false)?;
            walk_expression(v, a, false)?;
        }
    }
    ControlFlow::Continue(())
}

pub(crate) fn is_yield_call(call: &MethodCall) -> bool {
    call.name == "yield"
        && match call.receiver.as_deref() {
            None => true,
            Some(Expression::Name(owner)) => owner == "Yield" || owner.ends_with(".Yield"),
            Some(_) => false,
        }
}

/// The yielded value when `stmt` is a well-formed `yield(value);`.
pub(crate) fn yield_argument(stmt: &Statement) -> Option<&Expression> {
    match stmt {
        Statement::Expression(Expression::Call(call))
            if is_yield_call(call) && call.args.len() == 1 =>
        {
            call.args.first()
        }
        _ => None,
    }
}

struct YieldFinder;

impl Visitor for YieldFinder {
    type Break = ();

    fn expression(&mut self, expr: &Expression, _statement_level: bool) -> ControlFlow<()> {
        match expr {
            Expression::Call(call) if is_yield_call(call) => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Quick scan: stops at the first suspension site without collecting anything.
pub fn has_yield(body: &[Statement]) -> bool {
    walk_statements(&mut YieldFinder, body).is_break()
}
