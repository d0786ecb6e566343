//! Scope tree construction.
//!
//! One scope per control construct, stored in an arena and linked to its
//! owner by index. The tree mirrors the statement nesting of the method
//! body and only lives for the duration of one lowering.

use super::error::UsageError;
use super::labels::{LabelArena, LabelId};
use super::scan;
use crate::ast::*;
use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ScopeId(u32);

impl ScopeId {
    pub(crate) const ROOT: ScopeId = ScopeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum ScopeKind<'a> {
    Root,
    Block(&'a [Statement]),
    While(&'a WhileStatement),
    DoWhile(&'a DoWhileStatement),
    For(&'a ForStatement),
    ForEach(&'a ForEachStatement),
    If(&'a IfStatement),
    Switch(&'a SwitchStatement),
    Labeled(&'a str, &'a Statement),
    Try,
    Break,
    Continue,
    Yield(&'a Expression),
    Local(&'a LocalDecl),
}

impl ScopeKind<'_> {
    pub(crate) fn is_loop(&self) -> bool {
        matches!(
            self,
            ScopeKind::While(_) | ScopeKind::DoWhile(_) | ScopeKind::For(_) | ScopeKind::ForEach(_)
        )
    }

    fn is_breakable(&self) -> bool {
        self.is_loop() || matches!(self, ScopeKind::Switch(_))
    }
}

#[derive(Debug)]
pub(crate) struct Scope<'a> {
    pub(crate) kind: ScopeKind<'a>,
    pub(crate) parent: Option<ScopeId>,
    /// Resolved jump target of a break or continue.
    pub(crate) target: Option<ScopeId>,
    pub(crate) live: bool,
    iteration_label: Option<LabelId>,
    break_label: Option<LabelId>,
}

/// Statements are keyed by address; the arena never outlives the body it borrows.
type NodeKey = *const Statement;

#[derive(Debug, Default)]
pub(crate) struct ScopeArena<'a> {
    scopes: Vec<Scope<'a>>,
    by_node: FxHashMap<NodeKey, ScopeId>,
    yields: Vec<ScopeId>,
    jumps: Vec<ScopeId>,
    locals: Vec<ScopeId>,
}

impl<'a> ScopeArena<'a> {
    fn push(
        &mut self,
        kind: ScopeKind<'a>,
        parent: Option<ScopeId>,
        node: Option<&'a Statement>,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            target: None,
            live: false,
            iteration_label: None,
            break_label: None,
        });
        if let Some(node) = node {
            self.by_node.insert(std::ptr::from_ref(node), id);
        }
        match kind {
            ScopeKind::Yield(_) => self.yields.push(id),
            ScopeKind::Break | ScopeKind::Continue => self.jumps.push(id),
            ScopeKind::Local(_) => self.locals.push(id),
            _ => {}
        }
        id
    }

    pub(crate) fn get(&self, id: ScopeId) -> &Scope<'a> {
        &self.scopes[id.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len() as u32).map(ScopeId)
    }

    pub(crate) fn scope_of(&self, stmt: &Statement) -> Option<ScopeId> {
        self.by_node.get(&std::ptr::from_ref(stmt)).copied()
    }

    pub(crate) fn is_live(&self, id: ScopeId) -> bool {
        self.scopes[id.index()].live
    }

    /// `id` followed by each of its owners up to the root.
    pub(crate) fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> {
        std::iter::successors(Some(id), |&s| self.scopes[s.index()].parent)
    }

    /// Marks `id` and its owners live, returning the scopes that were not live yet.
    pub(crate) fn mark_live_chain(&mut self, id: ScopeId) -> Vec<ScopeId> {
        let mut newly = Vec::new();
        let mut cursor = Some(id);
        while let Some(s) = cursor {
            let scope = &mut self.scopes[s.index()];
            if scope.live {
                break;
            }
            scope.live = true;
            newly.push(s);
            cursor = scope.parent;
        }
        newly
    }

    pub(crate) fn yields(&self) -> &[ScopeId] {
        &self.yields
    }

    pub(crate) fn jumps(&self) -> &[ScopeId] {
        &self.jumps
    }

    pub(crate) fn locals(&self) -> &[ScopeId] {
        &self.locals
    }

    pub(crate) fn break_label(&mut self, id: ScopeId, labels: &mut LabelArena) -> LabelId {
        let scope = &mut self.scopes[id.index()];
        *scope.break_label.get_or_insert_with(|| labels.fresh())
    }

    pub(crate) fn iteration_label(&mut self, id: ScopeId, labels: &mut LabelArena) -> LabelId {
        let scope = &mut self.scopes[id.index()];
        *scope.iteration_label.get_or_insert_with(|| labels.fresh())
    }
}

struct ScopeBuilder<'a> {
    arena: ScopeArena<'a>,
    current: ScopeId,
    span: Span,
    errors: Vec<UsageError>,
}

/// Parameters get no scope: they are never promoted.
pub(crate) fn build<'a>(
    method: &MethodDecl,
    body: &'a [Statement],
) -> Result<ScopeArena<'a>, Vec<UsageError>> {
    let mut builder = ScopeBuilder {
        arena: ScopeArena::default(),
        current: ScopeId::ROOT,
        span: method.span,
        errors: Vec::new(),
    };
    builder.arena.push(ScopeKind::Root, None, None);
    builder.statements(body);

    if builder.errors.is_empty() {
        Ok(builder.arena)
    } else {
        Err(builder.errors)
    }
}

impl<'a> ScopeBuilder<'a> {
    fn leaf(&mut self, kind: ScopeKind<'a>, node: Option<&'a Statement>) -> ScopeId {
        self.arena.push(kind, Some(self.current), node)
    }

    fn within(&mut self, kind: ScopeKind<'a>, node: &'a Statement, f: impl FnOnce(&mut Self)) {
        let id = self.arena.push(kind, Some(self.current), Some(node));
        let saved = std::mem::replace(&mut self.current, id);
        f(self);
        self.current = saved;
    }

    fn statements(&mut self, stmts: &'a [Statement]) {
        for stmt in stmts {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::Empty
            | Statement::Return(_)
            | Statement::Throw(_)
            | Statement::LocalClass(_) => {}
            Statement::Expression(_) => {
                if let Some(value) = scan::yield_argument(stmt) {
                    self.leaf(ScopeKind::Yield(value), Some(stmt));
                }
            }
            Statement::Block(stmts) => {
                self.within(ScopeKind::Block(stmts), stmt, |b| b.statements(stmts));
            }
            Statement::Local(decl) => {
                self.leaf(ScopeKind::Local(decl), Some(stmt));
            }
            Statement::If(if_stmt) => self.within(ScopeKind::If(if_stmt), stmt, |b| {
                b.statement(&if_stmt.consequent);
                if let Some(alt) = &if_stmt.alternate {
                    b.statement(alt);
                }
            }),
            Statement::While(w) => {
                self.within(ScopeKind::While(w), stmt, |b| b.statement(&w.body));
            }
            Statement::DoWhile(dw) => {
                self.within(ScopeKind::DoWhile(dw), stmt, |b| b.statement(&dw.body));
            }
            Statement::For(f) => self.within(ScopeKind::For(f), stmt, |b| {
                b.statements(&f.init);
                b.statement(&f.body);
            }),
            Statement::ForEach(fe) => self.within(ScopeKind::ForEach(fe), stmt, |b| {
                b.leaf(ScopeKind::Local(&fe.var), None);
                b.statement(&fe.body);
            }),
            Statement::Switch(s) => self.within(ScopeKind::Switch(s), stmt, |b| {
                for case in &s.cases {
                    b.statements(&case.body);
                }
            }),
            Statement::Labeled(label, inner) => {
                let kind = ScopeKind::Labeled(label, inner);
                self.within(kind, stmt, |b| b.statement(inner));
            }
            Statement::Try(t) => self.within(ScopeKind::Try, stmt, |b| {
                b.statements(&t.block);
                for catch in &t.catches {
                    b.statements(&catch.body);
                }
                if let Some(finally) = &t.finally {
                    b.statements(finally);
                }
            }),
            Statement::Break(label) => {
                let id = self.leaf(ScopeKind::Break, Some(stmt));
                self.resolve(id, label.as_deref(), false);
            }
            Statement::Continue(label) => {
                let id = self.leaf(ScopeKind::Continue, Some(stmt));
                self.resolve(id, label.as_deref(), true);
            }
        }
    }

    fn resolve(&mut self, id: ScopeId, label: Option<&str>, is_continue: bool) {
        match self.find_target(id, label, is_continue) {
            Ok(target) => self.arena.scopes[id.index()].target = Some(target),
            Err(e) => self.errors.push(e),
        }
    }

    fn find_target(
        &self,
        id: ScopeId,
        label: Option<&str>,
        is_continue: bool,
    ) -> Result<ScopeId, UsageError> {
        let span = self.span;
        let mut enclosing = self.arena.ancestors(id).skip(1);

        let Some(label) = label else {
            let found = if is_continue {
                enclosing.find(|&s| self.arena.get(s).kind.is_loop())
            } else {
                enclosing.find(|&s| self.arena.get(s).kind.is_breakable())
            };
            return found.ok_or(if is_continue {
                UsageError::ContinueOutsideLoop { span }
            } else {
                UsageError::BreakOutsideLoop { span }
            });
        };

        let mut matches = enclosing.filter_map(|s| match self.arena.get(s).kind {
            ScopeKind::Labeled(l, inner) if l == label => Some((s, inner)),
            _ => None,
        });
        let (labeled, inner) = matches.next().ok_or_else(|| UsageError::UndefinedLabel {
            label: label.to_string(),
            span,
        })?;
        if matches.next().is_some() {
            return Err(UsageError::AmbiguousLabel {
                label: label.to_string(),
                span,
            });
        }
        if !is_continue {
            return Ok(labeled);
        }

        self.arena
            .scope_of(inner)
            .filter(|&s| self.arena.get(s).kind.is_loop())
            .ok_or_else(|| UsageError::NotALoopLabel {
                label: label.to_string(),
                span,
            })
    }
}
