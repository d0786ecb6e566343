//! Labels, the flat statement arena, and the label optimizer.
//!
//! The linearizer appends [`Flat`] entries that refer to labels
//! symbolically. Every reference is also recorded as a placeholder
//! `(index, label)`. Once the whole tree is linearized the optimizer
//! numbers the marks, folding adjacent ones, and [`resolve`] turns the
//! arena into the trampoline's switch cases.

use super::error::LowerError;
use super::validate::{NEXT_FIELD, STATE_FIELD};
use crate::ast::{Expression, Statement, SwitchCase, SwitchStatement};
use crate::builder::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LabelId(u32);

#[derive(Debug, Default)]
pub(crate) struct LabelArena {
    states: Vec<Option<u32>>,
}

impl LabelArena {
    pub(crate) fn fresh(&mut self) -> LabelId {
        let id = LabelId(self.states.len() as u32);
        self.states.push(None);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    /// Final state id, `None` until the optimizer has run.
    pub(crate) fn state(&self, label: LabelId) -> Option<u32> {
        self.states[label.0 as usize]
    }

    fn assign(&mut self, label: LabelId, state: u32) {
        self.states[label.0 as usize] = Some(state);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Flat {
    Stmt(Statement),
    /// Start of a resumable segment.
    Mark(LabelId),
    Goto(LabelId),
    GotoUnless(Expression, LabelId),
    GotoIf(Expression, LabelId),
    /// Publish a value and leave the trampoline; resume at the label.
    Suspend(Expression, LabelId),
    Dispatch(Expression, Vec<(Option<Expression>, LabelId)>),
}

impl Flat {
    fn references(&self) -> Vec<LabelId> {
        match self {
            Flat::Stmt(_) | Flat::Mark(_) => Vec::new(),
            Flat::Goto(l) | Flat::GotoUnless(_, l) | Flat::GotoIf(_, l) | Flat::Suspend(_, l) => {
                vec![*l]
            }
            Flat::Dispatch(_, arms) => arms.iter().map(|(_, l)| *l).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub(crate) index: usize,
    pub(crate) label: LabelId,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct FlatBody {
    entries: Vec<Flat>,
    placeholders: Vec<Placeholder>,
}

impl FlatBody {
    pub(crate) fn push(&mut self, flat: Flat) {
        let index = self.entries.len();
        for label in flat.references() {
            self.placeholders.push(Placeholder { index, label });
        }
        self.entries.push(flat);
    }

    pub(crate) fn entries(&self) -> &[Flat] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }
}

/// Numbers every mark with a sequential state id starting at 0. With
/// `coalesce`, a mark directly following another mark takes its id and is
/// removed. Returns the number of marks removed; a second run returns 0.
pub(crate) fn optimize(body: &mut FlatBody, labels: &mut LabelArena, coalesce: bool) -> usize {
    let old = std::mem::take(&mut body.entries);
    let mut entries = Vec::with_capacity(old.len());
    let mut remap = Vec::with_capacity(old.len());
    let mut next_state = 0;
    let mut folded = 0;

    for entry in old {
        if let Flat::Mark(label) = entry {
            if coalesce
                && let Some(Flat::Mark(prev)) = entries.last()
                && let Some(state) = labels.state(*prev)
            {
                labels.assign(label, state);
                remap.push(entries.len() - 1);
                folded += 1;
                continue;
            }
            labels.assign(label, next_state);
            next_state += 1;
        }
        remap.push(entries.len());
        entries.push(entry);
    }

    body.entries = entries;
    for placeholder in &mut body.placeholders {
        placeholder.index = remap[placeholder.index];
    }
    tracing::trace!(target: "jyield::lower", states = next_state, folded, "labels numbered");
    folded
}

fn state_of(labels: &LabelArena, label: LabelId) -> Result<i64, LowerError> {
    labels
        .state(label)
        .map(i64::from)
        .ok_or_else(|| LowerError::Internal(format!("label {} was never placed", label.0)))
}

fn jump(state: i64) -> Vec<Statement> {
    vec![
        assign_stmt(name(STATE_FIELD), int(state)),
        continue_stmt(None),
    ]
}

/// Resolves every placeholder and builds the trampoline's switch cases,
/// ending with `default: return false;`.
pub(crate) fn resolve(body: &FlatBody, labels: &LabelArena) -> Result<Vec<SwitchCase>, LowerError> {
    for placeholder in &body.placeholders {
        let refers = body
            .entries
            .get(placeholder.index)
            .is_some_and(|e| e.references().contains(&placeholder.label));
        if !refers {
            return Err(LowerError::Internal(format!(
                "placeholder at {} does not refer to its label",
                placeholder.index
            )));
        }
        state_of(labels, placeholder.label)?;
    }

    let mut cases: Vec<SwitchCase> = Vec::new();
    for entry in &body.entries {
        if let Flat::Mark(label) = entry {
            cases.push(SwitchCase {
                label: Some(int(state_of(labels, *label)?)),
                body: Vec::new(),
            });
            continue;
        }
        let case = cases
            .last_mut()
            .ok_or_else(|| LowerError::Internal("statement before the entry label".into()))?;
        match entry {
            Flat::Mark(_) => {}
            Flat::Stmt(stmt) => case.body.push(stmt.clone()),
            Flat::Goto(l) => case.body.extend(jump(state_of(labels, *l)?)),
            Flat::GotoUnless(test, l) => {
                let exit = block(jump(state_of(labels, *l)?));
                case.body.push(if_stmt(not(test.clone()), exit));
            }
            Flat::GotoIf(test, l) => {
                let back = block(jump(state_of(labels, *l)?));
                case.body.push(if_stmt(test.clone(), back));
            }
            Flat::Suspend(value, l) => {
                case.body.push(assign_stmt(name(NEXT_FIELD), value.clone()));
                case.body.push(assign_stmt(name(STATE_FIELD), int(state_of(labels, *l)?)));
                case.body.push(return_stmt(Some(bool_lit(true))));
            }
            Flat::Dispatch(selector, arms) => {
                let arms = arms
                    .iter()
                    .map(|(label, l)| {
                        Ok(SwitchCase {
                            label: label.clone(),
                            body: jump(state_of(labels, *l)?),
                        })
                    })
                    .collect::<Result<Vec<_>, LowerError>>()?;
                case.body.push(Statement::Switch(SwitchStatement {
                    selector: selector.clone(),
                    cases: arms,
                }));
            }
        }
    }

    cases.push(SwitchCase {
        label: None,
        body: vec![return_stmt(Some(bool_lit(false)))],
    });
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(labels: &mut LabelArena) -> FlatBody {
        let entry = labels.fresh();
        let resume = labels.fresh();
        let block_end = labels.fresh();
        let root_end = labels.fresh();
        let mut body = FlatBody::default();
        body.push(Flat::Mark(entry));
        body.push(Flat::Suspend(int(1), resume));
        body.push(Flat::Mark(resume));
        body.push(Flat::Mark(block_end));
        body.push(Flat::GotoIf(name("again"), entry));
        body.push(Flat::Mark(root_end));
        body
    }

    #[test]
    fn folds_adjacent_marks() {
        let mut labels = LabelArena::default();
        let mut body = sample(&mut labels);

        assert_eq!(optimize(&mut body, &mut labels, true), 1);
        assert_eq!(body.entries().len(), 5);
        let states: Vec<_> = (0..4).map(|i| labels.state(LabelId(i))).collect();
        assert_eq!(states, vec![Some(0), Some(1), Some(1), Some(2)]);
        // The GotoIf moved from index 4 to 3.
        assert_eq!(body.placeholders()[1].index, 3);
    }

    #[test]
    fn optimizer_is_idempotent() {
        let mut labels = LabelArena::default();
        let mut body = sample(&mut labels);
        optimize(&mut body, &mut labels, true);
        let once = body.clone();
        let states: Vec<_> = (0..4).map(|i| labels.state(LabelId(i))).collect();

        assert_eq!(optimize(&mut body, &mut labels, true), 0);
        assert_eq!(body, once);
        let again: Vec<_> = (0..4).map(|i| labels.state(LabelId(i))).collect();
        assert_eq!(again, states);
    }

    #[test]
    fn without_coalescing_every_mark_gets_a_state() {
        let mut labels = LabelArena::default();
        let mut body = sample(&mut labels);
        assert_eq!(optimize(&mut body, &mut labels, false), 0);
        let cases = resolve(&body, &labels).unwrap();
        // Four marks plus the trailing default.
        assert_eq!(cases.len(), 5);
    }

    #[test]
    fn resolves_into_switch_cases() {
        let mut labels = LabelArena::default();
        let mut body = sample(&mut labels);
        optimize(&mut body, &mut labels, true);
        let cases = resolve(&body, &labels).unwrap();

        assert_eq!(cases.len(), 4);
        assert_eq!(cases[0].label, Some(int(0)));
        assert_eq!(
            cases[0].body,
            vec![
                assign_stmt(name("$next"), int(1)),
                assign_stmt(name("$state"), int(1)),
                return_stmt(Some(bool_lit(true))),
            ]
        );
        assert_eq!(cases[1].body, vec![if_stmt(name("again"), block(jump(0)))]);
        assert!(cases[2].body.is_empty());
        assert_eq!(cases[3].label, None);
    }

    #[test]
    fn unplaced_label_is_an_internal_error() {
        let mut labels = LabelArena::default();
        let entry = labels.fresh();
        let nowhere = labels.fresh();
        let mut body = FlatBody::default();
        body.push(Flat::Mark(entry));
        body.push(Flat::Goto(nowhere));
        optimize(&mut body, &mut labels, true);

        assert!(matches!(resolve(&body, &labels), Err(LowerError::Internal(_))));
    }
}
