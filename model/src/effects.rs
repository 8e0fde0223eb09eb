//! Action effects: conditional assignment/increase of a predicate or fluent, annotated with
//! the durative-action timing at which they fire.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::expressions::{Expression, FluentApplication};
use crate::formula::{Atom, Formula, FormulaTime};
use crate::terms::{Term, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectTiming {
    AtStart,
    AtEnd,
}

#[derive(Debug, Clone)]
pub enum EffectTarget {
    /// Sets (or clears, if `!positive`) a predicate atom.
    Predicate { atom: Arc<Atom>, positive: bool },
    /// Assigns or increases/decreases a numeric fluent.
    Fluent {
        fluent: Arc<FluentApplication>,
        op: AssignOp,
        value: Expression,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Increase,
    Decrease,
}

/// One effect of an action schema: parameters still free, a universally quantified subset of
/// them, an optional condition gating whether the effect fires, a separate link-condition
/// consulted only by threat detection, and the target it writes.
#[derive(Debug, Clone)]
pub struct Effect {
    pub universally_quantified: Vec<VariableId>,
    pub condition: Option<Formula>,
    /// Consulted only when asking "could this effect interfere with a link we are about to
    /// rely on?". Domain preprocessing may strengthen this (e.g. conjoin the negation of a
    /// condition known to hold) so that effects which can provably never threaten a given link
    /// are filtered out before a `Unsafe` flaw is even raised; `None` means "same as the firing
    /// condition" (no strengthening applied).
    pub link_condition: Option<Formula>,
    pub target: EffectTarget,
    pub timing: EffectTiming,
}

impl Effect {
    pub fn unconditional(target: EffectTarget, timing: EffectTiming) -> Self {
        Effect {
            universally_quantified: Vec::new(),
            condition: None,
            link_condition: None,
            target,
            timing,
        }
    }

    pub fn conditional(condition: Formula, target: EffectTarget, timing: EffectTiming) -> Self {
        Effect {
            universally_quantified: Vec::new(),
            condition: Some(condition),
            link_condition: None,
            target,
            timing,
        }
    }

    pub fn with_link_condition(mut self, link_condition: Formula) -> Self {
        self.link_condition = Some(link_condition);
        self
    }

    /// The (possibly trivial) firing condition as a `Formula`, `True` when unconditional. Used
    /// by threat detection, which needs a condition formula regardless of whether one was
    /// explicitly written.
    pub fn firing_condition(&self) -> Formula {
        self.condition.clone().unwrap_or(Formula::True)
    }

    /// The condition consulted when deciding whether this effect threatens a causal link,
    /// falling back to the firing condition when no separate link-condition was recorded.
    pub fn link_condition_for_threats(&self) -> Option<Formula> {
        match &self.link_condition {
            Some(f) if !matches!(f, Formula::True) => Some(f.clone()),
            Some(_) => None,
            None => self.condition.clone(),
        }
    }

    /// The literal this effect asserts, when it is a predicate effect (fluent effects have no
    /// single literal and are excluded from classical open-condition matching).
    pub fn literal(&self) -> Option<crate::formula::Literal> {
        match &self.target {
            EffectTarget::Predicate { atom, positive } => Some(crate::formula::Literal {
                atom: atom.clone(),
                positive: *positive,
            }),
            EffectTarget::Fluent { .. } => None,
        }
    }

    pub fn substitute(&self, sub: &impl Fn(VariableId) -> Term) -> Effect {
        let target = match &self.target {
            EffectTarget::Predicate { atom, positive } => {
                let args: SmallVec<[Term; 4]> = atom
                    .args
                    .iter()
                    .map(|t| match t {
                        Term::Variable(v) => sub(*v),
                        Term::Object(_) => *t,
                    })
                    .collect();
                EffectTarget::Predicate {
                    atom: Arc::new(Atom::new(atom.predicate, args)),
                    positive: *positive,
                }
            }
            EffectTarget::Fluent { fluent, op, value } => {
                let args: SmallVec<[Term; 4]> = fluent
                    .args
                    .iter()
                    .map(|t| match t {
                        Term::Variable(v) => sub(*v),
                        Term::Object(_) => *t,
                    })
                    .collect();
                EffectTarget::Fluent {
                    fluent: Arc::new(FluentApplication {
                        function: fluent.function,
                        args,
                    }),
                    op: *op,
                    value: value.substitute(sub),
                }
            }
        };
        Effect {
            universally_quantified: self.universally_quantified.clone(),
            condition: self.condition.as_ref().map(|c| c.substitute(sub)),
            link_condition: self.link_condition.as_ref().map(|c| c.substitute(sub)),
            target,
            timing: self.timing,
        }
    }

    pub fn as_formula_time(self_timing: EffectTiming) -> FormulaTime {
        match self_timing {
            EffectTiming::AtStart => FormulaTime::AtStart,
            EffectTiming::AtEnd => FormulaTime::AtEnd,
        }
    }
}
