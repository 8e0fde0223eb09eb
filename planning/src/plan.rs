//! Partial plan state: steps, causal links, and the set of outstanding flaws, held as a
//! structurally-shared persistent snapshot so that refining a plan into several children is
//! cheap and never mutates the parent.

use std::sync::Arc;

use pocl_collections::chain::Chain;
use pocl_model::{ActionId, Formula, FormulaTime, Literal, StepId, Term};
use pocl_tnet::Orderings;

use crate::bindings::Bindings;

/// One step of the plan: its id, the action schema instantiated, and the terms bound to that
/// schema's parameters (some may still be variables, resolved lazily through `Bindings`).
#[derive(Debug, Clone)]
pub struct Step {
    pub id: StepId,
    pub action: ActionId,
    pub parameters: Vec<Term>,
}

/// A causal link `id1 --l--> id2`: step `id1`'s effect `l` establishes a condition of `id2`.
#[derive(Debug, Clone)]
pub struct Link {
    pub from: StepId,
    pub condition: Literal,
    pub to: StepId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionTiming {
    AtStart,
    OverAll,
    AtEnd,
}

impl From<FormulaTime> for ConditionTiming {
    fn from(t: FormulaTime) -> Self {
        match t {
            FormulaTime::AtStart => ConditionTiming::AtStart,
            FormulaTime::OverAll => ConditionTiming::OverAll,
            FormulaTime::AtEnd => ConditionTiming::AtEnd,
        }
    }
}

/// An as-yet-unestablished condition of some step: the thing a causal link must eventually
/// provide.
#[derive(Debug, Clone)]
pub struct OpenCondition {
    pub step: StepId,
    pub condition: Formula,
    pub when: ConditionTiming,
}

impl OpenCondition {
    pub fn is_static(&self, statics: &pocl_model::Staticity) -> bool {
        match self.condition.as_literal() {
            Some(lit) => lit.atom.is_ground() && statics.is_static(lit.atom.predicate),
            None => false,
        }
    }
}

/// A causal link `unsafe_step`'s effect threatens (`from --condition--> to`): `unsafe_step`
/// may occur between `from` and `to` and its effect may falsify `condition`. `threatening_atom`
/// is that effect's atom, already instantiated against `threatening_step`'s actual parameter
/// terms, so separation refinements don't need to re-derive it from the schema.
#[derive(Debug, Clone)]
pub struct UnsafeLink {
    pub link: Link,
    pub threatening_step: StepId,
    pub threatening_atom: Arc<pocl_model::Atom>,
}

/// Two durative steps whose effects may coincide in time and jointly write mutually exclusive
/// values to the same state variable: `effect1`/`effect2` are each already instantiated against
/// their step's actual parameter terms, and `condition1`/`condition2` carry that effect's firing
/// condition (`None` when the effect is unconditional, so there is nothing to negate away).
#[derive(Debug, Clone)]
pub struct MutexThreat {
    pub step1: StepId,
    pub effect1: Literal,
    pub condition1: Option<Formula>,
    pub step2: StepId,
    pub effect2: Literal,
    pub condition2: Option<Formula>,
}

#[derive(Debug, Clone)]
pub enum Flaw {
    OpenCondition(OpenCondition),
    Unsafe(UnsafeLink),
    Mutex(MutexThreat),
}

impl Flaw {
    pub fn is_static_open_condition(&self, statics: &pocl_model::Staticity) -> bool {
        matches!(self, Flaw::OpenCondition(oc) if oc.is_static(statics))
    }
}

/// A flaw tagged with the id it was pushed under, so a refinement can remove exactly the flaw
/// it resolved (by id) without relying on structural or pointer equality.
#[derive(Debug, Clone)]
pub struct TaggedFlaw {
    pub id: u32,
    pub flaw: Flaw,
}

/// A partial plan: the accumulated steps, links, bindings, orderings and outstanding flaws.
/// Generic over the orderings solver so the same refinement code drives both the classical
/// (`BinaryOrderings`) and durative (`TemporalOrderings`) search modes.
#[derive(Clone)]
pub struct Plan<O: Orderings> {
    pub steps: Chain<Step>,
    pub links: Chain<Link>,
    pub flaws: Chain<TaggedFlaw>,
    pub bindings: Bindings,
    pub orderings: O,
    pub next_id: u32,
    pub next_flaw_id: u32,
    pub num_refinements: u32,
    pub rank: f64,
}

impl<O: Orderings + Default> Plan<O> {
    pub fn initial(goal: Formula) -> Self {
        let mut plan = Plan {
            steps: Chain::empty(),
            links: Chain::empty(),
            flaws: Chain::empty(),
            bindings: Bindings::new(),
            orderings: O::default(),
            next_id: 1,
            next_flaw_id: 0,
            num_refinements: 0,
            rank: 0.0,
        };
        plan.orderings = plan.orderings.register_step(0);
        plan = plan.push_flaw(Flaw::OpenCondition(OpenCondition {
            step: StepId::GOAL,
            condition: goal,
            when: ConditionTiming::AtStart,
        }));
        plan
    }
}

impl<O: Orderings> Plan<O> {
    pub fn is_complete(&self) -> bool {
        self.flaws.is_empty()
    }

    pub fn with_flaws(&self, flaws: Chain<TaggedFlaw>) -> Plan<O> {
        Plan {
            flaws,
            ..self.clone()
        }
    }

    /// Returns a plan identical to this one but without the flaw carrying `id`.
    pub fn without_flaw(&self, id: u32) -> Plan<O> {
        let kept: Vec<TaggedFlaw> = self.flaws.iter().filter(|f| f.id != id).cloned().collect();
        self.with_flaws(kept.into_iter().rev().collect())
    }

    pub fn add_step(&self, action: ActionId, parameters: Vec<Term>) -> (Plan<O>, StepId) {
        let id = StepId::new(self.next_id);
        let step = Step { id, action, parameters };
        let mut next = self.clone();
        next.steps = next.steps.push(step);
        next.orderings = next.orderings.register_step(id.as_u32());
        next.next_id += 1;
        (next, id)
    }

    pub fn add_link(&self, link: Link) -> Plan<O> {
        let mut next = self.clone();
        next.links = next.links.push(link);
        next
    }

    pub fn push_flaw(&self, flaw: Flaw) -> Plan<O> {
        let mut next = self.clone();
        let id = next.next_flaw_id;
        next.next_flaw_id += 1;
        next.flaws = next.flaws.push(TaggedFlaw { id, flaw });
        next
    }

    pub fn step(&self, id: StepId) -> Option<Step> {
        self.steps.iter().find(|s| s.id == id).cloned()
    }
}
