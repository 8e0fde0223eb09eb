//! Domain and problem containers tying together the type/term/predicate/function/action
//! tables, plus the requirements flags and the problem's initial state, goal, and metric.

use std::sync::Arc;

use arcstr::ArcStr;

use crate::actions::ActionTable;
use crate::effects::EffectTiming;
use crate::expressions::{Expression, Rational};
use crate::formula::{Atom, Formula};
use crate::functions::{FunctionStaticity, FunctionTable};
use crate::predicates::{PredicateTable, Staticity};
use crate::terms::{ObjectTable, VariableTable};
use crate::types::TypeTable;

/// PDDL `:requirements` flags. `adl` is kept as a derived convenience (the union of the ADL
/// sub-requirements) rather than a separately settable flag, since it never carries information
/// the others don't already have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub typing: bool,
    pub negative_preconditions: bool,
    pub disjunctive_preconditions: bool,
    pub equality: bool,
    pub existential_preconditions: bool,
    pub universal_preconditions: bool,
    pub conditional_effects: bool,
    pub fluents: bool,
    pub durative_actions: bool,
    pub duration_inequalities: bool,
    pub continuous_effects: bool,
    pub timed_initial_literals: bool,
}

impl Requirements {
    pub fn adl(self) -> bool {
        self.negative_preconditions
            && self.disjunctive_preconditions
            && self.equality
            && self.existential_preconditions
            && self.universal_preconditions
            && self.conditional_effects
    }
}

#[derive(Debug, Clone, Default)]
pub struct Domain {
    pub name: ArcStr,
    pub requirements: Requirements,
    pub types: TypeTable,
    pub predicates: PredicateTable,
    pub functions: FunctionTable,
    pub actions: ActionTable,
    pub constants: ObjectTable,
}

/// A `(at time literal)` timed initial literal: fires as an instantaneous effect at `time`
/// regardless of which step of the plan is executing then.
#[derive(Debug, Clone)]
pub struct TimedInitialLiteral {
    pub time: Rational,
    pub atom: Arc<Atom>,
    pub positive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Metric {
    pub sense: OptimizationSense,
    pub expression: Expression,
}

#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub name: ArcStr,
    pub domain: Arc<Domain>,
    pub objects: ObjectTable,
    pub variables: VariableTable,
    pub init_atoms: Vec<Arc<Atom>>,
    pub init_fluents: Vec<(crate::expressions::FluentApplication, Rational)>,
    pub timed_initial_literals: Vec<TimedInitialLiteral>,
    pub goal: Option<Formula>,
    pub metric: Option<Metric>,
}

impl Problem {
    pub fn init_atom_set(&self) -> hashbrown::HashSet<Arc<Atom>> {
        self.init_atoms.iter().cloned().collect()
    }

    /// Which predicates are dynamic (appear in some action effect at either timing), the
    /// complement of which are the statics usable for closed-world reasoning at grounding time.
    pub fn predicate_staticity(&self) -> Staticity {
        let mut dynamic = hashbrown::HashSet::new();
        for action_id in self.domain.actions.iter() {
            let schema = self.domain.actions.schema(action_id);
            for effect in &schema.effects {
                if let Some(lit) = effect.literal() {
                    dynamic.insert(lit.atom.predicate);
                }
            }
        }
        for til in &self.timed_initial_literals {
            dynamic.insert(til.atom.predicate);
        }
        Staticity::new(dynamic)
    }

    pub fn function_staticity(&self) -> FunctionStaticity {
        let mut dynamic = hashbrown::HashSet::new();
        for action_id in self.domain.actions.iter() {
            let schema = self.domain.actions.schema(action_id);
            for effect in &schema.effects {
                if let crate::effects::EffectTarget::Fluent { fluent, .. } = &effect.target {
                    dynamic.insert(fluent.function);
                }
            }
        }
        FunctionStaticity::new(dynamic)
    }
}

#[allow(unused)]
fn _assert_effect_timing_used(_: EffectTiming) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::PredicateTable;
    use crate::terms::Term;
    use smallvec::smallvec;

    #[test]
    fn staticity_follows_effects() {
        let mut types = TypeTable::new();
        let top = types.top();
        let mut preds = PredicateTable::default();
        let moving = preds.declare("moving", vec![top]);
        let fixed = preds.declare("fixed", vec![top]);

        let mut actions = ActionTable::default();
        let args: smallvec::SmallVec<[Term; 4]> = smallvec![Term::Object(0u32.into())];
        let atom = Arc::new(Atom::new(moving, args));
        let schema = crate::actions::ActionSchema {
            name: "move".into(),
            parameters: vec![],
            parameter_types: vec![],
            kind: crate::actions::ActionKind::Instantaneous,
            conditions: vec![],
            effects: vec![crate::effects::Effect::unconditional(
                crate::effects::EffectTarget::Predicate { atom, positive: true },
                EffectTiming::AtStart,
            )],
        };
        actions.declare(schema);

        let domain = Arc::new(Domain {
            name: "d".into(),
            requirements: Requirements::default(),
            types,
            predicates: preds,
            functions: FunctionTable::default(),
            actions,
            constants: ObjectTable::default(),
        });
        let problem = Problem {
            domain,
            ..Default::default()
        };
        let staticity = problem.predicate_staticity();
        assert!(!staticity.is_static(moving));
        assert!(staticity.is_static(fixed));
    }
}
