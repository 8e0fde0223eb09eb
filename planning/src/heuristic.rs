//! Planning-graph heuristic: relaxed (delete-free) reachability over the grounded actions,
//! producing a `(cost, work, makespan)` estimate for every ground atom and recording achievers
//! usable both as a distance-to-goal estimate and as a source of candidate establishers for
//! open conditions.

use std::sync::Arc;

use hashbrown::HashMap;
use pocl_model::{Atom, Domain, ObjectTable, TypeTable};

use crate::ground::{instantiate_actions, GroundAction};

pub const INFINITE: f64 = f64::INFINITY;

/// The three componentwise-additive quantities the heuristic tracks per literal: number of
/// actions (cost, duration-weighted), number of distinct actions touched (work), and the
/// earliest time the literal can be achieved (makespan).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicValue {
    pub cost: f64,
    pub work: f64,
    pub makespan: f64,
}

impl HeuristicValue {
    pub const ZERO: HeuristicValue = HeuristicValue {
        cost: 0.0,
        work: 0.0,
        makespan: 0.0,
    };
    pub const INFEASIBLE: HeuristicValue = HeuristicValue {
        cost: INFINITE,
        work: INFINITE,
        makespan: INFINITE,
    };

    pub fn is_feasible(&self) -> bool {
        self.cost.is_finite()
    }

    pub fn plus(self, rhs: HeuristicValue) -> HeuristicValue {
        HeuristicValue {
            cost: self.cost + rhs.cost,
            work: self.work + rhs.work,
            makespan: self.makespan.max(rhs.makespan),
        }
    }

    fn componentwise_min(self, rhs: HeuristicValue) -> HeuristicValue {
        HeuristicValue {
            cost: self.cost.min(rhs.cost),
            work: self.work.min(rhs.work),
            makespan: self.makespan.min(rhs.makespan),
        }
    }
}

/// Action-cost accounting mode: `Unit` counts one per action regardless of duration, `Duration`
/// weights by the action's (grounded) duration, `Relative` weights by duration relative to the
/// global separation threshold (so near-instantaneous actions still cost at least one unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCostMode {
    Unit,
    Duration,
    Relative,
}

impl ActionCostMode {
    fn weight(self, duration: f64, threshold: f64) -> f64 {
        match self {
            ActionCostMode::Unit => 1.0,
            ActionCostMode::Duration => duration,
            ActionCostMode::Relative => (duration / threshold.max(1e-9)).max(1.0),
        }
    }
}

pub struct PlanningGraph {
    pub actions: Vec<GroundAction>,
    values: HashMap<Arc<Atom>, HeuristicValue>,
    achievers: HashMap<Arc<Atom>, Vec<usize>>,
}

impl PlanningGraph {
    /// Grounds the domain and runs the fixpoint to exhaustion (step 4 of the preprocessing
    /// algorithm: repeat until no atom's value improves any further).
    pub fn build(
        domain: &Domain,
        objects: &ObjectTable,
        types: &TypeTable,
        init: &[Arc<Atom>],
        mode: ActionCostMode,
        threshold: f64,
    ) -> PlanningGraph {
        let actions = instantiate_actions(domain, objects, types);
        let mut values: HashMap<Arc<Atom>, HeuristicValue> = HashMap::new();
        let mut achievers: HashMap<Arc<Atom>, Vec<usize>> = HashMap::new();

        for atom in init {
            values.insert(atom.clone(), HeuristicValue::ZERO);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (idx, action) in actions.iter().enumerate() {
                let Some(pre_value) = action
                    .preconditions
                    .iter()
                    .try_fold(HeuristicValue::ZERO, |acc, atom| values.get(atom).map(|v| acc.plus(*v)))
                else {
                    continue;
                };
                let weight = mode.weight(action.duration, threshold);
                let action_value = HeuristicValue {
                    cost: pre_value.cost + weight,
                    work: pre_value.work + 1.0,
                    makespan: pre_value.makespan + threshold + action.duration,
                };
                for effect in &action.add_effects {
                    let entry = values.entry(effect.clone()).or_insert(HeuristicValue::INFEASIBLE);
                    let merged = entry.componentwise_min(action_value);
                    if merged.cost < entry.cost {
                        *entry = merged;
                        achievers.entry(effect.clone()).or_default().push(idx);
                        changed = true;
                    }
                }
            }
        }

        PlanningGraph { actions, values, achievers }
    }

    pub fn value(&self, atom: &Arc<Atom>) -> HeuristicValue {
        self.values.get(atom).copied().unwrap_or(HeuristicValue::INFEASIBLE)
    }

    pub fn achievers(&self, atom: &Arc<Atom>) -> &[usize] {
        self.achievers.get(atom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of a conjunction of ground atoms' values (the usual h_add combination rule used both
    /// to rank open conditions and to estimate a plan's distance to completion).
    pub fn estimate(&self, atoms: &[Arc<Atom>]) -> HeuristicValue {
        atoms.iter().fold(HeuristicValue::ZERO, |acc, atom| acc.plus(self.value(atom)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_model::{ActionKind, ActionSchema, ActionTable, Effect, EffectTarget, EffectTiming, PredicateTable, Requirements, Term, TimedCondition, FormulaTime, Formula, VariableTable};
    use smallvec::smallvec;

    #[test]
    fn reaches_goal_atom_through_one_action() {
        let mut types = TypeTable::new();
        let top = types.top();
        let mut objects = ObjectTable::default();
        objects.declare("a", top);
        let mut preds = PredicateTable::default();
        let p = preds.declare("p", vec![top]);
        let q = preds.declare("q", vec![top]);

        let obj_a = objects.get("a").unwrap();
        let args: smallvec::SmallVec<[Term; 4]> = smallvec![Term::Object(obj_a)];
        let p_atom = Arc::new(Atom::new(p, args.clone()));
        let q_atom = Arc::new(Atom::new(q, args));

        let mut actions = ActionTable::default();
        let schema = ActionSchema {
            name: "act".into(),
            parameters: vec![],
            parameter_types: vec![],
            kind: ActionKind::Instantaneous,
            conditions: vec![TimedCondition {
                formula: Formula::Literal(pocl_model::Literal::positive(p_atom.clone())),
                when: FormulaTime::AtStart,
            }],
            effects: vec![Effect::unconditional(
                EffectTarget::Predicate { atom: q_atom.clone(), positive: true },
                EffectTiming::AtStart,
            )],
        };
        actions.declare(schema);

        let domain = Domain {
            name: "d".into(),
            requirements: Requirements::default(),
            types,
            predicates: preds,
            functions: Default::default(),
            actions,
            constants: ObjectTable::default(),
        };

        let graph = PlanningGraph::build(&domain, &objects, &domain.types, &[p_atom], ActionCostMode::Unit, 0.01);
        let value = graph.value(&q_atom);
        assert!(value.is_feasible());
        assert_eq!(value.cost, 1.0);
    }

    #[test]
    fn unreachable_atom_is_infeasible() {
        let mut types = TypeTable::new();
        let _ = types.top();
        let objects = ObjectTable::default();
        let mut preds = PredicateTable::default();
        let r = preds.declare("r", vec![]);
        let domain = Domain {
            name: "d".into(),
            requirements: Requirements::default(),
            types,
            predicates: preds,
            functions: Default::default(),
            actions: ActionTable::default(),
            constants: ObjectTable::default(),
        };
        let args: smallvec::SmallVec<[Term; 4]> = smallvec::SmallVec::new();
        let r_atom = Arc::new(Atom::new(r, args));
        let graph = PlanningGraph::build(&domain, &objects, &domain.types, &[], ActionCostMode::Unit, 0.01);
        assert!(!graph.value(&r_atom).is_feasible());
    }
}
