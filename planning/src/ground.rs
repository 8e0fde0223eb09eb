//! Grounds every action schema against object tuples compatible with its parameter types.
//! This is the preprocessing step the planning-graph heuristic runs once per problem; lifted
//! search itself never needs fully ground actions, only this relaxed byproduct.

use std::sync::Arc;

use pocl_model::{ActionId, Atom, Domain, ObjectId, ObjectTable, Term, TypeTable};
use pocl_collections::create_ref_type;

create_ref_type!(GroundActionId);

#[derive(Debug, Clone)]
pub struct GroundAction {
    pub schema: ActionId,
    pub args: Vec<ObjectId>,
    /// Positive preconditions only (delete relaxation: negative preconditions and conditional
    /// effect guards are dropped for the purposes of the reachability heuristic).
    pub preconditions: Vec<Arc<Atom>>,
    pub add_effects: Vec<Arc<Atom>>,
    pub duration: f64,
    pub cost: f64,
}

fn atoms_of(formula: &pocl_model::Formula, out: &mut Vec<Arc<Atom>>) {
    match formula {
        pocl_model::Formula::Literal(l) if l.positive => out.push(l.atom.clone()),
        pocl_model::Formula::Conjunction(parts) => parts.iter().for_each(|f| atoms_of(f, out)),
        pocl_model::Formula::Timed(inner, _) => atoms_of(inner, out),
        _ => {}
    }
}

/// Enumerates every object tuple compatible with `parameter_types`, then substitutes it into
/// the schema's precondition and add-effects to build one `GroundAction` per tuple.
pub fn instantiate_actions(domain: &Domain, objects: &ObjectTable, types: &TypeTable) -> Vec<GroundAction> {
    let mut grounded = Vec::new();
    for action_id in domain.actions.iter() {
        let schema = domain.actions.schema(action_id);
        let candidates: Vec<Vec<ObjectId>> = schema
            .parameter_types
            .iter()
            .map(|&pt| objects.iter().filter(|&o| types.subtype(objects.type_of(o), pt)).collect())
            .collect();

        let (duration_min, duration_max, cost) = match &schema.kind {
            pocl_model::ActionKind::Instantaneous => (0.0, 0.0, 1.0),
            pocl_model::ActionKind::Durative { duration } => {
                let v = duration
                    .value
                    .evaluate(&|_| None)
                    .map(|r| r.to_f64())
                    .unwrap_or(1.0);
                (v, v, v)
            }
        };

        for tuple in cartesian_product(&candidates) {
            let sub = |v: pocl_model::VariableId| -> Term {
                schema
                    .parameters
                    .iter()
                    .position(|&p| p == v)
                    .map(|idx| Term::Object(tuple[idx]))
                    .unwrap_or(Term::Variable(v))
            };
            let precondition = schema.precondition().substitute(&sub);
            let mut preconditions = Vec::new();
            atoms_of(&precondition, &mut preconditions);

            let mut add_effects = Vec::new();
            for effect in &schema.effects {
                if effect.condition.is_some() {
                    continue;
                }
                if let Some(lit) = effect.literal() {
                    if lit.positive {
                        let substituted = effect.substitute(&sub);
                        if let Some(l) = substituted.literal() {
                            add_effects.push(l.atom);
                        }
                    }
                }
            }

            grounded.push(GroundAction {
                schema: action_id,
                args: tuple,
                preconditions,
                add_effects,
                duration: duration_max.max(duration_min),
                cost,
            });
        }
    }
    grounded
}

fn cartesian_product(lists: &[Vec<ObjectId>]) -> Vec<Vec<ObjectId>> {
    let mut result = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(result.len() * list.len().max(1));
        for prefix in &result {
            for &item in list {
                let mut v = prefix.clone();
                v.push(item);
                next.push(v);
            }
        }
        result = next;
    }
    if lists.is_empty() {
        vec![Vec::new()]
    } else {
        result
    }
}
