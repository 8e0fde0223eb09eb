//! Flaw-selection policy: an ordered list of criteria, each restricting to a set of flaw
//! kinds and breaking ties within that set by a configured order. The first criterion whose
//! applicable set is non-empty wins; its tie-break picks exactly one flaw to refine next.

use std::sync::Arc;

use pocl_model::{Atom, Domain, ObjectTable, Staticity, StepId, Term, TypeTable, VariableTable};
use pocl_tnet::Orderings;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::heuristic::PlanningGraph;
use crate::plan::{Flaw, Plan, TaggedFlaw, UnsafeLink};

/// The six flaw-kind filters a criterion can restrict to. A flaw may match more than one: an
/// open condition over a static predicate on the step just selected is simultaneously `Open`,
/// `LocalOpen` and `StaticOpen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlawKind {
    NonSeparableThreat,
    SeparableThreat,
    Open,
    /// An open condition on the same step as the previously selected flaw.
    LocalOpen,
    StaticOpen,
    /// Any threat, separable or not — the coarse "there is an unresolved causal-link danger"
    /// filter, as opposed to the two finer-grained threat kinds above.
    UnsafeOpen,
}

/// Per-criterion toggle bits from the flaw-order grammar's `{flag...}` prefix (`s`, `n`, `r`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriterionFlags {
    pub separable_only: bool,
    pub non_separable_only: bool,
    pub reuse_heuristic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    Lifo,
    Fifo,
    Random,
    LeastRefinements,
    MostRefinements,
    /// Prefer open conditions no existing step can satisfy (must add a fresh step).
    NewStep,
    /// Prefer open conditions some existing step can already satisfy.
    ReuseStep,
    LeastHeuristic,
    MostHeuristic,
}

/// Which component of the planning-graph estimate a heuristic tie-break ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankHeuristic {
    AdditiveCost,
    Work,
    Makespan,
}

#[derive(Debug, Clone)]
pub struct Criterion {
    pub kinds: Vec<FlawKind>,
    pub max_refinements: Option<u32>,
    pub tie_break: TieBreak,
    pub rank_heuristic: RankHeuristic,
    pub flags: CriterionFlags,
}

impl Criterion {
    pub fn new(kinds: Vec<FlawKind>, tie_break: TieBreak) -> Self {
        Criterion {
            kinds,
            max_refinements: None,
            tie_break,
            rank_heuristic: RankHeuristic::AdditiveCost,
            flags: CriterionFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlawOrder {
    pub criteria: Vec<Criterion>,
}

/// The threatening step's effect atom whose polarity opposes the link condition, substituted
/// with that step's current (possibly still-lifted) parameter bindings.
fn threatening_atom<O: Orderings>(plan: &Plan<O>, domain: &Domain, threat: &UnsafeLink) -> Option<Arc<Atom>> {
    let step = plan.step(threat.threatening_step)?;
    let schema = domain.actions.schema(step.action);
    let sub = |v: pocl_model::VariableId| -> Term {
        schema
            .parameters
            .iter()
            .position(|&p| p == v)
            .map(|idx| step.parameters[idx])
            .unwrap_or(Term::Variable(v))
    };
    for effect in &schema.effects {
        let Some(lit) = effect.literal() else { continue };
        if lit.positive == threat.link.condition.positive || lit.atom.predicate != threat.link.condition.atom.predicate {
            continue;
        }
        let substituted = effect.substitute(&sub);
        if let Some(l) = substituted.literal() {
            return Some(l.atom);
        }
    }
    None
}

fn is_separable<O: Orderings>(plan: &Plan<O>, domain: &Domain, threat: &UnsafeLink) -> bool {
    match threatening_atom(plan, domain, threat) {
        Some(atom) => atom
            .args
            .iter()
            .zip(threat.link.condition.atom.args.iter())
            .any(|(a, b)| a != b && plan.bindings.consistent_with_inequality(*a, *b)),
        None => false,
    }
}

fn classify<O: Orderings>(
    plan: &Plan<O>,
    domain: &Domain,
    statics: &Staticity,
    last_selected_step: Option<StepId>,
    flaw: &Flaw,
) -> Vec<FlawKind> {
    match flaw {
        Flaw::OpenCondition(oc) => {
            let mut kinds = vec![FlawKind::Open];
            if last_selected_step == Some(oc.step) {
                kinds.push(FlawKind::LocalOpen);
            }
            if oc.is_static(statics) {
                kinds.push(FlawKind::StaticOpen);
            }
            kinds
        }
        Flaw::Unsafe(u) => {
            let mut kinds = vec![FlawKind::UnsafeOpen];
            if is_separable(plan, domain, u) {
                kinds.push(FlawKind::SeparableThreat);
            } else {
                kinds.push(FlawKind::NonSeparableThreat);
            }
            kinds
        }
        Flaw::Mutex(_) => vec![FlawKind::UnsafeOpen],
    }
}

fn matches(criterion: &Criterion, kinds: &[FlawKind]) -> bool {
    if !criterion.kinds.iter().any(|k| kinds.contains(k)) {
        return false;
    }
    if criterion.flags.separable_only && !kinds.contains(&FlawKind::SeparableThreat) {
        return false;
    }
    if criterion.flags.non_separable_only && !kinds.contains(&FlawKind::NonSeparableThreat) {
        return false;
    }
    true
}

/// Number of refinements this flaw currently has, for LR/MR tie-breaks and the `max_refs`
/// grammar filter. Shares the real enumerators rather than a separate counting routine — a
/// deliberate simplification of VHPOP's dedicated "test only" counting pass, since the
/// enumerators here are already pure functions over an immutable `Plan` snapshot.
#[allow(clippy::too_many_arguments)]
fn refinement_count<O: Orderings + Default>(
    plan: &Plan<O>,
    tagged: &TaggedFlaw,
    domain: &Domain,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
    init_atoms: &[Arc<pocl_model::Atom>],
    graph: &PlanningGraph,
) -> usize {
    match &tagged.flaw {
        Flaw::OpenCondition(oc) => {
            crate::refinement::open_condition_refinements(plan, tagged.id, oc, domain, objects, vars, types, init_atoms, graph).len()
        }
        Flaw::Unsafe(u) => crate::refinement::threat_refinements(plan, tagged.id, u).len(),
        Flaw::Mutex(m) => crate::refinement::mutex_refinements(plan, tagged.id, m, objects, vars, types).len(),
    }
}

fn has_reuse_candidate<O: Orderings>(plan: &Plan<O>, domain: &Domain, oc: &crate::plan::OpenCondition) -> bool {
    let Some(lit) = oc.condition.as_literal() else { return false };
    plan.steps.iter().any(|step| {
        let schema = domain.actions.schema(step.action);
        schema.effects.iter().any(|effect| {
            effect
                .literal()
                .is_some_and(|eff_lit| eff_lit.positive == lit.positive && eff_lit.atom.predicate == lit.atom.predicate)
        })
    })
}

fn heuristic_rank<O: Orderings>(plan: &Plan<O>, domain: &Domain, graph: &PlanningGraph, criterion: &Criterion, flaw: &Flaw) -> f64 {
    let Flaw::OpenCondition(oc) = flaw else { return 0.0 };
    let Some(lit) = oc.condition.as_literal() else { return f64::INFINITY };
    if !lit.atom.is_ground() {
        return 0.0;
    }
    if criterion.flags.reuse_heuristic && has_reuse_candidate(plan, domain, oc) {
        return 0.0;
    }
    let value = graph.value(&lit.atom);
    match criterion.rank_heuristic {
        RankHeuristic::AdditiveCost => value.cost,
        RankHeuristic::Work => value.work,
        RankHeuristic::Makespan => value.makespan,
    }
}

/// Scans `order`'s criteria for the first with a non-empty applicable set, then applies that
/// criterion's tie-break to choose exactly one flaw. Returns `None` only when the plan has no
/// flaws at all.
#[allow(clippy::too_many_arguments)]
pub fn select<O: Orderings + Default>(
    plan: &Plan<O>,
    order: &FlawOrder,
    domain: &Domain,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
    init_atoms: &[Arc<pocl_model::Atom>],
    statics: &Staticity,
    graph: &PlanningGraph,
    last_selected_step: Option<StepId>,
    rng: &mut SmallRng,
) -> Option<TaggedFlaw> {
    let all: Vec<TaggedFlaw> = plan.flaws.iter().cloned().collect();
    if all.is_empty() {
        return None;
    }

    for criterion in &order.criteria {
        let applicable: Vec<&TaggedFlaw> = all
            .iter()
            .filter(|f| {
                let kinds = classify(plan, domain, statics, last_selected_step, &f.flaw);
                if !matches(criterion, &kinds) {
                    return false;
                }
                if let Some(max) = criterion.max_refinements {
                    let count = refinement_count(plan, f, domain, objects, vars, types, init_atoms, graph);
                    if count as u32 > max {
                        return false;
                    }
                }
                true
            })
            .collect();
        if applicable.is_empty() {
            continue;
        }

        let chosen = match criterion.tie_break {
            TieBreak::Lifo => applicable.iter().max_by_key(|f| f.id).copied(),
            TieBreak::Fifo => applicable.iter().min_by_key(|f| f.id).copied(),
            TieBreak::Random => {
                let idx = rng.gen_range(0..applicable.len());
                Some(applicable[idx])
            }
            TieBreak::LeastRefinements => applicable
                .iter()
                .min_by_key(|f| refinement_count(plan, f, domain, objects, vars, types, init_atoms, graph))
                .copied(),
            TieBreak::MostRefinements => applicable
                .iter()
                .max_by_key(|f| refinement_count(plan, f, domain, objects, vars, types, init_atoms, graph))
                .copied(),
            TieBreak::NewStep => applicable
                .iter()
                .find(|f| matches!(&f.flaw, Flaw::OpenCondition(oc) if !has_reuse_candidate(plan, domain, oc)))
                .or_else(|| applicable.first())
                .copied(),
            TieBreak::ReuseStep => applicable
                .iter()
                .find(|f| matches!(&f.flaw, Flaw::OpenCondition(oc) if has_reuse_candidate(plan, domain, oc)))
                .or_else(|| applicable.first())
                .copied(),
            TieBreak::LeastHeuristic => applicable
                .iter()
                .min_by(|a, b| {
                    heuristic_rank(plan, domain, graph, criterion, &a.flaw)
                        .partial_cmp(&heuristic_rank(plan, domain, graph, criterion, &b.flaw))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .copied(),
            TieBreak::MostHeuristic => applicable
                .iter()
                .max_by(|a, b| {
                    heuristic_rank(plan, domain, graph, criterion, &a.flaw)
                        .partial_cmp(&heuristic_rank(plan, domain, graph, criterion, &b.flaw))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .copied(),
        };

        if let Some(flaw) = chosen {
            return Some(flaw.clone());
        }
    }

    // No criterion matched (a pathological flaw order); fall back to FIFO over everything so
    // the driver always makes progress.
    all.into_iter().min_by_key(|f| f.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_model::{Formula, Literal, PredicateTable};
    use pocl_tnet::BinaryOrderings;
    use rand::SeedableRng;

    fn empty_domain() -> Domain {
        Domain {
            name: "d".into(),
            requirements: Default::default(),
            types: TypeTable::new(),
            predicates: PredicateTable::default(),
            functions: Default::default(),
            actions: Default::default(),
            constants: ObjectTable::default(),
        }
    }

    #[test]
    fn fifo_picks_oldest_open_condition() {
        let domain = empty_domain();
        let objects = ObjectTable::default();
        let vars = VariableTable::default();
        let types = TypeTable::new();
        let statics = Staticity::new(std::iter::empty());
        let init = [];
        let graph = PlanningGraph::build(&domain, &objects, &types, &init, crate::heuristic::ActionCostMode::Unit, 0.01);

        let no_args: smallvec::SmallVec<[Term; 4]> = smallvec::SmallVec::new();
        let plan = Plan::<BinaryOrderings>::initial(Formula::Literal(Literal::positive(Arc::new(Atom::new(
            0u32.into(),
            no_args.clone(),
        )))));
        let plan = plan.push_flaw(Flaw::OpenCondition(crate::plan::OpenCondition {
            step: StepId::GOAL,
            condition: Formula::Literal(Literal::positive(Arc::new(Atom::new(0u32.into(), no_args)))),
            when: crate::plan::ConditionTiming::AtStart,
        }));

        let order = FlawOrder {
            criteria: vec![Criterion::new(vec![FlawKind::Open], TieBreak::Fifo)],
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let chosen = select(&plan, &order, &domain, &objects, &vars, &types, &[], &statics, &graph, None, &mut rng).unwrap();
        assert_eq!(chosen.id, 0);
    }

    #[test]
    fn lifo_picks_most_recent_flaw() {
        let domain = empty_domain();
        let objects = ObjectTable::default();
        let vars = VariableTable::default();
        let types = TypeTable::new();
        let statics = Staticity::new(std::iter::empty());
        let init = [];
        let graph = PlanningGraph::build(&domain, &objects, &types, &init, crate::heuristic::ActionCostMode::Unit, 0.01);

        let no_args: smallvec::SmallVec<[Term; 4]> = smallvec::SmallVec::new();
        let plan = Plan::<BinaryOrderings>::initial(Formula::True);
        let plan = plan.push_flaw(Flaw::OpenCondition(crate::plan::OpenCondition {
            step: StepId::GOAL,
            condition: Formula::Literal(Literal::positive(Arc::new(Atom::new(0u32.into(), no_args)))),
            when: crate::plan::ConditionTiming::AtStart,
        }));

        let order = FlawOrder {
            criteria: vec![Criterion::new(vec![FlawKind::Open], TieBreak::Lifo)],
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let chosen = select(&plan, &order, &domain, &objects, &vars, &types, &[], &statics, &graph, None, &mut rng).unwrap();
        assert_eq!(chosen.id, 1);
    }
}
