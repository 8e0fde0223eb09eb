//! Search driver: one priority queue per configured flaw-selection order, round-robin plan-count
//! limits, and (in IDA* mode) f-limit restarts. Pops the best plan, refines its selected flaw,
//! and pushes every child whose rank is finite, until a complete plan is found or every queue is
//! exhausted or discarded.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use pocl_model::{Atom, Domain, Formula, ObjectTable, Problem, StepId, TypeTable, VariableTable};
use pocl_planning::heuristic::PlanningGraph;
use pocl_planning::plan::Flaw;
use pocl_planning::{refinement, Plan};
use pocl_tnet::Orderings;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::instrument;

use crate::config::{Configuration, SearchAlgorithm, SearchLimit};
use crate::errors::PlanningError;

/// A plan paired with the serial number it was pushed under, so the heap breaks exact rank ties
/// FIFO (smaller serial first) instead of arbitrarily.
struct QueueEntry<O: Orderings> {
    rank: f64,
    serial: u64,
    plan: Plan<O>,
}

impl<O: Orderings> PartialEq for QueueEntry<O> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.serial == other.serial
    }
}
impl<O: Orderings> Eq for QueueEntry<O> {}
impl<O: Orderings> PartialOrd for QueueEntry<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<O: Orderings> Ord for QueueEntry<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; reverse so the lowest rank (and, on ties, the earliest
        // serial) pops first.
        other
            .rank
            .total_cmp(&self.rank)
            .then_with(|| other.serial.cmp(&self.serial))
    }
}

fn rank<O: Orderings>(plan: &Plan<O>, weight: f64) -> f64 {
    let num_steps = plan.steps.iter().count() as f64;
    let num_open = plan
        .flaws
        .iter()
        .filter(|f| matches!(f.flaw, Flaw::OpenCondition(_)))
        .count() as f64;
    num_steps + weight * num_open
}

/// The final "try to ground all lifted step parameters" check before accepting a complete plan:
/// every parameter still a variable must have a non-empty remaining domain. This confirms
/// groundability without committing to one particular ground tuple per step — picking a witness
/// tuple is deferred to plan output, where `Plan::format` reports the first object left in each
/// column's domain.
fn ground_step_parameters<O: Orderings + Clone>(plan: &Plan<O>) -> Option<Plan<O>> {
    for step in plan.steps.iter() {
        for &param in &step.parameters {
            if let pocl_model::Term::Variable(v) = param {
                if let Some(set) = plan.bindings.domain(pocl_model::Term::Variable(v), step.id) {
                    if set.is_empty() {
                        return None;
                    }
                }
            }
        }
    }
    Some(plan.clone())
}

pub struct SearchContext<'a> {
    pub domain: &'a Domain,
    pub objects: &'a ObjectTable,
    pub vars: &'a VariableTable,
    pub types: &'a TypeTable,
    pub init_atoms: &'a [Arc<Atom>],
    pub statics: pocl_model::Staticity,
    pub graph: PlanningGraph,
}

impl<'a> SearchContext<'a> {
    pub fn new(problem: &'a Problem, config: &Configuration) -> Self {
        let domain = &*problem.domain;
        let statics = problem.predicate_staticity();
        let graph = PlanningGraph::build(domain, &problem.objects, &problem.domain.types, &problem.init_atoms, config.action_cost, 0.01);
        SearchContext {
            domain,
            objects: &problem.objects,
            vars: &problem.variables,
            types: &problem.domain.types,
            init_atoms: &problem.init_atoms,
            statics,
            graph,
        }
    }
}

/// Expands every refinement of `plan`'s selected flaw into child plans with an assigned rank.
fn expand<O: Orderings + Default + Clone>(plan: &Plan<O>, ctx: &SearchContext, flaw_id: u32, flaw: &Flaw, weight: f64) -> Vec<Plan<O>> {
    let children = match flaw {
        Flaw::OpenCondition(oc) => {
            refinement::open_condition_refinements(plan, flaw_id, oc, ctx.domain, ctx.objects, ctx.vars, ctx.types, ctx.init_atoms, &ctx.graph)
        }
        // Separation additionally needs the threatening step's instantiated effect atom, which
        // `threat_refinements` does not have in scope; promotion and demotion alone already
        // cover every threat the (currently conservative) `affects` check ever raises.
        Flaw::Unsafe(u) => refinement::threat_refinements(plan, flaw_id, u),
        Flaw::Mutex(m) => refinement::mutex_refinements(plan, flaw_id, m, ctx.objects, ctx.vars, ctx.types),
    };
    let mut ranked = Vec::with_capacity(children.len());
    for mut child in children {
        child.rank = rank(&child, weight);
        child.num_refinements = plan.num_refinements + 1;
        ranked.push(child);
    }
    ranked
}

/// Runs one configured queue (flaw order + search limit) to exhaustion or its plan-count limit,
/// returning the complete plan it found, or the smallest rank among plans it had to drop for
/// exceeding `f_limit` (used by IDA* to pick the next restart's limit).
#[instrument(level = "trace", skip(ctx, initial))]
fn run_queue<O: Orderings + Default + Clone>(
    ctx: &SearchContext,
    config: &Configuration,
    initial: &Plan<O>,
    order_index: usize,
    f_limit: f64,
    deadline: Instant,
) -> Result<Plan<O>, f64> {
    let order = &config.flaw_orders[order_index];
    let limit = config.search_limits[order_index];
    let mut rng = SmallRng::seed_from_u64(config.random_seed ^ order_index as u64);

    let mut heap: BinaryHeap<QueueEntry<O>> = BinaryHeap::new();
    let mut serial: u64 = 0;
    heap.push(QueueEntry {
        rank: rank(initial, config.weight),
        serial,
        plan: initial.clone(),
    });

    let mut popped: u32 = 0;
    let mut smallest_dropped = f64::INFINITY;
    let mut last_selected_step: Option<StepId> = None;

    while let Some(QueueEntry { plan, .. }) = heap.pop() {
        if Instant::now() >= deadline {
            return Err(f64::INFINITY);
        }
        if let SearchLimit::Count(max) = limit {
            if popped >= max {
                break;
            }
        }
        popped += 1;

        if plan.is_complete() {
            if let Some(grounded) = ground_step_parameters(&plan) {
                return Ok(grounded);
            }
            continue;
        }

        let Some(tagged) = pocl_planning::select(
            &plan,
            order,
            ctx.domain,
            ctx.objects,
            ctx.vars,
            ctx.types,
            ctx.init_atoms,
            &ctx.statics,
            &ctx.graph,
            last_selected_step,
            &mut rng,
        ) else {
            continue;
        };
        last_selected_step = match &tagged.flaw {
            Flaw::OpenCondition(oc) => Some(oc.step),
            _ => last_selected_step,
        };

        for child in expand(&plan, ctx, tagged.id, &tagged.flaw, config.weight) {
            if !child.rank.is_finite() {
                continue;
            }
            if child.rank > f_limit {
                smallest_dropped = smallest_dropped.min(child.rank);
                continue;
            }
            serial += 1;
            heap.push(QueueEntry {
                rank: child.rank,
                serial,
                plan: child,
            });
        }
    }

    Err(smallest_dropped)
}

/// Greedy hill-climbing: always refines the single best-ranked child, backtracking never. Stops
/// when a complete plan is reached or no child improves (or is even finite).
fn run_hill_climbing<O: Orderings + Default + Clone>(ctx: &SearchContext, config: &Configuration, initial: &Plan<O>, deadline: Instant) -> Result<Plan<O>, PlanningError> {
    let order = &config.flaw_orders[0];
    let mut rng = SmallRng::seed_from_u64(config.random_seed);
    let mut plan = initial.clone();
    let mut last_selected_step: Option<StepId> = None;

    loop {
        if Instant::now() >= deadline {
            return Err(PlanningError::SearchLimitReached);
        }
        if plan.is_complete() {
            return ground_step_parameters(&plan).ok_or(PlanningError::Unsatisfiable);
        }
        let Some(tagged) = pocl_planning::select(
            &plan,
            order,
            ctx.domain,
            ctx.objects,
            ctx.vars,
            ctx.types,
            ctx.init_atoms,
            &ctx.statics,
            &ctx.graph,
            last_selected_step,
            &mut rng,
        ) else {
            return Err(PlanningError::Unsatisfiable);
        };
        last_selected_step = match &tagged.flaw {
            Flaw::OpenCondition(oc) => Some(oc.step),
            _ => last_selected_step,
        };
        let children = expand(&plan, ctx, tagged.id, &tagged.flaw, config.weight);
        let Some(best) = children
            .into_iter()
            .filter(|c| c.rank.is_finite())
            .min_by(|a, b| a.rank.total_cmp(&b.rank))
        else {
            return Err(PlanningError::Unsatisfiable);
        };
        plan = best;
    }
}

/// Runs search to completion per `config`, returning the first complete, fully-ground plan
/// found, or the error that aborted the run.
#[instrument(level = "debug", skip(problem, config))]
pub fn plan<O: Orderings + Default + Clone>(problem: &Problem, config: &Configuration) -> Result<Plan<O>, PlanningError> {
    let goal = problem.goal.clone().unwrap_or(Formula::True);
    if matches!(goal, Formula::False) {
        return Err(PlanningError::Unsatisfiable);
    }
    let initial = Plan::<O>::initial(goal);
    let ctx = SearchContext::new(problem, config);
    let deadline = Instant::now() + config.time_limit;

    if config.search_algorithm == SearchAlgorithm::HillClimbing {
        return run_hill_climbing(&ctx, config, &initial, deadline);
    }

    let mut f_limit = f64::INFINITY;
    let mut restarts_left = config.max_restarts;

    loop {
        let mut any_dropped = f64::INFINITY;
        for order_index in 0..config.flaw_orders.len() {
            match run_queue(&ctx, config, &initial, order_index, f_limit, deadline) {
                Ok(plan) => return Ok(plan),
                Err(dropped) => any_dropped = any_dropped.min(dropped),
            }
            if Instant::now() >= deadline {
                return Err(PlanningError::SearchLimitReached);
            }
        }

        if config.search_algorithm != SearchAlgorithm::IdaStar || !any_dropped.is_finite() {
            return Err(PlanningError::SearchLimitReached);
        }
        match restarts_left {
            Some(0) => return Err(PlanningError::SearchLimitReached),
            Some(n) => restarts_left = Some(n - 1),
            None => {}
        }
        f_limit = any_dropped;
    }
}
