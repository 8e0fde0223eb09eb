//! Plan refinement: turns one flaw into the list of plans that resolve it. `refinements`
//! dispatches on the flaw the flaw-selection policy chose; everything else in this module is
//! one refinement family.

use std::sync::Arc;

use pocl_model::{
    ActionKind, ActionSchema, Atom, Domain, DurationConstraint, Effect, Formula, FormulaTime, Literal, ObjectTable, Problem, StepId, Term, TypeTable, VariableId, VariableTable,
};
use pocl_tnet::{Orderings, StepTime};

use crate::bindings::{ActionDomain, Bindings, StepDomain};
use crate::heuristic::PlanningGraph;
use crate::plan::{ConditionTiming, Flaw, Link, MutexThreat, OpenCondition, Plan, Step, UnsafeLink};

/// Allocates one fresh variable per schema parameter (same declared type, new identity), so
/// that instantiating the same action schema twice in one plan never has the two instances
/// share a varset. This is the "freshly allocated by a global counter" rule from the term
/// model applied at the point a schema actually becomes a step.
fn freshen_parameters(schema: &ActionSchema, vars: &VariableTable) -> Vec<Term> {
    schema.parameter_types.iter().map(|&tpe| Term::Variable(vars.fresh(tpe))).collect()
}

/// The substitution that maps a schema's own (shared, reused-across-instantiations) parameter
/// variables to the concrete terms a particular step actually carries. Used both right after
/// freshening (to build the step's precondition/effects) and later, whenever a refinement needs
/// to re-derive an *existing* step's instantiated effects from its schema and its stored
/// `Step::parameters` (e.g. threat detection against steps already in the plan).
fn step_substitution<'a>(schema: &'a ActionSchema, params: &'a [Term]) -> impl Fn(VariableId) -> Term + 'a {
    move |v| schema.parameters.iter().position(|&p| p == v).map(|i| params[i]).unwrap_or(Term::Variable(v))
}

/// A step's effects, each substituted from schema-parameter variables to the step's actual
/// argument terms.
fn instantiated_effects<'a>(schema: &'a ActionSchema, params: &'a [Term]) -> impl Iterator<Item = Effect> + 'a {
    let sub = step_substitution(schema, params);
    schema.effects.iter().map(move |e| e.substitute(&sub))
}

/// Decomposes a formula being added as a goal into bindings and fresh open conditions,
/// following the same recursive structure as the formula algebra itself.
pub fn add_goal<O: Orderings>(
    plan: &Plan<O>,
    step: StepId,
    formula: &Formula,
    when: ConditionTiming,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Option<Plan<O>> {
    match formula {
        Formula::True => Some(plan.clone()),
        Formula::False => None,
        Formula::Literal(_) => Some(plan.push_flaw(Flaw::OpenCondition(OpenCondition {
            step,
            condition: formula.clone(),
            when,
        }))),
        Formula::Conjunction(parts) => {
            let mut cur = plan.clone();
            for part in parts.iter() {
                cur = add_goal(&cur, step, part, when, objects, vars, types)?;
            }
            Some(cur)
        }
        Formula::Disjunction(_) => Some(plan.push_flaw(Flaw::OpenCondition(OpenCondition {
            step,
            condition: formula.clone(),
            when,
        }))),
        Formula::Equality(a, _, b, _) => plan.clone().add_equality_binding(*a, *b, objects, vars, types),
        Formula::Inequality(a, b, _, _) => Some(plan.push_flaw(Flaw::OpenCondition(OpenCondition {
            step,
            condition: formula.clone(),
            when,
        }))),
        Formula::Exists(_, body) => add_goal(plan, step, body, when, objects, vars, types),
        Formula::Forall(_) => {
            // Callers are expected to have already replaced `Forall` nodes with their
            // pre-expanded universal base before reaching `add_goal`.
            None
        }
        Formula::Timed(body, t) => add_goal(plan, step, body, (*t).into(), objects, vars, types),
    }
}

impl<O: Orderings> Plan<O> {
    /// Requests codesignation of `a` and `b`. Fails (pruning the branch) when the two terms can
    /// never be made equal — distinct ground objects, or a variable/object pair whose types
    /// share no common subtype — rather than silently keeping the unconstrained bindings.
    fn add_equality_binding(&self, a: Term, b: Term, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> Option<Plan<O>> {
        let mut next = self.clone();
        next.bindings = next.bindings.add_equality(a, b, objects, vars, types)?;
        Some(next)
    }
}

/// Every refinement produced for one open condition over a `Literal`: new steps to add
/// (add-step family) paired with causal links to existing steps (reuse-step family).
pub fn open_condition_refinements<O: Orderings + Default>(
    plan: &Plan<O>,
    flaw_id: u32,
    oc: &OpenCondition,
    domain: &Domain,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
    init_atoms: &[Arc<Atom>],
    graph: &PlanningGraph,
) -> Vec<Plan<O>> {
    let Some(lit) = oc.condition.as_literal() else {
        return disjunctive_or_cwa_refinements(plan, flaw_id, oc);
    };

    let mut children = Vec::new();
    let base = plan.without_flaw(flaw_id);

    // Reuse the initial state: step 0's "effects" are the problem's initial atoms, always
    // ordered before every other step, so no ordering constraint needs asserting here.
    if lit.positive {
        for atom in init_atoms {
            if atom.predicate != lit.atom.predicate {
                continue;
            }
            let mut next = base.clone();
            let mut ok = true;
            for (a, b) in atom.args.iter().zip(lit.atom.args.iter()) {
                match next.bindings.add_equality(*a, *b, objects, vars, types) {
                    Some(bindings) => next.bindings = bindings,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            let link = Link {
                from: StepId::INIT,
                condition: Literal::positive(atom.clone()),
                to: oc.step,
            };
            next = next.add_link(link.clone());
            next = detect_new_threats(&next, &link, domain, objects, vars, types);
            children.push(next);
        }
    }

    // Reuse-step: any existing step whose action has a matching effect and orders before the
    // consumer. The schema's effect is restated in terms of the step's actual (fresh)
    // parameter terms before matching, since the schema itself is shared across every
    // instantiation.
    for step in plan.steps.iter() {
        let schema = domain.actions.schema(step.action);
        let sub = step_substitution(schema, &step.parameters);
        for effect in &schema.effects {
            let Some(eff_lit) = effect.literal() else { continue };
            if eff_lit.positive != lit.positive || eff_lit.atom.predicate != lit.atom.predicate {
                continue;
            }
            if !plan
                .orderings
                .possibly_before(step.id.as_u32(), StepTime::AT_START, oc.step.as_u32(), StepTime::AT_START)
            {
                continue;
            }
            let instantiated = effect.substitute(&sub);
            if let Some(child) = try_link(&base, step.id, &instantiated, oc, domain, objects, vars, types) {
                children.push(child);
            }
        }
    }

    // Add-step: fresh instance of every action schema with a matching effect. Parameters are
    // freshened so this new step never shares a varset with any other instance of the same
    // schema already (or later) in the plan.
    for action_id in domain.actions.iter() {
        let schema = domain.actions.schema(action_id);
        for effect in &schema.effects {
            let Some(eff_lit) = effect.literal() else { continue };
            if eff_lit.positive != lit.positive || eff_lit.atom.predicate != lit.atom.predicate {
                continue;
            }
            let params = freshen_parameters(schema, vars);
            let sub = step_substitution(schema, &params);
            let (mut next, new_step) = base.add_step(action_id, params.clone());

            let tuples = graph
                .actions
                .iter()
                .filter(|ga| ga.schema == action_id)
                .map(|ga| ga.args.clone().into())
                .collect();
            next.bindings = next.bindings.register_step_domain(
                new_step,
                StepDomain {
                    params: params.iter().filter_map(|t| t.as_variable()).collect(),
                    domain: Arc::new(ActionDomain::new(tuples)),
                },
            );

            let precondition = schema.precondition().substitute(&sub);
            let Some(mut next) = add_goal(&next, new_step, &precondition, ConditionTiming::AtStart, objects, vars, types) else {
                continue;
            };
            if schema.is_durative() {
                if let ActionKind::Durative { duration } = &schema.kind {
                    let value = duration.value.substitute(&sub).evaluate(&|_| None).map(|r| r.to_f64()).unwrap_or(0.0);
                    let (min_duration, max_duration) = match duration.constraint {
                        DurationConstraint::Exact => (value, value),
                        DurationConstraint::AtLeast => (value, f64::INFINITY),
                        DurationConstraint::AtMost => (0.0, value),
                    };
                    let Some(orderings) = next.orderings.constrain_duration(new_step.as_u32(), min_duration, max_duration) else {
                        continue;
                    };
                    next.orderings = orderings;
                }
            }
            let instantiated = effect.substitute(&sub);
            let Some(mut next) = try_link(&next, new_step, &instantiated, oc, domain, objects, vars, types) else {
                continue;
            };
            // The new step's other effects may threaten causal links already established
            // elsewhere in the plan, independent of the one just used to satisfy `oc`.
            next = scan_new_step_effects(&next, new_step, schema, &sub, objects, vars, types);
            // Durative steps that may now run concurrently with another durative step and
            // write mutually exclusive values become a `Mutex` flaw rather than an `Unsafe`
            // one, since there is no causal link for promotion/demotion to protect.
            next = detect_mutex_threats(&next, new_step, schema, &sub, domain, objects, vars, types);
            children.push(next);
        }
    }

    children
}

fn disjunctive_or_cwa_refinements<O: Orderings>(plan: &Plan<O>, flaw_id: u32, oc: &OpenCondition) -> Vec<Plan<O>> {
    let base = plan.without_flaw(flaw_id);
    match &oc.condition {
        Formula::Disjunction(parts) => parts
            .iter()
            .map(|part| {
                base.push_flaw(Flaw::OpenCondition(OpenCondition {
                    step: oc.step,
                    condition: part.clone(),
                    when: oc.when,
                }))
            })
            .collect(),
        negation if oc.condition.as_literal().is_some_and(|l| !l.positive) => {
            let _ = negation;
            vec![base]
        }
        _ => Vec::new(),
    }
}

fn try_link<O: Orderings>(
    plan: &Plan<O>,
    producer: StepId,
    effect: &pocl_model::Effect,
    oc: &OpenCondition,
    domain: &Domain,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Option<Plan<O>> {
    let lit = oc.condition.as_literal()?;
    let eff_lit = effect.literal()?;

    let unifier = Bindings::unify(&eff_lit.atom, &lit.atom, objects, vars, types)?;
    let mut next = plan.clone();
    next.bindings = next.bindings.add(&unifier, objects, vars, types, false)?;

    if let Some(condition) = &effect.condition {
        next = add_goal(&next, producer, condition, ConditionTiming::AtStart, objects, vars, types)?;
    }
    if let Some(link_condition) = &effect.link_condition_for_threats() {
        next = add_goal(&next, producer, link_condition, ConditionTiming::AtStart, objects, vars, types)?;
    }

    let orderings = next.orderings.add_order(producer.as_u32(), StepTime::AT_START, oc.step.as_u32(), StepTime::AT_START)?;
    next.orderings = orderings;

    let link = Link {
        from: producer,
        condition: eff_lit,
        to: oc.step,
    };
    next = next.add_link(link.clone());

    next = detect_new_threats(&next, &link, domain, objects, vars, types);

    Some(next)
}

/// Any existing step whose instantiated effect `affects` the new link's condition and which
/// can occur between the link's endpoints becomes a new `Unsafe` flaw. Step 0 (the initial
/// state) and step ∞ (the goal) never threaten — the initial step's "effects" only ever add,
/// and the goal step has none.
fn detect_new_threats<O: Orderings>(plan: &Plan<O>, link: &Link, domain: &Domain, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> Plan<O> {
    let mut next = plan.clone();
    for step in plan.steps.iter() {
        if step.id == link.from || step.id == link.to {
            continue;
        }
        if !interposable(plan, step.id, link.from, link.to) {
            continue;
        }
        let schema = domain.actions.schema(step.action);
        let sub = step_substitution(schema, &step.parameters);
        for effect in &schema.effects {
            let Some(eff_lit) = effect.literal() else { continue };
            let atom = Arc::new(eff_lit.atom.substitute_args(&sub));
            let eff_lit = Literal { atom: atom.clone(), positive: eff_lit.positive };
            if Bindings::affects(&eff_lit, &link.condition, objects, vars, types) {
                next = next.push_flaw(Flaw::Unsafe(UnsafeLink {
                    link: link.clone(),
                    threatening_step: step.id,
                    threatening_atom: atom,
                }));
            }
        }
    }
    next
}

/// After adding a new step, its effects *other than* the one just linked may threaten causal
/// links already present in the plan (spec's "if the producing step is new, also scan existing
/// links for threats introduced by the step's other effects").
fn scan_new_step_effects<O: Orderings>(
    plan: &Plan<O>,
    new_step: StepId,
    schema: &ActionSchema,
    sub: &impl Fn(VariableId) -> Term,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Plan<O> {
    let mut next = plan.clone();
    let existing_links: Vec<Link> = plan.links.iter().cloned().collect();
    for effect in &schema.effects {
        let Some(eff_lit) = effect.literal() else { continue };
        let atom = Arc::new(eff_lit.atom.substitute_args(sub));
        let eff_lit = Literal { atom: atom.clone(), positive: eff_lit.positive };
        for link in &existing_links {
            if link.from == new_step || link.to == new_step {
                continue;
            }
            if !interposable(&next, new_step, link.from, link.to) {
                continue;
            }
            if Bindings::affects(&eff_lit, &link.condition, objects, vars, types) {
                next = next.push_flaw(Flaw::Unsafe(UnsafeLink {
                    link: link.clone(),
                    threatening_step: new_step,
                    threatening_atom: atom.clone(),
                }));
            }
        }
    }
    next
}

/// A newly added durative step's effects may coincide in time with another durative step's
/// effects and jointly write mutually exclusive values to the same state variable, independent
/// of any causal link. Only scans pairs where both producing actions are durative: an
/// instantaneous effect is a single instant, not an interval, so two instantaneous steps never
/// "coincide" in the sense this flaw models.
fn detect_mutex_threats<O: Orderings>(
    plan: &Plan<O>,
    new_step: StepId,
    new_schema: &ActionSchema,
    sub: &impl Fn(VariableId) -> Term,
    domain: &Domain,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Plan<O> {
    let mut next = plan.clone();
    if !new_schema.is_durative() {
        return next;
    }
    for step in plan.steps.iter() {
        if step.id == new_step {
            continue;
        }
        let other_schema = domain.actions.schema(step.action);
        if !other_schema.is_durative() {
            continue;
        }
        let (ss, se, es, ee) = plan.orderings.possibly_concurrent(new_step.as_u32(), step.id.as_u32());
        if !(ss || se || es || ee) {
            continue;
        }
        let other_sub = step_substitution(other_schema, &step.parameters);
        for new_effect in &new_schema.effects {
            let instantiated_new = new_effect.substitute(sub);
            let Some(new_lit) = instantiated_new.literal() else { continue };
            for other_effect in &other_schema.effects {
                let instantiated_other = other_effect.substitute(&other_sub);
                let Some(other_lit) = instantiated_other.literal() else { continue };
                if !Bindings::affects(&new_lit, &other_lit, objects, vars, types) {
                    continue;
                }
                let condition1 = match instantiated_new.firing_condition() {
                    Formula::True => None,
                    cond => Some(cond),
                };
                let condition2 = match instantiated_other.firing_condition() {
                    Formula::True => None,
                    cond => Some(cond),
                };
                next = next.push_flaw(Flaw::Mutex(MutexThreat {
                    step1: new_step,
                    effect1: new_lit.clone(),
                    condition1,
                    step2: step.id,
                    effect2: other_lit.clone(),
                    condition2,
                }));
            }
        }
    }
    next
}

/// Can `candidate` occur at or between the two endpoints of a causal link, i.e. is it not
/// already ordered strictly before the producer or strictly after the consumer?
fn interposable<O: Orderings>(plan: &Plan<O>, candidate: StepId, from: StepId, to: StepId) -> bool {
    let after_producer = plan.orderings.possibly_before(from.as_u32(), StepTime::AT_START, candidate.as_u32(), StepTime::AT_START)
        || plan.orderings.possibly_concurrent(from.as_u32(), candidate.as_u32()).0;
    let before_consumer = plan.orderings.possibly_before(candidate.as_u32(), StepTime::AT_START, to.as_u32(), StepTime::AT_START)
        || plan.orderings.possibly_concurrent(candidate.as_u32(), to.as_u32()).0;
    after_producer && before_consumer
}

/// The three threat-refinement families for an `Unsafe` flaw: promotion, demotion and
/// separation (the latter via `separate_via_effect`, which needs the threatening effect's
/// instantiated atom that `UnsafeLink` now carries).
pub fn threat_refinements<O: Orderings>(plan: &Plan<O>, flaw_id: u32, flaw: &UnsafeLink) -> Vec<Plan<O>> {
    let base = plan.without_flaw(flaw_id);
    let mut children = Vec::new();

    // Promotion: order the threatening step's end after the link's consumer start.
    if let Some(orderings) = base.orderings.add_order(
        flaw.link.to.as_u32(),
        StepTime::AT_START,
        flaw.threatening_step.as_u32(),
        StepTime::AFTER_START,
    ) {
        let mut child = base.clone();
        child.orderings = orderings;
        children.push(child);
    }

    // Demotion: order the threatening step's end before the link's producer start.
    if let Some(orderings) = base.orderings.add_order(
        flaw.threatening_step.as_u32(),
        StepTime::BEFORE_END,
        flaw.link.from.as_u32(),
        StepTime::AT_START,
    ) {
        let mut child = base.clone();
        child.orderings = orderings;
        children.push(child);
    }

    children.extend(separate_via_effect(&base, flaw));
    children
}

/// Separation via binding inequality: forces the threatening effect's atom apart from the
/// link's condition atom on at least one argument. Produces one child per argument position
/// the two atoms could still be forced apart on (spec's "one refinement per disjunct" of the
/// separating inequality, enumerated eagerly rather than left as a disjunction).
fn separate_via_effect<O: Orderings>(plan: &Plan<O>, flaw: &UnsafeLink) -> Vec<Plan<O>> {
    flaw.threatening_atom
        .args
        .iter()
        .zip(flaw.link.condition.atom.args.iter())
        .filter(|(a, b)| a != b && (a.is_variable() || b.is_variable()))
        .filter_map(|(a, b)| {
            let mut child = plan.clone();
            child.bindings = child.bindings.add_inequality(*a, *b)?;
            Some(child)
        })
        .collect()
}

/// The four refinement families for a `Mutex` flaw: order the two steps apart entirely
/// (promotion, demotion), force their conflicting effects' atoms apart on some argument
/// (separation by inequality), or forbid whichever effect is conditional from firing at all
/// (separation by negation).
pub fn mutex_refinements<O: Orderings>(
    plan: &Plan<O>,
    flaw_id: u32,
    flaw: &MutexThreat,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Vec<Plan<O>> {
    let base = plan.without_flaw(flaw_id);
    let mut children = Vec::new();

    // Promotion: step1 entirely before step2.
    if let Some(orderings) = base.orderings.add_order(flaw.step1.as_u32(), StepTime::BEFORE_END, flaw.step2.as_u32(), StepTime::AT_START) {
        let mut child = base.clone();
        child.orderings = orderings;
        children.push(child);
    }

    // Demotion: step2 entirely before step1.
    if let Some(orderings) = base.orderings.add_order(flaw.step2.as_u32(), StepTime::BEFORE_END, flaw.step1.as_u32(), StepTime::AT_START) {
        let mut child = base.clone();
        child.orderings = orderings;
        children.push(child);
    }

    children.extend(separate_mutex_by_inequality(&base, flaw));
    children.extend(separate_mutex_by_negation(&base, flaw, objects, vars, types));
    children
}

/// Separation via binding inequality: forces the two conflicting effects' atoms apart on at
/// least one argument, the same way `separate_via_effect` does for an `Unsafe` flaw.
fn separate_mutex_by_inequality<O: Orderings>(plan: &Plan<O>, flaw: &MutexThreat) -> Vec<Plan<O>> {
    flaw.effect1
        .atom
        .args
        .iter()
        .zip(flaw.effect2.atom.args.iter())
        .filter(|(a, b)| a != b && (a.is_variable() || b.is_variable()))
        .filter_map(|(a, b)| {
            let mut child = plan.clone();
            child.bindings = child.bindings.add_inequality(*a, *b)?;
            Some(child)
        })
        .collect()
}

/// Separation via negation: whichever effect fires conditionally can be made to never fire by
/// requiring the negation of its condition. An unconditional effect (`condition` is `None`) has
/// no such refinement — it always fires and can only be separated by ordering or inequality.
fn separate_mutex_by_negation<O: Orderings>(
    plan: &Plan<O>,
    flaw: &MutexThreat,
    objects: &ObjectTable,
    vars: &VariableTable,
    types: &TypeTable,
) -> Vec<Plan<O>> {
    let mut children = Vec::new();
    if let Some(condition) = &flaw.condition1 {
        if let Some(child) = add_goal(plan, flaw.step1, &condition.negate(), ConditionTiming::AtStart, objects, vars, types) {
            children.push(child);
        }
    }
    if let Some(condition) = &flaw.condition2 {
        if let Some(child) = add_goal(plan, flaw.step2, &condition.negate(), ConditionTiming::AtStart, objects, vars, types) {
            children.push(child);
        }
    }
    children
}

#[allow(unused)]
fn _assert_formula_time(_: FormulaTime) {}
