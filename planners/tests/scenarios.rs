//! End-to-end scenarios from the spec's worked-example list (trivial achievement, reuse over
//! add, threat resolution by promotion, separation by inequality, durative scheduling, and
//! closed-world negation). Each test builds the `Domain`/`Problem` by hand (no PDDL front end
//! is in scope) and checks the shape of the plan the driver returns.

use std::sync::Arc;

use smallvec::smallvec;

use pocl_model::{
    ActionKind, ActionSchema, ActionTable, Atom, Duration, DurationConstraint, Effect, EffectTarget, EffectTiming, Expression, Formula,
    FormulaTime, Literal, ObjectTable, PredicateTable, Problem, Requirements, StepId, TimedCondition, Term, TypeTable, VariableTable,
};
use pocl_planners::{Configuration, SearchLimit};
use pocl_tnet::{BinaryOrderings, TemporalOrderings};

fn config() -> Configuration {
    Configuration::builder()
        .heuristic("UCPOP", SearchLimit::Unlimited)
        .unwrap()
        .time_limit(std::time::Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Scenario 1: predicate `p`, action `A` with no parameters and no precondition producing `p`,
/// goal `p`. Expected: a one-step plan `[A]`.
#[test]
fn trivial_achievement_yields_one_step_plan() {
    let mut types = TypeTable::new();
    let _top = types.top();
    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![]);
    let p_atom = Arc::new(Atom::new(p, smallvec![]));

    let mut actions = ActionTable::default();
    actions.declare(ActionSchema {
        name: "A".into(),
        parameters: vec![],
        parameter_types: vec![],
        kind: ActionKind::Instantaneous,
        conditions: vec![],
        effects: vec![Effect::unconditional(EffectTarget::Predicate { atom: p_atom.clone(), positive: true }, EffectTiming::AtStart)],
    });

    let domain = pocl_model::Domain {
        name: "trivial".into(),
        requirements: Requirements::default(),
        types,
        predicates: preds,
        functions: Default::default(),
        actions,
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "trivial".into(),
        domain: Arc::new(domain),
        objects: ObjectTable::default(),
        variables: VariableTable::default(),
        init_atoms: vec![],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::positive(p_atom))),
        metric: None,
    };

    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 1);
}

/// Scenario 2: predicate `p(x)`, object `a`, action `A(x)` with trivial precondition producing
/// `p(x)`. Init contains `p(a)`, goal `p(a)`. Expected: a zero-step plan, linked from the
/// initial step rather than instantiating a redundant `A(a)`.
#[test]
fn reuse_over_add_prefers_the_initial_step() {
    let mut types = TypeTable::new();
    let top = types.top();
    let mut objects = ObjectTable::default();
    let a = objects.declare("a", top);

    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![top]);

    let mut vars = VariableTable::default();
    let x = vars.fresh_named("x", top);
    let p_of_x = Arc::new(Atom::new(p, smallvec![Term::Variable(x)]));
    let p_of_a = Arc::new(Atom::new(p, smallvec![Term::Object(a)]));

    let mut actions = ActionTable::default();
    actions.declare(ActionSchema {
        name: "A".into(),
        parameters: vec![x],
        parameter_types: vec![top],
        kind: ActionKind::Instantaneous,
        conditions: vec![],
        effects: vec![Effect::unconditional(EffectTarget::Predicate { atom: p_of_x, positive: true }, EffectTiming::AtStart)],
    });

    let domain = pocl_model::Domain {
        name: "reuse".into(),
        requirements: Requirements::default(),
        types,
        predicates: preds,
        functions: Default::default(),
        actions,
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "reuse".into(),
        domain: Arc::new(domain),
        objects,
        variables: vars,
        init_atoms: vec![p_of_a.clone()],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::positive(p_of_a))),
        metric: None,
    };

    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 0, "the goal should be linked straight from the initial step");
}

/// Scenario 3: `A` produces `p` then `¬q`, `B` requires `p` and produces `q`, goal `q`.
/// Resolving the threat of `A`'s `¬q` on the causal link `B -q-> goal` forces `A` entirely
/// before `B` (either promotion of `B` past `A`, or demotion of `A` before `B`'s link): either
/// way the search finds a two-step, fully ordered plan.
#[test]
fn threat_is_resolved_by_ordering_the_two_steps() {
    let mut types = TypeTable::new();
    let _top = types.top();
    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![]);
    let q = preds.declare("q", vec![]);
    let p_atom = Arc::new(Atom::new(p, smallvec![]));
    let q_atom = Arc::new(Atom::new(q, smallvec![]));

    let mut actions = ActionTable::default();
    actions.declare(ActionSchema {
        name: "A".into(),
        parameters: vec![],
        parameter_types: vec![],
        kind: ActionKind::Instantaneous,
        conditions: vec![],
        effects: vec![
            Effect::unconditional(EffectTarget::Predicate { atom: p_atom.clone(), positive: true }, EffectTiming::AtStart),
            Effect::unconditional(EffectTarget::Predicate { atom: q_atom.clone(), positive: false }, EffectTiming::AtStart),
        ],
    });
    actions.declare(ActionSchema {
        name: "B".into(),
        parameters: vec![],
        parameter_types: vec![],
        kind: ActionKind::Instantaneous,
        conditions: vec![TimedCondition {
            formula: Formula::Literal(Literal::positive(p_atom)),
            when: FormulaTime::AtStart,
        }],
        effects: vec![Effect::unconditional(EffectTarget::Predicate { atom: q_atom.clone(), positive: true }, EffectTiming::AtStart)],
    });

    let domain = pocl_model::Domain {
        name: "threat-promotion".into(),
        requirements: Requirements::default(),
        types,
        predicates: preds,
        functions: Default::default(),
        actions,
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "threat-promotion".into(),
        domain: Arc::new(domain),
        objects: ObjectTable::default(),
        variables: VariableTable::default(),
        init_atoms: vec![],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::positive(q_atom))),
        metric: None,
    };

    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 2);
    let a_step = plan.steps.iter().find(|s| problem.domain.actions.schema(s.action).name.as_str() == "A").unwrap();
    let b_step = plan.steps.iter().find(|s| problem.domain.actions.schema(s.action).name.as_str() == "B").unwrap();
    assert!(
        plan.orderings.possibly_before(a_step.id.as_u32(), pocl_tnet::StepTime::AT_START, b_step.id.as_u32(), pocl_tnet::StepTime::AT_START),
        "A must be ordered entirely before B once the threat on q is resolved"
    );
}

/// Scenario 4: `p(x,y)`, action `A(x,y)` effect `p(x,y)` and, when `x != y`, `¬p(y,x)`. Init
/// `p(a,b)`, goal `p(a,b)`. The only way to achieve the goal without `A(a,b)` threatening its
/// own link (`A(a,b)`'s conditional `¬p(b,a)` does not unify with the goal link's `p(a,b)`
/// unless `x=a,y=b`, which it does) is to reuse the initial step's `p(a,b)` directly, so search
/// should settle on a zero-step plan.
#[test]
fn separation_prunes_the_self_threatening_add_step() {
    let mut types = TypeTable::new();
    let top = types.top();
    let mut objects = ObjectTable::default();
    let a = objects.declare("a", top);
    let b = objects.declare("b", top);

    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![top, top]);

    let mut vars = VariableTable::default();
    let x = vars.fresh_named("x", top);
    let y = vars.fresh_named("y", top);
    let p_xy = Arc::new(Atom::new(p, smallvec![Term::Variable(x), Term::Variable(y)]));
    let p_yx = Arc::new(Atom::new(p, smallvec![Term::Variable(y), Term::Variable(x)]));
    let p_ab = Arc::new(Atom::new(p, smallvec![Term::Object(a), Term::Object(b)]));

    let mut actions = ActionTable::default();
    actions.declare(ActionSchema {
        name: "A".into(),
        parameters: vec![x, y],
        parameter_types: vec![top, top],
        kind: ActionKind::Instantaneous,
        conditions: vec![],
        effects: vec![
            Effect::unconditional(EffectTarget::Predicate { atom: p_xy, positive: true }, EffectTiming::AtStart),
            Effect::conditional(
                Formula::Inequality(Term::Variable(x), Term::Variable(y), StepId::GOAL, StepId::GOAL),
                EffectTarget::Predicate { atom: p_yx, positive: false },
                EffectTiming::AtStart,
            ),
        ],
    });

    let domain = pocl_model::Domain {
        name: "separation".into(),
        requirements: Requirements::default(),
        types,
        predicates: preds,
        functions: Default::default(),
        actions,
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "separation".into(),
        domain: Arc::new(domain),
        objects,
        variables: vars,
        init_atoms: vec![p_ab.clone()],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::positive(p_ab))),
        metric: None,
    };

    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 0);
}

/// Scenario 5: durative action `A` with duration `[2,5]` (modeled here as an exact duration of
/// 3, within the interval), at-start condition `p`, at-end effect `q`. Init `p`, goal `q`.
/// Expected: a one-step plan whose end is ordered at least the duration after its start.
#[test]
fn durative_scheduling_orders_start_strictly_before_end() {
    let mut types = TypeTable::new();
    let _top = types.top();
    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![]);
    let q = preds.declare("q", vec![]);
    let p_atom = Arc::new(Atom::new(p, smallvec![]));
    let q_atom = Arc::new(Atom::new(q, smallvec![]));

    let mut actions = ActionTable::default();
    actions.declare(ActionSchema {
        name: "A".into(),
        parameters: vec![],
        parameter_types: vec![],
        kind: ActionKind::Durative {
            duration: Duration {
                constraint: DurationConstraint::Exact,
                value: Expression::constant(3),
            },
        },
        conditions: vec![TimedCondition {
            formula: Formula::Literal(Literal::positive(p_atom.clone())),
            when: FormulaTime::AtStart,
        }],
        effects: vec![Effect::unconditional(EffectTarget::Predicate { atom: q_atom.clone(), positive: true }, EffectTiming::AtEnd)],
    });

    let domain = pocl_model::Domain {
        name: "durative".into(),
        requirements: Requirements {
            durative_actions: true,
            ..Requirements::default()
        },
        types,
        predicates: preds,
        functions: Default::default(),
        actions,
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "durative".into(),
        domain: Arc::new(domain),
        objects: ObjectTable::default(),
        variables: VariableTable::default(),
        init_atoms: vec![p_atom],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::positive(q_atom))),
        metric: None,
    };

    let plan = pocl_planners::plan::<TemporalOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 1);
    let step = plan.steps.iter().next().unwrap();
    assert!(
        plan.orderings
            .possibly_before(step.id.as_u32(), pocl_tnet::StepTime::AT_START, step.id.as_u32(), pocl_tnet::StepTime::BEFORE_END),
        "the step's start must precede its own end"
    );
}

/// Scenario 6: predicate `p(x)`, objects `a`,`b`. Init `p(a)`. Goal `¬p(b)`. Under the
/// closed-world assumption `¬p(b)` is already established by the initial step (no action
/// asserts `p(b)`, and `a != b`), so the expected plan has zero steps.
#[test]
fn closed_world_negation_is_satisfied_by_the_initial_step() {
    let mut types = TypeTable::new();
    let top = types.top();
    let mut objects = ObjectTable::default();
    let a = objects.declare("a", top);
    let b = objects.declare("b", top);

    let mut preds = PredicateTable::default();
    let p = preds.declare("p", vec![top]);
    let p_a = Arc::new(Atom::new(p, smallvec![Term::Object(a)]));
    let p_b = Arc::new(Atom::new(p, smallvec![Term::Object(b)]));

    let domain = pocl_model::Domain {
        name: "closed-world".into(),
        requirements: Requirements {
            negative_preconditions: true,
            ..Requirements::default()
        },
        types,
        predicates: preds,
        functions: Default::default(),
        actions: ActionTable::default(),
        constants: ObjectTable::default(),
    };

    let problem = Problem {
        name: "closed-world".into(),
        domain: Arc::new(domain),
        objects,
        variables: VariableTable::default(),
        init_atoms: vec![p_a],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::Literal(Literal::negative(p_b))),
        metric: None,
    };

    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("problem is solvable");
    assert_eq!(plan.steps.iter().count(), 0);
}

/// The goal formula `FALSE` must fail immediately rather than search at all.
#[test]
fn false_goal_is_unsatisfiable() {
    let mut types = TypeTable::new();
    let _top = types.top();
    let domain = pocl_model::Domain {
        name: "d".into(),
        requirements: Requirements::default(),
        types,
        predicates: PredicateTable::default(),
        functions: Default::default(),
        actions: ActionTable::default(),
        constants: ObjectTable::default(),
    };
    let problem = Problem {
        name: "d".into(),
        domain: Arc::new(domain),
        objects: ObjectTable::default(),
        variables: VariableTable::default(),
        init_atoms: vec![],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::False),
        metric: None,
    };
    let err = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect_err("FALSE goal has no solution");
    assert!(matches!(err, pocl_planners::PlanningError::Unsatisfiable));
}

/// The goal formula `TRUE` is trivially satisfied by the initial (empty) plan.
#[test]
fn true_goal_yields_the_initial_plan() {
    let mut types = TypeTable::new();
    let _top = types.top();
    let domain = pocl_model::Domain {
        name: "d".into(),
        requirements: Requirements::default(),
        types,
        predicates: PredicateTable::default(),
        functions: Default::default(),
        actions: ActionTable::default(),
        constants: ObjectTable::default(),
    };
    let problem = Problem {
        name: "d".into(),
        domain: Arc::new(domain),
        objects: ObjectTable::default(),
        variables: VariableTable::default(),
        init_atoms: vec![],
        init_fluents: vec![],
        timed_initial_literals: vec![],
        goal: Some(Formula::True),
        metric: None,
    };
    let plan = pocl_planners::plan::<BinaryOrderings>(&problem, &config()).expect("TRUE goal is solvable");
    assert_eq!(plan.steps.iter().count(), 0);
}
