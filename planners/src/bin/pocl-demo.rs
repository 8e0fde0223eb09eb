//! Runs one of the six built-in end-to-end scenarios through the full `Configuration -> plan ->
//! Plan` pipeline and prints the resulting plan. Scenarios are built directly as `Domain`/
//! `Problem` values (this workspace carries no PDDL front end) so each one doubles as a small,
//! literal worked example of the model API.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Parser;
use smallvec::smallvec;

use pocl_model::{
    ActionKind, ActionSchema, ActionTable, Atom, Duration, DurationConstraint, Effect, EffectTarget, EffectTiming, Expression, Formula,
    FormulaTime, Literal, ObjectTable, PredicateTable, Problem, Requirements, TimedCondition, Term, TypeTable, VariableTable,
};
use pocl_planners::{Configuration, PlanningError, SearchLimit};
use pocl_tnet::{BinaryOrderings, TemporalOrderings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Trivial,
    Reuse,
    ThreatPromotion,
    Separation,
    Durative,
    ClosedWorld,
}

impl FromStr for Scenario {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "trivial" => Ok(Scenario::Trivial),
            "reuse" => Ok(Scenario::Reuse),
            "threat-promotion" => Ok(Scenario::ThreatPromotion),
            "separation" => Ok(Scenario::Separation),
            "durative" => Ok(Scenario::Durative),
            "closed-world" => Ok(Scenario::ClosedWorld),
            other => Err(format!(
                "unknown scenario {other:?}; expected one of trivial, reuse, threat-promotion, separation, durative, closed-world"
            )),
        }
    }
}

/// Runs a built-in POCL planning scenario end to end and prints the resulting plan.
#[derive(Debug, Parser)]
#[command(name = "pocl-demo", rename_all = "kebab-case")]
struct Args {
    /// One of: trivial, reuse, threat-promotion, separation, durative, closed-world.
    scenario: Scenario,
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

struct Built {
    problem: Problem,
}

fn trivial() -> Built {
    let mut types = TypeTable::new();
    let top = types.top();
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
        effects: vec![Effect::unconditional(
            EffectTarget::Predicate { atom: p_atom.clone(), positive: true },
            EffectTiming::AtStart,
        )],
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
    let _ = top;
    Built { problem }
}

fn reuse() -> Built {
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
        effects: vec![Effect::unconditional(
            EffectTarget::Predicate { atom: p_of_x, positive: true },
            EffectTiming::AtStart,
        )],
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
    Built { problem }
}

fn threat_promotion() -> Built {
    let mut types = TypeTable::new();
    let top = types.top();
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
            formula: Formula::Literal(Literal::positive(p_atom.clone())),
            when: FormulaTime::AtStart,
        }],
        effects: vec![Effect::unconditional(
            EffectTarget::Predicate { atom: q_atom.clone(), positive: true },
            EffectTiming::AtStart,
        )],
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
    let _ = top;
    Built { problem }
}

fn separation() -> Built {
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
                Formula::Inequality(Term::Variable(x), Term::Variable(y), pocl_model::StepId::GOAL, pocl_model::StepId::GOAL),
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
    Built { problem }
}

fn durative() -> Built {
    let mut types = TypeTable::new();
    let top = types.top();
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
        effects: vec![Effect::unconditional(
            EffectTarget::Predicate { atom: q_atom.clone(), positive: true },
            EffectTiming::AtEnd,
        )],
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
    let _ = top;
    Built { problem }
}

fn closed_world() -> Built {
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
    Built { problem }
}

fn format_plan<O: pocl_tnet::Orderings>(plan: &pocl_planning::Plan<O>, problem: &Problem) -> String {
    if plan.steps.iter().count() == 0 {
        return format!("(empty plan, makespan {:.2})", plan.orderings.makespan());
    }
    let mut out = String::new();
    for (i, step) in plan.steps.iter().enumerate() {
        let schema = problem.domain.actions.schema(step.action);
        out.push_str(&format!("{i}: ({}", schema.name));
        for &param in &step.parameters {
            let bound = plan.bindings.binding(param);
            match bound {
                Term::Object(o) => out.push_str(&format!(" {}", problem.objects.name(o))),
                Term::Variable(_) => out.push_str(" ?"),
            }
        }
        out.push_str(")\n");
    }
    out.push_str(&format!("makespan: {:.2}\n", plan.orderings.makespan()));
    out
}

fn run_classical(problem: &Problem, config: &Configuration) -> Result<String, PlanningError> {
    let plan = pocl_planners::plan::<BinaryOrderings>(problem, config)?;
    Ok(format_plan(&plan, problem))
}

fn run_temporal(problem: &Problem, config: &Configuration) -> Result<String, PlanningError> {
    let plan = pocl_planners::plan::<TemporalOrderings>(problem, config)?;
    Ok(format_plan(&plan, problem))
}

fn main() {
    let args = Args::parse();
    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(std::time::Instant::now()))
        .with_max_level(args.log_level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let config = Configuration::builder()
        .heuristic("UCPOP", SearchLimit::Unlimited)
        .unwrap_or_else(|_| Configuration::builder())
        .time_limit(StdDuration::from_secs(5))
        .build()
        .unwrap_or_default();

    let result = match args.scenario {
        Scenario::Trivial => run_classical(&trivial().problem, &config),
        Scenario::Reuse => run_classical(&reuse().problem, &config),
        Scenario::ThreatPromotion => run_classical(&threat_promotion().problem, &config),
        Scenario::Separation => run_classical(&separation().problem, &config),
        Scenario::Durative => run_temporal(&durative().problem, &config),
        Scenario::ClosedWorld => run_classical(&closed_world().problem, &config),
    };

    match result {
        Ok(text) => print!("{text}"),
        Err(err) => {
            eprintln!("planning failed: {err}");
            std::process::exit(1);
        }
    }
}
