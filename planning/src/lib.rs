//! The core planner: a persistent partial-plan state (steps, causal links, bindings,
//! orderings, flaws), the bindings and orderings solvers' plan-level glue, grounding for the
//! relaxed planning-graph heuristic, the refinement families that turn one flaw into the
//! plans that resolve it, and the flaw-selection policy that decides which flaw to resolve
//! next. Generic over `pocl_tnet::Orderings` so the same code drives both classical and
//! durative search.

pub mod bindings;
pub mod flaw_selection;
pub mod ground;
pub mod heuristic;
pub mod plan;
pub mod refinement;

pub use bindings::{ActionDomain, Bindings, StepDomain};
pub use flaw_selection::{select, Criterion, CriterionFlags, FlawKind, FlawOrder, RankHeuristic, TieBreak};
pub use ground::{instantiate_actions, GroundAction, GroundActionId};
pub use heuristic::{ActionCostMode, HeuristicValue, PlanningGraph};
pub use plan::{ConditionTiming, Flaw, Link, MutexThreat, OpenCondition, Plan, Step, TaggedFlaw, UnsafeLink};
pub use refinement::{add_goal, mutex_refinements, open_condition_refinements, threat_refinements};
