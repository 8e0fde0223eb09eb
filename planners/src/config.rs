//! Search configuration: the algorithm, the ordered flaw-selection queues, and the knobs that
//! control grounding and heuristic accounting. Everything here must be settled before a
//! `Configuration` is handed to the search driver — there is no mutation once search starts.

use std::time::Duration;

use pocl_planning::heuristic::ActionCostMode;
use pocl_planning::{Criterion, CriterionFlags, FlawKind, FlawOrder, RankHeuristic, TieBreak};

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAlgorithm {
    AStar,
    IdaStar,
    HillClimbing,
}

impl std::str::FromStr for SearchAlgorithm {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a*" | "astar" => Ok(SearchAlgorithm::AStar),
            "ida*" | "idastar" => Ok(SearchAlgorithm::IdaStar),
            "hill-climbing" | "hillclimbing" | "hc" => Ok(SearchAlgorithm::HillClimbing),
            other => Err(ConfigError::UnknownSearchAlgorithm(other.to_string())),
        }
    }
}

/// How many plans a flaw order's queue may pop before the driver switches to the next queue
/// (round-robin) or, for the last queue configured, gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Count(u32),
    Unlimited,
}

impl std::str::FromStr for SearchLimit {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(SearchLimit::Unlimited);
        }
        s.parse::<u32>()
            .map(SearchLimit::Count)
            .map_err(|_| ConfigError::FlawOrderGrammar(s.to_string(), "expected a count or \"unlimited\"".to_string()))
    }
}

pub fn parse_action_cost_mode(s: &str) -> Result<ActionCostMode, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "unit" => Ok(ActionCostMode::Unit),
        "duration" => Ok(ActionCostMode::Duration),
        "relative" => Ok(ActionCostMode::Relative),
        other => Err(ConfigError::UnknownActionCostMode(other.to_string())),
    }
}

/// One token of a flaw-order grammar string's `<order>` position: a canned flaw-kind filter
/// plus tie-break, named after the heuristic presets VHPOP shipped as command-line shorthands.
/// `{flag}` prefixes (`s`, `n`, `r`) and a `[max-refs]` suffix further restrict whichever of
/// these a grammar expression names; see `parse_flaw_order`.
fn named_criteria(token: &str) -> Result<Vec<Criterion>, ConfigError> {
    let lower = token.to_ascii_lowercase();
    let crit = |kinds: Vec<FlawKind>, tie: TieBreak| Criterion::new(kinds, tie);
    let with_rank = |kinds: Vec<FlawKind>, tie: TieBreak, rank: RankHeuristic, reuse: bool| Criterion {
        kinds,
        max_refinements: None,
        tie_break: tie,
        rank_heuristic: rank,
        flags: CriterionFlags {
            reuse_heuristic: reuse,
            ..CriterionFlags::default()
        },
    };
    Ok(match lower.as_str() {
        "lifo" => vec![crit(vec![FlawKind::Open, FlawKind::UnsafeOpen], TieBreak::Lifo)],
        "fifo" => vec![crit(vec![FlawKind::Open, FlawKind::UnsafeOpen], TieBreak::Fifo)],
        "oc" => vec![crit(vec![FlawKind::Open], TieBreak::Fifo)],
        "uc" => vec![crit(vec![FlawKind::UnsafeOpen], TieBreak::Lifo)],
        "buc" => vec![crit(vec![FlawKind::NonSeparableThreat], TieBreak::Lifo)],
        "s+oc" => vec![crit(vec![FlawKind::StaticOpen], TieBreak::Fifo), crit(vec![FlawKind::Open], TieBreak::Fifo)],
        "ucpop" => vec![crit(vec![FlawKind::UnsafeOpen], TieBreak::Lifo), crit(vec![FlawKind::Open], TieBreak::Lifo)],
        "add" | "add_cost" => vec![with_rank(vec![FlawKind::Open], TieBreak::LeastHeuristic, RankHeuristic::AdditiveCost, false)],
        "add_work" => vec![with_rank(vec![FlawKind::Open], TieBreak::LeastHeuristic, RankHeuristic::Work, false)],
        "addr" | "addr_cost" => vec![with_rank(vec![FlawKind::Open], TieBreak::LeastHeuristic, RankHeuristic::AdditiveCost, true)],
        "addr_work" => vec![with_rank(vec![FlawKind::Open], TieBreak::LeastHeuristic, RankHeuristic::Work, true)],
        "makespan" => vec![with_rank(vec![FlawKind::Open], TieBreak::LeastHeuristic, RankHeuristic::Makespan, false)],
        other => return Err(ConfigError::UnknownHeuristic(other.to_string())),
    })
}

/// Parses one `/`-separated flaw-order expression: `{flag...}[max-refs]<order>` repeated,
/// `/`-joined criteria, where `<order>` is one of the named tokens `named_criteria` recognizes.
/// `{s}`/`{n}` restrict a threat criterion to separable/non-separable threats only; `{r}` turns
/// on the reuse-heuristic variant of a heuristic criterion; `[N]` caps the criterion to flaws
/// with at most `N` refinements.
pub fn parse_flaw_order(expr: &str) -> Result<FlawOrder, ConfigError> {
    let mut criteria = Vec::new();
    for part in expr.split('/') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        let mut flags = CriterionFlags::default();
        while let Some(stripped) = rest.strip_prefix('{') {
            let Some(end) = stripped.find('}') else {
                return Err(ConfigError::FlawOrderGrammar(expr.to_string(), "unterminated '{' flag group".to_string()));
            };
            for ch in stripped[..end].chars() {
                match ch {
                    's' => flags.separable_only = true,
                    'n' => flags.non_separable_only = true,
                    'r' => flags.reuse_heuristic = true,
                    other => return Err(ConfigError::FlawOrderGrammar(expr.to_string(), format!("unknown flag '{other}'"))),
                }
            }
            rest = &stripped[end + 1..];
        }
        let mut max_refinements = None;
        if let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                return Err(ConfigError::FlawOrderGrammar(expr.to_string(), "unterminated '[' max-refinements group".to_string()));
            };
            let n: u32 = stripped[..end]
                .parse()
                .map_err(|_| ConfigError::FlawOrderGrammar(expr.to_string(), "max-refinements is not an integer".to_string()))?;
            max_refinements = Some(n);
            rest = &stripped[end + 1..];
        }
        if rest.is_empty() {
            return Err(ConfigError::FlawOrderGrammar(expr.to_string(), "missing <order> token".to_string()));
        }
        for mut c in named_criteria(rest)? {
            c.flags = flags;
            c.max_refinements = max_refinements;
            criteria.push(c);
        }
    }
    if criteria.is_empty() {
        return Err(ConfigError::FlawOrderGrammar(expr.to_string(), "expression produced no criteria".to_string()));
    }
    Ok(FlawOrder { criteria })
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub search_algorithm: SearchAlgorithm,
    pub action_cost: ActionCostMode,
    pub weight: f64,
    pub flaw_orders: Vec<FlawOrder>,
    pub search_limits: Vec<SearchLimit>,
    pub time_limit: Duration,
    pub random_open_conditions: bool,
    pub ground_actions: bool,
    pub domain_constraints: bool,
    pub keep_static_preconditions: bool,
    pub random_seed: u64,
    pub max_restarts: Option<u32>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            search_algorithm: SearchAlgorithm::AStar,
            action_cost: ActionCostMode::Unit,
            weight: 1.0,
            flaw_orders: vec![named_criteria("lifo").map(|criteria| FlawOrder { criteria }).unwrap()],
            search_limits: vec![SearchLimit::Unlimited],
            time_limit: Duration::from_secs(60),
            random_open_conditions: false,
            ground_actions: false,
            domain_constraints: false,
            keep_static_preconditions: true,
            random_seed: 0xC0FFEE,
            max_restarts: Some(16),
        }
    }
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.flaw_orders.is_empty() {
            return Err(ConfigError::EmptyFlawOrders);
        }
        if self.search_limits.len() != self.flaw_orders.len() {
            return Err(ConfigError::SearchLimitMismatch {
                flaw_orders: self.flaw_orders.len(),
                search_limits: self.search_limits.len(),
            });
        }
        if self.weight < 0.0 {
            return Err(ConfigError::NegativeWeight(self.weight));
        }
        Ok(())
    }
}

/// Builds a `Configuration` from named heuristics and/or literal flaw-order grammar strings,
/// validating the result once on `build`.
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        ConfigurationBuilder {
            config: Configuration {
                flaw_orders: Vec::new(),
                search_limits: Vec::new(),
                ..Configuration::default()
            },
        }
    }
}

impl ConfigurationBuilder {
    pub fn search_algorithm(mut self, algorithm: SearchAlgorithm) -> Self {
        self.config.search_algorithm = algorithm;
        self
    }

    pub fn action_cost(mut self, mode: ActionCostMode) -> Self {
        self.config.action_cost = mode;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.config.weight = weight;
        self
    }

    /// Appends a named heuristic (`LIFO`, `ADD`, `UCPOP`, ...) as its own queue with `limit`.
    pub fn heuristic(mut self, name: &str, limit: SearchLimit) -> Result<Self, ConfigError> {
        let criteria = named_criteria(name)?;
        self.config.flaw_orders.push(FlawOrder { criteria });
        self.config.search_limits.push(limit);
        Ok(self)
    }

    /// Appends a literal flaw-order grammar expression as its own queue with `limit`.
    pub fn flaw_order(mut self, expr: &str, limit: SearchLimit) -> Result<Self, ConfigError> {
        self.config.flaw_orders.push(parse_flaw_order(expr)?);
        self.config.search_limits.push(limit);
        Ok(self)
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.config.time_limit = limit;
        self
    }

    pub fn random_open_conditions(mut self, enabled: bool) -> Self {
        self.config.random_open_conditions = enabled;
        self
    }

    pub fn ground_actions(mut self, enabled: bool) -> Self {
        self.config.ground_actions = enabled;
        self
    }

    pub fn domain_constraints(mut self, enabled: bool) -> Self {
        self.config.domain_constraints = enabled;
        self
    }

    pub fn keep_static_preconditions(mut self, enabled: bool) -> Self {
        self.config.keep_static_preconditions = enabled;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    pub fn max_restarts(mut self, max: Option<u32>) -> Self {
        self.config.max_restarts = max;
        self
    }

    pub fn build(self) -> Result<Configuration, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_heuristic_builds_a_single_queue() {
        let config = Configuration::builder()
            .heuristic("UCPOP", SearchLimit::Unlimited)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.flaw_orders.len(), 1);
        assert_eq!(config.flaw_orders[0].criteria.len(), 2);
    }

    #[test]
    fn grammar_parses_flags_and_max_refinements() {
        let order = parse_flaw_order("{s}[3]uc").unwrap();
        assert_eq!(order.criteria.len(), 1);
        assert!(order.criteria[0].flags.separable_only);
        assert_eq!(order.criteria[0].max_refinements, Some(3));
    }

    #[test]
    fn mismatched_queue_lengths_are_rejected() {
        let config = Configuration {
            flaw_orders: vec![parse_flaw_order("lifo").unwrap(), parse_flaw_order("fifo").unwrap()],
            search_limits: vec![SearchLimit::Unlimited],
            ..Configuration::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SearchLimitMismatch { .. })));
    }

    #[test]
    fn unknown_order_token_is_rejected() {
        assert!(matches!(parse_flaw_order("bogus"), Err(ConfigError::UnknownHeuristic(_))));
    }
}
