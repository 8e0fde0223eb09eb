//! A point in time relative to a step: its start or end, with a tie-break relation used when
//! comparing two points that land at the same instant (e.g. one step's end simultaneous with
//! another's start — `at` orders them as equal, `before`/`after` break the tie explicitly).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Point {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Before,
    At,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepTime {
    pub point: Point,
    pub rel: Relation,
}

impl StepTime {
    pub const AT_START: StepTime = StepTime {
        point: Point::Start,
        rel: Relation::At,
    };
    pub const AFTER_START: StepTime = StepTime {
        point: Point::Start,
        rel: Relation::After,
    };
    pub const BEFORE_END: StepTime = StepTime {
        point: Point::End,
        rel: Relation::Before,
    };
    pub const AT_END: StepTime = StepTime {
        point: Point::End,
        rel: Relation::At,
    };
}

impl fmt::Display for StepTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self.point {
            Point::Start => "start",
            Point::End => "end",
        };
        let r = match self.rel {
            Relation::Before => "before",
            Relation::At => "at",
            Relation::After => "after",
        };
        write!(f, "{r} {p}")
    }
}

/// Step 0 (the synthetic initial step) is "before all"; `u32::MAX` (the synthetic goal step)
/// is "after all" — both are sentinel ids rather than ordinary plan steps.
pub const INIT_STEP: u32 = 0;
pub const GOAL_STEP: u32 = u32::MAX;

/// Encodes a (step, point) pair as the single integer used to index time-point matrices:
/// `start = 2*id - 1`, `end = 2*id`, so that ordinary steps occupy two consecutive positive
/// slots each. Step 0 has neither a start nor an end of its own; both map to node 0, the STN
/// reference origin (the "time zero" every other point is measured from).
pub fn time_node(id: u32, point: Point) -> u32 {
    if id == INIT_STEP {
        return 0;
    }
    match point {
        Point::Start => 2 * id - 1,
        Point::End => 2 * id,
    }
}
