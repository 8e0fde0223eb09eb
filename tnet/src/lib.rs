//! Two interchangeable orderings solvers sharing one contract: a boolean partial order
//! (`BinaryOrderings`, for classical planning) and a simple temporal network
//! (`TemporalOrderings`, for durative planning with real-valued start/end times).

pub mod binary;
pub mod step_time;
pub mod temporal;

pub use binary::BinaryOrderings;
pub use step_time::{time_node, Point, Relation, StepTime};
pub use temporal::TemporalOrderings;

/// The contract both orderings solvers satisfy, so that plan refinement can be written once
/// and instantiated over either the cheaper classical solver or the full temporal network.
pub trait Orderings: Clone {
    fn register_step(&self, id: u32) -> Self;
    fn possibly_before(&self, id1: u32, t1: StepTime, id2: u32, t2: StepTime) -> bool;
    fn possibly_concurrent(&self, id1: u32, id2: u32) -> (bool, bool, bool, bool);
    fn makespan(&self) -> f64;
    /// Asserts `(before_id, before_time) <= (after_id, after_time)`. Returns `None` if this
    /// would be inconsistent with the current order.
    fn add_order(&self, before_id: u32, before_time: StepTime, after_id: u32, after_time: StepTime) -> Option<Self>
    where
        Self: Sized;
    /// Asserts `id`'s duration bounds (`min_duration <= end - start <= max_duration`). The
    /// classical solver has no notion of duration and accepts any bounds as a no-op; the
    /// temporal solver tightens the underlying network and can fail if the bounds are
    /// inconsistent with orderings already recorded for `id`.
    fn constrain_duration(&self, id: u32, min_duration: f64, max_duration: f64) -> Option<Self>
    where
        Self: Sized;
}

impl Orderings for BinaryOrderings {
    fn register_step(&self, id: u32) -> Self {
        BinaryOrderings::register_step(self, id)
    }
    fn possibly_before(&self, id1: u32, t1: StepTime, id2: u32, t2: StepTime) -> bool {
        if id1 == id2 {
            return t1.rel != Relation::After || t2.rel != Relation::Before;
        }
        self.possibly_before(id1, id2)
    }
    fn possibly_concurrent(&self, id1: u32, id2: u32) -> (bool, bool, bool, bool) {
        let pc = BinaryOrderings::possibly_concurrent(self, id1, id2);
        (pc, pc, pc, pc)
    }
    fn makespan(&self) -> f64 {
        // A binary solver has no durations; makespan degenerates to the longest chain length.
        0.0
    }
    fn add_order(&self, before_id: u32, _before_time: StepTime, after_id: u32, _after_time: StepTime) -> Option<Self> {
        if before_id == after_id {
            return Some(self.clone());
        }
        BinaryOrderings::refine(self, before_id, after_id)
    }
    fn constrain_duration(&self, _id: u32, _min_duration: f64, _max_duration: f64) -> Option<Self> {
        Some(self.clone())
    }
}

impl Orderings for TemporalOrderings {
    fn register_step(&self, id: u32) -> Self {
        TemporalOrderings::register_step(self, id)
    }
    fn possibly_before(&self, id1: u32, t1: StepTime, id2: u32, t2: StepTime) -> bool {
        TemporalOrderings::possibly_before(self, id1, t1.point, id2, t2.point)
    }
    fn possibly_concurrent(&self, id1: u32, id2: u32) -> (bool, bool, bool, bool) {
        TemporalOrderings::possibly_concurrent(self, id1, id2)
    }
    fn makespan(&self) -> f64 {
        TemporalOrderings::makespan(self)
    }
    fn add_order(&self, before_id: u32, before_time: StepTime, after_id: u32, after_time: StepTime) -> Option<Self> {
        let before_node = time_node(before_id, before_time.point);
        let after_node = time_node(after_id, after_time.point);
        self.tighten(after_node, before_node, 0.0)
    }
    fn constrain_duration(&self, id: u32, min_duration: f64, max_duration: f64) -> Option<Self> {
        TemporalOrderings::with_duration(self, id, min_duration, max_duration)
    }
}
