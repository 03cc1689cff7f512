use crate::planner::CostBreakdown;
use crate::BehaviorState;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[allow(unused)]
pub fn debug_candidate(state: BehaviorState, cost: Option<&CostBreakdown>) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "candidate",
            "state": state,
            "feasible": cost.is_some(),
            "cost": cost,
        }))
    })
}

#[allow(unused)]
pub fn debug_collision(lane: usize, pos: f64, gap: f64) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "collision",
            "lane": lane,
            "pos": pos,
            "gap": gap,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
