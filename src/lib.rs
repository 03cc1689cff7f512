pub use config::{CostWeights, EgoAttributes, PlannerParams, RoadAttributes, MIN_VISIBLE_WIDTH};
pub use error::ConfigError;
pub use planner::{
    BehaviorPlanner, Candidate, CostBreakdown, CostModel, Decision, Trajectory,
    TrajectoryGenerator,
};
pub use prediction::{Occupancy, Predict, Prediction, Predictions};
pub use simulation::{Simulation, SimulationEvent};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::{offset_lane, Interval};
pub use vehicle::{BehaviorState, Goal, Kinematics, Successors, Vehicle, VehicleAttributes};

mod config;
mod debug;
mod error;
mod planner;
mod prediction;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
