//! Attributes of the road, the ego vehicle and its behaviour planner.

use crate::ConfigError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The narrowest visible window, in cells, that still leaves room to respawn traffic.
pub const MIN_VISIBLE_WIDTH: usize = 8;

/// The attributes of a simulated road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RoadAttributes {
    /// The speed limit, in cells per unit time.
    pub speed_limit: f64,
    /// The cruising speed of traffic in each lane, from the leftmost lane.
    pub lane_speeds: Vec<f64>,
    /// The probability that a cell is populated with a background vehicle.
    pub traffic_density: f64,
    /// The length of road around the ego vehicle, in cells, which is kept populated.
    pub visible_width: usize,
    /// The duration of a simulation tick.
    pub dt: f64,
    /// The seed of the traffic generator.
    pub seed: u64,
    /// The parameters of the ego vehicle's behaviour planner.
    pub planner: PlannerParams,
}

/// The parameters of the behaviour planner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PlannerParams {
    /// The number of timesteps predicted and planned, including the present.
    pub horizon: usize,
    /// The gap the ego vehicle tries to keep to the vehicle ahead.
    pub preferred_buffer: f64,
    /// Gaps at or below this distance count as collisions.
    pub collision_buffer: f64,
    /// How far ahead vehicles are considered when estimating a lane's speed.
    pub lookahead: f64,
    /// The weights of the cost terms.
    pub weights: CostWeights,
}

/// The weights applied to each normalised cost term.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CostWeights {
    /// Weight of the distance from the goal lane.
    pub goal: f64,
    /// Weight of driving below the speed limit.
    pub inefficiency: f64,
    /// Weight of closeness to other vehicles.
    pub buffer: f64,
}

/// The attributes of the ego vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EgoAttributes {
    /// The lane the ego vehicle must finish in.
    pub goal_lane: usize,
    /// The longitudinal position the ego vehicle is driving toward.
    pub goal_pos: f64,
    /// The maximum magnitude of acceleration.
    pub max_acc: f64,
}

impl Default for RoadAttributes {
    fn default() -> Self {
        Self {
            speed_limit: 10.0,
            lane_speeds: vec![6.0, 7.0, 8.0, 9.0],
            traffic_density: 0.15,
            visible_width: 70,
            dt: 1.0,
            seed: 0,
            planner: PlannerParams::default(),
        }
    }
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            horizon: 10,
            preferred_buffer: 6.0,
            collision_buffer: 2.0,
            lookahead: 20.0,
            weights: CostWeights::default(),
        }
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            goal: 1.0e5,
            inefficiency: 1.0e2,
            buffer: 1.0e4,
        }
    }
}

impl Default for EgoAttributes {
    fn default() -> Self {
        Self {
            goal_lane: 3,
            goal_pos: 300.0,
            max_acc: 2.0,
        }
    }
}

impl RoadAttributes {
    /// The number of lanes on the road.
    pub fn num_lanes(&self) -> usize {
        self.lane_speeds.len()
    }

    /// The speed a vehicle may cruise at in the given lane.
    pub fn lane_speed(&self, lane: usize) -> f64 {
        self.lane_speeds
            .get(lane)
            .map_or(self.speed_limit, |speed| speed.min(self.speed_limit))
    }

    /// Checks that the road and planner can be simulated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed_limit > 0.0 && self.speed_limit.is_finite()) {
            return Err(ConfigError::NonPositiveSpeedLimit(self.speed_limit));
        }
        if self.lane_speeds.is_empty() {
            return Err(ConfigError::NoLanes);
        }
        for (lane, &speed) in self.lane_speeds.iter().enumerate() {
            if !(0.0..=self.speed_limit).contains(&speed) {
                return Err(ConfigError::InvalidLaneSpeed { lane, speed });
            }
        }
        if !(0.0..=1.0).contains(&self.traffic_density) {
            return Err(ConfigError::InvalidDensity(self.traffic_density));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(ConfigError::NonPositiveTimestep(self.dt));
        }
        if self.visible_width < MIN_VISIBLE_WIDTH {
            return Err(ConfigError::VisibleWidthTooSmall {
                width: self.visible_width,
                min: MIN_VISIBLE_WIDTH,
            });
        }
        self.planner.validate()
    }
}

impl PlannerParams {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon < 2 {
            return Err(ConfigError::HorizonTooShort(self.horizon));
        }
        if !(self.collision_buffer > 0.0 && self.preferred_buffer >= self.collision_buffer)
            || !self.preferred_buffer.is_finite()
        {
            return Err(ConfigError::InvalidBuffer {
                preferred: self.preferred_buffer,
                collision: self.collision_buffer,
            });
        }
        if !(self.lookahead > 0.0) {
            return Err(ConfigError::NonPositiveLookahead(self.lookahead));
        }
        self.weights.validate()
    }
}

impl CostWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("goal", self.goal),
            ("inefficiency", self.inefficiency),
            ("buffer", self.buffer),
        ];
        match weights
            .into_iter()
            .find(|(_, value)| !(value.is_finite() && *value >= 0.0))
        {
            Some((name, value)) => Err(ConfigError::InvalidWeight { name, value }),
            None => Ok(()),
        }
    }
}

impl EgoAttributes {
    /// Checks that the ego vehicle's goal and limits make sense on the given road.
    pub fn validate(&self, road: &RoadAttributes) -> Result<(), ConfigError> {
        if self.goal_lane >= road.num_lanes() {
            return Err(ConfigError::GoalLaneOutOfRange {
                goal_lane: self.goal_lane,
                num_lanes: road.num_lanes(),
            });
        }
        if !self.goal_pos.is_finite() {
            return Err(ConfigError::InvalidGoalPosition(self.goal_pos));
        }
        if !(self.max_acc > 0.0 && self.max_acc.is_finite()) {
            return Err(ConfigError::NonPositiveAcceleration(self.max_acc));
        }
        Ok(())
    }
}
