use thiserror::Error;

/// A rejected road, planner or vehicle configuration.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("speed limit must be positive, got {0}")]
    NonPositiveSpeedLimit(f64),
    #[error("the road must have at least one lane")]
    NoLanes,
    #[error("lane {lane} has speed {speed}, which is outside [0, speed limit]")]
    InvalidLaneSpeed { lane: usize, speed: f64 },
    #[error("traffic density must be within [0, 1], got {0}")]
    InvalidDensity(f64),
    #[error("timestep must be positive, got {0}")]
    NonPositiveTimestep(f64),
    #[error("planning horizon must be at least 2 steps, got {0}")]
    HorizonTooShort(usize),
    #[error("invalid buffers: preferred {preferred}, collision {collision}")]
    InvalidBuffer { preferred: f64, collision: f64 },
    #[error("lookahead must be positive, got {0}")]
    NonPositiveLookahead(f64),
    #[error("visible width must be at least {min} cells, got {width}")]
    VisibleWidthTooSmall { width: usize, min: usize },
    #[error("cost weight `{name}` must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("goal lane {goal_lane} is outside a road of {num_lanes} lanes")]
    GoalLaneOutOfRange { goal_lane: usize, num_lanes: usize },
    #[error("goal position must be finite, got {0}")]
    InvalidGoalPosition(f64),
    #[error("maximum acceleration must be positive, got {0}")]
    NonPositiveAcceleration(f64),
    #[error("lane {lane} is outside a road of {num_lanes} lanes")]
    LaneOutOfRange { lane: usize, num_lanes: usize },
    #[error("velocity {vel} is outside [0, {speed_limit}]")]
    InvalidVelocity { vel: f64, speed_limit: f64 },
    #[error("position must be finite, got {0}")]
    InvalidPosition(f64),
    #[error("the simulation already has an ego vehicle")]
    EgoAlreadyPresent,
}
