pub(crate) use self::acceleration::{AccelerationModel, ModelParams};
pub use self::state::{BehaviorState, Successors};
use crate::prediction::{Occupancy, Predict, Prediction};
use crate::VehicleId;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod acceleration;
mod state;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// The vehicle's fixed attributes.
    attributes: VehicleAttributes,
    /// The current lane, position, velocity and acceleration.
    kin: Kinematics,
    /// The current behaviour state.
    state: BehaviorState,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleAttributes {
    /// The maximum velocity of the vehicle.
    pub speed_limit: f64,
    /// The number of lanes on the road.
    pub num_lanes: usize,
    /// The maximum magnitude of acceleration; zero for unplanned traffic.
    pub max_acc: f64,
    /// Where the vehicle is heading, if it is planned.
    pub goal: Option<Goal>,
}

/// A target lane and position.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Goal {
    pub lane: usize,
    pub pos: f64,
}

/// A snapshot of a vehicle's motion.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Kinematics {
    /// The lane index, counting from the leftmost lane.
    pub lane: usize,
    /// The longitudinal position.
    pub pos: f64,
    /// The velocity.
    pub vel: f64,
    /// The acceleration held over the following timestep.
    pub acc: f64,
}

impl Kinematics {
    /// The snapshot one timestep later when moving into `lane` and holding `acc`.
    ///
    /// The velocity is clamped to `[0, speed_limit]` and the position
    /// integrated with the mean velocity over the step.
    pub fn advanced(&self, lane: usize, acc: f64, dt: f64, speed_limit: f64) -> Self {
        let vel = (self.vel + dt * acc).clamp(0.0, speed_limit);
        let pos = self.pos + 0.5 * (self.vel + vel) * dt;
        Self { lane, pos, vel, acc }
    }

    /// The road occupancy of the snapshot.
    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            lane: self.lane,
            pos: self.pos,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(
        id: VehicleId,
        attributes: VehicleAttributes,
        kin: Kinematics,
        state: BehaviorState,
    ) -> Self {
        Self {
            id,
            attributes,
            kin,
            state,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's fixed attributes.
    pub fn attributes(&self) -> &VehicleAttributes {
        &self.attributes
    }

    /// The vehicle's current motion.
    pub fn kinematics(&self) -> &Kinematics {
        &self.kin
    }

    /// The lane the vehicle is in.
    pub fn lane(&self) -> usize {
        self.kin.lane
    }

    /// The longitudinal position of the vehicle.
    pub fn pos(&self) -> f64 {
        self.kin.pos
    }

    /// The vehicle's velocity.
    pub fn vel(&self) -> f64 {
        self.kin.vel
    }

    /// The vehicle's acceleration.
    pub fn acc(&self) -> f64 {
        self.kin.acc
    }

    /// The vehicle's behaviour state.
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    /// The vehicle's goal, if it has one.
    pub fn goal(&self) -> Option<Goal> {
        self.attributes.goal
    }

    /// Whether the vehicle is in its goal lane at or beyond its goal position.
    pub fn reached_goal(&self) -> bool {
        self.attributes
            .goal
            .map_or(false, |goal| self.kin.lane == goal.lane && self.kin.pos >= goal.pos)
    }

    /// Creates an acceleration model for planning this vehicle's motion.
    pub(crate) fn acceleration_model(&self, dt: f64) -> AccelerationModel {
        AccelerationModel::new(&ModelParams {
            max_acceleration: self.attributes.max_acc,
            dt,
        })
    }

    /// Sets the lane, acceleration and behaviour state that the next integration will follow.
    pub(crate) fn set_control(&mut self, lane: usize, acc: f64, state: BehaviorState) {
        self.kin.lane = lane;
        self.kin.acc = acc;
        self.state = state;
    }

    /// Integrates the vehicle's velocity and position
    ///
    /// # Parameters
    /// * `dt` - The time step
    pub(crate) fn integrate(&mut self, dt: f64) {
        self.kin = self
            .kin
            .advanced(self.kin.lane, self.kin.acc, dt, self.attributes.speed_limit);
    }
}

impl Predict for Vehicle {
    fn predict(&self, horizon: usize, dt: f64) -> Prediction {
        let speed_limit = self.attributes.speed_limit;
        let samples = std::iter::successors(Some(self.kin), |kin| {
            Some(kin.advanced(kin.lane, kin.acc, dt, speed_limit))
        })
        .take(horizon)
        .map(|kin| kin.occupancy());
        Prediction::new(samples, dt)
    }
}
