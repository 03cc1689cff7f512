use crate::config::{EgoAttributes, RoadAttributes};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::debug::debug_collision;
use crate::planner::BehaviorPlanner;
use crate::prediction::{Predict, Predictions};
use crate::util::Interval;
use crate::vehicle::{BehaviorState, Goal, Kinematics, Vehicle, VehicleAttributes};
use crate::{ConfigError, VehicleId, VehicleSet};
use itertools::iproduct;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};

/// How many random cells are tried when respawning a culled vehicle.
const MAX_SPAWN_ATTEMPTS: usize = 64;

/// The depth, in cells, of the band inside the window edge where culled vehicles respawn.
const SPAWN_BAND: i64 = 15;

/// A simulation of traffic on a straight multi-lane road around one planned ego vehicle.
pub struct Simulation {
    /// The road and planner attributes.
    attributes: RoadAttributes,
    /// The vehicles being simulated, including the ego vehicle.
    vehicles: VehicleSet,
    /// The ego vehicle, once added.
    ego: Option<VehicleId>,
    /// The distribution deciding whether a cell is populated.
    traffic: Bernoulli,
    /// The traffic generator.
    rng: StdRng,
    /// The current frame of simulation.
    frame: usize,
    /// Everything noteworthy that has happened so far.
    events: Vec<SimulationEvent>,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

/// Something noteworthy that happened during a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationEvent {
    /// No successor state was feasible, so the ego vehicle fell back to braking in its lane.
    Fallback { frame: usize },
    /// The ego vehicle ended a frame within the collision buffer of another vehicle.
    Collision {
        frame: usize,
        vehicle: VehicleId,
        gap: f64,
    },
}

impl SimulationEvent {
    /// The frame in which the event happened.
    pub fn frame(&self) -> usize {
        match self {
            SimulationEvent::Fallback { frame } | SimulationEvent::Collision { frame, .. } => {
                *frame
            }
        }
    }
}

impl Simulation {
    /// Creates a new simulation of an empty road.
    pub fn new(attributes: RoadAttributes) -> Result<Self, ConfigError> {
        attributes.validate()?;
        let traffic = Bernoulli::new(attributes.traffic_density)
            .map_err(|_| ConfigError::InvalidDensity(attributes.traffic_density))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(attributes.seed),
            attributes,
            vehicles: VehicleSet::with_key(),
            ego: None,
            traffic,
            frame: 0,
            events: vec![],
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    /// Randomly populates the visible window with background traffic,
    /// each cell of each lane holding a vehicle with probability `traffic_density`.
    pub fn populate_traffic(&mut self) {
        let width = self.attributes.visible_width;
        let centre = self.ego().map_or(0.5 * width as f64, |ego| ego.pos());
        let start = f64::max(centre - 0.5 * width as f64, 0.0).floor() as i64;
        let cells = iproduct!(0..self.attributes.num_lanes(), start..start + width as i64);
        for (lane, cell) in cells {
            if self.traffic.sample(&mut self.rng) {
                let speed = self.attributes.lane_speed(lane);
                self.insert_background(lane, cell as f64, speed);
            }
        }
        debug!("populated road with {} vehicles", self.vehicles.len());
    }

    /// Adds a background vehicle, which cruises in its lane at constant speed.
    pub fn add_vehicle(&mut self, lane: usize, pos: f64, vel: f64) -> Result<VehicleId, ConfigError> {
        self.check_placement(lane, pos)?;
        if !(0.0..=self.attributes.speed_limit).contains(&vel) {
            return Err(ConfigError::InvalidVelocity {
                vel,
                speed_limit: self.attributes.speed_limit,
            });
        }
        Ok(self.insert_background(lane, pos, vel))
    }

    /// Adds the ego vehicle at the speed of its lane, removing any
    /// background vehicles within the collision buffer of it.
    pub fn add_ego(
        &mut self,
        lane: usize,
        pos: f64,
        attributes: &EgoAttributes,
    ) -> Result<VehicleId, ConfigError> {
        if self.ego.is_some() {
            return Err(ConfigError::EgoAlreadyPresent);
        }
        self.check_placement(lane, pos)?;
        attributes.validate(&self.attributes)?;

        let buffer = self.attributes.planner.collision_buffer;
        self.vehicles
            .retain(|_, v| v.lane() != lane || (v.pos() - pos).abs() > buffer);

        let attributes = VehicleAttributes {
            speed_limit: self.attributes.speed_limit,
            num_lanes: self.attributes.num_lanes(),
            max_acc: attributes.max_acc,
            goal: Some(Goal {
                lane: attributes.goal_lane,
                pos: attributes.goal_pos,
            }),
        };
        let kin = Kinematics {
            lane,
            pos,
            vel: self.attributes.lane_speed(lane),
            acc: 0.0,
        };
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, kin, BehaviorState::KeepLane));
        self.ego = Some(id);
        Ok(id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        self.vehicles.remove(id);
        if self.ego == Some(id) {
            self.ego = None;
        }
    }

    /// Advances the simulation by one timestep.
    ///
    /// Every vehicle is predicted from the same snapshot before anything moves,
    /// then the ego vehicle re-plans and every vehicle is integrated.
    pub fn advance(&mut self) {
        let horizon = self.attributes.planner.horizon;
        let dt = self.attributes.dt;
        let predictions: Predictions = self
            .vehicles
            .iter()
            .map(|(id, vehicle)| (id, vehicle.predict(horizon, dt)))
            .collect();

        if let Some(ego_id) = self.ego {
            let planner = BehaviorPlanner::new(&self.attributes);
            let decision = planner.update_state(&self.vehicles[ego_id], &predictions);
            if decision.is_fallback() {
                self.events.push(SimulationEvent::Fallback { frame: self.frame });
            }
            planner.realize_state(&mut self.vehicles[ego_id], &decision);
        }

        self.integrate(dt);
        self.detect_collisions();
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Removes background vehicles outside the visible window around the ego vehicle,
    /// replacing each with a new vehicle at a free cell inside the window.
    pub fn cull_and_respawn(&mut self) {
        let ego_id = match self.ego {
            Some(id) => id,
            None => return,
        };
        let half_width = 0.5 * self.attributes.visible_width as f64;
        let window = Interval::disc(self.vehicles[ego_id].pos(), half_width);
        let culled: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(id, v)| *id != ego_id && !window.contains(v.pos()))
            .map(|(id, _)| id)
            .collect();

        for id in culled {
            self.vehicles.remove(id);
            self.respawn(window);
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The road and planner attributes.
    pub fn attributes(&self) -> &RoadAttributes {
        &self.attributes
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// The ID of the ego vehicle.
    pub fn ego_id(&self) -> Option<VehicleId> {
        self.ego
    }

    /// The ego vehicle.
    pub fn ego(&self) -> Option<&Vehicle> {
        self.ego.and_then(|id| self.vehicles.get(id))
    }

    /// Whether the ego vehicle is in its goal lane at or past its goal position.
    pub fn ego_reached_goal(&self) -> bool {
        self.ego().map_or(false, Vehicle::reached_goal)
    }

    /// The fallbacks and collisions recorded so far.
    pub fn events(&self) -> &[SimulationEvent] {
        &self.events
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Integrates the velocities and positions of all vehicles.
    fn integrate(&mut self, dt: f64) {
        for (_, vehicle) in &mut self.vehicles {
            vehicle.integrate(dt);
        }
    }

    /// Records every vehicle sharing the ego vehicle's lane within the collision buffer.
    fn detect_collisions(&mut self) {
        let ego = match self.ego() {
            Some(ego) => ego.kinematics().occupancy(),
            None => return,
        };
        let buffer = self.attributes.planner.collision_buffer;
        let frame = self.frame;
        let collisions: Vec<SimulationEvent> = self
            .vehicles
            .iter()
            .filter(|(id, _)| Some(*id) != self.ego)
            .filter_map(|(id, v)| {
                let other = v.kinematics().occupancy();
                ego.conflicts_with(&other, buffer).then(|| {
                    let gap = (other.pos - ego.pos).abs();
                    warn!("frame {}: ego within {:.2} of vehicle in lane {}", frame, gap, ego.lane);
                    debug_collision(ego.lane, ego.pos, gap);
                    SimulationEvent::Collision {
                        frame,
                        vehicle: id,
                        gap,
                    }
                })
            })
            .collect();
        self.events.extend(collisions);
    }

    /// Places a replacement vehicle in a random free cell near the edge of the window.
    ///
    /// The left half of the lanes spawn ahead of the ego vehicle and the right half,
    /// being faster, behind it.
    fn respawn(&mut self, window: Interval<f64>) {
        let num_lanes = self.attributes.num_lanes();
        let radius = window.radius().floor() as i64;
        let (near, far) = (i64::max(radius - SPAWN_BAND, 1), radius - 1);
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            let lane = self.rng.gen_range(0..num_lanes);
            let mut offset = self.rng.gen_range(near..far) as f64;
            if lane > num_lanes / 2 {
                offset = -offset;
            }
            let pos = (window.midpoint() + offset).round();
            if self.is_free(lane, pos) {
                let speed = self.attributes.lane_speed(lane);
                let id = self.insert_background(lane, pos, speed);
                info!("adding vehicle {:?} at lane {} with s={}", id, lane, pos);
                return;
            }
        }
        debug!("no free cell to respawn a vehicle");
    }

    /// Whether no vehicle in `lane` is within the collision buffer of `pos`.
    fn is_free(&self, lane: usize, pos: f64) -> bool {
        let buffer = self.attributes.planner.collision_buffer;
        self.vehicles
            .values()
            .all(|v| v.lane() != lane || (v.pos() - pos).abs() > buffer)
    }

    /// Checks that a vehicle can be placed in `lane` at `pos`.
    fn check_placement(&self, lane: usize, pos: f64) -> Result<(), ConfigError> {
        let num_lanes = self.attributes.num_lanes();
        if lane >= num_lanes {
            return Err(ConfigError::LaneOutOfRange { lane, num_lanes });
        }
        if !pos.is_finite() {
            return Err(ConfigError::InvalidPosition(pos));
        }
        Ok(())
    }

    /// Adds an unplanned vehicle cruising at `vel`.
    fn insert_background(&mut self, lane: usize, pos: f64, vel: f64) -> VehicleId {
        let attributes = VehicleAttributes {
            speed_limit: self.attributes.speed_limit,
            num_lanes: self.attributes.num_lanes(),
            max_acc: 0.0,
            goal: None,
        };
        let kin = Kinematics {
            lane,
            pos,
            vel,
            acc: 0.0,
        };
        self.vehicles.insert_with_key(|id| {
            Vehicle::new(id, attributes, kin, BehaviorState::ConstantSpeed)
        })
    }
}
