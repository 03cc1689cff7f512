use crate::config::RoadAttributes;
use crate::prediction::{Occupancy, Predict, Prediction, Predictions};
use crate::util::offset_lane;
use crate::vehicle::{BehaviorState, Kinematics, Vehicle};
use log::debug;
use smallvec::{smallvec, SmallVec};

/// A candidate plan for the ego vehicle under one behaviour state.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    /// The behaviour state the plan realises.
    state: BehaviorState,
    /// The lane the plan is heading for.
    intended_lane: usize,
    /// The speed traffic allows in the intended lane.
    intended_speed: f64,
    /// One snapshot per timestep, starting with the present.
    snapshots: SmallVec<[Kinematics; 16]>,
    /// Whether a lane change into the intended lane could be made right now.
    change_clear: bool,
}

impl Trajectory {
    /// Creates a trajectory from at least two snapshots.
    pub(crate) fn new(
        state: BehaviorState,
        intended_lane: usize,
        intended_speed: f64,
        snapshots: SmallVec<[Kinematics; 16]>,
        change_clear: bool,
    ) -> Self {
        debug_assert!(snapshots.len() >= 2);
        Self {
            state,
            intended_lane,
            intended_speed,
            snapshots,
            change_clear,
        }
    }

    /// The behaviour state the trajectory realises.
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    /// The lane the trajectory is heading for.
    pub fn intended_lane(&self) -> usize {
        self.intended_lane
    }

    /// The speed traffic allows in the intended lane.
    pub fn intended_speed(&self) -> f64 {
        self.intended_speed
    }

    /// Whether the intended lane could be entered now without conflict.
    /// Always true unless the trajectory prepares a lane change.
    pub fn change_clear(&self) -> bool {
        self.change_clear
    }

    /// The snapshots in time order; the first is the present.
    pub fn snapshots(&self) -> &[Kinematics] {
        &self.snapshots
    }

    /// The snapshot one timestep from now.
    pub fn next(&self) -> &Kinematics {
        &self.snapshots[1]
    }

    /// The last planned snapshot.
    pub fn last(&self) -> &Kinematics {
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// The mean velocity over the future snapshots.
    pub fn mean_velocity(&self) -> f64 {
        let future = &self.snapshots[1..];
        future.iter().map(|kin| kin.vel).sum::<f64>() / future.len() as f64
    }
}

impl Predict for Trajectory {
    /// Samples the snapshots, continuing at constant velocity past the end of the plan.
    fn predict(&self, horizon: usize, dt: f64) -> Prediction {
        let last = *self.last();
        let beyond = std::iter::successors(Some(last.occupancy()), move |occ| {
            Some(Occupancy {
                lane: occ.lane,
                pos: occ.pos + last.vel * dt,
            })
        })
        .skip(1);
        let samples = self
            .snapshots
            .iter()
            .map(Kinematics::occupancy)
            .chain(beyond)
            .take(horizon);
        Prediction::new(samples, dt)
    }
}

/// Builds candidate trajectories for the ego vehicle.
pub struct TrajectoryGenerator<'a> {
    road: &'a RoadAttributes,
    ego: &'a Vehicle,
    predictions: &'a Predictions,
}

impl<'a> TrajectoryGenerator<'a> {
    /// Creates a generator for `ego` among vehicles predicted by `predictions`.
    /// The ego vehicle's own prediction, if present, is ignored.
    pub fn new(road: &'a RoadAttributes, ego: &'a Vehicle, predictions: &'a Predictions) -> Self {
        Self {
            road,
            ego,
            predictions,
        }
    }

    /// Generates a trajectory realising `state`,
    /// or `None` if the state cannot be realised without a conflict.
    pub fn generate(&self, state: BehaviorState) -> Option<Trajectory> {
        let kin = self.ego.kinematics();
        let target = offset_lane(kin.lane, state.lane_offset(), self.num_lanes())?;
        let first_lane = if state.is_lane_change() {
            target
        } else {
            kin.lane
        };
        let snapshots = self.roll_out(first_lane);

        // A lane change must stay clear of the target lane's traffic for the whole
        // horizon; other states only commit to their first step.
        let checked = if state.is_lane_change() {
            &snapshots[1..]
        } else {
            &snapshots[1..2]
        };
        if let Some(step) = self.first_conflict(checked) {
            debug!("{} is infeasible: conflict at step {}", state, step + 1);
            return None;
        }

        let change_clear = match state {
            BehaviorState::PrepareLaneChangeLeft | BehaviorState::PrepareLaneChangeRight => {
                self.change_is_clear(target)
            }
            _ => true,
        };
        Some(Trajectory::new(
            state,
            target,
            self.effective_lane_speed(target),
            snapshots,
            change_clear,
        ))
    }

    /// A conservative trajectory that keeps the lane and slows
    /// toward the slowest vehicle ahead.
    pub fn fallback(&self) -> Trajectory {
        let kin = *self.ego.kinematics();
        let slowest = self
            .vehicles_ahead(kin.lane, 0, kin.pos, self.road.planner.lookahead)
            .map(|p| p.velocity_at(0))
            .fold(kin.vel, f64::min);

        let mut model = self.ego.acceleration_model(self.road.dt);
        let mut snapshots: SmallVec<[Kinematics; 16]> = smallvec![kin];
        for _ in 1..self.horizon() {
            let cur = snapshots[snapshots.len() - 1];
            model.reset();
            model.apply_target_velocity(cur.vel, slowest);
            let acc = model.acc(cur.vel, self.speed_limit());
            snapshots.push(cur.advanced(cur.lane, acc, self.road.dt, self.speed_limit()));
        }
        Trajectory::new(BehaviorState::KeepLane, kin.lane, slowest, snapshots, true)
    }

    /// Whether moving into `lane` on the next step would keep clear of the
    /// vehicles ahead of and behind the ego vehicle in that lane for the whole horizon.
    fn change_is_clear(&self, lane: usize) -> bool {
        let snapshots = self.roll_out(lane);
        match self.first_conflict(&snapshots[1..]) {
            Some(step) => {
                debug!("lane {} is blocked at step {}", lane, step + 1);
                false
            }
            None => true,
        }
    }

    /// Plans `horizon` snapshots, moving into `first_lane` on the first step
    /// and following the traffic ahead from then on.
    fn roll_out(&self, first_lane: usize) -> SmallVec<[Kinematics; 16]> {
        let mut model = self.ego.acceleration_model(self.road.dt);
        let mut snapshots: SmallVec<[Kinematics; 16]> = smallvec![*self.ego.kinematics()];
        for step in 0..self.horizon() - 1 {
            let cur = snapshots[step];
            let lane = if step == 0 { first_lane } else { cur.lane };

            model.reset();
            model.apply_target_velocity(cur.vel, self.road.lane_speed(lane));
            if let Some(lead) = self.lead_vehicle(lane, step, cur.pos) {
                let gap = lead.pos_at(step) - cur.pos;
                model.follow_vehicle(
                    gap - self.road.planner.preferred_buffer,
                    cur.vel,
                    lead.velocity_at(step),
                );
            }
            let acc = model.acc(cur.vel, self.speed_limit());
            snapshots.push(cur.advanced(lane, acc, self.road.dt, self.speed_limit()));
        }
        snapshots
    }

    /// The index into `snapshots` of the first one within the collision buffer
    /// of another vehicle. `snapshots` must start one step into the future.
    fn first_conflict(&self, snapshots: &[Kinematics]) -> Option<usize> {
        let buffer = self.road.planner.collision_buffer;
        snapshots
            .iter()
            .enumerate()
            .find(|(i, kin)| {
                let ego = kin.occupancy();
                self.others()
                    .filter_map(|p| p.get(i + 1))
                    .any(|other| ego.conflicts_with(other, buffer))
            })
            .map(|(i, _)| i)
    }

    /// The nearest vehicle at or ahead of `pos` in `lane` at `step`.
    fn lead_vehicle(&self, lane: usize, step: usize, pos: f64) -> Option<&'a Prediction> {
        self.vehicles_ahead(lane, step, pos, f64::INFINITY)
            .min_by(|a, b| a.pos_at(step).total_cmp(&b.pos_at(step)))
    }

    /// The vehicles at or ahead of `pos` in `lane`, and within `range` of it, at `step`.
    fn vehicles_ahead(
        &self,
        lane: usize,
        step: usize,
        pos: f64,
        range: f64,
    ) -> impl Iterator<Item = &'a Prediction> + '_ {
        self.others().filter(move |p| {
            p.get(step).map_or(false, |occ| {
                occ.lane == lane && occ.pos >= pos && occ.pos - pos <= range
            })
        })
    }

    /// The speed the ego vehicle could expect to hold in `lane`, given the
    /// nearest vehicle ahead of it within the lookahead distance.
    fn effective_lane_speed(&self, lane: usize) -> f64 {
        let kin = self.ego.kinematics();
        let target = self.road.lane_speed(lane).min(self.speed_limit());
        self.vehicles_ahead(lane, 0, kin.pos, self.road.planner.lookahead)
            .min_by(|a, b| a.pos_at(0).total_cmp(&b.pos_at(0)))
            .map_or(target, |lead| target.min(lead.velocity_at(0)))
    }

    /// The predictions of every vehicle other than the ego vehicle.
    fn others(&self) -> impl Iterator<Item = &'a Prediction> + '_ {
        let ego_id = self.ego.id();
        self.predictions
            .iter()
            .filter(move |(id, _)| *id != ego_id)
            .map(|(_, p)| p)
    }

    fn horizon(&self) -> usize {
        self.road.planner.horizon
    }

    fn num_lanes(&self) -> usize {
        self.ego.attributes().num_lanes
    }

    fn speed_limit(&self) -> f64 {
        self.ego.attributes().speed_limit
    }
}
