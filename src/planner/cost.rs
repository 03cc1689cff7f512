use super::Trajectory;
use crate::config::RoadAttributes;
use crate::prediction::{Predict, Predictions};
use crate::vehicle::Vehicle;
#[cfg(feature = "serde")]
use serde::Serialize;

/// The cost of a trajectory, broken down by term.
///
/// Each term lies in `[0, 1]`; `total` is their weighted sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CostBreakdown {
    /// Distance from the goal lane relative to the time left to reach the goal.
    pub goal: f64,
    /// Shortfall of the trajectory's speed below the speed limit.
    pub inefficiency: f64,
    /// Closeness to other vehicles in the same lane.
    pub buffer: f64,
    /// The weighted sum of the terms.
    pub total: f64,
}

/// Ranks trajectories of the ego vehicle. Lower is better.
pub struct CostModel<'a> {
    road: &'a RoadAttributes,
    ego: &'a Vehicle,
    predictions: &'a Predictions,
}

impl<'a> CostModel<'a> {
    /// Creates a cost model for `ego` among vehicles predicted by `predictions`.
    pub fn new(road: &'a RoadAttributes, ego: &'a Vehicle, predictions: &'a Predictions) -> Self {
        Self {
            road,
            ego,
            predictions,
        }
    }

    /// Scores a trajectory.
    pub fn evaluate(&self, trajectory: &Trajectory) -> CostBreakdown {
        let weights = &self.road.planner.weights;
        let goal = self.goal_cost(trajectory);
        let inefficiency = self.inefficiency_cost(trajectory);
        let buffer = self.buffer_cost(trajectory);
        CostBreakdown {
            goal,
            inefficiency,
            buffer,
            total: weights.goal * goal
                + weights.inefficiency * inefficiency
                + weights.buffer * buffer,
        }
    }

    /// Penalises ending up, or heading, away from the goal lane.
    ///
    /// The penalty grows as the time left to reach the goal position shrinks,
    /// and is maximal once the goal position has been passed. Preparing a lane
    /// change only counts as heading for the intended lane while that lane is clear.
    pub fn goal_cost(&self, trajectory: &Trajectory) -> f64 {
        let goal = match self.ego.goal() {
            Some(goal) => goal,
            None => return 0.0,
        };
        let heading = if trajectory.change_clear() {
            trajectory.intended_lane()
        } else {
            trajectory.snapshots()[0].lane
        };
        let last = trajectory.last();
        let lanes = heading.abs_diff(goal.lane) + last.lane.abs_diff(goal.lane);
        if lanes == 0 {
            return 0.0;
        }

        let remaining = goal.pos - last.pos;
        if remaining <= 0.0 {
            return 1.0;
        }
        let speed_limit = self.ego.attributes().speed_limit;
        let time_left = self
            .ego
            .acceleration_model(self.road.dt)
            .min_reach_time(last.vel, remaining, speed_limit);
        1.0 - (-(lanes as f64) * self.road.dt / time_left).exp()
    }

    /// Penalises a trajectory, and the lane it is heading for, being slower than the speed limit.
    pub fn inefficiency_cost(&self, trajectory: &Trajectory) -> f64 {
        let speed_limit = self.ego.attributes().speed_limit;
        let shortfall = 2.0 * speed_limit - trajectory.mean_velocity() - trajectory.intended_speed();
        (shortfall / (2.0 * speed_limit)).clamp(0.0, 1.0)
    }

    /// Penalises coming close to another vehicle in the same lane at any future step.
    ///
    /// The penalty falls off smoothly with the gap, reaching 1 on contact.
    pub fn buffer_cost(&self, trajectory: &Trajectory) -> f64 {
        let ego_id = self.ego.id();
        let buffer = self.road.planner.collision_buffer;
        let plan = trajectory.predict(self.road.planner.horizon, self.road.dt);
        plan.samples()
            .iter()
            .enumerate()
            .skip(1)
            .flat_map(|(step, ego)| {
                self.predictions
                    .iter()
                    .filter(move |(id, _)| *id != ego_id)
                    .filter_map(move |(_, p)| p.get(step).and_then(|other| ego.gap_to(other)))
            })
            .map(|gap| (-(gap / buffer).powi(2)).exp())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::planner::trajectory::test::{road, Scene};
    use crate::planner::TrajectoryGenerator;
    use crate::vehicle::{BehaviorState::*, Goal};
    use assert_approx_eq::assert_approx_eq;

    fn costs_of(scene: &Scene, states: &[crate::BehaviorState]) -> Vec<CostBreakdown> {
        let predictions = scene.predictions();
        let gen = TrajectoryGenerator::new(&scene.road, scene.ego(), &predictions);
        let model = CostModel::new(&scene.road, scene.ego(), &predictions);
        states
            .iter()
            .map(|state| model.evaluate(&gen.generate(*state).unwrap()))
            .collect()
    }

    #[test]
    fn ideal_trajectory_is_free() {
        let scene = Scene::new(road(2), 1, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
        let cost = costs_of(&scene, &[KeepLane])[0];
        assert_eq!(cost, CostBreakdown::default());
    }

    #[test]
    fn goal_prefers_moving_toward_goal_lane() {
        let scene = Scene::new(road(3), 0, 0.0, 10.0, Goal { lane: 2, pos: 300.0 });
        let costs = costs_of(&scene, &[KeepLane, PrepareLaneChangeRight, LaneChangeRight]);
        assert!(costs[0].goal > costs[1].goal);
        assert!(costs[1].goal > costs[2].goal);
        assert!(costs[2].goal > 0.0);
    }

    #[test]
    fn goal_cost_grows_as_goal_nears() {
        let far = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 400.0 });
        let near = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 150.0 });
        let passed = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 50.0 });
        let far = costs_of(&far, &[KeepLane])[0].goal;
        let near = costs_of(&near, &[KeepLane])[0].goal;
        let passed = costs_of(&passed, &[KeepLane])[0].goal;
        assert!(far < near);
        assert!(near < passed);
        assert_eq!(passed, 1.0);
        // Two lanes off (intended and final), 310 cells at full speed.
        assert_approx_eq!(far, 1.0 - (-2.0f64 / 31.0).exp());
    }

    #[test]
    fn blocked_preparation_earns_no_goal_credit() {
        let clear = Scene::new(road(2), 0, 0.0, 8.0, Goal { lane: 1, pos: 300.0 });
        let clear = costs_of(&clear, &[KeepLane, PrepareLaneChangeRight]);
        assert!(clear[1].goal < clear[0].goal);

        let mut blocked = Scene::new(road(2), 0, 0.0, 8.0, Goal { lane: 1, pos: 300.0 });
        blocked.add(1, -3.0, 10.0);
        let blocked = costs_of(&blocked, &[KeepLane, PrepareLaneChangeRight]);
        assert_eq!(blocked[1].goal, blocked[0].goal);
        assert!(blocked[1].total > clear[1].total);
    }

    #[test]
    fn inefficiency_of_slow_lane() {
        let mut road = road(2);
        road.lane_speeds = vec![10.0, 5.0];
        let scene = Scene::new(road, 0, 0.0, 10.0, Goal { lane: 0, pos: 300.0 });
        let costs = costs_of(&scene, &[KeepLane, PrepareLaneChangeRight]);
        assert_eq!(costs[0].inefficiency, 0.0);
        assert_approx_eq!(costs[1].inefficiency, 0.25);
    }

    #[test]
    fn buffer_cost_is_continuous_in_gap() {
        let gaps = [2.0, 2.5, 4.0, 8.0];
        let costs: Vec<f64> = gaps
            .iter()
            .map(|gap| {
                let mut scene = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
                scene.add(1, -gap, 10.0);
                costs_of(&scene, &[PrepareLaneChangeRight])[0].buffer
            })
            .collect();
        assert!(costs.iter().all(|c| *c == 0.0));

        let costs: Vec<f64> = gaps[1..]
            .iter()
            .map(|gap| {
                let mut scene = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
                scene.add(1, -gap, 10.0);
                costs_of(&scene, &[LaneChangeRight])[0].buffer
            })
            .collect();
        assert_approx_eq!(costs[0], (-1.5625f64).exp());
        assert_approx_eq!(costs[1], (-4.0f64).exp());
        assert!(costs[2] < 1e-6);
    }

    #[test]
    fn weights_scale_terms() {
        let mut road = road(2);
        road.planner.weights.goal = 3.0;
        road.planner.weights.inefficiency = 0.0;
        let scene = Scene::new(road, 0, 0.0, 4.0, Goal { lane: 1, pos: 300.0 });
        let cost = costs_of(&scene, &[KeepLane])[0];
        assert!(cost.inefficiency > 0.0);
        assert_approx_eq!(cost.total, 3.0 * cost.goal);
    }
}
