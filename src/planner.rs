//! Behaviour planning for the ego vehicle.

pub use self::cost::{CostBreakdown, CostModel};
pub use self::trajectory::{Trajectory, TrajectoryGenerator};
use crate::config::RoadAttributes;
use crate::debug::debug_candidate;
use crate::prediction::Predictions;
use crate::vehicle::{BehaviorState, Vehicle};
use arrayvec::ArrayVec;
use log::{debug, trace, warn};

mod cost;
mod trajectory;

/// Chooses the ego vehicle's next behaviour state.
pub struct BehaviorPlanner<'a> {
    road: &'a RoadAttributes,
}

/// One successor state considered by the planner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// The successor state.
    pub state: BehaviorState,
    /// The cost of the state's trajectory, or `None` if it was infeasible.
    pub cost: Option<CostBreakdown>,
}

/// The outcome of one planning step.
#[derive(Clone, Debug)]
pub struct Decision {
    /// The chosen trajectory.
    trajectory: Trajectory,
    /// Every successor state that was considered, in transition table order.
    candidates: ArrayVec<Candidate, 3>,
    /// Whether no candidate was feasible and the conservative trajectory was used.
    fallback: bool,
}

impl Decision {
    /// The chosen trajectory.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// The chosen behaviour state.
    pub fn state(&self) -> BehaviorState {
        self.trajectory.state()
    }

    /// Every successor state that was considered.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Whether the decision is the conservative fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl<'a> BehaviorPlanner<'a> {
    /// Creates a planner for vehicles on the given road.
    pub fn new(road: &'a RoadAttributes) -> Self {
        Self { road }
    }

    /// Chooses the lowest cost feasible successor of the ego vehicle's state.
    ///
    /// Ties go to the state least committed to leaving the lane. If no successor is
    /// feasible, a conservative lane keeping trajectory is chosen instead.
    pub fn update_state(&self, ego: &Vehicle, predictions: &Predictions) -> Decision {
        let generator = TrajectoryGenerator::new(self.road, ego, predictions);
        let model = CostModel::new(self.road, ego, predictions);
        let successors = ego
            .state()
            .successors(ego.lane(), ego.attributes().num_lanes);

        let mut candidates = ArrayVec::new();
        let mut best: Option<(Trajectory, f64)> = None;
        for state in successors {
            let trajectory = generator.generate(state);
            let cost = trajectory.as_ref().map(|t| model.evaluate(t));
            debug_candidate(state, cost.as_ref());
            candidates.push(Candidate { state, cost });

            let (trajectory, cost) = match (trajectory, cost) {
                (Some(trajectory), Some(cost)) => (trajectory, cost),
                _ => continue,
            };
            trace!("{}: {:?}", state, cost);
            let better = best.as_ref().map_or(true, |(best, best_cost)| {
                cost.total
                    .total_cmp(best_cost)
                    .then(state.rank().cmp(&best.state().rank()))
                    .is_lt()
            });
            if better {
                best = Some((trajectory, cost.total));
            }
        }

        match best {
            Some((trajectory, cost)) => {
                debug!("{} -> {} (cost {:.3})", ego.state(), trajectory.state(), cost);
                Decision {
                    trajectory,
                    candidates,
                    fallback: false,
                }
            }
            None => {
                warn!(
                    "no feasible successor of {} in lane {} at {:.1}; falling back",
                    ego.state(),
                    ego.lane(),
                    ego.pos()
                );
                Decision {
                    trajectory: generator.fallback(),
                    candidates,
                    fallback: true,
                }
            }
        }
    }

    /// Commits the first step of the decision's trajectory to the ego vehicle.
    ///
    /// The lane and behaviour state change immediately; integrating the vehicle
    /// by one timestep then lands it exactly on the trajectory's next snapshot.
    pub fn realize_state(&self, ego: &mut Vehicle, decision: &Decision) {
        let next = decision.trajectory.next();
        ego.set_control(next.lane, next.acc, decision.state());
    }
}

#[cfg(test)]
mod test {
    use super::trajectory::test::{road, Scene};
    use super::*;
    use crate::vehicle::{BehaviorState::*, Goal};

    fn decide(scene: &Scene) -> Decision {
        let predictions = scene.predictions();
        BehaviorPlanner::new(&scene.road).update_state(scene.ego(), &predictions)
    }

    #[test]
    fn keeps_lane_when_in_goal_lane() {
        let scene = Scene::new(road(3), 1, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
        let decision = decide(&scene);
        assert_eq!(decision.state(), KeepLane);
        assert_eq!(decision.candidates().len(), 3);
        assert!(!decision.is_fallback());
    }

    #[test]
    fn prepares_toward_goal_lane() {
        let scene = Scene::new(road(3), 0, 0.0, 10.0, Goal { lane: 2, pos: 300.0 });
        let decision = decide(&scene);
        assert_eq!(decision.state(), PrepareLaneChangeRight);
        let states: Vec<_> = decision.candidates().iter().map(|c| c.state).collect();
        assert_eq!(states, vec![KeepLane, PrepareLaneChangeRight]);
    }

    #[test]
    fn ties_prefer_keep_lane() {
        let mut road = road(2);
        road.planner.weights.goal = 0.0;
        let scene = Scene::new(road, 0, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
        let decision = decide(&scene);
        let totals: Vec<f64> = decision
            .candidates()
            .iter()
            .filter_map(|c| c.cost.map(|cost| cost.total))
            .collect();
        assert_eq!(totals, vec![0.0, 0.0]);
        assert_eq!(decision.state(), KeepLane);
    }

    #[test]
    fn infeasible_candidates_are_excluded() {
        let mut scene = Scene::new(road(2), 0, 0.0, 10.0, Goal { lane: 1, pos: 300.0 });
        scene.ids[scene.ego].set_control(0, 0.0, PrepareLaneChangeRight);
        scene.add(1, 1.0, 10.0);
        let decision = decide(&scene);
        assert_eq!(decision.candidates()[2].state, LaneChangeRight);
        assert_eq!(decision.candidates()[2].cost, None);
        // Waiting beside the blocking vehicle earns nothing over keeping the lane.
        assert_eq!(decision.state(), KeepLane);
    }

    #[test]
    fn falls_back_when_boxed_in() {
        let mut scene = Scene::new(road(1), 0, 0.0, 10.0, Goal { lane: 0, pos: 300.0 });
        scene.add(0, 5.0, 4.0);
        let decision = decide(&scene);
        assert!(decision.is_fallback());
        assert_eq!(decision.state(), KeepLane);
        assert!(decision.candidates().iter().all(|c| c.cost.is_none()));
        assert_eq!(decision.trajectory().next().vel, 8.0);
    }

    #[test]
    fn realize_then_integrate_follows_trajectory() {
        let mut scene = Scene::new(road(3), 1, 0.0, 7.0, Goal { lane: 0, pos: 300.0 });
        scene.add(1, 30.0, 6.0);
        let road = scene.road.clone();
        let planner = BehaviorPlanner::new(&road);
        for _ in 0..6 {
            let predictions = scene.predictions();
            let decision = planner.update_state(scene.ego(), &predictions);
            let expected = *decision.trajectory().next();
            let ego = scene.ego;
            planner.realize_state(&mut scene.ids[ego], &decision);
            for vehicle in scene.ids.values_mut() {
                vehicle.integrate(road.dt);
            }
            assert_eq!(*scene.ego().kinematics(), expected);
            assert_eq!(scene.ego().state(), decision.state());
        }
        assert_eq!(scene.ego().lane(), 0);
    }
}
