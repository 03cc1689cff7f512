//! Hand-checked driving scenarios on an otherwise empty road.

use assert_approx_eq::assert_approx_eq;
use lane_planner::{
    BehaviorState::{self, *},
    EgoAttributes, RoadAttributes, Simulation, SimulationEvent,
};

fn road(lane_speeds: &[f64]) -> RoadAttributes {
    RoadAttributes {
        speed_limit: 10.0,
        lane_speeds: lane_speeds.to_vec(),
        traffic_density: 0.0,
        ..Default::default()
    }
}

fn ego(goal_lane: usize, goal_pos: f64) -> EgoAttributes {
    EgoAttributes {
        goal_lane,
        goal_pos,
        max_acc: 2.0,
    }
}

/// An empty single lane road is driven at the speed limit until the goal.
#[test]
fn cruises_to_goal() {
    let mut sim = Simulation::new(road(&[10.0])).unwrap();
    sim.add_ego(0, 0.0, &ego(0, 100.0)).unwrap();

    for _ in 0..9 {
        sim.advance();
        assert!(!sim.ego_reached_goal());
        assert_eq!(sim.ego().unwrap().state(), KeepLane);
    }
    sim.advance();
    assert!(sim.ego_reached_goal());
    assert_approx_eq!(sim.ego().unwrap().pos(), 100.0);
    assert!(sim.events().is_empty());
}

/// The ego vehicle works across the road one lane at a time,
/// preparing before each lane change.
#[test]
fn changes_lanes_toward_goal() {
    let mut sim = Simulation::new(road(&[10.0, 10.0, 10.0])).unwrap();
    sim.add_ego(0, 0.0, &ego(2, 300.0)).unwrap();

    let mut states: Vec<BehaviorState> = vec![];
    let mut lanes = vec![];
    for _ in 0..6 {
        sim.advance();
        let ego = sim.ego().unwrap();
        states.push(ego.state());
        lanes.push(ego.lane());
    }
    assert_eq!(
        states,
        vec![
            PrepareLaneChangeRight,
            LaneChangeRight,
            KeepLane,
            PrepareLaneChangeRight,
            LaneChangeRight,
            KeepLane
        ]
    );
    assert_eq!(lanes, vec![0, 1, 1, 1, 2, 2]);

    for _ in 0..5 {
        sim.advance();
        assert_eq!(sim.ego().unwrap().lane(), 2);
        assert_eq!(sim.ego().unwrap().state(), KeepLane);
    }
    assert!(sim.events().is_empty());
}

/// The ego vehicle settles behind a slower vehicle it cannot pass.
#[test]
fn follows_slower_vehicle() {
    let mut sim = Simulation::new(road(&[10.0])).unwrap();
    sim.add_ego(0, 0.0, &ego(0, 1000.0)).unwrap();
    let lead = sim.add_vehicle(0, 40.0, 5.0).unwrap();

    for _ in 0..40 {
        sim.advance();
        let gap = sim.get_vehicle(lead).unwrap().pos() - sim.ego().unwrap().pos();
        assert!(gap > sim.attributes().planner.collision_buffer, "gap {}", gap);
    }
    assert_approx_eq!(sim.ego().unwrap().vel(), 5.0, 1e-3);
    let gap = sim.get_vehicle(lead).unwrap().pos() - sim.ego().unwrap().pos();
    assert_approx_eq!(gap, sim.attributes().planner.preferred_buffer, 1e-2);
    assert!(sim.events().is_empty());
}

fn blocked_lane_change(offset: f64) -> Simulation {
    let mut sim = Simulation::new(road(&[5.0, 5.0])).unwrap();
    sim.add_ego(0, 0.0, &ego(1, 300.0)).unwrap();
    sim.add_vehicle(1, offset, 5.0).unwrap();
    sim
}

/// A vehicle alongside within the collision buffer rules out the lane change.
#[test]
fn waits_beside_blocking_vehicle() {
    let mut sim = blocked_lane_change(-2.0);
    for _ in 0..12 {
        sim.advance();
        let ego = sim.ego().unwrap();
        assert_eq!(ego.lane(), 0);
        assert!(!ego.state().is_lane_change());
    }
    assert!(sim.events().is_empty());
}

/// Just outside the collision buffer the lane change goes through.
#[test]
fn changes_lane_beside_clear_gap() {
    let mut sim = blocked_lane_change(-4.0);
    for _ in 0..2 {
        sim.advance();
    }
    let ego = sim.ego().unwrap();
    assert_eq!(ego.state(), LaneChangeRight);
    assert_eq!(ego.lane(), 1);
    assert!(!sim
        .events()
        .iter()
        .any(|e| matches!(e, SimulationEvent::Collision { .. })));
}
