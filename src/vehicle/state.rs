use arrayvec::ArrayVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The behaviour state of a vehicle.
///
/// Lane changes to the left move to a lower lane index,
/// lane changes to the right to a higher one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BehaviorState {
    /// Unplanned cruising, used by background traffic.
    ConstantSpeed,
    KeepLane,
    PrepareLaneChangeLeft,
    PrepareLaneChangeRight,
    LaneChangeLeft,
    LaneChangeRight,
}

/// The successors of a state; never more than three.
pub type Successors = ArrayVec<BehaviorState, 3>;

impl BehaviorState {
    /// The states reachable in one planning step from a vehicle in `lane`.
    /// States whose target lane is off the road are omitted.
    pub fn successors(self, lane: usize, num_lanes: usize) -> Successors {
        use BehaviorState::*;
        let left = lane > 0;
        let right = lane + 1 < num_lanes;
        let mut next = Successors::new();
        match self {
            ConstantSpeed => next.push(ConstantSpeed),
            KeepLane => {
                next.push(KeepLane);
                if left {
                    next.push(PrepareLaneChangeLeft);
                }
                if right {
                    next.push(PrepareLaneChangeRight);
                }
            }
            PrepareLaneChangeLeft => {
                next.push(KeepLane);
                next.push(PrepareLaneChangeLeft);
                if left {
                    next.push(LaneChangeLeft);
                }
            }
            PrepareLaneChangeRight => {
                next.push(KeepLane);
                next.push(PrepareLaneChangeRight);
                if right {
                    next.push(LaneChangeRight);
                }
            }
            LaneChangeLeft | LaneChangeRight => next.push(KeepLane),
        }
        next
    }

    /// Whether `next` is a legal successor of this state for a vehicle in `lane`.
    pub fn can_transition_to(self, next: BehaviorState, lane: usize, num_lanes: usize) -> bool {
        self.successors(lane, num_lanes).contains(&next)
    }

    /// The lane this state is moving toward, relative to the current one.
    pub fn lane_offset(self) -> isize {
        use BehaviorState::*;
        match self {
            ConstantSpeed | KeepLane => 0,
            PrepareLaneChangeLeft | LaneChangeLeft => -1,
            PrepareLaneChangeRight | LaneChangeRight => 1,
        }
    }

    /// Whether the vehicle moves into another lane in this state.
    pub fn is_lane_change(self) -> bool {
        matches!(
            self,
            BehaviorState::LaneChangeLeft | BehaviorState::LaneChangeRight
        )
    }

    /// How committed the state is to leaving the current lane.
    /// Used to break ties between equally costed states.
    pub(crate) fn rank(self) -> u8 {
        use BehaviorState::*;
        match self {
            ConstantSpeed | KeepLane => 0,
            PrepareLaneChangeLeft | PrepareLaneChangeRight => 1,
            LaneChangeLeft | LaneChangeRight => 2,
        }
    }

    /// A short tag for display.
    pub fn tag(self) -> &'static str {
        use BehaviorState::*;
        match self {
            ConstantSpeed => "CS",
            KeepLane => "KL",
            PrepareLaneChangeLeft => "PLCL",
            PrepareLaneChangeRight => "PLCR",
            LaneChangeLeft => "LCL",
            LaneChangeRight => "LCR",
        }
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod test {
    use super::BehaviorState::*;
    use super::*;

    #[test]
    fn keep_lane_successors() {
        assert_eq!(
            KeepLane.successors(1, 3).as_slice(),
            &[KeepLane, PrepareLaneChangeLeft, PrepareLaneChangeRight]
        );
        assert_eq!(
            KeepLane.successors(0, 3).as_slice(),
            &[KeepLane, PrepareLaneChangeRight]
        );
        assert_eq!(
            KeepLane.successors(2, 3).as_slice(),
            &[KeepLane, PrepareLaneChangeLeft]
        );
        assert_eq!(KeepLane.successors(0, 1).as_slice(), &[KeepLane]);
    }

    #[test]
    fn prepare_successors() {
        assert_eq!(
            PrepareLaneChangeLeft.successors(1, 2).as_slice(),
            &[KeepLane, PrepareLaneChangeLeft, LaneChangeLeft]
        );
        assert_eq!(
            PrepareLaneChangeRight.successors(0, 2).as_slice(),
            &[KeepLane, PrepareLaneChangeRight, LaneChangeRight]
        );
        assert!(!PrepareLaneChangeLeft.can_transition_to(LaneChangeRight, 1, 3));
    }

    #[test]
    fn lane_changes_are_atomic() {
        for state in [LaneChangeLeft, LaneChangeRight] {
            assert_eq!(state.successors(1, 3).as_slice(), &[KeepLane]);
        }
        assert!(!KeepLane.can_transition_to(LaneChangeLeft, 1, 3));
        assert!(!KeepLane.can_transition_to(LaneChangeRight, 1, 3));
    }

    #[test]
    fn constant_speed_is_terminal() {
        assert_eq!(ConstantSpeed.successors(1, 3).as_slice(), &[ConstantSpeed]);
    }

    #[test]
    fn tie_break_prefers_keep_lane() {
        assert!(KeepLane.rank() < PrepareLaneChangeLeft.rank());
        assert!(PrepareLaneChangeRight.rank() < LaneChangeRight.rank());
        assert_eq!(LaneChangeLeft.to_string(), "LCL");
    }
}
