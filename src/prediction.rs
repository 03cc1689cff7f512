//! Short-horizon forecasts of where vehicles will be.

use crate::VehicleId;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

/// The predictions of every vehicle on the road for one tick.
pub type Predictions = SecondaryMap<VehicleId, Prediction>;

/// A vehicle's occupancy of the road at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Occupancy {
    /// The lane index.
    pub lane: usize,
    /// The longitudinal position.
    pub pos: f64,
}

/// A forecast of a vehicle's occupancy, one sample per timestep starting with the present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prediction {
    samples: SmallVec<[Occupancy; 16]>,
    dt: f64,
}

/// Anything that can forecast its own occupancy of the road.
pub trait Predict {
    /// Predicts exactly `horizon` samples spaced `dt` apart, starting with the present.
    fn predict(&self, horizon: usize, dt: f64) -> Prediction;
}

impl Occupancy {
    /// The longitudinal distance to another occupancy in the same lane,
    /// or `None` if they are in different lanes.
    pub fn gap_to(&self, other: &Occupancy) -> Option<f64> {
        (self.lane == other.lane).then(|| (other.pos - self.pos).abs())
    }

    /// Whether another occupancy is in the same lane and within `buffer`.
    pub fn conflicts_with(&self, other: &Occupancy, buffer: f64) -> bool {
        self.gap_to(other).map_or(false, |gap| gap <= buffer)
    }
}

impl Prediction {
    /// Creates a prediction from samples spaced `dt` apart.
    pub fn new(samples: impl IntoIterator<Item = Occupancy>, dt: f64) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            dt,
        }
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the prediction has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The predicted occupancy `step` timesteps from now.
    pub fn get(&self, step: usize) -> Option<&Occupancy> {
        self.samples.get(step)
    }

    /// The samples in time order.
    pub fn samples(&self) -> &[Occupancy] {
        &self.samples
    }

    /// The predicted position at `step`, holding the last sample beyond the end.
    pub(crate) fn pos_at(&self, step: usize) -> f64 {
        self.get(step)
            .or_else(|| self.samples.last())
            .map_or(f64::NAN, |occ| occ.pos)
    }

    /// The velocity implied between `step` and the following sample.
    /// The final sample reuses the last interval; a single sample is stationary.
    pub fn velocity_at(&self, step: usize) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let i = usize::min(step, n - 2);
        (self.samples[i + 1].pos - self.samples[i].pos) / self.dt
    }
}
