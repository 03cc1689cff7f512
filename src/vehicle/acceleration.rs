/// The time constant with which a following vehicle closes a gap error, in timesteps.
const FOLLOW_TIME_CONSTANT: f64 = 2.0;

/// The longitudinal acceleration model of a planned vehicle.
///
/// Each constraint can only lower the acceleration, so the result
/// satisfies every constraint that has been applied since the last reset.
#[derive(Clone, Debug)]
pub struct AccelerationModel {
    max_acc: f64,
    dt: f64,
    acc: f64,
}

/// The parameters of the acceleration model.
pub struct ModelParams {
    /// The maximum magnitude of acceleration.
    pub max_acceleration: f64,
    /// The duration of one timestep.
    pub dt: f64,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &ModelParams) -> Self {
        AccelerationModel {
            max_acc: params.max_acceleration,
            dt: params.dt,
            acc: params.max_acceleration,
        }
    }

    /// Resets the acceleration model. Use before planning each step.
    pub fn reset(&mut self) {
        self.acc = self.max_acc;
    }

    /// Gets the planned acceleration, limited so that the velocity after one
    /// timestep stays within `[0, speed_limit]` and changes by at most `max_acc`.
    pub fn acc(&self, vel: f64, speed_limit: f64) -> f64 {
        let lower = f64::max(-self.max_acc, -vel / self.dt);
        let upper = f64::min(self.max_acc, (speed_limit - vel) / self.dt);
        self.acc.min(upper).max(lower)
    }

    /// Calculates the time it would take the vehicle to travel `dist`
    /// if it maximally accelerated up to `max_vel`.
    pub fn min_reach_time(&self, vel: f64, dist: f64, max_vel: f64) -> f64 {
        let discr = 2.0 * self.max_acc * dist + vel.powi(2);
        if discr < max_vel.powi(2) {
            (discr.sqrt() - vel) / self.max_acc
        } else {
            let t = f64::max(max_vel - vel, 0.0) / self.max_acc;
            let d = 0.5 * (vel + max_vel) * t;
            t + (dist - d) / max_vel
        }
    }

    /// Limits the acceleration so the vehicle does not exceed `target` after one timestep.
    ///
    /// # Arguments
    /// * `vel` - The velocity of the planned vehicle.
    /// * `target` - The velocity to drive toward.
    pub fn apply_target_velocity(&mut self, vel: f64, target: f64) {
        let this_acc = (target - vel) / self.dt;
        self.acc = f64::min(self.acc, this_acc);
    }

    /// Limits the acceleration so the vehicle settles behind the vehicle ahead.
    ///
    /// The velocity is capped at the lead's velocity plus a term that closes the
    /// gap error, which is also bounded by how fast the excess speed can be braked away.
    ///
    /// # Arguments
    /// * `gap_error` - The distance to the vehicle ahead minus the preferred buffer.
    /// * `my_vel` - The velocity of the planned vehicle.
    /// * `their_vel` - The velocity of the vehicle ahead.
    pub fn follow_vehicle(&mut self, gap_error: f64, my_vel: f64, their_vel: f64) {
        let closing = gap_error / (FOLLOW_TIME_CONSTANT * self.dt);
        let cap = if gap_error > 0.0 {
            their_vel + f64::min(closing, (2.0 * self.max_acc * gap_error).sqrt())
        } else {
            their_vel + closing
        };
        self.apply_target_velocity(my_vel, cap);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> AccelerationModel {
        AccelerationModel::new(&ModelParams {
            max_acceleration: 2.0,
            dt: 1.0,
        })
    }

    #[test]
    fn min_reach_time() {
        let acc = model();

        assert_approx_eq!(acc.min_reach_time(0.0, 25.0, 50.0), 5.0);
        assert_approx_eq!(acc.min_reach_time(0.0, 25.0, 10.0), 5.0);
        assert_approx_eq!(acc.min_reach_time(0.0, 25.0, 9.0), 5.027777777777);

        assert_approx_eq!(acc.min_reach_time(5.0, 50.0, 50.0), 5.0);
        assert_approx_eq!(acc.min_reach_time(5.0, 50.0, 15.0), 5.0);
        assert_approx_eq!(acc.min_reach_time(5.0, 50.0, 14.0), 5.01785714285);

        assert_approx_eq!(acc.min_reach_time(10.0, 100.0, 10.0), 10.0);
    }

    #[test]
    fn accelerates_toward_target() {
        let mut acc = model();
        acc.apply_target_velocity(4.0, 10.0);
        assert_approx_eq!(acc.acc(4.0, 10.0), 2.0);

        acc.reset();
        acc.apply_target_velocity(9.5, 10.0);
        assert_approx_eq!(acc.acc(9.5, 10.0), 0.5);

        acc.reset();
        acc.apply_target_velocity(8.0, 3.0);
        assert_approx_eq!(acc.acc(8.0, 10.0), -2.0);
    }

    #[test]
    fn never_reverses() {
        let mut acc = model();
        acc.apply_target_velocity(1.0, -5.0);
        assert_approx_eq!(acc.acc(1.0, 10.0), -1.0);
    }

    #[test]
    fn matches_lead_at_preferred_gap() {
        let mut acc = model();
        acc.follow_vehicle(0.0, 5.0, 5.0);
        assert_approx_eq!(acc.acc(5.0, 10.0), 0.0);

        acc.reset();
        acc.follow_vehicle(0.5, 10.0, 5.0);
        assert_approx_eq!(acc.acc(10.0, 10.0), -2.0);

        acc.reset();
        acc.follow_vehicle(100.0, 5.0, 5.0);
        assert_approx_eq!(acc.acc(5.0, 10.0), 2.0);
    }
}
