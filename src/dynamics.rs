//! Rigid-body rotation about the front support edge under a braking pulse
//!
//! The crane is a point mass at its center of gravity rotating about the
//! tipping edge. Braking applies a constant horizontal inertial force at the
//! center of gravity until the kinetic energy of travel is dissipated; gravity
//! pulls the mass back towards the base.

use serde::{Deserialize, Serialize};

use crate::params::CraneConfiguration;
use crate::CraneError;

/// Angular equation of motion plus the geometry needed to detect tipping
pub trait RotationalDynamics {
    /// `[phi, dphi] -> [dphi, ddphi]` at time `t`
    fn derivative(&self, t: f64, y: [f64; 2]) -> [f64; 2];

    /// Horizontal lever arm of the center of gravity about the edge
    fn lever_arm(&self, phi: f64) -> f64;

    /// Height of the center of gravity above the edge
    fn height(&self, phi: f64) -> f64;

    /// Rotation angle at rest
    fn initial_angle(&self) -> f64;
}

/// Which braking parameter a sweep varies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrakingMode {
    Duration,
    Distance,
}

impl BrakingMode {
    pub fn braking(self, value: f64) -> Braking {
        match self {
            BrakingMode::Duration => Braking::Duration(value),
            BrakingMode::Distance => Braking::Distance(value),
        }
    }

    /// Column name used in result tables
    pub fn column(self) -> &'static str {
        match self {
            BrakingMode::Duration => "t_brake",
            BrakingMode::Distance => "s_brake",
        }
    }
}

/// Braking event, by stopping distance [m] or stopping time [s]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Braking {
    Distance(f64),
    Duration(f64),
}

impl Braking {
    pub fn mode(&self) -> BrakingMode {
        match self {
            Braking::Distance(_) => BrakingMode::Distance,
            Braking::Duration(_) => BrakingMode::Duration,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Braking::Distance(s) | Braking::Duration(s) => s,
        }
    }

    /// Stopping distance for an initial speed `v0`
    pub fn stopping_distance(&self, v0: f64) -> f64 {
        match *self {
            Braking::Distance(s) => s,
            Braking::Duration(t) => 0.5 * v0 * t,
        }
    }

    fn validate(&self) -> Result<(), CraneError> {
        let (name, value) = match *self {
            Braking::Distance(s) => ("s_brake", s),
            Braking::Duration(t) => ("t_brake", t),
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(CraneError::invalid(name, value));
        }
        Ok(())
    }
}

/// Braking event paired with the travel speed it starts from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrakingProfile {
    pub braking: Braking,
    /// Initial travel speed [m/s]
    pub v0: f64,
}

impl BrakingProfile {
    pub fn new(braking: Braking, v0: f64) -> Self {
        Self { braking, v0 }
    }
}

/// Constant-force deceleration pulse of fixed dissipated energy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrakePulse {
    /// Braking force while active [N]
    pub force: f64,
    /// Time until the crane stands still [s]
    pub duration: f64,
}

impl BrakePulse {
    pub fn new(mass: f64, profile: &BrakingProfile) -> Result<Self, CraneError> {
        profile.braking.validate()?;
        let v0 = profile.v0;
        if !(v0.is_finite() && v0 >= 0.0) {
            return Err(CraneError::invalid("v0", v0));
        }
        if !(mass.is_finite() && mass > 0.0) {
            return Err(CraneError::invalid("mass_total", mass));
        }
        if v0 == 0.0 {
            return Ok(Self {
                force: 0.0,
                duration: 0.0,
            });
        }

        let s_eff = profile.braking.stopping_distance(v0);
        let force = 0.5 * mass * v0 * v0 / s_eff;
        let deceleration = force / mass;
        Ok(Self {
            force,
            duration: v0 / deceleration,
        })
    }

    pub fn force_at(&self, t: f64) -> f64 {
        if t < self.duration {
            self.force
        } else {
            0.0
        }
    }
}

/// Equation of motion for one configuration and one braking profile
#[derive(Debug, Clone, Copy)]
pub struct TippingDynamics {
    a0: f64,
    h0: f64,
    r: f64,
    mass: f64,
    g: f64,
    inertia: f64,
    pulse: BrakePulse,
}

impl TippingDynamics {
    pub fn new(config: &CraneConfiguration, profile: &BrakingProfile) -> Result<Self, CraneError> {
        let inertia = config.inertia();
        if !(inertia.is_finite() && inertia > 0.0) {
            return Err(CraneError::invalid("IT", inertia));
        }
        let pulse = BrakePulse::new(config.mass_total(), profile)?;
        let a0 = config.edge_offset();
        let h0 = config.z_cog();

        Ok(Self {
            a0,
            h0,
            r: a0.hypot(h0),
            mass: config.mass_total(),
            g: config.g(),
            inertia,
            pulse,
        })
    }

    pub fn pulse(&self) -> &BrakePulse {
        &self.pulse
    }

    /// Angular acceleration at angle `phi` and time `t`
    pub fn angular_acceleration(&self, t: f64, phi: f64) -> f64 {
        let brake = self.pulse.force_at(t);
        phi.cos() * self.r * (brake * phi.tan() - self.mass * self.g) / self.inertia
    }
}

impl RotationalDynamics for TippingDynamics {
    fn derivative(&self, t: f64, y: [f64; 2]) -> [f64; 2] {
        let [phi, dphi] = y;
        [dphi, self.angular_acceleration(t, phi)]
    }

    fn lever_arm(&self, phi: f64) -> f64 {
        self.r * phi.cos()
    }

    fn height(&self, phi: f64) -> f64 {
        self.r * phi.sin()
    }

    fn initial_angle(&self) -> f64 {
        self.h0.atan2(self.a0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CraneTable;

    fn first_row() -> CraneConfiguration {
        *CraneTable::reference().get(0).unwrap()
    }

    #[test]
    fn duration_pulse_stops_at_requested_time() {
        let profile = BrakingProfile::new(Braking::Duration(1.5), 2.0);
        let pulse = BrakePulse::new(750_000.0, &profile).unwrap();
        assert!((pulse.duration - 1.5).abs() < 1e-12);
        // constant deceleration v0 / t_brake
        assert!((pulse.force - 750_000.0 * 2.0 / 1.5).abs() < 1e-6);
        assert_eq!(pulse.force_at(1.49), pulse.force);
        assert_eq!(pulse.force_at(1.5 + 1e-9), 0.0);
    }

    #[test]
    fn distance_pulse_dissipates_kinetic_energy() {
        let mass = 600_000.0;
        let v0 = 3.0;
        let profile = BrakingProfile::new(Braking::Distance(2.0), v0);
        let pulse = BrakePulse::new(mass, &profile).unwrap();
        let work = pulse.force * 2.0;
        assert!((work - 0.5 * mass * v0 * v0).abs() < 1e-6);
        assert!((pulse.duration - 2.0 * 2.0 / v0).abs() < 1e-12);
    }

    #[test]
    fn standing_crane_has_no_pulse() {
        let profile = BrakingProfile::new(Braking::Duration(1.0), 0.0);
        let pulse = BrakePulse::new(1.0, &profile).unwrap();
        assert_eq!(pulse.force, 0.0);
        assert_eq!(pulse.force_at(0.0), 0.0);
    }

    #[test]
    fn rejects_invalid_profiles() {
        let row = first_row();
        let cases = [
            (BrakingProfile::new(Braking::Duration(0.0), 1.0), "t_brake"),
            (BrakingProfile::new(Braking::Distance(-1.0), 1.0), "s_brake"),
            (BrakingProfile::new(Braking::Duration(1.0), -0.1), "v0"),
            (BrakingProfile::new(Braking::Distance(1.0), f64::NAN), "v0"),
        ];
        for (profile, expected) in cases {
            match TippingDynamics::new(&row, &profile) {
                Err(CraneError::InvalidParameter { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn gravity_restores_without_braking() {
        let row = first_row();
        let dynamics =
            TippingDynamics::new(&row, &BrakingProfile::new(Braking::Duration(1.0), 0.0)).unwrap();
        let phi0 = dynamics.initial_angle();
        let [dphi, ddphi] = dynamics.derivative(0.0, [phi0, 0.0]);
        assert_eq!(dphi, 0.0);
        assert!(ddphi < 0.0);
    }

    #[test]
    fn hard_braking_destabilizes() {
        let row = first_row();
        let profile = BrakingProfile::new(Braking::Duration(0.5), 5.0);
        let dynamics = TippingDynamics::new(&row, &profile).unwrap();
        let phi0 = dynamics.initial_angle();
        assert!(dynamics.angular_acceleration(0.0, phi0) > 0.0);
        assert!(dynamics.angular_acceleration(1.0, phi0) < 0.0);
    }

    #[test]
    fn geometry_matches_rest_position() {
        let row = first_row();
        let dynamics =
            TippingDynamics::new(&row, &BrakingProfile::new(Braking::Distance(1.0), 1.0)).unwrap();
        let phi0 = dynamics.initial_angle();
        assert!((dynamics.lever_arm(phi0) - row.edge_offset()).abs() < 1e-12);
        assert!((dynamics.height(phi0) - row.z_cog()).abs() < 1e-12);
        assert!(dynamics.lever_arm(std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
