//! Fixed-step RK4 integration with tip-over event detection
//!
//! Each step checks the lever arm of the center of gravity about the edge.
//! A sign change between two steps is localized by linear interpolation, so
//! the tip time carries sub-step precision without shrinking `dt`.

use serde::{Deserialize, Serialize};

use crate::dynamics::RotationalDynamics;
use crate::state::{SimulationState, TrajectoryPoint};
use crate::CraneError;

/// Guard added to the interpolation denominator
const CROSSING_EPS: f64 = 1e-15;

/// Angle reported at the interpolated crossing [deg]
const TIP_ANGLE_DEG: f64 = 90.0;

/// Step size, horizon and early-exit policy for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    /// Fixed integration step [s]
    pub dt: f64,
    /// Simulation horizon [s]
    pub t_sim: f64,
    /// Stop once the crane has swung back below `recovery_floor_deg`
    pub early_exit: bool,
    /// Physical angle under which a run counts as recovering [deg]
    pub recovery_floor_deg: f64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            t_sim: 15.0,
            early_exit: true,
            recovery_floor_deg: 80.0,
        }
    }
}

impl IntegratorSettings {
    pub fn new(dt: f64, t_sim: f64) -> Self {
        Self {
            dt,
            t_sim,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CraneError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(CraneError::invalid("dt", self.dt));
        }
        if !(self.t_sim.is_finite() && self.t_sim > 0.0) {
            return Err(CraneError::invalid("t_sim", self.t_sim));
        }
        if self.early_exit && !self.recovery_floor_deg.is_finite() {
            return Err(CraneError::invalid(
                "recovery_floor_deg",
                self.recovery_floor_deg,
            ));
        }
        Ok(())
    }
}

/// Partially specified settings, as read from a config table
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegratorOverrides {
    pub dt: Option<f64>,
    pub t_sim: Option<f64>,
    pub early_exit: Option<bool>,
    pub recovery_floor_deg: Option<f64>,
}

impl IntegratorOverrides {
    /// Fill unset fields from `base`
    pub fn over(self, base: IntegratorSettings) -> IntegratorSettings {
        IntegratorSettings {
            dt: self.dt.unwrap_or(base.dt),
            t_sim: self.t_sim.unwrap_or(base.t_sim),
            early_exit: self.early_exit.unwrap_or(base.early_exit),
            recovery_floor_deg: self.recovery_floor_deg.unwrap_or(base.recovery_floor_deg),
        }
    }
}

/// Interpolated state at the moment the lever arm reaches zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TipEvent {
    pub time: f64,
    pub phi: f64,
    pub dphi: f64,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TipOutcome {
    /// Lever arm reached zero
    Tipped(TipEvent),
    /// Horizon reached without tipping
    Stable,
    /// Swung back below the recovery floor; cut short at `time`
    Recovering { time: f64 },
}

impl TipOutcome {
    pub fn is_tipped(&self) -> bool {
        matches!(self, TipOutcome::Tipped(_))
    }

    pub fn tip_time(&self) -> Option<f64> {
        match self {
            TipOutcome::Tipped(event) => Some(event.time),
            _ => None,
        }
    }
}

/// Recorded trajectory plus its outcome
#[derive(Debug, Clone)]
pub struct Simulation {
    pub points: Vec<TrajectoryPoint>,
    pub outcome: TipOutcome,
}

impl Simulation {
    pub fn max_angle_deg(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.angle_deg)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn initial_angle_deg(&self) -> Option<f64> {
        self.points.first().map(|p| p.angle_deg)
    }

    pub fn final_angle_deg(&self) -> Option<f64> {
        self.points.last().map(|p| p.angle_deg)
    }
}

/// One classical Runge-Kutta step of size `dt`
pub fn rk4_step<F>(f: F, dt: f64, t: f64, y: [f64; 2]) -> [f64; 2]
where
    F: Fn(f64, [f64; 2]) -> [f64; 2],
{
    let scale = |k: [f64; 2]| [dt * k[0], dt * k[1]];
    let offset = |k: [f64; 2], w: f64| [y[0] + w * k[0], y[1] + w * k[1]];

    let k1 = scale(f(t, y));
    let k2 = scale(f(t + dt / 2.0, offset(k1, 0.5)));
    let k3 = scale(f(t + dt / 2.0, offset(k2, 0.5)));
    let k4 = scale(f(t + dt, offset(k3, 1.0)));

    [
        y[0] + (k1[0] + 2.0 * k2[0] + 2.0 * k3[0] + k4[0]) / 6.0,
        y[1] + (k1[1] + 2.0 * k2[1] + 2.0 * k3[1] + k4[1]) / 6.0,
    ]
}

/// Integrate and record every step
pub fn simulate<D: RotationalDynamics>(
    dynamics: &D,
    settings: &IntegratorSettings,
) -> Result<Simulation, CraneError> {
    settings.validate()?;
    let capacity = (settings.t_sim / settings.dt).ceil() as usize + 2;
    let mut points = Vec::with_capacity(capacity.min(1 << 20));
    let outcome = integrate(dynamics, settings, |p| points.push(p));
    Ok(Simulation { points, outcome })
}

/// Integrate without recording; used by the velocity searches
pub fn tip_outcome<D: RotationalDynamics>(
    dynamics: &D,
    settings: &IntegratorSettings,
) -> Result<TipOutcome, CraneError> {
    settings.validate()?;
    Ok(integrate(dynamics, settings, |_| {}))
}

fn integrate<D, S>(dynamics: &D, settings: &IntegratorSettings, mut sink: S) -> TipOutcome
where
    D: RotationalDynamics,
    S: FnMut(TrajectoryPoint),
{
    let dt = settings.dt;
    let mut state = SimulationState::at_rest(dynamics.initial_angle());

    while state.t <= settings.t_sim {
        let a_cur = dynamics.lever_arm(state.phi);
        let h_cur = dynamics.height(state.phi);
        let angle_deg = h_cur.atan2(a_cur).to_degrees();
        sink(TrajectoryPoint {
            t: state.t,
            angle_deg,
            phi: state.phi,
            dphi: state.dphi,
        });

        if a_cur <= 0.0 {
            return TipOutcome::Tipped(TipEvent {
                time: state.t,
                phi: state.phi,
                dphi: state.dphi,
            });
        }

        let [phi_next, dphi_next] =
            rk4_step(|t, y| dynamics.derivative(t, y), dt, state.t, state.y());
        let a_next = dynamics.lever_arm(phi_next);

        if a_next <= 0.0 {
            let alpha = a_cur / (a_cur - a_next + CROSSING_EPS);
            let event = TipEvent {
                time: state.t + alpha * dt,
                phi: state.phi + alpha * (phi_next - state.phi),
                dphi: state.dphi + alpha * (dphi_next - state.dphi),
            };
            sink(TrajectoryPoint {
                t: event.time,
                angle_deg: TIP_ANGLE_DEG,
                phi: event.phi,
                dphi: event.dphi,
            });
            return TipOutcome::Tipped(event);
        }

        if settings.early_exit && angle_deg < settings.recovery_floor_deg {
            return TipOutcome::Recovering { time: state.t };
        }

        state = SimulationState::new(state.t + dt, phi_next, dphi_next);
    }

    TipOutcome::Stable
}
