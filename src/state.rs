//! Rotation state of the crane about its tipping edge
//!
//! - phi: rotation angle of the center of gravity about the edge [rad]
//! - dphi: angular rate [rad/s]

use serde::Serialize;

/// Integration state for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    /// Elapsed time [s]
    pub t: f64,
    /// Rotation angle [rad]
    pub phi: f64,
    /// Angular rate [rad/s]
    pub dphi: f64,
}

impl SimulationState {
    /// Create a new state
    pub fn new(t: f64, phi: f64, dphi: f64) -> Self {
        Self { t, phi, dphi }
    }

    /// State at rest at the given angle
    pub fn at_rest(phi: f64) -> Self {
        Self::new(0.0, phi, 0.0)
    }

    /// `[phi, dphi]` as fed to the equation of motion
    pub fn y(&self) -> [f64; 2] {
        [self.phi, self.dphi]
    }
}

/// One recorded sample of a trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub t: f64,
    /// Physical angle of the center of gravity seen from the edge [deg]
    pub angle_deg: f64,
    pub phi: f64,
    pub dphi: f64,
}
