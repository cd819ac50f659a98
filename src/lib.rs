//! crane-tip - critical braking velocity of mobile cranes
//!
//! Models the crane as a rigid body rotating about its front support edge
//! while an emergency brake decelerates it, and finds the highest travel
//! speed that does not tip it over. Monte Carlo runs propagate uncertainty in
//! the braking duration to per-radius quantiles of that speed.

pub mod config;
pub mod dynamics;
pub mod integrator;
pub mod monte_carlo;
pub mod output;
pub mod params;
pub mod solver;
pub mod state;
pub mod stats;
pub mod sweep;

use thiserror::Error;

// Re-export main types
pub use config::StudyConfig;
pub use dynamics::{Braking, BrakingMode, BrakingProfile, RotationalDynamics, TippingDynamics};
pub use integrator::{
    simulate, tip_outcome, IntegratorOverrides, IntegratorSettings, Simulation, TipEvent,
    TipOutcome,
};
pub use monte_carlo::{run_monte_carlo, MonteCarloBatch, MonteCarloConfig, MonteCarloSample};
pub use params::{CraneConfiguration, CraneTable};
pub use solver::{critical_velocity, CriticalVelocity, CriticalVelocitySearch};
pub use state::{SimulationState, TrajectoryPoint};
pub use stats::QuantileSummary;
pub use sweep::{critical_velocity_table, probe_speeds, CriticalVelocityRow, ProbeVerdict};

#[derive(Debug, Error)]
pub enum CraneError {
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("configuration index {index} out of range for table of {len}")]
    UnknownConfiguration { index: usize, len: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CraneError {
    pub(crate) fn invalid(name: &'static str, value: f64) -> Self {
        CraneError::InvalidParameter { name, value }
    }
}
