//! TOML study configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::dynamics::BrakingMode;
use crate::integrator::{IntegratorOverrides, IntegratorSettings};
use crate::monte_carlo::MonteCarloConfig;
use crate::solver::CriticalVelocitySearch;
use crate::CraneError;

/// Critical velocity sweep over the whole table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalStudy {
    pub braking: BrakingMode,
    /// Braking durations [s] or distances [m]
    pub values: Vec<f64>,
    #[serde(deserialize_with = "critical_integrator")]
    pub integrator: IntegratorSettings,
    pub search: CriticalVelocitySearch,
}

impl Default for CriticalStudy {
    fn default() -> Self {
        Self {
            braking: BrakingMode::Duration,
            values: vec![1.0, 1.5, 2.0],
            integrator: IntegratorSettings::new(1e-3, 5.0),
            search: CriticalVelocitySearch::default(),
        }
    }
}

/// Trajectories of one configuration at a few initial speeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeStudy {
    /// Row of the configuration table
    pub index: usize,
    /// Initial speeds [km/h]
    pub speeds_kmh: Vec<f64>,
    /// Braking distance [m]
    pub s_brake: f64,
    #[serde(deserialize_with = "probe_integrator")]
    pub integrator: IntegratorSettings,
}

impl Default for ProbeStudy {
    fn default() -> Self {
        Self {
            index: 0,
            speeds_kmh: vec![3.6, 5.4, 7.2, 9.0],
            s_brake: 2.0,
            integrator: IntegratorSettings::new(1e-3, 15.0),
        }
    }
}

impl ProbeStudy {
    pub fn speeds_ms(&self) -> Vec<f64> {
        self.speeds_kmh.iter().map(|v| v / 3.6).collect()
    }
}

// A partial `[<section>.integrator]` table only replaces the keys it sets;
// the rest keep that section's defaults.
fn critical_integrator<'de, D>(deserializer: D) -> Result<IntegratorSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = IntegratorOverrides::deserialize(deserializer)?;
    Ok(overrides.over(CriticalStudy::default().integrator))
}

fn probe_integrator<'de, D>(deserializer: D) -> Result<IntegratorSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = IntegratorOverrides::deserialize(deserializer)?;
    Ok(overrides.over(ProbeStudy::default().integrator))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Base directory for run outputs
    pub output_dir: PathBuf,
    pub critical: CriticalStudy,
    pub monte_carlo: MonteCarloConfig,
    pub probe: ProbeStudy,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output-crane-tip"),
            critical: CriticalStudy::default(),
            monte_carlo: MonteCarloConfig::default(),
            probe: ProbeStudy::default(),
        }
    }
}

impl StudyConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, CraneError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CraneError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CraneError> {
        if self.critical.values.is_empty() {
            return Err(CraneError::InvalidConfig(
                "critical.values must not be empty".to_string(),
            ));
        }
        if let Some(&bad) = self
            .critical
            .values
            .iter()
            .find(|v| !(v.is_finite() && **v > 0.0))
        {
            return Err(CraneError::InvalidParameter {
                name: "critical.values",
                value: bad,
            });
        }
        self.critical.integrator.validate()?;
        self.critical.search.validate()?;

        self.monte_carlo.validate()?;

        if self.probe.speeds_kmh.is_empty() {
            return Err(CraneError::InvalidConfig(
                "probe.speeds_kmh must not be empty".to_string(),
            ));
        }
        if !(self.probe.s_brake.is_finite() && self.probe.s_brake > 0.0) {
            return Err(CraneError::InvalidParameter {
                name: "probe.s_brake",
                value: self.probe.s_brake,
            });
        }
        self.probe.integrator.validate()
    }
}
