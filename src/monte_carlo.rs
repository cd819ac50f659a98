//! Monte Carlo over uncertain braking durations

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::dynamics::Braking;
use crate::integrator::{IntegratorOverrides, IntegratorSettings};
use crate::params::{CraneConfiguration, CraneTable};
use crate::solver::tips;
use crate::stats::{summarize_by_configuration, QuantileSummary};
use crate::CraneError;

pub const DEFAULT_SEED: u64 = 12345;

/// Upper bound on the number of grid speeds
pub const MAX_GRID_CANDIDATES: usize = 10_000;

/// Candidate speeds `start, start + step, ...` below `stop` [m/s]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedGrid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for SpeedGrid {
    fn default() -> Self {
        Self {
            start: 0.5,
            stop: 5.0,
            step: 0.5,
        }
    }
}

impl SpeedGrid {
    /// Ascending candidate speeds
    pub fn candidates(&self) -> Result<Vec<f64>, CraneError> {
        if !(self.start.is_finite() && self.start > 0.0) {
            return Err(CraneError::invalid("grid.start", self.start));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(CraneError::invalid("grid.step", self.step));
        }
        if !(self.stop.is_finite() && self.stop > self.start) {
            return Err(CraneError::invalid("grid.stop", self.stop));
        }
        let count = ((self.stop - self.start) / self.step).ceil();
        if !(count <= MAX_GRID_CANDIDATES as f64) {
            return Err(CraneError::invalid("grid.step", self.step));
        }
        let count = count as usize;
        Ok((0..count)
            .map(|k| self.start + k as f64 * self.step)
            .collect())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Draws per configuration
    pub runs: usize,
    /// Mean braking duration [s]
    pub t_mean: f64,
    /// Standard deviation of the braking duration [s]
    pub t_std: f64,
    pub seed: u64,
    /// Draws are clipped to `[t_min, t_max]` [s]
    pub t_min: f64,
    pub t_max: f64,
    pub grid: SpeedGrid,
    #[serde(deserialize_with = "monte_carlo_integrator")]
    pub integrator: IntegratorSettings,
}

fn monte_carlo_integrator<'de, D>(deserializer: D) -> Result<IntegratorSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = IntegratorOverrides::deserialize(deserializer)?;
    Ok(overrides.over(MonteCarloConfig::default().integrator))
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            t_mean: 1.5,
            t_std: 0.3,
            seed: DEFAULT_SEED,
            t_min: 0.5,
            t_max: 10.0,
            grid: SpeedGrid::default(),
            integrator: IntegratorSettings::new(4e-3, 15.0),
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), CraneError> {
        if self.runs == 0 {
            return Err(CraneError::invalid("runs", 0.0));
        }
        if !self.t_mean.is_finite() {
            return Err(CraneError::invalid("t_mean", self.t_mean));
        }
        if !self.t_std.is_finite() {
            return Err(CraneError::invalid("t_std", self.t_std));
        }
        if !(self.t_min.is_finite() && self.t_min > 0.0) {
            return Err(CraneError::invalid("t_min", self.t_min));
        }
        if !(self.t_max.is_finite() && self.t_max >= self.t_min) {
            return Err(CraneError::invalid("t_max", self.t_max));
        }
        self.grid.candidates()?;
        self.integrator.validate()
    }
}

/// One braking-duration draw and the grid speed it allows
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MonteCarloSample {
    pub i: usize,
    pub radius: f64,
    pub t_brake: f64,
    pub vmax_ms: f64,
    pub vmax_kmh: f64,
    /// Every candidate tipped; `vmax_ms` is the lowest candidate
    pub fallback: bool,
}

#[derive(Clone, Debug)]
pub struct MonteCarloBatch {
    pub samples: Vec<MonteCarloSample>,
}

impl MonteCarloBatch {
    pub fn summaries(&self) -> Vec<QuantileSummary> {
        summarize_by_configuration(&self.samples)
    }

    pub fn fallback_count(&self) -> usize {
        self.samples.iter().filter(|s| s.fallback).count()
    }
}

/// Grid-search result for one draw
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridVmax {
    pub vmax_ms: f64,
    pub fallback: bool,
}

/// Independent stream for one configuration index
pub fn configuration_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}

/// `n` braking durations from `Normal(mean, std)` clipped to `[t_min, t_max]`
pub fn sample_t_brake<R: Rng + ?Sized>(
    mean: f64,
    std: f64,
    n: usize,
    t_min: f64,
    t_max: f64,
    rng: &mut R,
) -> Result<Vec<f64>, CraneError> {
    if !(t_min.is_finite() && t_max.is_finite() && t_min <= t_max) {
        return Err(CraneError::invalid("t_max", t_max));
    }
    if std <= 0.0 {
        return Ok(vec![mean.clamp(t_min, t_max); n]);
    }
    let normal = Normal::new(mean, std).map_err(|_| CraneError::invalid("t_std", std))?;
    Ok((0..n)
        .map(|_| normal.sample(rng).clamp(t_min, t_max))
        .collect())
}

/// Highest grid speed that survives braking within `t_brake`
pub fn find_vmax(
    config: &CraneConfiguration,
    t_brake: f64,
    candidates: &[f64],
    settings: &IntegratorSettings,
) -> Result<GridVmax, CraneError> {
    let Some(&lowest) = candidates.first() else {
        return Err(CraneError::InvalidConfig(
            "speed grid has no candidates".to_string(),
        ));
    };

    for &v0 in candidates.iter().rev() {
        if !tips(config, Braking::Duration(t_brake), v0, settings)? {
            return Ok(GridVmax {
                vmax_ms: v0,
                fallback: false,
            });
        }
    }

    debug!(
        radius = config.radius(),
        t_brake,
        lowest,
        "every grid speed tipped, falling back to the lowest"
    );
    Ok(GridVmax {
        vmax_ms: lowest,
        fallback: true,
    })
}

/// Draws for a single configuration
pub fn run_configuration(
    table: &CraneTable,
    index: usize,
    config: &MonteCarloConfig,
) -> Result<Vec<MonteCarloSample>, CraneError> {
    config.validate()?;
    let candidates = config.grid.candidates()?;
    sample_configuration(index, table.get(index)?, config, &candidates)
}

/// Draws for every configuration of the table, one random stream each
pub fn run_monte_carlo(
    table: &CraneTable,
    config: &MonteCarloConfig,
) -> Result<MonteCarloBatch, CraneError> {
    config.validate()?;
    let candidates = config.grid.candidates()?;
    info!(
        configurations = table.len(),
        runs = config.runs,
        t_mean = config.t_mean,
        t_std = config.t_std,
        seed = config.seed,
        "monte carlo started"
    );

    let rows: Vec<(usize, &CraneConfiguration)> = table.iter().collect();
    let groups = rows
        .par_iter()
        .map(|&(i, row)| sample_configuration(i, row, config, &candidates))
        .collect::<Result<Vec<_>, CraneError>>()?;

    let batch = MonteCarloBatch {
        samples: groups.into_iter().flatten().collect(),
    };
    info!(
        samples = batch.samples.len(),
        fallbacks = batch.fallback_count(),
        "monte carlo finished"
    );
    Ok(batch)
}

fn sample_configuration(
    i: usize,
    row: &CraneConfiguration,
    config: &MonteCarloConfig,
    candidates: &[f64],
) -> Result<Vec<MonteCarloSample>, CraneError> {
    let mut rng = configuration_rng(config.seed, i);
    let draws = sample_t_brake(
        config.t_mean,
        config.t_std,
        config.runs,
        config.t_min,
        config.t_max,
        &mut rng,
    )?;

    draws
        .into_iter()
        .map(|t_brake| -> Result<MonteCarloSample, CraneError> {
            let found = find_vmax(row, t_brake, candidates, &config.integrator)?;
            Ok(MonteCarloSample {
                i,
                radius: row.radius(),
                t_brake,
                vmax_ms: found.vmax_ms,
                vmax_kmh: 3.6 * found.vmax_ms,
                fallback: found.fallback,
            })
        })
        .collect()
}
