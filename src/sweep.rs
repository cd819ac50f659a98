//! Sweeps over the configuration table and over candidate speeds

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::dynamics::{Braking, BrakingMode, BrakingProfile, TippingDynamics};
use crate::integrator::{simulate, IntegratorSettings, Simulation, TipOutcome};
use crate::params::{CraneConfiguration, CraneTable};
use crate::solver::{critical_velocity, CriticalVelocitySearch};
use crate::CraneError;

/// Critical velocity of one configuration for one braking value
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CriticalVelocityRow {
    pub i: usize,
    pub radius: f64,
    pub braking: BrakingMode,
    /// Braking duration [s] or distance [m], depending on `braking`
    pub value: f64,
    pub vmax_ms: f64,
    pub vmax_kmh: f64,
    pub saturated: bool,
}

/// Solve every configuration for every braking value.
///
/// Values are deduplicated, so rows are unique per `(i, value)` and come out
/// ordered by index, then value.
pub fn critical_velocity_table(
    table: &CraneTable,
    mode: BrakingMode,
    values: &[f64],
    settings: &IntegratorSettings,
    search: &CriticalVelocitySearch,
) -> Result<Vec<CriticalVelocityRow>, CraneError> {
    settings.validate()?;
    search.validate()?;

    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values.dedup();
    if values.is_empty() {
        return Err(CraneError::InvalidConfig(
            "no braking values to sweep".to_string(),
        ));
    }

    let grid = &values;
    let tasks: Vec<(usize, &CraneConfiguration, f64)> = table
        .iter()
        .flat_map(move |(i, row)| grid.iter().map(move |&v| (i, row, v)))
        .collect();
    info!(
        configurations = table.len(),
        values = values.len(),
        braking = mode.column(),
        "critical velocity sweep started"
    );

    tasks
        .par_iter()
        .map(|&(i, row, value)| -> Result<CriticalVelocityRow, CraneError> {
            let result = critical_velocity(row, mode.braking(value), settings, search)?;
            Ok(CriticalVelocityRow {
                i,
                radius: row.radius(),
                braking: mode,
                value,
                vmax_ms: result.vmax_ms,
                vmax_kmh: result.vmax_kmh(),
                saturated: result.saturated,
            })
        })
        .collect()
}

/// How one probed speed ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    Tipping,
    /// Swung back past the rest angle
    FallsBack,
    /// Leaning forward at the end of the run without tipping
    MovesForward,
}

/// Full run for one initial speed
#[derive(Clone, Debug)]
pub struct ProbeRun {
    pub v0: f64,
    pub simulation: Simulation,
    pub verdict: ProbeVerdict,
}

impl ProbeRun {
    pub fn max_angle_deg(&self) -> f64 {
        self.simulation.max_angle_deg()
    }

    pub fn tip_time(&self) -> Option<f64> {
        self.simulation.outcome.tip_time()
    }
}

/// Scatter point: initial speed against peak angle
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProbePoint {
    pub v0_ms: f64,
    pub v0_kmh: f64,
    pub max_angle_deg: f64,
    pub tipped: bool,
    pub tip_time: Option<f64>,
}

impl From<&ProbeRun> for ProbePoint {
    fn from(run: &ProbeRun) -> Self {
        Self {
            v0_ms: run.v0,
            v0_kmh: 3.6 * run.v0,
            max_angle_deg: run.max_angle_deg(),
            tipped: run.verdict == ProbeVerdict::Tipping,
            tip_time: run.tip_time(),
        }
    }
}

fn classify(simulation: &Simulation) -> ProbeVerdict {
    if let TipOutcome::Tipped(_) = simulation.outcome {
        return ProbeVerdict::Tipping;
    }
    match (
        simulation.initial_angle_deg(),
        simulation.final_angle_deg(),
    ) {
        (Some(first), Some(last)) if last < first => ProbeVerdict::FallsBack,
        _ => ProbeVerdict::MovesForward,
    }
}

/// Simulate one configuration at each speed [m/s] with the same braking event
pub fn probe_speeds(
    config: &CraneConfiguration,
    braking: Braking,
    speeds: &[f64],
    settings: &IntegratorSettings,
) -> Result<Vec<ProbeRun>, CraneError> {
    settings.validate()?;
    speeds
        .iter()
        .map(|&v0| -> Result<ProbeRun, CraneError> {
            let dynamics = TippingDynamics::new(config, &BrakingProfile::new(braking, v0))?;
            let simulation = simulate(&dynamics, settings)?;
            let verdict = classify(&simulation);
            Ok(ProbeRun {
                v0,
                simulation,
                verdict,
            })
        })
        .collect()
}

/// Speeds among `runs` that did not tip
pub fn safe_speeds(runs: &[ProbeRun]) -> Vec<f64> {
    runs.iter()
        .filter(|run| run.verdict != ProbeVerdict::Tipping)
        .map(|run| run.v0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_are_unique_and_ordered() {
        let table = CraneTable::new(vec![
            *CraneTable::reference().get(0).unwrap(),
            *CraneTable::reference().get(1).unwrap(),
        ])
        .unwrap();
        let rows = critical_velocity_table(
            &table,
            BrakingMode::Duration,
            &[2.0, 1.0, 2.0],
            &IntegratorSettings::new(4e-3, 5.0),
            &CriticalVelocitySearch::default(),
        )
        .unwrap();
        let keys: Vec<(usize, f64)> = rows.iter().map(|r| (r.i, r.value)).collect();
        assert_eq!(keys, vec![(0, 1.0), (0, 2.0), (1, 1.0), (1, 2.0)]);
        for row in &rows {
            assert!((row.vmax_kmh - 3.6 * row.vmax_ms).abs() < 1e-12);
            assert!(!row.saturated);
        }
        assert!(rows[0].vmax_ms < rows[1].vmax_ms);
        assert!(rows[2].vmax_ms < rows[3].vmax_ms);
    }

    #[test]
    fn empty_value_list_is_rejected() {
        let err = critical_velocity_table(
            &CraneTable::reference(),
            BrakingMode::Distance,
            &[],
            &IntegratorSettings::default(),
            &CriticalVelocitySearch::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CraneError::InvalidConfig(_)));
    }

    #[test]
    fn probe_classifies_each_speed() {
        let table = CraneTable::reference();
        let runs = probe_speeds(
            table.get(0).unwrap(),
            Braking::Duration(1.0),
            &[0.5, 1.4, 3.0],
            &IntegratorSettings::new(1e-3, 5.0),
        )
        .unwrap();
        let verdicts: Vec<ProbeVerdict> = runs.iter().map(|r| r.verdict).collect();
        assert_eq!(
            verdicts,
            vec![
                ProbeVerdict::FallsBack,
                ProbeVerdict::MovesForward,
                ProbeVerdict::Tipping
            ]
        );
        assert_eq!(safe_speeds(&runs), vec![0.5, 1.4]);

        let points: Vec<ProbePoint> = runs.iter().map(ProbePoint::from).collect();
        assert!(points[2].tipped);
        assert!(points[2].tip_time.is_some());
        assert!(points[2].max_angle_deg >= 90.0);
        assert!(points[0].max_angle_deg < 90.0);
    }
}
