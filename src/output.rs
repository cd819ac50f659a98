//! Run directories and CSV/JSON result files

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::Serialize;

use crate::config::StudyConfig;
use crate::sweep::ProbeRun;
use crate::CraneError;

/// Trajectory sample tagged with the speed it belongs to
#[derive(Clone, Copy, Debug, Serialize)]
pub struct TrajectoryRow {
    pub v0_ms: f64,
    pub t: f64,
    pub angle_deg: f64,
    pub phi: f64,
    pub dphi: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunManifest {
    pub command: String,
    pub created_utc: String,
    pub config: StudyConfig,
    pub files: Vec<PathBuf>,
}

impl RunManifest {
    pub fn new(command: &str, config: &StudyConfig) -> Self {
        Self {
            command: command.to_string(),
            created_utc: Utc::now().to_rfc3339(),
            config: config.clone(),
            files: Vec::new(),
        }
    }
}

/// `<base>/<YYYYmmdd-HHMMSS>`, suffixed with a counter when taken
pub fn create_timestamped_run_dir(base_dir: &Path) -> Result<PathBuf, CraneError> {
    fs::create_dir_all(base_dir)?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let run_dir = base_dir.join(&timestamp);
    if !run_dir.exists() {
        fs::create_dir_all(&run_dir)?;
        return Ok(run_dir);
    }

    let mut counter: usize = 1;
    loop {
        let candidate = base_dir.join(format!("{timestamp}-{counter:02}"));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
        counter += 1;
    }
}

pub fn write_rows_csv<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<(), CraneError> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn trajectory_rows(runs: &[ProbeRun]) -> Vec<TrajectoryRow> {
    runs.iter()
        .flat_map(|run| {
            run.simulation.points.iter().map(move |p| TrajectoryRow {
                v0_ms: run.v0,
                t: p.t,
                angle_deg: p.angle_deg,
                phi: p.phi,
                dphi: p.dphi,
            })
        })
        .collect()
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<(), CraneError> {
    fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::Braking;
    use crate::integrator::IntegratorSettings;
    use crate::params::CraneTable;
    use crate::stats::summarize_values;
    use crate::sweep::probe_speeds;

    #[test]
    fn run_dirs_do_not_collide() {
        let base = tempfile::tempdir().unwrap();
        let a = create_timestamped_run_dir(base.path()).unwrap();
        let b = create_timestamped_run_dir(base.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn summary_csv_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let rows = vec![summarize_values(0, 10.0, &[5.4, 3.6])];
        write_rows_csv(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "i,radius,N,mean,std,q05,q50,q95");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn trajectories_are_flattened_per_speed() {
        let table = CraneTable::reference();
        let runs = probe_speeds(
            table.get(0).unwrap(),
            Braking::Distance(2.0),
            &[0.5, 1.0],
            &IntegratorSettings::new(4e-3, 2.0),
        )
        .unwrap();
        let rows = trajectory_rows(&runs);
        let expected: usize = runs.iter().map(|r| r.simulation.points.len()).sum();
        assert_eq!(rows.len(), expected);
        assert_eq!(rows[0].v0_ms, 0.5);
        assert_eq!(rows.last().unwrap().v0_ms, 1.0);
    }

    #[test]
    fn manifest_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = RunManifest::new("critical", &StudyConfig::default());
        manifest.files.push(PathBuf::from("critical_velocity.csv"));
        write_manifest(&path, &manifest).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["command"], "critical");
        assert_eq!(value["config"]["monte_carlo"]["seed"], 12345);
    }
}
