use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crane_tip::config::StudyConfig;
use crane_tip::output::{
    create_timestamped_run_dir, trajectory_rows, write_manifest, write_rows_csv, RunManifest,
};
use crane_tip::sweep::{safe_speeds, ProbePoint};
use crane_tip::{
    critical_velocity_table, probe_speeds, run_monte_carlo, Braking, BrakingMode, CraneTable,
    ProbeVerdict,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Critical braking velocity of a mobile crane before tip-over")]
struct Cli {
    /// TOML study configuration (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output base directory; a timestamped run directory is created inside
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Critical velocity for every radius over a braking grid
    Critical {
        /// Sweep braking durations or distances
        #[arg(long, value_enum)]
        braking: Option<BrakingArg>,

        /// Comma-separated braking values [s or m]
        #[arg(long, value_delimiter = ',')]
        values: Vec<f64>,

        /// Integration step [s]
        #[arg(long)]
        dt: Option<f64>,

        /// Simulation horizon [s]
        #[arg(long)]
        t_sim: Option<f64>,
    },
    /// Monte Carlo over random braking durations
    MonteCarlo {
        /// Draws per radius
        #[arg(long)]
        runs: Option<usize>,

        /// Mean braking duration [s]
        #[arg(long)]
        mean: Option<f64>,

        /// Standard deviation of the braking duration [s]
        #[arg(long)]
        std: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Trajectories of one radius at a few initial speeds
    Probe {
        /// Configuration row (0 = 10 m radius)
        #[arg(long)]
        index: Option<usize>,

        /// Comma-separated initial speeds [km/h]
        #[arg(long, value_delimiter = ',')]
        speeds_kmh: Vec<f64>,

        /// Braking distance [m]
        #[arg(long)]
        s_brake: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BrakingArg {
    Duration,
    Distance,
}

impl From<BrakingArg> for BrakingMode {
    fn from(arg: BrakingArg) -> Self {
        match arg {
            BrakingArg::Duration => BrakingMode::Duration,
            BrakingArg::Distance => BrakingMode::Distance,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => StudyConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StudyConfig::default(),
    };
    if let Some(output) = &cli.output {
        cfg.output_dir = output.clone();
    }
    apply_overrides(&mut cfg, &cli.command);
    cfg.validate().context("invalid study configuration")?;

    let table = CraneTable::reference();
    let run_dir = create_timestamped_run_dir(&cfg.output_dir).with_context(|| {
        format!(
            "failed to create run directory under {}",
            cfg.output_dir.display()
        )
    })?;

    let started = Instant::now();
    let (name, files) = match &cli.command {
        Command::Critical { .. } => ("critical", run_critical(&cfg, &table, &run_dir)?),
        Command::MonteCarlo { .. } => ("monte-carlo", run_monte_carlo_study(&cfg, &table, &run_dir)?),
        Command::Probe { .. } => ("probe", run_probe(&cfg, &table, &run_dir)?),
    };

    let mut manifest = RunManifest::new(name, &cfg);
    manifest.files = files;
    write_manifest(&run_dir.join("manifest.json"), &manifest)?;

    println!(
        "done in {:.2} s | run directory: {}",
        started.elapsed().as_secs_f64(),
        run_dir.display()
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_overrides(cfg: &mut StudyConfig, command: &Command) {
    match command {
        Command::Critical {
            braking,
            values,
            dt,
            t_sim,
        } => {
            if let Some(v) = braking {
                cfg.critical.braking = (*v).into();
            }
            if !values.is_empty() {
                cfg.critical.values = values.clone();
            }
            if let Some(v) = dt {
                cfg.critical.integrator.dt = *v;
            }
            if let Some(v) = t_sim {
                cfg.critical.integrator.t_sim = *v;
            }
        }
        Command::MonteCarlo {
            runs,
            mean,
            std,
            seed,
        } => {
            if let Some(v) = runs {
                cfg.monte_carlo.runs = *v;
            }
            if let Some(v) = mean {
                cfg.monte_carlo.t_mean = *v;
            }
            if let Some(v) = std {
                cfg.monte_carlo.t_std = *v;
            }
            if let Some(v) = seed {
                cfg.monte_carlo.seed = *v;
            }
        }
        Command::Probe {
            index,
            speeds_kmh,
            s_brake,
        } => {
            if let Some(v) = index {
                cfg.probe.index = *v;
            }
            if !speeds_kmh.is_empty() {
                cfg.probe.speeds_kmh = speeds_kmh.clone();
            }
            if let Some(v) = s_brake {
                cfg.probe.s_brake = *v;
            }
        }
    }
}

fn run_critical(cfg: &StudyConfig, table: &CraneTable, run_dir: &Path) -> Result<Vec<PathBuf>> {
    let study = &cfg.critical;
    let rows = critical_velocity_table(
        table,
        study.braking,
        &study.values,
        &study.integrator,
        &study.search,
    )?;

    let column = study.braking.column();
    for row in &rows {
        println!(
            "i={}, R={:.1} m, {}={:.2} : vmax={:.3} m/s ({:.2} km/h){}",
            row.i,
            row.radius,
            column,
            row.value,
            row.vmax_ms,
            row.vmax_kmh,
            if row.saturated { " [ceiling]" } else { "" }
        );
    }

    let path = run_dir.join("critical_velocity.csv");
    write_rows_csv(&path, &rows)?;
    Ok(vec![path])
}

fn run_monte_carlo_study(
    cfg: &StudyConfig,
    table: &CraneTable,
    run_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let batch = run_monte_carlo(table, &cfg.monte_carlo)?;
    let summaries = batch.summaries();

    println!("=== Monte Carlo vmax [km/h] by radius ===");
    println!(
        "{:>3} {:>7} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "i", "radius", "N", "mean", "std", "q05", "q50", "q95"
    );
    for row in &summaries {
        println!(
            "{:>3} {:>7.1} {:>6} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3}",
            row.i, row.radius, row.n, row.mean, row.std, row.q05, row.q50, row.q95
        );
    }
    let fallbacks = batch.fallback_count();
    if fallbacks > 0 {
        println!("{fallbacks} draws tipped at every grid speed (lowest speed reported)");
    }

    let samples_path = run_dir.join("monte_carlo_samples.csv");
    let summary_path = run_dir.join("monte_carlo_summary.csv");
    write_rows_csv(&samples_path, &batch.samples)?;
    write_rows_csv(&summary_path, &summaries)?;
    Ok(vec![samples_path, summary_path])
}

fn run_probe(cfg: &StudyConfig, table: &CraneTable, run_dir: &Path) -> Result<Vec<PathBuf>> {
    let study = &cfg.probe;
    let row = table.get(study.index)?;
    info!(
        index = study.index,
        radius = row.radius(),
        x_cog = row.x_cog(),
        z_cog = row.z_cog(),
        "probing configuration"
    );

    let runs = probe_speeds(
        row,
        Braking::Distance(study.s_brake),
        &study.speeds_ms(),
        &study.integrator,
    )?;

    for run in &runs {
        println!(
            "--- v0 = {:.3} m/s ({:.2} km/h) ---",
            run.v0,
            3.6 * run.v0
        );
        println!("max angle: {:.3} deg", run.max_angle_deg());
        match run.tip_time() {
            Some(t) => println!("tipping time: {t:.4} s"),
            None => println!("tipping time: none"),
        }
        let verdict = match run.verdict {
            ProbeVerdict::Tipping => "tipping",
            ProbeVerdict::FallsBack => "falls back: stable",
            ProbeVerdict::MovesForward => "moves forward but no tipping",
        };
        println!("{verdict}");
    }
    println!(
        "safe speeds for radius {:.1} m [m/s]: {:?}",
        row.radius(),
        safe_speeds(&runs)
    );

    let points: Vec<ProbePoint> = runs.iter().map(ProbePoint::from).collect();
    let points_path = run_dir.join("probe_points.csv");
    let trajectory_path = run_dir.join("probe_trajectories.csv");
    write_rows_csv(&points_path, &points)?;
    write_rows_csv(&trajectory_path, &trajectory_rows(&runs))?;
    Ok(vec![points_path, trajectory_path])
}
