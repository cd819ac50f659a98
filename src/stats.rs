//! Per-configuration statistics of Monte Carlo critical velocities

use std::collections::BTreeMap;

use serde::Serialize;

use crate::monte_carlo::MonteCarloSample;

/// Distribution of `vmax_kmh` for one configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileSummary {
    pub i: usize,
    pub radius: f64,
    #[serde(rename = "N")]
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for a single draw
    pub std: f64,
    pub q05: f64,
    pub q50: f64,
    pub q95: f64,
}

/// Mean accumulated around the first value, so identical draws return that
/// value exactly
pub fn mean(values: &[f64]) -> f64 {
    let Some(&shift) = values.first() else {
        return f64::NAN;
    };
    let offset: f64 = values.iter().map(|v| v - shift).sum();
    shift + offset / values.len() as f64
}

/// Standard deviation with Bessel's correction
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values) - values[0];
    let ss: f64 = values
        .iter()
        .map(|v| {
            let d = (v - values[0]) - m;
            d * d
        })
        .sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Quantile of ascending `sorted` data, linear between closest ranks
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// Summary of one group of velocities [km/h]
pub fn summarize_values(i: usize, radius: f64, values: &[f64]) -> QuantileSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    QuantileSummary {
        i,
        radius,
        n: values.len(),
        mean: mean(values),
        std: sample_std(values),
        q05: quantile(&sorted, 0.05),
        q50: quantile(&sorted, 0.50),
        q95: quantile(&sorted, 0.95),
    }
}

/// One summary row per configuration, ordered by radius
pub fn summarize_by_configuration(samples: &[MonteCarloSample]) -> Vec<QuantileSummary> {
    let mut groups: BTreeMap<usize, (f64, Vec<f64>)> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.i)
            .or_insert_with(|| (sample.radius, Vec::new()))
            .1
            .push(sample.vmax_kmh);
    }

    let mut rows: Vec<QuantileSummary> = groups
        .into_iter()
        .map(|(i, (radius, values))| summarize_values(i, radius, &values))
        .collect();
    rows.sort_by(|a, b| a.radius.total_cmp(&b.radius).then(a.i.cmp(&b.i)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: usize, radius: f64, vmax_kmh: f64) -> MonteCarloSample {
        MonteCarloSample {
            i,
            radius,
            t_brake: 1.5,
            vmax_ms: vmax_kmh / 3.6,
            vmax_kmh,
            fallback: false,
        }
    }

    #[test]
    fn quantiles_interpolate_between_ranks() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.5), 3.0);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 5.0);
        assert!((quantile(&sorted, 0.05) - 1.2).abs() < 1e-12);
        assert!((quantile(&sorted, 0.95) - 4.8).abs() < 1e-12);
    }

    #[test]
    fn single_draw_has_undefined_spread() {
        let summary = summarize_values(0, 10.0, &[5.4]);
        assert_eq!(summary.n, 1);
        assert_eq!(summary.mean, 5.4);
        assert!(summary.std.is_nan());
        assert_eq!(summary.q05, 5.4);
        assert_eq!(summary.q95, 5.4);
    }

    #[test]
    fn identical_draws_have_exactly_zero_spread() {
        let values = vec![3.6 * 1.5; 1000];
        let summary = summarize_values(0, 10.0, &values);
        assert_eq!(summary.mean, 3.6 * 1.5);
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.q05, summary.q95);
    }

    #[test]
    fn empty_input_has_undefined_mean() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn sample_std_uses_bessel_correction() {
        assert!((sample_std(&[1.0, 2.0, 3.0, 4.0]) - 1.290_994_448_735_805_6).abs() < 1e-12);
    }

    #[test]
    fn groups_are_sorted_by_radius() {
        let samples = vec![
            sample(2, 12.0, 3.6),
            sample(0, 10.0, 5.4),
            sample(2, 12.0, 5.4),
            sample(1, 11.0, 1.8),
            sample(0, 10.0, 3.6),
        ];
        let rows = summarize_by_configuration(&samples);
        let radii: Vec<f64> = rows.iter().map(|r| r.radius).collect();
        assert_eq!(radii, vec![10.0, 11.0, 12.0]);
        assert_eq!(rows[0].n, 2);
        assert_eq!(rows[1].n, 1);
        assert!((rows[2].mean - 4.5).abs() < 1e-12);
    }
}
