//! Critical velocity search
//!
//! Finds the largest initial speed that does not tip the crane for a fixed
//! braking event. The tip predicate is assumed monotone in `v0`: once a speed
//! tips, every higher speed tips too.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dynamics::{Braking, BrakingProfile, TippingDynamics};
use crate::integrator::{tip_outcome, IntegratorSettings};
use crate::params::CraneConfiguration;
use crate::CraneError;

/// Bracket growth and bisection settings [m/s]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalVelocitySearch {
    /// Lower bracket bound, assumed safe
    pub v_low: f64,
    /// First speed probed
    pub v_start: f64,
    /// Bracket growth factor
    pub growth: f64,
    /// Highest speed of interest
    pub v_sup: f64,
    /// Bisection tolerance
    pub eps: f64,
}

impl Default for CriticalVelocitySearch {
    fn default() -> Self {
        Self {
            v_low: 0.05,
            v_start: 0.1,
            growth: 1.5,
            v_sup: 10.0,
            eps: 1e-3,
        }
    }
}

/// Outcome of one search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalVelocity {
    /// Highest speed known not to tip [m/s]
    pub vmax_ms: f64,
    /// No tipping speed was found up to `v_sup`; `vmax_ms` is the ceiling
    pub saturated: bool,
    /// Predicate evaluations spent
    pub evaluations: usize,
}

impl CriticalVelocity {
    pub fn vmax_kmh(&self) -> f64 {
        3.6 * self.vmax_ms
    }
}

impl CriticalVelocitySearch {
    pub fn validate(&self) -> Result<(), CraneError> {
        let fields = [
            ("v_low", self.v_low),
            ("v_start", self.v_start),
            ("growth", self.growth),
            ("v_sup", self.v_sup),
            ("eps", self.eps),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(CraneError::invalid(name, value));
            }
        }
        if self.v_start <= self.v_low {
            return Err(CraneError::invalid("v_start", self.v_start));
        }
        if self.growth <= 1.0 {
            return Err(CraneError::invalid("growth", self.growth));
        }
        if self.v_sup <= self.v_start {
            return Err(CraneError::invalid("v_sup", self.v_sup));
        }
        Ok(())
    }

    /// Bracket then bisect over any monotone tip predicate
    pub fn solve<P>(&self, mut tips: P) -> Result<CriticalVelocity, CraneError>
    where
        P: FnMut(f64) -> Result<bool, CraneError>,
    {
        self.validate()?;
        let mut evaluations = 0;
        let mut probe = |v: f64| {
            evaluations += 1;
            tips(v)
        };

        let mut low = self.v_low;
        let mut up = self.v_start;
        loop {
            if up >= self.v_sup {
                if !probe(up)? {
                    return Ok(CriticalVelocity {
                        vmax_ms: self.v_sup,
                        saturated: true,
                        evaluations,
                    });
                }
                break;
            }
            if probe(up)? {
                break;
            }
            low = up;
            up *= self.growth;
        }

        while up - low > self.eps {
            let mid = 0.5 * (low + up);
            if probe(mid)? {
                up = mid;
            } else {
                low = mid;
            }
        }

        Ok(CriticalVelocity {
            vmax_ms: low,
            saturated: false,
            evaluations,
        })
    }
}

/// Does braking from `v0` tip this configuration?
pub fn tips(
    config: &CraneConfiguration,
    braking: Braking,
    v0: f64,
    settings: &IntegratorSettings,
) -> Result<bool, CraneError> {
    let dynamics = TippingDynamics::new(config, &BrakingProfile::new(braking, v0))?;
    Ok(tip_outcome(&dynamics, settings)?.is_tipped())
}

/// Largest non-tipping initial speed for one configuration and braking event
pub fn critical_velocity(
    config: &CraneConfiguration,
    braking: Braking,
    settings: &IntegratorSettings,
    search: &CriticalVelocitySearch,
) -> Result<CriticalVelocity, CraneError> {
    settings.validate()?;
    let result = search.solve(|v0| tips(config, braking, v0, settings))?;
    debug!(
        radius = config.radius(),
        braking = ?braking,
        vmax_ms = result.vmax_ms,
        saturated = result.saturated,
        evaluations = result.evaluations,
        "critical velocity solved"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CraneTable;
    use proptest::prelude::*;
    use rayon::prelude::*;

    fn scenario_settings() -> IntegratorSettings {
        IntegratorSettings::new(1e-3, 5.0)
    }

    #[test]
    fn threshold_predicate_is_found_from_below() {
        let search = CriticalVelocitySearch::default();
        let result = search.solve(|v| Ok(v > 2.345)).unwrap();
        assert!(!result.saturated);
        assert!(result.vmax_ms <= 2.345);
        assert!(2.345 - result.vmax_ms <= search.eps);
    }

    #[test]
    fn never_tipping_returns_the_ceiling() {
        let search = CriticalVelocitySearch::default();
        let result = search.solve(|_| Ok(false)).unwrap();
        assert!(result.saturated);
        assert_eq!(result.vmax_ms, search.v_sup);
    }

    #[test]
    fn always_tipping_returns_the_lower_bound() {
        let search = CriticalVelocitySearch::default();
        let result = search.solve(|_| Ok(true)).unwrap();
        assert!(!result.saturated);
        assert!(result.vmax_ms >= search.v_low);
        assert!(result.vmax_ms - search.v_low <= search.eps);
    }

    #[test]
    fn tipping_just_past_the_ceiling_is_bisected() {
        // last bracket probe overshoots v_sup and tips there
        let search = CriticalVelocitySearch::default();
        let result = search.solve(|v| Ok(v > 9.9)).unwrap();
        assert!(!result.saturated);
        assert!(9.9 - result.vmax_ms <= search.eps);
    }

    #[test]
    fn predicate_errors_propagate() {
        let search = CriticalVelocitySearch::default();
        let err = search
            .solve(|v| Err(CraneError::invalid("v0", v)))
            .unwrap_err();
        assert!(matches!(err, CraneError::InvalidParameter { name: "v0", .. }));
    }

    #[test]
    fn invalid_search_settings_are_rejected() {
        let bad = [
            CriticalVelocitySearch {
                eps: 0.0,
                ..Default::default()
            },
            CriticalVelocitySearch {
                growth: 1.0,
                ..Default::default()
            },
            CriticalVelocitySearch {
                v_start: 0.01,
                ..Default::default()
            },
            CriticalVelocitySearch {
                v_sup: 0.05,
                ..Default::default()
            },
        ];
        for search in bad {
            assert!(search.solve(|_| Ok(true)).is_err());
        }
    }

    #[test]
    fn longer_braking_allows_higher_speed() {
        let table = CraneTable::reference();
        let row = table.get(0).unwrap();
        let search = CriticalVelocitySearch::default();
        let vmax: Vec<f64> = [1.0, 1.5, 2.0]
            .iter()
            .map(|&t| {
                critical_velocity(row, Braking::Duration(t), &scenario_settings(), &search)
                    .unwrap()
                    .vmax_ms
            })
            .collect();
        assert!(vmax[0] < vmax[1] && vmax[1] < vmax[2], "{vmax:?}");
        assert!(vmax.iter().all(|&v| v > search.v_low && v < search.v_sup));
    }

    #[test]
    fn very_long_braking_saturates_at_the_ceiling() {
        let table = CraneTable::reference();
        let search = CriticalVelocitySearch::default();
        let result = critical_velocity(
            table.get(5).unwrap(),
            Braking::Duration(1.0e3),
            &IntegratorSettings::new(4e-3, 5.0),
            &search,
        )
        .unwrap();
        assert!(result.saturated);
        assert!((result.vmax_ms - search.v_sup).abs() <= search.eps);
    }

    #[test]
    fn solver_is_pure_across_threads() {
        let table = CraneTable::reference();
        let row = *table.get(3).unwrap();
        let search = CriticalVelocitySearch::default();
        let settings = IntegratorSettings::new(4e-3, 5.0);
        let results: Vec<CriticalVelocity> = (0..4)
            .into_par_iter()
            .map(|_| critical_velocity(&row, Braking::Distance(1.5), &settings, &search).unwrap())
            .collect();
        let sequential =
            critical_velocity(&row, Braking::Distance(1.5), &settings, &search).unwrap();
        for result in results {
            assert_eq!(result.vmax_ms.to_bits(), sequential.vmax_ms.to_bits());
            assert_eq!(result.evaluations, sequential.evaluations);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn tip_predicate_is_monotone_in_speed(
            index in 0usize..11,
            t_brake in 0.8f64..2.5,
        ) {
            let table = CraneTable::reference();
            let row = table.get(index).unwrap();
            let settings = IntegratorSettings::new(4e-3, 5.0);
            let mut tipped = false;
            for k in 0..=40 {
                let v0 = 0.25 * k as f64;
                let now = tips(row, Braking::Duration(t_brake), v0, &settings).unwrap();
                prop_assert!(!(tipped && !now), "tipped below {} but not at it", v0);
                tipped = now;
            }
        }
    }
}
