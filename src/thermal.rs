//! Thermal-expansion Monte Carlo projection.
//!
//! Global thermosteric sea-level rise is the product of an expansion
//! coefficient (metres of rise per yottajoule of ocean heat uptake) and an
//! ocean-heat-content trajectory. The coefficient is drawn from the fitted
//! normal distribution through the shared quantile assignment; the heat
//! trajectories are supplied per sample by an external climate-emulator
//! collaborator (the 2-layer model adapter). Trajectories are re-centred on
//! the base year and restricted to the target-year grid.

use crate::ensemble::ExpansionDistribution;
use crate::errors::{SterodynError, SterodynResult};
use crate::quantiles::QuantileAssignment;
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Joules per yottajoule. The 2-layer adapter reports ocean heat content in
/// joules; expansion coefficients are per yottajoule.
pub const JOULES_PER_YOTTAJOULE: f64 = 1e24;

/// Per-sample ocean-heat-content trajectories for one scenario, as handed
/// over by the 2-layer model adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhcSamples {
    /// Year of each trajectory column.
    pub years: Vec<u32>,
    /// Heat content in yottajoules, indexed by (sample, year).
    pub samples: Array2<f64>,
}

impl OhcSamples {
    /// Build from trajectories reported in joules, rescaling to yottajoules.
    pub fn from_joules(years: Vec<u32>, samples_joules: Array2<f64>) -> SterodynResult<Self> {
        let samples = samples_joules / JOULES_PER_YOTTAJOULE;
        Self::new(years, samples)
    }

    /// Build from trajectories already in yottajoules.
    pub fn new(years: Vec<u32>, samples: Array2<f64>) -> SterodynResult<Self> {
        if years.len() != samples.ncols() {
            return Err(SterodynError::DataShape(format!(
                "ocean heat content has {} year labels for {} trajectory columns",
                years.len(),
                samples.ncols()
            )));
        }
        Ok(Self { years, samples })
    }

    fn year_index(&self, year: u32) -> SterodynResult<usize> {
        self.years.iter().position(|&y| y == year).ok_or_else(|| {
            SterodynError::DataShape(format!(
                "year {year} is not on the ocean-heat-content year axis"
            ))
        })
    }
}

/// Monte Carlo draws of global thermal expansion, indexed by (sample, year).
///
/// Consistent with the fitted [`ExpansionDistribution`] and the shared
/// [`QuantileAssignment`]; centred so every sample is zero at the base year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalExpansionSamples {
    pub years: Vec<u32>,
    /// Sea-level rise in mm, indexed by (sample, year).
    pub samples: Array2<f64>,
}

/// Project thermal-expansion sample trajectories onto the target-year grid.
///
/// One expansion coefficient is drawn per sample by applying the normal
/// inverse CDF to that sample's shared quantile, then multiplied through the
/// sample's heat-content trajectory. The trajectory is offset to zero at
/// `baseyear` before the target years are selected; both the base year and
/// every target year must be present on the heat-content year axis.
pub fn project_thermal_expansion(
    distribution: &ExpansionDistribution,
    quantiles: &QuantileAssignment,
    ohc: &OhcSamples,
    baseyear: u32,
    target_years: &[u32],
) -> SterodynResult<ThermalExpansionSamples> {
    let nsamps = quantiles.nsamps();
    if ohc.samples.nrows() != nsamps {
        return Err(SterodynError::DataShape(format!(
            "{} ocean-heat-content trajectories for {} requested samples",
            ohc.samples.nrows(),
            nsamps
        )));
    }
    if !(distribution.std > 0.0) {
        return Err(SterodynError::DegenerateDistribution(format!(
            "expansion-coefficient spread must be positive, got {}",
            distribution.std
        )));
    }

    let normal = Normal::new(distribution.mean, distribution.std)
        .map_err(|e| SterodynError::DegenerateDistribution(e.to_string()))?;

    let base_idx = ohc.year_index(baseyear)?;
    let target_idx = target_years
        .iter()
        .map(|&year| ohc.year_index(year))
        .collect::<SterodynResult<Vec<_>>>()?;

    let mut samples = Array2::zeros((nsamps, target_years.len()));
    for (i, &q) in quantiles.values().iter().enumerate() {
        let expcoef = normal.inverse_cdf(q);
        let trajectory = ohc.samples.row(i);
        let offset = expcoef * trajectory[base_idx];
        for (j, &idx) in target_idx.iter().enumerate() {
            samples[[i, j]] = expcoef * trajectory[idx] - offset;
        }
    }

    info!(
        "projected {} thermal-expansion samples over {} target years",
        nsamps,
        target_years.len()
    );

    Ok(ThermalExpansionSamples {
        years: target_years.to_vec(),
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn distribution() -> ExpansionDistribution {
        ExpansionDistribution {
            mean: 0.1,
            std: 0.02,
            include_models: vec!["m1".to_string(), "m2".to_string()],
            pb_clip: 0.85,
        }
    }

    #[test]
    fn samples_are_zero_at_the_base_year() {
        let quantiles = QuantileAssignment::generate(4, 1).unwrap();
        let ohc = OhcSamples::new(
            vec![2000, 2020, 2030],
            Array2::from_shape_fn((4, 3), |(i, j)| (i + 1) as f64 * j as f64),
        )
        .unwrap();

        let te =
            project_thermal_expansion(&distribution(), &quantiles, &ohc, 2000, &[2000, 2020, 2030])
                .unwrap();

        for i in 0..4 {
            assert_relative_eq!(te.samples[[i, 0]], 0.0);
        }
    }

    #[test]
    fn median_quantile_reproduces_the_mean_coefficient() {
        // A single sample gets the only interior quantile, 0.5, so the drawn
        // coefficient is exactly the distribution mean.
        let quantiles = QuantileAssignment::generate(1, 9).unwrap();
        assert_relative_eq!(quantiles.values()[0], 0.5);

        let ohc = OhcSamples::new(vec![2000, 2100], array![[0.0, 10.0]]).unwrap();
        let te = project_thermal_expansion(&distribution(), &quantiles, &ohc, 2000, &[2100])
            .unwrap();

        assert_relative_eq!(te.samples[[0, 0]], 0.1 * 10.0, epsilon = 1e-9);
    }

    #[test]
    fn joules_input_is_rescaled() {
        let ohc = OhcSamples::from_joules(vec![2000], array![[2e24]]).unwrap();
        assert_relative_eq!(ohc.samples[[0, 0]], 2.0);
    }

    #[test]
    fn sample_count_mismatch_is_a_shape_error() {
        let quantiles = QuantileAssignment::generate(3, 1).unwrap();
        let ohc = OhcSamples::new(vec![2000, 2020], Array2::zeros((2, 2))).unwrap();
        assert!(matches!(
            project_thermal_expansion(&distribution(), &quantiles, &ohc, 2000, &[2020]),
            Err(SterodynError::DataShape(_))
        ));
    }

    #[test]
    fn missing_base_or_target_year_is_a_shape_error() {
        let quantiles = QuantileAssignment::generate(2, 1).unwrap();
        let ohc = OhcSamples::new(vec![2000, 2020], Array2::zeros((2, 2))).unwrap();

        assert!(matches!(
            project_thermal_expansion(&distribution(), &quantiles, &ohc, 1999, &[2020]),
            Err(SterodynError::DataShape(_))
        ));
        assert!(matches!(
            project_thermal_expansion(&distribution(), &quantiles, &ohc, 2000, &[2050]),
            Err(SterodynError::DataShape(_))
        ));
    }
}
