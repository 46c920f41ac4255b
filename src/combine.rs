//! Combination of the two contributions into joint local samples.
//!
//! For every (year, location) the ocean-dynamics uncertainty is a Student's-t
//! distribution (degrees of freedom from the fit record) conditioned on the
//! thermal-expansion draw at the same sample index. Because both
//! contributions are evaluated through the one shared quantile assignment,
//! adding the draws sample-by-sample preserves the fitted correlation
//! without an explicit joint draw.
//!
//! Locations are processed in independent chunks so that no more than one
//! chunk of the (samples x years x locations) grid is evaluated at a time;
//! each chunk fills its own disjoint block of the output, never a reduction,
//! so any chunk size yields identical results.

use crate::chunking::LocationChunks;
use crate::errors::{SterodynError, SterodynResult};
use crate::ocean_dynamics::{Location, OceanDynamicsFitRecord};
use crate::quantiles::QuantileAssignment;
use crate::thermal::ThermalExpansionSamples;
use log::info;
use ndarray::{Array2, Array3, ArrayViewMut3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use std::collections::HashMap;
use std::ops::Range;

/// Settings for the combiner, lifted from the run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineSettings {
    /// Probability coverage of the GCM ensemble relative to the workflow's
    /// 90%-range convention.
    pub gcm_probscale: f64,
    /// Number of locations per processing chunk.
    pub chunksize: usize,
    /// Condition the ocean-dynamics draw on the thermal-expansion anomaly.
    /// When false the fitted correlation is ignored and no cross-term is
    /// computed.
    pub correlation: bool,
    /// Scenario recorded in the output provenance.
    pub scenario: String,
    /// Base year recorded in the output provenance.
    pub baseyear: u32,
}

/// Provenance attributes carried on the output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub description: String,
    pub source: String,
    pub scenario: String,
    pub baseyear: u32,
    pub units: String,
}

/// The final joint dataset: sea-level change per (sample, year, location).
///
/// Cast to single precision before hand-off to the persistence collaborator;
/// the sample grid can be very large and double precision is not needed for
/// the target use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointSamples {
    pub variable: String,
    /// Sea-level change indexed by (sample, year, location).
    pub samples: Array3<f32>,
    pub years: Vec<u32>,
    pub locations: Vec<Location>,
    pub attrs: Provenance,
}

/// Ratio between the 90%-range convention and the ensemble's actual
/// probability coverage: `norm_ppf(0.95) / norm_ppf(gcm_probscale)`.
pub fn therm_exp_scale(gcm_probscale: f64) -> SterodynResult<f64> {
    if !(gcm_probscale > 0.5 && gcm_probscale < 1.0) {
        return Err(SterodynError::Configuration(format!(
            "GCM probability scale must lie in (0.5, 1), got {gcm_probscale}"
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| SterodynError::Configuration(e.to_string()))?;
    Ok(normal.inverse_cdf(0.95) / normal.inverse_cdf(gcm_probscale))
}

/// Combine ocean-dynamics draws with the thermal-expansion samples into the
/// final joint dataset.
///
/// The target-year grid is the thermal-expansion year axis; the fit record's
/// year axis must contain every target year. Chunks are processed in
/// parallel and concatenated in location order.
pub fn combine_contributions(
    fit: &OceanDynamicsFitRecord,
    te: &ThermalExpansionSamples,
    quantiles: &QuantileAssignment,
    settings: &CombineSettings,
) -> SterodynResult<JointSamples> {
    let nsamps = quantiles.nsamps();
    if te.samples.nrows() != nsamps {
        return Err(SterodynError::DataShape(format!(
            "{} thermal-expansion samples for {} quantile assignments",
            te.samples.nrows(),
            nsamps
        )));
    }
    if te.samples.ncols() != te.years.len() {
        return Err(SterodynError::DataShape(format!(
            "thermal-expansion samples carry {} year columns for {} year labels",
            te.samples.ncols(),
            te.years.len()
        )));
    }

    let scale = therm_exp_scale(settings.gcm_probscale)?;
    let year_idx = fit.year_indices(&te.years)?;
    let anomaly = settings
        .correlation
        .then(|| normalized_te_anomaly(&te.samples))
        .transpose()?;

    let n_locations = fit.locations.len();
    let n_years = te.years.len();
    let chunks = LocationChunks::new(n_locations, settings.chunksize)?;

    info!(
        "combining contributions over {} locations in {} chunks of <= {}",
        n_locations,
        chunks.len(),
        settings.chunksize
    );

    // Each chunk writes directly into its own block of the output, so no
    // intermediate copy of the grid is ever held alongside it.
    let mut samples = Array3::zeros((nsamps, n_years, n_locations));
    samples
        .axis_chunks_iter_mut(Axis(2), settings.chunksize)
        .into_par_iter()
        .zip(chunks.ranges().into_par_iter())
        .try_for_each(|(block, range)| {
            combine_chunk(
                fit,
                te,
                quantiles,
                &year_idx,
                anomaly.as_ref(),
                scale,
                range,
                block,
            )
        })?;

    Ok(JointSamples {
        variable: "sea_level_change".to_string(),
        samples,
        years: te.years.clone(),
        locations: fit.locations.clone(),
        attrs: Provenance {
            description:
                "Local SLR contributions from thermal expansion and dynamic sea level"
                    .to_string(),
            source: "SLR framework: sterodynamics workflow".to_string(),
            scenario: settings.scenario.clone(),
            baseyear: settings.baseyear,
            units: "mm".to_string(),
        },
    })
}

/// Thermal-expansion anomaly per (sample, year), normalized across the
/// sample dimension.
fn normalized_te_anomaly(te_samples: &Array2<f64>) -> SterodynResult<Array2<f64>> {
    let nsamps = te_samples.nrows() as f64;
    let mut anomaly = te_samples.clone();

    for mut column in anomaly.columns_mut() {
        let mean = column.sum() / nsamps;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nsamps;
        let std = var.sqrt();
        if std == 0.0 {
            return Err(SterodynError::DegenerateDistribution(
                "thermal-expansion samples have zero spread; cannot normalize the anomaly"
                    .to_string(),
            ));
        }
        column.mapv_inplace(|v| (v - mean) / std);
    }

    Ok(anomaly)
}

/// Evaluate one location chunk. Reads only this chunk's slice of the fit
/// record and writes only this chunk's output block.
#[allow(clippy::too_many_arguments)]
fn combine_chunk(
    fit: &OceanDynamicsFitRecord,
    te: &ThermalExpansionSamples,
    quantiles: &QuantileAssignment,
    year_idx: &[usize],
    anomaly: Option<&Array2<f64>>,
    scale: f64,
    range: Range<usize>,
    mut out: ArrayViewMut3<f32>,
) -> SterodynResult<()> {
    let nsamps = quantiles.nsamps();

    // Student's-t inverse-CDF values are a pure function of (quantile, dof),
    // and the dof takes few distinct values across a chunk: cache per dof.
    let mut t_draws: HashMap<u64, Vec<f64>> = HashMap::new();

    for (c, l) in range.enumerate() {
        for (j, &yi) in year_idx.iter().enumerate() {
            let od_mean = fit.mean[[yi, l]];
            let od_std = fit.std[[yi, l]];
            let corr = fit.tecorr[[yi, l]];
            let dof = fit.dof[[yi, l]];

            if dof <= 0.0 {
                return Err(SterodynError::DegenerateDistribution(format!(
                    "non-positive degrees of freedom ({dof}) at year {}, location {}",
                    fit.years[yi], fit.locations[l].id
                )));
            }
            if !(od_mean.is_finite() && od_std.is_finite()) {
                return Err(SterodynError::DegenerateDistribution(format!(
                    "undefined ocean-dynamics statistics at year {}, location {}",
                    fit.years[yi], fit.locations[l].id
                )));
            }
            if !(-1.0..=1.0).contains(&corr) {
                return Err(SterodynError::DegenerateDistribution(format!(
                    "correlation {corr} outside [-1, 1] at year {}, location {}",
                    fit.years[yi], fit.locations[l].id
                )));
            }

            let draws = match t_draws.entry(dof.to_bits()) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let dist = StudentsT::new(0.0, 1.0, dof)
                        .map_err(|e| SterodynError::DegenerateDistribution(e.to_string()))?;
                    let values = quantiles
                        .values()
                        .iter()
                        .map(|&q| dist.inverse_cdf(q))
                        .collect();
                    entry.insert(values)
                }
            };

            // Conditional std, with the cross-term only on the correlated
            // path. When correlation is disabled corr is ignored entirely.
            let condstd = match anomaly {
                Some(_) => scale * od_std * (1.0 - corr * corr).sqrt(),
                None => scale * od_std,
            };

            for i in 0..nsamps {
                let condmean = match anomaly {
                    Some(z) => od_mean + od_std * corr * z[[i, j]],
                    None => od_mean,
                };
                // Scale/shift applied directly rather than as distribution
                // parameters, so the draw stays a pure function of
                // (quantile, dof).
                let od_sample = draws[i] * condstd + condmean;
                out[[i, j, c]] = (od_sample + te.samples[[i, j]]) as f32;
            }
        }
    }

    Ok(())
}
