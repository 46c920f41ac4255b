//! Per-location regression statistics for ocean-dynamic sea level.
//!
//! The multi-model GCM ensemble supplies local dynamic sea level (`zos`) per
//! (year, model, location) and global thermosteric sea level (`zostoga`) per
//! (year, model), both with NaN gaps where a model did not report. The
//! fitter reduces these to one record of mean, spread, correlation with
//! thermal expansion, and degrees of freedom per (year, location). Missing
//! models lower the degrees of freedom at that cell; nothing is imputed.

use crate::errors::{SterodynError, SterodynResult};
use log::{debug, warn};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// A projection site: identifier plus coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

/// Multi-model ensemble of ocean-dynamic and thermal-expansion fields over
/// the model period, as handed over by the preprocessing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OceanDynamicsEnsemble {
    pub years: Vec<u32>,
    pub models: Vec<String>,
    pub locations: Vec<Location>,
    /// Local dynamic sea level indexed by (year, model, location); NaN where
    /// a model has no data.
    pub zos: Array3<f64>,
    /// Global thermosteric sea level indexed by (year, model); NaN where a
    /// model has no data.
    pub zostoga: Array2<f64>,
}

impl OceanDynamicsEnsemble {
    pub fn new(
        years: Vec<u32>,
        models: Vec<String>,
        locations: Vec<Location>,
        zos: Array3<f64>,
        zostoga: Array2<f64>,
    ) -> SterodynResult<Self> {
        if years.is_empty() {
            return Err(SterodynError::DataShape(
                "ocean-dynamics ensemble has an empty year axis".to_string(),
            ));
        }
        let expected = (years.len(), models.len(), locations.len());
        if zos.dim() != expected {
            return Err(SterodynError::DataShape(format!(
                "zos has shape {:?}, expected {:?} from the year/model/location axes",
                zos.dim(),
                expected
            )));
        }
        if zostoga.dim() != (years.len(), models.len()) {
            return Err(SterodynError::DataShape(format!(
                "zostoga has shape {:?}, expected {:?} from the year/model axes",
                zostoga.dim(),
                (years.len(), models.len())
            )));
        }
        Ok(Self {
            years,
            models,
            locations,
            zos,
            zostoga,
        })
    }
}

/// Options for the ocean-dynamics fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitOptions {
    /// Remove the linear drift of the ensemble mean before computing
    /// statistics.
    pub drift_correction: bool,
    /// Estimate the correlation with thermal expansion. When false every
    /// correlation coefficient is zero and the combiner computes no
    /// cross-term.
    pub correlation: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            drift_correction: true,
            correlation: true,
        }
    }
}

/// Regression statistics per (year, location), the hand-off between the
/// ocean-dynamics fit and the sample combiner. Read-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OceanDynamicsFitRecord {
    pub years: Vec<u32>,
    pub locations: Vec<Location>,
    /// Ensemble mean, indexed by (year, location).
    pub mean: Array2<f64>,
    /// Ensemble population standard deviation, indexed by (year, location).
    pub std: Array2<f64>,
    /// Correlation with thermal expansion, in [-1, 1].
    pub tecorr: Array2<f64>,
    /// Degrees of freedom of the Student's-t uncertainty model: one less
    /// than the number of models contributing at that cell.
    pub dof: Array2<f64>,
}

impl OceanDynamicsFitRecord {
    /// Indices of `target_years` on this record's year axis.
    ///
    /// The record's years must be a superset of the target grid; a missing
    /// year is a [`SterodynError::DataShape`].
    pub fn year_indices(&self, target_years: &[u32]) -> SterodynResult<Vec<usize>> {
        target_years
            .iter()
            .map(|&year| {
                self.years.iter().position(|&y| y == year).ok_or_else(|| {
                    SterodynError::DataShape(format!(
                        "target year {year} is not on the ocean-dynamics fit year axis"
                    ))
                })
            })
            .collect()
    }
}

/// Fit one [`OceanDynamicsFitRecord`] from the multi-model ensemble.
pub fn fit_ocean_dynamics(
    ensemble: &OceanDynamicsEnsemble,
    options: FitOptions,
) -> SterodynResult<OceanDynamicsFitRecord> {
    if ensemble.models.is_empty() {
        return Err(SterodynError::DegenerateDistribution(
            "cannot fit ocean dynamics from an empty model ensemble".to_string(),
        ));
    }
    // The fields are public, so a hand-built ensemble can bypass `new`.
    if ensemble.years.is_empty() {
        return Err(SterodynError::DataShape(
            "ocean-dynamics ensemble has an empty year axis".to_string(),
        ));
    }

    let zos = if options.drift_correction {
        remove_ensemble_drift(ensemble)
    } else {
        ensemble.zos.clone()
    };

    let (n_years, n_models, n_locations) = zos.dim();
    let mut mean = Array2::zeros((n_years, n_locations));
    let mut std = Array2::zeros((n_years, n_locations));
    let mut tecorr = Array2::zeros((n_years, n_locations));
    let mut dof = Array2::zeros((n_years, n_locations));

    let mut gap_cells = 0usize;
    for y in 0..n_years {
        for l in 0..n_locations {
            let values: Vec<f64> = (0..n_models)
                .map(|m| zos[[y, m, l]])
                .filter(|v| v.is_finite())
                .collect();

            let n = values.len();
            if n < n_models {
                gap_cells += 1;
            }
            // Fewer contributing models propagate to a lower dof; a cell
            // with no usable spread surfaces later, if and only if it is
            // actually sampled.
            dof[[y, l]] = n as f64 - 1.0;
            if n == 0 {
                mean[[y, l]] = f64::NAN;
                std[[y, l]] = f64::NAN;
                continue;
            }

            let m = values.iter().sum::<f64>() / n as f64;
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
            mean[[y, l]] = m;
            std[[y, l]] = var.sqrt();

            if options.correlation {
                let pairs: Vec<(f64, f64)> = (0..n_models)
                    .filter_map(|mi| {
                        let a = zos[[y, mi, l]];
                        let b = ensemble.zostoga[[y, mi]];
                        (a.is_finite() && b.is_finite()).then_some((a, b))
                    })
                    .collect();
                tecorr[[y, l]] = pearson(&pairs);
            }
        }
    }

    if gap_cells > 0 {
        warn!(
            "{gap_cells} of {} fit cells have missing-model gaps; degrees of freedom lowered",
            n_years * n_locations
        );
    }
    debug!(
        "fitted ocean dynamics over {} years x {} locations from {} models",
        n_years, n_locations, n_models
    );

    Ok(OceanDynamicsFitRecord {
        years: ensemble.years.clone(),
        locations: ensemble.locations.clone(),
        mean,
        std,
        tecorr,
        dof,
    })
}

/// Subtract, per location, the linear trend of the ensemble-mean timeseries
/// from every member, so the ensemble mean has zero long-term drift.
///
/// Only the slope is removed; the intercept stays so that anomalies keep
/// their reference level.
fn remove_ensemble_drift(ensemble: &OceanDynamicsEnsemble) -> Array3<f64> {
    let (n_years, n_models, n_locations) = ensemble.zos.dim();
    let mut corrected = ensemble.zos.clone();
    let t0 = ensemble.years[0] as f64;

    for l in 0..n_locations {
        let points: Vec<(f64, f64)> = (0..n_years)
            .filter_map(|y| {
                let values: Vec<f64> = (0..n_models)
                    .map(|m| ensemble.zos[[y, m, l]])
                    .filter(|v| v.is_finite())
                    .collect();
                (!values.is_empty()).then(|| {
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    (ensemble.years[y] as f64 - t0, mean)
                })
            })
            .collect();

        let slope = linear_slope(&points);
        for y in 0..n_years {
            let dt = ensemble.years[y] as f64 - t0;
            for m in 0..n_models {
                corrected[[y, m, l]] -= slope * dt;
            }
        }
    }

    corrected
}

/// Ordinary least-squares slope through `(x, y)` points. Zero when fewer
/// than two points or no spread in x.
fn linear_slope(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum::<f64>();
    if sxx == 0.0 {
        return 0.0;
    }
    let sxy = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>();
    sxy / sxx
}

/// Pearson correlation over paired samples, clamped to [-1, 1]. Zero when
/// fewer than two pairs or either side has no variance.
fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in pairs {
        cov += (a - mean_a) * (b - mean_b);
        var_a += (a - mean_a).powi(2);
        var_b += (b - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}
