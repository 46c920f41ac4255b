//! Skill-based clipping of the GCM ensemble and fitting of the
//! thermal-expansion coefficient distribution.
//!
//! The multi-model ensemble supplies one expansion coefficient and one skill
//! score (RMSE of modelled against observed surface temperature) per model.
//! Poorly performing models are trimmed from the tail of the skill
//! distribution before a normal distribution is fitted to the surviving
//! expansion coefficients.

use crate::errors::{SterodynError, SterodynResult};
use log::debug;
use serde::{Deserialize, Serialize};

/// One model's entry in an ensemble table: an identifier and a value.
///
/// Immutable once loaded; the same shape carries both the skill-score table
/// and the expansion-coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub model: String,
    pub value: f64,
}

impl EnsembleMember {
    pub fn new(model: impl Into<String>, value: f64) -> Self {
        Self {
            model: model.into(),
            value,
        }
    }
}

/// The models retained after rank-based skill clipping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClippedEnsemble {
    /// Identifiers of the retained models, in ascending skill-score order.
    pub models: Vec<String>,
    /// The cumulative-probability cutoff that produced this subset.
    pub pb_clip: f64,
}

impl ClippedEnsemble {
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Normal distribution fitted to the clipped ensemble's expansion
/// coefficients, together with the retained model identifiers and the clip
/// threshold used. Created once per fitting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionDistribution {
    pub mean: f64,
    pub std: f64,
    pub include_models: Vec<String>,
    pub pb_clip: f64,
}

/// Retain the models whose rank in the RMSE-sorted order falls at or below
/// the `pb_clip`-quantile position.
///
/// Clipping is rank-based, not value-based: model `k` (one-based rank in the
/// stable ascending sort by RMSE) is retained when `k / N <= pb_clip`, so the
/// retained count is `floor(pb_clip * N)`. Ties keep their input order.
pub fn clip_by_skill(rmses: &[EnsembleMember], pb_clip: f64) -> SterodynResult<ClippedEnsemble> {
    if rmses.is_empty() {
        return Err(SterodynError::DegenerateDistribution(
            "cannot clip an empty ensemble".to_string(),
        ));
    }
    if !(pb_clip > 0.0 && pb_clip <= 1.0) {
        return Err(SterodynError::Configuration(format!(
            "clip probability must lie in (0, 1], got {pb_clip}"
        )));
    }

    let mut sorted: Vec<&EnsembleMember> = rmses.iter().collect();
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let n = sorted.len();
    let models = sorted
        .iter()
        .enumerate()
        .take_while(|(idx, _)| (idx + 1) as f64 / n as f64 <= pb_clip)
        .map(|(_, member)| member.model.clone())
        .collect::<Vec<_>>();

    debug!(
        "skill clipping retained {}/{} models at pb_clip={}",
        models.len(),
        n,
        pb_clip
    );

    Ok(ClippedEnsemble { models, pb_clip })
}

/// Fit a normal distribution to the expansion coefficients of the models
/// retained by [`clip_by_skill`].
///
/// The spread is the population standard deviation of the restricted set.
/// Fewer than two surviving coefficients leave the spread undefined, which
/// is surfaced as a [`SterodynError::DegenerateDistribution`] rather than
/// silently reported as zero.
pub fn fit_expansion_distribution(
    expcoefs: &[EnsembleMember],
    clipped: &ClippedEnsemble,
) -> SterodynResult<ExpansionDistribution> {
    let retained: Vec<f64> = expcoefs
        .iter()
        .filter(|member| clipped.contains(&member.model))
        .map(|member| member.value)
        .collect();

    if retained.is_empty() {
        return Err(SterodynError::DegenerateDistribution(
            "no expansion coefficients survive the skill clip".to_string(),
        ));
    }
    if retained.len() < 2 {
        return Err(SterodynError::DegenerateDistribution(
            "a single surviving expansion coefficient leaves the spread undefined".to_string(),
        ));
    }

    let n = retained.len() as f64;
    let mean = retained.iter().sum::<f64>() / n;
    let variance = retained.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Ok(ExpansionDistribution {
        mean,
        std: variance.sqrt(),
        include_models: clipped.models.clone(),
        pb_clip: clipped.pb_clip,
    })
}
