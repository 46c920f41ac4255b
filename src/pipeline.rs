//! End-to-end composition of the projection stages.
//!
//! Stages run strictly in order, leaves first: skill clipping, distribution
//! fitting, quantile generation, thermal-expansion projection, and the final
//! combination with the ocean-dynamics fit. Each stage owns and returns new
//! data; nothing is mutated after hand-off. File I/O happens outside this
//! crate: callers load the input tables and ensembles from their persisted
//! form and serialize the returned datasets themselves.

use crate::combine::{combine_contributions, CombineSettings, JointSamples};
use crate::config::ProjectionConfig;
use crate::ensemble::{clip_by_skill, fit_expansion_distribution, EnsembleMember};
use crate::errors::SterodynResult;
use crate::ocean_dynamics::{fit_ocean_dynamics, FitOptions, OceanDynamicsEnsemble};
use crate::quantiles::QuantileAssignment;
use crate::thermal::{project_thermal_expansion, OhcSamples, ThermalExpansionSamples};
use log::info;

/// Everything the pipeline consumes, as loaded by external collaborators.
#[derive(Debug, Clone)]
pub struct ProjectionInputs {
    /// Per-model skill scores (RMSE against observed surface temperature).
    pub rmses: Vec<EnsembleMember>,
    /// Per-model thermal-expansion coefficients.
    pub expcoefs: Vec<EnsembleMember>,
    /// Ocean-heat-content sample trajectories from the 2-layer model
    /// adapter, keyed by the primary scenario.
    pub ohc: OhcSamples,
    /// Multi-model ocean-dynamics ensemble, keyed by the dynamic sea-level
    /// scenario (which falls back to the primary scenario when unset).
    pub ocean_dynamics: OceanDynamicsEnsemble,
}

/// Both pipeline outputs: the joint local dataset for persistence and the
/// intermediate thermal-expansion samples handed onward for reuse.
#[derive(Debug, Clone)]
pub struct ProjectionOutputs {
    pub joint: JointSamples,
    pub thermal_expansion: ThermalExpansionSamples,
}

/// Run the whole pipeline for one scenario.
pub fn run_projection(
    config: &ProjectionConfig,
    inputs: &ProjectionInputs,
) -> SterodynResult<ProjectionOutputs> {
    config.validate()?;

    info!(
        "projecting scenario {} (dynamic sea level: {})",
        config.scenario,
        config.scenario_dsl()
    );

    let clipped = clip_by_skill(&inputs.rmses, config.pb_clip)?;
    let distribution = fit_expansion_distribution(&inputs.expcoefs, &clipped)?;

    // One assignment for the whole run: the permutation is the single source
    // of correlation structure between the two contributions and must not be
    // re-drawn per contribution or per chunk.
    let quantiles = QuantileAssignment::generate(config.nsamps, config.seed)?;

    let target_years = config.target_years();
    let thermal_expansion = project_thermal_expansion(
        &distribution,
        &quantiles,
        &inputs.ohc,
        config.baseyear,
        &target_years,
    )?;

    let od_fit = fit_ocean_dynamics(
        &inputs.ocean_dynamics,
        FitOptions {
            drift_correction: config.drift_correction,
            correlation: config.correlation,
        },
    )?;

    let joint = combine_contributions(
        &od_fit,
        &thermal_expansion,
        &quantiles,
        &CombineSettings {
            gcm_probscale: config.gcm_probscale,
            chunksize: config.chunksize,
            correlation: config.correlation,
            scenario: config.scenario.clone(),
            baseyear: config.baseyear,
        },
    )?;

    Ok(ProjectionOutputs {
        joint,
        thermal_expansion,
    })
}
