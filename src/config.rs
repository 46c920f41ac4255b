//! Run configuration for a projection.
//!
//! All knobs of the pipeline live in [`ProjectionConfig`]. Values are
//! validated up front so that invalid settings are rejected before any
//! computation starts, and the defaults reproduce the standard workflow
//! configuration.

use crate::errors::{SterodynError, SterodynResult};
use serde::{Deserialize, Serialize};

fn default_scenario() -> String {
    "ssp585".to_string()
}

fn default_pb_clip() -> f64 {
    0.85
}

fn default_gcm_probscale() -> f64 {
    0.833
}

fn default_baseyear() -> u32 {
    2000
}

fn default_pyear_start() -> u32 {
    2020
}

fn default_pyear_end() -> u32 {
    2300
}

fn default_pyear_step() -> u32 {
    10
}

fn default_nsamps() -> usize {
    20000
}

fn default_seed() -> u64 {
    1234
}

fn default_chunksize() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Configuration for one projection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// SSP scenario (e.g. "ssp585") or temperature target (e.g. "tlim2.0win0.25").
    #[serde(default = "default_scenario")]
    pub scenario: String,

    /// Scenario used for the dynamic sea-level ensemble. Falls back to
    /// `scenario` when unset.
    #[serde(default)]
    pub scenario_dsl: Option<String>,

    /// Base year to which projections are centered.
    #[serde(default = "default_baseyear")]
    pub baseyear: u32,

    /// First year for which projections are produced.
    #[serde(default = "default_pyear_start")]
    pub pyear_start: u32,

    /// Last year for which projections are produced (inclusive).
    #[serde(default = "default_pyear_end")]
    pub pyear_end: u32,

    /// Step size in years between projection years.
    #[serde(default = "default_pyear_step")]
    pub pyear_step: u32,

    /// Number of Monte Carlo samples to generate.
    #[serde(default = "default_nsamps")]
    pub nsamps: usize,

    /// Seed value for the random number generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of locations to process at a time.
    #[serde(default = "default_chunksize")]
    pub chunksize: usize,

    /// Cumulative probability at which to trim the distribution of models
    /// by skill score.
    #[serde(default = "default_pb_clip")]
    pub pb_clip: f64,

    /// Probability coverage of the GCM ensemble, relative to the 90%-range
    /// convention of the workflow.
    #[serde(default = "default_gcm_probscale")]
    pub gcm_probscale: f64,

    /// Estimate the correlation between ocean dynamics and thermal
    /// expansion. When false, the correlation is treated as zero and no
    /// cross-term is computed.
    #[serde(default = "default_true")]
    pub correlation: bool,

    /// Remove the linear drift of the ensemble mean before fitting the
    /// ocean-dynamics statistics.
    #[serde(default = "default_true")]
    pub drift_correction: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
            scenario_dsl: None,
            baseyear: default_baseyear(),
            pyear_start: default_pyear_start(),
            pyear_end: default_pyear_end(),
            pyear_step: default_pyear_step(),
            nsamps: default_nsamps(),
            seed: default_seed(),
            chunksize: default_chunksize(),
            pb_clip: default_pb_clip(),
            gcm_probscale: default_gcm_probscale(),
            correlation: default_true(),
            drift_correction: default_true(),
        }
    }
}

impl ProjectionConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml(content: &str) -> SterodynResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SterodynError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Scenario for the dynamic sea-level ensemble, defaulting to the
    /// primary scenario when none was configured.
    pub fn scenario_dsl(&self) -> &str {
        self.scenario_dsl.as_deref().unwrap_or(&self.scenario)
    }

    /// The target-year grid, `pyear_start..=pyear_end` in steps of `pyear_step`.
    pub fn target_years(&self) -> Vec<u32> {
        (self.pyear_start..=self.pyear_end)
            .step_by(self.pyear_step as usize)
            .collect()
    }

    /// Check all scalar settings, rejecting anything the pipeline cannot
    /// run with.
    pub fn validate(&self) -> SterodynResult<()> {
        if !(self.pb_clip > 0.0 && self.pb_clip <= 1.0) {
            return Err(SterodynError::Configuration(format!(
                "clip probability must lie in (0, 1], got {}",
                self.pb_clip
            )));
        }
        // The thermal-expansion scale divides by norm_ppf(gcm_probscale),
        // which must be finite and positive.
        if !(self.gcm_probscale > 0.5 && self.gcm_probscale < 1.0) {
            return Err(SterodynError::Configuration(format!(
                "GCM probability scale must lie in (0.5, 1), got {}",
                self.gcm_probscale
            )));
        }
        if self.nsamps == 0 {
            return Err(SterodynError::Configuration(
                "sample count must be positive".to_string(),
            ));
        }
        if self.chunksize == 0 {
            return Err(SterodynError::Configuration(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.pyear_step == 0 {
            return Err(SterodynError::Configuration(
                "projection year step must be positive".to_string(),
            ));
        }
        if self.pyear_end < self.pyear_start {
            return Err(SterodynError::Configuration(format!(
                "projection years end ({}) before they start ({})",
                self.pyear_end, self.pyear_start
            )));
        }
        Ok(())
    }
}
