use thiserror::Error;

/// Error type for invalid operations.
///
/// The pipeline is deterministic and CPU-bound, so no failure here is
/// transient. Every variant is fatal for the computation that raised it and
/// propagates to the caller unchanged.
#[derive(Error, Debug)]
pub enum SterodynError {
    /// Mismatched year/location grids or sample counts between contributions.
    #[error("Data shape mismatch: {0}")]
    DataShape(String),
    /// A distribution that cannot be sampled from (empty clipped ensemble,
    /// undefined spread, non-positive degrees of freedom).
    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),
    /// Invalid configuration, rejected before any computation starts.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Convenience type for `Result<T, SterodynError>`.
pub type SterodynResult<T> = Result<T, SterodynError>;
