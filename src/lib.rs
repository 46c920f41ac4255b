//! Probabilistic, site-resolved sea-level-rise projections from two
//! physically distinct contributions: global thermal expansion and local
//! ocean-dynamic sea level.
//!
//! The crate is one pluggable contribution module of a larger sea-level
//! assessment framework. Its pipeline clips a climate-model ensemble by
//! skill score, fits a normal distribution to the surviving expansion
//! coefficients, draws reproducible quantile-based Monte Carlo samples for
//! thermal expansion, fits per-location regression statistics for
//! ocean-dynamic sea level, and combines the two contributions through a
//! shared quantile assignment and a Student's-t uncertainty model. Location
//! chunking keeps memory bounded on grids with far more sites than fit in
//! memory at once.
//!
//! Reading and writing persisted formats (NetCDF/HDF5), the CLI surface, and
//! logger setup are external collaborators: the pipeline consumes and
//! returns in-memory datasets only.

pub mod chunking;
pub mod combine;
pub mod config;
pub mod ensemble;
pub mod errors;
pub mod ocean_dynamics;
pub mod pipeline;
pub mod quantiles;
pub mod thermal;

pub use config::ProjectionConfig;
pub use errors::{SterodynError, SterodynResult};
pub use pipeline::{run_projection, ProjectionInputs, ProjectionOutputs};
