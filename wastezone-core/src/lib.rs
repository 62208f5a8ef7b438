//! Core models and analysis pipeline for estimating the population, waste output and
//! collection fleet of a user-drawn zone.

/// Explicit query caches owned by provider adapters.
pub mod cache;
/// Business parameters and their TOML loading.
pub mod config;
/// Merging of independent population estimates into one figure.
pub mod consensus;
/// Truck fleet and collection frequency optimisation.
pub mod fleet;
/// Planar measurements of zone polygons.
pub mod geometry;
/// Shared enumerations and small value types.
pub mod model;
/// Normalisation of raw population signals into comparable estimates.
pub mod population;
/// Traits describing the external data providers.
pub mod ports;
/// Bundle of optional providers handed to the service.
pub mod providers;
/// Monthly billing revenue projection.
pub mod revenue;
/// High-level "analyze zone" pipeline.
pub mod service;
/// Per-capita waste generation model.
pub mod waste;
/// Validated zone value object.
pub mod zone;

pub use cache::*;
pub use config::*;
pub use consensus::*;
pub use fleet::*;
pub use geometry::*;
pub use model::*;
pub use population::*;
pub use ports::*;
pub use providers::*;
pub use revenue::*;
pub use service::*;
pub use waste::*;
pub use zone::*;
