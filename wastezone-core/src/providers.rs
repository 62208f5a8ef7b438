//! Bundle of the optional external providers used by one analysis service.

use std::fmt;
use std::sync::Arc;

use crate::ports::{BuildingFootprintProvider, GriddedPopulationProvider, RoutingDistanceProvider};

/// Providers available to the pipeline. Any of them may be missing; the pipeline then
/// falls back to the next population tier or to local estimates.
#[derive(Clone, Default)]
pub struct ProviderSet {
    /// Gridded population raster backend.
    pub gridded: Option<Arc<dyn GriddedPopulationProvider>>,
    /// Building footprint backend.
    pub footprints: Option<Arc<dyn BuildingFootprintProvider>>,
    /// Road routing backend.
    pub routing: Option<Arc<dyn RoutingDistanceProvider>>,
}

impl ProviderSet {
    /// An empty set; every stage uses its local fallback.
    #[must_use]
    pub fn offline() -> Self {
        Self::default()
    }

    /// Attach a gridded population provider.
    #[must_use]
    pub fn with_gridded(mut self, provider: Arc<dyn GriddedPopulationProvider>) -> Self {
        self.gridded = Some(provider);
        self
    }

    /// Attach a building footprint provider.
    #[must_use]
    pub fn with_footprints(mut self, provider: Arc<dyn BuildingFootprintProvider>) -> Self {
        self.footprints = Some(provider);
        self
    }

    /// Attach a routing provider.
    #[must_use]
    pub fn with_routing(mut self, provider: Arc<dyn RoutingDistanceProvider>) -> Self {
        self.routing = Some(provider);
        self
    }

    /// Names of the attached providers.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let gridded = self.gridded.as_deref().map(GriddedPopulationProvider::name);
        let footprints = self
            .footprints
            .as_deref()
            .map(BuildingFootprintProvider::name);
        let routing = self.routing.as_deref().map(RoutingDistanceProvider::name);
        gridded.into_iter().chain(footprints).chain(routing)
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.names())
            .finish()
    }
}
