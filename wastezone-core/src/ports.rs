//! Traits describing the external geospatial providers and their payloads.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};

use crate::model::LonLat;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum ProviderError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The call did not finish within its time budget.
    #[error("Timed out after {0} s")]
    Timeout(u64),
    /// The provider answered with something that could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The provider has no data covering the request.
    #[error("No coverage for the requested area")]
    NoCoverage,
}

impl ProviderError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Sum of a population raster over a zone.
pub struct GriddedPopulation {
    /// Total population of all sampled pixels.
    pub total_population: f64,
    /// Number of raster pixels inside the zone, possibly estimated from its area.
    pub pixel_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A detected building outline.
pub struct BuildingFootprint {
    /// Roof area in square metres.
    pub area_sqm: f64,
    /// Detector confidence in `0..=1`.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// One-way road travel between two points.
pub struct RouteDistance {
    /// Road distance in kilometres.
    pub distance_km: f64,
    /// Travel time in minutes.
    pub duration_min: f64,
}

#[async_trait]
/// Provider of gridded population rasters.
pub trait GriddedPopulationProvider: Send + Sync {
    /// Short name used in logs and audit entries.
    fn name(&self) -> &str;

    /// Sum the population raster over the zone ring for the given year.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the provider request fails.
    async fn query(&self, ring: &[LonLat], year: i32) -> Result<GriddedPopulation, ProviderError>;
}

#[async_trait]
/// Provider of building footprints.
pub trait BuildingFootprintProvider: Send + Sync {
    /// Short name used in logs and audit entries.
    fn name(&self) -> &str;

    /// List footprints inside the zone ring with at least the given detection confidence.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the provider request fails.
    async fn query(
        &self,
        ring: &[LonLat],
        confidence_threshold: f64,
    ) -> Result<Vec<BuildingFootprint>, ProviderError>;
}

#[async_trait]
/// Provider of road distances.
pub trait RoutingDistanceProvider: Send + Sync {
    /// Short name used in logs and audit entries.
    fn name(&self) -> &str;

    /// Road distance and travel time from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the provider request fails or finds no route.
    async fn query(
        &self,
        origin: LonLat,
        destination: LonLat,
    ) -> Result<RouteDistance, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retried() {
        assert!(ProviderError::Timeout(5).is_retryable());
        assert!(!ProviderError::NoCoverage.is_retryable());
        assert!(!ProviderError::InvalidResponse("bad".to_owned()).is_retryable());
    }
}
