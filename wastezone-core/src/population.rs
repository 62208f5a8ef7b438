//! Normalisation of heterogeneous population signals.
//!
//! Each provider speaks its own language (a raster sum, a list of building outlines, or
//! nothing at all). The adapter turns every one of them into a [`SourceOutcome`]: either a
//! comparable [`PopulationEstimate`] or an explicit absence with the reason. Adapters are
//! pure functions of the zone, the provider payload and the configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PopulationConfig;
use crate::model::Confidence;
use crate::ports::{BuildingFootprint, GriddedPopulation, ProviderError};
use crate::zone::Zone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Independent population signals, in priority order.
pub enum SourceKind {
    /// Population raster summed over the zone.
    GriddedCensus,
    /// Detected buildings times residents per building.
    BuildingFootprint,
    /// Zone area times a conservative density.
    AreaDensity,
}

impl SourceKind {
    /// All sources, most trusted first.
    pub const PRIORITY: [SourceKind; 3] = [
        SourceKind::GriddedCensus,
        SourceKind::BuildingFootprint,
        SourceKind::AreaDensity,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            SourceKind::GriddedCensus => "gridded_census",
            SourceKind::BuildingFootprint => "building_footprint",
            SourceKind::AreaDensity => "area_density",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Population figure produced by one source for one analysis run.
pub struct PopulationEstimate {
    /// Source that produced the figure.
    pub source: SourceKind,
    /// Estimated residents, never negative.
    pub estimated_population: f64,
    /// Trust in the figure.
    pub confidence: Confidence,
    /// How the figure was derived.
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// Result of consulting one source.
pub enum SourceOutcome {
    /// The source produced a usable estimate.
    Present(PopulationEstimate),
    /// The source failed, timed out or had nothing to say.
    Absent {
        /// Source that was consulted.
        source: SourceKind,
        /// Why no estimate is available.
        reason: String,
    },
}

impl SourceOutcome {
    /// Absence caused by a provider failure.
    #[must_use]
    pub fn unavailable(source: SourceKind, error: &ProviderError) -> Self {
        SourceOutcome::Absent {
            source,
            reason: error.to_string(),
        }
    }

    /// Absence because no provider is configured for the source.
    #[must_use]
    pub fn not_configured(source: SourceKind) -> Self {
        SourceOutcome::Absent {
            source,
            reason: "no provider configured".to_owned(),
        }
    }

    /// Source this outcome belongs to.
    #[must_use]
    pub fn source(&self) -> SourceKind {
        match self {
            SourceOutcome::Present(estimate) => estimate.source,
            SourceOutcome::Absent { source, .. } => *source,
        }
    }

    /// The estimate, when present.
    #[must_use]
    pub fn estimate(&self) -> Option<&PopulationEstimate> {
        match self {
            SourceOutcome::Present(estimate) => Some(estimate),
            SourceOutcome::Absent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// Buildings that passed the detection threshold.
pub struct FootprintSummary {
    /// Number of qualifying buildings.
    pub count: u32,
    /// Mean roof area of the qualifying buildings.
    pub mean_area_sqm: f64,
}

impl FootprintSummary {
    /// Summarise the footprints at or above `threshold` confidence.
    #[must_use]
    pub fn from_footprints(footprints: &[BuildingFootprint], threshold: f64) -> Self {
        let (count, total_area) = footprints
            .iter()
            .filter(|footprint| footprint.confidence >= threshold)
            .fold((0_u32, 0.0_f64), |(count, area), footprint| {
                (count.saturating_add(1), area + footprint.area_sqm.max(0.0))
            });
        let mean_area_sqm = if count == 0 {
            0.0
        } else {
            total_area / f64::from(count)
        };
        Self {
            count,
            mean_area_sqm,
        }
    }
}

/// Turns provider payloads into population estimates.
#[derive(Debug, Clone, Copy)]
pub struct PopulationSourceAdapter<'cfg> {
    config: &'cfg PopulationConfig,
}

impl<'cfg> PopulationSourceAdapter<'cfg> {
    /// Adapter bound to the given parameters.
    #[must_use]
    pub fn new(config: &'cfg PopulationConfig) -> Self {
        Self { config }
    }

    /// Interpret a gridded census sum.
    ///
    /// A non-positive total is treated as no answer. Confidence is high only when enough
    /// raster pixels fell inside the zone. Providers may estimate the pixel count from the
    /// zone's area, which makes this an area threshold in practice.
    #[must_use]
    pub fn gridded_census(&self, payload: &GriddedPopulation) -> SourceOutcome {
        let total = payload.total_population;
        if !total.is_finite() || total <= 0.0 {
            return SourceOutcome::Absent {
                source: SourceKind::GriddedCensus,
                reason: format!("census raster returned non-positive population {total}"),
            };
        }

        let confidence = if payload.pixel_count >= self.config.min_pixel_count {
            Confidence::High
        } else {
            Confidence::Medium
        };

        SourceOutcome::Present(PopulationEstimate {
            source: SourceKind::GriddedCensus,
            estimated_population: total.round(),
            confidence,
            method: format!(
                "raster sum over ~{} pixels (estimated from area)",
                payload.pixel_count
            ),
        })
    }

    /// Estimate residents from detected buildings.
    #[must_use]
    pub fn building_footprints(
        &self,
        zone: &Zone,
        footprints: &[BuildingFootprint],
    ) -> SourceOutcome {
        let threshold = self.config.effective_confidence_threshold();
        let summary = FootprintSummary::from_footprints(footprints, threshold);
        if summary.count == 0 {
            return SourceOutcome::Absent {
                source: SourceKind::BuildingFootprint,
                reason: format!(
                    "no buildings at or above {threshold:.2} confidence (of {} detected)",
                    footprints.len()
                ),
            };
        }

        let per_building = self
            .config
            .people_per_building
            .get(zone.settlement_density());
        let population = (f64::from(summary.count) * per_building).round();
        if population <= 0.0 {
            return SourceOutcome::Absent {
                source: SourceKind::BuildingFootprint,
                reason: "people per building is zero".to_owned(),
            };
        }

        SourceOutcome::Present(PopulationEstimate {
            source: SourceKind::BuildingFootprint,
            estimated_population: population,
            confidence: Confidence::Medium,
            method: format!(
                "{} buildings x {per_building} people per building ({})",
                summary.count,
                zone.settlement_density()
            ),
        })
    }

    /// Conservative area-times-density estimate. Always available, possibly zero.
    #[must_use]
    pub fn area_density(&self, zone: &Zone) -> SourceOutcome {
        let density = self.config.density_per_km2.get(zone.settlement_density());
        let area_km2 = zone.area_km2();
        SourceOutcome::Present(PopulationEstimate {
            source: SourceKind::AreaDensity,
            estimated_population: (area_km2 * density).round().max(0.0),
            confidence: Confidence::Low,
            method: format!("{area_km2:.3} km2 x {density} people per km2"),
        })
    }
}
