//! Monthly billing revenue projection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{BillingTier, ConfigError, RevenueConfig};
use crate::model::SettlementDensity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Settlement classification used to pick a billing tier.
pub enum SettlementClass {
    /// Small unplanned dwellings, moderate density.
    InformalMediumDensity,
    /// Small unplanned dwellings, dense.
    InformalHighDensity,
    /// Planned housing, moderate density.
    FormalMediumDensity,
    /// Planned housing, dense.
    FormalHighDensity,
    /// Neither clearly formal nor informal.
    Mixed,
}

impl SettlementClass {
    /// Classification implied by a zone's settlement density when no buildings were seen.
    #[must_use]
    pub fn from_density(density: SettlementDensity) -> Self {
        match density {
            SettlementDensity::Informal => SettlementClass::InformalMediumDensity,
            SettlementDensity::High => SettlementClass::FormalHighDensity,
            SettlementDensity::Medium | SettlementDensity::Low => {
                SettlementClass::FormalMediumDensity
            }
        }
    }

    fn tier<'cfg>(self, config: &'cfg RevenueConfig) -> &'cfg BillingTier {
        match self {
            SettlementClass::InformalMediumDensity | SettlementClass::InformalHighDensity => {
                &config.informal
            }
            SettlementClass::FormalMediumDensity | SettlementClass::FormalHighDensity => {
                &config.formal
            }
            SettlementClass::Mixed => &config.mixed,
        }
    }
}

impl fmt::Display for SettlementClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            SettlementClass::InformalMediumDensity => "informal_medium_density",
            SettlementClass::InformalHighDensity => "informal_high_density",
            SettlementClass::FormalMediumDensity => "formal_medium_density",
            SettlementClass::FormalHighDensity => "formal_high_density",
            SettlementClass::Mixed => "mixed",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Qualitative revenue outlook.
pub enum RevenuePotential {
    /// No billable buildings.
    None,
    /// Below the low threshold.
    Low,
    /// Below the medium threshold.
    Medium,
    /// At or above the medium threshold.
    High,
}

impl fmt::Display for RevenuePotential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            RevenuePotential::None => "none",
            RevenuePotential::Low => "low",
            RevenuePotential::Medium => "medium",
            RevenuePotential::High => "high",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Where the building count came from.
pub enum BuildingCountSource {
    /// Counted from detected footprints.
    Detected,
    /// Derived from the consensus population.
    Estimated,
    /// Supplied with the request.
    Provided,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Expected monthly billing revenue of a zone.
pub struct RevenueProjection {
    /// Billable buildings.
    pub building_count: u32,
    /// Origin of `building_count`.
    pub building_count_source: BuildingCountSource,
    /// Settlement classification behind the tier.
    pub settlement_class: SettlementClass,
    /// Flat monthly rate per building.
    pub rate_per_building: f64,
    /// Fraction of accounts expected to pay.
    pub collection_efficiency: f64,
    /// Revenue if every account paid.
    pub monthly_revenue_max: f64,
    /// Revenue after collection efficiency.
    pub monthly_revenue_realistic: f64,
    /// Twelve realistic months.
    pub annual_revenue_realistic: f64,
    /// Qualitative outlook.
    pub revenue_potential: RevenuePotential,
}

/// Projects billing revenue from building counts.
#[derive(Debug, Clone, Copy)]
pub struct RevenueProjector<'cfg> {
    config: &'cfg RevenueConfig,
}

impl<'cfg> RevenueProjector<'cfg> {
    /// Projector bound to the configured tiers.
    #[must_use]
    pub fn new(config: &'cfg RevenueConfig) -> Self {
        Self { config }
    }

    /// Classify a settlement from its building density and mean footprint size.
    #[must_use]
    pub fn classify(
        &self,
        building_count: u32,
        area_km2: f64,
        mean_footprint_sqm: f64,
    ) -> SettlementClass {
        let per_km2 = if area_km2 > 0.0 {
            f64::from(building_count) / area_km2
        } else {
            0.0
        };
        let dense = per_km2 >= self.config.high_density_buildings_per_km2;

        if mean_footprint_sqm < self.config.informal_max_footprint_sqm {
            if dense {
                SettlementClass::InformalHighDensity
            } else {
                SettlementClass::InformalMediumDensity
            }
        } else if mean_footprint_sqm > self.config.formal_min_footprint_sqm {
            if dense {
                SettlementClass::FormalHighDensity
            } else {
                SettlementClass::FormalMediumDensity
            }
        } else {
            SettlementClass::Mixed
        }
    }

    /// Project monthly revenue.
    ///
    /// `efficiency` overrides the tier's collection efficiency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the efficiency is outside `0..=1`.
    pub fn project(
        &self,
        building_count: u32,
        building_count_source: BuildingCountSource,
        settlement_class: SettlementClass,
        efficiency: Option<f64>,
    ) -> Result<RevenueProjection, ConfigError> {
        let tier = settlement_class.tier(self.config);
        let collection_efficiency = efficiency.unwrap_or(tier.collection_efficiency);
        if !(0.0..=1.0).contains(&collection_efficiency) {
            return Err(ConfigError::Invalid(format!(
                "collection efficiency must be within 0..=1, got {collection_efficiency}"
            )));
        }

        let monthly_revenue_max = f64::from(building_count) * tier.rate_per_building;
        let monthly_revenue_realistic = monthly_revenue_max * collection_efficiency;

        let revenue_potential = if building_count == 0 {
            RevenuePotential::None
        } else if monthly_revenue_realistic < self.config.low_potential_below {
            RevenuePotential::Low
        } else if monthly_revenue_realistic < self.config.medium_potential_below {
            RevenuePotential::Medium
        } else {
            RevenuePotential::High
        };

        Ok(RevenueProjection {
            building_count,
            building_count_source,
            settlement_class,
            rate_per_building: tier.rate_per_building,
            collection_efficiency,
            monthly_revenue_max,
            monthly_revenue_realistic,
            annual_revenue_realistic: monthly_revenue_realistic * 12.0,
            revenue_potential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formal_medium_density_scenario() {
        let config = RevenueConfig::default();
        let projection = RevenueProjector::new(&config)
            .project(
                100,
                BuildingCountSource::Detected,
                SettlementClass::FormalMediumDensity,
                Some(0.75),
            )
            .expect("projection");
        assert!((projection.rate_per_building - 150.0).abs() < f64::EPSILON);
        assert!((projection.monthly_revenue_max - 15_000.0).abs() < 1e-9);
        assert!((projection.monthly_revenue_realistic - 11_250.0).abs() < 1e-9);
        assert_eq!(projection.revenue_potential, RevenuePotential::Medium);
    }

    #[test]
    fn no_buildings_means_no_revenue() {
        let config = RevenueConfig::default();
        let projection = RevenueProjector::new(&config)
            .project(0, BuildingCountSource::Detected, SettlementClass::Mixed, None)
            .expect("projection");
        assert!(projection.monthly_revenue_realistic.abs() < f64::EPSILON);
        assert_eq!(projection.revenue_potential, RevenuePotential::None);
        let rendered = toml::to_string(&projection).expect("projection serializes");
        assert!(rendered.contains("revenue_potential = \"none\""));
    }

    #[test]
    fn tiers_follow_classification() {
        let config = RevenueConfig::default();
        let projector = RevenueProjector::new(&config);
        let rate = |class| {
            projector
                .project(10, BuildingCountSource::Provided, class, None)
                .map(|projection| projection.rate_per_building)
                .unwrap_or_default()
        };
        assert!((rate(SettlementClass::FormalHighDensity) - 150.0).abs() < f64::EPSILON);
        assert!((rate(SettlementClass::Mixed) - 90.0).abs() < f64::EPSILON);
        assert!((rate(SettlementClass::InformalHighDensity) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn classifies_by_size_and_density() {
        let config = RevenueConfig::default();
        let projector = RevenueProjector::new(&config);
        assert_eq!(
            projector.classify(4000, 1.0, 35.0),
            SettlementClass::InformalHighDensity
        );
        assert_eq!(
            projector.classify(300, 1.0, 45.0),
            SettlementClass::InformalMediumDensity
        );
        assert_eq!(
            projector.classify(800, 1.0, 200.0),
            SettlementClass::FormalMediumDensity
        );
        assert_eq!(projector.classify(800, 1.0, 90.0), SettlementClass::Mixed);
    }

    #[test]
    fn rejects_efficiency_above_one() {
        let config = RevenueConfig::default();
        let result = RevenueProjector::new(&config).project(
            5,
            BuildingCountSource::Provided,
            SettlementClass::Mixed,
            Some(1.2),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
