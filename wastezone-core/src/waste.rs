//! Per-capita waste generation.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, WasteConfig};
use crate::model::Fraction;
use crate::zone::ZoneAttributes;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
/// Per-request overrides of the waste model.
pub struct WasteOptions {
    /// Replaces the table's base rate, in kg per person per day.
    pub custom_rate_kg: Option<f64>,
    /// Replaces the configured seasonal factor.
    pub seasonal_factor: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Origin of the base rate.
pub enum RateSource {
    /// Looked up in the zone type × density table.
    Table,
    /// Supplied with the request.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Weekly mass of one waste fraction.
pub struct FractionMass {
    /// Waste fraction.
    pub fraction: Fraction,
    /// Share of total mass.
    pub share: f64,
    /// Mass per week.
    pub weekly_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Projected waste output of a zone.
pub struct WasteProfile {
    /// Mass per day.
    pub daily_kg: f64,
    /// Mass per week including the seasonal factor.
    pub weekly_kg: f64,
    /// Mass per average month.
    pub monthly_kg: f64,
    /// Effective kg per person per day after the income multiplier.
    pub per_capita_kg: f64,
    /// Base kg per person per day selected by zone type and settlement density.
    pub density_factor: f64,
    /// Income multiplier applied to the base rate.
    pub socioeconomic_multiplier: f64,
    /// Seasonal factor applied to weekly mass.
    pub seasonal_factor: f64,
    /// Where the base rate came from.
    pub rate_source: RateSource,
    /// Weekly mass per fraction.
    pub composition: Vec<FractionMass>,
}

/// Converts a population into waste mass using the configured rate tables.
#[derive(Debug, Clone, Copy)]
pub struct WasteGenerationModel<'cfg> {
    config: &'cfg WasteConfig,
}

impl<'cfg> WasteGenerationModel<'cfg> {
    /// Model bound to the given tables.
    #[must_use]
    pub fn new(config: &'cfg WasteConfig) -> Self {
        Self { config }
    }

    /// Project the waste of `population` residents.
    ///
    /// A population of zero yields a zero profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRate`] when the table lacks the zone's cell, and
    /// [`ConfigError::Invalid`] for a negative population, custom rate, or a non-positive
    /// seasonal factor.
    pub fn project(
        &self,
        population: f64,
        attributes: ZoneAttributes,
        options: WasteOptions,
    ) -> Result<WasteProfile, ConfigError> {
        if !population.is_finite() || population < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "population must be a non-negative number, got {population}"
            )));
        }

        let (density_factor, rate_source) = match options.custom_rate_kg {
            Some(rate) if rate.is_finite() && rate >= 0.0 => (rate, RateSource::Custom),
            Some(rate) => {
                return Err(ConfigError::Invalid(format!(
                    "custom waste rate must be non-negative, got {rate}"
                )));
            }
            None => (
                self.config
                    .rate(attributes.zone_type, attributes.settlement_density)?,
                RateSource::Table,
            ),
        };

        let seasonal_factor = options.seasonal_factor.unwrap_or(self.config.seasonal_factor);
        if !seasonal_factor.is_finite() || seasonal_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "seasonal factor must be positive, got {seasonal_factor}"
            )));
        }

        let socioeconomic_multiplier = self
            .config
            .socioeconomic_multipliers
            .get(attributes.socioeconomic_level);
        let per_capita_kg = density_factor * socioeconomic_multiplier;
        let daily_kg = population * per_capita_kg;
        let weekly_kg = daily_kg * 7.0 * seasonal_factor;

        let composition = self
            .config
            .composition
            .iter()
            .map(|part| FractionMass {
                fraction: part.fraction.clone(),
                share: part.share,
                weekly_kg: weekly_kg * part.share,
            })
            .collect();

        log::debug!(
            "Waste for {population} people ({}/{}): {daily_kg:.1} kg/day, {weekly_kg:.1} kg/week",
            attributes.zone_type,
            attributes.settlement_density
        );

        Ok(WasteProfile {
            daily_kg,
            weekly_kg,
            monthly_kg: weekly_kg * 52.0 / 12.0,
            per_capita_kg,
            density_factor,
            socioeconomic_multiplier,
            seasonal_factor,
            rate_source,
            composition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SettlementDensity, SocioeconomicLevel, ZoneType};

    #[test]
    fn mixed_use_medium_scenario() {
        let config = WasteConfig::default();
        let profile = WasteGenerationModel::new(&config)
            .project(
                1000.0,
                ZoneAttributes::new(ZoneType::MixedUse, SettlementDensity::Medium),
                WasteOptions::default(),
            )
            .expect("profile");
        assert!((profile.daily_kg - 500.0).abs() < 1e-9);
        assert!((profile.weekly_kg - 3500.0).abs() < 1e-9);
        assert_eq!(profile.rate_source, RateSource::Table);
        let composed: f64 = profile.composition.iter().map(|part| part.weekly_kg).sum();
        assert!((composed - 3500.0).abs() < 1e-6);
    }

    #[test]
    fn zero_population_produces_no_waste() {
        let config = WasteConfig::default();
        let model = WasteGenerationModel::new(&config);
        for zone_type in ZoneType::ALL {
            for density in SettlementDensity::ALL {
                for level in SocioeconomicLevel::ALL {
                    let attributes =
                        ZoneAttributes::new(zone_type, density).with_socioeconomic_level(level);
                    let profile = model
                        .project(0.0, attributes, WasteOptions::default())
                        .expect("profile");
                    assert!(profile.daily_kg.abs() < f64::EPSILON, "{attributes:?}");
                    assert!(profile.weekly_kg.abs() < f64::EPSILON, "{attributes:?}");
                }
            }
        }
    }

    #[test]
    fn income_and_season_scale_output() {
        let config = WasteConfig::default();
        let model = WasteGenerationModel::new(&config);
        let attributes = ZoneAttributes::new(ZoneType::Residential, SettlementDensity::Medium)
            .with_socioeconomic_level(SocioeconomicLevel::High);
        let profile = model
            .project(
                200.0,
                attributes,
                WasteOptions {
                    custom_rate_kg: None,
                    seasonal_factor: Some(1.2),
                },
            )
            .expect("profile");
        // 200 * 0.45 * 1.4
        assert!((profile.daily_kg - 126.0).abs() < 1e-9);
        assert!((profile.weekly_kg - 126.0 * 7.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn custom_rate_replaces_table() {
        let config = WasteConfig::default();
        let profile = WasteGenerationModel::new(&config)
            .project(
                100.0,
                ZoneAttributes::new(ZoneType::Commercial, SettlementDensity::High),
                WasteOptions {
                    custom_rate_kg: Some(2.0),
                    seasonal_factor: None,
                },
            )
            .expect("profile");
        assert!((profile.daily_kg - 200.0).abs() < 1e-9);
        assert_eq!(profile.rate_source, RateSource::Custom);
    }

    #[test]
    fn missing_rate_is_a_configuration_error() {
        let config = WasteConfig {
            rates: Vec::new(),
            ..WasteConfig::default()
        };
        let result = WasteGenerationModel::new(&config).project(
            10.0,
            ZoneAttributes::new(ZoneType::Institutional, SettlementDensity::Low),
            WasteOptions::default(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::MissingRate {
                zone_type: ZoneType::Institutional,
                density: SettlementDensity::Low
            })
        ));
    }

    #[test]
    fn rejects_negative_population() {
        let config = WasteConfig::default();
        let result = WasteGenerationModel::new(&config).project(
            -1.0,
            ZoneAttributes::new(ZoneType::Residential, SettlementDensity::Low),
            WasteOptions::default(),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
