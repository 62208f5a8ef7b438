//! Business parameters of the analysis.
//!
//! Every constant the pipeline relies on (people per building, fallback densities, waste
//! rates, truck catalogue, fees, billing tiers) lives here so it can be overridden from a
//! TOML file without touching code. Defaults are the figures observed in production use.

use std::path::Path;
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use toml::de::Error as TomlError;

use crate::fleet::TruckSpec;
use crate::model::{Fraction, SettlementDensity, SocioeconomicLevel, ZoneType};

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading or consulting the configuration.
pub enum ConfigError {
    /// The waste rate table has no row for a zone type and density.
    #[error("No waste rate configured for {zone_type}/{density}")]
    MissingRate {
        /// Zone type that was looked up.
        zone_type: ZoneType,
        /// Settlement density that was looked up.
        density: SettlementDensity,
    },
    /// A parameter is outside its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// The TOML document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] TomlError),
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
/// Complete set of analysis parameters.
pub struct AnalysisConfig {
    /// Zone shape checks.
    pub geometry: GeometryConfig,
    /// Population source and consensus parameters.
    pub population: PopulationConfig,
    /// Waste generation tables.
    pub waste: WasteConfig,
    /// Truck catalogue and cost parameters.
    pub fleet: FleetConfig,
    /// Billing tiers.
    pub revenue: RevenueConfig,
    /// Disposal-site travel fallback.
    pub routing: RoutingConfig,
    /// Provider call limits.
    pub providers: ProviderConfig,
}

impl AnalysisConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and [`ConfigError::Invalid`] when a
    /// value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`AnalysisConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending parameter, or
    /// [`ConfigError::MissingRate`] when a zone type or density has no waste rate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.population.validate()?;
        self.waste.validate()?;
        self.fleet.validate()?;
        self.revenue.validate()?;
        self.routing.validate()?;
        self.providers.validate()?;
        Ok(())
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A value per settlement density.
pub struct DensityTable {
    /// Value for high density.
    pub high: f64,
    /// Value for medium density.
    pub medium: f64,
    /// Value for low density.
    pub low: f64,
    /// Value for informal settlements.
    pub informal: f64,
}

impl DensityTable {
    /// Value for the given density.
    #[must_use]
    pub fn get(&self, density: SettlementDensity) -> f64 {
        match density {
            SettlementDensity::High => self.high,
            SettlementDensity::Medium => self.medium,
            SettlementDensity::Low => self.low,
            SettlementDensity::Informal => self.informal,
        }
    }

    fn all_non_negative(&self) -> bool {
        SettlementDensity::ALL
            .iter()
            .all(|density| self.get(*density).is_finite() && self.get(*density) >= 0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
/// Zone shape checks.
pub struct GeometryConfig {
    /// Compactness below which a zone is flagged as irregular.
    pub irregular_compactness: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            irregular_compactness: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Population source and consensus parameters.
pub struct PopulationConfig {
    /// Census year requested from the gridded population provider.
    pub census_year: i32,
    /// Sampled raster pixels needed for a high-confidence census figure.
    pub min_pixel_count: u32,
    /// Minimum detection confidence of a building footprint.
    pub footprint_confidence_threshold: f64,
    /// Residents per detected building.
    pub people_per_building: DensityTable,
    /// Conservative residents per km² used when no data source answers.
    pub density_per_km2: DensityTable,
    /// Census/footprint ratio above which the two are blended.
    pub disagreement_ratio: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            census_year: 2020,
            min_pixel_count: 10,
            footprint_confidence_threshold: 0.8,
            people_per_building: DensityTable {
                high: 5.0,
                medium: 4.5,
                low: 4.0,
                informal: 6.0,
            },
            density_per_km2: DensityTable {
                high: 2000.0,
                medium: 1250.0,
                low: 600.0,
                informal: 3000.0,
            },
            disagreement_ratio: 2.0,
        }
    }
}

impl PopulationConfig {
    /// Footprint threshold clamped to the supported detector range.
    #[must_use]
    pub fn effective_confidence_threshold(&self) -> f64 {
        self.footprint_confidence_threshold.clamp(0.75, 0.95)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.people_per_building.all_non_negative(), || {
            "population.people_per_building must be non-negative".to_owned()
        })?;
        ensure(self.density_per_km2.all_non_negative(), || {
            "population.density_per_km2 must be non-negative".to_owned()
        })?;
        ensure(self.disagreement_ratio >= 1.0, || {
            format!(
                "population.disagreement_ratio must be at least 1, got {}",
                self.disagreement_ratio
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// One cell of the waste rate table.
pub struct RateEntry {
    /// Zone type of the row.
    pub zone_type: ZoneType,
    /// Settlement density of the column.
    pub density: SettlementDensity,
    /// Waste per person (or employee) per day.
    pub kg_per_person_day: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Multiplier per socioeconomic level.
pub struct SocioeconomicTable {
    /// Low-income multiplier.
    pub low: f64,
    /// Middle-income multiplier.
    pub middle: f64,
    /// High-income multiplier.
    pub high: f64,
}

impl SocioeconomicTable {
    /// Multiplier for the given level.
    #[must_use]
    pub fn get(&self, level: SocioeconomicLevel) -> f64 {
        match level {
            SocioeconomicLevel::Low => self.low,
            SocioeconomicLevel::Middle => self.middle,
            SocioeconomicLevel::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Share of the waste stream belonging to one fraction.
pub struct CompositionShare {
    /// Waste fraction.
    pub fraction: Fraction,
    /// Share of total mass in `0..=1`.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Waste generation tables.
pub struct WasteConfig {
    /// Base rate per zone type and settlement density.
    pub rates: Vec<RateEntry>,
    /// Income multiplier applied to the base rate.
    pub socioeconomic_multipliers: SocioeconomicTable,
    /// Default seasonal factor applied to weekly mass.
    pub seasonal_factor: f64,
    /// Mass split across fractions; shares sum to 1.
    pub composition: Vec<CompositionShare>,
}

impl Default for WasteConfig {
    fn default() -> Self {
        let table: [(ZoneType, [f64; 4]); 6] = [
            (ZoneType::Residential, [0.55, 0.45, 0.35, 0.30]),
            (ZoneType::Commercial, [1.20, 1.00, 0.80, 0.60]),
            (ZoneType::Industrial, [1.50, 1.30, 1.00, 0.80]),
            (ZoneType::Institutional, [0.45, 0.40, 0.35, 0.30]),
            (ZoneType::MixedUse, [0.60, 0.50, 0.40, 0.35]),
            (ZoneType::GreenSpace, [0.10, 0.08, 0.05, 0.05]),
        ];
        let rates = table
            .iter()
            .flat_map(|(zone_type, row)| {
                SettlementDensity::ALL
                    .iter()
                    .zip(row.iter())
                    .map(|(density, rate)| RateEntry {
                        zone_type: *zone_type,
                        density: *density,
                        kg_per_person_day: *rate,
                    })
            })
            .collect();

        let composition = [
            (Fraction::Organic, 0.55),
            (Fraction::Plastic, 0.12),
            (Fraction::Paper, 0.10),
            (Fraction::Glass, 0.04),
            (Fraction::Metal, 0.04),
            (Fraction::Residual, 0.15),
        ]
        .into_iter()
        .map(|(fraction, share)| CompositionShare { fraction, share })
        .collect();

        Self {
            rates,
            socioeconomic_multipliers: SocioeconomicTable {
                low: 0.7,
                middle: 1.0,
                high: 1.4,
            },
            seasonal_factor: 1.0,
            composition,
        }
    }
}

impl WasteConfig {
    /// Base rate for a zone type and density.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRate`] when the table has no such cell.
    pub fn rate(
        &self,
        zone_type: ZoneType,
        density: SettlementDensity,
    ) -> Result<f64, ConfigError> {
        self.rates
            .iter()
            .find(|entry| entry.zone_type == zone_type && entry.density == density)
            .map(|entry| entry.kg_per_person_day)
            .ok_or(ConfigError::MissingRate { zone_type, density })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for zone_type in ZoneType::ALL {
            for density in SettlementDensity::ALL {
                let rate = self.rate(zone_type, density)?;
                ensure(rate.is_finite() && rate >= 0.0, || {
                    format!("waste rate for {zone_type}/{density} must be non-negative")
                })?;
            }
        }
        ensure(
            SocioeconomicLevel::ALL
                .iter()
                .all(|level| self.socioeconomic_multipliers.get(*level) > 0.0),
            || "waste.socioeconomic_multipliers must be positive".to_owned(),
        )?;
        ensure(self.seasonal_factor > 0.0, || {
            "waste.seasonal_factor must be positive".to_owned()
        })?;
        let total: f64 = self.composition.iter().map(|part| part.share).sum();
        ensure(
            self.composition.is_empty() || (total - 1.0).abs() <= 0.01,
            || format!("waste.composition shares sum to {total}, expected 1"),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Truck catalogue and cost parameters for the fleet optimiser.
pub struct FleetConfig {
    /// Available truck types.
    pub trucks: Vec<TruckSpec>,
    /// Candidate collection frequencies per week.
    pub frequencies: Vec<u8>,
    /// Upper bound on trucks of each type.
    pub max_trucks_per_type: u32,
    /// Disposal and franchise fee per tonne delivered.
    pub disposal_fee_per_tonne: f64,
    /// Crew wages per truck per week.
    pub crew_salary_per_truck_week: f64,
    /// Administrative overhead as a fraction of the operating subtotal.
    pub admin_overhead_rate: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            trucks: vec![
                TruckSpec::new("10-tonne", 10_000.0, 1_800.0, 12.0),
                TruckSpec::new("20-tonne", 20_000.0, 3_000.0, 20.0),
            ],
            frequencies: vec![1, 2, 3, 4, 5],
            max_trucks_per_type: 20,
            disposal_fee_per_tonne: 50.0,
            crew_salary_per_truck_week: 2_500.0,
            admin_overhead_rate: 0.30,
        }
    }
}

impl FleetConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(!self.trucks.is_empty(), || {
            "fleet.trucks must list at least one truck".to_owned()
        })?;
        for truck in &self.trucks {
            ensure(truck.capacity_kg > 0.0, || {
                format!("truck {} must have a positive capacity", truck.name)
            })?;
            ensure(
                truck.daily_operating_cost >= 0.0 && truck.fuel_cost_per_km >= 0.0,
                || format!("truck {} must have non-negative costs", truck.name),
            )?;
        }
        ensure(
            !self.frequencies.is_empty()
                && self.frequencies.iter().all(|freq| (1..=7).contains(freq)),
            || "fleet.frequencies must be between 1 and 7".to_owned(),
        )?;
        ensure(self.max_trucks_per_type > 0, || {
            "fleet.max_trucks_per_type must be positive".to_owned()
        })?;
        ensure(
            self.disposal_fee_per_tonne >= 0.0
                && self.crew_salary_per_truck_week >= 0.0
                && self.admin_overhead_rate >= 0.0,
            || "fleet fees and rates must be non-negative".to_owned(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Flat monthly rate and payment rate of one billing tier.
pub struct BillingTier {
    /// Monthly charge per building.
    pub rate_per_building: f64,
    /// Fraction of billed accounts that pay.
    pub collection_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Billing tiers and settlement classification thresholds.
pub struct RevenueConfig {
    /// Formal settlements.
    pub formal: BillingTier,
    /// Mixed settlements.
    pub mixed: BillingTier,
    /// Informal settlements.
    pub informal: BillingTier,
    /// Mean footprint below which buildings are considered informal.
    pub informal_max_footprint_sqm: f64,
    /// Mean footprint above which buildings are considered formal.
    pub formal_min_footprint_sqm: f64,
    /// Buildings per km² from which a settlement counts as high density.
    pub high_density_buildings_per_km2: f64,
    /// Realistic monthly revenue below which potential is low.
    pub low_potential_below: f64,
    /// Realistic monthly revenue below which potential is medium.
    pub medium_potential_below: f64,
}

impl Default for RevenueConfig {
    fn default() -> Self {
        Self {
            formal: BillingTier {
                rate_per_building: 150.0,
                collection_efficiency: 0.75,
            },
            mixed: BillingTier {
                rate_per_building: 90.0,
                collection_efficiency: 0.6,
            },
            informal: BillingTier {
                rate_per_building: 30.0,
                collection_efficiency: 0.4,
            },
            informal_max_footprint_sqm: 60.0,
            formal_min_footprint_sqm: 120.0,
            high_density_buildings_per_km2: 1500.0,
            low_potential_below: 5_000.0,
            medium_potential_below: 50_000.0,
        }
    }
}

impl RevenueConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, tier) in [
            ("formal", self.formal),
            ("mixed", self.mixed),
            ("informal", self.informal),
        ] {
            ensure(tier.rate_per_building >= 0.0, || {
                format!("revenue.{name}.rate_per_building must be non-negative")
            })?;
            ensure((0.0..=1.0).contains(&tier.collection_efficiency), || {
                format!("revenue.{name}.collection_efficiency must be within 0..=1")
            })?;
        }
        ensure(
            self.informal_max_footprint_sqm <= self.formal_min_footprint_sqm,
            || "revenue footprint thresholds overlap".to_owned(),
        )?;
        ensure(self.low_potential_below <= self.medium_potential_below, || {
            "revenue potential thresholds are out of order".to_owned()
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
/// Travel estimate used when no routing provider answers.
pub struct RoutingConfig {
    /// Road distance per unit of straight-line distance.
    pub detour_factor: f64,
    /// Average truck speed in km/h.
    pub fallback_speed_kmh: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            detour_factor: 1.3,
            fallback_speed_kmh: 30.0,
        }
    }
}

impl RoutingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.detour_factor >= 1.0, || {
            "routing.detour_factor must be at least 1".to_owned()
        })?;
        ensure(self.fallback_speed_kmh > 0.0, || {
            "routing.fallback_speed_kmh must be positive".to_owned()
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
/// Limits applied to every provider call.
pub struct ProviderConfig {
    /// Seconds before a call is abandoned.
    pub timeout_secs: u64,
    /// Additional attempts after a failed call.
    pub retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            retries: 1,
        }
    }
}

impl ProviderConfig {
    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.timeout_secs > 0, || {
            "providers.timeout_secs must be positive".to_owned()
        })?;
        ensure(self.retries <= 1, || {
            format!("providers.retries must be 0 or 1, got {}", self.retries)
        })
    }
}
