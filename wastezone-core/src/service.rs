//! High-level "analyze zone" pipeline.
//!
//! One analysis runs geometry, population sources, consensus, waste, fleet and revenue for
//! a single zone. Provider calls are the only suspension points; each is bounded by a
//! timeout and retried at most the configured number of times. A failed call degrades the
//! affected stage to its fallback and is recorded in the audit trail.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::config::{AnalysisConfig, ConfigError};
use crate::consensus::{ConsensusPopulation, ConsensusStrategy, PopulationConsensusEngine};
use crate::fleet::{CollectionStrategyOptimizer, FleetPlan};
use crate::geometry::{GeometryError, ZoneMetrics, haversine_km};
use crate::model::{LonLat, SettlementDensity, SocioeconomicLevel, ZoneType};
use crate::population::{FootprintSummary, PopulationSourceAdapter, SourceKind, SourceOutcome};
use crate::ports::{BuildingFootprint, GriddedPopulation, ProviderError, RouteDistance};
use crate::providers::ProviderSet;
use crate::revenue::{
    BuildingCountSource, RevenueProjection, RevenueProjector, SettlementClass,
};
use crate::waste::{WasteGenerationModel, WasteOptions, WasteProfile};
use crate::zone::{Zone, ZoneAttributes};

#[derive(thiserror::Error, Debug)]
/// Errors that abort a whole analysis.
pub enum AnalysisError {
    /// The zone polygon is invalid.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    /// Configuration and code disagree, e.g. a missing rate row.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
/// A result section that either completed or carries an explicit error marker.
pub enum Section<T> {
    /// The section was produced.
    Ready(T),
    /// The section could not be produced.
    Failed {
        /// Why the section is missing.
        error: String,
    },
}

impl<T> Section<T> {
    /// The section's value, when produced.
    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }

    /// Whether the section was produced.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Pipeline stage an audit entry belongs to.
pub enum Stage {
    /// Zone geometry.
    Geometry,
    /// Population sources.
    Population,
    /// Consensus.
    Consensus,
    /// Waste projection.
    Waste,
    /// Disposal-site routing.
    Routing,
    /// Fleet optimisation.
    Fleet,
    /// Revenue projection.
    Revenue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Severity of an audit entry.
pub enum AuditLevel {
    /// Noteworthy but expected.
    Info,
    /// A fallback was used.
    Warning,
    /// A section could not be produced.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One recorded event of an analysis.
pub struct AuditEntry {
    /// Stage that produced the entry.
    pub stage: Stage,
    /// Source or provider involved, if any.
    pub source: Option<String>,
    /// Severity.
    pub level: AuditLevel,
    /// Description.
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
/// Per-zone request options.
pub struct AnalysisRequest {
    /// Where collected waste is delivered.
    pub disposal_site: Option<LonLat>,
    /// Census year asked of the gridded provider.
    pub census_year: Option<i32>,
    /// Waste model overrides.
    pub waste: WasteOptions,
    /// Known number of billable buildings.
    pub building_count: Option<u32>,
    /// Known settlement classification.
    pub settlement_class: Option<SettlementClass>,
    /// Collection efficiency override.
    pub collection_efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// How the disposal distance was obtained.
pub enum RouteSource {
    /// Answered by a routing provider.
    Provider {
        /// Provider name.
        name: String,
    },
    /// Straight-line distance times the detour factor.
    Haversine,
    /// No disposal site was given; travel is not costed.
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Travel from the zone to its disposal site.
pub struct DisposalRoute {
    /// One-way road distance.
    pub distance_km: f64,
    /// One-way travel time.
    pub duration_min: f64,
    /// Origin of the figures.
    pub source: RouteSource,
}

/// Raw provider answers for one zone. `None` means no provider was configured.
#[derive(Debug, Default)]
pub struct ProviderResponses {
    /// Gridded population answer.
    pub gridded: Option<Result<GriddedPopulation, ProviderError>>,
    /// Building footprint answer.
    pub footprints: Option<Result<Vec<BuildingFootprint>, ProviderError>>,
    /// Routing answer, with the provider name.
    pub route: Option<(String, Result<RouteDistance, ProviderError>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Complete result of analysing one zone.
pub struct ZoneAnalysis {
    /// Zone name, if any.
    pub zone_name: Option<String>,
    /// Land use.
    pub zone_type: ZoneType,
    /// Settlement classification.
    pub settlement_density: SettlementDensity,
    /// Income band.
    pub socioeconomic_level: SocioeconomicLevel,
    /// Geometry measurements.
    pub metrics: ZoneMetrics,
    /// Whether the zone's compactness is below the configured threshold.
    pub irregular_shape: bool,
    /// Every population source outcome, in priority order.
    pub population_sources: Vec<SourceOutcome>,
    /// Consensus population.
    pub population: Section<ConsensusPopulation>,
    /// Waste projection.
    pub waste: Section<WasteProfile>,
    /// Disposal-site travel.
    pub disposal_route: DisposalRoute,
    /// Collection plan.
    pub fleet: Section<FleetPlan>,
    /// Revenue projection.
    pub revenue: Section<RevenueProjection>,
    /// Everything that went wrong or was noteworthy.
    pub audit: Vec<AuditEntry>,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
}

impl ZoneAnalysis {
    /// Whether any audit entry reached the given severity.
    #[must_use]
    pub fn has_audit_level(&self, level: AuditLevel) -> bool {
        self.audit.iter().any(|entry| entry.level >= level)
    }
}

/// Public entry point for analysing zones.
pub struct ZoneAnalyzer {
    providers: ProviderSet,
    config: Arc<AnalysisConfig>,
}

impl ZoneAnalyzer {
    /// Create an analyzer over the given providers and parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration does not validate.
    pub fn new(providers: ProviderSet, config: Arc<AnalysisConfig>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { providers, config })
    }

    /// Parameters in use.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Validate a ring and analyse the resulting zone.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Geometry`] for an invalid ring, otherwise as
    /// [`ZoneAnalyzer::analyze`].
    pub async fn analyze_ring(
        &self,
        ring: Vec<LonLat>,
        attributes: ZoneAttributes,
        request: &AnalysisRequest,
    ) -> Result<ZoneAnalysis, AnalysisError> {
        let zone = Zone::new(ring, attributes)?;
        self.analyze(&zone, request).await
    }

    /// Query the providers for one zone and assemble the analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] when the rate table lacks the zone's cell.
    /// Provider failures never abort the analysis.
    pub async fn analyze(
        &self,
        zone: &Zone,
        request: &AnalysisRequest,
    ) -> Result<ZoneAnalysis, AnalysisError> {
        let responses = self.fetch(zone, request).await;
        self.assemble(zone, request, responses)
    }

    /// Query every configured provider for one zone concurrently.
    pub async fn fetch(&self, zone: &Zone, request: &AnalysisRequest) -> ProviderResponses {
        let ring = zone.ring();
        let year = request
            .census_year
            .unwrap_or(self.config.population.census_year);
        let threshold = self.config.population.effective_confidence_threshold();

        let gridded = async {
            match &self.providers.gridded {
                Some(provider) => Some(
                    self.call_with_retry(provider.name(), || provider.query(ring, year))
                        .await,
                ),
                None => None,
            }
        };
        let footprints = async {
            match &self.providers.footprints {
                Some(provider) => Some(
                    self.call_with_retry(provider.name(), || provider.query(ring, threshold))
                        .await,
                ),
                None => None,
            }
        };
        let route = async {
            match (&self.providers.routing, request.disposal_site) {
                (Some(provider), Some(site)) => {
                    let origin = zone.centroid();
                    let answer = self
                        .call_with_retry(provider.name(), || provider.query(origin, site))
                        .await;
                    Some((provider.name().to_owned(), answer))
                }
                _ => None,
            }
        };

        let (gridded, footprints, route) = tokio::join!(gridded, footprints, route);
        ProviderResponses {
            gridded,
            footprints,
            route,
        }
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        provider: &str,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let limits = self.config.providers;
        let mut attempt = 0;
        loop {
            let result = match timeout(limits.timeout(), call()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ProviderError::Timeout(limits.timeout_secs)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < limits.retries => {
                    attempt += 1;
                    log::warn!("{provider} failed ({error}), retry {attempt}/{}", limits.retries);
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Build the analysis from provider answers. Pure apart from the timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Configuration`] when the rate table lacks the zone's cell.
    pub fn assemble(
        &self,
        zone: &Zone,
        request: &AnalysisRequest,
        responses: ProviderResponses,
    ) -> Result<ZoneAnalysis, AnalysisError> {
        let config = &*self.config;
        let mut audit = Audit::default();

        let irregular_shape = zone.is_irregular(config.geometry.irregular_compactness);
        if irregular_shape {
            audit.push(
                Stage::Geometry,
                None,
                AuditLevel::Info,
                format!(
                    "irregular shape (compactness {:.3})",
                    zone.metrics().compactness
                ),
            );
        }
        if zone.metrics().repaired {
            audit.push(
                Stage::Geometry,
                None,
                AuditLevel::Info,
                "ring was repaired before measuring".to_owned(),
            );
        }

        // Population sources, in priority order.
        let adapter = PopulationSourceAdapter::new(&config.population);
        let census = match &responses.gridded {
            Some(Ok(payload)) => adapter.gridded_census(payload),
            Some(Err(error)) => SourceOutcome::unavailable(SourceKind::GriddedCensus, error),
            None => SourceOutcome::not_configured(SourceKind::GriddedCensus),
        };
        let footprint_summary = match &responses.footprints {
            Some(Ok(footprints)) => Some(FootprintSummary::from_footprints(
                footprints,
                config.population.effective_confidence_threshold(),
            )),
            _ => None,
        };
        let footprint = match &responses.footprints {
            Some(Ok(footprints)) => adapter.building_footprints(zone, footprints),
            Some(Err(error)) => SourceOutcome::unavailable(SourceKind::BuildingFootprint, error),
            None => SourceOutcome::not_configured(SourceKind::BuildingFootprint),
        };
        let fallback = adapter.area_density(zone);
        let population_sources = vec![census, footprint, fallback];
        log::debug!(
            "Population sources: {}",
            population_sources
                .iter()
                .map(|outcome| match outcome.estimate() {
                    Some(estimate) => {
                        format!("{}={}", estimate.source, estimate.estimated_population)
                    }
                    None => format!("{}=absent", outcome.source()),
                })
                .collect::<Vec<_>>()
                .join(", ")
        );
        for outcome in &population_sources {
            if let SourceOutcome::Absent { source, reason } = outcome {
                log::warn!("Population source {source} absent: {reason}");
                audit.push(
                    Stage::Population,
                    Some(source.to_string()),
                    AuditLevel::Warning,
                    format!("source unavailable: {reason}"),
                );
            }
        }

        // Consensus.
        let consensus = PopulationConsensusEngine::from_config(&config.population)
            .merge(&population_sources);
        let population = match consensus {
            Some(consensus) => {
                if let ConsensusStrategy::Blended {
                    adjustment_factor, ..
                } = consensus.strategy
                {
                    audit.push(
                        Stage::Consensus,
                        Some(SourceKind::GriddedCensus.to_string()),
                        AuditLevel::Info,
                        format!(
                            "census blended with footprints, adjustment {adjustment_factor:.3}"
                        ),
                    );
                }
                Section::Ready(consensus)
            }
            None => {
                audit.push(
                    Stage::Consensus,
                    None,
                    AuditLevel::Error,
                    "no population source produced an estimate".to_owned(),
                );
                Section::Failed {
                    error: "no population estimate".to_owned(),
                }
            }
        };

        // Waste.
        let waste = match population.ready() {
            Some(consensus) => {
                match WasteGenerationModel::new(&config.waste).project(
                    consensus.value,
                    zone.attributes(),
                    request.waste,
                ) {
                    Ok(profile) => {
                        log::debug!("Waste: {:.1} kg/week", profile.weekly_kg);
                        Section::Ready(profile)
                    }
                    Err(error @ ConfigError::MissingRate { .. }) => return Err(error.into()),
                    Err(error) => {
                        audit.push(Stage::Waste, None, AuditLevel::Error, error.to_string());
                        Section::Failed {
                            error: error.to_string(),
                        }
                    }
                }
            }
            None => Section::Failed {
                error: "population unavailable".to_owned(),
            },
        };

        // Disposal route.
        let disposal_route = self.disposal_route(zone, request, responses.route, &mut audit);

        // Fleet.
        let fleet = match waste.ready() {
            Some(profile) => match CollectionStrategyOptimizer::new(&config.fleet)
                .optimize(profile.weekly_kg, disposal_route.distance_km)
            {
                Ok(plan) => {
                    log::debug!("Fleet: {}", plan.justification);
                    if plan.under_provisioned {
                        audit.push(
                            Stage::Fleet,
                            None,
                            AuditLevel::Warning,
                            format!(
                                "insufficient capacity: coverage ratio {:.2}",
                                plan.coverage_ratio
                            ),
                        );
                    }
                    Section::Ready(plan)
                }
                Err(error) => {
                    audit.push(Stage::Fleet, None, AuditLevel::Error, error.to_string());
                    Section::Failed {
                        error: error.to_string(),
                    }
                }
            },
            None => Section::Failed {
                error: "waste projection unavailable".to_owned(),
            },
        };

        // Revenue.
        let revenue = self.revenue(
            zone,
            request,
            footprint_summary,
            population.ready().map(|consensus| consensus.value),
            &mut audit,
        );

        let analysis = ZoneAnalysis {
            zone_name: zone.name().map(str::to_owned),
            zone_type: zone.zone_type(),
            settlement_density: zone.settlement_density(),
            socioeconomic_level: zone.socioeconomic_level(),
            metrics: *zone.metrics(),
            irregular_shape,
            population_sources,
            population,
            waste,
            disposal_route,
            fleet,
            revenue,
            audit: audit.entries,
            analyzed_at: Utc::now(),
        };
        log::info!(
            "Analysed zone {}: {:.2} km2, population {}, {} audit entries",
            analysis.zone_name.as_deref().unwrap_or("<unnamed>"),
            zone.area_km2(),
            analysis
                .population
                .ready()
                .map_or_else(|| "n/a".to_owned(), |consensus| consensus.value.to_string()),
            analysis.audit.len()
        );
        Ok(analysis)
    }

    fn disposal_route(
        &self,
        zone: &Zone,
        request: &AnalysisRequest,
        answer: Option<(String, Result<RouteDistance, ProviderError>)>,
        audit: &mut Audit,
    ) -> DisposalRoute {
        let Some(site) = request.disposal_site else {
            audit.push(
                Stage::Routing,
                None,
                AuditLevel::Warning,
                "no disposal site given; fuel to the site is not costed".to_owned(),
            );
            return DisposalRoute {
                distance_km: 0.0,
                duration_min: 0.0,
                source: RouteSource::NotRequested,
            };
        };

        match answer {
            Some((name, Ok(route)))
                if route.distance_km.is_finite() && route.distance_km >= 0.0 =>
            {
                return DisposalRoute {
                    distance_km: route.distance_km,
                    duration_min: route.duration_min,
                    source: RouteSource::Provider { name },
                };
            }
            Some((name, Ok(route))) => audit.push(
                Stage::Routing,
                Some(name),
                AuditLevel::Warning,
                format!("routing returned unusable distance {}", route.distance_km),
            ),
            Some((name, Err(error))) => audit.push(
                Stage::Routing,
                Some(name),
                AuditLevel::Warning,
                format!("routing unavailable, using straight-line estimate: {error}"),
            ),
            None => {}
        }

        let routing = self.config.routing;
        let distance_km = haversine_km(zone.centroid(), site) * routing.detour_factor;
        DisposalRoute {
            distance_km,
            duration_min: distance_km / routing.fallback_speed_kmh * 60.0,
            source: RouteSource::Haversine,
        }
    }

    fn revenue(
        &self,
        zone: &Zone,
        request: &AnalysisRequest,
        footprints: Option<FootprintSummary>,
        population: Option<f64>,
        audit: &mut Audit,
    ) -> Section<RevenueProjection> {
        let config = &*self.config;
        let projector = RevenueProjector::new(&config.revenue);

        let (building_count, source) = if let Some(count) = request.building_count {
            (count, BuildingCountSource::Provided)
        } else if let Some(summary) = footprints {
            (summary.count, BuildingCountSource::Detected)
        } else if let Some(population) = population {
            let per_building = config
                .population
                .people_per_building
                .get(zone.settlement_density());
            let estimate = estimate_buildings(population, per_building);
            audit.push(
                Stage::Revenue,
                Some(SourceKind::BuildingFootprint.to_string()),
                AuditLevel::Warning,
                format!("building count estimated from population: {estimate}"),
            );
            (estimate, BuildingCountSource::Estimated)
        } else {
            audit.push(
                Stage::Revenue,
                None,
                AuditLevel::Error,
                "neither buildings nor population available".to_owned(),
            );
            return Section::Failed {
                error: "no building count".to_owned(),
            };
        };

        let settlement_class = match (request.settlement_class, footprints) {
            (Some(class), _) => class,
            (None, Some(summary)) if summary.count > 0 => {
                projector.classify(summary.count, zone.area_km2(), summary.mean_area_sqm)
            }
            _ => SettlementClass::from_density(zone.settlement_density()),
        };

        match projector.project(
            building_count,
            source,
            settlement_class,
            request.collection_efficiency,
        ) {
            Ok(projection) => Section::Ready(projection),
            Err(error) => {
                audit.push(Stage::Revenue, None, AuditLevel::Error, error.to_string());
                Section::Failed {
                    error: error.to_string(),
                }
            }
        }
    }
}

/// Buildings needed to house `population` at `per_building` residents each.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped to the u32 range before the cast"
)]
fn estimate_buildings(population: f64, per_building: f64) -> u32 {
    if per_building <= 0.0 || !population.is_finite() {
        return 0;
    }
    (population / per_building)
        .round()
        .clamp(0.0, f64::from(u32::MAX)) as u32
}

#[derive(Debug, Default)]
struct Audit {
    entries: Vec<AuditEntry>,
}

impl Audit {
    fn push(&mut self, stage: Stage, source: Option<String>, level: AuditLevel, message: String) {
        self.entries.push(AuditEntry {
            stage,
            source,
            level,
            message,
        });
    }
}
