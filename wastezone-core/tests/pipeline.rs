//! End-to-end analyses against in-process providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use wastezone_core::{
    AnalysisConfig, AnalysisRequest, AuditLevel, BuildingCountSource, BuildingFootprint,
    BuildingFootprintProvider, ConsensusStrategy, GriddedPopulation, GriddedPopulationProvider,
    LonLat, ProviderError, ProviderSet, RouteDistance, RouteSource, RoutingDistanceProvider,
    SettlementDensity, SourceKind, Stage, Zone, ZoneAnalyzer, ZoneAttributes, ZoneType,
};

struct FixedCensus {
    total: f64,
    calls: AtomicUsize,
}

impl FixedCensus {
    fn new(total: f64) -> Self {
        Self {
            total,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GriddedPopulationProvider for FixedCensus {
    fn name(&self) -> &str {
        "fixed-census"
    }

    async fn query(
        &self,
        _ring: &[LonLat],
        _year: i32,
    ) -> Result<GriddedPopulation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GriddedPopulation {
            total_population: self.total,
            pixel_count: 120,
        })
    }
}

/// Fails with a timeout on the first call, answers afterwards.
struct FlakyCensus {
    calls: AtomicUsize,
}

#[async_trait]
impl GriddedPopulationProvider for FlakyCensus {
    fn name(&self) -> &str {
        "flaky-census"
    }

    async fn query(
        &self,
        _ring: &[LonLat],
        _year: i32,
    ) -> Result<GriddedPopulation, ProviderError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ProviderError::Timeout(1));
        }
        Ok(GriddedPopulation {
            total_population: 800.0,
            pixel_count: 120,
        })
    }
}

struct HangingCensus;

#[async_trait]
impl GriddedPopulationProvider for HangingCensus {
    fn name(&self) -> &str {
        "hanging-census"
    }

    async fn query(
        &self,
        _ring: &[LonLat],
        _year: i32,
    ) -> Result<GriddedPopulation, ProviderError> {
        sleep(Duration::from_secs(3600)).await;
        Ok(GriddedPopulation {
            total_population: 1.0,
            pixel_count: 120,
        })
    }
}

struct FixedBuildings {
    count: usize,
    area_sqm: f64,
}

#[async_trait]
impl BuildingFootprintProvider for FixedBuildings {
    fn name(&self) -> &str {
        "fixed-buildings"
    }

    async fn query(
        &self,
        _ring: &[LonLat],
        _confidence_threshold: f64,
    ) -> Result<Vec<BuildingFootprint>, ProviderError> {
        Ok(vec![
            BuildingFootprint {
                area_sqm: self.area_sqm,
                confidence: 0.9,
            };
            self.count
        ])
    }
}

struct NoBuildings {
    calls: AtomicUsize,
}

#[async_trait]
impl BuildingFootprintProvider for NoBuildings {
    fn name(&self) -> &str {
        "no-buildings"
    }

    async fn query(
        &self,
        _ring: &[LonLat],
        _confidence_threshold: f64,
    ) -> Result<Vec<BuildingFootprint>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::NoCoverage)
    }
}

struct FixedRoute;

#[async_trait]
impl RoutingDistanceProvider for FixedRoute {
    fn name(&self) -> &str {
        "fixed-route"
    }

    async fn query(
        &self,
        _origin: LonLat,
        _destination: LonLat,
    ) -> Result<RouteDistance, ProviderError> {
        Ok(RouteDistance {
            distance_km: 12.5,
            duration_min: 21.0,
        })
    }
}

struct BrokenRoute;

#[async_trait]
impl RoutingDistanceProvider for BrokenRoute {
    fn name(&self) -> &str {
        "broken-route"
    }

    async fn query(
        &self,
        _origin: LonLat,
        _destination: LonLat,
    ) -> Result<RouteDistance, ProviderError> {
        Err(ProviderError::InvalidResponse("code NoRoute".to_owned()))
    }
}

fn ring() -> Vec<LonLat> {
    vec![
        LonLat::new(28.30, -15.40),
        LonLat::new(28.31, -15.40),
        LonLat::new(28.31, -15.39),
        LonLat::new(28.30, -15.39),
        LonLat::new(28.30, -15.40),
    ]
}

fn mixed_use_zone() -> Zone {
    Zone::new(
        ring(),
        ZoneAttributes::new(ZoneType::MixedUse, SettlementDensity::Medium),
    )
    .expect("zone is valid")
    .with_name("Matero market")
}

fn analyzer(providers: ProviderSet) -> ZoneAnalyzer {
    ZoneAnalyzer::new(providers, Arc::new(AnalysisConfig::default()))
        .expect("default configuration is valid")
}

#[tokio::test]
async fn census_population_drives_waste_and_fleet() {
    let census = Arc::new(FixedCensus::new(1000.0));
    let handle = Arc::clone(&census);
    let service = analyzer(ProviderSet::offline().with_gridded(handle));

    let analysis = service
        .analyze(&mixed_use_zone(), &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    let population = analysis.population.ready().expect("population present");
    assert!((population.value - 1000.0).abs() < f64::EPSILON);
    assert_eq!(population.primary_source, SourceKind::GriddedCensus);

    let waste = analysis.waste.ready().expect("waste present");
    assert!((waste.daily_kg - 500.0).abs() < 1e-9);
    assert!((waste.weekly_kg - 3500.0).abs() < 1e-9);

    let fleet = analysis.fleet.ready().expect("fleet present");
    assert!(fleet.total_weekly_capacity_kg >= 3500.0);
    assert!(!fleet.under_provisioned);

    assert_eq!(analysis.zone_name.as_deref(), Some("Matero market"));
    assert_eq!(analysis.population_sources.len(), 3);
    assert_eq!(census.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disagreeing_sources_are_blended_not_summed() {
    let service = analyzer(
        ProviderSet::offline()
            .with_gridded(Arc::new(FixedCensus::new(1000.0)))
            .with_footprints(Arc::new(FixedBuildings {
                count: 1000,
                area_sqm: 80.0,
            })),
    );

    let analysis = service
        .analyze(&mixed_use_zone(), &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    let population = analysis.population.ready().expect("population present");
    // 1000 x 3 (census, high) and 4500 x 2 (footprints, medium)
    assert!((population.value - 2400.0).abs() < f64::EPSILON);
    assert!(population.value < 1000.0 + 4500.0);
    assert!(matches!(
        population.strategy,
        ConsensusStrategy::Blended { .. }
    ));

    let revenue = analysis.revenue.ready().expect("revenue present");
    assert_eq!(revenue.building_count, 1000);
    assert_eq!(revenue.building_count_source, BuildingCountSource::Detected);
}

#[tokio::test]
async fn offline_analysis_uses_area_density() {
    let service = analyzer(ProviderSet::offline());
    let zone = mixed_use_zone();

    let analysis = service
        .analyze(&zone, &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    let population = analysis.population.ready().expect("population present");
    assert_eq!(population.primary_source, SourceKind::AreaDensity);
    assert!((population.value - (zone.area_km2() * 1250.0).round()).abs() < f64::EPSILON);

    let absent = analysis
        .audit
        .iter()
        .filter(|entry| entry.stage == Stage::Population)
        .count();
    assert_eq!(absent, 2);
    assert_eq!(analysis.disposal_route.source, RouteSource::NotRequested);

    let revenue = analysis.revenue.ready().expect("revenue present");
    assert_eq!(revenue.building_count_source, BuildingCountSource::Estimated);
}

#[tokio::test(start_paused = true)]
async fn hanging_provider_times_out_and_falls_back() {
    let service = analyzer(ProviderSet::offline().with_gridded(Arc::new(HangingCensus)));

    let analysis = service
        .analyze(&mixed_use_zone(), &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    let population = analysis.population.ready().expect("population present");
    assert_eq!(population.primary_source, SourceKind::AreaDensity);
    assert!(analysis.audit.iter().any(|entry| {
        entry.stage == Stage::Population
            && entry.source.as_deref() == Some("gridded_census")
            && entry.message.contains("Timed out")
    }));
    assert!(analysis.has_audit_level(AuditLevel::Warning));
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let census = Arc::new(FlakyCensus {
        calls: AtomicUsize::new(0),
    });
    let handle = Arc::clone(&census);
    let service = analyzer(ProviderSet::offline().with_gridded(handle));

    let analysis = service
        .analyze(&mixed_use_zone(), &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    assert_eq!(census.calls.load(Ordering::SeqCst), 2);
    let population = analysis.population.ready().expect("population present");
    assert_eq!(population.primary_source, SourceKind::GriddedCensus);
}

#[tokio::test]
async fn missing_coverage_is_not_retried() {
    let buildings = Arc::new(NoBuildings {
        calls: AtomicUsize::new(0),
    });
    let handle = Arc::clone(&buildings);
    let service = analyzer(ProviderSet::offline().with_footprints(handle));

    let analysis = service
        .analyze(&mixed_use_zone(), &AnalysisRequest::default())
        .await
        .expect("analysis succeeds");

    let footprint = analysis
        .population_sources
        .iter()
        .find(|outcome| outcome.source() == SourceKind::BuildingFootprint)
        .expect("footprint outcome recorded");
    assert!(footprint.estimate().is_none());
    assert_eq!(buildings.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn routing_answer_feeds_fleet_costs() {
    let service = analyzer(
        ProviderSet::offline()
            .with_gridded(Arc::new(FixedCensus::new(1000.0)))
            .with_routing(Arc::new(FixedRoute)),
    );
    let request = AnalysisRequest {
        disposal_site: Some(LonLat::new(28.40, -15.45)),
        ..AnalysisRequest::default()
    };

    let analysis = service
        .analyze(&mixed_use_zone(), &request)
        .await
        .expect("analysis succeeds");

    assert_eq!(
        analysis.disposal_route.source,
        RouteSource::Provider {
            name: "fixed-route".to_owned()
        }
    );
    let fleet = analysis.fleet.ready().expect("fleet present");
    assert!((fleet.disposal_distance_km - 12.5).abs() < f64::EPSILON);
    assert!(fleet.costs.fuel > 0.0);
}

#[tokio::test]
async fn failed_routing_uses_straight_line_estimate() {
    let service = analyzer(ProviderSet::offline().with_routing(Arc::new(BrokenRoute)));
    let request = AnalysisRequest {
        disposal_site: Some(LonLat::new(28.40, -15.45)),
        ..AnalysisRequest::default()
    };

    let analysis = service
        .analyze(&mixed_use_zone(), &request)
        .await
        .expect("analysis succeeds");

    assert_eq!(analysis.disposal_route.source, RouteSource::Haversine);
    assert!(analysis.disposal_route.distance_km > 10.0);
    assert!(analysis.audit.iter().any(|entry| {
        entry.stage == Stage::Routing && entry.source.as_deref() == Some("broken-route")
    }));
}

#[tokio::test]
async fn invalid_overrides_mark_sections_failed() {
    let service = analyzer(ProviderSet::offline());
    let mut request = AnalysisRequest {
        collection_efficiency: Some(1.5),
        ..AnalysisRequest::default()
    };
    request.waste.custom_rate_kg = Some(-1.0);

    let analysis = service
        .analyze(&mixed_use_zone(), &request)
        .await
        .expect("analysis succeeds");

    assert!(analysis.population.is_ready());
    assert!(!analysis.waste.is_ready());
    assert!(!analysis.fleet.is_ready());
    assert!(!analysis.revenue.is_ready());
    assert!(analysis.has_audit_level(AuditLevel::Error));
}

#[tokio::test]
async fn invalid_ring_is_rejected_before_any_query() {
    let census = Arc::new(FixedCensus::new(1000.0));
    let handle = Arc::clone(&census);
    let service = analyzer(ProviderSet::offline().with_gridded(handle));
    let mut open = ring();
    open.pop();

    let result = service
        .analyze_ring(
            open,
            ZoneAttributes::new(ZoneType::Residential, SettlementDensity::Low),
            &AnalysisRequest::default(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(census.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn incomplete_rate_table_is_rejected_up_front() {
    let mut config = AnalysisConfig::default();
    config
        .waste
        .rates
        .retain(|entry| entry.zone_type != ZoneType::MixedUse);

    assert!(ZoneAnalyzer::new(ProviderSet::offline(), Arc::new(config)).is_err());
}
