//! Gridded population provider using the WorldPop `stats` service.

use std::sync::Arc;

use async_trait::async_trait;
use geo::{Coord, LineString, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use wastezone_core::{
    cache::{QueryCache, RingKey},
    geometry::planar_area_sqm,
    model::LonLat,
    ports::{GriddedPopulation, GriddedPopulationProvider, ProviderError},
};

const BASE_URL: &str = "https://api.worldpop.org/v1/services/stats";
const DATASET: &str = "wpgppop";

// Years published for the global per-country dataset.
const FIRST_YEAR: i32 = 2000;
const LAST_YEAR: i32 = 2020;

// The raster is roughly 100 m at the equator, one pixel per hectare.
const PIXEL_AREA_SQM: f64 = 10_000.0;

const CACHE_CAPACITY: usize = 256;

/// Response from /v1/services/stats when run synchronously.
#[derive(Debug, Deserialize)]
struct StatsResponse {
    status: String,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    data: Option<StatsData>,
}

/// Result block of a finished task.
#[derive(Debug, Deserialize)]
struct StatsData {
    total_population: f64,
}

/// WorldPop population totals for arbitrary polygons.
pub struct WorldPopProvider {
    client: Client,
    base_url: String,
    cache: QueryCache<(RingKey, i32), GriddedPopulation>,
}

impl WorldPopProvider {
    /// Create a provider bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
            cache: QueryCache::new(CACHE_CAPACITY),
        }
    }

    /// Point the provider at a mirror of the stats service.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Answers cached by this provider.
    #[must_use]
    pub fn cache(&self) -> &QueryCache<(RingKey, i32), GriddedPopulation> {
        &self.cache
    }
}

#[async_trait]
impl GriddedPopulationProvider for WorldPopProvider {
    fn name(&self) -> &str {
        "worldpop"
    }

    async fn query(&self, ring: &[LonLat], year: i32) -> Result<GriddedPopulation, ProviderError> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return Err(ProviderError::NoCoverage);
        }

        let key = (RingKey::new(ring), year);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("WorldPop cache hit for {} vertices, {year}", ring.len());
            return Ok(hit);
        }

        let year_s = year.to_string();
        let geojson = feature_collection(ring).to_string();
        let req = self.client.get(&self.base_url).query(&[
            ("dataset", DATASET),
            ("year", &year_s),
            ("geojson", &geojson),
            ("runasync", "false"),
        ]);

        let response = fetch_json::<StatsResponse>(req).await?;
        let population = interpret(response, pixel_count(ring))?;
        log::debug!(
            "WorldPop total {} over ~{} pixels",
            population.total_population,
            population.pixel_count
        );

        self.cache.insert(key, population);
        Ok(population)
    }
}

/// Build a shareable WorldPop provider.
#[must_use]
pub fn provider(client: Client) -> Arc<dyn GriddedPopulationProvider> {
    Arc::new(WorldPopProvider::new(client))
}

/// Wrap the ring in the single-feature collection the service expects.
fn feature_collection(ring: &[LonLat]) -> FeatureCollection {
    let exterior: LineString<f64> = ring.iter().copied().map(Coord::from).collect();
    let polygon = geo::Geometry::Polygon(Polygon::new(exterior, Vec::new()));
    let feature = Feature {
        bbox: None,
        geometry: Some(Geometry::from(&polygon)),
        id: None,
        properties: Some(JsonObject::new()),
        foreign_members: None,
    };
    FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped to the u32 range before the cast"
)]
fn pixel_count(ring: &[LonLat]) -> u32 {
    (planar_area_sqm(ring) / PIXEL_AREA_SQM)
        .ceil()
        .clamp(0.0, f64::from(u32::MAX)) as u32
}

fn interpret(
    response: StatsResponse,
    pixel_count: u32,
) -> Result<GriddedPopulation, ProviderError> {
    if response.error {
        let message = response
            .error_message
            .unwrap_or_else(|| "unspecified error".to_owned());
        return Err(ProviderError::InvalidResponse(message));
    }
    if response.status != "finished" {
        return Err(ProviderError::InvalidResponse(format!(
            "task not finished: {}",
            response.status
        )));
    }
    let data = response.data.ok_or(ProviderError::NoCoverage)?;
    if !data.total_population.is_finite() || data.total_population < 0.0 {
        return Err(ProviderError::InvalidResponse(format!(
            "unusable total {}",
            data.total_population
        )));
    }

    Ok(GriddedPopulation {
        total_population: data.total_population,
        pixel_count,
    })
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ProviderError> {
    req.send()
        .await
        .map_err(ProviderError::from)?
        .error_for_status()
        .map_err(ProviderError::from)?
        .json()
        .await
        .map_err(ProviderError::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ring() -> Vec<LonLat> {
        vec![
            LonLat::new(28.30, -15.40),
            LonLat::new(28.31, -15.40),
            LonLat::new(28.31, -15.39),
            LonLat::new(28.30, -15.39),
            LonLat::new(28.30, -15.40),
        ]
    }

    fn parse(body: &str) -> StatsResponse {
        serde_json::from_str(body).expect("response parses")
    }

    #[test]
    fn reads_finished_task() {
        let response = parse(
            r#"{"status":"finished","status_code":200,"error":false,"error_message":null,
                "taskid":"5b0e","data":{"total_population":10234.7}}"#,
        );
        let population = interpret(response, 118).expect("population");
        assert!((population.total_population - 10234.7).abs() < 1e-9);
        assert_eq!(population.pixel_count, 118);
    }

    #[test]
    fn reports_service_errors() {
        let response = parse(
            r#"{"status":"finished","error":true,"error_message":"geojson is invalid"}"#,
        );
        assert!(
            matches!(
                interpret(response, 1),
                Err(ProviderError::InvalidResponse(message)) if message == "geojson is invalid"
            ),
            "service error message is kept"
        );
    }

    #[test]
    fn pending_task_is_not_a_population() {
        let response = parse(r#"{"status":"created","error":false,"taskid":"5b0e"}"#);
        assert!(interpret(response, 1).is_err());
    }

    #[test]
    fn geojson_wraps_the_ring() {
        let collection = feature_collection(&ring());
        assert_eq!(collection.features.len(), 1);

        let body = collection.to_string();
        let value: serde_json::Value = serde_json::from_str(&body).expect("body is JSON");
        assert_eq!(value["type"], json!("FeatureCollection"));
        let geometry = &value["features"][0]["geometry"];
        assert_eq!(geometry["type"], json!("Polygon"));
        let coordinates = &geometry["coordinates"][0];
        assert_eq!(coordinates.as_array().map(Vec::len), Some(5));
        assert_eq!(coordinates[1][0], json!(28.31));
        assert_eq!(value["features"][0]["properties"], json!({}));
    }

    #[test]
    fn one_square_kilometre_is_about_a_hundred_pixels() {
        let pixels = pixel_count(&ring());
        assert!((100..=130).contains(&pixels), "got {pixels}");
    }
}
