//! Building footprint provider using the OpenStreetMap Overpass API.
//!
//! Every closed `building=*` way inside the zone becomes one footprint. Mapped outlines carry
//! no detection score, so they are reported with full confidence.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use wastezone_core::{
    cache::{QueryCache, RingKey},
    geometry::planar_area_sqm,
    model::LonLat,
    ports::{BuildingFootprint, BuildingFootprintProvider, ProviderError},
};

const BASE_URL: &str = "https://overpass-api.de/api/interpreter";
const SERVER_TIMEOUT_SECS: u32 = 25;
const MAPPED_CONFIDENCE: f64 = 1.0;
const CACHE_CAPACITY: usize = 64;

/// Response from /api/interpreter with `[out:json]`
#[derive(Debug, Deserialize)]
struct InterpreterResponse {
    #[serde(default)]
    elements: Vec<Element>,
    // runtime errors are reported here next to a partial result
    #[serde(default)]
    remark: Option<String>,
}

/// Single element; only ways with `out geom` carry a geometry.
#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    geometry: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Node {
    lat: f64,
    lon: f64,
}

/// Building outlines from OpenStreetMap.
pub struct OverpassProvider {
    client: Client,
    base_url: String,
    cache: QueryCache<RingKey, Vec<BuildingFootprint>>,
}

impl OverpassProvider {
    /// Create a provider bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
            cache: QueryCache::new(CACHE_CAPACITY),
        }
    }

    /// Use another Overpass instance.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Answers cached by this provider.
    #[must_use]
    pub fn cache(&self) -> &QueryCache<RingKey, Vec<BuildingFootprint>> {
        &self.cache
    }
}

#[async_trait]
impl BuildingFootprintProvider for OverpassProvider {
    fn name(&self) -> &str {
        "overpass"
    }

    async fn query(
        &self,
        ring: &[LonLat],
        confidence_threshold: f64,
    ) -> Result<Vec<BuildingFootprint>, ProviderError> {
        let key = RingKey::new(ring);
        let footprints = if let Some(hit) = self.cache.get(&key) {
            log::debug!("Overpass cache hit for {} vertices", ring.len());
            hit
        } else {
            let req = self
                .client
                .get(&self.base_url)
                .query(&[("data", building_query(ring))]);
            let response = fetch_json::<InterpreterResponse>(req).await?;
            let footprints = footprints(response)?;
            log::debug!("Overpass returned {} buildings", footprints.len());
            self.cache.insert(key, footprints.clone());
            footprints
        };

        Ok(footprints
            .into_iter()
            .filter(|footprint| footprint.confidence >= confidence_threshold)
            .collect())
    }
}

/// Build a shareable Overpass provider.
#[must_use]
pub fn provider(client: Client) -> Arc<dyn BuildingFootprintProvider> {
    Arc::new(OverpassProvider::new(client))
}

/// Overpass QL selecting building ways inside the ring.
fn building_query(ring: &[LonLat]) -> String {
    // poly filter wants "lat lon" pairs and closes the ring itself
    let open = match ring {
        [rest @ .., last] if rest.first() == Some(last) => rest,
        _ => ring,
    };
    let poly = open
        .iter()
        .map(|pos| format!("{} {}", pos.lat, pos.lon))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "[out:json][timeout:{SERVER_TIMEOUT_SECS}];way[\"building\"](poly:\"{poly}\");out geom;"
    )
}

fn footprints(response: InterpreterResponse) -> Result<Vec<BuildingFootprint>, ProviderError> {
    if let Some(remark) = response.remark
        && response.elements.is_empty()
    {
        return Err(ProviderError::InvalidResponse(remark));
    }

    Ok(response
        .elements
        .into_iter()
        .filter(|element| element.typ == "way")
        .filter_map(|element| {
            let outline: Vec<LonLat> = element
                .geometry
                .iter()
                .map(|node| LonLat::new(node.lon, node.lat))
                .collect();
            let closed = outline.len() >= 4 && outline.first() == outline.last();
            let area_sqm = planar_area_sqm(&outline);
            (closed && area_sqm > 0.0).then_some(BuildingFootprint {
                area_sqm,
                confidence: MAPPED_CONFIDENCE,
            })
        })
        .collect())
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
