//! Road distance provider using the OSRM `route` service.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use wastezone_core::{
    cache::{QueryCache, RingKey},
    model::LonLat,
    ports::{ProviderError, RouteDistance, RoutingDistanceProvider},
};

const BASE_URL: &str = "https://router.project-osrm.org";
const PROFILE: &str = "driving";
const CACHE_CAPACITY: usize = 512;

/// Response from /route/v1/{profile}/{coordinates}
#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

/// One route; distance in metres, duration in seconds.
#[derive(Debug, Deserialize)]
struct Route {
    distance: f64,
    duration: f64,
}

/// Road distances from an OSRM instance.
pub struct OsrmProvider {
    client: Client,
    base_url: String,
    cache: QueryCache<RingKey, RouteDistance>,
}

impl OsrmProvider {
    /// Create a provider bound to the given HTTP client, using the public demo server.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
            cache: QueryCache::new(CACHE_CAPACITY),
        }
    }

    /// Use a self-hosted OSRM instance.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Answers cached by this provider.
    #[must_use]
    pub fn cache(&self) -> &QueryCache<RingKey, RouteDistance> {
        &self.cache
    }
}

#[async_trait]
impl RoutingDistanceProvider for OsrmProvider {
    fn name(&self) -> &str {
        "osrm"
    }

    async fn query(
        &self,
        origin: LonLat,
        destination: LonLat,
    ) -> Result<RouteDistance, ProviderError> {
        let key = RingKey::new(&[origin, destination]);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let url = format!(
            "{}/route/v1/{PROFILE}/{},{};{},{}",
            self.base_url.trim_end_matches('/'),
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        );
        let req = self.client.get(url).query(&[("overview", "false")]);
        let route = shortest(fetch_json::<RouteResponse>(req).await?)?;
        log::debug!(
            "OSRM {origin} -> {destination}: {:.1} km, {:.0} min",
            route.distance_km,
            route.duration_min
        );

        self.cache.insert(key, route);
        Ok(route)
    }
}

/// Build a shareable OSRM provider.
#[must_use]
pub fn provider(client: Client) -> Arc<dyn RoutingDistanceProvider> {
    Arc::new(OsrmProvider::new(client))
}

fn shortest(response: RouteResponse) -> Result<RouteDistance, ProviderError> {
    match response.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Err(ProviderError::NoCoverage),
        code => {
            let detail = response.message.unwrap_or_default();
            return Err(ProviderError::InvalidResponse(format!("{code}: {detail}")));
        }
    }

    response
        .routes
        .into_iter()
        .min_by(|left, right| left.distance.total_cmp(&right.distance))
        .map(|route| RouteDistance {
            distance_km: route.distance / 1000.0,
            duration_min: route.duration / 60.0,
        })
        .ok_or(ProviderError::NoCoverage)
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
    use super::*;

    fn parse(body: &str) -> RouteResponse {
        serde_json::from_str(body).expect("response parses")
    }

    #[test]
    fn converts_units() {
        let response = parse(
            r#"{"code":"Ok","routes":[{"distance":12500.0,"duration":1260.0,"legs":[]}],
                "waypoints":[]}"#,
        );
        let route = shortest(response).expect("route");
        assert!((route.distance_km - 12.5).abs() < 1e-9);
        assert!((route.duration_min - 21.0).abs() < 1e-9);
    }

    #[test]
    fn picks_the_shortest_alternative() {
        let response = parse(
            r#"{"code":"Ok","routes":[
                {"distance":9000.0,"duration":600.0},
                {"distance":7000.0,"duration":900.0}]}"#,
        );
        let route = shortest(response).expect("route");
        assert!((route.distance_km - 7.0).abs() < 1e-9);
    }

    #[test]
    fn no_route_is_missing_coverage() {
        let response = parse(r#"{"code":"NoRoute","message":"Impossible route"}"#);
        assert!(matches!(shortest(response), Err(ProviderError::NoCoverage)));
    }

    #[test]
    fn other_codes_are_invalid_responses() {
        let response = parse(r#"{"code":"InvalidQuery","message":"bad coordinates"}"#);
        assert!(
            matches!(
                shortest(response),
                Err(ProviderError::InvalidResponse(message))
                    if message == "InvalidQuery: bad coordinates"
            ),
            "code and message are reported"
        );
    }
}
