//! Zone request files.
//!
//! ```toml
//! disposal_site = { lon = 28.36, lat = -15.47 }
//!
//! [[zones]]
//! name = "Matero market"
//! zone_type = "mixed_use"
//! settlement_density = "medium"
//! ring = [[28.30, -15.40], [28.31, -15.40], [28.31, -15.39], [28.30, -15.39], [28.30, -15.40]]
//! collection_efficiency = 0.7
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use wastezone_core::{AnalysisRequest, LonLat, Zone, ZoneAttributes};

/// Contents of a request file.
#[derive(Debug, Deserialize)]
pub(crate) struct RequestFile {
    /// Disposal site used by zones that do not name their own.
    #[serde(default)]
    pub(crate) disposal_site: Option<LonLat>,
    /// Zones to analyse, in output order.
    pub(crate) zones: Vec<ZoneEntry>,
}

/// One zone of a request file.
#[derive(Debug, Deserialize)]
pub(crate) struct ZoneEntry {
    /// Display name.
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Closed ring of `[lon, lat]` pairs.
    pub(crate) ring: Vec<(f64, f64)>,
    /// Land use, density and income band.
    #[serde(flatten)]
    pub(crate) attributes: ZoneAttributes,
    /// Per-zone overrides.
    #[serde(flatten)]
    pub(crate) request: AnalysisRequest,
}

impl RequestFile {
    /// Parse a request file from TOML text.
    pub(crate) fn from_toml_str(text: &str) -> Result<Self> {
        let file: Self = toml::from_str(text).context("Invalid request file")?;
        anyhow::ensure!(!file.zones.is_empty(), "Request file lists no zones");
        Ok(file)
    }

    /// Read and parse a request file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read request file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Validate every zone and resolve the shared disposal site.
    pub(crate) fn into_zones(self) -> Result<Vec<(Zone, AnalysisRequest)>> {
        let shared_site = self.disposal_site;
        self.zones
            .into_iter()
            .enumerate()
            .map(|(index, entry)| -> Result<(Zone, AnalysisRequest)> {
                let label = entry
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("zone #{}", index + 1));
                let ring = entry.ring.into_iter().map(LonLat::from).collect();
                let mut zone = Zone::new(ring, entry.attributes)
                    .with_context(|| format!("Invalid geometry for {label}"))?;
                if let Some(name) = entry.name {
                    zone = zone.with_name(name);
                }
                let mut request = entry.request;
                request.disposal_site = request.disposal_site.or(shared_site);
                Ok((zone, request))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use wastezone_core::{SettlementDensity, SocioeconomicLevel, ZoneType};

    use super::*;

    const REQUEST: &str = r#"
        disposal_site = { lon = 28.36, lat = -15.47 }

        [[zones]]
        name = "Matero market"
        zone_type = "mixed_use"
        settlement_density = "medium"
        ring = [[28.30, -15.40], [28.31, -15.40], [28.31, -15.39], [28.30, -15.39], [28.30, -15.40]]
        collection_efficiency = 0.7

        [[zones]]
        zone_type = "residential"
        settlement_density = "informal"
        socioeconomic_level = "low"
        ring = [[28.32, -15.40], [28.33, -15.40], [28.33, -15.39], [28.32, -15.40]]
        disposal_site = { lon = 28.20, lat = -15.50 }
        waste = { custom_rate_kg = 0.3 }
    "#;

    #[test]
    fn reads_zones_and_overrides() {
        let zones = RequestFile::from_toml_str(REQUEST)
            .expect("request parses")
            .into_zones()
            .expect("zones are valid");
        assert_eq!(zones.len(), 2);

        let (market, market_request) = zones.first().expect("first zone");
        assert_eq!(market.name(), Some("Matero market"));
        assert_eq!(market.zone_type(), ZoneType::MixedUse);
        assert_eq!(market_request.collection_efficiency, Some(0.7));
        assert_eq!(market_request.disposal_site, Some(LonLat::new(28.36, -15.47)));

        let (compound, compound_request) = zones.get(1).expect("second zone");
        assert_eq!(compound.name(), None);
        assert_eq!(compound.settlement_density(), SettlementDensity::Informal);
        assert_eq!(compound.socioeconomic_level(), SocioeconomicLevel::Low);
        assert_eq!(compound_request.disposal_site, Some(LonLat::new(28.20, -15.50)));
        assert_eq!(compound_request.waste.custom_rate_kg, Some(0.3));
    }

    #[test]
    fn open_ring_names_the_zone() {
        let text = r#"
            [[zones]]
            zone_type = "commercial"
            settlement_density = "high"
            ring = [[28.30, -15.40], [28.31, -15.40], [28.31, -15.39]]
        "#;
        let error = RequestFile::from_toml_str(text)
            .expect("request parses")
            .into_zones()
            .expect_err("ring is open");
        assert!(error.to_string().contains("zone #1"));
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(RequestFile::from_toml_str("zones = []").is_err());
    }
}
