//! Validated zone value object.

use serde::{Deserialize, Serialize};

use crate::geometry::{GeometryError, ZoneMetrics, measure_ring};
use crate::model::{LonLat, SettlementDensity, SocioeconomicLevel, ZoneType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Land-use classification of a zone.
pub struct ZoneAttributes {
    /// Land use.
    pub zone_type: ZoneType,
    /// Settlement classification.
    pub settlement_density: SettlementDensity,
    /// Income band.
    #[serde(default)]
    pub socioeconomic_level: SocioeconomicLevel,
}

impl ZoneAttributes {
    /// Attributes with a middle-income default.
    #[must_use]
    pub fn new(zone_type: ZoneType, settlement_density: SettlementDensity) -> Self {
        Self {
            zone_type,
            settlement_density,
            socioeconomic_level: SocioeconomicLevel::Middle,
        }
    }

    /// Override the income band.
    #[must_use]
    pub fn with_socioeconomic_level(mut self, level: SocioeconomicLevel) -> Self {
        self.socioeconomic_level = level;
        self
    }
}

/// A drawn or imported zone whose geometry has been validated and measured.
///
/// A `Zone` can only be obtained through [`Zone::new`], so every instance carries a
/// closed, simple ring with positive area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    name: Option<String>,
    ring: Vec<LonLat>,
    metrics: ZoneMetrics,
    attributes: ZoneAttributes,
}

impl Zone {
    /// Validate and measure a ring.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError`] when the ring cannot be measured.
    pub fn new(ring: Vec<LonLat>, attributes: ZoneAttributes) -> Result<Self, GeometryError> {
        let measured = measure_ring(&ring)?;
        Ok(Self {
            name: None,
            ring: measured.ring,
            metrics: measured.metrics,
            attributes,
        })
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Closed ring as measured.
    #[must_use]
    pub fn ring(&self) -> &[LonLat] {
        &self.ring
    }

    /// Area, perimeter and compactness.
    #[must_use]
    pub fn metrics(&self) -> &ZoneMetrics {
        &self.metrics
    }

    /// Area in square kilometres.
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        self.metrics.area_km2()
    }

    /// Area-weighted centre.
    #[must_use]
    pub fn centroid(&self) -> LonLat {
        self.metrics.centroid
    }

    /// Land-use classification.
    #[must_use]
    pub fn attributes(&self) -> ZoneAttributes {
        self.attributes
    }

    /// Land use.
    #[must_use]
    pub fn zone_type(&self) -> ZoneType {
        self.attributes.zone_type
    }

    /// Settlement classification.
    #[must_use]
    pub fn settlement_density(&self) -> SettlementDensity {
        self.attributes.settlement_density
    }

    /// Income band.
    #[must_use]
    pub fn socioeconomic_level(&self) -> SocioeconomicLevel {
        self.attributes.socioeconomic_level
    }

    /// Whether the shape is less compact than `threshold`.
    #[must_use]
    pub fn is_irregular(&self, threshold: f64) -> bool {
        self.metrics.compactness < threshold
    }
}

#[cfg(test)]
mod tests {
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

    #[test]
    fn builds_measured_zone() {
        let zone = Zone::new(
            ring(),
            ZoneAttributes::new(ZoneType::Residential, SettlementDensity::Informal),
        )
        .expect("zone is valid")
        .with_name("Kanyama east");
        assert_eq!(zone.name(), Some("Kanyama east"));
        assert!(zone.area_km2() > 1.0 && zone.area_km2() < 1.3);
        assert_eq!(zone.socioeconomic_level(), SocioeconomicLevel::Middle);
        assert!(!zone.is_irregular(0.2));
    }

    #[test]
    fn refuses_open_ring() {
        let mut open = ring();
        open.pop();
        let result = Zone::new(
            open,
            ZoneAttributes::new(ZoneType::Commercial, SettlementDensity::High),
        );
        assert_eq!(result, Err(GeometryError::NotClosed));
    }

    #[test]
    fn thin_sliver_is_irregular() {
        let sliver = vec![
            LonLat::new(28.30, -15.400),
            LonLat::new(28.40, -15.400),
            LonLat::new(28.40, -15.399),
            LonLat::new(28.30, -15.399),
            LonLat::new(28.30, -15.400),
        ];
        let zone = Zone::new(
            sliver,
            ZoneAttributes::new(ZoneType::Industrial, SettlementDensity::Low),
        )
        .expect("sliver is valid");
        assert!(zone.is_irregular(0.2));
    }
}
