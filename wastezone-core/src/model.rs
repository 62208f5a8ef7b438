//! Domain enumerations and small value types shared by every analysis stage.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Land use of a zone, selecting the waste rate row.
pub enum ZoneType {
    /// Housing.
    Residential,
    /// Shops and offices; rates are per employee.
    Commercial,
    /// Workshops and plants; rates are per employee.
    Industrial,
    /// Schools, hospitals and public offices.
    Institutional,
    /// Housing combined with commerce.
    MixedUse,
    /// Parks and open land.
    GreenSpace,
}

impl ZoneType {
    /// Every zone type, in table order.
    pub const ALL: [ZoneType; 6] = [
        ZoneType::Residential,
        ZoneType::Commercial,
        ZoneType::Industrial,
        ZoneType::Institutional,
        ZoneType::MixedUse,
        ZoneType::GreenSpace,
    ];
}

impl fmt::Display for ZoneType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            ZoneType::Residential => "residential",
            ZoneType::Commercial => "commercial",
            ZoneType::Industrial => "industrial",
            ZoneType::Institutional => "institutional",
            ZoneType::MixedUse => "mixed_use",
            ZoneType::GreenSpace => "green_space",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Qualitative settlement classification of a zone.
pub enum SettlementDensity {
    /// Dense formal housing.
    High,
    /// Typical formal housing.
    Medium,
    /// Sparse formal housing.
    Low,
    /// Unplanned settlement.
    Informal,
}

impl SettlementDensity {
    /// Every settlement density, in table order.
    pub const ALL: [SettlementDensity; 4] = [
        SettlementDensity::High,
        SettlementDensity::Medium,
        SettlementDensity::Low,
        SettlementDensity::Informal,
    ];
}

impl fmt::Display for SettlementDensity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            SettlementDensity::High => "high",
            SettlementDensity::Medium => "medium",
            SettlementDensity::Low => "low",
            SettlementDensity::Informal => "informal",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
/// Income band of the zone's residents.
pub enum SocioeconomicLevel {
    /// Low income.
    Low,
    /// Middle income.
    #[default]
    Middle,
    /// High income.
    High,
}

impl SocioeconomicLevel {
    /// Every socioeconomic level, lowest first.
    pub const ALL: [SocioeconomicLevel; 3] = [
        SocioeconomicLevel::Low,
        SocioeconomicLevel::Middle,
        SocioeconomicLevel::High,
    ];
}

impl fmt::Display for SocioeconomicLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            SocioeconomicLevel::Low => "low",
            SocioeconomicLevel::Middle => "middle",
            SocioeconomicLevel::High => "high",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Confidence label attached to an estimate. Ordered from least to most trusted.
pub enum Confidence {
    /// Rough fallback figure.
    Low,
    /// Indirect but data-backed figure.
    Medium,
    /// Direct measurement.
    High,
}

impl Confidence {
    /// Weight used when two estimates are blended.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Confidence::Low => 1.0,
            Confidence::Medium => 2.0,
            Confidence::High => 3.0,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Waste fractions a zone's output is split into.
pub enum Fraction {
    /// Residual waste that fits no other stream.
    Residual,
    /// Food and garden waste.
    Organic,
    /// Paper and cardboard.
    Paper,
    /// Plastics and light packaging.
    Plastic,
    /// Glass.
    Glass,
    /// Metal scrap and cans.
    Metal,
    /// Any additional, configuration-defined fraction.
    Other(String),
}

impl fmt::Display for Fraction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fraction::Residual => write!(formatter, "residual"),
            Fraction::Organic => write!(formatter, "organic"),
            Fraction::Paper => write!(formatter, "paper"),
            Fraction::Plastic => write!(formatter, "plastic"),
            Fraction::Glass => write!(formatter, "glass"),
            Fraction::Metal => write!(formatter, "metal"),
            Fraction::Other(name) => write!(formatter, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Geographic position in WGS84 degrees.
pub struct LonLat {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl LonLat {
    /// Construct a position from longitude and latitude.
    #[must_use]
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Check both components are finite and inside the WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl From<LonLat> for geo::Coord<f64> {
    fn from(position: LonLat) -> Self {
        geo::Coord {
            x: position.lon,
            y: position.lat,
        }
    }
}

impl fmt::Display for LonLat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.6},{:.6}", self.lon, self.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_orders_low_to_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
        assert!(Confidence::High.weight() > Confidence::Medium.weight());
    }

    #[test]
    fn slugs_match_serde_names() {
        assert_eq!(ZoneType::MixedUse.to_string(), "mixed_use");
        assert_eq!(ZoneType::GreenSpace.to_string(), "green_space");
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ZoneType,
        }

        let parsed: Wrapper = toml::from_str("kind = \"mixed_use\"").expect("zone type parses");
        assert_eq!(parsed.kind, ZoneType::MixedUse);
    }

    #[test]
    fn rejects_out_of_range_positions() {
        assert!(LonLat::new(28.28, -15.41).is_valid());
        assert!(!LonLat::new(181.0, 0.0).is_valid());
        assert!(!LonLat::new(0.0, f64::NAN).is_valid());
    }
}
