//! Planar measurement of zone rings.
//!
//! Rings arrive as WGS84 lon/lat pairs. Every measurement is taken after projecting onto a
//! local equirectangular plane centred on the ring, so areas come out in square metres and
//! lengths in metres rather than degrees.

use std::f64::consts::PI;

use geo::{
    Area, Centroid, Coord, Distance, Euclidean, Haversine, Intersects, Length, Line, LineString,
    Point, Polygon,
};
use serde::{Deserialize, Serialize};

use crate::model::LonLat;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Smallest area, in square metres, treated as non-degenerate.
const MIN_AREA_SQM: f64 = 1e-6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Reasons a zone ring cannot be measured.
pub enum GeometryError {
    /// The ring has fewer than four points.
    #[error("Ring has {0} points, at least 4 are required")]
    TooFewPoints(usize),
    /// The first and last points differ.
    #[error("Ring is not closed")]
    NotClosed,
    /// A coordinate is non-finite or outside the WGS84 range.
    #[error("Invalid coordinate at index {0}")]
    InvalidCoordinate(usize),
    /// The ring encloses no area.
    #[error("Polygon has zero area")]
    ZeroArea,
    /// Two non-adjacent edges touch or cross.
    #[error("Polygon is not simple: edges {first} and {second} intersect")]
    SelfIntersecting {
        /// Index of the first offending edge.
        first: usize,
        /// Index of the second offending edge.
        second: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Area, perimeter and shape figures of a zone.
pub struct ZoneMetrics {
    /// Enclosed area in square metres.
    pub area_sqm: f64,
    /// Boundary length in metres.
    pub perimeter_m: f64,
    /// Polsby-Popper compactness, 1.0 for a circle.
    pub compactness: f64,
    /// Area-weighted centre of the ring.
    pub centroid: LonLat,
    /// Whether the repair pass had to modify the ring.
    pub repaired: bool,
}

impl ZoneMetrics {
    /// Area in square kilometres.
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        self.area_sqm / 1_000_000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A ring that passed validation, together with its measurements.
pub struct MeasuredRing {
    /// The ring as measured, after any repair.
    pub ring: Vec<LonLat>,
    /// Measurements of `ring`.
    pub metrics: ZoneMetrics,
}

/// Equirectangular projection around a fixed origin.
#[derive(Debug, Clone, Copy)]
struct LocalPlane {
    origin: LonLat,
    cos_lat: f64,
}

impl LocalPlane {
    /// Centre the plane on the mean of the ring's distinct vertices.
    fn centred_on(ring: &[LonLat]) -> Self {
        let open = open_ring(ring);
        let count = open.len().max(1) as f64;
        let lon = open.iter().map(|pos| pos.lon).sum::<f64>() / count;
        let lat = open.iter().map(|pos| pos.lat).sum::<f64>() / count;
        Self {
            origin: LonLat::new(lon, lat),
            cos_lat: lat.to_radians().cos(),
        }
    }

    fn project(&self, position: LonLat) -> Coord<f64> {
        Coord {
            x: (position.lon - self.origin.lon).to_radians() * EARTH_RADIUS_M * self.cos_lat,
            y: (position.lat - self.origin.lat).to_radians() * EARTH_RADIUS_M,
        }
    }

    fn unproject(&self, coord: Coord<f64>) -> LonLat {
        let lon = if self.cos_lat.abs() > f64::EPSILON {
            self.origin.lon + (coord.x / (EARTH_RADIUS_M * self.cos_lat)).to_degrees()
        } else {
            self.origin.lon
        };
        LonLat::new(lon, self.origin.lat + (coord.y / EARTH_RADIUS_M).to_degrees())
    }

    fn polygon(&self, ring: &[LonLat]) -> Polygon<f64> {
        let exterior: LineString<f64> = ring.iter().map(|pos| self.project(*pos)).collect();
        Polygon::new(exterior, Vec::new())
    }
}

/// Validate a closed ring and measure it, attempting one repair pass on failure.
///
/// # Errors
///
/// Returns a [`GeometryError`] when the ring is too short, open, has invalid coordinates,
/// or remains degenerate or self-intersecting after the repair pass.
pub fn measure_ring(ring: &[LonLat]) -> Result<MeasuredRing, GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::TooFewPoints(ring.len()));
    }
    if let Some(index) = ring.iter().position(|pos| !pos.is_valid()) {
        return Err(GeometryError::InvalidCoordinate(index));
    }
    if ring.first() != ring.last() {
        return Err(GeometryError::NotClosed);
    }

    match measure_valid(ring) {
        Ok(metrics) => Ok(MeasuredRing {
            ring: ring.to_vec(),
            metrics,
        }),
        Err(first_error) => {
            let repaired = repair_ring(ring);
            if repaired.len() == ring.len() {
                return Err(first_error);
            }
            log::debug!(
                "Repaired ring from {} to {} points after: {first_error}",
                ring.len(),
                repaired.len()
            );
            if repaired.len() < 4 {
                return Err(GeometryError::ZeroArea);
            }
            let mut metrics = measure_valid(&repaired)?;
            metrics.repaired = true;
            Ok(MeasuredRing {
                ring: repaired,
                metrics,
            })
        }
    }
}

fn measure_valid(ring: &[LonLat]) -> Result<ZoneMetrics, GeometryError> {
    let plane = LocalPlane::centred_on(ring);
    let polygon = plane.polygon(ring);

    // A bowtie's lobes cancel out, so crossings are checked before area.
    if let Some((first, second)) = first_crossing(polygon.exterior()) {
        return Err(GeometryError::SelfIntersecting { first, second });
    }
    if polygon.signed_area().abs() < MIN_AREA_SQM {
        return Err(GeometryError::ZeroArea);
    }

    let area_sqm = polygon.unsigned_area();
    let perimeter_m = Euclidean.length(polygon.exterior());
    let centroid = polygon
        .centroid()
        .map_or(plane.origin, |point| plane.unproject(point.0));

    Ok(ZoneMetrics {
        area_sqm,
        perimeter_m,
        compactness: polsby_popper(area_sqm, perimeter_m),
        centroid,
        repaired: false,
    })
}

/// Polsby-Popper compactness: `4π·area / perimeter²`.
#[must_use]
pub fn polsby_popper(area_sqm: f64, perimeter_m: f64) -> f64 {
    if perimeter_m <= 0.0 {
        return 0.0;
    }
    4.0 * PI * area_sqm / (perimeter_m * perimeter_m)
}

/// Unsigned planar area of a ring without validation, in square metres.
///
/// Intended for small shapes such as building outlines where a rough figure is enough.
#[must_use]
pub fn planar_area_sqm(ring: &[LonLat]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    LocalPlane::centred_on(ring).polygon(ring).unsigned_area()
}

/// Great-circle distance between two positions in kilometres.
#[must_use]
pub fn haversine_km(origin: LonLat, destination: LonLat) -> f64 {
    let from = Point::new(origin.lon, origin.lat);
    let to = Point::new(destination.lon, destination.lat);
    Haversine.distance(from, to) / 1000.0
}

/// Drop consecutive duplicate vertices and zero-width spikes, keeping the ring closed.
fn repair_ring(ring: &[LonLat]) -> Vec<LonLat> {
    let mut open: Vec<LonLat> = Vec::with_capacity(ring.len());
    for position in open_ring(ring) {
        if open.last() != Some(position) {
            open.push(*position);
        }
    }
    while open.len() > 1 && open.first() == open.last() {
        open.pop();
    }

    // A spike is a vertex whose neighbours coincide; removing it can expose another one.
    let mut changed = true;
    while changed && open.len() >= 3 {
        changed = false;
        let count = open.len();
        let spike = (0..count).find(|&index| {
            let prev = open.get((index + count - 1) % count);
            let next = open.get((index + 1) % count);
            prev == next
        });
        if let Some(index) = spike {
            open.remove(index);
            if let Some(next) = open.get(index % open.len()).copied() {
                let prev_index = (index + open.len() - 1) % open.len();
                if open.get(prev_index) == Some(&next) {
                    open.remove(index % open.len());
                }
            }
            changed = true;
        }
    }

    if let Some(first) = open.first().copied() {
        open.push(first);
    }
    open
}

/// The ring without its closing vertex.
fn open_ring(ring: &[LonLat]) -> &[LonLat] {
    match ring.split_last() {
        Some((last, rest)) if ring.first() == Some(last) => rest,
        _ => ring,
    }
}

/// Find the first pair of non-adjacent edges that intersect.
fn first_crossing(exterior: &LineString<f64>) -> Option<(usize, usize)> {
    let edges: Vec<Line<f64>> = exterior.lines().collect();
    let count = edges.len();
    for (first, edge_a) in edges.iter().enumerate() {
        for (second, edge_b) in edges.iter().enumerate().skip(first + 2) {
            if first == 0 && second + 1 == count {
                continue;
            }
            if edge_a.intersects(edge_b) {
                return Some((first, second));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Roughly a 1 km square near Lusaka.
    fn square() -> Vec<LonLat> {
        vec![
            LonLat::new(28.280, -15.410),
            LonLat::new(28.2893, -15.410),
            LonLat::new(28.2893, -15.401),
            LonLat::new(28.280, -15.401),
            LonLat::new(28.280, -15.410),
        ]
    }

    fn rotate(ring: &[LonLat], by: usize) -> Vec<LonLat> {
        let open = open_ring(ring);
        let mut rotated: Vec<LonLat> = open
            .iter()
            .cycle()
            .skip(by)
            .take(open.len())
            .copied()
            .collect();
        if let Some(first) = rotated.first().copied() {
            rotated.push(first);
        }
        rotated
    }

    #[test]
    fn measures_square_in_metres() {
        let measured = measure_ring(&square()).expect("square is valid");
        let metrics = measured.metrics;
        assert!(
            (metrics.area_sqm - 1_000_000.0).abs() < 20_000.0,
            "area {}",
            metrics.area_sqm
        );
        assert!(
            (metrics.perimeter_m - 4_000.0).abs() < 40.0,
            "perimeter {}",
            metrics.perimeter_m
        );
        assert!(
            (metrics.compactness - PI / 4.0).abs() < 0.01,
            "compactness {}",
            metrics.compactness
        );
        assert!(!metrics.repaired);
    }

    #[test]
    fn rejects_short_and_open_rings() {
        let ring = square();
        assert_eq!(measure_ring(&ring[..3]), Err(GeometryError::TooFewPoints(3)));
        assert_eq!(measure_ring(&ring[..4]), Err(GeometryError::NotClosed));
    }

    #[test]
    fn rejects_bowtie() {
        let bowtie = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(0.01, 0.01),
            LonLat::new(0.01, 0.0),
            LonLat::new(0.0, 0.01),
            LonLat::new(0.0, 0.0),
        ];
        assert_eq!(
            measure_ring(&bowtie),
            Err(GeometryError::SelfIntersecting {
                first: 0,
                second: 2
            })
        );
    }

    #[test]
    fn rejects_collinear_ring() {
        let line = vec![
            LonLat::new(0.0, 0.0),
            LonLat::new(0.01, 0.0),
            LonLat::new(0.02, 0.0),
            LonLat::new(0.0, 0.0),
        ];
        assert_eq!(measure_ring(&line), Err(GeometryError::ZeroArea));
    }

    #[test]
    fn repairs_spike() {
        let mut ring = square();
        // Out-and-back spike from the second vertex.
        ring.insert(2, LonLat::new(28.30, -15.410));
        ring.insert(3, LonLat::new(28.2893, -15.410));
        let measured = measure_ring(&ring).expect("spike is repaired");
        assert!(measured.metrics.repaired);
        assert_eq!(measured.ring.len(), 5);
    }

    #[test]
    fn haversine_of_one_degree_latitude() {
        let distance = haversine_km(LonLat::new(0.0, 0.0), LonLat::new(0.0, 1.0));
        assert!((distance - 111.2).abs() < 0.5, "distance {distance}");
    }

    proptest! {
        #[test]
        fn area_is_invariant_to_rotation_and_direction(
            by in 0usize..4,
            width in 0.001f64..0.05,
            height in 0.001f64..0.05,
            lon in -170.0f64..170.0,
            lat in -60.0f64..60.0,
        ) {
            let ring = vec![
                LonLat::new(lon, lat),
                LonLat::new(lon + width, lat),
                LonLat::new(lon + width * 1.5, lat + height),
                LonLat::new(lon, lat + height),
                LonLat::new(lon, lat),
            ];
            let base = measure_ring(&ring).expect("trapezoid is valid").metrics.area_sqm;
            let rotated = measure_ring(&rotate(&ring, by))
                .expect("rotation is valid")
                .metrics
                .area_sqm;
            let mut reversed = ring.clone();
            reversed.reverse();
            let flipped = measure_ring(&reversed).expect("reversal is valid").metrics.area_sqm;

            prop_assert!(base > 0.0);
            prop_assert!((base - rotated).abs() <= base * 1e-9);
            prop_assert!((base - flipped).abs() <= base * 1e-9);
        }
    }
}
