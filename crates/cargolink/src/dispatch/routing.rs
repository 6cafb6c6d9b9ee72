//! Distance and ETA estimation. The trait is the seam for a road-network
//! service; the built-in implementation works on great-circle geometry.

use serde::Serialize;

use super::domain::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance and travel-time figures for a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub eta_min: f64,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub average_speed_kmph: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmph: 32.0,
        }
    }
}

/// Seam for the external routing collaborator.
pub trait RouteEstimator: Send + Sync {
    fn estimate(&self, from: GeoPoint, to: GeoPoint) -> RouteEstimate;

    /// Smallest distance in km from `point` to the polyline `route`. An empty
    /// route is infinitely far from everything.
    fn deviation_km(&self, route: &[GeoPoint], point: GeoPoint) -> f64;

    fn is_on_path(&self, route: &[GeoPoint], point: GeoPoint, tolerance_km: f64) -> bool {
        self.deviation_km(route, point) <= tolerance_km
    }
}

/// Great-circle estimator with a flat city-average speed.
#[derive(Debug, Clone, Default)]
pub struct HaversineEstimator {
    config: RoutingConfig,
}

impl HaversineEstimator {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }
}

impl RouteEstimator for HaversineEstimator {
    fn estimate(&self, from: GeoPoint, to: GeoPoint) -> RouteEstimate {
        let distance_km = haversine_km(from, to);
        RouteEstimate {
            distance_km,
            eta_min: distance_km / self.config.average_speed_kmph * 60.0,
        }
    }

    fn deviation_km(&self, route: &[GeoPoint], point: GeoPoint) -> f64 {
        match route {
            [] => f64::INFINITY,
            [only] => haversine_km(*only, point),
            _ => route
                .windows(2)
                .map(|pair| segment_distance_km(pair[0], pair[1], point))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

pub(crate) fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Point-to-segment distance on a local equirectangular projection centred on
/// `point`. Adequate at the city scales the route-tolerance check runs at.
fn segment_distance_km(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> f64 {
    let scale = point.lat.to_radians().cos();
    let to_xy = |p: GeoPoint| {
        (
            (p.lng - point.lng).to_radians() * scale * EARTH_RADIUS_KM,
            (p.lat - point.lat).to_radians() * EARTH_RADIUS_KM,
        )
    };

    let (sx, sy) = to_xy(start);
    let (ex, ey) = to_xy(end);
    let (dx, dy) = (ex - sx, ey - sy);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (sx * sx + sy * sy).sqrt();
    }

    // project the point (the local origin) onto the segment
    let t = ((-sx * dx - sy * dy) / length_sq).clamp(0.0, 1.0);
    let (px, py) = (sx + t * dx, sy + t * dy);
    (px * px + py * py).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Des Moines to Ames is roughly 49 km as the crow flies.
        let des_moines = point(41.5868, -93.6250);
        let ames = point(42.0308, -93.6319);
        let distance = haversine_km(des_moines, ames);
        assert!(
            (48.0..51.0).contains(&distance),
            "unexpected distance {distance}"
        );
    }

    #[test]
    fn estimate_converts_distance_to_minutes() {
        let estimator = HaversineEstimator::new(RoutingConfig {
            average_speed_kmph: 60.0,
        });
        let estimate = estimator.estimate(point(41.60, -93.60), point(41.60, -93.48));
        assert!((estimate.eta_min - estimate.distance_km).abs() < 1e-9);
    }

    #[test]
    fn deviation_is_zero_on_the_route() {
        let estimator = HaversineEstimator::default();
        let route = vec![point(41.50, -93.70), point(41.70, -93.50)];
        let midpoint = point(41.60, -93.60);
        assert!(estimator.deviation_km(&route, midpoint) < 0.2);
    }

    #[test]
    fn deviation_reflects_offset_from_the_route() {
        let estimator = HaversineEstimator::default();
        let route = vec![point(41.60, -93.80), point(41.60, -93.40)];
        // roughly 11 km north of the east-west segment
        let off_path = point(41.70, -93.60);
        let deviation = estimator.deviation_km(&route, off_path);
        assert!(
            (10.0..13.0).contains(&deviation),
            "unexpected deviation {deviation}"
        );
        assert!(!estimator.is_on_path(&route, off_path, 3.0));
    }

    #[test]
    fn empty_route_is_never_on_path() {
        let estimator = HaversineEstimator::default();
        assert_eq!(
            estimator.deviation_km(&[], point(41.60, -93.60)),
            f64::INFINITY
        );
    }
}
