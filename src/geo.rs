//! Great-circle distances between coordinates, in kilometres.
//!
//! Two metrics: haversine on a sphere of mean Earth radius, and the WGS-84
//! ellipsoidal distance via Vincenty's inverse formula (accurate to well
//! under a metre; falls back to haversine for near-antipodal points where the
//! iteration does not converge).

use crate::location::Coordinate;
use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// IUGG mean Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = (1.0 - WGS84_F) * WGS84_A;

const VINCENTY_MAX_ITER: usize = 200;
const VINCENTY_EPSILON: f64 = 1e-12;

/// Which distance formula to rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    Haversine,
    #[default]
    Geodesic,
}

impl Metric {
    pub fn distance(self, a: Coordinate, b: Coordinate) -> f64 {
        match self {
            Self::Haversine => haversine(a, b),
            Self::Geodesic => geodesic(a, b),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Haversine => write!(f, "haversine"),
            Self::Geodesic => write!(f, "geodesic"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "haversine" | "sphere" | "great-circle" => Ok(Self::Haversine),
            "geodesic" | "vincenty" | "ellipsoid" | "wgs84" => Ok(Self::Geodesic),
            _ => Err(format!("Unknown metric '{}'. Use 'geodesic' or 'haversine'.", s)),
        }
    }
}

/// Spherical great-circle distance.
pub fn haversine(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    // abs() keeps the result bit-for-bit symmetric in (a, b)
    let dlat = (b.lat - a.lat).abs().to_radians();
    let dlon = (b.lon - a.lon).abs().to_radians();

    let s1 = (dlat / 2.0).sin();
    let s2 = (dlon / 2.0).sin();
    let h = s1 * s1 + lat1.cos() * lat2.cos() * s2 * s2;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Ellipsoidal (WGS-84) distance, haversine when Vincenty does not converge.
pub fn geodesic(a: Coordinate, b: Coordinate) -> f64 {
    vincenty(a, b).unwrap_or_else(|| haversine(a, b))
}

/// Vincenty's inverse formula; `None` if the iteration fails to converge.
///
/// Endpoints are put in a fixed order first, so the result is bit-for-bit
/// the same for `(a, b)` and `(b, a)`.
pub fn vincenty(a: Coordinate, b: Coordinate) -> Option<f64> {
    if a == b {
        return Some(0.0);
    }
    let (a, b) = canonical_order(a, b);

    let l = (b.lon - a.lon).to_radians();
    let u1 = ((1.0 - WGS84_F) * a.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..VINCENTY_MAX_ITER {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0); // coincident points
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // equatorial line: cos_sq_alpha = 0
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));

        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m
                            + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if lambda.abs() > PI {
            return None;
        }

        if (lambda - lambda_prev).abs() < VINCENTY_EPSILON {
            let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                                * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
            let metres = WGS84_B * big_a * (sigma - delta_sigma);
            return Some(metres / 1000.0);
        }
    }
    None
}

fn canonical_order(a: Coordinate, b: Coordinate) -> (Coordinate, Coordinate) {
    match (b.lat, b.lon).partial_cmp(&(a.lat, a.lon)) {
        Some(Ordering::Less) => (b, a),
        _ => (a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LVIV: Coordinate = Coordinate::new(49.817545, 24.023932);
    const KYIV: Coordinate = Coordinate::new(50.4500336, 30.5241361);
    const NYC: Coordinate = Coordinate::new(40.7127281, -74.0060152);

    #[test]
    fn test_zero_distance_to_self() {
        for c in [LVIV, KYIV, NYC, Coordinate::SENTINEL, Coordinate::new(0.0, 0.0)] {
            assert_eq!(haversine(c, c), 0.0);
            assert_eq!(geodesic(c, c), 0.0);
        }
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            (LVIV, KYIV),
            (KYIV, NYC),
            (NYC, Coordinate::SENTINEL),
            (Coordinate::new(60.0, 150.0), Coordinate::new(30.0, 15.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine(a, b), haversine(b, a));
        }
    }

    /// Deterministic points spread over the globe (xorshift).
    fn scattered_points(n: usize) -> Vec<Coordinate> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|_| Coordinate::new(next() * 180.0 - 90.0, next() * 360.0 - 180.0))
            .collect()
    }

    #[test]
    fn test_geodesic_symmetric() {
        for (a, b) in [(LVIV, KYIV), (KYIV, NYC), (NYC, Coordinate::SENTINEL)] {
            assert_eq!(geodesic(a, b), geodesic(b, a));
        }

        let points = scattered_points(2000);
        for pair in points.chunks_exact(2) {
            let (a, b) = (pair[0], pair[1]);
            assert_eq!(geodesic(a, b), geodesic(b, a), "{:?} {:?}", a, b);
            assert_eq!(haversine(a, b), haversine(b, a), "{:?} {:?}", a, b);
        }

        let a = Coordinate::new(-60.9043, 117.3996);
        let b = Coordinate::new(-3.9685, -60.2146);
        assert_eq!(geodesic(a, b), geodesic(b, a));
    }

    #[test]
    fn test_geodesic_symmetric_near_antipodal() {
        for a in scattered_points(500) {
            let lon = if a.lon > 0.0 { a.lon - 179.6 } else { a.lon + 179.6 };
            let b = Coordinate::new(-a.lat * 0.99, lon);
            assert_eq!(geodesic(a, b), geodesic(b, a), "{:?} {:?}", a, b);
        }
    }

    #[test]
    fn test_geodesic_known_value() {
        // WGS-84 reference value for this pair
        let d = geodesic(Coordinate::new(60.0, 150.0), Coordinate::new(30.0, 15.0));
        assert_relative_eq!(d, 9217.59933, epsilon = 1e-3);
    }

    #[test]
    fn test_haversine_close_to_geodesic() {
        let h = haversine(LVIV, KYIV);
        let g = geodesic(LVIV, KYIV);
        assert!(h > 460.0 && h < 480.0, "{}", h);
        assert!((h - g).abs() / g < 0.005);
    }

    #[test]
    fn test_one_degree_of_longitude_on_equator() {
        let d = geodesic(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        assert_relative_eq!(d, 111.319_490_8, epsilon = 1e-3);
    }

    #[test]
    fn test_monotonic_along_meridian() {
        let origin = Coordinate::new(0.0, 0.0);
        let mut prev_h = 0.0;
        let mut prev_g = 0.0;
        for deg in 1..=89 {
            let p = Coordinate::new(deg as f64, 0.0);
            let (h, g) = (haversine(origin, p), geodesic(origin, p));
            assert!(h > prev_h);
            assert!(g > prev_g);
            prev_h = h;
            prev_g = g;
        }
    }

    #[test]
    fn test_antipodal_falls_back() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.5, 179.7);
        let d = geodesic(a, b);
        assert!(d.is_finite());
        assert!(d > 19_900.0 && d < 20_050.0, "{}", d);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("geodesic".parse::<Metric>().unwrap(), Metric::Geodesic);
        assert_eq!("Haversine".parse::<Metric>().unwrap(), Metric::Haversine);
        assert!("manhattan".parse::<Metric>().is_err());
        assert_eq!(Metric::default(), Metric::Geodesic);
    }
}
