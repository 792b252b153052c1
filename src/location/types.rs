//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Marker for "resolution exhausted, no location found".
    ///
    /// Longitude -179 is in range; the pair is picked to be recognizably fake
    /// (open ocean off Antarctica) rather than to be a null.
    pub const SENTINEL: Coordinate = Coordinate { lat: -69.0, lon: -179.0 };

    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_plausible(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// A genuine location: plausible and not the sentinel.
    pub fn is_resolved(&self) -> bool {
        self.is_plausible() && !self.is_sentinel()
    }
}

/// Formats as the literal pair `(lat, lon)` used by the cached dataset file.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid coordinate literal '{0}'")]
pub struct CoordinateParseError(pub String);

/// Parses `(lat, lon)`, `[lat, lon]` or a bare `lat, lon`.
impl FromStr for Coordinate {
    type Err = CoordinateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CoordinateParseError(s.to_string());
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .or_else(|| trimmed.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')))
            .unwrap_or(trimmed);

        let mut parts = inner.split(',');
        let lat = parts.next().ok_or_else(err)?.trim().parse::<f64>().map_err(|_| err())?;
        let lon = parts.next().ok_or_else(err)?.trim().parse::<f64>().map_err(|_| err())?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Coordinate { lat, lon })
    }
}

/// Failure modes of a single geocoding lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no match for '{0}'")]
    NotFound(String),

    /// Transient: network failure, timeout, rate limiting, 5xx.
    #[error("geocoding service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_plausible_but_not_resolved() {
        assert!(Coordinate::SENTINEL.is_plausible());
        assert!(!Coordinate::SENTINEL.is_resolved());
        assert!(Coordinate::new(49.84, 24.03).is_resolved());
    }

    #[test]
    fn test_implausible() {
        assert!(!Coordinate::new(91.0, 0.0).is_plausible());
        assert!(!Coordinate::new(0.0, -180.5).is_plausible());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_resolved());
    }

    #[test]
    fn test_parse_literal_pair() {
        let c: Coordinate = "(49.4871968, 31.2718321)".parse().unwrap();
        assert_eq!(c, Coordinate::new(49.4871968, 31.2718321));

        let c: Coordinate = "[-69.0, -179.0]".parse().unwrap();
        assert!(c.is_sentinel());

        let c: Coordinate = " 10, 20 ".parse().unwrap();
        assert_eq!(c, Coordinate::new(10.0, 20.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Coordinate>().is_err());
        assert!("(1.0)".parse::<Coordinate>().is_err());
        assert!("(1, 2, 3)".parse::<Coordinate>().is_err());
        assert!("__import__('os')".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let c = Coordinate::new(-33.8688, 151.2093);
        assert_eq!(c.to_string(), "(-33.8688, 151.2093)");
        assert_eq!(c.to_string().parse::<Coordinate>().unwrap(), c);
    }

    #[test]
    fn test_display_whole_numbers() {
        assert_eq!(Coordinate::SENTINEL.to_string(), "(-69.0, -179.0)");
    }
}
