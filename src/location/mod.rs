//! Location resolution: free-text place → coordinates.
//!
//! Provides the geocoding providers, the per-run cache and the resolver that
//! degrades an address one comma-separated component at a time.

pub mod cache;
pub mod providers;
pub mod resolver;
pub mod types;

pub use cache::{CacheStats, LocationCache};
pub use providers::{BuiltinLookup, ChainLookup, GeocodeLookup, NominatimConfig, NominatimLookup};
pub use resolver::{LocationResolver, ResolverConfig};
pub use types::{Coordinate, CoordinateParseError, LookupError};
