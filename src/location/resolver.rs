//! Location resolver: memoized lookup with fallback by truncation.
//!
//! Flow for "Rynok Square, Lviv, Ukraine":
//!   cache → lookup("Rynok Square, Lviv, Ukraine") → lookup("Lviv, Ukraine")
//!   → lookup("Ukraine") → sentinel
//! Every string tried is cached with the final answer.

use super::cache::{CacheStats, LocationCache};
use super::providers::{BuiltinLookup, GeocodeLookup};
use super::types::{Coordinate, LookupError};
use crate::catalog::FilmRecord;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Worker threads for batch resolution. 1 resolves inline.
    pub threads: usize,
    /// Extra attempts when the provider reports itself unavailable.
    pub retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { threads: 1, retries: 1 }
    }
}

/// The location resolver with its per-run cache.
pub struct LocationResolver {
    lookup: Box<dyn GeocodeLookup>,
    cache: LocationCache,
    config: ResolverConfig,
    pool: Option<rayon::ThreadPool>,
}

impl LocationResolver {
    pub fn new(lookup: Box<dyn GeocodeLookup>) -> Self {
        Self::with_config(lookup, ResolverConfig::default())
    }

    pub fn with_config(lookup: Box<dyn GeocodeLookup>, config: ResolverConfig) -> Self {
        let pool = if config.threads > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("geocode-{}", i))
                .build()
                .map_err(|e| warn!(error = %e, "could not start resolver pool, resolving inline"))
                .ok()
        } else {
            None
        };

        Self {
            lookup,
            cache: LocationCache::new(),
            config,
            pool,
        }
    }

    /// Resolver backed only by the built-in gazetteer.
    pub fn offline() -> Self {
        Self::new(Box::new(BuiltinLookup::new()))
    }

    /// Best available coordinate for `place`; the sentinel if nothing matched.
    ///
    /// Never fails. Repeated calls with the same string return the identical
    /// coordinate without touching the provider again.
    pub fn resolve(&self, place: &str) -> Coordinate {
        if is_blank(place) {
            return Coordinate::SENTINEL;
        }
        if let Some(coord) = self.cache.get(place) {
            return coord;
        }

        let mut tried: Vec<&str> = Vec::new();
        let mut candidate = place;
        let result = loop {
            if is_blank(candidate) {
                break Coordinate::SENTINEL;
            }
            if !tried.is_empty() {
                if let Some(coord) = self.cache.get(candidate) {
                    break coord;
                }
            }

            tried.push(candidate);
            let found = self.cache.lookup_once(candidate, || self.lookup_with_retry(candidate));
            if let Some(coord) = found {
                break coord;
            }

            match drop_leading_component(candidate) {
                Some(rest) => {
                    debug!(from = candidate, to = rest, "no match, widening query");
                    candidate = rest;
                }
                None => break Coordinate::SENTINEL,
            }
        };

        if result.is_sentinel() {
            debug!(place, "resolution exhausted");
        }
        for key in &tried[1..] {
            self.cache.put(key, result);
        }
        self.cache.put(place, result)
    }

    fn lookup_with_retry(&self, text: &str) -> Option<Coordinate> {
        let mut attempt = 0;
        loop {
            match self.lookup.query(text) {
                Ok(coord) if coord.is_resolved() => {
                    debug!(query = text, lat = coord.lat, lon = coord.lon, "lookup hit");
                    return Some(coord);
                }
                Ok(coord) => {
                    warn!(
                        query = text,
                        lat = coord.lat,
                        lon = coord.lon,
                        "provider returned implausible coordinate"
                    );
                    return None;
                }
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(query = text, error = %e, attempt, "geocoder unavailable, retrying");
                }
                Err(LookupError::NotFound(_)) => {
                    debug!(query = text, "lookup miss");
                    return None;
                }
                Err(e) => {
                    warn!(query = text, error = %e, "lookup failed, falling back");
                    return None;
                }
            }
        }
    }

    /// Fill in `coordinates` on every record that lacks them.
    ///
    /// Runs on the resolver's thread pool when one is configured. Each
    /// distinct location string is looked up at most once regardless.
    pub fn resolve_all(&self, records: &mut [FilmRecord]) {
        let pending = records.iter().filter(|r| r.coordinates.is_none()).count();
        if pending == 0 {
            return;
        }

        let resolve_one = |record: &mut FilmRecord| {
            if record.coordinates.is_none() {
                record.coordinates = Some(self.resolve(&record.location));
            }
        };

        match &self.pool {
            Some(pool) => pool.install(|| records.par_iter_mut().for_each(resolve_one)),
            None => records.iter_mut().for_each(resolve_one),
        }

        let stats = self.cache.stats();
        info!(
            records = pending,
            lookups = stats.lookups,
            cached = stats.entries,
            "resolved locations"
        );
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }
}

/// No letters or digits at all: empty, whitespace, punctuation.
fn is_blank(place: &str) -> bool {
    !place.chars().any(char::is_alphanumeric)
}

/// "Street, City, Country" → "City, Country"; `None` once no comma is left.
fn drop_leading_component(place: &str) -> Option<&str> {
    place.split_once(',').map(|(_, rest)| rest.trim_start())
}
