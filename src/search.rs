//! The two map queries: films shot in a region, and the films of one year
//! shot closest to a reference point.

use crate::catalog::FilmRecord;
use crate::geo::Metric;
use crate::location::{Coordinate, LocationResolver};
use tracing::{debug, info};

/// Films in the nearest layer unless asked otherwise.
pub const DEFAULT_K: usize = 5;

/// Every record whose location contains `pattern` (case-sensitive), in input
/// order, with coordinates resolved.
pub fn filter_by_region(
    records: &[FilmRecord],
    pattern: &str,
    resolver: &LocationResolver,
) -> Vec<FilmRecord> {
    let mut matches: Vec<FilmRecord> = records
        .iter()
        .filter(|r| r.location.contains(pattern))
        .cloned()
        .collect();
    resolver.resolve_all(&mut matches);

    info!(region = pattern, matches = matches.len(), "region filter");
    matches
}

/// Up to `k` records from `year` closest to `reference`, closest first.
///
/// Each returned record carries its `distance` in km. Records whose location
/// could not be resolved are not ranked. Equal distances keep catalog order.
pub fn k_nearest(
    records: &[FilmRecord],
    year: u16,
    reference: Coordinate,
    k: usize,
    resolver: &LocationResolver,
    metric: Metric,
) -> Vec<FilmRecord> {
    if k == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<FilmRecord> =
        records.iter().filter(|r| r.year == year).cloned().collect();
    if candidates.is_empty() {
        info!(year, "no films for year");
        return Vec::new();
    }
    resolver.resolve_all(&mut candidates);

    let total = candidates.len();
    let mut unresolved = 0;
    let mut best = BestK::new(k);
    for mut record in candidates {
        let Some(coords) = record.resolved_coordinates() else {
            unresolved += 1;
            continue;
        };
        let distance = metric.distance(reference, coords);
        record.distance = Some(distance);
        best.offer(distance, record);
    }

    if unresolved > 0 {
        debug!(year, unresolved, "films without a usable location left out of ranking");
    }
    let nearest = best.into_sorted_vec();
    info!(
        year,
        candidates = total,
        kept = nearest.len(),
        metric = %metric,
        "nearest films"
    );
    nearest
}

/// Bounded best-k by sorted insertion, ascending by key.
///
/// Fills to `k` unconditionally; after that a candidate is accepted only if
/// its key is strictly less than the current worst, which is then evicted.
/// Equal keys keep insertion order.
#[derive(Debug)]
pub struct BestK<T> {
    k: usize,
    items: Vec<(f64, T)>,
}

impl<T> BestK<T> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    /// Offer a candidate; returns whether it was kept.
    pub fn offer(&mut self, key: f64, item: T) -> bool {
        if self.k == 0 || key.is_nan() {
            return false;
        }
        if self.items.len() >= self.k {
            match self.items.last() {
                Some((worst, _)) if key < *worst => {
                    self.items.pop();
                }
                _ => return false,
            }
        }
        let pos = self.items.partition_point(|(existing, _)| *existing <= key);
        self.items.insert(pos, (key, item));
        true
    }

    /// Largest kept key, if any.
    pub fn worst(&self) -> Option<f64> {
        self.items.last().map(|(key, _)| *key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_sorted_vec(self) -> Vec<T> {
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}
