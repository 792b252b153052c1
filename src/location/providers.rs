//! Geocoding providers: Nominatim, a built-in offline gazetteer, and a chain
//! that tries several in order.

use super::types::{Coordinate, LookupError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// One free-text geocoding query against some backend.
pub trait GeocodeLookup: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Coordinates of the best match for `text`.
    fn query(&self, text: &str) -> Result<Coordinate, LookupError>;
}

// ─── Built-in gazetteer ─────────────────────────────────────────

struct BuiltinPlace {
    names: &'static [&'static str], // canonical + aliases, lowercase
    lat: f64,
    lon: f64,
}

#[rustfmt::skip]
const BUILTIN_PLACES: &[BuiltinPlace] = &[
    BuiltinPlace { names: &["ukraine", "україна"], lat: 49.4871968, lon: 31.2718321 },
    BuiltinPlace { names: &["lviv", "lviv, ukraine", "lemberg", "lwów"], lat: 49.841952, lon: 24.0315921 },
    BuiltinPlace { names: &["kyiv", "kiev", "kyiv, ukraine", "kiev, ukraine"], lat: 50.4500336, lon: 30.5241361 },
    BuiltinPlace { names: &["odesa", "odessa", "odesa, ukraine", "odessa, ukraine"], lat: 46.4843023, lon: 30.7322878 },
    BuiltinPlace { names: &["kharkiv", "kharkov", "kharkiv, ukraine"], lat: 49.9923181, lon: 36.2310146 },
    BuiltinPlace { names: &["usa", "united states", "united states of america", "us"], lat: 39.7837304, lon: -100.445882 },
    BuiltinPlace { names: &["california", "california, usa"], lat: 36.7014631, lon: -119.4615 },
    BuiltinPlace { names: &["texas", "texas, usa"], lat: 31.2638905, lon: -98.5456116 },
    BuiltinPlace { names: &["new york city", "new york city, new york, usa", "nyc"], lat: 40.7127281, lon: -74.0060152 },
    BuiltinPlace { names: &["los angeles", "los angeles, california, usa"], lat: 34.0536909, lon: -118.242766 },
    BuiltinPlace { names: &["uk", "united kingdom", "great britain"], lat: 54.7023545, lon: -3.2765753 },
    BuiltinPlace { names: &["london", "london, england, uk"], lat: 51.5073219, lon: -0.1276474 },
    BuiltinPlace { names: &["france"], lat: 46.603354, lon: 1.8883335 },
    BuiltinPlace { names: &["paris", "paris, france"], lat: 48.8588897, lon: 2.320041 },
    BuiltinPlace { names: &["germany", "deutschland"], lat: 51.1638175, lon: 10.4478313 },
    BuiltinPlace { names: &["berlin", "berlin, germany"], lat: 52.5170365, lon: 13.3888599 },
    BuiltinPlace { names: &["italy", "italia"], lat: 42.6384261, lon: 12.674297 },
    BuiltinPlace { names: &["rome", "rome, lazio, italy"], lat: 41.8933203, lon: 12.4829321 },
    BuiltinPlace { names: &["spain", "españa"], lat: 39.3260685, lon: -4.8379791 },
    BuiltinPlace { names: &["poland", "polska"], lat: 52.215933, lon: 19.134422 },
    BuiltinPlace { names: &["warsaw", "warsaw, poland", "warszawa"], lat: 52.2319581, lon: 21.0067249 },
    BuiltinPlace { names: &["russia"], lat: 64.6863136, lon: 97.7453061 },
    BuiltinPlace { names: &["canada"], lat: 61.0666922, lon: -107.991707 },
    BuiltinPlace { names: &["toronto", "toronto, ontario, canada"], lat: 43.6534817, lon: -79.3839347 },
    BuiltinPlace { names: &["mexico", "méxico"], lat: 23.6585116, lon: -102.0077097 },
    BuiltinPlace { names: &["brazil", "brasil"], lat: -10.3333333, lon: -53.2 },
    BuiltinPlace { names: &["australia"], lat: -24.7761086, lon: 134.755 },
    BuiltinPlace { names: &["sydney", "sydney, new south wales, australia"], lat: -33.8698439, lon: 151.2082848 },
    BuiltinPlace { names: &["japan"], lat: 36.5748441, lon: 139.2394179 },
    BuiltinPlace { names: &["tokyo", "tokyo, japan"], lat: 35.6812665, lon: 139.757653 },
    BuiltinPlace { names: &["india"], lat: 22.3511148, lon: 78.6677428 },
    BuiltinPlace { names: &["mumbai", "mumbai, maharashtra, india", "bombay"], lat: 19.0785451, lon: 72.878176 },
];

/// Offline lookup over an exact-match (case-insensitive) table.
///
/// Only whole strings match; degrading "Street, City, Country" to a known
/// entry is the resolver's job.
pub struct BuiltinLookup {
    places: HashMap<String, Coordinate>,
}

impl BuiltinLookup {
    /// The bundled gazetteer of countries and major cities.
    pub fn new() -> Self {
        Self::from_entries(
            BUILTIN_PLACES
                .iter()
                .flat_map(|p| p.names.iter().map(move |n| (*n, Coordinate::new(p.lat, p.lon)))),
        )
    }

    /// A custom table, e.g. for tests or a user-provided gazetteer.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Coordinate)>,
    {
        let places = entries
            .into_iter()
            .map(|(name, coord)| (normalize_key(name), coord))
            .collect();
        Self { places }
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Default for BuiltinLookup {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_key(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl GeocodeLookup for BuiltinLookup {
    fn name(&self) -> &str {
        "builtin"
    }

    fn query(&self, text: &str) -> Result<Coordinate, LookupError> {
        self.places
            .get(&normalize_key(text))
            .copied()
            .ok_or_else(|| LookupError::NotFound(text.to_string()))
    }
}

// ─── Nominatim provider ─────────────────────────────────────────

/// Settings for the OpenStreetMap Nominatim search API.
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout; a timeout counts as the service being unavailable.
    pub timeout: Duration,
    /// Minimum spacing between requests (public instance allows 1/s).
    pub min_interval: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".into(),
            user_agent: concat!("FilmMap/", env!("CARGO_PKG_VERSION"), " (film-location-map)")
                .into(),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct NominatimLookup {
    config: NominatimConfig,
    agent: ureq::Agent,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimLookup {
    pub fn new(config: NominatimConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Self {
            config,
            agent,
            last_request: Mutex::new(None),
        }
    }

    /// Blocks until `min_interval` has passed since the previous request.
    /// Holding the lock while sleeping keeps concurrent callers in line.
    fn throttle(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.min_interval {
                thread::sleep(self.config.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

impl Default for NominatimLookup {
    fn default() -> Self {
        Self::new(NominatimConfig::default())
    }
}

impl GeocodeLookup for NominatimLookup {
    fn name(&self) -> &str {
        "nominatim"
    }

    fn query(&self, text: &str) -> Result<Coordinate, LookupError> {
        self.throttle();

        let response = self
            .agent
            .get(&self.search_url())
            .query("q", text)
            .query("format", "json")
            .query("limit", "1")
            .call()
            .map_err(classify_ureq_error)?;

        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        first_coordinate(text, results)
    }
}

fn classify_ureq_error(err: ureq::Error) -> LookupError {
    match err {
        ureq::Error::Status(code, _) if code == 429 || code >= 500 => {
            LookupError::Unavailable(format!("HTTP {}", code))
        }
        ureq::Error::Status(code, _) => LookupError::InvalidResponse(format!("HTTP {}", code)),
        ureq::Error::Transport(t) => LookupError::Unavailable(t.to_string()),
    }
}

fn first_coordinate(query: &str, results: Vec<NominatimResult>) -> Result<Coordinate, LookupError> {
    let top = results
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(query.to_string()))?;

    let lat: f64 = top
        .lat
        .parse()
        .map_err(|_| LookupError::InvalidResponse(format!("bad lat '{}'", top.lat)))?;
    let lon: f64 = top
        .lon
        .parse()
        .map_err(|_| LookupError::InvalidResponse(format!("bad lon '{}'", top.lon)))?;

    debug!(
        query,
        matched = top.display_name.as_deref().unwrap_or(""),
        lat,
        lon,
        "nominatim match"
    );
    Ok(Coordinate::new(lat, lon))
}

// ─── Chain ──────────────────────────────────────────────────────

/// Tries providers in order; the first match wins.
///
/// Fails with `Unavailable` if no provider matched and at least one was
/// unavailable, so the caller may retry; otherwise `NotFound`.
pub struct ChainLookup {
    providers: Vec<Box<dyn GeocodeLookup>>,
}

impl ChainLookup {
    pub fn new(providers: Vec<Box<dyn GeocodeLookup>>) -> Self {
        Self { providers }
    }
}

impl GeocodeLookup for ChainLookup {
    fn name(&self) -> &str {
        "chain"
    }

    fn query(&self, text: &str) -> Result<Coordinate, LookupError> {
        let mut unavailable = None;
        for provider in &self.providers {
            match provider.query(text) {
                Ok(coord) => return Ok(coord),
                Err(e) => {
                    debug!(provider = provider.name(), query = text, error = %e, "provider miss");
                    if e.is_transient() && unavailable.is_none() {
                        unavailable = Some(e);
                    }
                }
            }
        }
        Err(unavailable.unwrap_or_else(|| LookupError::NotFound(text.to_string())))
    }
}
