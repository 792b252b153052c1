use crate::location::Coordinate;
use serde::Serialize;

/// One film at one shooting location.
#[derive(Debug, Clone, Serialize)]
pub struct FilmRecord {
    pub name: String,
    pub year: u16,
    /// Free-text location exactly as it appears in the catalog.
    pub location: String,
    /// Filled in by the resolver or read from a pre-resolved dataset.
    pub coordinates: Option<Coordinate>,
    /// Kilometres to the reference point of the last nearest-K query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl FilmRecord {
    pub fn new(name: impl Into<String>, year: u16, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            year,
            location: location.into(),
            coordinates: None,
            distance: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinate) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Coordinates, if present and a genuine location.
    pub fn resolved_coordinates(&self) -> Option<Coordinate> {
        self.coordinates.filter(Coordinate::is_resolved)
    }

    /// Title without the surrounding quotes the catalog puts on TV series.
    pub fn display_name(&self) -> &str {
        self.name.trim().trim_matches('"')
    }
}

/// Records are the same film-at-location regardless of enrichment state.
impl PartialEq for FilmRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.year == other.year && self.location == other.location
    }
}

impl Eq for FilmRecord {}
