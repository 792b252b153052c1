//! Dataset loading: raw catalog files and pre-resolved CSV files.
//!
//! The CSV layout is `Name,Year,Location,Coordinates` with coordinates as a
//! literal `(lat, lon)` pair. Extra columns (e.g. an unnamed index) are
//! ignored on read.

use super::error::{CatalogError, Result};
use super::parser::{parse_catalog, DEFAULT_HEADER_LINES};
use super::record::FilmRecord;
use crate::location::Coordinate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const REQUIRED_COLUMNS: [&str; 4] = ["Name", "Year", "Location", "Coordinates"];

/// Options for reading a dataset.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Fixed header lines to skip in a raw catalog.
    pub header_lines: usize,
    /// Stop after this many usable records.
    pub limit: Option<usize>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            header_lines: DEFAULT_HEADER_LINES,
            limit: None,
        }
    }
}

/// Usable records plus the number of malformed lines/rows left out.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<FilmRecord>,
    pub skipped: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Raw tab-separated catalog; coordinates resolved on demand.
    Raw(PathBuf),
    /// CSV written by [`write_resolved`]; coordinates already attached.
    Resolved(PathBuf),
}

impl Source {
    pub fn path(&self) -> &Path {
        match self {
            Self::Raw(p) | Self::Resolved(p) => p,
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CatalogError::NotFound(path.to_path_buf()),
        _ => CatalogError::Io(e),
    })
}

/// Read a raw catalog file.
pub fn load_raw(path: &Path, opts: &CatalogOptions) -> Result<Dataset> {
    let file = open(path)?;
    let dataset = parse_catalog(BufReader::new(file), opts)?;
    info!(
        path = %path.display(),
        records = dataset.len(),
        skipped = dataset.skipped,
        "loaded catalog"
    );
    Ok(dataset)
}

#[derive(Deserialize)]
struct ResolvedRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Coordinates")]
    coordinates: String,
}

#[derive(Serialize)]
struct ResolvedRowRef<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Year")]
    year: u16,
    #[serde(rename = "Location")]
    location: &'a str,
    #[serde(rename = "Coordinates")]
    coordinates: String,
}

impl ResolvedRow {
    fn into_record(self) -> std::result::Result<FilmRecord, String> {
        let year = parse_year(&self.year).ok_or_else(|| format!("bad year '{}'", self.year))?;
        if self.location.trim().is_empty() {
            return Err("empty location".into());
        }
        let coordinates: Coordinate = self.coordinates.parse().map_err(|e| format!("{}", e))?;
        Ok(FilmRecord::new(self.name, year, self.location).with_coordinates(coordinates))
    }
}

/// "1999", or "1999.0" as written by tools that stored the year as a float.
fn parse_year(s: &str) -> Option<u16> {
    let s = s.trim();
    let digits = s.strip_suffix(".0").unwrap_or(s);
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

/// Read a pre-resolved CSV dataset. Rows that fail to parse are skipped and
/// counted; a missing file or missing column is an error.
pub fn load_resolved(path: &Path, opts: &CatalogOptions) -> Result<Dataset> {
    let file = open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(CatalogError::MissingColumn(column));
        }
    }

    let mut dataset = Dataset::default();
    for (idx, row) in reader.deserialize::<ResolvedRow>().enumerate() {
        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(ResolvedRow::into_record);
        match parsed {
            Ok(record) => {
                dataset.records.push(record);
                if opts.limit.is_some_and(|n| dataset.records.len() >= n) {
                    break;
                }
            }
            Err(reason) => {
                // +2: header line and 1-based numbering
                debug!(row = idx + 2, reason = %reason, "skipping malformed dataset row");
                dataset.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        records = dataset.len(),
        skipped = dataset.skipped,
        "loaded resolved dataset"
    );
    Ok(dataset)
}

/// Write records in the pre-resolved CSV layout. Records without coordinates
/// are written with the sentinel so the file stays loadable.
pub fn write_resolved(path: &Path, records: &[FilmRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(ResolvedRowRef {
            name: &record.name,
            year: record.year,
            location: &record.location,
            coordinates: record.coordinates.unwrap_or(Coordinate::SENTINEL).to_string(),
        })?;
    }
    writer.flush()?;
    info!(path = %path.display(), records = records.len(), "wrote resolved dataset");
    Ok(())
}

/// Load from `source`, degrading to an empty dataset (with a warning) when
/// the source is missing or unreadable. Downstream always gets a dataset.
pub fn load_or_empty(source: &Source, opts: &CatalogOptions) -> Dataset {
    let loaded = match source {
        Source::Raw(path) => load_raw(path, opts),
        Source::Resolved(path) => load_resolved(path, opts),
    };
    loaded.unwrap_or_else(|e| {
        warn!(
            path = %source.path().display(),
            error = %e,
            "could not load dataset, continuing with none"
        );
        Dataset::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_resolved() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.csv",
            "Name,Year,Location,Coordinates\n\
             Shadows,1965,\"Kosiv, Ukraine\",\"(48.3157, 25.0954)\"\n\
             Nowhere,1965,Atlantis,\"(-69.0, -179.0)\"\n",
        );

        let ds = load_resolved(&path, &CatalogOptions::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].location, "Kosiv, Ukraine");
        assert_eq!(ds.records[0].coordinates, Some(Coordinate::new(48.3157, 25.0954)));
        assert_eq!(ds.records[1].coordinates, Some(Coordinate::SENTINEL));
    }

    #[test]
    fn test_load_resolved_ignores_index_column() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.csv",
            ",Name,Year,Location,Coordinates\n\
             0,Shadows,1965,\"Kosiv, Ukraine\",\"(48.3157, 25.0954)\"\n",
        );

        let ds = load_resolved(&path, &CatalogOptions::default()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].year, 1965);
    }

    #[test]
    fn test_load_resolved_skips_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.csv",
            "Name,Year,Location,Coordinates\n\
             Good,2001,Lviv,\"(49.8, 24.0)\"\n\
             BadYear,20x1,Lviv,\"(49.8, 24.0)\"\n\
             BadCoords,2001,Lviv,\"os.system('rm -rf /')\"\n\
             NoLocation,2001,,\"(49.8, 24.0)\"\n\
             FloatYear,2002.0,Kyiv,\"(50.4, 30.5)\"\n",
        );

        let ds = load_resolved(&path, &CatalogOptions::default()).unwrap();
        let names: Vec<_> = ds.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Good", "FloatYear"]);
        assert_eq!(ds.skipped, 3);
    }

    #[test]
    fn test_load_resolved_padded_headers() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "films.csv",
            " Name, Year ,Location ,Coordinates\n\
             Shadows,1965,Kosiv,\"(48.3157, 25.0954)\"\n",
        );

        let ds = load_resolved(&path, &CatalogOptions::default()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.skipped, 0);
        assert_eq!(ds.records[0].name, "Shadows");
        assert_eq!(ds.records[0].coordinates, Some(Coordinate::new(48.3157, 25.0954)));
    }

    #[test]
    fn test_load_resolved_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "films.csv", "Name,Year,Location\nA,1999,Lviv\n");

        assert!(matches!(
            load_resolved(&path, &CatalogOptions::default()),
            Err(CatalogError::MissingColumn("Coordinates"))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.list");
        assert!(matches!(
            load_raw(&path, &CatalogOptions::default()),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            load_resolved(&path, &CatalogOptions::default()),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_or_empty_degrades() {
        let missing = Source::Raw(PathBuf::from("/nonexistent/locations.list"));
        let ds = load_or_empty(&missing, &CatalogOptions::default());
        assert!(ds.is_empty());

        let ds = load_or_empty(&Source::Resolved(PathBuf::from("")), &CatalogOptions::default());
        assert!(ds.is_empty());
    }

    #[test]
    fn test_load_raw_from_disk() {
        let dir = TempDir::new().unwrap();
        let header: String = (0..DEFAULT_HEADER_LINES).map(|_| "CRC: 0x00\n").collect();
        let body = format!("{}Film (1999)\tLviv, Ukraine\n", header);
        let path = write(&dir, "locations.list", &body);

        let ds = load_raw(&path, &CatalogOptions::default()).unwrap();
        assert_eq!(ds.records, vec![FilmRecord::new("Film", 1999, "Lviv, Ukraine")]);
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            FilmRecord::new("\"Quoted, Title\"", 1999, "Lviv, Ukraine")
                .with_coordinates(Coordinate::new(49.84, 24.03)),
            FilmRecord::new("Unresolved", 2000, "Somewhere"),
        ];
        write_resolved(&path, &records).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Name,Year,Location,Coordinates\n"));

        let ds = load_resolved(&path, &CatalogOptions::default()).unwrap();
        assert_eq!(ds.records, records);
        assert_eq!(ds.records[0].coordinates, Some(Coordinate::new(49.84, 24.03)));
        assert_eq!(ds.records[1].coordinates, Some(Coordinate::SENTINEL));
    }
}
