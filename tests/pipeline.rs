use film_map::catalog::{
    load_or_empty, load_resolved, write_resolved, CatalogOptions, FilmRecord, Source,
    DEFAULT_HEADER_LINES,
};
use film_map::geo::Metric;
use film_map::location::{BuiltinLookup, Coordinate, LocationResolver};
use film_map::render::MapDocument;
use film_map::search::{filter_by_region, k_nearest};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const LVIV: Coordinate = Coordinate::new(49.817545, 24.023932);

fn write_catalog(dir: &TempDir) -> PathBuf {
    let mut text: String = (0..DEFAULT_HEADER_LINES)
        .map(|i| format!("CRC header line {}\n", i))
        .collect();
    text.push_str(
        "Shadows of Forgotten Ancestors (1965)\t\tKosiv, Ivano-Frankivsk Oblast, Ukraine\n\
         Lviv Story (1965)\tRynok Square, Lviv, Ukraine\t(city centre)\n\
         Paris Film (1965)\tParis, France\n\
         this line is broken\n\
         Battleship Potemkin (1925)\tOdesa, Ukraine\n\
         Lost City (1965)\tAtlantis\n",
    );
    let path = dir.path().join("locations.list");
    fs::write(&path, text).unwrap();
    path
}

fn names(records: &[FilmRecord]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

#[test]
fn test_raw_catalog_to_map() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    let dataset = load_or_empty(&Source::Raw(catalog), &CatalogOptions::default());
    assert_eq!(dataset.len(), 5);
    assert_eq!(dataset.skipped, 1);

    let resolver = LocationResolver::offline();

    let local = filter_by_region(&dataset.records, "Ukraine", &resolver);
    assert_eq!(
        names(&local),
        vec!["Shadows of Forgotten Ancestors", "Lviv Story", "Battleship Potemkin"]
    );
    assert!(local.iter().all(|r| r.resolved_coordinates().is_some()));

    let nearest = k_nearest(&dataset.records, 1965, LVIV, 2, &resolver, Metric::Geodesic);
    assert_eq!(names(&nearest), vec!["Lviv Story", "Shadows of Forgotten Ancestors"]);
    assert!(nearest[0].distance.unwrap() < 5.0);

    // "Lviv, Ukraine" was looked up once for the region layer and reused
    let before = resolver.stats().lookups;
    resolver.resolve("Rynok Square, Lviv, Ukraine");
    assert_eq!(resolver.stats().lookups, before);

    let out = dir.path().join("Film_map.html");
    let mut map = MapDocument::new(LVIV).with_reference_marker(LVIV, "You are here");
    map.add_layer("Films in Ukraine", &local);
    map.add_layer("Closest films in 1965", &nearest);
    map.save(&out).unwrap();

    assert_eq!(map.layer_count(), 2);
    assert_eq!(map.marker_count(), 5);
    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("Films in Ukraine"));
    assert!(html.contains("Closest films in 1965"));
    assert!(html.contains("Lviv Story (1965)"));
    assert!(!html.contains("Lost City"));
}

#[test]
fn test_exported_dataset_needs_no_geocoding() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(&dir);

    let mut dataset = load_or_empty(&Source::Raw(catalog), &CatalogOptions::default());
    LocationResolver::offline().resolve_all(&mut dataset.records);

    let csv = dir.path().join("locations_small.csv");
    write_resolved(&csv, &dataset.records).unwrap();
    let cached = load_resolved(&csv, &CatalogOptions::default()).unwrap();
    assert_eq!(cached.records, dataset.records);

    let unresolvable = cached.records.iter().find(|r| r.name == "Lost City").unwrap();
    assert_eq!(unresolvable.coordinates, Some(Coordinate::SENTINEL));

    let no_places = BuiltinLookup::from_entries(Vec::<(&str, Coordinate)>::new());
    let empty = LocationResolver::new(Box::new(no_places));
    let nearest = k_nearest(&cached.records, 1965, LVIV, 5, &empty, Metric::Haversine);
    assert_eq!(
        names(&nearest),
        vec!["Lviv Story", "Shadows of Forgotten Ancestors", "Paris Film"]
    );
    assert_eq!(empty.stats().lookups, 0);
}

#[test]
fn test_missing_source_gives_empty_map() {
    let dir = TempDir::new().unwrap();
    let dataset = load_or_empty(
        &Source::Resolved(dir.path().join("locations_250000.csv")),
        &CatalogOptions::default(),
    );
    assert!(dataset.is_empty());

    let resolver = LocationResolver::offline();
    let nearest = k_nearest(&dataset.records, 1900, LVIV, 5, &resolver, Metric::Geodesic);
    assert!(nearest.is_empty());

    let mut map = MapDocument::new(LVIV);
    map.add_layer("Closest films in 1900", &nearest);
    assert_eq!(map.marker_count(), 0);
}
