use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use film_map::catalog::{
    load_or_empty, write_resolved, CatalogOptions, Source, DEFAULT_HEADER_LINES,
};
use film_map::geo::Metric;
use film_map::location::{
    BuiltinLookup, ChainLookup, Coordinate, GeocodeLookup, LocationResolver, NominatimConfig,
    NominatimLookup, ResolverConfig,
};
use film_map::render::{open_in_browser, MapDocument};
use film_map::search::{filter_by_region, k_nearest, DEFAULT_K};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Film Map: films shot near you, on a web map.
///
/// Builds an HTML map with two layers: every film shot in a region, and the
/// films of one year shot closest to a given point.
///
/// Examples:
///   film-map --path locations.list --year 2015
///   film-map --fast --year 1999 --lat 50.45 --lng 30.52 --region Kyiv
///   film-map --path locations.list --limit 5000 --export locations_5000.csv
#[derive(Parser)]
#[command(name = "film-map", version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["path", "fast"])))]
struct Cli {
    /// Raw locations catalog (tab-separated, with a fixed header).
    #[arg(long)]
    path: Option<PathBuf>,

    /// Use a pre-resolved CSV dataset instead of geocoding.
    #[arg(long, num_args = 0..=1, default_missing_value = "locations_250000.csv")]
    fast: Option<PathBuf>,

    /// Year of the films ranked by distance.
    #[arg(long, default_value_t = 1900)]
    year: u16,

    /// Reference latitude.
    #[arg(long, default_value_t = 49.817545, allow_hyphen_values = true)]
    lat: f64,

    /// Reference longitude.
    #[arg(long, default_value_t = 24.023932, allow_hyphen_values = true)]
    lng: f64,

    /// Substring a location must contain to land in the region layer.
    #[arg(long, default_value = "Ukraine")]
    region: String,

    /// How many closest films to show.
    #[arg(short = 'k', long = "count", default_value_t = DEFAULT_K)]
    count: usize,

    /// Output HTML file.
    #[arg(long, short = 'o', default_value = "Film_map.html")]
    output: PathBuf,

    /// Open the map in the default browser when done.
    #[arg(long)]
    opened: bool,

    /// Offline mode: only use the built-in gazetteer.
    #[arg(long)]
    offline: bool,

    /// Geocoding worker threads.
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Geocoder request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Extra attempts when the geocoder is unavailable.
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Distance formula: "geodesic" (WGS-84) or "haversine".
    #[arg(long, default_value = "geodesic", value_parser = parse_metric)]
    metric: Metric,

    /// Header lines to skip in a raw catalog.
    #[arg(long, default_value_t = DEFAULT_HEADER_LINES)]
    header_lines: usize,

    /// Read at most this many records.
    #[arg(long)]
    limit: Option<usize>,

    /// Resolve every loaded record and write them as a CSV for --fast.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    s.parse()
}

fn build_resolver(cli: &Cli) -> LocationResolver {
    let lookup: Box<dyn GeocodeLookup> = if cli.offline {
        Box::new(BuiltinLookup::new())
    } else {
        let nominatim = NominatimLookup::new(NominatimConfig {
            timeout: Duration::from_secs(cli.timeout),
            ..NominatimConfig::default()
        });
        Box::new(ChainLookup::new(vec![Box::new(nominatim), Box::new(BuiltinLookup::new())]))
    };

    LocationResolver::with_config(
        lookup,
        ResolverConfig {
            threads: cli.threads.max(1),
            retries: cli.retries,
        },
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let reference = Coordinate::new(cli.lat, cli.lng);
    if !reference.is_plausible() {
        bail!(
            "invalid coordinates ({}, {}): lat must be in -90..90, lng in -180..180",
            cli.lat,
            cli.lng
        );
    }

    // ── Load ────────────────────────────────────────────────────

    let source = match (&cli.path, &cli.fast) {
        (Some(path), _) => Source::Raw(path.clone()),
        (None, Some(csv)) => Source::Resolved(csv.clone()),
        (None, None) => bail!("one of --path or --fast is required"),
    };
    let opts = CatalogOptions {
        header_lines: cli.header_lines,
        limit: cli.limit,
    };
    let mut dataset = load_or_empty(&source, &opts);
    if dataset.is_empty() {
        warn!(path = %source.path().display(), "no films loaded, the map will be empty");
    }

    let resolver = build_resolver(&cli);

    // ── Export ──────────────────────────────────────────────────

    if let Some(ref export) = cli.export {
        resolver.resolve_all(&mut dataset.records);
        write_resolved(export, &dataset.records)
            .with_context(|| format!("writing dataset to {}", export.display()))?;
    }

    // ── Query ───────────────────────────────────────────────────

    let local = filter_by_region(&dataset.records, &cli.region, &resolver);
    let nearest = k_nearest(
        &dataset.records,
        cli.year,
        reference,
        cli.count,
        &resolver,
        cli.metric,
    );

    for (rank, film) in nearest.iter().enumerate() {
        info!(
            rank = rank + 1,
            film = film.display_name(),
            location = %film.location,
            km = film.distance.unwrap_or_default(),
            "closest"
        );
    }

    let stats = resolver.stats();
    info!(
        cached = stats.entries,
        hits = stats.hits,
        lookups = stats.lookups,
        "geocoding done"
    );

    // ── Render ──────────────────────────────────────────────────

    let mut map = MapDocument::new(reference)
        .with_title(format!("Films near ({}, {}) in {}", cli.lat, cli.lng, cli.year))
        .with_reference_marker(reference, "You are here");
    map.add_layer(format!("Films in {}", cli.region), &local);
    map.add_layer(format!("Closest films in {}", cli.year), &nearest);
    map.save(&cli.output)
        .with_context(|| format!("writing map to {}", cli.output.display()))?;

    if cli.opened {
        if let Err(e) = open_in_browser(&cli.output) {
            warn!(error = %e, "could not open a browser");
        }
    }

    Ok(())
}
