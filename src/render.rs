//! Standalone HTML map: Leaflet with clustered marker layers.
//!
//! One marker per distinct coordinate in a layer; its popup lists every film
//! placed there, each linking to a web search for the title.

use crate::catalog::FilmRecord;
use crate::location::Coordinate;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<meta name="generated" content="__GENERATED__">
<title>__TITLE__</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css">
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const data = __DATA__;
const map = L.map('map', { center: [data.center.lat, data.center.lon], zoom: data.zoom });
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  maxZoom: 19,
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
L.control.scale().addTo(map);
const overlays = {};
for (const layer of data.layers) {
  const group = L.markerClusterGroup();
  for (const m of layer.markers) {
    L.marker([m.lat, m.lon]).bindPopup(m.popup, { maxWidth: 250, maxHeight: 100 }).addTo(group);
  }
  group.addTo(map);
  overlays[layer.name] = group;
}
if (data.here) {
  L.circleMarker([data.here.lat, data.here.lon], {
    radius: 15, color: 'green', fillColor: 'green', fillOpacity: 0.5
  }).bindPopup(data.here.label).addTo(map);
}
L.control.layers(null, overlays, { collapsed: false }).addTo(map);
</script>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    popup: String,
}

#[derive(Debug, Serialize)]
struct Layer {
    name: String,
    markers: Vec<Marker>,
}

#[derive(Debug, Serialize)]
struct Here {
    lat: f64,
    lon: f64,
    label: String,
}

#[derive(Debug, Serialize)]
struct MapData<'a> {
    center: Coordinate,
    zoom: u8,
    here: Option<&'a Here>,
    layers: &'a [Layer],
}

/// A map under construction.
#[derive(Debug)]
pub struct MapDocument {
    title: String,
    center: Coordinate,
    zoom: u8,
    here: Option<Here>,
    layers: Vec<Layer>,
}

impl MapDocument {
    pub fn new(center: Coordinate) -> Self {
        Self {
            title: "Film map".into(),
            center,
            zoom: 5,
            here: None,
            layers: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// Circle marker for the user's own position.
    pub fn with_reference_marker(mut self, at: Coordinate, label: impl Into<String>) -> Self {
        self.here = Some(Here {
            lat: at.lat,
            lon: at.lon,
            label: escape_html(&label.into()),
        });
        self
    }

    /// Add a toggleable layer. Records without a genuine location are left
    /// off the map. The layer control shows `name` as HTML, so it is escaped.
    pub fn add_layer(&mut self, name: impl Into<String>, records: &[FilmRecord]) {
        let name = escape_html(&name.into());
        let mut groups: Vec<(Coordinate, Vec<&FilmRecord>)> = Vec::new();
        let mut unplaced = 0;

        for record in records {
            let Some(at) = record.resolved_coordinates() else {
                unplaced += 1;
                continue;
            };
            match groups.iter_mut().find(|(c, _)| *c == at) {
                Some((_, films)) => films.push(record),
                None => groups.push((at, vec![record])),
            }
        }

        if unplaced > 0 {
            debug!(layer = %name, unplaced, "films without coordinates not drawn");
        }

        let markers = groups
            .into_iter()
            .map(|(at, films)| Marker {
                lat: at.lat,
                lon: at.lon,
                popup: popup_html(&films),
            })
            .collect();
        self.layers.push(Layer { name, markers });
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn marker_count(&self) -> usize {
        self.layers.iter().map(|l| l.markers.len()).sum()
    }

    pub fn render(&self) -> String {
        let data = MapData {
            center: self.center,
            zoom: self.zoom,
            here: self.here.as_ref(),
            layers: &self.layers,
        };
        let json = serde_json::to_string(&data)
            .unwrap_or_else(|_| "{}".into())
            // keep "</script>" inside strings from closing the tag
            .replace("</", "<\\/");

        MAP_TEMPLATE
            .replace("__TITLE__", &escape_html(&self.title))
            .replace("__GENERATED__", &chrono::Utc::now().to_rfc3339())
            .replace("__DATA__", &json)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())?;
        info!(
            path = %path.display(),
            layers = self.layer_count(),
            markers = self.marker_count(),
            "map written"
        );
        Ok(())
    }
}

/// "Films:" followed by one search link per film.
fn popup_html(films: &[&FilmRecord]) -> String {
    let mut html = String::from("Films:");
    for film in films {
        let title = film.display_name();
        html.push_str(&format!(
            "<br><a href=\"https://www.google.com/search?q=%22{}%22\" \
             target=\"_blank\">{} ({})</a>",
            urlencode(title),
            escape_html(title),
            film.year
        ));
    }
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode everything but unreserved characters (RFC 3986).
fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Open a file in the system's default browser.
pub fn open_in_browser(path: &Path) -> io::Result<()> {
    let target = path.canonicalize()?;

    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    command.arg(&target).spawn()?;
    Ok(())
}
