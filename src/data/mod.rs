use crate::config::BasemapLayerConfig;
use crate::map::{BasemapRenderer, LineString, BRAND_RULES};
use anyhow::Result;
use geojson::{GeoJson, Geometry, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// One row of the listings file: header name -> raw field text.
/// Unknown columns are carried along and simply never read.
pub type RawRecord = HashMap<String, String>;

/// Failure to load the listings file at all. Per-record problems are not
/// load errors; they surface as [`Rejection`]s during validation.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read listings file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed listings file: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a record never became a [`Listing`]. Checks run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing name")]
    MissingName,
    #[error("missing latitude or longitude")]
    MissingCoordinate,
    #[error("non-numeric coordinate")]
    NonNumericCoordinate,
    #[error("coordinate out of valid range")]
    CoordinateOutOfRange,
}

/// One validated business listing. Immutable after load; identity is the
/// index in load order.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub business_card: Option<String>,
}

impl Listing {
    /// Look up a display attribute by its column name. Used by search so
    /// the set of searchable fields can come from config.
    pub fn attribute(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "address" => self.address.as_deref(),
            "city" => self.city.as_deref(),
            "state" => self.state.as_deref(),
            "zip" => self.zip.as_deref(),
            "phone" => self.phone.as_deref(),
            "website" => self.website.as_deref(),
            "email" => self.email.as_deref(),
            "category" => self.category.as_deref(),
            "description" => self.description.as_deref(),
            "business_card" => self.business_card.as_deref(),
            _ => None,
        }
    }

    /// `tel:` link with the raw phone text, if a phone number is present.
    pub fn call_link(&self) -> Option<String> {
        self.phone.as_deref().map(|p| format!("tel:{p}"))
    }

    pub fn website_link(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Maps-directions URL templated with the listing coordinates and name.
    pub fn directions_link(&self) -> String {
        format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}&destination_place_id={}",
            self.latitude,
            self.longitude,
            percent_encode(&self.name)
        )
    }

    /// The chamber itself gets a landmark glyph instead of the standard pin.
    pub fn is_chamber(&self) -> bool {
        self.name.to_lowercase().contains("chamber of commerce")
    }
}

/// Validate a raw record into a listing. Pure: same record, same verdict.
pub fn validate(record: &RawRecord) -> Result<Listing, Rejection> {
    let field = |key: &str| {
        record
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let name = field("name").ok_or(Rejection::MissingName)?;
    let lat_raw = field("latitude").ok_or(Rejection::MissingCoordinate)?;
    let lon_raw = field("longitude").ok_or(Rejection::MissingCoordinate)?;

    let latitude: f64 = lat_raw.parse().map_err(|_| Rejection::NonNumericCoordinate)?;
    let longitude: f64 = lon_raw.parse().map_err(|_| Rejection::NonNumericCoordinate)?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(Rejection::CoordinateOutOfRange);
    }

    let owned = |key: &str| field(key).map(str::to_string);

    Ok(Listing {
        name: name.to_string(),
        latitude,
        longitude,
        address: owned("address"),
        city: owned("city"),
        state: owned("state"),
        zip: owned("zip"),
        phone: owned("phone"),
        website: owned("website"),
        email: owned("email"),
        category: owned("category"),
        description: owned("description"),
        business_card: owned("business_card"),
    })
}

/// Load all records from the listings CSV file.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let file = fs::File::open(path)?;
    let records = read_records(file)?;
    info!(count = records.len(), path = %path.display(), "loaded listings");
    Ok(records)
}

/// Parse listings CSV from any reader. Header row is required; rows may be
/// ragged (missing trailing fields become absent keys).
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<RawRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut records = Vec::new();

    for row in csv_reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// Load every configured basemap layer, then run the one-time brand restyle
/// pass. A layer that fails to load is skipped; the map works without it.
pub fn load_basemap(renderer: &mut BasemapRenderer, layers: &[BasemapLayerConfig]) {
    for layer in layers {
        match load_layer_lines(Path::new(&layer.path)) {
            Ok(lines) => {
                info!(layer = %layer.name, lines = lines.len(), "loaded basemap layer");
                renderer.add_layer(&layer.name, lines);
            }
            Err(e) => warn!(layer = %layer.name, error = %e, "skipping basemap layer"),
        }
    }

    renderer.apply_brand_style(BRAND_RULES);
}

fn load_layer_lines(path: &Path) -> Result<Vec<LineString>> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;
    let mut lines = Vec::new();
    collect_geojson_lines(&geojson, &mut |line| lines.push(line));
    Ok(lines)
}

/// Walk a GeoJSON document and extract line features
fn collect_geojson_lines<F>(geojson: &GeoJson, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    collect_geometry_lines(geometry, add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                collect_geometry_lines(geometry, add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            collect_geometry_lines(geometry, add_line);
        }
    }
}

fn collect_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    let coords_to_line =
        |coords: &Vec<Vec<f64>>| coords.iter().map(|c| (c[0], c[1])).collect::<LineString>();

    match &geometry.value {
        Value::LineString(coords) => add_line(coords_to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(coords_to_line(coords));
            }
        }
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(coords_to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(coords_to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_accepts_full_valid_range() {
        for (lat, lon) in [(0.0, 0.0), (-90.0, -180.0), (90.0, 180.0), (39.78, -89.65)] {
            let rec = record(&[
                ("name", "Joe's Coffee"),
                ("latitude", &lat.to_string()),
                ("longitude", &lon.to_string()),
            ]);
            assert!(validate(&rec).is_ok(), "should accept {lat},{lon}");
        }
    }

    #[test]
    fn test_validate_rejection_is_complement_of_acceptance() {
        let cases = [
            (record(&[("latitude", "1.0"), ("longitude", "2.0")]), Rejection::MissingName),
            (record(&[("name", "A"), ("longitude", "2.0")]), Rejection::MissingCoordinate),
            (record(&[("name", "A"), ("latitude", "1.0")]), Rejection::MissingCoordinate),
            (
                record(&[("name", "A"), ("latitude", "abc"), ("longitude", "2.0")]),
                Rejection::NonNumericCoordinate,
            ),
            (
                record(&[("name", "A"), ("latitude", "90.1"), ("longitude", "2.0")]),
                Rejection::CoordinateOutOfRange,
            ),
            (
                record(&[("name", "A"), ("latitude", "1.0"), ("longitude", "-180.5")]),
                Rejection::CoordinateOutOfRange,
            ),
        ];
        for (rec, expected) in cases {
            assert_eq!(validate(&rec).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_validate_checks_name_before_coordinates() {
        // A record failing several checks reports the first one.
        let rec = record(&[("latitude", "999"), ("longitude", "abc")]);
        assert_eq!(validate(&rec).unwrap_err(), Rejection::MissingName);
    }

    #[test]
    fn test_validate_treats_blank_fields_as_missing() {
        let rec = record(&[("name", "   "), ("latitude", "1.0"), ("longitude", "2.0")]);
        assert_eq!(validate(&rec).unwrap_err(), Rejection::MissingName);
    }

    #[test]
    fn test_validate_is_pure() {
        let rec = record(&[("name", "A"), ("latitude", "10"), ("longitude", "20")]);
        assert_eq!(validate(&rec), validate(&rec));
    }

    #[test]
    fn test_read_records_keeps_unknown_columns() {
        let csv = "name,latitude,longitude,mascot\nJoe's,1.0,2.0,Owl\n";
        let records = read_records(Cursor::new(csv)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("mascot").map(String::as_str), Some("Owl"));
        // Unknown columns never reach the listing
        let listing = validate(&records[0]).unwrap();
        assert_eq!(listing.attribute("mascot"), None);
    }

    #[test]
    fn test_read_records_ragged_row() {
        let csv = "name,latitude,longitude,phone\nJoe's,1.0,2.0\n";
        let records = read_records(Cursor::new(csv)).unwrap();
        assert!(!records[0].contains_key("phone"));
        assert!(validate(&records[0]).is_ok());
    }

    #[test]
    fn test_two_rows_one_missing_latitude() {
        // End-to-end: one valid listing, one diagnostic rejection.
        let csv = "name,latitude,longitude\nGood Diner,39.78,-89.65\nBad Diner,,-89.60\n";
        let records = read_records(Cursor::new(csv)).unwrap();
        assert_eq!(records.len(), 2);

        let verdicts: Vec<_> = records.iter().map(validate).collect();
        assert!(verdicts[0].is_ok());
        assert_eq!(verdicts[1], Err(Rejection::MissingCoordinate));
    }

    #[test]
    fn test_outbound_links() {
        let rec = record(&[
            ("name", "Joe's Coffee & Tea"),
            ("latitude", "39.78"),
            ("longitude", "-89.65"),
            ("phone", "555-1234"),
            ("website", "https://joes.example"),
        ]);
        let listing = validate(&rec).unwrap();

        assert_eq!(listing.call_link().as_deref(), Some("tel:555-1234"));
        assert_eq!(listing.website_link(), Some("https://joes.example"));
        let directions = listing.directions_link();
        assert!(directions.starts_with("https://www.google.com/maps/dir/?api=1&destination=39.78,-89.65"));
        assert!(directions.ends_with("destination_place_id=Joe%27s%20Coffee%20%26%20Tea"));
    }

    #[test]
    fn test_chamber_detection() {
        let rec = record(&[
            ("name", "Tavares Chamber of Commerce"),
            ("latitude", "28.8"),
            ("longitude", "-81.7"),
        ]);
        assert!(validate(&rec).unwrap().is_chamber());
    }
}
