use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::RecordError;
use crate::models::{LatLng, TreeAttributes, TreeDetail, TreeRecord, UNKNOWN};

// Ordered alias lists, matched case-insensitively against attribute keys.
// The first alias that resolves to a non-empty value wins.
pub const TAG_ALIASES: &[&str] = &["tag_number", "tag", "tag #", "id"];
pub const COMMON_NAME_ALIASES: &[&str] = &["common_name", "common name", "name", "common"];
pub const BOTANICAL_NAME_ALIASES: &[&str] = &["botanical_name", "botanical name", "species"];
pub const HEIGHT_ALIASES: &[&str] = &["height"];
pub const DIAMETER_ALIASES: &[&str] = &["diameter"];
pub const CROWN_HEIGHT_ALIASES: &[&str] = &["crown_height", "crown height"];
pub const CROWN_SPREAD_ALIASES: &[&str] = &["crown_spread", "crown spread"];
pub const HEALTH_ALIASES: &[&str] = &["health"];
pub const LAST_UPDATE_ALIASES: &[&str] = &["last_update", "lastest update", "latest update"];
pub const NOTES_ALIASES: &[&str] = &["notes", "note"];
pub const ALTERNATE_TAG_ALIASES: &[&str] = &["alternate_tag", "tag ##"];
pub const QUANTITY_ALIASES: &[&str] = &["quantity", "qty"];
pub const LATITUDE_ALIASES: &[&str] = &["latitude", "lat"];
pub const LONGITUDE_ALIASES: &[&str] = &["longitude", "lng", "lon"];

// GeoJSON FeatureCollection as served by the trees REST endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FeatureCollection {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<FeatureGeometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

// Geometry part of a feature
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FeatureGeometry {
    pub r#type: String,
    #[serde(default)]
    pub coordinates: Value, // Using Value for flexibility with different geometry types
}

// CSV rows as handed over by the page: header row plus raw cell values
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TabularDataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Records that survived normalization plus how many inputs were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub records: Vec<TreeRecord>,
    pub skipped: usize,
}

// Attribute key/value pairs in source order, keys lowercased for lookup
struct AttributeLookup {
    entries: Vec<(String, String, String)>, // (lowercase key, original key, value)
}

impl AttributeLookup {
    fn from_properties(properties: &Map<String, Value>) -> Self {
        let entries = properties
            .iter()
            .filter_map(|(key, value)| {
                value_to_text(value).map(|text| (key.trim().to_lowercase(), key.clone(), text))
            })
            .collect();
        AttributeLookup { entries }
    }

    fn from_row(headers: &[String], row: &[String]) -> Self {
        let entries = headers
            .iter()
            .zip(row.iter())
            .filter_map(|(header, cell)| {
                let cell = cell.trim();
                if cell.is_empty() {
                    None
                } else {
                    Some((header.trim().to_lowercase(), header.trim().to_string(), cell.to_string()))
                }
            })
            .collect();
        AttributeLookup { entries }
    }

    fn resolve(&self, aliases: &[&str]) -> Option<String> {
        aliases.iter().find_map(|alias| {
            self.entries
                .iter()
                .find(|(key, _, _)| key == alias)
                .map(|(_, _, value)| value.clone())
        })
    }

    fn raw(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(_, key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn attributes(&self) -> TreeAttributes {
        TreeAttributes {
            common_name: self
                .resolve(COMMON_NAME_ALIASES)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            botanical_name: self
                .resolve(BOTANICAL_NAME_ALIASES)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            height: self.resolve(HEIGHT_ALIASES),
            diameter: self.resolve(DIAMETER_ALIASES),
            crown_height: self.resolve(CROWN_HEIGHT_ALIASES),
            crown_spread: self.resolve(CROWN_SPREAD_ALIASES),
            health: self.resolve(HEALTH_ALIASES),
            last_update: self.resolve(LAST_UPDATE_ALIASES),
            notes: self.resolve(NOTES_ALIASES),
            alternate_tag: self.resolve(ALTERNATE_TAG_ALIASES),
            quantity: self
                .resolve(QUANTITY_ALIASES)
                .and_then(|q| q.parse::<u32>().ok())
                .unwrap_or(1),
            raw: self.raw(),
        }
    }

    fn coordinate(&self, aliases: &[&str]) -> Option<f64> {
        self.resolve(aliases)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

// Stringify a JSON attribute; empty strings and nulls count as missing
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => {
            // Tag numbers sometimes arrive as floats ("1234.0")
            match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    Some(format!("{}", f as i64))
                }
                _ => Some(n.to_string()),
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

// Extract [lng, lat] from a Point geometry
fn point_from_geometry(geometry: &FeatureGeometry) -> Option<LatLng> {
    if geometry.r#type != "Point" {
        return None;
    }
    let coords = geometry.coordinates.as_array()?;
    if coords.len() < 2 {
        return None;
    }
    let lng = coords[0].as_f64()?;
    let lat = coords[1].as_f64()?;
    let point = LatLng::new(lat, lng);
    if point.is_finite() {
        Some(point)
    } else {
        None
    }
}

/// Normalize a GeoJSON FeatureCollection into tree records.
///
/// The feature's top-level `id` is the tag number when present; otherwise
/// the tag aliases on `properties`, then the 1-based feature index.
pub fn records_from_feature_collection(
    collection: &FeatureCollection,
) -> Result<NormalizedDataset, RecordError> {
    if !collection.r#type.is_empty() && collection.r#type != "FeatureCollection" {
        return Err(RecordError::NotFeatureCollection(collection.r#type.clone()));
    }

    let mut dataset = NormalizedDataset::default();
    let empty = Map::new();

    for (index, feature) in collection.features.iter().enumerate() {
        let position = match feature.geometry.as_ref().and_then(point_from_geometry) {
            Some(p) => p,
            None => {
                dataset.skipped += 1;
                continue;
            }
        };

        let lookup = AttributeLookup::from_properties(feature.properties.as_ref().unwrap_or(&empty));
        let tag = feature
            .id
            .as_ref()
            .and_then(value_to_text)
            .or_else(|| lookup.resolve(TAG_ALIASES))
            .unwrap_or_else(|| (index + 1).to_string());

        dataset.records.push(TreeRecord {
            tag,
            position,
            attributes: lookup.attributes(),
        });
    }

    Ok(dataset)
}

pub fn records_from_geojson_value(value: &Value) -> Result<NormalizedDataset, RecordError> {
    let collection: FeatureCollection = serde_json::from_value(value.clone())
        .map_err(|e| RecordError::Malformed(e.to_string()))?;
    records_from_feature_collection(&collection)
}

// Exact alias match first, then the first header containing any of the
// needles. Last-update headers ("Latest Update") never count as coordinates.
fn detect_column(headers: &[String], aliases: &[&str], needles: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    aliases
        .iter()
        .find_map(|alias| normalized.iter().position(|h| h == alias))
        .or_else(|| {
            normalized.iter().position(|header| {
                !LAST_UPDATE_ALIASES.contains(&header.as_str())
                    && needles.iter().any(|needle| header.contains(needle))
            })
        })
}

/// Normalize CSV rows. Latitude is the `latitude`/`lat` column, else the
/// first header containing "lat"; longitude likewise with "lon" or "lng".
/// Rows without finite coordinates are skipped; the tag falls back to the
/// 1-based row number.
pub fn records_from_table(table: &TabularDataset) -> NormalizedDataset {
    let mut dataset = NormalizedDataset::default();
    let lat_index = detect_column(&table.headers, LATITUDE_ALIASES, &["lat"]);
    let lng_index = detect_column(&table.headers, LONGITUDE_ALIASES, &["lon", "lng"]);

    for (row_number, row) in table.rows.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let cell_f64 = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let (lat, lng) = match (cell_f64(lat_index), cell_f64(lng_index)) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                dataset.skipped += 1;
                continue;
            }
        };

        let lookup = AttributeLookup::from_row(&table.headers, row);
        let tag = lookup
            .resolve(TAG_ALIASES)
            .map(|t| normalize_tag_text(&t))
            .unwrap_or_else(|| (row_number + 1).to_string());

        dataset.records.push(TreeRecord {
            tag,
            position: LatLng::new(lat, lng),
            attributes: lookup.attributes(),
        });
    }

    dataset
}

// "1234.0" -> "1234", anything else unchanged
fn normalize_tag_text(tag: &str) -> String {
    match tag.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => tag.to_string(),
    }
}

/// Normalize a detail endpoint response. The payload may be a bare
/// attribute object or a GeoJSON feature with a `properties` wrapper; a
/// top-level `id` fills in the tag when `tag_number` is absent.
pub fn detail_from_value(value: &Value) -> Result<TreeDetail, RecordError> {
    let outer = value
        .as_object()
        .ok_or_else(|| RecordError::Malformed("detail response is not an object".to_string()))?;
    let properties = outer
        .get("properties")
        .and_then(|p| p.as_object())
        .unwrap_or(outer);

    let lookup = AttributeLookup::from_properties(properties);
    let tag = lookup
        .resolve(&["tag_number"])
        .or_else(|| outer.get("id").and_then(value_to_text))
        .or_else(|| lookup.resolve(TAG_ALIASES))
        .ok_or_else(|| RecordError::Malformed("detail response has no tag number".to_string()))?;

    let geometry_point = outer
        .get("geometry")
        .cloned()
        .and_then(|g| serde_json::from_value::<FeatureGeometry>(g).ok())
        .as_ref()
        .and_then(point_from_geometry);
    let position = geometry_point.or_else(|| {
        match (lookup.coordinate(LATITUDE_ALIASES), lookup.coordinate(LONGITUDE_ALIASES)) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    });

    Ok(TreeDetail {
        tag,
        position,
        attributes: lookup.attributes(),
    })
}
