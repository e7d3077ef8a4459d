// This is the models module containing shared data structures
use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value used for text attributes that none of the known aliases resolved.
pub const UNKNOWN: &str = "Unknown";

/// Display name used when a tree has no common name.
pub const DEFAULT_TREE_NAME: &str = "Tree";

/// Region name reported for points outside every configured region.
pub const UNCLASSIFIED: &str = "unclassified";

// A latitude/longitude pair in degrees. No range checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

// geo works in x/y, so longitude is x and latitude is y
impl From<LatLng> for Coord<f64> {
    fn from(p: LatLng) -> Self {
        Coord { x: p.lng, y: p.lat }
    }
}

impl From<Coord<f64>> for LatLng {
    fn from(c: Coord<f64>) -> Self {
        LatLng { lat: c.y, lng: c.x }
    }
}

// Region configs arrive from JS as [lat, lng] pairs, like Leaflet polygons
impl From<[f64; 2]> for LatLng {
    fn from(pair: [f64; 2]) -> Self {
        LatLng { lat: pair[0], lng: pair[1] }
    }
}

/// Where a tree landed after classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    Region(String),
    Unclassified,
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Region(name) => name,
            Classification::Unclassified => UNCLASSIFIED,
        }
    }

    pub fn region_name(&self) -> Option<&str> {
        match self {
            Classification::Region(name) => Some(name),
            Classification::Unclassified => None,
        }
    }
}

impl Serialize for Classification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Descriptive attributes shared by list records and detail responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeAttributes {
    pub common_name: String,
    pub botanical_name: String,
    pub height: Option<String>,
    pub diameter: Option<String>,
    pub crown_height: Option<String>,
    pub crown_spread: Option<String>,
    pub health: Option<String>,
    pub last_update: Option<String>,
    pub notes: Option<String>,
    pub alternate_tag: Option<String>,
    pub quantity: u32,
    // Every raw attribute, stringified, for the detail view
    pub raw: BTreeMap<String, String>,
}

impl TreeAttributes {
    /// Name shown in popups and cluster legends.
    pub fn display_name(&self) -> &str {
        if self.common_name == UNKNOWN {
            DEFAULT_TREE_NAME
        } else {
            &self.common_name
        }
    }

    pub fn has_common_name(&self) -> bool {
        self.common_name != UNKNOWN
    }
}

/// A tree record in its normalized shape. Every source (GeoJSON feature,
/// CSV row) is resolved into this once at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    pub tag: String,
    pub position: LatLng,
    #[serde(flatten)]
    pub attributes: TreeAttributes,
}

/// Normalized response of the detail endpoint. The endpoint does not
/// always carry coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDetail {
    pub tag: String,
    pub position: Option<LatLng>,
    #[serde(flatten)]
    pub attributes: TreeAttributes,
}

// Per-region count line for the legend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub total_trees: usize,
    pub regions: Vec<RegionCount>,
    pub unclassified: usize,
    pub skipped_records: usize,
    pub species_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_maps_lng_to_x() {
        let c: Coord<f64> = LatLng::new(37.317, -122.044).into();
        assert_eq!(c.x, -122.044);
        assert_eq!(c.y, 37.317);
        assert_eq!(LatLng::from(c), LatLng::new(37.317, -122.044));
    }

    #[test]
    fn classification_serializes_as_plain_string() {
        let json = serde_json::to_string(&Classification::Region("South Campus".into())).unwrap();
        assert_eq!(json, "\"South Campus\"");
        let json = serde_json::to_string(&Classification::Unclassified).unwrap();
        assert_eq!(json, "\"unclassified\"");
    }
}
