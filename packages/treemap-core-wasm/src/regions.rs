use geo_types::Rect;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::bbox_filter::{is_point_in_polygon, point_in_bbox, ring_bounds};
use crate::error::RegionError;
use crate::models::{Classification, LatLng, TreeRecord, UNCLASSIFIED};

// Region as it arrives from JS configuration: polygon as [lat, lng] pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub polygon: Vec<[f64; 2]>,
}

impl RegionConfig {
    pub fn new(name: &str, polygon: &[[f64; 2]]) -> Self {
        RegionConfig {
            name: name.to_string(),
            polygon: polygon.to_vec(),
        }
    }
}

/// A named campus area. Boundaries are static, so the bounding box is
/// computed once here and reused by every classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    boundary: Vec<LatLng>,
    bounds: Rect<f64>,
}

impl Region {
    pub fn new(name: impl Into<String>, boundary: Vec<LatLng>) -> Result<Self, RegionError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegionError::EmptyName);
        }
        if name == UNCLASSIFIED {
            return Err(RegionError::ReservedName(name));
        }
        if boundary.len() < 3 {
            return Err(RegionError::TooFewPoints {
                name,
                count: boundary.len(),
            });
        }
        if let Some(index) = boundary.iter().position(|p| !p.is_finite()) {
            return Err(RegionError::NonFiniteVertex { name, index });
        }

        let bounds = ring_bounds(&boundary).ok_or(RegionError::TooFewPoints {
            name: name.clone(),
            count: 0,
        })?;

        Ok(Region {
            name,
            boundary,
            bounds,
        })
    }

    pub fn from_config(config: &RegionConfig) -> Result<Self, RegionError> {
        let boundary = config.polygon.iter().copied().map(LatLng::from).collect();
        Region::new(config.name.clone(), boundary)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn boundary(&self) -> &[LatLng] {
        &self.boundary
    }

    pub fn bounds(&self) -> &Rect<f64> {
        &self.bounds
    }

    // Cheap bbox rejection first, exact ray cast second
    pub fn contains(&self, point: &LatLng) -> bool {
        point_in_bbox(point, &self.bounds) && is_point_in_polygon(point, &self.boundary)
    }

    pub fn to_config(&self) -> RegionConfig {
        RegionConfig {
            name: self.name.clone(),
            polygon: self.boundary.iter().map(|p| [p.lat, p.lng]).collect(),
        }
    }
}

/// Assign a point to the first region (in declaration order) that contains it.
///
/// Declaration order is the tie-break for adjacent or overlapping regions.
/// An empty region list simply yields `Unclassified`.
pub fn classify(point: &LatLng, regions: &[Region]) -> Classification {
    regions
        .iter()
        .find(|region| region.contains(point))
        .map(|region| Classification::Region(region.name.clone()))
        .unwrap_or(Classification::Unclassified)
}

/// Ordered, name-unique collection of regions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Result<Self, RegionError> {
        let mut seen = HashSet::new();
        for region in &regions {
            if !seen.insert(region.name.as_str()) {
                return Err(RegionError::DuplicateName(region.name.clone()));
            }
        }
        Ok(RegionSet { regions })
    }

    pub fn from_configs(configs: &[RegionConfig]) -> Result<Self, RegionError> {
        let regions = configs
            .iter()
            .map(Region::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        RegionSet::new(regions)
    }

    pub fn classify(&self, point: &LatLng) -> Classification {
        classify(point, &self.regions)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// One classified tree, in dataset order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedTree {
    pub tag: String,
    pub classification: Classification,
}

/// Fresh result of one classification pass over a dataset.
#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    entries: Vec<ClassifiedTree>,
    index: HashMap<String, usize>,
}

impl ClassificationResult {
    pub fn entries(&self) -> &[ClassifiedTree] {
        &self.entries
    }

    // Duplicate tags keep their first classification
    pub fn get(&self, tag: &str) -> Option<&Classification> {
        self.index.get(tag).map(|&i| &self.entries[i].classification)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn classify_all(records: &[TreeRecord], regions: &RegionSet) -> ClassificationResult {
    let mut result = ClassificationResult::default();
    for record in records {
        let classification = regions.classify(&record.position);
        result
            .index
            .entry(record.tag.clone())
            .or_insert(result.entries.len());
        result.entries.push(ClassifiedTree {
            tag: record.tag.clone(),
            classification,
        });
    }
    result
}

pub const WEST_CAMPUS: &str = "West Campus";
pub const EAST_CAMPUS: &str = "East Campus";
pub const SOUTH_CAMPUS: &str = "South Campus";
pub const COMBINED_AREA_NAME: &str = "De Anza College";

lazy_static! {
    /// Campus sub-areas used for per-area clustering, in precedence order.
    pub static ref CAMPUS_REGIONS: Vec<RegionConfig> = vec![
        RegionConfig::new(
            WEST_CAMPUS,
            &[
                [37.318, -122.048],
                [37.322719, -122.049764],
                [37.322753, -122.045215],
                [37.318, -122.045215],
            ],
        ),
        RegionConfig::new(
            EAST_CAMPUS,
            &[
                [37.318, -122.045215],
                [37.322753, -122.045215],
                [37.322745, -122.04157],
                [37.318, -122.04157],
            ],
        ),
        RegionConfig::new(
            SOUTH_CAMPUS,
            &[
                [37.315603, -122.046578],
                [37.318, -122.048],
                [37.318, -122.04157],
                [37.315603, -122.04157],
            ],
        ),
    ];

    /// Outline drawn around the whole campus at low zoom.
    pub static ref CAMPUS_COMBINED_AREA: RegionConfig = RegionConfig::new(
        COMBINED_AREA_NAME,
        &[
            [37.315603, -122.046578],
            [37.318, -122.048],
            [37.322753, -122.049764],
            [37.322753, -122.04157],
            [37.315603, -122.04157],
        ],
    );
}
