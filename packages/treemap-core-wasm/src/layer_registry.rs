use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::filter::species_list;
use crate::models::{Classification, DatasetSummary, RegionCount, TreeRecord};
use crate::regions::{classify_all, ClassificationResult, RegionSet};
use crate::zoom_tier::{BoundaryOverlay, LayerVisibility, ZoomTier};

/// Identifier of a layer group the map page can add or remove.
///
/// Serialized as `combined`, `unclassified`, `region:<name>`,
/// `boundary:combined` and `boundary:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerId {
    Combined,
    Region(String),
    Unclassified,
    CombinedBoundary,
    RegionBoundary(String),
}

impl LayerId {
    pub fn key(&self) -> String {
        match self {
            LayerId::Combined => "combined".to_string(),
            LayerId::Region(name) => format!("region:{}", name),
            LayerId::Unclassified => "unclassified".to_string(),
            LayerId::CombinedBoundary => "boundary:combined".to_string(),
            LayerId::RegionBoundary(name) => format!("boundary:{}", name),
        }
    }
}

impl Serialize for LayerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

// Show/hide calls needed to move the map from one tier to another
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerActions {
    pub tier: ZoomTier,
    pub show: Vec<LayerId>,
    pub hide: Vec<LayerId>,
}

impl LayerActions {
    pub fn is_empty(&self) -> bool {
        self.show.is_empty() && self.hide.is_empty()
    }
}

/// Marker partitions for one dataset load.
///
/// Built once from the records and regions and never mutated; reloading
/// the dataset builds a new registry.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    records: Vec<TreeRecord>,
    record_index: HashMap<String, usize>,
    classification: ClassificationResult,
    region_names: Vec<String>,
    per_region: Vec<Vec<String>>,
    unclassified: Vec<String>,
    has_combined_boundary: bool,
    skipped_records: usize,
}

impl LayerRegistry {
    pub fn build(
        records: Vec<TreeRecord>,
        regions: &RegionSet,
        has_combined_boundary: bool,
        skipped_records: usize,
    ) -> Self {
        let classification = classify_all(&records, regions);
        let region_names = regions.names();
        let slot: HashMap<&str, usize> = region_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut per_region = vec![Vec::new(); region_names.len()];
        let mut unclassified = Vec::new();

        for entry in classification.entries() {
            match &entry.classification {
                Classification::Region(name) => {
                    if let Some(&i) = slot.get(name.as_str()) {
                        per_region[i].push(entry.tag.clone());
                    }
                }
                Classification::Unclassified => unclassified.push(entry.tag.clone()),
            }
        }

        let mut record_index = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            record_index.entry(record.tag.clone()).or_insert(i);
        }

        LayerRegistry {
            records,
            record_index,
            classification,
            region_names,
            per_region,
            unclassified,
            has_combined_boundary,
            skipped_records,
        }
    }

    pub fn records(&self) -> &[TreeRecord] {
        &self.records
    }

    pub fn record(&self, tag: &str) -> Option<&TreeRecord> {
        self.record_index.get(tag).map(|&i| &self.records[i])
    }

    pub fn classification_of(&self, tag: &str) -> Option<&Classification> {
        self.classification.get(tag)
    }

    pub fn classification(&self) -> &ClassificationResult {
        &self.classification
    }

    // Every record sits in the combined layer, unclassified ones included
    pub fn combined_tags(&self) -> Vec<String> {
        self.records.iter().map(|r| r.tag.clone()).collect()
    }

    pub fn region_tags(&self, name: &str) -> Option<&[String]> {
        self.region_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.per_region[i].as_slice())
    }

    pub fn unclassified_tags(&self) -> &[String] {
        &self.unclassified
    }

    /// Every layer this registry knows about, in a stable order.
    pub fn all_layers(&self) -> Vec<LayerId> {
        let mut layers = vec![LayerId::Combined];
        layers.extend(self.region_names.iter().cloned().map(LayerId::Region));
        layers.push(LayerId::Unclassified);
        if self.has_combined_boundary {
            layers.push(LayerId::CombinedBoundary);
        }
        layers.extend(self.region_names.iter().cloned().map(LayerId::RegionBoundary));
        layers
    }

    pub fn visible_layers(&self, tier: ZoomTier) -> Vec<LayerId> {
        let visibility = LayerVisibility::for_tier(tier);
        self.all_layers()
            .into_iter()
            .filter(|layer| match layer {
                LayerId::Combined => visibility.combined,
                LayerId::Region(_) => visibility.per_region,
                LayerId::Unclassified => visibility.unclassified,
                LayerId::CombinedBoundary => visibility.boundaries == BoundaryOverlay::CombinedOnly,
                LayerId::RegionBoundary(_) => visibility.boundaries == BoundaryOverlay::PerRegionOnly,
            })
            .collect()
    }

    /// Layers to add and remove when moving from `from` to `to`.
    ///
    /// With no previous tier every layer is listed in one of the two sets,
    /// which establishes the initial state after a load.
    pub fn transition(&self, from: Option<ZoomTier>, to: ZoomTier) -> LayerActions {
        let target: BTreeSet<LayerId> = self.visible_layers(to).into_iter().collect();

        let (show, hide): (Vec<LayerId>, Vec<LayerId>) = match from {
            None => {
                let all = self.all_layers();
                let show = all.iter().filter(|l| target.contains(*l)).cloned().collect();
                let hide = all.into_iter().filter(|l| !target.contains(l)).collect();
                (show, hide)
            }
            Some(prev) => {
                let current: BTreeSet<LayerId> = self.visible_layers(prev).into_iter().collect();
                let all = self.all_layers();
                let show = all
                    .iter()
                    .filter(|l| target.contains(*l) && !current.contains(*l))
                    .cloned()
                    .collect();
                let hide = all
                    .into_iter()
                    .filter(|l| current.contains(l) && !target.contains(l))
                    .collect();
                (show, hide)
            }
        };

        LayerActions { tier: to, show, hide }
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            total_trees: self.records.len(),
            regions: self
                .region_names
                .iter()
                .zip(self.per_region.iter())
                .map(|(name, tags)| RegionCount {
                    name: name.clone(),
                    count: tags.len(),
                })
                .collect(),
            unclassified: self.unclassified.len(),
            skipped_records: self.skipped_records,
            species_count: species_list(&self.records).len(),
        }
    }
}
