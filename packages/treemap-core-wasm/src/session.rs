use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

use crate::config::{FetchPolicy, TreeMapConfig};
use crate::error::ConfigError;
use crate::filter::{species_list, FilterForm, FilterOutcome, TreeFilter};
use crate::geojson_features::{
    records_from_geojson_value, records_from_table, NormalizedDataset, TabularDataset,
};
use crate::layer_registry::{LayerActions, LayerRegistry};
use crate::models::DatasetSummary;
use crate::regions::RegionSet;
use crate::zoom_tier::{tier_for, ZoomTier};
use crate::{console_log, to_js};

/// A loaded dataset waiting to be installed into a session.
#[wasm_bindgen]
pub struct LoadedDataset {
    dataset: NormalizedDataset,
    fallback: bool,
}

impl LoadedDataset {
    pub fn new(dataset: NormalizedDataset, fallback: bool) -> Self {
        LoadedDataset { dataset, fallback }
    }

    pub fn dataset(&self) -> &NormalizedDataset {
        &self.dataset
    }
}

#[wasm_bindgen]
impl LoadedDataset {
    #[wasm_bindgen(getter, js_name = recordCount)]
    pub fn record_count(&self) -> usize {
        self.dataset.records.len()
    }

    #[wasm_bindgen(getter)]
    pub fn skipped(&self) -> usize {
        self.dataset.skipped
    }

    // True when the sample trees stand in for a failed load
    #[wasm_bindgen(getter, js_name = isFallback)]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// State the map page holds for one map: configuration, the layer
/// registry of the current dataset, the active filter and the last tier
/// it applied.
#[wasm_bindgen]
pub struct TreeMapSession {
    config: TreeMapConfig,
    regions: RegionSet,
    has_combined_boundary: bool,
    registry: LayerRegistry,
    current_tier: Option<ZoomTier>,
    filter: TreeFilter,
}

impl TreeMapSession {
    pub fn with_config(config: TreeMapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let regions = config.region_set()?;
        let has_combined_boundary = config.combined_region()?.is_some();
        let registry = LayerRegistry::build(Vec::new(), &regions, has_combined_boundary, 0);

        Ok(TreeMapSession {
            config,
            regions,
            has_combined_boundary,
            registry,
            current_tier: None,
            filter: TreeFilter::default(),
        })
    }

    pub fn config(&self) -> &TreeMapConfig {
        &self.config
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn current_tier(&self) -> Option<ZoomTier> {
        self.current_tier
    }

    pub fn filter(&self) -> &TreeFilter {
        &self.filter
    }

    /// Replace the dataset. The previous registry is dropped and the layer
    /// state is re-established from scratch for `zoom`.
    pub fn replace_dataset(&mut self, dataset: NormalizedDataset, zoom: f64) -> LayerActions {
        self.registry = LayerRegistry::build(
            dataset.records,
            &self.regions,
            self.has_combined_boundary,
            dataset.skipped,
        );
        self.current_tier = None;

        let summary = self.registry.summary();
        console_log!(
            "Registry rebuilt: {} trees, {} unclassified",
            summary.total_trees,
            summary.unclassified
        );

        self.update_zoom(zoom)
    }

    /// Recompute the tier for a zoom change and return the layer changes.
    pub fn update_zoom(&mut self, zoom: f64) -> LayerActions {
        let tier = tier_for(zoom, &self.config.zoom_levels);
        let actions = self.registry.transition(self.current_tier, tier);
        self.current_tier = Some(tier);
        actions
    }

    pub fn set_filter(&mut self, filter: TreeFilter) -> FilterOutcome {
        self.filter = filter;
        self.filter.apply(self.registry.records())
    }

    pub fn summary(&self) -> DatasetSummary {
        self.registry.summary()
    }

    // Tags in one layer, addressed by its layer key
    pub fn layer_tags(&self, key: &str) -> Option<Vec<String>> {
        match key {
            "combined" => Some(self.registry.combined_tags()),
            "unclassified" => Some(self.registry.unclassified_tags().to_vec()),
            _ => key
                .strip_prefix("region:")
                .and_then(|name| self.registry.region_tags(name))
                .map(|tags| tags.to_vec()),
        }
    }
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

#[wasm_bindgen]
impl TreeMapSession {
    // `undefined` or `null` selects the built-in campus configuration
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<TreeMapSession, JsValue> {
        let config: TreeMapConfig = if config.is_undefined() || config.is_null() {
            TreeMapConfig::default()
        } else {
            from_value(config).map_err(|e| js_err("Invalid tree map config", e))?
        };
        Ok(TreeMapSession::with_config(config)?)
    }

    #[wasm_bindgen(js_name = loadGeoJson)]
    pub fn load_geojson_js(&mut self, geojson: JsValue, zoom: f64) -> Result<JsValue, JsValue> {
        let value: serde_json::Value =
            from_value(geojson).map_err(|e| js_err("Invalid GeoJSON input", e))?;
        let dataset = records_from_geojson_value(&value)?;
        to_js(&self.replace_dataset(dataset, zoom))
    }

    #[wasm_bindgen(js_name = loadRows)]
    pub fn load_rows_js(&mut self, table: JsValue, zoom: f64) -> Result<JsValue, JsValue> {
        let table: TabularDataset =
            from_value(table).map_err(|e| js_err("Invalid CSV table input", e))?;
        let dataset = records_from_table(&table);
        to_js(&self.replace_dataset(dataset, zoom))
    }

    #[wasm_bindgen(js_name = installDataset)]
    pub fn install_dataset_js(&mut self, loaded: &LoadedDataset, zoom: f64) -> Result<JsValue, JsValue> {
        to_js(&self.replace_dataset(loaded.dataset.clone(), zoom))
    }

    #[wasm_bindgen(js_name = onZoom)]
    pub fn on_zoom_js(&mut self, zoom: f64) -> Result<JsValue, JsValue> {
        to_js(&self.update_zoom(zoom))
    }

    #[wasm_bindgen(js_name = currentTier)]
    pub fn current_tier_js(&self) -> Option<String> {
        self.current_tier.map(|t| t.as_str().to_string())
    }

    #[wasm_bindgen(js_name = classificationOf)]
    pub fn classification_of_js(&self, tag: &str) -> Option<String> {
        self.registry
            .classification_of(tag)
            .map(|c| c.as_str().to_string())
    }

    #[wasm_bindgen(js_name = record)]
    pub fn record_js(&self, tag: &str) -> Result<JsValue, JsValue> {
        match self.registry.record(tag) {
            Some(record) => to_js(record),
            None => Ok(JsValue::undefined()),
        }
    }

    #[wasm_bindgen(js_name = layerTags)]
    pub fn layer_tags_js(&self, key: &str) -> Result<JsValue, JsValue> {
        match self.layer_tags(key) {
            Some(tags) => to_js(&tags),
            None => Ok(JsValue::undefined()),
        }
    }

    #[wasm_bindgen(js_name = applyFilter)]
    pub fn apply_filter_js(&mut self, form: JsValue) -> Result<JsValue, JsValue> {
        let form: FilterForm = from_value(form).map_err(|e| js_err("Invalid filter form", e))?;
        to_js(&self.set_filter(form.into()))
    }

    #[wasm_bindgen(js_name = resetFilter)]
    pub fn reset_filter_js(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.set_filter(TreeFilter::default()))
    }

    #[wasm_bindgen(js_name = speciesList)]
    pub fn species_list_js(&self) -> Result<JsValue, JsValue> {
        to_js(&species_list(self.registry.records()))
    }

    #[wasm_bindgen(js_name = summary)]
    pub fn summary_js(&self) -> Result<JsValue, JsValue> {
        to_js(&self.summary())
    }

    #[wasm_bindgen(js_name = regionNames)]
    pub fn region_names_js(&self) -> Result<JsValue, JsValue> {
        to_js(&self.regions.names())
    }

    #[wasm_bindgen(js_name = config)]
    pub fn config_js(&self) -> Result<JsValue, JsValue> {
        to_js(&self.config)
    }

    #[wasm_bindgen(js_name = treesUrl)]
    pub fn trees_url(&self) -> String {
        self.config.api.trees_list.clone()
    }

    #[wasm_bindgen(js_name = detailBaseUrl)]
    pub fn detail_base_url(&self) -> String {
        self.config.api.tree_detail.clone()
    }

    #[wasm_bindgen(js_name = fetchPolicy)]
    pub fn fetch_policy_js(&self) -> Result<JsValue, JsValue> {
        to_js::<FetchPolicy>(&self.config.fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset_loader::sample_trees;
    use crate::geojson_features::records_from_geojson_value;
    use crate::layer_registry::LayerId;
    use crate::models::Classification;
    use serde_json::json;

    fn geojson() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                { "id": 10, "geometry": { "type": "Point", "coordinates": [-122.047, 37.320] },
                  "properties": { "common_name": "Coast Live Oak", "height": "30 ft" } },
                { "id": 11, "geometry": { "type": "Point", "coordinates": [-122.043, 37.320] },
                  "properties": { "common_name": "Ginkgo", "height": "12 ft" } },
                { "id": 12, "geometry": { "type": "Point", "coordinates": [-122.044, 37.310] },
                  "properties": { "common_name": "Coast Live Oak" } }
            ]
        })
    }

    fn loaded_session(zoom: f64) -> (TreeMapSession, LayerActions) {
        let mut session = TreeMapSession::with_config(TreeMapConfig::default()).unwrap();
        let dataset = records_from_geojson_value(&geojson()).unwrap();
        let actions = session.replace_dataset(dataset, zoom);
        (session, actions)
    }

    #[test]
    fn load_establishes_initial_tier() {
        let (session, actions) = loaded_session(16.0);
        assert_eq!(session.current_tier(), Some(ZoomTier::Combined));
        assert_eq!(actions.tier, ZoomTier::Combined);
        assert_eq!(actions.show, vec![LayerId::Combined, LayerId::CombinedBoundary]);
        assert_eq!(
            actions.show.len() + actions.hide.len(),
            session.registry().all_layers().len()
        );
    }

    #[test]
    fn zoom_changes_only_report_differences() {
        let (mut session, _) = loaded_session(16.0);

        let to_separated = session.update_zoom(17.0);
        assert!(to_separated.show.contains(&LayerId::Unclassified));
        assert!(to_separated.hide.contains(&LayerId::Combined));

        assert!(session.update_zoom(17.4).is_empty());

        let to_markers = session.update_zoom(18.0);
        assert_eq!(to_markers.tier, ZoomTier::MarkersOnly);
        assert!(to_markers.show.is_empty());
        assert!(to_markers
            .hide
            .iter()
            .all(|l| matches!(l, LayerId::RegionBoundary(_))));
    }

    #[test]
    fn reload_replaces_registry() {
        let (mut session, _) = loaded_session(18.0);
        assert_eq!(session.summary().total_trees, 3);
        assert_eq!(
            session.registry().classification_of("12"),
            Some(&Classification::Unclassified)
        );

        let sample = NormalizedDataset { records: sample_trees(), skipped: 0 };
        let actions = session.replace_dataset(sample, 18.0);
        assert_eq!(actions.tier, ZoomTier::MarkersOnly);
        assert_eq!(session.summary().total_trees, 3);
        assert!(session.registry().classification_of("12").is_none());
    }

    #[test]
    fn layer_tags_by_key() {
        let (session, _) = loaded_session(16.0);
        assert_eq!(session.layer_tags("combined").unwrap().len(), 3);
        assert_eq!(session.layer_tags("region:West Campus").unwrap(), vec!["10"]);
        assert_eq!(session.layer_tags("region:East Campus").unwrap(), vec!["11"]);
        assert_eq!(session.layer_tags("unclassified").unwrap(), vec!["12"]);
        assert!(session.layer_tags("region:Nowhere").is_none());
        assert!(session.layer_tags("bogus").is_none());
    }

    #[test]
    fn filter_runs_over_current_records() {
        let (mut session, _) = loaded_session(16.0);
        let outcome = session.set_filter(TreeFilter {
            common_name: Some("Coast Live Oak".into()),
            height_min: Some(20.0),
            ..Default::default()
        });
        assert!(outcome.active);
        assert_eq!(outcome.visible_tags, vec!["10"]);
        assert_eq!(outcome.total, 3);

        let reset = session.set_filter(TreeFilter::default());
        assert!(!reset.active);
        assert_eq!(reset.shown, 3);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = TreeMapConfig::default();
        config.zoom_levels.separate_at = 20.0;
        assert!(TreeMapSession::with_config(config).is_err());
    }

    #[test]
    fn zoom_before_any_load_uses_empty_registry() {
        let mut session = TreeMapSession::with_config(TreeMapConfig::default()).unwrap();
        let actions = session.update_zoom(17.0);
        assert_eq!(actions.tier, ZoomTier::Separated);
        assert_eq!(session.summary().total_trees, 0);
    }
}
