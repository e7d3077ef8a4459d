use serde::Serialize;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
pub mod error;
pub mod models;
// Point-in-polygon and bounding box tests
pub mod bbox_filter;
pub mod regions;
pub mod zoom_tier;
// Tree dataset normalization (GeoJSON and CSV rows)
pub mod geojson_features;
pub mod filter;
pub mod layer_registry;
pub mod config;
pub mod dataset_loader;
pub mod session;

use config::{ApiEndpoints, FetchPolicy, TreeMapConfig};
use dataset_loader::{fetch_tree_detail, load_dataset, sample_trees};
use geojson_features::NormalizedDataset;
use models::LatLng;
use regions::{RegionConfig, RegionSet};
use zoom_tier::{tier_for, LayerVisibility, ZoomThresholds, ZoomTier};

pub use session::{LoadedDataset, TreeMapSession};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[wasm_bindgen]
extern "C" {
    // JavaScript function to fetch and parse JSON from a URL
    #[wasm_bindgen(js_namespace = wasmJsHelpers, catch)]
    pub fn fetch_json(url: &str) -> Result<js_sys::Promise, JsValue>;
}

// Use the functions from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::console::warn(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => ($crate::console::error(&format!($($t)*)))
}

// Plain JS objects out; maps and flattened structs would otherwise become `Map`s
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize result: {}", e)))
}

fn optional_from_js<T: Default + serde::de::DeserializeOwned>(
    value: JsValue,
    what: &str,
) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("Tree map module initialized");
    });
}

/// Classify one point against a list of `{ name, polygon }` regions.
/// Without a region list the campus regions are used.
#[wasm_bindgen]
pub fn classify_point(lat: f64, lng: f64, regions: JsValue) -> Result<String, JsValue> {
    let configs: Vec<RegionConfig> = if regions.is_undefined() || regions.is_null() {
        regions::CAMPUS_REGIONS.clone()
    } else {
        from_value(regions).map_err(|e| JsValue::from_str(&format!("Invalid regions: {}", e)))?
    };
    let set = RegionSet::from_configs(&configs)?;
    Ok(set.classify(&LatLng::new(lat, lng)).as_str().to_string())
}

#[wasm_bindgen]
pub fn tier_for_zoom(zoom: f64, thresholds: JsValue) -> Result<String, JsValue> {
    let thresholds: ZoomThresholds = optional_from_js(thresholds, "zoom thresholds")?;
    thresholds.validate()?;
    Ok(tier_for(zoom, &thresholds).as_str().to_string())
}

#[wasm_bindgen]
pub fn visibility_for_tier(tier: JsValue) -> Result<JsValue, JsValue> {
    let tier: ZoomTier =
        from_value(tier).map_err(|e| JsValue::from_str(&format!("Unknown tier: {}", e)))?;
    to_js(&LayerVisibility::for_tier(tier))
}

#[wasm_bindgen]
pub fn default_config() -> Result<JsValue, JsValue> {
    to_js(&TreeMapConfig::default())
}

/// Fetch and normalize the tree list. With `fallbackToSample` set a failed
/// load yields the sample trees instead of an error.
#[wasm_bindgen(js_name = fetchDataset)]
pub async fn fetch_dataset(url: String, policy: JsValue) -> Result<LoadedDataset, JsValue> {
    let policy: FetchPolicy = optional_from_js(policy, "fetch policy")?;
    policy.validate()?;

    match load_dataset(&url, &policy).await {
        Ok(dataset) => Ok(LoadedDataset::new(dataset, false)),
        Err(err) if policy.fallback_to_sample => {
            console_error!("Error loading tree data, showing sample trees: {}", err);
            let records = sample_trees();
            Ok(LoadedDataset::new(NormalizedDataset { records, skipped: 0 }, true))
        }
        Err(err) => {
            console_error!("Error loading tree data: {}", err);
            Err(err.into())
        }
    }
}

#[wasm_bindgen(js_name = fetchTreeDetail)]
pub async fn fetch_tree_detail_js(
    detail_base_url: String,
    tag: String,
    policy: JsValue,
) -> Result<JsValue, JsValue> {
    let policy: FetchPolicy = optional_from_js(policy, "fetch policy")?;
    policy.validate()?;
    let api = ApiEndpoints {
        tree_detail: detail_base_url,
        ..ApiEndpoints::default()
    };
    let detail = fetch_tree_detail(&api, &tag, &policy).await?;
    to_js(&detail)
}

// Get information about WASM module capabilities
#[wasm_bindgen]
pub fn get_wasm_info() -> String {
    let config = TreeMapConfig::default();
    serde_json::to_string(&serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "tiers": [ZoomTier::Combined.as_str(), ZoomTier::Separated.as_str(), ZoomTier::MarkersOnly.as_str()],
        "default_regions": config.regions.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasm_info_lists_tiers_and_regions() {
        let info: serde_json::Value = serde_json::from_str(&get_wasm_info()).unwrap();
        assert_eq!(info["tiers"][1], "SEPARATED");
        assert_eq!(info["default_regions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn start_is_idempotent() {
        start();
        start();
    }
}
