use futures::future::{select, Either};
use js_sys::{Function, Promise, Reflect};
use serde_json::Value;
use std::collections::BTreeMap;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::config::{ApiEndpoints, FetchPolicy};
use crate::error::LoadError;
use crate::geojson_features::{detail_from_value, records_from_geojson_value, NormalizedDataset};
use crate::models::{LatLng, TreeAttributes, TreeDetail, TreeRecord};
use crate::{console_log, console_warn, fetch_json};

// Resolve after `ms` milliseconds via the global setTimeout (window or worker)
fn sleep(ms: u32) -> JsFuture {
    let promise = Promise::new(&mut |resolve, _reject| {
        let global = js_sys::global();
        let set_timeout = Reflect::get(&global, &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());

        match set_timeout {
            Some(set_timeout) => {
                // A timer that can't be scheduled fires right away
                if set_timeout.call2(&global, &resolve, &JsValue::from(ms)).is_err() {
                    let _ = resolve.call0(&JsValue::undefined());
                }
            }
            None => {
                let _ = resolve.call0(&JsValue::undefined());
            }
        }
    });
    JsFuture::from(promise)
}

fn describe_js_error(err: &JsValue) -> String {
    if let Some(js_err) = err.dyn_ref::<js_sys::Error>() {
        return String::from(js_err.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

// One request raced against the timeout
async fn fetch_once(url: &str, timeout_ms: u32) -> Result<JsValue, LoadError> {
    let promise = fetch_json(url).map_err(|e| LoadError::Fetch {
        url: url.to_string(),
        message: describe_js_error(&e),
    })?;

    let request = JsFuture::from(promise);
    let timeout = sleep(timeout_ms);

    match select(request, timeout).await {
        Either::Left((Ok(value), _)) => Ok(value),
        Either::Left((Err(e), _)) => Err(LoadError::Fetch {
            url: url.to_string(),
            message: describe_js_error(&e),
        }),
        Either::Right(_) => Err(LoadError::Timeout {
            url: url.to_string(),
            timeout_ms,
        }),
    }
}

/// Fetch JSON through the page helper with a timeout per attempt and
/// `policy.max_retries` retries, waiting `backoff_ms` before each retry.
pub async fn fetch_with_retry(url: &str, policy: &FetchPolicy) -> Result<Value, LoadError> {
    let mut last_error = None;

    for attempt in 0..policy.attempts() {
        let delay = policy.backoff_before(attempt);
        if delay > 0 {
            let _ = sleep(delay).await;
        }

        match fetch_once(url, policy.timeout_ms).await {
            Ok(js_value) => {
                return serde_wasm_bindgen::from_value::<Value>(js_value).map_err(|e| {
                    LoadError::Decode {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                });
            }
            Err(err) => {
                console_warn!("Attempt {}/{} failed: {}", attempt + 1, policy.attempts(), err);
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LoadError::Fetch {
        url: url.to_string(),
        message: "no request was attempted".to_string(),
    }))
}

/// Load and normalize the tree list. An empty result is a load failure so
/// the caller can fall back instead of drawing an empty map.
pub async fn load_dataset(url: &str, policy: &FetchPolicy) -> Result<NormalizedDataset, LoadError> {
    let body = fetch_with_retry(url, policy).await?;
    let dataset = records_from_geojson_value(&body).map_err(|e| LoadError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    if dataset.records.is_empty() {
        return Err(LoadError::Empty { url: url.to_string() });
    }

    console_log!(
        "Loaded {} trees from {} ({} skipped)",
        dataset.records.len(),
        url,
        dataset.skipped
    );
    Ok(dataset)
}

pub async fn fetch_tree_detail(
    api: &ApiEndpoints,
    tag: &str,
    policy: &FetchPolicy,
) -> Result<TreeDetail, LoadError> {
    let url = api.detail_url(tag);
    let body = fetch_with_retry(&url, policy).await?;
    detail_from_value(&body).map_err(|e| LoadError::Decode {
        url,
        message: e.to_string(),
    })
}

/// Placeholder dataset shown when the real one can't be loaded.
pub fn sample_trees() -> Vec<TreeRecord> {
    let sample = |tag: &str, name: &str, species: &str, lat: f64, lng: f64| TreeRecord {
        tag: tag.to_string(),
        position: LatLng::new(lat, lng),
        attributes: TreeAttributes {
            common_name: name.to_string(),
            botanical_name: species.to_string(),
            height: None,
            diameter: None,
            crown_height: None,
            crown_spread: None,
            health: None,
            last_update: None,
            notes: None,
            alternate_tag: None,
            quantity: 1,
            raw: BTreeMap::new(),
        },
    };

    vec![
        sample("1", "Oak Tree", "Quercus", 37.31960, -122.04520),
        sample("2", "Pine Tree", "Pinus", 37.31920, -122.04480),
        sample("3", "Cherry Tree", "Prunus", 37.31900, -122.04450),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{RegionSet, CAMPUS_REGIONS};

    #[test]
    fn sample_trees_have_unique_tags() {
        let trees = sample_trees();
        assert_eq!(trees.len(), 3);
        let mut tags: Vec<_> = trees.iter().map(|t| t.tag.clone()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn sample_trees_sit_on_campus() {
        let regions = RegionSet::from_configs(&CAMPUS_REGIONS).unwrap();
        for tree in sample_trees() {
            assert!(
                regions.classify(&tree.position).region_name().is_some(),
                "{} is off campus",
                tree.tag
            );
        }
    }
}
