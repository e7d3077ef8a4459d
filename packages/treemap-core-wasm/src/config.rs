use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::regions::{Region, RegionConfig, RegionSet, CAMPUS_COMBINED_AREA, CAMPUS_REGIONS};
use crate::zoom_tier::ZoomThresholds;

/// Upper bound for `FetchPolicy::max_retries`.
pub const MAX_FETCH_RETRIES: u32 = 1;

// REST endpoints of the tree service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiEndpoints {
    pub trees_list: String,
    // Detail URL is `{tree_detail}{tag}/`
    pub tree_detail: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        ApiEndpoints {
            trees_list: "/api/rest/trees/".to_string(),
            tree_detail: "/api/rest/trees/".to_string(),
        }
    }
}

impl ApiEndpoints {
    pub fn detail_url(&self, tag: &str) -> String {
        format!("{}{}/", self.tree_detail, tag.trim())
    }
}

// Initial viewport handed back to the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSettings {
    pub center: [f64; 2],
    pub default_zoom: f64,
    pub max_zoom: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        MapSettings {
            center: [37.31930349325796, -122.04499476044137],
            default_zoom: 16.0,
            max_zoom: 20.0,
        }
    }
}

/// Timeout and retry settings for dataset and detail requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchPolicy {
    pub timeout_ms: u32,
    pub max_retries: u32,
    pub backoff_ms: u32,
    // Serve the built-in sample trees when the dataset can't be loaded
    pub fallback_to_sample: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            timeout_ms: 10_000,
            max_retries: 1,
            backoff_ms: 500,
            fallback_to_sample: false,
        }
    }
}

impl FetchPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_retries > MAX_FETCH_RETRIES {
            return Err(ConfigError::TooManyRetries {
                max_retries: self.max_retries,
                max: MAX_FETCH_RETRIES,
            });
        }
        Ok(())
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    // Delay before attempt `attempt` (0-based); the first attempt never waits
    pub fn backoff_before(&self, attempt: u32) -> u32 {
        if attempt == 0 {
            0
        } else {
            self.backoff_ms.saturating_mul(attempt)
        }
    }
}

/// Everything the map page configures. Missing fields fall back to the
/// campus defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeMapConfig {
    pub api: ApiEndpoints,
    pub map: MapSettings,
    pub zoom_levels: ZoomThresholds,
    pub regions: Vec<RegionConfig>,
    pub combined_area: Option<RegionConfig>,
    pub fetch: FetchPolicy,
    // Legend label for trees outside every region
    pub unclassified_label: String,
}

impl Default for TreeMapConfig {
    fn default() -> Self {
        TreeMapConfig {
            api: ApiEndpoints::default(),
            map: MapSettings::default(),
            zoom_levels: ZoomThresholds::default(),
            regions: CAMPUS_REGIONS.clone(),
            combined_area: Some(CAMPUS_COMBINED_AREA.clone()),
            fetch: FetchPolicy::default(),
            unclassified_label: "Other".to_string(),
        }
    }
}

impl TreeMapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zoom_levels.validate()?;
        self.fetch.validate()?;
        self.region_set()?;
        if let Some(area) = &self.combined_area {
            Region::from_config(area)?;
        }
        Ok(())
    }

    pub fn region_set(&self) -> Result<RegionSet, ConfigError> {
        Ok(RegionSet::from_configs(&self.regions)?)
    }

    pub fn combined_region(&self) -> Result<Option<Region>, ConfigError> {
        match &self.combined_area {
            Some(area) => Ok(Some(Region::from_config(area)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionError;

    #[test]
    fn empty_object_gives_campus_defaults() {
        let config: TreeMapConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TreeMapConfig::default());
        assert_eq!(config.regions.len(), 3);
        assert_eq!(config.zoom_levels, ZoomThresholds::default());
        config.validate().unwrap();
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: TreeMapConfig = serde_json::from_str(
            r#"{ "zoomLevels": { "separateAt": 15, "markersOnlyAt": 19 }, "fetch": { "timeoutMs": 2500 } }"#,
        )
        .unwrap();
        assert_eq!(config.zoom_levels.separate_at, 15.0);
        assert_eq!(config.zoom_levels.markers_only_at, 19.0);
        assert_eq!(config.fetch.timeout_ms, 2500);
        assert_eq!(config.fetch.max_retries, 1);
        assert_eq!(config.api.trees_list, "/api/rest/trees/");
    }

    #[test]
    fn validate_catches_bad_regions_and_thresholds() {
        let mut config = TreeMapConfig::default();
        config.regions.push(config.regions[0].clone());
        assert_eq!(
            config.validate(),
            Err(ConfigError::Region(RegionError::DuplicateName("West Campus".into())))
        );

        let mut config = TreeMapConfig::default();
        config.zoom_levels = ZoomThresholds { separate_at: 19.0, markers_only_at: 18.0 };
        assert!(matches!(config.validate(), Err(ConfigError::ThresholdOrder { .. })));

        let mut config = TreeMapConfig::default();
        config.fetch.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn detail_url_appends_tag_and_slash() {
        assert_eq!(ApiEndpoints::default().detail_url(" 1201 "), "/api/rest/trees/1201/");
    }

    #[test]
    fn single_retry_with_backoff_only_before_retry() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.attempts(), 2);
        assert_eq!(policy.backoff_before(0), 0);
        assert_eq!(policy.backoff_before(1), 500);
    }

    #[test]
    fn fetch_policy_bounds_retries_and_timeout() {
        let config: TreeMapConfig =
            serde_json::from_str(r#"{ "fetch": { "maxRetries": 4294967295 } }"#).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyRetries { max_retries: u32::MAX, max: MAX_FETCH_RETRIES })
        );
        assert_eq!(config.fetch.attempts(), u32::MAX);

        let policy: FetchPolicy = serde_json::from_str(r#"{ "timeoutMs": 0 }"#).unwrap();
        assert_eq!(policy.validate(), Err(ConfigError::ZeroTimeout));

        let no_retry: FetchPolicy = serde_json::from_str(r#"{ "maxRetries": 0 }"#).unwrap();
        no_retry.validate().unwrap();
        assert_eq!(no_retry.attempts(), 1);
        FetchPolicy::default().validate().unwrap();
    }
}
