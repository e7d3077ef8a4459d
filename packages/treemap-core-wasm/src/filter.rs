use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::TreeRecord;

// Filter criteria from the map's filter panel. Empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeFilter {
    pub common_name: Option<String>,
    pub tag_number: Option<String>,
    pub height_min: Option<f64>,
    pub height_max: Option<f64>,
}

// Raw form values; the panel sends whatever was typed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterForm {
    pub common_name: String,
    pub tag_number: String,
    pub height_min: String,
    pub height_max: String,
}

impl From<FilterForm> for TreeFilter {
    // Bounds that don't parse as numbers are dropped rather than rejected
    fn from(form: FilterForm) -> Self {
        let text = |s: String| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        };
        TreeFilter {
            common_name: text(form.common_name),
            tag_number: text(form.tag_number),
            height_min: parse_height(&form.height_min),
            height_max: parse_height(&form.height_max),
        }
    }
}

impl TreeFilter {
    pub fn is_active(&self) -> bool {
        self.common_name.is_some()
            || self.tag_number.is_some()
            || self.height_min.is_some()
            || self.height_max.is_some()
    }

    pub fn matches(&self, record: &TreeRecord) -> bool {
        if let Some(name) = &self.common_name {
            if &record.attributes.common_name != name {
                return false;
            }
        }

        if let Some(tag) = &self.tag_number {
            if !record.tag.contains(tag.as_str()) {
                return false;
            }
        }

        if self.height_min.is_some() || self.height_max.is_some() {
            let height = match record.attributes.height.as_deref().and_then(parse_height) {
                Some(h) => h,
                // Missing or unreadable heights fail any bound instead of slipping through
                None => return false,
            };
            if self.height_min.map_or(false, |min| height < min) {
                return false;
            }
            if self.height_max.map_or(false, |max| height > max) {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, records: &[TreeRecord]) -> FilterOutcome {
        let visible_tags: Vec<String> = records
            .iter()
            .filter(|r| self.matches(r))
            .map(|r| r.tag.clone())
            .collect();

        FilterOutcome {
            active: self.is_active(),
            shown: visible_tags.len(),
            total: records.len(),
            visible_tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub active: bool,
    pub shown: usize,
    pub total: usize,
    pub visible_tags: Vec<String>,
}

/// Read a number out of a free-form height such as `"35 ft"` or `"~12.5m"`.
///
/// Everything except digits and dots is dropped, then the longest numeric
/// prefix is parsed, so `"1.2.3"` reads as 1.2.
pub fn parse_height(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in digits.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = i + 1;
    }

    digits[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Sorted, de-duplicated common names for the species dropdown.
pub fn species_list(records: &[TreeRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.attributes.has_common_name())
        .map(|r| r.attributes.common_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatLng, TreeAttributes, UNKNOWN};
    use std::collections::BTreeMap;

    fn tree(tag: &str, name: &str, height: Option<&str>) -> TreeRecord {
        TreeRecord {
            tag: tag.to_string(),
            position: LatLng::new(37.319, -122.045),
            attributes: TreeAttributes {
                common_name: name.to_string(),
                botanical_name: UNKNOWN.to_string(),
                height: height.map(str::to_string),
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
        }
    }

    fn dataset() -> Vec<TreeRecord> {
        vec![
            tree("1201", "Coast Live Oak", Some("35 ft")),
            tree("1202", "Coast Live Oak", Some("12 ft")),
            tree("2301", "Coast Redwood", Some("80'")),
            tree("2302", "Ginkgo", None),
            tree("2303", UNKNOWN, Some("n/a")),
        ]
    }

    #[test]
    fn inactive_filter_shows_everything() {
        let outcome = TreeFilter::default().apply(&dataset());
        assert!(!outcome.active);
        assert_eq!(outcome.shown, 5);
        assert_eq!(outcome.total, 5);
    }

    #[test]
    fn species_is_exact_match() {
        let filter = TreeFilter {
            common_name: Some("Coast Live Oak".into()),
            ..Default::default()
        };
        let outcome = filter.apply(&dataset());
        assert_eq!(outcome.visible_tags, vec!["1201", "1202"]);

        let partial = TreeFilter {
            common_name: Some("Coast".into()),
            ..Default::default()
        };
        assert_eq!(partial.apply(&dataset()).shown, 0);
    }

    #[test]
    fn tag_is_substring_match() {
        let filter = TreeFilter {
            tag_number: Some("30".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&dataset()).visible_tags, vec!["2301", "2302", "2303"]);
    }

    #[test]
    fn height_range_excludes_missing_heights() {
        let filter = TreeFilter {
            height_min: Some(10.0),
            height_max: Some(40.0),
            ..Default::default()
        };
        let outcome = filter.apply(&dataset());
        assert!(outcome.active);
        assert_eq!(outcome.visible_tags, vec!["1201", "1202"]);
    }

    #[test]
    fn height_bounds_are_inclusive() {
        let filter = TreeFilter {
            height_min: Some(12.0),
            height_max: Some(12.0),
            ..Default::default()
        };
        assert_eq!(filter.apply(&dataset()).visible_tags, vec!["1202"]);
    }

    #[test]
    fn parse_height_reads_numeric_prefix() {
        assert_eq!(parse_height("35 ft"), Some(35.0));
        assert_eq!(parse_height("~12.5m"), Some(12.5));
        assert_eq!(parse_height("1.2.3"), Some(1.2));
        assert_eq!(parse_height("80'"), Some(80.0));
        assert_eq!(parse_height("n/a"), None);
        assert_eq!(parse_height(""), None);
    }

    #[test]
    fn form_values_are_trimmed_and_parsed() {
        let filter: TreeFilter = FilterForm {
            common_name: "  ".into(),
            tag_number: " 12 ".into(),
            height_min: "abc".into(),
            height_max: "20".into(),
        }
        .into();

        assert_eq!(filter.common_name, None);
        assert_eq!(filter.tag_number.as_deref(), Some("12"));
        assert_eq!(filter.height_min, None);
        assert_eq!(filter.height_max, Some(20.0));
    }

    #[test]
    fn species_list_is_sorted_and_unique() {
        assert_eq!(
            species_list(&dataset()),
            vec!["Coast Live Oak", "Coast Redwood", "Ginkgo"]
        );
    }
}
