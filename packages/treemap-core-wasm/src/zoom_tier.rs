use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Display mode driven by the map's zoom level.
///
/// Variants are declared in zoom order, so the derived `Ord` matches
/// `Combined < Separated < MarkersOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoomTier {
    Combined,
    Separated,
    MarkersOnly,
}

impl ZoomTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomTier::Combined => "COMBINED",
            ZoomTier::Separated => "SEPARATED",
            ZoomTier::MarkersOnly => "MARKERS_ONLY",
        }
    }
}

// Inclusive lower bounds for the two upper tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomThresholds {
    pub separate_at: f64,
    pub markers_only_at: f64,
}

impl Default for ZoomThresholds {
    fn default() -> Self {
        ZoomThresholds {
            separate_at: 17.0,
            markers_only_at: 18.0,
        }
    }
}

impl ZoomThresholds {
    pub fn new(separate_at: f64, markers_only_at: f64) -> Result<Self, ConfigError> {
        let thresholds = ZoomThresholds {
            separate_at,
            markers_only_at,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.separate_at.is_finite() || !self.markers_only_at.is_finite() {
            return Err(ConfigError::NonFiniteThreshold {
                separate_at: self.separate_at,
                markers_only_at: self.markers_only_at,
            });
        }
        if self.separate_at > self.markers_only_at {
            return Err(ConfigError::ThresholdOrder {
                separate_at: self.separate_at,
                markers_only_at: self.markers_only_at,
            });
        }
        Ok(())
    }
}

/// Pick the tier for a zoom level. Rules are checked top-down, first match wins.
pub fn tier_for(zoom: f64, thresholds: &ZoomThresholds) -> ZoomTier {
    if zoom >= thresholds.markers_only_at {
        ZoomTier::MarkersOnly
    } else if zoom >= thresholds.separate_at {
        ZoomTier::Separated
    } else {
        ZoomTier::Combined
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryOverlay {
    CombinedOnly,
    PerRegionOnly,
    None,
}

/// Which layer groups are visible for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerVisibility {
    pub combined: bool,
    pub per_region: bool,
    pub unclassified: bool,
    pub boundaries: BoundaryOverlay,
}

impl LayerVisibility {
    pub fn for_tier(tier: ZoomTier) -> Self {
        match tier {
            ZoomTier::Combined => LayerVisibility {
                combined: true,
                per_region: false,
                unclassified: false,
                boundaries: BoundaryOverlay::CombinedOnly,
            },
            ZoomTier::Separated => LayerVisibility {
                combined: false,
                per_region: true,
                unclassified: true,
                boundaries: BoundaryOverlay::PerRegionOnly,
            },
            ZoomTier::MarkersOnly => LayerVisibility {
                combined: false,
                per_region: true,
                unclassified: true,
                boundaries: BoundaryOverlay::None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_pick_expected_tiers() {
        let t = ZoomThresholds::default();
        assert_eq!(tier_for(16.0, &t), ZoomTier::Combined);
        assert_eq!(tier_for(17.0, &t), ZoomTier::Separated);
        assert_eq!(tier_for(17.5, &t), ZoomTier::Separated);
        assert_eq!(tier_for(18.0, &t), ZoomTier::MarkersOnly);
        assert_eq!(tier_for(25.0, &t), ZoomTier::MarkersOnly);
    }

    #[test]
    fn tier_is_monotonic_in_zoom() {
        let t = ZoomThresholds::new(15.0, 18.0).unwrap();
        let mut prev = tier_for(0.0, &t);
        let mut zoom = 0.0;
        while zoom <= 22.0 {
            let tier = tier_for(zoom, &t);
            assert!(tier >= prev, "tier dropped at zoom {}", zoom);
            prev = tier;
            zoom += 0.25;
        }
    }

    #[test]
    fn equal_thresholds_skip_separated() {
        let t = ZoomThresholds::new(17.0, 17.0).unwrap();
        assert_eq!(tier_for(16.9, &t), ZoomTier::Combined);
        assert_eq!(tier_for(17.0, &t), ZoomTier::MarkersOnly);
    }

    #[test]
    fn thresholds_must_be_ordered_and_finite() {
        assert!(matches!(
            ZoomThresholds::new(18.0, 17.0),
            Err(ConfigError::ThresholdOrder { .. })
        ));
        assert!(matches!(
            ZoomThresholds::new(f64::NAN, 17.0),
            Err(ConfigError::NonFiniteThreshold { .. })
        ));
    }

    #[test]
    fn visibility_table() {
        let combined = LayerVisibility::for_tier(ZoomTier::Combined);
        assert!(combined.combined && !combined.per_region && !combined.unclassified);
        assert_eq!(combined.boundaries, BoundaryOverlay::CombinedOnly);

        let separated = LayerVisibility::for_tier(ZoomTier::Separated);
        assert!(!separated.combined && separated.per_region && separated.unclassified);
        assert_eq!(separated.boundaries, BoundaryOverlay::PerRegionOnly);

        let markers = LayerVisibility::for_tier(ZoomTier::MarkersOnly);
        assert!(!markers.combined && markers.per_region && markers.unclassified);
        assert_eq!(markers.boundaries, BoundaryOverlay::None);
    }

    #[test]
    fn tier_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&ZoomTier::MarkersOnly).unwrap(),
            "\"MARKERS_ONLY\""
        );
        assert_eq!(ZoomTier::Separated.as_str(), "SEPARATED");
    }
}
