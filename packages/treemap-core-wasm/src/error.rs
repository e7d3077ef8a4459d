use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors raised while building a region from configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionError {
    #[error("region name must not be empty")]
    EmptyName,

    #[error("region name \"{0}\" is reserved")]
    ReservedName(String),

    #[error("region \"{name}\" needs at least 3 boundary points, got {count}")]
    TooFewPoints { name: String, count: usize },

    #[error("region \"{name}\" has a non-finite vertex at index {index}")]
    NonFiniteVertex { name: String, index: usize },

    #[error("region name \"{0}\" is declared more than once")]
    DuplicateName(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("zoom thresholds must be finite (separate_at={separate_at}, markers_only_at={markers_only_at})")]
    NonFiniteThreshold { separate_at: f64, markers_only_at: f64 },

    #[error("separate_at ({separate_at}) must not exceed markers_only_at ({markers_only_at})")]
    ThresholdOrder { separate_at: f64, markers_only_at: f64 },

    #[error("fetch timeout must be greater than zero")]
    ZeroTimeout,

    #[error("at most {max} fetch retry allowed, got {max_retries}")]
    TooManyRetries { max_retries: u32, max: u32 },

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// A failed dataset or detail load. Callers can match on the variant to
/// pick a fallback instead of surfacing a raw JS exception.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u32 },

    #[error("response from {url} could not be decoded: {message}")]
    Decode { url: String, message: String },

    #[error("response from {url} contained no usable tree records")]
    Empty { url: String },
}

impl LoadError {
    /// Short machine-readable kind, handed to JS alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Fetch { .. } => "fetch",
            LoadError::Timeout { .. } => "timeout",
            LoadError::Decode { .. } => "decode",
            LoadError::Empty { .. } => "empty",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("expected a GeoJSON FeatureCollection, found type \"{0}\"")]
    NotFeatureCollection(String),

    #[error("malformed record payload: {0}")]
    Malformed(String),
}

impl From<RegionError> for JsValue {
    fn from(err: RegionError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

impl From<RecordError> for JsValue {
    fn from(err: RecordError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

impl From<LoadError> for JsValue {
    fn from(err: LoadError) -> Self {
        let js_err = js_sys::Error::new(&err.to_string());
        js_err.set_name(&format!("LoadError:{}", err.kind()));
        js_err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_kinds_are_distinct() {
        let url = "/api/rest/trees/".to_string();
        let kinds = [
            LoadError::Fetch { url: url.clone(), message: "x".into() }.kind(),
            LoadError::Timeout { url: url.clone(), timeout_ms: 10 }.kind(),
            LoadError::Decode { url: url.clone(), message: "x".into() }.kind(),
            LoadError::Empty { url }.kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn region_error_message_names_region() {
        let err = RegionError::TooFewPoints { name: "West Campus".into(), count: 2 };
        assert_eq!(
            err.to_string(),
            "region \"West Campus\" needs at least 3 boundary points, got 2"
        );
    }
}
