/// Projection configuration.
use crate::error::{Error, Result};
use serde::Deserialize;

/// Options shared by both projections
///
/// # Examples
///
/// ```
/// use livelist::ViewConfig;
///
/// let config = ViewConfig::from_json(r#"{ "lookup_cache": false }"#).unwrap();
/// assert!(!config.lookup_cache);
/// assert!(config.follow_current);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Remember the last flat row resolved by `map_to_source`.
    /// Only the full-flatten projection consults it.
    pub lookup_cache: bool,

    /// Expand the group holding a newly selected item so the item becomes
    /// visible. Only the expandable projection consults it.
    pub follow_current: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            lookup_cache: true,
            follow_current: true,
        }
    }
}

impl ViewConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn without_lookup_cache(mut self) -> Self {
        self.lookup_cache = false;
        self
    }

    pub fn without_follow_current(mut self) -> Self {
        self.follow_current = false;
        self
    }
}
