// src/config.rs

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};
use tracing::debug;

use crate::error::{HubError, Result};

/// Runtime settings. Defaults cover everything but the API keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub google_maps_api_url: String,
    /// `components` filter for geocoding.
    pub geo_filtering_components: String,
    pub commute_destination: String,

    pub rapid_api_key: Option<String>,
    pub rapid_api_realtor_host: String,

    pub listing_base_url: String,

    pub cache_dir: PathBuf,
    pub cache_freshness_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            google_maps_api_url: "https://maps.googleapis.com/maps/api".to_string(),
            geo_filtering_components: "country:CA|locality:ON".to_string(),
            commute_destination: "Union Station Toronto ON".to_string(),
            rapid_api_key: None,
            rapid_api_realtor_host: "realty-in-ca1.p.rapidapi.com".to_string(),
            listing_base_url: "https://www.zolo.ca/toronto-real-estate".to_string(),
            cache_dir: PathBuf::from("cache"),
            cache_freshness_days: 30,
        }
    }
}

impl Config {
    /// Load defaults, then the YAML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                debug!(path = %p.display(), "reading config");
                let text = fs::read_to_string(p)?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|k| env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| HubError::Config(e.to_string()))
    }

    /// Apply overrides from a variable lookup (the process env in practice).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GOOGLE_API_KEY") {
            self.google_api_key = Some(v);
        }
        if let Some(v) = get("RAPID_API_KEY") {
            self.rapid_api_key = Some(v);
        }
        if let Some(v) = get("RAPID_API_REALTOR_HOST") {
            self.rapid_api_realtor_host = v;
        }
        if let Some(v) = get("LISTING_BASE_URL") {
            self.listing_base_url = v;
        }
        if let Some(v) = get("COMMUTE_DESTINATION") {
            self.commute_destination = v;
        }
        if let Some(v) = get("CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(days) = get("CACHE_FRESHNESS_DAYS").and_then(|v| v.trim().parse().ok()) {
            self.cache_freshness_days = days;
        }
    }

    pub fn google_api_key(&self) -> Result<&str> {
        self.google_api_key.as_deref().ok_or_else(|| {
            HubError::Config("set GOOGLE_API_KEY or google_api_key in the config file".into())
        })
    }

    pub fn rapid_api_key(&self) -> Result<&str> {
        self.rapid_api_key.as_deref().ok_or_else(|| {
            HubError::Config("set RAPID_API_KEY or rapid_api_key in the config file".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_yaml_overrides_defaults() {
        let cfg = Config::from_yaml(
            "rapid_api_key: abc\ncache_freshness_days: 7\ncommute_destination: CN Tower\n",
        )
        .unwrap();
        assert_eq!(cfg.rapid_api_key().unwrap(), "abc");
        assert_eq!(cfg.cache_freshness_days, 7);
        assert_eq!(cfg.commute_destination, "CN Tower");
        assert_eq!(cfg.rapid_api_realtor_host, "realty-in-ca1.p.rapidapi.com");
    }

    #[test]
    fn test_env_wins() {
        let vars: HashMap<&str, &str> = [
            ("GOOGLE_API_KEY", "g"),
            ("CACHE_DIR", "/tmp/hub"),
            ("CACHE_FRESHNESS_DAYS", "not a number"),
            ("RAPID_API_KEY", "  "),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.google_api_key.as_deref(), Some("g"));
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/hub"));
        assert_eq!(cfg.cache_freshness_days, 30);
        assert!(cfg.rapid_api_key.is_none());
        assert!(matches!(cfg.rapid_api_key(), Err(HubError::Config(_))));
    }
}
