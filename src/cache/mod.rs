pub mod parquet_store;

pub use parquet_store::ParquetStatsCache;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetch::{Coordinates, NearbyPlace};
use crate::stats::RawStatsPayload;

/// A statistics payload plus what we knew about the location when we fetched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStats {
    pub location: String,
    pub coordinates: Coordinates,
    pub as_of_date: Option<NaiveDate>,
    pub processed_at: DateTime<Utc>,
    pub payload: RawStatsPayload,
    #[serde(default)]
    pub nearby_places: Vec<NearbyPlace>,
    pub driving_commute: Option<String>,
    pub transit_commute: Option<String>,
}

impl CachedStats {
    pub fn key(&self) -> String {
        cache_key(&self.location)
    }
}

/// Store of previously fetched statistics, keyed by location text.
pub trait StatsCache: Send + Sync {
    /// Newest entry for `location` processed within the freshness window
    /// ending at `now`.
    fn lookup(&self, location: &str, now: DateTime<Utc>) -> Result<Option<CachedStats>>;

    fn store(&self, entry: &CachedStats) -> Result<()>;
}

/// `"  Riverdale,   ONTARIO "` -> `"riverdale, ontario"`
pub fn cache_key(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("  Riverdale,   ONTARIO "), "riverdale, ontario");
        assert_eq!(cache_key("M4K 1N8"), cache_key("m4k  1n8"));
    }
}
