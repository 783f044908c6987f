use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::cache::{CachedStats, StatsCache};
use crate::error::Result;
use crate::fetch::{Coordinates, RealtorStats};
use crate::stats::{as_of_date, RawStatsPayload};

/// Anything that can produce a statistics payload for a point.
#[allow(async_fn_in_trait)]
pub trait StatsSource {
    async fn statistics(&self, at: Coordinates) -> Result<RawStatsPayload>;
}

impl StatsSource for RealtorStats {
    async fn statistics(&self, at: Coordinates) -> Result<RawStatsPayload> {
        RealtorStats::statistics(self, at).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStats {
    pub payload: RawStatsPayload,
    pub as_of_date: Option<NaiveDate>,
    pub from_cache: bool,
}

/// Serve statistics from the cache when fresh, otherwise fetch and cache.
pub struct StatsLoader<'a, S> {
    source: &'a S,
    cache: Option<&'a dyn StatsCache>,
}

impl<'a, S: StatsSource> StatsLoader<'a, S> {
    pub fn new(source: &'a S, cache: Option<&'a dyn StatsCache>) -> Self {
        Self { source, cache }
    }

    pub async fn load(
        &self,
        location: &str,
        at: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<LoadedStats> {
        if let Some(cache) = self.cache {
            match cache.lookup(location, now) {
                Ok(Some(hit)) => {
                    info!(location, "statistics served from cache");
                    return Ok(LoadedStats {
                        payload: hit.payload,
                        as_of_date: hit.as_of_date,
                        from_cache: true,
                    });
                }
                Ok(None) => info!(location, "not cached; fetching statistics"),
                Err(e) => error!(location, error = %e, "cache lookup failed; fetching statistics"),
            }
        }

        let payload = self.source.statistics(at).await?;
        let as_of = match as_of_date(&payload) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!(error = %e, "statistics have no as-of date");
                None
            }
        };

        if let Some(cache) = self.cache {
            let entry = CachedStats {
                location: location.to_string(),
                coordinates: at,
                as_of_date: as_of,
                processed_at: now,
                payload: payload.clone(),
                nearby_places: Vec::new(),
                driving_commute: None,
                transit_commute: None,
            };
            if let Err(e) = cache.store(&entry) {
                error!(location, error = %e, "could not cache statistics");
            }
        }

        Ok(LoadedStats {
            payload,
            as_of_date: as_of,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ParquetStatsCache;
    use crate::error::HubError;
    use crate::stats::ErrorCode;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const AT: Coordinates = Coordinates {
        latitude: 43.678985,
        longitude: -79.34491,
    };

    struct FakeSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    impl StatsSource for FakeSource {
        async fn statistics(&self, at: Coordinates) -> Result<RawStatsPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HubError::NoStatistics(at.as_param()));
            }
            Ok(RawStatsPayload {
                error_code: Some(ErrorCode {
                    product_name: Some("Stats [Friday, January 7, 2022 3:52:11 PM]".into()),
                    ..Default::default()
                }),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let tmp = tempdir().unwrap();
        let cache = ParquetStatsCache::open(tmp.path(), 30).unwrap();
        let source = FakeSource::new();
        let loader = StatsLoader::new(&source, Some(&cache));
        let now = Utc::now();

        let first = loader.load("Riverdale", AT, now).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.as_of_date, NaiveDate::from_ymd_opt(2022, 1, 7));

        let second = loader.load("riverdale", AT, now).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.payload, first.payload);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_refetches() {
        let tmp = tempdir().unwrap();
        let cache = ParquetStatsCache::open(tmp.path(), 30).unwrap();
        let source = FakeSource::new();
        let loader = StatsLoader::new(&source, Some(&cache));
        let now = Utc::now();

        loader.load("Rosedale", AT, now - Duration::days(45)).await.unwrap();
        let again = loader.load("Rosedale", AT, now).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_cache_always_fetches() {
        let source = FakeSource::new();
        let loader = StatsLoader::new(&source, None);
        loader.load("x", AT, Utc::now()).await.unwrap();
        loader.load("x", AT, Utc::now()).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let source = FakeSource {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let loader = StatsLoader::new(&source, None);
        let err = loader.load("x", AT, Utc::now()).await.unwrap_err();
        assert!(matches!(err, HubError::NoStatistics(_)));
    }
}
