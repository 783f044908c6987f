use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use realestate_hub::{
    cache::{CachedStats, ParquetStatsCache, StatsCache},
    config::Config,
    fetch::{CommuteMode, GoogleMaps, RealtorStats},
    stats::as_of_date,
};
use reqwest::Client;
use std::{path::PathBuf, time::Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Fetch and cache enriched statistics for a batch of locations.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Locations to process, one after another
    #[arg(required = true)]
    locations: Vec<String>,

    /// YAML config file; environment variables override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Re-process locations that already have a fresh cache entry
    #[arg(long)]
    refresh: bool,
}

async fn enrich(
    maps: &GoogleMaps,
    realtor: &RealtorStats,
    location: &str,
) -> realestate_hub::Result<CachedStats> {
    let coordinates = maps.geocode(location).await?;
    let payload = realtor.statistics(coordinates).await?;
    let as_of = as_of_date(&payload)
        .map_err(|e| warn!(location, error = %e, "no as-of date"))
        .ok();
    let nearby_places = maps.nearby_places(coordinates).await?;

    let mut commutes = Vec::with_capacity(2);
    for mode in [CommuteMode::Driving, CommuteMode::Transit] {
        let t = maps.commute_time(coordinates, mode).await.unwrap_or_else(|e| {
            warn!(location, mode = mode.as_str(), error = %e, "commute time unavailable");
            None
        });
        commutes.push(t);
    }
    let transit_commute = commutes.pop().flatten();
    let driving_commute = commutes.pop().flatten();

    Ok(CachedStats {
        location: location.to_string(),
        coordinates,
        as_of_date: as_of,
        processed_at: Utc::now(),
        payload,
        nearby_places,
        driving_commute,
        transit_commute,
    })
}

/// A failed lookup counts as not cached, so the location is re-processed.
fn fresh_in_cache(cache: &dyn StatsCache, location: &str, now: DateTime<Utc>) -> bool {
    match cache.lookup(location, now) {
        Ok(hit) => hit.is_some(),
        Err(e) => {
            error!(location, error = %e, "cache lookup failed; re-processing");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading config")?;

    let client = Client::builder()
        .gzip(true)
        .build()
        .context("building HTTP client")?;
    let maps = GoogleMaps::new(client.clone(), &config)?;
    let realtor = RealtorStats::new(client, &config)?;
    let cache = ParquetStatsCache::open(&config.cache_dir, config.cache_freshness_days)
        .with_context(|| format!("opening cache at {}", config.cache_dir.display()))?;
    info!(
        locations = args.locations.len(),
        cached = cache.len(),
        "etl startup"
    );

    let start = Instant::now();
    let (mut stored, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    for location in &args.locations {
        if !args.refresh && fresh_in_cache(&cache, location, Utc::now()) {
            info!(location = %location, "fresh in cache; skipping");
            skipped += 1;
            continue;
        }

        let entry = match enrich(&maps, &realtor, location).await {
            Ok(e) => e,
            Err(e) => {
                error!(location = %location, error = %e, "enrichment failed");
                failed += 1;
                continue;
            }
        };
        match cache.store(&entry) {
            Ok(()) => {
                info!(
                    location = %location,
                    places = entry.nearby_places.len(),
                    "stored"
                );
                stored += 1;
            }
            Err(e) => {
                error!(location = %location, error = %e, "store failed");
                failed += 1;
            }
        }
    }

    info!(
        stored,
        skipped,
        failed,
        elapsed = ?start.elapsed(),
        "etl finished"
    );

    cache.vacuum().context("vacuuming cache")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use realestate_hub::{fetch::Coordinates, stats::RawStatsPayload, HubError};
    use tempfile::tempdir;

    struct BrokenCache;

    impl StatsCache for BrokenCache {
        fn lookup(&self, _: &str, _: DateTime<Utc>) -> realestate_hub::Result<Option<CachedStats>> {
            Err(HubError::Cache("index lock poisoned".into()))
        }

        fn store(&self, _: &CachedStats) -> realestate_hub::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_error_is_not_fresh() {
        assert!(!fresh_in_cache(&BrokenCache, "Riverdale", Utc::now()));
    }

    #[test]
    fn test_fresh_entry_is_skipped() {
        let tmp = tempdir().unwrap();
        let cache = ParquetStatsCache::open(tmp.path(), 30).unwrap();
        let now = Utc::now();
        assert!(!fresh_in_cache(&cache, "Riverdale", now));

        cache
            .store(&CachedStats {
                location: "Riverdale".into(),
                coordinates: Coordinates {
                    latitude: 43.67,
                    longitude: -79.34,
                },
                as_of_date: None,
                processed_at: now,
                payload: RawStatsPayload::default(),
                nearby_places: Vec::new(),
                driving_commute: None,
                transit_commute: None,
            })
            .unwrap();
        assert!(fresh_in_cache(&cache, "riverdale", now));
    }
}
