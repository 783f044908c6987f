// src/report.rs

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::fetch::{CommuteMode, Coordinates, GoogleMaps, ListingSite};
use crate::loader::{LoadedStats, StatsLoader, StatsSource};
use crate::sold::{self, SoldHistoryTable};
use crate::stats::{extract_all, ViewSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommuteTimes {
    pub driving: Option<String>,
    pub transit: Option<String>,
}

/// What became of the sale history lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum SoldOutcome {
    Found(SoldHistoryTable),
    /// No sale history on the page.
    Absent,
    /// The page had a sold table we could not read.
    Violation(String),
    /// The page could not be fetched.
    Unavailable(String),
}

impl SoldOutcome {
    pub fn from_page(page: Result<String>) -> Self {
        let html = match page {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "listing page unavailable");
                return SoldOutcome::Unavailable(e.to_string());
            }
        };
        match sold::parse(&html) {
            Ok(Some(t)) => SoldOutcome::Found(t),
            Ok(None) => SoldOutcome::Absent,
            Err(e) => {
                error!(error = %e, "sold history violates upstream contract");
                SoldOutcome::Violation(e.to_string())
            }
        }
    }
}

/// Everything shown for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub location: String,
    pub coordinates: Coordinates,
    pub as_of_date: Option<NaiveDate>,
    pub from_cache: bool,
    /// Set when statistics could not be fetched at all.
    pub stats_error: Option<String>,
    pub views: ViewSet,
    pub sold_history: SoldOutcome,
    pub commute: CommuteTimes,
}

impl LocationReport {
    /// Combine collaborator results. Only geocoding is fatal, and it
    /// happens before this point.
    pub fn assemble(
        location: &str,
        coordinates: Coordinates,
        stats: Result<LoadedStats>,
        page: Result<String>,
        driving: Result<Option<String>>,
        transit: Result<Option<String>>,
    ) -> Self {
        let (views, as_of_date, from_cache, stats_error) = match stats {
            Ok(s) => (extract_all(&s.payload), s.as_of_date, s.from_cache, None),
            Err(e) => {
                error!(location, error = %e, "statistics unavailable");
                (ViewSet::absent(), None, false, Some(e.to_string()))
            }
        };

        LocationReport {
            location: location.to_string(),
            coordinates,
            as_of_date,
            from_cache,
            stats_error,
            views,
            sold_history: SoldOutcome::from_page(page),
            commute: CommuteTimes {
                driving: commute_or_none(CommuteMode::Driving, driving),
                transit: commute_or_none(CommuteMode::Transit, transit),
            },
        }
    }
}

fn commute_or_none(mode: CommuteMode, r: Result<Option<String>>) -> Option<String> {
    r.unwrap_or_else(|e| {
        warn!(mode = mode.as_str(), error = %e, "commute time unavailable");
        None
    })
}

/// Geocode `location`, then gather statistics, sale history and commute
/// times concurrently.
#[instrument(level = "info", skip(maps, loader, listing))]
pub async fn build_report<S: StatsSource>(
    maps: &GoogleMaps,
    loader: &StatsLoader<'_, S>,
    listing: &ListingSite,
    location: &str,
) -> Result<LocationReport> {
    let coordinates = maps.geocode(location).await?;

    let (stats, page, driving, transit) = tokio::join!(
        loader.load(location, coordinates, Utc::now()),
        listing.page(location),
        maps.commute_time(coordinates, CommuteMode::Driving),
        maps.commute_time(coordinates, CommuteMode::Transit),
    );

    let report = LocationReport::assemble(location, coordinates, stats, page, driving, transit);
    info!(
        violations = report.views.violations(),
        from_cache = report.from_cache,
        "report ready"
    );
    Ok(report)
}
