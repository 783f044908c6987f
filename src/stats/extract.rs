use tracing::{error, warn};

use super::types::{Block, RawStatsPayload, StatRow, StatValue, StatsTable};
use super::view::StatsView;
use crate::error::{HubError, Result};

/// Project one view out of the payload.
///
/// Returns `Ok(None)` when the payload has no block at the view's position.
/// Fails when the block is not a list of records, or when a numeric view
/// carries a non-numeric value.
pub fn extract(payload: &RawStatsPayload, view: StatsView) -> Result<Option<StatsTable>> {
    let block = match block_at(payload, view.index()) {
        Some(b) => b,
        None => return Ok(None),
    };

    let records = block.records().map_err(|detail| HubError::MalformedBlock {
        view: view.as_str(),
        index: view.index(),
        detail,
    })?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let text = record.value_text();
        let value = if view.coerce_to_int() {
            StatValue::Int(coerce_int(&text).ok_or_else(|| HubError::NotAnInteger {
                view: view.as_str(),
                key: record.key.clone(),
                value: text.clone(),
            })?)
        } else {
            StatValue::Text(text)
        };
        rows.push(StatRow {
            key: record.key.clone(),
            value,
        });
    }

    if view.sort_descending() {
        // stable: ties keep payload order
        rows.sort_by(|a, b| b.value.as_int().cmp(&a.value.as_int()));
    }

    Ok(Some(StatsTable { rows }))
}

fn block_at(payload: &RawStatsPayload, index: usize) -> Option<&Block> {
    let block = payload.data.get(index);
    if block.is_none() {
        error!(
            index,
            blocks = payload.data.len(),
            labels = ?payload.block_labels(),
            "stats block index out of range"
        );
    }
    block
}

/// Parse a count such as `"1,234"` or `" 56 "`.
pub fn coerce_int(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok()
}

/// What came out of one view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Table(StatsTable),
    Absent,
    Violation(String),
}

impl ViewOutcome {
    pub fn table(&self) -> Option<&StatsTable> {
        match self {
            ViewOutcome::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// Every view of one payload, in `StatsView::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSet {
    outcomes: Vec<(StatsView, ViewOutcome)>,
}

impl ViewSet {
    /// Every view absent, for when there is no payload at all.
    pub fn absent() -> Self {
        ViewSet {
            outcomes: StatsView::ALL
                .iter()
                .map(|&v| (v, ViewOutcome::Absent))
                .collect(),
        }
    }

    pub fn get(&self, view: StatsView) -> Option<&ViewOutcome> {
        self.outcomes
            .iter()
            .find(|(v, _)| *v == view)
            .map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatsView, &ViewOutcome)> {
        self.outcomes.iter().map(|(v, o)| (*v, o))
    }

    pub fn violations(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ViewOutcome::Violation(_)))
            .count()
    }
}

/// Run every view independently. A failing view never blocks the others.
pub fn extract_all(payload: &RawStatsPayload) -> ViewSet {
    let outcomes = StatsView::ALL
        .iter()
        .map(|&view| {
            let outcome = match extract(payload, view) {
                Ok(Some(t)) => ViewOutcome::Table(t),
                Ok(None) => ViewOutcome::Absent,
                Err(e) => {
                    warn!(view = %view, error = %e, "stats view violates upstream contract");
                    ViewOutcome::Violation(e.to_string())
                }
            };
            (view, outcome)
        })
        .collect();
    ViewSet { outcomes }
}
