use chrono::{NaiveDate, NaiveDateTime};

use super::types::RawStatsPayload;
use crate::error::{HubError, Result};

const PRODUCT_DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";

/// Date the upstream statistics were refreshed.
///
/// Upstream embeds it at the end of `ErrorCode.ProductName`, e.g.
/// `"... [Friday, January 7, 2022 3:52:11 PM]"`.
pub fn as_of_date(payload: &RawStatsPayload) -> Result<NaiveDate> {
    let product = payload
        .error_code
        .as_ref()
        .and_then(|e| e.product_name.as_deref())
        .ok_or_else(|| HubError::AsOfDate("<missing ErrorCode.ProductName>".into()))?;
    parse_product_date(product)
}

pub fn parse_product_date(product: &str) -> Result<NaiveDate> {
    let tail = product.rsplit('[').next().unwrap_or(product);
    let cleaned = tail.replace(']', "");
    NaiveDateTime::parse_from_str(cleaned.trim(), PRODUCT_DATE_FORMAT)
        .map(|dt| dt.date())
        .map_err(|_| HubError::AsOfDate(product.to_string()))
}
