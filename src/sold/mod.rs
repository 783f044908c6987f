pub mod table;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{HubError, Result};
pub use table::HtmlTable;

static TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("table selector should parse"));

/// Pattern that marks the sale history table on a listing page.
pub static SOLD_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new("Sold").expect("sold marker should compile"));

/// One event in a property's sale history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoldEvent {
    #[serde(rename = "MLS #")]
    pub mls: Option<String>,
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Event")]
    pub event: Option<String>,
    #[serde(rename = "Price")]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SoldHistoryTable {
    pub rows: Vec<SoldEvent>,
}

impl SoldHistoryTable {
    pub const COLUMNS: [&'static str; 4] = ["MLS #", "Date", "Event", "Price"];

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Find and normalize the sale history table in a listing page.
///
/// `Ok(None)` means the page has no sale history, which is normal for a
/// property that never sold. A table of the wrong shape is an error.
pub fn parse(html: &str) -> Result<Option<SoldHistoryTable>> {
    parse_with_marker(html, &SOLD_MARKER)
}

/// Like [`parse`], picking the first table whose text matches `marker`.
pub fn parse_with_marker(html: &str, marker: &Regex) -> Result<Option<SoldHistoryTable>> {
    let doc = Html::parse_document(html);
    let has_marker = |t: &ElementRef<'_>| marker.is_match(&t.text().collect::<String>());
    // a layout table wrapping the sold table matches too; take the innermost
    let found = doc.select(&TABLE).filter(|t| has_marker(t)).find(|t| {
        !t.select(&TABLE)
            .any(|inner| inner.id() != t.id() && has_marker(&inner))
    });

    let mut table = match found {
        Some(t) => HtmlTable::read(t),
        None => {
            warn!("no sold history table found");
            return Ok(None);
        }
    };
    debug!(headers = ?table.headers, rows = table.rows.len(), "sold history table");

    // leading index column the site renders with no header
    if table.width() > SoldHistoryTable::COLUMNS.len() && table.headers[0].trim().is_empty() {
        table.drop_column(0);
    }

    if table.width() != SoldHistoryTable::COLUMNS.len() {
        return Err(HubError::UnexpectedColumns {
            found: table.width(),
            headers: table.headers,
        });
    }

    let price_idx = table.column_index("Price").unwrap_or(3);

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut last_mls: Option<String> = None;
    for cells in table.rows {
        if !is_price_entry(cells[price_idx].as_deref()) {
            continue;
        }
        let mut cells = cells.into_iter();
        let mut event = SoldEvent {
            mls: cells.next().flatten(),
            date: cells.next().flatten(),
            event: cells.next().flatten(),
            price: cells.next().flatten(),
        };

        match &event.mls {
            Some(m) => last_mls = Some(m.clone()),
            None => event.mls = last_mls.clone(),
        }
        rows.push(event);
    }

    Ok(Some(SoldHistoryTable { rows }))
}

/// A real sale event has a `$` price or no price at all.
fn is_price_entry(price: Option<&str>) -> bool {
    match price {
        None => true,
        Some(p) => p.starts_with('$'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<thead><tr><th></th><th>MLS #</th><th>Date</th><th>Event</th><th>Price</th></tr></thead>";

    fn row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tr>{}</tr>", tds)
    }

    fn page(rows: &[&[&str]]) -> String {
        let body: String = rows.iter().map(|r| row(r)).collect();
        format!(
            "<html><body><table><tr><td>Beds</td><td>3</td></tr></table>\
             <table>{}<tbody>{}</tbody></table></body></html>",
            HEADER, body
        )
    }

    fn mls(t: &SoldHistoryTable) -> Vec<Option<&str>> {
        t.rows.iter().map(|r| r.mls.as_deref()).collect()
    }

    #[test]
    fn test_forward_fills_mls() {
        let html = page(&[
            &["", "MLS1", "Jan 1", "Sold", "$500,000"],
            &["", "", "Jan 2", "Price Changed", "$510,000"],
            &["", "MLS2", "Feb 1", "Sold", ""],
        ]);
        let t = parse(&html).unwrap().unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(mls(&t), vec![Some("MLS1"), Some("MLS1"), Some("MLS2")]);
        assert_eq!(t.rows[1].event.as_deref(), Some("Price Changed"));
        assert_eq!(t.rows[0].price.as_deref(), Some("$500,000"));
        assert_eq!(t.rows[2].price, None);
    }

    #[test]
    fn test_drops_non_price_rows() {
        let html = page(&[
            &["", "MLS1", "Jan 1", "Sold", "$500,000"],
            &["", "MLS3", "Mar 1", "Listed", "Pending"],
            &["", "MLS # ", "Date", "Event", "Price"],
            &["", "", "Mar 2", "Terminated", "$480,000"],
        ]);
        let t = parse(&html).unwrap().unwrap();
        assert_eq!(t.len(), 2);
        assert!(t.rows.iter().all(|r| r.price.as_deref() != Some("Pending")));
        // the dropped row never feeds the fill
        assert_eq!(mls(&t), vec![Some("MLS1"), Some("MLS1")]);
    }

    #[test]
    fn test_leading_blank_mls_stays_missing() {
        let html = page(&[
            &["", "", "Jan 1", "Sold", "$1"],
            &["", "MLS9", "Jan 2", "Sold", "$2"],
        ]);
        let t = parse(&html).unwrap().unwrap();
        assert_eq!(mls(&t), vec![None, Some("MLS9")]);
    }

    #[test]
    fn test_no_sold_table_is_absent() {
        let html = "<html><body><table><tr><th>Beds</th></tr><tr><td>3</td></tr></table>\
                    <p>Sold out</p></body></html>";
        assert!(parse(html).unwrap().is_none());
        assert!(parse("").unwrap().is_none());
    }

    #[test]
    fn test_four_column_table_kept_as_is() {
        let html = "<table><tr><th>MLS #</th><th>Date</th><th>Event</th><th>Price</th></tr>\
                    <tr><td>E1</td><td>Jan 1</td><td>Sold</td><td>$1</td></tr></table>";
        let t = parse(html).unwrap().unwrap();
        assert_eq!(
            t.rows[0],
            SoldEvent {
                mls: Some("E1".into()),
                date: Some("Jan 1".into()),
                event: Some("Sold".into()),
                price: Some("$1".into()),
            }
        );
    }

    #[test]
    fn test_layout_table_around_sold_table() {
        let sold = format!(
            "<table>{}<tbody>{}</tbody></table>",
            HEADER,
            row(&["", "E1", "Jan 1", "Sold", "$500,000"])
        );
        let html = format!(
            "<html><body><table><tr><td>sidebar</td><td>{}</td></tr></table></body></html>",
            sold
        );
        let t = parse(&html).unwrap().unwrap();
        assert_eq!(mls(&t), vec![Some("E1")]);
        assert_eq!(t.rows[0].price.as_deref(), Some("$500,000"));
    }

    #[test]
    fn test_custom_marker() {
        let html = "<table><tr><th>MLS #</th><th>Date</th><th>Event</th><th>Price</th></tr>\
                    <tr><td>E1</td><td>Jan 1</td><td>Leased</td><td>$2,100</td></tr></table>";
        assert!(parse(html).unwrap().is_none());
        let marker = Regex::new("Leased|Sold").unwrap();
        let t = parse_with_marker(html, &marker).unwrap().unwrap();
        assert_eq!(t.rows[0].price.as_deref(), Some("$2,100"));
    }

    #[test]
    fn test_unexpected_shape_is_violation() {
        let html = "<table><tr><th>MLS #</th><th>Date</th><th>Event</th></tr>\
                    <tr><td>E1</td><td>Jan 1</td><td>Sold</td></tr></table>";
        let err = parse(html).unwrap_err();
        assert!(err.is_contract_violation());
        match err {
            HubError::UnexpectedColumns { found, headers } => {
                assert_eq!(found, 3);
                assert_eq!(headers, vec!["MLS #", "Date", "Event"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_serializes_with_display_columns() {
        let t = SoldHistoryTable {
            rows: vec![SoldEvent {
                mls: Some("M".into()),
                date: None,
                event: Some("Sold".into()),
                price: None,
            }],
        };
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["rows"][0]["MLS #"], "M");
        assert!(v["rows"][0]["Price"].is_null());
    }
}
