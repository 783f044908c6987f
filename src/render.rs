use prettytable::{format, Cell, Row, Table};
use std::io::{self, Write};

use crate::report::{LocationReport, SoldOutcome};
use crate::sold::SoldHistoryTable;
use crate::stats::{StatsTable, StatsView, ViewOutcome};

pub const NO_DATA: &str = "No data available";
pub const DEFAULT_TOP_LANGUAGES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Rows kept from the language table.
    pub top_languages: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            top_languages: DEFAULT_TOP_LANGUAGES,
        }
    }
}

/// Display labels for the key and value columns of a view.
pub fn labels(view: StatsView) -> (&'static str, &'static str) {
    match view {
        StatsView::GeneralStats => ("Stat", "Value"),
        StatsView::Income => ("Household Income", "Number of Homes"),
        StatsView::MaritalStatus => ("Marital Status", "Count"),
        StatsView::Education => ("Education Level", "Count"),
        StatsView::Language => ("Language", "Count"),
        StatsView::AgeOfHomeDistribution => ("Year Built", "Number of Homes"),
        StatsView::AgeDistribution => ("Age Group", "Number of People"),
        StatsView::ChildrenAtHome => ("Age of Children", "Number of Children"),
        StatsView::RentOrOwned => ("Type of Property", "Count"),
        StatsView::Occupations => ("Job", "Number of People"),
        StatsView::PopulationForecast => ("Year", "Population"),
    }
}

pub fn title(view: StatsView) -> &'static str {
    match view {
        StatsView::GeneralStats => "General Stats",
        StatsView::AgeDistribution => "Population by Age Group",
        StatsView::PopulationForecast => "Population Forecast",
        StatsView::Education => "Education Level",
        StatsView::MaritalStatus => "Marital Status",
        StatsView::Language => "Most Spoken Languages",
        StatsView::Income => "Household Income",
        StatsView::ChildrenAtHome => "Children at Home",
        StatsView::RentOrOwned => "Rented vs. Owned Properties",
        StatsView::AgeOfHomeDistribution => "Age of Homes",
        StatsView::Occupations => "Occupations",
    }
}

/// Write `report` as plain text.
pub fn render_report<W: Write>(
    report: &LocationReport,
    opts: &RenderOptions,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "{}", capitalize(&report.location))?;
    match report.as_of_date {
        Some(d) => writeln!(out, "Statistics as of {}", d.format("%Y-%m-%d"))?,
        None => writeln!(out, "Statistics as of: unknown")?,
    }
    if report.from_cache {
        writeln!(out, "(cached)")?;
    }
    if let Some(e) = &report.stats_error {
        writeln!(out, "Statistics unavailable: {}", e)?;
    }

    writeln!(out)?;
    writeln!(out, "Driving to Union: {}", or_na(&report.commute.driving))?;
    writeln!(out, "Transit to Union: {}", or_na(&report.commute.transit))?;

    for (view, outcome) in report.views.iter() {
        writeln!(out)?;
        writeln!(out, "== {} ==", title(view))?;
        match outcome {
            ViewOutcome::Table(t) => {
                let limit = if view == StatsView::Language {
                    opts.top_languages
                } else {
                    usize::MAX
                };
                write_stats(out, view, t, limit)?;
            }
            ViewOutcome::Absent => writeln!(out, "{}", NO_DATA)?,
            ViewOutcome::Violation(msg) => writeln!(out, "Upstream format changed: {}", msg)?,
        }
    }

    writeln!(out)?;
    writeln!(out, "== Sold History ==")?;
    match &report.sold_history {
        SoldOutcome::Found(t) if !t.is_empty() => write_sold(out, t)?,
        SoldOutcome::Found(_) | SoldOutcome::Absent => writeln!(out, "{}", NO_DATA)?,
        SoldOutcome::Violation(msg) => writeln!(out, "Upstream format changed: {}", msg)?,
        SoldOutcome::Unavailable(msg) => writeln!(out, "Sold history unavailable: {}", msg)?,
    }
    Ok(())
}

pub fn render_to_string(report: &LocationReport, opts: &RenderOptions) -> io::Result<String> {
    let mut buf = Vec::new();
    render_report(report, opts, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_stats<W: Write>(
    out: &mut W,
    view: StatsView,
    table: &StatsTable,
    limit: usize,
) -> io::Result<()> {
    let (key, value) = labels(view);
    let mut t = text_table(&[key, value]);
    let align = if view.coerce_to_int() { "r" } else { "l" };
    for r in table.rows.iter().take(limit) {
        t.add_row(Row::new(vec![
            Cell::new(&r.key),
            Cell::new(&r.value.to_string()).style_spec(align),
        ]));
    }
    t.print(out)?;
    Ok(())
}

fn write_sold<W: Write>(out: &mut W, table: &SoldHistoryTable) -> io::Result<()> {
    let mut t = text_table(&SoldHistoryTable::COLUMNS);
    let cell = |c: &Option<String>| Cell::new(c.as_deref().unwrap_or(""));
    for e in &table.rows {
        t.add_row(Row::new(vec![
            cell(&e.mls),
            cell(&e.date),
            cell(&e.event),
            cell(&e.price).style_spec("r"),
        ]));
    }
    t.print(out)?;
    Ok(())
}

fn text_table(titles: &[&str]) -> Table {
    let mut t = Table::new();
    t.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    t.set_titles(Row::new(titles.iter().map(|h| Cell::new(h)).collect()));
    t
}

fn or_na(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("n/a")
}

/// `"riverdale, TORONTO"` -> `"Riverdale, toronto"`
pub fn capitalize(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
