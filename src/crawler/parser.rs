//! HTML parser for race result pages
//!
//! This module handles parsing a results page to extract:
//! - Whether the page describes a race at all
//! - The results table (headers and rows)
//! - Horse identifiers linked from the table
//! - The race name

use crate::identifier::RaceId;
use crate::state::Verdict;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// Phrases the service shows instead of a results page
pub const ABSENCE_MARKERS: [&str; 2] = ["レース情報がありません", "存在しないレースID"];

/// Selector for the results container a present page carries
pub const RESULTS_TABLE: &str = "table.race_table_01";

/// Table selectors tried in order when extracting rows
const TABLE_FALLBACKS: [&str; 4] = [
    RESULTS_TABLE,
    "table.Shutuba_table",
    "div.race_result_table table",
    "#contents_liquid table",
];

/// Column labels that identify a results table
const RESULT_COLUMNS: [&str; 2] = ["着順", "馬名"];

/// Extracted results for one race
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceRecord {
    /// The race this record belongs to
    pub race_id: RaceId,

    /// Race name from the page heading
    pub race_name: Option<String>,

    /// Header cells of the results table
    pub headers: Vec<String>,

    /// One entry per finisher, cells in column order
    pub rows: Vec<Vec<String>>,

    /// Horse identifiers linked from the table, in order of first appearance
    pub horse_ids: Vec<String>,
}

impl RaceRecord {
    /// Column names covering every cell of every row
    ///
    /// Cells past the last header are named `column_<n>` (1-based). A header
    /// repeated within the table gets a `_<n>` suffix so names stay unique.
    pub fn column_names(&self) -> Vec<String> {
        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.headers.len());

        let mut names: Vec<String> = Vec::with_capacity(width);
        for i in 0..width {
            let base = match self.headers.get(i) {
                Some(header) if !header.is_empty() => header.clone(),
                _ => format!("column_{}", i + 1),
            };
            let mut name = base.clone();
            let mut n = 2;
            while names.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            names.push(name);
        }
        names
    }
}

/// Decides from a page body whether the race exists
///
/// A page is absent when it carries one of the service's "no such race"
/// messages, or when it lacks a results table with at least one data row.
pub fn classify_page(html: &str) -> Verdict {
    if ABSENCE_MARKERS.iter().any(|marker| html.contains(marker)) {
        return Verdict::Absent;
    }

    let document = Html::parse_document(html);
    let has_rows = match (Selector::parse(RESULTS_TABLE), Selector::parse("tr")) {
        (Ok(table), Ok(row)) => document
            .select(&table)
            .next()
            .is_some_and(|t| t.select(&row).count() > 1),
        _ => false,
    };

    if has_rows {
        Verdict::Present
    } else {
        Verdict::Absent
    }
}

/// Parses a results page into a record
///
/// # Arguments
///
/// * `race_id` - The race the page was fetched for
/// * `html` - The decoded page body
///
/// # Returns
///
/// * `Ok(RaceRecord)` - A results table with at least one row was found
/// * `Err(String)` - The page could not be read as a results page
///
/// # Example
///
/// ```
/// use furlong::crawler::parse_race_page;
/// use furlong::RaceId;
///
/// let html = r#"<table class="race_table_01">
///     <tr><th>着順</th><th>馬名</th></tr>
///     <tr><td>1</td><td><a href="/horse/2019104308/">Equinox</a></td></tr>
/// </table>"#;
/// let record = parse_race_page("202405010101".parse().unwrap(), html).unwrap();
/// assert_eq!(record.rows, vec![vec!["1".to_string(), "Equinox".to_string()]]);
/// assert_eq!(record.horse_ids, vec!["2019104308".to_string()]);
/// ```
pub fn parse_race_page(race_id: RaceId, html: &str) -> Result<RaceRecord, String> {
    let document = Html::parse_document(html);

    let table = find_results_table(&document)?
        .ok_or_else(|| "no results table on page".to_string())?;

    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("td")?;

    let mut headers = Vec::new();
    let mut rows = Vec::new();

    for row in table.select(&row_selector) {
        let header_cells: Vec<String> = row.select(&header_selector).map(cell_text).collect();
        let data_cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();

        if headers.is_empty() && !header_cells.is_empty() && data_cells.is_empty() {
            headers = header_cells;
        } else if !data_cells.is_empty() {
            rows.push(data_cells);
        }
    }

    if headers.is_empty() {
        return Err("results table has no header row".to_string());
    }
    if !headers
        .iter()
        .any(|h| RESULT_COLUMNS.iter().any(|c| h.contains(c)))
    {
        return Err(format!("table does not look like results: {:?}", headers));
    }
    if rows.is_empty() {
        return Err("results table has no data rows".to_string());
    }

    Ok(RaceRecord {
        race_id,
        race_name: extract_race_name(&document),
        headers,
        rows,
        horse_ids: extract_horse_ids(table)?,
    })
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector {}: {:?}", css, e))
}

/// Finds the first table matching the fallback selectors
fn find_results_table(document: &Html) -> Result<Option<ElementRef<'_>>, String> {
    for css in TABLE_FALLBACKS {
        if let Some(table) = document.select(&selector(css)?).next() {
            return Ok(Some(table));
        }
    }
    Ok(None)
}

/// Collapses a cell's text to single-spaced words
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pulls horse ids out of `/horse/<id>/` links
fn extract_horse_ids(table: ElementRef<'_>) -> Result<Vec<String>, String> {
    let link_selector = selector(r#"a[href*="/horse/"]"#)?;
    let mut ids: Vec<String> = Vec::new();

    for link in table.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some((_, rest)) = href.split_once("/horse/") else {
            continue;
        };
        let id = rest.split('/').next().unwrap_or_default();
        if !id.is_empty() && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}

/// Extracts the race name from the page heading
fn extract_race_name(document: &Html) -> Option<String> {
    ["dl.racedata h1", "div.data_intro h1", "h1.RaceName"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| document.select(&sel).next())
        .map(cell_text)
        .filter(|s| !s.is_empty())
}
