//! Markup extraction for the registry's landing and listing pages
//!
//! Everything here is tied to the registry's current markup. The selectors
//! and column order below are the whole contract; if the site changes its
//! layout, rows can still be found but land in the wrong fields, so the
//! header row's width is checked before any positional mapping is trusted.
//! Bump [`MARKUP_VERSION`] whenever these constants change.

use crate::record::{RawRow, YearToken};
use crate::url::year_from_href;
use crate::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Version of the markup contract encoded by the constants in this module
pub const MARKUP_VERSION: u32 = 1;

/// Landing page region holding the year links
pub const NAVIGATION_REGION: &str = "#contentcolumn";

/// Listing page region holding the page-number links
pub const PAGINATION_REGION: &str = "div.pagenumbers";

/// The accident table on a listing page
pub const ACCIDENT_TABLE: &str = "table.hp";

/// Listing columns, in the order the registry renders them
pub const LISTING_COLUMNS: [&str; 8] = [
    "Date",
    "AircraftType",
    "Registration",
    "Operator",
    "Fatalities",
    "Location",
    "Flag",
    "Damage",
];

/// Number of cells a data row must have
pub const COLUMN_COUNT: usize = LISTING_COLUMNS.len();

fn selector(css: &'static str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::Selector(css))
}

/// Extracts year tokens from the landing page, in document order
///
/// Only anchors inside [`NAVIGATION_REGION`] whose target is a year listing
/// are considered. A year linked more than once is reported once, at its
/// first position.
///
/// # Errors
///
/// `ExtractionError::MissingRegion` if the navigation region is absent.
pub fn extract_years(html: &str, page_url: &Url) -> Result<Vec<YearToken>, ExtractionError> {
    let document = Html::parse_document(html);
    let region_selector = selector(NAVIGATION_REGION)?;
    let anchor_selector = selector("a[href]")?;

    let region = document
        .select(&region_selector)
        .next()
        .ok_or(ExtractionError::MissingRegion(NAVIGATION_REGION))?;

    let mut seen = HashSet::new();
    let years = region
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| year_from_href(href, page_url))
        .filter(|year| seen.insert(year.clone()))
        .collect();

    Ok(years)
}

/// Counts listing pages from page 1's pagination region
///
/// Returns 1 when the region is absent. When present, returns the number of
/// anchors inside it, never less than 1. The registry sometimes renders the
/// region for single-page years; the anchor count is reported as-is in that
/// case.
pub fn count_pages_in(html: &str) -> Result<u32, ExtractionError> {
    let document = Html::parse_document(html);
    let region_selector = selector(PAGINATION_REGION)?;
    let anchor_selector = selector("a")?;

    let Some(region) = document.select(&region_selector).next() else {
        return Ok(1);
    };

    let anchors = region.select(&anchor_selector).count();
    Ok(u32::try_from(anchors).unwrap_or(u32::MAX).max(1))
}

/// Rows pulled out of one listing page
#[derive(Debug, Default)]
pub struct ExtractedTable {
    pub rows: Vec<RawRow>,
    /// Rows after the header that did not have exactly [`COLUMN_COUNT`] cells
    pub skipped_rows: usize,
}

/// Extracts raw accident rows from a listing page
///
/// The first row of [`ACCIDENT_TABLE`] is the header and must be
/// [`COLUMN_COUNT`] cells wide. Every later row with exactly that many `td`
/// cells becomes a [`RawRow`]; separator rows and other odd widths are
/// skipped.
///
/// # Errors
///
/// * `ExtractionError::TableNotFound` (soft) if there is no accident table
/// * `ExtractionError::HeaderMismatch` if the header width is unexpected
pub fn extract_rows(html: &str) -> Result<ExtractedTable, ExtractionError> {
    let document = Html::parse_document(html);
    let table_selector = selector(ACCIDENT_TABLE)?;
    let row_selector = selector("tr")?;
    let header_cell_selector = selector("th, td")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or(ExtractionError::TableNotFound)?;

    let mut rows = table.select(&row_selector);
    let Some(header) = rows.next() else {
        return Ok(ExtractedTable::default());
    };

    let header_width = header.select(&header_cell_selector).count();
    if header_width != COLUMN_COUNT {
        return Err(ExtractionError::HeaderMismatch {
            expected: COLUMN_COUNT,
            found: header_width,
        });
    }

    let mut extracted = ExtractedTable::default();
    for row in rows {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        match <[String; COLUMN_COUNT]>::try_from(cells) {
            Ok(cells) => extracted.rows.push(raw_row(cells)),
            Err(_) => extracted.skipped_rows += 1,
        }
    }

    Ok(extracted)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn raw_row(cells: [String; COLUMN_COUNT]) -> RawRow {
    let [date, aircraft_type, registration, operator, fatalities, location, flag, damage] = cells;
    RawRow {
        date,
        aircraft_type,
        registration,
        operator,
        fatalities,
        location,
        flag,
        damage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<tr><th>acc. date</th><th>type</th><th>reg.</th><th>operator</th>\
                          <th>fat.</th><th>location</th><th></th><th>dmg</th></tr>";

    fn listing(rows: &str) -> String {
        format!(
            r#"<html><body><table class="hp">{}{}</table></body></html>"#,
            HEADER, rows
        )
    }

    fn landing_url() -> Url {
        Url::parse("https://aviation-safety.net/wikibase/").unwrap()
    }

    #[test]
    fn test_extract_years_in_document_order() {
        let html = r#"<html><body><div id="contentcolumn">
            <a href="/wikibase/dblist.php?Year=2020">2020</a>
            <a href="/wikibase/dblist.php?Year=2021">2021</a>
        </div></body></html>"#;

        let years = extract_years(html, &landing_url()).unwrap();
        assert_eq!(years, vec![YearToken::from(2020), YearToken::from(2021)]);
    }

    #[test]
    fn test_extract_years_ignores_links_outside_region() {
        let html = r#"<html><body>
            <div id="menu"><a href="/wikibase/dblist.php?Year=1999">1999</a></div>
            <div id="contentcolumn">
                <a href="/wikibase/dblist.php?Year=2021">2021</a>
                <a href="/wikibase/wiki.php?id=1">wiki</a>
                <a href="/wikibase/dblist.php?Year=2021">again</a>
            </div></body></html>"#;

        let years = extract_years(html, &landing_url()).unwrap();
        assert_eq!(years, vec![YearToken::from(2021)]);
    }

    #[test]
    fn test_extract_years_missing_region() {
        let html = r#"<html><body><a href="/wikibase/dblist.php?Year=2020">2020</a></body></html>"#;
        let err = extract_years(html, &landing_url()).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingRegion(_)));
        assert!(!err.is_soft());
    }

    #[test]
    fn test_count_pages_without_region() {
        assert_eq!(count_pages_in(&listing("")).unwrap(), 1);
    }

    #[test]
    fn test_count_pages_with_region() {
        let html = r#"<div class="pagenumbers">
            <a href="?page=1">1</a><a href="?page=2">2</a><a href="?page=3">3</a>
        </div>"#;
        assert_eq!(count_pages_in(html).unwrap(), 3);
    }

    #[test]
    fn test_count_pages_single_anchor_region_reports_one() {
        let html = r#"<div class="pagenumbers"><a href="?page=1">1</a></div>"#;
        assert_eq!(count_pages_in(html).unwrap(), 1);
    }

    #[test]
    fn test_count_pages_empty_region_is_at_least_one() {
        let html = r#"<div class="pagenumbers"><span>1</span></div>"#;
        assert_eq!(count_pages_in(html).unwrap(), 1);
    }

    #[test]
    fn test_extract_rows_maps_columns() {
        let html = listing(
            "<tr><td>05-Jan-1950</td><td>Douglas C-47A</td><td>N123</td><td>Acme Air</td>\
             <td>2+1</td><td>near  Springfield</td><td><img src=\"us.gif\"></td><td>w/o</td></tr>\
             <tr><td>07-Feb-1950</td><td>DC-3</td><td></td><td>private</td>\
             <td>0</td><td>Lagos</td><td>NG</td><td>sub</td></tr>\
             <tr><td colspan=\"5\">February</td><td></td><td></td><td></td><td></td></tr>",
        );

        let table = extract_rows(&html).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.skipped_rows, 1);

        let first = &table.rows[0];
        assert_eq!(first.date, "05-Jan-1950");
        assert_eq!(first.aircraft_type, "Douglas C-47A");
        assert_eq!(first.registration, "N123");
        assert_eq!(first.operator, "Acme Air");
        assert_eq!(first.fatalities, "2+1");
        assert_eq!(first.location, "near Springfield");
        assert_eq!(first.flag, "");
        assert_eq!(first.damage, "w/o");

        assert_eq!(table.rows[1].registration, "");
        assert_eq!(table.rows[1].flag, "NG");
    }

    #[test]
    fn test_extract_rows_skips_short_rows() {
        let html = listing("<tr><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td></tr>");
        let table = extract_rows(&html).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.skipped_rows, 1);
    }

    #[test]
    fn test_extract_rows_table_missing_is_soft() {
        let err = extract_rows("<html><body><p>No results</p></body></html>").unwrap_err();
        assert!(matches!(err, ExtractionError::TableNotFound));
        assert!(err.is_soft());
    }

    #[test]
    fn test_extract_rows_rejects_unexpected_header() {
        let html = r#"<table class="hp"><tr><th>date</th><th>type</th><th>reg.</th></tr>
            <tr><td>05-Jan-1950</td><td>x</td><td>y</td></tr></table>"#;
        let err = extract_rows(html).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::HeaderMismatch {
                expected: 8,
                found: 3
            }
        ));
    }

    #[test]
    fn test_extract_rows_empty_table() {
        let table = extract_rows(r#"<table class="hp"></table>"#).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.skipped_rows, 0);
    }
}
