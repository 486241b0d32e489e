//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the registry and run the full
//! discover, count, fetch, extract and persist cycle against a temporary
//! SQLite database.

use accident_harvest::config::{
    Config, CrawlerConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use accident_harvest::crawler::{
    build_http_client, compute_resume_window, discover_years, extract_rows, run_crawl, SiteClient,
};
use accident_harvest::record::from_rows;
use accident_harvest::state::FailureKind;
use accident_harvest::storage::{RunStatus, SqliteStorage, Storage, WriteMode};
use accident_harvest::{AccidentRecord, YearToken};
use chrono::NaiveDate;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEADER_ROW: &str = "<tr><th>date</th><th>type</th><th>reg.</th><th>operator</th>\
    <th>fat.</th><th>location</th><th></th><th>dmg</th></tr>";

/// Creates a test configuration pointing at the mock server
fn create_test_config(
    base_url: &str,
    db_path: &Path,
    upper_bound: i32,
    deduplicate: bool,
) -> Config {
    Config {
        source: SourceConfig {
            base_url: base_url.to_string(),
        },
        crawler: CrawlerConfig {
            max_concurrent_pages: 2,
            resume_upper_bound_year: upper_bound,
            fail_fast: false,
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().to_string(),
            deduplicate,
        },
    }
}

fn site_client(server: &MockServer) -> SiteClient {
    let ua = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    SiteClient::new(
        build_http_client(&ua, 5).unwrap(),
        Url::parse(&server.uri()).unwrap(),
    )
}

fn landing(years: &[&str]) -> String {
    let links: String = years
        .iter()
        .map(|y| format!(r#"<a href="/wikibase/dblist.php?Year={y}">{y}</a> "#))
        .collect();
    format!(
        r#"<html><body><div id="menu"><a href="/wikibase/">home</a></div>
        <div id="contentcolumn">{links}</div></body></html>"#
    )
}

fn data_row(date: &str, registration: &str) -> String {
    format!(
        "<tr><td>{date}</td><td>Douglas C-47A</td><td>{registration}</td><td>Acme Air</td>\
         <td>2+1</td><td>near Springfield</td><td><img src=\"US.gif\"></td><td>w/o</td></tr>"
    )
}

/// A listing page with an optional pagination region of `pages` anchors
fn listing(pages: Option<u32>, rows: &[String]) -> String {
    let pagination = match pages {
        Some(n) => {
            let anchors: String = (1..=n).map(|p| format!("<a href=\"#\">{p}</a>")).collect();
            format!(r#"<div class="pagenumbers">{anchors}</div>"#)
        }
        None => String::new(),
    };
    format!(
        r#"<html><body>{pagination}<table class="hp">{HEADER_ROW}{}</table></body></html>"#,
        rows.concat()
    )
}

async fn mount_landing(server: &MockServer, years: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/wikibase/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing(years)))
        .mount(server)
        .await;
}

async fn mount_year(server: &MockServer, year: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/wikibase/dblist.php"))
        .and(query_param("Year", year))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discover_years_in_document_order() {
    let server = MockServer::start().await;
    mount_landing(&server, &["2020", "2021"]).await;

    let years = discover_years(&site_client(&server)).await.unwrap();
    assert_eq!(years, vec![YearToken::from("2020"), YearToken::from("2021")]);
}

#[test]
fn test_listing_extraction_maps_fields_and_skips_short_rows() {
    let html = listing(
        None,
        &[
            data_row("05-Jan-1950", "N123"),
            data_row("17-Feb-1950", "G-ABCD"),
            "<tr><td colspan=\"3\">February</td><td></td><td></td><td></td><td></td></tr>"
                .to_string(),
        ],
    );
    // the separator row above has 7 cells; a 5-cell row must be skipped too
    let html = html.replace(
        "</table>",
        "<tr><td>01-Mar-1950</td><td>a</td><td>b</td><td>c</td><td>d</td></tr></table>",
    );

    let table = extract_rows(&html).unwrap();
    assert_eq!(table.skipped_rows, 2);

    let batch = from_rows(table.rows);
    assert_eq!(batch.rejected, 0);
    assert_eq!(
        batch.records,
        vec![
            AccidentRecord {
                date: NaiveDate::from_ymd_opt(1950, 1, 5).unwrap(),
                aircraft_type: "Douglas C-47A".to_string(),
                registration: "N123".to_string(),
                operator: "Acme Air".to_string(),
                fatalities: "2+1".to_string(),
                location: "near Springfield".to_string(),
                flag: "".to_string(),
                damage: "w/o".to_string(),
            },
            AccidentRecord {
                date: NaiveDate::from_ymd_opt(1950, 2, 17).unwrap(),
                aircraft_type: "Douglas C-47A".to_string(),
                registration: "G-ABCD".to_string(),
                operator: "Acme Air".to_string(),
                fatalities: "2+1".to_string(),
                location: "near Springfield".to_string(),
                flag: "".to_string(),
                damage: "w/o".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_full_crawl_from_empty_store() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("accidents.db");

    mount_landing(&server, &["2020"]).await;
    mount_year(
        &server,
        "2020",
        listing(
            None,
            &[
                data_row("03-Mar-2020", "N1"),
                data_row("N/A", "N2"),
                data_row("19-Aug-2020", "N3"),
            ],
        ),
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path, 2021, true);
    let report = run_crawl(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.years, 1);
    assert_eq!(report.pages_ok, 1);
    assert_eq!(report.records_inserted, 2);
    assert_eq!(report.records_updated, 0);
    assert_eq!(report.records_rejected, 1);
    assert!(report.is_clean());

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let mut stmt = conn
        .prepare("SELECT Date, Registration, Fatalities, Dmg FROM accidents ORDER BY Date")
        .unwrap();
    let rows: Vec<(String, String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (
                "2020-03-03".to_string(),
                "N1".to_string(),
                "2+1".to_string(),
                "w/o".to_string()
            ),
            (
                "2020-08-19".to_string(),
                "N3".to_string(),
                "2+1".to_string(),
                "w/o".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_page_failure_is_isolated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("accidents.db");

    mount_landing(&server, &["2020", "2021"]).await;

    // Page-specific mocks first: the first mounted match wins
    Mock::given(method("GET"))
        .and(path("/wikibase/dblist.php"))
        .and(query_param("Year", "2020"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wikibase/dblist.php"))
        .and(query_param("Year", "2020"))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing(Some(3), &[data_row("20-Dec-2020", "N3")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_year(
        &server,
        "2020",
        listing(Some(3), &[data_row("02-Jan-2020", "N1")]),
    )
    .await;
    mount_year(&server, "2021", listing(None, &[data_row("07-Jul-2021", "N4")])).await;

    let config = create_test_config(&server.uri(), &db_path, 2022, true);
    let report = run_crawl(config, "hash".to_string(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.years, 2);
    assert_eq!(report.pages_ok, 3);
    assert_eq!(report.records_inserted, 3);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.year, YearToken::from("2020"));
    assert_eq!(failure.page, Some(2));
    assert_eq!(failure.kind, FailureKind::Fetch);

    let storage = SqliteStorage::new(&db_path, WriteMode::Upsert).unwrap();
    assert_eq!(storage.count_records().unwrap(), 3);
    assert_eq!(storage.count_by_year().unwrap(), vec![(2020, 2), (2021, 1)]);

    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.totals.pages_failed, 1);
}

#[tokio::test]
async fn test_resume_window_from_stored_date() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("accidents.db");

    Mock::given(method("GET"))
        .and(path("/wikibase/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing(&["1999"])))
        .expect(0)
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new(&db_path, WriteMode::Upsert).unwrap();
    storage
        .append_batch(&[AccidentRecord {
            date: NaiveDate::from_ymd_opt(2005, 6, 1).unwrap(),
            aircraft_type: "B737".to_string(),
            registration: "PK-ABC".to_string(),
            operator: "Example Air".to_string(),
            fatalities: "0".to_string(),
            location: "Runway".to_string(),
            flag: "".to_string(),
            damage: "sub".to_string(),
        }])
        .unwrap();

    let years = compute_resume_window(&storage, &site_client(&server), 2008)
        .await
        .unwrap();
    let expected: Vec<YearToken> = (2005..2008).map(YearToken::from).collect();
    assert_eq!(years, expected);
}

#[tokio::test]
async fn test_resume_window_on_empty_store_uses_discovery() {
    let server = MockServer::start().await;
    mount_landing(&server, &["1951", "1950"]).await;

    let storage = SqliteStorage::new_in_memory(WriteMode::Upsert).unwrap();
    let client = site_client(&server);

    let window = compute_resume_window(&storage, &client, 2000).await.unwrap();
    let discovered = discover_years(&client).await.unwrap();
    assert_eq!(window, discovered);
}

/// Crawls the same boundary year twice, returning the stored row count and
/// the rows each run inserted
async fn crawl_twice(deduplicate: bool) -> (u64, Vec<u64>) {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("accidents.db");

    mount_landing(&server, &["2020"]).await;
    mount_year(
        &server,
        "2020",
        listing(
            None,
            &[data_row("03-Mar-2020", "N1"), data_row("19-Aug-2020", "N2")],
        ),
    )
    .await;

    let mut inserted = Vec::new();
    for _ in 0..2 {
        let config = create_test_config(&server.uri(), &db_path, 2021, deduplicate);
        let report = run_crawl(config, "hash".to_string(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.records_updated, 0);
        inserted.push(report.records_inserted);
    }

    let storage = SqliteStorage::new(&db_path, WriteMode::from_deduplicate(deduplicate)).unwrap();
    (storage.count_records().unwrap(), inserted)
}

#[tokio::test]
async fn test_recrawl_of_boundary_year_duplicates_without_natural_key() {
    assert_eq!(crawl_twice(false).await, (4, vec![2, 2]));
}

#[tokio::test]
async fn test_recrawl_of_boundary_year_is_idempotent_with_natural_key() {
    let (stored, inserted) = crawl_twice(true).await;
    assert_eq!(stored, 2);
    // the second run finds every row already stored and unchanged
    assert_eq!(inserted, vec![2, 0]);
}
