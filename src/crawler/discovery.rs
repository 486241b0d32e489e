//! Network-facing year discovery and page counting

use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::{count_pages_in, extract_years};
use crate::record::YearToken;
use crate::HarvestError;

/// Fetches the landing page and lists the years it links to, in document order
///
/// # Errors
///
/// * `HarvestError::Fetch` if the landing page cannot be fetched
/// * `HarvestError::Extraction` if the navigation region is missing
pub async fn discover_years(client: &SiteClient) -> Result<Vec<YearToken>, HarvestError> {
    let (url, html) = client.fetch_landing().await?;
    let years = extract_years(&html, &url)?;
    tracing::info!("Discovered {} years on landing page", years.len());
    Ok(years)
}

/// Page count of one year, with the page 1 markup it was read from
#[derive(Debug, Clone)]
pub struct YearListing {
    pub pages: u32,
    pub first_page: String,
}

/// Fetches page 1 of a year's listing and returns its page count
///
/// The page 1 body is handed back so the caller can extract its rows
/// without requesting it again.
pub async fn count_pages(
    client: &SiteClient,
    year: &YearToken,
) -> Result<YearListing, HarvestError> {
    let first_page = client.fetch_listing(year, 1).await?;
    let pages = count_pages_in(&first_page)?;
    tracing::info!("{} pages of data found for {}", pages, year);
    Ok(YearListing { pages, first_page })
}
