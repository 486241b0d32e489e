//! URL construction for the registry's landing and listing pages
//!
//! | Page | URL |
//! |------|-----|
//! | Landing | `{base}/wikibase/` |
//! | Listing page 1 | `{base}/wikibase/dblist.php?Year={year}` |
//! | Listing page n | `{base}/wikibase/dblist.php?Year={year}&sorteer=datekey&page={n}` |

use crate::record::YearToken;
use ::url::{ParseError, Url};

const LANDING_PATH: &str = "/wikibase/";
const LISTING_PATH: &str = "/wikibase/dblist.php";
const LISTING_FILE: &str = "dblist.php";

/// Builds the landing page URL for a base like `https://aviation-safety.net`
pub fn landing_url(base: &Url) -> Result<Url, ParseError> {
    base.join(LANDING_PATH)
}

/// Builds the URL of one listing page for a year
///
/// Page 1 carries only the `Year` parameter; later pages add the sort key and
/// page number the registry uses for its own pagination links.
pub fn listing_url(base: &Url, year: &YearToken, page: u32) -> Result<Url, ParseError> {
    let mut url = base.join(LISTING_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("Year", year.as_str());
        if page > 1 {
            query.append_pair("sorteer", "datekey");
            query.append_pair("page", &page.to_string());
        }
    }
    Ok(url)
}

/// Extracts the year token from a year-listing link
///
/// Accepts relative or absolute hrefs whose path ends in `dblist.php` and whose
/// only query parameter is `Year`. Anything else (pagination links, sort links,
/// unrelated anchors) yields `None`.
pub fn year_from_href(href: &str, page_url: &Url) -> Option<YearToken> {
    let resolved = page_url.join(href.trim()).ok()?;

    if !resolved.path().ends_with(LISTING_FILE) {
        return None;
    }

    let mut pairs = resolved.query_pairs();
    let (key, value) = pairs.next()?;
    if key != "Year" || value.is_empty() || pairs.next().is_some() {
        return None;
    }

    Some(YearToken::new(value.into_owned()))
}
