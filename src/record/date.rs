use chrono::NaiveDate;

/// Registry date format, e.g. `05-Jan-1950`
pub const DATE_FORMAT: &str = "%d-%b-%Y";

/// Parses a registry date, rejecting anything not shaped `DD-Mon-YYYY`
///
/// The shape is checked before parsing so that chrono's more lenient
/// `%d`/`%b` handling (single-digit days, full month names) cannot let a
/// differently formatted string through. No fallback formats are tried.
///
/// # Example
///
/// ```
/// use accident_harvest::normalize_date;
/// use chrono::NaiveDate;
///
/// assert_eq!(normalize_date("05-Jan-1950"), NaiveDate::from_ymd_opt(1950, 1, 5));
/// assert_eq!(normalize_date("1950-01-05"), None);
/// ```
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    if !has_date_shape(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn has_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 11
        && bytes[0..2].iter().all(u8::is_ascii_digit)
        && bytes[2] == b'-'
        && bytes[3..6].iter().all(u8::is_ascii_alphabetic)
        && bytes[6] == b'-'
        && bytes[7..11].iter().all(u8::is_ascii_digit)
}
