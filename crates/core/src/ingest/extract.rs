use crate::ingest::types::{Counts, CountryBlock, ExtractedRow, RawCountryPayload};
use chrono::NaiveDate;

/// First block whose declared name equals `country`, ignoring case.
pub fn find_country<'a>(payload: &'a RawCountryPayload, country: &str) -> Option<&'a CountryBlock> {
    let wanted = country.trim().to_lowercase();
    payload
        .blocks
        .iter()
        .find(|block| block.name().to_lowercase() == wanted)
}

/// Flattens the matching country's days within `[start_date, end_date]` into rows.
///
/// Dates are compared as `YYYY-MM-DD` strings. Missing or malformed counts and days become 0. An unknown country
/// yields no rows; the caller decides whether that is worth reporting.
pub fn extract(
    payload: &RawCountryPayload,
    country: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<ExtractedRow> {
    let Some(block) = find_country(payload, country) else {
        return Vec::new();
    };
    let Some(dates) = block.dates.as_ref() else {
        return Vec::new();
    };

    let start = start_date.format("%Y-%m-%d").to_string();
    let end = end_date.format("%Y-%m-%d").to_string();
    let name = block.name();

    dates
        .iter()
        .filter(|(date, _)| start.as_str() <= date.as_str() && date.as_str() <= end.as_str())
        .map(|(date, day)| {
            let day = day.as_ref();
            let (new_cases, new_deaths) = counts(day.and_then(|d| d.new.as_ref()));
            let (total_cases, total_deaths) = counts(day.and_then(|d| d.cumulative.as_ref()));
            ExtractedRow {
                date: date.clone(),
                country: name.to_string(),
                total_cases,
                new_cases,
                total_deaths,
                new_deaths,
            }
        })
        .collect()
}

// Upstream occasionally publishes negative corrections; stored counts are non-negative.
fn counts(c: Option<&Counts>) -> (i64, i64) {
    let Some(c) = c else {
        return (0, 0);
    };
    (
        c.cases.unwrap_or(0).max(0),
        c.deaths.unwrap_or(0).max(0),
    )
}
