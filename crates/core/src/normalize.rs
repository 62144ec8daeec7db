use crate::domain::DailyMetricRecord;
use crate::ingest::types::ExtractedRow;
use chrono::NaiveDate;
use std::collections::HashSet;

pub const DAILY_CASES_TABLE: &str = "daily_cases";

/// Turns extracted rows into canonical `daily_cases` records.
///
/// Rows with unparseable dates are dropped. The rest are stably sorted by date and deduplicated
/// on `(country_name, report_date)`, keeping the first occurrence. Any `table_type` other than
/// `daily_cases` produces nothing.
pub fn normalize(rows: Vec<ExtractedRow>, table_type: &str) -> Vec<DailyMetricRecord> {
    if rows.is_empty() {
        tracing::warn!("no extracted rows to normalize");
        return Vec::new();
    }

    if table_type != DAILY_CASES_TABLE {
        tracing::warn!(table_type, "only daily_cases is supported");
        return Vec::new();
    }

    let input_len = rows.len();
    let mut records: Vec<DailyMetricRecord> = rows.into_iter().filter_map(into_record).collect();
    let dropped = input_len - records.len();
    if dropped > 0 {
        tracing::debug!(dropped, "dropped rows with unparseable dates");
    }

    // sort_by_key is stable: same-date rows keep their source order for the dedup below.
    records.sort_by_key(|r| r.report_date);

    let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(records.len());
    records.retain(|r| seen.insert((r.country_name.clone(), r.report_date)));

    records
}

fn into_record(row: ExtractedRow) -> Option<DailyMetricRecord> {
    let report_date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").ok()?;
    Some(DailyMetricRecord {
        report_date,
        country_name: row.country,
        total_cases: row.total_cases,
        new_cases: row.new_cases,
        total_deaths: row.total_deaths,
        new_deaths: row.new_deaths,
    })
}
