use crate::domain::DailyMetricRecord;
use crate::error::{EtlError, Result};
use crate::ingest::extract::{extract, find_country};
use crate::ingest::source::SourceClient;
use crate::normalize::{normalize, DAILY_CASES_TABLE};
use crate::storage::MetricStore;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub country: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FetchRequest {
    /// Validates caller input. Dates must be `YYYY-MM-DD` and ordered.
    pub fn parse(country: &str, start_date: &str, end_date: &str) -> Result<Self> {
        let country = country.trim();
        if country.is_empty() {
            return Err(EtlError::validation("country must be non-empty"));
        }
        let start_date = parse_date("start_date", start_date)?;
        let end_date = parse_date("end_date", end_date)?;
        Self::new(country, start_date, end_date)
    }

    pub fn new(country: &str, start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if start_date > end_date {
            return Err(EtlError::validation(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }
        Ok(Self {
            country: country.to_string(),
            start_date,
            end_date,
        })
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        EtlError::validation(format!("{field} must be YYYY-MM-DD (got {raw:?}): {e}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    SourceUnavailable,
    CountryNotFound,
    NoRowsInRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchLoadOutcome {
    /// `rows_loaded` counts rows that were new to the store.
    Loaded { rows_normalized: usize, rows_loaded: u64 },
    NoData { reason: NoDataReason },
}

impl FetchLoadOutcome {
    pub fn rows_loaded(&self) -> u64 {
        match self {
            FetchLoadOutcome::Loaded { rows_loaded, .. } => *rows_loaded,
            FetchLoadOutcome::NoData { .. } => 0,
        }
    }
}

/// Fetch, extract and normalize, stopping short of storage.
///
/// `Err(reason)` means there is nothing to load; transport failures are logged here and folded
/// into `SourceUnavailable`.
pub async fn fetch_records(
    source: &dyn SourceClient,
    req: &FetchRequest,
) -> std::result::Result<Vec<DailyMetricRecord>, NoDataReason> {
    let payload = match source.fetch_payload().await {
        Ok(p) => p,
        Err(err) => {
            let error = format!("{err:#}");
            tracing::error!(source = source.source_name(), %error, "data source fetch failed");
            return Err(NoDataReason::SourceUnavailable);
        }
    };

    if find_country(&payload, &req.country).is_none() {
        tracing::error!(country = %req.country, "no data found for country");
        return Err(NoDataReason::CountryNotFound);
    }

    let rows = extract(&payload, &req.country, req.start_date, req.end_date);
    tracing::info!(
        country = %req.country,
        start_date = %req.start_date,
        end_date = %req.end_date,
        days = rows.len(),
        "extracted days for country"
    );

    let records = normalize(rows, DAILY_CASES_TABLE);
    if records.is_empty() {
        return Err(NoDataReason::NoRowsInRange);
    }
    Ok(records)
}

/// One fetch-transform-load pass. Safe to repeat: rows already stored are skipped.
pub async fn run_fetch_load(
    source: &dyn SourceClient,
    store: &dyn MetricStore,
    req: &FetchRequest,
) -> Result<FetchLoadOutcome> {
    let records = match fetch_records(source, req).await {
        Ok(records) => records,
        Err(reason) => {
            tracing::warn!(country = %req.country, ?reason, "nothing to load; skipping load step");
            return Ok(FetchLoadOutcome::NoData { reason });
        }
    };

    let rows_loaded = store
        .insert_if_absent(&records)
        .await
        .map_err(EtlError::Storage)?;

    tracing::info!(
        country = %req.country,
        rows_normalized = records.len(),
        rows_loaded,
        "fetch-load finished"
    );

    Ok(FetchLoadOutcome::Loaded {
        rows_normalized: records.len(),
        rows_loaded,
    })
}
