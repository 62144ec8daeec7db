use crate::domain::{DailyMetricRecord, Metric};
use anyhow::Context;
use chrono::NaiveDate;

pub mod admin;
pub mod daily_cases;
pub mod memory;
pub mod runs;

pub use daily_cases::PgMetricStore;
pub use memory::InMemoryMetricStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Persistence for `daily_cases` rows and the aggregate reads the query dispatcher needs.
#[async_trait::async_trait]
pub trait MetricStore: Send + Sync {
    /// Inserts rows whose `(country_name, report_date)` is not stored yet and returns how many
    /// were new. Existing rows are never touched. The call commits all of its rows or none.
    async fn insert_if_absent(&self, records: &[DailyMetricRecord]) -> anyhow::Result<u64>;

    /// Sum of `new_cases` for an exact `country_name`; 0 when the country has no rows.
    async fn total_new_cases(&self, country: &str) -> anyhow::Result<i64>;

    /// `(report_date, metric)` per stored row for `country`, ascending by date.
    async fn daily_trend(
        &self,
        country: &str,
        metric: Metric,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>>;

    /// Per-country sums of `metric`, descending, ties broken by country name ascending.
    async fn top_by_metric(&self, n: u32, metric: Metric) -> anyhow::Result<Vec<(String, i64)>>;
}
