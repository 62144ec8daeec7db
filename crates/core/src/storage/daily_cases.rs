use crate::domain::{DailyMetricRecord, Metric};
use crate::storage::MetricStore;
use anyhow::Context;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct PgMetricStore {
    pool: sqlx::PgPool,
    batch_size: usize,
}

impl PgMetricStore {
    pub fn new(pool: sqlx::PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

pub async fn insert_daily_cases_atomic(
    pool: &sqlx::PgPool,
    records: &[DailyMetricRecord],
    chunk_size: usize,
) -> anyhow::Result<u64> {
    if records.is_empty() {
        tracing::info!("no daily_cases rows to insert");
        return Ok(0);
    }
    anyhow::ensure!(chunk_size >= 1, "insert chunk size must be >= 1");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut inserted: u64 = 0;
    for (batch_idx, chunk) in records.chunks(chunk_size).enumerate() {
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO daily_cases (report_date, country_name, total_cases, new_cases, total_deaths, new_deaths) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.report_date)
                .push_bind(&r.country_name)
                .push_bind(r.total_cases)
                .push_bind(r.new_cases)
                .push_bind(r.total_deaths)
                .push_bind(r.new_deaths);
        });
        qb.push(" ON CONFLICT (country_name, report_date) DO NOTHING");

        // An error drops `tx` uncommitted, which rolls back every earlier chunk too.
        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert daily_cases failed")?;
        inserted += res.rows_affected();

        tracing::debug!(
            batch_idx,
            batch_size = chunk.len(),
            inserted = res.rows_affected(),
            elapsed_ms = t0.elapsed().as_millis(),
            "daily_cases batch insert"
        );
    }

    tx.commit().await.context("commit transaction failed")?;

    tracing::info!(
        attempted = records.len(),
        inserted,
        "inserted new daily_cases rows"
    );
    Ok(inserted)
}

#[async_trait::async_trait]
impl MetricStore for PgMetricStore {
    async fn insert_if_absent(&self, records: &[DailyMetricRecord]) -> anyhow::Result<u64> {
        insert_daily_cases_atomic(&self.pool, records, self.batch_size).await
    }

    async fn total_new_cases(&self, country: &str) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(new_cases), 0)::BIGINT FROM daily_cases WHERE country_name = $1",
        )
        .persistent(false)
        .bind(country)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("sum new_cases failed (country={country})"))?;
        Ok(total)
    }

    async fn daily_trend(
        &self,
        country: &str,
        metric: Metric,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
        let sql = format!(
            "SELECT report_date, {col} FROM daily_cases \
             WHERE country_name = $1 \
             ORDER BY report_date ASC",
            col = metric.column()
        );
        sqlx::query_as::<_, (NaiveDate, i64)>(&sql)
            .persistent(false)
            .bind(country)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("daily trend query failed (country={country}, metric={metric})"))
    }

    async fn top_by_metric(&self, n: u32, metric: Metric) -> anyhow::Result<Vec<(String, i64)>> {
        let sql = format!(
            "SELECT country_name, SUM({col})::BIGINT AS total \
             FROM daily_cases \
             GROUP BY country_name \
             ORDER BY total DESC, country_name ASC \
             LIMIT $1",
            col = metric.column()
        );
        sqlx::query_as::<_, (String, i64)>(&sql)
            .persistent(false)
            .bind(i64::from(n))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("top-n query failed (n={n}, metric={metric})"))
    }
}
