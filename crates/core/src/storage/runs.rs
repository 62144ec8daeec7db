use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Loaded,
    NoData,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Loaded => "loaded",
            RunStatus::NoData => "no_data",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRun<'a> {
    pub country: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub rows_inserted: u64,
    pub error: Option<&'a str>,
}

/// Appends one row to `fetch_runs`. Runs outside the load transaction.
pub async fn record_fetch_run(pool: &sqlx::PgPool, run: &FetchRun<'_>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let rows_inserted = i64::try_from(run.rows_inserted).unwrap_or(i64::MAX);

    sqlx::query(
        "INSERT INTO fetch_runs (id, country, start_date, end_date, started_at, status, rows_inserted, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(id)
    .bind(run.country)
    .bind(run.start_date)
    .bind(run.end_date)
    .bind(run.started_at)
    .bind(run.status.as_str())
    .bind(rows_inserted)
    .bind(run.error)
    .execute(pool)
    .await
    .context("insert fetch_runs failed")?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_the_table_check() {
        let all: Vec<_> = [RunStatus::Loaded, RunStatus::NoData, RunStatus::Error]
            .into_iter()
            .map(RunStatus::as_str)
            .collect();
        assert_eq!(all, vec!["loaded", "no_data", "error"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn records_one_run_per_status(pool: sqlx::PgPool) {
        let start_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end_date = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        let cases = [
            (RunStatus::Loaded, 31_u64, None),
            (RunStatus::NoData, 0, None),
            (RunStatus::Error, 0, Some("storage failure: connection lost")),
        ];

        for (status, rows_inserted, error) in cases {
            let run = FetchRun {
                country: "India",
                start_date,
                end_date,
                started_at: Utc::now(),
                status,
                rows_inserted,
                error,
            };
            let id = record_fetch_run(&pool, &run).await.unwrap();

            let (stored_status, stored_rows, stored_error, stored_start): (
                String,
                i64,
                Option<String>,
                NaiveDate,
            ) = sqlx::query_as(
                "SELECT status, rows_inserted, error, start_date FROM fetch_runs WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();

            assert_eq!(stored_status, status.as_str());
            assert_eq!(stored_rows, rows_inserted as i64);
            assert_eq!(stored_error.as_deref(), error);
            assert_eq!(stored_start, start_date);
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fetch_runs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 3);
    }
}
