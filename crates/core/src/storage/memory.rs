use crate::domain::{DailyMetricRecord, Metric};
use crate::storage::MetricStore;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type RowKey = (String, NaiveDate);

/// Process-local `MetricStore` with the same insert and ordering rules as the Postgres store,
/// including the non-negative column checks.
#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    rows: Mutex<BTreeMap<RowKey, DailyMetricRecord>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn snapshot(&self) -> anyhow::Result<Vec<DailyMetricRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, BTreeMap<RowKey, DailyMetricRecord>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
    }
}

fn check_row(r: &DailyMetricRecord) -> anyhow::Result<()> {
    for metric in Metric::ALL {
        anyhow::ensure!(
            r.value_of(metric) >= 0,
            "{} must be >= 0 (country={}, report_date={})",
            metric,
            r.country_name,
            r.report_date
        );
    }
    Ok(())
}

// Postgres fails the same sums with "bigint out of range".
fn checked_sum(acc: i64, value: i64) -> anyhow::Result<i64> {
    acc.checked_add(value)
        .context("sum out of range for a 64-bit integer")
}

#[async_trait::async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn insert_if_absent(&self, records: &[DailyMetricRecord]) -> anyhow::Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        // Reject the whole call before touching the map so nothing is partially applied.
        for r in records {
            check_row(r).context("insert daily_cases failed")?;
        }

        let mut rows = self.lock()?;
        let mut inserted: u64 = 0;
        for r in records {
            let key = (r.country_name.clone(), r.report_date);
            if !rows.contains_key(&key) {
                rows.insert(key, r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn total_new_cases(&self, country: &str) -> anyhow::Result<i64> {
        let rows = self.lock()?;
        rows.values()
            .filter(|r| r.country_name == country)
            .try_fold(0_i64, |acc, r| checked_sum(acc, r.new_cases))
    }

    async fn daily_trend(
        &self,
        country: &str,
        metric: Metric,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
        let rows = self.lock()?;
        // Keys sort by (country, date), so one country's rows come out in date order.
        Ok(rows
            .values()
            .filter(|r| r.country_name == country)
            .map(|r| (r.report_date, r.value_of(metric)))
            .collect())
    }

    async fn top_by_metric(&self, n: u32, metric: Metric) -> anyhow::Result<Vec<(String, i64)>> {
        let rows = self.lock()?;
        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        for r in rows.values() {
            let total = totals.entry(r.country_name.as_str()).or_insert(0);
            *total = checked_sum(*total, r.value_of(metric))?;
        }

        let mut ranked: Vec<(String, i64)> = totals
            .into_iter()
            .map(|(country, total)| (country.to_string(), total))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n as usize);
        Ok(ranked)
    }
}
