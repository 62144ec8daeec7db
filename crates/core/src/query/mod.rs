use crate::domain::Metric;
use crate::error::{EtlError, Result};
use crate::storage::MetricStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

const RULE_WIDTH: usize = 30;

/// One of the canned reports a caller can ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum QueryIntent {
    TotalForCountry { country: String },
    DailyTrend { country: String, metric: Metric },
    TopN { n: u32, metric: Metric },
}

impl QueryIntent {
    pub fn total_for_country(country: &str) -> Result<Self> {
        Ok(Self::TotalForCountry {
            country: require_country(country)?,
        })
    }

    pub fn daily_trend(country: &str, metric: &str) -> Result<Self> {
        Ok(Self::DailyTrend {
            country: require_country(country)?,
            metric: metric.parse()?,
        })
    }

    pub fn top_n(n: i64, metric: &str) -> Result<Self> {
        let n = u32::try_from(n)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| EtlError::validation(format!("n must be between 1 and {} (got {n})", u32::MAX)))?;
        Ok(Self::TopN {
            n,
            metric: metric.parse()?,
        })
    }

    /// Re-checks invariants for intents built directly from their variants.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::TotalForCountry { country } | Self::DailyTrend { country, .. } => {
                let trimmed = require_country(country)?;
                if trimmed != *country {
                    return Err(EtlError::validation(format!(
                        "country {country:?} has surrounding whitespace"
                    )));
                }
                Ok(())
            }
            Self::TopN { n, .. } if *n == 0 => Err(EtlError::validation("n must be >= 1")),
            Self::TopN { .. } => Ok(()),
        }
    }
}

// Stored names are matched exactly, so only surrounding whitespace is removed.
fn require_country(country: &str) -> Result<String> {
    let country = country.trim();
    if country.is_empty() {
        return Err(EtlError::validation("country must be non-empty"));
    }
    Ok(country.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub report_date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCountry {
    pub rank: usize,
    pub country_name: String,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum Report {
    Total {
        country: String,
        total_new_cases: i64,
    },
    DailyTrend {
        country: String,
        metric: Metric,
        points: Vec<TrendPoint>,
    },
    TopN {
        metric: Metric,
        rows: Vec<RankedCountry>,
    },
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Total {
                country,
                total_new_cases,
            } => write!(f, "Total cases in {country}: {total_new_cases}"),
            Report::DailyTrend { metric, points, .. } => {
                writeln!(f, "Date       | {}", metric.label())?;
                write!(f, "{}", "-".repeat(RULE_WIDTH))?;
                for p in points {
                    write!(f, "\n{} | {}", p.report_date, p.value)?;
                }
                Ok(())
            }
            Report::TopN { rows, .. } => {
                writeln!(f, "Rank | Country        | Total")?;
                write!(f, "{}", "-".repeat(RULE_WIDTH))?;
                for r in rows {
                    write!(f, "\n{:<4} | {:<14} | {}", r.rank, r.country_name, r.total)?;
                }
                Ok(())
            }
        }
    }
}

/// Validates `intent`, runs its aggregate against `store`, and shapes the result.
pub async fn run_query(store: &dyn MetricStore, intent: &QueryIntent) -> Result<Report> {
    intent.validate()?;
    tracing::debug!(?intent, "running query");

    match intent {
        QueryIntent::TotalForCountry { country } => {
            let total_new_cases = store
                .total_new_cases(country)
                .await
                .map_err(EtlError::Storage)?;
            Ok(Report::Total {
                country: country.clone(),
                total_new_cases,
            })
        }
        QueryIntent::DailyTrend { country, metric } => {
            let points = store
                .daily_trend(country, *metric)
                .await
                .map_err(EtlError::Storage)?
                .into_iter()
                .map(|(report_date, value)| TrendPoint { report_date, value })
                .collect();
            Ok(Report::DailyTrend {
                country: country.clone(),
                metric: *metric,
                points,
            })
        }
        QueryIntent::TopN { n, metric } => {
            let rows = store
                .top_by_metric(*n, *metric)
                .await
                .map_err(EtlError::Storage)?
                .into_iter()
                .enumerate()
                .map(|(i, (country_name, total))| RankedCountry {
                    rank: i + 1,
                    country_name,
                    total,
                })
                .collect();
            Ok(Report::TopN {
                metric: *metric,
                rows,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DailyMetricRecord;
    use crate::storage::InMemoryMetricStore;

    fn record(country: &str, day: u32, new_cases: i64, new_deaths: i64) -> DailyMetricRecord {
        DailyMetricRecord {
            report_date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            country_name: country.to_string(),
            total_cases: new_cases * 2,
            new_cases,
            total_deaths: new_deaths * 2,
            new_deaths,
        }
    }

    async fn seeded_store() -> InMemoryMetricStore {
        let store = InMemoryMetricStore::new();
        store
            .insert_if_absent(&[
                record("C", 1, 50, 1),
                record("C", 2, 30, 1),
                record("A", 2, 60, 5),
                record("A", 1, 40, 5),
                record("B", 1, 80, 9),
            ])
            .await
            .unwrap();
        store
    }

    /// Store that fails every call, to tell storage errors apart from validation errors.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl MetricStore for BrokenStore {
        async fn insert_if_absent(&self, _: &[DailyMetricRecord]) -> anyhow::Result<u64> {
            anyhow::bail!("connection lost")
        }
        async fn total_new_cases(&self, _: &str) -> anyhow::Result<i64> {
            anyhow::bail!("connection lost")
        }
        async fn daily_trend(&self, _: &str, _: Metric) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
            anyhow::bail!("connection lost")
        }
        async fn top_by_metric(&self, _: u32, _: Metric) -> anyhow::Result<Vec<(String, i64)>> {
            anyhow::bail!("connection lost")
        }
    }

    #[tokio::test]
    async fn total_sums_new_cases_for_exact_country() {
        let store = seeded_store().await;
        let intent = QueryIntent::total_for_country("A").unwrap();
        let report = run_query(&store, &intent).await.unwrap();
        assert_eq!(
            report,
            Report::Total {
                country: "A".to_string(),
                total_new_cases: 100
            }
        );
        assert_eq!(report.to_string(), "Total cases in A: 100");
    }

    #[tokio::test]
    async fn total_for_unknown_country_is_zero() {
        let store = seeded_store().await;
        let intent = QueryIntent::total_for_country("Atlantis").unwrap();
        let report = run_query(&store, &intent).await.unwrap();
        assert_eq!(report.to_string(), "Total cases in Atlantis: 0");
    }

    #[tokio::test]
    async fn trend_is_ordered_by_date() {
        let store = seeded_store().await;
        let intent = QueryIntent::daily_trend("A", "new_cases").unwrap();
        let report = run_query(&store, &intent).await.unwrap();
        assert_eq!(
            report.to_string(),
            "Date       | New_cases\n\
             ------------------------------\n\
             2021-01-01 | 40\n\
             2021-01-02 | 60"
        );
    }

    #[tokio::test]
    async fn top_n_breaks_ties_alphabetically() {
        // Totals: A=100, B=80, C=80.
        let store = seeded_store().await;
        let intent = QueryIntent::top_n(2, "new_cases").unwrap();
        let Report::TopN { rows, .. } = run_query(&store, &intent).await.unwrap() else {
            panic!("expected a top-n report");
        };
        let pairs: Vec<_> = rows.iter().map(|r| (r.country_name.as_str(), r.total)).collect();
        assert_eq!(pairs, vec![("A", 100), ("B", 80)]);
        assert_eq!(rows[1].rank, 2);
    }

    #[tokio::test]
    async fn top_n_formats_rank_table() {
        let store = seeded_store().await;
        let intent = QueryIntent::top_n(1, "new_deaths").unwrap();
        let report = run_query(&store, &intent).await.unwrap();
        assert_eq!(
            report.to_string(),
            "Rank | Country        | Total\n\
             ------------------------------\n\
             1    | A              | 10"
        );
    }

    #[test]
    fn rejects_invalid_parameters_up_front() {
        assert!(QueryIntent::top_n(0, "new_cases").unwrap_err().is_validation());
        assert!(QueryIntent::top_n(-3, "new_cases").unwrap_err().is_validation());
        assert!(QueryIntent::top_n(3, "recovered").unwrap_err().is_validation());
        assert!(QueryIntent::daily_trend("A", "cases").unwrap_err().is_validation());
        assert!(QueryIntent::total_for_country(" ").unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn validation_happens_before_storage() {
        let intent = QueryIntent::TopN {
            n: 0,
            metric: Metric::NewCases,
        };
        let err = run_query(&BrokenStore, &intent).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn directly_built_intent_with_padded_country_is_rejected() {
        let store = seeded_store().await;
        let padded = QueryIntent::TotalForCountry {
            country: " A ".to_string(),
        };
        assert!(run_query(&store, &padded).await.unwrap_err().is_validation());

        let padded = QueryIntent::DailyTrend {
            country: "A\t".to_string(),
            metric: Metric::NewCases,
        };
        assert!(run_query(&BrokenStore, &padded).await.unwrap_err().is_validation());

        // The constructors trim, so the same input through them reaches storage.
        let intent = QueryIntent::total_for_country(" A ").unwrap();
        assert_eq!(
            run_query(&store, &intent).await.unwrap().to_string(),
            "Total cases in A: 100"
        );
    }

    #[tokio::test]
    async fn storage_failures_are_a_distinct_kind() {
        let intent = QueryIntent::total_for_country("A").unwrap();
        let err = run_query(&BrokenStore, &intent).await.unwrap_err();
        assert!(matches!(err, EtlError::Storage(_)));
        assert!(err.to_string().contains("connection lost"));
    }
}
