use crate::domain::Metric;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical `daily_cases` row. `(country_name, report_date)` is unique per load batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetricRecord {
    pub report_date: NaiveDate,
    pub country_name: String,
    pub total_cases: i64,
    pub new_cases: i64,
    pub total_deaths: i64,
    pub new_deaths: i64,
}

impl DailyMetricRecord {
    pub fn value_of(&self, metric: Metric) -> i64 {
        match metric {
            Metric::TotalCases => self.total_cases,
            Metric::NewCases => self.new_cases,
            Metric::TotalDeaths => self.total_deaths,
            Metric::NewDeaths => self.new_deaths,
        }
    }
}
