pub mod metric;
pub mod record;

pub use metric::Metric;
pub use record::DailyMetricRecord;
