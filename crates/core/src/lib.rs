pub mod domain;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_INSERT_BATCH: usize = 200;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub data_source_url: Option<String>,
        pub data_source_timeout_secs: u64,
        pub database_max_connections: u32,
        pub insert_batch_size: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                data_source_url: None,
                data_source_timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
                database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                insert_batch_size: DEFAULT_INSERT_BATCH,
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let insert_batch_size = parse_env("DAILY_CASES_INSERT_BATCH")?
                .unwrap_or(DEFAULT_INSERT_BATCH);
            anyhow::ensure!(
                insert_batch_size >= 1,
                "DAILY_CASES_INSERT_BATCH must be >= 1"
            );

            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                data_source_url: non_empty_var("DATA_SOURCE_URL"),
                data_source_timeout_secs: parse_env("DATA_SOURCE_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS),
                database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                insert_batch_size,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_data_source_url(&self) -> anyhow::Result<&str> {
            self.data_source_url
                .as_deref()
                .context("DATA_SOURCE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match non_empty_var(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("{key} is not valid: {raw}")),
            None => Ok(None),
        }
    }

}
