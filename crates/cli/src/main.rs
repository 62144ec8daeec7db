use anyhow::Context;
use clap::{Parser, Subcommand};
use healthdata_core::config::Settings;
use healthdata_core::ingest::source::HttpJsonSource;
use healthdata_core::pipeline::{self, FetchLoadOutcome, FetchRequest};
use healthdata_core::query::{self, QueryIntent};
use healthdata_core::storage::{self, admin, runs, PgMetricStore};
use std::io::{BufRead, Write};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "healthdata")]
#[command(about = "Public-health metrics ETL and reporting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one country's date range from the data source and load it into daily_cases.
    FetchData {
        /// Country name (e.g. India). Matched case-insensitively against the source.
        country: String,
        /// Start date (YYYY-MM-DD), inclusive.
        start_date: String,
        /// End date (YYYY-MM-DD), inclusive.
        end_date: String,

        /// Fetch and normalize, but do not write to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one of the predefined reports.
    QueryData {
        /// Print the report as JSON.
        #[arg(long, global = true)]
        json: bool,

        #[command(subcommand)]
        query: QueryCommand,
    },

    /// List tables in the database.
    ListTables,

    /// Drop all tables (USE WITH CAUTION).
    DropTables {
        /// Skip the interactive confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum QueryCommand {
    /// Total new cases stored for a country.
    TotalCases { country: String },

    /// Daily values of a metric for a country.
    DailyTrends { country: String, metric: String },

    /// Top N countries by the sum of a metric.
    TopNCountriesByMetric {
        #[arg(allow_negative_numbers = true)]
        n: i64,
        metric: String,
    },
}

impl QueryCommand {
    fn into_intent(self) -> healthdata_core::error::Result<QueryIntent> {
        match self {
            QueryCommand::TotalCases { country } => QueryIntent::total_for_country(&country),
            QueryCommand::DailyTrends { country, metric } => {
                QueryIntent::daily_trend(&country, &metric)
            }
            QueryCommand::TopNCountriesByMetric { n, metric } => QueryIntent::top_n(n, &metric),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli.command, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        let error = format!("{err:#}");
        tracing::error!(%error, "command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::FetchData {
            country,
            start_date,
            end_date,
            dry_run,
        } => {
            let req = FetchRequest::parse(&country, &start_date, &end_date)?;
            fetch_data(settings, &req, dry_run).await
        }
        Command::QueryData { json, query } => {
            let intent = query.into_intent()?;
            let pool = connect(settings).await?;
            storage::migrate(&pool).await?;
            let store = PgMetricStore::new(pool, settings.insert_batch_size);

            let report = query::run_query(&store, &intent).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(())
        }
        Command::ListTables => {
            let pool = connect(settings).await?;
            let tables = admin::list_tables(&pool).await?;
            println!("Tables in DB:");
            for table in tables {
                println!("- {table}");
            }
            Ok(())
        }
        Command::DropTables { yes } => {
            if !yes && !confirm("Are you sure you want to drop all tables? (yes/no): ")? {
                println!("Aborted.");
                return Ok(());
            }
            let pool = connect(settings).await?;
            let dropped = admin::drop_tables(&pool).await?;
            println!("Dropped {} tables.", dropped.len());
            Ok(())
        }
    }
}

async fn fetch_data(settings: &Settings, req: &FetchRequest, dry_run: bool) -> anyhow::Result<()> {
    let source = HttpJsonSource::from_settings(settings)?;

    if dry_run {
        match pipeline::fetch_records(&source, req).await {
            Ok(records) => {
                tracing::info!(country = %req.country, dry_run = true, rows = records.len(), "fetch-load (dry-run)");
                println!("{} rows ready for {} (dry run, nothing written)", records.len(), req.country);
            }
            Err(reason) => println!("No data for {}: {reason:?}", req.country),
        }
        return Ok(());
    }

    let pool = connect(settings).await?;
    storage::migrate(&pool).await?;
    let store = PgMetricStore::new(pool.clone(), settings.insert_batch_size);

    let started_at = chrono::Utc::now();
    let result = pipeline::run_fetch_load(&source, &store, req).await;

    let error_text = result.as_ref().err().map(|e| e.to_string());
    let (status, rows_inserted) = match &result {
        Ok(FetchLoadOutcome::Loaded { rows_loaded, .. }) => (runs::RunStatus::Loaded, *rows_loaded),
        Ok(FetchLoadOutcome::NoData { .. }) => (runs::RunStatus::NoData, 0),
        Err(_) => (runs::RunStatus::Error, 0),
    };
    let run = runs::FetchRun {
        country: &req.country,
        start_date: req.start_date,
        end_date: req.end_date,
        started_at,
        status,
        rows_inserted,
        error: error_text.as_deref(),
    };
    match runs::record_fetch_run(&pool, &run).await {
        Ok(run_id) => tracing::debug!(%run_id, status = status.as_str(), "recorded fetch run"),
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(%error, "failed to record fetch run");
        }
    }

    match result? {
        FetchLoadOutcome::Loaded {
            rows_normalized,
            rows_loaded,
        } => println!(
            "Loaded {rows_loaded} new rows for {} ({rows_normalized} rows fetched).",
            req.country
        ),
        FetchLoadOutcome::NoData { reason } => {
            println!("No data returned for {}: {reason:?}. Nothing loaded.", req.country)
        }
    }
    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
