use anyhow::Context;
use clap::Parser;
use spreadreg_core::batch::{BatchOptions, BatchProcessor, BatchResult};
use spreadreg_core::ingest::provider::{HttpJsonMetricsProvider, MetricsProvider};
use spreadreg_core::storage::company_features::BatchRunRecord;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod tickers;

#[derive(Debug, Parser)]
#[command(name = "spreadreg_worker")]
struct Args {
    /// Comma-separated ticker symbols (e.g. "AAPL,BRK-B,TSLA").
    #[arg(long)]
    tickers: Option<String>,

    /// File with one ticker per line; '#' starts a comment.
    #[arg(long)]
    tickers_file: Option<std::path::PathBuf>,

    /// Dataset as-of date (YYYY-MM-DD). Defaults to the last US market close.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = spreadreg_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let as_of_date = spreadreg_core::time::us_market::resolve_as_of_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
    )?;
    let tickers = tickers::load_tickers(args.tickers.as_deref(), args.tickers_file.as_deref())?;

    let provider = HttpJsonMetricsProvider::from_settings(&settings)?;
    let provider_name = provider.provider_name();
    let processor = BatchProcessor::with_options(provider, BatchOptions::from_env());

    tracing::info!(%as_of_date, tickers = tickers.len(), "starting feature batch");
    let result = processor.process_batch(&tickers).await;

    tracing::info!(
        %as_of_date,
        requested = tickers.len(),
        succeeded = result.features.len(),
        failed = result.failures.len(),
        "feature batch finished"
    );

    // Frequency of failures across the batch, one line per kind.
    for (kind, count) in &result.failure_counts {
        tracing::info!(kind = %kind, count, "batch failure frequency");
    }

    if args.dry_run {
        tracing::info!(%as_of_date, dry_run = true, "dry run; skipping persistence");
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    spreadreg_core::storage::migrate(&pool).await?;

    let acquired =
        spreadreg_core::storage::lock::try_acquire_as_of_date_lock(&pool, as_of_date).await?;
    if !acquired {
        tracing::warn!(%as_of_date, "as_of_date lock not acquired; another run in progress");
        return Ok(());
    }

    let persisted = persist(&pool, as_of_date, provider_name, &tickers, &result).await;
    if let Err(err) = &persisted {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(%as_of_date, error = %err, "feature batch persistence failed");
    }

    let _ = spreadreg_core::storage::lock::release_as_of_date_lock(&pool, as_of_date).await;
    persisted
}

async fn persist(
    pool: &sqlx::PgPool,
    as_of_date: chrono::NaiveDate,
    provider: &str,
    tickers: &[String],
    result: &BatchResult,
) -> anyhow::Result<()> {
    let failure_counts = if result.failure_counts.is_empty() {
        None
    } else {
        Some(serde_json::to_value(&result.failure_counts)?)
    };

    let upserted = if result.features.is_empty() {
        Ok(0)
    } else {
        spreadreg_core::storage::company_features::upsert_daily_features_atomic(
            pool,
            as_of_date,
            &result.features,
        )
        .await
    };

    match upserted {
        Ok(upserted) => {
            let status = if result.failures.is_empty() {
                "success"
            } else {
                "partial"
            };
            let run_id = spreadreg_core::storage::company_features::record_batch_run(
                pool,
                BatchRunRecord {
                    as_of_date,
                    provider,
                    status,
                    error: None,
                    tickers_requested: tickers.len() as i64,
                    tickers_succeeded: result.features.len() as i64,
                    failure_counts,
                },
            )
            .await?;

            tracing::info!(%as_of_date, %run_id, upserted, status, "persisted feature batch");
            Ok(())
        }
        Err(err) => {
            // Best-effort: record the errored run before propagating.
            let record = spreadreg_core::storage::company_features::record_batch_run(
                pool,
                BatchRunRecord {
                    as_of_date,
                    provider,
                    status: "error",
                    error: Some(&format!("{err:#}")),
                    tickers_requested: tickers.len() as i64,
                    tickers_succeeded: result.features.len() as i64,
                    failure_counts,
                },
            )
            .await;
            if let Err(record_err) = record {
                tracing::warn!(error = %record_err, "failed to record errored batch run");
            }
            Err(err)
        }
    }
}

fn init_sentry(settings: &spreadreg_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
