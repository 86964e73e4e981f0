use crate::domain::features::FeatureRecord;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

pub async fn upsert_daily_features_atomic(
    pool: &sqlx::PgPool,
    as_of_date: NaiveDate,
    features: &BTreeMap<String, FeatureRecord>,
) -> anyhow::Result<u64> {
    anyhow::ensure!(!features.is_empty(), "features must be non-empty");

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    // Batch the upsert to reduce round trips (critical for CI runners / remote DB).
    // Keep it transactional.
    let mut affected: u64 = 0;
    let chunk_size: usize = std::env::var("FEATURES_UPSERT_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(200);

    anyhow::ensure!(chunk_size >= 1, "FEATURES_UPSERT_BATCH must be >= 1");

    let rows: Vec<(&String, &FeatureRecord)> = features.iter().collect();
    let mut batch_idx: usize = 0;
    for chunk in rows.chunks(chunk_size) {
        batch_idx += 1;
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO company_features_daily (as_of_date, ticker, features) ",
        );
        qb.push_values(chunk, |mut b, (ticker, record)| {
            // All eight values are finite by construction, so serialization cannot fail.
            let features_json =
                serde_json::to_value(record).expect("features serialize failed");
            b.push_bind(as_of_date)
                .push_bind(ticker.trim())
                .push_bind(features_json);
        });
        qb.push(
            " ON CONFLICT (as_of_date, ticker) DO UPDATE \
               SET features = EXCLUDED.features, updated_at = now()",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch upsert company_features_daily failed")?;
        affected += res.rows_affected();

        tracing::debug!(
            %as_of_date,
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "company_features_daily batch upsert"
        );
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

/// Audit row for one batch run. `status` is "success", "partial", or "error".
#[derive(Debug)]
pub struct BatchRunRecord<'a> {
    pub as_of_date: NaiveDate,
    pub provider: &'a str,
    pub status: &'a str,
    pub error: Option<&'a str>,
    pub tickers_requested: i64,
    pub tickers_succeeded: i64,
    pub failure_counts: Option<serde_json::Value>,
}

pub async fn record_batch_run(
    pool: &sqlx::PgPool,
    record: BatchRunRecord<'_>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO feature_batch_runs \
           (id, as_of_date, generated_at, provider, status, error, tickers_requested, tickers_succeeded, failure_counts) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .persistent(false)
    .bind(id)
    .bind(record.as_of_date)
    .bind(generated_at)
    .bind(record.provider)
    .bind(record.status)
    .bind(record.error)
    .bind(record.tickers_requested)
    .bind(record.tickers_succeeded)
    .bind(record.failure_counts)
    .execute(pool)
    .await
    .context("insert feature_batch_runs failed")?;

    Ok(id)
}
