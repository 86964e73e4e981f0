use crate::derive;
use crate::derive::error::DerivationFailure;
use crate::domain::features::FeatureRecord;
use crate::ingest::provider::MetricsProvider;
use std::collections::BTreeMap;
use std::time::Duration;

/// Why one ticker is absent from the success map.
#[derive(Debug)]
pub enum BatchFailure {
    /// The external provider could not produce raw metrics. The error is opaque here;
    /// a timeout, an HTTP error, and a rate-limit rejection all land in this arm.
    Fetch {
        ticker: String,
        error: anyhow::Error,
    },
    Derivation(DerivationFailure),
}

impl BatchFailure {
    pub fn ticker(&self) -> &str {
        match self {
            BatchFailure::Fetch { ticker, .. } => ticker,
            BatchFailure::Derivation(failure) => &failure.ticker,
        }
    }

    /// Counting key for the frequency report: one bucket per violated precondition,
    /// one shared bucket for all fetch errors.
    pub fn bucket(&self) -> String {
        match self {
            BatchFailure::Fetch { .. } => "fetch failure".to_string(),
            BatchFailure::Derivation(failure) => failure.kind.bucket(),
        }
    }
}

/// Outcome of one batch run. Every requested ticker appears in exactly one of
/// `features` and `failures`, never both, never neither.
#[derive(Debug)]
pub struct BatchResult {
    /// Successful rows keyed by ticker.
    pub features: BTreeMap<String, FeatureRecord>,
    /// Per-ticker failure records, in input order.
    pub failures: Vec<BatchFailure>,
    /// Normalized failure kind to occurrence count across the whole run.
    pub failure_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pause between provider calls. Real rate limiting belongs to the provider; this
    /// only keeps a large batch polite.
    pub req_delay: Duration,

    /// Emit a progress line for the first, last, and every Nth ticker. 0 disables.
    pub progress_every: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            req_delay: Duration::from_millis(150),
            progress_every: 200,
        }
    }
}

impl BatchOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("BATCH_REQ_DELAY_MS") {
            if let Ok(n) = s.parse::<u64>() {
                out.req_delay = Duration::from_millis(n);
            }
        }

        if let Ok(s) = std::env::var("BATCH_PROGRESS_EVERY") {
            if let Ok(n) = s.parse::<usize>() {
                out.progress_every = n;
            }
        }

        out
    }
}

pub struct BatchProcessor<P> {
    provider: P,
    opts: BatchOptions,
}

impl<P: MetricsProvider> BatchProcessor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            opts: BatchOptions::default(),
        }
    }

    pub fn with_options(provider: P, opts: BatchOptions) -> Self {
        Self { provider, opts }
    }

    /// Runs every ticker through fetch-then-derive. Tickers are processed
    /// independently: one ticker's fetch or derivation failure is recorded and the
    /// loop moves on. The batch itself never fails.
    pub async fn process_batch(&self, tickers: &[String]) -> BatchResult {
        let mut features = BTreeMap::new();
        let mut failures: Vec<BatchFailure> = Vec::new();
        let total = tickers.len();

        for (idx, ticker) in tickers.iter().enumerate() {
            if idx != 0 && !self.opts.req_delay.is_zero() {
                tokio::time::sleep(self.opts.req_delay).await;
            }

            match self.provider.fetch_raw_metrics(ticker).await {
                Ok(raw) => match derive::derive_features(&raw, ticker) {
                    Ok(record) => {
                        features.insert(ticker.clone(), record);
                    }
                    Err(failure) => {
                        tracing::warn!(
                            idx,
                            ticker = %ticker,
                            error = %failure,
                            "feature derivation failed; skipping ticker"
                        );
                        failures.push(BatchFailure::Derivation(failure));
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        idx,
                        ticker = %ticker,
                        error = %error,
                        "metrics fetch failed; skipping ticker"
                    );
                    failures.push(BatchFailure::Fetch {
                        ticker: ticker.clone(),
                        error,
                    });
                }
            }

            if self.opts.progress_every != 0 {
                let n = idx + 1;
                if n == 1 || n == total || n % self.opts.progress_every == 0 {
                    tracing::info!(
                        processed = n,
                        total,
                        succeeded = features.len(),
                        failed = failures.len(),
                        provider = self.provider.provider_name(),
                        "batch progress"
                    );
                }
            }
        }

        let failure_counts = failure_frequencies(&failures);
        BatchResult {
            features,
            failures,
            failure_counts,
        }
    }
}

/// Occurrences per normalized failure kind across one run.
pub fn failure_frequencies(failures: &[BatchFailure]) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for failure in failures {
        *out.entry(failure.bucket()).or_insert(0) += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RawMetrics;

    struct StaticProvider {
        metrics: BTreeMap<String, RawMetrics>,
    }

    #[async_trait::async_trait]
    impl MetricsProvider for StaticProvider {
        fn provider_name(&self) -> &'static str {
            "static_test"
        }

        async fn fetch_raw_metrics(&self, ticker: &str) -> anyhow::Result<RawMetrics> {
            self.metrics
                .get(ticker)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no data exists for {ticker}"))
        }
    }

    fn valid_metrics() -> RawMetrics {
        RawMetrics {
            total_revenue: Some(100_000.0),
            profit_margins: Some(0.1),
            enterprise_value: Some(500_000.0),
            total_cash: Some(50_000.0),
            average_daily_volume_3_month: Some(1_000.0),
            two_hundred_day_average: Some(10.0),
            bid: Some(1.0),
            ask: Some(1.2),
            current_price: Some(1.1),
            total_debt: Some(20_000.0),
            revenue_growth: Some(0.05),
            return_on_assets: Some(0.03),
        }
    }

    fn no_delay(provider: StaticProvider) -> BatchProcessor<StaticProvider> {
        BatchProcessor::with_options(
            provider,
            BatchOptions {
                req_delay: Duration::ZERO,
                progress_every: 0,
            },
        )
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn every_ticker_lands_in_exactly_one_bucket() {
        let mut metrics = BTreeMap::new();
        metrics.insert("AAPL".to_string(), valid_metrics());
        let mut zero_ev = valid_metrics();
        zero_ev.enterprise_value = Some(0.0);
        metrics.insert("TSLA".to_string(), zero_ev);
        // "GONE" is absent from the provider, so its fetch fails.

        let input = tickers(&["AAPL", "TSLA", "GONE"]);
        let result = no_delay(StaticProvider { metrics }).process_batch(&input).await;

        assert_eq!(result.features.len() + result.failures.len(), input.len());
        for ticker in &input {
            let succeeded = result.features.contains_key(ticker);
            let failed = result.failures.iter().any(|f| f.ticker() == ticker);
            assert!(succeeded != failed, "{ticker} must land in exactly one bucket");
        }
    }

    #[tokio::test]
    async fn zero_enterprise_value_is_counted_once() {
        let mut metrics = BTreeMap::new();
        metrics.insert("AAPL".to_string(), valid_metrics());
        metrics.insert("BRK-B".to_string(), valid_metrics());
        let mut zero_ev = valid_metrics();
        zero_ev.enterprise_value = Some(0.0);
        metrics.insert("TSLA".to_string(), zero_ev);

        let input = tickers(&["AAPL", "BRK-B", "TSLA"]);
        let result = no_delay(StaticProvider { metrics }).process_batch(&input).await;

        assert_eq!(result.features.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(
            result.failure_counts.get("zero EV (division by zero)"),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn same_precondition_shares_a_bucket_across_tickers() {
        let mut metrics = BTreeMap::new();
        let mut a = valid_metrics();
        a.total_cash = Some(-1.0);
        metrics.insert("AAA".to_string(), a);
        let mut b = valid_metrics();
        b.total_cash = Some(-250_000.0);
        metrics.insert("BBB".to_string(), b);

        let input = tickers(&["AAA", "BBB"]);
        let result = no_delay(StaticProvider { metrics }).process_batch(&input).await;

        assert!(result.features.is_empty());
        assert_eq!(result.failure_counts.len(), 1);
        assert_eq!(result.failure_counts.get("negative cash"), Some(&2));
    }

    #[tokio::test]
    async fn fetch_errors_are_opaque_and_non_fatal() {
        let mut metrics = BTreeMap::new();
        metrics.insert("AAPL".to_string(), valid_metrics());

        let input = tickers(&["GONE", "AAPL"]);
        let result = no_delay(StaticProvider { metrics }).process_batch(&input).await;

        assert_eq!(result.features.len(), 1);
        assert!(result.features.contains_key("AAPL"));
        assert_eq!(result.failure_counts.get("fetch failure"), Some(&1));
        assert!(matches!(result.failures[0], BatchFailure::Fetch { .. }));
    }

    #[tokio::test]
    async fn failures_keep_input_order() {
        let metrics = BTreeMap::new();
        let input = tickers(&["CCC", "AAA", "BBB"]);
        let result = no_delay(StaticProvider { metrics }).process_batch(&input).await;

        let order: Vec<&str> = result.failures.iter().map(|f| f.ticker()).collect();
        assert_eq!(order, vec!["CCC", "AAA", "BBB"]);
    }
}
