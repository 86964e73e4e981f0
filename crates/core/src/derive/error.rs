use thiserror::Error;

/// A violated precondition, carrying the raw value(s) involved.
///
/// Messages follow the vocabulary of the upstream dataset notes ("negative cash",
/// "zero EV"), so a log line reads like the precondition it names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureKind {
    #[error("negative or zero revenues: {0}")]
    NonPositiveRevenue(f64),
    #[error("negative cash: {0}")]
    NegativeCash(f64),
    #[error("zero EV (division by zero)")]
    ZeroEnterpriseValue,
    #[error("negative 3-month volume: {0}")]
    NegativeVolume(f64),
    #[error("negative 200-day average price: {0}")]
    NegativePrice(f64),
    #[error("negative debt: {0}")]
    NegativeDebt(f64),
    #[error("negative or zero price (division by zero): {0}")]
    NonPositivePrice(f64),
    #[error("negative bid: {0}")]
    NegativeBid(f64),
    #[error("negative or zero ask: {0}")]
    NonPositiveAsk(f64),
    #[error("crossed or equal quote: bid {bid}, ask {ask}")]
    CrossedOrEqualQuote { bid: f64, ask: f64 },
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl FailureKind {
    /// Counting key for the batch frequency report. The offending values are stripped
    /// so the same precondition violated by different tickers lands in one bucket.
    pub fn bucket(&self) -> String {
        match self {
            FailureKind::NonPositiveRevenue(_) => "negative or zero revenues".to_string(),
            FailureKind::NegativeCash(_) => "negative cash".to_string(),
            FailureKind::ZeroEnterpriseValue => "zero EV (division by zero)".to_string(),
            FailureKind::NegativeVolume(_) => "negative 3-month volume".to_string(),
            FailureKind::NegativePrice(_) => "negative 200-day average price".to_string(),
            FailureKind::NegativeDebt(_) => "negative debt".to_string(),
            FailureKind::NonPositivePrice(_) => {
                "negative or zero price (division by zero)".to_string()
            }
            FailureKind::NegativeBid(_) => "negative bid".to_string(),
            FailureKind::NonPositiveAsk(_) => "negative or zero ask".to_string(),
            FailureKind::CrossedOrEqualQuote { .. } => "crossed or equal quote".to_string(),
            FailureKind::MissingField(field) => format!("missing field: {field}"),
        }
    }
}

/// Feature derivation failed for one company. Terminal for that ticker in the current
/// run; never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{ticker}: {kind}")]
pub struct DerivationFailure {
    pub ticker: String,
    pub kind: FailureKind,
}
