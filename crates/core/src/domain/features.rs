use serde::{Deserialize, Serialize};

/// One regression-ready row for a single company. Field order is the dataset's column
/// order; the serialized keys are the column headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Log Revenues")]
    pub log_revenues: f64,
    #[serde(rename = "DERN")]
    pub dern: f64,
    #[serde(rename = "Cash-to-EV")]
    pub cash_to_ev: f64,
    #[serde(rename = "Volume-to-EV")]
    pub volume_to_ev: f64,
    #[serde(rename = "Debt-to-EV")]
    pub debt_to_ev: f64,
    #[serde(rename = "Revenue Growth")]
    pub revenue_growth: f64,
    #[serde(rename = "Return on Assets")]
    pub return_on_assets: f64,
    #[serde(rename = "Bid-Ask Spread")]
    pub bid_ask_spread: f64,
}

impl FeatureRecord {
    /// The regression's dependent variable.
    pub const DEPENDENT_VARIABLE: &'static str = "Bid-Ask Spread";

    pub const COLUMNS: [&'static str; 8] = [
        "Log Revenues",
        "DERN",
        "Cash-to-EV",
        "Volume-to-EV",
        "Debt-to-EV",
        "Revenue Growth",
        "Return on Assets",
        Self::DEPENDENT_VARIABLE,
    ];

    /// Column-name/value pairs in dataset column order.
    pub fn named(&self) -> [(&'static str, f64); 8] {
        [
            (Self::COLUMNS[0], self.log_revenues),
            (Self::COLUMNS[1], self.dern),
            (Self::COLUMNS[2], self.cash_to_ev),
            (Self::COLUMNS[3], self.volume_to_ev),
            (Self::COLUMNS[4], self.debt_to_ev),
            (Self::COLUMNS[5], self.revenue_growth),
            (Self::COLUMNS[6], self.return_on_assets),
            (Self::COLUMNS[7], self.bid_ask_spread),
        ]
    }
}
