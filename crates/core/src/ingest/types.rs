use serde::{Deserialize, Serialize};

/// Raw per-company metrics as the data provider reports them. Field names follow the
/// provider's wire format; any field may legitimately be absent for a real ticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    #[serde(default)]
    pub total_revenue: Option<f64>,
    #[serde(default)]
    pub profit_margins: Option<f64>,
    #[serde(default)]
    pub enterprise_value: Option<f64>,
    #[serde(default)]
    pub total_cash: Option<f64>,
    #[serde(default)]
    pub average_daily_volume_3_month: Option<f64>,
    #[serde(default)]
    pub two_hundred_day_average: Option<f64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub total_debt: Option<f64>,
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub return_on_assets: Option<f64>,
}

/// One provider response: the requested ticker echoed back, with the metric fields
/// flattened alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMetricsResponse {
    pub ticker: String,
    #[serde(flatten)]
    pub metrics: RawMetrics,
}
