use crate::derive::error::{DerivationFailure, FailureKind};
use crate::domain::features::FeatureRecord;
use crate::ingest::types::RawMetrics;

pub mod error;

/// Derives the full feature row for one company from its raw metrics.
///
/// Pure and deterministic: no I/O, no shared state, identical input yields
/// bit-identical output. Features are checked in a fixed order and derivation stops at
/// the first violated precondition, so a ticker with several bad fields always reports
/// the same failure. The ticker is only attached for reporting; it never enters a
/// computation.
pub fn derive_features(raw: &RawMetrics, ticker: &str) -> Result<FeatureRecord, DerivationFailure> {
    let fail = |kind: FailureKind| DerivationFailure {
        ticker: ticker.to_string(),
        kind,
    };

    // Natural log of TTM revenues.
    let revenues = require("totalRevenue", raw.total_revenue).map_err(fail)?;
    let log_revenues = ln_revenues(revenues).map_err(fail)?;

    // DERN: dummy var for non-negative earnings.
    let profit_margins = require("profitMargins", raw.profit_margins).map_err(fail)?;
    let dern = dern(profit_margins);

    // Firm value proxied by enterprise value; denominator for the three ratios below.
    let cash = require("totalCash", raw.total_cash).map_err(fail)?;
    let enterprise_value = require("enterpriseValue", raw.enterprise_value).map_err(fail)?;
    let cash_to_ev = cash_to_ev(cash, enterprise_value).map_err(fail)?;

    let volume_3m = require("averageDailyVolume3Month", raw.average_daily_volume_3_month)
        .map_err(fail)?;
    let price_200d = require("twoHundredDayAverage", raw.two_hundred_day_average).map_err(fail)?;
    let volume_to_ev = volume_to_ev(volume_3m, price_200d, enterprise_value).map_err(fail)?;

    let debt = require("totalDebt", raw.total_debt).map_err(fail)?;
    let debt_to_ev = debt_to_ev(debt, enterprise_value).map_err(fail)?;

    // Bid-ask spread as a fraction of price, the dependent variable.
    let bid = require("bid", raw.bid).map_err(fail)?;
    let ask = require("ask", raw.ask).map_err(fail)?;
    let price = require("currentPrice", raw.current_price).map_err(fail)?;
    let bid_ask_spread = bid_ask_spread(bid, ask, price).map_err(fail)?;

    let revenue_growth = require("revenueGrowth", raw.revenue_growth).map_err(fail)?;
    let return_on_assets = require("returnOnAssets", raw.return_on_assets).map_err(fail)?;

    Ok(FeatureRecord {
        log_revenues,
        dern,
        cash_to_ev,
        volume_to_ev,
        debt_to_ev,
        revenue_growth,
        return_on_assets,
        bid_ask_spread,
    })
}

/// Growth rate between two EPS figures. Not part of the default feature set.
///
/// Piecewise so a zero base never divides: no change reports 0, a change off a zero
/// base reports ±1 (±100%), and otherwise the signed percent change off |current|.
pub fn eps_growth_estimate(current: f64, forward: f64) -> f64 {
    let change = forward - current;
    if change == 0.0 {
        return 0.0;
    }
    if current == 0.0 {
        return change.signum();
    }
    change / current.abs()
}

// Provider payloads arrive as JSON, which cannot carry NaN or infinities; a present
// but non-finite value can only come from a caller constructing RawMetrics directly.
// Both read as the field being absent.
fn require(field: &'static str, value: Option<f64>) -> Result<f64, FailureKind> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(FailureKind::MissingField(field)),
    }
}

fn ln_revenues(revenues: f64) -> Result<f64, FailureKind> {
    if revenues <= 0.0 {
        return Err(FailureKind::NonPositiveRevenue(revenues));
    }
    Ok(revenues.ln())
}

fn dern(profit_margins: f64) -> f64 {
    if profit_margins >= 0.0 {
        1.0
    } else {
        0.0
    }
}

fn cash_to_ev(cash: f64, ev: f64) -> Result<f64, FailureKind> {
    if cash < 0.0 {
        return Err(FailureKind::NegativeCash(cash));
    }
    if ev == 0.0 {
        return Err(FailureKind::ZeroEnterpriseValue);
    }
    Ok(cash / ev)
}

fn volume_to_ev(volume_3m: f64, price_200d: f64, ev: f64) -> Result<f64, FailureKind> {
    if volume_3m < 0.0 {
        return Err(FailureKind::NegativeVolume(volume_3m));
    }
    if price_200d < 0.0 {
        return Err(FailureKind::NegativePrice(price_200d));
    }
    if ev == 0.0 {
        return Err(FailureKind::ZeroEnterpriseValue);
    }
    // Dollar monthly volume is the 200-day average price times the 3-month average
    // volume; divided by 3 to land on one month.
    Ok((volume_3m * price_200d) / (3.0 * ev))
}

fn debt_to_ev(debt: f64, ev: f64) -> Result<f64, FailureKind> {
    if debt < 0.0 {
        return Err(FailureKind::NegativeDebt(debt));
    }
    if ev == 0.0 {
        return Err(FailureKind::ZeroEnterpriseValue);
    }
    Ok(debt / ev)
}

fn bid_ask_spread(bid: f64, ask: f64, price: f64) -> Result<f64, FailureKind> {
    if price <= 0.0 {
        return Err(FailureKind::NonPositivePrice(price));
    }
    if bid < 0.0 {
        return Err(FailureKind::NegativeBid(bid));
    }
    if ask <= 0.0 {
        return Err(FailureKind::NonPositiveAsk(ask));
    }
    if ask <= bid {
        return Err(FailureKind::CrossedOrEqualQuote { bid, ask });
    }
    Ok((ask - bid) / price)
}
