use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::engine::{Backtester, BacktesterConfig, CoinCandleSet};
use super::summary::BacktestResult;
use crate::types::UserSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub window_num: usize,
    pub is_start: DateTime<Utc>,
    pub is_end: DateTime<Utc>,
    pub oos_start: DateTime<Utc>,
    pub oos_end: DateTime<Utc>,
    pub is_result: BacktestResult,
    pub oos_result: BacktestResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowResult>,
    pub aggregate_oos_return_pct: Decimal,
    pub aggregate_oos_sharpe: Decimal,
}

/// Splits a date range into `window_count` contiguous windows, each further split into an
/// in-sample slice (primes warmup state; the pipeline has no parameters to fit) and an
/// out-of-sample slice whose trades count toward the aggregate. Additive tooling around
/// `Backtester::run_backtest_for_coin`; does not alter the per-bar algorithm.
pub fn run_walk_forward(
    backtester: &Backtester,
    candles: &CoinCandleSet,
    btc_candles: Option<&CoinCandleSet>,
    settings: &UserSettings,
    cfg: &BacktesterConfig,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_count: usize,
    oos_pct: Decimal,
) -> WalkForwardResult {
    let total_span = end - start;
    let window_span = total_span / window_count as i32;

    let mut windows = Vec::with_capacity(window_count);
    let mut oos_returns = Vec::new();
    let mut oos_sharpes = Vec::new();

    for i in 0..window_count {
        let window_start = start + window_span * i as i32;
        let window_end = if i + 1 == window_count { end } else { window_start + window_span };
        let oos_span_secs = (window_end - window_start).num_seconds() as f64 * oos_pct.to_f64().unwrap_or(0.25);
        let oos_start = window_end - chrono::Duration::seconds(oos_span_secs as i64);

        let is_result = backtester.run_backtest_for_coin(candles, btc_candles, settings, cfg, window_start, oos_start);
        let oos_result = backtester.run_backtest_for_coin(candles, btc_candles, settings, cfg, oos_start, window_end);

        oos_returns.push(oos_result.summary.total_pnl);
        oos_sharpes.push(oos_result.summary.sharpe_ratio);

        windows.push(WindowResult {
            window_num: i + 1,
            is_start: window_start,
            is_end: oos_start,
            oos_start,
            oos_end: window_end,
            is_result,
            oos_result,
        });
    }

    let aggregate_oos_return_pct = if !oos_returns.is_empty() {
        oos_returns.iter().sum::<Decimal>() / Decimal::from(oos_returns.len())
    } else {
        Decimal::ZERO
    };
    let aggregate_oos_sharpe = if !oos_sharpes.is_empty() {
        oos_sharpes.iter().sum::<Decimal>() / Decimal::from(oos_sharpes.len())
    } else {
        Decimal::ZERO
    };

    WalkForwardResult { windows, aggregate_oos_return_pct, aggregate_oos_sharpe }
}
