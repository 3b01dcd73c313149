use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, warn};

use crate::execution::{ExecutionConfig, ExecutionSim, FillSnapshot};
use crate::indicators::atr_last;
use crate::manage::{ManageConfig, ManageEngine, ManageSnapshot, RecheckInput};
use crate::risk::{RiskConfig, RiskContext, RiskEngine};
use crate::signal::{EngineConfig, EvaluateOptions, SignalEngine};
use crate::types::{Candle, CandleSlice, CoinId, OrderType, PortfolioSnapshot, Side, Signal, Trade, TimeFrame, UserSettings};

use super::summary::{BacktestResult, BacktestSummary, EquityPoint, MetricsCalculator};

#[derive(Debug, Clone)]
pub struct CoinCandleSet {
    pub coin_id: CoinId,
    pub candles: BTreeMap<TimeFrame, Vec<Candle>>,
}

#[derive(Debug, Clone, Copy)]
pub struct BacktesterConfig {
    pub base_timeframe: TimeFrame,
    pub higher_timeframes: [TimeFrame; 3],
    pub warmup_bars: usize,
    pub btc_reanalysis_interval: u64,
    pub coin_batch_size: usize,
    pub per_coin_timeout_secs: u64,
}

impl Default for BacktesterConfig {
    fn default() -> Self {
        Self {
            base_timeframe: TimeFrame::H1,
            higher_timeframes: [TimeFrame::M15, TimeFrame::H4, TimeFrame::D1],
            warmup_bars: 100,
            btc_reanalysis_interval: 4,
            coin_batch_size: 3,
            per_coin_timeout_secs: 20,
        }
    }
}

/// Walks a single coin's candle history bar-by-bar, running the full
/// MarketData -> SignalEngine -> RiskEngine -> ExecutionSim pipeline for new entries and
/// ManageEngine for open positions. No I/O; operates entirely over pre-fetched candle sets.
pub struct Backtester {
    pub signal_engine: SignalEngine,
    pub risk_engine: RiskEngine,
    pub manage_engine: ManageEngine,
    pub execution_sim: ExecutionSim,
}

impl Default for Backtester {
    fn default() -> Self {
        Self {
            signal_engine: SignalEngine::new(EngineConfig::default()),
            risk_engine: RiskEngine::new(RiskConfig::default()),
            manage_engine: ManageEngine::new(ManageConfig::default()),
            execution_sim: ExecutionSim::new(ExecutionConfig::default()),
        }
    }
}

impl Backtester {
    pub fn new(signal_engine: SignalEngine, risk_engine: RiskEngine, manage_engine: ManageEngine, execution_sim: ExecutionSim) -> Self {
        Self { signal_engine, risk_engine, manage_engine, execution_sim }
    }

    pub fn run_backtest_for_coin(
        &self,
        candles: &CoinCandleSet,
        btc_candles: Option<&CoinCandleSet>,
        settings: &UserSettings,
        cfg: &BacktesterConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BacktestResult {
        let base = candles.candles.get(&cfg.base_timeframe).cloned().unwrap_or_default();
        if base.len() < 50 {
            return empty_result();
        }

        let trade_start_bar = base.iter().position(|c| c.open_time >= start).unwrap_or(base.len());
        let walk_start = trade_start_bar.max(50);

        let mut balance = settings.paper_balance;
        let mut open_trade: Option<Trade> = None;
        let mut equity_curve = Vec::new();
        let mut closed_trades = Vec::new();
        let mut btc_signal: Option<Signal> = None;
        let mut last_exit_time: Option<DateTime<Utc>> = None;
        let mut last_exit_direction: Option<Side> = None;

        for i in walk_start..base.len() {
            let bar = &base[i];
            if bar.open_time > end {
                break;
            }

            let slice = build_slice_at(candles, cfg, i);
            let atr = atr_last(&slice.highs(cfg.base_timeframe), &slice.lows(cfg.base_timeframe), &slice.closes(cfg.base_timeframe), 14);

            if let Some(btc) = btc_candles {
                if i % cfg.btc_reanalysis_interval as usize == 0 {
                    let btc_base = btc.candles.get(&cfg.base_timeframe).cloned().unwrap_or_default();
                    if let Some(btc_idx) = btc_base.iter().rposition(|c| c.open_time <= bar.open_time) {
                        let btc_slice = build_slice_at(btc, cfg, btc_idx);
                        if let Some(price) = btc_slice.last_close(cfg.base_timeframe) {
                            let decision = self.signal_engine.evaluate(
                                &btc_slice,
                                price,
                                &EvaluateOptions { bar_time: Some(bar.open_time), ..Default::default() },
                            );
                            btc_signal = Some(decision.signal);
                        }
                    }
                }
            }

            if let Some(trade) = open_trade.as_mut() {
                let before = trade.partial_pnl_accumulator;
                let recheck = if i % 4 == 0 {
                    let decision = self.signal_engine.evaluate(
                        &slice,
                        bar.close,
                        &EvaluateOptions { bar_time: Some(bar.open_time), btc_signal, ..Default::default() },
                    );
                    Some(RecheckInput { score: decision.score, signal: decision.signal })
                } else {
                    None
                };

                let snapshot = ManageSnapshot {
                    current_price: bar.close,
                    high: Some(bar.high),
                    low: Some(bar.low),
                    open: Some(bar.open),
                    recheck,
                    timestamp: bar.open_time,
                };
                self.manage_engine.update(trade, &snapshot);
                balance += trade.partial_pnl_accumulator - before;

                if trade.status != crate::types::TradeStatus::Open {
                    balance += trade.pnl.unwrap_or(Decimal::ZERO);
                    last_exit_time = trade.exit_time;
                    last_exit_direction = Some(trade.direction);
                    closed_trades.push(trade.clone());
                    open_trade = None;
                }
            } else {
                let decision = self.signal_engine.evaluate(
                    &slice,
                    bar.close,
                    &EvaluateOptions { bar_time: Some(bar.open_time), btc_signal, ..Default::default() },
                );
                if decision.side.is_some() {
                    let portfolio = PortfolioSnapshot {
                        timestamp: bar.open_time,
                        equity: balance,
                        available_balance: balance,
                        open_trades: vec![],
                        daily_start_equity: balance,
                    };
                    let ctx = RiskContext {
                        atr,
                        last_close_time: last_exit_time,
                        direction: last_exit_direction,
                        now: Some(bar.open_time),
                    };
                    if let Some(intent) = self.risk_engine.plan(&candles.coin_id, &decision, &portfolio, settings, &ctx) {
                        if let Some(next_bar) = base.get(i + 1) {
                            let fill_snapshot = FillSnapshot {
                                high: next_bar.high,
                                low: next_bar.low,
                                close: next_bar.close,
                                atr,
                                size_factor: dec!(1),
                            };
                            let mut market_order = intent.clone();
                            market_order.order_type = OrderType::Market;
                            let fill = self.execution_sim.execute(&market_order, next_bar.open, &fill_snapshot);
                            if fill.filled {
                                balance -= fill.fees;
                                open_trade = Some(Trade::open(
                                    candles.coin_id.clone(),
                                    intent.direction,
                                    fill.fill_price,
                                    intent.stop_loss,
                                    intent.take_profit_1,
                                    intent.take_profit_2,
                                    intent.take_profit_3,
                                    fill.fill_qty,
                                    intent.leverage,
                                    decision.score,
                                    decision.strategy,
                                    decision.regime,
                                    next_bar.open_time,
                                ));
                            }
                        }
                    }
                }
            }

            equity_curve.push(EquityPoint {
                at: bar.open_time,
                equity: balance + open_trade.as_ref().map(|t| t.unrealized_pnl(bar.close)).unwrap_or(Decimal::ZERO),
            });
        }

        if let Some(mut trade) = open_trade.take() {
            if let Some(last_bar) = base.last() {
                trade.close(last_bar.close, last_bar.open_time, "END");
                balance += trade.pnl.unwrap_or(Decimal::ZERO);
                closed_trades.push(trade);
            }
        }

        let summary = MetricsCalculator::calculate(&closed_trades, &equity_curve);
        BacktestResult { trades: closed_trades, equity_curve, summary }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateBacktestResult {
    pub per_coin: HashMap<CoinId, BacktestResult>,
    pub combined_summary: BacktestSummary,
}

/// Fans `run_backtest_for_coin` out across coins, bounded to `cfg.coin_batch_size` concurrent
/// workers via a semaphore, each with a `cfg.per_coin_timeout_secs` budget. BTC candles are
/// fetched once by the caller and shared by reference across every worker.
pub async fn run_backtest(
    backtester: Arc<Backtester>,
    coin_sets: Vec<CoinCandleSet>,
    btc_candles: Option<Arc<CoinCandleSet>>,
    settings: UserSettings,
    cfg: BacktesterConfig,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    initial_balance: Decimal,
) -> AggregateBacktestResult {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(cfg.coin_batch_size.max(1)));
    let mut handles = Vec::with_capacity(coin_sets.len());

    for coin_set in coin_sets {
        let semaphore = Arc::clone(&semaphore);
        let backtester = Arc::clone(&backtester);
        let btc_candles = btc_candles.clone();
        let settings = settings.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let coin_id = coin_set.coin_id.clone();

            let join = tokio::task::spawn_blocking(move || {
                backtester.run_backtest_for_coin(&coin_set, btc_candles.as_deref(), &settings, &cfg, start, end)
            });

            match tokio::time::timeout(StdDuration::from_secs(cfg.per_coin_timeout_secs), join).await {
                Ok(Ok(result)) => Some((coin_id, result)),
                Ok(Err(e)) => {
                    error!("backtest worker panicked for {}: {}", coin_id, e);
                    None
                }
                Err(_) => {
                    warn!("backtest for {} exceeded its {}s budget", coin_id, cfg.per_coin_timeout_secs);
                    None
                }
            }
        }));
    }

    let mut per_coin = HashMap::with_capacity(handles.len());
    for handle in handles {
        if let Ok(Some((coin_id, result))) = handle.await {
            per_coin.insert(coin_id, result);
        }
    }

    let combined_summary = combine_summaries(&per_coin, initial_balance);
    AggregateBacktestResult { per_coin, combined_summary }
}

/// Merges every coin's closed trades onto one timeline rebased to `initial_balance`, so the
/// aggregate summary reads as a single portfolio rather than per-coin-isolated ledgers.
fn combine_summaries(per_coin: &HashMap<CoinId, BacktestResult>, initial_balance: Decimal) -> BacktestSummary {
    let mut all_trades: Vec<Trade> = per_coin.values().flat_map(|r| r.trades.clone()).collect();
    all_trades.sort_by_key(|t| t.exit_time.unwrap_or(t.opened_at));

    let mut balance = initial_balance;
    let mut equity_curve = Vec::with_capacity(all_trades.len());
    for trade in &all_trades {
        balance += trade.pnl.unwrap_or(Decimal::ZERO);
        equity_curve.push(EquityPoint { at: trade.exit_time.unwrap_or(trade.opened_at), equity: balance });
    }

    MetricsCalculator::calculate(&all_trades, &equity_curve)
}

fn build_slice_at(candles: &CoinCandleSet, cfg: &BacktesterConfig, base_index: usize) -> CandleSlice {
    let mut by_timeframe = BTreeMap::new();
    let base = candles.candles.get(&cfg.base_timeframe).cloned().unwrap_or_default();
    let now = base.get(base_index).map(|c| c.open_time).unwrap_or_else(Utc::now);

    by_timeframe.insert(cfg.base_timeframe, base[..=base_index].to_vec());

    for tf in cfg.higher_timeframes.iter() {
        if let Some(series) = candles.candles.get(tf) {
            let closed: Vec<Candle> = series
                .iter()
                .filter(|c| c.open_time + chrono::Duration::minutes(tf.to_minutes() as i64) <= now)
                .cloned()
                .collect();
            if !closed.is_empty() {
                by_timeframe.insert(*tf, closed);
            }
        }
    }

    CandleSlice { by_timeframe }
}

fn empty_result() -> BacktestResult {
    BacktestResult {
        trades: vec![],
        equity_curve: vec![],
        summary: MetricsCalculator::calculate(&[], &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decision;

    fn flat_candles(n: usize, tf: TimeFrame, start: DateTime<Utc>) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                timeframe: tf,
                open_time: start + chrono::Duration::minutes(tf.to_minutes() as i64 * i as i64),
                open: dec!(100),
                high: dec!(101),
                low: dec!(99),
                close: dec!(100),
                volume: dec!(10),
            })
            .collect()
    }

    #[test]
    fn flat_market_produces_no_trades() {
        let start = Utc::now() - chrono::Duration::days(10);
        let mut map = BTreeMap::new();
        map.insert(TimeFrame::H1, flat_candles(200, TimeFrame::H1, start));
        let candles = CoinCandleSet { coin_id: CoinId::new("bitcoin"), candles: map };

        let backtester = Backtester::default();
        let result = backtester.run_backtest_for_coin(
            &candles,
            None,
            &UserSettings::default(),
            &BacktesterConfig::default(),
            start,
            start + chrono::Duration::days(9),
        );
        assert_eq!(result.summary.total_trades, 0);
    }

    #[test]
    fn empty_candles_yield_empty_result() {
        let candles = CoinCandleSet { coin_id: CoinId::new("bitcoin"), candles: BTreeMap::new() };
        let backtester = Backtester::default();
        let result = backtester.run_backtest_for_coin(
            &candles,
            None,
            &UserSettings::default(),
            &BacktesterConfig::default(),
            Utc::now(),
            Utc::now(),
        );
        assert_eq!(result.trades.len(), 0);
        let _ = Decision::hold(dec!(0), vec![]);
    }
}
