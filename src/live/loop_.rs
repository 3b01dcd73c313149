use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::execution::{ExecutionSim, FillSnapshot};
use crate::indicators::atr_last;
use crate::manage::{ManageAction, ManageEngine, ManageSnapshot, RecheckInput};
use crate::marketdata::MarketDataService;
use crate::notifications::{self, NotificationManager};
use crate::persistence::{TradeMutation, TradeRepository, UserRepository, UserStatsDelta};
use crate::risk::{can_open_trade, GateDecision, PortfolioControlsConfig, RiskContext, RiskEngine};
use crate::signal::{EvaluateOptions, SignalEngine};
use crate::types::{CandleSlice, CoinId, CoinMeta, Decision, OrderType, PortfolioSnapshot, Signal, TimeFrame, Trade, TradeStatus};

use super::controller::BotController;

#[derive(Debug, Clone, Copy)]
pub struct LiveLoopConfig {
    /// Full signal/entry/score-recheck cycle cadence.
    pub tick_interval: StdDuration,
    /// Price-only stop/TP check cadence, meant to track the quote refresh rate.
    pub fast_tick_interval: StdDuration,
}

impl Default for LiveLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_secs(300),
            fast_tick_interval: StdDuration::from_secs(15),
        }
    }
}

/// Drives the live/paper trading cycle: a slow tick runs the full
/// MarketData -> SignalEngine -> RiskEngine -> ExecutionSim pipeline for new entries and the
/// score-recheck branch of ManageEngine for open trades; a fast tick runs only the price-based
/// branches of ManageEngine (stop loss, trailing, take profit) for every open trade. Paused bots
/// keep running both ticks' management branches, per `BotController::should_manage_positions`.
pub struct LiveLoop {
    pub config: LiveLoopConfig,
    pub user_id: String,
    pub universe: Vec<CoinMeta>,
    pub btc_coin_id: Option<CoinId>,
    pub market_data: Arc<MarketDataService>,
    pub trades: Arc<dyn TradeRepository>,
    pub users: Arc<dyn UserRepository>,
    pub signal_engine: SignalEngine,
    pub risk_engine: RiskEngine,
    pub manage_engine: ManageEngine,
    pub execution_sim: ExecutionSim,
    pub controls_config: PortfolioControlsConfig,
    pub controller: Arc<BotController>,
    pub notifications: Arc<NotificationManager>,
    tick_guard: tokio::sync::Mutex<()>,
}

impl LiveLoop {
    pub fn new(
        config: LiveLoopConfig,
        user_id: String,
        universe: Vec<CoinMeta>,
        btc_coin_id: Option<CoinId>,
        market_data: Arc<MarketDataService>,
        trades: Arc<dyn TradeRepository>,
        users: Arc<dyn UserRepository>,
        signal_engine: SignalEngine,
        risk_engine: RiskEngine,
        manage_engine: ManageEngine,
        execution_sim: ExecutionSim,
        controls_config: PortfolioControlsConfig,
        controller: Arc<BotController>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            config,
            user_id,
            universe,
            btc_coin_id,
            market_data,
            trades,
            users,
            signal_engine,
            risk_engine,
            manage_engine,
            execution_sim,
            controls_config,
            controller,
            notifications,
            tick_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut slow = tokio::time::interval(self.config.tick_interval);
        let mut fast = tokio::time::interval(self.config.fast_tick_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("live loop shutting down");
                        return;
                    }
                }
                _ = fast.tick() => {
                    match self.tick_guard.try_lock() {
                        Ok(_guard) => self.fast_tick().await,
                        Err(_) => warn!("previous tick still running, skipping fast tick"),
                    }
                }
                _ = slow.tick() => {
                    match self.tick_guard.try_lock() {
                        Ok(_guard) => self.slow_tick().await,
                        Err(_) => warn!("previous tick still running, skipping slow tick"),
                    }
                }
            }
        }
    }

    /// Price-only pass: stop loss, trailing stop, break-even, lock-in and TP hits, no score
    /// recheck and no new entries.
    pub async fn fast_tick(&self) {
        if !self.controller.should_manage_positions() {
            return;
        }
        let open_trades = match self.trades.find_open_trades(&self.user_id).await {
            Ok(t) => t,
            Err(e) => {
                error!("failed to load open trades: {}", e);
                return;
            }
        };

        for trade in open_trades {
            let Some(quote) = self.market_data.get_quote(&trade.coin_id).await else {
                continue;
            };
            let mut updated = trade.clone();
            let snapshot = ManageSnapshot {
                current_price: quote.price_usd,
                high: None,
                low: None,
                open: None,
                recheck: None,
                timestamp: Utc::now(),
            };
            let actions = self.manage_engine.update(&mut updated, &snapshot);
            if actions.is_empty() {
                continue;
            }
            if let Err(e) = self.persist_manage_result(&trade, &updated).await {
                error!("failed to persist management actions for {}: {}", trade.id, e);
            }
            self.notify_manage_actions(&updated, &actions).await;
        }
    }

    /// Full pass: re-evaluate every tracked coin, run the score-recheck branch of ManageEngine
    /// for coins with an open trade, and attempt new entries for flat coins.
    pub async fn slow_tick(&self) {
        let open_trades = match self.trades.find_open_trades(&self.user_id).await {
            Ok(t) => t,
            Err(e) => {
                error!("failed to load open trades: {}", e);
                return;
            }
        };
        let mut open_by_coin: BTreeMap<CoinId, Trade> = BTreeMap::new();
        for trade in open_trades {
            open_by_coin.insert(trade.coin_id.clone(), trade);
        }

        let btc_signal = match &self.btc_coin_id {
            Some(id) => self.evaluate_coin(id, None).await.map(|d| d.signal),
            None => None,
        };

        for meta in self.universe.clone() {
            let Some(decision) = self.evaluate_coin(&meta.coin_id, btc_signal).await else {
                continue;
            };

            if let Some(trade) = open_by_coin.get(&meta.coin_id) {
                self.recheck_open_trade(trade, &decision).await;
                continue;
            }

            if self.controller.should_process_signals() {
                self.try_open_trade(&meta.coin_id, &decision).await;
            }
        }
    }

    async fn evaluate_coin(&self, coin_id: &CoinId, btc_signal: Option<Signal>) -> Option<Decision> {
        let quote = self.market_data.get_quote(coin_id).await?;
        let by_timeframe = self.market_data.get_candles(coin_id).await?;
        let slice = CandleSlice { by_timeframe };
        Some(self.signal_engine.evaluate(
            &slice,
            quote.price_usd,
            &EvaluateOptions { bar_time: Some(Utc::now()), btc_signal, ..Default::default() },
        ))
    }

    async fn recheck_open_trade(&self, trade: &Trade, decision: &Decision) {
        if !self.controller.should_manage_positions() {
            return;
        }
        let Some(quote) = self.market_data.get_quote(&trade.coin_id).await else {
            return;
        };
        let candles = self.market_data.get_candles(&trade.coin_id).await;
        let last_bar = candles.as_ref().and_then(|c| c.get(&TimeFrame::H1)).and_then(|v| v.last());

        let mut updated = trade.clone();
        let snapshot = ManageSnapshot {
            current_price: quote.price_usd,
            high: last_bar.map(|c| c.high),
            low: last_bar.map(|c| c.low),
            open: last_bar.map(|c| c.open),
            recheck: Some(RecheckInput { score: decision.score, signal: decision.signal }),
            timestamp: Utc::now(),
        };
        let actions = self.manage_engine.update(&mut updated, &snapshot);
        if actions.is_empty() {
            return;
        }
        if let Err(e) = self.persist_manage_result(trade, &updated).await {
            error!("failed to persist score recheck for {}: {}", trade.id, e);
        }
        self.notify_manage_actions(&updated, &actions).await;
    }

    async fn try_open_trade(&self, coin_id: &CoinId, decision: &Decision) {
        if decision.side.is_none() {
            return;
        }
        let Ok(user) = self.users.find_user(&self.user_id).await else {
            return;
        };
        let Ok(open_trades) = self.trades.find_open_trades(&self.user_id).await else {
            return;
        };

        let portfolio = PortfolioSnapshot {
            timestamp: Utc::now(),
            equity: user.balance,
            available_balance: user.balance,
            open_trades,
            daily_start_equity: user.balance,
        };

        match can_open_trade(coin_id, &portfolio, false, &self.controls_config) {
            GateDecision::Ok => {}
            gated => {
                info!("entry gated for {}: {:?}", coin_id, gated);
                return;
            }
        }

        let candles = self.market_data.get_candles(coin_id).await;
        let base = candles.as_ref().and_then(|c| c.get(&TimeFrame::H1));
        let atr = base.and_then(|v| {
            atr_last(
                &v.iter().map(|c| c.high).collect::<Vec<_>>(),
                &v.iter().map(|c| c.low).collect::<Vec<_>>(),
                &v.iter().map(|c| c.close).collect::<Vec<_>>(),
                14,
            )
        });

        let side = decision.side;
        let last_close_time = self
            .trades
            .find_closed_trades(&self.user_id, None)
            .await
            .ok()
            .and_then(|trades| {
                trades
                    .into_iter()
                    .filter(|t| &t.coin_id == coin_id && Some(t.direction) == side)
                    .filter_map(|t| t.exit_time)
                    .max()
            });

        let ctx = RiskContext { atr, last_close_time, direction: side, now: Some(Utc::now()) };
        let Some(intent) = self.risk_engine.plan(coin_id, decision, &portfolio, &user.settings, &ctx) else {
            return;
        };

        let Some(quote) = self.market_data.get_quote(coin_id).await else {
            return;
        };
        let (high, low) = base
            .and_then(|v| v.last())
            .map(|c| (c.high, c.low))
            .unwrap_or((quote.price_usd, quote.price_usd));

        let fill_snapshot = FillSnapshot { high, low, close: quote.price_usd, atr, size_factor: dec!(1) };
        let mut market_order = intent.clone();
        market_order.order_type = OrderType::Market;
        let fill = self.execution_sim.execute(&market_order, quote.price_usd, &fill_snapshot);
        if !fill.filled {
            return;
        }

        let trade = Trade::open(
            coin_id.clone(),
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
            Utc::now(),
        );

        if let Err(e) = self.trades.create_trade(&self.user_id, trade.clone()).await {
            error!("failed to persist new trade for {}: {}", coin_id, e);
            return;
        }
        if let Err(e) = self.users.update_user_balance(&self.user_id, -fill.fees).await {
            warn!("failed to deduct entry fees for {}: {}", coin_id, e);
        }
        self.controller.increment_trades();
        self.notifications
            .notify(notifications::position_opened(
                coin_id.clone(),
                format!("{:?}", intent.direction),
                fill.fill_qty,
                fill.fill_price,
            ))
            .await;
    }

    /// Translates the mutation ManageEngine applied in place into repository writes. `before` is
    /// the trade as read from storage; `after` is the same trade post-`ManageEngine::update`.
    async fn persist_manage_result(&self, before: &Trade, after: &Trade) -> anyhow::Result<()> {
        for action in &after.actions[before.actions.len()..] {
            self.trades
                .update_trade(
                    &self.user_id,
                    &after.id,
                    TradeMutation::PushAction { action: action.action, at: action.at, price: action.price, portion: action.portion },
                )
                .await?;
        }

        if after.status == TradeStatus::Open && after.stop_loss != before.stop_loss {
            self.trades.update_trade(&self.user_id, &after.id, TradeMutation::SetStopLoss(after.stop_loss)).await?;
        }

        if after.status == TradeStatus::Open && after.position_size != before.position_size {
            let realized_delta = after.partial_pnl_accumulator - before.partial_pnl_accumulator;
            self.trades
                .update_trade(
                    &self.user_id,
                    &after.id,
                    TradeMutation::ReducePosition { new_size: after.position_size, realized_delta },
                )
                .await?;
            self.users.update_user_balance(&self.user_id, realized_delta).await?;
        }

        if after.status == TradeStatus::Closed {
            self.trades
                .update_trade(
                    &self.user_id,
                    &after.id,
                    TradeMutation::Close {
                        exit_price: after.exit_price.unwrap_or(before.entry_price),
                        exit_time: after.exit_time.unwrap_or_else(Utc::now),
                        reason: after.exit_reason.clone().unwrap_or_default(),
                    },
                )
                .await?;
            self.users.update_user_balance(&self.user_id, after.pnl.unwrap_or_default()).await?;
            self.users
                .update_user_stats(&self.user_id, UserStatsDelta { trades: 1, pnl: after.pnl.unwrap_or_default() })
                .await?;
        }

        if after.status == TradeStatus::Error {
            let note = after.actions.last().and_then(|a| a.note.clone()).unwrap_or_default();
            self.trades.update_trade(&self.user_id, &after.id, TradeMutation::MarkError(note)).await?;
        }

        Ok(())
    }

    async fn notify_manage_actions(&self, trade: &Trade, actions: &[ManageAction]) {
        for action in actions {
            let alert = match action {
                ManageAction::Sl => {
                    Some(notifications::stop_loss_triggered(trade.coin_id.clone(), trade.stop_loss, trade.pnl.unwrap_or_default()))
                }
                ManageAction::Tp1 | ManageAction::Tp2 | ManageAction::Tp3 => Some(notifications::take_profit_triggered(
                    trade.coin_id.clone(),
                    trade.exit_price.unwrap_or(trade.stop_loss),
                    trade.pnl.unwrap_or_default(),
                )),
                ManageAction::Exit => Some(notifications::position_closed(
                    trade.coin_id.clone(),
                    trade.pnl.unwrap_or_default(),
                    trade.pnl_percent.unwrap_or_default(),
                    trade.exit_reason.clone().unwrap_or_default(),
                )),
                ManageAction::Be => Some(notifications::breakeven_stop_set(trade.coin_id.clone(), trade.entry_price)),
                ManageAction::Ts => Some(notifications::trailing_stop_activated(
                    trade.coin_id.clone(),
                    trade.entry_price,
                    trade.stop_loss,
                )),
                ManageAction::Lock => Some(notifications::lock_profit_set(
                    trade.coin_id.clone(),
                    trade.stop_loss,
                    trade.favorable_r(trade.stop_loss),
                )),
                ManageAction::Rp | ManageAction::Pp => Some(notifications::partial_exit_executed(
                    trade.coin_id.clone(),
                    trade.original_position_size - trade.position_size,
                    trade.pnl.unwrap_or_default(),
                    "score recheck".to_string(),
                )),
            };
            if let Some(alert) = alert {
                self.notifications.notify(alert).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadence_is_five_minutes_and_fifteen_seconds() {
        let config = LiveLoopConfig::default();
        assert_eq!(config.tick_interval, StdDuration::from_secs(300));
        assert_eq!(config.fast_tick_interval, StdDuration::from_secs(15));
    }
}
