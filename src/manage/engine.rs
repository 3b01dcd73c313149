use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{ActionType, Side, Signal, Trade, TradeStatus};

#[derive(Debug, Clone, Copy)]
pub struct ManageFeatureFlags {
    pub breakeven: bool,
    pub trailing_stop: bool,
    pub lock_in: bool,
    pub score_recheck: bool,
    pub partial_tp: bool,
}

impl Default for ManageFeatureFlags {
    fn default() -> Self {
        Self { breakeven: true, trailing_stop: true, lock_in: true, score_recheck: true, partial_tp: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ManageConfig {
    pub flags: ManageFeatureFlags,
    pub stop_grace_minutes: i64,
    pub breakeven_r_multiple: Decimal,
    pub breakeven_buffer_pct: Decimal,
    pub trailing_start_r: Decimal,
    pub trailing_dist_r: Decimal,
    /// (progress toward TP2, lock level in R)
    pub lock_in_levels: [(Decimal, Decimal); 3],
    /// Fallback lock-in used when a trade has no `take_profit_2`: (leveraged unrealized PnL%,
    /// lock level in R).
    pub lock_in_pnl_pct_levels: [(Decimal, Decimal); 2],
    pub close_based_stops: bool,
    pub score_exit_drop: Decimal,
    pub score_exit_drop_flipped: Decimal,
    pub score_exit_pnl_pct: Decimal,
    pub score_reduce_drop: Decimal,
    pub score_reduce_drop_flipped: Decimal,
    pub score_reduce_fraction: Decimal,
    pub score_partial_drop_floor: Decimal,
    pub score_partial_fraction: Decimal,
}

impl Default for ManageConfig {
    fn default() -> Self {
        Self {
            flags: ManageFeatureFlags::default(),
            stop_grace_minutes: 60,
            breakeven_r_multiple: dec!(0.75),
            breakeven_buffer_pct: dec!(0.003),
            trailing_start_r: dec!(1.5),
            trailing_dist_r: dec!(1.0),
            lock_in_levels: [(dec!(0.5), dec!(0.5)), (dec!(0.75), dec!(0.75)), (dec!(0.9), dec!(1.0))],
            lock_in_pnl_pct_levels: [(dec!(2), dec!(0.25)), (dec!(5), dec!(0.5))],
            close_based_stops: true,
            score_exit_drop: dec!(-45),
            score_exit_drop_flipped: dec!(-40),
            score_exit_pnl_pct: dec!(-8),
            score_reduce_drop: dec!(-25),
            score_reduce_drop_flipped: dec!(-20),
            score_reduce_fraction: dec!(0.5),
            score_partial_drop_floor: dec!(-25),
            score_partial_fraction: dec!(1.0) / dec!(3),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecheckInput {
    pub score: Decimal,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy)]
pub struct ManageSnapshot {
    pub current_price: Decimal,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub open: Option<Decimal>,
    pub recheck: Option<RecheckInput>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManageAction {
    Be,
    Ts,
    Lock,
    Rp,
    Pp,
    Sl,
    Tp1,
    Tp2,
    Tp3,
    Exit,
}

/// A pure state machine: snapshot + open trade -> actions applied in a fixed evaluation order
/// (BE, TS, LOCK, score-recheck, SL, TP1-3). No I/O. Actions mutate a local copy of the trade;
/// the caller is responsible for persisting the result.
pub struct ManageEngine {
    pub config: ManageConfig,
}

impl ManageEngine {
    pub fn new(config: ManageConfig) -> Self {
        Self { config }
    }

    pub fn update(&self, trade: &mut Trade, snapshot: &ManageSnapshot) -> Vec<ManageAction> {
        let mut actions = Vec::new();
        if trade.status != TradeStatus::Open {
            return actions;
        }

        let price = snapshot.current_price;
        trade.max_price_seen = trade.max_price_seen.max(price);
        trade.min_price_seen = trade.min_price_seen.min(price);

        self.apply_breakeven(trade, snapshot, &mut actions);
        if trade.status != TradeStatus::Open {
            return actions;
        }
        self.apply_trailing_stop(trade, snapshot, &mut actions);
        if trade.status != TradeStatus::Open {
            return actions;
        }
        self.apply_lock_in(trade, snapshot, &mut actions);
        if trade.status != TradeStatus::Open {
            return actions;
        }
        if let Some(recheck) = snapshot.recheck {
            self.apply_score_recheck(trade, snapshot, recheck, &mut actions);
        }
        if trade.status != TradeStatus::Open {
            return actions;
        }
        self.apply_stop_and_targets(trade, snapshot, &mut actions);

        actions
    }

    fn commit_stop(&self, trade: &mut Trade, new_stop: Decimal) -> bool {
        if !trade.is_valid_stop_move(new_stop) {
            trade.mark_error("invariant violation: stop would widen risk");
            return false;
        }
        trade.stop_loss = new_stop;
        true
    }

    fn apply_breakeven(&self, trade: &mut Trade, snapshot: &ManageSnapshot, actions: &mut Vec<ManageAction>) {
        if !self.config.flags.breakeven || trade.flags.breakeven_hit {
            return;
        }
        let elapsed = snapshot.timestamp - trade.opened_at;
        if elapsed < chrono::Duration::minutes(self.config.stop_grace_minutes) {
            return;
        }
        if trade.favorable_r(snapshot.current_price) < self.config.breakeven_r_multiple {
            return;
        }
        let buffer = trade.entry_price * self.config.breakeven_buffer_pct;
        let new_stop = match trade.direction {
            Side::Buy => trade.entry_price + buffer,
            Side::Sell => trade.entry_price - buffer,
        };
        if self.commit_stop(trade, new_stop) {
            trade.flags.breakeven_hit = true;
            trade.push_action(ActionType::Be, snapshot.timestamp, snapshot.current_price, None);
            actions.push(ManageAction::Be);
        }
    }

    fn apply_trailing_stop(&self, trade: &mut Trade, snapshot: &ManageSnapshot, actions: &mut Vec<ManageAction>) {
        if !self.config.flags.trailing_stop {
            return;
        }
        if trade.favorable_r(snapshot.current_price) < self.config.trailing_start_r {
            return;
        }
        trade.flags.trailing_activated = true;
        let risk = trade.risk_per_unit();
        let trail_distance = risk * self.config.trailing_dist_r;
        let best_price = match trade.direction {
            Side::Buy => trade.max_price_seen,
            Side::Sell => trade.min_price_seen,
        };
        let new_stop = match trade.direction {
            Side::Buy => best_price - trail_distance,
            Side::Sell => best_price + trail_distance,
        };
        if trade.is_valid_stop_move(new_stop) {
            trade.stop_loss = new_stop;
            trade.push_action(ActionType::Ts, snapshot.timestamp, snapshot.current_price, None);
            actions.push(ManageAction::Ts);
        }
    }

    fn apply_lock_in(&self, trade: &mut Trade, snapshot: &ManageSnapshot, actions: &mut Vec<ManageAction>) {
        if !self.config.flags.lock_in {
            return;
        }
        let risk = trade.risk_per_unit();
        if risk.is_zero() {
            return;
        }

        let best_lock = match trade.take_profit_2 {
            Some(tp2) => {
                let favorable = match trade.direction {
                    Side::Buy => snapshot.current_price - trade.entry_price,
                    Side::Sell => trade.entry_price - snapshot.current_price,
                };
                let tp2_distance = (tp2 - trade.entry_price).abs();
                if tp2_distance.is_zero() {
                    return;
                }
                let progress = favorable / tp2_distance;

                let mut best_lock: Option<Decimal> = None;
                for (threshold, lock_r) in self.config.lock_in_levels.iter() {
                    if progress >= *threshold {
                        best_lock = Some(*lock_r);
                    }
                }
                best_lock
            }
            // No TP2 to measure progress against: fall back to locking in profit once
            // leveraged unrealized PnL% crosses the configured thresholds.
            None => {
                let leveraged_pnl_pct = trade.unrealized_pnl_pct(snapshot.current_price) * trade.leverage;
                let mut best_lock: Option<Decimal> = None;
                for (threshold, lock_r) in self.config.lock_in_pnl_pct_levels.iter() {
                    if leveraged_pnl_pct >= *threshold {
                        best_lock = Some(*lock_r);
                    }
                }
                best_lock
            }
        };

        let Some(lock_r) = best_lock else { return };
        let lock_distance = risk * lock_r;
        let new_stop = match trade.direction {
            Side::Buy => trade.entry_price + lock_distance,
            Side::Sell => trade.entry_price - lock_distance,
        };
        if trade.is_valid_stop_move(new_stop) {
            trade.stop_loss = new_stop;
            trade.push_action(ActionType::Lock, snapshot.timestamp, snapshot.current_price, None);
            actions.push(ManageAction::Lock);
        }
    }

    fn apply_score_recheck(
        &self,
        trade: &mut Trade,
        snapshot: &ManageSnapshot,
        recheck: RecheckInput,
        actions: &mut Vec<ManageAction>,
    ) {
        if !self.config.flags.score_recheck {
            return;
        }
        let drop = recheck.score - trade.entry_score;
        let flipped = signal_flipped_against(trade.direction, recheck.signal);
        let pnl_pct = trade.unrealized_pnl_pct(snapshot.current_price);
        let in_profit = pnl_pct >= Decimal::ZERO;

        let exit_trigger = (drop <= self.config.score_exit_drop)
            || (flipped && drop <= self.config.score_exit_drop_flipped);
        if exit_trigger && pnl_pct <= self.config.score_exit_pnl_pct && !in_profit {
            trade.close(snapshot.current_price, snapshot.timestamp, "SCORE_EXIT");
            trade.push_action(ActionType::Exit, snapshot.timestamp, snapshot.current_price, None);
            actions.push(ManageAction::Exit);
            return;
        }

        if !trade.flags.reduced_by_score {
            let reduce_trigger = (drop <= self.config.score_reduce_drop)
                || (flipped && drop <= self.config.score_reduce_drop_flipped);
            if reduce_trigger && !in_profit {
                let portion = trade.position_size * self.config.score_reduce_fraction;
                self.close_partial(trade, snapshot, portion, ActionType::Rp);
                trade.flags.reduced_by_score = true;
                actions.push(ManageAction::Rp);
                return;
            }
        }

        if !trade.flags.taken_partial_by_score {
            let near_tp1 = {
                let dist = (trade.take_profit_1 - snapshot.current_price).abs();
                let total = (trade.take_profit_1 - trade.entry_price).abs();
                !total.is_zero() && dist / total < dec!(0.25)
            };
            if drop < Decimal::ZERO && drop > self.config.score_partial_drop_floor && near_tp1 && !in_profit {
                let portion = trade.position_size * self.config.score_partial_fraction;
                self.close_partial(trade, snapshot, portion, ActionType::Pp);
                trade.flags.taken_partial_by_score = true;
                actions.push(ManageAction::Pp);
            }
        }
    }

    fn apply_stop_and_targets(&self, trade: &mut Trade, snapshot: &ManageSnapshot, actions: &mut Vec<ManageAction>) {
        let effective_price = if self.config.close_based_stops {
            snapshot.current_price
        } else {
            match trade.direction {
                Side::Buy => snapshot.low.unwrap_or(snapshot.current_price),
                Side::Sell => snapshot.high.unwrap_or(snapshot.current_price),
            }
        };

        let sl_hit = match trade.direction {
            Side::Buy => effective_price <= trade.stop_loss,
            Side::Sell => effective_price >= trade.stop_loss,
        };

        let active_tp = self.active_take_profit(trade);
        let tp_hit = active_tp.map(|(tp, _)| match trade.direction {
            Side::Buy => snapshot.high.unwrap_or(snapshot.current_price) >= tp,
            Side::Sell => snapshot.low.unwrap_or(snapshot.current_price) <= tp,
        }).unwrap_or(false);

        if sl_hit && tp_hit {
            // Intrabar conflict: use the bar's open relative to the stop/tp1 midpoint.
            let open = snapshot.open.unwrap_or(snapshot.current_price);
            let midpoint = (trade.stop_loss + trade.take_profit_1) / Decimal::from(2);
            let sl_first = match trade.direction {
                Side::Buy => open <= midpoint,
                Side::Sell => open >= midpoint,
            };
            if sl_first {
                self.exit_stop(trade, snapshot, actions);
            } else {
                self.hit_take_profit(trade, snapshot, active_tp.unwrap().1, actions);
            }
            return;
        }

        if sl_hit {
            self.exit_stop(trade, snapshot, actions);
            return;
        }
        if tp_hit {
            self.hit_take_profit(trade, snapshot, active_tp.unwrap().1, actions);
        }
    }

    fn active_take_profit(&self, trade: &Trade) -> Option<(Decimal, u8)> {
        if !trade.flags.partial_taken_at_tp1 {
            return Some((trade.take_profit_1, 1));
        }
        if !trade.flags.partial_taken_at_tp2 {
            return trade.take_profit_2.map(|tp| (tp, 2));
        }
        trade.take_profit_3.map(|tp| (tp, 3))
    }

    fn exit_stop(&self, trade: &mut Trade, snapshot: &ManageSnapshot, actions: &mut Vec<ManageAction>) {
        trade.close(trade.stop_loss, snapshot.timestamp, "SL");
        trade.push_action(ActionType::Sl, snapshot.timestamp, trade.stop_loss, None);
        actions.push(ManageAction::Sl);
    }

    fn hit_take_profit(&self, trade: &mut Trade, snapshot: &ManageSnapshot, level: u8, actions: &mut Vec<ManageAction>) {
        if !self.config.flags.partial_tp {
            let price = match level {
                1 => trade.take_profit_1,
                2 => trade.take_profit_2.unwrap_or(trade.take_profit_1),
                _ => trade.take_profit_3.unwrap_or(trade.take_profit_1),
            };
            trade.close(price, snapshot.timestamp, "TP1");
            trade.push_action(ActionType::Tp1, snapshot.timestamp, price, None);
            actions.push(ManageAction::Tp1);
            return;
        }

        let (fraction, action, flag_setter): (Decimal, ActionType, fn(&mut Trade)) = match level {
            1 => (dec!(0.4), ActionType::Tp1, |t: &mut Trade| t.flags.partial_taken_at_tp1 = true),
            2 => (dec!(0.3), ActionType::Tp2, |t: &mut Trade| t.flags.partial_taken_at_tp2 = true),
            _ => (Decimal::ONE, ActionType::Tp3, |_t: &mut Trade| {}),
        };

        let price = match level {
            1 => trade.take_profit_1,
            2 => trade.take_profit_2.unwrap_or(trade.take_profit_1),
            _ => trade.take_profit_3.unwrap_or(trade.take_profit_1),
        };

        if level == 3 {
            trade.close(price, snapshot.timestamp, "TP3");
            trade.push_action(action, snapshot.timestamp, price, None);
            actions.push(ManageAction::Tp3);
            return;
        }

        let portion = trade.original_position_size * fraction;
        let portion = portion.min(trade.position_size);
        let pnl = trade.unrealized_pnl(price) * (portion / trade.position_size.max(Decimal::new(1, 9)));
        trade.partial_pnl_accumulator += pnl;
        trade.position_size -= portion;
        flag_setter(trade);
        trade.push_action(action, snapshot.timestamp, price, Some(portion));
        actions.push(if level == 1 { ManageAction::Tp1 } else { ManageAction::Tp2 });
    }

    fn close_partial(&self, trade: &mut Trade, snapshot: &ManageSnapshot, portion: Decimal, action: ActionType) {
        let portion = portion.min(trade.position_size);
        if portion.is_zero() {
            return;
        }
        let pnl = trade.unrealized_pnl(snapshot.current_price) * (portion / trade.position_size.max(Decimal::new(1, 9)));
        trade.partial_pnl_accumulator += pnl;
        trade.position_size -= portion;
        trade.push_action(action, snapshot.timestamp, snapshot.current_price, Some(portion));
    }
}

fn signal_flipped_against(direction: Side, signal: Signal) -> bool {
    match direction {
        Side::Buy => signal.is_bearish(),
        Side::Sell => signal.is_bullish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoinId, Regime, StrategyKind};
    use chrono::Utc;

    fn fresh_trade() -> Trade {
        Trade::open(
            CoinId::new("bitcoin"),
            Side::Buy,
            dec!(50000),
            dec!(49000),
            dec!(51500),
            Some(dec!(53000)),
            Some(dec!(55000)),
            dec!(1),
            dec!(2),
            dec!(70),
            StrategyKind::TrendFollow,
            Regime::Trending,
            Utc::now() - chrono::Duration::hours(2),
        )
    }

    #[test]
    fn stop_loss_closes_trade() {
        let engine = ManageEngine::new(ManageConfig::default());
        let mut trade = fresh_trade();
        let snapshot = ManageSnapshot {
            current_price: dec!(48900),
            high: Some(dec!(49100)),
            low: Some(dec!(48850)),
            open: Some(dec!(49050)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions = engine.update(&mut trade, &snapshot);
        assert!(actions.contains(&ManageAction::Sl));
        assert_eq!(trade.status, TradeStatus::Closed);
    }

    #[test]
    fn breakeven_then_trailing_then_tp1() {
        let engine = ManageEngine::new(ManageConfig::default());
        let mut trade = fresh_trade();

        let snap1 = ManageSnapshot {
            current_price: dec!(50800), // 0.8R favorable
            high: Some(dec!(50800)),
            low: Some(dec!(50600)),
            open: Some(dec!(50700)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions1 = engine.update(&mut trade, &snap1);
        assert!(actions1.contains(&ManageAction::Be));

        let snap2 = ManageSnapshot {
            current_price: dec!(51600), // beyond TP1 and trailing-start
            high: Some(dec!(51700)),
            low: Some(dec!(51500)),
            open: Some(dec!(51550)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions2 = engine.update(&mut trade, &snap2);
        assert!(actions2.contains(&ManageAction::Tp1) || actions2.contains(&ManageAction::Ts));
    }

    #[test]
    fn tp1_tp2_tp3_split_is_40_30_30() {
        let engine = ManageEngine::new(ManageConfig::default());
        let mut trade = fresh_trade();
        let original = trade.original_position_size;

        let snap_tp1 = ManageSnapshot {
            current_price: dec!(51500),
            high: Some(dec!(51600)),
            low: Some(dec!(51400)),
            open: Some(dec!(51450)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions1 = engine.update(&mut trade, &snap_tp1);
        assert!(actions1.contains(&ManageAction::Tp1));
        assert_eq!(original - trade.position_size, original * dec!(0.4));

        let snap_tp2 = ManageSnapshot {
            current_price: dec!(53000),
            high: Some(dec!(53100)),
            low: Some(dec!(52900)),
            open: Some(dec!(52950)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions2 = engine.update(&mut trade, &snap_tp2);
        assert!(actions2.contains(&ManageAction::Tp2));
        assert_eq!(original - trade.position_size, original * dec!(0.7));
        assert_eq!(trade.position_size, original * dec!(0.3));

        let snap_tp3 = ManageSnapshot {
            current_price: dec!(55000),
            high: Some(dec!(55100)),
            low: Some(dec!(54900)),
            open: Some(dec!(54950)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions3 = engine.update(&mut trade, &snap_tp3);
        assert!(actions3.contains(&ManageAction::Tp3));
        assert_eq!(trade.status, TradeStatus::Closed);
    }

    #[test]
    fn lock_in_falls_back_to_pnl_pct_without_tp2() {
        let engine = ManageEngine::new(ManageConfig::default());
        let mut trade = Trade::open(
            CoinId::new("bitcoin"),
            Side::Buy,
            dec!(50000),
            dec!(49000),
            dec!(51500),
            None,
            None,
            dec!(1),
            dec!(2),
            dec!(70),
            StrategyKind::TrendFollow,
            Regime::Trending,
            Utc::now() - chrono::Duration::hours(2),
        );

        // Unleveraged move is 1%, x2 leverage makes it 2% leveraged unrealized PnL, tripping
        // the first fallback threshold.
        let snapshot = ManageSnapshot {
            current_price: dec!(50500),
            high: Some(dec!(50550)),
            low: Some(dec!(50450)),
            open: Some(dec!(50480)),
            recheck: None,
            timestamp: Utc::now(),
        };
        let actions = engine.update(&mut trade, &snapshot);
        assert!(actions.contains(&ManageAction::Lock));
        assert_eq!(trade.stop_loss, dec!(50000) + dec!(1000) * dec!(0.25));
    }
}
