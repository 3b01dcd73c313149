use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CoinId, Regime, Side, StrategyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Be,
    Ts,
    Lock,
    Rp,
    Pp,
    Tp1,
    Tp2,
    Tp3,
    Sl,
    Exit,
    Dca,
}

/// One append-only entry in a trade's management log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAction {
    pub action: ActionType,
    pub at: DateTime<Utc>,
    pub price: Decimal,
    pub portion: Option<Decimal>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFlags {
    pub breakeven_hit: bool,
    pub trailing_activated: bool,
    pub partial_taken_at_tp1: bool,
    pub partial_taken_at_tp2: bool,
    pub reduced_by_score: bool,
    pub taken_partial_by_score: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub coin_id: CoinId,
    pub direction: Side,
    pub status: TradeStatus,

    pub entry_price: Decimal,
    pub original_stop_loss: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,

    pub position_size: Decimal,
    pub original_position_size: Decimal,
    pub leverage: Decimal,

    pub entry_score: Decimal,
    pub strategy: StrategyKind,
    pub regime: Regime,

    pub max_price_seen: Decimal,
    pub min_price_seen: Decimal,
    pub partial_pnl_accumulator: Decimal,

    pub flags: TradeFlags,
    pub actions: Vec<TradeAction>,

    pub opened_at: DateTime<Utc>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<String>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
}

impl Trade {
    pub fn open(
        coin_id: CoinId,
        direction: Side,
        entry_price: Decimal,
        stop_loss: Decimal,
        take_profit_1: Decimal,
        take_profit_2: Option<Decimal>,
        take_profit_3: Option<Decimal>,
        size: Decimal,
        leverage: Decimal,
        entry_score: Decimal,
        strategy: StrategyKind,
        regime: Regime,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            coin_id,
            direction,
            status: TradeStatus::Open,
            entry_price,
            original_stop_loss: stop_loss,
            stop_loss,
            take_profit_1,
            take_profit_2,
            take_profit_3,
            position_size: size,
            original_position_size: size,
            leverage,
            entry_score,
            strategy,
            regime,
            max_price_seen: entry_price,
            min_price_seen: entry_price,
            partial_pnl_accumulator: Decimal::ZERO,
            flags: TradeFlags::default(),
            actions: Vec::new(),
            opened_at,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl: None,
            pnl_percent: None,
        }
    }

    pub fn risk_per_unit(&self) -> Decimal {
        (self.entry_price - self.original_stop_loss).abs()
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        let diff = price - self.entry_price;
        match self.direction {
            Side::Buy => diff * self.position_size,
            Side::Sell => -diff * self.position_size,
        }
    }

    pub fn unrealized_pnl_pct(&self, price: Decimal) -> Decimal {
        let entry_value = self.entry_price * self.original_position_size;
        if entry_value.is_zero() {
            return Decimal::ZERO;
        }
        (self.unrealized_pnl(price) / entry_value) * Decimal::from(100)
    }

    /// Favorable excursion in units of initial risk (R multiples).
    pub fn favorable_r(&self, price: Decimal) -> Decimal {
        let risk = self.risk_per_unit();
        if risk.is_zero() {
            return Decimal::ZERO;
        }
        let favorable = match self.direction {
            Side::Buy => price - self.entry_price,
            Side::Sell => self.entry_price - price,
        };
        favorable / risk
    }

    /// Stops may only move toward safety. Called before committing a new stop.
    pub fn is_valid_stop_move(&self, new_stop: Decimal) -> bool {
        match self.direction {
            Side::Buy => new_stop > self.stop_loss,
            Side::Sell => new_stop < self.stop_loss,
        }
    }

    pub fn push_action(&mut self, action: ActionType, at: DateTime<Utc>, price: Decimal, portion: Option<Decimal>) {
        self.actions.push(TradeAction {
            action,
            at,
            price,
            portion,
            note: None,
        });
    }

    pub fn mark_error(&mut self, note: &str) {
        self.status = TradeStatus::Error;
        self.actions.push(TradeAction {
            action: ActionType::Exit,
            at: Utc::now(),
            price: self.entry_price,
            portion: None,
            note: Some(note.to_string()),
        });
    }

    pub fn close(&mut self, exit_price: Decimal, exit_time: DateTime<Utc>, reason: &str) {
        let pnl = self.unrealized_pnl(exit_price) + self.partial_pnl_accumulator;
        let entry_value = self.entry_price * self.original_position_size;
        let pnl_pct = if entry_value.is_zero() {
            Decimal::ZERO
        } else {
            (pnl / entry_value) * Decimal::from(100)
        };
        self.status = TradeStatus::Closed;
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_reason = Some(reason.to_string());
        self.pnl = Some(pnl);
        self.pnl_percent = Some(pnl_pct);
        self.position_size = Decimal::ZERO;
    }
}

/// The engines' read-only view of account settings; owned and mutated only by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiskMode {
    Percent,
    Dollar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub paper_balance: Decimal,
    pub initial_balance: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub risk_mode: RiskMode,
    pub dollar_risk_per_trade: Decimal,
    pub default_leverage: Decimal,
    pub max_open_trades: usize,
    pub max_balance_percent_per_trade: Decimal,
    pub cooldown_hours: i64,
    pub auto_breakeven: bool,
    pub auto_trailing_stop: bool,
    pub live_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            paper_balance: dec!(10000),
            initial_balance: dec!(10000),
            risk_per_trade_pct: dec!(2),
            risk_mode: RiskMode::Percent,
            dollar_risk_per_trade: dec!(100),
            default_leverage: dec!(2),
            max_open_trades: 5,
            max_balance_percent_per_trade: dec!(0.30),
            cooldown_hours: 4,
            auto_breakeven: true,
            auto_trailing_stop: true,
            live_mode: false,
        }
    }
}

/// A high-level portfolio view consumed by PortfolioControls and RiskEngine context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub available_balance: Decimal,
    pub open_trades: Vec<Trade>,
    pub daily_start_equity: Decimal,
}

impl PortfolioSnapshot {
    pub fn open_count(&self) -> usize {
        self.open_trades
            .iter()
            .filter(|t| t.status == TradeStatus::Open)
            .count()
    }

    pub fn has_open(&self, coin_id: &CoinId, direction: Side) -> bool {
        self.open_trades.iter().any(|t| {
            t.status == TradeStatus::Open && &t.coin_id == coin_id && t.direction == direction
        })
    }
}
