use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::BacktestResult;
use crate::types::{ActionType, CoinId, Side, Trade, UserSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub settings: UserSettings,
    pub balance: Decimal,
    pub total_trades: u64,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatsDelta {
    pub trades: i64,
    pub pnl: Decimal,
}

/// Well-typed mutations the live loop may apply to an open trade, in place of the reference
/// implementation's in-place document edits.
#[derive(Debug, Clone)]
pub enum TradeMutation {
    SetStopLoss(Decimal),
    PushAction { action: ActionType, at: DateTime<Utc>, price: Decimal, portion: Option<Decimal> },
    ReducePosition { new_size: Decimal, realized_delta: Decimal },
    Close { exit_price: Decimal, exit_time: DateTime<Utc>, reason: String },
    MarkError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResultRecord {
    pub coin_id: CoinId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub result: BacktestResult,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting mutation for trade {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: &str) -> RepoResult<UserRecord>;
    async fn update_user_balance(&self, id: &str, delta: Decimal) -> RepoResult<()>;
    async fn update_user_stats(&self, id: &str, delta: UserStatsDelta) -> RepoResult<()>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn find_open_trades(&self, user_id: &str) -> RepoResult<Vec<Trade>>;
    async fn find_open_trade_by_coin(&self, user_id: &str, coin_id: &CoinId, direction: Side) -> RepoResult<Option<Trade>>;
    async fn create_trade(&self, user_id: &str, trade: Trade) -> RepoResult<()>;
    async fn update_trade(&self, user_id: &str, trade_id: &str, mutation: TradeMutation) -> RepoResult<()>;
    async fn find_closed_trades(&self, user_id: &str, since: Option<DateTime<Utc>>) -> RepoResult<Vec<Trade>>;
    async fn save_backtest_result(&self, record: BacktestResultRecord) -> RepoResult<()>;
    async fn find_latest_backtest_result(&self, coin_id: &CoinId) -> RepoResult<Option<BacktestResultRecord>>;
}
