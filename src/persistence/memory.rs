use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::types::{CoinId, Side, Trade, TradeStatus, UserSettings};

use super::traits::{
    BacktestResultRecord, RepoResult, RepositoryError, TradeMutation, TradeRepository, UserRecord,
    UserRepository, UserStatsDelta,
};

#[derive(Default)]
struct UserState {
    settings: UserSettings,
    balance: Decimal,
    total_trades: u64,
    total_pnl: Decimal,
}

/// A process-local repository for tests and single-node paper trading. No durability guarantees.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<RwLock<HashMap<String, UserState>>>,
    trades: Arc<RwLock<HashMap<String, Vec<Trade>>>>,
    backtests: Arc<RwLock<HashMap<String, Vec<BacktestResultRecord>>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, id: &str, settings: UserSettings) {
        let balance = settings.paper_balance;
        let mut users = self.users.write().await;
        users.insert(id.to_string(), UserState { settings, balance, total_trades: 0, total_pnl: Decimal::ZERO });
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_user(&self, id: &str) -> RepoResult<UserRecord> {
        let users = self.users.read().await;
        let state = users.get(id).ok_or(RepositoryError::NotFound)?;
        Ok(UserRecord {
            id: id.to_string(),
            settings: state.settings.clone(),
            balance: state.balance,
            total_trades: state.total_trades,
            total_pnl: state.total_pnl,
        })
    }

    async fn update_user_balance(&self, id: &str, delta: Decimal) -> RepoResult<()> {
        let mut users = self.users.write().await;
        let state = users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        state.balance += delta;
        Ok(())
    }

    async fn update_user_stats(&self, id: &str, delta: UserStatsDelta) -> RepoResult<()> {
        let mut users = self.users.write().await;
        let state = users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        state.total_trades = (state.total_trades as i64 + delta.trades).max(0) as u64;
        state.total_pnl += delta.pnl;
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for InMemoryRepository {
    async fn find_open_trades(&self, user_id: &str) -> RepoResult<Vec<Trade>> {
        let trades = self.trades.read().await;
        Ok(trades
            .get(user_id)
            .map(|v| v.iter().filter(|t| t.status == TradeStatus::Open).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_open_trade_by_coin(&self, user_id: &str, coin_id: &CoinId, direction: Side) -> RepoResult<Option<Trade>> {
        let trades = self.trades.read().await;
        Ok(trades.get(user_id).and_then(|v| {
            v.iter()
                .find(|t| t.status == TradeStatus::Open && &t.coin_id == coin_id && t.direction == direction)
                .cloned()
        }))
    }

    async fn create_trade(&self, user_id: &str, trade: Trade) -> RepoResult<()> {
        let mut trades = self.trades.write().await;
        trades.entry(user_id.to_string()).or_default().push(trade);
        Ok(())
    }

    async fn update_trade(&self, user_id: &str, trade_id: &str, mutation: TradeMutation) -> RepoResult<()> {
        let mut trades = self.trades.write().await;
        let user_trades = trades.get_mut(user_id).ok_or(RepositoryError::NotFound)?;
        let trade = user_trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(RepositoryError::NotFound)?;

        match mutation {
            TradeMutation::SetStopLoss(new_stop) => {
                if !trade.is_valid_stop_move(new_stop) {
                    return Err(RepositoryError::Conflict(trade_id.to_string()));
                }
                trade.stop_loss = new_stop;
            }
            TradeMutation::PushAction { action, at, price, portion } => {
                trade.push_action(action, at, price, portion);
            }
            TradeMutation::ReducePosition { new_size, realized_delta } => {
                if new_size > trade.position_size {
                    return Err(RepositoryError::Conflict(trade_id.to_string()));
                }
                trade.position_size = new_size;
                trade.partial_pnl_accumulator += realized_delta;
            }
            TradeMutation::Close { exit_price, exit_time, reason } => {
                trade.close(exit_price, exit_time, &reason);
            }
            TradeMutation::MarkError(note) => {
                trade.mark_error(&note);
            }
        }
        Ok(())
    }

    async fn find_closed_trades(&self, user_id: &str, since: Option<DateTime<Utc>>) -> RepoResult<Vec<Trade>> {
        let trades = self.trades.read().await;
        Ok(trades
            .get(user_id)
            .map(|v| {
                v.iter()
                    .filter(|t| t.status == TradeStatus::Closed)
                    .filter(|t| since.map(|s| t.exit_time.map(|e| e >= s).unwrap_or(false)).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_backtest_result(&self, record: BacktestResultRecord) -> RepoResult<()> {
        let mut backtests = self.backtests.write().await;
        backtests.entry(record.coin_id.as_str().to_string()).or_default().push(record);
        Ok(())
    }

    async fn find_latest_backtest_result(&self, coin_id: &CoinId) -> RepoResult<Option<BacktestResultRecord>> {
        let backtests = self.backtests.read().await;
        Ok(backtests.get(coin_id.as_str()).and_then(|v| v.last().cloned()))
    }
}
