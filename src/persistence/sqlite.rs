use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::types::{CoinId, Side, Trade, TradeStatus, UserSettings};

use super::traits::{
    BacktestResultRecord, RepoResult, RepositoryError, TradeMutation, TradeRepository, UserRecord,
    UserRepository, UserStatsDelta,
};

/// sqlx-backed repository. Trades and users are stored with their indexed scalar columns plus a
/// JSON blob for the nested action log and settings, following the reference database's
/// text-encoded-decimal convention.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn connect(db_path: &str) -> Result<Self, RepositoryError> {
        info!("opening sqlite repository at {}", db_path);
        let options = SqliteConnectOptions::from_str(db_path)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    async fn create_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                balance TEXT NOT NULL,
                total_trades INTEGER NOT NULL DEFAULT 0,
                total_pnl TEXT NOT NULL DEFAULT '0',
                settings_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                coin_id TEXT NOT NULL,
                side TEXT NOT NULL,
                status TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                exit_time TEXT,
                trade_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin_id TEXT NOT NULL,
                start_ts TEXT NOT NULL,
                end_ts TEXT NOT NULL,
                created_at TEXT NOT NULL,
                record_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_backtest_coin ON backtest_results(coin_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    fn decode_trade(row: &sqlx::sqlite::SqliteRow) -> RepoResult<Trade> {
        let json: String = row.try_get("trade_json").map_err(|e| RepositoryError::Storage(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| RepositoryError::Storage(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn find_user(&self, id: &str) -> RepoResult<UserRecord> {
        let row = sqlx::query("SELECT id, balance, total_trades, total_pnl, settings_json FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        let balance_str: String = row.try_get("balance").map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let pnl_str: String = row.try_get("total_pnl").map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let settings_json: String = row.try_get("settings_json").map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(UserRecord {
            id: id.to_string(),
            settings: serde_json::from_str::<UserSettings>(&settings_json).map_err(|e| RepositoryError::Storage(e.to_string()))?,
            balance: Decimal::from_str(&balance_str).unwrap_or_default(),
            total_trades: row.try_get::<i64, _>("total_trades").unwrap_or(0) as u64,
            total_pnl: Decimal::from_str(&pnl_str).unwrap_or_default(),
        })
    }

    async fn update_user_balance(&self, id: &str, delta: Decimal) -> RepoResult<()> {
        let user = self.find_user(id).await?;
        let new_balance = (user.balance + delta).to_string();
        sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
            .bind(new_balance)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn update_user_stats(&self, id: &str, delta: UserStatsDelta) -> RepoResult<()> {
        let user = self.find_user(id).await?;
        let new_trades = (user.total_trades as i64 + delta.trades).max(0);
        let new_pnl = (user.total_pnl + delta.pnl).to_string();
        sqlx::query("UPDATE users SET total_trades = ?, total_pnl = ? WHERE id = ?")
            .bind(new_trades)
            .bind(new_pnl)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl TradeRepository for SqliteRepository {
    async fn find_open_trades(&self, user_id: &str) -> RepoResult<Vec<Trade>> {
        let rows = sqlx::query("SELECT trade_json FROM trades WHERE user_id = ? AND status = 'Open'")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        rows.iter().map(Self::decode_trade).collect()
    }

    async fn find_open_trade_by_coin(&self, user_id: &str, coin_id: &CoinId, direction: Side) -> RepoResult<Option<Trade>> {
        let row = sqlx::query(
            "SELECT trade_json FROM trades WHERE user_id = ? AND coin_id = ? AND side = ? AND status = 'Open' LIMIT 1",
        )
        .bind(user_id)
        .bind(coin_id.as_str())
        .bind(direction.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        row.as_ref().map(Self::decode_trade).transpose()
    }

    async fn create_trade(&self, user_id: &str, trade: Trade) -> RepoResult<()> {
        let json = serde_json::to_string(&trade).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        sqlx::query(
            "INSERT INTO trades (id, user_id, coin_id, side, status, opened_at, exit_time, trade_json) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.id)
        .bind(user_id)
        .bind(trade.coin_id.as_str())
        .bind(trade.direction.as_str())
        .bind(format!("{:?}", trade.status))
        .bind(trade.opened_at.to_rfc3339())
        .bind(trade.exit_time.map(|t| t.to_rfc3339()))
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn update_trade(&self, user_id: &str, trade_id: &str, mutation: TradeMutation) -> RepoResult<()> {
        let row = sqlx::query("SELECT trade_json FROM trades WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;
        let mut trade = Self::decode_trade(&row)?;

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

        let json = serde_json::to_string(&trade).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        sqlx::query("UPDATE trades SET status = ?, exit_time = ?, trade_json = ? WHERE user_id = ? AND id = ?")
            .bind(format!("{:?}", trade.status))
            .bind(trade.exit_time.map(|t| t.to_rfc3339()))
            .bind(json)
            .bind(user_id)
            .bind(trade_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_closed_trades(&self, user_id: &str, since: Option<DateTime<Utc>>) -> RepoResult<Vec<Trade>> {
        let rows = sqlx::query("SELECT trade_json FROM trades WHERE user_id = ? AND status = 'Closed' ORDER BY opened_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let trades: Vec<Trade> = rows.iter().map(Self::decode_trade).collect::<RepoResult<_>>()?;
        Ok(match since {
            Some(s) => trades.into_iter().filter(|t| t.exit_time.map(|e| e >= s).unwrap_or(false)).collect(),
            None => trades,
        })
    }

    async fn save_backtest_result(&self, record: BacktestResultRecord) -> RepoResult<()> {
        let json = serde_json::to_string(&record).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        sqlx::query("INSERT INTO backtest_results (coin_id, start_ts, end_ts, created_at, record_json) VALUES (?, ?, ?, ?, ?)")
            .bind(record.coin_id.as_str())
            .bind(record.start.to_rfc3339())
            .bind(record.end.to_rfc3339())
            .bind(record.created_at.to_rfc3339())
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_latest_backtest_result(&self, coin_id: &CoinId) -> RepoResult<Option<BacktestResultRecord>> {
        let row = sqlx::query("SELECT record_json FROM backtest_results WHERE coin_id = ? ORDER BY id DESC LIMIT 1")
            .bind(coin_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        row.map(|r| {
            let json: String = r.try_get("record_json").map_err(|e| RepositoryError::Storage(e.to_string()))?;
            serde_json::from_str(&json).map_err(|e| RepositoryError::Storage(e.to_string()))
        })
        .transpose()
    }
}
