use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

use crate::types::{Candle, CoinId, Quote, TimeFrame};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("provider geo-blocked this request")]
    GeoBlocked,
    #[error("request timed out")]
    Timeout,
    #[error("provider returned an unexpected response: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy)]
pub struct TickerTick {
    pub coin_id_hash: u64,
    pub price: rust_decimal::Decimal,
    pub change_24h_pct: rust_decimal::Decimal,
    pub volume_24h: rust_decimal::Decimal,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_all_quotes(&self, universe: &[CoinId]) -> Result<Vec<(CoinId, Quote)>, ProviderError>;
}

#[async_trait]
pub trait CandleProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_candles(&self, coin_id: &CoinId, tf: TimeFrame, limit: usize) -> Result<Vec<Candle>, ProviderError>;
    async fn fetch_historical_candles(
        &self,
        coin_id: &CoinId,
        tf: TimeFrame,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, ProviderError>;
}

pub trait StreamProvider: Send + Sync {
    fn open_stream(&self, symbols: &[String]) -> BoxStream<'static, Result<TickerTick, ProviderError>>;
}
