use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{Candle, CoinId, Quote, TimeFrame};

/// Reader-many, writer-one caches behind `Arc<RwLock<_>>`, replaced as whole values so readers
/// always observe a fully-formed record.
#[derive(Clone, Default)]
pub struct QuoteCache {
    inner: Arc<RwLock<HashMap<CoinId, Quote>>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, coin_id: &CoinId, stale_after: chrono::Duration) -> Option<Quote> {
        let map = self.inner.read().await;
        let quote = map.get(coin_id)?;
        if quote.is_stale(Utc::now(), stale_after) {
            None
        } else {
            Some(quote.clone())
        }
    }

    pub async fn replace_all(&self, quotes: Vec<(CoinId, Quote)>) {
        let mut map = self.inner.write().await;
        for (coin_id, quote) in quotes {
            map.insert(coin_id, quote);
        }
    }

    pub async fn update_one(&self, coin_id: CoinId, quote: Quote) {
        let mut map = self.inner.write().await;
        map.insert(coin_id, quote);
    }
}

#[derive(Clone, Default)]
pub struct CandleCache {
    inner: Arc<RwLock<HashMap<(CoinId, TimeFrame), Vec<Candle>>>>,
}

impl CandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, coin_id: &CoinId) -> Option<std::collections::BTreeMap<TimeFrame, Vec<Candle>>> {
        let map = self.inner.read().await;
        let mut result = std::collections::BTreeMap::new();
        for tf in TimeFrame::all() {
            if let Some(series) = map.get(&(coin_id.clone(), tf)) {
                result.insert(tf, series.clone());
            }
        }
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Keeps the previous entry on individual failure — callers only call this on success.
    pub async fn replace(&self, coin_id: CoinId, tf: TimeFrame, candles: Vec<Candle>) {
        let mut map = self.inner.write().await;
        map.insert((coin_id, tf), candles);
    }
}
