use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::types::{CoinId, CoinMeta, Quote, TimeFrame};

use super::cache::{CandleCache, QuoteCache};
use super::providers::{CandleProvider, ProviderError, QuoteProvider};

#[derive(Debug, Clone, Copy)]
pub struct MarketDataConfig {
    pub refresh_interval: StdDuration,
    pub quote_stale: Duration,
    pub stream_stale: Duration,
    pub request_timeout: StdDuration,
    pub retry_base: StdDuration,
    pub rate_limit_wait: StdDuration,
    pub per_coin_delay: StdDuration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            refresh_interval: StdDuration::from_secs(300),
            quote_stale: Duration::seconds(300),
            stream_stale: Duration::seconds(30),
            request_timeout: StdDuration::from_secs(15),
            retry_base: StdDuration::from_secs(10),
            rate_limit_wait: StdDuration::from_secs(20),
            per_coin_delay: StdDuration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserUpdate {
    pub coin_id: CoinId,
    pub price: rust_decimal::Decimal,
    pub change_24h_pct: rust_decimal::Decimal,
}

/// Maintains the quote/candle caches behind a single-holder refresh lock and a provider fallback
/// chain A -> B -> C. Streaming updates (see `stream.rs`) push into the same caches.
pub struct MarketDataService {
    config: MarketDataConfig,
    universe: Vec<CoinMeta>,
    quote_providers: Vec<Arc<dyn QuoteProvider>>,
    candle_providers: Vec<Arc<dyn CandleProvider>>,
    quotes: QuoteCache,
    candles: CandleCache,
    refreshing: AtomicBool,
    ready: Notify,
    first_refresh_done: AtomicBool,
    browser_subs: Mutex<Vec<mpsc::Sender<BrowserUpdate>>>,
}

impl MarketDataService {
    pub fn new(
        config: MarketDataConfig,
        universe: Vec<CoinMeta>,
        quote_providers: Vec<Arc<dyn QuoteProvider>>,
        candle_providers: Vec<Arc<dyn CandleProvider>>,
    ) -> Self {
        Self {
            config,
            universe,
            quote_providers,
            candle_providers,
            quotes: QuoteCache::new(),
            candles: CandleCache::new(),
            refreshing: AtomicBool::new(false),
            ready: Notify::new(),
            first_refresh_done: AtomicBool::new(false),
            browser_subs: Mutex::new(Vec::new()),
        }
    }

    pub async fn get_quote(&self, coin_id: &CoinId) -> Option<Quote> {
        self.quotes.get(coin_id, self.config.quote_stale).await
    }

    pub async fn get_candles(&self, coin_id: &CoinId) -> Option<std::collections::BTreeMap<TimeFrame, Vec<crate::types::Candle>>> {
        self.candles.get(coin_id).await
    }

    pub async fn wait_until_quotes_ready(&self) {
        if self.first_refresh_done.load(Ordering::Acquire) {
            return;
        }
        self.ready.notified().await;
    }

    pub async fn subscribe_browser(&self) -> mpsc::Receiver<BrowserUpdate> {
        let (tx, rx) = mpsc::channel(64);
        self.browser_subs.lock().await.push(tx);
        rx
    }

    async fn fan_out(&self, update: BrowserUpdate) {
        let mut subs = self.browser_subs.lock().await;
        subs.retain(|tx| tx.try_send(update.clone()).is_ok() || !tx.is_closed());
    }

    pub async fn push_stream_update(&self, coin_id: CoinId, quote: Quote) {
        self.quotes.update_one(coin_id.clone(), quote.clone()).await;
        self.fan_out(BrowserUpdate { coin_id, price: quote.price_usd, change_24h_pct: quote.change_24h_pct }).await;
    }

    /// Single-holder refresh: a concurrent caller observes `refreshing` already set and returns
    /// immediately without retrying the providers.
    pub async fn refresh_quotes_if_due(&self) {
        if self.refreshing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        self.refresh_quotes_once().await;
        self.refreshing.store(false, Ordering::Release);
    }

    async fn refresh_quotes_once(&self) {
        let coin_ids: Vec<CoinId> = self.universe.iter().map(|m| m.coin_id.clone()).collect();

        for provider in &self.quote_providers {
            match timeout(self.config.request_timeout, provider.fetch_all_quotes(&coin_ids)).await {
                Ok(Ok(quotes)) if !quotes.is_empty() => {
                    info!("market data refreshed via {}", provider.name());
                    self.quotes.replace_all(quotes).await;
                    if !self.first_refresh_done.swap(true, Ordering::AcqRel) {
                        self.ready.notify_waiters();
                    }
                    return;
                }
                Ok(Ok(_)) => warn!("{} returned an empty quote set, falling back", provider.name()),
                Ok(Err(ProviderError::RateLimited { retry_after_ms })) => {
                    warn!("{} rate limited, backing off {}ms", provider.name(), retry_after_ms);
                    tokio::time::sleep(StdDuration::from_millis(retry_after_ms)).await;
                }
                Ok(Err(e)) => warn!("{} failed: {}, falling back", provider.name(), e),
                Err(_) => warn!("{} timed out, falling back", provider.name()),
            }
        }
        warn!("all quote providers failed this cycle; caches retain previous values");
    }

    /// Walks the tracked universe fetching candles for every timeframe, sleeping
    /// `per_coin_delay` between coins to respect provider rate limits. Keeps the previous cache
    /// entry for a (coin, timeframe) pair on individual failure.
    pub async fn refresh_candles_once(&self) {
        for meta in &self.universe {
            for tf in TimeFrame::all() {
                let mut fetched = false;
                for provider in &self.candle_providers {
                    match timeout(self.config.request_timeout, provider.fetch_candles(&meta.coin_id, tf, 500)).await {
                        Ok(Ok(candles)) if !candles.is_empty() => {
                            self.candles.replace(meta.coin_id.clone(), tf, candles).await;
                            fetched = true;
                            break;
                        }
                        Ok(Ok(_)) => continue,
                        Ok(Err(e)) => {
                            warn!("{} candle fetch failed for {}: {}", provider.name(), meta.coin_id, e);
                            continue;
                        }
                        Err(_) => {
                            warn!("candle fetch timed out for {}", meta.coin_id);
                            continue;
                        }
                    }
                }
                if !fetched {
                    warn!("no provider returned {} candles for {}, keeping cached value", tf, meta.coin_id);
                }
            }
            tokio::time::sleep(self.config.per_coin_delay).await;
        }
    }

    /// Background refresher: drives quotes on `refresh_interval` and candles on the same
    /// cadence, stopping as soon as `shutdown` flips to `true`. Does an immediate refresh of
    /// both on startup so `wait_until_quotes_ready` resolves promptly.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        self.refresh_quotes_if_due().await;
        self.refresh_candles_once().await;

        let mut quote_tick = tokio::time::interval(self.config.refresh_interval);
        let mut candle_tick = tokio::time::interval(self.config.refresh_interval);
        quote_tick.tick().await;
        candle_tick.tick().await;

        loop {
            if *shutdown.borrow() {
                info!("market data service shutting down");
                return;
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("market data service shutting down");
                    return;
                }
                _ = quote_tick.tick() => {
                    self.refresh_quotes_if_due().await;
                }
                _ = candle_tick.tick() => {
                    self.refresh_candles_once().await;
                }
            }
        }
    }
}
