#![allow(dead_code)]
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use serde::Serialize;
use tracing::info;

use super::runtime::{
    BacktestSettings, EngineSettings, GeneralSettings, LiveSettings, MarketDataSettings,
    RiskManageSettings, RuntimeConfig,
};

#[derive(Debug, Clone, Serialize)]
pub enum ConfigChangeEvent {
    MarketDataUpdated(MarketDataSettings),
    EngineUpdated(EngineSettings),
    RiskManageUpdated(RiskManageSettings),
    BacktestUpdated(BacktestSettings),
    LiveUpdated(LiveSettings),
    GeneralUpdated(GeneralSettings),
    FullConfigUpdated,
}

/// Holds the live `RuntimeConfig` behind a lock and broadcasts what changed. Every section
/// update revalidates the whole config and rolls back on failure rather than leaving a
/// half-applied change in place.
pub struct RuntimeConfigManager {
    config: Arc<RwLock<RuntimeConfig>>,
    change_tx: broadcast::Sender<ConfigChangeEvent>,
}

impl RuntimeConfigManager {
    pub fn new(initial: RuntimeConfig) -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self {
            config: Arc::new(RwLock::new(initial)),
            change_tx,
        }
    }

    pub async fn get_config(&self) -> RuntimeConfig {
        self.config.read().await.clone()
    }

    pub async fn update_market_data(&self, settings: MarketDataSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.market_data.clone();
        config.market_data = settings.clone();

        if let Err(errors) = config.validate() {
            config.market_data = old;
            return Err(errors.join(", "));
        }

        info!("market data settings updated: refresh_interval_ms={}", settings.refresh_interval_ms);
        let _ = self.change_tx.send(ConfigChangeEvent::MarketDataUpdated(settings));
        Ok(())
    }

    pub async fn update_engine(&self, settings: EngineSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.engine;
        config.engine = settings;

        if let Err(errors) = config.validate() {
            config.engine = old;
            return Err(errors.join(", "));
        }

        info!("engine settings updated: min_signal_score={}", settings.min_signal_score);
        let _ = self.change_tx.send(ConfigChangeEvent::EngineUpdated(settings));
        Ok(())
    }

    pub async fn update_risk_manage(&self, settings: RiskManageSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.risk_manage;
        config.risk_manage = settings;

        if let Err(errors) = config.validate() {
            config.risk_manage = old;
            return Err(errors.join(", "));
        }

        info!(
            "risk/manage settings updated: max_concurrent_trades={}, default_cooldown_hours={}",
            settings.max_concurrent_trades, settings.default_cooldown_hours
        );
        let _ = self.change_tx.send(ConfigChangeEvent::RiskManageUpdated(settings));
        Ok(())
    }

    pub async fn update_backtest(&self, settings: BacktestSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.backtest;
        config.backtest = settings;

        if let Err(errors) = config.validate() {
            config.backtest = old;
            return Err(errors.join(", "));
        }

        info!("backtest settings updated: parallel_batch={}", settings.parallel_batch);
        let _ = self.change_tx.send(ConfigChangeEvent::BacktestUpdated(settings));
        Ok(())
    }

    pub async fn update_live(&self, settings: LiveSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        config.live = settings;

        info!("live loop cadence updated: tick_interval_ms={}", settings.tick_interval_ms);
        let _ = self.change_tx.send(ConfigChangeEvent::LiveUpdated(settings));
        Ok(())
    }

    pub async fn update_general(&self, settings: GeneralSettings) -> Result<(), String> {
        let mut config = self.config.write().await;
        let old = config.general.clone();
        config.general = settings.clone();

        if let Err(errors) = config.validate() {
            config.general = old;
            return Err(errors.join(", "));
        }

        info!("general settings updated: universe={:?}", settings.universe);
        let _ = self.change_tx.send(ConfigChangeEvent::GeneralUpdated(settings));
        Ok(())
    }

    pub async fn update_full(&self, new_config: RuntimeConfig) -> Result<(), String> {
        if let Err(errors) = new_config.validate() {
            return Err(errors.join(", "));
        }

        let mut config = self.config.write().await;
        *config = new_config;

        info!("full configuration updated");
        let _ = self.change_tx.send(ConfigChangeEvent::FullConfigUpdated);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_tx.subscribe()
    }

    pub fn config_arc(&self) -> Arc<RwLock<RuntimeConfig>> {
        Arc::clone(&self.config)
    }
}

impl Clone for RuntimeConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            change_tx: self.change_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_update_and_keeps_old_value() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        let mut bad = manager.get_config().await.risk_manage;
        bad.max_concurrent_trades = 0;

        let result = manager.update_risk_manage(bad).await;
        assert!(result.is_err());
        assert_eq!(
            manager.get_config().await.risk_manage.max_concurrent_trades,
            RuntimeConfig::default().risk_manage.max_concurrent_trades
        );
    }
}
