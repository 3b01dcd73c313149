use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::backtest::BacktesterConfig;
use crate::execution::ExecutionConfig;
use crate::live::LiveLoopConfig;
use crate::manage::{ManageConfig, ManageFeatureFlags};
use crate::marketdata::MarketDataConfig;
use crate::risk::{PortfolioControlsConfig, RiskConfig};
use crate::signal::EngineConfig;
use crate::types::TimeFrame;

/// Millisecond-keyed wire format for `MarketDataConfig`. Deployments set `refreshIntervalMs`,
/// `quoteStaleMs` etc. directly in TOML/env; `build()` turns those into the `Duration`s the
/// service actually runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    pub refresh_interval_ms: u64,
    pub quote_stale_ms: i64,
    pub stream_stale_ms: i64,
    pub request_timeout_ms: u64,
    pub retry_base_ms: u64,
    pub rate_limit_wait_ms: u64,
    pub per_coin_delay_ms: u64,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        let d = MarketDataConfig::default();
        Self {
            refresh_interval_ms: d.refresh_interval.as_millis() as u64,
            quote_stale_ms: d.quote_stale.num_milliseconds(),
            stream_stale_ms: d.stream_stale.num_milliseconds(),
            request_timeout_ms: d.request_timeout.as_millis() as u64,
            retry_base_ms: d.retry_base.as_millis() as u64,
            rate_limit_wait_ms: d.rate_limit_wait.as_millis() as u64,
            per_coin_delay_ms: d.per_coin_delay.as_millis() as u64,
        }
    }
}

impl MarketDataSettings {
    pub fn build(&self) -> MarketDataConfig {
        MarketDataConfig {
            refresh_interval: StdDuration::from_millis(self.refresh_interval_ms),
            quote_stale: ChronoDuration::milliseconds(self.quote_stale_ms),
            stream_stale: ChronoDuration::milliseconds(self.stream_stale_ms),
            request_timeout: StdDuration::from_millis(self.request_timeout_ms),
            retry_base: StdDuration::from_millis(self.retry_base_ms),
            rate_limit_wait: StdDuration::from_millis(self.rate_limit_wait_ms),
            per_coin_delay: StdDuration::from_millis(self.per_coin_delay_ms),
        }
    }
}

/// Signal engine thresholds. Field names mirror `EngineConfig` directly since every field is
/// already serde-friendly (`Decimal`, `u8`, `bool`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub min_signal_score: Decimal,
    pub min_confluence_for_signal: u8,
    pub mtf_divergence_penalty: Decimal,
    pub session_start_utc: u32,
    pub session_end_utc: u32,
    pub session_penalty: Decimal,
    pub btc_override: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let d = EngineConfig::default();
        Self {
            min_signal_score: d.min_signal_score,
            min_confluence_for_signal: d.min_confluence_for_signal,
            mtf_divergence_penalty: d.mtf_divergence_penalty,
            session_start_utc: d.session_start_utc,
            session_end_utc: d.session_end_utc,
            session_penalty: d.session_penalty,
            btc_override: d.btc_override,
        }
    }
}

impl EngineSettings {
    pub fn build(&self) -> EngineConfig {
        EngineConfig {
            min_signal_score: self.min_signal_score,
            min_confluence_for_signal: self.min_confluence_for_signal,
            mtf_divergence_penalty: self.mtf_divergence_penalty,
            session_start_utc: self.session_start_utc,
            session_end_utc: self.session_end_utc,
            session_penalty: self.session_penalty,
            btc_override: self.btc_override,
        }
    }
}

/// Risk, management and execution tuning, grouped the way the external interface enumerates
/// them. One settings block feeds four downstream config structs (`RiskConfig`, `ManageConfig`,
/// `ExecutionConfig`, `PortfolioControlsConfig`) because several fields (the two fee rates) are
/// shared between them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskManageSettings {
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub slippage_bps: Decimal,
    pub slip_k: Decimal,
    pub funding_rate_per_hour: Decimal,
    pub default_cooldown_hours: i64,
    pub breakeven_enabled: bool,
    pub trailing_stop_enabled: bool,
    pub lock_in_enabled: bool,
    pub score_recheck_enabled: bool,
    pub partial_tp_enabled: bool,
    pub breakeven_r_multiple: Decimal,
    pub breakeven_buffer_pct: Decimal,
    pub trailing_start_r: Decimal,
    pub trailing_dist_r: Decimal,
    pub lock_in_levels: [(Decimal, Decimal); 3],
    pub lock_in_pnl_pct_levels: [(Decimal, Decimal); 2],
    pub max_sl_distance_pct: Decimal,
    pub min_sl_atr_mult: Decimal,
    pub close_based_stops: bool,
    pub stop_grace_minutes: i64,
    pub score_exit_drop: Decimal,
    pub score_exit_drop_flipped: Decimal,
    pub score_exit_pnl_pct: Decimal,
    pub score_reduce_drop: Decimal,
    pub score_reduce_drop_flipped: Decimal,
    pub score_reduce_fraction: Decimal,
    pub score_partial_drop_floor: Decimal,
    pub score_partial_fraction: Decimal,
    pub max_concurrent_trades: usize,
    pub max_per_symbol_exposure_pct: Decimal,
    pub daily_loss_limit_pct: Decimal,
}

impl Default for RiskManageSettings {
    fn default() -> Self {
        let risk = RiskConfig::default();
        let manage = ManageConfig::default();
        let exec = ExecutionConfig::default();
        let controls = PortfolioControlsConfig::default();
        Self {
            maker_fee: risk.maker_fee,
            taker_fee: risk.taker_fee,
            slippage_bps: dec!(5),
            slip_k: exec.slip_k,
            funding_rate_per_hour: exec.funding_rate_per_hour,
            default_cooldown_hours: risk.cooldown_hours,
            breakeven_enabled: manage.flags.breakeven,
            trailing_stop_enabled: manage.flags.trailing_stop,
            lock_in_enabled: manage.flags.lock_in,
            score_recheck_enabled: manage.flags.score_recheck,
            partial_tp_enabled: manage.flags.partial_tp,
            breakeven_r_multiple: manage.breakeven_r_multiple,
            breakeven_buffer_pct: manage.breakeven_buffer_pct,
            trailing_start_r: manage.trailing_start_r,
            trailing_dist_r: manage.trailing_dist_r,
            lock_in_levels: manage.lock_in_levels,
            lock_in_pnl_pct_levels: manage.lock_in_pnl_pct_levels,
            max_sl_distance_pct: risk.max_sl_distance_pct,
            min_sl_atr_mult: risk.min_sl_atr_mult,
            close_based_stops: manage.close_based_stops,
            stop_grace_minutes: manage.stop_grace_minutes,
            score_exit_drop: manage.score_exit_drop,
            score_exit_drop_flipped: manage.score_exit_drop_flipped,
            score_exit_pnl_pct: manage.score_exit_pnl_pct,
            score_reduce_drop: manage.score_reduce_drop,
            score_reduce_drop_flipped: manage.score_reduce_drop_flipped,
            score_reduce_fraction: manage.score_reduce_fraction,
            score_partial_drop_floor: manage.score_partial_drop_floor,
            score_partial_fraction: manage.score_partial_fraction,
            max_concurrent_trades: controls.max_concurrent_trades,
            max_per_symbol_exposure_pct: controls.max_per_symbol_exposure_pct,
            daily_loss_limit_pct: controls.daily_loss_limit_pct,
        }
    }
}

impl RiskManageSettings {
    pub fn build_risk(&self) -> RiskConfig {
        RiskConfig {
            maker_fee: self.maker_fee,
            taker_fee: self.taker_fee,
            max_sl_distance_pct: self.max_sl_distance_pct,
            min_sl_atr_mult: self.min_sl_atr_mult,
            cooldown_hours: self.default_cooldown_hours,
        }
    }

    pub fn build_manage(&self) -> ManageConfig {
        ManageConfig {
            flags: ManageFeatureFlags {
                breakeven: self.breakeven_enabled,
                trailing_stop: self.trailing_stop_enabled,
                lock_in: self.lock_in_enabled,
                score_recheck: self.score_recheck_enabled,
                partial_tp: self.partial_tp_enabled,
            },
            stop_grace_minutes: self.stop_grace_minutes,
            breakeven_r_multiple: self.breakeven_r_multiple,
            breakeven_buffer_pct: self.breakeven_buffer_pct,
            trailing_start_r: self.trailing_start_r,
            trailing_dist_r: self.trailing_dist_r,
            lock_in_levels: self.lock_in_levels,
            lock_in_pnl_pct_levels: self.lock_in_pnl_pct_levels,
            close_based_stops: self.close_based_stops,
            score_exit_drop: self.score_exit_drop,
            score_exit_drop_flipped: self.score_exit_drop_flipped,
            score_exit_pnl_pct: self.score_exit_pnl_pct,
            score_reduce_drop: self.score_reduce_drop,
            score_reduce_drop_flipped: self.score_reduce_drop_flipped,
            score_reduce_fraction: self.score_reduce_fraction,
            score_partial_drop_floor: self.score_partial_drop_floor,
            score_partial_fraction: self.score_partial_fraction,
        }
    }

    pub fn build_execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            min_slip_bps: self.slippage_bps,
            slip_k: self.slip_k,
            maker_fee: self.maker_fee,
            taker_fee: self.taker_fee,
            funding_rate_per_hour: self.funding_rate_per_hour,
        }
    }

    pub fn build_controls(&self) -> PortfolioControlsConfig {
        PortfolioControlsConfig {
            max_concurrent_trades: self.max_concurrent_trades,
            max_per_symbol_exposure_pct: self.max_per_symbol_exposure_pct,
            daily_loss_limit_pct: self.daily_loss_limit_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: Decimal,
    pub base_timeframe: TimeFrame,
    pub warmup_bars: usize,
    pub btc_reanalysis_interval: u64,
    pub parallel_batch: usize,
    pub per_coin_timeout_ms: u64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        let d = BacktesterConfig::default();
        Self {
            initial_balance: dec!(10000),
            base_timeframe: d.base_timeframe,
            warmup_bars: d.warmup_bars,
            btc_reanalysis_interval: d.btc_reanalysis_interval,
            parallel_batch: d.coin_batch_size,
            per_coin_timeout_ms: d.per_coin_timeout_secs * 1000,
        }
    }
}

impl BacktestSettings {
    pub fn build(&self) -> BacktesterConfig {
        BacktesterConfig {
            base_timeframe: self.base_timeframe,
            higher_timeframes: BacktesterConfig::default().higher_timeframes,
            warmup_bars: self.warmup_bars,
            btc_reanalysis_interval: self.btc_reanalysis_interval,
            coin_batch_size: self.parallel_batch,
            per_coin_timeout_secs: self.per_coin_timeout_ms / 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub tick_interval_ms: u64,
    pub fast_tick_interval_ms: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        let d = LiveLoopConfig::default();
        Self {
            tick_interval_ms: d.tick_interval.as_millis() as u64,
            fast_tick_interval_ms: d.fast_tick_interval.as_millis() as u64,
        }
    }
}

impl LiveSettings {
    pub fn build(&self) -> LiveLoopConfig {
        LiveLoopConfig {
            tick_interval: StdDuration::from_millis(self.tick_interval_ms),
            fast_tick_interval: StdDuration::from_millis(self.fast_tick_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Tracked universe, by stable coin id (e.g. `"bitcoin"`, `"ethereum"`).
    pub universe: Vec<String>,
    pub btc_coin_id: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            universe: vec!["bitcoin".to_string(), "ethereum".to_string(), "solana".to_string()],
            btc_coin_id: Some("bitcoin".to_string()),
        }
    }
}

/// Top-level configuration aggregate. Every section is independently serde-derived so a
/// deployment can override just the keys it cares about from TOML/env (see
/// `RuntimeConfigManager`); `validate()` runs after any partial update is merged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub market_data: MarketDataSettings,
    pub engine: EngineSettings,
    pub risk_manage: RiskManageSettings,
    pub backtest: BacktestSettings,
    pub live: LiveSettings,
    pub general: GeneralSettings,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.risk_manage.max_concurrent_trades == 0 {
            errors.push("risk_manage.max_concurrent_trades must be at least 1".to_string());
        }
        if self.risk_manage.max_per_symbol_exposure_pct <= Decimal::ZERO
            || self.risk_manage.max_per_symbol_exposure_pct > dec!(1)
        {
            errors.push("risk_manage.max_per_symbol_exposure_pct must be in (0, 1]".to_string());
        }
        if self.risk_manage.daily_loss_limit_pct <= Decimal::ZERO {
            errors.push("risk_manage.daily_loss_limit_pct must be positive".to_string());
        }
        if self.risk_manage.max_sl_distance_pct <= Decimal::ZERO {
            errors.push("risk_manage.max_sl_distance_pct must be positive".to_string());
        }
        if self.engine.min_signal_score < Decimal::ZERO || self.engine.min_signal_score > dec!(100) {
            errors.push("engine.min_signal_score must be in [0, 100]".to_string());
        }
        if self.engine.session_start_utc >= 24 || self.engine.session_end_utc >= 24 {
            errors.push("engine.session_start_utc/session_end_utc must be in [0, 24)".to_string());
        }
        if self.backtest.initial_balance <= Decimal::ZERO {
            errors.push("backtest.initial_balance must be positive".to_string());
        }
        if self.backtest.parallel_batch == 0 {
            errors.push("backtest.parallel_batch must be at least 1".to_string());
        }
        if self.general.universe.is_empty() {
            errors.push("general.universe must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_concurrent_trades_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.risk_manage.max_concurrent_trades = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_concurrent_trades")));
    }

    #[test]
    fn market_data_settings_roundtrip_into_duration() {
        let settings = MarketDataSettings::default();
        let built = settings.build();
        assert_eq!(built.refresh_interval, StdDuration::from_secs(300));
        assert_eq!(built.quote_stale, ChronoDuration::seconds(300));
    }

    #[test]
    fn risk_manage_settings_feed_all_four_configs() {
        let settings = RiskManageSettings::default();
        assert_eq!(settings.build_risk().maker_fee, settings.maker_fee);
        assert_eq!(settings.build_execution().maker_fee, settings.maker_fee);
        assert!(settings.build_manage().flags.breakeven);
        assert_eq!(settings.build_controls().max_concurrent_trades, settings.max_concurrent_trades);
    }
}
