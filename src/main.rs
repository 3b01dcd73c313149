mod types;
mod indicators;
mod signal;
mod risk;
mod manage;
mod execution;
mod backtest;
mod persistence;
mod live;
mod marketdata;
mod config;
mod web;
mod notifications;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal_macros::dec;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use backtest::{run_backtest as run_backtest_fleet, run_walk_forward, Backtester, BacktesterConfig, CoinCandleSet};
use config::{RuntimeConfig, RuntimeConfigManager, StrategyConfig};
use execution::ExecutionSim;
use live::{BotController, LiveLoop};
use manage::ManageEngine;
use marketdata::{BinanceCandleProvider, CandleProvider, CoinGeckoQuoteProvider, MarketDataService, QuoteProvider};
use notifications::NotificationManager;
use persistence::{InMemoryRepository, SqliteRepository, TradeRepository, UserRepository};
use risk::RiskEngine;
use signal::{EvaluateOptions, SignalEngine};
use types::{CandleSlice, CoinId, CoinMeta, TimeFrame};

const USER_ID: &str = "local";

#[derive(Parser)]
#[command(name = "confluence")]
#[command(version = "0.1.0")]
#[command(about = "Signal, risk, position-management and backtesting pipeline for crypto markets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Ultra,
    Conservative,
}

impl ProfileArg {
    fn into_config(self) -> StrategyConfig {
        match self {
            ProfileArg::Ultra => StrategyConfig::ultra_aggressive(),
            ProfileArg::Conservative => StrategyConfig::conservative_5year(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live/manage loop against simulated fills, state kept in-memory only.
    Paper {
        #[arg(long, value_enum, default_value = "conservative")]
        profile: ProfileArg,
        /// Port for the status/control web surface. Omit to run headless.
        #[arg(long)]
        web_port: Option<u16>,
    },
    /// Run the live/manage loop persisting to sqlite. Order execution still runs through
    /// ExecutionSim's simulated fills; placing real exchange orders is an adapter the core
    /// does not implement.
    Live {
        #[arg(long, value_enum, default_value = "conservative")]
        profile: ProfileArg,
        #[arg(long, default_value = "sqlite:./confluence.db")]
        db_path: String,
        /// Port for the status/control web surface. Omit to run headless.
        #[arg(long)]
        web_port: Option<u16>,
    },
    /// Replay historical candles through the same signal/risk/manage/execution pipeline.
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end: String,
        #[arg(long, value_enum, default_value = "conservative")]
        profile: ProfileArg,
        /// Run walk-forward validation with N windows instead of a single pass.
        #[arg(long)]
        walk_forward: Option<usize>,
    },
    /// Print current quotes for the tracked universe.
    Prices,
    /// Evaluate the signal engine for one coin (or the whole universe) right now.
    Analyze {
        /// CoinGecko-style id, e.g. "bitcoin". All tracked coins if omitted.
        #[arg(short, long)]
        coin: Option<String>,
    },
    /// Print the default runtime configuration.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Paper { profile, web_port } => run_live(profile, None, web_port).await?,
        Commands::Live { profile, db_path, web_port } => run_live(profile, Some(db_path), web_port).await?,
        Commands::Backtest { start, end, profile, walk_forward } => {
            run_backtest(&start, &end, profile, walk_forward).await?
        }
        Commands::Prices => show_prices().await?,
        Commands::Analyze { coin } => analyze(coin).await?,
        Commands::Status => show_status(),
    }

    Ok(())
}

fn parse_date(s: &str) -> Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date {}", s))?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid")))
}

/// Every coin's exchange symbol mapped for `BinanceCandleProvider`, built from the tracked
/// universe metadata rather than hardcoded.
fn symbol_map(universe: &[CoinMeta]) -> HashMap<CoinId, String> {
    universe.iter().map(|m| (m.coin_id.clone(), m.exchange_symbol.clone())).collect()
}

fn build_market_data(universe: Vec<CoinMeta>, cfg: marketdata::MarketDataConfig) -> Arc<MarketDataService> {
    let quote_providers: Vec<Arc<dyn QuoteProvider>> = vec![Arc::new(CoinGeckoQuoteProvider::new())];
    let candle_providers: Vec<Arc<dyn CandleProvider>> =
        vec![Arc::new(BinanceCandleProvider::new(symbol_map(&universe)))];
    Arc::new(MarketDataService::new(cfg, universe, quote_providers, candle_providers))
}

async fn run_live(profile: ProfileArg, db_path: Option<String>, web_port: Option<u16>) -> Result<()> {
    let strategy = profile.into_config();
    info!("starting live loop with profile {:?}", strategy.profile);

    let mut runtime_config = RuntimeConfig::default();
    runtime_config.general.universe = strategy.universe.iter().map(|c| c.as_str().to_string()).collect();
    let config_manager = Arc::new(RuntimeConfigManager::new(runtime_config));
    let runtime_config = config_manager.get_config().await;

    let universe = CoinMeta::default_universe()
        .into_iter()
        .filter(|m| strategy.universe.contains(&m.coin_id))
        .collect::<Vec<_>>();
    let btc_coin_id = runtime_config.general.btc_coin_id.clone().map(CoinId::new);

    let market_data = build_market_data(universe.clone(), runtime_config.market_data.build());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let md_task = tokio::spawn(Arc::clone(&market_data).run(shutdown_rx.clone()));
    market_data.wait_until_quotes_ready().await;

    let (trades, users): (Arc<dyn TradeRepository>, Arc<dyn UserRepository>) = match db_path {
        Some(path) => {
            let repo = Arc::new(SqliteRepository::connect(&path).await.context("opening sqlite repository")?);
            (repo.clone(), repo)
        }
        None => {
            let repo = Arc::new(InMemoryRepository::new());
            repo.seed_user(USER_ID, strategy.user_settings()).await;
            (repo.clone(), repo)
        }
    };

    let controller = Arc::new(BotController::new());
    controller.start().await.map_err(anyhow::Error::msg)?;
    let notifications = Arc::new(NotificationManager::new());
    notifications.notify(notifications::AlertType::BotStarted).await;

    let live_loop = Arc::new(LiveLoop::new(
        runtime_config.live.build(),
        USER_ID.to_string(),
        universe,
        btc_coin_id,
        Arc::clone(&market_data),
        trades,
        users,
        SignalEngine::new(runtime_config.engine.build()),
        RiskEngine::new(runtime_config.risk_manage.build_risk()),
        ManageEngine::new(runtime_config.risk_manage.build_manage()),
        ExecutionSim::new(runtime_config.risk_manage.build_execution()),
        runtime_config.risk_manage.build_controls(),
        Arc::clone(&controller),
        Arc::clone(&notifications),
    ));

    let loop_task = tokio::spawn(Arc::clone(&live_loop).run(shutdown_rx.clone()));

    let web_task = web_port.map(|port| {
        let state = web::AppState {
            controller: Arc::clone(&controller),
            notifications: Arc::clone(&notifications),
            config_manager: Arc::clone(&config_manager),
        };
        tokio::spawn(async move {
            if let Err(e) = web::serve(state, port).await {
                error!("web surface stopped: {}", e);
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    notifications.notify(notifications::AlertType::BotStopped).await;
    let _ = shutdown_tx.send(true);
    let _ = md_task.await;
    let _ = loop_task.await;
    if let Some(task) = web_task {
        task.abort();
    }
    controller.stop().await.map_err(anyhow::Error::msg)?;

    Ok(())
}

async fn run_backtest(start: &str, end: &str, profile: ProfileArg, walk_forward: Option<usize>) -> Result<()> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let strategy = profile.into_config();
    let settings = strategy.user_settings();

    let candle_provider = BinanceCandleProvider::new(symbol_map(&CoinMeta::default_universe()));
    let universe = CoinMeta::default_universe()
        .into_iter()
        .filter(|m| strategy.universe.contains(&m.coin_id))
        .collect::<Vec<_>>();

    let mut coin_sets = Vec::with_capacity(universe.len());
    for meta in &universe {
        let mut by_timeframe = BTreeMap::new();
        for tf in TimeFrame::all() {
            let candles = candle_provider
                .fetch_historical_candles(&meta.coin_id, tf, start.timestamp_millis(), end.timestamp_millis())
                .await
                .with_context(|| format!("fetching {} {} candles", meta.coin_id, tf))?;
            by_timeframe.insert(tf, candles);
        }
        coin_sets.push(CoinCandleSet { coin_id: meta.coin_id.clone(), candles: by_timeframe });
    }

    let cfg = BacktesterConfig::default();
    let backtester = Arc::new(Backtester::default());
    let btc_candles = coin_sets.iter().find(|c| c.coin_id.as_str() == "bitcoin").cloned().map(Arc::new);

    if let Some(windows) = walk_forward {
        for coin_set in &coin_sets {
            let result = run_walk_forward(
                backtester.as_ref(),
                coin_set,
                btc_candles.as_deref(),
                &settings,
                &cfg,
                start,
                end,
                windows,
                dec!(0.25),
            );
            info!(
                "{}: aggregate OOS return {:.2}%, sharpe {:.2}",
                coin_set.coin_id, result.aggregate_oos_return_pct, result.aggregate_oos_sharpe
            );
        }
        return Ok(());
    }

    let aggregate = run_backtest_fleet(
        backtester,
        coin_sets,
        btc_candles,
        settings,
        cfg,
        start,
        end,
        dec!(10000),
    )
    .await;

    for (coin_id, result) in &aggregate.per_coin {
        info!(
            "{}: {} trades, win rate {:.1}%, pnl {:.2}, sharpe {:.2}",
            coin_id,
            result.summary.total_trades,
            result.summary.win_rate,
            result.summary.total_pnl,
            result.summary.sharpe_ratio
        );
    }
    info!(
        "combined: {} trades, pnl {:.2}, max drawdown {:.2}%",
        aggregate.combined_summary.total_trades,
        aggregate.combined_summary.total_pnl,
        aggregate.combined_summary.max_drawdown_pct
    );

    Ok(())
}

async fn show_prices() -> Result<()> {
    let universe = CoinMeta::default_universe();
    let market_data = build_market_data(universe.clone(), marketdata::MarketDataConfig::default());
    market_data.refresh_quotes_if_due().await;

    for meta in &universe {
        match market_data.get_quote(&meta.coin_id).await {
            Some(quote) => info!("{:<10} ${:>12.4}  24h {:+.2}%", meta.display_symbol, quote.price_usd, quote.change_24h_pct),
            None => info!("{:<10} no quote available", meta.display_symbol),
        }
    }
    Ok(())
}

async fn analyze(coin: Option<String>) -> Result<()> {
    let universe = CoinMeta::default_universe();
    let targets: Vec<CoinMeta> = match coin {
        Some(id) => universe.into_iter().filter(|m| m.coin_id.as_str() == id).collect(),
        None => universe,
    };
    if targets.is_empty() {
        error!("no matching coin in the tracked universe");
        return Ok(());
    }

    let market_data = build_market_data(targets.clone(), marketdata::MarketDataConfig::default());
    market_data.refresh_quotes_if_due().await;
    market_data.refresh_candles_once().await;

    let signal_engine = SignalEngine::new(signal::EngineConfig::default());

    for meta in &targets {
        let Some(quote) = market_data.get_quote(&meta.coin_id).await else {
            info!("{}: no quote available", meta.display_symbol);
            continue;
        };
        let Some(by_timeframe) = market_data.get_candles(&meta.coin_id).await else {
            info!("{}: no candles available", meta.display_symbol);
            continue;
        };
        let slice = CandleSlice { by_timeframe };
        let decision = signal_engine.evaluate(&slice, quote.price_usd, &EvaluateOptions::default());

        info!(
            "{}: score {:.1} side {:?} regime {:?} strategy {:?}",
            meta.display_symbol, decision.score, decision.side, decision.regime, decision.strategy
        );
        for reason in &decision.reasoning {
            info!("  - {}", reason);
        }
    }

    Ok(())
}

fn show_status() {
    let config = RuntimeConfig::default();
    info!("universe: {:?}", config.general.universe);
    info!("min signal score: {}", config.engine.min_signal_score);
    info!("max concurrent trades: {}", config.risk_manage.max_concurrent_trades);
    info!("daily loss limit: {}%", config.risk_manage.daily_loss_limit_pct);
}
