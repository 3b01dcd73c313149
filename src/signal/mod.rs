pub mod engine;
pub mod regime;
pub mod scoring;
pub mod strategies;

pub use engine::*;
pub use strategies::{StrategyStats, StrategyStatsTable, StrategyWeights};
