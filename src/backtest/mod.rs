pub mod runner;
pub mod synthetic;

pub use runner::{BacktestReport, BacktestRunner, ReplayPrices};
pub use synthetic::{MarketScenario, SyntheticPriceGenerator};
