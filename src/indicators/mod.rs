// Window statistics for threshold trading

pub mod volatility_band;

pub use volatility_band::{calculate_mean, calculate_std_dev, ThresholdCalculator, Thresholds};
