use serde::{Deserialize, Serialize};

/// Buy and sell trigger prices for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Thresholds {
    pub buy: f64,
    pub sell: f64,
}

/// Calculate the arithmetic mean
pub fn calculate_mean(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }

    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

/// Calculate the population standard deviation (divisor = count)
pub fn calculate_std_dev(prices: &[f64]) -> Option<f64> {
    let mean = calculate_mean(prices)?;
    let variance =
        prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;

    Some(variance.sqrt())
}

/// Derives trigger prices as a band around the window mean
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCalculator {
    buy_multiplier: f64,
    sell_multiplier: f64,
}

impl ThresholdCalculator {
    pub fn new(buy_multiplier: f64, sell_multiplier: f64) -> Self {
        Self {
            buy_multiplier,
            sell_multiplier,
        }
    }

    /// buy = mean - k_buy * stddev, sell = mean + k_sell * stddev
    ///
    /// Fewer than two prices yield the zero pair. Callers gate on
    /// `PriceWindow::is_ready_for_trading` before acting on the result.
    pub fn calculate(&self, prices: &[f64]) -> Thresholds {
        if prices.len() < 2 {
            return Thresholds::default();
        }

        match (calculate_mean(prices), calculate_std_dev(prices)) {
            (Some(mean), Some(std_dev)) => Thresholds {
                buy: mean - self.buy_multiplier * std_dev,
                sell: mean + self.sell_multiplier * std_dev,
            },
            _ => Thresholds::default(),
        }
    }
}

impl Default for ThresholdCalculator {
    fn default() -> Self {
        Self::new(0.8, 1.0)
    }
}
