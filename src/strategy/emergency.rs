use crate::execution::PriceWindow;
use crate::models::TradingMode;

/// Flags a crash between the two most recent samples while holding base
#[derive(Debug, Clone, Copy)]
pub struct EmergencyDetector {
    drop_threshold: f64,
}

impl EmergencyDetector {
    /// # Arguments
    /// * `drop_threshold` - Absolute drop in quote units, e.g. 5.4 USDC
    pub fn new(drop_threshold: f64) -> Self {
        Self { drop_threshold }
    }

    /// second newest - newest, None with fewer than two samples
    pub fn price_drop(window: &PriceWindow) -> Option<f64> {
        window
            .last_two()
            .map(|(previous, current)| previous - current)
    }

    /// Strictly greater drop than the threshold, and only after a buy
    pub fn is_eligible(&self, window: &PriceWindow, mode: TradingMode) -> bool {
        if mode != TradingMode::AfterBuy {
            return false;
        }

        match Self::price_drop(window) {
            Some(drop) => drop > self.drop_threshold,
            None => false,
        }
    }
}
