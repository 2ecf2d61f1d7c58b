use crate::config::TradingConfig;
use crate::error::BotError;
use crate::execution::PriceWindow;
use crate::indicators::{ThresholdCalculator, Thresholds};
use crate::models::{Balances, TradeDirection, TradeIntent, TradingMode};
use crate::strategy::EmergencyDetector;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionAction {
    Execute(TradeIntent),
    Skip,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub action: DecisionAction,
    pub reason: String,
    /// None on the emergency path, which never looks at the band
    pub thresholds: Option<Thresholds>,
}

impl Decision {
    fn skip(reason: impl Into<String>, thresholds: Option<Thresholds>) -> Self {
        Self {
            action: DecisionAction::Skip,
            reason: reason.into(),
            thresholds,
        }
    }

    pub fn intent(&self) -> Option<&TradeIntent> {
        match &self.action {
            DecisionAction::Execute(intent) => Some(intent),
            DecisionAction::Skip => None,
        }
    }
}

/// Turns window, price and balances into at most one trade per cycle
///
/// Owns the trading mode. `decide` never mutates it; the caller reports a
/// dispatched trade back through `record_execution` once the swap went through.
pub struct DecisionEngine {
    config: TradingConfig,
    calculator: ThresholdCalculator,
    detector: EmergencyDetector,
    mode: TradingMode,
}

impl DecisionEngine {
    pub fn new(config: TradingConfig) -> Self {
        Self {
            calculator: ThresholdCalculator::new(
                config.buy_threshold_multiplier,
                config.sell_threshold_multiplier,
            ),
            detector: EmergencyDetector::new(config.price_drop_threshold),
            config,
            mode: TradingMode::Initial,
        }
    }

    /// Start from a known mode
    pub fn with_mode(mut self, mode: TradingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    /// Decide what to do this cycle
    ///
    /// Order: emergency sell, then buy, then sell. Threshold comparisons are
    /// inclusive. The window must already hold the current price.
    pub fn decide(
        &self,
        window: &PriceWindow,
        current_price: f64,
        balances: Balances,
    ) -> Result<Decision> {
        if !window.is_ready_for_trading() {
            return Err(BotError::Invariant(format!(
                "decision requested with {}/{} samples",
                window.len(),
                window.capacity()
            )));
        }

        if self.detector.is_eligible(window, self.mode) {
            let drop = EmergencyDetector::price_drop(window).unwrap_or_default();
            if balances.base > 0.0 {
                return Ok(Decision {
                    action: DecisionAction::Execute(TradeIntent {
                        direction: TradeDirection::EmergencySell,
                        amount: balances.base * self.config.emergency_swap_percentage,
                        reference_price: current_price,
                    }),
                    reason: format!(
                        "Price dropped {:.2} (> {:.2}) while holding base",
                        drop, self.config.price_drop_threshold
                    ),
                    thresholds: None,
                });
            }

            return Ok(Decision::skip(
                format!("Price dropped {:.2} but no base balance to protect", drop),
                None,
            ));
        }

        let thresholds = self.calculator.calculate(&window.prices());

        if current_price <= thresholds.buy && balances.quote > self.config.min_quote_balance {
            return Ok(Decision {
                action: DecisionAction::Execute(TradeIntent {
                    direction: TradeDirection::Buy,
                    amount: balances.quote * self.config.normal_swap_percentage,
                    reference_price: current_price,
                }),
                reason: format!(
                    "Price {:.4} at or below buy threshold {:.4}",
                    current_price, thresholds.buy
                ),
                thresholds: Some(thresholds),
            });
        }

        if current_price >= thresholds.sell && balances.base > self.config.min_base_balance {
            return Ok(Decision {
                action: DecisionAction::Execute(TradeIntent {
                    direction: TradeDirection::Sell,
                    amount: balances.base * self.config.normal_swap_percentage,
                    reference_price: current_price,
                }),
                reason: format!(
                    "Price {:.4} at or above sell threshold {:.4}",
                    current_price, thresholds.sell
                ),
                thresholds: Some(thresholds),
            });
        }

        Ok(Decision::skip(
            "Price within thresholds or balance conditions not met",
            Some(thresholds),
        ))
    }

    /// Mode the engine moves to once `intent` has been executed
    pub fn mode_after(&self, intent: &TradeIntent) -> TradingMode {
        match intent.direction {
            TradeDirection::Buy => TradingMode::AfterBuy,
            TradeDirection::Sell => TradingMode::AfterSell,
            TradeDirection::EmergencySell if self.config.emergency_sets_after_sell => {
                TradingMode::AfterSell
            }
            TradeDirection::EmergencySell => self.mode,
        }
    }

    /// Apply the mode transition for an executed trade
    pub fn record_execution(&mut self, intent: &TradeIntent) {
        let next = self.mode_after(intent);
        if next != self.mode {
            tracing::info!(
                from = self.mode.as_flag(),
                to = next.as_flag(),
                direction = %intent.direction,
                "Trading mode changed"
            );
        }
        self.mode = next;
    }
}
