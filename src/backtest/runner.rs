use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::PriceSource;
use crate::config::BotConfig;
use crate::error::{BotError, CollaboratorKind};
use crate::execution::{MemorySwapLog, PaperWallet, PollingLoop};
use crate::models::{Balances, TradeDirection};
use crate::Result;

/// Feeds a fixed price series, one sample per call
pub struct ReplayPrices {
    prices: Vec<f64>,
    cursor: AtomicUsize,
}

impl ReplayPrices {
    pub fn new(prices: Vec<f64>) -> Self {
        Self {
            prices,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceSource for ReplayPrices {
    async fn fetch_price(&self) -> Result<f64> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(i)
            .copied()
            .ok_or_else(|| BotError::transient(CollaboratorKind::Price, "Price series exhausted"))
    }
}

/// Outcome of one replay
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub cycles: usize,
    pub buys: usize,
    pub sells: usize,
    pub emergency_sells: usize,
    pub failed_cycles: usize,
    /// Audit records written, one per attempted trade
    pub swap_records: usize,
    pub initial_value: f64,
    pub final_value: f64,
    pub final_balances: Balances,
}

impl BacktestReport {
    pub fn total_trades(&self) -> usize {
        self.buys + self.sells + self.emergency_sells
    }

    pub fn return_pct(&self) -> f64 {
        if self.initial_value == 0.0 {
            return 0.0;
        }
        (self.final_value - self.initial_value) / self.initial_value * 100.0
    }
}

/// Replays a price series through the live polling loop against a paper wallet
pub struct BacktestRunner {
    config: BotConfig,
    starting_balances: Balances,
}

impl BacktestRunner {
    pub fn new(config: BotConfig, starting_balances: Balances) -> Self {
        let mut config = config;
        // Paper fills only make sense executed
        config.execution.dry_run = false;
        Self {
            config,
            starting_balances,
        }
    }

    pub async fn run(&self, prices: Vec<f64>) -> Result<BacktestReport> {
        let (first, last) = match (prices.first(), prices.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(BotError::Config(
                    "Backtest needs at least one price".to_string(),
                ))
            }
        };
        if prices.len() < self.config.window.capacity {
            return Err(BotError::Config(format!(
                "Not enough prices for backtest. Need {}, got {}",
                self.config.window.capacity,
                prices.len()
            )));
        }

        if let Some(bad) = prices.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(BotError::Config(format!("Invalid price {} in backtest series", bad)));
        }

        let cycles = prices.len();
        let wallet = Arc::new(PaperWallet::new(
            self.config.pair.base.clone(),
            self.config.pair.quote.clone(),
            self.starting_balances,
        ));
        let log = Arc::new(MemorySwapLog::new());
        let mut bot = PollingLoop::new(
            &self.config,
            ReplayPrices::new(prices),
            wallet.clone(),
            wallet.clone(),
            log.clone(),
        );

        let mut buys = 0;
        let mut sells = 0;
        let mut emergency_sells = 0;
        let mut failed_cycles = 0;

        for _ in 0..cycles {
            match bot.run_cycle().await {
                Ok(report) => {
                    let executed = report
                        .decision
                        .as_ref()
                        .and_then(|d| d.intent())
                        .map(|intent| intent.direction);
                    match executed {
                        Some(TradeDirection::Buy) => buys += 1,
                        Some(TradeDirection::Sell) => sells += 1,
                        Some(TradeDirection::EmergencySell) => emergency_sells += 1,
                        None => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!("Backtest cycle failed: {}", e);
                    failed_cycles += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let initial_value = self.starting_balances.quote + self.starting_balances.base * first;

        Ok(BacktestReport {
            cycles,
            buys,
            sells,
            emergency_sells,
            failed_cycles,
            swap_records: log.records().len(),
            initial_value,
            final_value: wallet.mark_to_market(last),
            final_balances: wallet.balances(),
        })
    }
}
