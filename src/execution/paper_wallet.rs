use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::{BalanceSource, SwapExecutor};
use crate::error::{BotError, CollaboratorKind};
use crate::models::{Balances, SwapReceipt, SwapStatus, Token, TradeDirection, TradeIntent};
use crate::Result;

/// In-memory wallet that fills every swap at the intent's reference price
///
/// Serves as both balance source and swap executor for paper trading and backtests.
pub struct PaperWallet {
    base: Token,
    quote: Token,
    balances: Mutex<Balances>,
    fail_next: AtomicU32,
}

impl PaperWallet {
    pub fn new(base: Token, quote: Token, balances: Balances) -> Self {
        Self {
            base,
            quote,
            balances: Mutex::new(balances),
            fail_next: AtomicU32::new(0),
        }
    }

    pub fn balances(&self) -> Balances {
        self.balances
            .lock()
            .map(|b| *b)
            .unwrap_or_else(|e| *e.into_inner())
    }

    /// Make the next `count` swap calls fail with a transient error
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Quote-denominated value of the wallet at `price`
    pub fn mark_to_market(&self, price: f64) -> f64 {
        let balances = self.balances();
        balances.quote + balances.base * price
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Balances after filling `intent`, or why it cannot be filled
    fn fill(&self, balances: Balances, intent: &TradeIntent) -> Result<(Balances, f64)> {
        if intent.amount <= 0.0 || intent.reference_price <= 0.0 {
            return Err(BotError::SwapRejected {
                direction: intent.direction,
                message: format!(
                    "Invalid amount {} at price {}",
                    intent.amount, intent.reference_price
                ),
            });
        }

        let (available, symbol) = match intent.direction {
            TradeDirection::Buy => (balances.quote, &self.quote.symbol),
            TradeDirection::Sell | TradeDirection::EmergencySell => {
                (balances.base, &self.base.symbol)
            }
        };
        if intent.amount > available {
            return Err(BotError::SwapRejected {
                direction: intent.direction,
                message: format!(
                    "Insufficient {}: need {:.6}, have {:.6}",
                    symbol, intent.amount, available
                ),
            });
        }

        Ok(match intent.direction {
            TradeDirection::Buy => {
                let out = intent.amount / intent.reference_price;
                (
                    Balances {
                        base: balances.base + out,
                        quote: balances.quote - intent.amount,
                    },
                    out,
                )
            }
            TradeDirection::Sell | TradeDirection::EmergencySell => {
                let out = intent.amount * intent.reference_price;
                (
                    Balances {
                        base: balances.base - intent.amount,
                        quote: balances.quote + out,
                    },
                    out,
                )
            }
        })
    }
}

#[async_trait]
impl BalanceSource for PaperWallet {
    async fn get_balance(&self, token: &Token) -> Result<f64> {
        let balances = self.balances();
        if token.mint_address == self.base.mint_address {
            Ok(balances.base)
        } else if token.mint_address == self.quote.mint_address {
            Ok(balances.quote)
        } else {
            Err(BotError::transient(
                CollaboratorKind::Balance,
                format!("Paper wallet does not hold {}", token.symbol),
            ))
        }
    }
}

#[async_trait]
impl SwapExecutor for PaperWallet {
    async fn execute(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        if self.take_failure() {
            return Err(BotError::transient(
                CollaboratorKind::Swap,
                "Injected paper swap failure",
            ));
        }

        let mut balances = self
            .balances
            .lock()
            .map_err(|e| BotError::Invariant(format!("Paper wallet poisoned: {}", e)))?;
        let (next, out) = self.fill(*balances, intent)?;
        *balances = next;

        Ok(SwapReceipt {
            transaction_id: Some(format!("paper-{}", Uuid::new_v4())),
            status: SwapStatus::Success,
            out_amount: Some(out),
        })
    }

    async fn simulate(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        if self.take_failure() {
            return Err(BotError::transient(
                CollaboratorKind::Swap,
                "Injected paper swap failure",
            ));
        }

        let (_, out) = self.fill(self.balances(), intent)?;

        Ok(SwapReceipt {
            transaction_id: None,
            status: SwapStatus::Simulated,
            out_amount: Some(out),
        })
    }
}
