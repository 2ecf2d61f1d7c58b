pub mod dexscreener;
pub mod jupiter;
pub mod solana_rpc;

pub use dexscreener::{DexScreenerClient, PairPriceFeed, ResolvedPair};
pub use jupiter::{JupiterClient, JupiterSwapExecutor, Quote};
pub use solana_rpc::SolanaRpcClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{SwapReceipt, Token, TradeIntent};
use crate::Result;

/// Current price of the pair, quote units per base unit
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self) -> Result<f64>;
}

/// Wallet balance of one token, in whole units
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn get_balance(&self, token: &Token) -> Result<f64>;
}

/// Sends (or simulates) the swap for an intent
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute(&self, intent: &TradeIntent) -> Result<SwapReceipt>;

    /// Dry-run path, must not move funds
    async fn simulate(&self, intent: &TradeIntent) -> Result<SwapReceipt>;
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for Arc<T> {
    async fn fetch_price(&self) -> Result<f64> {
        (**self).fetch_price().await
    }
}

#[async_trait]
impl<T: BalanceSource + ?Sized> BalanceSource for Arc<T> {
    async fn get_balance(&self, token: &Token) -> Result<f64> {
        (**self).get_balance(token).await
    }
}

#[async_trait]
impl<T: SwapExecutor + ?Sized> SwapExecutor for Arc<T> {
    async fn execute(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        (**self).execute(intent).await
    }

    async fn simulate(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        (**self).simulate(intent).await
    }
}
