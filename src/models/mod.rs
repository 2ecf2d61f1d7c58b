use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tradable token on the pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub symbol: String,
    pub mint_address: String, // Solana mint address
    pub decimals: u8,
}

impl Token {
    /// Native SOL is not an SPL token account, balances come from the wallet itself
    pub fn is_native_sol(&self) -> bool {
        self.mint_address == crate::config::WRAPPED_SOL_MINT
    }
}

/// One observed price, quote units per base unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceSample {
    pub fn now(price: f64) -> Self {
        Self {
            price,
            timestamp: Utc::now(),
        }
    }
}

/// Which swap direction most recently executed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TradingMode {
    #[default]
    Initial,
    AfterSell,
    AfterBuy,
}

impl TradingMode {
    /// Numeric flag as it appears in logs: 0 initial, 1 after sell, -1 after buy
    pub fn as_flag(&self) -> i8 {
        match self {
            TradingMode::Initial => 0,
            TradingMode::AfterSell => 1,
            TradingMode::AfterBuy => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeDirection {
    /// Spend quote asset to acquire base asset
    Buy,
    /// Dispose of base asset for quote asset
    Sell,
    /// Protective sell after a sharp drop
    EmergencySell,
}

impl TradeDirection {
    /// Whether the intent amount is denominated in the base asset
    pub fn spends_base(&self) -> bool {
        !matches!(self, TradeDirection::Buy)
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
            TradeDirection::EmergencySell => "EMERGENCY_SELL",
        };
        f.write_str(name)
    }
}

/// What the decision engine wants the swap executor to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TradeIntent {
    pub direction: TradeDirection,
    /// Quote units for a buy, base units for a sell
    pub amount: f64,
    pub reference_price: f64,
}

/// Wallet balances fetched fresh each ready cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Balances {
    pub base: f64,
    pub quote: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwapStatus {
    Success,
    Failed,
    Simulated,
}

/// What the swap executor reports back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapReceipt {
    pub transaction_id: Option<String>,
    pub status: SwapStatus,
    /// Expected or filled output amount, when the executor knows it
    pub out_amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwapType {
    Buy,
    Sell,
}

impl From<TradeDirection> for SwapType {
    fn from(direction: TradeDirection) -> Self {
        match direction {
            TradeDirection::Buy => SwapType::Buy,
            TradeDirection::Sell | TradeDirection::EmergencySell => SwapType::Sell,
        }
    }
}

/// Append-only audit record, one per attempted trade
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapLogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub swap_type: SwapType,
    pub amount: f64,
    pub price: f64,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
    pub status: SwapStatus,
}

impl SwapLogRecord {
    pub fn new(intent: &TradeIntent, transaction_id: Option<String>, status: SwapStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            swap_type: intent.direction.into(),
            amount: intent.amount,
            price: intent.reference_price,
            transaction_id,
            status,
        }
    }

    pub fn failed(intent: &TradeIntent) -> Self {
        Self::new(intent, None, SwapStatus::Failed)
    }
}
