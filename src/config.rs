use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::BotError;
use crate::models::Token;
use crate::Result;

pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

const ENV_PREFIX: &str = "BANDBOT";

/// Everything the bot can be tuned with
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub window: WindowConfig,
    pub strategy: TradingConfig,
    pub polling: PollingConfig,
    pub pair: PairConfig,
    pub execution: ExecutionConfig,
    pub rpc: RpcConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of samples the statistics are computed over
    pub capacity: usize,
    /// Poll interval while the window is still filling
    pub warmup_interval_secs: u64,
    /// Poll interval once trading is live
    pub steady_interval_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            warmup_interval_secs: 30 * 60, // 30 minutes while building the window
            steady_interval_secs: 60 * 60, // 1 hour once trading
        }
    }
}

impl WindowConfig {
    pub fn warmup_interval(&self) -> Duration {
        Duration::from_secs(self.warmup_interval_secs)
    }

    pub fn steady_interval(&self) -> Duration {
        Duration::from_secs(self.steady_interval_secs)
    }
}

/// Decision engine knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Absolute drop between the last two samples that counts as a crash
    pub price_drop_threshold: f64,
    /// Share of base balance dumped on an emergency sell
    pub emergency_swap_percentage: f64,
    /// Share of the spent balance on a routine buy or sell
    pub normal_swap_percentage: f64,
    /// Quote balance must exceed this to buy
    pub min_quote_balance: f64,
    /// Base balance must exceed this to sell
    pub min_base_balance: f64,
    /// Buy at mean - k * stddev
    pub buy_threshold_multiplier: f64,
    /// Sell at mean + k * stddev
    pub sell_threshold_multiplier: f64,
    /// Move the mode to AfterSell after an emergency sell instead of leaving it untouched
    pub emergency_sets_after_sell: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            price_drop_threshold: 5.4,
            emergency_swap_percentage: 0.92,
            normal_swap_percentage: 0.7,
            min_quote_balance: 5.0,
            min_base_balance: 0.03,
            buy_threshold_multiplier: 0.8,
            sell_threshold_multiplier: 1.0,
            emergency_sets_after_sell: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sleep after a failed cycle before retrying
    pub error_backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            error_backoff_secs: 60,
        }
    }
}

impl PollingConfig {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    pub base: Token,
    pub quote: Token,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            base: Token {
                symbol: "SOL".to_string(),
                mint_address: WRAPPED_SOL_MINT.to_string(),
                decimals: 9,
            },
            quote: Token {
                symbol: "USDC".to_string(),
                mint_address: USDC_MINT.to_string(),
                decimals: 6,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// In-memory wallet, fills at the reference price
    Paper,
    /// Jupiter quotes against the real wallet, simulation only
    Jupiter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Simulate swaps instead of executing them
    pub dry_run: bool,
    pub executor: ExecutorKind,
    pub slippage_bps: u16,
    /// CSV audit log of every attempted swap
    pub log_file: String,
    pub paper_base_balance: f64,
    pub paper_quote_balance: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            executor: ExecutorKind::Paper,
            slippage_bps: 50, // 0.5%
            log_file: "log.csv".to_string(),
            paper_base_balance: 0.0,
            paper_quote_balance: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    /// Wallet public key, balances are read for this owner
    pub wallet_address: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            wallet_address: None,
        }
    }
}

impl BotConfig {
    /// Load from an optional TOML file, then `BANDBOT_<SECTION>__<KEY>` environment overrides
    /// (e.g. `BANDBOT_WINDOW__CAPACITY=12`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.capacity < 2 {
            return Err(config_error(format!(
                "window.capacity must be at least 2, got {}",
                self.window.capacity
            )));
        }
        if self.window.warmup_interval_secs == 0 || self.window.steady_interval_secs == 0 {
            return Err(config_error("window intervals must be positive"));
        }

        let strategy = &self.strategy;
        for (name, value) in [
            ("emergency_swap_percentage", strategy.emergency_swap_percentage),
            ("normal_swap_percentage", strategy.normal_swap_percentage),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(config_error(format!(
                    "strategy.{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("price_drop_threshold", strategy.price_drop_threshold),
            ("min_quote_balance", strategy.min_quote_balance),
            ("min_base_balance", strategy.min_base_balance),
            ("buy_threshold_multiplier", strategy.buy_threshold_multiplier),
            ("sell_threshold_multiplier", strategy.sell_threshold_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(config_error(format!(
                    "strategy.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.pair.base.mint_address == self.pair.quote.mint_address {
            return Err(config_error("pair.base and pair.quote must be different tokens"));
        }

        if self.execution.executor == ExecutorKind::Jupiter {
            if !self.execution.dry_run {
                return Err(config_error(
                    "live execution needs a transaction signer; the jupiter executor only simulates (set execution.dry_run = true)",
                ));
            }
            if self.rpc.wallet_address.is_none() {
                return Err(config_error(
                    "rpc.wallet_address is required with the jupiter executor",
                ));
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> BotError {
    BotError::Config(message.into())
}
