use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

use crate::api::PriceSource;
use crate::error::{BotError, CollaboratorKind};
use crate::models::Token;
use crate::Result;

const DEXSCREENER_API_BASE: &str = "https://api.dexscreener.com/latest/dex";
const CHAIN_ID: &str = "solana";
const MAX_RETRIES: u32 = 3;
const RETRY_LIMIT: u32 = 10;
const INITIAL_BACKOFF_MS: u64 = 2000; // Start with 2 seconds

/// Client for DexScreener API
#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairData {
    chain_id: String,
    pair_address: String,
    base_token: TokenInfo,
    quote_token: TokenInfo,
    price_native: String,
    #[serde(default)]
    liquidity: Option<Liquidity>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    address: String,
}

#[derive(Debug, Deserialize, Default)]
struct Liquidity {
    #[serde(default)]
    usd: Option<f64>,
}

/// The pool prices are read from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPair {
    pub pair_address: String,
    pub liquidity_usd: f64,
}

impl DexScreenerClient {
    pub fn new() -> Self {
        Self::with_base_url(DEXSCREENER_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override retry behaviour (tests use millisecond backoffs)
    pub fn with_retry(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries.clamp(1, RETRY_LIMIT);
        self.initial_backoff = initial_backoff;
        self
    }

    /// Find the deepest Solana pool trading `base` against `quote`
    ///
    /// No matching pool is a configuration error: the bot cannot run on a
    /// pair that does not exist.
    pub async fn resolve_pair(&self, base: &Token, quote: &Token) -> Result<ResolvedPair> {
        let url = format!("{}/tokens/{}", self.base_url, base.mint_address);
        let pairs = self.get_pairs(&url).await?;

        pairs
            .into_iter()
            .filter(|p| {
                p.chain_id == CHAIN_ID
                    && p.base_token.address == base.mint_address
                    && p.quote_token.address == quote.mint_address
            })
            .map(|p| ResolvedPair {
                liquidity_usd: p.liquidity.and_then(|l| l.usd).unwrap_or(0.0),
                pair_address: p.pair_address,
            })
            .max_by(|a, b| a.liquidity_usd.total_cmp(&b.liquidity_usd))
            .ok_or_else(|| {
                BotError::Config(format!(
                    "No {} pool found for {}/{}",
                    CHAIN_ID, base.symbol, quote.symbol
                ))
            })
    }

    /// Current native price of a pair, with retry and exponential backoff
    pub async fn get_pair_price(&self, pair_address: &str) -> Result<f64> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.fetch_pair_price_once(pair_address).await {
                Ok(price) => {
                    if attempt > 1 {
                        tracing::info!(
                            "✓ Successfully fetched {} after {} attempts",
                            pair_address,
                            attempt
                        );
                    }
                    return Ok(price);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let backoff = self.backoff_for(attempt);
                        tracing::warn!(
                            "Attempt {}/{} failed for {}: {}. Retrying in {:?}...",
                            attempt,
                            self.max_retries,
                            pair_address,
                            e,
                            backoff
                        );
                        sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BotError::transient(CollaboratorKind::Price, "All retry attempts failed")
        }))
    }

    /// Delay after failed `attempt` (1-based), doubling each time
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    async fn fetch_pair_price_once(&self, pair_address: &str) -> Result<f64> {
        let url = format!("{}/pairs/{}/{}", self.base_url, CHAIN_ID, pair_address);
        let pairs = self.get_pairs(&url).await?;

        let pair = pairs
            .into_iter()
            .find(|p| p.pair_address == pair_address)
            .ok_or_else(|| {
                BotError::transient(
                    CollaboratorKind::Price,
                    format!("Pair {} missing from response", pair_address),
                )
            })?;

        let price: f64 = pair
            .price_native
            .parse()
            .map_err(|e| BotError::transient(CollaboratorKind::Price, e))?;

        if !price.is_finite() || price <= 0.0 {
            return Err(BotError::transient(
                CollaboratorKind::Price,
                format!("Invalid price {} for {}", price, pair_address),
            ));
        }

        Ok(price)
    }

    async fn get_pairs(&self, url: &str) -> Result<Vec<PairData>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BotError::transient(CollaboratorKind::Price, e))?;

        let body: DexScreenerResponse = response
            .json()
            .await
            .map_err(|e| BotError::transient(CollaboratorKind::Price, e))?;

        Ok(body.pairs.unwrap_or_default())
    }
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Price source bound to one resolved pool
#[derive(Clone)]
pub struct PairPriceFeed {
    client: DexScreenerClient,
    pair: ResolvedPair,
}

impl PairPriceFeed {
    pub fn new(client: DexScreenerClient, pair: ResolvedPair) -> Self {
        Self { client, pair }
    }

    pub fn pair(&self) -> &ResolvedPair {
        &self.pair
    }
}

#[async_trait]
impl PriceSource for PairPriceFeed {
    async fn fetch_price(&self) -> Result<f64> {
        self.client.get_pair_price(&self.pair.pair_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairConfig;

    fn pair_json(pair_address: &str, base: &str, quote: &str, price: &str, liquidity: f64) -> String {
        format!(
            r#"{{"chainId":"solana","dexId":"raydium","pairAddress":"{}","baseToken":{{"address":"{}","symbol":"SOL"}},"quoteToken":{{"address":"{}","symbol":"USDC"}},"priceNative":"{}","priceUsd":"{}","liquidity":{{"usd":{}}}}}"#,
            pair_address, base, quote, price, price, liquidity
        )
    }

    fn sol_usdc() -> (Token, Token) {
        let pair = PairConfig::default();
        (pair.base, pair.quote)
    }

    #[tokio::test]
    async fn test_resolve_pair_picks_deepest_pool() {
        let (base, quote) = sol_usdc();
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            r#"{{"schemaVersion":"1.0.0","pairs":[{},{},{}]}}"#,
            pair_json("shallow", &base.mint_address, &quote.mint_address, "150.1", 1000.0),
            pair_json("deep", &base.mint_address, &quote.mint_address, "150.2", 9_000_000.0),
            pair_json("other", &base.mint_address, "SomeOtherMint", "1.0", 50_000_000.0),
        );
        let mock = server
            .mock("GET", format!("/tokens/{}", base.mint_address).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(server.url());
        let pair = client.resolve_pair(&base, &quote).await.unwrap();

        mock.assert_async().await;
        assert_eq!(pair.pair_address, "deep");
        assert_eq!(pair.liquidity_usd, 9_000_000.0);
    }

    #[tokio::test]
    async fn test_resolve_pair_missing_is_config_error() {
        let (base, quote) = sol_usdc();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/tokens/{}", base.mint_address).as_str())
            .with_status(200)
            .with_body(r#"{"schemaVersion":"1.0.0","pairs":null}"#)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(server.url());
        let result = client.resolve_pair(&base, &quote).await;

        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_price() {
        let (base, quote) = sol_usdc();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pairs/solana/deep")
            .with_status(200)
            .with_body(format!(
                r#"{{"pairs":[{}]}}"#,
                pair_json("deep", &base.mint_address, &quote.mint_address, "151.25", 1.0)
            ))
            .create_async()
            .await;

        let feed = PairPriceFeed::new(
            DexScreenerClient::with_base_url(server.url()),
            ResolvedPair {
                pair_address: "deep".to_string(),
                liquidity_usd: 1.0,
            },
        );

        let price = feed.fetch_price().await.unwrap();
        assert!((price - 151.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_price_retries_then_fails_transient() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pairs/solana/deep")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(server.url())
            .with_retry(3, Duration::from_millis(1));
        let result = client.get_pair_price("deep").await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(BotError::Transient {
                kind: CollaboratorKind::Price,
                ..
            })
        ));
    }

    #[test]
    fn test_retry_count_is_clamped() {
        let client = DexScreenerClient::new().with_retry(1000, Duration::from_secs(1));
        assert_eq!(client.max_retries, RETRY_LIMIT);

        let client = DexScreenerClient::new().with_retry(0, Duration::from_secs(1));
        assert_eq!(client.max_retries, 1);
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let client = DexScreenerClient::new().with_retry(3, Duration::from_millis(100));

        assert_eq!(client.backoff_for(1), Duration::from_millis(100));
        assert_eq!(client.backoff_for(3), Duration::from_millis(400));
        // Would overflow u32 and Duration without saturation
        assert_eq!(client.backoff_for(40), Duration::from_millis(100).saturating_mul(u32::MAX));
        assert_eq!(
            DexScreenerClient::new()
                .with_retry(3, Duration::MAX)
                .backoff_for(5),
            Duration::MAX
        );
    }

    #[tokio::test]
    async fn test_zero_price_rejected() {
        let (base, quote) = sol_usdc();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pairs/solana/deep")
            .with_status(200)
            .with_body(format!(
                r#"{{"pairs":[{}]}}"#,
                pair_json("deep", &base.mint_address, &quote.mint_address, "0", 1.0)
            ))
            .create_async()
            .await;

        let client =
            DexScreenerClient::with_base_url(server.url()).with_retry(1, Duration::from_millis(1));
        let result = client.get_pair_price("deep").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_transient());
    }

    #[tokio::test]
    #[ignore] // Ignore by default to avoid hitting API in tests
    async fn test_resolve_sol_usdc_live() {
        let (base, quote) = sol_usdc();
        let client = DexScreenerClient::new();

        let pair = client.resolve_pair(&base, &quote).await.unwrap();
        let price = client.get_pair_price(&pair.pair_address).await.unwrap();
        assert!(price > 0.0);
    }
}
