use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::api::SwapExecutor;
use crate::error::{BotError, CollaboratorKind};
use crate::models::{SwapReceipt, SwapStatus, Token, TradeIntent};
use crate::Result;

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
const JUPITER_QUOTE_API: &str = "https://lite-api.jup.ag/swap/v1";

/// Client for Jupiter aggregator API
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    price_impact_pct: String,
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    pub price: f64,            // Output per unit of input, raw units
    pub price_impact_pct: f64, // Price impact percentage
    pub in_amount: u64,
    pub out_amount: u64,
}

impl JupiterClient {
    pub fn new() -> Self {
        Self::with_base_url(JUPITER_QUOTE_API)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url, input_mint, output_mint, amount, slippage_bps
        );
        tracing::debug!("Jupiter quote URL: {}", url);

        let response: QuoteResponse = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BotError::transient(CollaboratorKind::Swap, e))?
            .json()
            .await
            .map_err(|e| BotError::transient(CollaboratorKind::Swap, e))?;

        let in_amount: u64 = response
            .in_amount
            .parse()
            .map_err(|e| BotError::transient(CollaboratorKind::Swap, e))?;
        let out_amount: u64 = response
            .out_amount
            .parse()
            .map_err(|e| BotError::transient(CollaboratorKind::Swap, e))?;
        let price_impact: f64 = response.price_impact_pct.parse().unwrap_or(0.0);

        // Both amounts are raw units, the caller handles decimals
        let price = if in_amount == 0 {
            0.0
        } else {
            out_amount as f64 / in_amount as f64
        };

        Ok(Quote {
            price,
            price_impact_pct: price_impact,
            in_amount,
            out_amount,
        })
    }
}

impl Default for JupiterClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Dry-run swap executor: quotes every intent on Jupiter, never sends
pub struct JupiterSwapExecutor {
    client: JupiterClient,
    base: Token,
    quote: Token,
    slippage_bps: u16,
}

impl JupiterSwapExecutor {
    pub fn new(client: JupiterClient, base: Token, quote: Token, slippage_bps: u16) -> Self {
        Self {
            client,
            base,
            quote,
            slippage_bps,
        }
    }

    fn legs(&self, intent: &TradeIntent) -> (&Token, &Token) {
        if intent.direction.spends_base() {
            (&self.base, &self.quote)
        } else {
            (&self.quote, &self.base)
        }
    }
}

fn to_raw(amount: f64, decimals: u8) -> u64 {
    (amount * 10f64.powi(decimals as i32)).floor() as u64
}

fn from_raw(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

#[async_trait]
impl SwapExecutor for JupiterSwapExecutor {
    async fn execute(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        Err(BotError::SwapRejected {
            direction: intent.direction,
            message: "Jupiter executor has no transaction signer, only simulation is available"
                .to_string(),
        })
    }

    async fn simulate(&self, intent: &TradeIntent) -> Result<SwapReceipt> {
        let (input, output) = self.legs(intent);
        let raw_amount = to_raw(intent.amount, input.decimals);
        if raw_amount == 0 {
            return Err(BotError::SwapRejected {
                direction: intent.direction,
                message: format!("{} {} rounds to zero", intent.amount, input.symbol),
            });
        }

        let quote = self
            .client
            .get_quote(
                &input.mint_address,
                &output.mint_address,
                raw_amount,
                self.slippage_bps,
            )
            .await?;

        let out_amount = from_raw(quote.out_amount, output.decimals);
        tracing::info!(
            "Swap simulation: {} {} -> {:.6} {} (impact {:.4}%)",
            intent.amount,
            input.symbol,
            out_amount,
            output.symbol,
            quote.price_impact_pct
        );

        Ok(SwapReceipt {
            transaction_id: None,
            status: SwapStatus::Simulated,
            out_amount: Some(out_amount),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairConfig;
    use crate::models::TradeDirection;
    use mockito::Matcher;

    fn executor(url: String) -> JupiterSwapExecutor {
        let pair = PairConfig::default();
        JupiterSwapExecutor::new(JupiterClient::with_base_url(url), pair.base, pair.quote, 50)
    }

    #[test]
    fn test_raw_conversion() {
        assert_eq!(to_raw(1.5, 9), 1_500_000_000);
        assert_eq!(to_raw(70.0, 6), 70_000_000);
        assert!((from_raw(150_250_000, 6) - 150.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_simulate_sell_quotes_base_to_quote() {
        let pair = PairConfig::default();
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("inputMint".into(), pair.base.mint_address.clone()),
                Matcher::UrlEncoded("outputMint".into(), pair.quote.mint_address.clone()),
                Matcher::UrlEncoded("amount".into(), "1000000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"inputMint":"x","inAmount":"1000000000","outputMint":"y","outAmount":"150250000","otherAmountThreshold":"0","priceImpactPct":"0.001","routePlan":[]}"#)
            .create_async()
            .await;

        let intent = TradeIntent {
            direction: TradeDirection::Sell,
            amount: 1.0,
            reference_price: 150.0,
        };
        let receipt = executor(server.url()).simulate(&intent).await.unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.status, SwapStatus::Simulated);
        assert!(receipt.transaction_id.is_none());
        assert!((receipt.out_amount.unwrap() - 150.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_quote_http_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let intent = TradeIntent {
            direction: TradeDirection::Buy,
            amount: 70.0,
            reference_price: 150.0,
        };
        let err = executor(server.url()).simulate(&intent).await.unwrap_err();

        assert!(matches!(
            err,
            BotError::Transient {
                kind: CollaboratorKind::Swap,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_execute_is_refused() {
        let intent = TradeIntent {
            direction: TradeDirection::Buy,
            amount: 70.0,
            reference_price: 150.0,
        };
        let err = executor("http://127.0.0.1:9".to_string())
            .execute(&intent)
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::SwapRejected { .. }));
    }

    #[tokio::test]
    #[ignore] // Ignore by default to avoid hitting API in tests
    async fn test_get_quote_live() {
        let client = JupiterClient::new();
        let pair = PairConfig::default();

        let quote = client
            .get_quote(&pair.base.mint_address, &pair.quote.mint_address, 1_000_000_000, 50)
            .await
            .unwrap();
        assert!(quote.price > 0.0);
        assert_eq!(quote.in_amount, 1_000_000_000);
    }
}
