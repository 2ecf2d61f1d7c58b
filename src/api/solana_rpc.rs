use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::BalanceSource;
use crate::error::{BotError, CollaboratorKind};
use crate::models::Token;
use crate::Result;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Minimal Solana JSON-RPC client for wallet balances
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Client,
    rpc_url: String,
    owner: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    account: AccountData,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    data: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    parsed: ParsedInfo,
}

#[derive(Debug, Deserialize)]
struct ParsedInfo {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    ui_amount_string: String,
}

impl SolanaRpcClient {
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint
    /// * `owner` - Wallet public key whose balances are read
    pub fn new(rpc_url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            rpc_url: rpc_url.into(),
            owner: owner.into(),
        }
    }

    /// Native SOL balance in whole SOL
    pub async fn get_sol_balance(&self) -> Result<f64> {
        let lamports: WithContext<u64> = self.call("getBalance", json!([self.owner])).await?;
        Ok(lamports.value as f64 / LAMPORTS_PER_SOL)
    }

    /// SPL token balance summed over the owner's accounts for `mint`, 0 without any account
    pub async fn get_token_balance(&self, mint: &str) -> Result<f64> {
        let accounts: WithContext<Vec<TokenAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([self.owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;

        accounts.value.iter().try_fold(0.0, |total, account| {
            let amount: f64 = account
                .account
                .data
                .parsed
                .info
                .token_amount
                .ui_amount_string
                .parse()
                .map_err(|e| BotError::transient(CollaboratorKind::Balance, e))?;
            Ok(total + amount)
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BotError::transient(CollaboratorKind::Balance, e))?
            .json()
            .await
            .map_err(|e| BotError::transient(CollaboratorKind::Balance, e))?;

        if let Some(error) = response.error {
            return Err(BotError::transient(
                CollaboratorKind::Balance,
                format!("{} failed ({}): {}", method, error.code, error.message),
            ));
        }

        response.result.ok_or_else(|| {
            BotError::transient(
                CollaboratorKind::Balance,
                format!("{} returned no result", method),
            )
        })
    }
}

#[async_trait]
impl BalanceSource for SolanaRpcClient {
    async fn get_balance(&self, token: &Token) -> Result<f64> {
        if token.is_native_sol() {
            self.get_sol_balance().await
        } else {
            self.get_token_balance(&token.mint_address).await
        }
    }
}
