/*
 * Process-wide token-list cache, one curated list per network
 */

use crate::models::{ListedToken, MaelstromError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/StabilityNexus/TokenList/main";

/// Networks with no curated list; callers must enter addresses manually.
const TESTNET_CHAIN_IDS: [u64; 2] = [63, 5115];

fn chain_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ethereum"),
        61 => Some("ethereum-classic"),
        2001 => Some("cardano's-milkomeda"),
        137 => Some("polygon-pos"),
        56 => Some("binance-smart-chain"),
        8453 => Some("base"),
        _ => None,
    }
}

/// Read-through cache over the curated token lists. Each chain's list is
/// fetched at most once per process and is read-only afterward; the upstream
/// lists are append-only, so staleness is acceptable for the process
/// lifetime.
pub struct TokenListCache {
    client: Client,
    base_url: String,
    lists: RwLock<HashMap<u64, Arc<Vec<ListedToken>>>>,
}

impl Default for TokenListCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenListCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            lists: RwLock::new(HashMap::new()),
        }
    }

    /// The curated token list for a network, fetching it on first use.
    pub async fn tokens(&self, chain_id: u64) -> Result<Arc<Vec<ListedToken>>> {
        if let Some(cached) = self.lists.read().unwrap().get(&chain_id) {
            return Ok(cached.clone());
        }

        if TESTNET_CHAIN_IDS.contains(&chain_id) {
            return Err(MaelstromError::ConfigError(format!(
                "No curated token list for testnet chain {chain_id}; enter the token contract address manually"
            )));
        }
        let slug = chain_slug(chain_id).ok_or_else(|| {
            MaelstromError::ConfigError(format!(
                "Chain id {chain_id} is not supported by the token list"
            ))
        })?;

        let url = format!("{}/{slug}-tokens.json", self.base_url);
        let tokens: Vec<ListedToken> = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(chain_id, count = tokens.len(), "token list loaded");

        // First writer wins; later losers of the race read the stored list.
        let mut lists = self.lists.write().unwrap();
        let entry = lists
            .entry(chain_id)
            .or_insert_with(|| Arc::new(tokens));
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_once_then_reads_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ethereum-tokens.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"address":"0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48","symbol":"USDC","name":"USD Coin","decimals":6}]"#,
            )
            .expect(1)
            .create_async()
            .await;

        let cache = TokenListCache::with_base_url(server.url());
        let first = cache.tokens(1).await.unwrap();
        let second = cache.tokens(1).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second[0].symbol, "USDC");
        assert_eq!(second[0].decimals, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn testnet_chains_ask_for_manual_entry() {
        let cache = TokenListCache::with_base_url("http://127.0.0.1:0".to_string());
        let err = cache.tokens(63).await.unwrap_err();
        assert!(err.to_string().contains("manually"));
    }

    #[tokio::test]
    async fn unknown_chain_is_config_error() {
        let cache = TokenListCache::with_base_url("http://127.0.0.1:0".to_string());
        let err = cache.tokens(999_999).await.unwrap_err();
        assert!(matches!(err, MaelstromError::ConfigError(_)));
    }

    #[tokio::test]
    async fn upstream_failure_is_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/base-tokens.json")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let cache = TokenListCache::with_base_url(server.url());
        assert!(cache.tokens(8453).await.is_err());
        failing.assert_async().await;

        let recovered = server
            .mock("GET", "/base-tokens.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        assert!(cache.tokens(8453).await.unwrap().is_empty());
        recovered.assert_async().await;
    }
}
