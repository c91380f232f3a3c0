/*
 * RPC client module for read access to the pool ledger
 */

use crate::models::{MaelstromError, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Block, BlockNumber, H256, U64};
use std::sync::Arc;

pub struct RpcClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl RpcClient {
    pub async fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| MaelstromError::RpcError(format!("Failed to create provider: {e}")))?;

        let chain = provider
            .get_chainid()
            .await
            .map_err(|e| MaelstromError::RpcError(format!("Failed to get chain ID: {e}")))?;

        if chain.as_u64() != chain_id {
            return Err(MaelstromError::RpcError(format!(
                "Chain ID mismatch: expected {}, got {}",
                chain_id,
                chain.as_u64()
            )));
        }

        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    #[must_use]
    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn get_block_number(&self) -> Result<u64> {
        let number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| MaelstromError::RpcError(format!("Failed to get block number: {e}")))?;
        Ok(number.as_u64())
    }

    pub async fn get_latest_block(&self) -> Result<Block<H256>> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| MaelstromError::RpcError(format!("Failed to get latest block: {e}")))?
            .ok_or_else(|| MaelstromError::RpcError("Latest block not found".to_string()))?;
        Ok(block)
    }

    /// Wall-clock time of a block, in milliseconds since the epoch.
    pub async fn get_block_timestamp_ms(&self, block_number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block(U64::from(block_number))
            .await
            .map_err(|e| {
                MaelstromError::RpcError(format!(
                    "Failed to get block {block_number}: {e}"
                ))
            })?
            .ok_or_else(|| {
                MaelstromError::RpcError(format!("Block {block_number} not found"))
            })?;
        Ok(block.timestamp.as_u64() * 1000)
    }
}
