/*
 * Ledger Reader: typed read-only queries against the pool contract
 */

pub mod bindings;

pub use bindings::{
    BuyTradeFilter, DepositFilter, Erc20, MaelstromPool, SellTradeFilter, SwapTradeFilter,
    WithdrawFilter,
};

use crate::config;
use crate::models::{LpToken, MaelstromError, PoolFeesEvent, Reserve, Result, Token};
use crate::rpc::RpcClient;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Read side of the pool ledger. All operations are pure queries and may be
/// issued concurrently; every transport failure is wrapped with the operation
/// name and re-raised.
pub struct PoolReader {
    rpc: Arc<RpcClient>,
    contract: MaelstromPool<Provider<Http>>,
}

impl PoolReader {
    pub fn new(rpc: Arc<RpcClient>) -> Result<Self> {
        let address = config::contract_address(rpc.chain_id())?;
        let contract = MaelstromPool::new(address, rpc.provider());
        Ok(Self { rpc, contract })
    }

    #[must_use]
    pub fn contract(&self) -> &MaelstromPool<Provider<Http>> {
        &self.contract
    }

    #[must_use]
    pub fn contract_address(&self) -> Address {
        self.contract.address()
    }

    #[must_use]
    pub fn rpc(&self) -> Arc<RpcClient> {
        self.rpc.clone()
    }

    /// Token metadata. The native currency is answered locally, never queried.
    pub async fn get_token(&self, address: Address) -> Result<Token> {
        if address == Address::zero() {
            return Ok(config::native_token(self.rpc.chain_id()));
        }

        let erc20 = Erc20::new(address, self.rpc.provider());
        let decimals_call = erc20.decimals();
        let symbol_call = erc20.symbol();
        let name_call = erc20.name();
        let (decimals, symbol, name) = tokio::try_join!(
            decimals_call.call(),
            symbol_call.call(),
            name_call.call()
        )
        .map_err(|e| {
            MaelstromError::ContractError(format!(
                "Failed to fetch token metadata for {address:#x}: {e}"
            ))
        })?;

        Ok(Token {
            address,
            symbol,
            name,
            decimals,
        })
    }

    /// LP token of a pool together with the holder's balance. The LP address
    /// must resolve before its balances can be read.
    pub async fn get_lp_token(&self, token: &Token, user: Address) -> Result<LpToken> {
        let lp_address = self
            .contract
            .pool_token(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch LP token address for {}: {e}",
                    token.symbol
                ))
            })?;

        if lp_address == Address::zero() {
            return Err(MaelstromError::ContractError(format!(
                "No LP token found for {}",
                token.symbol
            )));
        }

        let erc20 = Erc20::new(lp_address, self.rpc.provider());
        let (metadata, total_supply, holder_balance) = tokio::try_join!(
            async { self.get_token(lp_address).await },
            async {
                erc20.total_supply().call().await.map_err(|e| {
                    MaelstromError::ContractError(format!(
                        "Failed to fetch LP total supply: {e}"
                    ))
                })
            },
            async {
                erc20.balance_of(user).call().await.map_err(|e| {
                    MaelstromError::ContractError(format!("Failed to fetch LP balance: {e}"))
                })
            }
        )?;

        Ok(LpToken {
            token: metadata,
            total_supply,
            holder_balance,
        })
    }

    /// Whether a pool has been initialized for the token: an uninitialized
    /// pool has no LP token deployed.
    pub async fn is_pool_instantiated(&self, token: Address) -> Result<bool> {
        let lp_address = self.contract.pool_token(token).call().await.map_err(|e| {
            MaelstromError::ContractError(format!(
                "Failed to check pool for {token:#x}: {e}"
            ))
        })?;
        Ok(lp_address != Address::zero())
    }

    pub async fn get_reserves(&self, token: &Token) -> Result<Reserve> {
        let (base_reserve, token_reserve) = self
            .contract
            .reserves(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch reserves for {}: {e}",
                    token.symbol
                ))
            })?;
        Ok(Reserve {
            base_reserve,
            token_reserve,
        })
    }

    pub async fn get_buy_price(&self, token: &Token) -> Result<U256> {
        self.contract
            .price_buy(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch buy price for {}: {e}",
                    token.symbol
                ))
            })
    }

    pub async fn get_sell_price(&self, token: &Token) -> Result<U256> {
        self.contract
            .price_sell(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch sell price for {}: {e}",
                    token.symbol
                ))
            })
    }

    /// How many token minimal units one whole base unit currently buys.
    pub async fn get_token_ratio(&self, token: &Token) -> Result<U256> {
        self.contract
            .token_per_eth_ratio(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch token ratio for {}: {e}",
                    token.symbol
                ))
            })
    }

    /// A user's share of the pool balances. The contract answers
    /// (token, base), the reverse of `reserves`.
    pub async fn get_user_balance(&self, token: &Token, user: Address) -> Result<Reserve> {
        let (token_reserve, base_reserve) = self
            .contract
            .pool_user_balances(token.address, user)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch user balances for {}: {e}",
                    token.symbol
                ))
            })?;
        Ok(Reserve {
            base_reserve,
            token_reserve,
        })
    }

    pub async fn get_total_pools(&self) -> Result<u64> {
        let count = self.contract.get_total_pools().call().await.map_err(|e| {
            MaelstromError::ContractError(format!("Failed to fetch pool count: {e}"))
        })?;
        Ok(count.as_u64())
    }

    pub async fn get_user_total_pools(&self, user: Address) -> Result<u64> {
        let count = self
            .contract
            .get_user_total_pools(user)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!("Failed to fetch user pool count: {e}"))
            })?;
        Ok(count.as_u64())
    }

    pub async fn get_pool_list(&self, start: u64, end: u64) -> Result<Vec<Address>> {
        let total = self.get_total_pools().await?;
        check_index_range(start, end, total, "pool list")?;
        self.contract
            .get_pool_list(U256::from(start), U256::from(end))
            .call()
            .await
            .map_err(|e| MaelstromError::ContractError(format!("Failed to fetch pool list: {e}")))
    }

    pub async fn get_user_pool_list(
        &self,
        user: Address,
        start: u64,
        end: u64,
    ) -> Result<Vec<Address>> {
        let total = self.get_user_total_pools(user).await?;
        check_index_range(start, end, total, "user pool list")?;
        self.contract
            .get_user_pools(user, U256::from(start), U256::from(end))
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!("Failed to fetch user pool list: {e}"))
            })
    }

    pub async fn get_total_fees(&self) -> Result<U256> {
        self.contract
            .total_fees()
            .call()
            .await
            .map_err(|e| MaelstromError::ContractError(format!("Failed to fetch total fees: {e}")))
    }

    pub async fn get_total_pool_fees(&self, token: &Token) -> Result<U256> {
        self.contract
            .total_pool_fees(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch total pool fees for {}: {e}",
                    token.symbol
                ))
            })
    }

    pub async fn get_pool_fee_events_count(&self, token: &Token) -> Result<u64> {
        let count = self
            .contract
            .get_pool_fee_events_count(token.address)
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch fee event count for {}: {e}",
                    token.symbol
                ))
            })?;
        Ok(count.as_u64())
    }

    /// Fee-accrual samples `[start, end]` of the pool's fee ledger, oldest
    /// first, timestamps in milliseconds.
    pub async fn get_pool_fee_list(
        &self,
        token: &Token,
        start: u64,
        end: u64,
    ) -> Result<Vec<PoolFeesEvent>> {
        if start > end {
            return Err(MaelstromError::ValidationError(format!(
                "Invalid fee list range: start {start} > end {end}"
            )));
        }
        let entries = self
            .contract
            .get_pool_fee_list(token.address, U256::from(start), U256::from(end))
            .call()
            .await
            .map_err(|e| {
                MaelstromError::ContractError(format!(
                    "Failed to fetch fee list for {}: {e}",
                    token.symbol
                ))
            })?;

        Ok(entries
            .into_iter()
            .map(|(fee, timestamp)| PoolFeesEvent {
                timestamp_ms: timestamp.as_u64() * 1000,
                fee,
            })
            .collect())
    }

    /// Wall-clock time of the pool's most recent exchange, in milliseconds.
    pub async fn get_last_exchange_timestamp(&self, token: &Token) -> Result<u64> {
        let state = self.contract.pools(token.address).call().await.map_err(|e| {
            MaelstromError::ContractError(format!(
                "Failed to fetch pool state for {}: {e}",
                token.symbol
            ))
        })?;
        // Third slot of the auction-state tuple is lastExchangeTimestamp.
        Ok(state.2.as_u64() * 1000)
    }
}

fn check_index_range(start: u64, end: u64, total: u64, what: &str) -> Result<()> {
    if start > end {
        return Err(MaelstromError::ValidationError(format!(
            "Invalid {what} range: start {start} > end {end}"
        )));
    }
    if end >= total {
        return Err(MaelstromError::ValidationError(format!(
            "Invalid {what} range: end {end} out of bounds for {total} pools"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_range_rules() {
        assert!(check_index_range(0, 4, 5, "pool list").is_ok());
        assert!(check_index_range(2, 2, 5, "pool list").is_ok());

        let err = check_index_range(3, 2, 5, "pool list").unwrap_err();
        assert!(err.to_string().contains("start 3 > end 2"));

        let err = check_index_range(0, 5, 5, "pool list").unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }
}
