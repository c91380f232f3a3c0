/*
 * Data models and types for the Maelstrom pool client
 */

use chrono::{DateTime, Utc};
use ethers::types::{Address, TxHash, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ERC-20 style token. Identity is the address; the zero address stands
/// for the chain's native currency and is never looked up on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Token {
    #[must_use]
    pub fn native(symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            address: Address::zero(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        }
    }

    /// The default native currency when no chain metadata is available.
    #[must_use]
    pub fn ether() -> Self {
        Self::native("ETH", "Ether", 18)
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.address == Address::zero()
    }
}

/// Claim-share instrument representing proportional ownership of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LpToken {
    pub token: Token,
    pub total_supply: U256,
    pub holder_balance: U256,
}

/// Raw balances backing a pool, in minimal denomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reserve {
    pub base_reserve: U256,
    pub token_reserve: U256,
}

/// Fully-assembled pool snapshot. `buy_price >= sell_price` is economically
/// expected but not enforced here; a violation means suspicious or stale data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub token: Token,
    pub reserve: Reserve,
    pub lp_token: LpToken,
    pub buy_price: U256,
    pub sell_price: U256,
    pub avg_price: U256,
    pub token_ratio: U256,
    pub volume_24h: U256,
    pub total_liquidity: U256,
    pub apr: Decimal,
    pub last_exchange_at: u64,
    pub last_updated: DateTime<Utc>,
}

/// Lightweight pool projection for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowPool {
    pub token: Token,
    pub buy_price: U256,
    pub sell_price: U256,
    pub total_liquidity: U256,
    pub lp_token: Option<LpToken>,
}

impl RowPool {
    /// Row for the native currency itself: priced 1:1 against the base asset.
    #[must_use]
    pub fn native(token: Token) -> Self {
        let one = U256::exp10(usize::from(token.decimals));
        Self {
            token,
            buy_price: one,
            sell_price: one,
            total_liquidity: U256::zero(),
            lp_token: None,
        }
    }
}

/// One yield-accrual sample from the pool's fee ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolFeesEvent {
    pub timestamp_ms: u64,
    pub fee: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuyTrade {
    pub token: Token,
    pub trader: Address,
    pub base_amount: U256,
    pub token_amount: U256,
    pub trade_buy_price: U256,
    pub updated_buy_price: U256,
    pub sell_price: U256,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellTrade {
    pub token: Token,
    pub trader: Address,
    pub token_amount: U256,
    pub base_amount: U256,
    pub trade_sell_price: U256,
    pub updated_sell_price: U256,
    pub buy_price: U256,
    pub timestamp_ms: u64,
}

/// Cross-pair swap. Carries both legs' token identities regardless of which
/// directional query produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapTrade {
    pub token_sold: Token,
    pub token_bought: Token,
    pub trader: Address,
    pub amount_sold: U256,
    pub amount_bought: U256,
    pub trade_sell_price: U256,
    pub updated_sell_price: U256,
    pub trade_buy_price: U256,
    pub updated_buy_price: U256,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositEvent {
    pub token: Token,
    pub user: Address,
    pub base_amount: U256,
    pub token_amount: U256,
    pub lp_minted: U256,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub token: Token,
    pub user: Address,
    pub base_amount: U256,
    pub token_amount: U256,
    pub lp_burned: U256,
    pub timestamp_ms: u64,
}

/// Every event kind the contract emits, as one timeline entry. Adding a kind
/// is a compile-time-checked change everywhere the timeline is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeEvent {
    Buy(BuyTrade),
    Sell(SellTrade),
    Swap(SwapTrade),
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),
}

impl TradeEvent {
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            TradeEvent::Buy(e) => e.timestamp_ms,
            TradeEvent::Sell(e) => e.timestamp_ms,
            TradeEvent::Swap(e) => e.timestamp_ms,
            TradeEvent::Deposit(e) => e.timestamp_ms,
            TradeEvent::Withdraw(e) => e.timestamp_ms,
        }
    }
}

/// Entry of the off-chain curated token list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListedToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(alias = "logoURI")]
    pub logo_uri: Option<String>,
}

impl Default for ListedToken {
    fn default() -> Self {
        Self {
            address: String::new(),
            symbol: String::new(),
            name: String::new(),
            decimals: 18,
            logo_uri: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitPoolRequest {
    pub token: Token,
    pub base_amount: U256,
    pub token_amount: U256,
    pub initial_buy_price: U256,
    pub initial_sell_price: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub token: Token,
    pub base_amount: U256,
    pub token_amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub token: Token,
    pub lp_token: LpToken,
    pub lp_amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in: U256,
    pub minimum_out: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyRequest {
    pub token: Token,
    pub base_in: U256,
    pub minimum_token_out: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellRequest {
    pub token: Token,
    pub amount_in: U256,
    pub minimum_base_out: U256,
}

/// Outcome of one submitted mutating action. Produced exactly once per
/// submission: either the capability grant and the call both went through and
/// `tx_hash` is set, or the whole action reports failure with the underlying
/// message preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult<R> {
    pub success: bool,
    pub tx_hash: Option<TxHash>,
    pub request: R,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl<R> ActionResult<R> {
    #[must_use]
    pub fn submitted(request: R, tx_hash: TxHash) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash),
            request,
            timestamp: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(request: R, error: String) -> Self {
        Self {
            success: false,
            tx_hash: None,
            request,
            timestamp: Utc::now(),
            error: Some(error),
        }
    }
}

pub type InitPoolResult = ActionResult<InitPoolRequest>;
pub type DepositResult = ActionResult<DepositRequest>;
pub type WithdrawResult = ActionResult<WithdrawRequest>;
pub type SwapResult = ActionResult<SwapRequest>;
pub type BuyResult = ActionResult<BuyRequest>;
pub type SellResult = ActionResult<SellRequest>;

#[derive(Debug, Error)]
pub enum MaelstromError {
    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract read error: {0}")]
    ContractError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MaelstromError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_result_is_never_partially_populated() {
        let request = BuyRequest {
            token: Token::ether(),
            base_in: U256::from(10u64),
            minimum_token_out: U256::from(5u64),
        };

        let ok = ActionResult::submitted(request.clone(), TxHash::zero());
        assert!(ok.success);
        assert!(ok.tx_hash.is_some());
        assert!(ok.error.is_none());

        let failed = ActionResult::failed(request, "Buy failed: reverted".to_string());
        assert!(!failed.success);
        assert!(failed.tx_hash.is_none());
        assert_eq!(failed.error.as_deref(), Some("Buy failed: reverted"));
    }

    #[test]
    fn native_token_is_not_looked_up() {
        let ether = Token::ether();
        assert!(ether.is_native());
        assert_eq!(ether.decimals, 18);
    }

    #[test]
    fn listed_token_accepts_upstream_shape() {
        let parsed: ListedToken = serde_json::from_str(
            r#"{"address":"0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48","symbol":"USDC","name":"USD Coin","decimals":6,"logoURI":"https://example.org/usdc.png"}"#,
        )
        .unwrap();
        assert_eq!(parsed.symbol, "USDC");
        assert_eq!(parsed.decimals, 6);
        assert!(parsed.logo_uri.is_some());

        let bare: ListedToken =
            serde_json::from_str(r#"{"address":"0x00","symbol":"X","name":"X"}"#).unwrap();
        assert_eq!(bare.decimals, 18);
    }
}
