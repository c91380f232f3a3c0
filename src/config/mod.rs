/*
 * Configuration and network registry for the Maelstrom client
 */

use crate::models::{MaelstromError, Result, Token};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub scan: ScanConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Pause between historical-scan windows. Backpressure against provider
    /// rate limits, not a correctness requirement.
    pub window_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
    pub private_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let chain_id = env::var("CHAIN_ID")
            .map_err(|_| MaelstromError::ConfigError("CHAIN_ID not set".to_string()))?
            .parse()
            .map_err(|e| MaelstromError::ConfigError(format!("Invalid chain id: {e}")))?;

        // Fail fast on networks the contract was never deployed to.
        contract_address(chain_id)?;

        Ok(Config {
            chain: ChainConfig {
                rpc_url: env::var("RPC_URL")
                    .map_err(|_| MaelstromError::ConfigError("RPC_URL not set".to_string()))?,
                chain_id,
            },
            scan: ScanConfig {
                window_delay_ms: env::var("SCAN_WINDOW_DELAY_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .map_err(|e| {
                        MaelstromError::ConfigError(format!("Invalid scan window delay: {e}"))
                    })?,
            },
            wallet: WalletConfig {
                private_key: env::var("PRIVATE_KEY").ok(),
            },
        })
    }
}

/// Deployed pool-contract address per network. Absence of an entry is a
/// configuration error surfaced to the caller, never a silent default.
pub fn contract_address(chain_id: u64) -> Result<Address> {
    let address = match chain_id {
        1 => "0x897CeF988A12AB77A12fd8f2Ca74F0B978d302CF",    // Ethereum mainnet
        61 => "0x897CeF988A12AB77A12fd8f2Ca74F0B978d302CF",   // Ethereum Classic
        63 => "0x39A04312F7640FA2B84833c96fC439D88207c9CD",   // Mordor testnet
        137 => "0x897CeF988A12AB77A12fd8f2Ca74F0B978d302CF",  // Polygon
        56 => "0x897CeF988A12AB77A12fd8f2Ca74F0B978d302CF",   // BSC
        8453 => "0x897CeF988A12AB77A12fd8f2Ca74F0B978d302CF", // Base
        5115 => "0x7B1E47C3C6b1eea13D06566f078DcBaEF5B63Ee5", // Citrea testnet
        _ => {
            return Err(MaelstromError::ConfigError(format!(
                "No contract deployed for chain id {chain_id}"
            )))
        }
    };
    address
        .parse()
        .map_err(|e| MaelstromError::ConfigError(format!("Invalid contract address: {e}")))
}

/// Native currency of the active network. Never looked up on-chain.
#[must_use]
pub fn native_token(chain_id: u64) -> Token {
    match chain_id {
        61 | 63 => Token::native("ETC", "Ethereum Classic", 18),
        137 => Token::native("POL", "Polygon", 18),
        56 => Token::native("BNB", "BNB", 18),
        _ => Token::ether(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_networks_resolve() {
        assert!(contract_address(1).is_ok());
        assert!(contract_address(63).is_ok());
        assert_ne!(
            contract_address(1).unwrap(),
            contract_address(63).unwrap()
        );
    }

    #[test]
    fn unknown_network_is_config_error() {
        let err = contract_address(424242).unwrap_err();
        assert!(matches!(err, MaelstromError::ConfigError(_)));
        assert!(err.to_string().contains("424242"));
    }

    #[test]
    fn native_token_is_zero_address() {
        let etc = native_token(61);
        assert!(etc.is_native());
        assert_eq!(etc.symbol, "ETC");
        assert_eq!(native_token(1).symbol, "ETH");
    }
}
