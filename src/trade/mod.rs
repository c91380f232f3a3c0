/*
 * Trade Validator & Request Builder: pre-trade invariants and instruction
 * amounts
 */

use crate::contract::PoolReader;
use crate::models::{
    BuyRequest, DepositRequest, InitPoolRequest, MaelstromError, Reserve, Result, SellRequest,
    SwapRequest, Token, WithdrawRequest,
};
use ethers::types::U256;
use ethers::utils::format_units;
use std::sync::Arc;

/// No trade may move a reserve leg by more than this share of its balance.
pub const MAX_RESERVE_IMPACT_PERCENT: u64 = 10;

const BPS_DENOMINATOR: u64 = 10_000;

/// Acceptable degradation from the previewed price. `Exact` is zero-slippage
/// mode: the trade executes at the previewed price or reverts on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slippage {
    Exact,
    Bps(u32),
}

impl Slippage {
    fn bps(self) -> u32 {
        match self {
            Slippage::Exact => 0,
            Slippage::Bps(bps) => bps,
        }
    }
}

/// Minimum acceptable output under a slippage tolerance.
pub fn minimum_out(amount_out: U256, slippage: Slippage) -> Result<U256> {
    let bps = u64::from(slippage.bps());
    if bps > BPS_DENOMINATOR {
        return Err(MaelstromError::ValidationError(format!(
            "Slippage tolerance {bps} exceeds {BPS_DENOMINATOR} basis points"
        )));
    }
    Ok(amount_out * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR))
}

/// Rejects any movement of a reserve leg above the impact cap, naming the
/// maximum allowed amount in the unit of the checked leg.
pub fn check_reserve_impact(
    moved: U256,
    reserve: U256,
    leg: &str,
    decimals: u8,
) -> Result<()> {
    let max_allowed = reserve / U256::from(MAX_RESERVE_IMPACT_PERCENT);
    if moved > max_allowed {
        return Err(MaelstromError::ValidationError(format!(
            "Amount exceeds {MAX_RESERVE_IMPACT_PERCENT}% of the {leg} reserve. Maximum: {}",
            display_amount(max_allowed, decimals)
        )));
    }
    Ok(())
}

fn check_positive(amount: U256, what: &str) -> Result<()> {
    if amount.is_zero() {
        return Err(MaelstromError::ValidationError(format!(
            "{what} must be greater than zero"
        )));
    }
    Ok(())
}

/// Tokens received for a base amount at the given buy price. The price must
/// be non-zero; the planner refreshes a zero price before computing.
#[must_use]
pub fn tokens_out(base_in: U256, buy_price: U256, token_decimals: u8) -> U256 {
    base_in * U256::exp10(usize::from(token_decimals)) / buy_price
}

/// Base received for a token amount at the given sell price.
#[must_use]
pub fn base_out(token_in: U256, sell_price: U256, token_decimals: u8) -> U256 {
    token_in * sell_price / U256::exp10(usize::from(token_decimals))
}

fn display_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, u32::from(decimals))
        .unwrap_or_else(|_| amount.to_string())
}

/// Builds pre-validated mutating requests from current ledger state. Every
/// rejection is a descriptive validation error; nothing here reaches the
/// ledger.
pub struct TradePlanner {
    reader: Arc<PoolReader>,
}

impl TradePlanner {
    pub fn new(reader: Arc<PoolReader>) -> Self {
        Self { reader }
    }

    /// Current buy price, re-read once if the first answer is zero. A price
    /// that stays zero means the pool was never initialized.
    async fn fresh_buy_price(&self, token: &Token) -> Result<U256> {
        let price = self.reader.get_buy_price(token).await?;
        if !price.is_zero() {
            return Ok(price);
        }
        let refreshed = self.reader.get_buy_price(token).await?;
        if refreshed.is_zero() {
            return Err(MaelstromError::ValidationError(format!(
                "Pool for {} has no buy price; is the pool initialized?",
                token.symbol
            )));
        }
        Ok(refreshed)
    }

    async fn fresh_sell_price(&self, token: &Token) -> Result<U256> {
        let price = self.reader.get_sell_price(token).await?;
        if !price.is_zero() {
            return Ok(price);
        }
        let refreshed = self.reader.get_sell_price(token).await?;
        if refreshed.is_zero() {
            return Err(MaelstromError::ValidationError(format!(
                "Pool for {} has no sell price; is the pool initialized?",
                token.symbol
            )));
        }
        Ok(refreshed)
    }

    /// Buy `token` with `base_in` of the base asset.
    pub async fn plan_buy(
        &self,
        token: &Token,
        base_in: U256,
        slippage: Slippage,
    ) -> Result<BuyRequest> {
        check_positive(base_in, "Buy amount")?;

        let price = self.fresh_buy_price(token).await?;
        let token_amount = tokens_out(base_in, price, token.decimals);
        let reserve = self.reader.get_reserves(token).await?;

        check_reserve_impact(base_in, reserve.base_reserve, "base", 18)?;
        check_reserve_impact(token_amount, reserve.token_reserve, &token.symbol, token.decimals)?;

        Ok(BuyRequest {
            token: token.clone(),
            base_in,
            minimum_token_out: minimum_out(token_amount, slippage)?,
        })
    }

    /// Sell `amount_in` of `token` for the base asset.
    pub async fn plan_sell(
        &self,
        token: &Token,
        amount_in: U256,
        slippage: Slippage,
    ) -> Result<SellRequest> {
        check_positive(amount_in, "Sell amount")?;

        let price = self.fresh_sell_price(token).await?;
        let base_amount = base_out(amount_in, price, token.decimals);
        let reserve = self.reader.get_reserves(token).await?;

        check_reserve_impact(amount_in, reserve.token_reserve, &token.symbol, token.decimals)?;
        check_reserve_impact(base_amount, reserve.base_reserve, "base", 18)?;

        Ok(SellRequest {
            token: token.clone(),
            amount_in,
            minimum_base_out: minimum_out(base_amount, slippage)?,
        })
    }

    /// Swap `amount_in` of `token_in` for `token_out` across two pools.
    pub async fn plan_swap(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        slippage: Slippage,
    ) -> Result<SwapRequest> {
        check_positive(amount_in, "Swap amount")?;
        if token_in.address == token_out.address {
            return Err(MaelstromError::ValidationError(
                "Cannot swap a token for itself".to_string(),
            ));
        }

        let sell_price = self.fresh_sell_price(token_in).await?;
        let buy_price = self.fresh_buy_price(token_out).await?;

        let base_value = base_out(amount_in, sell_price, token_in.decimals);
        let token_amount = tokens_out(base_value, buy_price, token_out.decimals);

        let (reserve_in, reserve_out) = tokio::try_join!(
            self.reader.get_reserves(token_in),
            self.reader.get_reserves(token_out)
        )?;

        check_reserve_impact(base_value, reserve_in.base_reserve, "base", 18)?;
        check_reserve_impact(
            token_amount,
            reserve_out.token_reserve,
            &token_out.symbol,
            token_out.decimals,
        )?;

        Ok(SwapRequest {
            token_in: token_in.clone(),
            token_out: token_out.clone(),
            amount_in,
            minimum_out: minimum_out(token_amount, slippage)?,
        })
    }

    /// Provide liquidity: the token side is derived from the pool's current
    /// token-per-base ratio so the deposit lands proportional.
    pub async fn plan_deposit(&self, token: &Token, base_amount: U256) -> Result<DepositRequest> {
        check_positive(base_amount, "Deposit amount")?;

        let ratio = self.reader.get_token_ratio(token).await?;
        if ratio.is_zero() {
            return Err(MaelstromError::ValidationError(format!(
                "Pool for {} has no token ratio; is the pool initialized?",
                token.symbol
            )));
        }

        let token_amount = base_amount * ratio / U256::exp10(18);
        check_positive(token_amount, "Derived token amount")?;

        Ok(DepositRequest {
            token: token.clone(),
            base_amount,
            token_amount,
        })
    }

    /// Withdraw liquidity by burning LP shares.
    pub async fn plan_withdraw(
        &self,
        token: &Token,
        user: ethers::types::Address,
        lp_amount: U256,
    ) -> Result<WithdrawRequest> {
        check_positive(lp_amount, "Withdraw amount")?;

        let lp_token = self.reader.get_lp_token(token, user).await?;
        if lp_amount > lp_token.holder_balance {
            return Err(MaelstromError::ValidationError(format!(
                "Withdraw amount exceeds LP balance of {}",
                display_amount(lp_token.holder_balance, lp_token.token.decimals)
            )));
        }

        Ok(WithdrawRequest {
            token: token.clone(),
            lp_token,
            lp_amount,
        })
    }

    /// Open a new pool. The initial buy price must sit strictly above the
    /// initial sell price.
    pub fn plan_init_pool(
        &self,
        token: &Token,
        base_amount: U256,
        token_amount: U256,
        initial_buy_price: U256,
        initial_sell_price: U256,
    ) -> Result<InitPoolRequest> {
        check_positive(base_amount, "Initial base amount")?;
        check_positive(token_amount, "Initial token amount")?;
        check_positive(initial_sell_price, "Initial sell price")?;

        if initial_buy_price <= initial_sell_price {
            return Err(MaelstromError::ValidationError(format!(
                "Initial buy price {initial_buy_price} must exceed initial sell price {initial_sell_price}"
            )));
        }

        Ok(InitPoolRequest {
            token: token.clone(),
            base_amount,
            token_amount,
            initial_buy_price,
            initial_sell_price,
        })
    }
}

/// Validates a trade preview against a reserve snapshot without touching the
/// ledger: the sell-side counterpart of [`TradePlanner::plan_sell`] for
/// callers that already hold the pool state.
pub fn validate_sell_amount(amount_in: U256, reserve: &Reserve, token: &Token) -> Result<()> {
    check_positive(amount_in, "Sell amount")?;
    check_reserve_impact(amount_in, reserve.token_reserve, &token.symbol, token.decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn eth(amount: u64) -> U256 {
        U256::from(amount) * U256::exp10(18)
    }

    fn test_token() -> Token {
        Token {
            address: Address::from_low_u64_be(7),
            symbol: "WAVE".to_string(),
            name: "Wave".to_string(),
            decimals: 18,
        }
    }

    #[test]
    fn sell_within_cap_passes() {
        let reserve = Reserve {
            base_reserve: eth(100),
            token_reserve: eth(150),
        };
        assert!(validate_sell_amount(eth(15), &reserve, &test_token()).is_ok());
        assert!(validate_sell_amount(eth(1), &reserve, &test_token()).is_ok());
    }

    #[test]
    fn sell_beyond_cap_names_maximum() {
        // 20 of a 150-token reserve is 13.3%; the cap allows 15.
        let reserve = Reserve {
            base_reserve: eth(100),
            token_reserve: eth(150),
        };
        let err = validate_sell_amount(eth(20), &reserve, &test_token()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exceeds 10%"));
        assert!(message.contains("15"));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let reserve = Reserve {
            base_reserve: eth(100),
            token_reserve: eth(150),
        };
        let err = validate_sell_amount(U256::zero(), &reserve, &test_token()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn impact_boundary_is_inclusive() {
        assert!(check_reserve_impact(eth(10), eth(100), "base", 18).is_ok());
        assert!(check_reserve_impact(eth(10) + U256::one(), eth(100), "base", 18).is_err());
    }

    #[test]
    fn complementary_amounts_follow_price() {
        // 4 base at buy price 2 => 2 tokens.
        assert_eq!(tokens_out(eth(4), eth(2), 18), eth(2));
        // 3 tokens at sell price 2 => 6 base.
        assert_eq!(base_out(eth(3), eth(2), 18), eth(6));
    }

    #[test]
    fn minimum_out_applies_tolerance() {
        // 1% tolerance: 200 => 198.
        assert_eq!(
            minimum_out(U256::from(200u64), Slippage::Bps(100)).unwrap(),
            U256::from(198u64)
        );
        // Zero-slippage mode: exact output required.
        assert_eq!(
            minimum_out(eth(5), Slippage::Exact).unwrap(),
            eth(5)
        );
        assert!(minimum_out(eth(1), Slippage::Bps(10_001)).is_err());
    }
}
