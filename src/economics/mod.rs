/*
 * Economics Calculator: pure derivations over reserves, prices and fees
 */

use crate::models::{MaelstromError, PoolFeesEvent, Result, Token, TradeEvent};
use ethers::types::U256;
use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use std::str::FromStr;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Mean of the independent buy and sell prices, base-per-token.
#[must_use]
pub fn average_price(buy: U256, sell: U256) -> U256 {
    let sum = to_biguint(buy) + to_biguint(sell);
    // The mean always fits back into 256 bits.
    from_biguint(sum >> 1).unwrap_or(U256::MAX)
}

/// Pool value in base-asset terms: the token reserve converted out of its
/// minimal denomination, priced at the average, plus the base reserve.
pub fn total_liquidity(
    avg_price: U256,
    base_reserve: U256,
    token_reserve: U256,
    token_decimals: u8,
) -> Result<U256> {
    let scale = BigUint::from(10u8).pow(u32::from(token_decimals));
    let priced = to_biguint(avg_price) * to_biguint(token_reserve) / scale;
    from_biguint(priced + to_biguint(base_reserve))
}

/// Per-day yield rate over a window of fee samples: total fees divided by
/// elapsed days and pool liquidity. Zero when fewer than two samples exist,
/// no time elapsed, or the pool holds nothing.
pub fn pool_yield(fee_events: &[PoolFeesEvent], total_liquidity: U256) -> Result<Decimal> {
    let (Some(first), Some(last)) = (fee_events.first(), fee_events.last()) else {
        return Ok(Decimal::ZERO);
    };
    if fee_events.len() < 2 || total_liquidity.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let elapsed_ms = last.timestamp_ms.saturating_sub(first.timestamp_ms);
    if elapsed_ms == 0 {
        return Ok(Decimal::ZERO);
    }

    let mut total_fees = BigUint::zero();
    for event in fee_events {
        total_fees += to_biguint(event.fee);
    }

    let fees = decimal_from_str(&total_fees.to_string())?;
    let liquidity = decimal_from_str(&total_liquidity.to_string())?;
    let days = decimal_from_str(&elapsed_ms.to_string())? / Decimal::from(MS_PER_DAY);

    Ok(fees / (days * liquidity))
}

/// Annualized percentage rate from a per-day yield.
#[must_use]
pub fn apr(daily_yield: Decimal) -> Decimal {
    daily_yield * Decimal::from(365) * Decimal::from(100)
}

/// Sum of base-asset-equivalent magnitudes of the trades touching a token:
/// the base amount directly for buys and sells, the priced leg for swaps.
/// Liquidity movements do not count as volume.
pub fn volume(events: &[TradeEvent], token: &Token) -> Result<U256> {
    let scale = BigUint::from(10u8).pow(u32::from(token.decimals));
    let mut total = BigUint::zero();

    for event in events {
        match event {
            TradeEvent::Buy(trade) if trade.token.address == token.address => {
                total += to_biguint(trade.base_amount);
            }
            TradeEvent::Sell(trade) if trade.token.address == token.address => {
                total += to_biguint(trade.base_amount);
            }
            TradeEvent::Swap(trade) => {
                if trade.token_sold.address == token.address {
                    total += to_biguint(trade.amount_sold) * to_biguint(trade.trade_sell_price)
                        / &scale;
                } else if trade.token_bought.address == token.address {
                    total += to_biguint(trade.amount_bought) * to_biguint(trade.trade_buy_price)
                        / &scale;
                }
            }
            TradeEvent::Buy(_)
            | TradeEvent::Sell(_)
            | TradeEvent::Deposit(_)
            | TradeEvent::Withdraw(_) => {}
        }
    }

    from_biguint(total)
}

fn to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

fn from_biguint(value: BigUint) -> Result<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(MaelstromError::CalculationError(
            "Value exceeds 256 bits".to_string(),
        ));
    }
    Ok(U256::from_big_endian(&bytes))
}

fn decimal_from_str(value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| MaelstromError::CalculationError(format!("Decimal overflow: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuyTrade, DepositEvent, SellTrade, SwapTrade};
    use ethers::types::Address;

    fn eth(amount: u64) -> U256 {
        U256::from(amount) * U256::exp10(18)
    }

    fn token(tag: u64) -> Token {
        Token {
            address: Address::from_low_u64_be(tag),
            symbol: format!("T{tag}"),
            name: format!("Token {tag}"),
            decimals: 18,
        }
    }

    #[test]
    fn average_price_is_between_and_symmetric() {
        let pairs = [
            (eth(2), eth(1)),
            (U256::from(7u64), U256::from(10u64)),
            (U256::zero(), eth(3)),
        ];
        for (buy, sell) in pairs {
            let avg = average_price(buy, sell);
            assert!(avg >= buy.min(sell));
            assert!(avg <= buy.max(sell));
            assert_eq!(avg, average_price(sell, buy));
        }
    }

    #[test]
    fn reserve_and_price_scenario() {
        // reserves {base: 100e18, token: 50e18}, buy 2e18, sell 1e18
        let avg = average_price(eth(2), eth(1));
        assert_eq!(avg, eth(1) + eth(1) / 2);

        let liquidity = total_liquidity(avg, eth(100), eth(50), 18).unwrap();
        assert_eq!(liquidity, eth(175));
    }

    #[test]
    fn liquidity_monotone_in_reserves_linear_in_price() {
        let base = total_liquidity(eth(2), eth(10), eth(5), 18).unwrap();

        assert!(total_liquidity(eth(2), eth(11), eth(5), 18).unwrap() > base);
        assert!(total_liquidity(eth(2), eth(10), eth(6), 18).unwrap() > base);

        // Doubling the price doubles the priced component exactly.
        let doubled = total_liquidity(eth(4), eth(10), eth(5), 18).unwrap();
        assert_eq!(doubled - eth(10), (base - eth(10)) * 2);
    }

    #[test]
    fn yield_over_ten_days() {
        let samples = [
            PoolFeesEvent {
                timestamp_ms: 0,
                fee: U256::from(10u64),
            },
            PoolFeesEvent {
                timestamp_ms: 864_000_000,
                fee: U256::from(20u64),
            },
        ];
        let daily = pool_yield(&samples, U256::from(1_000u64)).unwrap();
        assert_eq!(daily, Decimal::from_str("0.003").unwrap());
        assert_eq!(apr(daily), Decimal::from_str("109.5").unwrap());
    }

    #[test]
    fn yield_undefined_cases_are_zero() {
        let lone = [PoolFeesEvent {
            timestamp_ms: 100,
            fee: U256::from(10u64),
        }];
        assert_eq!(pool_yield(&lone, U256::from(1_000u64)).unwrap(), Decimal::ZERO);
        assert_eq!(pool_yield(&[], U256::from(1_000u64)).unwrap(), Decimal::ZERO);

        let same_instant = [
            PoolFeesEvent {
                timestamp_ms: 100,
                fee: U256::from(10u64),
            },
            PoolFeesEvent {
                timestamp_ms: 100,
                fee: U256::from(20u64),
            },
        ];
        assert_eq!(
            pool_yield(&same_instant, U256::from(1_000u64)).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(pool_yield(&same_instant, U256::zero()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn volume_counts_trades_and_matching_swap_legs() {
        let pool_token = token(1);
        let other = token(2);

        let events = vec![
            TradeEvent::Buy(BuyTrade {
                token: pool_token.clone(),
                trader: Address::zero(),
                base_amount: eth(4),
                token_amount: eth(2),
                trade_buy_price: eth(2),
                updated_buy_price: eth(2),
                sell_price: eth(1),
                timestamp_ms: 1,
            }),
            TradeEvent::Sell(SellTrade {
                token: pool_token.clone(),
                trader: Address::zero(),
                token_amount: eth(3),
                base_amount: eth(3),
                trade_sell_price: eth(1),
                updated_sell_price: eth(1),
                buy_price: eth(2),
                timestamp_ms: 2,
            }),
            // Sold leg matches: 2 tokens at sell price 3 => 6 base.
            TradeEvent::Swap(SwapTrade {
                token_sold: pool_token.clone(),
                token_bought: other.clone(),
                trader: Address::zero(),
                amount_sold: eth(2),
                amount_bought: eth(1),
                trade_sell_price: eth(3),
                updated_sell_price: eth(3),
                trade_buy_price: eth(6),
                updated_buy_price: eth(6),
                timestamp_ms: 3,
            }),
            // Bought leg matches: 5 tokens at buy price 2 => 10 base.
            TradeEvent::Swap(SwapTrade {
                token_sold: other.clone(),
                token_bought: pool_token.clone(),
                trader: Address::zero(),
                amount_sold: eth(1),
                amount_bought: eth(5),
                trade_sell_price: eth(1),
                updated_sell_price: eth(1),
                trade_buy_price: eth(2),
                updated_buy_price: eth(2),
                timestamp_ms: 4,
            }),
            // Unrelated pool and liquidity movements contribute nothing.
            TradeEvent::Buy(BuyTrade {
                token: other.clone(),
                trader: Address::zero(),
                base_amount: eth(50),
                token_amount: eth(25),
                trade_buy_price: eth(2),
                updated_buy_price: eth(2),
                sell_price: eth(1),
                timestamp_ms: 5,
            }),
            TradeEvent::Deposit(DepositEvent {
                token: pool_token.clone(),
                user: Address::zero(),
                base_amount: eth(100),
                token_amount: eth(50),
                lp_minted: eth(10),
                timestamp_ms: 6,
            }),
        ];

        // 4 + 3 + 6 + 10 = 23 base units.
        assert_eq!(volume(&events, &pool_token).unwrap(), eth(23));
    }
}
