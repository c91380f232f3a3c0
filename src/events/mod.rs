/*
 * Event Log Aggregator: windowed retrieval and merging of pool event logs
 */

use crate::contract::{
    BuyTradeFilter, DepositFilter, PoolReader, SellTradeFilter, SwapTradeFilter, WithdrawFilter,
};
use crate::models::{
    BuyTrade, DepositEvent, MaelstromError, Result, SellTrade, SwapTrade, Token, TradeEvent,
    WithdrawEvent,
};
use ethers::contract::LogMeta;
use ethers::types::Address;
use futures::future::try_join_all;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Fixed scan-window step, sized to stay under provider single-query limits.
pub const BLOCK_WINDOW: u64 = 999;

/// Splits an inclusive position range into fixed-size windows. Empty when
/// `from > to`.
#[must_use]
pub fn windows(from: u64, to: u64) -> Vec<(u64, u64)> {
    let mut spans = Vec::new();
    let mut current = from;
    while current <= to {
        let end = current.saturating_add(BLOCK_WINDOW).min(to);
        spans.push((current, end));
        if end == u64::MAX {
            break;
        }
        current = end + 1;
    }
    spans
}

/// Merges two event collections into one deduplicated timeline, ascending by
/// timestamp. Keyed by (timestamp, content), so repeated or overlapping
/// fetches of the same range are idempotent. Pure: callers accumulate
/// locally and merge into shared state in one step.
#[must_use]
pub fn merge_events(existing: Vec<TradeEvent>, fetched: Vec<TradeEvent>) -> Vec<TradeEvent> {
    let mut keyed: BTreeMap<(u64, u64), TradeEvent> = BTreeMap::new();
    for event in existing.into_iter().chain(fetched) {
        keyed.insert(dedup_key(&event), event);
    }
    keyed.into_values().collect()
}

fn dedup_key(event: &TradeEvent) -> (u64, u64) {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    event.hash(&mut hasher);
    (event.timestamp_ms(), hasher.finish())
}

/// Retrieves typed event logs over bounded windows and assembles per-pool or
/// per-account timelines. Each call keeps its own block-time and token
/// caches; nothing shared is touched mid-scan, so an abandoned scan cannot
/// corrupt concurrent ones.
pub struct EventScanner {
    reader: std::sync::Arc<PoolReader>,
    window_delay: Duration,
}

impl EventScanner {
    pub fn new(reader: std::sync::Arc<PoolReader>, window_delay_ms: u64) -> Self {
        Self {
            reader,
            window_delay: Duration::from_millis(window_delay_ms),
        }
    }

    /// Buy trades in `[from, to]`, optionally narrowed to a token and/or a
    /// trader. Without a token filter, each event's token is resolved via
    /// the Ledger Reader.
    pub async fn buy_trades(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<BuyTrade>> {
        let mut query = self
            .reader
            .contract()
            .event::<BuyTradeFilter>()
            .from_block(from)
            .to_block(to);
        if let Some(token) = token {
            query.filter = query.filter.topic1(token.address);
        }
        if let Some(trader) = trader {
            query.filter = query.filter.topic2(trader);
        }

        let logs = query.query_with_meta().await.map_err(|e| {
            MaelstromError::ContractError(format!("Failed to fetch buy trade logs: {e}"))
        })?;

        let times = self.block_times(logs.iter().map(|(_, meta)| meta)).await?;
        let tokens = match token {
            Some(_) => HashMap::new(),
            None => {
                self.resolve_tokens(logs.iter().map(|(log, _)| log.token))
                    .await?
            }
        };

        logs.into_iter()
            .map(|(log, meta)| {
                Ok(BuyTrade {
                    token: self.pick_token(token, &tokens, log.token)?,
                    trader: log.trader,
                    base_amount: log.amount_ether,
                    token_amount: log.amount_token,
                    trade_buy_price: log.trade_buy_price,
                    updated_buy_price: log.updated_buy_price,
                    sell_price: log.sell_price,
                    timestamp_ms: block_time(&times, &meta)?,
                })
            })
            .collect()
    }

    /// Sell trades in `[from, to]`; filters as for [`Self::buy_trades`].
    pub async fn sell_trades(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<SellTrade>> {
        let mut query = self
            .reader
            .contract()
            .event::<SellTradeFilter>()
            .from_block(from)
            .to_block(to);
        if let Some(token) = token {
            query.filter = query.filter.topic1(token.address);
        }
        if let Some(trader) = trader {
            query.filter = query.filter.topic2(trader);
        }

        let logs = query.query_with_meta().await.map_err(|e| {
            MaelstromError::ContractError(format!("Failed to fetch sell trade logs: {e}"))
        })?;

        let times = self.block_times(logs.iter().map(|(_, meta)| meta)).await?;
        let tokens = match token {
            Some(_) => HashMap::new(),
            None => {
                self.resolve_tokens(logs.iter().map(|(log, _)| log.token))
                    .await?
            }
        };

        logs.into_iter()
            .map(|(log, meta)| {
                Ok(SellTrade {
                    token: self.pick_token(token, &tokens, log.token)?,
                    trader: log.trader,
                    token_amount: log.amount_token,
                    base_amount: log.amount_ether,
                    trade_sell_price: log.trade_sell_price,
                    updated_sell_price: log.updated_sell_price,
                    buy_price: log.buy_price,
                    timestamp_ms: block_time(&times, &meta)?,
                })
            })
            .collect()
    }

    /// Cross-pair swaps in `[from, to]`. With a trader filter this is one
    /// query; with only a token filter it is the merge of two directional
    /// sub-queries (token sold, token bought). Both legs' tokens are always
    /// resolved, whichever path ran.
    pub async fn swap_trades(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        trader: Option<Address>,
    ) -> Result<Vec<SwapTrade>> {
        match (trader, token) {
            // Trader-filtered: one query covers both legs.
            (Some(trader), _) => {
                let mut query = self
                    .reader
                    .contract()
                    .event::<SwapTradeFilter>()
                    .from_block(from)
                    .to_block(to);
                query.filter = query.filter.topic3(trader);
                let logs = query.query_with_meta().await.map_err(|e| {
                    MaelstromError::ContractError(format!(
                        "Failed to fetch swap trade logs: {e}"
                    ))
                })?;
                self.assemble_swaps(logs).await
            }
            (None, None) => {
                let query = self
                    .reader
                    .contract()
                    .event::<SwapTradeFilter>()
                    .from_block(from)
                    .to_block(to);
                let logs = query.query_with_meta().await.map_err(|e| {
                    MaelstromError::ContractError(format!(
                        "Failed to fetch swap trade logs: {e}"
                    ))
                })?;
                self.assemble_swaps(logs).await
            }
            // Token-filtered, any trader: the token may sit on either leg,
            // so merge the two directional sub-queries.
            (None, Some(token)) => {
                let mut sold_query = self
                    .reader
                    .contract()
                    .event::<SwapTradeFilter>()
                    .from_block(from)
                    .to_block(to);
                sold_query.filter = sold_query.filter.topic1(token.address);
                let mut logs = sold_query.query_with_meta().await.map_err(|e| {
                    MaelstromError::ContractError(format!(
                        "Failed to fetch swap-out logs: {e}"
                    ))
                })?;

                let mut bought_query = self
                    .reader
                    .contract()
                    .event::<SwapTradeFilter>()
                    .from_block(from)
                    .to_block(to);
                bought_query.filter = bought_query.filter.topic2(token.address);
                let bought = bought_query.query_with_meta().await.map_err(|e| {
                    MaelstromError::ContractError(format!(
                        "Failed to fetch swap-in logs: {e}"
                    ))
                })?;

                logs.extend(bought);
                self.assemble_swaps(logs).await
            }
        }
    }

    async fn assemble_swaps(
        &self,
        logs: Vec<(SwapTradeFilter, LogMeta)>,
    ) -> Result<Vec<SwapTrade>> {
        let times = self.block_times(logs.iter().map(|(_, meta)| meta)).await?;
        let tokens = self
            .resolve_tokens(
                logs.iter()
                    .flat_map(|(log, _)| [log.token_sold, log.token_bought]),
            )
            .await?;

        logs.into_iter()
            .map(|(log, meta)| {
                Ok(SwapTrade {
                    token_sold: self.pick_token(None, &tokens, log.token_sold)?,
                    token_bought: self.pick_token(None, &tokens, log.token_bought)?,
                    trader: log.trader,
                    amount_sold: log.amount_token_sold,
                    amount_bought: log.amount_token_bought,
                    trade_sell_price: log.trade_sell_price,
                    updated_sell_price: log.updated_sell_price,
                    trade_buy_price: log.trade_buy_price,
                    updated_buy_price: log.updated_buy_price,
                    timestamp_ms: block_time(&times, &meta)?,
                })
            })
            .collect()
    }

    /// Pool deposits in `[from, to]`, optionally narrowed by token and/or
    /// depositor.
    pub async fn deposits(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<DepositEvent>> {
        let mut query = self
            .reader
            .contract()
            .event::<DepositFilter>()
            .from_block(from)
            .to_block(to);
        if let Some(token) = token {
            query.filter = query.filter.topic1(token.address);
        }
        if let Some(user) = user {
            query.filter = query.filter.topic2(user);
        }

        let logs = query.query_with_meta().await.map_err(|e| {
            MaelstromError::ContractError(format!("Failed to fetch deposit logs: {e}"))
        })?;

        let times = self.block_times(logs.iter().map(|(_, meta)| meta)).await?;
        let tokens = match token {
            Some(_) => HashMap::new(),
            None => {
                self.resolve_tokens(logs.iter().map(|(log, _)| log.token))
                    .await?
            }
        };

        logs.into_iter()
            .map(|(log, meta)| {
                Ok(DepositEvent {
                    token: self.pick_token(token, &tokens, log.token)?,
                    user: log.user,
                    base_amount: log.amount_ether,
                    token_amount: log.amount_token,
                    lp_minted: log.lp_tokens_minted,
                    timestamp_ms: block_time(&times, &meta)?,
                })
            })
            .collect()
    }

    /// Pool withdrawals in `[from, to]`, optionally narrowed by token and/or
    /// withdrawer.
    pub async fn withdraws(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<WithdrawEvent>> {
        let mut query = self
            .reader
            .contract()
            .event::<WithdrawFilter>()
            .from_block(from)
            .to_block(to);
        if let Some(token) = token {
            query.filter = query.filter.topic1(token.address);
        }
        if let Some(user) = user {
            query.filter = query.filter.topic2(user);
        }

        let logs = query.query_with_meta().await.map_err(|e| {
            MaelstromError::ContractError(format!("Failed to fetch withdraw logs: {e}"))
        })?;

        let times = self.block_times(logs.iter().map(|(_, meta)| meta)).await?;
        let tokens = match token {
            Some(_) => HashMap::new(),
            None => {
                self.resolve_tokens(logs.iter().map(|(log, _)| log.token))
                    .await?
            }
        };

        logs.into_iter()
            .map(|(log, meta)| {
                Ok(WithdrawEvent {
                    token: self.pick_token(token, &tokens, log.token)?,
                    user: log.user,
                    base_amount: log.amount_ether,
                    token_amount: log.amount_token,
                    lp_burned: log.lp_tokens_burned,
                    timestamp_ms: block_time(&times, &meta)?,
                })
            })
            .collect()
    }

    /// All trades touching a pool within one window: buys, sells and both
    /// swap legs, merged ascending.
    pub async fn pool_trades(&self, from: u64, to: u64, token: &Token) -> Result<Vec<TradeEvent>> {
        let (buys, sells, swaps) = tokio::try_join!(
            self.buy_trades(from, to, Some(token), None),
            self.sell_trades(from, to, Some(token), None),
            self.swap_trades(from, to, Some(token), None)
        )?;

        let mut batch: Vec<TradeEvent> = Vec::with_capacity(buys.len() + sells.len() + swaps.len());
        batch.extend(buys.into_iter().map(TradeEvent::Buy));
        batch.extend(sells.into_iter().map(TradeEvent::Sell));
        batch.extend(swaps.into_iter().map(TradeEvent::Swap));
        Ok(merge_events(Vec::new(), batch))
    }

    /// Liquidity movements (deposits and withdrawals) within one window.
    pub async fn liquidity_events(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<TradeEvent>> {
        let (deposits, withdraws) = tokio::try_join!(
            self.deposits(from, to, token, user),
            self.withdraws(from, to, token, user)
        )?;

        let mut batch: Vec<TradeEvent> = Vec::with_capacity(deposits.len() + withdraws.len());
        batch.extend(deposits.into_iter().map(TradeEvent::Deposit));
        batch.extend(withdraws.into_iter().map(TradeEvent::Withdraw));
        Ok(merge_events(Vec::new(), batch))
    }

    /// An account's liquidity activity within one window, across all pools.
    pub async fn account_activity(
        &self,
        from: u64,
        to: u64,
        user: Address,
    ) -> Result<Vec<TradeEvent>> {
        self.liquidity_events(from, to, None, Some(user)).await
    }

    /// Full trade timeline of a pool over an arbitrary range, scanned one
    /// fixed window at a time with an inter-window pause. Any window failure
    /// fails the whole scan; nothing partial is dropped silently.
    pub async fn scan_pool_trades(
        &self,
        from: u64,
        to: u64,
        token: &Token,
    ) -> Result<Vec<TradeEvent>> {
        let spans = windows(from, to);
        let mut timeline = Vec::new();
        for (index, (start, end)) in spans.iter().enumerate() {
            if index > 0 && !self.window_delay.is_zero() {
                sleep(self.window_delay).await;
            }
            debug!(start, end, token = %token.symbol, "scanning trade window");
            let batch = self.pool_trades(*start, *end, token).await?;
            timeline = merge_events(timeline, batch);
        }
        Ok(timeline)
    }

    /// Liquidity timeline of a pool over an arbitrary range, windowed as
    /// [`Self::scan_pool_trades`].
    pub async fn scan_liquidity_events(
        &self,
        from: u64,
        to: u64,
        token: Option<&Token>,
        user: Option<Address>,
    ) -> Result<Vec<TradeEvent>> {
        let spans = windows(from, to);
        let mut timeline = Vec::new();
        for (index, (start, end)) in spans.iter().enumerate() {
            if index > 0 && !self.window_delay.is_zero() {
                sleep(self.window_delay).await;
            }
            debug!(start, end, "scanning liquidity window");
            let batch = self.liquidity_events(*start, *end, token, user).await?;
            timeline = merge_events(timeline, batch);
        }
        Ok(timeline)
    }

    /// Resolves each unique block's wall-clock time once per call.
    async fn block_times<'a, I>(&self, metas: I) -> Result<HashMap<u64, u64>>
    where
        I: Iterator<Item = &'a LogMeta>,
    {
        let mut blocks: Vec<u64> = metas.map(|meta| meta.block_number.as_u64()).collect();
        blocks.sort_unstable();
        blocks.dedup();

        let rpc = self.reader.rpc();
        let times = try_join_all(
            blocks
                .iter()
                .map(|&block| rpc.get_block_timestamp_ms(block)),
        )
        .await?;
        Ok(blocks.into_iter().zip(times).collect())
    }

    /// Resolves each unique token address once per call.
    async fn resolve_tokens<I>(&self, addresses: I) -> Result<HashMap<Address, Token>>
    where
        I: Iterator<Item = Address>,
    {
        let mut unique: Vec<Address> = addresses.collect();
        unique.sort_unstable();
        unique.dedup();

        let tokens = try_join_all(unique.iter().map(|&address| self.reader.get_token(address)))
            .await?;
        Ok(unique.into_iter().zip(tokens).collect())
    }

    fn pick_token(
        &self,
        filter: Option<&Token>,
        resolved: &HashMap<Address, Token>,
        address: Address,
    ) -> Result<Token> {
        if let Some(token) = filter {
            return Ok(token.clone());
        }
        resolved.get(&address).cloned().ok_or_else(|| {
            MaelstromError::ContractError(format!("Unresolved event token {address:#x}"))
        })
    }
}

fn block_time(times: &HashMap<u64, u64>, meta: &LogMeta) -> Result<u64> {
    times
        .get(&meta.block_number.as_u64())
        .copied()
        .ok_or_else(|| {
            MaelstromError::RpcError(format!(
                "Missing timestamp for block {}",
                meta.block_number
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    fn buy(timestamp_ms: u64, base_amount: u64) -> TradeEvent {
        TradeEvent::Buy(BuyTrade {
            token: Token::ether(),
            trader: Address::zero(),
            base_amount: U256::from(base_amount),
            token_amount: U256::from(1u64),
            trade_buy_price: U256::from(2u64),
            updated_buy_price: U256::from(2u64),
            sell_price: U256::from(1u64),
            timestamp_ms,
        })
    }

    fn sell(timestamp_ms: u64, base_amount: u64) -> TradeEvent {
        TradeEvent::Sell(SellTrade {
            token: Token::ether(),
            trader: Address::zero(),
            token_amount: U256::from(1u64),
            base_amount: U256::from(base_amount),
            trade_sell_price: U256::from(1u64),
            updated_sell_price: U256::from(1u64),
            buy_price: U256::from(2u64),
            timestamp_ms,
        })
    }

    #[test]
    fn windows_split_fixed_size() {
        assert_eq!(windows(0, 2_500), vec![(0, 999), (1_000, 1_999), (2_000, 2_500)]);
        assert_eq!(windows(100, 200), vec![(100, 200)]);
        assert_eq!(windows(5, 5), vec![(5, 5)]);
        assert!(windows(10, 9).is_empty());
    }

    #[test]
    fn windows_cover_range_without_gaps() {
        let spans = windows(17, 12_345);
        assert_eq!(spans.first().unwrap().0, 17);
        assert_eq!(spans.last().unwrap().1, 12_345);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
        for (start, end) in spans {
            assert!(end - start <= BLOCK_WINDOW);
        }
    }

    #[test]
    fn merge_orders_by_timestamp() {
        let merged = merge_events(
            vec![buy(300, 1), buy(100, 2)],
            vec![sell(200, 3)],
        );
        let stamps: Vec<u64> = merged.iter().map(TradeEvent::timestamp_ms).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn merge_drops_duplicates() {
        let merged = merge_events(
            vec![buy(100, 1), sell(100, 1)],
            vec![buy(100, 1)],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn overlapping_fetches_are_idempotent() {
        // Two windows that both saw the middle of the range.
        let first = vec![buy(100, 1), sell(150, 2), buy(200, 3)];
        let second = vec![sell(150, 2), buy(200, 3), sell(250, 4)];

        let once = merge_events(first.clone(), second.clone());
        let union = merge_events(
            Vec::new(),
            first.iter().chain(second.iter()).cloned().collect(),
        );
        assert_eq!(once, union);

        let again = merge_events(once.clone(), second);
        assert_eq!(again, once);
        assert_eq!(again.len(), 4);
    }

    #[test]
    fn same_timestamp_different_content_both_kept() {
        let merged = merge_events(vec![buy(100, 1)], vec![buy(100, 99)]);
        assert_eq!(merged.len(), 2);
    }
}
