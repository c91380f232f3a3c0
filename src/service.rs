/*
 * Pool service: coordinates RPC, reader, locator and aggregator into
 * ready-to-render pool state
 */

use chrono::Utc;
use ethers::types::{Address, U256};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::Config,
    contract::PoolReader,
    economics,
    events::EventScanner,
    locator,
    models::{Pool, Result, RowPool, Token},
    rpc::RpcClient,
};

/// Number of latest fee samples feeding the yield estimate.
const FEE_WINDOW: u64 = 10;

pub struct PoolService {
    rpc: Arc<RpcClient>,
    reader: Arc<PoolReader>,
    scanner: EventScanner,
}

impl PoolService {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing pool service");

        let rpc = Arc::new(RpcClient::new(&config.chain.rpc_url, config.chain.chain_id).await?);
        info!(chain_id = config.chain.chain_id, "Connected to RPC");

        let reader = Arc::new(PoolReader::new(rpc.clone())?);
        let scanner = EventScanner::new(reader.clone(), config.scan.window_delay_ms);

        Ok(Self {
            rpc,
            reader,
            scanner,
        })
    }

    #[must_use]
    pub fn reader(&self) -> Arc<PoolReader> {
        self.reader.clone()
    }

    #[must_use]
    pub fn scanner(&self) -> &EventScanner {
        &self.scanner
    }

    #[must_use]
    pub fn rpc(&self) -> Arc<RpcClient> {
        self.rpc.clone()
    }

    /// Base-asset volume traded against a pool over the trailing 24 hours:
    /// locate the boundary position, scan the trade timeline from there, sum
    /// the base-equivalent magnitudes.
    pub async fn pool_volume_24h(&self, token: &Token) -> Result<U256> {
        let head = self.rpc.get_block_number().await?;
        let now_ms = now_ms();
        let from = locator::position_24h_before(self.rpc.as_ref(), now_ms).await?;

        let events = self.scanner.scan_pool_trades(from, head, token).await?;
        economics::volume(&events, token)
    }

    /// Full pool snapshot for a token, as seen by `user`.
    pub async fn get_pool(&self, token: &Token, user: Address) -> Result<Pool> {
        let lp_token = self.reader.get_lp_token(token, user).await?;

        let (reserve, buy_price, sell_price, token_ratio, last_exchange_at) = tokio::try_join!(
            self.reader.get_reserves(token),
            self.reader.get_buy_price(token),
            self.reader.get_sell_price(token),
            self.reader.get_token_ratio(token),
            self.reader.get_last_exchange_timestamp(token)
        )?;

        if buy_price < sell_price {
            warn!(
                token = %token.symbol,
                %buy_price,
                %sell_price,
                "buy price below sell price; pool data may be stale"
            );
        }

        let avg_price = economics::average_price(buy_price, sell_price);
        let total_liquidity = economics::total_liquidity(
            avg_price,
            reserve.base_reserve,
            reserve.token_reserve,
            token.decimals,
        )?;

        let volume_24h = self.pool_volume_24h(token).await?;

        let fee_count = self.reader.get_pool_fee_events_count(token).await?;
        let fee_events = if fee_count > 0 {
            self.reader
                .get_pool_fee_list(token, fee_count.saturating_sub(FEE_WINDOW), fee_count - 1)
                .await?
        } else {
            Vec::new()
        };
        let daily_yield = economics::pool_yield(&fee_events, total_liquidity)?;
        let apr = economics::apr(daily_yield);

        Ok(Pool {
            token: token.clone(),
            reserve,
            lp_token,
            buy_price,
            sell_price,
            avg_price,
            token_ratio,
            volume_24h,
            total_liquidity,
            apr,
            last_exchange_at,
            last_updated: Utc::now(),
        })
    }

    /// Paginated pool listing, enriched concurrently with input order kept.
    pub async fn get_pools(&self, start: u64, end: u64) -> Result<Vec<RowPool>> {
        let addresses = self.reader.get_pool_list(start, end).await?;
        let tokens = try_join_all(
            addresses
                .iter()
                .map(|&address| self.reader.get_token(address)),
        )
        .await?;

        try_join_all(tokens.into_iter().map(|token| self.row_pool(token, None))).await
    }

    /// Pools the user holds LP shares in, with their LP position attached.
    pub async fn get_user_pools(
        &self,
        user: Address,
        start: u64,
        end: u64,
    ) -> Result<Vec<RowPool>> {
        let addresses = self.reader.get_user_pool_list(user, start, end).await?;
        let tokens = try_join_all(
            addresses
                .iter()
                .map(|&address| self.reader.get_token(address)),
        )
        .await?;

        try_join_all(
            tokens
                .into_iter()
                .map(|token| self.row_pool(token, Some(user))),
        )
        .await
    }

    async fn row_pool(&self, token: Token, user: Option<Address>) -> Result<RowPool> {
        let (buy_price, sell_price, reserve) = tokio::try_join!(
            self.reader.get_buy_price(&token),
            self.reader.get_sell_price(&token),
            self.reader.get_reserves(&token)
        )?;

        let avg_price = economics::average_price(buy_price, sell_price);
        let total_liquidity = economics::total_liquidity(
            avg_price,
            reserve.base_reserve,
            reserve.token_reserve,
            token.decimals,
        )?;

        let lp_token = match user {
            Some(user) => Some(self.reader.get_lp_token(&token, user).await?),
            None => None,
        };

        Ok(RowPool {
            token,
            buy_price,
            sell_price,
            total_liquidity,
            lp_token,
        })
    }
}

#[allow(clippy::cast_sign_loss)]
fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
