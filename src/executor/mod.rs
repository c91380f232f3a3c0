/*
 * Transaction Executor: capability grants and mutating ledger calls
 */

use crate::config;
use crate::contract::{Erc20, MaelstromPool};
use crate::models::{
    ActionResult, BuyRequest, BuyResult, DepositRequest, DepositResult, InitPoolRequest,
    InitPoolResult, MaelstromError, Result, SellRequest, SellResult, SwapRequest, SwapResult,
    WithdrawRequest, WithdrawResult,
};
use ethers::providers::Middleware;
use ethers::types::{Address, TxHash, U256, U64};
use std::sync::Arc;
use tracing::info;

/// Submits mutating actions against the pool contract. Every action that
/// moves a token the contract does not yet hold rights to is preceded by an
/// approval awaited to inclusion; buys pay in the base asset and need no
/// grant. Each submission yields exactly one Result record and is never
/// retried here.
pub struct TradeExecutor<M> {
    contract: MaelstromPool<M>,
    client: Arc<M>,
}

impl<M: Middleware + 'static> TradeExecutor<M> {
    pub fn new(client: Arc<M>, chain_id: u64) -> Result<Self> {
        let address = config::contract_address(chain_id)?;
        Ok(Self {
            contract: MaelstromPool::new(address, client.clone()),
            client,
        })
    }

    pub async fn init_pool(&self, request: InitPoolRequest) -> InitPoolResult {
        match self.submit_init_pool(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Pool initialization failed: {e}")),
        }
    }

    pub async fn deposit(&self, request: DepositRequest) -> DepositResult {
        match self.submit_deposit(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Deposit failed: {e}")),
        }
    }

    pub async fn withdraw(&self, request: WithdrawRequest) -> WithdrawResult {
        match self.submit_withdraw(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Withdraw failed: {e}")),
        }
    }

    pub async fn swap(&self, request: SwapRequest) -> SwapResult {
        match self.submit_swap(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Swap failed: {e}")),
        }
    }

    pub async fn buy(&self, request: BuyRequest) -> BuyResult {
        match self.submit_buy(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Buy failed: {e}")),
        }
    }

    pub async fn sell(&self, request: SellRequest) -> SellResult {
        match self.submit_sell(&request).await {
            Ok(tx_hash) => ActionResult::submitted(request, tx_hash),
            Err(e) => ActionResult::failed(request, format!("Sell failed: {e}")),
        }
    }

    /// Grants the contract transfer rights over `amount` of `token` and
    /// waits for the grant to land before anything depends on it.
    async fn approve(&self, token: Address, amount: U256) -> Result<()> {
        let erc20 = Erc20::new(token, self.client.clone());
        let call = erc20.approve(self.contract.address(), amount);
        let pending = call.send().await.map_err(|e| {
            MaelstromError::ExecutionError(format!("Token approval failed: {e}"))
        })?;

        let receipt = pending
            .await
            .map_err(|e| {
                MaelstromError::ExecutionError(format!("Token approval failed: {e}"))
            })?
            .ok_or_else(|| {
                MaelstromError::ExecutionError(
                    "Token approval dropped before inclusion".to_string(),
                )
            })?;

        if receipt.status != Some(U64::from(1)) {
            return Err(MaelstromError::ExecutionError(
                "Token approval reverted".to_string(),
            ));
        }
        Ok(())
    }

    async fn submit_init_pool(&self, request: &InitPoolRequest) -> Result<TxHash> {
        self.approve(request.token.address, request.token_amount)
            .await?;
        let call = self
            .contract
            .initialize_pool(
                request.token.address,
                request.token_amount,
                request.initial_buy_price,
                request.initial_sell_price,
            )
            .value(request.base_amount);
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(%tx_hash, token = %request.token.symbol, "pool initialization submitted");
        Ok(tx_hash)
    }

    async fn submit_deposit(&self, request: &DepositRequest) -> Result<TxHash> {
        self.approve(request.token.address, request.token_amount)
            .await?;
        let call = self
            .contract
            .deposit(request.token.address)
            .value(request.base_amount);
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(%tx_hash, token = %request.token.symbol, "deposit submitted");
        Ok(tx_hash)
    }

    async fn submit_withdraw(&self, request: &WithdrawRequest) -> Result<TxHash> {
        // The LP shares flow back into the contract, so the grant is on the
        // LP token, not the pool token.
        self.approve(request.lp_token.token.address, request.lp_amount)
            .await?;
        let call = self
            .contract
            .withdraw(request.token.address, request.lp_amount);
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(%tx_hash, token = %request.token.symbol, "withdraw submitted");
        Ok(tx_hash)
    }

    async fn submit_swap(&self, request: &SwapRequest) -> Result<TxHash> {
        self.approve(request.token_in.address, request.amount_in)
            .await?;
        let call = self.contract.swap(
            request.token_in.address,
            request.token_out.address,
            request.amount_in,
            request.minimum_out,
        );
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(
            %tx_hash,
            sold = %request.token_in.symbol,
            bought = %request.token_out.symbol,
            "swap submitted"
        );
        Ok(tx_hash)
    }

    async fn submit_buy(&self, request: &BuyRequest) -> Result<TxHash> {
        let call = self
            .contract
            .buy(request.token.address, request.minimum_token_out)
            .value(request.base_in);
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(%tx_hash, token = %request.token.symbol, "buy submitted");
        Ok(tx_hash)
    }

    async fn submit_sell(&self, request: &SellRequest) -> Result<TxHash> {
        self.approve(request.token.address, request.amount_in)
            .await?;
        let call = self.contract.sell(
            request.token.address,
            request.amount_in,
            request.minimum_base_out,
        );
        let pending = call.send().await.map_err(tx_error)?;
        let tx_hash = *pending;
        info!(%tx_hash, token = %request.token.symbol, "sell submitted");
        Ok(tx_hash)
    }
}

fn tx_error<E: std::fmt::Display>(error: E) -> MaelstromError {
    MaelstromError::ExecutionError(error.to_string())
}
