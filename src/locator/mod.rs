/*
 * Block-Time Locator: map a wall-clock offset to a ledger position
 */

use crate::models::Result;
use crate::rpc::RpcClient;
use async_trait::async_trait;

pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Monotone position-to-time mapping of an append-only sequence.
#[async_trait]
pub trait BlockTimestampSource: Send + Sync {
    async fn head_position(&self) -> Result<u64>;

    /// Wall-clock time of a position, milliseconds. Non-decreasing in the
    /// position.
    async fn timestamp_ms(&self, position: u64) -> Result<u64>;
}

#[async_trait]
impl BlockTimestampSource for RpcClient {
    async fn head_position(&self) -> Result<u64> {
        self.get_block_number().await
    }

    async fn timestamp_ms(&self, position: u64) -> Result<u64> {
        self.get_block_timestamp_ms(position).await
    }
}

/// Largest position whose timestamp is at or before `now_ms - offset_ms`,
/// or position 0 when the whole sequence is inside the window. A historical
/// scan starting here covers the full window with at most one boundary
/// position of slack.
///
/// O(log P) timestamp lookups over `[0, head]`.
pub async fn position_before<S>(source: &S, now_ms: u64, offset_ms: u64) -> Result<u64>
where
    S: BlockTimestampSource + ?Sized,
{
    let target = i128::from(now_ms) - i128::from(offset_ms);

    let mut low = 0u64;
    let mut high = source.head_position().await?;

    while low < high {
        let mid = low + (high - low + 1) / 2;
        if i128::from(source.timestamp_ms(mid).await?) <= target {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    Ok(low)
}

/// Position of the 24-hour boundary before `now_ms`.
pub async fn position_24h_before<S>(source: &S, now_ms: u64) -> Result<u64>
where
    S: BlockTimestampSource + ?Sized,
{
    position_before(source, now_ms, DAY_MS).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UniformChain {
        head: u64,
        step_ms: u64,
        lookups: AtomicUsize,
    }

    impl UniformChain {
        fn new(head: u64, step_ms: u64) -> Self {
            Self {
                head,
                step_ms,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BlockTimestampSource for UniformChain {
        async fn head_position(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn timestamp_ms(&self, position: u64) -> Result<u64> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok(position * self.step_ms)
        }
    }

    #[tokio::test]
    async fn finds_boundary_position() {
        let chain = UniformChain::new(1_000, 1_000);
        let position = position_before(&chain, 1_000_000, 500_000).await.unwrap();

        // timestamp(P) <= now - N < timestamp(P + 1)
        assert_eq!(position, 500);
    }

    #[tokio::test]
    async fn boundary_between_positions_prefers_earlier() {
        let chain = UniformChain::new(1_000, 1_000);
        // Target 500_500ms falls between positions 500 and 501.
        let position = position_before(&chain, 1_000_000, 499_500).await.unwrap();
        assert_eq!(position, 500);
    }

    #[tokio::test]
    async fn window_older_than_chain_returns_first_position() {
        // 1000-position sequence, ts(p) = p * 1000ms, now = 1_000_000ms,
        // 24h offset: the whole range postdates the boundary.
        let chain = UniformChain::new(999, 1_000);
        let position = position_24h_before(&chain, 1_000_000).await.unwrap();
        assert_eq!(position, 0);
    }

    #[tokio::test]
    async fn zero_offset_returns_head() {
        let chain = UniformChain::new(1_000, 1_000);
        let position = position_before(&chain, 1_000_000, 0).await.unwrap();
        assert_eq!(position, 1_000);
    }

    #[tokio::test]
    async fn lookup_count_is_logarithmic() {
        let chain = UniformChain::new(1_000_000, 1_000);
        position_before(&chain, 1_000_000_000, 250_000_000)
            .await
            .unwrap();
        // Binary search over 1M positions needs ~20 probes, not 1M.
        assert!(chain.lookups.load(Ordering::Relaxed) <= 25);
    }

    #[tokio::test]
    async fn invariant_holds_across_offsets() {
        let chain = UniformChain::new(5_000, 777);
        let now = 5_000 * 777 + 123;
        for offset in [1u64, 1_000, 77_700, 777_000, 3_000_000] {
            let p = position_before(&chain, now, offset).await.unwrap();
            let target = i128::from(now) - i128::from(offset);
            if p > 0 {
                assert!(i128::from(p * 777) <= target);
            }
            if p < 5_000 {
                assert!(i128::from((p + 1) * 777) > target);
            }
        }
    }
}
