//! Derives asymmetric timelocks from a target confirmation horizon.

use accs_bitcoin_chain::BitcoinChain;
use accs_error::AccsError;

/// Number of trailing blocks `Timer::to_bts` samples to compute the
/// median Bitcoin block time.
const DEFAULT_MEDIAN_WINDOW: u32 = 10;

/// Stateless given adapter responses: two calls may legitimately return
/// different values for `to_bts` as the chain moves. `Timer` never caches.
pub struct Timer {
    horizon_blocks: u32,
    median_window: u32,
}

impl Timer {
    /// `horizon_blocks` defaults to 6 in the orchestrator; callers on
    /// testnet may pass a larger value to account for irregular block
    /// times.
    pub fn new(horizon_blocks: u32) -> Self {
        Self {
            horizon_blocks,
            median_window: DEFAULT_MEDIAN_WINDOW,
        }
    }

    pub fn with_median_window(mut self, window: u32) -> Self {
        self.median_window = window;
        self
    }

    /// The Bitcoin-side timelock, in blocks.
    pub fn to_btc(&self) -> u32 {
        self.horizon_blocks
    }

    /// The Bitshares-side timelock, in seconds: `horizon_blocks *
    /// median_block_time_secs`.
    pub async fn to_bts(&self, chain: &dyn BitcoinChain) -> Result<u64, AccsError> {
        let median_secs = chain.median_block_time(self.median_window).await?;
        Ok(self.horizon_blocks as u64 * median_secs)
    }
}

/// Halves a timelock for the party acting second, per the asymmetry rule:
/// the second-acting party's refund deadline must arrive strictly before
/// the first-acting party's. Never rounds to zero.
pub fn halve(timelock: u64) -> u64 {
    (timelock / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accs_bitcoin_chain::MockBitcoinChain;

    #[test]
    fn to_btc_returns_horizon_verbatim() {
        assert_eq!(Timer::new(6).to_btc(), 6);
    }

    #[tokio::test]
    async fn to_bts_multiplies_by_median_block_time() {
        let chain = MockBitcoinChain::new();
        chain.set_median_block_time(300);
        let timer = Timer::new(6);
        assert_eq!(timer.to_bts(&chain).await.unwrap(), 1800);
    }

    #[test]
    fn halve_never_rounds_to_zero() {
        assert_eq!(halve(1), 1);
        assert_eq!(halve(0), 1);
        assert_eq!(halve(6), 3);
    }
}
