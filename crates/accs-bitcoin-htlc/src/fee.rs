use accs_bitcoin_chain::BitcoinChain;
use accs_error::AccsError;

/// Estimated vsize, in vbytes, of a single-input HTLC redeem or refund
/// transaction: one P2WSH input taking either branch of the redeem
/// script, one P2WPKH output.
pub const HTLC_SPEND_VSIZE: u64 = 140;

#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    /// Fee for the requested priority tier.
    pub want: u64,
    /// Fee at the highest observed fee-rate tier, used as a sanity
    /// ceiling when validating a counterparty's refund transaction.
    pub max: u64,
}

/// Converts the chain's sat/vB fee-rate tiers into absolute fees for an
/// HTLC spend, at the given priority (0 = next block, 2 = relaxed).
pub async fn calculate_fee(
    chain: &dyn BitcoinChain,
    priority: u8,
) -> Result<FeeEstimate, AccsError> {
    let estimates = chain.get_fee_estimates().await?;
    let want = (HTLC_SPEND_VSIZE as f64 * estimates.at(priority)).ceil() as u64;
    let max = (HTLC_SPEND_VSIZE as f64 * estimates.max()).ceil() as u64;
    Ok(FeeEstimate { want, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use accs_bitcoin_chain::MockBitcoinChain;

    #[tokio::test]
    async fn fee_scales_with_vsize_and_rate() {
        let chain = MockBitcoinChain::new();
        chain.set_fee_estimates(1.0, 5.0, 10.0);
        let fee = calculate_fee(&chain, 1).await.unwrap();
        assert_eq!(fee.want, 700);
        assert_eq!(fee.max, 1400);
    }
}
