/// How a swap this process drove to completion settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Both legs redeemed; the swap completed as intended.
    Redeemed {
        own_leg_txid: String,
        counterparty_leg_ref: String,
    },
    /// This party's own leg timed out and was refunded; the swap did not
    /// complete.
    Refunded { refund_txid: String },
}
