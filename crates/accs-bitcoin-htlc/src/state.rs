use bitcoin::Txid;

/// Which side of the redeem script was taken to settle a funded HTLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Redeemed,
    Refunded,
}

/// An HTLC's lifecycle: `Unfunded` until the sender broadcasts the
/// funding transaction, `Funded` while the locked output is live, then
/// `Terminal` once either branch of the redeem script has been taken.
/// There is no path back from `Terminal`.
#[derive(Debug, Clone)]
pub enum HtlcState {
    Unfunded,
    Funded {
        funding_txid: Txid,
        funding_vout: u32,
        confirmation_height: Option<u32>,
        /// The amount actually locked into the P2WSH output.
        amount_after_fees: u64,
        /// Pre-signed refund transaction, built and held at funding time
        /// so it can be broadcast later without the sender's key.
        refund_tx_hex: String,
    },
    Terminal {
        outcome: Outcome,
    },
}

impl HtlcState {
    pub fn is_unfunded(&self) -> bool {
        matches!(self, HtlcState::Unfunded)
    }

    pub fn is_funded(&self) -> bool {
        matches!(self, HtlcState::Funded { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HtlcState::Terminal { .. })
    }
}
