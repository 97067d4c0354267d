//! Shared error taxonomy for the ACCS engine.
//!
//! Every crate in the workspace eventually converges its own local error
//! type onto [`AccsError`] at the boundary where a human (or the CLI's exit
//! code mapping) needs to see it. Which kinds are swallowed inside polling
//! loops and which are always surfaced is a property of the *caller*, not
//! of this enum, so no variant here encodes that policy.

use thiserror::Error;

/// The top-level error taxonomy shared across the workspace.
#[derive(Debug, Error)]
pub enum AccsError {
    /// Malformed keys, unknown network, out-of-range priority, and any
    /// other problem caught before touching a chain.
    #[error("input error: {0}")]
    Input(String),

    /// Transport/HTTP/WebSocket failure or response-parse failure talking
    /// to a chain adapter.
    #[error("chain query error: {0}")]
    ChainQuery(String),

    /// An expected on-chain object (UTXO, HTLC, transaction) is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A peer rejected a broadcast transaction. The raw hex is carried so
    /// a refund broadcast failure can still be recovered manually.
    #[error("broadcast error: {message}")]
    Broadcast {
        message: String,
        raw_hex: Option<String>,
    },

    /// A UTXO's value is less than the requested amount plus fee.
    #[error("insufficient funds: need {need} sat, have {have} sat")]
    InsufficientFunds { need: u64, have: u64 },

    /// An extracted preimage, or a witness stack generally, did not match
    /// the expected HTLC redeem shape.
    #[error("malformed witness: {0}")]
    MalformedWitness(String),

    /// A polling loop exhausted its bound without the counterparty acting.
    #[error("timeout: {0}")]
    Timeout(String),
}

impl AccsError {
    /// True for the error kinds a polling loop should swallow and retry
    /// rather than propagate. Structural errors (bad witness, broadcast
    /// rejection, insufficient funds) are never swallowed even when raised
    /// from inside a poll loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, AccsError::ChainQuery(_) | AccsError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, AccsError>;
