use thiserror::Error;

use accs_bitcoin_htlc::HtlcError;
use accs_error::AccsError;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("input error: {0}")]
    Input(String),

    #[error(transparent)]
    Chain(#[from] AccsError),

    #[error(transparent)]
    Htlc(#[from] HtlcError),

    #[error("counterparty did not act within the timelock horizon")]
    CounterpartyTimedOut,
}
