use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtlcError {
    #[error("htlc is not in the expected state for this operation")]
    WrongState,

    #[error("only the sender may fund or refund this htlc")]
    NotSender,

    #[error("only the receiver may redeem this htlc")]
    NotReceiver,

    #[error("relative timelock {0} exceeds the 16-bit CSV sequence range")]
    SequenceOutOfRange(u64),

    #[error("redeem requires a known preimage")]
    MissingPreimage,

    #[error(transparent)]
    Chain(#[from] accs_error::AccsError),

    #[error("bitcoin key or address error: {0}")]
    Key(String),

    #[error("transaction signing error: {0}")]
    Sighash(String),
}
