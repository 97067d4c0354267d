//! The Bitcoin HTLC engine: redeem-script construction, P2WSH
//! funding, and the redeem/refund transaction plumbing around a single
//! HTLC's lifecycle.

mod engine;
mod error;
mod fee;
mod script;
mod state;

pub use engine::{BitcoinHtlc, LocalRole};
pub use error::HtlcError;
pub use fee::{calculate_fee, FeeEstimate, HTLC_SPEND_VSIZE};
pub use script::{build_redeem_script, get_p2wsh, P2wshPayment, MAX_SEQUENCE};
pub use state::{HtlcState, Outcome};
