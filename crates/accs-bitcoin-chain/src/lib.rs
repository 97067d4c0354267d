//! The `BitcoinChain` adapter: the interface the HTLC engine and the
//! orchestrator use to query UTXOs, fee estimates, block height, and to
//! broadcast transactions / extract preimages from witness data. See
//! [`adapter::BitcoinChain`] for the trait and [`esplora::EsploraChain`]
//! for the production implementation against a Blockstream-compatible
//! Esplora REST API.

mod adapter;
mod esplora;
mod mock;
mod types;

pub use adapter::BitcoinChain;
pub use esplora::EsploraChain;
pub use mock::MockBitcoinChain;
pub use types::{BlockInfo, FeeEstimates, TxStatus, TxValue, Utxo};
