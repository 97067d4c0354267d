use async_trait::async_trait;

use crate::types::{BlockInfo, FeeEstimates, TxValue, Utxo};
use accs_error::AccsError;

/// The interface the HTLC engine and the orchestrator consume to
/// talk to Bitcoin. Any REST-based Esplora-compatible backend can
/// implement this; the engine and orchestrator never depend on the
/// concrete transport.
#[async_trait]
pub trait BitcoinChain: Send + Sync {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, AccsError>;

    /// Greedily accumulates UTXOs until their sum covers `amount_sat`.
    /// Fails `InsufficientFunds` if the address's total is short.
    async fn get_utxos_for_amount(
        &self,
        address: &str,
        amount_sat: u64,
    ) -> Result<Vec<Utxo>, AccsError> {
        let utxos = self.get_utxos(address).await?;
        let mut picked = Vec::new();
        let mut total = 0u64;
        for utxo in utxos {
            total += utxo.value;
            picked.push(utxo);
            if total >= amount_sat {
                return Ok(picked);
            }
        }
        Err(AccsError::InsufficientFunds {
            need: amount_sat,
            have: total,
        })
    }

    async fn get_fee_estimates(&self) -> Result<FeeEstimates, AccsError>;

    async fn get_last_block(&self) -> Result<BlockInfo, AccsError>;

    async fn get_block_height_for_tx(&self, txid: &str) -> Result<Option<u32>, AccsError>;

    async fn get_value_from_last_transaction(&self, address: &str) -> Result<TxValue, AccsError>;

    /// Parses the witness of the most recent transaction spending
    /// `address` and returns the preimage at the HTLC redeem-script
    /// witness position. `NotFound` if there's no spend yet,
    /// `MalformedWitness` if the spend doesn't match the expected shape.
    async fn get_preimage_from_last_transaction(
        &self,
        address: &str,
    ) -> Result<[u8; 32], AccsError>;

    async fn push_tx(&self, raw_hex: &str) -> Result<String, AccsError>;

    /// Median block time in seconds over the last `k` blocks, used by
    /// `Timer::to_bts`.
    async fn median_block_time(&self, k: u32) -> Result<u64, AccsError>;
}
