use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapter::BitcoinChain;
use crate::types::{BlockInfo, FeeEstimates, TxValue, Utxo};
use accs_error::AccsError;

/// An in-memory `BitcoinChain` for exercising the HTLC engine and the
/// orchestrator without network access. All state is mutated through
/// `&self` (interior mutability) so a single mock can be shared behind an
/// `Arc` the way a real adapter would be.
pub struct MockBitcoinChain {
    utxos: Mutex<Vec<(String, Vec<Utxo>)>>,
    fee_estimates: Mutex<FeeEstimates>,
    block_height: Mutex<u32>,
    confirmations: Mutex<Vec<(String, u32)>>,
    last_tx_value: Mutex<Vec<(String, TxValue)>>,
    spend_preimage: Mutex<Vec<(String, Result<[u8; 32], String>)>>,
    broadcasts: Mutex<Vec<String>>,
    median_block_time_secs: Mutex<u64>,
    default_confirmation_height: Mutex<Option<u32>>,
}

impl Default for MockBitcoinChain {
    fn default() -> Self {
        Self {
            utxos: Mutex::new(Vec::new()),
            fee_estimates: Mutex::new(FeeEstimates {
                priority0: 1.0,
                priority1: 2.0,
                priority2: 5.0,
            }),
            block_height: Mutex::new(100),
            confirmations: Mutex::new(Vec::new()),
            last_tx_value: Mutex::new(Vec::new()),
            spend_preimage: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            median_block_time_secs: Mutex::new(600),
            default_confirmation_height: Mutex::new(None),
        }
    }
}

impl MockBitcoinChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_utxos(&self, address: &str, utxos: Vec<Utxo>) {
        self.utxos
            .lock()
            .unwrap()
            .push((address.to_string(), utxos));
    }

    pub fn set_block_height(&self, height: u32) {
        *self.block_height.lock().unwrap() = height;
    }

    pub fn advance_blocks(&self, n: u32) {
        *self.block_height.lock().unwrap() += n;
    }

    pub fn set_confirmation_height(&self, txid: &str, height: u32) {
        self.confirmations
            .lock()
            .unwrap()
            .push((txid.to_string(), height));
    }

    /// Confirmation height returned for any txid that wasn't given one via
    /// `set_confirmation_height`. Lets a test confirm a funding transaction
    /// whose txid it can't predict ahead of time (it depends on the signed
    /// transaction the HTLC engine builds).
    pub fn set_default_confirmation_height(&self, height: u32) {
        *self.default_confirmation_height.lock().unwrap() = Some(height);
    }

    pub fn set_preimage_for_spend(&self, address: &str, preimage: [u8; 32]) {
        self.spend_preimage
            .lock()
            .unwrap()
            .push((address.to_string(), Ok(preimage)));
    }

    pub fn set_malformed_spend(&self, address: &str, reason: &str) {
        self.spend_preimage
            .lock()
            .unwrap()
            .push((address.to_string(), Err(reason.to_string())));
    }

    pub fn set_last_value(&self, address: &str, value: TxValue) {
        self.last_tx_value
            .lock()
            .unwrap()
            .push((address.to_string(), value));
    }

    pub fn set_median_block_time(&self, secs: u64) {
        *self.median_block_time_secs.lock().unwrap() = secs;
    }

    pub fn set_fee_estimates(&self, priority0: f64, priority1: f64, priority2: f64) {
        *self.fee_estimates.lock().unwrap() = FeeEstimates {
            priority0,
            priority1,
            priority2,
        };
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }
}

fn lookup<T: Clone>(store: &Mutex<Vec<(String, T)>>, key: &str) -> Option<T> {
    store
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

#[async_trait]
impl BitcoinChain for MockBitcoinChain {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, AccsError> {
        Ok(lookup(&self.utxos, address).unwrap_or_default())
    }

    async fn get_fee_estimates(&self) -> Result<FeeEstimates, AccsError> {
        Ok(*self.fee_estimates.lock().unwrap())
    }

    async fn get_last_block(&self) -> Result<BlockInfo, AccsError> {
        Ok(BlockInfo {
            height: *self.block_height.lock().unwrap(),
            hash: "mock-tip".to_string(),
        })
    }

    async fn get_block_height_for_tx(&self, txid: &str) -> Result<Option<u32>, AccsError> {
        match lookup(&self.confirmations, txid) {
            Some(height) => Ok(Some(height)),
            None => Ok(*self.default_confirmation_height.lock().unwrap()),
        }
    }

    async fn get_value_from_last_transaction(&self, address: &str) -> Result<TxValue, AccsError> {
        lookup(&self.last_tx_value, address)
            .ok_or_else(|| AccsError::NotFound(format!("no transaction for {address}")))
    }

    async fn get_preimage_from_last_transaction(
        &self,
        address: &str,
    ) -> Result<[u8; 32], AccsError> {
        match lookup(&self.spend_preimage, address) {
            Some(Ok(preimage)) => Ok(preimage),
            Some(Err(reason)) => Err(AccsError::MalformedWitness(reason)),
            None => Err(AccsError::NotFound(format!("no spend of {address} yet"))),
        }
    }

    async fn push_tx(&self, raw_hex: &str) -> Result<String, AccsError> {
        self.broadcasts.lock().unwrap().push(raw_hex.to_string());
        Ok(format!("mock-txid-{}", self.broadcasts.lock().unwrap().len()))
    }

    async fn median_block_time(&self, _k: u32) -> Result<u64, AccsError> {
        Ok(*self.median_block_time_secs.lock().unwrap())
    }
}
