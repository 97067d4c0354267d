use std::sync::Mutex;

use async_trait::async_trait;

use accs_error::AccsError;
use accs_secret::Secret;

use crate::adapter::{BitsharesChain, BitsharesNetwork, CreateHtlcParams};

#[derive(Debug, Clone)]
struct HtlcRecord {
    from: String,
    to: String,
    amount: u64,
    hash_hex: String,
    redeemed_with: Option<String>,
}

/// An in-memory `BitsharesChain` used by orchestrator tests and the
/// end-to-end scenario tests. `create_htlc` always takes the configured
/// signer as `from`; callers set that up via [`MockBitsharesChain::new`].
pub struct MockBitsharesChain {
    signer_account: String,
    htlcs: Mutex<Vec<HtlcRecord>>,
}

impl MockBitsharesChain {
    pub fn new(signer_account: impl Into<String>) -> Self {
        Self {
            signer_account: signer_account.into(),
            htlcs: Mutex::new(Vec::new()),
        }
    }

    /// Test hook: simulates the counterparty funding an HTLC directly,
    /// bypassing `create_htlc`.
    pub fn inject_htlc(&self, from: &str, to: &str, amount: u64, hash_hex: &str) {
        self.htlcs.lock().unwrap().push(HtlcRecord {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            hash_hex: hash_hex.to_string(),
            redeemed_with: None,
        });
    }
}

#[async_trait]
impl BitsharesChain for MockBitsharesChain {
    async fn create_htlc(&self, params: CreateHtlcParams) -> Result<String, AccsError> {
        self.htlcs.lock().unwrap().push(HtlcRecord {
            from: self.signer_account.clone(),
            to: params.to_account.clone(),
            amount: params.amount,
            hash_hex: params.hash_hex.clone(),
            redeemed_with: None,
        });
        Ok(format!("mock-bts-htlc-{}", params.hash_hex))
    }

    async fn redeem(
        &self,
        amount: u64,
        _private_key: &str,
        secret: &Secret,
    ) -> Result<bool, AccsError> {
        let preimage_hex = secret
            .preimage_hex()
            .ok_or_else(|| AccsError::Input("redeem requires a known preimage".into()))?;
        let mut htlcs = self.htlcs.lock().unwrap();
        for record in htlcs.iter_mut() {
            if record.hash_hex == secret.hash_hex()
                && record.amount == amount
                && record.redeemed_with.is_none()
            {
                record.redeemed_with = Some(preimage_hex);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get_id(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        hash_hex: &str,
        _time_seconds: u64,
    ) -> Result<Option<String>, AccsError> {
        let found = self
            .htlcs
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.from == from && r.to == to && r.amount == amount && r.hash_hex == hash_hex);
        Ok(found.then(|| format!("mock-bts-htlc-{hash_hex}")))
    }

    async fn get_preimage_from_htlc(
        &self,
        from: &str,
        to: &str,
        hash_hex: &str,
    ) -> Result<Option<String>, AccsError> {
        Ok(self
            .htlcs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.from == from && r.to == to && r.hash_hex == hash_hex)
            .and_then(|r| r.redeemed_with.clone()))
    }

    fn to_account_id(
        &self,
        _private_key: &str,
        network: BitsharesNetwork,
    ) -> Result<String, AccsError> {
        Ok(match network {
            BitsharesNetwork::Mainnet => format!("BTS-{}", self.signer_account),
            BitsharesNetwork::Testnet => format!("TEST-{}", self.signer_account),
        })
    }

    async fn get_account_id(&self, name: &str) -> Result<String, AccsError> {
        Ok(format!("1.2.{name}"))
    }
}
