use async_trait::async_trait;

use accs_error::AccsError;
use accs_secret::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsharesNetwork {
    Mainnet,
    Testnet,
}

/// Parameters for creating a Bitshares-side HTLC (`BitsharesChain::create_htlc`).
#[derive(Debug, Clone)]
pub struct CreateHtlcParams {
    pub amount: u64,
    pub asset: String,
    pub time_seconds: u64,
    pub hash_hex: String,
    pub private_key: String,
    pub to_account: String,
}

/// The interface the orchestrator uses to create, redeem, and query
/// HTLC operations on Bitshares. The wire protocol and chain-query layer
/// behind this trait are out of scope for this engine; `WsBitsharesChain`
/// is a skeleton sufficient to show the wiring, not a complete client.
#[async_trait]
pub trait BitsharesChain: Send + Sync {
    async fn create_htlc(&self, params: CreateHtlcParams) -> Result<String, AccsError>;

    /// Attempts a redeem. `Ok(false)` means no matching HTLC exists
    /// *yet* — this is how the orchestrator polls — and must never be
    /// treated as a failure. Only transport/parse failures are `Err`.
    async fn redeem(
        &self,
        amount: u64,
        private_key: &str,
        secret: &Secret,
    ) -> Result<bool, AccsError>;

    async fn get_id(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        hash_hex: &str,
        time_seconds: u64,
    ) -> Result<Option<String>, AccsError>;

    async fn get_preimage_from_htlc(
        &self,
        from: &str,
        to: &str,
        hash_hex: &str,
    ) -> Result<Option<String>, AccsError>;

    fn to_account_id(
        &self,
        private_key: &str,
        network: BitsharesNetwork,
    ) -> Result<String, AccsError>;

    async fn get_account_id(&self, name: &str) -> Result<String, AccsError>;
}
