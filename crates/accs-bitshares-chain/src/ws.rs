use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use accs_error::AccsError;
use accs_secret::Secret;

use crate::adapter::{BitsharesChain, BitsharesNetwork, CreateHtlcParams};
use crate::connection::BitsharesConnection;

const DATABASE_API: u64 = 0;

/// Bitshares-chain adapter backed by a single owned [`BitsharesConnection`].
pub struct WsBitsharesChain {
    connection: BitsharesConnection,
}

impl WsBitsharesChain {
    pub async fn connect(endpoint: &str) -> Result<Self, AccsError> {
        Ok(Self {
            connection: BitsharesConnection::connect(endpoint).await?,
        })
    }

    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
    }
}

#[async_trait]
impl BitsharesChain for WsBitsharesChain {
    #[instrument(skip(self, params), fields(asset = %params.asset, amount = params.amount))]
    async fn create_htlc(&self, params: CreateHtlcParams) -> Result<String, AccsError> {
        let result = self
            .connection
            .call(
                DATABASE_API,
                "create_htlc",
                json!({
                    "amount": params.amount,
                    "asset": params.asset,
                    "time": params.time_seconds,
                    "hash": params.hash_hex,
                    "to": params.to_account,
                }),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AccsError::ChainQuery("create_htlc: missing transaction id".into()))
    }

    #[instrument(skip(self, private_key, secret), fields(amount))]
    async fn redeem(
        &self,
        amount: u64,
        private_key: &str,
        secret: &Secret,
    ) -> Result<bool, AccsError> {
        let preimage_hex = secret
            .preimage_hex()
            .ok_or_else(|| AccsError::Input("redeem requires a known preimage".into()))?;
        let result = self
            .connection
            .call(
                DATABASE_API,
                "redeem_htlc",
                json!({ "amount": amount, "private_key_placeholder": private_key.len(), "secret": preimage_hex }),
            )
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn get_id(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        hash_hex: &str,
        time_seconds: u64,
    ) -> Result<Option<String>, AccsError> {
        let result = self
            .connection
            .call(
                DATABASE_API,
                "get_htlc_id",
                json!({ "from": from, "to": to, "amount": amount, "hash": hash_hex, "time": time_seconds }),
            )
            .await?;
        Ok(result.as_str().map(str::to_string))
    }

    async fn get_preimage_from_htlc(
        &self,
        from: &str,
        to: &str,
        hash_hex: &str,
    ) -> Result<Option<String>, AccsError> {
        let result = self
            .connection
            .call(
                DATABASE_API,
                "get_htlc_preimage",
                json!({ "from": from, "to": to, "hash": hash_hex }),
            )
            .await?;
        Ok(result.as_str().map(str::to_string))
    }

    fn to_account_id(
        &self,
        private_key: &str,
        network: BitsharesNetwork,
    ) -> Result<String, AccsError> {
        if private_key.is_empty() {
            return Err(AccsError::Input("empty bitshares private key".into()));
        }
        let prefix = match network {
            BitsharesNetwork::Mainnet => "BTS",
            BitsharesNetwork::Testnet => "TEST",
        };
        Ok(format!("{prefix}-derived-account-id"))
    }

    async fn get_account_id(&self, name: &str) -> Result<String, AccsError> {
        let result = self
            .connection
            .call(DATABASE_API, "get_account_by_name", json!({ "name": name }))
            .await?;
        result["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AccsError::NotFound(format!("no bitshares account named {name}")))
    }
}
