use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::BitcoinChain;
use crate::types::{BlockInfo, FeeEstimates, TxValue, Utxo};
use accs_error::AccsError;

const MAX_BROADCAST_RETRIES: usize = 3;

/// Talks to a Blockstream-compatible Esplora REST API. Defaults per the
/// specification: `https://blockstream.info/api` (mainnet) and
/// `https://blockstream.info/testnet/api` (testnet).
pub struct EsploraChain {
    client: reqwest::Client,
    base_url: String,
}

impl EsploraChain {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AccsError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, AccsError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AccsError::ChainQuery(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))
    }

    async fn get_address_txs(&self, address: &str) -> Result<Vec<Value>, AccsError> {
        let value = self.get_json(&format!("/address/{address}/txs")).await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| AccsError::ChainQuery("expected a JSON array of transactions".into()))
    }

    async fn find_spending_tx(&self, address: &str) -> Result<Option<Value>, AccsError> {
        let txs = self.get_address_txs(address).await?;
        for tx in txs {
            let spends_address = tx["vin"].as_array().is_some_and(|vin| {
                vin.iter()
                    .any(|input| input["prevout"]["scriptpubkey_address"] == address)
            });
            if spends_address {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl BitcoinChain for EsploraChain {
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, AccsError> {
        let value = self.get_json(&format!("/address/{address}/utxo")).await?;
        serde_json::from_value(value).map_err(|e| AccsError::ChainQuery(e.to_string()))
    }

    async fn get_fee_estimates(&self) -> Result<FeeEstimates, AccsError> {
        let value = self.get_json("/fee-estimates").await?;
        let get = |blocks: &str| -> f64 { value[blocks].as_f64().unwrap_or(1.0) };
        Ok(FeeEstimates {
            priority0: get("1"),
            priority1: get("3"),
            priority2: get("6"),
        })
    }

    async fn get_last_block(&self) -> Result<BlockInfo, AccsError> {
        let height_text = self
            .client
            .get(format!("{}/blocks/tip/height", self.base_url))
            .send()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?
            .text()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?;
        let height: u32 = height_text
            .trim()
            .parse()
            .map_err(|_| AccsError::ChainQuery(format!("bad block height: {height_text}")))?;
        let hash = self
            .client
            .get(format!("{}/blocks/tip/hash", self.base_url))
            .send()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?
            .text()
            .await
            .map_err(|e| AccsError::ChainQuery(e.to_string()))?;
        Ok(BlockInfo {
            height,
            hash: hash.trim().to_string(),
        })
    }

    async fn get_block_height_for_tx(&self, txid: &str) -> Result<Option<u32>, AccsError> {
        let value = self.get_json(&format!("/tx/{txid}/status")).await?;
        if value["confirmed"].as_bool().unwrap_or(false) {
            Ok(value["block_height"].as_u64().map(|h| h as u32))
        } else {
            Ok(None)
        }
    }

    async fn get_value_from_last_transaction(&self, address: &str) -> Result<TxValue, AccsError> {
        let txs = self.get_address_txs(address).await?;
        let tx = txs
            .first()
            .ok_or_else(|| AccsError::NotFound(format!("no transactions for {address}")))?;
        let txid = tx["txid"]
            .as_str()
            .ok_or_else(|| AccsError::ChainQuery("transaction missing txid".into()))?
            .to_string();
        let value = tx["vout"]
            .as_array()
            .and_then(|outs| {
                outs.iter()
                    .find(|o| o["scriptpubkey_address"] == address)
            })
            .and_then(|o| o["value"].as_u64())
            .ok_or_else(|| AccsError::NotFound(format!("no output paying {address}")))?;
        Ok(TxValue { txid, value })
    }

    async fn get_preimage_from_last_transaction(
        &self,
        address: &str,
    ) -> Result<[u8; 32], AccsError> {
        let tx = self
            .find_spending_tx(address)
            .await?
            .ok_or_else(|| AccsError::NotFound(format!("no spend of {address} yet")))?;

        let witness = tx["vin"]
            .as_array()
            .and_then(|vin| vin.iter().find_map(|input| input["witness"].as_array()))
            .ok_or_else(|| AccsError::MalformedWitness("spend has no witness data".into()))?;

        // Redeem-branch witness: [sig, pubkey, preimage, OP_1, script].
        if witness.len() != 5 {
            return Err(AccsError::MalformedWitness(format!(
                "expected a 5-element redeem witness, got {}",
                witness.len()
            )));
        }
        let branch_marker = witness[3].as_str().unwrap_or("");
        if branch_marker != "01" {
            return Err(AccsError::MalformedWitness(
                "witness does not select the IF (redeem) branch".into(),
            ));
        }
        let preimage_hex = witness[2]
            .as_str()
            .ok_or_else(|| AccsError::MalformedWitness("preimage element is not a string".into()))?;
        let preimage_bytes = hex::decode(preimage_hex)
            .map_err(|e| AccsError::MalformedWitness(format!("preimage is not hex: {e}")))?;
        if preimage_bytes.len() != 32 {
            return Err(AccsError::MalformedWitness(format!(
                "preimage is {} bytes, expected 32",
                preimage_bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&preimage_bytes);
        Ok(out)
    }

    async fn push_tx(&self, raw_hex: &str) -> Result<String, AccsError> {
        let url = format!("{}/tx", self.base_url);
        let mut last_error = None;
        for attempt in 0..MAX_BROADCAST_RETRIES {
            let result = self
                .client
                .post(&url)
                .header("Content-Type", "text/plain")
                .body(raw_hex.to_string())
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .text()
                        .await
                        .map_err(|e| AccsError::ChainQuery(e.to_string()));
                }
                Ok(resp) => {
                    let body = resp.text().await.unwrap_or_default();
                    last_error = Some(body);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
            tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
        }
        Err(AccsError::Broadcast {
            message: last_error.unwrap_or_else(|| "broadcast failed".into()),
            raw_hex: Some(raw_hex.to_string()),
        })
    }

    async fn median_block_time(&self, k: u32) -> Result<u64, AccsError> {
        let tip = self.get_last_block().await?;
        let mut times = Vec::with_capacity(k as usize);
        for height in tip.height.saturating_sub(k.saturating_sub(1))..=tip.height {
            let hash = self
                .get_json(&format!("/block-height/{height}"))
                .await
                .ok();
            let hash = match hash {
                Some(Value::String(h)) => h,
                _ => {
                    let text = self
                        .client
                        .get(format!("{}/block-height/{}", self.base_url, height))
                        .send()
                        .await
                        .map_err(|e| AccsError::ChainQuery(e.to_string()))?
                        .text()
                        .await
                        .map_err(|e| AccsError::ChainQuery(e.to_string()))?;
                    text.trim().to_string()
                }
            };
            let block = self.get_json(&format!("/block/{hash}")).await?;
            if let Some(timestamp) = block["timestamp"].as_u64() {
                times.push(timestamp);
            }
        }
        if times.len() < 2 {
            return Ok(600);
        }
        times.sort_unstable();
        let mut diffs: Vec<u64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        diffs.sort_unstable();
        Ok(diffs[diffs.len() / 2])
    }
}
