use serde::Deserialize;

/// An unspent transaction output, as reported by an Esplora-compatible
/// indexer's `/address/:addr/utxo` endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    #[serde(default)]
    pub status: TxStatus,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TxStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u32>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// Three fee-rate tiers in sat/vB, matching Esplora's `/fee-estimates`
/// shape collapsed to the priorities the HTLC engine cares about.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimates {
    pub priority0: f64,
    pub priority1: f64,
    pub priority2: f64,
}

impl FeeEstimates {
    pub fn at(&self, priority: u8) -> f64 {
        match priority {
            0 => self.priority0,
            1 => self.priority1,
            _ => self.priority2,
        }
    }

    pub fn max(&self) -> f64 {
        self.priority0.max(self.priority1).max(self.priority2)
    }
}

#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub height: u32,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct TxValue {
    pub txid: String,
    pub value: u64,
}
