use std::time::Duration;

use bitcoin::{Network as BitcoinNetwork, PrivateKey, PublicKey, Txid};

use accs_secret::Secret;

use crate::error::SwapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Proposer,
    Accepter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveCurrency {
    Btc,
    Bts,
}

/// Which side of the swap this process knows the hash-lock preimage for.
/// The proposer always starts `Known`; the accepter starts `HashOnly` and
/// only learns the preimage by observing the proposer's redeem.
#[derive(Debug, Clone)]
pub enum SecretRole {
    Known(Secret),
    HashOnly([u8; 32]),
}

impl SecretRole {
    pub fn hash(&self) -> [u8; 32] {
        match self {
            SecretRole::Known(secret) => secret.hash(),
            SecretRole::HashOnly(hash) => *hash,
        }
    }

    pub fn secret(&self) -> Option<&Secret> {
        match self {
            SecretRole::Known(secret) => Some(secret),
            SecretRole::HashOnly(_) => None,
        }
    }
}

/// sat/vB priority tier passed through to `accs_bitcoin_htlc::calculate_fee`.
pub type FeePriority = u8;

pub struct SwapConfig {
    pub role: Role,
    pub gives: GiveCurrency,
    pub network: BitcoinNetwork,
    pub amount_satoshi: u64,
    pub amount_bts_mini: u64,
    pub bitcoin_private_key: PrivateKey,
    pub bitshares_private_key: String,
    pub counterparty_bitcoin_pubkey: PublicKey,
    pub counterparty_bitshares_account: String,
    pub bitcoin_funding_txid: Txid,
    pub bitshares_asset: String,
    pub priority: FeePriority,
    pub secret: SecretRole,
    pub confirmation_horizon: u32,
    pub check_api_interval: Duration,
    pub bts_wait_timeout: Duration,
}

impl SwapConfig {
    /// Checks invariants that don't require chain I/O, so a malformed
    /// config fails before the first network call.
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.amount_satoshi == 0 {
            return Err(SwapError::Input("amount_satoshi must be nonzero".into()));
        }
        if self.amount_bts_mini == 0 {
            return Err(SwapError::Input("amount_bts_mini must be nonzero".into()));
        }
        if self.priority > 2 {
            return Err(SwapError::Input(format!(
                "priority must be 0, 1, or 2, got {}",
                self.priority
            )));
        }
        if self.confirmation_horizon == 0 {
            return Err(SwapError::Input(
                "confirmation_horizon must be at least 1 block".into(),
            ));
        }
        if self.bitshares_asset.trim().is_empty() {
            return Err(SwapError::Input("bitshares_asset must not be empty".into()));
        }
        if self.role == Role::Accepter && matches!(self.secret, SecretRole::Known(_)) {
            return Err(SwapError::Input(
                "the accepter must not start a swap already knowing the preimage".into(),
            ));
        }
        Ok(())
    }
}
