use std::str::FromStr;

use bitcoin::{Network as BitcoinNetwork, PrivateKey, PublicKey, Txid};
use clap::{Parser, ValueEnum};

use accs_orchestrator::{EngineConfig, GiveCurrency, Role, SecretRole, SwapConfig, SwapError};
use accs_secret::Secret;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Proposer,
    Accepter,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NetworkArg {
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CurrencyArg {
    Btc,
    Bts,
}

/// The `run` entry point's input record: every field a caller supplies to
/// start one side of a swap. `rate`/`amountToReceive` are accepted for
/// parity with the wire record but `amount_to_send` is what's actually
/// locked on this party's leg; the counterparty's leg amount comes from
/// `amount_bts_mini`/`amount_satoshi` depending on direction.
#[derive(Debug, Parser)]
#[command(name = "accs", about = "Drive one side of an atomic BTC/Bitshares swap")]
pub struct SwapFields {
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    #[arg(long = "network-to-trade", value_enum)]
    pub network_to_trade: NetworkArg,

    #[arg(long = "currency-to-give", value_enum)]
    pub currency_to_give: CurrencyArg,

    /// Decimal amount of `currency_to_give` this party sends.
    #[arg(long = "amount-to-send")]
    pub amount_to_send: f64,

    /// Decimal amount of the opposite currency this party expects back.
    #[arg(long = "amount-to-receive")]
    pub amount_to_receive: f64,

    #[arg(long = "bitcoin-private-key")]
    pub bitcoin_private_key: String,

    #[arg(long = "bitshares-private-key")]
    pub bitshares_private_key: String,

    #[arg(long = "counterparty-bitcoin-public-key")]
    pub counterparty_bitcoin_public_key: String,

    #[arg(long = "counterparty-bitshares-account-name")]
    pub counterparty_bitshares_account_name: String,

    /// The UTXO this party will spend to fund its Bitcoin leg. Only
    /// meaningful when `currency_to_give` is BTC.
    #[arg(long = "bitcoin-tx-id")]
    pub bitcoin_tx_id: Option<String>,

    #[arg(long)]
    pub asset: String,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub priority: u8,

    /// The proposer generates this (32-byte hex preimage); the accepter
    /// passes only the hash, also as 32-byte hex.
    #[arg(long)]
    pub secret: String,

    #[arg(long = "config", default_value = "EngineConfig.toml")]
    pub config_path: String,
}

impl SwapFields {
    pub fn network(&self) -> BitcoinNetwork {
        match self.network_to_trade {
            NetworkArg::Mainnet => BitcoinNetwork::Bitcoin,
            NetworkArg::Testnet => BitcoinNetwork::Testnet,
        }
    }

    /// Converts the satoshi/mini-unit amounts and builds a validated
    /// `SwapConfig`, applying `EngineConfig` defaults for the fields the
    /// wire record doesn't carry.
    pub fn into_swap_config(self, engine: &EngineConfig) -> Result<SwapConfig, SwapError> {
        let role = match self.mode {
            ModeArg::Proposer => Role::Proposer,
            ModeArg::Accepter => Role::Accepter,
        };
        let gives = match self.currency_to_give {
            CurrencyArg::Btc => GiveCurrency::Btc,
            CurrencyArg::Bts => GiveCurrency::Bts,
        };

        let bitcoin_private_key = PrivateKey::from_wif(&self.bitcoin_private_key)
            .map_err(|e| SwapError::Input(format!("invalid bitcoin private key: {e}")))?;
        let counterparty_bitcoin_pubkey = PublicKey::from_str(&self.counterparty_bitcoin_public_key)
            .map_err(|e| SwapError::Input(format!("invalid counterparty bitcoin public key: {e}")))?;

        let secret = match role {
            Role::Proposer => {
                let secret = Secret::from_preimage_hex(&self.secret)
                    .map_err(|e| SwapError::Input(format!("invalid secret: {e}")))?;
                SecretRole::Known(secret)
            }
            Role::Accepter => {
                let hash = hex::decode(&self.secret)
                    .map_err(|e| SwapError::Input(format!("invalid hash hex: {e}")))?;
                if hash.len() != 32 {
                    return Err(SwapError::Input(format!(
                        "expected a 32-byte hash, got {} bytes",
                        hash.len()
                    )));
                }
                let mut fixed = [0u8; 32];
                fixed.copy_from_slice(&hash);
                SecretRole::HashOnly(fixed)
            }
        };

        let (amount_satoshi, amount_bts_mini) = match gives {
            GiveCurrency::Btc => (
                to_satoshi(self.amount_to_send)?,
                to_bts_mini(self.amount_to_receive)?,
            ),
            GiveCurrency::Bts => (
                to_satoshi(self.amount_to_receive)?,
                to_bts_mini(self.amount_to_send)?,
            ),
        };

        let network = self.network();

        let bitcoin_funding_txid = match gives {
            GiveCurrency::Btc => {
                let raw = self
                    .bitcoin_tx_id
                    .ok_or_else(|| SwapError::Input("bitcoin_tx_id is required when giving BTC".into()))?;
                Txid::from_str(&raw).map_err(|e| SwapError::Input(format!("invalid bitcoin_tx_id: {e}")))?
            }
            // unused on this leg, but SwapConfig always carries the field.
            GiveCurrency::Bts => Txid::from_str(
                "0000000000000000000000000000000000000000000000000000000000000000",
            )
            .expect("well-formed placeholder txid"),
        };

        Ok(SwapConfig {
            role,
            gives,
            network,
            amount_satoshi,
            amount_bts_mini,
            bitcoin_private_key,
            bitshares_private_key: self.bitshares_private_key,
            counterparty_bitcoin_pubkey,
            counterparty_bitshares_account: self.counterparty_bitshares_account_name,
            bitcoin_funding_txid,
            bitshares_asset: self.asset,
            priority: self.priority,
            secret,
            confirmation_horizon: engine.confirmation_horizon,
            check_api_interval: engine.check_api_interval(),
            bts_wait_timeout: engine.bts_wait_timeout(),
        })
    }
}

fn to_satoshi(amount_btc: f64) -> Result<u64, SwapError> {
    if !amount_btc.is_finite() || amount_btc < 0.0 {
        return Err(SwapError::Input(format!("invalid bitcoin amount: {amount_btc}")));
    }
    Ok((amount_btc * 100_000_000.0).round() as u64)
}

fn to_bts_mini(amount_bts: f64) -> Result<u64, SwapError> {
    if !amount_bts.is_finite() || amount_bts < 0.0 {
        return Err(SwapError::Input(format!("invalid bitshares amount: {amount_bts}")));
    }
    Ok((amount_bts * 100_000.0).round() as u64)
}

/// Maps a finished swap's outcome, or a fatal error, to the process exit
/// code the wire format documents: 0 success, 1 input error, 2
/// chain/broadcast error, 3 refund executed.
pub fn exit_code_for(result: &Result<accs_orchestrator::SwapOutcome, SwapError>) -> i32 {
    match result {
        Ok(accs_orchestrator::SwapOutcome::Redeemed { .. }) => 0,
        Ok(accs_orchestrator::SwapOutcome::Refunded { .. }) => 3,
        Err(SwapError::Input(_)) => 1,
        Err(SwapError::CounterpartyTimedOut) => 3,
        Err(SwapError::Chain(_)) | Err(SwapError::Htlc(_)) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accs_orchestrator::SwapOutcome;

    #[test]
    fn redeemed_outcome_is_success() {
        let result: Result<SwapOutcome, SwapError> = Ok(SwapOutcome::Redeemed {
            own_leg_txid: "a".into(),
            counterparty_leg_ref: "b".into(),
        });
        assert_eq!(exit_code_for(&result), 0);
    }

    #[test]
    fn refunded_outcome_is_exit_code_three() {
        let result: Result<SwapOutcome, SwapError> = Ok(SwapOutcome::Refunded {
            refund_txid: "a".into(),
        });
        assert_eq!(exit_code_for(&result), 3);
    }

    #[test]
    fn input_error_is_exit_code_one() {
        let result: Result<SwapOutcome, SwapError> = Err(SwapError::Input("bad field".into()));
        assert_eq!(exit_code_for(&result), 1);
    }

    #[test]
    fn chain_error_is_exit_code_two() {
        let result: Result<SwapOutcome, SwapError> =
            Err(SwapError::Chain(accs_error::AccsError::Timeout("no reply".into())));
        assert_eq!(exit_code_for(&result), 2);
    }

    #[test]
    fn to_satoshi_rounds_to_nearest_sat() {
        assert_eq!(to_satoshi(1.0).unwrap(), 100_000_000);
        assert_eq!(to_satoshi(0.5).unwrap(), 50_000_000);
    }

    #[test]
    fn to_satoshi_rejects_negative() {
        assert!(to_satoshi(-1.0).is_err());
    }

    #[test]
    fn to_bts_mini_scales_by_ten_to_the_five() {
        assert_eq!(to_bts_mini(1.0).unwrap(), 100_000);
    }
}
