use std::str::FromStr;
use std::sync::Arc;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::ecdsa;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, EcdsaSighashType, Network, OutPoint, PrivateKey,
    PublicKey, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tracing::{debug, info};

use accs_bitcoin_chain::BitcoinChain;
use accs_secret::Secret;

use crate::error::HtlcError;
use crate::fee::calculate_fee;
use crate::script::{build_redeem_script, get_p2wsh};
use crate::state::{HtlcState, Outcome};

/// `ENABLE_RBF_NO_LOCKTIME`: sequence used on funding-transaction inputs,
/// which carry no CSV requirement of their own.
const RBF_SEQUENCE: u32 = 0xfffffffd;

/// Dust threshold below which a change output is folded into the fee
/// instead of created.
const DUST_LIMIT_SAT: u64 = 546;

/// Which keypair this process holds. Each party to a swap only ever
/// knows its own private key; the counterparty is known by public key
/// alone, so the two sides of an HTLC are never symmetric in what a
/// single instance can do: a `Sender` can fund and refund, a `Receiver`
/// can redeem.
#[derive(Debug)]
pub enum LocalRole {
    Sender {
        private_key: PrivateKey,
        public_key: PublicKey,
    },
    Receiver {
        private_key: PrivateKey,
        public_key: PublicKey,
    },
}

impl LocalRole {
    pub fn sender(private_key: PrivateKey, secp: &Secp256k1<All>) -> Self {
        let public_key = PublicKey::from_private_key(secp, &private_key);
        LocalRole::Sender {
            private_key,
            public_key,
        }
    }

    pub fn receiver(private_key: PrivateKey, secp: &Secp256k1<All>) -> Self {
        let public_key = PublicKey::from_private_key(secp, &private_key);
        LocalRole::Receiver {
            private_key,
            public_key,
        }
    }
}

/// One side of a paired HTLC on the Bitcoin chain: owns the redeem
/// script, the funding/redeem/refund transaction plumbing, and the
/// `HtlcState` transitions that follow from them.
pub struct BitcoinHtlc {
    local: LocalRole,
    counterparty_pubkey: PublicKey,
    network: Network,
    hash: [u8; 32],
    sequence: u64,
    priority: u8,
    chain: Arc<dyn BitcoinChain>,
    secp: Secp256k1<All>,
    state: HtlcState,
}

impl std::fmt::Debug for BitcoinHtlc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitcoinHtlc")
            .field("local", &self.local)
            .field("counterparty_pubkey", &self.counterparty_pubkey)
            .field("network", &self.network)
            .field("hash", &self.hash)
            .field("sequence", &self.sequence)
            .field("priority", &self.priority)
            .field("chain", &"<dyn BitcoinChain>")
            .field("secp", &self.secp)
            .field("state", &self.state)
            .finish()
    }
}

impl BitcoinHtlc {
    pub fn new(
        local: LocalRole,
        counterparty_pubkey: PublicKey,
        network: Network,
        hash: [u8; 32],
        sequence: u64,
        priority: u8,
        chain: Arc<dyn BitcoinChain>,
    ) -> Result<Self, HtlcError> {
        let htlc = Self {
            local,
            counterparty_pubkey,
            network,
            hash,
            sequence,
            priority,
            chain,
            secp: Secp256k1::new(),
            state: HtlcState::Unfunded,
        };
        // validates the sequence range up front rather than on first use.
        htlc.redeem_script()?;
        Ok(htlc)
    }

    pub fn state(&self) -> &HtlcState {
        &self.state
    }

    fn sender_pubkey(&self) -> &PublicKey {
        match &self.local {
            LocalRole::Sender { public_key, .. } => public_key,
            LocalRole::Receiver { .. } => &self.counterparty_pubkey,
        }
    }

    fn receiver_pubkey(&self) -> &PublicKey {
        match &self.local {
            LocalRole::Receiver { public_key, .. } => public_key,
            LocalRole::Sender { .. } => &self.counterparty_pubkey,
        }
    }

    pub fn redeem_script(&self) -> Result<bitcoin::ScriptBuf, HtlcError> {
        build_redeem_script(
            &self.hash,
            self.sequence,
            self.sender_pubkey(),
            self.receiver_pubkey(),
        )
    }

    pub fn address(&self) -> Result<Address, HtlcError> {
        Ok(get_p2wsh(
            &self.hash,
            self.sequence,
            self.sender_pubkey(),
            self.receiver_pubkey(),
            self.network,
        )?
        .address)
    }

    /// Block height the funding transaction confirmed at, if the chain
    /// has reported one. `None` while unfunded or while the funding
    /// transaction is still in the mempool.
    pub fn funding_block_height(&self) -> Option<u32> {
        match &self.state {
            HtlcState::Funded {
                confirmation_height,
                ..
            } => *confirmation_height,
            _ => None,
        }
    }

    /// Re-queries the chain for the funding transaction's confirmation
    /// height, updating the cached value while it's still unknown. A
    /// funding transaction sitting in the mempool reports `None` from
    /// `get_block_height_for_tx` until it's mined.
    pub async fn refresh_funding_confirmation(&mut self) -> Result<(), HtlcError> {
        if let HtlcState::Funded {
            funding_txid,
            confirmation_height,
            ..
        } = &mut self.state
        {
            if confirmation_height.is_none() {
                *confirmation_height = self
                    .chain
                    .get_block_height_for_tx(&funding_txid.to_string())
                    .await?;
            }
        }
        Ok(())
    }

    /// Whether this HTLC's CSV-locked refund branch is spendable yet:
    /// `current_height >= funding_block_height + sequence`. Returns
    /// `false`, not an error, while the funding transaction is still
    /// unconfirmed — callers should keep polling.
    pub async fn refund_is_mature(&self) -> Result<bool, HtlcError> {
        let Some(funding_height) = self.funding_block_height() else {
            return Ok(false);
        };
        let tip = self.chain.get_last_block().await?;
        Ok(tip.height as u64 >= funding_height as u64 + self.sequence)
    }

    /// Recognizes an HTLC the counterparty funded, without having created
    /// it locally: records the observed UTXO as this instance's `Funded`
    /// state so `redeem` can spend it. No refund hex is available, since
    /// only the sender can pre-sign one.
    pub fn adopt_funded(&mut self, funding_txid: Txid, funding_vout: u32, amount_locked: u64) {
        self.state = HtlcState::Funded {
            funding_txid,
            funding_vout,
            confirmation_height: None,
            amount_after_fees: amount_locked,
            refund_tx_hex: String::new(),
        };
    }

    /// Spends the sender's UTXO(s) in `spend_from_txid` to the HTLC's
    /// P2WSH address, broadcasts the funding transaction, and pre-signs
    /// (but does not broadcast) the refund transaction so it can be
    /// published later without further access to the signing key.
    /// Returns the refund transaction's raw hex.
    pub async fn create(
        &mut self,
        spend_from_txid: Txid,
        amount_sat: u64,
    ) -> Result<String, HtlcError> {
        if !self.state.is_unfunded() {
            return Err(HtlcError::WrongState);
        }
        let (private_key, public_key) = match &self.local {
            LocalRole::Sender {
                private_key,
                public_key,
            } => (*private_key, *public_key),
            LocalRole::Receiver { .. } => return Err(HtlcError::NotSender),
        };

        let fee = calculate_fee(self.chain.as_ref(), self.priority).await?;
        let compressed = CompressedPublicKey::try_from(public_key)
            .map_err(|e| HtlcError::Key(e.to_string()))?;
        let sender_address = Address::p2wpkh(&compressed, self.network);

        let candidates = self.chain.get_utxos(&sender_address.to_string()).await?;
        let spend_from = spend_from_txid.to_string();
        let inputs: Vec<_> = candidates
            .into_iter()
            .filter(|u| u.txid == spend_from)
            .collect();
        if inputs.is_empty() {
            return Err(HtlcError::Chain(accs_error::AccsError::NotFound(format!(
                "no utxo for {sender_address} in tx {spend_from}"
            ))));
        }
        let total_input: u64 = inputs.iter().map(|u| u.value).sum();
        if total_input < amount_sat + fee.want {
            return Err(HtlcError::Chain(accs_error::AccsError::InsufficientFunds {
                need: amount_sat + fee.want,
                have: total_input,
            }));
        }
        let change = total_input - amount_sat - fee.want;

        let htlc_address = self.address()?;
        let tx_inputs: Vec<TxIn> = inputs
            .iter()
            .map(|u| {
                Ok::<_, HtlcError>(TxIn {
                    previous_output: OutPoint {
                        txid: Txid::from_str(&u.txid).map_err(|e| HtlcError::Key(e.to_string()))?,
                        vout: u.vout,
                    },
                    script_sig: bitcoin::ScriptBuf::new(),
                    sequence: Sequence(RBF_SEQUENCE),
                    witness: Witness::new(),
                })
            })
            .collect::<Result<_, _>>()?;

        let mut outputs = vec![TxOut {
            value: Amount::from_sat(amount_sat),
            script_pubkey: htlc_address.script_pubkey(),
        }];
        if change >= DUST_LIMIT_SAT {
            outputs.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: sender_address.script_pubkey(),
            });
        }

        let mut funding_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: tx_inputs,
            output: outputs,
        };
        self.sign_p2wpkh_inputs(&mut funding_tx, &public_key, &private_key, &inputs)?;

        let funding_txid = funding_tx.compute_txid();
        let raw_hex = serialize_hex(&funding_tx);
        info!(%funding_txid, amount_sat, "broadcasting htlc funding transaction");
        self.chain.push_tx(&raw_hex).await?;

        let confirmation_height = self
            .chain
            .get_block_height_for_tx(&funding_txid.to_string())
            .await
            .unwrap_or(None);

        let refund_tx_hex = self.build_refund_tx(
            funding_txid,
            0,
            amount_sat,
            fee.want,
            &sender_address,
            &private_key,
            &public_key,
        )?;

        self.state = HtlcState::Funded {
            funding_txid,
            funding_vout: 0,
            confirmation_height,
            amount_after_fees: amount_sat,
            refund_tx_hex: refund_tx_hex.clone(),
        };
        Ok(refund_tx_hex)
    }

    fn sign_p2wpkh_inputs(
        &self,
        tx: &mut Transaction,
        public_key: &PublicKey,
        private_key: &PrivateKey,
        utxos: &[accs_bitcoin_chain::Utxo],
    ) -> Result<(), HtlcError> {
        let mut cache = SighashCache::new(&*tx);
        let mut witnesses = Vec::with_capacity(utxos.len());
        for (i, utxo) in utxos.iter().enumerate() {
            let script_pubkey = bitcoin::ScriptBuf::new_p2wpkh(
                &public_key
                    .wpubkey_hash()
                    .map_err(|e| HtlcError::Key(e.to_string()))?,
            );
            let sighash = cache
                .p2wpkh_signature_hash(
                    i,
                    &script_pubkey,
                    Amount::from_sat(utxo.value),
                    EcdsaSighashType::All,
                )
                .map_err(|e| HtlcError::Sighash(e.to_string()))?;
            let msg = Message::from(sighash);
            let signature = self.secp.sign_ecdsa(&msg, &private_key.inner);
            let sig = ecdsa::Signature {
                signature,
                sighash_type: EcdsaSighashType::All,
            };
            witnesses.push(Witness::p2wpkh(&sig, &public_key.inner));
        }
        for (input, witness) in tx.input.iter_mut().zip(witnesses) {
            input.witness = witness;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_refund_tx(
        &self,
        funding_txid: Txid,
        funding_vout: u32,
        amount_after_fees: u64,
        fee_want: u64,
        refund_to: &Address,
        private_key: &PrivateKey,
        public_key: &PublicKey,
    ) -> Result<String, HtlcError> {
        let output_value = amount_after_fees.saturating_sub(fee_want);
        let redeem_script = self.redeem_script()?;
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: funding_txid,
                    vout: funding_vout,
                },
                script_sig: bitcoin::ScriptBuf::new(),
                sequence: Sequence(self.sequence as u32),
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(output_value),
                script_pubkey: refund_to.script_pubkey(),
            }],
        };

        let sighash = {
            let mut cache = SighashCache::new(&tx);
            cache
                .p2wsh_signature_hash(
                    0,
                    &redeem_script,
                    Amount::from_sat(amount_after_fees),
                    EcdsaSighashType::All,
                )
                .map_err(|e| HtlcError::Sighash(e.to_string()))?
        };
        let msg = Message::from(sighash);
        let signature = self.secp.sign_ecdsa(&msg, &private_key.inner);
        let sig = ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        };

        let mut witness = Witness::new();
        witness.push(sig.to_vec());
        witness.push(public_key.to_bytes());
        witness.push(Vec::new()); // empty = selects the ELSE (refund) branch
        witness.push(redeem_script.as_bytes());
        tx.input[0].witness = witness;

        debug!(txid = %tx.compute_txid(), "built presigned refund transaction");
        Ok(serialize_hex(&tx))
    }

    /// Spends the funded P2WSH output to `receiver_address` using the
    /// now-known preimage, and broadcasts the redeem transaction.
    /// Returns the redeem transaction's txid.
    pub async fn redeem(
        &mut self,
        secret: &Secret,
        receiver_address: &Address,
    ) -> Result<String, HtlcError> {
        let private_key = match &self.local {
            LocalRole::Receiver { private_key, .. } => *private_key,
            LocalRole::Sender { .. } => return Err(HtlcError::NotReceiver),
        };
        let preimage = secret.preimage().ok_or(HtlcError::MissingPreimage)?;
        let (funding_txid, funding_vout, amount_after_fees) = match &self.state {
            HtlcState::Funded {
                funding_txid,
                funding_vout,
                amount_after_fees,
                ..
            } => (*funding_txid, *funding_vout, *amount_after_fees),
            _ => return Err(HtlcError::WrongState),
        };

        let fee = calculate_fee(self.chain.as_ref(), self.priority).await?;
        let output_value = amount_after_fees.saturating_sub(fee.want);
        let redeem_script = self.redeem_script()?;
        let public_key = PublicKey::from_private_key(&self.secp, &private_key);

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: funding_txid,
                    vout: funding_vout,
                },
                script_sig: bitcoin::ScriptBuf::new(),
                sequence: Sequence(RBF_SEQUENCE),
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(output_value),
                script_pubkey: receiver_address.script_pubkey(),
            }],
        };

        let sighash = {
            let mut cache = SighashCache::new(&tx);
            cache
                .p2wsh_signature_hash(
                    0,
                    &redeem_script,
                    Amount::from_sat(amount_after_fees),
                    EcdsaSighashType::All,
                )
                .map_err(|e| HtlcError::Sighash(e.to_string()))?
        };
        let msg = Message::from(sighash);
        let signature = self.secp.sign_ecdsa(&msg, &private_key.inner);
        let sig = ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        };

        let mut witness = Witness::new();
        witness.push(sig.to_vec());
        witness.push(public_key.to_bytes());
        witness.push(preimage.to_vec());
        witness.push([1u8]); // selects the IF (redeem) branch
        witness.push(redeem_script.as_bytes());
        tx.input[0].witness = witness;

        let raw_hex = serialize_hex(&tx);
        let txid = self.chain.push_tx(&raw_hex).await?;
        self.state = HtlcState::Terminal {
            outcome: Outcome::Redeemed,
        };
        Ok(txid)
    }

    /// Marks an already-funded HTLC as refunded after its pre-signed
    /// refund transaction has been broadcast externally.
    pub fn mark_refunded(&mut self) -> Result<(), HtlcError> {
        if !self.state.is_funded() {
            return Err(HtlcError::WrongState);
        }
        self.state = HtlcState::Terminal {
            outcome: Outcome::Refunded,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accs_bitcoin_chain::{MockBitcoinChain, Utxo};
    use accs_secret::Secret;

    fn local_and_counterparty_keys(secp: &Secp256k1<All>) -> (PrivateKey, PublicKey, PrivateKey, PublicKey) {
        let sender_sk = PrivateKey::from_slice(&[0x11u8; 32], Network::Regtest).unwrap();
        let sender_pk = PublicKey::from_private_key(secp, &sender_sk);
        let receiver_sk = PrivateKey::from_slice(&[0x22u8; 32], Network::Regtest).unwrap();
        let receiver_pk = PublicKey::from_private_key(secp, &receiver_sk);
        (sender_sk, sender_pk, receiver_sk, receiver_pk)
    }

    #[tokio::test]
    async fn create_builds_and_broadcasts_funding_tx_and_presigns_refund() {
        let secp = Secp256k1::new();
        let (sender_sk, sender_pk, _receiver_sk, receiver_pk) = local_and_counterparty_keys(&secp);
        let mock = Arc::new(MockBitcoinChain::new());
        let chain: Arc<dyn BitcoinChain> = mock.clone();
        let secret = Secret::random();

        let compressed = CompressedPublicKey::try_from(sender_pk).unwrap();
        let sender_address = Address::p2wpkh(&compressed, Network::Regtest);
        let spend_from =
            Txid::from_str("1111111111111111111111111111111111111111111111111111111111111111")
                .unwrap();
        mock.set_utxos(
            &sender_address.to_string(),
            vec![Utxo {
                txid: spend_from.to_string(),
                vout: 0,
                value: 100_000,
                status: Default::default(),
            }],
        );

        let mut htlc = BitcoinHtlc::new(
            LocalRole::sender(sender_sk, &secp),
            receiver_pk,
            Network::Regtest,
            secret.hash(),
            144,
            1,
            chain,
        )
        .unwrap();

        let refund_hex = htlc.create(spend_from, 50_000).await.unwrap();
        assert!(!refund_hex.is_empty());
        assert_eq!(mock.broadcasts().len(), 1);
        assert!(htlc.state().is_funded());
    }

    #[tokio::test]
    async fn refund_matures_once_chain_confirms_and_tip_catches_up_to_sequence() {
        let secp = Secp256k1::new();
        let (sender_sk, sender_pk, _receiver_sk, receiver_pk) = local_and_counterparty_keys(&secp);
        let mock = Arc::new(MockBitcoinChain::new());
        let chain: Arc<dyn BitcoinChain> = mock.clone();
        let secret = Secret::random();

        let compressed = CompressedPublicKey::try_from(sender_pk).unwrap();
        let sender_address = Address::p2wpkh(&compressed, Network::Regtest);
        let spend_from =
            Txid::from_str("1111111111111111111111111111111111111111111111111111111111111111")
                .unwrap();
        mock.set_utxos(
            &sender_address.to_string(),
            vec![Utxo {
                txid: spend_from.to_string(),
                vout: 0,
                value: 100_000,
                status: Default::default(),
            }],
        );

        let mut htlc = BitcoinHtlc::new(
            LocalRole::sender(sender_sk, &secp),
            receiver_pk,
            Network::Regtest,
            secret.hash(),
            6,
            1,
            chain,
        )
        .unwrap();
        htlc.create(spend_from, 50_000).await.unwrap();

        // the funding transaction hasn't confirmed in the mock yet.
        assert_eq!(htlc.funding_block_height(), None);
        assert!(!htlc.refund_is_mature().await.unwrap());

        let funding_txid = match htlc.state() {
            HtlcState::Funded { funding_txid, .. } => funding_txid.to_string(),
            other => panic!("expected Funded, got {other:?}"),
        };
        mock.set_confirmation_height(&funding_txid, 100);
        htlc.refresh_funding_confirmation().await.unwrap();
        assert_eq!(htlc.funding_block_height(), Some(100));

        mock.set_block_height(105);
        assert!(!htlc.refund_is_mature().await.unwrap());

        mock.advance_blocks(1);
        assert!(htlc.refund_is_mature().await.unwrap());
    }

    #[test]
    fn new_rejects_out_of_range_sequence() {
        let secp = Secp256k1::new();
        let (sender_sk, _sender_pk, _receiver_sk, receiver_pk) = local_and_counterparty_keys(&secp);
        let chain: Arc<dyn BitcoinChain> = Arc::new(MockBitcoinChain::new());
        let err = BitcoinHtlc::new(
            LocalRole::sender(sender_sk, &secp),
            receiver_pk,
            Network::Regtest,
            [0u8; 32],
            70_000,
            1,
            chain,
        )
        .unwrap_err();
        assert!(matches!(err, HtlcError::SequenceOutOfRange(_)));
    }
}
