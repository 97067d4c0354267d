use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, CompressedPublicKey, PublicKey, Txid};
use tracing::{info, instrument, warn};

use accs_bitcoin_chain::BitcoinChain;
use accs_bitcoin_htlc::{calculate_fee, BitcoinHtlc, HtlcError, LocalRole};
use accs_bitshares_chain::{BitsharesChain, BitsharesNetwork, CreateHtlcParams};
use accs_secret::Secret;
use accs_timer::{halve, Timer};

use crate::config::{GiveCurrency, Role, SwapConfig};
use crate::error::SwapError;
use crate::outcome::SwapOutcome;

/// Drives one swap, on one side, to completion: fund the leg this party
/// sends, watch for the counterparty's leg, and redeem or refund.
pub struct SwapOrchestrator {
    config: SwapConfig,
    bitcoin_chain: Arc<dyn BitcoinChain>,
    bitshares_chain: Arc<dyn BitsharesChain>,
}

impl SwapOrchestrator {
    pub fn new(
        config: SwapConfig,
        bitcoin_chain: Arc<dyn BitcoinChain>,
        bitshares_chain: Arc<dyn BitsharesChain>,
    ) -> Self {
        Self {
            config,
            bitcoin_chain,
            bitshares_chain,
        }
    }

    #[instrument(skip(self), fields(role = ?self.config.role, gives = ?self.config.gives))]
    pub async fn run(&mut self) -> Result<SwapOutcome, SwapError> {
        self.config.validate()?;

        let result = match (self.config.role, self.config.gives) {
            (Role::Proposer, GiveCurrency::Btc) => self.run_proposer_gives_btc().await,
            (Role::Proposer, GiveCurrency::Bts) => self.run_proposer_gives_bts().await,
            (Role::Accepter, GiveCurrency::Btc) => self.run_accepter_gives_btc().await,
            (Role::Accepter, GiveCurrency::Bts) => self.run_accepter_gives_bts().await,
        };

        if let Err(err) = &result {
            warn!(%err, "swap failed; this party's fatal-error refund path already ran inline");
        }
        result
    }

    fn own_bitcoin_public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey::from_private_key(&secp, &self.config.bitcoin_private_key)
    }

    fn own_bitcoin_address(&self) -> Result<Address, SwapError> {
        let compressed = CompressedPublicKey::try_from(self.own_bitcoin_public_key())
            .map_err(|e| SwapError::Input(format!("invalid bitcoin key: {e}")))?;
        Ok(Address::p2wpkh(&compressed, self.config.network))
    }

    fn bitshares_network(&self) -> BitsharesNetwork {
        if self.config.network == bitcoin::Network::Bitcoin {
            BitsharesNetwork::Mainnet
        } else {
            BitsharesNetwork::Testnet
        }
    }

    fn own_bitshares_account(&self) -> Result<String, SwapError> {
        Ok(self.bitshares_chain.to_account_id(
            &self.config.bitshares_private_key,
            self.bitshares_network(),
        )?)
    }

    /// `proposer` always uses the full horizon; `accepter` halves the
    /// timelock on the leg it funds, since it always acts second.
    fn own_btc_sequence(&self, full_btc_blocks: u32) -> u32 {
        match self.config.role {
            Role::Proposer => full_btc_blocks,
            Role::Accepter => halve(full_btc_blocks as u64) as u32,
        }
    }

    fn own_bts_seconds(&self, full_bts_secs: u64) -> u64 {
        match self.config.role {
            Role::Proposer => full_bts_secs,
            Role::Accepter => halve(full_bts_secs),
        }
    }

    // ---- proposer gives BTC: funds the BTC leg first (acts first) ----

    async fn run_proposer_gives_btc(&mut self) -> Result<SwapOutcome, SwapError> {
        let secret = self
            .config
            .secret
            .secret()
            .cloned()
            .ok_or_else(|| SwapError::Input("proposer must start with a known preimage".into()))?;

        let full_btc_blocks = Timer::new(self.config.confirmation_horizon).to_btc();
        let sequence = self.own_btc_sequence(full_btc_blocks);

        let mut own_htlc = BitcoinHtlc::new(
            LocalRole::sender(self.config.bitcoin_private_key, &Secp256k1::new()),
            self.config.counterparty_bitcoin_pubkey,
            self.config.network,
            secret.hash(),
            sequence as u64,
            self.config.priority,
            self.bitcoin_chain.clone(),
        )?;
        let refund_hex = own_htlc
            .create(self.config.bitcoin_funding_txid, self.config.amount_satoshi)
            .await?;

        // the accepter acts second regardless of which leg it gives, so
        // its bitshares htlc always uses the halved timelock.
        let full_bts_secs = Timer::new(self.config.confirmation_horizon)
            .to_bts(self.bitcoin_chain.as_ref())
            .await?;
        let counterparty_bts_sequence = halve(full_bts_secs);
        let my_account = self.own_bitshares_account()?;

        match self
            .poll_for_bitshares_htlc_or_own_refund(
                &self.config.counterparty_bitshares_account.clone(),
                &my_account,
                counterparty_bts_sequence,
                &mut own_htlc,
            )
            .await
        {
            Ok(()) => {
                let redeemed = self
                    .bitshares_chain
                    .redeem(
                        self.config.amount_bts_mini,
                        &self.config.bitshares_private_key,
                        &secret,
                    )
                    .await?;
                if !redeemed {
                    return Err(SwapError::Input(
                        "bitshares redeem found no matching htlc despite a prior get_id hit"
                            .into(),
                    ));
                }
                Ok(SwapOutcome::Redeemed {
                    own_leg_txid: "bitcoin-leg-already-funded".into(),
                    counterparty_leg_ref: "bitshares-leg-redeemed".into(),
                })
            }
            // own_htlc's csv-locked refund branch just matured; safe to broadcast.
            Err(SwapError::CounterpartyTimedOut) => {
                let refund_txid = self.bitcoin_chain.push_tx(&refund_hex).await?;
                Ok(SwapOutcome::Refunded { refund_txid })
            }
            Err(other) => {
                self.broadcast_refund_if_mature(&mut own_htlc, &refund_hex).await;
                Err(other)
            }
        }
    }

    // ---- proposer gives BTS: funds the BTS leg first (acts first) ----

    async fn run_proposer_gives_bts(&mut self) -> Result<SwapOutcome, SwapError> {
        let secret = self
            .config
            .secret
            .secret()
            .cloned()
            .ok_or_else(|| SwapError::Input("proposer must start with a known preimage".into()))?;

        let full_bts_secs = Timer::new(self.config.confirmation_horizon)
            .to_bts(self.bitcoin_chain.as_ref())
            .await?;
        let time_seconds = self.own_bts_seconds(full_bts_secs);

        self.bitshares_chain
            .create_htlc(CreateHtlcParams {
                amount: self.config.amount_bts_mini,
                asset: self.config.bitshares_asset.clone(),
                time_seconds,
                hash_hex: secret.hash_hex(),
                private_key: self.config.bitshares_private_key.clone(),
                to_account: self.config.counterparty_bitshares_account.clone(),
            })
            .await?;

        let full_btc_blocks = Timer::new(self.config.confirmation_horizon).to_btc();
        // the accepter's BTC leg acts second, so it uses the halved sequence.
        let counterparty_sequence = halve(full_btc_blocks as u64);
        let own_pubkey = self.own_bitcoin_public_key();
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &secret.hash(),
            counterparty_sequence,
            &self.config.counterparty_bitcoin_pubkey,
            &own_pubkey,
            self.config.network,
        )?;

        match self
            .poll_for_bitcoin_utxo(&payment.address, self.config.bts_wait_timeout)
            .await
        {
            Ok(utxo) => {
                let mut their_htlc = BitcoinHtlc::new(
                    LocalRole::receiver(self.config.bitcoin_private_key, &Secp256k1::new()),
                    self.config.counterparty_bitcoin_pubkey,
                    self.config.network,
                    secret.hash(),
                    counterparty_sequence,
                    self.config.priority,
                    self.bitcoin_chain.clone(),
                )?;
                their_htlc.adopt_funded(
                    Txid::from_str(&utxo.txid)
                        .map_err(|e| SwapError::Input(format!("bad counterparty txid: {e}")))?,
                    utxo.vout,
                    utxo.value,
                );
                let receive_address = self.own_bitcoin_address()?;
                let txid = their_htlc.redeem(&secret, &receive_address).await?;
                Ok(SwapOutcome::Redeemed {
                    own_leg_txid: "bitshares-leg-already-funded".into(),
                    counterparty_leg_ref: txid,
                })
            }
            Err(SwapError::CounterpartyTimedOut) => Ok(SwapOutcome::Refunded {
                refund_txid: "bitshares-htlc-auto-expiry".into(),
            }),
            Err(other) => Err(other),
        }
    }

    // ---- accepter gives BTC: funds own leg, then waits for the
    // proposer to redeem it and reveal the preimage ----

    async fn run_accepter_gives_btc(&mut self) -> Result<SwapOutcome, SwapError> {
        let hash = self.config.secret.hash();
        let full_btc_blocks = Timer::new(self.config.confirmation_horizon).to_btc();
        let sequence = self.own_btc_sequence(full_btc_blocks);

        let mut own_htlc = BitcoinHtlc::new(
            LocalRole::sender(self.config.bitcoin_private_key, &Secp256k1::new()),
            self.config.counterparty_bitcoin_pubkey,
            self.config.network,
            hash,
            sequence as u64,
            self.config.priority,
            self.bitcoin_chain.clone(),
        )?;
        let refund_hex = own_htlc
            .create(self.config.bitcoin_funding_txid, self.config.amount_satoshi)
            .await?;
        let own_address = own_htlc.address()?;

        match self
            .poll_for_bitcoin_preimage_or_own_refund(&own_address, &mut own_htlc)
            .await
        {
            Ok(preimage) => {
                let mut secret = Secret::from_hash(hash);
                secret
                    .reveal(preimage)
                    .map_err(|e| SwapError::Input(e.to_string()))?;
                let redeemed = self
                    .bitshares_chain
                    .redeem(
                        self.config.amount_bts_mini,
                        &self.config.bitshares_private_key,
                        &secret,
                    )
                    .await?;
                if !redeemed {
                    return Err(SwapError::Input(
                        "bitshares redeem found no matching htlc for the revealed preimage".into(),
                    ));
                }
                Ok(SwapOutcome::Redeemed {
                    own_leg_txid: "bitcoin-leg-already-funded".into(),
                    counterparty_leg_ref: "bitshares-leg-redeemed".into(),
                })
            }
            // own_htlc's csv-locked refund branch just matured; safe to broadcast.
            Err(SwapError::CounterpartyTimedOut) => {
                let refund_txid = self.bitcoin_chain.push_tx(&refund_hex).await?;
                Ok(SwapOutcome::Refunded { refund_txid })
            }
            Err(other) => {
                self.broadcast_refund_if_mature(&mut own_htlc, &refund_hex).await;
                Err(other)
            }
        }
    }

    // ---- accepter gives BTS: must verify the proposer's BTC leg before
    // funding its own (the amount-sufficiency guard) ----

    async fn run_accepter_gives_bts(&mut self) -> Result<SwapOutcome, SwapError> {
        let hash = self.config.secret.hash();
        let full_btc_blocks = Timer::new(self.config.confirmation_horizon).to_btc();
        let own_pubkey = self.own_bitcoin_public_key();
        // the proposer's BTC leg acts first, so it uses the full sequence.
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &hash,
            full_btc_blocks as u64,
            &self.config.counterparty_bitcoin_pubkey,
            &own_pubkey,
            self.config.network,
        )?;

        let counterparty_utxo = self
            .poll_for_bitcoin_utxo(&payment.address, self.config.bts_wait_timeout)
            .await?;

        let fee = calculate_fee(self.bitcoin_chain.as_ref(), self.config.priority).await?;
        let minimum_acceptable = self.config.amount_satoshi.saturating_sub(fee.max);
        if counterparty_utxo.value < minimum_acceptable {
            return Err(SwapError::Input(format!(
                "counterparty's bitcoin htlc holds {} sat, short of the required {} sat",
                counterparty_utxo.value, minimum_acceptable
            )));
        }

        let full_bts_secs = Timer::new(self.config.confirmation_horizon)
            .to_bts(self.bitcoin_chain.as_ref())
            .await?;
        let own_bts_secs = self.own_bts_seconds(full_bts_secs);

        self.bitshares_chain
            .create_htlc(CreateHtlcParams {
                amount: self.config.amount_bts_mini,
                asset: self.config.bitshares_asset.clone(),
                time_seconds: own_bts_secs,
                hash_hex: hex::encode(hash),
                private_key: self.config.bitshares_private_key.clone(),
                to_account: self.config.counterparty_bitshares_account.clone(),
            })
            .await?;

        let own_account = self.own_bitshares_account()?;
        match self
            .poll_for_bitshares_preimage(
                &own_account,
                &self.config.counterparty_bitshares_account.clone(),
                &hex::encode(hash),
                Duration::from_secs(own_bts_secs),
            )
            .await
        {
            Ok(secret) => {
                let mut their_htlc = BitcoinHtlc::new(
                    LocalRole::receiver(self.config.bitcoin_private_key, &Secp256k1::new()),
                    self.config.counterparty_bitcoin_pubkey,
                    self.config.network,
                    hash,
                    full_btc_blocks as u64,
                    self.config.priority,
                    self.bitcoin_chain.clone(),
                )?;
                their_htlc.adopt_funded(
                    Txid::from_str(&counterparty_utxo.txid)
                        .map_err(|e| SwapError::Input(format!("bad counterparty txid: {e}")))?,
                    counterparty_utxo.vout,
                    counterparty_utxo.value,
                );
                let receive_address = self.own_bitcoin_address()?;
                let txid = their_htlc.redeem(&secret, &receive_address).await?;
                Ok(SwapOutcome::Redeemed {
                    own_leg_txid: "bitshares-leg-already-funded".into(),
                    counterparty_leg_ref: txid,
                })
            }
            Err(SwapError::CounterpartyTimedOut) => Ok(SwapOutcome::Refunded {
                refund_txid: "bitshares-htlc-auto-expiry".into(),
            }),
            Err(other) => Err(other),
        }
    }

    // ---- shared polling helpers ----

    /// Polls for a Bitshares HTLC matching `(from, to, amount, hash)` while
    /// `own_htlc`'s own CSV-locked refund branch hasn't matured yet. Per
    /// the polling termination rule, a BTC-side wait ends on block height
    /// (`currentHeight >= fundingHeight + sequence`), not wall clock —
    /// broadcasting the presigned refund before that height is reached
    /// would carry a non-final `nSequence` and be rejected.
    async fn poll_for_bitshares_htlc_or_own_refund(
        &self,
        from: &str,
        to: &str,
        time_seconds: u64,
        own_htlc: &mut BitcoinHtlc,
    ) -> Result<(), SwapError> {
        loop {
            match self
                .bitshares_chain
                .get_id(
                    from,
                    to,
                    self.config.amount_bts_mini,
                    &hex::encode(self.config.secret.hash()),
                    time_seconds,
                )
                .await
            {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }
            if self.own_btc_refund_matured(own_htlc).await? {
                return Err(SwapError::CounterpartyTimedOut);
            }
            tokio::time::sleep(self.config.check_api_interval).await;
        }
    }

    async fn poll_for_bitshares_preimage(
        &self,
        from: &str,
        to: &str,
        hash_hex: &str,
        timeout: Duration,
    ) -> Result<Secret, SwapError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self
                .bitshares_chain
                .get_preimage_from_htlc(from, to, hash_hex)
                .await
            {
                Ok(Some(preimage_hex)) => {
                    return Secret::from_preimage_hex(&preimage_hex)
                        .map_err(|e| SwapError::Input(e.to_string()));
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SwapError::CounterpartyTimedOut);
            }
            tokio::time::sleep(self.config.check_api_interval).await;
        }
    }

    /// Polls for a nonempty UTXO set at `address`, used to recognize the
    /// counterparty's funding transaction.
    async fn poll_for_bitcoin_utxo(
        &self,
        address: &Address,
        timeout: Duration,
    ) -> Result<accs_bitcoin_chain::Utxo, SwapError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.bitcoin_chain.get_utxos(&address.to_string()).await {
                Ok(utxos) if !utxos.is_empty() => return Ok(utxos.into_iter().next().unwrap()),
                Ok(_) => {}
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SwapError::CounterpartyTimedOut);
            }
            tokio::time::sleep(self.config.check_api_interval).await;
        }
    }

    /// Polls for a spend of `address`, extracting the preimage from its
    /// witness, while `own_htlc`'s own refund branch hasn't matured yet
    /// (see [`Self::poll_for_bitshares_htlc_or_own_refund`] for why this is
    /// a height bound, not a wall-clock one). Malformed-witness and
    /// broadcast errors are structural and abort the loop instead of
    /// being swallowed.
    async fn poll_for_bitcoin_preimage_or_own_refund(
        &self,
        address: &Address,
        own_htlc: &mut BitcoinHtlc,
    ) -> Result<[u8; 32], SwapError> {
        loop {
            match self
                .bitcoin_chain
                .get_preimage_from_last_transaction(&address.to_string())
                .await
            {
                Ok(preimage) => return Ok(preimage),
                // NotFound means no spend yet; everything else (a
                // malformed witness, a rejected broadcast) is structural
                // and must abort the loop rather than be swallowed.
                Err(e) if e.is_transient() => {}
                Err(e) => return Err(e.into()),
            }
            if self.own_btc_refund_matured(own_htlc).await? {
                return Err(SwapError::CounterpartyTimedOut);
            }
            tokio::time::sleep(self.config.check_api_interval).await;
        }
    }

    /// Refreshes `own_htlc`'s confirmation height and checks whether its
    /// CSV-locked refund branch has matured: `currentBlockHeight >=
    /// fundingTxBlockHeight + timelockBTC`. Transient chain-query errors
    /// are treated as "not yet"; anything else surfaces.
    async fn own_btc_refund_matured(&self, own_htlc: &mut BitcoinHtlc) -> Result<bool, SwapError> {
        match own_htlc.refresh_funding_confirmation().await {
            Ok(()) => {}
            Err(HtlcError::Chain(e)) if e.is_transient() => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        match own_htlc.refund_is_mature().await {
            Ok(mature) => Ok(mature),
            Err(HtlcError::Chain(e)) if e.is_transient() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort refund broadcast after a fatal, unrelated error.
    /// Skips broadcasting (rather than waiting) when the CSV-locked
    /// refund branch hasn't matured yet, since the original error is
    /// already being returned and a premature broadcast would only fail.
    ///
    /// Refreshes the funding confirmation height first: a fatal error can
    /// surface before any polling iteration has observed a confirmation
    /// (`confirmation_height` starts `None`), and checking maturity against
    /// a stale `None` would wrongly skip a refund that has in fact matured.
    async fn broadcast_refund_if_mature(&self, own_htlc: &mut BitcoinHtlc, refund_hex: &str) {
        if let Err(e) = own_htlc.refresh_funding_confirmation().await {
            warn!(%e, "could not refresh funding confirmation; skipping best-effort broadcast");
            return;
        }
        match own_htlc.refund_is_mature().await {
            Ok(true) => match self.bitcoin_chain.push_tx(refund_hex).await {
                Ok(txid) => info!(%txid, "best-effort refund broadcast after fatal error"),
                Err(e) => warn!(%e, "best-effort refund broadcast also failed; original error still returned"),
            },
            Ok(false) => warn!("refund not yet csv-mature; skipping best-effort broadcast"),
            Err(e) => warn!(%e, "could not determine refund maturity; skipping best-effort broadcast"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{Network, PrivateKey};

    use accs_bitcoin_chain::{MockBitcoinChain, Utxo};
    use accs_bitshares_chain::MockBitsharesChain;
    use accs_error::AccsError;

    use crate::config::SecretRole;

    fn keypair(byte: u8) -> (PrivateKey, PublicKey) {
        let secp = Secp256k1::new();
        let sk = PrivateKey::from_slice(&[byte; 32], Network::Regtest).unwrap();
        let pk = PublicKey::from_private_key(&secp, &sk);
        (sk, pk)
    }

    fn funding_txid() -> Txid {
        Txid::from_str("1111111111111111111111111111111111111111111111111111111111111111")
            .unwrap()
    }

    /// Stages a UTXO at `pk`'s own P2WPKH address, the one `BitcoinHtlc::create`
    /// spends from to fund a leg.
    fn fund_sender_utxo(chain: &MockBitcoinChain, pk: PublicKey, value: u64) {
        let compressed = CompressedPublicKey::try_from(pk).unwrap();
        let address = Address::p2wpkh(&compressed, Network::Regtest);
        chain.set_utxos(
            &address.to_string(),
            vec![Utxo {
                txid: funding_txid().to_string(),
                vout: 0,
                value,
                status: Default::default(),
            }],
        );
    }

    fn test_swap_config(
        role: Role,
        gives: GiveCurrency,
        own_key: PrivateKey,
        counterparty_pubkey: PublicKey,
        secret: SecretRole,
        counterparty_bitshares_account: &str,
    ) -> SwapConfig {
        SwapConfig {
            role,
            gives,
            network: Network::Regtest,
            amount_satoshi: 100_000_000,
            amount_bts_mini: 50_000,
            bitcoin_private_key: own_key,
            bitshares_private_key: "unused-by-the-mock".into(),
            counterparty_bitcoin_pubkey: counterparty_pubkey,
            counterparty_bitshares_account: counterparty_bitshares_account.into(),
            bitcoin_funding_txid: funding_txid(),
            bitshares_asset: "ACCS.BTC".into(),
            priority: 0,
            secret,
            confirmation_horizon: 6,
            check_api_interval: Duration::from_millis(1),
            bts_wait_timeout: Duration::from_secs(5),
        }
    }

    // ---- scenario 1: happy path, proposer gives BTC ----

    #[tokio::test]
    async fn proposer_gives_btc_redeems_both_legs_once_counterparty_funds_bitshares() {
        let (proposer_sk, proposer_pk) = keypair(0x11);
        let (_accepter_sk, accepter_pk) = keypair(0x22);
        let secret = Secret::random();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        fund_sender_utxo(&bitcoin_chain, proposer_pk, 100_100_000);
        let bitshares_chain = Arc::new(MockBitsharesChain::new("proposer"));
        bitshares_chain.inject_htlc("accepter", "TEST-proposer", 50_000, &secret.hash_hex());

        let cfg = test_swap_config(
            Role::Proposer,
            GiveCurrency::Btc,
            proposer_sk,
            accepter_pk,
            SecretRole::Known(secret),
            "accepter",
        );
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain.clone(), bitshares_chain);
        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, SwapOutcome::Redeemed { .. }));
        assert_eq!(bitcoin_chain.broadcasts().len(), 1);
    }

    // ---- scenario 2: happy path, proposer gives BTS ----

    #[tokio::test]
    async fn proposer_gives_bts_redeems_counterpartys_bitcoin_htlc() {
        let (proposer_sk, proposer_pk) = keypair(0x11);
        let (_accepter_sk, accepter_pk) = keypair(0x22);
        let secret = Secret::random();
        let hash = secret.hash();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        // the accepter funds the BTC leg with the halved sequence, since
        // it acts second; the proposer is the receiver of that htlc.
        let counterparty_sequence = halve(6);
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &hash,
            counterparty_sequence,
            &accepter_pk,
            &proposer_pk,
            Network::Regtest,
        )
        .unwrap();
        bitcoin_chain.set_utxos(
            &payment.address.to_string(),
            vec![Utxo {
                txid: funding_txid().to_string(),
                vout: 0,
                value: 100_000_000,
                status: Default::default(),
            }],
        );

        let bitshares_chain = Arc::new(MockBitsharesChain::new("proposer"));
        let cfg = test_swap_config(
            Role::Proposer,
            GiveCurrency::Bts,
            proposer_sk,
            accepter_pk,
            SecretRole::Known(secret),
            "accepter",
        );
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain, bitshares_chain);
        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, SwapOutcome::Redeemed { .. }));
    }

    // ---- scenario 3: accepter abandons after the proposer funds BTC ----

    #[tokio::test]
    async fn proposer_gives_btc_refunds_when_accepter_never_funds_bitshares() {
        let (proposer_sk, proposer_pk) = keypair(0x11);
        let (_accepter_sk, accepter_pk) = keypair(0x22);
        let secret = Secret::random();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        fund_sender_utxo(&bitcoin_chain, proposer_pk, 100_100_000);
        // the proposer never halves its sequence, so the refund matures
        // at funding_height + 6.
        bitcoin_chain.set_default_confirmation_height(100);
        bitcoin_chain.advance_blocks(6);
        let bitshares_chain = Arc::new(MockBitsharesChain::new("proposer"));

        let cfg = test_swap_config(
            Role::Proposer,
            GiveCurrency::Btc,
            proposer_sk,
            accepter_pk,
            SecretRole::Known(secret),
            "accepter",
        );
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain.clone(), bitshares_chain);
        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, SwapOutcome::Refunded { .. }));
        // the funding broadcast, then the csv-mature refund broadcast.
        assert_eq!(bitcoin_chain.broadcasts().len(), 2);
    }

    // ---- accepter gives BTC: happy path and scenario 4 (proposer abandons) ----

    #[tokio::test]
    async fn accepter_gives_btc_redeems_bitshares_once_preimage_observed() {
        let (accepter_sk, accepter_pk) = keypair(0x22);
        let (_proposer_sk, proposer_pk) = keypair(0x11);
        let secret = Secret::random();
        let hash = secret.hash();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        fund_sender_utxo(&bitcoin_chain, accepter_pk, 100_100_000);
        // the accepter acts second, so its own leg uses the halved sequence.
        let sequence = halve(6);
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &hash,
            sequence,
            &accepter_pk,
            &proposer_pk,
            Network::Regtest,
        )
        .unwrap();
        bitcoin_chain.set_preimage_for_spend(
            &payment.address.to_string(),
            secret.preimage().unwrap(),
        );

        let bitshares_chain = Arc::new(MockBitsharesChain::new("accepter"));
        bitshares_chain.inject_htlc("proposer", "TEST-accepter", 50_000, &secret.hash_hex());

        let cfg = test_swap_config(
            Role::Accepter,
            GiveCurrency::Btc,
            accepter_sk,
            proposer_pk,
            SecretRole::HashOnly(hash),
            "proposer",
        );
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain, bitshares_chain);
        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, SwapOutcome::Redeemed { .. }));
    }

    #[tokio::test]
    async fn accepter_gives_btc_refunds_when_proposer_never_redeems() {
        let (accepter_sk, accepter_pk) = keypair(0x22);
        let (_proposer_sk, proposer_pk) = keypair(0x11);
        let hash = Secret::random().hash();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        fund_sender_utxo(&bitcoin_chain, accepter_pk, 100_100_000);
        bitcoin_chain.set_default_confirmation_height(100);
        bitcoin_chain.set_block_height(103); // halve(6) == 3

        let cfg = test_swap_config(
            Role::Accepter,
            GiveCurrency::Btc,
            accepter_sk,
            proposer_pk,
            SecretRole::HashOnly(hash),
            "proposer",
        );
        let bitshares_chain = Arc::new(MockBitsharesChain::new("accepter"));
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain.clone(), bitshares_chain);
        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, SwapOutcome::Refunded { .. }));
        assert_eq!(bitcoin_chain.broadcasts().len(), 2);
    }

    /// A malformed spend is structural and must abort the wait instead of
    /// being swallowed like a not-yet; the fatal-error path still attempts
    /// the refund if it has matured in the meantime.
    #[tokio::test]
    async fn accepter_gives_btc_surfaces_malformed_witness_and_still_attempts_refund() {
        let (accepter_sk, accepter_pk) = keypair(0x22);
        let (_proposer_sk, proposer_pk) = keypair(0x11);
        let hash = Secret::random().hash();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        fund_sender_utxo(&bitcoin_chain, accepter_pk, 100_100_000);
        bitcoin_chain.set_default_confirmation_height(100);
        bitcoin_chain.set_block_height(103);

        let sequence = halve(6);
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &hash,
            sequence,
            &accepter_pk,
            &proposer_pk,
            Network::Regtest,
        )
        .unwrap();
        bitcoin_chain.set_malformed_spend(
            &payment.address.to_string(),
            "witness does not select the IF (redeem) branch",
        );

        let cfg = test_swap_config(
            Role::Accepter,
            GiveCurrency::Btc,
            accepter_sk,
            proposer_pk,
            SecretRole::HashOnly(hash),
            "proposer",
        );
        let bitshares_chain = Arc::new(MockBitsharesChain::new("accepter"));
        let mut orchestrator = SwapOrchestrator::new(cfg, bitcoin_chain.clone(), bitshares_chain);
        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, SwapError::Chain(AccsError::MalformedWitness(_))));
        assert_eq!(bitcoin_chain.broadcasts().len(), 2);
    }

    // ---- scenario 6: amount insufficiency check ----

    #[tokio::test]
    async fn accepter_gives_bts_rejects_undersized_counterparty_funding_without_funding_own_leg() {
        let (accepter_sk, accepter_pk) = keypair(0x22);
        let (_proposer_sk, proposer_pk) = keypair(0x11);
        let hash = Secret::random().hash();

        let bitcoin_chain = Arc::new(MockBitcoinChain::new());
        // the proposer's btc leg acts first, so it uses the full sequence.
        let payment = accs_bitcoin_htlc::get_p2wsh(
            &hash,
            6,
            &proposer_pk,
            &accepter_pk,
            Network::Regtest,
        )
        .unwrap();
        // fee.max at the default {1.0, 2.0, 5.0} sat/vB tiers is 700 sat.
        let short_by_one = 100_000_000 - 700 - 1;
        bitcoin_chain.set_utxos(
            &payment.address.to_string(),
            vec![Utxo {
                txid: funding_txid().to_string(),
                vout: 0,
                value: short_by_one,
                status: Default::default(),
            }],
        );

        let bitshares_chain = Arc::new(MockBitsharesChain::new("accepter"));
        let cfg = test_swap_config(
            Role::Accepter,
            GiveCurrency::Bts,
            accepter_sk,
            proposer_pk,
            SecretRole::HashOnly(hash),
            "proposer",
        );
        let mut orchestrator =
            SwapOrchestrator::new(cfg, bitcoin_chain, bitshares_chain.clone());
        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, SwapError::Input(_)));
        assert!(bitshares_chain
            .get_id("proposer", "TEST-accepter", 50_000, &hex::encode(hash), 1)
            .await
            .unwrap()
            .is_none());
    }
}
