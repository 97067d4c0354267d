//! Redeem script construction and the P2WSH payment it locks to.

use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CSV as OP_CHECKSEQUENCEVERIFY, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF,
    OP_EQUALVERIFY, OP_HASH160, OP_IF, OP_SHA256,
};
use bitcoin::hashes::Hash;
use bitcoin::{Address, Network, PublicKey, ScriptBuf};

use crate::error::HtlcError;

/// Largest relative locktime `OP_CHECKSEQUENCEVERIFY` accepts when the
/// block-type flag (bit 22) is unset: a 16-bit block count.
pub const MAX_SEQUENCE: u64 = 0xffff;

pub struct P2wshPayment {
    pub redeem_script: ScriptBuf,
    pub address: Address,
}

/// Builds the HTLC redeem script:
///
/// ```text
/// OP_IF
///     OP_SHA256 <hash> OP_EQUALVERIFY
///     OP_DUP OP_HASH160 <receiverPKH>
/// OP_ELSE
///     <sequence> OP_CHECKSEQUENCEVERIFY OP_DROP
///     OP_DUP OP_HASH160 <senderPKH>
/// OP_ENDIF
/// OP_EQUALVERIFY
/// OP_CHECKSIG
/// ```
///
/// The IF branch pays to whoever knows the preimage; the ELSE branch pays
/// back to the sender once `sequence` blocks have elapsed since the
/// funding output was confirmed.
pub fn build_redeem_script(
    hash: &[u8; 32],
    sequence: u64,
    sender_pubkey: &PublicKey,
    receiver_pubkey: &PublicKey,
) -> Result<ScriptBuf, HtlcError> {
    if sequence > MAX_SEQUENCE {
        return Err(HtlcError::SequenceOutOfRange(sequence));
    }

    let sender_hash = sender_pubkey.pubkey_hash();
    let receiver_hash = receiver_pubkey.pubkey_hash();

    Ok(ScriptBuf::builder()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(receiver_hash.as_byte_array())
        .push_opcode(OP_ELSE)
        .push_int(sequence as i64)
        .push_opcode(OP_CHECKSEQUENCEVERIFY)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(sender_hash.as_byte_array())
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script())
}

/// The P2WSH address a redeem script locks to, plus the script itself
/// (needed again as the witness script when spending). Pure and
/// side-effect free: either party can call this from only the hash,
/// sequence and both public keys, with no chain access.
pub fn get_p2wsh(
    hash: &[u8; 32],
    sequence: u64,
    sender_pubkey: &PublicKey,
    receiver_pubkey: &PublicKey,
    network: Network,
) -> Result<P2wshPayment, HtlcError> {
    let redeem_script = build_redeem_script(hash, sequence, sender_pubkey, receiver_pubkey)?;
    let address = Address::p2wsh(&redeem_script, network);
    Ok(P2wshPayment {
        redeem_script,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn keys() -> (PublicKey, PublicKey) {
        let sender = PublicKey::from_str(
            "020c04eb8cb87485501e30b656f37439ea7866d7c58b3c38161e5793b68e712356",
        )
        .unwrap();
        let receiver = PublicKey::from_str(
            "0298e113cc06bc862ac205f2c0f27ee8c0de98d0716537bbf74e2ea6f38a84d5dc",
        )
        .unwrap();
        (sender, receiver)
    }

    #[test]
    fn script_is_deterministic() {
        let (sender, receiver) = keys();
        let hash = [0x11u8; 32];
        let a = build_redeem_script(&hash, 900, &sender, &receiver).unwrap();
        let b = build_redeem_script(&hash, 900, &sender, &receiver).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn script_rejects_sequence_beyond_csv_range() {
        let (sender, receiver) = keys();
        let hash = [0u8; 32];
        let err = build_redeem_script(&hash, MAX_SEQUENCE + 1, &sender, &receiver).unwrap_err();
        assert!(matches!(err, HtlcError::SequenceOutOfRange(_)));
    }

    #[test]
    fn script_accepts_sequence_boundaries() {
        let (sender, receiver) = keys();
        let hash = [0u8; 32];
        assert!(build_redeem_script(&hash, 0, &sender, &receiver).is_ok());
        assert!(build_redeem_script(&hash, MAX_SEQUENCE, &sender, &receiver).is_ok());
    }

    #[test]
    fn p2wsh_address_follows_from_script() {
        let (sender, receiver) = keys();
        let hash = [0x22u8; 32];
        let payment = get_p2wsh(&hash, 144, &sender, &receiver, Network::Regtest).unwrap();
        assert_eq!(
            Address::p2wsh(&payment.redeem_script, Network::Regtest),
            payment.address
        );
    }
}
