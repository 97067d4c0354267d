//! The shared hash-lock secret: a 32-byte preimage and its SHA-256
//! digest. A [`Secret`] is immutable once built; the preimage side is
//! private to whichever party generated it until the first on-chain
//! redemption reveals it.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("preimage does not hash to the expected value")]
    HashMismatch,
}

/// A SHA-256 hash lock, with or without the preimage that opens it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    preimage: Option<[u8; 32]>,
    hash: [u8; 32],
}

impl Secret {
    /// Draws 32 cryptographically random bytes and hashes them.
    pub fn random() -> Self {
        let mut preimage = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut preimage);
        Self::from_preimage(preimage)
    }

    /// Wraps a known preimage, computing its hash.
    pub fn from_preimage(preimage: [u8; 32]) -> Self {
        let hash = sha256(&preimage);
        Self {
            preimage: Some(preimage),
            hash,
        }
    }

    /// Builds a hash-only secret: the accepter's view before it has
    /// observed the proposer's reveal.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self {
            preimage: None,
            hash,
        }
    }

    /// Parses a hash-only secret from lowercase hex.
    pub fn from_hash_hex(hash_hex: &str) -> Result<Self, SecretError> {
        Ok(Self::from_hash(decode_32(hash_hex)?))
    }

    /// Parses a known-preimage secret from lowercase hex.
    pub fn from_preimage_hex(preimage_hex: &str) -> Result<Self, SecretError> {
        Ok(Self::from_preimage(decode_32(preimage_hex)?))
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn preimage(&self) -> Option<[u8; 32]> {
        self.preimage
    }

    pub fn preimage_hex(&self) -> Option<String> {
        self.preimage.map(hex::encode)
    }

    /// Reveals a preimage observed on-chain, checking it against this
    /// secret's hash. Used by the accepter once it extracts the preimage
    /// from the proposer's redeem transaction.
    pub fn reveal(&mut self, preimage: [u8; 32]) -> Result<(), SecretError> {
        if sha256(&preimage) != self.hash {
            return Err(SecretError::HashMismatch);
        }
        self.preimage = Some(preimage);
        Ok(())
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("hash", &self.hash_hex())
            .field(
                "preimage",
                &if self.preimage.is_some() {
                    "<redacted>"
                } else {
                    "<none>"
                },
            )
            .finish()
    }
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn decode_32(s: &str) -> Result<[u8; 32], SecretError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(SecretError::InvalidLength(bytes.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_round_trip_through_hex() {
        let secret = Secret::random();
        let hash_hex = secret.hash_hex();
        let preimage_hex = secret.preimage_hex().unwrap();

        let from_hash = Secret::from_hash_hex(&hash_hex).unwrap();
        assert_eq!(from_hash.hash(), secret.hash());
        assert!(from_hash.preimage().is_none());

        let from_preimage = Secret::from_preimage_hex(&preimage_hex).unwrap();
        assert_eq!(from_preimage.hash(), secret.hash());
    }

    #[test]
    fn reveal_accepts_matching_preimage() {
        let secret = Secret::random();
        let mut hash_only = Secret::from_hash(secret.hash());
        hash_only.reveal(secret.preimage().unwrap()).unwrap();
        assert_eq!(hash_only.preimage(), secret.preimage());
    }

    #[test]
    fn reveal_rejects_mismatched_preimage() {
        let mut hash_only = Secret::from_hash(Secret::random().hash());
        let wrong = Secret::random().preimage().unwrap();
        assert!(hash_only.reveal(wrong).is_err());
    }

    #[test]
    fn debug_never_prints_preimage_bytes() {
        let secret = Secret::random();
        let rendered = format!("{:?}", secret);
        let preimage_hex = secret.preimage_hex().unwrap();
        assert!(!rendered.contains(&preimage_hex));
    }

    #[test]
    fn rejects_wrong_length_hex() {
        assert!(Secret::from_hash_hex("abcd").is_err());
    }
}
