//! This module defines the basic crypto primitives for Blind Diffie-Hellman Key Exchange (blind ecash) as used by v1 cashu mints.
//!
//! Alice (Client):
//!```python
//! Y = hash_to_curve(secret_message)
//! r = blinding factor
//! B'= Y + r*G
//! ```
//!
//! Bob (Mint):
//!```python
//! C' = k*B'
//!```
//!
//! Alice:
//!```python
//! C = C' - r*K
//! (= k*Y)
//!```
//!
//! Bob can later check `C == k*hash_to_curve(secret_message)` when the proof is spent.
//!
use std::collections::HashMap;

use bitcoin_hashes::{sha256, Hash};
use secp256k1::{All, Parity, PublicKey, Scalar, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::{
    blind::{BlindedSignature, PreparedOutputs},
    error::TallyCoreError,
    proof::{Proof, Proofs},
};

const DOMAIN_SEPARATOR: &[u8; 28] = b"Secp256k1_HashToCurve_Cashu_";

#[derive(Clone, Debug)]
pub struct Dhke {
    secp: Secp256k1<All>,
}

impl Default for Dhke {
    fn default() -> Self {
        Self::new()
    }
}

impl Dhke {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Maps a message to a point on the curve. The message is prefixed with the cashu domain separator,
    /// then a little endian counter is appended until the hash is a valid x-coordinate.
    pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, TallyCoreError> {
        let msg_hash = sha256::Hash::hash(&[DOMAIN_SEPARATOR.as_slice(), message].concat());

        for counter in 0..(1u32 << 16) {
            let mut to_hash = msg_hash.as_byte_array().to_vec();
            to_hash.extend_from_slice(&counter.to_le_bytes());
            let hash = sha256::Hash::hash(&to_hash);

            if let Ok(x_only) = XOnlyPublicKey::from_slice(hash.as_byte_array()) {
                return Ok(PublicKey::from_x_only_public_key(x_only, Parity::Even));
            }
        }
        Err(TallyCoreError::NoValidPoint)
    }

    /// `B_ = Y + r*G`
    pub fn blind_message(
        &self,
        secret: &str,
        blinding_factor: SecretKey,
    ) -> Result<PublicKey, TallyCoreError> {
        let y = Self::hash_to_curve(secret.as_bytes())?;
        Ok(y.combine(&PublicKey::from_secret_key(&self.secp, &blinding_factor))?)
    }

    /// `C_ = k*B_`, the mint side of the exchange.
    pub fn sign_blinded_message(
        &self,
        blinded: PublicKey,
        mint_key: &SecretKey,
    ) -> Result<PublicKey, TallyCoreError> {
        Ok(blinded.mul_tweak(&self.secp, &Scalar::from(*mint_key))?)
    }

    /// `C = C_ - r*K`
    pub fn unblind_signature(
        &self,
        c_: PublicKey,
        blinding_factor: SecretKey,
        mint_pubkey: PublicKey,
    ) -> Result<PublicKey, TallyCoreError> {
        let r_k = mint_pubkey
            .mul_tweak(&self.secp, &Scalar::from(blinding_factor))?
            .negate(&self.secp);
        Ok(c_.combine(&r_k)?)
    }

    pub fn verify(
        &self,
        mint_key: &SecretKey,
        c: PublicKey,
        secret: &str,
    ) -> Result<bool, TallyCoreError> {
        let y = Self::hash_to_curve(secret.as_bytes())?;
        Ok(c == y.mul_tweak(&self.secp, &Scalar::from(*mint_key))?)
    }

    /// Turns the signatures of the mint into spendable proofs. Signatures are matched with the
    /// outputs by position; a mint may return fewer signatures than outputs (change of a melt).
    pub fn construct_proofs(
        &self,
        signatures: &[BlindedSignature],
        outputs: &PreparedOutputs,
        keys: &HashMap<u64, PublicKey>,
    ) -> Result<Proofs, TallyCoreError> {
        signatures
            .iter()
            .zip(outputs.secrets())
            .zip(outputs.blinding_factors())
            .map(|((signature, secret), r)| {
                let mint_pubkey = keys
                    .get(&signature.amount)
                    .ok_or(TallyCoreError::AmountKeyNotFound(signature.amount))?;
                let c = self.unblind_signature(signature.c_, r, *mint_pubkey)?;
                Ok(Proof::new(signature.amount, secret, c, signature.id.clone()))
            })
            .collect()
    }
}

/// The `Y` value of a secret, used by the mint to track the state of a proof ([Nut-07](https://github.com/cashubtc/nuts/blob/main/07.md)).
pub fn proof_y(secret: &str) -> Result<String, TallyCoreError> {
    Ok(Dhke::hash_to_curve(secret.as_bytes())?.to_string())
}

pub fn public_key_from_hex(hex: &str) -> Result<PublicKey, TallyCoreError> {
    Ok(PublicKey::from_slice(&hex::decode(hex)?)?)
}
