//! This module defines keysets as described in [Nut-01](https://github.com/cashubtc/nuts/blob/main/01.md) and [Nut-02](https://github.com/cashubtc/nuts/blob/main/02.md)
//!
//! `KeysetInfo` is the entry a mint returns from `v1/keysets`: id, unit, whether the keyset is active and its input fee in parts per thousand.
//! `MintKeys` holds the public key per amount of one keyset.
//! `MintKeyset` derives a full deterministic key set from a seed. Wallets only need it to stand in for a mint in tests.

use std::collections::HashMap;

use bitcoin_hashes::{sha256, Hash};
use itertools::Itertools;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

use crate::{error::TallyCoreError, primitives::CurrencyUnit, proof::Proofs};

const MAX_ORDER: u32 = 64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysetInfo {
    pub id: String,
    pub unit: CurrencyUnit,
    pub active: bool,
    #[serde(default)]
    pub input_fee_ppk: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Keysets {
    pub keysets: Vec<KeysetInfo>,
}

impl Keysets {
    pub fn new(keysets: Vec<KeysetInfo>) -> Self {
        Self { keysets }
    }

    pub fn for_unit(&self, unit: &CurrencyUnit) -> Self {
        Self::new(
            self.keysets
                .iter()
                .filter(|k| &k.unit == unit)
                .cloned()
                .collect(),
        )
    }

    pub fn active(&self) -> Option<&KeysetInfo> {
        self.keysets.iter().find(|k| k.active)
    }

    pub fn get(&self, id: &str) -> Option<&KeysetInfo> {
        self.keysets.iter().find(|k| k.id == id)
    }

    /// Input fee the mint charges for spending `proofs`: the per-proof fee of each proof's keyset, summed and rounded up to whole sats.
    pub fn fee_for(&self, proofs: &Proofs) -> Result<u64, TallyCoreError> {
        let sum_ppk = proofs
            .iter()
            .map(|p| {
                self.get(&p.keyset_id)
                    .map(|k| k.input_fee_ppk)
                    .ok_or(TallyCoreError::InvalidKeysetid)
            })
            .sum::<Result<u64, TallyCoreError>>()?;
        Ok(sum_ppk.div_ceil(1000))
    }

    /// Input fee for `count` proofs of the active keyset.
    pub fn fee_for_count(&self, count: usize) -> u64 {
        let ppk = self.active().map(|k| k.input_fee_ppk).unwrap_or_default();
        (ppk * count as u64).div_ceil(1000)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MintKeys {
    pub id: String,
    pub unit: CurrencyUnit,
    pub keys: HashMap<u64, PublicKey>,
}

impl MintKeys {
    pub fn verify_id(&self) -> Result<(), TallyCoreError> {
        if derive_keyset_id(&self.keys) == self.id {
            Ok(())
        } else {
            Err(TallyCoreError::InvalidKeysetid)
        }
    }
}

#[derive(Debug, Clone)]
pub struct MintKeyset {
    pub private_keys: HashMap<u64, SecretKey>,
    pub public_keys: HashMap<u64, PublicKey>,
    pub keyset_id: String,
}

impl MintKeyset {
    pub fn new(seed: &str, derivation_path: &str) -> Result<Self, TallyCoreError> {
        let private_keys = derive_keys(seed, derivation_path)?;
        let public_keys = derive_pubkeys(&private_keys);
        Ok(Self {
            keyset_id: derive_keyset_id(&public_keys),
            private_keys,
            public_keys,
        })
    }

    pub fn mint_keys(&self, unit: CurrencyUnit) -> MintKeys {
        MintKeys {
            id: self.keyset_id.clone(),
            unit,
            keys: self.public_keys.clone(),
        }
    }
}

/// Derives one secret key per power of two from a master key and a derivation path.
pub fn derive_keys(
    master_key: &str,
    derivation_path: &str,
) -> Result<HashMap<u64, SecretKey>, TallyCoreError> {
    (0..MAX_ORDER)
        .map(|i| {
            let hash = sha256::Hash::hash(format!("{master_key}{derivation_path}{i}").as_bytes());
            Ok((2u64.pow(i), SecretKey::from_slice(hash.as_byte_array())?))
        })
        .collect()
}

pub fn derive_pubkeys(keys: &HashMap<u64, SecretKey>) -> HashMap<u64, PublicKey> {
    let secp = Secp256k1::new();
    keys.iter()
        .map(|(amt, key)| (*amt, key.public_key(&secp)))
        .collect()
}

/// v1 keyset id: version byte `00` followed by the first 7 bytes of the sha256 of all public keys, sorted by amount.
pub fn derive_keyset_id(keys: &HashMap<u64, PublicKey>) -> String {
    let pubkeys = keys
        .iter()
        .sorted_by(|(amt_a, _), (amt_b, _)| amt_a.cmp(amt_b))
        .flat_map(|(_, pubkey)| pubkey.serialize())
        .collect::<Vec<u8>>();
    let hashed_pubkeys = hex::encode(sha256::Hash::hash(&pubkeys).as_byte_array());
    format!("00{}", &hashed_pubkeys[..14])
}
