//! Deterministic secrets and blinding factors as described in [Nut-13](https://github.com/cashubtc/nuts/blob/main/13.md).
//!
//! Every output the wallet creates is derived from the seed, the keyset and a counter, so a lost
//! database can be recovered from the seed words alone. Reusing a counter value for the same
//! keyset produces a secret the mint has already seen, which is why counters are only handed out
//! through `LocalStore::reserve_counter`.

use crate::error::TallyWalletError;
use std::str::FromStr;

use bip32::{Seed, XPrv};
use bip39::Mnemonic;
use rand::Rng;
use secp256k1::SecretKey;
use tally_core::{
    amount::Amount,
    blind::{BlindedMessage, PreparedOutput, PreparedOutputs},
    dhke::Dhke,
};

enum DerivationType {
    Secret = 0,
    Blinding = 1,
}

pub struct DeterministicSecret {
    seed: Seed,
}

impl Clone for DeterministicSecret {
    fn clone(&self) -> Self {
        Self {
            seed: Seed::new(*self.seed.as_bytes()),
        }
    }
}

impl std::fmt::Debug for DeterministicSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterministicSecret").finish_non_exhaustive()
    }
}

impl DeterministicSecret {
    pub fn from_seed_words(seed_words: &str) -> Result<Self, TallyWalletError> {
        let mnemonic = Mnemonic::from_str(seed_words)?;
        Ok(Self {
            seed: Seed::new(mnemonic.to_seed("")),
        })
    }

    /// 12 fresh seed words, 16 bytes of entropy.
    pub fn generate_random_seed_words() -> Result<String, TallyWalletError> {
        let entropy: [u8; 16] = rand::thread_rng().gen();
        let mnemonic = Mnemonic::from_entropy(&entropy)?;
        Ok(mnemonic.word_iter().collect::<Vec<&str>>().join(" "))
    }

    fn derive_private_key(
        &self,
        keyset_id: u32,
        counter: u32,
        secret_or_blinding: DerivationType,
    ) -> Result<Vec<u8>, TallyWalletError> {
        let secret_or_blinding = secret_or_blinding as u32;
        let derivation_path = format!("m/129372'/0'/{keyset_id}'/{counter}'/{secret_or_blinding}");
        let derivation_path = bip32::DerivationPath::from_str(&derivation_path)?;
        let key = XPrv::derive_from_path(&self.seed, &derivation_path)?;
        Ok(key.private_key().to_bytes().to_vec())
    }

    pub fn derive_secret(&self, keyset_id: u32, counter: u32) -> Result<String, TallyWalletError> {
        let key = self.derive_private_key(keyset_id, counter, DerivationType::Secret)?;
        Ok(hex::encode(key))
    }

    pub fn derive_blinding_factor(
        &self,
        keyset_id: u32,
        counter: u32,
    ) -> Result<SecretKey, TallyWalletError> {
        let key = self.derive_private_key(keyset_id, counter, DerivationType::Blinding)?;
        Ok(SecretKey::from_slice(&key)?)
    }

    pub fn derive_range(
        &self,
        keyset_id: u32,
        start: u32,
        length: u32,
    ) -> Result<Vec<(String, SecretKey)>, TallyWalletError> {
        (start..start + length)
            .map(|i| {
                Ok((
                    self.derive_secret(keyset_id, i)?,
                    self.derive_blinding_factor(keyset_id, i)?,
                ))
            })
            .collect()
    }

    /// Builds one blinded output per amount, consuming counter values `start..start + amounts.len()`.
    pub fn prepare_outputs(
        &self,
        dhke: &Dhke,
        keyset_id: &str,
        start: u32,
        amounts: &[u64],
    ) -> Result<PreparedOutputs, TallyWalletError> {
        let keyset_int = convert_hex_to_int(keyset_id)?;
        let secrets = self.derive_range(keyset_int, start, amounts.len() as u32)?;

        let outputs = amounts
            .iter()
            .zip(secrets)
            .map(|(amount, (secret, blinding_factor))| {
                let b_ = dhke.blind_message(&secret, blinding_factor)?;
                Ok(PreparedOutput {
                    message: BlindedMessage {
                        amount: *amount,
                        b_,
                        id: keyset_id.to_owned(),
                    },
                    secret,
                    blinding_factor,
                })
            })
            .collect::<Result<Vec<_>, TallyWalletError>>()?;
        Ok(PreparedOutputs::new(outputs))
    }

    /// Outputs for the binary split of `amount`.
    pub fn prepare_outputs_for_amount(
        &self,
        dhke: &Dhke,
        keyset_id: &str,
        start: u32,
        amount: u64,
    ) -> Result<PreparedOutputs, TallyWalletError> {
        let amounts = Amount(amount).split();
        self.prepare_outputs(dhke, keyset_id, start, amounts.amounts())
    }

    /// Blank outputs for melt change. The amount is a placeholder, the mint assigns the value.
    pub fn prepare_blank_outputs(
        &self,
        dhke: &Dhke,
        keyset_id: &str,
        start: u32,
        count: usize,
    ) -> Result<PreparedOutputs, TallyWalletError> {
        self.prepare_outputs(dhke, keyset_id, start, &vec![1; count])
    }
}

/// Maps a hex keyset id to the integer used in the derivation path.
pub fn convert_hex_to_int(keyset_id_hex: &str) -> Result<u32, TallyWalletError> {
    let bytes = hex::decode(keyset_id_hex)?;
    let bytes_array: [u8; 8] = bytes
        .get(0..8)
        .ok_or(tally_core::error::TallyCoreError::InvalidKeysetid)?
        .try_into()?;
    let num = u64::from_be_bytes(bytes_array);
    Ok((num % (2u64.pow(31) - 1)) as u32)
}
