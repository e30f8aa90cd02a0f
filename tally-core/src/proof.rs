//! This module defines the `Proof` and `Proofs` structs, the bearer tokens of a cashu mint as described in [Nut-00](https://github.com/cashubtc/nuts/blob/main/00.md)
//!
//! A `Proof` carries an `amount` in satoshis, the `secret` it was minted for, the unblinded signature `C` and the id of the keyset that signed it.
//! Possession of a proof is ownership: spending means handing the proof to the mint.
//!
//! `Proofs` is a collection of proofs belonging to one mint. It provides the selection helpers the wallet uses to pick inputs for a payment.

use std::collections::HashSet;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::TallyCoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proof {
    pub amount: u64,
    #[serde(rename = "id")]
    pub keyset_id: String,
    pub secret: String,
    #[serde(rename = "C")]
    pub c: PublicKey,
}

impl Proof {
    pub const fn new(amount: u64, secret: String, c: PublicKey, id: String) -> Self {
        Self {
            amount,
            secret,
            c,
            keyset_id: id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Proofs(pub(super) Vec<Proof>);

impl Proofs {
    pub fn new(proofs: Vec<Proof>) -> Self {
        Self(proofs)
    }

    pub fn with_proof(proof: Proof) -> Self {
        Self(vec![proof])
    }

    pub const fn empty() -> Self {
        Self(vec![])
    }

    pub fn total_amount(&self) -> u64 {
        self.0.iter().map(|proof| proof.amount).sum()
    }

    pub fn proofs(&self) -> Vec<Proof> {
        self.0.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Proof> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn secrets(&self) -> HashSet<&str> {
        self.0.iter().map(|p| p.secret.as_str()).collect()
    }

    pub fn contains_secret(&self, secret: &str) -> bool {
        self.0.iter().any(|p| p.secret == secret)
    }

    pub fn proofs_by_keyset(&self, keyset_id: &str) -> Self {
        self.0
            .iter()
            .filter(|p| p.keyset_id == keyset_id)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Returns the proofs whose secret does not appear in `other`.
    pub fn without_secrets(&self, other: &Self) -> Self {
        let excluded = other.secrets();
        self.0
            .iter()
            .filter(|p| !excluded.contains(p.secret.as_str()))
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Number of proofs that were not part of `inputs`, i.e. proofs backed by freshly derived secrets.
    pub fn count_new(&self, inputs: &Self) -> usize {
        let known = inputs.secrets();
        self.0
            .iter()
            .filter(|p| !known.contains(p.secret.as_str()))
            .count()
    }

    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Selects the largest proofs first until their total covers `amount`.
    pub fn proofs_for_amount(&self, amount: u64) -> Result<Self, TallyCoreError> {
        let mut all_proofs = self.0.clone();
        if amount > self.total_amount() {
            return Err(TallyCoreError::NotEnoughTokens);
        }

        all_proofs.sort_by(|a, b| a.amount.cmp(&b.amount));

        let mut selected_proofs = vec![];
        let mut selected_amount = 0;

        while selected_amount < amount {
            let Some(proof) = all_proofs.pop() else {
                break;
            };
            selected_amount += proof.amount;
            selected_proofs.push(proof);
        }

        Ok(selected_proofs.into())
    }

    /// Largest-first selection that only succeeds if it sums to exactly `amount`.
    pub fn exact_proofs_for_amount(&self, amount: u64) -> Option<Self> {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut remaining = amount;
        let mut selected = vec![];
        for proof in sorted {
            if remaining == 0 {
                break;
            }
            if proof.amount <= remaining {
                remaining -= proof.amount;
                selected.push(proof);
            }
        }

        (remaining == 0).then(|| selected.into())
    }
}

impl From<Vec<Proof>> for Proofs {
    fn from(from: Vec<Proof>) -> Self {
        Self(from)
    }
}

impl From<Proof> for Proofs {
    fn from(from: Proof) -> Self {
        Self(vec![from])
    }
}

impl IntoIterator for Proofs {
    type Item = Proof;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Proof> for Proofs {
    fn from_iter<T: IntoIterator<Item = Proof>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
