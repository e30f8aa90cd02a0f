//! This module defines the `BlindedMessage` and `BlindedSignature` structs, which are used for representing blinded messages and signatures in Cashu as described in [Nut-00](https://github.com/cashubtc/nuts/blob/main/00.md)
//!
//! `PreparedOutputs` keeps the blinded messages a wallet sends to the mint together with the secrets and blinding factors it needs to unblind the answer.

use secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlindedSignature {
    pub amount: u64,
    #[serde(rename = "C_")]
    pub c_: PublicKey,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlindedMessage {
    pub amount: u64,
    #[serde(rename = "B_")]
    pub b_: PublicKey,
    pub id: String,
}

/// A single output the wallet asked the mint to sign, with everything needed to turn the signature into a proof.
#[derive(Debug, Clone)]
pub struct PreparedOutput {
    pub message: BlindedMessage,
    pub secret: String,
    pub blinding_factor: SecretKey,
}

#[derive(Debug, Clone, Default)]
pub struct PreparedOutputs(Vec<PreparedOutput>);

impl PreparedOutputs {
    pub fn new(outputs: Vec<PreparedOutput>) -> Self {
        Self(outputs)
    }

    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.0.iter().map(|o| o.message.clone()).collect()
    }

    pub fn secrets(&self) -> Vec<String> {
        self.0.iter().map(|o| o.secret.clone()).collect()
    }

    pub fn blinding_factors(&self) -> Vec<SecretKey> {
        self.0.iter().map(|o| o.blinding_factor).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_amount(&self) -> u64 {
        self.0.iter().map(|o| o.message.amount).sum()
    }

    /// Splits off the outputs after `at`, keeping the first `at` in `self`.
    pub fn split_off(&mut self, at: usize) -> Self {
        Self(self.0.split_off(at))
    }
}

pub trait TotalAmount {
    fn total_amount(&self) -> u64;
}

impl TotalAmount for Vec<BlindedSignature> {
    fn total_amount(&self) -> u64 {
        self.iter().fold(0, |acc, x| acc + x.amount)
    }
}

impl TotalAmount for Vec<BlindedMessage> {
    fn total_amount(&self) -> u64 {
        self.iter().fold(0, |acc, x| acc + x.amount)
    }
}
