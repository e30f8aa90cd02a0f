//! This module contains the request and response objects exchanged between a wallet and a v1 cashu mint.
//! All of these structs are serializable and deserializable using serde.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    blind::{BlindedMessage, BlindedSignature},
    keyset::MintKeys,
    proof::Proofs,
};

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyUnit {
    #[default]
    Sat,
    Msat,
    Usd,
    Eur,
}

impl Display for CurrencyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sat => write!(f, "sat"),
            Self::Msat => write!(f, "msat"),
            Self::Usd => write!(f, "usd"),
            Self::Eur => write!(f, "eur"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MintQuoteState {
    Unpaid,
    Paid,
    Issued,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeltQuoteState {
    Unpaid,
    Pending,
    Paid,
}

impl MeltQuoteState {
    /// The payment may already have left the mint; proofs used for it must not be reclaimed.
    pub fn is_paid_or_pending(&self) -> bool {
        matches!(self, Self::Paid | Self::Pending)
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofState {
    Unspent,
    Pending,
    Spent,
}

#[derive(Deserialize, Debug)]
pub struct CashuErrorResponse {
    pub code: u64,
    pub detail: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct KeysResponse {
    pub keysets: Vec<MintKeys>,
}

impl KeysResponse {
    pub fn new(keyset: MintKeys) -> Self {
        Self {
            keysets: vec![keyset],
        }
    }
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MintInfoResponse {
    pub name: Option<String>,
    pub pubkey: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub motd: Option<String>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PostMintQuoteBolt11Request {
    pub amount: u64,
    pub unit: CurrencyUnit,
    pub description: Option<String>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PostMintQuoteBolt11Response {
    pub quote: String,
    #[serde(rename = "request")]
    pub payment_request: String,
    pub state: MintQuoteState,
    pub expiry: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PostMintBolt11Request {
    pub quote: String,
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PostMintBolt11Response {
    pub signatures: Vec<BlindedSignature>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PostMeltQuoteBolt11Request {
    /// payment request
    pub request: String,
    pub unit: CurrencyUnit,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PostMeltQuoteBolt11Response {
    pub quote: String,
    pub amount: u64,
    pub fee_reserve: u64,
    pub state: MeltQuoteState,
    pub expiry: Option<u64>,
    pub payment_preimage: Option<String>,
    pub change: Option<Vec<BlindedSignature>>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PostMeltBolt11Request {
    pub quote: String,
    pub inputs: Proofs,
    pub outputs: Option<Vec<BlindedMessage>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostSwapRequest {
    pub inputs: Proofs,
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PostSwapResponse {
    pub signatures: Vec<BlindedSignature>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostCheckStateRequest {
    #[serde(rename = "Ys")]
    pub ys: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofStateEntry {
    #[serde(rename = "Y")]
    pub y: String,
    pub state: ProofState,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PostCheckStateResponse {
    pub states: Vec<ProofStateEntry>,
}
