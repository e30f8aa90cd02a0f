//! Ledger entries for completed eCash operations.
//!
//! An `EcashTransaction` is written once a mint (received) or melt (sent) has settled and is never changed afterwards.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use url::Url;
use uuid::Uuid;

use crate::error::TallyCoreError;

pub const ECASH_TRANSACTION_KIND: &str = "ecash";

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Sent,
    Received,
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Received => write!(f, "received"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = TallyCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            other => Err(TallyCoreError::InvalidPaymentType(other.to_owned())),
        }
    }
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct EcashTransaction {
    pub id: String,
    pub mint_url: Url,
    pub time: DateTime<Utc>,
    pub description: String,
    pub amount: u64,
    pub payment_type: PaymentType,
    pub fee: u64,
    pub preimage: Option<String>,
    pub invoice: Option<String>,
}

impl EcashTransaction {
    /// A deposit that was minted into proofs. The quote id doubles as transaction id, so recording the same claim twice has no effect.
    pub fn received(
        quote_id: &str,
        mint_url: Url,
        amount: u64,
        description: impl Into<String>,
        invoice: Option<String>,
    ) -> Self {
        Self {
            id: quote_id.to_owned(),
            mint_url,
            time: Utc::now(),
            description: description.into(),
            amount,
            payment_type: PaymentType::Received,
            fee: 0,
            preimage: None,
            invoice,
        }
    }

    pub fn sent(
        mint_url: Url,
        amount: u64,
        fee: u64,
        description: impl Into<String>,
        preimage: Option<String>,
        invoice: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mint_url,
            time: Utc::now(),
            description: description.into(),
            amount,
            payment_type: PaymentType::Sent,
            fee,
            preimage,
            invoice,
        }
    }

    pub fn kind(&self) -> &'static str {
        ECASH_TRANSACTION_KIND
    }
}
