use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyCoreError {
    #[error("Secp256k1Error {0}")]
    Secp256k1Error(#[from] secp256k1::Error),

    #[error("SerdeJsonError {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("HexError {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("No valid point found on the curve")]
    NoValidPoint,

    #[error("Invalid Keysetid")]
    InvalidKeysetid,

    #[error("No key for amount {0} in keyset")]
    AmountKeyNotFound(u64),

    #[error("Not enough tokens")]
    NotEnoughTokens,

    #[error("Invalid payment type {0}")]
    InvalidPaymentType(String),
}
