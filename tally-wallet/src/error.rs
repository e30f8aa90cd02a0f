use lightning_invoice::ParseOrSemanticError;
use tally_core::proof::Proofs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyWalletError {
    #[error("SerdeJsonError - {0}")]
    Json(#[from] serde_json::Error),

    #[error("ReqwestError - {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("InvalidHeaderValueError - {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("{0}")]
    MintError(String),

    #[error("Quote not paid yet: {0}")]
    QuoteNotPaid(String),

    #[error("UnexpectedResponse - {0}")]
    UnexpectedResponse(String),

    #[error("TallyCoreError - {0}")]
    TallyCore(#[from] tally_core::error::TallyCoreError),

    #[error("DB Error {0}")]
    Db(#[from] sqlx::Error),

    #[error("Migrate Error {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Proofs worth {available} sats do not cover {required} sats")]
    InsufficientProofs { available: u64, required: u64 },

    #[error("Invoice already paid or pending.")]
    PaymentAmbiguous,

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Failed to decode payment request {0} - Error {1}")]
    DecodeInvoice(String, ParseOrSemanticError),

    #[error("Invalid invoice {0}")]
    InvalidInvoice(String),

    #[error("URLParseError - {0}")]
    Url(#[from] url::ParseError),

    #[error("Wallet builder is missing {0}")]
    IncompleteBuilder(&'static str),

    #[error("Mint {0} still holds {1} sats")]
    MintHasBalance(String, u64),

    #[error("No mint selected. Add a mint first.")]
    NoMintSelected,

    #[error("Mint {0} has no active sat keyset")]
    NoActiveKeyset(String),

    #[error("Mint signed {signed} of {requested} sats of a swap")]
    SwapMismatch {
        requested: u64,
        signed: u64,
        /// proofs of the outputs the mint did sign as requested
        recovered: Proofs,
    },

    #[error("Counter out of range - {0}")]
    CounterOverflow(#[from] std::num::TryFromIntError),

    #[error("Bip32Error {0}")]
    Bip32(#[from] bip32::Error),

    #[error("Bip39Error {0}")]
    Bip39(#[from] bip39::Error),

    #[error("Secp256k1 {0}")]
    Secp256k1(#[from] secp256k1::Error),

    #[error("Seed not found. Initialize the wallet first.")]
    SeedNotFound,

    #[error("Found multiple seeds in the database. This is not supported.")]
    MultipleSeeds,

    #[error("IoError - {0}")]
    Io(#[from] std::io::Error),

    #[error("Not valid hex string")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid Keyset-ID")]
    Slice(#[from] std::array::TryFromSliceError),
}
