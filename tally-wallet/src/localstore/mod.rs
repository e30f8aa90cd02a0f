use async_trait::async_trait;
use tally_core::{proof::Proofs, transaction::EcashTransaction};
use url::Url;

use crate::{error::TallyWalletError, quotes::PendingMintQuote};

pub mod memory;
pub mod sqlite;

/// A mint the wallet knows about, with its NUT-13 derivation counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletMint {
    pub mint_url: Url,
    pub selected: bool,
    pub counter: u64,
}

/// Persistence of proofs, mints, counters, the seed, tracked mint quotes and transactions.
///
/// Every method is atomic on its own. Proofs are keyed by secret and transactions by id,
/// so adding the same entry twice has no effect.
#[async_trait(?Send)]
pub trait LocalStore {
    async fn add_proofs(&self, mint_url: &Url, proofs: &Proofs) -> Result<(), TallyWalletError>;

    async fn get_proofs(&self, mint_url: &Url) -> Result<Proofs, TallyWalletError>;

    async fn get_all_proofs(&self) -> Result<Vec<(Url, Proofs)>, TallyWalletError>;

    async fn delete_proofs(&self, mint_url: &Url, proofs: &Proofs)
        -> Result<(), TallyWalletError>;

    async fn add_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError>;

    async fn get_mints(&self) -> Result<Vec<WalletMint>, TallyWalletError>;

    /// Marks `mint_url` as the only selected mint, adding it if unknown.
    async fn select_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError>;

    async fn get_selected_mint(&self) -> Result<Option<Url>, TallyWalletError>;

    /// Hides `mint_url` from the mint list. Its counter is kept and used again if the mint is re-added.
    async fn remove_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError>;

    /// Advances the counter of `mint_url` by `count` in a single step and returns the first
    /// reserved value. The range `start..start + count` belongs to the caller alone.
    async fn reserve_counter(&self, mint_url: &Url, count: u64) -> Result<u64, TallyWalletError>;

    async fn get_counter(&self, mint_url: &Url) -> Result<u64, TallyWalletError>;

    async fn add_seed(&self, seed_words: &str) -> Result<(), TallyWalletError>;

    async fn get_seed(&self) -> Result<Option<String>, TallyWalletError>;

    async fn add_pending_quote(&self, quote: &PendingMintQuote) -> Result<(), TallyWalletError>;

    async fn get_pending_quotes(&self) -> Result<Vec<PendingMintQuote>, TallyWalletError>;

    async fn delete_pending_quote(
        &self,
        mint_url: &Url,
        quote_id: &str,
    ) -> Result<(), TallyWalletError>;

    async fn add_transactions(
        &self,
        transactions: &[EcashTransaction],
    ) -> Result<(), TallyWalletError>;

    /// Newest first.
    async fn get_transactions(&self, limit: u32)
        -> Result<Vec<EcashTransaction>, TallyWalletError>;
}
