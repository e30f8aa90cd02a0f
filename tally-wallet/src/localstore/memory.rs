use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tally_core::{
    proof::{Proof, Proofs},
    transaction::EcashTransaction,
};
use tokio::sync::Mutex;
use url::Url;

use crate::{error::TallyWalletError, quotes::PendingMintQuote};

use super::{LocalStore, WalletMint};

#[derive(Default, Debug)]
struct State {
    proofs: HashMap<Url, Vec<Proof>>,
    mints: Vec<WalletMint>,
    /// counters of removed mints
    retired_counters: HashMap<Url, u64>,
    seeds: Vec<String>,
    pending_quotes: Vec<PendingMintQuote>,
    transactions: Vec<EcashTransaction>,
}

impl State {
    fn mint_mut(&mut self, mint_url: &Url) -> &mut WalletMint {
        let pos = match self.mints.iter().position(|m| &m.mint_url == mint_url) {
            Some(pos) => pos,
            None => {
                let counter = self.retired_counters.remove(mint_url).unwrap_or_default();
                self.mints.push(WalletMint {
                    mint_url: mint_url.clone(),
                    selected: false,
                    counter,
                });
                self.mints.len() - 1
            }
        };
        &mut self.mints[pos]
    }
}

/// A `LocalStore` that lives only as long as the process. Clones share the same state.
#[derive(Default, Debug, Clone)]
pub struct MemoryLocalStore {
    state: Arc<Mutex<State>>,
}

#[async_trait(?Send)]
impl LocalStore for MemoryLocalStore {
    async fn add_proofs(&self, mint_url: &Url, proofs: &Proofs) -> Result<(), TallyWalletError> {
        let mut state = self.state.lock().await;
        let stored = state.proofs.entry(mint_url.clone()).or_default();
        for proof in proofs.iter() {
            if !stored.iter().any(|p| p.secret == proof.secret) {
                stored.push(proof.clone());
            }
        }
        Ok(())
    }

    async fn get_proofs(&self, mint_url: &Url) -> Result<Proofs, TallyWalletError> {
        let state = self.state.lock().await;
        Ok(state
            .proofs
            .get(mint_url)
            .cloned()
            .unwrap_or_default()
            .into())
    }

    async fn get_all_proofs(&self) -> Result<Vec<(Url, Proofs)>, TallyWalletError> {
        let state = self.state.lock().await;
        Ok(state
            .proofs
            .iter()
            .filter(|(_, proofs)| !proofs.is_empty())
            .map(|(url, proofs)| (url.clone(), proofs.clone().into()))
            .collect())
    }

    async fn delete_proofs(
        &self,
        mint_url: &Url,
        proofs: &Proofs,
    ) -> Result<(), TallyWalletError> {
        let secrets = proofs.secrets();
        if let Some(stored) = self.state.lock().await.proofs.get_mut(mint_url) {
            stored.retain(|p| !secrets.contains(p.secret.as_str()));
        }
        Ok(())
    }

    async fn add_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        self.state.lock().await.mint_mut(mint_url);
        Ok(())
    }

    async fn get_mints(&self) -> Result<Vec<WalletMint>, TallyWalletError> {
        Ok(self.state.lock().await.mints.clone())
    }

    async fn select_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        let mut state = self.state.lock().await;
        state.mint_mut(mint_url);
        for mint in state.mints.iter_mut() {
            mint.selected = &mint.mint_url == mint_url;
        }
        Ok(())
    }

    async fn get_selected_mint(&self) -> Result<Option<Url>, TallyWalletError> {
        let state = self.state.lock().await;
        Ok(state
            .mints
            .iter()
            .find(|m| m.selected)
            .map(|m| m.mint_url.clone()))
    }

    async fn remove_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        let mut state = self.state.lock().await;
        if let Some(pos) = state.mints.iter().position(|m| &m.mint_url == mint_url) {
            let mint = state.mints.remove(pos);
            state.retired_counters.insert(mint.mint_url, mint.counter);
        }
        Ok(())
    }

    async fn reserve_counter(&self, mint_url: &Url, count: u64) -> Result<u64, TallyWalletError> {
        let mut state = self.state.lock().await;
        let mint = state.mint_mut(mint_url);
        let start = mint.counter;
        mint.counter += count;
        Ok(start)
    }

    async fn get_counter(&self, mint_url: &Url) -> Result<u64, TallyWalletError> {
        let state = self.state.lock().await;
        Ok(state
            .mints
            .iter()
            .find(|m| &m.mint_url == mint_url)
            .map(|m| m.counter)
            .unwrap_or_default())
    }

    async fn add_seed(&self, seed_words: &str) -> Result<(), TallyWalletError> {
        self.state.lock().await.seeds.push(seed_words.to_owned());
        Ok(())
    }

    async fn get_seed(&self) -> Result<Option<String>, TallyWalletError> {
        let state = self.state.lock().await;
        match state.seeds.as_slice() {
            [] => Ok(None),
            [seed] => Ok(Some(seed.clone())),
            _ => Err(TallyWalletError::MultipleSeeds),
        }
    }

    async fn add_pending_quote(&self, quote: &PendingMintQuote) -> Result<(), TallyWalletError> {
        let mut state = self.state.lock().await;
        state
            .pending_quotes
            .retain(|q| !(q.quote_id == quote.quote_id && q.mint_url == quote.mint_url));
        state.pending_quotes.push(quote.clone());
        Ok(())
    }

    async fn get_pending_quotes(&self) -> Result<Vec<PendingMintQuote>, TallyWalletError> {
        Ok(self.state.lock().await.pending_quotes.clone())
    }

    async fn delete_pending_quote(
        &self,
        mint_url: &Url,
        quote_id: &str,
    ) -> Result<(), TallyWalletError> {
        self.state
            .lock()
            .await
            .pending_quotes
            .retain(|q| !(q.quote_id == quote_id && &q.mint_url == mint_url));
        Ok(())
    }

    async fn add_transactions(
        &self,
        transactions: &[EcashTransaction],
    ) -> Result<(), TallyWalletError> {
        let mut state = self.state.lock().await;
        for transaction in transactions {
            if !state.transactions.iter().any(|t| t.id == transaction.id) {
                state.transactions.push(transaction.clone());
            }
        }
        Ok(())
    }

    async fn get_transactions(
        &self,
        limit: u32,
    ) -> Result<Vec<EcashTransaction>, TallyWalletError> {
        let mut transactions = self.state.lock().await.transactions.clone();
        transactions.sort_by(|a, b| b.time.cmp(&a.time));
        transactions.truncate(limit as usize);
        Ok(transactions)
    }
}
