//! One `MintWallet` per mint url, built on first use and kept until `teardown`.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use url::Url;

use crate::{
    client::CashuClient,
    error::TallyWalletError,
    localstore::LocalStore,
    wallet::MintWallet,
};

pub struct WalletRegistry<C: CashuClient + Clone, L: LocalStore + Clone> {
    client: C,
    localstore: L,
    wallets: Mutex<HashMap<Url, WalletCell<C, L>>>,
}

/// Filled once the wallet of a mint was built. A failed build leaves it empty for the next caller.
type WalletCell<C, L> = Arc<OnceCell<Arc<MintWallet<C, L>>>>;

impl<C: CashuClient + Clone, L: LocalStore + Clone> WalletRegistry<C, L> {
    pub fn new(client: C, localstore: L) -> Self {
        Self {
            client,
            localstore,
            wallets: Mutex::new(HashMap::new()),
        }
    }

    pub fn localstore(&self) -> &L {
        &self.localstore
    }

    /// The wallet for `mint_url`, or for the selected mint if none is given.
    ///
    /// Returns `None` if no mint can be resolved or the mint could not be loaded. Callers treat
    /// that as "eCash unavailable" for the current operation.
    pub async fn init_wallet(&self, mint_url: Option<&Url>) -> Option<Arc<MintWallet<C, L>>> {
        match self.try_init_wallet(mint_url).await {
            Ok(wallet) => Some(wallet),
            Err(err) => {
                warn!("could not initialize ecash wallet: {err}");
                None
            }
        }
    }

    pub async fn try_init_wallet(
        &self,
        mint_url: Option<&Url>,
    ) -> Result<Arc<MintWallet<C, L>>, TallyWalletError> {
        let mint_url = match mint_url {
            Some(url) => url.clone(),
            None => self
                .localstore
                .get_selected_mint()
                .await?
                .ok_or(TallyWalletError::NoMintSelected)?,
        };

        // the map is only locked for the lookup, a slow mint must not block the others
        let cell = self
            .wallets
            .lock()
            .await
            .entry(mint_url.clone())
            .or_default()
            .clone();
        let wallet = cell
            .get_or_try_init(|| async {
                let wallet = MintWallet::builder()
                    .with_client(self.client.clone())
                    .with_localstore(self.localstore.clone())
                    .with_mint_url(mint_url.clone())
                    .build()
                    .await?;
                debug!("cached wallet for {mint_url}");
                Ok::<_, TallyWalletError>(Arc::new(wallet))
            })
            .await?;
        Ok(wallet.clone())
    }

    pub async fn cached_mints(&self) -> Vec<Url> {
        let mut mints = self
            .wallets
            .lock()
            .await
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(mint_url, _)| mint_url.clone())
            .collect::<Vec<_>>();
        mints.sort();
        mints
    }

    pub async fn forget(&self, mint_url: &Url) {
        self.wallets.lock().await.remove(mint_url);
    }

    /// Drops every cached wallet, e.g. on logout.
    pub async fn teardown(&self) {
        self.wallets.lock().await.clear();
    }
}
