//! eCash operations of the wallet: deposits (mint), payments (melt) and reconciliation.
//!
//! Proofs are bearer tokens, so every operation orders its store writes such that a crash leaves
//! proofs stored twice rather than lost. `clean_ecash_wallet_state` removes what the mint reports
//! as spent.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use tally_core::{
    primitives::{
        MeltQuoteState, MintInfoResponse, MintQuoteState, PostMeltQuoteBolt11Response,
        PostMintQuoteBolt11Response, ProofState,
    },
    proof::Proofs,
    transaction::EcashTransaction,
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::{
    client::CashuClient,
    config::PollConfig,
    error::TallyWalletError,
    events::{EventBus, WalletEvent},
    localstore::{LocalStore, WalletMint},
    quotes::{ClaimReport, PendingMintQuote, QuoteAction},
    registry::WalletRegistry,
    router::SettledPayment,
    secret::DeterministicSecret,
    wallet::{invoice_amount, MintWallet, SendSplit},
};

/// Returned by `calculate_ecash_fees` when the mint can not be asked.
pub const FALLBACK_ECASH_FEE: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcashInvoice {
    pub mint_url: Url,
    pub amount: u64,
    pub quote: PostMintQuoteBolt11Response,
}

#[derive(Debug, Clone)]
pub struct MintedEcash {
    pub mint_url: Url,
    pub quote_id: String,
    pub proofs: Proofs,
    pub transaction: EcashTransaction,
}

/// A melt quote together with the stored proofs picked to pay it.
#[derive(Debug, Clone)]
pub struct MeltQuotePlan {
    pub mint_url: Url,
    pub quote: PostMeltQuoteBolt11Response,
    pub proofs_to_use: Proofs,
}

/// Progress of one `pay_ln_invoice_from_ecash` call.
///
/// `FailedAmbiguous` means the mint may have paid the invoice; proofs are left as they are.
/// `FailedRecoverable` restores every proof the attempt took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Preparing,
    ProofsReserved,
    Melting,
    Settled,
    FailedRecoverable,
    FailedAmbiguous,
}

#[derive(Default)]
struct MintBatch {
    proofs: Proofs,
    transactions: Vec<EcashTransaction>,
    quotes: Vec<(String, u64)>,
}

pub struct EcashService<C: CashuClient + Clone, L: LocalStore + Clone> {
    registry: WalletRegistry<C, L>,
    localstore: L,
    events: EventBus,
    poll: PollConfig,
}

impl<C: CashuClient + Clone, L: LocalStore + Clone> EcashService<C, L> {
    pub fn new(client: C, localstore: L) -> Self {
        Self {
            registry: WalletRegistry::new(client, localstore.clone()),
            localstore,
            events: EventBus::default(),
            poll: PollConfig::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &WalletRegistry<C, L> {
        &self.registry
    }

    fn log_state(quote: &str, state: PaymentState) {
        debug!("melt {quote}: {state:?}");
    }

    /// Creates seed words on first start. Returns true if a new seed was stored.
    pub async fn ensure_seed(&self) -> Result<bool, TallyWalletError> {
        if self.localstore.get_seed().await?.is_some() {
            return Ok(false);
        }
        let seed_words = DeterministicSecret::generate_random_seed_words()?;
        self.localstore.add_seed(&seed_words).await?;
        info!("created new wallet seed");
        Ok(true)
    }

    pub async fn init_ecash_wallet(&self, mint_url: Option<&Url>) -> Option<Arc<MintWallet<C, L>>> {
        self.registry.init_wallet(mint_url).await
    }

    /// Loads the mint and adds it to the known mints. The first mint added becomes the selected one.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn add_mint(&self, mint_url: &Url) -> Result<MintInfoResponse, TallyWalletError> {
        let wallet = self.registry.try_init_wallet(Some(mint_url)).await?;
        self.localstore.add_mint(mint_url).await?;
        if self.localstore.get_selected_mint().await?.is_none() {
            self.localstore.select_mint(mint_url).await?;
        }
        Ok(wallet.info().clone())
    }

    /// Removes a mint without proofs from the wallet.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn remove_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        let balance = self.localstore.get_proofs(mint_url).await?.total_amount();
        if balance > 0 {
            return Err(TallyWalletError::MintHasBalance(
                mint_url.to_string(),
                balance,
            ));
        }
        self.localstore.remove_mint(mint_url).await?;
        self.registry.forget(mint_url).await;
        Ok(())
    }

    pub async fn select_mint(&self, mint_url: &Url) -> Result<(), TallyWalletError> {
        self.localstore.select_mint(mint_url).await
    }

    /// Balance of `mint_url`, or of the selected mint.
    pub async fn get_balance(&self, mint_url: Option<&Url>) -> Result<u64, TallyWalletError> {
        let mint_url = match mint_url {
            Some(url) => url.clone(),
            None => self
                .localstore
                .get_selected_mint()
                .await?
                .ok_or(TallyWalletError::NoMintSelected)?,
        };
        Ok(self.localstore.get_proofs(&mint_url).await?.total_amount())
    }

    pub async fn get_total_balance(&self) -> Result<u64, TallyWalletError> {
        Ok(self
            .localstore
            .get_all_proofs()
            .await?
            .iter()
            .map(|(_, proofs)| proofs.total_amount())
            .sum())
    }

    pub async fn get_mints_with_balance(&self) -> Result<Vec<(WalletMint, u64)>, TallyWalletError> {
        let mut result = vec![];
        for mint in self.localstore.get_mints().await? {
            let balance = self.localstore.get_proofs(&mint.mint_url).await?.total_amount();
            result.push((mint, balance));
        }
        Ok(result)
    }

    pub async fn get_transactions(
        &self,
        limit: u32,
    ) -> Result<Vec<EcashTransaction>, TallyWalletError> {
        self.localstore.get_transactions(limit).await
    }

    /// Input fee for spending `proofs` at `mint_url`. Falls back to `FALLBACK_ECASH_FEE` on any error.
    pub async fn calculate_ecash_fees(&self, mint_url: &Url, proofs: &Proofs) -> u64 {
        let fee = match self.registry.try_init_wallet(Some(mint_url)).await {
            Ok(wallet) => wallet.fee_for(proofs),
            Err(err) => Err(err),
        };
        fee.unwrap_or_else(|err| {
            warn!("fee estimate for {mint_url} failed, using fallback: {err}");
            FALLBACK_ECASH_FEE
        })
    }

    /// Requests a deposit invoice and starts tracking its quote right away.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn get_ecash_invoice(
        &self,
        amount: u64,
        mint_url: Option<&Url>,
        description: &str,
    ) -> Result<EcashInvoice, TallyWalletError> {
        let wallet = self.registry.try_init_wallet(mint_url).await?;
        let description = (!description.is_empty()).then(|| description.to_owned());
        let quote = wallet.create_mint_quote(amount, description.clone()).await?;

        let pending = PendingMintQuote::new(
            wallet.mint_url().clone(),
            amount,
            description.unwrap_or_default(),
            &quote,
        );
        self.localstore.add_pending_quote(&pending).await?;

        Ok(EcashInvoice {
            mint_url: wallet.mint_url().clone(),
            amount,
            quote,
        })
    }

    /// State of a deposit quote, `None` if the mint could not be asked.
    pub async fn check_mint_quote(&self, quote: &str, mint_url: &Url) -> Option<MintQuoteState> {
        let wallet = self.registry.init_wallet(Some(mint_url)).await?;
        match wallet.check_mint_quote(quote).await {
            Ok(response) => Some(response.state),
            Err(err) => {
                warn!("could not check mint quote {quote}: {err}");
                None
            }
        }
    }

    /// Amount and description of a deposit: from the tracked quote, or decoded from the invoice.
    async fn deposit_details(
        &self,
        quote_id: &str,
        invoice: &str,
        mint_url: &Url,
    ) -> Result<(u64, String), TallyWalletError> {
        let tracked = self
            .localstore
            .get_pending_quotes()
            .await?
            .into_iter()
            .find(|q| q.quote_id == quote_id && &q.mint_url == mint_url);
        match tracked {
            Some(quote) => Ok((quote.amount, quote.description)),
            None => Ok((invoice_amount(invoice)?, String::new())),
        }
    }

    /// Claims a paid deposit quote into proofs and records the transaction.
    ///
    /// Fails with `QuoteNotPaid` while the invoice is unpaid.
    #[instrument(level = "debug", skip(self, invoice), err)]
    pub async fn mint_ecash(
        &self,
        quote_id: &str,
        invoice: &str,
        mint_url: &Url,
    ) -> Result<MintedEcash, TallyWalletError> {
        let wallet = self.registry.try_init_wallet(Some(mint_url)).await?;
        let (amount, description) = self.deposit_details(quote_id, invoice, mint_url).await?;

        let proofs = wallet.mint_proofs(amount, quote_id).await?;
        let transaction = EcashTransaction::received(
            quote_id,
            mint_url.clone(),
            proofs.total_amount(),
            description,
            Some(invoice.to_owned()),
        );

        self.localstore.add_proofs(mint_url, &proofs).await?;
        self.localstore
            .add_transactions(std::slice::from_ref(&transaction))
            .await?;
        self.localstore
            .delete_pending_quote(mint_url, quote_id)
            .await?;

        self.events.publish(WalletEvent::QuoteClaimed {
            mint_url: mint_url.clone(),
            quote_id: quote_id.to_owned(),
            amount: proofs.total_amount(),
        });

        Ok(MintedEcash {
            mint_url: mint_url.clone(),
            quote_id: quote_id.to_owned(),
            proofs,
            transaction,
        })
    }

    /// Polls a deposit quote until it is paid and mints it.
    ///
    /// Returns `None` if the quote was not paid within the configured attempts; it stays tracked
    /// for `claim_unclaimed_ecash_quotes`.
    pub async fn wait_for_mint_quote(
        &self,
        invoice: &EcashInvoice,
    ) -> Result<Option<MintedEcash>, TallyWalletError> {
        let quote_id = &invoice.quote.quote;
        for attempt in 1..=self.poll.attempts {
            match self.check_mint_quote(quote_id, &invoice.mint_url).await {
                Some(MintQuoteState::Paid) => {
                    match self
                        .mint_ecash(quote_id, &invoice.quote.payment_request, &invoice.mint_url)
                        .await
                    {
                        Ok(minted) => return Ok(Some(minted)),
                        Err(TallyWalletError::QuoteNotPaid(_)) => {}
                        Err(err) => return Err(err),
                    }
                }
                Some(MintQuoteState::Issued) => return Ok(None),
                _ => debug!("quote {quote_id} not paid yet, attempt {attempt}"),
            }
            if attempt < self.poll.attempts {
                tokio::time::sleep(self.poll.interval()).await;
            }
        }
        Ok(None)
    }

    /// Picks stored proofs of the selected mint covering amount, fee reserve and input fee of a
    /// melt quote for `bolt11`. Largest proofs are taken first.
    #[instrument(level = "debug", skip(self, bolt11), err)]
    pub async fn get_melt_quote(&self, bolt11: &str) -> Result<MeltQuotePlan, TallyWalletError> {
        let wallet = self.registry.try_init_wallet(None).await?;
        let mint_url = wallet.mint_url().clone();
        let proofs = self.localstore.get_proofs(&mint_url).await?;
        let quote = wallet.melt_quote(bolt11).await?;

        let required = wallet.amount_with_input_fee(quote.amount + quote.fee_reserve);
        let mut target = required;
        let proofs_to_use = loop {
            let selected = proofs.proofs_for_amount(target).map_err(|_| {
                TallyWalletError::InsufficientProofs {
                    available: proofs.total_amount(),
                    required: target,
                }
            })?;
            let input_fee = wallet.fee_for(&selected)?;
            if selected.total_amount() >= required + input_fee {
                break selected;
            }
            target = required + input_fee;
        };

        Ok(MeltQuotePlan {
            mint_url,
            quote,
            proofs_to_use,
        })
    }

    /// Pays the invoice of `plan.quote` with the planned proofs.
    ///
    /// On failure the melt quote is checked again. If the mint reports it paid or pending the
    /// payment may have gone through: `PaymentAmbiguous` is returned and no proof is restored.
    /// Otherwise all proofs of the attempt are put back and the counter moves past the attempt.
    #[instrument(
        level = "debug",
        skip(self, plan, invoice),
        fields(mint_url = %plan.mint_url, quote = %plan.quote.quote),
        err
    )]
    pub async fn pay_ln_invoice_from_ecash(
        &self,
        plan: &MeltQuotePlan,
        invoice: &str,
        description: &str,
    ) -> Result<SettledPayment, TallyWalletError> {
        let quote = &plan.quote;
        Self::log_state(&quote.quote, PaymentState::Preparing);

        let wallet = self.registry.try_init_wallet(Some(&plan.mint_url)).await?;
        let required = wallet.amount_with_input_fee(quote.amount + quote.fee_reserve);
        let available = plan.proofs_to_use.total_amount();
        if available < required {
            return Err(TallyWalletError::InsufficientProofs {
                available,
                required,
            });
        }

        let split = match wallet.split_for_send(&plan.proofs_to_use, required).await {
            Ok(split) => split,
            Err(TallyWalletError::SwapMismatch {
                requested,
                signed,
                recovered,
            }) => {
                return Err(self
                    .keep_swap_outputs(plan, requested, signed, recovered)
                    .await)
            }
            Err(err) => return Err(self.fail_attempt(&wallet, plan, None, err).await),
        };

        match self
            .melt_split(&wallet, plan, &split, invoice, description)
            .await
        {
            Ok(payment) => {
                Self::log_state(&quote.quote, PaymentState::Settled);
                Ok(payment)
            }
            Err(err) => Err(self.fail_attempt(&wallet, plan, Some(&split), err).await),
        }
    }

    async fn melt_split(
        &self,
        wallet: &MintWallet<C, L>,
        plan: &MeltQuotePlan,
        split: &SendSplit,
        invoice: &str,
        description: &str,
    ) -> Result<SettledPayment, TallyWalletError> {
        let quote = &plan.quote;
        let mint_url = &plan.mint_url;

        if split.swapped {
            // the swap spent the inputs, their replacements are stored before the inputs go
            let mut replacements = split.send.clone();
            replacements.extend(split.keep.clone());
            self.localstore.add_proofs(mint_url, &replacements).await?;
            self.localstore
                .delete_proofs(mint_url, &plan.proofs_to_use)
                .await?;
        }
        Self::log_state(&quote.quote, PaymentState::ProofsReserved);

        Self::log_state(&quote.quote, PaymentState::Melting);
        let melt = wallet.melt_proofs(quote, &split.send).await?;
        if melt.state != MeltQuoteState::Paid {
            return Err(TallyWalletError::PaymentFailed(format!(
                "melt quote {} is {:?}",
                quote.quote, melt.state
            )));
        }

        self.localstore.add_proofs(mint_url, &melt.change).await?;
        self.localstore.delete_proofs(mint_url, &split.send).await?;

        let fee = plan.proofs_to_use.total_amount().saturating_sub(
            split.keep.total_amount() + melt.change.total_amount() + quote.amount,
        );
        let transaction = EcashTransaction::sent(
            mint_url.clone(),
            quote.amount,
            fee,
            description,
            melt.preimage.clone(),
            Some(invoice.to_owned()),
        );
        self.localstore.add_transactions(&[transaction]).await?;

        self.events.publish(WalletEvent::PaymentSettled {
            mint_url: mint_url.clone(),
            amount: quote.amount,
            fee,
        });

        Ok(SettledPayment {
            amount: quote.amount,
            fee,
            preimage: melt.preimage,
            reference: Some(quote.quote.clone()),
        })
    }

    /// The mint spent the inputs of a swap but did not sign every output. Whatever it signed
    /// replaces the inputs.
    async fn keep_swap_outputs(
        &self,
        plan: &MeltQuotePlan,
        requested: u64,
        signed: u64,
        recovered: Proofs,
    ) -> TallyWalletError {
        let quote_id = &plan.quote.quote;
        error!("swap for melt {quote_id} signed {signed} of {requested} sats");
        Self::log_state(quote_id, PaymentState::FailedRecoverable);

        if let Err(err) = self.localstore.add_proofs(&plan.mint_url, &recovered).await {
            error!("could not store swapped proofs of {quote_id}: {err}");
        }
        if let Err(err) = self
            .localstore
            .delete_proofs(&plan.mint_url, &plan.proofs_to_use)
            .await
        {
            error!("could not remove swapped inputs of {quote_id}: {err}");
        }
        TallyWalletError::SwapMismatch {
            requested,
            signed,
            recovered,
        }
    }

    async fn fail_attempt(
        &self,
        wallet: &MintWallet<C, L>,
        plan: &MeltQuotePlan,
        split: Option<&SendSplit>,
        err: TallyWalletError,
    ) -> TallyWalletError {
        let quote_id = &plan.quote.quote;
        warn!("melt of quote {quote_id} failed: {err}");

        match wallet.check_melt_quote(quote_id).await {
            Ok(quote) if quote.state.is_paid_or_pending() => {
                Self::log_state(quote_id, PaymentState::FailedAmbiguous);
                return TallyWalletError::PaymentAmbiguous;
            }
            Ok(_) => {}
            Err(check_err) => warn!("could not re-check melt quote {quote_id}: {check_err}"),
        }

        Self::log_state(quote_id, PaymentState::FailedRecoverable);
        let restore = match split {
            Some(split) if split.swapped => {
                let mut proofs = split.send.clone();
                proofs.extend(split.keep.clone());
                proofs
            }
            _ => plan.proofs_to_use.clone(),
        };
        if let Err(restore_err) = self.localstore.add_proofs(&plan.mint_url, &restore).await {
            error!("could not restore proofs after failed melt {quote_id}: {restore_err}");
        }
        if split.is_some_and(|s| s.swapped) {
            if let Err(delete_err) = self
                .localstore
                .delete_proofs(&plan.mint_url, &plan.proofs_to_use)
                .await
            {
                error!("could not remove swapped inputs of {quote_id}: {delete_err}");
            }
        }
        if let Err(counter_err) = self.localstore.reserve_counter(&plan.mint_url, 1).await {
            error!("could not advance counter after failed melt {quote_id}: {counter_err}");
        }
        err
    }

    /// Removes the proofs the mint reports as spent. Returns the removed proofs.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn clean_ecash_wallet_state(
        &self,
        mint_url: Option<&Url>,
    ) -> Result<Proofs, TallyWalletError> {
        let wallet = self.registry.try_init_wallet(mint_url).await?;
        let mint_url = wallet.mint_url().clone();
        let proofs = self.localstore.get_proofs(&mint_url).await?;

        let spent = wallet
            .check_proofs_states(&proofs)
            .await?
            .into_iter()
            .filter(|(_, state)| *state == ProofState::Spent)
            .map(|(proof, _)| proof)
            .collect::<Proofs>();

        if !spent.is_empty() {
            self.localstore.delete_proofs(&mint_url, &spent).await?;
            info!(
                "removed {} spent proofs worth {} sats from {mint_url}",
                spent.len(),
                spent.total_amount()
            );
            self.events.publish(WalletEvent::ProofsCleaned {
                mint_url,
                count: spent.len(),
                amount: spent.total_amount(),
            });
        }
        Ok(spent)
    }

    /// Reconciles every tracked deposit quote: paid quotes are minted, issued or expired ones are
    /// dropped, everything else stays tracked. A failing quote never stops the pass.
    pub async fn claim_unclaimed_ecash_quotes(&self) -> ClaimReport {
        let mut report = ClaimReport::default();
        let pending = match self.localstore.get_pending_quotes().await {
            Ok(pending) => pending,
            Err(err) => {
                error!("could not load pending mint quotes: {err}");
                return report;
            }
        };

        let now = Utc::now();
        let mut batches: BTreeMap<Url, MintBatch> = BTreeMap::new();

        for quote in pending {
            let Some(wallet) = self.registry.init_wallet(Some(&quote.mint_url)).await else {
                report.kept.push(quote.quote_id);
                continue;
            };

            let state = match wallet.check_mint_quote(&quote.quote_id).await {
                Ok(response) => response.state,
                Err(err) => {
                    warn!("could not check quote {}: {err}", quote.quote_id);
                    report.kept.push(quote.quote_id);
                    continue;
                }
            };

            match quote.next_action(state, now) {
                QuoteAction::Keep => report.kept.push(quote.quote_id),
                QuoteAction::Drop => {
                    match self
                        .localstore
                        .delete_pending_quote(&quote.mint_url, &quote.quote_id)
                        .await
                    {
                        Ok(()) => report.dropped.push(quote.quote_id),
                        Err(err) => {
                            warn!("could not drop quote {}: {err}", quote.quote_id);
                            report.kept.push(quote.quote_id);
                        }
                    }
                }
                QuoteAction::Claim => match wallet
                    .mint_proofs(quote.amount, &quote.quote_id)
                    .await
                {
                    Ok(proofs) => {
                        let batch = batches.entry(quote.mint_url.clone()).or_default();
                        batch.transactions.push(EcashTransaction::received(
                            &quote.quote_id,
                            quote.mint_url.clone(),
                            proofs.total_amount(),
                            quote.description.clone(),
                            Some(quote.request.clone()),
                        ));
                        batch.quotes.push((quote.quote_id, proofs.total_amount()));
                        batch.proofs.extend(proofs);
                    }
                    Err(err) => {
                        warn!("could not claim quote {}: {err}", quote.quote_id);
                        report.kept.push(quote.quote_id);
                    }
                },
            }
        }

        for (mint_url, batch) in batches {
            if let Err(err) = self.persist_batch(&mint_url, &batch).await {
                error!("could not store claimed proofs of {mint_url}: {err}");
                report
                    .kept
                    .extend(batch.quotes.into_iter().map(|(quote_id, _)| quote_id));
                continue;
            }
            for (quote_id, amount) in batch.quotes {
                self.events.publish(WalletEvent::QuoteClaimed {
                    mint_url: mint_url.clone(),
                    quote_id: quote_id.clone(),
                    amount,
                });
                report.claimed.push(quote_id);
            }
        }

        info!(
            "claimed {} quotes, dropped {}, kept {}",
            report.claimed.len(),
            report.dropped.len(),
            report.kept.len()
        );
        report
    }

    async fn persist_batch(
        &self,
        mint_url: &Url,
        batch: &MintBatch,
    ) -> Result<(), TallyWalletError> {
        self.localstore.add_proofs(mint_url, &batch.proofs).await?;
        self.localstore.add_transactions(&batch.transactions).await?;
        for (quote_id, _) in &batch.quotes {
            self.localstore.delete_pending_quote(mint_url, quote_id).await?;
        }
        Ok(())
    }

    /// Drops cached wallets, e.g. on logout.
    pub async fn teardown(&self) {
        self.registry.teardown().await;
    }
}
