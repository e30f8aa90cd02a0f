use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use tally_core::{
    amount::Amount,
    blind::{BlindedMessage, BlindedSignature},
    dhke::{proof_y, Dhke},
    keyset::{KeysetInfo, Keysets, MintKeyset},
    primitives::{
        CurrencyUnit, KeysResponse, MeltQuoteState, MintInfoResponse, MintQuoteState,
        PostCheckStateResponse, PostMeltQuoteBolt11Response, PostMintBolt11Response,
        PostMintQuoteBolt11Response, PostSwapResponse, ProofState, ProofStateEntry,
    },
    proof::Proofs,
};
use tally_wallet::{client::CashuClient, error::TallyWalletError};
use url::Url;

/// 100 sats
pub const INVOICE: &str = "lnbc1u1p53kkd9pp5ve8pd9zr60yjyvs6tn77mndavzrl5lwd2gx5hk934f6q8jwguzgsdqqcqzzsxqyz5vqrzjqvueefmrckfdwyyu39m0lf24sqzcr9vcrmxrvgfn6empxz7phrjxvrttncqq0lcqqyqqqqlgqqqqqqgq2qsp5482y73fxmlvg4t66nupdaph93h7dcmfsg2ud72wajf0cpk3a96rq9qxpqysgqujexd0l89u5dutn8hxnsec0c7jrt8wz0z67rut0eah0g7p6zhycn2vff0ts5vwn2h93kx8zzqy3tzu4gfhkya2zpdmqelg0ceqnjztcqma65pr";

const PREIMAGE: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const SEED_WORDS: &str =
    "half depart obvious quality work element tank gorilla view sugar picture humble";

pub fn mint_url() -> Url {
    Url::parse("http://127.0.0.1:3338").expect("invalid url")
}

/// What the fake mint does with the next melt requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeltBehavior {
    /// pays the invoice, `fee_paid` of the fee reserve is used
    Pay { fee_paid: u64 },
    /// the lightning payment fails, inputs stay unspent
    Unpaid,
    /// the request fails on the way back; the quote ends up in the given state
    ErrorThen(MeltQuoteState),
}

struct MintQuote {
    amount: u64,
    state: MintQuoteState,
}

struct State {
    keyset_requests: usize,
    next_quote: u64,
    mint_quotes: HashMap<String, MintQuote>,
    melt_quotes: HashMap<String, PostMeltQuoteBolt11Response>,
    melt_amount: u64,
    fee_reserve: u64,
    melt_behavior: MeltBehavior,
    pending: HashMap<String, HashSet<String>>,
    spent: HashSet<String>,
    /// hex encoded `B_` of every output signed so far
    signed_outputs: HashSet<String>,
    /// keyset requests for this mint never complete
    stalled_mint: Option<Url>,
    /// swaps spend their inputs but leave out the last signature
    short_swaps: bool,
}

/// An in-process mint that signs with a real keyset and keeps track of spent proofs and signed
/// outputs. Clones share state.
#[derive(Clone)]
pub struct FakeMintClient {
    keyset: MintKeyset,
    input_fee_ppk: u64,
    state: Arc<Mutex<State>>,
}

impl FakeMintClient {
    pub fn new(input_fee_ppk: u64) -> Self {
        Self {
            keyset: MintKeyset::new("fakemintsecret", "").expect("invalid keyset"),
            input_fee_ppk,
            state: Arc::new(Mutex::new(State {
                keyset_requests: 0,
                next_quote: 0,
                mint_quotes: HashMap::new(),
                melt_quotes: HashMap::new(),
                melt_amount: 100,
                fee_reserve: 2,
                melt_behavior: MeltBehavior::Pay { fee_paid: 0 },
                pending: HashMap::new(),
                spent: HashSet::new(),
                signed_outputs: HashSet::new(),
                stalled_mint: None,
                short_swaps: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("poisoned")
    }

    pub fn set_melt(&self, amount: u64, fee_reserve: u64, behavior: MeltBehavior) {
        let mut state = self.state();
        state.melt_amount = amount;
        state.fee_reserve = fee_reserve;
        state.melt_behavior = behavior;
    }

    pub fn set_melt_behavior(&self, behavior: MeltBehavior) {
        self.state().melt_behavior = behavior;
    }

    pub fn set_mint_quote_state(&self, quote: &str, new_state: MintQuoteState) {
        if let Some(q) = self.state().mint_quotes.get_mut(quote) {
            q.state = new_state;
        }
    }

    pub fn pay_mint_quote(&self, quote: &str) {
        self.set_mint_quote_state(quote, MintQuoteState::Paid);
    }

    /// Completes a pending melt: the quote is paid and its inputs spent.
    pub fn settle_melt(&self, quote: &str) {
        let mut state = self.state();
        if let Some(ys) = state.pending.remove(quote) {
            state.spent.extend(ys);
        }
        if let Some(q) = state.melt_quotes.get_mut(quote) {
            q.state = MeltQuoteState::Paid;
        }
    }

    /// Marks proofs as spent, e.g. because they were sent somewhere else.
    pub fn spend(&self, proofs: &Proofs) {
        let ys = ys(proofs);
        self.state().spent.extend(ys);
    }

    pub fn stall(&self, mint_url: &Url) {
        self.state().stalled_mint = Some(mint_url.clone());
    }

    pub fn set_short_swaps(&self, short_swaps: bool) {
        self.state().short_swaps = short_swaps;
    }

    pub fn keyset_requests(&self) -> usize {
        self.state().keyset_requests
    }

    pub fn melt_quote_state(&self, quote: &str) -> Option<MeltQuoteState> {
        self.state().melt_quotes.get(quote).map(|q| q.state)
    }

    fn keysets(&self) -> Keysets {
        Keysets::new(vec![KeysetInfo {
            id: self.keyset.keyset_id.clone(),
            unit: CurrencyUnit::Sat,
            active: true,
            input_fee_ppk: self.input_fee_ppk,
        }])
    }

    fn next_quote(state: &mut State, prefix: &str) -> String {
        state.next_quote += 1;
        format!("{prefix}-{}", state.next_quote)
    }

    fn sign(
        &self,
        state: &mut State,
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindedSignature>, TallyWalletError> {
        let dhke = Dhke::new();
        let mut signatures = vec![];
        for output in outputs {
            if !state.signed_outputs.insert(output.b_.to_string()) {
                return Err(TallyWalletError::MintError(
                    "outputs have already been signed before".into(),
                ));
            }
            let key = self.keyset.private_keys.get(&output.amount).ok_or_else(|| {
                TallyWalletError::MintError(format!("no key for amount {}", output.amount))
            })?;
            signatures.push(BlindedSignature {
                amount: output.amount,
                c_: dhke.sign_blinded_message(output.b_, key)?,
                id: self.keyset.keyset_id.clone(),
            });
        }
        Ok(signatures)
    }

    fn check_unspent(state: &State, ys: &[String]) -> Result<(), TallyWalletError> {
        let pending = state.pending.values().flatten().collect::<HashSet<_>>();
        if ys.iter().any(|y| state.spent.contains(y) || pending.contains(y)) {
            return Err(TallyWalletError::MintError("Token already spent.".into()));
        }
        Ok(())
    }

    fn input_fee(&self, proofs: &Proofs) -> u64 {
        (proofs.len() as u64 * self.input_fee_ppk).div_ceil(1000)
    }
}

fn ys(proofs: &Proofs) -> Vec<String> {
    proofs
        .iter()
        .map(|p| proof_y(&p.secret).expect("invalid secret"))
        .collect()
}

#[async_trait(?Send)]
impl CashuClient for FakeMintClient {
    async fn get_keys(&self, _mint_url: &Url) -> Result<KeysResponse, TallyWalletError> {
        Ok(KeysResponse::new(self.keyset.mint_keys(CurrencyUnit::Sat)))
    }

    async fn get_keysets(&self, mint_url: &Url) -> Result<Keysets, TallyWalletError> {
        let stalled = {
            let mut state = self.state();
            state.keyset_requests += 1;
            state.stalled_mint.as_ref() == Some(mint_url)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(self.keysets())
    }

    async fn get_info(&self, _mint_url: &Url) -> Result<MintInfoResponse, TallyWalletError> {
        Ok(MintInfoResponse {
            name: Some("fake mint".into()),
            ..Default::default()
        })
    }

    async fn post_mint_quote_bolt11(
        &self,
        _mint_url: &Url,
        amount: u64,
        _unit: CurrencyUnit,
        _description: Option<String>,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        let mut state = self.state();
        let quote = Self::next_quote(&mut state, "mint");
        state.mint_quotes.insert(
            quote.clone(),
            MintQuote {
                amount,
                state: MintQuoteState::Unpaid,
            },
        );
        Ok(PostMintQuoteBolt11Response {
            quote,
            payment_request: INVOICE.to_owned(),
            state: MintQuoteState::Unpaid,
            expiry: None,
        })
    }

    async fn get_mint_quote_bolt11(
        &self,
        _mint_url: &Url,
        quote: String,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        let state = self.state();
        let q = state
            .mint_quotes
            .get(&quote)
            .ok_or_else(|| TallyWalletError::MintError("quote not found".into()))?;
        Ok(PostMintQuoteBolt11Response {
            quote,
            payment_request: INVOICE.to_owned(),
            state: q.state,
            expiry: None,
        })
    }

    async fn post_mint_bolt11(
        &self,
        _mint_url: &Url,
        quote: String,
        blinded_messages: Vec<BlindedMessage>,
    ) -> Result<PostMintBolt11Response, TallyWalletError> {
        let mut state = self.state();
        let (amount, quote_state) = state
            .mint_quotes
            .get(&quote)
            .map(|q| (q.amount, q.state))
            .ok_or_else(|| TallyWalletError::MintError("quote not found".into()))?;
        if quote_state != MintQuoteState::Paid {
            return Err(TallyWalletError::QuoteNotPaid("quote not paid".into()));
        }
        let requested = blinded_messages.iter().map(|m| m.amount).sum::<u64>();
        if requested != amount {
            return Err(TallyWalletError::MintError("amount mismatch".into()));
        }
        let signatures = self.sign(&mut state, &blinded_messages)?;
        if let Some(q) = state.mint_quotes.get_mut(&quote) {
            q.state = MintQuoteState::Issued;
        }
        Ok(PostMintBolt11Response { signatures })
    }

    async fn post_melt_quote_bolt11(
        &self,
        _mint_url: &Url,
        _payment_request: String,
        _unit: CurrencyUnit,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        let mut state = self.state();
        let quote = PostMeltQuoteBolt11Response {
            quote: Self::next_quote(&mut state, "melt"),
            amount: state.melt_amount,
            fee_reserve: state.fee_reserve,
            state: MeltQuoteState::Unpaid,
            expiry: None,
            payment_preimage: None,
            change: None,
        };
        state.melt_quotes.insert(quote.quote.clone(), quote.clone());
        Ok(quote)
    }

    async fn get_melt_quote_bolt11(
        &self,
        _mint_url: &Url,
        quote: String,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        self.state()
            .melt_quotes
            .get(&quote)
            .cloned()
            .ok_or_else(|| TallyWalletError::MintError("quote not found".into()))
    }

    async fn post_melt_bolt11(
        &self,
        _mint_url: &Url,
        proofs: Proofs,
        quote: String,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        let mut state = self.state();
        let melt_quote = state
            .melt_quotes
            .get(&quote)
            .cloned()
            .ok_or_else(|| TallyWalletError::MintError("quote not found".into()))?;
        let input_ys = ys(&proofs);
        Self::check_unspent(&state, &input_ys)?;
        let required = melt_quote.amount + melt_quote.fee_reserve + self.input_fee(&proofs);
        if proofs.total_amount() < required {
            return Err(TallyWalletError::MintError("not enough inputs".into()));
        }

        match state.melt_behavior {
            MeltBehavior::Pay { fee_paid } => {
                state.spent.extend(input_ys);
                let change_amount = proofs.total_amount() - melt_quote.amount - fee_paid
                    - self.input_fee(&proofs);
                let change_amounts = Amount(change_amount).split();
                let change_outputs = outputs
                    .iter()
                    .zip(change_amounts.amounts())
                    .map(|(output, amount)| BlindedMessage {
                        amount: *amount,
                        ..output.clone()
                    })
                    .collect::<Vec<_>>();
                let change = self.sign(&mut state, &change_outputs)?;
                let paid = PostMeltQuoteBolt11Response {
                    state: MeltQuoteState::Paid,
                    payment_preimage: Some(PREIMAGE.into()),
                    change: Some(change),
                    ..melt_quote
                };
                state.melt_quotes.insert(quote, paid.clone());
                Ok(paid)
            }
            MeltBehavior::Unpaid => Ok(melt_quote),
            MeltBehavior::ErrorThen(quote_state) => {
                match quote_state {
                    MeltQuoteState::Paid => state.spent.extend(input_ys),
                    MeltQuoteState::Pending => {
                        state.pending.insert(quote.clone(), input_ys.into_iter().collect());
                    }
                    MeltQuoteState::Unpaid => {}
                }
                if let Some(q) = state.melt_quotes.get_mut(&quote) {
                    q.state = quote_state;
                }
                Err(TallyWalletError::UnexpectedResponse(
                    "connection reset by peer".into(),
                ))
            }
        }
    }

    async fn post_swap(
        &self,
        _mint_url: &Url,
        proofs: Proofs,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostSwapResponse, TallyWalletError> {
        let mut state = self.state();
        let input_ys = ys(&proofs);
        Self::check_unspent(&state, &input_ys)?;
        let outputs_amount = outputs.iter().map(|o| o.amount).sum::<u64>();
        if proofs.total_amount() != outputs_amount + self.input_fee(&proofs) {
            return Err(TallyWalletError::MintError(
                "inputs do not match outputs plus fee".into(),
            ));
        }
        let mut signatures = self.sign(&mut state, &outputs)?;
        state.spent.extend(input_ys);
        if state.short_swaps {
            signatures.pop();
        }
        Ok(PostSwapResponse { signatures })
    }

    async fn post_checkstate(
        &self,
        _mint_url: &Url,
        ys: Vec<String>,
    ) -> Result<PostCheckStateResponse, TallyWalletError> {
        let state = self.state();
        let pending = state.pending.values().flatten().collect::<HashSet<_>>();
        Ok(PostCheckStateResponse {
            states: ys
                .into_iter()
                .map(|y| ProofStateEntry {
                    state: if state.spent.contains(&y) {
                        ProofState::Spent
                    } else if pending.contains(&y) {
                        ProofState::Pending
                    } else {
                        ProofState::Unspent
                    },
                    y,
                })
                .collect(),
        })
    }
}
