use std::collections::HashMap;

use lightning_invoice::Bolt11Invoice as LNInvoice;
use secp256k1::PublicKey;
use std::str::FromStr;
use tally_core::{
    amount::{blank_outputs_for_fee, Amount},
    dhke::{proof_y, Dhke},
    keyset::{KeysetInfo, Keysets},
    primitives::{
        CurrencyUnit, MeltQuoteState, MintInfoResponse, PostMeltQuoteBolt11Response,
        PostMintQuoteBolt11Response, ProofState,
    },
    proof::{Proof, Proofs},
};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    client::CashuClient, error::TallyWalletError, localstore::LocalStore,
    secret::DeterministicSecret,
};

/// Proofs split into the part that pays for something and the part that stays in the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendSplit {
    pub send: Proofs,
    pub keep: Proofs,
    /// true if the mint had to swap the inputs, i.e. the inputs are spent now
    pub swapped: bool,
    pub swap_fee: u64,
}

#[derive(Debug, Clone)]
pub struct MeltResult {
    pub state: MeltQuoteState,
    pub preimage: Option<String>,
    pub change: Proofs,
}

/// A wallet bound to one mint: its active `sat` keyset, the keys of that keyset and the seed.
///
/// Nothing in here persists proofs. Callers decide when proofs are written or removed, the wallet
/// only takes derivation counters from the store.
pub struct MintWallet<C: CashuClient, L: LocalStore> {
    client: C,
    localstore: L,
    mint_url: Url,
    keysets: Keysets,
    active_keyset: KeysetInfo,
    keys: HashMap<u64, PublicKey>,
    dhke: Dhke,
    secret: DeterministicSecret,
    info: MintInfoResponse,
}

pub struct MintWalletBuilder<C: CashuClient, L: LocalStore> {
    client: Option<C>,
    localstore: Option<L>,
    mint_url: Option<Url>,
}

impl<C: CashuClient, L: LocalStore> MintWalletBuilder<C, L> {
    fn new() -> Self {
        Self {
            client: None,
            localstore: None,
            mint_url: None,
        }
    }

    pub fn with_client(mut self, client: C) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_localstore(mut self, localstore: L) -> Self {
        self.localstore = Some(localstore);
        self
    }

    pub fn with_mint_url(mut self, mint_url: Url) -> Self {
        self.mint_url = Some(mint_url);
        self
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn build(self) -> Result<MintWallet<C, L>, TallyWalletError> {
        let client = self
            .client
            .ok_or(TallyWalletError::IncompleteBuilder("client"))?;
        let localstore = self
            .localstore
            .ok_or(TallyWalletError::IncompleteBuilder("localstore"))?;
        let mint_url = self.mint_url.ok_or(TallyWalletError::NoMintSelected)?;

        let (keysets, keys) = tokio::try_join!(
            client.get_keysets(&mint_url),
            client.get_keys(&mint_url)
        )?;

        let keysets = keysets.for_unit(&CurrencyUnit::Sat);
        let active_keyset = keysets
            .active()
            .cloned()
            .ok_or_else(|| TallyWalletError::NoActiveKeyset(mint_url.to_string()))?;

        let mint_keys = keys
            .keysets
            .into_iter()
            .find(|k| k.id == active_keyset.id)
            .ok_or_else(|| TallyWalletError::NoActiveKeyset(mint_url.to_string()))?;
        mint_keys.verify_id()?;

        let seed_words = localstore
            .get_seed()
            .await?
            .ok_or(TallyWalletError::SeedNotFound)?;
        let secret = DeterministicSecret::from_seed_words(&seed_words)?;

        let info = client.get_info(&mint_url).await?;
        debug!(
            "loaded mint {} with active keyset {}",
            mint_url, active_keyset.id
        );

        Ok(MintWallet {
            client,
            localstore,
            mint_url,
            keysets,
            active_keyset,
            keys: mint_keys.keys,
            dhke: Dhke::new(),
            secret,
            info,
        })
    }
}

impl<C: CashuClient, L: LocalStore> Default for MintWalletBuilder<C, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CashuClient, L: LocalStore> MintWallet<C, L> {
    pub fn builder() -> MintWalletBuilder<C, L> {
        MintWalletBuilder::default()
    }

    pub fn mint_url(&self) -> &Url {
        &self.mint_url
    }

    pub fn info(&self) -> &MintInfoResponse {
        &self.info
    }

    pub fn active_keyset(&self) -> &KeysetInfo {
        &self.active_keyset
    }

    /// Input fee the mint charges for spending `proofs`.
    pub fn fee_for(&self, proofs: &Proofs) -> Result<u64, TallyWalletError> {
        Ok(self.keysets.fee_for(proofs)?)
    }

    /// Amount of fresh proofs of the active keyset that still leaves `amount` after their own
    /// input fee, e.g. the inputs of a melt.
    pub fn amount_with_input_fee(&self, amount: u64) -> u64 {
        let mut target = amount;
        loop {
            let next = amount + self.keysets.fee_for_count(Amount(target).split().len());
            if next <= target {
                return target;
            }
            target = next;
        }
    }

    /// Reserves `outputs + 1` counter values for the active keyset. The extra value is a gap
    /// between operations, so a retry of a failed request never lands on an index already sent.
    async fn reserve_outputs(&self, outputs: usize) -> Result<u32, TallyWalletError> {
        let start = self
            .localstore
            .reserve_counter(&self.mint_url, outputs as u64 + 1)
            .await?;
        Ok(u32::try_from(start)?)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn create_mint_quote(
        &self,
        amount: u64,
        description: Option<String>,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        self.client
            .post_mint_quote_bolt11(&self.mint_url, amount, CurrencyUnit::Sat, description)
            .await
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn check_mint_quote(
        &self,
        quote: &str,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        self.client
            .get_mint_quote_bolt11(&self.mint_url, quote.to_owned())
            .await
    }

    /// Mints proofs for a paid quote. Fails with `QuoteNotPaid` if the invoice was not paid yet.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn mint_proofs(&self, amount: u64, quote: &str) -> Result<Proofs, TallyWalletError> {
        let start = self.reserve_outputs(Amount(amount).split().len()).await?;
        let outputs = self.secret.prepare_outputs_for_amount(
            &self.dhke,
            &self.active_keyset.id,
            start,
            amount,
        )?;

        let response = self
            .client
            .post_mint_bolt11(&self.mint_url, quote.to_owned(), outputs.blinded_messages())
            .await?;

        Ok(self
            .dhke
            .construct_proofs(&response.signatures, &outputs, &self.keys)?)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn melt_quote(
        &self,
        invoice: &str,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        self.client
            .post_melt_quote_bolt11(&self.mint_url, invoice.to_owned(), CurrencyUnit::Sat)
            .await
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn check_melt_quote(
        &self,
        quote: &str,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        self.client
            .get_melt_quote_bolt11(&self.mint_url, quote.to_owned())
            .await
    }

    /// Splits `proofs` into proofs worth exactly `amount` and the rest.
    ///
    /// If the proofs already contain an exact, fee free subset no request is made. Otherwise all
    /// inputs are swapped at the mint; the swap fee is taken from the kept part.
    #[instrument(level = "debug", skip(self, proofs), fields(inputs = proofs.total_amount()), err)]
    pub async fn split_for_send(
        &self,
        proofs: &Proofs,
        amount: u64,
    ) -> Result<SendSplit, TallyWalletError> {
        if let Some(exact) = proofs.exact_proofs_for_amount(amount) {
            if self.fee_for(&exact)? == 0 {
                return Ok(SendSplit {
                    keep: proofs.without_secrets(&exact),
                    send: exact,
                    swapped: false,
                    swap_fee: 0,
                });
            }
        }

        let total = proofs.total_amount();
        let swap_fee = self.fee_for(proofs)?;
        if total < amount + swap_fee {
            return Err(TallyWalletError::InsufficientProofs {
                available: total,
                required: amount + swap_fee,
            });
        }

        let send_amounts = Amount(amount).split();
        let keep_amounts = Amount(total - amount - swap_fee).split();
        let send_count = send_amounts.len();
        let all_amounts = send_amounts
            .into_iter()
            .chain(keep_amounts)
            .collect::<Vec<u64>>();

        let start = self.reserve_outputs(all_amounts.len()).await?;
        let outputs =
            self.secret
                .prepare_outputs(&self.dhke, &self.active_keyset.id, start, &all_amounts)?;

        let response = self
            .client
            .post_swap(&self.mint_url, proofs.clone(), outputs.blinded_messages())
            .await?;
        let new_proofs = self
            .dhke
            .construct_proofs(&response.signatures, &outputs, &self.keys);

        let signed_amounts = response
            .signatures
            .iter()
            .map(|signature| signature.amount)
            .collect::<Vec<u64>>();
        if signed_amounts != all_amounts {
            // the inputs are spent either way, only the outputs signed as requested are usable
            let recovered = new_proofs
                .map(|new_proofs| {
                    new_proofs
                        .iter()
                        .zip(&all_amounts)
                        .filter(|(proof, amount)| proof.amount == **amount)
                        .map(|(proof, _)| proof.clone())
                        .collect::<Proofs>()
                })
                .unwrap_or_default();
            return Err(TallyWalletError::SwapMismatch {
                requested: all_amounts.iter().sum(),
                signed: signed_amounts.iter().sum(),
                recovered,
            });
        }
        let new_proofs = new_proofs?;
        debug!(
            "swap derived {} new secrets from counter {start}",
            new_proofs.count_new(proofs)
        );

        let mut send = new_proofs.proofs();
        let keep = send.split_off(send_count.min(send.len()));
        Ok(SendSplit {
            send: send.into(),
            keep: keep.into(),
            swapped: true,
            swap_fee,
        })
    }

    /// Pays the melt quote with `proofs`. Blank outputs are sent along so the mint can return
    /// the unused part of the fee reserve.
    #[instrument(level = "debug", skip(self, quote, proofs), fields(quote = %quote.quote), err)]
    pub async fn melt_proofs(
        &self,
        quote: &PostMeltQuoteBolt11Response,
        proofs: &Proofs,
    ) -> Result<MeltResult, TallyWalletError> {
        let blank_count = blank_outputs_for_fee(quote.fee_reserve);
        let start = self.reserve_outputs(blank_count).await?;
        let outputs = self.secret.prepare_blank_outputs(
            &self.dhke,
            &self.active_keyset.id,
            start,
            blank_count,
        )?;

        let response = self
            .client
            .post_melt_bolt11(
                &self.mint_url,
                proofs.clone(),
                quote.quote.clone(),
                outputs.blinded_messages(),
            )
            .await?;

        let change = match response.change {
            Some(ref signatures) if !signatures.is_empty() => {
                self.dhke.construct_proofs(signatures, &outputs, &self.keys)?
            }
            _ => Proofs::empty(),
        };

        Ok(MeltResult {
            state: response.state,
            preimage: response.payment_preimage,
            change,
        })
    }

    /// The state the mint reports for each proof, in the order of `proofs`.
    #[instrument(level = "debug", skip(self, proofs), err)]
    pub async fn check_proofs_states(
        &self,
        proofs: &Proofs,
    ) -> Result<Vec<(Proof, ProofState)>, TallyWalletError> {
        if proofs.is_empty() {
            return Ok(vec![]);
        }

        let ys = proofs
            .iter()
            .map(|p| proof_y(&p.secret))
            .collect::<Result<Vec<String>, _>>()?;
        let response = self
            .client
            .post_checkstate(&self.mint_url, ys.clone())
            .await?;
        let states = response
            .states
            .into_iter()
            .map(|entry| (entry.y, entry.state))
            .collect::<HashMap<String, ProofState>>();

        proofs
            .iter()
            .zip(ys)
            .map(|(proof, y)| {
                states
                    .get(&y)
                    .map(|state| (proof.clone(), *state))
                    .ok_or_else(|| {
                        TallyWalletError::UnexpectedResponse(format!("no state for Y {y}"))
                    })
            })
            .collect()
    }
}

pub fn decode_invoice(payment_request: &str) -> Result<LNInvoice, TallyWalletError> {
    LNInvoice::from_str(payment_request)
        .map_err(|err| TallyWalletError::DecodeInvoice(payment_request.to_owned(), err))
}

/// Amount of a bolt11 invoice in sats.
pub fn invoice_amount(payment_request: &str) -> Result<u64, TallyWalletError> {
    let invoice = decode_invoice(payment_request)?;
    invoice
        .amount_milli_satoshis()
        .map(|msat| msat / 1000)
        .ok_or_else(|| TallyWalletError::InvalidInvoice(payment_request.to_owned()))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use tally_core::{
        blind::{BlindedMessage, BlindedSignature},
        dhke::{proof_y, Dhke},
        keyset::{KeysetInfo, Keysets, MintKeyset},
        primitives::{
            CurrencyUnit, KeysResponse, MeltQuoteState, MintInfoResponse, MintQuoteState,
            PostCheckStateResponse, PostMeltQuoteBolt11Response, PostMintBolt11Response,
            PostSwapResponse, ProofState, ProofStateEntry,
        },
        proof::Proofs,
    };
    use url::Url;

    use crate::{
        client::MockCashuClient,
        error::TallyWalletError,
        localstore::{memory::MemoryLocalStore, LocalStore},
    };

    use super::MintWallet;

    pub const SEED_WORDS: &str =
        "half depart obvious quality work element tank gorilla view sugar picture humble";

    /// Signs blinded messages the way a mint would, so unblinded proofs verify.
    #[derive(Clone)]
    pub struct FakeMint {
        pub keyset: MintKeyset,
        pub input_fee_ppk: u64,
    }

    impl FakeMint {
        pub fn new(input_fee_ppk: u64) -> Self {
            Self {
                keyset: MintKeyset::new("fakemintsecret", "").expect("invalid keyset"),
                input_fee_ppk,
            }
        }

        /// The active keyset plus the inactive keyset of the `proofs_60.json` fixture.
        pub fn keysets(&self) -> Keysets {
            Keysets::new(vec![
                KeysetInfo {
                    id: self.keyset.keyset_id.clone(),
                    unit: CurrencyUnit::Sat,
                    active: true,
                    input_fee_ppk: self.input_fee_ppk,
                },
                KeysetInfo {
                    id: "009a1f293253e41e".into(),
                    unit: CurrencyUnit::Sat,
                    active: false,
                    input_fee_ppk: 0,
                },
            ])
        }

        pub fn keys(&self) -> KeysResponse {
            KeysResponse::new(self.keyset.mint_keys(CurrencyUnit::Sat))
        }

        pub fn sign(&self, outputs: &[BlindedMessage]) -> Vec<BlindedSignature> {
            let dhke = Dhke::new();
            outputs
                .iter()
                .map(|o| BlindedSignature {
                    amount: o.amount,
                    c_: dhke
                        .sign_blinded_message(o.b_, &self.keyset.private_keys[&o.amount])
                        .expect("sign failed"),
                    id: o.id.clone(),
                })
                .collect()
        }

        /// Signs the given amounts onto the first outputs, the way a mint returns melt change.
        pub fn sign_change(
            &self,
            outputs: &[BlindedMessage],
            amounts: &[u64],
        ) -> Vec<BlindedSignature> {
            let assigned = outputs
                .iter()
                .zip(amounts)
                .map(|(o, amount)| BlindedMessage {
                    amount: *amount,
                    ..o.clone()
                })
                .collect::<Vec<_>>();
            self.sign(&assigned)
        }

        pub fn mock_client(&self) -> MockCashuClient {
            let mut client = MockCashuClient::new();
            let keysets = self.keysets();
            let keys = self.keys();
            client
                .expect_get_keysets()
                .returning(move |_| Ok(keysets.clone()));
            client.expect_get_keys().returning(move |_| Ok(keys.clone()));
            client
                .expect_get_info()
                .returning(|_| Ok(MintInfoResponse::default()));
            client
        }
    }

    pub fn mint_url() -> Url {
        Url::parse("http://127.0.0.1:3338").expect("invalid url")
    }

    async fn store_with_seed() -> anyhow::Result<MemoryLocalStore> {
        let store = MemoryLocalStore::default();
        store.add_seed(SEED_WORDS).await?;
        Ok(store)
    }

    async fn build_wallet(
        client: MockCashuClient,
        store: MemoryLocalStore,
    ) -> anyhow::Result<MintWallet<MockCashuClient, MemoryLocalStore>> {
        Ok(MintWallet::builder()
            .with_client(client)
            .with_localstore(store)
            .with_mint_url(mint_url())
            .build()
            .await?)
    }

    #[tokio::test]
    async fn test_build_requires_seed() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let result = MintWallet::builder()
            .with_client(mint.mock_client())
            .with_localstore(MemoryLocalStore::default())
            .with_mint_url(mint_url())
            .build()
            .await;
        assert!(matches!(result, Err(TallyWalletError::SeedNotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_without_active_sat_keyset() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = MockCashuClient::new();
        let mut keysets = mint.keysets();
        keysets.keysets[0].unit = CurrencyUnit::Usd;
        let keys = mint.keys();
        client
            .expect_get_keysets()
            .returning(move |_| Ok(keysets.clone()));
        client.expect_get_keys().returning(move |_| Ok(keys.clone()));

        let result = MintWallet::builder()
            .with_client(client)
            .with_localstore(store_with_seed().await?)
            .with_mint_url(mint_url())
            .build()
            .await;
        assert!(matches!(result, Err(TallyWalletError::NoActiveKeyset(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_mint_proofs_reserves_counter_window() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        let signer = mint.clone();
        client
            .expect_post_mint_bolt11()
            .returning(move |_, _, outputs| {
                Ok(PostMintBolt11Response {
                    signatures: signer.sign(&outputs),
                })
            });
        let store = store_with_seed().await?;
        let wallet = build_wallet(client, store.clone()).await?;

        let proofs = wallet.mint_proofs(13, "quote-1").await?;
        assert_eq!(13, proofs.total_amount());
        assert_eq!(3, proofs.len());
        // three outputs plus the gap
        assert_eq!(4, store.get_counter(&mint_url()).await?);

        let dhke = Dhke::new();
        for proof in proofs.iter() {
            let key = &mint.keyset.private_keys[&proof.amount];
            assert!(dhke.verify(key, proof.c, &proof.secret)?);
        }

        let more = wallet.mint_proofs(1, "quote-2").await?;
        assert!(!proofs.contains_secret(&more.proofs()[0].secret));
        assert_eq!(6, store.get_counter(&mint_url()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_mint_proofs_quote_not_paid() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        client
            .expect_post_mint_bolt11()
            .returning(|_, _, _| Err(TallyWalletError::QuoteNotPaid("quote not paid".into())));
        let store = store_with_seed().await?;
        let wallet = build_wallet(client, store.clone()).await?;

        let result = wallet.mint_proofs(8, "quote-1").await;
        assert!(matches!(result, Err(TallyWalletError::QuoteNotPaid(_))));
        // the reserved window is never handed out again
        assert_eq!(2, store.get_counter(&mint_url()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_for_send_exact_match_skips_swap() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let client = mint.mock_client();
        let store = store_with_seed().await?;
        let wallet = build_wallet(client, store.clone()).await?;
        let proofs = tally_core::fixture::read_fixture_as::<Proofs>("proofs_60.json")?;

        let split = wallet.split_for_send(&proofs, 24).await?;
        assert!(!split.swapped);
        assert_eq!(24, split.send.total_amount());
        assert_eq!(36, split.keep.total_amount());
        assert_eq!(0, store.get_counter(&mint_url()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_for_send_swaps() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        let signer = mint.clone();
        let swapped_inputs = Arc::new(Mutex::new(0u64));
        let seen = swapped_inputs.clone();
        client
            .expect_post_swap()
            .times(1)
            .returning(move |_, inputs: Proofs, outputs| {
                *seen.lock().expect("poisoned") = inputs.total_amount();
                Ok(PostSwapResponse {
                    signatures: signer.sign(&outputs),
                })
            });
        let store = store_with_seed().await?;
        let wallet = build_wallet(client, store.clone()).await?;
        let proofs = tally_core::fixture::read_fixture_as::<Proofs>("proofs_60.json")?;

        let split = wallet.split_for_send(&proofs, 21).await?;
        assert!(split.swapped);
        assert_eq!(60, *swapped_inputs.lock().expect("poisoned"));
        assert_eq!(21, split.send.total_amount());
        assert_eq!(39, split.keep.total_amount());
        // conservation: inputs == send + keep + fee
        assert_eq!(
            proofs.total_amount(),
            split.send.total_amount() + split.keep.total_amount() + split.swap_fee
        );
        // 21 = 1+4+16, 39 = 1+2+4+32 -> 7 outputs + gap
        assert_eq!(8, store.get_counter(&mint_url()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_for_send_pays_input_fee() -> anyhow::Result<()> {
        let mint = FakeMint::new(1000);
        let mut client = mint.mock_client();
        let signer = mint.clone();
        client.expect_post_swap().returning(move |_, _, outputs| {
            Ok(PostSwapResponse {
                signatures: signer.sign(&outputs),
            })
        });
        let store = store_with_seed().await?;

        let minted_by = mint.clone();
        let mut mint_client = mint.mock_client();
        mint_client
            .expect_post_mint_bolt11()
            .returning(move |_, _, outputs| {
                Ok(PostMintBolt11Response {
                    signatures: minted_by.sign(&outputs),
                })
            });
        let proofs = build_wallet(mint_client, store.clone())
            .await?
            .mint_proofs(12, "quote")
            .await?;

        let wallet = build_wallet(client, store).await?;

        // two inputs (4 + 8) with 1000 ppk each cost 2 sats
        assert_eq!(2, wallet.fee_for(&proofs)?);
        let split = wallet.split_for_send(&proofs, 8).await?;
        assert!(split.swapped);
        assert_eq!(2, split.swap_fee);
        assert_eq!(8, split.send.total_amount());
        assert_eq!(2, split.keep.total_amount());

        let result = wallet.split_for_send(&proofs, 11).await;
        assert!(matches!(
            result,
            Err(TallyWalletError::InsufficientProofs { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_amount_with_input_fee() -> anyhow::Result<()> {
        let store = store_with_seed().await?;
        let free = build_wallet(FakeMint::new(0).mock_client(), store.clone()).await?;
        assert_eq!(1050, free.amount_with_input_fee(1050));

        let charged = build_wallet(FakeMint::new(1000).mock_client(), store).await?;
        // 1056 = 1024 + 32, two inputs cost 2 sats
        assert_eq!(1056, charged.amount_with_input_fee(1050));
        assert_eq!(0, charged.amount_with_input_fee(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_melt_proofs_returns_change() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        let signer = mint.clone();
        client
            .expect_post_melt_bolt11()
            .returning(move |_, _, quote, outputs| {
                assert_eq!(6, outputs.len());
                Ok(PostMeltQuoteBolt11Response {
                    quote,
                    amount: 100,
                    fee_reserve: 50,
                    state: MeltQuoteState::Paid,
                    expiry: None,
                    payment_preimage: Some("preimage".into()),
                    change: Some(signer.sign_change(&outputs, &[32, 8])),
                })
            });
        let store = store_with_seed().await?;
        let wallet = build_wallet(client, store.clone()).await?;
        let quote = PostMeltQuoteBolt11Response {
            quote: "melt-1".into(),
            amount: 100,
            fee_reserve: 50,
            state: MeltQuoteState::Unpaid,
            expiry: None,
            payment_preimage: None,
            change: None,
        };

        let result = wallet
            .melt_proofs(&quote, &Proofs::empty())
            .await?;
        assert_eq!(MeltQuoteState::Paid, result.state);
        assert_eq!(40, result.change.total_amount());
        assert_eq!(Some("preimage".to_owned()), result.preimage);
        // 6 blank outputs for a fee reserve of 50, plus the gap
        assert_eq!(7, store.get_counter(&mint_url()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_proofs_states() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        let proofs = tally_core::fixture::read_fixture_as::<Proofs>("proofs_60.json")?;
        let spent_y = proof_y(&proofs.proofs()[1].secret)?;
        client.expect_post_checkstate().returning(move |_, ys| {
            Ok(PostCheckStateResponse {
                states: ys
                    .into_iter()
                    .rev()
                    .map(|y| ProofStateEntry {
                        state: if y == spent_y {
                            ProofState::Spent
                        } else {
                            ProofState::Unspent
                        },
                        y,
                    })
                    .collect(),
            })
        });
        let wallet = build_wallet(client, store_with_seed().await?).await?;

        let states = wallet.check_proofs_states(&proofs).await?;
        assert_eq!(4, states.len());
        assert_eq!(ProofState::Spent, states[1].1);
        assert_eq!(8, states[1].0.amount);
        assert_eq!(
            3,
            states
                .iter()
                .filter(|(_, s)| *s == ProofState::Unspent)
                .count()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_check_mint_quote() -> anyhow::Result<()> {
        let mint = FakeMint::new(0);
        let mut client = mint.mock_client();
        client
            .expect_get_mint_quote_bolt11()
            .returning(|_, quote| {
                Ok(tally_core::primitives::PostMintQuoteBolt11Response {
                    quote,
                    payment_request: "lnbc...".into(),
                    state: MintQuoteState::Paid,
                    expiry: None,
                })
            });
        let wallet = build_wallet(client, store_with_seed().await?).await?;
        assert_eq!(
            MintQuoteState::Paid,
            wallet.check_mint_quote("quote-1").await?.state
        );
        Ok(())
    }
}
