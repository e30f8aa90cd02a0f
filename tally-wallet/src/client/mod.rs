use async_trait::async_trait;
use tally_core::{
    blind::BlindedMessage,
    keyset::Keysets,
    primitives::{
        CurrencyUnit, KeysResponse, MintInfoResponse, PostCheckStateResponse,
        PostMeltQuoteBolt11Response, PostMintBolt11Response, PostMintQuoteBolt11Response,
        PostSwapResponse,
    },
    proof::Proofs,
};

use url::Url;

use crate::error::TallyWalletError;

pub mod crossplatform;

#[cfg(test)]
use mockall::automock;

/// The v1 HTTP api of a cashu mint, as far as a wallet needs it.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait CashuClient {
    async fn get_keys(&self, mint_url: &Url) -> Result<KeysResponse, TallyWalletError>;

    async fn get_keysets(&self, mint_url: &Url) -> Result<Keysets, TallyWalletError>;

    async fn get_info(&self, mint_url: &Url) -> Result<MintInfoResponse, TallyWalletError>;

    async fn post_mint_quote_bolt11(
        &self,
        mint_url: &Url,
        amount: u64,
        unit: CurrencyUnit,
        description: Option<String>,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError>;

    async fn get_mint_quote_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError>;

    async fn post_mint_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
        blinded_messages: Vec<BlindedMessage>,
    ) -> Result<PostMintBolt11Response, TallyWalletError>;

    async fn post_melt_quote_bolt11(
        &self,
        mint_url: &Url,
        payment_request: String,
        unit: CurrencyUnit,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError>;

    async fn get_melt_quote_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError>;

    async fn post_melt_bolt11(
        &self,
        mint_url: &Url,
        proofs: Proofs,
        quote: String,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError>;

    async fn post_swap(
        &self,
        mint_url: &Url,
        proofs: Proofs,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostSwapResponse, TallyWalletError>;

    async fn post_checkstate(
        &self,
        mint_url: &Url,
        ys: Vec<String>,
    ) -> Result<PostCheckStateResponse, TallyWalletError>;
}
