use async_trait::async_trait;

use tally_core::{
    blind::BlindedMessage,
    keyset::Keysets,
    primitives::{
        CurrencyUnit, KeysResponse, MintInfoResponse, PostCheckStateRequest,
        PostCheckStateResponse, PostMeltBolt11Request, PostMeltQuoteBolt11Request,
        PostMeltQuoteBolt11Response, PostMintBolt11Request, PostMintBolt11Response,
        PostMintQuoteBolt11Request, PostMintQuoteBolt11Response, PostSwapRequest,
        PostSwapResponse,
    },
    proof::Proofs,
};

use crate::{error::TallyWalletError, http::CrossPlatformHttpClient};
use url::Url;

use super::CashuClient;

#[async_trait(?Send)]
impl CashuClient for CrossPlatformHttpClient {
    async fn get_keys(&self, mint_url: &Url) -> Result<KeysResponse, TallyWalletError> {
        self.do_get(&mint_url.join("v1/keys")?).await
    }

    async fn get_keysets(&self, mint_url: &Url) -> Result<Keysets, TallyWalletError> {
        self.do_get(&mint_url.join("v1/keysets")?).await
    }

    async fn get_info(&self, mint_url: &Url) -> Result<MintInfoResponse, TallyWalletError> {
        self.do_get(&mint_url.join("v1/info")?).await
    }

    async fn post_mint_quote_bolt11(
        &self,
        mint_url: &Url,
        amount: u64,
        unit: CurrencyUnit,
        description: Option<String>,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        let body = PostMintQuoteBolt11Request {
            amount,
            unit,
            description,
        };
        self.do_post(&mint_url.join("v1/mint/quote/bolt11")?, &body)
            .await
    }

    async fn get_mint_quote_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
    ) -> Result<PostMintQuoteBolt11Response, TallyWalletError> {
        self.do_get(&mint_url.join(&format!("v1/mint/quote/bolt11/{quote}"))?)
            .await
    }

    async fn post_mint_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
        blinded_messages: Vec<BlindedMessage>,
    ) -> Result<PostMintBolt11Response, TallyWalletError> {
        let body = PostMintBolt11Request {
            quote,
            outputs: blinded_messages,
        };
        self.do_post(&mint_url.join("v1/mint/bolt11")?, &body).await
    }

    async fn post_melt_quote_bolt11(
        &self,
        mint_url: &Url,
        payment_request: String,
        unit: CurrencyUnit,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        let body = PostMeltQuoteBolt11Request {
            request: payment_request,
            unit,
        };
        self.do_post(&mint_url.join("v1/melt/quote/bolt11")?, &body)
            .await
    }

    async fn get_melt_quote_bolt11(
        &self,
        mint_url: &Url,
        quote: String,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        self.do_get(&mint_url.join(&format!("v1/melt/quote/bolt11/{quote}"))?)
            .await
    }

    async fn post_melt_bolt11(
        &self,
        mint_url: &Url,
        inputs: Proofs,
        quote: String,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostMeltQuoteBolt11Response, TallyWalletError> {
        let body = PostMeltBolt11Request {
            quote,
            inputs,
            outputs: (!outputs.is_empty()).then_some(outputs),
        };
        self.do_post(&mint_url.join("v1/melt/bolt11")?, &body).await
    }

    async fn post_swap(
        &self,
        mint_url: &Url,
        inputs: Proofs,
        outputs: Vec<BlindedMessage>,
    ) -> Result<PostSwapResponse, TallyWalletError> {
        let body = PostSwapRequest { inputs, outputs };
        self.do_post(&mint_url.join("v1/swap")?, &body).await
    }

    async fn post_checkstate(
        &self,
        mint_url: &Url,
        ys: Vec<String>,
    ) -> Result<PostCheckStateResponse, TallyWalletError> {
        let body = PostCheckStateRequest { ys };
        self.do_post(&mint_url.join("v1/checkstate")?, &body).await
    }
}
