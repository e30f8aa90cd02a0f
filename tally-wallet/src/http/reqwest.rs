use super::CrossPlatformHttpClient;
use crate::error::TallyWalletError;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Response,
};
use tally_core::primitives::CashuErrorResponse;
use tracing::debug;
use url::Url;

/// error code of a mint for a mint quote whose invoice was not paid yet
const QUOTE_NOT_PAID_CODE: u64 = 20001;

impl Default for CrossPlatformHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossPlatformHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn extract_response_data<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, TallyWalletError> {
        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            if let Ok(data) = serde_json::from_str::<T>(&response_text) {
                return Ok(data);
            }
        }

        debug!("mint returned {status}: {response_text}");
        let error = serde_json::from_str::<CashuErrorResponse>(&response_text)
            .map_err(|_| TallyWalletError::UnexpectedResponse(response_text))?;

        if error.code == QUOTE_NOT_PAID_CODE || error.detail.to_lowercase().contains("not paid") {
            Err(TallyWalletError::QuoteNotPaid(error.detail))
        } else {
            Err(TallyWalletError::MintError(error.detail))
        }
    }

    pub async fn do_get<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
    ) -> Result<T, TallyWalletError> {
        let resp = self.client.get(url.clone()).send().await?;
        Self::extract_response_data::<T>(resp).await
    }

    pub async fn do_post<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<T, TallyWalletError> {
        let resp = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_str("application/json")?)
            .body(serde_json::to_string(body)?)
            .send()
            .await?;
        Self::extract_response_data::<T>(resp).await
    }
}
