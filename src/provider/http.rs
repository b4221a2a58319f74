//! HTTP client for liquidity provider servers

use super::{AcceptResponse, LiquidityProvider, ProviderApi, ProviderId, ProviderQuote};
use crate::config::ProviderApiConfig;
use crate::error::ProviderError;
use crate::quote::{Direction, QuoteId, QuoteRequest};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Body of a quote request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequestBody<'a> {
    direction: Direction,
    amount: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination_address: Option<&'a str>,
}

/// Error payload returned by providers on 4xx/5xx
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// reqwest-backed [`ProviderApi`]
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderApiConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Unreachable(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_decode() {
        ProviderError::Malformed(e.to_string())
    } else {
        ProviderError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl ProviderApi for HttpProviderClient {
    async fn providers(&self) -> Result<Vec<LiquidityProvider>, ProviderError> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.url("/providers"))
            .send()
            .await
            .map_err(transport_error)?;

        let providers = Self::decode(response).await?;
        debug!("GET /providers took {:?}", start.elapsed());
        Ok(providers)
    }

    async fn quotes(
        &self,
        provider: ProviderId,
        request: &QuoteRequest,
    ) -> Result<Vec<ProviderQuote>, ProviderError> {
        let body = QuoteRequestBody {
            direction: request.direction,
            amount: request.amount,
            destination_address: request.destination_address.as_deref(),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.url(&format!(
                "/providers/{}/{}/quotes",
                provider,
                request.direction.path_segment()
            )))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let quotes = Self::decode(response).await?;
        debug!(
            "POST quotes to provider {} took {:?}",
            provider,
            start.elapsed()
        );
        Ok(quotes)
    }

    async fn accept(
        &self,
        provider: ProviderId,
        direction: Direction,
        quote_id: &QuoteId,
    ) -> Result<AcceptResponse, ProviderError> {
        let response = self
            .client
            .post(self.url(&format!(
                "/providers/{}/{}/quotes/{}/accept",
                provider,
                direction.path_segment(),
                quote_id
            )))
            .send()
            .await
            .map_err(transport_error)?;

        Self::decode(response).await
    }
}
