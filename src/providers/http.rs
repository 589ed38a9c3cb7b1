//! Generic JSON-over-HTTP image generator.
//!
//! Speaks the smallest possible contract: POST
//! `{"prompt", "n", "size"}` to an endpoint and read a
//! [`ProviderResponse`](super::ProviderResponse) back. Vendor-specific
//! adapters are expected to sit behind such an endpoint.

use super::{ImageGenerator, ProviderResponse, SizeHint};
use crate::error::{PrintfitError, ProviderError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "http-generator";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    n: usize,
    size: String,
}

/// Generator backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageGenerator {
    endpoint: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
    download_timeout_secs: u64,
}

impl HttpImageGenerator {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, PrintfitError> {
        let endpoint = endpoint.into();
        if !crate::pipeline::input::is_url(&endpoint) {
            return Err(PrintfitError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: format!("'{endpoint}' is not an http(s) URL"),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PrintfitError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            endpoint,
            client,
            bearer_token: None,
            download_timeout_secs: timeout_secs,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        count: usize,
        size: SizeHint,
    ) -> Result<Vec<Vec<u8>>, ProviderError> {
        let body = GenerateBody {
            prompt,
            n: count,
            size: size.to_string(),
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::new(PROVIDER, e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::new(PROVIDER, e.to_string()))?;
        debug!("{} answered HTTP {} with {} bytes", self.endpoint, status, bytes.len());

        // Error bodies use the same tagged shape; fall back to the status line.
        let parsed = ProviderResponse::parse(PROVIDER, &bytes);
        if !status.is_success() {
            return Err(match parsed {
                Ok(ProviderResponse::Error(message)) => ProviderError::new(PROVIDER, message),
                _ => ProviderError::new(PROVIDER, format!("HTTP {status}")),
            });
        }
        parsed?
            .into_images(PROVIDER, self.download_timeout_secs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_url_endpoint() {
        let err = HttpImageGenerator::new("localhost:9000", 5).unwrap_err();
        assert!(matches!(err, PrintfitError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn body_shape() {
        let body = GenerateBody {
            prompt: "a fox",
            n: 3,
            size: SizeHint::Square.to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"prompt":"a fox","n":3,"size":"1024x1024"}"#
        );
    }
}
