//! Tagged provider responses.
//!
//! A provider body is exactly one of two shapes:
//!
//! ```json
//! {"ok": [{"b64_json": "iVBORw0..."}, {"url": "https://..."}]}
//! {"error": "quota exceeded"}
//! ```
//!
//! Parsing into [`ProviderResponse`] happens once, up front. Anything that is
//! neither shape is a parse error rather than a guess.

use crate::error::ProviderError;
use crate::pipeline::input::fetch_url;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderResponse {
    Ok(Vec<ProviderItem>),
    Error(String),
}

/// One image in an `ok` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderItem {
    Inline { b64_json: String },
    Remote { url: String },
}

impl ProviderResponse {
    pub fn parse(provider: &str, body: &[u8]) -> Result<Self, ProviderError> {
        serde_json::from_slice(body)
            .map_err(|e| ProviderError::new(provider, format!("unrecognised response: {e}")))
    }

    /// Resolve every item to raw bytes.
    ///
    /// An `error` response is an error. Individual items that cannot be
    /// decoded or fetched are dropped with a warning; the batch acquisition
    /// loop makes up the shortfall.
    pub async fn into_images(
        self,
        provider: &str,
        download_timeout_secs: u64,
    ) -> Result<Vec<Vec<u8>>, ProviderError> {
        let items = match self {
            ProviderResponse::Ok(items) => items,
            ProviderResponse::Error(message) => return Err(ProviderError::new(provider, message)),
        };

        let mut images = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ProviderItem::Inline { b64_json } => match STANDARD.decode(b64_json.trim()) {
                    Ok(bytes) => images.push(bytes),
                    Err(e) => warn!("{}: dropping item with bad base64: {}", provider, e),
                },
                ProviderItem::Remote { url } => match fetch_url(&url, download_timeout_secs).await {
                    Ok(bytes) => images.push(bytes),
                    Err(e) => warn!("{}: dropping item: {}", provider, e),
                },
            }
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok_shape() {
        let body = br#"{"ok": [{"b64_json": "AAEC"}, {"url": "https://x.test/a.png"}]}"#;
        let r = ProviderResponse::parse("gen", body).unwrap();
        assert_eq!(
            r,
            ProviderResponse::Ok(vec![
                ProviderItem::Inline {
                    b64_json: "AAEC".into()
                },
                ProviderItem::Remote {
                    url: "https://x.test/a.png".into()
                },
            ])
        );
    }

    #[test]
    fn parses_error_shape() {
        let r = ProviderResponse::parse("gen", br#"{"error": "quota exceeded"}"#).unwrap();
        assert_eq!(r, ProviderResponse::Error("quota exceeded".into()));
    }

    #[test]
    fn rejects_other_shapes() {
        let err = ProviderResponse::parse("gen", br#"{"data": []}"#).unwrap_err();
        assert_eq!(err.provider, "gen");
        assert!(err.message.contains("unrecognised"));
    }

    #[tokio::test]
    async fn error_response_becomes_error() {
        let err = ProviderResponse::Error("rate limited".into())
            .into_images("gen", 5)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "gen: rate limited");
    }

    #[tokio::test]
    async fn inline_items_are_decoded_and_bad_ones_dropped() {
        let r = ProviderResponse::Ok(vec![
            ProviderItem::Inline {
                b64_json: STANDARD.encode([1u8, 2, 3]),
            },
            ProviderItem::Inline {
                b64_json: "***".into(),
            },
        ]);
        let images = r.into_images("gen", 5).await.unwrap();
        assert_eq!(images, vec![vec![1, 2, 3]]);
    }
}
