//! External collaborators consumed by the core.
//!
//! The core never talks to a concrete provider. It is handed capability
//! objects (trait objects behind `Arc`) at construction time through
//! [`Collaborators`], so there is no process-wide client state and tests can
//! swap in fakes.
//!
//! | Capability | Required | Failure handling |
//! |------------|----------|------------------|
//! | [`ImageGenerator`] | yes | retried by batch acquisition |
//! | [`BackgroundRemover`] | no | stage skipped, candidate continues |
//! | [`Vectorizer`] | no | stage skipped, candidate continues |
//! | [`BlobStore`] | only for publishing | propagated, never retried |

pub mod http;
pub mod local;
pub mod response;

pub use http::HttpImageGenerator;
pub use local::StaticImageSource;
pub use response::{ProviderItem, ProviderResponse};

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Canvas size requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeHint {
    Square,
    Portrait,
    Landscape,
}

impl SizeHint {
    /// Pick the canvas closest to the trim aspect. Within 10% of square
    /// counts as square.
    pub fn for_aspect(width: f64, height: f64) -> Self {
        let ratio = width / height;
        if (ratio - 1.0).abs() <= 0.1 {
            SizeHint::Square
        } else if ratio < 1.0 {
            SizeHint::Portrait
        } else {
            SizeHint::Landscape
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SizeHint::Square => (1024, 1024),
            SizeHint::Portrait => (1024, 1536),
            SizeHint::Landscape => (1536, 1024),
        }
    }
}

impl fmt::Display for SizeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h}")
    }
}

/// Produces base images. May return fewer than `count`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        count: usize,
        size: SizeHint,
    ) -> Result<Vec<Vec<u8>>, ProviderError>;
}

/// Removes the background from a PNG, returning a PNG.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove(&self, png: Vec<u8>) -> Result<Vec<u8>, ProviderError>;
}

/// Result of a vectorization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vectorized {
    /// SVG document.
    pub vector: Vec<u8>,
    /// Token for fetching other renditions via [`Vectorizer::download`].
    pub continuation_token: Option<String>,
}

/// Traces a PNG into vector form.
#[async_trait]
pub trait Vectorizer: Send + Sync {
    async fn vectorize(&self, png: Vec<u8>) -> Result<Vectorized, ProviderError>;

    /// Fetch a rendition (e.g. `"png"`) of an earlier vectorization.
    async fn download(&self, token: &str, format: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Durable storage for finished artifacts. Returns a URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError>;
}

/// The capability handles a batch runs with.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn ImageGenerator>,
    pub background_remover: Option<Arc<dyn BackgroundRemover>>,
    pub vectorizer: Option<Arc<dyn Vectorizer>>,
}

impl Collaborators {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            background_remover: None,
            vectorizer: None,
        }
    }

    pub fn with_background_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.background_remover = Some(remover);
        self
    }

    pub fn with_vectorizer(mut self, vectorizer: Arc<dyn Vectorizer>) -> Self {
        self.vectorizer = Some(vectorizer);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("generator", &"<dyn ImageGenerator>")
            .field(
                "background_remover",
                &self.background_remover.as_ref().map(|_| "<dyn BackgroundRemover>"),
            )
            .field(
                "vectorizer",
                &self.vectorizer.as_ref().map(|_| "<dyn Vectorizer>"),
            )
            .finish()
    }
}
