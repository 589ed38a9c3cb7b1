//! Generator that serves images the caller already has.
//!
//! Useful for re-running the print pipeline on existing artwork (local files
//! or URLs) and for tests: each call hands out the next `count` images in
//! round-robin order and ignores the prompt.

use super::{ImageGenerator, SizeHint};
use crate::error::{PrintfitError, ProviderError};
use crate::pipeline::input::read_input;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct StaticImageSource {
    images: Vec<Vec<u8>>,
    cursor: AtomicUsize,
}

impl StaticImageSource {
    pub fn new(images: Vec<Vec<u8>>) -> Result<Self, PrintfitError> {
        if images.is_empty() {
            return Err(PrintfitError::ProviderNotConfigured {
                provider: "static".to_string(),
                hint: "At least one input image is required.".to_string(),
            });
        }
        Ok(Self {
            images,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Read every path or URL up front.
    pub async fn from_inputs(inputs: &[String], timeout_secs: u64) -> Result<Self, PrintfitError> {
        let mut images = Vec::with_capacity(inputs.len());
        for input in inputs {
            images.push(read_input(input, timeout_secs).await?);
        }
        Self::new(images)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[async_trait]
impl ImageGenerator for StaticImageSource {
    async fn generate(
        &self,
        _prompt: &str,
        count: usize,
        _size: SizeHint,
    ) -> Result<Vec<Vec<u8>>, ProviderError> {
        let start = self.cursor.fetch_add(count, Ordering::SeqCst);
        Ok((start..start + count)
            .map(|i| self.images[i % self.images.len()].clone())
            .collect())
    }
}
