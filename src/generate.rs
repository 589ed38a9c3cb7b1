//! Eager (whole-batch) entry points.
//!
//! [`generate`] acquires the base images, runs every candidate through the
//! stage pipeline concurrently and returns once all of them have finished.
//! Use [`crate::stream::generate_stream`] instead to receive candidates as
//! they complete.

use crate::config::{GenerationRequest, PrintConfig};
use crate::error::PrintfitError;
use crate::output::{BatchOutput, BatchStats, CandidateFailure, CandidateResult, PublishedArtifact};
use crate::pipeline::acquire::{Acquired, BatchAcquisition};
use crate::pipeline::candidate::CandidatePipeline;
use crate::pipeline::encode::encode_png;
use crate::progress::{NoopObserver, ObserverHandle};
use crate::providers::{BlobStore, Collaborators, SizeHint};
use crate::raster::RasterBuffer;
use crate::store::artifact_slug;
use crate::stream::candidate_stream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Generate `request.variation_count` print-ready candidates.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` when at least one candidate survived every mandatory
/// stage. Dropped candidates are listed in `output.failures`.
///
/// # Errors
/// - [`PrintfitError::InvalidConfig`] — `variation_count` is zero
/// - [`PrintfitError::NoCandidates`] / [`PrintfitError::InsufficientCandidates`]
///   — the generator could not supply the batch within `max_attempts`
/// - [`PrintfitError::NoUsableCandidates`] — every candidate failed
pub async fn generate(
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
) -> Result<BatchOutput, PrintfitError> {
    let total_start = Instant::now();
    validate_request(request)?;
    let observer = observer_of(config);
    info!(
        "Starting batch: {} variation(s) of \"{}\"",
        request.variation_count, request.prompt
    );
    observer.on_batch_start(request.variation_count);

    // ── Step 1: Acquire base images ──────────────────────────────────────
    let acquire_start = Instant::now();
    let acquired = acquire(request, config, collaborators, &observer).await?;
    let acquisition_duration_ms = acquire_start.elapsed().as_millis() as u64;

    // ── Step 2: Run candidates ───────────────────────────────────────────
    let mut output =
        process_batch(acquired.images, request, config, collaborators, &observer).await?;

    output.stats.requested = request.variation_count;
    output.stats.acquisition_attempts = acquired.attempts;
    output.stats.acquisition_duration_ms = acquisition_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {}/{} candidates, {}ms total",
        output.stats.succeeded, output.stats.acquired, output.stats.total_duration_ms
    );
    Ok(output)
}

/// Run the stage pipeline on images the caller already has, skipping
/// acquisition. Index `i` of the output refers to `images[i]`.
pub async fn process_images(
    images: Vec<Vec<u8>>,
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
) -> Result<BatchOutput, PrintfitError> {
    let total_start = Instant::now();
    let observer = observer_of(config);
    observer.on_batch_start(images.len());

    let requested = images.len();
    let mut output = process_batch(images, request, config, collaborators, &observer).await?;
    output.stats.requested = requested;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
) -> Result<BatchOutput, PrintfitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PrintfitError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(request, config, collaborators))
}

/// Hand every artifact of `output` to `store`, once each.
///
/// Per candidate: `<slug>-<index>.png`, then `<slug>-<index>-proof.png` and
/// `<slug>-<index>.svg` when present. `dpi` is written into the PNGs.
/// Store errors are returned as-is; nothing is retried.
pub async fn publish(
    output: &BatchOutput,
    request: &GenerationRequest,
    store: &dyn BlobStore,
    dpi: Option<u32>,
) -> Result<Vec<PublishedArtifact>, PrintfitError> {
    let slug = artifact_slug(&request.prompt);
    let mut published = Vec::new();

    for candidate in &output.candidates {
        let base = format!("{}-{}", slug, candidate.index);

        let png = encode_owned(candidate.raster.clone(), dpi).await?;
        let name = format!("{base}.png");
        published.push(put(store, candidate.index, name, png, "image/png").await?);

        if let Some(ref proof) = candidate.proof {
            let png = encode_owned(proof.clone(), dpi).await?;
            let name = format!("{base}-proof.png");
            published.push(put(store, candidate.index, name, png, "image/png").await?);
        }

        if let Some(ref vector) = candidate.vector {
            let name = format!("{base}.svg");
            let bytes = vector.bytes.clone();
            published.push(put(store, candidate.index, name, bytes, &vector.content_type).await?);
        }
    }

    info!("Published {} artifacts", published.len());
    Ok(published)
}

// ── Internal helpers ─────────────────────────────────────────────────────

pub(crate) fn validate_request(request: &GenerationRequest) -> Result<(), PrintfitError> {
    if request.variation_count == 0 {
        return Err(PrintfitError::InvalidConfig(
            "variation_count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn observer_of(config: &PrintConfig) -> ObserverHandle {
    config
        .observer
        .clone()
        .unwrap_or_else(|| Arc::new(NoopObserver))
}

/// Run batch acquisition with the canvas size closest to the trim aspect.
pub(crate) async fn acquire(
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
    observer: &ObserverHandle,
) -> Result<Acquired, PrintfitError> {
    let size = SizeHint::for_aspect(config.physical.width_in, config.physical.height_in);
    debug!("Requesting {} canvases", size);
    BatchAcquisition::new(
        request.variation_count,
        config.max_attempts,
        Duration::from_millis(config.retry_backoff_ms),
    )
    .run(
        collaborators.generator.as_ref(),
        &request.prompt,
        size,
        observer.as_ref(),
    )
    .await
}

/// Fan candidates out, wait for all of them and assemble the output.
async fn process_batch(
    images: Vec<Vec<u8>>,
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
    observer: &ObserverHandle,
) -> Result<BatchOutput, PrintfitError> {
    let total = images.len();
    if total == 0 {
        return Err(PrintfitError::NoUsableCandidates {
            total: 0,
            first_error: "no images to process".to_string(),
        });
    }

    let pipeline = CandidatePipeline::new(request, config, collaborators.clone());
    let processing_start = Instant::now();
    let results: Vec<Result<CandidateResult, CandidateFailure>> =
        candidate_stream(pipeline, images, config.concurrency, Arc::clone(observer))
            .collect()
            .await;
    let processing_duration_ms = processing_start.elapsed().as_millis() as u64;

    let mut candidates = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(candidate) => candidates.push(candidate),
            Err(failure) => failures.push(failure),
        }
    }

    // Sort by index for stable output
    candidates.sort_by_key(|c| c.index);
    failures.sort_by_key(|f| f.index);

    observer.on_batch_complete(total, candidates.len());

    if candidates.is_empty() {
        let first_error = failures
            .first()
            .map(|f| format!("candidate {} at {}: {}", f.index, f.stage, f.error))
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PrintfitError::NoUsableCandidates { total, first_error });
    }

    let stats = BatchStats {
        requested: total,
        acquired: total,
        succeeded: candidates.len(),
        failed: failures.len(),
        processing_duration_ms,
        ..BatchStats::default()
    };
    Ok(BatchOutput {
        candidates,
        failures,
        stats,
    })
}

async fn encode_owned(raster: RasterBuffer, dpi: Option<u32>) -> Result<Vec<u8>, PrintfitError> {
    tokio::task::spawn_blocking(move || encode_png(&raster, dpi))
        .await
        .map_err(|e| PrintfitError::Internal(format!("encode task failed: {e}")))?
        .map_err(|e| PrintfitError::Encode(e.to_string()))
}

async fn put(
    store: &dyn BlobStore,
    index: usize,
    name: String,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<PublishedArtifact, PrintfitError> {
    let url = store
        .put(&name, bytes, content_type)
        .await
        .map_err(|e| PrintfitError::StoreFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    debug!("Stored {} → {}", name, url);
    Ok(PublishedArtifact {
        index,
        name,
        content_type: content_type.to_string(),
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_variations_is_rejected() {
        let err = validate_request(&GenerationRequest::new("x", 0)).unwrap_err();
        assert!(matches!(err, PrintfitError::InvalidConfig(_)));
        assert!(validate_request(&GenerationRequest::new("x", 1)).is_ok());
    }

    #[tokio::test]
    async fn empty_image_list_has_no_usable_candidates() {
        use crate::providers::StaticImageSource;
        let config = PrintConfig::builder().build().unwrap();
        let source = StaticImageSource::new(vec![vec![0]]).unwrap();
        let collaborators = Collaborators::new(Arc::new(source));
        let request = GenerationRequest::new("x", 1);
        let err = process_images(vec![], &request, &config, &collaborators)
            .await
            .unwrap_err();
        assert!(matches!(err, PrintfitError::NoUsableCandidates { total: 0, .. }));
    }
}
