//! Streaming API: emit candidates as they complete.
//!
//! A batch of large print rasters takes a while and holds a lot of memory.
//! [`generate_stream`] lets callers publish or display each candidate as soon
//! as it finishes, instead of waiting for the slowest one like
//! [`crate::generate::generate`] does.
//!
//! Acquisition still happens up front, so its fatal errors are returned
//! before the stream exists. Candidates then arrive in completion order
//! (sort by `index` if order matters). The stream does not apply the
//! "at least one survivor" rule; callers see every failure as an `Err` item.

use crate::config::{GenerationRequest, PrintConfig};
use crate::error::PrintfitError;
use crate::generate::{acquire, observer_of, validate_request};
use crate::output::{CandidateFailure, CandidateResult};
use crate::pipeline::candidate::CandidatePipeline;
use crate::progress::ObserverHandle;
use crate::providers::Collaborators;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of candidate results.
pub type CandidateStream =
    Pin<Box<dyn Stream<Item = Result<CandidateResult, CandidateFailure>> + Send>>;

/// Acquire the batch, then stream candidates as they finish.
///
/// # Returns
/// - `Ok(CandidateStream)` — one item per acquired image
/// - `Err(PrintfitError)` — invalid request or acquisition failure
///
/// # Example
/// ```rust,no_run
/// use printfit::{generate_stream, Collaborators, GenerationRequest, PrintConfig, StaticImageSource};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = StaticImageSource::new(vec![std::fs::read("art.png")?])?;
/// let collaborators = Collaborators::new(Arc::new(source));
/// let request = GenerationRequest::new("poster", 3);
/// let config = PrintConfig::default();
/// let mut stream = generate_stream(&request, &config, &collaborators).await?;
/// while let Some(candidate) = stream.next().await {
///     match candidate {
///         Ok(c) => println!("#{}: {}x{}", c.index, c.raster.width(), c.raster.height()),
///         Err(f) => eprintln!("#{} dropped at {}: {}", f.index, f.stage, f.error),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_stream(
    request: &GenerationRequest,
    config: &PrintConfig,
    collaborators: &Collaborators,
) -> Result<CandidateStream, PrintfitError> {
    validate_request(request)?;
    let observer = observer_of(config);
    info!(
        "Starting streaming batch: {} variation(s)",
        request.variation_count
    );
    observer.on_batch_start(request.variation_count);

    let acquired = acquire(request, config, collaborators, &observer).await?;
    let pipeline = CandidatePipeline::new(request, config, collaborators.clone());
    Ok(candidate_stream(
        pipeline,
        acquired.images,
        config.concurrency,
        observer,
    ))
}

/// Run `pipeline` over `images` with at most `concurrency` in flight,
/// reporting each outcome to `observer`.
pub(crate) fn candidate_stream(
    pipeline: CandidatePipeline,
    images: Vec<Vec<u8>>,
    concurrency: usize,
    observer: ObserverHandle,
) -> CandidateStream {
    let s = stream::iter(images.into_iter().enumerate().map(move |(index, bytes)| {
        let pipeline = pipeline.clone();
        let observer = Arc::clone(&observer);
        async move {
            let result = pipeline.run(index, bytes).await;
            match &result {
                Ok(_) => observer.on_candidate_complete(index),
                Err(failure) => observer.on_candidate_failed(index, &failure.error.to_string()),
            }
            result
        }
    }))
    .buffer_unordered(concurrency.max(1));

    Box::pin(s)
}
