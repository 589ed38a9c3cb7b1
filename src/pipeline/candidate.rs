//! Per-candidate stage sequencing.
//!
//! ```text
//! Normalize ─▶ [BackgroundRemoval] ─▶ [Vectorization] ─▶ MarginPad ─▶ Resample ─▶ Finalize ─▶ [Proof]
//! ```
//!
//! Bracketed stages are optional: they run only when requested and a provider
//! is configured, and any failure is recorded as
//! [`StageOutcome::SkippedOptional`] while the candidate continues with the
//! value it had before the stage. A failure in any other stage drops the
//! candidate with a [`CandidateFailure`].
//!
//! Pixel work runs on the blocking pool; only provider calls are awaited on
//! the async workers.

use crate::config::{DerivedDimensions, FitMode, GenerationRequest, PrintConfig};
use crate::error::StageError;
use crate::output::{
    CandidateFailure, CandidateResult, Stage, StageOutcome, StageRecord, VectorArtifact,
};
use crate::pipeline::composite::bleed_canvas;
use crate::pipeline::encode::encode_png;
use crate::pipeline::normalize::{FormatNormalizer, Normalized};
use crate::pipeline::pad::{margin_px, pad};
use crate::pipeline::proof::{render_proof, GuideBox};
use crate::pipeline::resample::fit;
use crate::progress::{NoopObserver, ObserverHandle, StageEvent, StageStatus};
use crate::providers::{BackgroundRemover, Collaborators, Vectorizer};
use crate::raster::RasterBuffer;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// The value flowing between stages.
enum Working {
    Pixels(RasterBuffer),
    /// Bytes no decoder accepted. Optional stages may still turn them into
    /// pixels; the first pixel stage fails if they do not.
    Unverified(Vec<u8>),
}

/// Runs every stage for one image. Cheap to clone; one instance is shared by
/// all candidates of a batch.
#[derive(Clone)]
pub struct CandidatePipeline {
    normalizer: Arc<FormatNormalizer>,
    collaborators: Collaborators,
    observer: ObserverHandle,
    dims: DerivedDimensions,
    margin_fraction: f64,
    fit: FitMode,
    render_proof: bool,
    proof_alpha: f32,
    remove_background: bool,
    vectorize: bool,
}

impl CandidatePipeline {
    pub fn new(
        request: &GenerationRequest,
        config: &PrintConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            normalizer: Arc::new(FormatNormalizer::default()),
            collaborators,
            observer: config
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver)),
            dims: config.dimensions(),
            margin_fraction: config.physical.margin_fraction,
            fit: config.fit,
            render_proof: config.render_proof,
            proof_alpha: config.proof_alpha,
            remove_background: request.remove_background,
            vectorize: request.vectorize,
        }
    }

    /// Replace the default decoder chain.
    pub fn with_normalizer(mut self, normalizer: FormatNormalizer) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn dimensions(&self) -> DerivedDimensions {
        self.dims
    }

    /// Run all stages on `bytes`, the `index`-th image of the batch.
    pub async fn run(
        &self,
        index: usize,
        bytes: Vec<u8>,
    ) -> Result<CandidateResult, CandidateFailure> {
        let mut log = StageLog::new(index, self.observer.clone());

        // ── Normalize ────────────────────────────────────────────────────
        let started = log.begin(Stage::Normalize);
        let normalizer = Arc::clone(&self.normalizer);
        let mut working = match blocking(move || Ok(normalizer.normalize(bytes))).await {
            Ok(Normalized::Decoded { raster, decoder }) => {
                let message = format!(
                    "decoded via {} ({}x{})",
                    decoder,
                    raster.width(),
                    raster.height()
                );
                log.finish(Stage::Normalize, started, StageOutcome::Ok, message);
                Working::Pixels(raster)
            }
            Ok(Normalized::Unverified(bytes)) => {
                log.finish(Stage::Normalize, started, StageOutcome::Ok, "unverified");
                Working::Unverified(bytes)
            }
            Err(e) => return Err(log.fail(Stage::Normalize, started, e)),
        };

        // ── Background removal (optional) ────────────────────────────────
        if self.remove_background {
            let started = log.begin(Stage::BackgroundRemoval);
            match self.collaborators.background_remover.as_deref() {
                None => log.skip(
                    Stage::BackgroundRemoval,
                    started,
                    "no background remover configured",
                ),
                Some(remover) => match self.strip_background(remover, &working).await {
                    Ok(raster) => {
                        let message = format!("{}x{}", raster.width(), raster.height());
                        log.finish(Stage::BackgroundRemoval, started, StageOutcome::Ok, message);
                        working = Working::Pixels(raster);
                    }
                    Err(e) => log.skip(Stage::BackgroundRemoval, started, e.to_string()),
                },
            }
        }

        // ── Vectorization (optional) ─────────────────────────────────────
        let mut vector = None;
        if self.vectorize {
            let started = log.begin(Stage::Vectorization);
            match self.collaborators.vectorizer.as_deref() {
                None => log.skip(Stage::Vectorization, started, "no vectorizer configured"),
                Some(vectorizer) => match self.trace_vector(vectorizer, &working).await {
                    Ok((artifact, Some(raster))) => {
                        let message = format!(
                            "{} bytes svg, png rendition {}x{}",
                            artifact.bytes.len(),
                            raster.width(),
                            raster.height()
                        );
                        log.finish(Stage::Vectorization, started, StageOutcome::Ok, message);
                        vector = Some(artifact);
                        working = Working::Pixels(raster);
                    }
                    Ok((artifact, None)) => {
                        let message = format!("{} bytes svg", artifact.bytes.len());
                        log.finish(Stage::Vectorization, started, StageOutcome::Ok, message);
                        vector = Some(artifact);
                    }
                    Err(e) => log.skip(Stage::Vectorization, started, e.to_string()),
                },
            }
        }

        // ── Margin pad ───────────────────────────────────────────────────
        let started = log.begin(Stage::MarginPad);
        let raster = match working {
            Working::Pixels(raster) => raster,
            Working::Unverified(bytes) => {
                let err = StageError::DecodeFailure {
                    detail: format!("{} bytes matched no decoder", bytes.len()),
                };
                return Err(log.fail(Stage::MarginPad, started, err));
            }
        };
        let margin = margin_px(raster.width(), raster.height(), self.margin_fraction);
        let fraction = self.margin_fraction;
        let padded = match blocking(move || pad(raster, fraction)).await {
            Ok(padded) => padded,
            Err(e) => return Err(log.fail(Stage::MarginPad, started, e)),
        };
        let message = format!("{}px → {}x{}", margin, padded.width(), padded.height());
        log.finish(Stage::MarginPad, started, StageOutcome::Ok, message);

        // ── Resample to trim ─────────────────────────────────────────────
        let started = log.begin(Stage::Resample);
        let (trim_w, trim_h, mode) = (self.dims.trim_width, self.dims.trim_height, self.fit);
        let trim = match blocking(move || fit(&padded, trim_w, trim_h, mode)).await {
            Ok(trim) => trim,
            Err(e) => return Err(log.fail(Stage::Resample, started, e)),
        };
        let message = format!("{:?} into {}x{}", mode, trim_w, trim_h).to_lowercase();
        log.finish(Stage::Resample, started, StageOutcome::Ok, message);

        // ── Finalize onto the bleed canvas ───────────────────────────────
        let started = log.begin(Stage::Finalize);
        let dims = self.dims;
        let raster = match blocking(move || bleed_canvas(&trim, &dims)).await {
            Ok(raster) => raster,
            Err(e) => return Err(log.fail(Stage::Finalize, started, e)),
        };
        let message = format!("{}x{}, bleed {}px", raster.width(), raster.height(), dims.bleed_px);
        log.finish(Stage::Finalize, started, StageOutcome::Ok, message);

        // ── Proof (optional) ─────────────────────────────────────────────
        let mut proof = None;
        if self.render_proof {
            let started = log.begin(Stage::Proof);
            let source = raster.clone();
            let alpha = self.proof_alpha;
            let rendered = blocking(move || {
                Ok(render_proof(&source, GuideBox::trim_of(&dims), dims.safety_px, alpha))
            })
            .await;
            match rendered {
                Ok(overlay) => {
                    log.finish(Stage::Proof, started, StageOutcome::Ok, "");
                    proof = Some(overlay);
                }
                Err(e) => log.skip(Stage::Proof, started, e.to_string()),
            }
        }

        info!(
            "Candidate {} ready: {}x{} ({} stages)",
            index,
            raster.width(),
            raster.height(),
            log.records.len()
        );
        Ok(CandidateResult {
            index,
            raster,
            proof,
            vector,
            dimensions: self.dims,
            stage_log: log.records,
        })
    }

    async fn strip_background(
        &self,
        remover: &dyn BackgroundRemover,
        working: &Working,
    ) -> Result<RasterBuffer, StageError> {
        let failed = |detail: String| StageError::BackgroundRemovalFailed { detail };
        let input = provider_input(working).await?;
        let output = remover
            .remove(input)
            .await
            .map_err(|e| failed(e.to_string()))?;
        self.decode_provider_output(output).await.map_err(failed)
    }

    /// Returns the artifact plus the downloaded PNG rendition, when the
    /// vectorizer handed back a continuation token.
    async fn trace_vector(
        &self,
        vectorizer: &dyn Vectorizer,
        working: &Working,
    ) -> Result<(VectorArtifact, Option<RasterBuffer>), StageError> {
        let failed = |detail: String| StageError::VectorizationFailed { detail };
        let input = provider_input(working).await?;
        let vectorized = vectorizer
            .vectorize(input)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let artifact = VectorArtifact {
            bytes: vectorized.vector,
            content_type: SVG_CONTENT_TYPE.to_string(),
        };

        let Some(token) = vectorized.continuation_token else {
            return Ok((artifact, None));
        };
        let png = vectorizer
            .download(&token, "png")
            .await
            .map_err(|e| failed(e.to_string()))?;
        let raster = self.decode_provider_output(png).await.map_err(failed)?;
        Ok((artifact, Some(raster)))
    }

    async fn decode_provider_output(&self, bytes: Vec<u8>) -> Result<RasterBuffer, String> {
        let normalizer = Arc::clone(&self.normalizer);
        match blocking(move || Ok(normalizer.normalize(bytes))).await {
            Ok(Normalized::Decoded { raster, .. }) => Ok(raster),
            Ok(Normalized::Unverified(bytes)) => Err(format!(
                "provider returned {} bytes that are not a decodable image",
                bytes.len()
            )),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Bytes handed to an optional provider: PNG for pixels, the original bytes
/// otherwise.
async fn provider_input(working: &Working) -> Result<Vec<u8>, StageError> {
    match working {
        Working::Unverified(bytes) => Ok(bytes.clone()),
        Working::Pixels(raster) => {
            let raster = raster.clone();
            blocking(move || {
                encode_png(&raster, None).map_err(|e| StageError::Internal(format!("png encode: {e}")))
            })
            .await
        }
    }
}

/// Run CPU-bound stage work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, StageError>
where
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StageError::Internal(format!("stage task failed: {e}")))?
}

/// Accumulates [`StageRecord`]s and mirrors them to the observer.
struct StageLog {
    index: usize,
    observer: ObserverHandle,
    records: Vec<StageRecord>,
}

impl StageLog {
    fn new(index: usize, observer: ObserverHandle) -> Self {
        Self {
            index,
            observer,
            records: Vec::new(),
        }
    }

    fn begin(&self, stage: Stage) -> Instant {
        debug!("Candidate {}: {} started", self.index, stage);
        self.observer.on_stage(&StageEvent {
            candidate: self.index,
            stage,
            status: StageStatus::Started,
            message: String::new(),
        });
        Instant::now()
    }

    fn finish(
        &mut self,
        stage: Stage,
        started: Instant,
        outcome: StageOutcome,
        message: impl Into<String>,
    ) {
        let message = message.into();
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            "Candidate {}: {} finished in {}ms {}",
            self.index, stage, duration_ms, message
        );
        self.observer.on_stage(&StageEvent {
            candidate: self.index,
            stage,
            status: StageStatus::Finished(outcome.clone()),
            message: message.clone(),
        });
        self.records.push(StageRecord {
            stage,
            outcome,
            message,
            duration_ms,
        });
    }

    fn skip(&mut self, stage: Stage, started: Instant, reason: impl Into<String>) {
        debug_assert!(!stage.is_mandatory(), "{stage} cannot be skipped");
        let reason = reason.into();
        warn!("Candidate {}: {} skipped — {}", self.index, stage, reason);
        self.finish(
            stage,
            started,
            StageOutcome::SkippedOptional(reason.clone()),
            reason,
        );
    }

    fn fail(mut self, stage: Stage, started: Instant, error: StageError) -> CandidateFailure {
        debug_assert!(stage.is_mandatory(), "{stage} failures are recorded as skips");
        let reason = error.to_string();
        warn!("Candidate {}: {} failed — {}", self.index, stage, reason);
        self.finish(stage, started, StageOutcome::Failed(reason.clone()), reason);
        CandidateFailure {
            index: self.index,
            stage,
            error,
            stage_log: self.records,
        }
    }
}
