//! Result types produced by the pipeline.

use crate::config::DerivedDimensions;
use crate::error::StageError;
use crate::raster::RasterBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every stage a candidate can pass through, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    BackgroundRemoval,
    Vectorization,
    MarginPad,
    Resample,
    Finalize,
    Proof,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::BackgroundRemoval => "background_removal",
            Stage::Vectorization => "vectorization",
            Stage::MarginPad => "margin_pad",
            Stage::Resample => "resample",
            Stage::Finalize => "finalize",
            Stage::Proof => "proof",
        }
    }

    /// A failure in a mandatory stage drops the candidate.
    pub fn is_mandatory(&self) -> bool {
        !matches!(
            self,
            Stage::BackgroundRemoval | Stage::Vectorization | Stage::Proof
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one stage ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    SkippedOptional(String),
    Failed(String),
}

impl StageOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageOutcome::Ok)
    }
}

/// One entry of a candidate's stage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Free-form detail, e.g. which decoder was used.
    pub message: String,
    pub duration_ms: u64,
}

/// Vector rendition of a candidate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl fmt::Debug for VectorArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorArtifact")
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A candidate that completed every mandatory stage.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    /// Position in the acquired batch (0-based).
    pub index: usize,
    /// The finished bleed-canvas raster.
    #[serde(skip)]
    pub raster: RasterBuffer,
    /// Copy of `raster` with trim and safe guides, when proofs are enabled.
    #[serde(skip)]
    pub proof: Option<RasterBuffer>,
    pub vector: Option<VectorArtifact>,
    pub dimensions: DerivedDimensions,
    pub stage_log: Vec<StageRecord>,
}

impl CandidateResult {
    /// Outcome recorded for `stage`, if the stage ran.
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stage_log
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }
}

/// A candidate dropped by a mandatory-stage failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub index: usize,
    pub stage: Stage,
    pub error: StageError,
    pub stage_log: Vec<StageRecord>,
}

/// Timing and counts for one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub requested: usize,
    pub acquired: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub acquisition_attempts: u32,
    pub acquisition_duration_ms: u64,
    pub processing_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a batch produced. `candidates` is never empty.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub candidates: Vec<CandidateResult>,
    pub failures: Vec<CandidateFailure>,
    pub stats: BatchStats,
}

/// One artifact handed to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub index: usize,
    pub name: String,
    pub content_type: String,
    pub url: String,
}
