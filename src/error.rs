//! Error types for the printfit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PrintfitError`] — **Fatal**: the batch cannot proceed at all (bad
//!   geometry, the generator produced nothing, every candidate died). Returned
//!   as `Err(PrintfitError)` from the top-level `generate*` functions.
//!
//! * [`StageError`] — **Non-fatal**: one stage of one candidate failed. A
//!   mandatory-stage error drops that candidate (it is reported in
//!   [`crate::output::CandidateFailure`]); an optional-stage error is only
//!   recorded in the candidate's stage log.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the printfit library.
#[derive(Debug, Error)]
pub enum PrintfitError {
    // ── Geometry / configuration ──────────────────────────────────────────
    /// Zero or negative geometry. Caller error; never retried.
    #[error("Invalid dimensions: {detail}")]
    InvalidDimensions { detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Acquisition ───────────────────────────────────────────────────────
    /// The generator produced nothing across every attempt.
    #[error("Generator returned no images after {attempts} attempts")]
    NoCandidates { attempts: u32 },

    /// Some images were collected, but fewer than requested.
    #[error("Only {collected}/{target} images generated after {attempts} attempts")]
    InsufficientCandidates {
        collected: usize,
        target: usize,
        attempts: u32,
    },

    /// Every candidate failed a mandatory stage.
    #[error("All {total} candidates failed.\nFirst error: {first_error}")]
    NoUsableCandidates { total: usize, first_error: String },

    // ── Collaborators ─────────────────────────────────────────────────────
    /// A required collaborator is missing or misconfigured.
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The blob store rejected an artifact.
    #[error("Failed to store '{name}': {reason}")]
    StoreFailed { name: String, reason: String },

    // ── Output ────────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PNG encoding of a finished raster failed.
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single stage of a single candidate.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// No decoder could interpret the bytes as an image.
    #[error("could not decode image bytes: {detail}")]
    DecodeFailure { detail: String },

    /// Geometry input with a zero dimension.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Optional background removal failed; the candidate continues.
    #[error("background removal failed: {detail}")]
    BackgroundRemovalFailed { detail: String },

    /// Optional vectorization failed; the candidate continues.
    #[error("vectorization failed: {detail}")]
    VectorizationFailed { detail: String },

    /// Unexpected internal error (e.g. a panicked worker task).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error reported by an external collaborator (generator, remover,
/// vectorizer, blob store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<StageError> for PrintfitError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::InvalidDimensions { width, height } => PrintfitError::InvalidDimensions {
                detail: format!("{width}x{height}"),
            },
            other => PrintfitError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_display() {
        let e = PrintfitError::InsufficientCandidates {
            collected: 2,
            target: 4,
            attempts: 6,
        };
        let msg = e.to_string();
        assert!(msg.contains("2/4"), "got: {msg}");
        assert!(msg.contains("6 attempts"), "got: {msg}");
    }

    #[test]
    fn no_usable_display() {
        let e = PrintfitError::NoUsableCandidates {
            total: 3,
            first_error: "could not decode image bytes: garbage".into(),
        };
        assert!(e.to_string().contains("All 3 candidates"));
        assert!(e.to_string().contains("garbage"));
    }

    #[test]
    fn stage_dimensions_convert_to_fatal() {
        let e: PrintfitError = StageError::InvalidDimensions {
            width: 0,
            height: 7,
        }
        .into();
        assert!(matches!(e, PrintfitError::InvalidDimensions { .. }));
        assert!(e.to_string().contains("0x7"));
    }

    #[test]
    fn stage_error_roundtrips_through_json() {
        let e = StageError::VectorizationFailed {
            detail: "quota".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: StageError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
