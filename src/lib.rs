//! # printfit
//!
//! Turn generated artwork into print-calibrated raster assets.
//!
//! Image generators hand back square-ish RGB(A) canvases at screen
//! resolution. A print shop wants an exact physical size at a fixed DPI, a
//! bleed band around the trim, and nothing important near the cut. This
//! crate takes a batch of generated images and, for each one, pads it,
//! resamples it into the trim box and lays it onto a transparent bleed
//! canvas, with optional background removal and vectorization along the way.
//! Candidates fail independently: one bad image never takes the batch down.
//!
//! ## Pipeline Overview
//!
//! ```text
//! prompt
//!  │
//!  ├─ 1. Acquire    ask the generator for N images, retrying short batches
//!  ├─ 2. Normalize  PNG fast path, then a decoder fallback chain
//!  ├─ 3. Enrich     optional background removal / vectorization (non-fatal)
//!  ├─ 4. Pad        transparent margin around the subject
//!  ├─ 5. Resample   bilinear contain (or cover) into the trim box
//!  ├─ 6. Finalize   centre on the bleed canvas
//!  └─ 7. Proof      trim + safe guides on a copy (optional)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use printfit::{generate, Collaborators, GenerationRequest, HttpImageGenerator, PrintConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = HttpImageGenerator::new("https://images.internal/generate", 60)?;
//!     let collaborators = Collaborators::new(Arc::new(generator));
//!     let config = PrintConfig::builder().size_in(8.0, 10.0).dpi(300).build()?;
//!     let request = GenerationRequest::new("a lighthouse at dusk, linocut", 3);
//!
//!     let output = generate(&request, &config, &collaborators).await?;
//!     for c in &output.candidates {
//!         println!("#{}: {}x{}", c.index, c.raster.width(), c.raster.height());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `printfit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! printfit = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod raster;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DerivedDimensions, FitMode, GenerationRequest, PhysicalSpec, PrintConfig, PrintConfigBuilder,
};
pub use error::{PrintfitError, ProviderError, StageError};
pub use generate::{generate, generate_sync, process_images, publish};
pub use output::{
    BatchOutput, BatchStats, CandidateFailure, CandidateResult, PublishedArtifact, Stage,
    StageOutcome, StageRecord, VectorArtifact,
};
pub use progress::{NoopObserver, ObserverHandle, PipelineObserver, StageEvent, StageStatus};
pub use providers::{
    BackgroundRemover, BlobStore, Collaborators, HttpImageGenerator, ImageGenerator, SizeHint,
    StaticImageSource, Vectorized, Vectorizer,
};
pub use raster::RasterBuffer;
pub use store::{artifact_slug, FsBlobStore};
pub use stream::{generate_stream, CandidateStream};
