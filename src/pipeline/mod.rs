//! Pipeline stages for print preparation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! acquire ──▶ normalize ──▶ [bg removal] ──▶ [vectorize] ──▶ pad ──▶ resample ──▶ composite ──▶ [proof]
//! (generator)  (decoders)     (optional)       (optional)            (trim box)    (bleed)
//! ```
//!
//! 1. [`acquire`]   — collect N base images, retrying short batches
//! 2. [`normalize`] — bytes → RGBA via an ordered decoder chain
//! 3. [`pad`]       — transparent margin around the subject
//! 4. [`resample`]  — bilinear contain/cover into the trim box
//! 5. [`composite`] — centre the trim image on the bleed canvas
//! 6. [`proof`]     — trim and safe guide lines on a copy
//!
//! [`candidate`] sequences the stages for one image; [`encode`] and
//! [`input`] are the byte-level helpers around them. Stages 2–6 are pure CPU
//! work and never touch the network.

pub mod acquire;
pub mod candidate;
pub mod composite;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod pad;
pub mod proof;
pub mod resample;
