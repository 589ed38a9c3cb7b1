//! Configuration types for print preparation.
//!
//! All pipeline behaviour is controlled through [`PrintConfig`], built via
//! its [`PrintConfigBuilder`]. The physical target lives in [`PhysicalSpec`];
//! every pixel dimension the pipeline needs is derived from it on demand via
//! [`PhysicalSpec::derive`] and never stored, so the inches and the pixels can
//! not drift apart.

use crate::error::PrintfitError;
use crate::progress::ObserverHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest canvas edge the pipeline agrees to allocate.
const MAX_CANVAS_EDGE: u32 = 30_000;

/// Physical output target.
///
/// Invariant (enforced by [`PrintConfigBuilder::build`]): every length and
/// the DPI are positive, `margin_fraction ∈ [0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSpec {
    /// Trim width in inches.
    pub width_in: f64,
    /// Trim height in inches.
    pub height_in: f64,
    pub dpi: u32,
    /// Bleed added on every side of the trim, in inches.
    pub bleed_in: f64,
    /// Transparent margin added around the subject, as a fraction of the
    /// shorter source edge.
    pub margin_fraction: f64,
    /// Safe-area inset inside the trim, in inches. Only used for proofs.
    pub safety_in: f64,
}

impl Default for PhysicalSpec {
    fn default() -> Self {
        Self {
            width_in: 8.0,
            height_in: 10.0,
            dpi: 300,
            bleed_in: 0.125,
            margin_fraction: 0.05,
            safety_in: 0.125,
        }
    }
}

/// Pixel dimensions derived from a [`PhysicalSpec`].
///
/// Each value is rounded half away from zero on its own, so width and height
/// never share a rounding remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedDimensions {
    pub trim_width: u32,
    pub trim_height: u32,
    pub final_width: u32,
    pub final_height: u32,
    pub bleed_px: u32,
    pub safety_px: u32,
}

impl DerivedDimensions {
    /// Offset of the trim box inside the bleed canvas.
    pub fn trim_offset(&self) -> (u32, u32) {
        (
            (self.final_width - self.trim_width) / 2,
            (self.final_height - self.trim_height) / 2,
        )
    }
}

impl PhysicalSpec {
    pub fn derive(&self) -> DerivedDimensions {
        let dpi = self.dpi as f64;
        DerivedDimensions {
            trim_width: to_px(self.width_in, dpi),
            trim_height: to_px(self.height_in, dpi),
            final_width: to_px(self.width_in + 2.0 * self.bleed_in, dpi),
            final_height: to_px(self.height_in + 2.0 * self.bleed_in, dpi),
            bleed_px: to_px(self.bleed_in, dpi),
            safety_px: to_px(self.safety_in, dpi),
        }
    }

    fn validate(&self) -> Result<(), PrintfitError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.width_in) || !positive(self.height_in) {
            return Err(PrintfitError::InvalidDimensions {
                detail: format!(
                    "trim must be positive, got {}in x {}in",
                    self.width_in, self.height_in
                ),
            });
        }
        if !positive(self.bleed_in) {
            return Err(PrintfitError::InvalidDimensions {
                detail: format!("bleed must be positive, got {}in", self.bleed_in),
            });
        }
        if !self.safety_in.is_finite() || self.safety_in < 0.0 {
            return Err(PrintfitError::InvalidDimensions {
                detail: format!("safety inset must be ≥ 0, got {}in", self.safety_in),
            });
        }
        if self.dpi < 72 || self.dpi > 2400 {
            return Err(PrintfitError::InvalidConfig(format!(
                "DPI must be 72–2400, got {}",
                self.dpi
            )));
        }
        if !(0.0..1.0).contains(&self.margin_fraction) {
            return Err(PrintfitError::InvalidConfig(format!(
                "Margin fraction must be in [0, 1), got {}",
                self.margin_fraction
            )));
        }

        let dims = self.derive();
        if dims.trim_width == 0 || dims.trim_height == 0 {
            return Err(PrintfitError::InvalidDimensions {
                detail: format!(
                    "trim rounds to {}x{} px at {} DPI",
                    dims.trim_width, dims.trim_height, self.dpi
                ),
            });
        }
        if dims.final_width > MAX_CANVAS_EDGE || dims.final_height > MAX_CANVAS_EDGE {
            return Err(PrintfitError::InvalidConfig(format!(
                "Canvas {}x{} px exceeds the {} px limit",
                dims.final_width, dims.final_height, MAX_CANVAS_EDGE
            )));
        }
        if 2.0 * self.safety_in >= self.width_in.min(self.height_in) {
            return Err(PrintfitError::InvalidConfig(format!(
                "Safety inset {}in leaves no safe area inside a {}in x {}in trim",
                self.safety_in, self.width_in, self.height_in
            )));
        }
        Ok(())
    }
}

fn to_px(inches: f64, dpi: f64) -> u32 {
    // f64::round is half-away-from-zero.
    (inches * dpi).round().max(0.0) as u32
}

/// How a source image is fitted into the trim box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fit inside, centre, pad with transparency. Never crops. (default)
    #[default]
    Contain,
    /// Fill the box, centre, crop the excess.
    Cover,
}

/// What the caller asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub variation_count: usize,
    pub remove_background: bool,
    pub vectorize: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, variation_count: usize) -> Self {
        Self {
            prompt: prompt.into(),
            variation_count,
            remove_background: false,
            vectorize: false,
        }
    }

    pub fn with_background_removal(mut self, v: bool) -> Self {
        self.remove_background = v;
        self
    }

    pub fn with_vectorization(mut self, v: bool) -> Self {
        self.vectorize = v;
        self
    }
}

/// Configuration for a print-preparation run.
///
/// Built via [`PrintConfig::builder()`] or using [`PrintConfig::default()`].
///
/// # Example
/// ```rust
/// use printfit::{FitMode, PrintConfig};
///
/// let config = PrintConfig::builder()
///     .size_in(5.0, 7.0)
///     .dpi(300)
///     .bleed_in(0.125)
///     .fit(FitMode::Contain)
///     .build()
///     .unwrap();
/// assert_eq!(config.dimensions().trim_width, 1500);
/// ```
#[derive(Clone)]
pub struct PrintConfig {
    pub physical: PhysicalSpec,

    /// Fit used when resampling to the trim box. Default: contain.
    pub fit: FitMode,

    /// Number of candidates processed at once. Default: 4.
    pub concurrency: usize,

    /// Generator attempts before acquisition gives up. Default: 6.
    pub max_attempts: u32,

    /// Delay after an attempt that produced nothing, in milliseconds. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Render a proof overlay for every finished candidate. Default: true.
    pub render_proof: bool,

    /// Opacity of the proof guide lines. Default: 0.7.
    pub proof_alpha: f32,

    /// Write the DPI into published PNGs (`pHYs`). Default: true.
    pub embed_dpi: bool,

    /// Timeout for URL downloads in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Receives per-stage events.
    pub observer: Option<ObserverHandle>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            physical: PhysicalSpec::default(),
            fit: FitMode::default(),
            concurrency: 4,
            max_attempts: 6,
            retry_backoff_ms: 1000,
            render_proof: true,
            proof_alpha: 0.7,
            embed_dpi: true,
            download_timeout_secs: 60,
            observer: None,
        }
    }
}

impl fmt::Debug for PrintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintConfig")
            .field("physical", &self.physical)
            .field("fit", &self.fit)
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("render_proof", &self.render_proof)
            .field("proof_alpha", &self.proof_alpha)
            .field("embed_dpi", &self.embed_dpi)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl PrintConfig {
    /// Create a new builder for `PrintConfig`.
    pub fn builder() -> PrintConfigBuilder {
        PrintConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn dimensions(&self) -> DerivedDimensions {
        self.physical.derive()
    }
}

/// Builder for [`PrintConfig`].
#[derive(Debug)]
pub struct PrintConfigBuilder {
    config: PrintConfig,
}

impl PrintConfigBuilder {
    pub fn physical(mut self, spec: PhysicalSpec) -> Self {
        self.config.physical = spec;
        self
    }

    /// Trim size in inches.
    pub fn size_in(mut self, width: f64, height: f64) -> Self {
        self.config.physical.width_in = width;
        self.config.physical.height_in = height;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.physical.dpi = dpi;
        self
    }

    pub fn bleed_in(mut self, bleed: f64) -> Self {
        self.config.physical.bleed_in = bleed;
        self
    }

    pub fn margin_fraction(mut self, fraction: f64) -> Self {
        self.config.physical.margin_fraction = fraction;
        self
    }

    pub fn safety_in(mut self, inset: f64) -> Self {
        self.config.physical.safety_in = inset;
        self
    }

    pub fn fit(mut self, fit: FitMode) -> Self {
        self.config.fit = fit;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn render_proof(mut self, v: bool) -> Self {
        self.config.render_proof = v;
        self
    }

    pub fn proof_alpha(mut self, alpha: f32) -> Self {
        self.config.proof_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn embed_dpi(mut self, v: bool) -> Self {
        self.config.embed_dpi = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PrintConfig, PrintfitError> {
        self.config.physical.validate()?;
        if self.config.max_attempts == 0 {
            return Err(PrintfitError::InvalidConfig(
                "Max attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_letter_at_300_dpi() {
        let spec = PhysicalSpec {
            width_in: 8.5,
            height_in: 11.0,
            dpi: 300,
            bleed_in: 0.125,
            ..PhysicalSpec::default()
        };
        let d = spec.derive();
        assert_eq!((d.trim_width, d.trim_height), (2550, 3300));
        assert_eq!((d.final_width, d.final_height), (2625, 3375));
        assert_eq!(d.bleed_px, 38); // 37.5 rounds away from zero
        assert_eq!(d.trim_offset(), (37, 37));
    }

    #[test]
    fn axes_round_independently() {
        // 2.5 * 101 = 252.5 → 253; 1.5 * 101 = 151.5 → 152; 3.0 * 101 = 303.
        let spec = PhysicalSpec {
            width_in: 2.5,
            height_in: 1.5,
            dpi: 101,
            bleed_in: 0.25,
            ..PhysicalSpec::default()
        };
        let d = spec.derive();
        assert_eq!(d.trim_width, 253);
        assert_eq!(d.trim_height, 152);
        assert_eq!(d.final_width, 303);
        assert_eq!(d.final_height, 202);
    }

    #[test]
    fn builder_defaults_are_valid() {
        let c = PrintConfig::builder().build().expect("defaults valid");
        assert_eq!(c.max_attempts, 6);
        assert_eq!(c.fit, FitMode::Contain);
        assert_eq!(c.dimensions().trim_width, 2400);
    }

    #[test]
    fn builder_rejects_zero_width() {
        let err = PrintConfig::builder().size_in(0.0, 4.0).build().unwrap_err();
        assert!(matches!(err, PrintfitError::InvalidDimensions { .. }));
    }

    #[test]
    fn builder_rejects_margin_of_one() {
        let err = PrintConfig::builder()
            .margin_fraction(1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PrintfitError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_low_dpi() {
        assert!(PrintConfig::builder().dpi(10).build().is_err());
    }

    #[test]
    fn dpi_range_is_inclusive() {
        assert!(PrintConfig::builder().dpi(72).build().is_ok());
        assert!(PrintConfig::builder().size_in(1.0, 1.0).dpi(2400).build().is_ok());
        let err = PrintConfig::builder().dpi(2401).build().unwrap_err();
        assert!(matches!(err, PrintfitError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_canvas_beyond_edge_limit() {
        // 200in at 300 DPI is 60_000 px wide before bleed
        let err = PrintConfig::builder()
            .size_in(200.0, 1.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("px limit"), "got: {err}");
    }

    #[test]
    fn builder_rejects_oversized_safety() {
        let err = PrintConfig::builder()
            .size_in(1.0, 1.0)
            .safety_in(0.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("safe area"), "got: {err}");
    }

    #[test]
    fn concurrency_floor_is_one() {
        let c = PrintConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn fit_mode_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&FitMode::Cover).unwrap(), "\"cover\"");
    }
}
