//! Solver configuration
//!
//! [`SolverConfig`] aggregates the caps of the outer loop and the per-pattern
//! configs. It deserializes with defaults for every missing field, so a TOML
//! file only needs the values it changes. Use [`SolverConfigBuilder`] to get a
//! validated config in code.

use crate::detectors::{BarcodePhotoConfig, BoxedBarcodeConfig, MarkerGroupConfig, QrFormConfig};
use crate::error::{LayoutError, Result};
use crate::placement::PlacementConfig;
use serde::{Deserialize, Serialize};

/// How much the solver logs
///
/// Injected through the config; the solver never inspects its environment to
/// decide what to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Nothing beyond warnings
    #[default]
    Quiet,
    /// One debug line per iteration and the final outcome
    Summary,
    /// Detector and pass detail at trace level
    Trace,
}

impl Verbosity {
    /// Map a `-v` count to a verbosity
    #[must_use]
    pub const fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Self::Quiet,
            1 => Self::Summary,
            _ => Self::Trace,
        }
    }
}

/// Configuration for [`LayoutSolver`](crate::LayoutSolver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Outer solver iterations
    pub max_iterations: usize,
    /// Remeasure attempts while bounds are missing
    pub bounds_retries: usize,
    /// Confidence below which a `low-confidence` warning is emitted
    pub low_confidence_threshold: f64,
    /// Allow the marker and barcode-photo rewrites to replace items
    pub enable_structural_rewrites: bool,
    pub verbosity: Verbosity,
    pub marker_group: MarkerGroupConfig,
    pub barcode_photo: BarcodePhotoConfig,
    pub qr_form: QrFormConfig,
    pub boxed_barcode: BoxedBarcodeConfig,
    pub placement: PlacementConfig,
}

impl Default for SolverConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_iterations: 5,
            bounds_retries: 4,
            low_confidence_threshold: 0.55,
            enable_structural_rewrites: true,
            verbosity: Verbosity::Quiet,
            marker_group: MarkerGroupConfig::default(),
            barcode_photo: BarcodePhotoConfig::default(),
            qr_form: QrFormConfig::default(),
            boxed_barcode: BoxedBarcodeConfig::default(),
            placement: PlacementConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Check ranges of caps and thresholds
    ///
    /// # Errors
    ///
    /// [`LayoutError::ConfigError`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(LayoutError::ConfigError { reason });
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return invalid(format!(
                "low_confidence_threshold must be within [0, 1], got {}",
                self.low_confidence_threshold
            ));
        }
        if self.qr_form.min_qr_size <= 0.0 {
            return invalid(format!(
                "qr_form.min_qr_size must be positive, got {}",
                self.qr_form.min_qr_size
            ));
        }
        if self.qr_form.min_font_size <= 0.0 {
            return invalid(format!(
                "qr_form.min_font_size must be positive, got {}",
                self.qr_form.min_font_size
            ));
        }
        if self.boxed_barcode.max_header_attempts == 0 {
            return invalid("boxed_barcode.max_header_attempts must be at least 1".to_string());
        }
        if self.placement.marker_left_margin < 0.0 {
            return invalid(format!(
                "placement.marker_left_margin must not be negative, got {}",
                self.placement.marker_left_margin
            ));
        }
        Ok(())
    }
}

/// Builder for [`SolverConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl Default for SolverConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SolverConfigBuilder {
    /// Builder with the default caps: 5 iterations, 4 bounds retries,
    /// warning threshold 0.55, structural rewrites enabled
    #[inline]
    #[must_use = "returns a new builder with default settings"]
    pub fn new() -> Self {
        Self {
            config: SolverConfig::default(),
        }
    }

    /// Geometry-only preset
    ///
    /// Rewrites are disabled so item ids and texts never change, and the
    /// warning threshold is raised to 0.65.
    ///
    /// # Examples
    ///
    /// ```
    /// use labelkit_layout::SolverConfigBuilder;
    ///
    /// # fn main() -> labelkit_layout::Result<()> {
    /// let config = SolverConfigBuilder::strict().build()?;
    /// assert!(!config.enable_structural_rewrites);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "returns a builder that never rewrites items"]
    pub fn strict() -> Self {
        Self::new()
            .enable_structural_rewrites(false)
            .low_confidence_threshold(0.65)
    }

    /// Preset for slow or flaky renderers: 8 iterations, 6 bounds retries
    #[must_use = "returns a builder with larger iteration caps"]
    pub fn relaxed() -> Self {
        Self::new().max_iterations(8).bounds_retries(6)
    }

    #[inline]
    #[must_use = "returns the builder with the iteration cap configured"]
    pub const fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.max_iterations = iterations;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the bounds retry cap configured"]
    pub const fn bounds_retries(mut self, retries: usize) -> Self {
        self.config.bounds_retries = retries;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the warning threshold configured"]
    pub const fn low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.low_confidence_threshold = threshold;
        self
    }

    #[inline]
    #[must_use = "returns the builder with structural rewrites toggled"]
    pub const fn enable_structural_rewrites(mut self, enabled: bool) -> Self {
        self.config.enable_structural_rewrites = enabled;
        self
    }

    #[inline]
    #[must_use = "returns the builder with verbosity configured"]
    pub const fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the marker group config set"]
    pub const fn marker_group(mut self, config: MarkerGroupConfig) -> Self {
        self.config.marker_group = config;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the barcode photo config set"]
    pub const fn barcode_photo(mut self, config: BarcodePhotoConfig) -> Self {
        self.config.barcode_photo = config;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the QR form config set"]
    pub const fn qr_form(mut self, config: QrFormConfig) -> Self {
        self.config.qr_form = config;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the boxed barcode config set"]
    pub const fn boxed_barcode(mut self, config: BoxedBarcodeConfig) -> Self {
        self.config.boxed_barcode = config;
        self
    }

    #[inline]
    #[must_use = "returns the builder with the placement config set"]
    pub const fn placement(mut self, config: PlacementConfig) -> Self {
        self.config.placement = config;
        self
    }

    /// Validate and return the config
    ///
    /// # Errors
    ///
    /// [`LayoutError::ConfigError`] if any cap or threshold is out of range.
    pub fn build(self) -> Result<SolverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
