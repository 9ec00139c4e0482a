//! Sketch configuration shared by [`HyperLogLog`](crate::HyperLogLog) and
//! [`HyperLogLogLdp`](crate::HyperLogLogLdp).

/// Smallest supported precision (16 registers)
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision (65536 registers)
pub const MAX_PRECISION: u8 = 16;

/// Immutable sketch parameters.
///
/// `precision` controls the register count of every sketch (`m = 2^precision`), while
/// `segment_count` is only read by the LDP estimator and counts the segments each word
/// is split into. The two are unrelated.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SketchConfig {
    /// Number of hash bits used to select a register, in `[MIN_PRECISION..MAX_PRECISION]`.
    pub precision: u8,
    /// Number of segments expected per word by [`HyperLogLogLdp::estimate_word`](crate::HyperLogLogLdp::estimate_word).
    pub segment_count: usize,
    /// Apply small-range (linear counting) and large-range corrections to the raw estimate.
    pub use_bias_correction: bool,
    /// Replaces the precision-derived alpha constant when set to a positive value.
    pub alpha_override: Option<f64>,
    /// Randomized-response privacy parameter: report truthfully with probability `e^ε / (e^ε + 1)`.
    pub epsilon: f64,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            precision: 4,
            segment_count: 4,
            use_bias_correction: true,
            alpha_override: None,
            epsilon: 4.0,
        }
    }
}

impl SketchConfig {
    pub fn with_precision(self, precision: u8) -> Self {
        Self { precision, ..self }
    }

    pub fn with_segment_count(self, segment_count: usize) -> Self {
        Self {
            segment_count,
            ..self
        }
    }

    pub fn with_bias_correction(self, use_bias_correction: bool) -> Self {
        Self {
            use_bias_correction,
            ..self
        }
    }

    pub fn with_alpha_override(self, alpha: f64) -> Self {
        Self {
            alpha_override: Some(alpha),
            ..self
        }
    }

    pub fn with_epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Whether `precision` lies within the supported range
    #[inline]
    pub fn is_valid_precision(precision: u8) -> bool {
        (MIN_PRECISION..=MAX_PRECISION).contains(&precision)
    }

    /// Positive alpha override, if any
    #[inline]
    pub(crate) fn effective_alpha_override(&self) -> Option<f64> {
        self.alpha_override.filter(|alpha| *alpha > 0.0)
    }

    /// Probability of reporting the true hash under randomized response
    #[inline]
    pub fn truthful_probability(&self) -> f64 {
        // e^ε / (e^ε + 1) rewritten so large ε cannot overflow into inf / inf
        1.0 / (1.0 + (-self.epsilon).exp())
    }
}
