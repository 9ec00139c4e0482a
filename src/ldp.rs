//! ## Noise-tolerant word estimator
//! Spreads every word over `segment_count` synthetic segment keys (`word_seg0`, `word_seg1`, ...)
//! and keeps one [`HyperLogLog`] sketch per segment key.
//!
//! Reports are privatized with randomized response: each segment hash is reported truthfully
//! with probability `p = e^ε / (e^ε + 1)`, otherwise it is replaced with the segment's identity
//! hash XORed with fresh randomness. A noised report cannot be linked back to the true hash,
//! yet still lands in the sketch owned by its segment key.
//!
//! Each distinct hash value is accepted only once across the whole estimator, so replaying the
//! identical report cannot inflate registers twice. Two segments producing the identical noised
//! hash therefore count as a single report.
//!
//! A word is recovered when at least `max(1, segment_count / 2)` of its segments have a sketch.
//! The estimate is then the minimum over the matched segment sketches, so one segment's
//! undercount is not hidden by noise inflating the others.

use std::fmt::{Debug, Formatter};

use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::SketchConfig;
use crate::error::{Result, SketchError};
use crate::hash::hash_bytes;
use crate::hyperloglog::HyperLogLog;

/// Seed of the segment identity hash that noised reports are derived from
pub const NOISE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Return synthetic key of `index`-th segment of `word`
#[inline]
pub fn segment_key(word: &str, index: usize) -> String {
    format!("{}_seg{}", word, index)
}

/// Return all `count` segment keys of `word`
pub fn segment_keys(word: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| segment_key(word, i)).collect()
}

/// Word estimate along with the evidence it is based on
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WordEstimate {
    /// Minimum segment estimate, or `0.0` when evidence is insufficient
    pub estimate: f64,
    /// Number of word segments that have a sketch
    pub matched_segments: usize,
    /// Number of matched segments needed to report an estimate
    pub required_segments: usize,
}

impl WordEstimate {
    /// Whether enough segments matched for `estimate` to be meaningful
    #[inline]
    pub fn is_sufficient(&self) -> bool {
        self.matched_segments >= self.required_segments
    }
}

/// HyperLogLog based estimator of per-word counts under local differential privacy
pub struct HyperLogLogLdp<R: Rng = StdRng> {
    config: SketchConfig,
    sketches: HashMap<String, HyperLogLog>,
    reported_hashes: HashSet<u64>,
    rng: R,
}

impl HyperLogLogLdp<StdRng> {
    /// Create new estimator with randomness seeded from OS entropy
    pub fn new(config: SketchConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> HyperLogLogLdp<R> {
    /// Create new estimator drawing randomized response decisions from `rng`
    pub fn with_rng(config: SketchConfig, rng: R) -> Result<Self> {
        if !SketchConfig::is_valid_precision(config.precision) {
            debug!(precision = config.precision, "rejected estimator precision");
            return Err(SketchError::InvalidConfig {
                precision: config.precision,
            });
        }
        if config.epsilon.is_nan() {
            debug!("rejected NaN estimator epsilon");
            return Err(SketchError::InvalidEpsilon);
        }
        Ok(Self {
            config,
            sketches: HashMap::new(),
            reported_hashes: HashSet::new(),
            rng,
        })
    }

    /// Insert privatized reports of `segments` into their segment sketches
    pub fn insert_segments<I, S>(&mut self, segments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for segment in segments {
            let segment = segment.as_ref();
            let hash = self.classify_hash(segment);
            if !self.reported_hashes.insert(hash) {
                trace!(segment, hash, "dropped duplicate report");
                continue;
            }

            let config = self.config;
            self.sketches
                .entry_ref(segment)
                .or_insert_with(|| {
                    debug!(segment, "created segment sketch");
                    HyperLogLog::from_valid_config(config)
                })
                .insert_hash(hash);
        }
    }

    /// Return word estimate, `0.0` meaning too few of its segments were observed
    pub fn estimate_word(&self, word: &str) -> f64 {
        self.estimate_word_detailed(word).estimate
    }

    /// Return word estimate together with matched and required segment counts
    pub fn estimate_word_detailed(&self, word: &str) -> WordEstimate {
        let required_segments = (self.config.segment_count / 2).max(1);
        let (matched_segments, minimum) = (0..self.config.segment_count)
            .filter_map(|i| self.sketches.get(segment_key(word, i).as_str()))
            .map(HyperLogLog::estimate)
            .fold((0, f64::INFINITY), |(matched, min), estimate| {
                (matched + 1, min.min(estimate))
            });

        let estimate = if matched_segments >= required_segments {
            minimum
        } else {
            debug!(
                word,
                matched_segments, required_segments, "insufficient segments for word estimate"
            );
            0.0
        };

        WordEstimate {
            estimate,
            matched_segments,
            required_segments,
        }
    }

    /// Return hash to report for `segment` under randomized response
    pub(crate) fn classify_hash(&mut self, segment: &str) -> u64 {
        if self.rng.gen::<f64>() < self.config.truthful_probability() {
            return hash_bytes(segment.as_bytes());
        }
        trace!(segment, "reporting noised hash");
        wyhash::wyhash(segment.as_bytes(), NOISE_SEED) ^ self.rng.gen::<u64>()
    }

    #[inline]
    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    /// Return sketch owned by segment key, if any report for it was accepted
    #[inline]
    pub fn segment_sketch(&self, segment: &str) -> Option<&HyperLogLog> {
        self.sketches.get(segment)
    }

    /// Return number of segment keys with a sketch
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.sketches.len()
    }

    /// Return number of distinct hash values accepted so far
    #[inline]
    pub fn num_reported_hashes(&self) -> usize {
        self.reported_hashes.len()
    }
}

impl<R: Rng> Debug for HyperLogLogLdp<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ segments: {}, reported_hashes: {}, epsilon: {} }}",
            self.sketches.len(),
            self.reported_hashes.len(),
            self.config.epsilon
        )
    }
}
